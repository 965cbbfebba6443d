use super::*;
use async_trait::async_trait;
use std::sync::Mutex;

struct RecordingMailer {
    enviados: Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            enviados: Mutex::new(Vec::new()),
        })
    }

    fn mensajes(&self) -> Vec<(String, String, String)> {
        self.enviados.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn enviar(&self, destinatario: &str, asunto: &str, cuerpo_html: &str) -> anyhow::Result<()> {
        self.enviados.lock().expect("lock").push((
            destinatario.to_string(),
            asunto.to_string(),
            cuerpo_html.to_string(),
        ));
        Ok(())
    }
}

async fn contexto() -> (ApiContext, Arc<RecordingMailer>) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mailer = RecordingMailer::new();
    (
        ApiContext {
            storage,
            mailer: mailer.clone(),
        },
        mailer,
    )
}

async fn sembrar_liceo(ctx: &ApiContext) -> Establecimiento {
    let comuna = crear_comuna(
        ctx,
        NuevaComuna {
            nombre: "Valparaíso".into(),
        },
    )
    .await
    .expect("comuna");
    crear_establecimiento(
        ctx,
        NuevoEstablecimiento {
            rbd: "10234-5".into(),
            nombre: "Liceo A".into(),
            dependencia: shared::domain::Dependencia::Municipal,
            comuna_id: comuna.id,
        },
    )
    .await
    .expect("establecimiento")
}

#[tokio::test]
async fn rejects_blank_comuna_before_touching_storage() {
    let (ctx, _) = contexto().await;
    let error = crear_comuna(&ctx, NuevaComuna { nombre: " ".into() })
        .await
        .expect_err("debe fallar");
    assert_eq!(error.code, shared::error::ErrorCode::Validation);
    assert!(listar_comunas(&ctx).await.expect("listar").is_empty());
}

#[tokio::test]
async fn update_of_missing_row_maps_to_not_found() {
    let (ctx, _) = contexto().await;
    let error = actualizar_comuna(
        &ctx,
        ComunaId(42),
        NuevaComuna {
            nombre: "Quillota".into(),
        },
    )
    .await
    .expect_err("no existe");
    assert_eq!(error.code, shared::error::ErrorCode::NotFound);
}

#[tokio::test]
async fn comuna_with_schools_cannot_be_deleted() {
    let (ctx, _) = contexto().await;
    let establecimiento = sembrar_liceo(&ctx).await;
    let error = eliminar_comuna(&ctx, establecimiento.comuna_id)
        .await
        .expect_err("en uso");
    assert_eq!(error.code, shared::error::ErrorCode::Validation);
}

#[tokio::test]
async fn notifying_school_mails_every_directivo() {
    let (ctx, mailer) = contexto().await;
    let establecimiento = sembrar_liceo(&ctx).await;
    for (nombre, email, cargo) in [
        ("Juana Pérez", "jperez@liceo-a.cl", "Jefe UTP"),
        ("Pedro Díaz", "pdiaz@liceo-a.cl", "Director"),
    ] {
        crear_directivo(
            &ctx,
            NuevoDirectivo {
                nombre: nombre.into(),
                email: email.into(),
                cargo: cargo.into(),
                establecimiento_id: establecimiento.id,
            },
        )
        .await
        .expect("directivo");
    }

    let resumen = enviar_correo_establecimiento(&ctx, establecimiento.id)
        .await
        .expect("envío");
    assert_eq!(resumen.enviados, 2);

    let mensajes = mailer.mensajes();
    assert_eq!(mensajes.len(), 2);
    assert_eq!(mensajes[0].0, "jperez@liceo-a.cl");
    assert!(mensajes[0].2.contains("Estimado/a Juana Pérez"));
    assert!(mensajes[0].2.contains("su calidad de Jefe UTP del Liceo A"));
    assert!(mensajes[1].2.contains("Estimado/a Pedro Díaz"));
}

#[tokio::test]
async fn notifying_unknown_school_is_not_found() {
    let (ctx, _) = contexto().await;
    let error = enviar_correo_establecimiento(&ctx, EstablecimientoId(404))
        .await
        .expect_err("no existe");
    assert_eq!(error.code, shared::error::ErrorCode::NotFound);
}

#[tokio::test]
async fn school_without_directivos_cannot_be_notified() {
    let (ctx, mailer) = contexto().await;
    let establecimiento = sembrar_liceo(&ctx).await;
    let error = enviar_correo_establecimiento(&ctx, establecimiento.id)
        .await
        .expect_err("sin directivos");
    assert_eq!(error.code, shared::error::ErrorCode::Validation);
    assert!(mailer.mensajes().is_empty());
}

#[tokio::test]
async fn template_referencing_unknown_field_fails_at_send_time() {
    let (ctx, _) = contexto().await;
    let establecimiento = sembrar_liceo(&ctx).await;
    crear_directivo(
        &ctx,
        NuevoDirectivo {
            nombre: "Juana Pérez".into(),
            email: "jperez@liceo-a.cl".into(),
            cargo: "Jefe UTP".into(),
            establecimiento_id: establecimiento.id,
        },
    )
    .await
    .expect("directivo");
    guardar_plantilla(
        &ctx,
        PlantillaDestinatario::Establecimiento,
        "<p>Hola {{ campo_inexistente }}</p>",
    )
    .await
    .expect("guardar");

    let error = enviar_correo_establecimiento(&ctx, establecimiento.id)
        .await
        .expect_err("campo desconocido");
    assert_eq!(error.code, shared::error::ErrorCode::Validation);
}

#[tokio::test]
async fn get_template_before_any_post_returns_default() {
    let (ctx, _) = contexto().await;
    let html = plantilla(&ctx, PlantillaDestinatario::Estudiante)
        .await
        .expect("plantilla");
    assert_eq!(html, PLANTILLA_ESTUDIANTE_DEFECTO);

    guardar_plantilla(&ctx, PlantillaDestinatario::Estudiante, "<p>propia</p>")
        .await
        .expect("guardar");
    let html = plantilla(&ctx, PlantillaDestinatario::Estudiante)
        .await
        .expect("plantilla");
    assert_eq!(html, "<p>propia</p>");
}

#[tokio::test]
async fn bulk_upload_inserts_rows_and_counts_skips() {
    let (ctx, _) = contexto().await;
    let csv = "nombres,apellidos,email,carrera,periodo_ingreso\n\
               Ana,Rojas,ana.rojas@uni.cl,Pedagogía Básica,2026-1\n\
               Luis,Soto,,Pedagogía Básica,2026-1\n\
               Eva,Mora,eva.mora@uni.cl,Pedagogía en Historia,2025-2\n";

    let resumen = carga_masiva(&ctx, csv.as_bytes()).await.expect("carga");
    assert_eq!(resumen.insertados, 2);
    assert_eq!(resumen.omitidos, 1);

    let estudiantes = listar_estudiantes(&ctx).await.expect("listar");
    assert_eq!(estudiantes.len(), 2);

    // carreras are created on first sight, resolved by name afterwards
    let carreras = listar_carreras(&ctx).await.expect("carreras");
    let nombres: Vec<_> = carreras.iter().map(|c| c.nombre.as_str()).collect();
    assert_eq!(nombres, vec!["Pedagogía Básica", "Pedagogía en Historia"]);
}

#[tokio::test]
async fn bulk_upload_reuses_existing_carrera() {
    let (ctx, _) = contexto().await;
    crear_carrera(
        &ctx,
        NuevaCarrera {
            nombre: "Pedagogía Básica".into(),
        },
    )
    .await
    .expect("carrera");

    let csv = "nombres,apellidos,email,carrera,periodo_ingreso\n\
               Ana,Rojas,ana.rojas@uni.cl,Pedagogía Básica,2026-1\n";
    carga_masiva(&ctx, csv.as_bytes()).await.expect("carga");

    assert_eq!(listar_carreras(&ctx).await.expect("carreras").len(), 1);
}

#[tokio::test]
async fn vaciado_clears_roster_tables() {
    let (ctx, _) = contexto().await;
    sembrar_liceo(&ctx).await;
    vaciar_base(&ctx).await.expect("vaciado");
    assert!(listar_comunas(&ctx).await.expect("comunas").is_empty());
    assert!(listar_establecimientos(&ctx)
        .await
        .expect("establecimientos")
        .is_empty());
}

#[tokio::test]
async fn ficha_requires_existing_references() {
    let (ctx, _) = contexto().await;
    let error = crear_ficha(
        &ctx,
        NuevaFicha {
            estudiante_id: shared::domain::EstudianteId(1),
            establecimiento_id: EstablecimientoId(1),
            cupo_id: shared::domain::CupoId(1),
            fecha_inicio: chrono::NaiveDate::from_ymd_opt(2026, 3, 2).expect("fecha"),
            fecha_termino: chrono::NaiveDate::from_ymd_opt(2026, 7, 10).expect("fecha"),
        },
    )
    .await
    .expect_err("referencias inexistentes");
    assert_eq!(error.code, shared::error::ErrorCode::Validation);
}
