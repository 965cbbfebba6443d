use super::*;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use shared::error::ErrorCode;
use tokio::sync::Mutex as TokioMutex;

#[derive(Clone, Default)]
struct Fixture {
    hits: Arc<AtomicUsize>,
    plantilla: Arc<TokioMutex<String>>,
}

async fn fixture_comunas(State(fixture): State<Fixture>) -> Json<Vec<Comuna>> {
    fixture.hits.fetch_add(1, Ordering::SeqCst);
    Json(vec![
        Comuna {
            id: ComunaId(1),
            nombre: "Valparaíso".to_string(),
        },
        Comuna {
            id: ComunaId(2),
            nombre: "Quilpué".to_string(),
        },
    ])
}

async fn fixture_crear_estudiante(
    State(fixture): State<Fixture>,
    Json(datos): Json<NuevoEstudiante>,
) -> Json<Estudiante> {
    fixture.hits.fetch_add(1, Ordering::SeqCst);
    Json(Estudiante {
        id: EstudianteId(1),
        nombres: datos.nombres,
        apellidos: datos.apellidos,
        email: datos.email,
        carrera_id: datos.carrera_id,
        periodo_ingreso: datos.periodo_ingreso,
    })
}

async fn fixture_no_encontrado() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::not_found("comuna 999 no existe")),
    )
}

#[derive(serde::Deserialize)]
struct HtmlQuery {
    html: String,
}

async fn fixture_guardar_plantilla(
    State(fixture): State<Fixture>,
    Query(query): Query<HtmlQuery>,
) -> StatusCode {
    *fixture.plantilla.lock().await = query.html;
    StatusCode::NO_CONTENT
}

async fn fixture_leer_plantilla(State(fixture): State<Fixture>) -> String {
    fixture.plantilla.lock().await.clone()
}

async fn fixture_carga_masiva(mut multipart: Multipart) -> Json<CargaMasivaResumen> {
    let mut lineas = 0u32;
    while let Some(field) = multipart.next_field().await.expect("field") {
        let contenido = field.bytes().await.expect("bytes");
        lineas = contenido.iter().filter(|byte| **byte == b'\n').count() as u32;
    }
    Json(CargaMasivaResumen {
        insertados: lineas.saturating_sub(1),
        omitidos: 0,
    })
}

async fn servidor_de_prueba() -> (String, Fixture) {
    let fixture = Fixture::default();
    let app = Router::new()
        .route("/api/v1/comunas", get(fixture_comunas))
        .route("/api/v1/estudiantes", post(fixture_crear_estudiante))
        .route("/api/v1/comunas/:id", axum::routing::put(fixture_no_encontrado))
        .route(
            "/api/v1/email/email-template/student",
            get(fixture_leer_plantilla).post(fixture_guardar_plantilla),
        )
        .route("/api/v1/carga_masiva/", post(fixture_carga_masiva))
        .route(
            "/api/v1/carga_masiva/vaciadoDB",
            delete(|| async { StatusCode::NO_CONTENT }),
        )
        .with_state(fixture.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let direccion = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{direccion}"), fixture)
}

#[test]
fn rejects_unparseable_base_url() {
    assert!(matches!(
        ConsoleClient::new("no-es-una-url"),
        Err(ClienteError::UrlInvalida(_))
    ));
}

#[test]
fn search_matcher_ignores_case_and_blank_terms() {
    assert!(coincide_busqueda(&["Liceo A", "10234-5"], "liceo"));
    assert!(coincide_busqueda(&["Liceo A"], "  "));
    assert!(!coincide_busqueda(&["Liceo A"], "colegio"));
}

#[tokio::test]
async fn listing_populates_the_cache_used_by_filters() {
    let (base, _) = servidor_de_prueba().await;
    let cliente = ConsoleClient::new(&base).expect("cliente");

    let comunas = cliente.listar_comunas().await.expect("listar");
    assert_eq!(comunas.len(), 2);

    let filtradas = cliente.filtrar_comunas("valpa").await;
    assert_eq!(filtradas.len(), 1);
    assert_eq!(filtradas[0].nombre, "Valparaíso");
}

#[tokio::test]
async fn invalid_student_never_reaches_the_network() {
    let (base, fixture) = servidor_de_prueba().await;
    let cliente = ConsoleClient::new(&base).expect("cliente");
    let mut notificaciones = cliente.suscribirse();

    let resultado = cliente
        .crear_estudiante(&NuevoEstudiante {
            nombres: "".to_string(),
            apellidos: "Rojas".to_string(),
            email: "sin-arroba".to_string(),
            carrera_id: CarreraId(1),
            periodo_ingreso: "2026-1".to_string(),
        })
        .await;

    match resultado {
        Err(ClienteError::Validacion(errores)) => {
            let campos: Vec<_> = errores.iter().map(|error| error.campo).collect();
            assert!(campos.contains(&"nombres"));
            assert!(campos.contains(&"email"));
        }
        otro => panic!("se esperaba error de validación, hubo {otro:?}"),
    }
    assert_eq!(fixture.hits.load(Ordering::SeqCst), 0);

    let notificacion = notificaciones.try_recv().expect("notificación");
    assert!(matches!(notificacion, Notificacion::Error(_)));
}

#[tokio::test]
async fn valid_student_is_posted_and_cached() {
    let (base, fixture) = servidor_de_prueba().await;
    let cliente = ConsoleClient::new(&base).expect("cliente");

    let estudiante = cliente
        .crear_estudiante(&NuevoEstudiante {
            nombres: "Ana".to_string(),
            apellidos: "Rojas".to_string(),
            email: "ana.rojas@uni.cl".to_string(),
            carrera_id: CarreraId(1),
            periodo_ingreso: "2026-1".to_string(),
        })
        .await
        .expect("crear");

    assert_eq!(estudiante.nombre_completo(), "Ana Rojas");
    assert_eq!(fixture.hits.load(Ordering::SeqCst), 1);
    assert_eq!(cliente.filtrar_estudiantes("rojas").await.len(), 1);
}

#[tokio::test]
async fn error_envelope_is_decoded_and_broadcast() {
    let (base, _) = servidor_de_prueba().await;
    let cliente = ConsoleClient::new(&base).expect("cliente");
    let mut notificaciones = cliente.suscribirse();

    let resultado = cliente
        .actualizar_comuna(ComunaId(999), &NuevaComuna {
            nombre: "Quillota".to_string(),
        })
        .await;

    match resultado {
        Err(ClienteError::Api(error)) => {
            assert_eq!(error.code, ErrorCode::NotFound);
            assert!(error.message.contains("999"));
        }
        otro => panic!("se esperaba error del API, hubo {otro:?}"),
    }

    let notificacion = notificaciones.try_recv().expect("notificación");
    assert_eq!(
        notificacion,
        Notificacion::Error("comuna 999 no existe".to_string())
    );
}

#[tokio::test]
async fn template_roundtrip_uses_the_query_parameter() {
    let (base, _) = servidor_de_prueba().await;
    let cliente = ConsoleClient::new(&base).expect("cliente");

    cliente
        .guardar_plantilla(PlantillaDestinatario::Estudiante, "<p>hola {{ nombres }}</p>")
        .await
        .expect("guardar");

    let html = cliente
        .obtener_plantilla(PlantillaDestinatario::Estudiante)
        .await
        .expect("obtener");
    assert_eq!(html, "<p>hola {{ nombres }}</p>");
}

#[tokio::test]
async fn bulk_upload_sends_multipart_csv() {
    let (base, _) = servidor_de_prueba().await;
    let cliente = ConsoleClient::new(&base).expect("cliente");

    let csv = "nombres,apellidos,email,carrera,periodo_ingreso\n\
Ana,Rojas,ana.rojas@uni.cl,Pedagogía Básica,2026-1\n"
        .as_bytes()
        .to_vec();
    let resumen = cliente
        .carga_masiva("estudiantes.csv", csv)
        .await
        .expect("carga");
    assert_eq!(resumen.insertados, 1);
}

#[tokio::test]
async fn wiping_the_database_clears_local_caches() {
    let (base, _) = servidor_de_prueba().await;
    let cliente = ConsoleClient::new(&base).expect("cliente");

    cliente.listar_comunas().await.expect("listar");
    assert_eq!(cliente.filtrar_comunas("").await.len(), 2);

    cliente.vaciado_db().await.expect("vaciado");
    assert!(cliente.filtrar_comunas("").await.is_empty());
}
