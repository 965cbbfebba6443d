use super::*;
use shared::carta::PLANTILLA_ESTABLECIMIENTO_DEFECTO;

async fn memoria() -> Storage {
    Storage::new("sqlite::memory:").await.expect("db")
}

async fn sembrar_establecimiento(storage: &Storage) -> Establecimiento {
    let comuna = storage
        .crear_comuna(&NuevaComuna {
            nombre: "Valparaíso".into(),
        })
        .await
        .expect("comuna");
    storage
        .crear_establecimiento(&NuevoEstablecimiento {
            rbd: "10234-5".into(),
            nombre: "Liceo A".into(),
            dependencia: Dependencia::Municipal,
            comuna_id: comuna.id,
        })
        .await
        .expect("establecimiento")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = memoria().await;
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("practicas_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn comuna_crud_roundtrip() {
    let storage = memoria().await;
    let comuna = storage
        .crear_comuna(&NuevaComuna {
            nombre: "Quilpué".into(),
        })
        .await
        .expect("crear");
    assert!(comuna.id.0 > 0);

    let actualizada = storage
        .actualizar_comuna(
            comuna.id,
            &NuevaComuna {
                nombre: "Villa Alemana".into(),
            },
        )
        .await
        .expect("actualizar")
        .expect("fila existente");
    assert_eq!(actualizada.nombre, "Villa Alemana");

    let listado = storage.listar_comunas().await.expect("listar");
    assert_eq!(listado, vec![actualizada]);

    assert!(storage.eliminar_comuna(comuna.id).await.expect("eliminar"));
    assert!(storage.listar_comunas().await.expect("listar").is_empty());
}

#[tokio::test]
async fn updating_missing_row_returns_none() {
    let storage = memoria().await;
    let resultado = storage
        .actualizar_comuna(
            ComunaId(99),
            &NuevaComuna {
                nombre: "Fantasma".into(),
            },
        )
        .await
        .expect("actualizar");
    assert!(resultado.is_none());
    assert!(!storage.eliminar_comuna(ComunaId(99)).await.expect("borrar"));
}

#[tokio::test]
async fn deleting_school_cascades_to_directivos_and_cupos() {
    let storage = memoria().await;
    let establecimiento = sembrar_establecimiento(&storage).await;
    let carrera = storage
        .crear_carrera(&NuevaCarrera {
            nombre: "Pedagogía en Historia".into(),
        })
        .await
        .expect("carrera");
    let nivel = storage
        .crear_nivel_practica(&NuevoNivelPractica {
            nombre: "Práctica Inicial".into(),
            carrera_id: carrera.id,
        })
        .await
        .expect("nivel");

    storage
        .crear_directivo(&NuevoDirectivo {
            nombre: "Juana Pérez".into(),
            email: "jperez@liceo-a.cl".into(),
            cargo: "Jefe UTP".into(),
            establecimiento_id: establecimiento.id,
        })
        .await
        .expect("directivo");
    storage
        .crear_cupo(&NuevoCupo {
            establecimiento_id: establecimiento.id,
            nivel_practica_id: nivel.id,
        })
        .await
        .expect("cupo");

    assert!(storage
        .eliminar_establecimiento(establecimiento.id)
        .await
        .expect("eliminar"));
    assert!(storage.listar_directivos().await.expect("directivos").is_empty());
    assert!(storage.listar_cupos().await.expect("cupos").is_empty());
}

#[tokio::test]
async fn deleting_student_cascades_to_fichas() {
    let storage = memoria().await;
    let establecimiento = sembrar_establecimiento(&storage).await;
    let carrera = storage
        .crear_carrera(&NuevaCarrera {
            nombre: "Pedagogía Básica".into(),
        })
        .await
        .expect("carrera");
    let nivel = storage
        .crear_nivel_practica(&NuevoNivelPractica {
            nombre: "Práctica Profesional".into(),
            carrera_id: carrera.id,
        })
        .await
        .expect("nivel");
    let cupo = storage
        .crear_cupo(&NuevoCupo {
            establecimiento_id: establecimiento.id,
            nivel_practica_id: nivel.id,
        })
        .await
        .expect("cupo");
    let estudiante = storage
        .crear_estudiante(&NuevoEstudiante {
            nombres: "Ana".into(),
            apellidos: "Rojas".into(),
            email: "ana.rojas@uni.cl".into(),
            carrera_id: carrera.id,
            periodo_ingreso: "2026-1".into(),
        })
        .await
        .expect("estudiante");

    storage
        .crear_ficha(&NuevaFicha {
            estudiante_id: estudiante.id,
            establecimiento_id: establecimiento.id,
            cupo_id: cupo.id,
            fecha_inicio: NaiveDate::from_ymd_opt(2026, 3, 2).expect("fecha"),
            fecha_termino: NaiveDate::from_ymd_opt(2026, 7, 10).expect("fecha"),
        })
        .await
        .expect("ficha");

    assert!(storage
        .eliminar_estudiante(estudiante.id)
        .await
        .expect("eliminar"));
    assert!(storage.listar_fichas().await.expect("fichas").is_empty());
}

#[tokio::test]
async fn usage_checks_report_referencing_rows() {
    let storage = memoria().await;
    let establecimiento = sembrar_establecimiento(&storage).await;
    let carrera = storage
        .crear_carrera(&NuevaCarrera {
            nombre: "Pedagogía en Matemática".into(),
        })
        .await
        .expect("carrera");

    assert!(storage
        .comuna_en_uso(establecimiento.comuna_id)
        .await
        .expect("en uso"));
    assert!(!storage.carrera_en_uso(carrera.id).await.expect("en uso"));

    storage
        .crear_estudiante(&NuevoEstudiante {
            nombres: "Luis".into(),
            apellidos: "Soto".into(),
            email: "lsoto@uni.cl".into(),
            carrera_id: carrera.id,
            periodo_ingreso: "2025-2".into(),
        })
        .await
        .expect("estudiante");
    assert!(storage.carrera_en_uso(carrera.id).await.expect("en uso"));
}

#[tokio::test]
async fn resolves_carrera_by_name() {
    let storage = memoria().await;
    let creada = storage
        .crear_carrera(&NuevaCarrera {
            nombre: "Educación Parvularia".into(),
        })
        .await
        .expect("carrera");

    let encontrada = storage
        .carrera_por_nombre("Educación Parvularia")
        .await
        .expect("buscar")
        .expect("existente");
    assert_eq!(encontrada, creada);

    assert!(storage
        .carrera_por_nombre("Astronomía")
        .await
        .expect("buscar")
        .is_none());
}

#[tokio::test]
async fn stores_and_overwrites_templates_per_audience() {
    let storage = memoria().await;
    assert!(storage
        .plantilla(PlantillaDestinatario::Establecimiento)
        .await
        .expect("plantilla")
        .is_none());

    storage
        .guardar_plantilla(
            PlantillaDestinatario::Establecimiento,
            PLANTILLA_ESTABLECIMIENTO_DEFECTO,
        )
        .await
        .expect("guardar");
    storage
        .guardar_plantilla(PlantillaDestinatario::Establecimiento, "<p>v2</p>")
        .await
        .expect("sobrescribir");

    let html = storage
        .plantilla(PlantillaDestinatario::Establecimiento)
        .await
        .expect("plantilla")
        .expect("guardada");
    assert_eq!(html, "<p>v2</p>");

    assert!(storage
        .plantilla(PlantillaDestinatario::Estudiante)
        .await
        .expect("plantilla")
        .is_none());
}

#[tokio::test]
async fn vaciar_base_empties_every_entity_table() {
    let storage = memoria().await;
    let establecimiento = sembrar_establecimiento(&storage).await;
    storage
        .crear_directivo(&NuevoDirectivo {
            nombre: "Pedro Díaz".into(),
            email: "pdiaz@liceo-a.cl".into(),
            cargo: "Director".into(),
            establecimiento_id: establecimiento.id,
        })
        .await
        .expect("directivo");
    storage
        .guardar_plantilla(PlantillaDestinatario::Estudiante, "<p>hola</p>")
        .await
        .expect("plantilla");

    storage.vaciar_base().await.expect("vaciado");

    assert!(storage.listar_comunas().await.expect("comunas").is_empty());
    assert!(storage
        .listar_establecimientos()
        .await
        .expect("establecimientos")
        .is_empty());
    assert!(storage.listar_directivos().await.expect("directivos").is_empty());
    // templates are configuration, not roster data
    assert!(storage
        .plantilla(PlantillaDestinatario::Estudiante)
        .await
        .expect("plantilla")
        .is_some());
}
