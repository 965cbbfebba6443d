use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use correo::{LogMailer, SmtpMailer};
use serde::Deserialize;
use server_api::ApiContext;
use shared::{
    domain::{
        Carrera, CarreraId, Comuna, ComunaId, Cupo, CupoId, Directivo, DirectivoId,
        Establecimiento, EstablecimientoId, Estudiante, EstudianteId, Ficha, NivelPractica,
        NivelPracticaId, PlantillaDestinatario, Tutor, TutorId,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        CargaMasivaResumen, EnvioCorreoResumen, NuevaCarrera, NuevaComuna, NuevaFicha, NuevoCupo,
        NuevoDirectivo, NuevoEstablecimiento, NuevoEstudiante, NuevoNivelPractica, NuevoTutor,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

mod config;

use config::{load_settings, prepare_database_url, Settings};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[derive(Debug, Deserialize)]
struct EnvioCorreoQuery {
    establecimiento_id: i64,
}

#[derive(Debug, Deserialize)]
struct PlantillaQuery {
    html: Option<String>,
}

const MAX_CARGA_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let mailer = build_mailer(&settings)?;
    let state = AppState {
        api: ApiContext { storage, mailer },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_mailer(settings: &Settings) -> anyhow::Result<Arc<dyn correo::Mailer>> {
    match settings.smtp_host.as_deref() {
        Some(host) if !host.trim().is_empty() => Ok(Arc::new(SmtpMailer::new(
            host,
            &settings.smtp_usuario,
            &settings.smtp_clave,
            &settings.smtp_remitente,
        )?)),
        _ => {
            warn!("SMTP no configurado; los correos solo se registran en el log");
            Ok(Arc::new(LogMailer))
        }
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/comunas", get(http_listar_comunas).post(http_crear_comuna))
        .route(
            "/api/v1/comunas/:id",
            put(http_actualizar_comuna).delete(http_eliminar_comuna),
        )
        .route(
            "/api/v1/carreras",
            get(http_listar_carreras).post(http_crear_carrera),
        )
        .route(
            "/api/v1/carreras/:id",
            put(http_actualizar_carrera).delete(http_eliminar_carrera),
        )
        .route(
            "/api/v1/tutores",
            get(http_listar_tutores).post(http_crear_tutor),
        )
        .route(
            "/api/v1/tutores/:id",
            put(http_actualizar_tutor).delete(http_eliminar_tutor),
        )
        .route(
            "/api/v1/directivos",
            get(http_listar_directivos).post(http_crear_directivo),
        )
        .route(
            "/api/v1/directivos/:id",
            put(http_actualizar_directivo).delete(http_eliminar_directivo),
        )
        .route(
            "/api/v1/establecimientos",
            get(http_listar_establecimientos).post(http_crear_establecimiento),
        )
        .route(
            "/api/v1/establecimientos/:id",
            put(http_actualizar_establecimiento).delete(http_eliminar_establecimiento),
        )
        .route(
            "/api/v1/nivelpractica",
            get(http_listar_niveles).post(http_crear_nivel),
        )
        .route("/api/v1/nivelpractica/:id", delete(http_eliminar_nivel))
        .route(
            "/api/v1/estudiantes",
            get(http_listar_estudiantes).post(http_crear_estudiante),
        )
        .route(
            "/api/v1/estudiantes/:id",
            put(http_actualizar_estudiante).delete(http_eliminar_estudiante),
        )
        .route("/api/v1/cupos", get(http_listar_cupos).post(http_crear_cupo))
        .route("/api/v1/cupos/:id", delete(http_eliminar_cupo))
        .route("/api/v1/fichas", get(http_listar_fichas).post(http_crear_ficha))
        .route(
            "/api/v1/email/send-email/stablishment",
            post(http_enviar_correo_establecimiento),
        )
        .route(
            "/api/v1/email/email-template/student",
            get(http_plantilla_estudiante).post(http_guardar_plantilla_estudiante),
        )
        .route(
            "/api/v1/email/email-template/stablishment",
            get(http_plantilla_establecimiento).post(http_guardar_plantilla_establecimiento),
        )
        .route(
            "/api/v1/carga_masiva/",
            post(http_carga_masiva)
                .route_layer(DefaultBodyLimit::max(MAX_CARGA_BYTES))
                .route_layer(RequestBodyLimitLayer::new(MAX_CARGA_BYTES)),
        )
        .route("/api/v1/carga_masiva/vaciadoDB", delete(http_vaciado_db))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn reply_error(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error))
}

type Respuesta<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;
type SinContenido = Result<StatusCode, (StatusCode, Json<ApiError>)>;

// ---- comunas ----

async fn http_listar_comunas(State(state): State<Arc<AppState>>) -> Respuesta<Vec<Comuna>> {
    server_api::listar_comunas(&state.api)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_crear_comuna(
    State(state): State<Arc<AppState>>,
    Json(datos): Json<NuevaComuna>,
) -> Respuesta<Comuna> {
    server_api::crear_comuna(&state.api, datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_actualizar_comuna(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(datos): Json<NuevaComuna>,
) -> Respuesta<Comuna> {
    server_api::actualizar_comuna(&state.api, ComunaId(id), datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_eliminar_comuna(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> SinContenido {
    server_api::eliminar_comuna(&state.api, ComunaId(id))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

// ---- carreras ----

async fn http_listar_carreras(
    State(state): State<Arc<AppState>>,
) -> Respuesta<Vec<Carrera>> {
    server_api::listar_carreras(&state.api)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_crear_carrera(
    State(state): State<Arc<AppState>>,
    Json(datos): Json<NuevaCarrera>,
) -> Respuesta<Carrera> {
    server_api::crear_carrera(&state.api, datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_actualizar_carrera(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(datos): Json<NuevaCarrera>,
) -> Respuesta<Carrera> {
    server_api::actualizar_carrera(&state.api, CarreraId(id), datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_eliminar_carrera(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> SinContenido {
    server_api::eliminar_carrera(&state.api, CarreraId(id))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

// ---- tutores ----

async fn http_listar_tutores(
    State(state): State<Arc<AppState>>,
) -> Respuesta<Vec<Tutor>> {
    server_api::listar_tutores(&state.api)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_crear_tutor(
    State(state): State<Arc<AppState>>,
    Json(datos): Json<NuevoTutor>,
) -> Respuesta<Tutor> {
    server_api::crear_tutor(&state.api, datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_actualizar_tutor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(datos): Json<NuevoTutor>,
) -> Respuesta<Tutor> {
    server_api::actualizar_tutor(&state.api, TutorId(id), datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_eliminar_tutor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> SinContenido {
    server_api::eliminar_tutor(&state.api, TutorId(id))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

// ---- directivos ----

async fn http_listar_directivos(
    State(state): State<Arc<AppState>>,
) -> Respuesta<Vec<Directivo>> {
    server_api::listar_directivos(&state.api)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_crear_directivo(
    State(state): State<Arc<AppState>>,
    Json(datos): Json<NuevoDirectivo>,
) -> Respuesta<Directivo> {
    server_api::crear_directivo(&state.api, datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_actualizar_directivo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(datos): Json<NuevoDirectivo>,
) -> Respuesta<Directivo> {
    server_api::actualizar_directivo(&state.api, DirectivoId(id), datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_eliminar_directivo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> SinContenido {
    server_api::eliminar_directivo(&state.api, DirectivoId(id))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

// ---- establecimientos ----

async fn http_listar_establecimientos(
    State(state): State<Arc<AppState>>,
) -> Respuesta<Vec<Establecimiento>> {
    server_api::listar_establecimientos(&state.api)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_crear_establecimiento(
    State(state): State<Arc<AppState>>,
    Json(datos): Json<NuevoEstablecimiento>,
) -> Respuesta<Establecimiento> {
    server_api::crear_establecimiento(&state.api, datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_actualizar_establecimiento(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(datos): Json<NuevoEstablecimiento>,
) -> Respuesta<Establecimiento> {
    server_api::actualizar_establecimiento(&state.api, EstablecimientoId(id), datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_eliminar_establecimiento(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> SinContenido {
    server_api::eliminar_establecimiento(&state.api, EstablecimientoId(id))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

// ---- niveles de práctica ----

async fn http_listar_niveles(
    State(state): State<Arc<AppState>>,
) -> Respuesta<Vec<NivelPractica>> {
    server_api::listar_niveles_practica(&state.api)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_crear_nivel(
    State(state): State<Arc<AppState>>,
    Json(datos): Json<NuevoNivelPractica>,
) -> Respuesta<NivelPractica> {
    server_api::crear_nivel_practica(&state.api, datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_eliminar_nivel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> SinContenido {
    server_api::eliminar_nivel_practica(&state.api, NivelPracticaId(id))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

// ---- estudiantes ----

async fn http_listar_estudiantes(
    State(state): State<Arc<AppState>>,
) -> Respuesta<Vec<Estudiante>> {
    server_api::listar_estudiantes(&state.api)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_crear_estudiante(
    State(state): State<Arc<AppState>>,
    Json(datos): Json<NuevoEstudiante>,
) -> Respuesta<Estudiante> {
    server_api::crear_estudiante(&state.api, datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_actualizar_estudiante(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(datos): Json<NuevoEstudiante>,
) -> Respuesta<Estudiante> {
    server_api::actualizar_estudiante(&state.api, EstudianteId(id), datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_eliminar_estudiante(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> SinContenido {
    server_api::eliminar_estudiante(&state.api, EstudianteId(id))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

// ---- cupos ----

async fn http_listar_cupos(
    State(state): State<Arc<AppState>>,
) -> Respuesta<Vec<Cupo>> {
    server_api::listar_cupos(&state.api)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_crear_cupo(
    State(state): State<Arc<AppState>>,
    Json(datos): Json<NuevoCupo>,
) -> Respuesta<Cupo> {
    server_api::crear_cupo(&state.api, datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_eliminar_cupo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> SinContenido {
    server_api::eliminar_cupo(&state.api, CupoId(id))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

// ---- fichas ----

async fn http_listar_fichas(
    State(state): State<Arc<AppState>>,
) -> Respuesta<Vec<Ficha>> {
    server_api::listar_fichas(&state.api)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_crear_ficha(
    State(state): State<Arc<AppState>>,
    Json(datos): Json<NuevaFicha>,
) -> Respuesta<Ficha> {
    server_api::crear_ficha(&state.api, datos)
        .await
        .map(Json)
        .map_err(reply_error)
}

// ---- correo y plantillas ----

async fn http_enviar_correo_establecimiento(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EnvioCorreoQuery>,
) -> Respuesta<EnvioCorreoResumen> {
    server_api::enviar_correo_establecimiento(&state.api, EstablecimientoId(q.establecimiento_id))
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_plantilla_estudiante(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    plantilla_como_html(&state, PlantillaDestinatario::Estudiante).await
}

async fn http_plantilla_establecimiento(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    plantilla_como_html(&state, PlantillaDestinatario::Establecimiento).await
}

async fn plantilla_como_html(
    state: &AppState,
    destinatario: PlantillaDestinatario,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let html = server_api::plantilla(&state.api, destinatario)
        .await
        .map_err(reply_error)?;
    Ok((
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    ))
}

async fn http_guardar_plantilla_estudiante(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PlantillaQuery>,
    body: Bytes,
) -> SinContenido {
    guardar_plantilla(&state, PlantillaDestinatario::Estudiante, q, &body).await
}

async fn http_guardar_plantilla_establecimiento(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PlantillaQuery>,
    body: Bytes,
) -> SinContenido {
    guardar_plantilla(&state, PlantillaDestinatario::Establecimiento, q, &body).await
}

/// The template body arrives query-string encoded, either in the URL
/// itself or as an urlencoded form body.
async fn guardar_plantilla(
    state: &AppState,
    destinatario: PlantillaDestinatario,
    q: PlantillaQuery,
    body: &[u8],
) -> SinContenido {
    let html = match q.html {
        Some(html) => html,
        None => html_de_formulario(body).ok_or_else(|| {
            reply_error(ApiError::validation("falta el parámetro 'html'"))
        })?,
    };
    server_api::guardar_plantilla(&state.api, destinatario, &html)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

fn html_de_formulario(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(clave, _)| clave == "html")
        .map(|(_, valor)| valor.into_owned())
}

// ---- carga masiva ----

async fn http_carga_masiva(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Respuesta<CargaMasivaResumen> {
    let mut archivo: Option<Bytes> = None;
    while let Some(field) = multipart.next_field().await.map_err(|error| {
        reply_error(ApiError::validation(format!(
            "carga multipart inválida: {error}"
        )))
    })? {
        if field.file_name().is_some() || field.name() == Some("file") {
            archivo = Some(field.bytes().await.map_err(|error| {
                reply_error(ApiError::validation(format!(
                    "no se pudo leer el archivo: {error}"
                )))
            })?);
            break;
        }
    }

    let archivo = archivo
        .ok_or_else(|| reply_error(ApiError::validation("falta el archivo CSV en la carga")))?;
    server_api::carga_masiva(&state.api, &archivo)
        .await
        .map(Json)
        .map_err(reply_error)
}

async fn http_vaciado_db(State(state): State<Arc<AppState>>) -> SinContenido {
    server_api::vaciar_base(&state.api)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(reply_error)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
