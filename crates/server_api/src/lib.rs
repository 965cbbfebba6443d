use std::sync::Arc;

use correo::Mailer;
use serde::Deserialize;
use shared::{
    carta::{PLANTILLA_ESTABLECIMIENTO_DEFECTO, PLANTILLA_ESTUDIANTE_DEFECTO},
    domain::{
        Carrera, CarreraId, Comuna, ComunaId, Cupo, CupoId, Directivo, DirectivoId,
        Establecimiento, EstablecimientoId, Estudiante, EstudianteId, Ficha, NivelPractica,
        NivelPracticaId, PlantillaDestinatario, Tutor, TutorId,
    },
    error::ApiError,
    protocol::{
        CargaMasivaResumen, EnvioCorreoResumen, NuevaCarrera, NuevaComuna, NuevaFicha, NuevoCupo,
        NuevoDirectivo, NuevoEstablecimiento, NuevoEstudiante, NuevoNivelPractica, NuevoTutor,
    },
    validacion::{
        resumen_errores, validar_carrera, validar_comuna, validar_directivo,
        validar_establecimiento, validar_estudiante, validar_ficha, validar_nivel_practica,
        validar_tutor, CampoInvalido,
    },
};
use storage::Storage;
use tracing::info;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub mailer: Arc<dyn Mailer>,
}

// ---- comunas ----

pub async fn listar_comunas(ctx: &ApiContext) -> Result<Vec<Comuna>, ApiError> {
    ctx.storage.listar_comunas().await.map_err(internal)
}

pub async fn crear_comuna(ctx: &ApiContext, datos: NuevaComuna) -> Result<Comuna, ApiError> {
    rechazar_invalidos(validar_comuna(&datos))?;
    ctx.storage.crear_comuna(&datos).await.map_err(internal)
}

pub async fn actualizar_comuna(
    ctx: &ApiContext,
    id: ComunaId,
    datos: NuevaComuna,
) -> Result<Comuna, ApiError> {
    rechazar_invalidos(validar_comuna(&datos))?;
    ctx.storage
        .actualizar_comuna(id, &datos)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("comuna no encontrada"))
}

pub async fn eliminar_comuna(ctx: &ApiContext, id: ComunaId) -> Result<(), ApiError> {
    if ctx.storage.comuna_en_uso(id).await.map_err(internal)? {
        return Err(ApiError::validation(
            "la comuna tiene establecimientos asociados",
        ));
    }
    if !ctx.storage.eliminar_comuna(id).await.map_err(internal)? {
        return Err(ApiError::not_found("comuna no encontrada"));
    }
    Ok(())
}

// ---- carreras ----

pub async fn listar_carreras(ctx: &ApiContext) -> Result<Vec<Carrera>, ApiError> {
    ctx.storage.listar_carreras().await.map_err(internal)
}

pub async fn crear_carrera(ctx: &ApiContext, datos: NuevaCarrera) -> Result<Carrera, ApiError> {
    rechazar_invalidos(validar_carrera(&datos))?;
    ctx.storage.crear_carrera(&datos).await.map_err(internal)
}

pub async fn actualizar_carrera(
    ctx: &ApiContext,
    id: CarreraId,
    datos: NuevaCarrera,
) -> Result<Carrera, ApiError> {
    rechazar_invalidos(validar_carrera(&datos))?;
    ctx.storage
        .actualizar_carrera(id, &datos)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("carrera no encontrada"))
}

pub async fn eliminar_carrera(ctx: &ApiContext, id: CarreraId) -> Result<(), ApiError> {
    if ctx.storage.carrera_en_uso(id).await.map_err(internal)? {
        return Err(ApiError::validation(
            "la carrera tiene estudiantes o niveles de práctica asociados",
        ));
    }
    if !ctx.storage.eliminar_carrera(id).await.map_err(internal)? {
        return Err(ApiError::not_found("carrera no encontrada"));
    }
    Ok(())
}

// ---- niveles de práctica ----

pub async fn listar_niveles_practica(ctx: &ApiContext) -> Result<Vec<NivelPractica>, ApiError> {
    ctx.storage.listar_niveles_practica().await.map_err(internal)
}

pub async fn crear_nivel_practica(
    ctx: &ApiContext,
    datos: NuevoNivelPractica,
) -> Result<NivelPractica, ApiError> {
    rechazar_invalidos(validar_nivel_practica(&datos))?;
    if !ctx
        .storage
        .existe_carrera(datos.carrera_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("la carrera indicada no existe"));
    }
    ctx.storage
        .crear_nivel_practica(&datos)
        .await
        .map_err(internal)
}

pub async fn eliminar_nivel_practica(
    ctx: &ApiContext,
    id: NivelPracticaId,
) -> Result<(), ApiError> {
    if ctx
        .storage
        .nivel_practica_en_uso(id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("el nivel tiene cupos asociados"));
    }
    if !ctx
        .storage
        .eliminar_nivel_practica(id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::not_found("nivel de práctica no encontrado"));
    }
    Ok(())
}

// ---- establecimientos ----

pub async fn listar_establecimientos(ctx: &ApiContext) -> Result<Vec<Establecimiento>, ApiError> {
    ctx.storage.listar_establecimientos().await.map_err(internal)
}

pub async fn crear_establecimiento(
    ctx: &ApiContext,
    datos: NuevoEstablecimiento,
) -> Result<Establecimiento, ApiError> {
    rechazar_invalidos(validar_establecimiento(&datos))?;
    if !ctx
        .storage
        .existe_comuna(datos.comuna_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("la comuna indicada no existe"));
    }
    ctx.storage
        .crear_establecimiento(&datos)
        .await
        .map_err(internal)
}

pub async fn actualizar_establecimiento(
    ctx: &ApiContext,
    id: EstablecimientoId,
    datos: NuevoEstablecimiento,
) -> Result<Establecimiento, ApiError> {
    rechazar_invalidos(validar_establecimiento(&datos))?;
    if !ctx
        .storage
        .existe_comuna(datos.comuna_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("la comuna indicada no existe"));
    }
    ctx.storage
        .actualizar_establecimiento(id, &datos)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("establecimiento no encontrado"))
}

pub async fn eliminar_establecimiento(
    ctx: &ApiContext,
    id: EstablecimientoId,
) -> Result<(), ApiError> {
    if !ctx
        .storage
        .eliminar_establecimiento(id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::not_found("establecimiento no encontrado"));
    }
    Ok(())
}

// ---- directivos ----

pub async fn listar_directivos(ctx: &ApiContext) -> Result<Vec<Directivo>, ApiError> {
    ctx.storage.listar_directivos().await.map_err(internal)
}

pub async fn crear_directivo(
    ctx: &ApiContext,
    datos: NuevoDirectivo,
) -> Result<Directivo, ApiError> {
    rechazar_invalidos(validar_directivo(&datos))?;
    if !ctx
        .storage
        .existe_establecimiento(datos.establecimiento_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("el establecimiento indicado no existe"));
    }
    ctx.storage.crear_directivo(&datos).await.map_err(internal)
}

pub async fn actualizar_directivo(
    ctx: &ApiContext,
    id: DirectivoId,
    datos: NuevoDirectivo,
) -> Result<Directivo, ApiError> {
    rechazar_invalidos(validar_directivo(&datos))?;
    if !ctx
        .storage
        .existe_establecimiento(datos.establecimiento_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("el establecimiento indicado no existe"));
    }
    ctx.storage
        .actualizar_directivo(id, &datos)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("directivo no encontrado"))
}

pub async fn eliminar_directivo(ctx: &ApiContext, id: DirectivoId) -> Result<(), ApiError> {
    if !ctx.storage.eliminar_directivo(id).await.map_err(internal)? {
        return Err(ApiError::not_found("directivo no encontrado"));
    }
    Ok(())
}

// ---- tutores ----

pub async fn listar_tutores(ctx: &ApiContext) -> Result<Vec<Tutor>, ApiError> {
    ctx.storage.listar_tutores().await.map_err(internal)
}

pub async fn crear_tutor(ctx: &ApiContext, datos: NuevoTutor) -> Result<Tutor, ApiError> {
    rechazar_invalidos(validar_tutor(&datos))?;
    ctx.storage.crear_tutor(&datos).await.map_err(internal)
}

pub async fn actualizar_tutor(
    ctx: &ApiContext,
    id: TutorId,
    datos: NuevoTutor,
) -> Result<Tutor, ApiError> {
    rechazar_invalidos(validar_tutor(&datos))?;
    ctx.storage
        .actualizar_tutor(id, &datos)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("tutor no encontrado"))
}

pub async fn eliminar_tutor(ctx: &ApiContext, id: TutorId) -> Result<(), ApiError> {
    if !ctx.storage.eliminar_tutor(id).await.map_err(internal)? {
        return Err(ApiError::not_found("tutor no encontrado"));
    }
    Ok(())
}

// ---- estudiantes ----

pub async fn listar_estudiantes(ctx: &ApiContext) -> Result<Vec<Estudiante>, ApiError> {
    ctx.storage.listar_estudiantes().await.map_err(internal)
}

pub async fn crear_estudiante(
    ctx: &ApiContext,
    datos: NuevoEstudiante,
) -> Result<Estudiante, ApiError> {
    rechazar_invalidos(validar_estudiante(&datos))?;
    if !ctx
        .storage
        .existe_carrera(datos.carrera_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("la carrera indicada no existe"));
    }
    ctx.storage.crear_estudiante(&datos).await.map_err(internal)
}

pub async fn actualizar_estudiante(
    ctx: &ApiContext,
    id: EstudianteId,
    datos: NuevoEstudiante,
) -> Result<Estudiante, ApiError> {
    rechazar_invalidos(validar_estudiante(&datos))?;
    if !ctx
        .storage
        .existe_carrera(datos.carrera_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("la carrera indicada no existe"));
    }
    ctx.storage
        .actualizar_estudiante(id, &datos)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("estudiante no encontrado"))
}

pub async fn eliminar_estudiante(ctx: &ApiContext, id: EstudianteId) -> Result<(), ApiError> {
    if !ctx
        .storage
        .eliminar_estudiante(id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::not_found("estudiante no encontrado"));
    }
    Ok(())
}

// ---- cupos ----

pub async fn listar_cupos(ctx: &ApiContext) -> Result<Vec<Cupo>, ApiError> {
    ctx.storage.listar_cupos().await.map_err(internal)
}

pub async fn crear_cupo(ctx: &ApiContext, datos: NuevoCupo) -> Result<Cupo, ApiError> {
    if !ctx
        .storage
        .existe_establecimiento(datos.establecimiento_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("el establecimiento indicado no existe"));
    }
    if !ctx
        .storage
        .existe_nivel_practica(datos.nivel_practica_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("el nivel de práctica indicado no existe"));
    }
    ctx.storage.crear_cupo(&datos).await.map_err(internal)
}

pub async fn eliminar_cupo(ctx: &ApiContext, id: CupoId) -> Result<(), ApiError> {
    if !ctx.storage.eliminar_cupo(id).await.map_err(internal)? {
        return Err(ApiError::not_found("cupo no encontrado"));
    }
    Ok(())
}

// ---- fichas ----

pub async fn listar_fichas(ctx: &ApiContext) -> Result<Vec<Ficha>, ApiError> {
    ctx.storage.listar_fichas().await.map_err(internal)
}

pub async fn crear_ficha(ctx: &ApiContext, datos: NuevaFicha) -> Result<Ficha, ApiError> {
    rechazar_invalidos(validar_ficha(&datos))?;
    if !ctx
        .storage
        .existe_estudiante(datos.estudiante_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("el estudiante indicado no existe"));
    }
    if !ctx
        .storage
        .existe_establecimiento(datos.establecimiento_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("el establecimiento indicado no existe"));
    }
    if !ctx.storage.existe_cupo(datos.cupo_id).await.map_err(internal)? {
        return Err(ApiError::validation("el cupo indicado no existe"));
    }
    ctx.storage.crear_ficha(&datos).await.map_err(internal)
}

// ---- plantillas ----

/// Stored template for the audience, falling back to the built-in default
/// so a GET before any POST is still total.
pub async fn plantilla(
    ctx: &ApiContext,
    destinatario: PlantillaDestinatario,
) -> Result<String, ApiError> {
    let guardada = ctx.storage.plantilla(destinatario).await.map_err(internal)?;
    Ok(guardada.unwrap_or_else(|| plantilla_por_defecto(destinatario).to_string()))
}

pub async fn guardar_plantilla(
    ctx: &ApiContext,
    destinatario: PlantillaDestinatario,
    html: &str,
) -> Result<(), ApiError> {
    if html.trim().is_empty() {
        return Err(ApiError::validation("la plantilla no puede estar vacía"));
    }
    ctx.storage
        .guardar_plantilla(destinatario, html)
        .await
        .map_err(internal)
}

pub fn plantilla_por_defecto(destinatario: PlantillaDestinatario) -> &'static str {
    match destinatario {
        PlantillaDestinatario::Estudiante => PLANTILLA_ESTUDIANTE_DEFECTO,
        PlantillaDestinatario::Establecimiento => PLANTILLA_ESTABLECIMIENTO_DEFECTO,
    }
}

// ---- notificación por correo ----

/// Renders the establishment template once per directivo of the school and
/// hands each message to the mailer.
pub async fn enviar_correo_establecimiento(
    ctx: &ApiContext,
    establecimiento_id: EstablecimientoId,
) -> Result<EnvioCorreoResumen, ApiError> {
    let establecimiento = ctx
        .storage
        .obtener_establecimiento(establecimiento_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("establecimiento no encontrado"))?;

    let directivos = ctx
        .storage
        .listar_directivos_de_establecimiento(establecimiento_id)
        .await
        .map_err(internal)?;
    if directivos.is_empty() {
        return Err(ApiError::validation(
            "el establecimiento no tiene directivos registrados",
        ));
    }

    let plantilla = plantilla(ctx, PlantillaDestinatario::Establecimiento).await?;
    let asunto = format!(
        "Adscripción de estudiantes en práctica: {}",
        establecimiento.nombre
    );

    let mut enviados = 0u32;
    for directivo in &directivos {
        let cuerpo = rendir_carta(&plantilla, &establecimiento, directivo)?;
        ctx.mailer
            .enviar(&directivo.email, &asunto, &cuerpo)
            .await
            .map_err(internal)?;
        enviados += 1;
    }
    info!(
        establecimiento_id = establecimiento.id.0,
        enviados, "notificación de adscripción enviada"
    );
    Ok(EnvioCorreoResumen { enviados })
}

fn rendir_carta(
    plantilla: &str,
    establecimiento: &Establecimiento,
    directivo: &Directivo,
) -> Result<String, ApiError> {
    let mut contexto = tera::Context::new();
    contexto.insert("nombre", &directivo.nombre);
    contexto.insert("cargo", &directivo.cargo);
    contexto.insert("email", &directivo.email);
    contexto.insert("establecimiento", &establecimiento.nombre);
    contexto.insert("rbd", &establecimiento.rbd);
    contexto.insert("dependencia", establecimiento.dependencia.as_str());
    tera::Tera::one_off(plantilla, &contexto, false)
        .map_err(|error| ApiError::validation(format!("plantilla inválida: {error}")))
}

// ---- carga masiva ----

#[derive(Debug, Deserialize)]
struct FilaCarga {
    nombres: String,
    apellidos: String,
    email: String,
    carrera: String,
    periodo_ingreso: String,
}

/// Bulk roster import. Carreras are resolved by name and created on first
/// sight; rows with a blank email or a malformed shape are skipped and
/// counted instead of aborting the upload.
pub async fn carga_masiva(ctx: &ApiContext, csv_bytes: &[u8]) -> Result<CargaMasivaResumen, ApiError> {
    let mut lector = csv::Reader::from_reader(csv_bytes);
    let mut insertados = 0u32;
    let mut omitidos = 0u32;

    for fila in lector.deserialize::<FilaCarga>() {
        let Ok(fila) = fila else {
            omitidos += 1;
            continue;
        };
        let nombres = fila.nombres.trim();
        let apellidos = fila.apellidos.trim();
        let email = fila.email.trim();
        let carrera_nombre = fila.carrera.trim();
        let periodo = fila.periodo_ingreso.trim();
        if nombres.is_empty()
            || apellidos.is_empty()
            || email.is_empty()
            || carrera_nombre.is_empty()
            || periodo.is_empty()
        {
            omitidos += 1;
            continue;
        }

        let carrera = match ctx
            .storage
            .carrera_por_nombre(carrera_nombre)
            .await
            .map_err(internal)?
        {
            Some(carrera) => carrera,
            None => ctx
                .storage
                .crear_carrera(&NuevaCarrera {
                    nombre: carrera_nombre.to_string(),
                })
                .await
                .map_err(internal)?,
        };

        ctx.storage
            .crear_estudiante(&NuevoEstudiante {
                nombres: nombres.to_string(),
                apellidos: apellidos.to_string(),
                email: email.to_string(),
                carrera_id: carrera.id,
                periodo_ingreso: periodo.to_string(),
            })
            .await
            .map_err(internal)?;
        insertados += 1;
    }

    info!(insertados, omitidos, "carga masiva procesada");
    Ok(CargaMasivaResumen {
        insertados,
        omitidos,
    })
}

pub async fn vaciar_base(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.storage.vaciar_base().await.map_err(internal)
}

fn rechazar_invalidos(errores: Vec<CampoInvalido>) -> Result<(), ApiError> {
    if errores.is_empty() {
        return Ok(());
    }
    Err(ApiError::validation(resumen_errores(&errores)))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
