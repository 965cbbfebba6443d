use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
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
    validacion::{self, resumen_errores, CampoInvalido},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::warn;
use url::Url;

pub mod flujo_adscripcion;

pub use flujo_adscripcion::{FlujoAdscripcion, FlujoError, Paso};

#[derive(Debug, Error)]
pub enum ClienteError {
    #[error("URL base inválida: {0}")]
    UrlInvalida(#[from] url::ParseError),
    #[error("{}", resumen_errores(.0))]
    Validacion(Vec<CampoInvalido>),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("fallo de transporte: {0}")]
    Transporte(#[from] reqwest::Error),
}

/// Fire-and-forget notifications for the UI toast area. Dropped silently
/// when nobody is subscribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notificacion {
    Exito(String),
    Error(String),
}

#[derive(Default)]
struct Cache {
    comunas: Vec<Comuna>,
    carreras: Vec<Carrera>,
    niveles: Vec<NivelPractica>,
    establecimientos: Vec<Establecimiento>,
    directivos: Vec<Directivo>,
    tutores: Vec<Tutor>,
    estudiantes: Vec<Estudiante>,
    cupos: Vec<Cupo>,
    fichas: Vec<Ficha>,
}

/// Case-insensitive substring match over a set of candidate fields. A blank
/// search term matches everything.
pub fn coincide_busqueda(campos: &[&str], termino: &str) -> bool {
    let termino = termino.trim().to_lowercase();
    if termino.is_empty() {
        return true;
    }
    campos
        .iter()
        .any(|campo| campo.to_lowercase().contains(&termino))
}

/// Typed client for the placement console API. Every screen talks to the
/// backend through this type; list results are cached so search filters can
/// run without a round trip. The cache is only touched after a request
/// succeeds, so a failed save leaves the last known state intact.
pub struct ConsoleClient {
    http: Client,
    base: String,
    notificaciones: broadcast::Sender<Notificacion>,
    cache: Mutex<Cache>,
}

impl ConsoleClient {
    pub fn new(base_url: &str) -> Result<Self, ClienteError> {
        let parsed = Url::parse(base_url)?;
        let (notificaciones, _) = broadcast::channel(64);
        Ok(Self {
            http: Client::new(),
            base: parsed.as_str().trim_end_matches('/').to_string(),
            notificaciones,
            cache: Mutex::new(Cache::default()),
        })
    }

    pub fn suscribirse(&self) -> broadcast::Receiver<Notificacion> {
        self.notificaciones.subscribe()
    }

    fn endpoint(&self, ruta: &str) -> String {
        format!("{}/api/v1/{ruta}", self.base)
    }

    fn notificar(&self, notificacion: Notificacion) {
        let _ = self.notificaciones.send(notificacion);
    }

    fn notificar_error(&self, mensaje: String) {
        warn!(%mensaje, "operación del cliente falló");
        self.notificar(Notificacion::Error(mensaje));
    }

    /// Client-side validation runs before any request leaves the process.
    fn validar(&self, errores: Vec<CampoInvalido>) -> Result<(), ClienteError> {
        if errores.is_empty() {
            return Ok(());
        }
        self.notificar_error(resumen_errores(&errores));
        Err(ClienteError::Validacion(errores))
    }

    fn transporte(&self, error: reqwest::Error) -> ClienteError {
        self.notificar_error(format!("fallo de transporte: {error}"));
        ClienteError::Transporte(error)
    }

    /// Non-2xx responses carry the `{ code, message }` envelope; anything
    /// that fails to decode as one becomes an opaque internal error.
    async fn error_de_respuesta(&self, respuesta: reqwest::Response) -> ClienteError {
        let status = respuesta.status();
        let envoltura = match respuesta.json::<ApiError>().await {
            Ok(envoltura) => envoltura,
            Err(_) => ApiError::internal(format!("respuesta HTTP {status} sin detalle")),
        };
        self.notificar_error(envoltura.message.clone());
        ClienteError::Api(envoltura)
    }

    async fn decodificar<T: DeserializeOwned>(
        &self,
        respuesta: reqwest::Response,
    ) -> Result<T, ClienteError> {
        if !respuesta.status().is_success() {
            return Err(self.error_de_respuesta(respuesta).await);
        }
        respuesta.json().await.map_err(|e| self.transporte(e))
    }

    async fn obtener_json<T: DeserializeOwned>(&self, ruta: &str) -> Result<T, ClienteError> {
        let respuesta = self
            .http
            .get(self.endpoint(ruta))
            .send()
            .await
            .map_err(|e| self.transporte(e))?;
        self.decodificar(respuesta).await
    }

    async fn enviar_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        metodo: Method,
        ruta: &str,
        cuerpo: &B,
    ) -> Result<T, ClienteError> {
        let respuesta = self
            .http
            .request(metodo, self.endpoint(ruta))
            .json(cuerpo)
            .send()
            .await
            .map_err(|e| self.transporte(e))?;
        self.decodificar(respuesta).await
    }

    async fn borrar(&self, ruta: &str) -> Result<(), ClienteError> {
        let respuesta = self
            .http
            .delete(self.endpoint(ruta))
            .send()
            .await
            .map_err(|e| self.transporte(e))?;
        if !respuesta.status().is_success() {
            return Err(self.error_de_respuesta(respuesta).await);
        }
        Ok(())
    }

    // ---- comunas ----

    pub async fn listar_comunas(&self) -> Result<Vec<Comuna>, ClienteError> {
        let comunas: Vec<Comuna> = self.obtener_json("comunas").await?;
        self.cache.lock().await.comunas = comunas.clone();
        Ok(comunas)
    }

    pub async fn crear_comuna(&self, datos: &NuevaComuna) -> Result<Comuna, ClienteError> {
        self.validar(validacion::validar_comuna(datos))?;
        let comuna: Comuna = self.enviar_json(Method::POST, "comunas", datos).await?;
        self.cache.lock().await.comunas.push(comuna.clone());
        self.notificar(Notificacion::Exito(format!(
            "Comuna \"{}\" guardada",
            comuna.nombre
        )));
        Ok(comuna)
    }

    pub async fn actualizar_comuna(
        &self,
        id: ComunaId,
        datos: &NuevaComuna,
    ) -> Result<Comuna, ClienteError> {
        self.validar(validacion::validar_comuna(datos))?;
        let comuna: Comuna = self
            .enviar_json(Method::PUT, &format!("comunas/{}", id.0), datos)
            .await?;
        let mut cache = self.cache.lock().await;
        if let Some(existente) = cache.comunas.iter_mut().find(|c| c.id == id) {
            *existente = comuna.clone();
        }
        Ok(comuna)
    }

    pub async fn eliminar_comuna(&self, id: ComunaId) -> Result<(), ClienteError> {
        self.borrar(&format!("comunas/{}", id.0)).await?;
        self.cache.lock().await.comunas.retain(|c| c.id != id);
        Ok(())
    }

    pub async fn filtrar_comunas(&self, termino: &str) -> Vec<Comuna> {
        self.cache
            .lock()
            .await
            .comunas
            .iter()
            .filter(|comuna| coincide_busqueda(&[&comuna.nombre], termino))
            .cloned()
            .collect()
    }

    // ---- carreras ----

    pub async fn listar_carreras(&self) -> Result<Vec<Carrera>, ClienteError> {
        let carreras: Vec<Carrera> = self.obtener_json("carreras").await?;
        self.cache.lock().await.carreras = carreras.clone();
        Ok(carreras)
    }

    pub async fn crear_carrera(&self, datos: &NuevaCarrera) -> Result<Carrera, ClienteError> {
        self.validar(validacion::validar_carrera(datos))?;
        let carrera: Carrera = self.enviar_json(Method::POST, "carreras", datos).await?;
        self.cache.lock().await.carreras.push(carrera.clone());
        Ok(carrera)
    }

    pub async fn actualizar_carrera(
        &self,
        id: CarreraId,
        datos: &NuevaCarrera,
    ) -> Result<Carrera, ClienteError> {
        self.validar(validacion::validar_carrera(datos))?;
        let carrera: Carrera = self
            .enviar_json(Method::PUT, &format!("carreras/{}", id.0), datos)
            .await?;
        let mut cache = self.cache.lock().await;
        if let Some(existente) = cache.carreras.iter_mut().find(|c| c.id == id) {
            *existente = carrera.clone();
        }
        Ok(carrera)
    }

    pub async fn eliminar_carrera(&self, id: CarreraId) -> Result<(), ClienteError> {
        self.borrar(&format!("carreras/{}", id.0)).await?;
        self.cache.lock().await.carreras.retain(|c| c.id != id);
        Ok(())
    }

    pub async fn filtrar_carreras(&self, termino: &str) -> Vec<Carrera> {
        self.cache
            .lock()
            .await
            .carreras
            .iter()
            .filter(|carrera| coincide_busqueda(&[&carrera.nombre], termino))
            .cloned()
            .collect()
    }

    // ---- niveles de práctica ----

    pub async fn listar_niveles_practica(&self) -> Result<Vec<NivelPractica>, ClienteError> {
        let niveles: Vec<NivelPractica> = self.obtener_json("nivelpractica").await?;
        self.cache.lock().await.niveles = niveles.clone();
        Ok(niveles)
    }

    pub async fn crear_nivel_practica(
        &self,
        datos: &NuevoNivelPractica,
    ) -> Result<NivelPractica, ClienteError> {
        self.validar(validacion::validar_nivel_practica(datos))?;
        let nivel: NivelPractica = self.enviar_json(Method::POST, "nivelpractica", datos).await?;
        self.cache.lock().await.niveles.push(nivel.clone());
        Ok(nivel)
    }

    pub async fn eliminar_nivel_practica(&self, id: NivelPracticaId) -> Result<(), ClienteError> {
        self.borrar(&format!("nivelpractica/{}", id.0)).await?;
        self.cache.lock().await.niveles.retain(|n| n.id != id);
        Ok(())
    }

    // ---- establecimientos ----

    pub async fn listar_establecimientos(&self) -> Result<Vec<Establecimiento>, ClienteError> {
        let establecimientos: Vec<Establecimiento> =
            self.obtener_json("establecimientos").await?;
        self.cache.lock().await.establecimientos = establecimientos.clone();
        Ok(establecimientos)
    }

    pub async fn crear_establecimiento(
        &self,
        datos: &NuevoEstablecimiento,
    ) -> Result<Establecimiento, ClienteError> {
        self.validar(validacion::validar_establecimiento(datos))?;
        let establecimiento: Establecimiento = self
            .enviar_json(Method::POST, "establecimientos", datos)
            .await?;
        self.cache
            .lock()
            .await
            .establecimientos
            .push(establecimiento.clone());
        self.notificar(Notificacion::Exito(format!(
            "Establecimiento \"{}\" guardado",
            establecimiento.nombre
        )));
        Ok(establecimiento)
    }

    pub async fn actualizar_establecimiento(
        &self,
        id: EstablecimientoId,
        datos: &NuevoEstablecimiento,
    ) -> Result<Establecimiento, ClienteError> {
        self.validar(validacion::validar_establecimiento(datos))?;
        let establecimiento: Establecimiento = self
            .enviar_json(Method::PUT, &format!("establecimientos/{}", id.0), datos)
            .await?;
        let mut cache = self.cache.lock().await;
        if let Some(existente) = cache.establecimientos.iter_mut().find(|e| e.id == id) {
            *existente = establecimiento.clone();
        }
        Ok(establecimiento)
    }

    pub async fn eliminar_establecimiento(
        &self,
        id: EstablecimientoId,
    ) -> Result<(), ClienteError> {
        self.borrar(&format!("establecimientos/{}", id.0)).await?;
        self.cache
            .lock()
            .await
            .establecimientos
            .retain(|e| e.id != id);
        Ok(())
    }

    pub async fn filtrar_establecimientos(&self, termino: &str) -> Vec<Establecimiento> {
        self.cache
            .lock()
            .await
            .establecimientos
            .iter()
            .filter(|establecimiento| {
                coincide_busqueda(
                    &[&establecimiento.nombre, &establecimiento.rbd],
                    termino,
                )
            })
            .cloned()
            .collect()
    }

    // ---- directivos ----

    pub async fn listar_directivos(&self) -> Result<Vec<Directivo>, ClienteError> {
        let directivos: Vec<Directivo> = self.obtener_json("directivos").await?;
        self.cache.lock().await.directivos = directivos.clone();
        Ok(directivos)
    }

    pub async fn crear_directivo(
        &self,
        datos: &NuevoDirectivo,
    ) -> Result<Directivo, ClienteError> {
        self.validar(validacion::validar_directivo(datos))?;
        let directivo: Directivo = self.enviar_json(Method::POST, "directivos", datos).await?;
        self.cache.lock().await.directivos.push(directivo.clone());
        Ok(directivo)
    }

    pub async fn actualizar_directivo(
        &self,
        id: DirectivoId,
        datos: &NuevoDirectivo,
    ) -> Result<Directivo, ClienteError> {
        self.validar(validacion::validar_directivo(datos))?;
        let directivo: Directivo = self
            .enviar_json(Method::PUT, &format!("directivos/{}", id.0), datos)
            .await?;
        let mut cache = self.cache.lock().await;
        if let Some(existente) = cache.directivos.iter_mut().find(|d| d.id == id) {
            *existente = directivo.clone();
        }
        Ok(directivo)
    }

    pub async fn eliminar_directivo(&self, id: DirectivoId) -> Result<(), ClienteError> {
        self.borrar(&format!("directivos/{}", id.0)).await?;
        self.cache.lock().await.directivos.retain(|d| d.id != id);
        Ok(())
    }

    /// Contacts of one school, served from the cached directivo list.
    pub async fn directivos_de_establecimiento(
        &self,
        establecimiento_id: EstablecimientoId,
    ) -> Vec<Directivo> {
        self.cache
            .lock()
            .await
            .directivos
            .iter()
            .filter(|directivo| directivo.establecimiento_id == establecimiento_id)
            .cloned()
            .collect()
    }

    // ---- tutores ----

    pub async fn listar_tutores(&self) -> Result<Vec<Tutor>, ClienteError> {
        let tutores: Vec<Tutor> = self.obtener_json("tutores").await?;
        self.cache.lock().await.tutores = tutores.clone();
        Ok(tutores)
    }

    pub async fn crear_tutor(&self, datos: &NuevoTutor) -> Result<Tutor, ClienteError> {
        self.validar(validacion::validar_tutor(datos))?;
        let tutor: Tutor = self.enviar_json(Method::POST, "tutores", datos).await?;
        self.cache.lock().await.tutores.push(tutor.clone());
        Ok(tutor)
    }

    pub async fn actualizar_tutor(
        &self,
        id: TutorId,
        datos: &NuevoTutor,
    ) -> Result<Tutor, ClienteError> {
        self.validar(validacion::validar_tutor(datos))?;
        let tutor: Tutor = self
            .enviar_json(Method::PUT, &format!("tutores/{}", id.0), datos)
            .await?;
        let mut cache = self.cache.lock().await;
        if let Some(existente) = cache.tutores.iter_mut().find(|t| t.id == id) {
            *existente = tutor.clone();
        }
        Ok(tutor)
    }

    pub async fn eliminar_tutor(&self, id: TutorId) -> Result<(), ClienteError> {
        self.borrar(&format!("tutores/{}", id.0)).await?;
        self.cache.lock().await.tutores.retain(|t| t.id != id);
        Ok(())
    }

    pub async fn filtrar_tutores(&self, termino: &str) -> Vec<Tutor> {
        self.cache
            .lock()
            .await
            .tutores
            .iter()
            .filter(|tutor| coincide_busqueda(&[&tutor.nombre, &tutor.email], termino))
            .cloned()
            .collect()
    }

    // ---- estudiantes ----

    pub async fn listar_estudiantes(&self) -> Result<Vec<Estudiante>, ClienteError> {
        let estudiantes: Vec<Estudiante> = self.obtener_json("estudiantes").await?;
        self.cache.lock().await.estudiantes = estudiantes.clone();
        Ok(estudiantes)
    }

    pub async fn crear_estudiante(
        &self,
        datos: &NuevoEstudiante,
    ) -> Result<Estudiante, ClienteError> {
        self.validar(validacion::validar_estudiante(datos))?;
        let estudiante: Estudiante = self.enviar_json(Method::POST, "estudiantes", datos).await?;
        self.cache.lock().await.estudiantes.push(estudiante.clone());
        Ok(estudiante)
    }

    pub async fn actualizar_estudiante(
        &self,
        id: EstudianteId,
        datos: &NuevoEstudiante,
    ) -> Result<Estudiante, ClienteError> {
        self.validar(validacion::validar_estudiante(datos))?;
        let estudiante: Estudiante = self
            .enviar_json(Method::PUT, &format!("estudiantes/{}", id.0), datos)
            .await?;
        let mut cache = self.cache.lock().await;
        if let Some(existente) = cache.estudiantes.iter_mut().find(|e| e.id == id) {
            *existente = estudiante.clone();
        }
        Ok(estudiante)
    }

    pub async fn eliminar_estudiante(&self, id: EstudianteId) -> Result<(), ClienteError> {
        self.borrar(&format!("estudiantes/{}", id.0)).await?;
        self.cache.lock().await.estudiantes.retain(|e| e.id != id);
        Ok(())
    }

    pub async fn filtrar_estudiantes(&self, termino: &str) -> Vec<Estudiante> {
        self.cache
            .lock()
            .await
            .estudiantes
            .iter()
            .filter(|estudiante| {
                coincide_busqueda(
                    &[&estudiante.nombre_completo(), &estudiante.email],
                    termino,
                )
            })
            .cloned()
            .collect()
    }

    /// Builds the adscripción wizard over the cached roster. Callers should
    /// refresh students and carreras first.
    pub async fn iniciar_flujo_adscripcion(&self) -> FlujoAdscripcion {
        let cache = self.cache.lock().await;
        FlujoAdscripcion::nuevo(cache.estudiantes.clone(), &cache.carreras)
    }

    // ---- cupos ----

    pub async fn listar_cupos(&self) -> Result<Vec<Cupo>, ClienteError> {
        let cupos: Vec<Cupo> = self.obtener_json("cupos").await?;
        self.cache.lock().await.cupos = cupos.clone();
        Ok(cupos)
    }

    pub async fn crear_cupo(&self, datos: &NuevoCupo) -> Result<Cupo, ClienteError> {
        self.validar(validacion::validar_cupo(datos))?;
        let cupo: Cupo = self.enviar_json(Method::POST, "cupos", datos).await?;
        self.cache.lock().await.cupos.push(cupo.clone());
        Ok(cupo)
    }

    pub async fn eliminar_cupo(&self, id: CupoId) -> Result<(), ClienteError> {
        self.borrar(&format!("cupos/{}", id.0)).await?;
        self.cache.lock().await.cupos.retain(|c| c.id != id);
        Ok(())
    }

    // ---- fichas ----

    pub async fn listar_fichas(&self) -> Result<Vec<Ficha>, ClienteError> {
        let fichas: Vec<Ficha> = self.obtener_json("fichas").await?;
        self.cache.lock().await.fichas = fichas.clone();
        Ok(fichas)
    }

    pub async fn crear_ficha(&self, datos: &NuevaFicha) -> Result<Ficha, ClienteError> {
        self.validar(validacion::validar_ficha(datos))?;
        let ficha: Ficha = self.enviar_json(Method::POST, "fichas", datos).await?;
        self.cache.lock().await.fichas.push(ficha.clone());
        Ok(ficha)
    }

    // ---- plantillas y correo ----

    pub async fn obtener_plantilla(
        &self,
        destinatario: PlantillaDestinatario,
    ) -> Result<String, ClienteError> {
        let ruta = format!("email/email-template/{}", destinatario.clave());
        let respuesta = self
            .http
            .get(self.endpoint(&ruta))
            .send()
            .await
            .map_err(|e| self.transporte(e))?;
        if !respuesta.status().is_success() {
            return Err(self.error_de_respuesta(respuesta).await);
        }
        respuesta.text().await.map_err(|e| self.transporte(e))
    }

    pub async fn guardar_plantilla(
        &self,
        destinatario: PlantillaDestinatario,
        html: &str,
    ) -> Result<(), ClienteError> {
        let ruta = format!("email/email-template/{}", destinatario.clave());
        let respuesta = self
            .http
            .post(self.endpoint(&ruta))
            .query(&[("html", html)])
            .send()
            .await
            .map_err(|e| self.transporte(e))?;
        if !respuesta.status().is_success() {
            return Err(self.error_de_respuesta(respuesta).await);
        }
        self.notificar(Notificacion::Exito("Plantilla guardada".to_string()));
        Ok(())
    }

    /// Asks the backend to mail every directivo of the given school.
    pub async fn enviar_correo_establecimiento(
        &self,
        establecimiento_id: EstablecimientoId,
    ) -> Result<EnvioCorreoResumen, ClienteError> {
        let respuesta = self
            .http
            .post(self.endpoint("email/send-email/stablishment"))
            .query(&[("establecimiento_id", establecimiento_id.0)])
            .send()
            .await
            .map_err(|e| self.transporte(e))?;
        let resumen: EnvioCorreoResumen = self.decodificar(respuesta).await?;
        self.notificar(Notificacion::Exito(format!(
            "Se enviaron {} correos",
            resumen.enviados
        )));
        Ok(resumen)
    }

    // ---- carga masiva ----

    pub async fn carga_masiva(
        &self,
        nombre_archivo: &str,
        contenido: Vec<u8>,
    ) -> Result<CargaMasivaResumen, ClienteError> {
        let parte = reqwest::multipart::Part::bytes(contenido)
            .file_name(nombre_archivo.to_string())
            .mime_str("text/csv")
            .map_err(|e| self.transporte(e))?;
        let formulario = reqwest::multipart::Form::new().part("file", parte);
        let respuesta = self
            .http
            .post(self.endpoint("carga_masiva/"))
            .multipart(formulario)
            .send()
            .await
            .map_err(|e| self.transporte(e))?;
        let resumen: CargaMasivaResumen = self.decodificar(respuesta).await?;
        self.notificar(Notificacion::Exito(format!(
            "Carga masiva: {} insertados, {} omitidos",
            resumen.insertados, resumen.omitidos
        )));
        Ok(resumen)
    }

    /// Wipes every roster table on the backend and drops the local caches.
    pub async fn vaciado_db(&self) -> Result<(), ClienteError> {
        self.borrar("carga_masiva/vaciadoDB").await?;
        *self.cache.lock().await = Cache::default();
        self.notificar(Notificacion::Exito("Base de datos vaciada".to_string()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
