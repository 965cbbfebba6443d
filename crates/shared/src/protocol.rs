use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    CarreraId, ComunaId, CupoId, Dependencia, EstablecimientoId, EstudianteId, NivelPracticaId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevaComuna {
    pub nombre: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevaCarrera {
    pub nombre: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoNivelPractica {
    pub nombre: String,
    pub carrera_id: CarreraId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoEstablecimiento {
    pub rbd: String,
    pub nombre: String,
    pub dependencia: Dependencia,
    pub comuna_id: ComunaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoDirectivo {
    pub nombre: String,
    pub email: String,
    pub cargo: String,
    pub establecimiento_id: EstablecimientoId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoTutor {
    pub nombre: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoEstudiante {
    pub nombres: String,
    pub apellidos: String,
    pub email: String,
    pub carrera_id: CarreraId,
    pub periodo_ingreso: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevoCupo {
    pub establecimiento_id: EstablecimientoId,
    pub nivel_practica_id: NivelPracticaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuevaFicha {
    pub estudiante_id: EstudianteId,
    pub establecimiento_id: EstablecimientoId,
    pub cupo_id: CupoId,
    pub fecha_inicio: NaiveDate,
    pub fecha_termino: NaiveDate,
}

/// Outcome of a bulk roster upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CargaMasivaResumen {
    pub insertados: u32,
    pub omitidos: u32,
}

/// Outcome of notifying a school: one mail per directivo on file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvioCorreoResumen {
    pub enviados: u32,
}
