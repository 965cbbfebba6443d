use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(ComunaId);
id_newtype!(CarreraId);
id_newtype!(NivelPracticaId);
id_newtype!(EstablecimientoId);
id_newtype!(DirectivoId);
id_newtype!(TutorId);
id_newtype!(EstudianteId);
id_newtype!(CupoId);
id_newtype!(FichaId);

/// Dependency classification of a partner school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependencia {
    Municipal,
    ParticularSubvencionado,
    ParticularPagado,
    ServicioLocal,
}

impl Dependencia {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dependencia::Municipal => "municipal",
            Dependencia::ParticularSubvencionado => "particular_subvencionado",
            Dependencia::ParticularPagado => "particular_pagado",
            Dependencia::ServicioLocal => "servicio_local",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "municipal" => Some(Dependencia::Municipal),
            "particular_subvencionado" => Some(Dependencia::ParticularSubvencionado),
            "particular_pagado" => Some(Dependencia::ParticularPagado),
            "servicio_local" => Some(Dependencia::ServicioLocal),
            _ => None,
        }
    }
}

/// Audience of a stored notification template. The wire name for schools
/// keeps the historical misspelling ("stablishment") the routes use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantillaDestinatario {
    Estudiante,
    Establecimiento,
}

impl PlantillaDestinatario {
    pub fn clave(&self) -> &'static str {
        match self {
            PlantillaDestinatario::Estudiante => "student",
            PlantillaDestinatario::Establecimiento => "stablishment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comuna {
    pub id: ComunaId,
    pub nombre: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carrera {
    pub id: CarreraId,
    pub nombre: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NivelPractica {
    pub id: NivelPracticaId,
    pub nombre: String,
    pub carrera_id: CarreraId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Establecimiento {
    pub id: EstablecimientoId,
    pub rbd: String,
    pub nombre: String,
    pub dependencia: Dependencia,
    pub comuna_id: ComunaId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directivo {
    pub id: DirectivoId,
    pub nombre: String,
    pub email: String,
    pub cargo: String,
    pub establecimiento_id: EstablecimientoId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tutor {
    pub id: TutorId,
    pub nombre: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estudiante {
    pub id: EstudianteId,
    pub nombres: String,
    pub apellidos: String,
    pub email: String,
    pub carrera_id: CarreraId,
    pub periodo_ingreso: String,
}

impl Estudiante {
    pub fn nombre_completo(&self) -> String {
        format!("{} {}", self.nombres, self.apellidos)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cupo {
    pub id: CupoId,
    pub establecimiento_id: EstablecimientoId,
    pub nivel_practica_id: NivelPracticaId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ficha {
    pub id: FichaId,
    pub estudiante_id: EstudianteId,
    pub establecimiento_id: EstablecimientoId,
    pub cupo_id: CupoId,
    pub fecha_inicio: NaiveDate,
    pub fecha_termino: NaiveDate,
}
