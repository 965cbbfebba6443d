use serde::{Deserialize, Serialize};

use crate::protocol::{
    NuevaCarrera, NuevaComuna, NuevaFicha, NuevoCupo, NuevoDirectivo, NuevoEstablecimiento,
    NuevoEstudiante, NuevoNivelPractica, NuevoTutor,
};

/// One field-level validation failure, reported before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampoInvalido {
    pub campo: &'static str,
    pub motivo: String,
}

impl CampoInvalido {
    fn nuevo(campo: &'static str, motivo: impl Into<String>) -> Self {
        Self {
            campo,
            motivo: motivo.into(),
        }
    }
}

const LARGO_MINIMO_NOMBRE: usize = 2;

fn exigir_nombre(errores: &mut Vec<CampoInvalido>, campo: &'static str, valor: &str) {
    let valor = valor.trim();
    if valor.is_empty() {
        errores.push(CampoInvalido::nuevo(campo, "es obligatorio"));
    } else if valor.chars().count() < LARGO_MINIMO_NOMBRE {
        errores.push(CampoInvalido::nuevo(
            campo,
            format!("debe tener al menos {LARGO_MINIMO_NOMBRE} caracteres"),
        ));
    }
}

fn exigir_no_vacio(errores: &mut Vec<CampoInvalido>, campo: &'static str, valor: &str) {
    if valor.trim().is_empty() {
        errores.push(CampoInvalido::nuevo(campo, "es obligatorio"));
    }
}

fn exigir_email(errores: &mut Vec<CampoInvalido>, campo: &'static str, valor: &str) {
    if !email_parece_valido(valor) {
        errores.push(CampoInvalido::nuevo(campo, "no es un correo válido"));
    }
}

/// Rudimentary shape check, mirrored client- and server-side. Authoritative
/// validation belongs to the mail transport at send time.
pub fn email_parece_valido(valor: &str) -> bool {
    let valor = valor.trim();
    let Some((local, dominio)) = valor.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !dominio.is_empty()
        && dominio.contains('.')
        && !dominio.starts_with('.')
        && !dominio.ends_with('.')
        && !valor.contains(char::is_whitespace)
}

pub fn validar_comuna(datos: &NuevaComuna) -> Vec<CampoInvalido> {
    let mut errores = Vec::new();
    exigir_nombre(&mut errores, "nombre", &datos.nombre);
    errores
}

pub fn validar_carrera(datos: &NuevaCarrera) -> Vec<CampoInvalido> {
    let mut errores = Vec::new();
    exigir_nombre(&mut errores, "nombre", &datos.nombre);
    errores
}

pub fn validar_nivel_practica(datos: &NuevoNivelPractica) -> Vec<CampoInvalido> {
    let mut errores = Vec::new();
    exigir_nombre(&mut errores, "nombre", &datos.nombre);
    errores
}

pub fn validar_establecimiento(datos: &NuevoEstablecimiento) -> Vec<CampoInvalido> {
    let mut errores = Vec::new();
    exigir_no_vacio(&mut errores, "rbd", &datos.rbd);
    exigir_nombre(&mut errores, "nombre", &datos.nombre);
    errores
}

pub fn validar_directivo(datos: &NuevoDirectivo) -> Vec<CampoInvalido> {
    let mut errores = Vec::new();
    exigir_nombre(&mut errores, "nombre", &datos.nombre);
    exigir_email(&mut errores, "email", &datos.email);
    exigir_no_vacio(&mut errores, "cargo", &datos.cargo);
    errores
}

pub fn validar_tutor(datos: &NuevoTutor) -> Vec<CampoInvalido> {
    let mut errores = Vec::new();
    exigir_nombre(&mut errores, "nombre", &datos.nombre);
    exigir_email(&mut errores, "email", &datos.email);
    errores
}

pub fn validar_estudiante(datos: &NuevoEstudiante) -> Vec<CampoInvalido> {
    let mut errores = Vec::new();
    exigir_nombre(&mut errores, "nombres", &datos.nombres);
    exigir_nombre(&mut errores, "apellidos", &datos.apellidos);
    exigir_email(&mut errores, "email", &datos.email);
    exigir_no_vacio(&mut errores, "periodo_ingreso", &datos.periodo_ingreso);
    errores
}

pub fn validar_cupo(_datos: &NuevoCupo) -> Vec<CampoInvalido> {
    Vec::new()
}

pub fn validar_ficha(datos: &NuevaFicha) -> Vec<CampoInvalido> {
    let mut errores = Vec::new();
    if datos.fecha_termino < datos.fecha_inicio {
        errores.push(CampoInvalido::nuevo(
            "fecha_termino",
            "no puede ser anterior a la fecha de inicio",
        ));
    }
    errores
}

/// Collapse field errors into the one-line message the error envelope carries.
pub fn resumen_errores(errores: &[CampoInvalido]) -> String {
    errores
        .iter()
        .map(|error| format!("{}: {}", error.campo, error.motivo))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CarreraId;

    #[test]
    fn accepts_plausible_emails_and_rejects_malformed_ones() {
        assert!(email_parece_valido("ana.rojas@uni.cl"));
        assert!(!email_parece_valido("ana.rojas"));
        assert!(!email_parece_valido("@uni.cl"));
        assert!(!email_parece_valido("ana@uni"));
        assert!(!email_parece_valido("ana rojas@uni.cl"));
    }

    #[test]
    fn student_validation_reports_each_bad_field() {
        let errores = validar_estudiante(&NuevoEstudiante {
            nombres: "".into(),
            apellidos: "P".into(),
            email: "sin-arroba".into(),
            carrera_id: CarreraId(1),
            periodo_ingreso: " ".into(),
        });
        let campos: Vec<_> = errores.iter().map(|e| e.campo).collect();
        assert_eq!(
            campos,
            vec!["nombres", "apellidos", "email", "periodo_ingreso"]
        );
    }

    #[test]
    fn valid_student_passes_clean() {
        let errores = validar_estudiante(&NuevoEstudiante {
            nombres: "Ana".into(),
            apellidos: "Rojas".into(),
            email: "ana.rojas@uni.cl".into(),
            carrera_id: CarreraId(1),
            periodo_ingreso: "2026-1".into(),
        });
        assert!(errores.is_empty());
    }

    #[test]
    fn ficha_rejects_inverted_date_range() {
        use crate::domain::{CupoId, EstablecimientoId, EstudianteId};
        use chrono::NaiveDate;

        let errores = validar_ficha(&NuevaFicha {
            estudiante_id: EstudianteId(1),
            establecimiento_id: EstablecimientoId(1),
            cupo_id: CupoId(1),
            fecha_inicio: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            fecha_termino: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        });
        assert_eq!(errores[0].campo, "fecha_termino");
    }
}
