use std::collections::HashMap;

use shared::{
    carta,
    domain::{Carrera, CarreraId, Directivo, Establecimiento, Estudiante, EstudianteId},
};
use thiserror::Error;

/// Steps of the adscripción flow, in order. Forward-only: once a step is
/// unlocked it stays unlocked, and unlocking step two freezes the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Paso {
    SeleccionEstudiantes,
    NotificacionEstablecimiento,
    NotificacionEstudiantes,
}

impl Paso {
    fn siguiente(&self) -> Option<Paso> {
        match self {
            Paso::SeleccionEstudiantes => Some(Paso::NotificacionEstablecimiento),
            Paso::NotificacionEstablecimiento => Some(Paso::NotificacionEstudiantes),
            Paso::NotificacionEstudiantes => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlujoError {
    #[error("la selección de estudiantes quedó bloqueada al avanzar")]
    SeleccionBloqueada,
    #[error("el estudiante no pertenece a este flujo")]
    EstudianteDesconocido,
    #[error("el paso actual no permite avanzar todavía")]
    AvanceNoPermitido,
}

/// State machine for the three-step placement flow. The roster partitions a
/// fixed universe of students into `disponibles` and `seleccionados`; both
/// lists preserve move order (a student returns to the end of the available
/// list, not to its original position).
pub struct FlujoAdscripcion {
    disponibles: Vec<Estudiante>,
    seleccionados: Vec<Estudiante>,
    carreras: HashMap<CarreraId, String>,
    paso_actual: Paso,
    desbloqueados: Vec<Paso>,
    establecimiento: Option<Establecimiento>,
    directivo: Option<Directivo>,
}

impl FlujoAdscripcion {
    pub fn nuevo(universo: Vec<Estudiante>, carreras: &[Carrera]) -> Self {
        Self {
            disponibles: universo,
            seleccionados: Vec::new(),
            carreras: carreras
                .iter()
                .map(|carrera| (carrera.id, carrera.nombre.clone()))
                .collect(),
            paso_actual: Paso::SeleccionEstudiantes,
            desbloqueados: vec![Paso::SeleccionEstudiantes],
            establecimiento: None,
            directivo: None,
        }
    }

    pub fn paso_actual(&self) -> Paso {
        self.paso_actual
    }

    pub fn desbloqueados(&self) -> &[Paso] {
        &self.desbloqueados
    }

    pub fn disponibles(&self) -> &[Estudiante] {
        &self.disponibles
    }

    pub fn seleccionados(&self) -> &[Estudiante] {
        &self.seleccionados
    }

    pub fn establecimiento(&self) -> Option<&Establecimiento> {
        self.establecimiento.as_ref()
    }

    pub fn directivo(&self) -> Option<&Directivo> {
        self.directivo.as_ref()
    }

    /// The roster freezes once the second step has been unlocked.
    pub fn seleccion_bloqueada(&self) -> bool {
        self.desbloqueados
            .contains(&Paso::NotificacionEstablecimiento)
    }

    /// Moves a student from disponibles to the end of seleccionados.
    pub fn agregar(&mut self, id: EstudianteId) -> Result<(), FlujoError> {
        if self.seleccion_bloqueada() {
            return Err(FlujoError::SeleccionBloqueada);
        }
        let posicion = self
            .disponibles
            .iter()
            .position(|estudiante| estudiante.id == id)
            .ok_or(FlujoError::EstudianteDesconocido)?;
        let estudiante = self.disponibles.remove(posicion);
        self.seleccionados.push(estudiante);
        Ok(())
    }

    /// Moves a student back to the end of disponibles.
    pub fn quitar(&mut self, id: EstudianteId) -> Result<(), FlujoError> {
        if self.seleccion_bloqueada() {
            return Err(FlujoError::SeleccionBloqueada);
        }
        let posicion = self
            .seleccionados
            .iter()
            .position(|estudiante| estudiante.id == id)
            .ok_or(FlujoError::EstudianteDesconocido)?;
        let estudiante = self.seleccionados.remove(posicion);
        self.disponibles.push(estudiante);
        Ok(())
    }

    /// Case-insensitive substring filter over name, email and carrera name,
    /// applied only to the available side.
    pub fn filtrar_disponibles(&self, termino: &str) -> Vec<&Estudiante> {
        self.disponibles
            .iter()
            .filter(|estudiante| {
                let carrera = self
                    .carreras
                    .get(&estudiante.carrera_id)
                    .map(String::as_str)
                    .unwrap_or("");
                crate::coincide_busqueda(
                    &[
                        &estudiante.nombre_completo(),
                        &estudiante.email,
                        carrera,
                    ],
                    termino,
                )
            })
            .collect()
    }

    pub fn elegir_establecimiento(&mut self, establecimiento: Option<Establecimiento>) {
        self.establecimiento = establecimiento;
        // changing school invalidates the previously chosen contact
        self.directivo = None;
    }

    pub fn elegir_directivo(&mut self, directivo: Option<Directivo>) {
        self.directivo = directivo;
    }

    /// Preview of the notification letter for the current selection.
    pub fn vista_previa_carta(&self) -> String {
        carta::carta_establecimiento(self.establecimiento.as_ref(), self.directivo.as_ref())
    }

    pub fn puede_avanzar(&self) -> bool {
        match self.paso_actual {
            Paso::SeleccionEstudiantes => !self.seleccionados.is_empty(),
            Paso::NotificacionEstablecimiento => self.establecimiento.is_some(),
            Paso::NotificacionEstudiantes => false,
        }
    }

    /// Explicit advance: unlocks and enters the next step only if the
    /// current step's validity predicate holds right now.
    pub fn avanzar(&mut self) -> Result<Paso, FlujoError> {
        if !self.puede_avanzar() {
            return Err(FlujoError::AvanceNoPermitido);
        }
        let siguiente = self
            .paso_actual
            .siguiente()
            .ok_or(FlujoError::AvanceNoPermitido)?;
        if !self.desbloqueados.contains(&siguiente) {
            self.desbloqueados.push(siguiente);
        }
        self.paso_actual = siguiente;
        Ok(siguiente)
    }

    /// Tab navigation: jumps only to already-unlocked steps. A click on a
    /// locked step leaves the current step untouched.
    pub fn ir_a(&mut self, paso: Paso) -> bool {
        if !self.desbloqueados.contains(&paso) {
            return false;
        }
        self.paso_actual = paso;
        true
    }
}

#[cfg(test)]
#[path = "tests/flujo_adscripcion_tests.rs"]
mod tests;
