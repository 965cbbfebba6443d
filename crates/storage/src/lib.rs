use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{
        Carrera, CarreraId, Comuna, ComunaId, Cupo, CupoId, Dependencia, Directivo, DirectivoId,
        Establecimiento, EstablecimientoId, Estudiante, EstudianteId, Ficha, FichaId,
        NivelPractica, NivelPracticaId, PlantillaDestinatario, Tutor, TutorId,
    },
    protocol::{
        NuevaCarrera, NuevaComuna, NuevaFicha, NuevoCupo, NuevoDirectivo, NuevoEstablecimiento,
        NuevoEstudiante, NuevoNivelPractica, NuevoTutor,
    },
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    // ---- comunas ----

    pub async fn listar_comunas(&self) -> Result<Vec<Comuna>> {
        let rows = sqlx::query("SELECT id, nombre FROM comunas ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(comuna_de_fila).collect())
    }

    pub async fn crear_comuna(&self, datos: &NuevaComuna) -> Result<Comuna> {
        let rec = sqlx::query("INSERT INTO comunas (nombre) VALUES (?) RETURNING id")
            .bind(&datos.nombre)
            .fetch_one(&self.pool)
            .await?;
        Ok(Comuna {
            id: ComunaId(rec.get::<i64, _>(0)),
            nombre: datos.nombre.clone(),
        })
    }

    pub async fn actualizar_comuna(
        &self,
        id: ComunaId,
        datos: &NuevaComuna,
    ) -> Result<Option<Comuna>> {
        let result = sqlx::query("UPDATE comunas SET nombre = ? WHERE id = ?")
            .bind(&datos.nombre)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Comuna {
            id,
            nombre: datos.nombre.clone(),
        }))
    }

    pub async fn eliminar_comuna(&self, id: ComunaId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comunas WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn comuna_en_uso(&self, id: ComunaId) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM establecimientos WHERE comuna_id = ?")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn existe_comuna(&self, id: ComunaId) -> Result<bool> {
        let existe: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM comunas WHERE id = ?)")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(existe != 0)
    }

    // ---- carreras ----

    pub async fn listar_carreras(&self) -> Result<Vec<Carrera>> {
        let rows = sqlx::query("SELECT id, nombre FROM carreras ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(carrera_de_fila).collect())
    }

    pub async fn crear_carrera(&self, datos: &NuevaCarrera) -> Result<Carrera> {
        let rec = sqlx::query("INSERT INTO carreras (nombre) VALUES (?) RETURNING id")
            .bind(&datos.nombre)
            .fetch_one(&self.pool)
            .await?;
        Ok(Carrera {
            id: CarreraId(rec.get::<i64, _>(0)),
            nombre: datos.nombre.clone(),
        })
    }

    pub async fn actualizar_carrera(
        &self,
        id: CarreraId,
        datos: &NuevaCarrera,
    ) -> Result<Option<Carrera>> {
        let result = sqlx::query("UPDATE carreras SET nombre = ? WHERE id = ?")
            .bind(&datos.nombre)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Carrera {
            id,
            nombre: datos.nombre.clone(),
        }))
    }

    pub async fn eliminar_carrera(&self, id: CarreraId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM carreras WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn carrera_en_uso(&self, id: CarreraId) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM estudiantes WHERE carrera_id = ?)
                  + (SELECT COUNT(*) FROM niveles_practica WHERE carrera_id = ?)",
        )
        .bind(id.0)
        .bind(id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn existe_carrera(&self, id: CarreraId) -> Result<bool> {
        let existe: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM carreras WHERE id = ?)")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(existe != 0)
    }

    pub async fn carrera_por_nombre(&self, nombre: &str) -> Result<Option<Carrera>> {
        let row = sqlx::query("SELECT id, nombre FROM carreras WHERE nombre = ?")
            .bind(nombre)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(carrera_de_fila))
    }

    // ---- niveles de práctica ----

    pub async fn listar_niveles_practica(&self) -> Result<Vec<NivelPractica>> {
        let rows = sqlx::query("SELECT id, nombre, carrera_id FROM niveles_practica ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(nivel_de_fila).collect())
    }

    pub async fn crear_nivel_practica(&self, datos: &NuevoNivelPractica) -> Result<NivelPractica> {
        let rec = sqlx::query(
            "INSERT INTO niveles_practica (nombre, carrera_id) VALUES (?, ?) RETURNING id",
        )
        .bind(&datos.nombre)
        .bind(datos.carrera_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(NivelPractica {
            id: NivelPracticaId(rec.get::<i64, _>(0)),
            nombre: datos.nombre.clone(),
            carrera_id: datos.carrera_id,
        })
    }

    pub async fn eliminar_nivel_practica(&self, id: NivelPracticaId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM niveles_practica WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn nivel_practica_en_uso(&self, id: NivelPracticaId) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cupos WHERE nivel_practica_id = ?")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn existe_nivel_practica(&self, id: NivelPracticaId) -> Result<bool> {
        let existe: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM niveles_practica WHERE id = ?)")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(existe != 0)
    }

    // ---- establecimientos ----

    pub async fn listar_establecimientos(&self) -> Result<Vec<Establecimiento>> {
        let rows = sqlx::query(
            "SELECT id, rbd, nombre, dependencia, comuna_id FROM establecimientos ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(establecimiento_de_fila).collect()
    }

    pub async fn obtener_establecimiento(
        &self,
        id: EstablecimientoId,
    ) -> Result<Option<Establecimiento>> {
        let row = sqlx::query(
            "SELECT id, rbd, nombre, dependencia, comuna_id FROM establecimientos WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(establecimiento_de_fila).transpose()
    }

    pub async fn crear_establecimiento(
        &self,
        datos: &NuevoEstablecimiento,
    ) -> Result<Establecimiento> {
        let rec = sqlx::query(
            "INSERT INTO establecimientos (rbd, nombre, dependencia, comuna_id)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&datos.rbd)
        .bind(&datos.nombre)
        .bind(datos.dependencia.as_str())
        .bind(datos.comuna_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(Establecimiento {
            id: EstablecimientoId(rec.get::<i64, _>(0)),
            rbd: datos.rbd.clone(),
            nombre: datos.nombre.clone(),
            dependencia: datos.dependencia,
            comuna_id: datos.comuna_id,
        })
    }

    pub async fn actualizar_establecimiento(
        &self,
        id: EstablecimientoId,
        datos: &NuevoEstablecimiento,
    ) -> Result<Option<Establecimiento>> {
        let result = sqlx::query(
            "UPDATE establecimientos SET rbd = ?, nombre = ?, dependencia = ?, comuna_id = ?
             WHERE id = ?",
        )
        .bind(&datos.rbd)
        .bind(&datos.nombre)
        .bind(datos.dependencia.as_str())
        .bind(datos.comuna_id.0)
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Establecimiento {
            id,
            rbd: datos.rbd.clone(),
            nombre: datos.nombre.clone(),
            dependencia: datos.dependencia,
            comuna_id: datos.comuna_id,
        }))
    }

    /// Also removes the school's directivos, cupos and fichas through the
    /// schema's ON DELETE CASCADE rules.
    pub async fn eliminar_establecimiento(&self, id: EstablecimientoId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM establecimientos WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn existe_establecimiento(&self, id: EstablecimientoId) -> Result<bool> {
        let existe: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM establecimientos WHERE id = ?)")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(existe != 0)
    }

    // ---- directivos ----

    pub async fn listar_directivos(&self) -> Result<Vec<Directivo>> {
        let rows = sqlx::query(
            "SELECT id, nombre, email, cargo, establecimiento_id FROM directivos ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(directivo_de_fila).collect())
    }

    pub async fn listar_directivos_de_establecimiento(
        &self,
        establecimiento_id: EstablecimientoId,
    ) -> Result<Vec<Directivo>> {
        let rows = sqlx::query(
            "SELECT id, nombre, email, cargo, establecimiento_id FROM directivos
             WHERE establecimiento_id = ? ORDER BY id",
        )
        .bind(establecimiento_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(directivo_de_fila).collect())
    }

    pub async fn crear_directivo(&self, datos: &NuevoDirectivo) -> Result<Directivo> {
        let rec = sqlx::query(
            "INSERT INTO directivos (nombre, email, cargo, establecimiento_id)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&datos.nombre)
        .bind(&datos.email)
        .bind(&datos.cargo)
        .bind(datos.establecimiento_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(Directivo {
            id: DirectivoId(rec.get::<i64, _>(0)),
            nombre: datos.nombre.clone(),
            email: datos.email.clone(),
            cargo: datos.cargo.clone(),
            establecimiento_id: datos.establecimiento_id,
        })
    }

    pub async fn actualizar_directivo(
        &self,
        id: DirectivoId,
        datos: &NuevoDirectivo,
    ) -> Result<Option<Directivo>> {
        let result = sqlx::query(
            "UPDATE directivos SET nombre = ?, email = ?, cargo = ?, establecimiento_id = ?
             WHERE id = ?",
        )
        .bind(&datos.nombre)
        .bind(&datos.email)
        .bind(&datos.cargo)
        .bind(datos.establecimiento_id.0)
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Directivo {
            id,
            nombre: datos.nombre.clone(),
            email: datos.email.clone(),
            cargo: datos.cargo.clone(),
            establecimiento_id: datos.establecimiento_id,
        }))
    }

    pub async fn eliminar_directivo(&self, id: DirectivoId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM directivos WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- tutores ----

    pub async fn listar_tutores(&self) -> Result<Vec<Tutor>> {
        let rows = sqlx::query("SELECT id, nombre, email FROM tutores ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(tutor_de_fila).collect())
    }

    pub async fn crear_tutor(&self, datos: &NuevoTutor) -> Result<Tutor> {
        let rec = sqlx::query("INSERT INTO tutores (nombre, email) VALUES (?, ?) RETURNING id")
            .bind(&datos.nombre)
            .bind(&datos.email)
            .fetch_one(&self.pool)
            .await?;
        Ok(Tutor {
            id: TutorId(rec.get::<i64, _>(0)),
            nombre: datos.nombre.clone(),
            email: datos.email.clone(),
        })
    }

    pub async fn actualizar_tutor(&self, id: TutorId, datos: &NuevoTutor) -> Result<Option<Tutor>> {
        let result = sqlx::query("UPDATE tutores SET nombre = ?, email = ? WHERE id = ?")
            .bind(&datos.nombre)
            .bind(&datos.email)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Tutor {
            id,
            nombre: datos.nombre.clone(),
            email: datos.email.clone(),
        }))
    }

    pub async fn eliminar_tutor(&self, id: TutorId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tutores WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- estudiantes ----

    pub async fn listar_estudiantes(&self) -> Result<Vec<Estudiante>> {
        let rows = sqlx::query(
            "SELECT id, nombres, apellidos, email, carrera_id, periodo_ingreso
             FROM estudiantes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(estudiante_de_fila).collect())
    }

    pub async fn crear_estudiante(&self, datos: &NuevoEstudiante) -> Result<Estudiante> {
        let rec = sqlx::query(
            "INSERT INTO estudiantes (nombres, apellidos, email, carrera_id, periodo_ingreso)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&datos.nombres)
        .bind(&datos.apellidos)
        .bind(&datos.email)
        .bind(datos.carrera_id.0)
        .bind(&datos.periodo_ingreso)
        .fetch_one(&self.pool)
        .await?;
        Ok(Estudiante {
            id: EstudianteId(rec.get::<i64, _>(0)),
            nombres: datos.nombres.clone(),
            apellidos: datos.apellidos.clone(),
            email: datos.email.clone(),
            carrera_id: datos.carrera_id,
            periodo_ingreso: datos.periodo_ingreso.clone(),
        })
    }

    pub async fn actualizar_estudiante(
        &self,
        id: EstudianteId,
        datos: &NuevoEstudiante,
    ) -> Result<Option<Estudiante>> {
        let result = sqlx::query(
            "UPDATE estudiantes
             SET nombres = ?, apellidos = ?, email = ?, carrera_id = ?, periodo_ingreso = ?
             WHERE id = ?",
        )
        .bind(&datos.nombres)
        .bind(&datos.apellidos)
        .bind(&datos.email)
        .bind(datos.carrera_id.0)
        .bind(&datos.periodo_ingreso)
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Estudiante {
            id,
            nombres: datos.nombres.clone(),
            apellidos: datos.apellidos.clone(),
            email: datos.email.clone(),
            carrera_id: datos.carrera_id,
            periodo_ingreso: datos.periodo_ingreso.clone(),
        }))
    }

    pub async fn eliminar_estudiante(&self, id: EstudianteId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM estudiantes WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn existe_estudiante(&self, id: EstudianteId) -> Result<bool> {
        let existe: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM estudiantes WHERE id = ?)")
                .bind(id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(existe != 0)
    }

    // ---- cupos ----

    pub async fn listar_cupos(&self) -> Result<Vec<Cupo>> {
        let rows =
            sqlx::query("SELECT id, establecimiento_id, nivel_practica_id FROM cupos ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(cupo_de_fila).collect())
    }

    pub async fn crear_cupo(&self, datos: &NuevoCupo) -> Result<Cupo> {
        let rec = sqlx::query(
            "INSERT INTO cupos (establecimiento_id, nivel_practica_id) VALUES (?, ?) RETURNING id",
        )
        .bind(datos.establecimiento_id.0)
        .bind(datos.nivel_practica_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(Cupo {
            id: CupoId(rec.get::<i64, _>(0)),
            establecimiento_id: datos.establecimiento_id,
            nivel_practica_id: datos.nivel_practica_id,
        })
    }

    pub async fn eliminar_cupo(&self, id: CupoId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cupos WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn existe_cupo(&self, id: CupoId) -> Result<bool> {
        let existe: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cupos WHERE id = ?)")
            .bind(id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(existe != 0)
    }

    // ---- fichas ----

    pub async fn listar_fichas(&self) -> Result<Vec<Ficha>> {
        let rows = sqlx::query(
            "SELECT id, estudiante_id, establecimiento_id, cupo_id, fecha_inicio, fecha_termino
             FROM fichas ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(ficha_de_fila).collect())
    }

    pub async fn crear_ficha(&self, datos: &NuevaFicha) -> Result<Ficha> {
        let rec = sqlx::query(
            "INSERT INTO fichas (estudiante_id, establecimiento_id, cupo_id, fecha_inicio, fecha_termino)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(datos.estudiante_id.0)
        .bind(datos.establecimiento_id.0)
        .bind(datos.cupo_id.0)
        .bind(datos.fecha_inicio)
        .bind(datos.fecha_termino)
        .fetch_one(&self.pool)
        .await?;
        Ok(Ficha {
            id: FichaId(rec.get::<i64, _>(0)),
            estudiante_id: datos.estudiante_id,
            establecimiento_id: datos.establecimiento_id,
            cupo_id: datos.cupo_id,
            fecha_inicio: datos.fecha_inicio,
            fecha_termino: datos.fecha_termino,
        })
    }

    // ---- plantillas ----

    pub async fn plantilla(&self, destinatario: PlantillaDestinatario) -> Result<Option<String>> {
        let row = sqlx::query("SELECT html FROM plantillas WHERE destinatario = ?")
            .bind(destinatario.clave())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn guardar_plantilla(
        &self,
        destinatario: PlantillaDestinatario,
        html: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO plantillas (destinatario, html) VALUES (?, ?)
             ON CONFLICT(destinatario) DO UPDATE SET html = excluded.html",
        )
        .bind(destinatario.clave())
        .bind(html)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- carga masiva ----

    /// Empties every entity table. Stored templates survive the wipe.
    pub async fn vaciar_base(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for tabla in [
            "fichas",
            "cupos",
            "directivos",
            "estudiantes",
            "establecimientos",
            "niveles_practica",
            "tutores",
            "carreras",
            "comunas",
        ] {
            sqlx::query(&format!("DELETE FROM {tabla}"))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to empty table '{tabla}'"))?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn comuna_de_fila(row: &SqliteRow) -> Comuna {
    Comuna {
        id: ComunaId(row.get::<i64, _>(0)),
        nombre: row.get::<String, _>(1),
    }
}

fn carrera_de_fila(row: &SqliteRow) -> Carrera {
    Carrera {
        id: CarreraId(row.get::<i64, _>(0)),
        nombre: row.get::<String, _>(1),
    }
}

fn nivel_de_fila(row: &SqliteRow) -> NivelPractica {
    NivelPractica {
        id: NivelPracticaId(row.get::<i64, _>(0)),
        nombre: row.get::<String, _>(1),
        carrera_id: CarreraId(row.get::<i64, _>(2)),
    }
}

fn establecimiento_de_fila(row: &SqliteRow) -> Result<Establecimiento> {
    let dependencia_raw = row.get::<String, _>(3);
    let dependencia = Dependencia::parse(&dependencia_raw)
        .ok_or_else(|| anyhow!("unknown dependencia '{dependencia_raw}' in establecimientos row"))?;
    Ok(Establecimiento {
        id: EstablecimientoId(row.get::<i64, _>(0)),
        rbd: row.get::<String, _>(1),
        nombre: row.get::<String, _>(2),
        dependencia,
        comuna_id: ComunaId(row.get::<i64, _>(4)),
    })
}

fn directivo_de_fila(row: &SqliteRow) -> Directivo {
    Directivo {
        id: DirectivoId(row.get::<i64, _>(0)),
        nombre: row.get::<String, _>(1),
        email: row.get::<String, _>(2),
        cargo: row.get::<String, _>(3),
        establecimiento_id: EstablecimientoId(row.get::<i64, _>(4)),
    }
}

fn tutor_de_fila(row: &SqliteRow) -> Tutor {
    Tutor {
        id: TutorId(row.get::<i64, _>(0)),
        nombre: row.get::<String, _>(1),
        email: row.get::<String, _>(2),
    }
}

fn estudiante_de_fila(row: &SqliteRow) -> Estudiante {
    Estudiante {
        id: EstudianteId(row.get::<i64, _>(0)),
        nombres: row.get::<String, _>(1),
        apellidos: row.get::<String, _>(2),
        email: row.get::<String, _>(3),
        carrera_id: CarreraId(row.get::<i64, _>(4)),
        periodo_ingreso: row.get::<String, _>(5),
    }
}

fn cupo_de_fila(row: &SqliteRow) -> Cupo {
    Cupo {
        id: CupoId(row.get::<i64, _>(0)),
        establecimiento_id: EstablecimientoId(row.get::<i64, _>(1)),
        nivel_practica_id: NivelPracticaId(row.get::<i64, _>(2)),
    }
}

fn ficha_de_fila(row: &SqliteRow) -> Ficha {
    Ficha {
        id: FichaId(row.get::<i64, _>(0)),
        estudiante_id: EstudianteId(row.get::<i64, _>(1)),
        establecimiento_id: EstablecimientoId(row.get::<i64, _>(2)),
        cupo_id: CupoId(row.get::<i64, _>(3)),
        fecha_inicio: row.get::<NaiveDate, _>(4),
        fecha_termino: row.get::<NaiveDate, _>(5),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
