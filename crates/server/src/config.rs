use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub smtp_host: Option<String>,
    pub smtp_usuario: String,
    pub smtp_clave: String,
    pub smtp_remitente: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/practicas.db".into(),
            smtp_host: None,
            smtp_usuario: String::new(),
            smtp_clave: String::new(),
            smtp_remitente: "practicas@universidad.cl".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.server_bind = v.clone();
            }
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("smtp_host") {
                settings.smtp_host = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("smtp_usuario") {
                settings.smtp_usuario = v.clone();
            }
            if let Some(v) = file_cfg.get("smtp_clave") {
                settings.smtp_clave = v.clone();
            }
            if let Some(v) = file_cfg.get("smtp_remitente") {
                settings.smtp_remitente = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Ok(v) = std::env::var("SMTP_HOST") {
        settings.smtp_host = Some(v);
    }
    if let Ok(v) = std::env::var("APP__SMTP_HOST") {
        settings.smtp_host = Some(v);
    }

    if let Ok(v) = std::env::var("SMTP_USUARIO") {
        settings.smtp_usuario = v;
    }
    if let Ok(v) = std::env::var("APP__SMTP_USUARIO") {
        settings.smtp_usuario = v;
    }

    if let Ok(v) = std::env::var("SMTP_CLAVE") {
        settings.smtp_clave = v;
    }
    if let Ok(v) = std::env::var("APP__SMTP_CLAVE") {
        settings.smtp_clave = v;
    }

    if let Ok(v) = std::env::var("SMTP_REMITENTE") {
        settings.smtp_remitente = v;
    }
    if let Ok(v) = std::env::var("APP__SMTP_REMITENTE") {
        settings.smtp_remitente = v;
    }

    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
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
#[path = "tests/config_tests.rs"]
mod tests;
