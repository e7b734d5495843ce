use log::info;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::engine::orchestrator::EngineSettings;
use crate::errors::AppError;
use crate::models::department::DepartmentDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::BadRequest(format!("Unknown STORE_BACKEND '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub store_backend: StoreBackend,
    pub departments_file: PathBuf,
    pub undo_ttl_secs: i64,
    pub undo_max_entries: usize,
    pub undo_sweep_secs: u64,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError> {
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::BadRequest(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() {
            return Err(AppError::BadRequest("JWT_SECRET must be set".to_string()));
        }

        let store_backend = parse_or(&lookup, "STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::BadRequest("DATABASE_URL must be set".to_string()));
        }

        let undo_ttl_secs: i64 = parse_or(&lookup, "UNDO_TTL_SECS", 300)?;
        let undo_max_entries: usize = parse_or(&lookup, "UNDO_MAX_ENTRIES", 10)?;
        let undo_sweep_secs: u64 = parse_or(&lookup, "UNDO_SWEEP_SECS", 60)?;
        if undo_max_entries == 0 || undo_sweep_secs == 0 || undo_ttl_secs < 0 {
            return Err(AppError::BadRequest("Undo settings must be positive".to_string()));
        }

        Ok(AppConfig {
            database_url,
            jwt_secret,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            store_backend,
            departments_file: PathBuf::from(
                lookup("DEPARTMENTS_FILE").unwrap_or_else(|| "config/departments.json".to_string()),
            ),
            undo_ttl_secs,
            undo_max_entries,
            undo_sweep_secs,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            undo_capacity: self.undo_max_entries,
            undo_ttl: chrono::Duration::seconds(self.undo_ttl_secs),
            ..EngineSettings::default()
        }
    }
}

pub fn parse_definitions(raw: &str) -> Result<Vec<DepartmentDefinition>, AppError> {
    let definitions: Vec<DepartmentDefinition> = serde_json::from_str(raw)
        .map_err(|err| AppError::BadRequest(format!("Invalid department catalog: {}", err)))?;

    let mut seen = HashSet::new();
    for definition in &definitions {
        if definition.id.trim().is_empty() {
            return Err(AppError::BadRequest("Department id must not be empty".to_string()));
        }
        if !seen.insert(definition.id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Duplicate department id '{}'",
                definition.id
            )));
        }
    }
    Ok(definitions)
}

pub fn load_definitions(path: &Path) -> Result<Vec<DepartmentDefinition>, AppError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        AppError::InternalServerError(format!("Cannot read {}: {}", path.display(), err))
    })?;
    let definitions = parse_definitions(&raw)?;
    info!("Loaded {} department definitions from {}", definitions.len(), path.display());
    Ok(definitions)
}
