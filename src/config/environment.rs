//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno: backend REST, ventana de
//! debounce, paginación y la tabla de permisos de navegación.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::errors::{config_error, AppResult};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 900;
const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_CANCELLED_STATUS_ID: i64 = 4;
const DEFAULT_TECHNICIAN_ROLE_ID: i64 = 3;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub http_timeout: Duration,
    pub sync_debounce: Duration,
    pub page_size: u32,
    pub cancelled_status_id: i64,
    pub technician_role_id: i64,
    pub access_policy_path: Option<String>,
    /// Rol entregado por el proveedor de identidad
    pub session_role: Option<String>,
}

impl EnvironmentConfig {
    /// Cargar configuración desde variables de entorno (tras `dotenvy::dotenv()`)
    pub fn from_env() -> AppResult<Self> {
        let api_base_url = env::var("API_BASE_URL")
            .map_err(|_| config_error("API_BASE_URL", "must be set"))?;

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_token: optional_var("API_TOKEN"),
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?),
            sync_debounce: Duration::from_millis(parse_var("SYNC_DEBOUNCE_MS", DEFAULT_SYNC_DEBOUNCE_MS)?),
            page_size: parse_var("PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            cancelled_status_id: parse_var("CANCELLED_STATUS_ID", DEFAULT_CANCELLED_STATUS_ID)?,
            technician_role_id: parse_var("TECHNICIAN_ROLE_ID", DEFAULT_TECHNICIAN_ROLE_ID)?,
            access_policy_path: optional_var("ACCESS_POLICY_PATH"),
            session_role: optional_var("SESSION_ROLE"),
        })
    }

    /// Configuración con valores por defecto para un backend dado
    pub fn for_base_url(api_base_url: &str) -> Self {
        Self {
            environment: "development".to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_token: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            sync_debounce: Duration::from_millis(DEFAULT_SYNC_DEBOUNCE_MS),
            page_size: DEFAULT_PAGE_SIZE,
            cancelled_status_id: DEFAULT_CANCELLED_STATUS_ID,
            technician_role_id: DEFAULT_TECHNICIAN_ROLE_ID,
            access_policy_path: None,
            session_role: None,
        }
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match optional_var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| config_error(key, &format!("'{}' is not a valid number", raw))),
        None => Ok(default),
    }
}
