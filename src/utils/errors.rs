//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del núcleo de planificación
//! y los helpers para construirlos de forma consistente.

use thiserror::Error;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    /// Texto legacy de asignación mal formado o incompleto
    #[error("Parse error: {0}")]
    Parse(String),

    /// Fallo de red/HTTP leyendo el registro antes del merge
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Fallo de red/HTTP en la escritura completa del registro
    #[error("Write error: {0}")]
    Write(String),

    /// HTTP 401 en cualquier llamada: provoca el cierre global de sesión
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Los 401 nunca se reintentan ni se notifican como fallo local
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Unauthorized(_))
    }

    /// Código corto para logs y notificaciones
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Parse(_) => "PARSE_ERROR",
            AppError::Fetch(_) => "FETCH_ERROR",
            AppError::Write(_) => "WRITE_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: &'static str) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.add_param("field".into(), &field);
    error.add_param("message".into(), &message);
    error.message = Some(message.into());

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de parseo
pub fn parse_error(input: &str, reason: &str) -> AppError {
    AppError::Parse(format!("'{}': {}", input, reason))
}

/// Función helper para crear errores de configuración
pub fn config_error(key: &str, reason: &str) -> AppError {
    AppError::Config(format!("{}: {}", key, reason))
}
