//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores y validación
//! de los valores que cruzan el borde con el backend.

pub mod errors;
pub mod validation;

pub use errors::{AppError, AppResult};
