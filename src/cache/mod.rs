//! Cache
//!
//! Este módulo contiene la cache de presentación que las vistas leen tras
//! cada escritura confirmada.

pub mod display_cache;

pub use display_cache::{DisplayCache, DisplayEntry};
