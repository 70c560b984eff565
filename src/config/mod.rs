//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de entorno del cliente de
//! intervenciones.

pub mod environment;

pub use environment::*;
