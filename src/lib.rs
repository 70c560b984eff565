//! Núcleo de planificación de intervenciones
//!
//! Franjas horarias, cola de pendientes de asignar, sincronización de
//! ediciones parciales contra el backend REST y política de navegación por rol.

pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;
