//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean exactamente a las
//! respuestas del backend REST de intervenciones, y los tipos de la política
//! de acceso.

pub mod auth;
pub mod intervention;
pub mod time_slot;

pub use auth::{MenuSection, NavigationDecision, RoutePermission, SessionContext, UserRole};
pub use intervention::{ConnectedArticle, Intervention, InterventionPage, InterventionQuery, Technician};
pub use time_slot::{SlotKind, TimeSlot};
