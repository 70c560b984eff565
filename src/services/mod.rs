//! Services module
//!
//! Este módulo contiene la lógica de negocio: codificación de franjas,
//! clasificación de pendientes, sincronización de ediciones y política de
//! acceso.

pub mod access_policy;
pub mod assignment_classifier;
pub mod debounce;
pub mod record_synchronizer;
pub mod slot_codec;
pub mod technician_directory;

pub use access_policy::{AccessPolicy, LOGIN_ROUTE};
pub use assignment_classifier::{AssignmentClassifier, CalendarView, ClassifierConfig};
pub use debounce::DebouncedTask;
pub use record_synchronizer::{
    CommitEvent, FailureEvent, FieldBundle, FieldChange, RecordSynchronizer, Surface, SurfaceKey,
};
pub use slot_codec::{LegacyAssignment, SlotCodec, SlotRange};
pub use technician_directory::TechnicianDirectory;
