//! Cache de presentación de intervenciones
//!
//! Guarda los valores ya formateados (fecha, franja, técnico, notas) de la
//! última escritura confirmada, para que las vistas los muestren sin releer
//! el registro.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::Intervention;
use crate::services::slot_codec::SlotCodec;

/// Valores de presentación de una intervención
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayEntry {
    pub record_id: i64,
    /// `DD/MM/YYYY`
    pub formatted_date: Option<String>,
    /// `HH:MM - HH:MM`
    pub formatted_time: Option<String>,
    /// Texto legacy completo, p.ej. `15/01/2024 - Mattina (8:00 - 13:00)`
    pub slot_label: Option<String>,
    pub technician: Option<String>,
    pub calendar_notes: Option<String>,
    pub internal_notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DisplayEntry {
    /// Construye la entrada a partir de los valores recién escritos
    pub fn from_record(record: &Intervention, technician: Option<String>) -> Self {
        let formatted_time = match (record.from_datetime, record.to_datetime) {
            (Some(from), Some(to)) => Some(format!("{} - {}", from.format("%H:%M"), to.format("%H:%M"))),
            _ => None,
        };

        let slot_label = match (record.date, record.from_datetime, record.to_datetime) {
            (Some(date), Some(from), Some(to)) => {
                Some(SlotCodec::format_legacy_string(date, SlotCodec::decode(from, to)))
            }
            _ => None,
        };

        Self {
            record_id: record.id,
            formatted_date: record.date.map(|d| d.format("%d/%m/%Y").to_string()),
            formatted_time,
            slot_label,
            technician,
            calendar_notes: record.calendar_notes.clone(),
            internal_notes: record.internal_notes.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Cache en memoria compartida entre las vistas
#[derive(Clone, Default)]
pub struct DisplayCache {
    entries: Arc<RwLock<HashMap<i64, DisplayEntry>>>,
}

impl DisplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, record_id: i64) -> Option<DisplayEntry> {
        self.entries.read().await.get(&record_id).cloned()
    }

    pub async fn put(&self, entry: DisplayEntry) {
        debug!("🖼️ Cache de presentación actualizada para {}", entry.record_id);
        self.entries.write().await.insert(entry.record_id, entry);
    }

    pub async fn invalidate(&self, record_id: i64) {
        self.entries.write().await.remove(&record_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
