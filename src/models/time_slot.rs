//! Franja horaria de una intervención
//!
//! Representación canónica de la ventana de trabajo de un día. El formato
//! legacy en texto se traduce a este tipo en `services::slot_codec`.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Franja horaria: tres ventanas fijas o una ventana personalizada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeSlot {
    Morning,
    Afternoon,
    FullDay,
    Custom { start: NaiveTime, end: NaiveTime },
}

impl TimeSlot {
    /// Franjas predefinidas, en orden de presentación
    pub const PREDEFINED: [TimeSlot; 3] = [TimeSlot::Morning, TimeSlot::Afternoon, TimeSlot::FullDay];

    pub fn kind(&self) -> SlotKind {
        match self {
            TimeSlot::Morning => SlotKind::Morning,
            TimeSlot::Afternoon => SlotKind::Afternoon,
            TimeSlot::FullDay => SlotKind::FullDay,
            TimeSlot::Custom { .. } => SlotKind::Custom,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, TimeSlot::Custom { .. })
    }
}

/// Etiqueta de la franja tal como viaja en el campo `time_slot` del registro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Morning,
    Afternoon,
    FullDay,
    Custom,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Morning => "morning",
            SlotKind::Afternoon => "afternoon",
            SlotKind::FullDay => "full_day",
            SlotKind::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Some(SlotKind::Morning),
            "afternoon" => Some(SlotKind::Afternoon),
            "full_day" | "fullday" => Some(SlotKind::FullDay),
            "custom" => Some(SlotKind::Custom),
            _ => None,
        }
    }
}

/// Deserialización tolerante del tag: vacío o desconocido se lee como `None`
pub fn lenient_slot_kind<'de, D>(deserializer: D) -> Result<Option<SlotKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|value| {
        let kind = SlotKind::from_str(value);
        if kind.is_none() && !value.trim().is_empty() {
            tracing::warn!("⚠️ time_slot desconocido ignorado: '{}'", value);
        }
        kind
    }))
}
