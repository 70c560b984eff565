//! Modelo de intervención
//!
//! Este módulo contiene el registro completo de una intervención tal como lo
//! devuelve `GET /interventions/{id}`, y los tipos de respuesta de los demás
//! endpoints consumidos.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::time_slot::{lenient_slot_kind, SlotKind};
use crate::utils::validation::{lenient_date, lenient_datetime, null_as_default};

/// Registro de intervención. Cada escritura envía el registro entero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: i64,

    // Relaciones
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub customer_location_id: Option<i64>,
    #[serde(default)]
    pub type_id: Option<i64>,
    #[serde(default)]
    pub zone_id: Option<i64>,
    #[serde(default)]
    pub assigned_to: Option<i64>,

    // Planificación
    #[serde(default, with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_slot_kind")]
    pub time_slot: Option<SlotKind>,
    #[serde(default, with = "lenient_datetime")]
    pub from_datetime: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_datetime")]
    pub to_datetime: Option<NaiveDateTime>,

    // Ciclo de vida
    #[serde(default)]
    pub status_id: Option<i64>,
    #[serde(default)]
    pub approved_by: Option<i64>,
    #[serde(default, with = "lenient_datetime")]
    pub approved_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub cancelled_by: Option<i64>,
    #[serde(default, with = "lenient_datetime")]
    pub cancelled_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub invoiced_by: Option<i64>,
    #[serde(default, with = "lenient_datetime")]
    pub invoiced_at: Option<NaiveDateTime>,

    // Notas independientes: nunca se pisan entre sí
    #[serde(default)]
    pub internal_notes: Option<String>,
    #[serde(default)]
    pub calendar_notes: Option<String>,

    // Asociaciones
    #[serde(default, deserialize_with = "null_as_default")]
    pub connected_equipment: Vec<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connected_articles: Vec<ConnectedArticle>,

    #[serde(default)]
    pub call_code: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub quotation_price: Option<Decimal>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub is_at_location: Option<bool>,
    #[serde(default)]
    pub is_home_service: Option<bool>,

    /// Campos del backend que este modelo no nombra; se reenvían intactos
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    wire: Option<WireSnapshot>,
}

/// Forma exacta en la que llegó el registro.
///
/// `canonical` es la serialización tipada justo tras leerlo: un campo cuyo
/// valor tipado no cambia respecto a ella se reenvía con su valor original.
#[derive(Debug, Clone, Default, PartialEq)]
struct WireSnapshot {
    raw: Map<String, Value>,
    canonical: Map<String, Value>,
    dirty: BTreeSet<String>,
}

impl Intervention {
    /// Registro vacío con solo identidad, útil para construir fixtures
    pub fn new(id: i64) -> Self {
        Self {
            id,
            customer_id: None,
            customer_location_id: None,
            type_id: None,
            zone_id: None,
            assigned_to: None,
            date: None,
            time_slot: None,
            from_datetime: None,
            to_datetime: None,
            status_id: None,
            approved_by: None,
            approved_at: None,
            cancelled_by: None,
            cancelled_at: None,
            invoiced_by: None,
            invoiced_at: None,
            internal_notes: None,
            calendar_notes: None,
            connected_equipment: Vec::new(),
            connected_articles: Vec::new(),
            call_code: None,
            quotation_price: None,
            opening_hours: None,
            is_at_location: None,
            is_home_service: None,
            extra: Map::new(),
            wire: None,
        }
    }

    /// Lee el registro conservando el JSON original
    pub fn from_wire(value: Value) -> serde_json::Result<Self> {
        let mut record: Intervention = serde_json::from_value(value.clone())?;
        if let Value::Object(raw) = value {
            let canonical = match serde_json::to_value(&record)? {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            record.wire = Some(WireSnapshot {
                raw,
                canonical,
                dirty: BTreeSet::new(),
            });
        }
        Ok(record)
    }

    /// Fuerza el reenvío del valor tipado de `key`, aunque coincida con el leído
    pub fn mark_dirty(&mut self, key: &str) {
        if let Some(wire) = &mut self.wire {
            wire.dirty.insert(key.to_string());
        }
    }

    /// Cuerpo para `PUT`: el JSON leído con solo los campos modificados
    /// reemplazados. Sin JSON original se serializa el registro tipado.
    pub fn to_wire(&self) -> serde_json::Result<Value> {
        let typed = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            other => return Ok(other),
        };
        let Some(wire) = &self.wire else {
            return Ok(Value::Object(typed));
        };

        let mut body = wire.raw.clone();
        for (key, value) in typed {
            if wire.dirty.contains(&key) || wire.canonical.get(&key) != Some(&value) {
                body.insert(key, value);
            }
        }
        Ok(Value::Object(body))
    }

    /// Tiene técnico, día y ventana concreta
    pub fn is_fully_scheduled(&self) -> bool {
        self.assigned_to.is_some()
            && self.date.is_some()
            && self.from_datetime.is_some()
            && self.to_datetime.is_some()
    }
}

/// Artículo conectado a la intervención
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedArticle {
    pub article_id: i64,
    #[serde(default)]
    pub quantity: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Técnico devuelto por `GET /users?role_id&query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technician {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl Technician {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name.trim(), self.surname.trim())
            .trim()
            .to_string()
    }
}

/// Página de `GET /interventions?from_date&to_date&page&skip`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionPage {
    #[serde(alias = "items", default, deserialize_with = "null_as_default")]
    pub data: Vec<Intervention>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Parámetros del listado paginado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterventionQuery {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// Tamaño de página
    pub page: u32,
    /// Desplazamiento
    pub skip: u32,
}
