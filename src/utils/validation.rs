//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para convertir los valores que llegan
//! del backend (fechas, instantes, horas) en tipos fuertes, y los módulos serde
//! que aplican esa conversión en el borde de deserialización.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer};

use crate::utils::errors::{validation_error, AppResult};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Validar y convertir string a fecha (YYYY-MM-DD, admite sufijo de hora)
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(value).map(|dt| dt.date()))
}

/// Validar y convertir string a datetime local.
///
/// Un offset RFC 3339 se descarta: se conserva la hora de pared tal cual.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Validar y convertir string a hora (H:MM o HH:MM[:SS])
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Una ventana personalizada necesita inicio y fin, y el fin debe ser posterior
pub fn validate_custom_window(
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
) -> AppResult<(NaiveTime, NaiveTime)> {
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok((start, end)),
        (Some(_), Some(_)) => Err(validation_error(
            "time_slot",
            "custom time window must end after it starts",
        )),
        _ => Err(validation_error(
            "time_slot",
            "custom time window requires both a start and an end",
        )),
    }
}

/// `null` en listas se trata como lista vacía
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fechas opcionales: `null`, `""` y valores ilegibles se leen como `None`
pub mod lenient_date {
    use super::*;
    use serde::Serializer;

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format(DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_date))
    }
}

/// Instantes opcionales con hora de pared, sin zona horaria
pub mod lenient_datetime {
    use super::*;
    use serde::Serializer;

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(DATETIME_WIRE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_datetime))
    }
}
