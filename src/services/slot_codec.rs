//! Codificación de franjas horarias
//!
//! Convierte entre `TimeSlot` y (a) un rango concreto de fecha/hora y (b) el
//! texto legacy de asignación (`"15/01/2024 - Mattina (8:00 - 13:00)"`,
//! `"15/01/2024 dalle 10:00 alle 15:00"`). Todas las horas son de pared, sin
//! conversión de zona horaria.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::models::TimeSlot;
use crate::utils::errors::{parse_error, AppResult};

lazy_static! {
    static ref DATE_RE: Regex = Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").unwrap();
    static ref CUSTOM_START_RE: Regex = Regex::new(r"(?i)\bdalle\s+(\d{1,2})[:.](\d{2})").unwrap();
    static ref CUSTOM_END_RE: Regex = Regex::new(r"(?i)\balle\s+(\d{1,2})[:.](\d{2})").unwrap();
}

const MORNING_LABEL: &str = "Mattina";
const AFTERNOON_LABEL: &str = "Pomeriggio";
const FULL_DAY_LABEL: &str = "Tutto il giorno";

/// Rango concreto producido por `encode`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    pub from_datetime: NaiveDateTime,
    pub to_datetime: NaiveDateTime,
    pub label: String,
}

/// Resultado de interpretar el texto legacy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAssignment {
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub from: NaiveTime,
    pub to: NaiveTime,
}

pub struct SlotCodec;

impl SlotCodec {
    /// Horas fijas de cada franja; para `Custom` las del propio valor
    pub fn bounds(slot: TimeSlot) -> (NaiveTime, NaiveTime) {
        match slot {
            TimeSlot::Morning => (hm(8, 0), hm(13, 0)),
            TimeSlot::Afternoon => (hm(14, 0), hm(18, 0)),
            TimeSlot::FullDay => (hm(8, 0), hm(18, 0)),
            TimeSlot::Custom { start, end } => (start, end),
        }
    }

    pub fn encode(date: NaiveDate, slot: TimeSlot) -> SlotRange {
        let (start, end) = Self::bounds(slot);
        SlotRange {
            from_datetime: date.and_time(start),
            to_datetime: date.and_time(end),
            label: Self::format_legacy_string(date, slot),
        }
    }

    /// Clasificación inversa: si el rango no coincide con ninguna franja fija
    /// se devuelve `Custom`. Un rango que cruza días solo conserva las horas.
    pub fn decode(from: NaiveDateTime, to: NaiveDateTime) -> TimeSlot {
        let (start, end) = (from.time(), to.time());
        if from.date() == to.date() {
            if let Some(slot) = TimeSlot::PREDEFINED
                .into_iter()
                .find(|slot| Self::bounds(*slot) == (start, end))
            {
                return slot;
            }
        }
        TimeSlot::Custom { start, end }
    }

    pub fn format_legacy_string(date: NaiveDate, slot: TimeSlot) -> String {
        let day = date.format("%d/%m/%Y");
        match slot {
            TimeSlot::Custom { start, end } => {
                format!("{} dalle {} alle {}", day, start.format("%H:%M"), end.format("%H:%M"))
            }
            fixed => {
                let (start, end) = Self::bounds(fixed);
                let label = match fixed {
                    TimeSlot::Morning => MORNING_LABEL,
                    TimeSlot::Afternoon => AFTERNOON_LABEL,
                    _ => FULL_DAY_LABEL,
                };
                format!(
                    "{} - {} ({} - {})",
                    day,
                    label,
                    start.format("%-H:%M"),
                    end.format("%-H:%M")
                )
            }
        }
    }

    /// Interpreta el texto legacy de asignación.
    ///
    /// Primero extrae la fecha `DD/MM/YYYY`, luego busca las etiquetas de las
    /// franjas fijas y como último recurso el patrón `dalle HH:MM alle HH:MM`.
    pub fn parse_legacy_string(text: &str) -> AppResult<LegacyAssignment> {
        let captures = DATE_RE
            .captures(text)
            .ok_or_else(|| parse_error(text, "no DD/MM/YYYY date found"))?;

        let day: u32 = captures[1].parse().map_err(|_| parse_error(text, "invalid day"))?;
        let month: u32 = captures[2].parse().map_err(|_| parse_error(text, "invalid month"))?;
        let year: i32 = captures[3].parse().map_err(|_| parse_error(text, "invalid year"))?;
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| parse_error(text, "date does not exist"))?;

        let lowered = text.to_lowercase();
        let fixed = [
            (MORNING_LABEL, TimeSlot::Morning),
            (AFTERNOON_LABEL, TimeSlot::Afternoon),
            (FULL_DAY_LABEL, TimeSlot::FullDay),
        ]
        .into_iter()
        .find(|(label, _)| lowered.contains(&label.to_lowercase()))
        .map(|(_, slot)| slot);

        let slot = match fixed {
            Some(slot) => slot,
            None => {
                let start = capture_time(&CUSTOM_START_RE, text);
                let end = capture_time(&CUSTOM_END_RE, text);
                match (start, end) {
                    (Some(start), Some(end)) => TimeSlot::Custom { start, end },
                    _ => return Err(parse_error(text, "custom range needs both 'dalle' and 'alle' times")),
                }
            }
        };

        let (from, to) = Self::bounds(slot);
        debug!("🕗 Texto legacy '{}' interpretado como {:?}", text, slot);
        Ok(LegacyAssignment { date, slot, from, to })
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("hora fija válida")
}

fn capture_time(re: &Regex, text: &str) -> Option<NaiveTime> {
    let captures = re.captures(text)?;
    let hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = captures[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}
