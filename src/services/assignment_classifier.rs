//! Clasificación de intervenciones pendientes de asignar
//!
//! Decide qué intervenciones necesitan atención de planificación (la cola
//! "da assegnare") y qué intervenciones caen en el rango de la vista de
//! calendario.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::client::InterventionStore;
use crate::config::EnvironmentConfig;
use crate::models::{Intervention, InterventionQuery};
use crate::utils::errors::AppResult;

/// Reglas de clasificación
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// `status_id` que identifica una intervención anulada
    pub cancelled_status_id: i64,
    /// Tamaño de página al recorrer el listado remoto
    pub page_size: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            cancelled_status_id: 4,
            page_size: 50,
        }
    }
}

impl From<&EnvironmentConfig> for ClassifierConfig {
    fn from(config: &EnvironmentConfig) -> Self {
        Self {
            cancelled_status_id: config.cancelled_status_id,
            page_size: config.page_size.max(1),
        }
    }
}

/// Vista de calendario: semana lunes–sábado o un solo día
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarView {
    Week(NaiveDate),
    Day(NaiveDate),
}

impl CalendarView {
    /// Rango de días inclusivo que cubre la vista
    pub fn range(&self) -> (NaiveDate, NaiveDate) {
        match self {
            CalendarView::Day(day) => (*day, *day),
            CalendarView::Week(day) => {
                let monday = *day - Duration::days(day.weekday().num_days_from_monday() as i64);
                (monday, monday + Duration::days(5))
            }
        }
    }
}

pub struct AssignmentClassifier {
    store: Arc<dyn InterventionStore>,
    config: ClassifierConfig,
}

impl AssignmentClassifier {
    pub fn new(store: Arc<dyn InterventionStore>, config: ClassifierConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn is_cancelled(&self, record: &Intervention) -> bool {
        record.cancelled_at.is_some() || record.status_id == Some(self.config.cancelled_status_id)
    }

    /// Falta técnico, día o ventana, y la intervención no está anulada
    pub fn needs_assignment(&self, record: &Intervention) -> bool {
        !record.is_fully_scheduled() && !self.is_cancelled(record)
    }

    /// Cola de pendientes, la más reciente (id mayor) primero
    pub fn unassigned_queue<I>(&self, records: I) -> Vec<Intervention>
    where
        I: IntoIterator<Item = Intervention>,
    {
        let mut queue: Vec<Intervention> = records
            .into_iter()
            .filter(|record| self.needs_assignment(record))
            .collect();
        queue.sort_by(|a, b| b.id.cmp(&a.id));
        queue
    }

    /// Recorre todas las páginas del backend y devuelve la cola de pendientes
    pub async fn list_unassigned(&self) -> AppResult<Vec<Intervention>> {
        let records = self.fetch_all(None, None).await?;
        let queue = self.unassigned_queue(records);
        info!("📋 {} intervenciones pendientes de asignar", queue.len());
        Ok(queue)
    }

    /// Intervenciones del rango, sin importar si están asignadas
    pub async fn load_range(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Intervention>> {
        let records = self.fetch_all(Some(from), Some(to)).await?;
        Ok(filter_for_range(records, from, to))
    }

    pub async fn load_view(&self, view: CalendarView) -> AppResult<Vec<Intervention>> {
        let (from, to) = view.range();
        self.load_range(from, to).await
    }

    async fn fetch_all(&self, from_date: Option<NaiveDate>, to_date: Option<NaiveDate>) -> AppResult<Vec<Intervention>> {
        let page_size = self.config.page_size.max(1);
        let mut records = Vec::new();
        let mut skip = 0u32;

        loop {
            let query = InterventionQuery {
                from_date,
                to_date,
                page: page_size,
                skip,
            };
            let page = self.store.list_interventions(query).await?;
            let fetched = page.data.len() as u32;
            debug!("📄 Página skip={} con {} intervenciones", skip, fetched);

            records.extend(page.data);
            skip += fetched;

            let reached_total = page.total.map_or(false, |total| u64::from(skip) >= total);
            if fetched < page_size || reached_total {
                break;
            }
        }

        Ok(records)
    }
}

/// Intervenciones cuyo intervalo se solapa con los días `[from, to]`.
///
/// La ventana es semiabierta: terminar justo a medianoche de `from` no
/// cuenta. Sin ventana concreta, cuenta el día planificado.
pub fn filter_for_range<I>(records: I, from: NaiveDate, to: NaiveDate) -> Vec<Intervention>
where
    I: IntoIterator<Item = Intervention>,
{
    records
        .into_iter()
        .filter(|record| overlaps_range(record, from, to))
        .collect()
}

pub fn overlaps_range(record: &Intervention, from: NaiveDate, to: NaiveDate) -> bool {
    let range_start = day_start(from);
    let range_end = day_start(to + Duration::days(1));

    match (record.from_datetime, record.to_datetime) {
        (Some(start), Some(end)) => start < range_end && end > range_start,
        (Some(start), None) => start >= range_start && start < range_end,
        _ => record.date.map_or(false, |date| date >= from && date <= to),
    }
}

fn day_start(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(0, 0, 0).expect("medianoche válida")
}
