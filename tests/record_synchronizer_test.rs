use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};

use intervention_scheduler::cache::DisplayCache;
use intervention_scheduler::client::InterventionStore;
use intervention_scheduler::models::{Intervention, InterventionPage, InterventionQuery, Technician, TimeSlot};
use intervention_scheduler::services::{
    CommitEvent, FieldBundle, FieldChange, RecordSynchronizer, Surface, TechnicianDirectory,
};
use intervention_scheduler::utils::errors::{AppError, AppResult};

const DEBOUNCE: Duration = Duration::from_millis(900);

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Healthy,
    FailWrites,
    Unauthorized,
}

/// Backend en memoria que guarda JSON tal cual: la lectura toma la foto al
/// recibir la petición y responde tras `fetch_delay`
struct FakeStore {
    records: Mutex<HashMap<i64, Value>>,
    written: Mutex<Vec<Intervention>>,
    fetches: AtomicUsize,
    writes: AtomicUsize,
    fetch_delay: Duration,
    mode: Mutex<Mode>,
}

impl FakeStore {
    fn new(records: Vec<Intervention>, fetch_delay: Duration) -> Arc<Self> {
        Self::from_json(records.iter().map(|r| r.to_wire().unwrap()).collect(), fetch_delay)
    }

    fn from_json(records: Vec<Value>, fetch_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records.into_iter().map(|r| (r["id"].as_i64().unwrap(), r)).collect()),
            written: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fetch_delay,
            mode: Mutex::new(Mode::Healthy),
        })
    }

    fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn raw(&self, id: i64) -> Value {
        self.records.lock().unwrap()[&id].clone()
    }

    fn record(&self, id: i64) -> Intervention {
        Intervention::from_wire(self.raw(id)).unwrap()
    }

    fn last_written(&self) -> Intervention {
        self.written.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl InterventionStore for FakeStore {
    async fn fetch_intervention(&self, id: i64) -> AppResult<Intervention> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();
        if mode == Mode::Unauthorized {
            return Err(AppError::Unauthorized("token expired".to_string()));
        }
        let snapshot = self
            .records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("intervention {}", id)))?;
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        Intervention::from_wire(snapshot).map_err(|e| AppError::Fetch(e.to_string()))
    }

    async fn write_intervention(&self, record: &Intervention) -> AppResult<()> {
        if *self.mode.lock().unwrap() == Mode::FailWrites {
            return Err(AppError::Write("HTTP 500".to_string()));
        }
        let body = record.to_wire().map_err(|e| AppError::Write(e.to_string()))?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.written.lock().unwrap().push(record.clone());
        self.records.lock().unwrap().insert(record.id, body);
        Ok(())
    }

    async fn list_interventions(&self, _query: InterventionQuery) -> AppResult<InterventionPage> {
        let data: Vec<Intervention> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter_map(|raw| Intervention::from_wire(raw.clone()).ok())
            .collect();
        let total = Some(data.len() as u64);
        Ok(InterventionPage { data, total })
    }

    async fn search_technicians(&self, _role_id: i64, _query: &str) -> AppResult<Vec<Technician>> {
        Ok(Vec::new())
    }
}

struct Harness {
    store: Arc<FakeStore>,
    sync: RecordSynchronizer,
    directory: TechnicianDirectory,
    commits: Arc<Mutex<Vec<CommitEvent>>>,
    failures: Arc<Mutex<Vec<&'static str>>>,
    sign_outs: Arc<AtomicUsize>,
}

async fn harness(records: Vec<Intervention>, fetch_delay: Duration) -> Harness {
    harness_with(FakeStore::new(records, fetch_delay)).await
}

async fn harness_with(store: Arc<FakeStore>) -> Harness {
    let directory = TechnicianDirectory::new(store.clone(), 3);
    let sync = RecordSynchronizer::new(store.clone(), directory.clone(), DisplayCache::new(), DEBOUNCE);

    let commits = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sign_outs = Arc::new(AtomicUsize::new(0));

    let sink = commits.clone();
    sync.on_committed(move |event| sink.lock().unwrap().push(event.clone())).await;
    let sink = failures.clone();
    sync.on_failed(move |event| sink.lock().unwrap().push(event.error.code())).await;
    let counter = sign_outs.clone();
    sync.on_sign_out(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .await;

    Harness {
        store,
        sync,
        directory,
        commits,
        failures,
        sign_outs,
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

fn base_record(id: i64) -> Intervention {
    let mut record = Intervention::new(id);
    record.customer_id = Some(77);
    record.internal_notes = Some("portare scala".to_string());
    record.calendar_notes = Some("citofono rotto".to_string());
    record.connected_equipment = vec![5, 6];
    record.extra.insert("legacy_code".to_string(), json!("INT-0042"));
    record
}

fn notes(text: &str) -> FieldBundle {
    FieldBundle::new().with(FieldChange::CalendarNotes(Some(text.to_string())))
}

fn internal(text: &str) -> FieldBundle {
    FieldBundle::new().with(FieldChange::InternalNotes(Some(text.to_string())))
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(3)).await;
}

#[tokio::test(start_paused = true)]
async fn test_merge_keeps_untouched_fields() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("nuova nota")).await.unwrap();
    settle().await;

    let written = h.store.last_written();
    assert_eq!(written.calendar_notes.as_deref(), Some("nuova nota"));
    assert_eq!(written.internal_notes.as_deref(), Some("portare scala"));
    assert_eq!(written.customer_id, Some(77));
    assert_eq!(written.connected_equipment, vec![5, 6]);
    assert_eq!(written.extra.get("legacy_code"), Some(&json!("INT-0042")));

    let cached = h.sync.display_cache().get(1).await.unwrap();
    assert_eq!(cached.calendar_notes.as_deref(), Some("nuova nota"));
    assert_eq!(h.commits.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_is_one_write() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    for text in ["n", "nu", "nuo", "nuov", "nuova"] {
        h.sync.apply_edit(1, Surface::CalendarNotes, notes(text)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(h.store.writes(), 0);
    assert_eq!(h.sync.pending_surfaces().await.len(), 1);

    settle().await;
    assert_eq!(h.store.fetches(), 1);
    assert_eq!(h.store.writes(), 1);
    assert_eq!(h.store.record(1).calendar_notes.as_deref(), Some("nuova"));
    assert!(h.sync.pending_surfaces().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_spaced_edits_write_each_time() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    for text in ["prima", "seconda", "terza"] {
        h.sync.apply_edit(1, Surface::CalendarNotes, notes(text)).await.unwrap();
        settle().await;
    }
    assert_eq!(h.store.writes(), 3);
    assert_eq!(h.store.record(1).calendar_notes.as_deref(), Some("terza"));
}

#[tokio::test(start_paused = true)]
async fn test_surfaces_debounce_independently() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("calendario")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    h.sync.apply_edit(1, Surface::InternalNotes, internal("interne")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.store.writes(), 1);

    settle().await;
    assert_eq!(h.store.writes(), 2);
    let record = h.store.record(1);
    assert_eq!(record.calendar_notes.as_deref(), Some("calendario"));
    assert_eq!(record.internal_notes.as_deref(), Some("interne"));
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_timer() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("persa")).await.unwrap();
    assert!(h.sync.close_surface(1, Surface::CalendarNotes).await);
    assert!(!h.sync.close_surface(1, Surface::CalendarNotes).await);

    settle().await;
    assert_eq!(h.store.fetches(), 0);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_cycle_completes_after_close_without_applying() {
    let h = harness(vec![base_record(1)], Duration::from_millis(500)).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("in volo")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(h.store.fetches(), 1);
    assert_eq!(h.store.writes(), 0);

    h.sync.close_surface(1, Surface::CalendarNotes).await;
    settle().await;

    assert_eq!(h.store.writes(), 1);
    assert_eq!(h.store.record(1).calendar_notes.as_deref(), Some("in volo"));
    assert!(h.commits.lock().unwrap().is_empty());
    assert!(h.sync.display_cache().get(1).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_surfaces_last_writer_wins() {
    let h = harness(vec![base_record(1)], Duration::from_millis(500)).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("da calendario")).await.unwrap();
    h.sync.apply_edit(1, Surface::InternalNotes, internal("da note interne")).await.unwrap();
    settle().await;

    assert_eq!(h.store.fetches(), 2);
    assert_eq!(h.store.writes(), 2);

    // Ambos ciclos leyeron la misma foto: la segunda escritura pisa la primera
    let record = h.store.record(1);
    let calendar_kept = record.calendar_notes.as_deref() == Some("da calendario");
    let internal_kept = record.internal_notes.as_deref() == Some("da note interne");
    assert!(calendar_kept ^ internal_kept);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_notifies_and_keeps_cache() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("confermata")).await.unwrap();
    settle().await;

    h.store.set_mode(Mode::FailWrites);
    h.sync.apply_edit(1, Surface::CalendarNotes, notes("fallita")).await.unwrap();
    settle().await;

    assert_eq!(h.failures.lock().unwrap().as_slice(), &["WRITE_ERROR"]);
    assert_eq!(h.commits.lock().unwrap().len(), 1);
    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 0);

    let cached = h.sync.display_cache().get(1).await.unwrap();
    assert_eq!(cached.calendar_notes.as_deref(), Some("confermata"));
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_signs_out() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;
    h.store.set_mode(Mode::Unauthorized);

    h.sync.apply_edit(1, Surface::InternalNotes, internal("nota")).await.unwrap();
    settle().await;

    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 1);
    assert!(h.failures.lock().unwrap().is_empty());
    assert_eq!(h.store.fetches(), 1);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_record_reports_failure() {
    let h = harness(Vec::new(), Duration::ZERO).await;

    h.sync.apply_edit(99, Surface::CalendarNotes, notes("orfana")).await.unwrap();
    settle().await;

    assert_eq!(h.failures.lock().unwrap().as_slice(), &["NOT_FOUND"]);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_incomplete_custom_window_never_fetches() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    let bundle = FieldBundle::new()
        .with(FieldChange::Date(Some(day())))
        .with(FieldChange::CustomWindow {
            start: NaiveTime::from_hms_opt(10, 0, 0),
            end: None,
        });
    h.sync.apply_edit(1, Surface::Scheduling, bundle).await.unwrap();

    let result = h.sync.flush(1, Surface::Scheduling).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(h.store.fetches(), 0);
    assert_eq!(h.failures.lock().unwrap().as_slice(), &["VALIDATION_ERROR"]);
}

#[tokio::test(start_paused = true)]
async fn test_field_outside_surface_is_rejected() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    let result = h.sync.apply_edit(1, Surface::CalendarNotes, internal("sbagliata")).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(h.sync.pending_surfaces().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flush_writes_immediately() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("subito")).await.unwrap();
    let written = h.sync.flush(1, Surface::CalendarNotes).await.unwrap().unwrap();
    assert_eq!(written.calendar_notes.as_deref(), Some("subito"));
    assert_eq!(h.store.writes(), 1);

    settle().await;
    assert_eq!(h.store.writes(), 1);
    assert!(h.sync.flush(1, Surface::CalendarNotes).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_scheduling_commit_updates_display() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;
    h.directory
        .remember(&Technician {
            id: 8,
            name: "Ciro".to_string(),
            surname: "Russo".to_string(),
            email: None,
            phone_number: None,
        })
        .await;

    let bundle = FieldBundle::new()
        .with(FieldChange::Date(Some(day())))
        .with(FieldChange::Slot(TimeSlot::Morning))
        .with(FieldChange::AssignedTo(Some(8)));
    h.sync.apply_edit(1, Surface::Scheduling, bundle).await.unwrap();
    settle().await;

    let written = h.store.last_written();
    assert_eq!(written.from_datetime, day().and_hms_opt(8, 0, 0));
    assert_eq!(written.to_datetime, day().and_hms_opt(13, 0, 0));
    assert_eq!(written.assigned_to, Some(8));
    assert_eq!(written.calendar_notes.as_deref(), Some("citofono rotto"));

    let commits = h.commits.lock().unwrap();
    assert_eq!(commits.len(), 1);
    let display = &commits[0].display;
    assert_eq!(display.formatted_date.as_deref(), Some("15/01/2024"));
    assert_eq!(display.formatted_time.as_deref(), Some("08:00 - 13:00"));
    assert_eq!(display.slot_label.as_deref(), Some("15/01/2024 - Mattina (8:00 - 13:00)"));
    assert_eq!(display.technician.as_deref(), Some("Ciro Russo"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_everything() {
    let h = harness(vec![base_record(1), base_record(2)], Duration::ZERO).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("uno")).await.unwrap();
    h.sync.apply_edit(2, Surface::InternalNotes, internal("due")).await.unwrap();
    assert_eq!(h.sync.pending_surfaces().await.len(), 2);

    h.sync.shutdown().await;
    settle().await;

    assert!(h.sync.pending_surfaces().await.is_empty());
    assert_eq!(h.store.fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_remote_values_survive_notes_edit() {
    let snapshot = json!({
        "id": 1,
        "time_slot": "mattina",
        "cancelled_at": "15/01/2024 09:00",
        "from_datetime": "2024-01-15T08:00:00Z",
        "connected_articles": [{"article_id": 9, "quantity": 2, "name": "Filtro", "unit_price": 12.5}],
        "calendar_notes": "vecchia"
    });
    let h = harness_with(FakeStore::from_json(vec![snapshot.clone()], Duration::ZERO)).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("nuova")).await.unwrap();
    settle().await;

    let stored = h.store.raw(1);
    assert_eq!(stored["calendar_notes"], json!("nuova"));
    for key in ["time_slot", "cancelled_at", "from_datetime", "connected_articles"] {
        assert_eq!(stored[key], snapshot[key], "{} was rewritten", key);
    }
    assert!(stored.get("to_datetime").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_custom_window_typed_in_steps_is_one_write() {
    let mut record = base_record(1);
    record.date = Some(day());
    let h = harness(vec![record], Duration::ZERO).await;

    let partial = FieldBundle::new().with(FieldChange::CustomWindow {
        start: NaiveTime::from_hms_opt(10, 0, 0),
        end: None,
    });
    let complete = FieldBundle::new().with(FieldChange::CustomWindow {
        start: NaiveTime::from_hms_opt(10, 0, 0),
        end: NaiveTime::from_hms_opt(15, 0, 0),
    });

    h.sync.apply_edit(1, Surface::Scheduling, partial).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.sync.apply_edit(1, Surface::Scheduling, complete).await.unwrap();
    settle().await;

    assert_eq!(h.store.writes(), 1);
    assert!(h.failures.lock().unwrap().is_empty());
    let written = h.store.record(1);
    assert_eq!(written.from_datetime, day().and_hms_opt(10, 0, 0));
    assert_eq!(written.to_datetime, day().and_hms_opt(15, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_failed_changes_ride_along_with_next_edit() {
    let mut record = base_record(1);
    record.date = Some(day());
    record.from_datetime = day().and_hms_opt(8, 0, 0);
    record.to_datetime = day().and_hms_opt(13, 0, 0);
    let h = harness(vec![record], Duration::ZERO).await;
    let next_day = day().succ_opt().unwrap();

    h.store.set_mode(Mode::FailWrites);
    h.sync
        .apply_edit(1, Surface::Scheduling, FieldBundle::new().with(FieldChange::Date(Some(next_day))))
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.failures.lock().unwrap().as_slice(), &["WRITE_ERROR"]);
    assert_eq!(h.store.writes(), 0);

    h.store.set_mode(Mode::Healthy);
    h.sync
        .apply_edit(1, Surface::Scheduling, FieldBundle::new().with(FieldChange::Slot(TimeSlot::Afternoon)))
        .await
        .unwrap();
    settle().await;

    assert_eq!(h.store.writes(), 1);
    let written = h.store.record(1);
    assert_eq!(written.date, Some(next_day));
    assert_eq!(written.from_datetime, next_day.and_hms_opt(14, 0, 0));
    assert_eq!(written.to_datetime, next_day.and_hms_opt(18, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_settled_surface_is_released() {
    let h = harness(vec![base_record(1)], Duration::ZERO).await;

    h.sync.apply_edit(1, Surface::CalendarNotes, notes("fatto")).await.unwrap();
    settle().await;

    assert_eq!(h.store.writes(), 1);
    assert!(!h.sync.close_surface(1, Surface::CalendarNotes).await);
}
