//! Sincronización de ediciones parciales sobre el registro remoto
//!
//! Cada superficie editable de una intervención (notas de calendario, notas
//! internas, bloque de planificación) tiene su propio temporizador de
//! debounce. Al vencer, se ejecuta un ciclo leer-modificar-escribir:
//!
//! 1. `GET` del registro completo.
//! 2. Los campos de la edición toman el valor nuevo; todo lo demás, incluidas
//!    las asociaciones y los campos desconocidos, se copia del registro leído.
//! 3. `PUT` del registro completo (el backend no tiene escritura parcial).
//! 4. En éxito se actualiza la cache de presentación con lo escrito y se
//!    avisan los hooks `on_committed`; en fallo se avisan los `on_failed`.
//!
//! El backend no tiene versiones: dos superficies que escriben el mismo
//! registro en la misma ventana corta se pisan, gana la última escritura.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::{DisplayCache, DisplayEntry};
use crate::client::InterventionStore;
use crate::models::{Intervention, SlotKind, TimeSlot};
use crate::services::debounce::DebouncedTask;
use crate::services::slot_codec::SlotCodec;
use crate::services::technician_directory::TechnicianDirectory;
use crate::utils::errors::{validation_error, AppError, AppResult};
use crate::utils::validation::validate_custom_window;

/// Área editable con debounce propio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    CalendarNotes,
    InternalNotes,
    Scheduling,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::CalendarNotes => "calendar_notes",
            Surface::InternalNotes => "internal_notes",
            Surface::Scheduling => "scheduling",
        }
    }

    /// Una superficie solo puede tocar sus propios campos
    pub fn accepts(&self, change: &FieldChange) -> bool {
        match self {
            Surface::CalendarNotes => matches!(change, FieldChange::CalendarNotes(_)),
            Surface::InternalNotes => matches!(change, FieldChange::InternalNotes(_)),
            Surface::Scheduling => matches!(
                change,
                FieldChange::Date(_)
                    | FieldChange::Slot(_)
                    | FieldChange::CustomWindow { .. }
                    | FieldChange::AssignedTo(_)
            ),
        }
    }
}

/// Cambio de un campo
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    CalendarNotes(Option<String>),
    InternalNotes(Option<String>),
    Date(Option<NaiveDate>),
    Slot(TimeSlot),
    /// Ventana personalizada tal como la está escribiendo el usuario
    CustomWindow {
        start: Option<NaiveTime>,
        end: Option<NaiveTime>,
    },
    AssignedTo(Option<i64>),
}

/// Conjunto de cambios de una superficie, aplicados en orden de llegada
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldBundle {
    changes: Vec<FieldChange>,
}

impl FieldChange {
    /// Campo del registro que el cambio sobrescribe. `Slot` y `CustomWindow`
    /// comparten campo: el último de los dos gana.
    pub fn field(&self) -> &'static str {
        match self {
            FieldChange::CalendarNotes(_) => "calendar_notes",
            FieldChange::InternalNotes(_) => "internal_notes",
            FieldChange::Date(_) => "date",
            FieldChange::Slot(_) | FieldChange::CustomWindow { .. } => "time_slot",
            FieldChange::AssignedTo(_) => "assigned_to",
        }
    }
}

const WINDOW_FIELDS: [&str; 4] = ["date", "time_slot", "from_datetime", "to_datetime"];

impl FieldBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, change: FieldChange) -> Self {
        self.push(change);
        self
    }

    /// Añade un cambio; uno anterior sobre el mismo campo queda descartado
    pub fn push(&mut self, change: FieldChange) {
        let field = change.field();
        self.changes.retain(|previous| previous.field() != field);
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn absorb(&mut self, other: FieldBundle) {
        for change in other.changes {
            self.push(change);
        }
    }

    /// Una ventana personalizada necesita inicio y fin antes de escribir
    pub fn validate(&self) -> AppResult<()> {
        for change in &self.changes {
            match change {
                FieldChange::CustomWindow { start, end } => {
                    validate_custom_window(*start, *end)?;
                }
                FieldChange::Slot(TimeSlot::Custom { start, end }) => {
                    validate_custom_window(Some(*start), Some(*end))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Aplica los cambios sobre el registro recién leído.
    ///
    /// Si se toca la planificación, la ventana concreta se recalcula desde el
    /// día (posiblemente nuevo) y la franja (nueva o la que ya tenía). Solo
    /// los campos tocados se marcan para reenviarse.
    pub fn apply_to(&self, record: &mut Intervention) -> AppResult<()> {
        self.validate()?;

        let mut slot = None;
        let mut schedule_touched = false;

        for change in &self.changes {
            match change {
                FieldChange::CalendarNotes(notes) => record.calendar_notes = notes.clone(),
                FieldChange::InternalNotes(notes) => record.internal_notes = notes.clone(),
                FieldChange::AssignedTo(technician) => record.assigned_to = *technician,
                FieldChange::Date(date) => {
                    record.date = *date;
                    schedule_touched = true;
                }
                FieldChange::Slot(new_slot) => {
                    slot = Some(*new_slot);
                    schedule_touched = true;
                }
                FieldChange::CustomWindow { start, end } => {
                    let (start, end) = validate_custom_window(*start, *end)?;
                    slot = Some(TimeSlot::Custom { start, end });
                    schedule_touched = true;
                }
            }
            if !WINDOW_FIELDS.contains(&change.field()) {
                record.mark_dirty(change.field());
            }
        }

        if schedule_touched {
            let slot = slot.or_else(|| current_slot(record));
            match (record.date, slot) {
                (Some(date), Some(slot)) => {
                    let range = SlotCodec::encode(date, slot);
                    record.from_datetime = Some(range.from_datetime);
                    record.to_datetime = Some(range.to_datetime);
                    record.time_slot = Some(slot.kind());
                    mark_window_dirty(record);
                }
                (None, _) => {
                    record.from_datetime = None;
                    record.to_datetime = None;
                    record.time_slot = None;
                    mark_window_dirty(record);
                }
                // Día sin franja: la ventana sigue pendiente
                (Some(_), None) => record.mark_dirty("date"),
            }
        }

        Ok(())
    }
}

fn mark_window_dirty(record: &mut Intervention) {
    for field in WINDOW_FIELDS {
        record.mark_dirty(field);
    }
}

fn current_slot(record: &Intervention) -> Option<TimeSlot> {
    match (record.from_datetime, record.to_datetime) {
        (Some(from), Some(to)) => Some(SlotCodec::decode(from, to)),
        _ => match record.time_slot? {
            SlotKind::Morning => Some(TimeSlot::Morning),
            SlotKind::Afternoon => Some(TimeSlot::Afternoon),
            SlotKind::FullDay => Some(TimeSlot::FullDay),
            SlotKind::Custom => None,
        },
    }
}

/// Payload de escritura: registro leído + cambios de la superficie
pub fn build_write_payload(snapshot: &Intervention, bundle: &FieldBundle) -> AppResult<Intervention> {
    let mut payload = snapshot.clone();
    bundle.apply_to(&mut payload)?;
    Ok(payload)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceKey {
    pub record_id: i64,
    pub surface: Surface,
}

/// Escritura confirmada
#[derive(Debug, Clone)]
pub struct CommitEvent {
    pub record_id: i64,
    pub surface: Surface,
    pub record: Intervention,
    pub display: DisplayEntry,
}

/// Ciclo fallido
#[derive(Debug)]
pub struct FailureEvent<'a> {
    pub record_id: i64,
    pub surface: Surface,
    pub error: &'a AppError,
}

pub type CommitHook = Arc<dyn Fn(&CommitEvent) + Send + Sync>;
pub type FailureHook = Arc<dyn Fn(&FailureEvent<'_>) + Send + Sync>;
pub type SignOutHook = Arc<dyn Fn(&AppError) + Send + Sync>;

struct SurfaceState {
    epoch: u64,
    task: DebouncedTask,
    pending: FieldBundle,
    /// Ciclos que ya tomaron cambios y aún no terminaron
    in_flight: usize,
    cycle_lock: Arc<Mutex<()>>,
}

struct SyncShared {
    store: Arc<dyn InterventionStore>,
    technicians: TechnicianDirectory,
    display_cache: DisplayCache,
    debounce: Duration,
    surfaces: Mutex<HashMap<SurfaceKey, SurfaceState>>,
    next_epoch: AtomicU64,
    committed_hooks: RwLock<Vec<CommitHook>>,
    failed_hooks: RwLock<Vec<FailureHook>>,
    sign_out_hooks: RwLock<Vec<SignOutHook>>,
}

/// Sincronizador de ediciones con debounce por superficie
#[derive(Clone)]
pub struct RecordSynchronizer {
    shared: Arc<SyncShared>,
}

impl RecordSynchronizer {
    pub fn new(
        store: Arc<dyn InterventionStore>,
        technicians: TechnicianDirectory,
        display_cache: DisplayCache,
        debounce: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(SyncShared {
                store,
                technicians,
                display_cache,
                debounce,
                surfaces: Mutex::new(HashMap::new()),
                next_epoch: AtomicU64::new(1),
                committed_hooks: RwLock::new(Vec::new()),
                failed_hooks: RwLock::new(Vec::new()),
                sign_out_hooks: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn display_cache(&self) -> &DisplayCache {
        &self.shared.display_cache
    }

    pub fn debounce(&self) -> Duration {
        self.shared.debounce
    }

    pub async fn on_committed<F>(&self, hook: F)
    where
        F: Fn(&CommitEvent) + Send + Sync + 'static,
    {
        self.shared.committed_hooks.write().await.push(Arc::new(hook));
    }

    pub async fn on_failed<F>(&self, hook: F)
    where
        F: Fn(&FailureEvent<'_>) + Send + Sync + 'static,
    {
        self.shared.failed_hooks.write().await.push(Arc::new(hook));
    }

    /// Un 401 en cualquier ciclo cierra la sesión globalmente
    pub async fn on_sign_out<F>(&self, hook: F)
    where
        F: Fn(&AppError) + Send + Sync + 'static,
    {
        self.shared.sign_out_hooks.write().await.push(Arc::new(hook));
    }

    /// Encola una edición parcial y reinicia el debounce de su superficie
    pub async fn apply_edit(&self, record_id: i64, surface: Surface, bundle: FieldBundle) -> AppResult<()> {
        if bundle.changes().iter().any(|change| !surface.accepts(change)) {
            warn!("⚠️ Edición rechazada: campo ajeno a la superficie {}", surface.as_str());
            return Err(validation_error("surface", "field does not belong to this surface"));
        }
        if bundle.is_empty() {
            return Ok(());
        }

        let key = SurfaceKey { record_id, surface };
        let mut surfaces = self.shared.surfaces.lock().await;
        let state = surfaces.entry(key).or_insert_with(|| self.shared.open_state(key));
        state.pending.absorb(bundle);

        let shared = Arc::clone(&self.shared);
        let epoch = state.epoch;
        state.task.schedule(Box::pin(async move {
            // El resultado ya se notificó por los hooks
            let _ = shared.run_cycle(key, epoch).await;
        }));

        debug!(
            "✏️ Edición encolada en {} ({}), {} cambios pendientes",
            record_id,
            surface.as_str(),
            state.pending.changes().len()
        );
        Ok(())
    }

    /// Ejecuta ya el ciclo pendiente de la superficie y devuelve su resultado
    pub async fn flush(&self, record_id: i64, surface: Surface) -> AppResult<Option<Intervention>> {
        let key = SurfaceKey { record_id, surface };
        let epoch = {
            let mut surfaces = self.shared.surfaces.lock().await;
            match surfaces.get_mut(&key) {
                Some(state) => {
                    state.task.cancel();
                    state.epoch
                }
                None => return Ok(None),
            }
        };
        self.shared.run_cycle(key, epoch).await
    }

    /// Cierre de la superficie: cancela solo su temporizador. Un ciclo ya
    /// lanzado termina, pero su resultado no se aplica.
    pub async fn close_surface(&self, record_id: i64, surface: Surface) -> bool {
        let key = SurfaceKey { record_id, surface };
        let removed = self.shared.surfaces.lock().await.remove(&key);
        match removed {
            Some(mut state) => {
                let cancelled = state.task.cancel();
                info!(
                    "🚪 Superficie {} de {} cerrada (temporizador cancelado: {})",
                    surface.as_str(),
                    record_id,
                    cancelled
                );
                true
            }
            None => false,
        }
    }

    pub async fn shutdown(&self) {
        let mut surfaces = self.shared.surfaces.lock().await;
        for (_, mut state) in surfaces.drain() {
            state.task.cancel();
        }
        info!("👋 Sincronizador detenido");
    }

    /// Superficies con un temporizador en marcha
    pub async fn pending_surfaces(&self) -> Vec<SurfaceKey> {
        self.shared
            .surfaces
            .lock()
            .await
            .iter()
            .filter(|(_, state)| state.task.is_pending())
            .map(|(key, _)| *key)
            .collect()
    }
}

impl SyncShared {
    fn open_state(&self, key: SurfaceKey) -> SurfaceState {
        let name = format!("intervention:{}:{}", key.record_id, key.surface.as_str());
        SurfaceState {
            epoch: self.next_epoch.fetch_add(1, Ordering::SeqCst),
            task: DebouncedTask::new(name, self.debounce),
            pending: FieldBundle::new(),
            in_flight: 0,
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn is_open(&self, key: SurfaceKey, epoch: u64) -> bool {
        self.surfaces
            .lock()
            .await
            .get(&key)
            .map_or(false, |state| state.epoch == epoch)
    }

    async fn run_cycle(&self, key: SurfaceKey, epoch: u64) -> AppResult<Option<Intervention>> {
        let (bundle, cycle_lock) = {
            let mut surfaces = self.surfaces.lock().await;
            match surfaces.get_mut(&key) {
                Some(state) if state.epoch == epoch && !state.pending.is_empty() => {
                    state.in_flight += 1;
                    (std::mem::take(&mut state.pending), Arc::clone(&state.cycle_lock))
                }
                Some(state) if state.epoch == epoch => return Ok(None),
                _ => {
                    debug!("🚪 {} ({}) ya no existe, ciclo omitido", key.record_id, key.surface.as_str());
                    return Ok(None);
                }
            }
        };

        // Un solo ciclo por superficie asentándose a la vez
        let _cycle = cycle_lock.lock().await;
        info!("🔄 Ciclo RMW de {} ({})", key.record_id, key.surface.as_str());

        let outcome = self.read_modify_write(key.record_id, &bundle).await;
        let still_open = self.is_open(key, epoch).await;

        match outcome {
            Ok(written) => {
                if still_open {
                    self.reflect(key, &written).await;
                } else {
                    info!(
                        "🚪 Superficie {} de {} cerrada durante el ciclo, resultado no aplicado",
                        key.surface.as_str(),
                        key.record_id
                    );
                }
                self.settle(key, epoch, None).await;
                Ok(Some(written))
            }
            Err(err) => {
                if err.is_unauthorized() {
                    warn!("🔒 Sesión caducada durante el ciclo de {}", key.record_id);
                    self.settle(key, epoch, None).await;
                    let hooks = self.sign_out_hooks.read().await.clone();
                    for hook in hooks {
                        hook(&err);
                    }
                } else if still_open {
                    error!(
                        "❌ Ciclo de {} ({}) fallido [{}]: {}",
                        key.record_id,
                        key.surface.as_str(),
                        err.code(),
                        err
                    );
                    // Los cambios no escritos vuelven a la cola, sin reintento
                    self.settle(key, epoch, Some(bundle)).await;
                    let hooks = self.failed_hooks.read().await.clone();
                    let event = FailureEvent {
                        record_id: key.record_id,
                        surface: key.surface,
                        error: &err,
                    };
                    for hook in hooks {
                        hook(&event);
                    }
                } else {
                    warn!("⚠️ Ciclo de superficie cerrada fallido: {}", err);
                }
                Err(err)
            }
        }
    }

    /// Cierra la cuenta de un ciclo. Con `failed` los cambios vuelven delante
    /// de los pendientes; una superficie sin nada pendiente se descarta.
    async fn settle(&self, key: SurfaceKey, epoch: u64, failed: Option<FieldBundle>) {
        let mut surfaces = self.surfaces.lock().await;
        let Some(state) = surfaces.get_mut(&key).filter(|state| state.epoch == epoch) else {
            return;
        };

        state.in_flight = state.in_flight.saturating_sub(1);
        if let Some(mut restored) = failed {
            restored.absorb(std::mem::take(&mut state.pending));
            state.pending = restored;
        }

        if state.in_flight == 0 && state.pending.is_empty() && !state.task.is_pending() {
            surfaces.remove(&key);
            debug!("🧹 Superficie {} de {} asentada", key.surface.as_str(), key.record_id);
        }
    }

    async fn read_modify_write(&self, record_id: i64, bundle: &FieldBundle) -> AppResult<Intervention> {
        bundle.validate()?;

        let snapshot = self.store.fetch_intervention(record_id).await?;
        let payload = build_write_payload(&snapshot, bundle)?;
        self.store.write_intervention(&payload).await?;

        info!("✅ Intervención {} sincronizada", record_id);
        Ok(payload)
    }

    /// Reflejo optimista: la cache se actualiza con lo escrito, sin releer
    async fn reflect(&self, key: SurfaceKey, written: &Intervention) {
        let technician = match written.assigned_to {
            Some(id) => self.technicians.display_name(id).await,
            None => None,
        };
        let display = DisplayEntry::from_record(written, technician);
        self.display_cache.put(display.clone()).await;

        let event = CommitEvent {
            record_id: key.record_id,
            surface: key.surface,
            record: written.clone(),
            display,
        };
        let hooks = self.committed_hooks.read().await.clone();
        for hook in hooks {
            hook(&event);
        }
    }
}
