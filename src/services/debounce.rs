//! Tarea programada con debounce
//!
//! Cada superficie editable posee su propia `DebouncedTask`. Reprogramar
//! cancela el temporizador anterior; al vencer, la acción se lanza como tarea
//! independiente, de modo que cancelar después ya no la interrumpe.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct DebouncedTask {
    name: String,
    delay: Duration,
    handle: Option<JoinHandle<()>>,
}

impl DebouncedTask {
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)inicia el temporizador; la acción corre cuando pasa `delay` sin
    /// otra llamada a `schedule` o `cancel`.
    pub fn schedule(&mut self, action: BoxFuture<'static, ()>) {
        if self.cancel() {
            debug!("⏱️ {}: temporizador reiniciado", self.name);
        }

        let delay = self.delay;
        let name = self.name.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("⏰ {}: temporizador vencido", name);
            tokio::spawn(action);
        }));
    }

    /// Cancela el temporizador pendiente. Devuelve `true` si había uno.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for DebouncedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
