//! Directorio de técnicos
//!
//! Envuelve `GET /users?role_id&query` y recuerda el nombre visible de cada
//! técnico visto, para la cache de presentación.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::InterventionStore;
use crate::models::Technician;
use crate::utils::errors::AppResult;

#[derive(Clone)]
pub struct TechnicianDirectory {
    store: Arc<dyn InterventionStore>,
    role_id: i64,
    names: Arc<RwLock<HashMap<i64, String>>>,
}

impl TechnicianDirectory {
    pub fn new(store: Arc<dyn InterventionStore>, role_id: i64) -> Self {
        Self {
            store,
            role_id,
            names: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Busca técnicos por texto libre y recuerda sus nombres
    pub async fn search(&self, query: &str) -> AppResult<Vec<Technician>> {
        let technicians = self.store.search_technicians(self.role_id, query).await?;
        info!("🔎 Búsqueda de técnicos '{}': {} resultados", query, technicians.len());

        let mut names = self.names.write().await;
        for technician in &technicians {
            names.insert(technician.id, technician.display_name());
        }
        Ok(technicians)
    }

    pub async fn remember(&self, technician: &Technician) {
        debug!("👷 Técnico {} registrado", technician.id);
        self.names
            .write()
            .await
            .insert(technician.id, technician.display_name());
    }

    /// Nombre visible ya conocido; no llama al backend
    pub async fn display_name(&self, id: i64) -> Option<String> {
        self.names.read().await.get(&id).cloned()
    }
}
