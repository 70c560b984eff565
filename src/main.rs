use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use intervention_scheduler::cache::DisplayCache;
use intervention_scheduler::client::{InterventionApiClient, InterventionStore};
use intervention_scheduler::config::environment::EnvironmentConfig;
use intervention_scheduler::models::SessionContext;
use intervention_scheduler::services::{
    AccessPolicy, AssignmentClassifier, CalendarView, ClassifierConfig, RecordSynchronizer, SlotCodec,
    TechnicianDirectory,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🛠️ Planificador de intervenciones");
    info!("================================");

    let config = EnvironmentConfig::from_env()?;
    info!("🌐 Backend: {} ({})", config.api_base_url, config.environment);

    let policy = match &config.access_policy_path {
        Some(path) => AccessPolicy::from_json_file(path)?,
        None => AccessPolicy::builtin(),
    };

    // Sesión entregada por el proveedor de identidad
    let session = SessionContext::new(config.session_role.as_deref().unwrap_or_default());
    if !policy.is_valid_role(session.role.as_str()) {
        warn!("🔒 Rol '{}' no válido, aterrizaje en {}", session.role.as_str(), policy.get_default_route(&session.role));
        return Ok(());
    }

    info!(
        "👤 Rol '{}', aterrizaje en {}",
        session.role.as_str(),
        policy.get_default_route(&session.role)
    );
    for section in policy.visible_sections(&session.role) {
        info!("   📁 {} → {}", section.label, section.path);
    }

    let store: Arc<dyn InterventionStore> = Arc::new(InterventionApiClient::from_config(&config)?);
    let classifier = AssignmentClassifier::new(store.clone(), ClassifierConfig::from(&config));
    let directory = TechnicianDirectory::new(store.clone(), config.technician_role_id);
    let synchronizer = RecordSynchronizer::new(store, directory, DisplayCache::new(), config.sync_debounce);

    synchronizer
        .on_sign_out(|err| warn!("🔒 Sesión cerrada por el backend: {}", err))
        .await;
    synchronizer
        .on_failed(|event| error!("❌ Intervención {} no guardada: {}", event.record_id, event.error))
        .await;

    match classifier.list_unassigned().await {
        Ok(queue) => {
            for record in queue.iter().take(20) {
                info!("   📌 #{} cliente {:?} día {:?}", record.id, record.customer_id, record.date);
            }
        }
        Err(e) if e.is_unauthorized() => {
            error!("❌ Credenciales rechazadas por el backend: {}", e);
            return Err(e.into());
        }
        Err(e) => error!("❌ Error cargando pendientes: {}", e),
    }

    let today = Local::now().date_naive();
    match classifier.load_view(CalendarView::Week(today)).await {
        Ok(week) => {
            info!("📅 {} intervenciones esta semana", week.len());
            for record in &week {
                if let (Some(from), Some(to)) = (record.from_datetime, record.to_datetime) {
                    let slot = SlotCodec::decode(from, to);
                    info!("   🕗 #{} {}", record.id, SlotCodec::format_legacy_string(from.date(), slot));
                }
            }
        }
        Err(e) => error!("❌ Error cargando el calendario: {}", e),
    }

    info!("✅ Listo; Ctrl+C para salir");
    signal::ctrl_c().await?;

    synchronizer.shutdown().await;
    info!("👋 Hasta luego");
    Ok(())
}
