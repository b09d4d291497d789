use crate::components::{agenda::Agenda, ComponentManager};
use crate::config::Config;
use crate::error::Error;
use crate::shutdown;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Initialize components and run the engine until a shutdown signal
pub async fn start_engine(config: Arc<RwLock<Config>>) -> miette::Result<()> {
    // Initialize component manager
    let mut component_manager = ComponentManager::new(Arc::clone(&config));

    // Register the agenda component if enabled
    let agenda_enabled = {
        let config_read = config.read().await;
        config_read.is_component_enabled("agenda")
    };
    if agenda_enabled {
        component_manager.register(Agenda::new());
    }

    // Create a shared component manager and bring components up
    let component_manager = Arc::new(component_manager);
    component_manager.init_all().await?;

    // Prime today's view; rendering is someone else's job, the engine
    // only keeps the store synchronized
    if let Some(handle) = agenda_handle(&component_manager).await {
        let today = today_in_configured_timezone(&config).await;
        match handle.select_date(today).await {
            Ok(events) => info!("Loaded {} event(s) for {}", events.len(), today),
            Err(e) => error!("Initial fetch failed: {}", e),
        }
    }

    // Create shutdown channel
    let (shutdown_send, shutdown_recv) = oneshot::channel();

    // Clone component manager for shutdown handler
    let shutdown_components = Arc::clone(&component_manager);

    // Spawn signal handler task
    tokio::spawn(async move {
        shutdown::handle_signals(shutdown_send, shutdown_components).await;
    });

    info!("Engine running, waiting for shutdown signal");
    let _ = shutdown_recv.await;
    info!("Engine stopped");

    Ok(())
}

/// Get the agenda handle from the component manager, if registered
async fn agenda_handle(
    component_manager: &Arc<ComponentManager>,
) -> Option<crate::components::AgendaHandle> {
    let component = component_manager.get_component_by_name("agenda")?;
    let agenda = component.as_any().downcast_ref::<Agenda>()?;
    agenda.get_handle().await
}

/// Resolve "today" in the configured timezone
async fn today_in_configured_timezone(config: &Arc<RwLock<Config>>) -> NaiveDate {
    let timezone = {
        let config_read = config.read().await;
        config_read.timezone.clone()
    };

    match timezone.parse::<Tz>() {
        Ok(tz) => Utc::now().with_timezone(&tz).date_naive(),
        Err(_) => {
            warn!("Invalid timezone '{}', falling back to UTC", timezone);
            Utc::now().date_naive()
        }
    }
}
