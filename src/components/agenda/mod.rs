mod actor;
pub mod api;
mod handle;
pub mod holidays;
pub mod models;
pub mod store;
pub mod time;
pub mod view;

pub use handle::AgendaHandle;
pub use models::{Event, EventDraft, SyncState};
pub use view::Granularity;

use crate::config::Config;
use crate::error::CalResult;
use api::HttpEventApi;
use async_trait::async_trait;
use holidays::HolidayCalendar;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Agenda component: the event store and view-synchronization engine
#[derive(Default)]
pub struct Agenda {
    handle: RwLock<Option<AgendaHandle>>,
}

impl Agenda {
    /// Create a new agenda component
    pub fn new() -> Self {
        Self {
            handle: RwLock::new(None),
        }
    }

    /// Get the handle if it exists
    pub async fn get_handle(&self) -> Option<AgendaHandle> {
        let handle_lock = self.handle.read().await;
        handle_lock.clone()
    }
}

#[async_trait]
impl super::Component for Agenda {
    fn name(&self) -> &'static str {
        "agenda"
    }

    async fn init(&self, config: Arc<RwLock<Config>>) -> CalResult<()> {
        // Create a new handle if one doesn't exist
        let mut handle_lock = self.handle.write().await;
        if handle_lock.is_none() {
            let api = {
                let config_read = config.read().await;
                Arc::new(HttpEventApi::new(&config_read)?)
            };
            let holidays = HolidayCalendar::load();
            *handle_lock = Some(AgendaHandle::new(config.clone(), api, holidays));
        }

        Ok(())
    }

    async fn shutdown(&self) -> CalResult<()> {
        // Shutdown the handle if it exists
        let handle_lock = self.handle.read().await;
        if let Some(handle) = &*handle_lock {
            handle.shutdown().await?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
