use super::actor::{AgendaActor, AgendaActorHandle};
use super::api::EventApi;
use super::holidays::{Holiday, HolidayCalendar};
use super::models::{Event, EventDraft};
use super::view::Granularity;
use crate::config::Config;
use crate::error::CalResult;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Handle for interacting with the agenda actor
#[derive(Clone)]
pub struct AgendaHandle {
    actor_handle: AgendaActorHandle,
    _actor_task: Arc<JoinHandle<()>>,
}

impl AgendaHandle {
    /// Create a new AgendaHandle and spawn the actor
    pub fn new(
        config: Arc<RwLock<Config>>,
        api: Arc<dyn EventApi>,
        holidays: HolidayCalendar,
    ) -> Self {
        // Create the actor and get its handle
        let (mut actor, handle) = AgendaActor::new(config, api, holidays);

        // Spawn a task to run the actor
        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            _actor_task: Arc::new(actor_task),
        }
    }

    /// Set the anchor date and fetch its events from the backend
    pub async fn select_date(&self, date: NaiveDate) -> CalResult<Vec<Event>> {
        self.actor_handle.select_date(date).await
    }

    /// Change the view granularity and return the recomputed visible set
    pub async fn set_granularity(&self, granularity: Granularity) -> CalResult<Vec<Event>> {
        self.actor_handle.set_granularity(granularity).await
    }

    /// Current visible set for the anchor date and granularity
    pub async fn visible(&self) -> CalResult<Vec<Event>> {
        self.actor_handle.visible().await
    }

    /// Locally held events for a date, without fetching
    pub async fn events_on(&self, date: NaiveDate) -> CalResult<Vec<Event>> {
        self.actor_handle.events_on(date).await
    }

    /// Create an event from a draft
    pub async fn create_event(&self, draft: EventDraft) -> CalResult<Event> {
        self.actor_handle.create_event(draft).await
    }

    /// Update an existing event
    pub async fn update_event(&self, id: impl Into<String>, draft: EventDraft) -> CalResult<Event> {
        self.actor_handle.update_event(id, draft).await
    }

    /// Delete an existing event
    pub async fn delete_event(&self, id: impl Into<String>) -> CalResult<()> {
        self.actor_handle.delete_event(id).await
    }

    /// Holidays in a year and month
    pub async fn holidays_in_month(&self, year: i32, month: u32) -> CalResult<Vec<Holiday>> {
        self.actor_handle.holidays_in_month(year, month).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> CalResult<()> {
        self.actor_handle.shutdown().await
    }
}
