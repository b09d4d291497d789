use super::api::EventApi;
use super::holidays::{Holiday, HolidayCalendar};
use super::models::{Event, EventDraft, EventKey, SyncState};
use super::store::EventStore;
use super::view::{visible, Granularity};
use crate::config::Config;
use crate::error::{
    busy_error, cancelled_error, component_error, not_found_error, CalResult,
};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// The agenda actor: owns the event store and serializes every mutation.
///
/// Backend calls run in spawned tasks that message their outcome back to
/// the actor, so the command loop never blocks on the wire and further
/// user actions proceed while a reconciliation is pending.
pub struct AgendaActor {
    config: Arc<RwLock<Config>>,
    api: Arc<dyn EventApi>,
    store: EventStore,
    holidays: HolidayCalendar,
    anchor: Option<NaiveDate>,
    granularity: Granularity,
    /// Identities with exactly one reconciliation in flight
    in_flight: HashSet<EventKey>,
    fetch_generation: u64,
    fetch_cancel: Option<CancellationToken>,
    command_rx: mpsc::Receiver<AgendaCommand>,
    resolution_rx: mpsc::Receiver<Resolution>,
    resolution_tx: mpsc::Sender<Resolution>,
}

/// Commands that can be sent to the agenda actor
pub enum AgendaCommand {
    SelectDate(NaiveDate, mpsc::Sender<CalResult<Vec<Event>>>),
    SetGranularity(Granularity, mpsc::Sender<CalResult<Vec<Event>>>),
    Visible(mpsc::Sender<CalResult<Vec<Event>>>),
    EventsOn(NaiveDate, mpsc::Sender<CalResult<Vec<Event>>>),
    Create(EventDraft, mpsc::Sender<CalResult<Event>>),
    Update(String, EventDraft, mpsc::Sender<CalResult<Event>>),
    Delete(String, mpsc::Sender<CalResult<()>>),
    HolidaysInMonth(i32, u32, mpsc::Sender<CalResult<Vec<Holiday>>>),
    Shutdown,
}

/// Outcome of a spawned backend call, applied on the actor loop
enum Resolution {
    Fetch {
        date: NaiveDate,
        generation: u64,
        result: CalResult<Vec<Event>>,
        resp: mpsc::Sender<CalResult<Vec<Event>>>,
    },
    Create {
        client_ref: Uuid,
        result: CalResult<Event>,
        resp: mpsc::Sender<CalResult<Event>>,
    },
    Update {
        id: String,
        client_ref: Uuid,
        result: CalResult<Event>,
        resp: mpsc::Sender<CalResult<Event>>,
    },
    Delete {
        id: String,
        result: CalResult<()>,
        resp: mpsc::Sender<CalResult<()>>,
    },
}

/// Handle for communicating with the agenda actor
#[derive(Clone)]
pub struct AgendaActorHandle {
    command_tx: mpsc::Sender<AgendaCommand>,
}

impl AgendaActorHandle {
    /// Set the anchor date and fetch its events from the backend
    pub async fn select_date(&self, date: NaiveDate) -> CalResult<Vec<Event>> {
        self.request(|resp| AgendaCommand::SelectDate(date, resp))
            .await
    }

    /// Change the view granularity and return the recomputed visible set
    pub async fn set_granularity(&self, granularity: Granularity) -> CalResult<Vec<Event>> {
        self.request(|resp| AgendaCommand::SetGranularity(granularity, resp))
            .await
    }

    /// Current visible set for the anchor date and granularity
    pub async fn visible(&self) -> CalResult<Vec<Event>> {
        self.request(AgendaCommand::Visible).await
    }

    /// Locally held events for a date, without fetching
    pub async fn events_on(&self, date: NaiveDate) -> CalResult<Vec<Event>> {
        self.request(|resp| AgendaCommand::EventsOn(date, resp))
            .await
    }

    /// Create an event from a draft
    pub async fn create_event(&self, draft: EventDraft) -> CalResult<Event> {
        self.request(|resp| AgendaCommand::Create(draft, resp)).await
    }

    /// Update an existing event
    pub async fn update_event(&self, id: impl Into<String>, draft: EventDraft) -> CalResult<Event> {
        self.request(|resp| AgendaCommand::Update(id.into(), draft, resp))
            .await
    }

    /// Delete an existing event
    pub async fn delete_event(&self, id: impl Into<String>) -> CalResult<()> {
        self.request(|resp| AgendaCommand::Delete(id.into(), resp))
            .await
    }

    /// Holidays in a year and month
    pub async fn holidays_in_month(&self, year: i32, month: u32) -> CalResult<Vec<Holiday>> {
        self.request(|resp| AgendaCommand::HolidaysInMonth(year, month, resp))
            .await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> CalResult<()> {
        let _ = self.command_tx.send(AgendaCommand::Shutdown).await;
        Ok(())
    }

    async fn request<T, F>(&self, command: F) -> CalResult<T>
    where
        F: FnOnce(mpsc::Sender<CalResult<T>>) -> AgendaCommand,
    {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(command(response_tx))
            .await
            .map_err(|e| component_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| component_error("Response channel closed"))?
    }
}

impl AgendaActor {
    /// Create a new actor and return its handle
    pub fn new(
        config: Arc<RwLock<Config>>,
        api: Arc<dyn EventApi>,
        holidays: HolidayCalendar,
    ) -> (Self, AgendaActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (resolution_tx, resolution_rx) = mpsc::channel(32);

        let actor = Self {
            config,
            api,
            store: EventStore::new(),
            holidays,
            anchor: None,
            granularity: Granularity::default(),
            in_flight: HashSet::new(),
            fetch_generation: 0,
            fetch_cancel: None,
            command_rx,
            resolution_rx,
            resolution_tx,
        };

        let handle = AgendaActorHandle { command_tx };

        (actor, handle)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Agenda actor started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if !self.handle_command(cmd).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                Some(resolution) = self.resolution_rx.recv() => {
                    self.apply_resolution(resolution).await;
                }
            }
        }

        info!("Agenda actor shut down");
    }

    /// Process one command; returns false on shutdown
    async fn handle_command(&mut self, cmd: AgendaCommand) -> bool {
        match cmd {
            AgendaCommand::SelectDate(date, resp) => {
                self.handle_select_date(date, resp);
            }
            AgendaCommand::SetGranularity(granularity, resp) => {
                self.granularity = granularity;
                let view = self.current_view().await;
                let _ = resp.send(view).await;
            }
            AgendaCommand::Visible(resp) => {
                let view = self.current_view().await;
                let _ = resp.send(view).await;
            }
            AgendaCommand::EventsOn(date, resp) => {
                let _ = resp.send(Ok(self.store.bucket(date).to_vec())).await;
            }
            AgendaCommand::Create(draft, resp) => {
                self.handle_create(draft, resp).await;
            }
            AgendaCommand::Update(id, draft, resp) => {
                self.handle_update(id, draft, resp).await;
            }
            AgendaCommand::Delete(id, resp) => {
                self.handle_delete(id, resp).await;
            }
            AgendaCommand::HolidaysInMonth(year, month, resp) => {
                let list = self
                    .holidays
                    .in_month(year, month)
                    .into_iter()
                    .cloned()
                    .collect();
                let _ = resp.send(Ok(list)).await;
            }
            AgendaCommand::Shutdown => {
                info!("Agenda actor shutting down");
                return false;
            }
        }
        true
    }

    /// Visible set for the current anchor and granularity; empty before
    /// the first date selection
    async fn current_view(&self) -> CalResult<Vec<Event>> {
        let week_start = self.config.read().await.week_start;
        Ok(match self.anchor {
            Some(anchor) => visible(&self.store, anchor, self.granularity, week_start),
            None => Vec::new(),
        })
    }

    /// Set the anchor and fetch its bucket, last request wins: any
    /// outstanding fetch is cancelled and its result discarded
    fn handle_select_date(&mut self, date: NaiveDate, resp: mpsc::Sender<CalResult<Vec<Event>>>) {
        self.anchor = Some(date);

        if let Some(token) = self.fetch_cancel.take() {
            token.cancel();
        }
        self.fetch_generation += 1;
        let generation = self.fetch_generation;
        let token = CancellationToken::new();
        self.fetch_cancel = Some(token.clone());

        let api = Arc::clone(&self.api);
        let resolution_tx = self.resolution_tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    Err(cancelled_error("Fetch superseded by a newer date selection"))
                }
                result = api.fetch_for_date(date) => result,
            };
            let _ = resolution_tx
                .send(Resolution::Fetch {
                    date,
                    generation,
                    result,
                    resp,
                })
                .await;
        });
    }

    async fn handle_create(&mut self, draft: EventDraft, resp: mpsc::Sender<CalResult<Event>>) {
        // Local validation never mutates the store or reaches the wire
        if let Err(e) = draft.validate() {
            let _ = resp.send(Err(e)).await;
            return;
        }

        // Optimistic local entry, rolled back if the backend rejects it
        let event = Event::from_draft(&draft);
        let client_ref = event.client_ref;
        self.in_flight.insert(event.identity());
        self.store.upsert(event);

        let api = Arc::clone(&self.api);
        let resolution_tx = self.resolution_tx.clone();
        tokio::spawn(async move {
            let result = api.create(&draft).await;
            let _ = resolution_tx
                .send(Resolution::Create {
                    client_ref,
                    result,
                    resp,
                })
                .await;
        });
    }

    async fn handle_update(
        &mut self,
        id: String,
        draft: EventDraft,
        resp: mpsc::Sender<CalResult<Event>>,
    ) {
        if let Err(e) = draft.validate() {
            let _ = resp.send(Err(e)).await;
            return;
        }

        let key = EventKey::Server(id.clone());
        if self.in_flight.contains(&key) {
            let _ = resp
                .send(Err(busy_error(&format!(
                    "Event {} already has a sync in flight",
                    id
                ))))
                .await;
            return;
        }

        let Some(existing) = self.store.find_by_id(&id) else {
            let _ = resp
                .send(Err(not_found_error(&format!("No event with id {}", id))))
                .await;
            return;
        };
        let client_ref = existing.client_ref;

        // The server is the source of truth for existing events; no
        // optimistic mutation before the call returns
        self.in_flight.insert(key);

        let api = Arc::clone(&self.api);
        let resolution_tx = self.resolution_tx.clone();
        tokio::spawn(async move {
            let result = api.update(&id, &draft).await;
            let _ = resolution_tx
                .send(Resolution::Update {
                    id,
                    client_ref,
                    result,
                    resp,
                })
                .await;
        });
    }

    async fn handle_delete(&mut self, id: String, resp: mpsc::Sender<CalResult<()>>) {
        let key = EventKey::Server(id.clone());
        if self.in_flight.contains(&key) {
            let _ = resp
                .send(Err(busy_error(&format!(
                    "Event {} already has a sync in flight",
                    id
                ))))
                .await;
            return;
        }

        if self.store.find_by_id(&id).is_none() {
            let _ = resp
                .send(Err(not_found_error(&format!("No event with id {}", id))))
                .await;
            return;
        }

        self.in_flight.insert(key);
        self.store.set_sync_state(&id, SyncState::Deleting);

        let api = Arc::clone(&self.api);
        let resolution_tx = self.resolution_tx.clone();
        tokio::spawn(async move {
            let result = api.delete(&id).await;
            let _ = resolution_tx
                .send(Resolution::Delete { id, result, resp })
                .await;
        });
    }

    /// Apply the confirming or compensating mutation for a finished
    /// backend call
    async fn apply_resolution(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Fetch {
                date,
                generation,
                result,
                resp,
            } => {
                if generation != self.fetch_generation {
                    // A newer selection superseded this fetch; the result
                    // must not land in the store even if it arrived first
                    let _ = resp
                        .send(Err(cancelled_error(
                            "Fetch superseded by a newer date selection",
                        )))
                        .await;
                    return;
                }
                self.fetch_cancel = None;

                match result {
                    Ok(events) => {
                        self.store.replace_synced(date, events);
                        let _ = resp.send(Ok(self.store.bucket(date).to_vec())).await;
                    }
                    Err(e) => {
                        warn!("Fetch for {} failed: {}", date, e);
                        let _ = resp.send(Err(e)).await;
                    }
                }
            }
            Resolution::Create {
                client_ref,
                result,
                resp,
            } => {
                self.in_flight.remove(&EventKey::Client(client_ref));

                match result {
                    Ok(server_event) => {
                        // Keep the client reference so the optimistic
                        // entry is replaced in place
                        let confirmed = Event {
                            client_ref,
                            ..server_event
                        };
                        self.store.upsert(confirmed.clone());
                        let _ = resp.send(Ok(confirmed)).await;
                    }
                    Err(e) => {
                        self.store.remove_ref(client_ref);
                        warn!("Create failed, rolled back optimistic entry: {}", e);
                        let _ = resp.send(Err(e)).await;
                    }
                }
            }
            Resolution::Update {
                id,
                client_ref,
                result,
                resp,
            } => {
                self.in_flight.remove(&EventKey::Server(id.clone()));

                match result {
                    Ok(server_event) => {
                        let merged = Event {
                            client_ref,
                            ..server_event
                        };
                        self.store.upsert(merged.clone());
                        let _ = resp.send(Ok(merged)).await;
                    }
                    Err(e) => {
                        warn!("Update of {} failed, store left unchanged: {}", id, e);
                        let _ = resp.send(Err(e)).await;
                    }
                }
            }
            Resolution::Delete { id, result, resp } => {
                self.in_flight.remove(&EventKey::Server(id.clone()));

                match result {
                    Ok(()) => {
                        self.store.remove(&id);
                        let _ = resp.send(Ok(())).await;
                    }
                    Err(e) => {
                        // The event is still on the server; revert the marker
                        self.store.set_sync_state(&id, SyncState::Synced);
                        warn!("Delete of {} failed: {}", id, e);
                        let _ = resp.send(Err(e)).await;
                    }
                }
            }
        }
    }
}
