use super::time::format_clock;
use crate::error::{validation_error, CalResult};
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

/// Synchronization state of a locally held event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Created locally, not yet acknowledged by the backend
    Local,
    /// Has a server id and carries the last known server value
    Synced,
    /// Delete request in flight
    Deleting,
}

/// Identity of an event inside the store: the server id once assigned,
/// otherwise the client-side reference of the pending local entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Server(String),
    Client(Uuid),
}

/// Canonical calendar event as held locally and exchanged with the backend
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Server-assigned identifier, `None` until the backend acknowledges
    pub id: Option<String>,
    /// Client-side identity, assigned at construction and stable across
    /// the Local -> Synced transition
    pub client_ref: Uuid,
    pub name: String,
    /// Partition key for the store
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub description: String,
    pub place: Option<String>,
    /// Opaque reference to an attached image, never validated
    pub image: Option<String>,
    pub sync_state: SyncState,
}

impl Event {
    /// Create a pending local event from a validated draft
    pub fn from_draft(draft: &EventDraft) -> Self {
        Self {
            id: None,
            client_ref: Uuid::new_v4(),
            name: draft.name.clone(),
            date: draft.date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            description: draft.description.clone(),
            place: draft.place.clone(),
            image: draft.image.clone(),
            sync_state: SyncState::Local,
        }
    }

    /// Identity used by the store and the in-flight guard
    pub fn identity(&self) -> EventKey {
        match &self.id {
            Some(id) => EventKey::Server(id.clone()),
            None => EventKey::Client(self.client_ref),
        }
    }

    /// Combined time-range string, derived for display only
    pub fn time_range_label(&self) -> String {
        format!(
            "{} - {}",
            format_clock(self.start_time),
            format_clock(self.end_time)
        )
    }
}

/// User input for creating or updating an event
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub description: String,
    pub place: Option<String>,
    pub image: Option<String>,
}

impl EventDraft {
    /// Check required fields before any store mutation or network call.
    ///
    /// `date`, `start_time` and `end_time` are structurally present;
    /// `place` and `image` are optional in the canonical model.
    pub fn validate(&self) -> CalResult<()> {
        if self.name.trim().is_empty() {
            return Err(validation_error("Event name is required"));
        }
        if self.description.trim().is_empty() {
            return Err(validation_error("Event description is required"));
        }
        Ok(())
    }
}
