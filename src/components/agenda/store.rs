use super::models::{Event, EventKey, SyncState};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Date-keyed in-memory collection of events, the single source of truth
/// for the visible set.
///
/// Invariants:
/// - every event lives in exactly one bucket, the one matching its `date`
/// - no two `Synced` events share a server id
/// - bucket order is insertion order; map iteration yields date order
#[derive(Debug, Default)]
pub struct EventStore {
    buckets: BTreeMap<NaiveDate, Vec<Event>>,
}

impl EventStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an event by identity: the server id when present,
    /// otherwise the client reference of the pending local entry.
    ///
    /// Moves the entry to the bucket for `event.date` when the date
    /// changed; replaces it in place when it did not. Applying the same
    /// upsert twice is a no-op.
    pub fn upsert(&mut self, event: Event) {
        let existing = self.take_matching(&event);
        // A confirmation can match twice: the optimistic entry by client
        // reference and a fetched copy by server id. Collapse to one.
        self.take_matching(&event);

        match existing {
            Some((date, index, _)) if date == event.date => {
                let bucket = self.buckets.entry(event.date).or_default();
                let index = index.min(bucket.len());
                bucket.insert(index, event);
            }
            _ => {
                self.buckets.entry(event.date).or_default().push(event);
            }
        }
    }

    /// Delete the event with this server id from whichever bucket holds it.
    /// No-op if absent.
    pub fn remove(&mut self, id: &str) -> Option<Event> {
        let position = self.position(|e| e.id.as_deref() == Some(id))?;
        Some(self.take_at(position))
    }

    /// Delete a pending local entry by its client reference. No-op if absent.
    pub fn remove_ref(&mut self, client_ref: Uuid) -> Option<Event> {
        let position = self.position(|e| e.client_ref == client_ref)?;
        Some(self.take_at(position))
    }

    /// Ordered events for a date, empty if none
    pub fn bucket(&self, date: NaiveDate) -> &[Event] {
        self.buckets.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lazy `(date, event)` pairs over the whole store, in date order
    /// then bucket order; recomputed on each call
    pub fn all(&self) -> impl Iterator<Item = (NaiveDate, &Event)> {
        self.buckets
            .iter()
            .flat_map(|(date, bucket)| bucket.iter().map(move |event| (*date, event)))
    }

    /// Buckets whose date falls inside the inclusive range
    pub fn between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = (NaiveDate, &[Event])> {
        self.buckets
            .range(start..=end)
            .map(|(date, bucket)| (*date, bucket.as_slice()))
    }

    /// Find an event by store identity
    pub fn find(&self, key: &EventKey) -> Option<&Event> {
        match key {
            EventKey::Server(id) => self.find_by_id(id),
            EventKey::Client(client_ref) => self
                .buckets
                .values()
                .flatten()
                .find(|e| e.client_ref == *client_ref),
        }
    }

    /// Find an event by server id
    pub fn find_by_id(&self, id: &str) -> Option<&Event> {
        self.buckets
            .values()
            .flatten()
            .find(|e| e.id.as_deref() == Some(id))
    }

    /// Change the sync state of the event with this server id.
    /// Returns false if the id is unknown.
    pub fn set_sync_state(&mut self, id: &str, state: SyncState) -> bool {
        for bucket in self.buckets.values_mut() {
            if let Some(event) = bucket.iter_mut().find(|e| e.id.as_deref() == Some(id)) {
                event.sync_state = state;
                return true;
            }
        }
        false
    }

    /// Reconcile a bucket against the backend's list for that date.
    ///
    /// Replaces the `Synced` portion of the bucket while preserving
    /// pending `Local` and `Deleting` entries. A fetched copy of an id
    /// that is pending deletion is dropped; a fetched id held under a
    /// different date is moved here (the backend is authoritative for
    /// persisted events).
    pub fn replace_synced(&mut self, date: NaiveDate, incoming: Vec<Event>) {
        if let Some(bucket) = self.buckets.get_mut(&date) {
            bucket.retain(|e| e.sync_state != SyncState::Synced);
        }

        for mut event in incoming {
            if let Some(id) = event.id.clone() {
                match self.find_by_id(&id).map(|e| e.sync_state) {
                    Some(SyncState::Deleting) => continue,
                    Some(_) => {
                        self.remove(&id);
                    }
                    None => {}
                }
            }
            event.date = date;
            event.sync_state = SyncState::Synced;
            self.buckets.entry(date).or_default().push(event);
        }

        self.prune(date);
    }

    /// Total number of events across all buckets
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// True when the store holds no events
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    fn position<F>(&self, matches: F) -> Option<(NaiveDate, usize)>
    where
        F: Fn(&Event) -> bool,
    {
        for (date, bucket) in &self.buckets {
            if let Some(index) = bucket.iter().position(&matches) {
                return Some((*date, index));
            }
        }
        None
    }

    fn take_at(&mut self, (date, index): (NaiveDate, usize)) -> Event {
        let bucket = self
            .buckets
            .get_mut(&date)
            .expect("bucket exists for located event");
        let event = bucket.remove(index);
        self.prune(date);
        event
    }

    fn take_matching(&mut self, event: &Event) -> Option<(NaiveDate, usize, Event)> {
        let position = self.position(|e| {
            (event.id.is_some() && e.id == event.id) || e.client_ref == event.client_ref
        })?;
        let taken = self.take_at(position);
        Some((position.0, position.1, taken))
    }

    fn prune(&mut self, date: NaiveDate) {
        if self.buckets.get(&date).is_some_and(Vec::is_empty) {
            self.buckets.remove(&date);
        }
    }
}
