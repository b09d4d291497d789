use async_trait::async_trait;
use calsync::components::agenda::api::EventApi;
use calsync::components::agenda::holidays::HolidayCalendar;
use calsync::components::agenda::models::{Event, EventDraft, SyncState};
use calsync::components::agenda::{AgendaHandle, Granularity};
use calsync::config::{Config, WeekStart};
use calsync::error::{network_error, not_found_error, CalResult, Error};
use chrono::{NaiveDate, NaiveTime};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Notify, RwLock};

/// A gate that reports when an operation started and holds it until released
#[derive(Default)]
struct Gate {
    started: Mutex<Option<oneshot::Sender<()>>>,
    release: Notify,
}

impl Gate {
    fn new() -> (Arc<Self>, oneshot::Receiver<()>) {
        let (started_tx, started_rx) = oneshot::channel();
        let gate = Arc::new(Self {
            started: Mutex::new(Some(started_tx)),
            release: Notify::new(),
        });
        (gate, started_rx)
    }

    async fn pass(&self) {
        if let Some(tx) = self.started.lock().unwrap().take() {
            let _ = tx.send(());
        }
        self.release.notified().await;
    }
}

/// Mock backend for testing the reconciliation flows without a network.
/// Keeps its own date-keyed event map so round trips behave like the
/// real service.
#[derive(Default)]
struct MockEventApi {
    remote: Mutex<HashMap<NaiveDate, Vec<Event>>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    next_id: AtomicUsize,
    fetch_gates: Mutex<HashMap<NaiveDate, Arc<Gate>>>,
    update_gate: Mutex<Option<Arc<Gate>>>,
}

impl MockEventApi {
    fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    fn gate_fetch(&self, date: NaiveDate) -> oneshot::Receiver<()> {
        let (gate, started) = Gate::new();
        self.fetch_gates.lock().unwrap().insert(date, gate);
        started
    }

    fn gate_updates(&self) -> oneshot::Receiver<()> {
        let (gate, started) = Gate::new();
        *self.update_gate.lock().unwrap() = Some(gate);
        started
    }

    fn release_fetch(&self, date: NaiveDate) {
        if let Some(gate) = self.fetch_gates.lock().unwrap().remove(&date) {
            gate.release.notify_one();
        }
    }

    fn release_updates(&self) {
        if let Some(gate) = self.update_gate.lock().unwrap().take() {
            gate.release.notify_one();
        }
    }

    fn calls_for(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(op))
            .count()
    }

    fn seed(&self, event: Event) {
        self.remote
            .lock()
            .unwrap()
            .entry(event.date)
            .or_default()
            .push(event);
    }

    fn should_fail(&self, op: &str) -> bool {
        self.failing.lock().unwrap().contains(op)
    }
}

#[async_trait]
impl EventApi for MockEventApi {
    async fn fetch_for_date(&self, date: NaiveDate) -> CalResult<Vec<Event>> {
        self.calls.lock().unwrap().push(format!("fetch {}", date));

        let gate = self.fetch_gates.lock().unwrap().get(&date).cloned();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        if self.should_fail("fetch") {
            return Err(network_error("mock fetch failure"));
        }

        Ok(self
            .remote
            .lock()
            .unwrap()
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }

    async fn create(&self, draft: &EventDraft) -> CalResult<Event> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create {}", draft.name));

        if self.should_fail("create") {
            return Err(network_error("mock create failure"));
        }

        let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut event = Event::from_draft(draft);
        event.id = Some(id);
        event.sync_state = SyncState::Synced;
        self.seed(event.clone());

        Ok(event)
    }

    async fn update(&self, id: &str, draft: &EventDraft) -> CalResult<Event> {
        self.calls.lock().unwrap().push(format!("update {}", id));

        let gate = self.update_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        if self.should_fail("update") {
            return Err(network_error("mock update failure"));
        }

        let mut remote = self.remote.lock().unwrap();
        let held = remote
            .values()
            .flatten()
            .any(|e| e.id.as_deref() == Some(id));
        if !held {
            return Err(not_found_error("mock: no such event"));
        }
        for bucket in remote.values_mut() {
            bucket.retain(|e| e.id.as_deref() != Some(id));
        }

        let mut event = Event::from_draft(draft);
        event.id = Some(id.to_string());
        event.sync_state = SyncState::Synced;
        remote.entry(event.date).or_default().push(event.clone());

        Ok(event)
    }

    async fn delete(&self, id: &str) -> CalResult<()> {
        self.calls.lock().unwrap().push(format!("delete {}", id));

        if self.should_fail("delete") {
            return Err(network_error("mock delete failure"));
        }

        let mut remote = self.remote.lock().unwrap();
        for bucket in remote.values_mut() {
            bucket.retain(|e| e.id.as_deref() != Some(id));
        }

        Ok(())
    }
}

fn test_config() -> Config {
    Config {
        api_base_url: "http://localhost:0".to_string(),
        api_token: "test-token".to_string(),
        timezone: "UTC".to_string(),
        week_start: WeekStart::Monday,
        request_timeout_secs: 5,
        components: HashMap::new(),
    }
}

fn handle_with(api: Arc<MockEventApi>) -> AgendaHandle {
    AgendaHandle::new(
        Arc::new(RwLock::new(test_config())),
        api,
        HolidayCalendar::default(),
    )
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn standup_draft() -> EventDraft {
    EventDraft {
        name: "Standup".to_string(),
        date: ymd(2025, 3, 10),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        description: "daily sync".to_string(),
        place: None,
        image: None,
    }
}

#[tokio::test]
async fn test_create_round_trip() {
    let api = Arc::new(MockEventApi::default());
    let handle = handle_with(Arc::clone(&api));
    let date = ymd(2025, 3, 10);

    let created = handle.create_event(standup_draft()).await.unwrap();
    assert!(created.id.is_some());
    assert_eq!(created.sync_state, SyncState::Synced);

    // Under its bucket
    let bucket = handle.events_on(date).await.unwrap();
    assert_eq!(bucket.len(), 1);
    assert_eq!(bucket[0].id, created.id);

    // Visible in the daily view
    let daily = handle.select_date(date).await.unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].name, "Standup");

    // Visible in the weekly view from any anchor in that week
    handle.select_date(ymd(2025, 3, 14)).await.unwrap();
    let weekly = handle.set_granularity(Granularity::Weekly).await.unwrap();
    assert!(weekly.iter().any(|e| e.id == created.id));

    // Visible in the monthly view from any anchor in March 2025
    handle.select_date(ymd(2025, 3, 28)).await.unwrap();
    let monthly = handle.set_granularity(Granularity::Monthly).await.unwrap();
    assert!(monthly.iter().any(|e| e.id == created.id));
}

#[tokio::test]
async fn test_create_with_missing_fields_touches_nothing() {
    let api = Arc::new(MockEventApi::default());
    let handle = handle_with(Arc::clone(&api));

    let mut draft = standup_draft();
    draft.name = "  ".to_string();

    let result = handle.create_event(draft).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    // No network call, no store mutation
    assert_eq!(api.calls_for("create"), 0);
    assert!(handle.events_on(ymd(2025, 3, 10)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_failure_rolls_back_optimistic_entry() {
    let api = Arc::new(MockEventApi::default());
    api.fail_on("create");
    let handle = handle_with(Arc::clone(&api));

    let result = handle.create_event(standup_draft()).await;
    assert!(matches!(result, Err(Error::Network(_))));
    assert_eq!(api.calls_for("create"), 1);

    // The optimistic entry is gone again
    assert!(handle.events_on(ymd(2025, 3, 10)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_moves_event_between_buckets() {
    let api = Arc::new(MockEventApi::default());
    let handle = handle_with(Arc::clone(&api));

    let created = handle.create_event(standup_draft()).await.unwrap();
    let id = created.id.clone().unwrap();

    let mut moved = standup_draft();
    moved.date = ymd(2025, 3, 14);
    let updated = handle.update_event(id.clone(), moved).await.unwrap();
    assert_eq!(updated.id.as_deref(), Some(id.as_str()));

    // Old bucket never shows it again, new bucket does
    assert!(handle.events_on(ymd(2025, 3, 10)).await.unwrap().is_empty());
    let new_bucket = handle.events_on(ymd(2025, 3, 14)).await.unwrap();
    assert_eq!(new_bucket.len(), 1);
    assert_eq!(new_bucket[0].id.as_deref(), Some(id.as_str()));

    // The visible set reflects the move immediately
    let daily = handle.select_date(ymd(2025, 3, 14)).await.unwrap();
    assert_eq!(daily.len(), 1);
}

#[tokio::test]
async fn test_update_failure_leaves_store_unchanged() {
    let api = Arc::new(MockEventApi::default());
    let handle = handle_with(Arc::clone(&api));

    let created = handle.create_event(standup_draft()).await.unwrap();
    let id = created.id.clone().unwrap();

    api.fail_on("update");
    let mut renamed = standup_draft();
    renamed.name = "Renamed standup".to_string();

    let result = handle.update_event(id, renamed).await;
    assert!(matches!(result, Err(Error::Network(_))));

    let bucket = handle.events_on(ymd(2025, 3, 10)).await.unwrap();
    assert_eq!(bucket.len(), 1);
    assert_eq!(bucket[0].name, "Standup");
    assert_eq!(bucket[0].sync_state, SyncState::Synced);
}

#[tokio::test]
async fn test_update_unknown_id_fails_before_the_network() {
    let api = Arc::new(MockEventApi::default());
    let handle = handle_with(Arc::clone(&api));

    let result = handle.update_event("missing", standup_draft()).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(api.calls_for("update"), 0);
}

#[tokio::test]
async fn test_delete_removes_event_everywhere() {
    let api = Arc::new(MockEventApi::default());
    let handle = handle_with(Arc::clone(&api));

    let created = handle.create_event(standup_draft()).await.unwrap();
    let id = created.id.clone().unwrap();

    handle.delete_event(id).await.unwrap();

    assert!(handle.events_on(ymd(2025, 3, 10)).await.unwrap().is_empty());
    for granularity in [Granularity::Daily, Granularity::Weekly, Granularity::Monthly] {
        handle.select_date(ymd(2025, 3, 10)).await.unwrap();
        assert!(handle.set_granularity(granularity).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_delete_unknown_id_is_rejected_locally() {
    let api = Arc::new(MockEventApi::default());
    let handle = handle_with(Arc::clone(&api));

    let result = handle.delete_event("missing").await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(api.calls_for("delete"), 0);
}

#[tokio::test]
async fn test_delete_failure_reverts_to_synced() {
    let api = Arc::new(MockEventApi::default());
    let handle = handle_with(Arc::clone(&api));

    let created = handle.create_event(standup_draft()).await.unwrap();
    let id = created.id.clone().unwrap();

    api.fail_on("delete");
    let result = handle.delete_event(id.clone()).await;
    assert!(matches!(result, Err(Error::Network(_))));

    let bucket = handle.events_on(ymd(2025, 3, 10)).await.unwrap();
    assert_eq!(bucket.len(), 1);
    assert_eq!(bucket[0].id.as_deref(), Some(id.as_str()));
    assert_eq!(bucket[0].sync_state, SyncState::Synced);
}

#[tokio::test]
async fn test_second_mutation_on_busy_identity_is_rejected() {
    let api = Arc::new(MockEventApi::default());
    let handle = handle_with(Arc::clone(&api));

    let created = handle.create_event(standup_draft()).await.unwrap();
    let id = created.id.clone().unwrap();

    // Hold the first update open on the mock
    let started = api.gate_updates();
    let first = {
        let handle = handle.clone();
        let id = id.clone();
        let mut renamed = standup_draft();
        renamed.name = "First".to_string();
        tokio::spawn(async move { handle.update_event(id, renamed).await })
    };
    started.await.unwrap();

    // A second mutation for the same identity must be rejected
    let mut second = standup_draft();
    second.name = "Second".to_string();
    let result = handle.update_event(id.clone(), second).await;
    assert!(matches!(result, Err(Error::Busy(_))));
    let result = handle.delete_event(id.clone()).await;
    assert!(matches!(result, Err(Error::Busy(_))));

    // The first reconciliation still completes
    api.release_updates();
    let updated = first.await.unwrap().unwrap();
    assert_eq!(updated.name, "First");

    // And the identity is free again
    let mut third = standup_draft();
    third.name = "Third".to_string();
    assert!(handle.update_event(id, third).await.is_ok());
}

#[tokio::test]
async fn test_stale_fetch_is_discarded_on_anchor_change() {
    let api = Arc::new(MockEventApi::default());
    let date_a = ymd(2025, 3, 10);
    let date_b = ymd(2025, 3, 20);

    let mut on_a = Event::from_draft(&standup_draft());
    on_a.id = Some("a1".to_string());
    on_a.sync_state = SyncState::Synced;
    api.seed(on_a);

    let mut on_b = Event::from_draft(&EventDraft {
        date: date_b,
        ..standup_draft()
    });
    on_b.id = Some("b1".to_string());
    on_b.sync_state = SyncState::Synced;
    api.seed(on_b);

    let handle = handle_with(Arc::clone(&api));

    // First selection hangs on the wire
    let started = api.gate_fetch(date_a);
    let stale = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.select_date(date_a).await })
    };
    started.await.unwrap();

    // Second selection supersedes it
    let fresh = handle.select_date(date_b).await.unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].id.as_deref(), Some("b1"));

    // The superseded caller is told so, and its result never lands
    let result = stale.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled(_))));
    assert!(handle.events_on(date_a).await.unwrap().is_empty());

    api.release_fetch(date_a);
}

#[tokio::test]
async fn test_fetch_failure_leaves_store_unchanged() {
    let api = Arc::new(MockEventApi::default());
    api.fail_on("fetch");
    let handle = handle_with(Arc::clone(&api));

    let result = handle.select_date(ymd(2025, 3, 10)).await;
    assert!(matches!(result, Err(Error::Network(_))));
    assert!(handle.events_on(ymd(2025, 3, 10)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_replaces_server_state_but_keeps_pending() {
    let api = Arc::new(MockEventApi::default());
    let date = ymd(2025, 3, 10);

    let mut server_copy = Event::from_draft(&standup_draft());
    server_copy.id = Some("a1".to_string());
    server_copy.sync_state = SyncState::Synced;
    api.seed(server_copy);

    let handle = handle_with(Arc::clone(&api));

    let first = handle.select_date(date).await.unwrap();
    assert_eq!(first.len(), 1);

    // The backend forgot the event; a re-fetch reconciles
    api.remote.lock().unwrap().clear();
    let second = handle.select_date(date).await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn test_holidays_in_month_through_handle() {
    let holidays = HolidayCalendar::from_toml(
        r#"
        [[holiday]]
        date = "2024-12-25"
        name = "Christmas Day"

        [[holiday]]
        date = "2024-07-04"
        name = "Independence Day"
        "#,
    )
    .unwrap();

    let handle = AgendaHandle::new(
        Arc::new(RwLock::new(test_config())),
        Arc::new(MockEventApi::default()),
        holidays,
    );

    let december = handle.holidays_in_month(2024, 12).await.unwrap();
    assert_eq!(december.len(), 1);
    assert_eq!(december[0].name, "Christmas Day");
    assert!(handle.holidays_in_month(2024, 3).await.unwrap().is_empty());
}
