use super::models::Event;
use super::store::EventStore;
use super::time::{month_span, week_span};
use crate::config::WeekStart;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// View mode determining which buckets are aggregated for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::Daily
    }
}

/// Compute the visible event subset for an anchor date and granularity.
///
/// Daily is exactly the anchor's bucket; weekly unions the buckets of the
/// canonical week containing the anchor (boundaries inclusive, start day
/// taken from `week_start`); monthly unions every bucket sharing the
/// anchor's year and month. Order is date order, then bucket order.
/// Never mutates the store.
pub fn visible(
    store: &EventStore,
    anchor: NaiveDate,
    granularity: Granularity,
    week_start: WeekStart,
) -> Vec<Event> {
    match granularity {
        Granularity::Daily => store.bucket(anchor).to_vec(),
        Granularity::Weekly => {
            let (start, end) = week_span(anchor, week_start);
            collect(store, start, end)
        }
        Granularity::Monthly => {
            let (start, end) = month_span(anchor);
            collect(store, start, end)
        }
    }
}

fn collect(store: &EventStore, start: NaiveDate, end: NaiveDate) -> Vec<Event> {
    store
        .between(start, end)
        .flat_map(|(_, bucket)| bucket.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::agenda::models::EventDraft;
    use chrono::NaiveTime;

    fn seeded_store() -> EventStore {
        let mut store = EventStore::new();
        for (id, day) in [
            ("mon", 10u32),
            ("wed", 12),
            ("sun", 16),
            ("next-week", 18),
            ("prev-month", 28),
        ] {
            let date = if id == "prev-month" {
                NaiveDate::from_ymd_opt(2025, 2, day).unwrap()
            } else {
                NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
            };
            let mut event = Event::from_draft(&EventDraft {
                name: id.to_string(),
                date,
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                description: "test".to_string(),
                place: None,
                image: None,
            });
            event.id = Some(id.to_string());
            event.sync_state = crate::components::agenda::models::SyncState::Synced;
            store.upsert(event);
        }
        store
    }

    fn names(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_daily_equals_bucket() {
        let store = seeded_store();
        let anchor = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let daily = visible(&store, anchor, Granularity::Daily, WeekStart::Monday);
        assert_eq!(daily, store.bucket(anchor).to_vec());

        let empty_day = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();
        assert!(visible(&store, empty_day, Granularity::Daily, WeekStart::Monday).is_empty());
    }

    #[test]
    fn test_weekly_spans_the_canonical_week() {
        let store = seeded_store();
        // Wednesday of the week 2025-03-10..=2025-03-16
        let anchor = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();

        let weekly = visible(&store, anchor, Granularity::Weekly, WeekStart::Monday);
        assert_eq!(names(&weekly), vec!["mon", "wed", "sun"]);

        // Weekly is a superset of the anchor's daily view
        let daily = visible(&store, anchor, Granularity::Daily, WeekStart::Monday);
        for event in &daily {
            assert!(weekly.contains(event));
        }
    }

    #[test]
    fn test_weekly_respects_week_start_convention() {
        let store = seeded_store();
        // Sunday 2025-03-16: a Monday-start week still includes it at the
        // end, a Sunday-start week begins a new one
        let anchor = NaiveDate::from_ymd_opt(2025, 3, 16).unwrap();

        let monday_start = visible(&store, anchor, Granularity::Weekly, WeekStart::Monday);
        assert_eq!(names(&monday_start), vec!["mon", "wed", "sun"]);

        let sunday_start = visible(&store, anchor, Granularity::Weekly, WeekStart::Sunday);
        assert_eq!(names(&sunday_start), vec!["sun", "next-week"]);
    }

    #[test]
    fn test_monthly_contains_only_anchor_month() {
        let store = seeded_store();
        let anchor = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();

        let monthly = visible(&store, anchor, Granularity::Monthly, WeekStart::Monday);
        assert_eq!(names(&monthly), vec!["mon", "wed", "sun", "next-week"]);
        for event in &monthly {
            assert_eq!(event.date.format("%Y-%m").to_string(), "2025-03");
        }

        // Monthly is a superset of any weekly view inside the month
        let mid_month = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let weekly = visible(&store, mid_month, Granularity::Weekly, WeekStart::Monday);
        for event in &weekly {
            assert!(monthly.contains(event));
        }
    }

    #[test]
    fn test_visible_is_repeatable() {
        let store = seeded_store();
        let anchor = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();

        let first = visible(&store, anchor, Granularity::Weekly, WeekStart::Monday);
        let second = visible(&store, anchor, Granularity::Weekly, WeekStart::Monday);
        assert_eq!(first, second);
    }
}
