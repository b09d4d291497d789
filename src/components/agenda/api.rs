use super::models::{Event, EventDraft, SyncState};
use super::time::{format_clock, format_date, parse_clock, parse_date};
use crate::config::Config;
use crate::error::{network_error, not_found_error, CalResult, Error};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Typed adapter over the remote event service.
///
/// Every operation surfaces its failure exactly once to the caller; no
/// retries or backoff happen at this layer.
#[async_trait]
pub trait EventApi: Send + Sync {
    /// Retrieve all events the backend has for a date
    async fn fetch_for_date(&self, date: NaiveDate) -> CalResult<Vec<Event>>;

    /// Send a draft and return the server-assigned event (with id)
    async fn create(&self, draft: &EventDraft) -> CalResult<Event>;

    /// Replace fields on an existing event and return the updated event
    async fn update(&self, id: &str, draft: &EventDraft) -> CalResult<Event>;

    /// Remove an event
    async fn delete(&self, id: &str) -> CalResult<()>;
}

/// `EventApi` implementation over the backend's JSON envelope protocol,
/// bearer-token authenticated, with a bounded request timeout
pub struct HttpEventApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpEventApi {
    /// Build a client from the application configuration
    pub fn new(config: &Config) -> CalResult<Self> {
        Self::from_parts(
            &config.api_base_url,
            &config.api_token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Build a client from explicit parts
    pub fn from_parts(base_url: &str, token: &str, timeout: Duration) -> CalResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> CalResult<Url> {
        let url = format!("{}{}", self.base_url, path);
        Url::parse(&url).map_err(|e| network_error(&format!("Failed to parse URL {}: {}", url, e)))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Read the response body as an envelope, mapping HTTP-level failures
    /// to the error taxonomy first
    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> CalResult<Envelope<T>> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(not_found_error(&format!("{}: HTTP 404 - {}", context, body)));
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(network_error(&format!(
                "{}: HTTP {} - {}",
                context, status, body
            )));
        }

        response
            .json::<Envelope<T>>()
            .await
            .map_err(|e| network_error(&format!("{}: failed to parse response: {}", context, e)))
    }
}

#[async_trait]
impl EventApi for HttpEventApi {
    async fn fetch_for_date(&self, date: NaiveDate) -> CalResult<Vec<Event>> {
        let url = self.endpoint("/event/get-event")?;

        let response = self
            .client
            .post(url)
            .header("Authorization", self.bearer())
            .json(&serde_json::json!({ "eventDate": format_date(date) }))
            .send()
            .await
            .map_err(|e| network_error(&format!("Failed to fetch events: {}", e)))?;

        let envelope = Self::read_envelope::<Vec<EventPayload>>(response, "fetch events").await?;
        let payloads = envelope.into_data("fetch events")?;

        payloads.into_iter().map(EventPayload::into_event).collect()
    }

    async fn create(&self, draft: &EventDraft) -> CalResult<Event> {
        let url = self.endpoint("/event/create-event")?;

        let response = self
            .client
            .post(url)
            .header("Authorization", self.bearer())
            .json(&EventPayload::from_draft(draft))
            .send()
            .await
            .map_err(|e| network_error(&format!("Failed to create event: {}", e)))?;

        let envelope = Self::read_envelope::<EventPayload>(response, "create event").await?;
        envelope.into_data("create event")?.into_event()
    }

    async fn update(&self, id: &str, draft: &EventDraft) -> CalResult<Event> {
        let url = self.endpoint(&format!("/event/update-event/{}", id))?;

        let response = self
            .client
            .put(url)
            .header("Authorization", self.bearer())
            .json(&EventPayload::from_draft(draft))
            .send()
            .await
            .map_err(|e| network_error(&format!("Failed to update event: {}", e)))?;

        let envelope = Self::read_envelope::<EventPayload>(response, "update event").await?;
        envelope.into_data("update event")?.into_event()
    }

    async fn delete(&self, id: &str) -> CalResult<()> {
        let url = self.endpoint(&format!("/event/delete-event/{}", id))?;

        let response = self
            .client
            .delete(url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| network_error(&format!("Failed to delete event: {}", e)))?;

        let envelope =
            Self::read_envelope::<serde_json::Value>(response, "delete event").await?;
        envelope.check_code("delete event")
    }
}

/// The `{code, data}` wrapper every backend response uses
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    pub code: u16,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Success requires code 200 and a payload; envelope code 404 maps
    /// to NotFound, any other code to Network
    fn into_data(self, context: &str) -> CalResult<T> {
        let message = self.message.clone();
        self.check_code(context)?;
        self.data.ok_or_else(|| {
            network_error(&format!(
                "{}: envelope missing data ({})",
                context,
                message.unwrap_or_default()
            ))
        })
    }

    fn check_code(&self, context: &str) -> CalResult<()> {
        match self.code {
            200 => Ok(()),
            404 => Err(not_found_error(&format!(
                "{}: {}",
                context,
                self.message.as_deref().unwrap_or("resource not found")
            ))),
            code => Err(network_error(&format!(
                "{}: backend returned code {}{}",
                context,
                code,
                self.message
                    .as_deref()
                    .map(|m| format!(" ({})", m))
                    .unwrap_or_default()
            ))),
        }
    }
}

/// Wire representation of an event, dates and times as formatted strings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl EventPayload {
    /// Wire form of a draft; drafts never carry an id
    pub fn from_draft(draft: &EventDraft) -> Self {
        Self {
            id: None,
            name: draft.name.clone(),
            date: format_date(draft.date),
            start_time: format_clock(draft.start_time),
            end_time: format_clock(draft.end_time),
            description: draft.description.clone(),
            place: draft.place.clone(),
            image: draft.image.clone(),
        }
    }

    /// Convert a server payload into a canonical `Synced` event.
    ///
    /// Server events must carry an id; a payload without one, or with
    /// unparseable date or time fields, is a malformed response.
    pub fn into_event(self) -> CalResult<Event> {
        let id = self
            .id
            .ok_or_else(|| network_error("Server returned an event without an id"))?;

        let date = parse_date(&self.date)
            .map_err(|e| network_error(&format!("Invalid event in server response: {}", e)))?;
        let start_time = parse_clock(&self.start_time)
            .map_err(|e| network_error(&format!("Invalid event in server response: {}", e)))?;
        let end_time = parse_clock(&self.end_time)
            .map_err(|e| network_error(&format!("Invalid event in server response: {}", e)))?;

        Ok(Event {
            id: Some(id),
            client_ref: Uuid::new_v4(),
            name: self.name,
            date,
            start_time,
            end_time,
            description: self.description,
            place: self.place,
            image: self.image,
            sync_state: SyncState::Synced,
        })
    }
}
