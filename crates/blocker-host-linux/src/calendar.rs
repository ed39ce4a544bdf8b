//! Google Calendar v3 client

use async_trait::async_trait;
use blocker_api::Booking;
use blocker_config::{CalendarCredentials, CalendarPolicy};
use blocker_host_api::{CalendarError, CalendarResult, CalendarSource};
use chrono::{DateTime, Local, NaiveDate, SecondsFormat, TimeZone};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on followed `nextPageToken`s per query
const MAX_PAGES: usize = 10;

/// Events requested per page
const PAGE_SIZE: &str = "250";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    summary: Option<String>,
    status: Option<String>,
    start: EventTime,
    end: EventTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl EventTime {
    /// Timed entries keep their instant; all-day entries start at local midnight
    fn resolve(&self) -> Result<DateTime<Local>, String> {
        if let Some(date_time) = &self.date_time {
            return DateTime::parse_from_rfc3339(date_time)
                .map(|dt| dt.with_timezone(&Local))
                .map_err(|e| format!("bad dateTime '{}': {}", date_time, e));
        }

        if let Some(date) = &self.date {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| format!("bad date '{}': {}", date, e))?;
            let midnight = day.and_hms_opt(0, 0, 0).ok_or("invalid midnight")?;
            return Local
                .from_local_datetime(&midnight)
                .earliest()
                .ok_or_else(|| format!("no local midnight on {}", date));
        }

        Err("neither dateTime nor date present".into())
    }
}

/// Convert raw API items into bookings, skipping cancelled and malformed
/// entries. The result is sorted by start.
pub fn parse_events(items: Vec<serde_json::Value>) -> Vec<Booking> {
    let mut bookings = Vec::with_capacity(items.len());

    for item in items {
        let event: RawEvent = match serde_json::from_value(item) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Skipping malformed calendar entry");
                continue;
            }
        };

        if event.status.as_deref() == Some("cancelled") {
            debug!(id = %event.id, "Skipping cancelled calendar entry");
            continue;
        }

        let (start, end) = match (event.start.resolve(), event.end.resolve()) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(e), _) | (_, Err(e)) => {
                warn!(id = %event.id, error = %e, "Skipping calendar entry with unreadable times");
                continue;
            }
        };

        match Booking::new(event.id.clone(), event.summary, start, end) {
            Some(booking) => bookings.push(booking),
            None => warn!(id = %event.id, "Skipping calendar entry that ends before it starts"),
        }
    }

    bookings.sort_by_key(|b| b.start);
    bookings
}

/// Google Calendar events client
pub struct GoogleCalendar {
    client: Client,
    policy: CalendarPolicy,
    timeout: Duration,
}

impl GoogleCalendar {
    pub fn new(policy: CalendarPolicy, timeout: Duration) -> CalendarResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            policy,
            timeout,
        })
    }

    /// Events list URL for one page of `[time_min, time_max]`
    pub fn events_url(
        &self,
        time_min: DateTime<Local>,
        time_max: DateTime<Local>,
        page_token: Option<&str>,
    ) -> CalendarResult<Url> {
        let mut url = Url::parse(&self.policy.base_url)
            .map_err(|e| CalendarError::Transport(format!("Invalid base URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| CalendarError::Transport("Base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["calendars", self.policy.calendar_id.as_str(), "events"]);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("timeMin", &time_min.to_rfc3339_opts(SecondsFormat::Secs, false))
                .append_pair("timeMax", &time_max.to_rfc3339_opts(SecondsFormat::Secs, false))
                .append_pair("singleEvents", "true")
                .append_pair("orderBy", "startTime")
                .append_pair("maxResults", PAGE_SIZE);

            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
            if let CalendarCredentials::ApiKey(key) = &self.policy.credentials {
                query.append_pair("key", key);
            }
        }

        Ok(url)
    }

    fn bearer_token(&self) -> CalendarResult<Option<String>> {
        match &self.policy.credentials {
            CalendarCredentials::ApiKey(_) => Ok(None),
            CalendarCredentials::AccessTokenEnv(var) => std::env::var(var)
                .map(Some)
                .map_err(|_| CalendarError::Auth(format!("environment variable {} is not set", var))),
        }
    }

    async fn fetch_page(&self, url: Url) -> CalendarResult<EventsPage> {
        let mut request = self.client.get(url);
        if let Some(token) = self.bearer_token()? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CalendarError::Auth(message),
                _ => CalendarError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        response
            .json::<EventsPage>()
            .await
            .map_err(|e| CalendarError::Decode(e.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> CalendarError {
        if e.is_timeout() {
            CalendarError::Timeout(self.timeout)
        } else {
            CalendarError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendar {
    fn calendar_id(&self) -> &str {
        &self.policy.calendar_id
    }

    async fn fetch(
        &self,
        time_min: DateTime<Local>,
        time_max: DateTime<Local>,
    ) -> CalendarResult<Vec<Booking>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 1..=MAX_PAGES {
            let url = self.events_url(time_min, time_max, page_token.as_deref())?;
            let body = self.fetch_page(url).await?;
            items.extend(body.items);

            match body.next_page_token {
                Some(token) if page < MAX_PAGES => page_token = Some(token),
                Some(_) => warn!(pages = MAX_PAGES, "Calendar query truncated"),
                None => break,
            }
        }

        let bookings = parse_events(items);
        debug!(
            calendar = %self.policy.calendar_id,
            count = bookings.len(),
            "Calendar queried"
        );
        Ok(bookings)
    }
}
