//! Google Calendar 工具
//!
//! 每次调用先通过 TokenSource 取用户授权令牌，再以 bearer token 调用 Calendar API。
//! 工具永不向上抛错：鉴权失败返回 "Error Authentication with Google: ..." 文本，
//! API 失败返回带 error 字段的 JSON。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::auth::TokenSource;
use crate::tools::Tool;

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const DEFAULT_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Calendar transport error: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRequest {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CreatedEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "htmlLink")]
    pub html_link: Option<String>,
}

/// events.list 查询参数
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub time_min: String,
    pub time_max: String,
    pub single_events: bool,
    pub order_by: String,
}

#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn insert_event(
        &self,
        token: &str,
        calendar_id: &str,
        event: &EventRequest,
    ) -> Result<CreatedEvent, CalendarError>;

    async fn list_events(
        &self,
        token: &str,
        calendar_id: &str,
        query: &ListQuery,
    ) -> Result<Vec<Value>, CalendarError>;
}

/// Google Calendar v3 REST 客户端
pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct EventsList {
    #[serde(default)]
    items: Vec<Value>,
}

impl GoogleCalendarClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn events_url(&self, calendar_id: &str) -> Result<Url, CalendarError> {
        let invalid = || CalendarError::Transport(format!("invalid calendar API base: {}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events"]);
        Ok(url)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(CalendarError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport(e: reqwest::Error) -> CalendarError {
    CalendarError::Transport(e.to_string())
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn insert_event(
        &self,
        token: &str,
        calendar_id: &str,
        event: &EventRequest,
    ) -> Result<CreatedEvent, CalendarError> {
        let resp = self
            .client
            .post(self.events_url(calendar_id)?)
            .bearer_auth(token)
            .json(event)
            .send()
            .await
            .map_err(transport)?;
        Self::check(resp).await?.json().await.map_err(transport)
    }

    async fn list_events(
        &self,
        token: &str,
        calendar_id: &str,
        query: &ListQuery,
    ) -> Result<Vec<Value>, CalendarError> {
        let single_events = query.single_events.to_string();
        let resp = self
            .client
            .get(self.events_url(calendar_id)?)
            .bearer_auth(token)
            .query(&[
                ("timeMin", query.time_min.as_str()),
                ("timeMax", query.time_max.as_str()),
                ("singleEvents", single_events.as_str()),
                ("orderBy", query.order_by.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;
        let list: EventsList = Self::check(resp).await?.json().await.map_err(transport)?;
        Ok(list.items)
    }
}

/// 一小时后开始、持续一小时的测试事件（UTC）
pub fn test_event(now: DateTime<Utc>) -> EventRequest {
    let start = now + chrono::Duration::hours(1);
    let end = start + chrono::Duration::hours(1);
    let at = |t: DateTime<Utc>| EventTime {
        date_time: t.to_rfc3339_opts(SecondsFormat::Secs, true),
        time_zone: "UTC".to_string(),
    };
    EventRequest {
        summary: "Test Event from API".to_string(),
        location: "Virtual".to_string(),
        description: "This event was created using the Google Calendar API.".to_string(),
        start: at(start),
        end: at(end),
    }
}

/// 固定时区偏移下「今天」的起止时间（RFC3339，带偏移）。
/// 无法表示的偏移按 UTC 处理，后缀取自实际使用的偏移。
pub fn day_bounds(now: DateTime<Utc>, offset_hours: i32) -> (String, String) {
    let offset = offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());
    let date = now.with_timezone(&offset).date_naive().format("%Y-%m-%d");
    (
        format!("{date}T00:00:00{offset}"),
        format!("{date}T23:59:59{offset}"),
    )
}

fn auth_error_text(e: impl std::fmt::Display) -> String {
    format!("Error Authentication with Google: {e}")
}

pub struct CreateCalendarEventTool {
    tokens: Arc<dyn TokenSource>,
    api: Arc<dyn CalendarApi>,
    calendar_id: String,
}

impl CreateCalendarEventTool {
    pub fn new(tokens: Arc<dyn TokenSource>, api: Arc<dyn CalendarApi>, calendar_id: impl Into<String>) -> Self {
        Self {
            tokens,
            api,
            calendar_id: calendar_id.into(),
        }
    }
}

#[async_trait]
impl Tool for CreateCalendarEventTool {
    fn name(&self) -> &str {
        "Create_calendar_event"
    }

    fn description(&self) -> &str {
        "Creates a new event on your Google Calendar"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => return Ok(auth_error_text(e)),
        };
        let event = test_event(Utc::now());
        let payload = match self.api.insert_event(&token, &self.calendar_id, &event).await {
            Ok(created) => serde_json::json!({
                "event_created": true,
                "event_id": created.id,
                "htmlLink": created.html_link,
            }),
            Err(e) => {
                tracing::warn!("Calendar insert failed: {e}");
                serde_json::json!({ "error": e.to_string(), "event_created": false })
            }
        };
        Ok(payload.to_string())
    }
}

pub struct GetCalendarEventsTodayTool {
    tokens: Arc<dyn TokenSource>,
    api: Arc<dyn CalendarApi>,
    calendar_id: String,
    utc_offset_hours: i32,
}

impl GetCalendarEventsTodayTool {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        api: Arc<dyn CalendarApi>,
        calendar_id: impl Into<String>,
        utc_offset_hours: i32,
    ) -> Self {
        Self {
            tokens,
            api,
            calendar_id: calendar_id.into(),
            utc_offset_hours,
        }
    }
}

#[async_trait]
impl Tool for GetCalendarEventsTodayTool {
    fn name(&self) -> &str {
        "Get_calendar_events_today"
    }

    fn description(&self) -> &str {
        "Retrieves the calendar events for the day from your Google Calendar"
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => return Ok(auth_error_text(e)),
        };
        let (time_min, time_max) = day_bounds(Utc::now(), self.utc_offset_hours);
        let query = ListQuery {
            time_min,
            time_max,
            single_events: true,
            order_by: "startTime".to_string(),
        };
        let payload = match self.api.list_events(&token, &self.calendar_id, &query).await {
            Ok(events) => serde_json::json!({ "events": events }),
            Err(e) => {
                tracing::warn!("Calendar list failed: {e}");
                serde_json::json!({ "error": e.to_string(), "events": [] })
            }
        };
        Ok(payload.to_string())
    }
}

/// 日历工具所需的令牌来源、API 与参数，按需注册到工具表
#[derive(Clone)]
pub struct CalendarToolset {
    pub tokens: Arc<dyn TokenSource>,
    pub api: Arc<dyn CalendarApi>,
    pub calendar_id: String,
    pub utc_offset_hours: i32,
}

impl CalendarToolset {
    pub fn register(&self, registry: &mut crate::tools::ToolRegistry) {
        registry.register(CreateCalendarEventTool::new(
            self.tokens.clone(),
            self.api.clone(),
            self.calendar_id.clone(),
        ));
        registry.register(GetCalendarEventsTodayTool::new(
            self.tokens.clone(),
            self.api.clone(),
            self.calendar_id.clone(),
            self.utc_offset_hours,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenSource;
    use chrono::TimeZone;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct FakeCalendar {
        fail: bool,
        inserted: Mutex<Vec<(String, EventRequest)>>,
        queries: Mutex<Vec<ListQuery>>,
    }

    #[async_trait]
    impl CalendarApi for FakeCalendar {
        async fn insert_event(
            &self,
            token: &str,
            _calendar_id: &str,
            event: &EventRequest,
        ) -> Result<CreatedEvent, CalendarError> {
            if self.fail {
                return Err(CalendarError::Http {
                    status: 403,
                    body: "forbidden".to_string(),
                });
            }
            self.inserted.lock().await.push((token.to_string(), event.clone()));
            Ok(CreatedEvent {
                id: Some("evt-1".to_string()),
                html_link: Some("https://calendar.google.com/event?eid=evt-1".to_string()),
            })
        }

        async fn list_events(
            &self,
            _token: &str,
            _calendar_id: &str,
            query: &ListQuery,
        ) -> Result<Vec<Value>, CalendarError> {
            if self.fail {
                return Err(CalendarError::Transport("offline".to_string()));
            }
            self.queries.lock().await.push(query.clone());
            Ok(vec![serde_json::json!({"summary": "Standup"})])
        }
    }

    fn tokens() -> Arc<dyn TokenSource> {
        Arc::new(StaticTokenSource("ya29.t".to_string()))
    }

    #[test]
    fn test_event_window_is_one_hour_from_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        let event = test_event(now);
        assert_eq!(event.start.date_time, "2024-03-01T11:30:00Z");
        assert_eq!(event.end.date_time, "2024-03-01T12:30:00Z");
        assert_eq!(event.start.time_zone, "UTC");
    }

    #[test]
    fn test_day_bounds_uses_offset_date() {
        // 03:00 UTC 在 UTC-5 仍是前一天
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 3, 0, 0).unwrap();
        let (min, max) = day_bounds(now, -5);
        assert_eq!(min, "2024-03-01T00:00:00-05:00");
        assert_eq!(max, "2024-03-01T23:59:59-05:00");
        assert_eq!(day_bounds(now, 9).0, "2024-03-02T00:00:00+09:00");
        assert_eq!(day_bounds(now, 0).0, "2024-03-02T00:00:00+00:00");
    }

    #[test]
    fn test_day_bounds_unrepresentable_offset_falls_back_to_utc() {
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 3, 0, 0).unwrap();
        for offset in [30, i32::MAX, i32::MIN] {
            let (min, max) = day_bounds(now, offset);
            assert_eq!(min, "2024-03-02T00:00:00+00:00");
            assert!(DateTime::parse_from_rfc3339(&min).is_ok());
            assert!(DateTime::parse_from_rfc3339(&max).is_ok());
        }
    }

    #[tokio::test]
    async fn test_create_event_success_payload() {
        let api = Arc::new(FakeCalendar::default());
        let tool = CreateCalendarEventTool::new(tokens(), api.clone(), "primary");
        let out: Value = serde_json::from_str(&tool.execute(Value::Null).await.unwrap()).unwrap();
        assert_eq!(out["event_created"], true);
        assert_eq!(out["event_id"], "evt-1");
        assert!(out["htmlLink"].as_str().unwrap().contains("evt-1"));
        assert_eq!(api.inserted.lock().await[0].0, "ya29.t");
    }

    #[tokio::test]
    async fn test_create_event_api_error_payload() {
        let api = Arc::new(FakeCalendar {
            fail: true,
            ..Default::default()
        });
        let tool = CreateCalendarEventTool::new(tokens(), api, "primary");
        let out: Value = serde_json::from_str(&tool.execute(Value::Null).await.unwrap()).unwrap();
        assert_eq!(out["event_created"], false);
        assert!(out["error"].as_str().unwrap().contains("403"));
    }

    #[tokio::test]
    async fn test_auth_failure_is_text_not_error() {
        let api = Arc::new(FakeCalendar::default());
        let empty: Arc<dyn TokenSource> = Arc::new(StaticTokenSource(String::new()));
        let create = CreateCalendarEventTool::new(empty.clone(), api.clone(), "primary");
        let list = GetCalendarEventsTodayTool::new(empty, api, "primary", -5);
        for out in [
            create.execute(Value::Null).await.unwrap(),
            list.execute(Value::Null).await.unwrap(),
        ] {
            assert!(out.starts_with("Error Authentication with Google:"));
        }
    }

    #[tokio::test]
    async fn test_list_events_query_and_payloads() {
        let api = Arc::new(FakeCalendar::default());
        let tool = GetCalendarEventsTodayTool::new(tokens(), api.clone(), "primary", -5);
        let out: Value = serde_json::from_str(&tool.execute(Value::Null).await.unwrap()).unwrap();
        assert_eq!(out["events"][0]["summary"], "Standup");

        let query = api.queries.lock().await[0].clone();
        assert!(query.single_events);
        assert_eq!(query.order_by, "startTime");
        assert!(query.time_min.ends_with("T00:00:00-05:00"));

        let failing = GetCalendarEventsTodayTool::new(
            tokens(),
            Arc::new(FakeCalendar {
                fail: true,
                ..Default::default()
            }),
            "primary",
            -5,
        );
        let out: Value = serde_json::from_str(&failing.execute(Value::Null).await.unwrap()).unwrap();
        assert_eq!(out["events"], serde_json::json!([]));
        assert!(out["error"].as_str().unwrap().contains("offline"));
    }

    #[test]
    fn test_toolset_registers_both_tools() {
        let toolset = CalendarToolset {
            tokens: tokens(),
            api: Arc::new(FakeCalendar::default()),
            calendar_id: "primary".to_string(),
            utc_offset_hours: -5,
        };
        let mut registry = crate::tools::ToolRegistry::new();
        toolset.register(&mut registry);
        assert_eq!(
            registry.tool_names(),
            vec!["Create_calendar_event".to_string(), "Get_calendar_events_today".to_string()]
        );
    }

    mod google_client {
        use super::*;
        use serde_json::json;
        use wiremock::matchers::{body_json, header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        #[tokio::test]
        async fn test_list_events_sends_bearer_and_query() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/calendars/primary/events"))
                .and(header("authorization", "Bearer ya29.t"))
                .and(query_param("timeMin", "2024-03-01T00:00:00-05:00"))
                .and(query_param("timeMax", "2024-03-01T23:59:59-05:00"))
                .and(query_param("singleEvents", "true"))
                .and(query_param("orderBy", "startTime"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "kind": "calendar#events",
                    "items": [{"summary": "Standup"}, {"summary": "Retro"}]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let client = GoogleCalendarClient::new(server.uri(), 5);
            let query = ListQuery {
                time_min: "2024-03-01T00:00:00-05:00".to_string(),
                time_max: "2024-03-01T23:59:59-05:00".to_string(),
                single_events: true,
                order_by: "startTime".to_string(),
            };
            let events = client.list_events("ya29.t", "primary", &query).await.unwrap();
            assert_eq!(events.len(), 2);
            assert_eq!(events[1]["summary"], "Retro");
        }

        #[tokio::test]
        async fn test_insert_event_body_shape() {
            let server = MockServer::start().await;
            let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
            Mock::given(method("POST"))
                .and(path("/calendars/primary/events"))
                .and(header("authorization", "Bearer ya29.t"))
                .and(body_json(json!({
                    "summary": "Test Event from API",
                    "location": "Virtual",
                    "description": "This event was created using the Google Calendar API.",
                    "start": {"dateTime": "2024-03-01T11:30:00Z", "timeZone": "UTC"},
                    "end": {"dateTime": "2024-03-01T12:30:00Z", "timeZone": "UTC"}
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": "evt-9",
                    "htmlLink": "https://www.google.com/calendar/event?eid=evt-9",
                    "status": "confirmed"
                })))
                .expect(1)
                .mount(&server)
                .await;

            let client = GoogleCalendarClient::new(format!("{}/", server.uri()), 5);
            let created = client
                .insert_event("ya29.t", "primary", &test_event(now))
                .await
                .unwrap();
            assert_eq!(created.id.as_deref(), Some("evt-9"));
            assert!(created.html_link.unwrap().ends_with("evt-9"));
        }

        #[tokio::test]
        async fn test_non_success_maps_to_http_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
                .mount(&server)
                .await;

            let client = GoogleCalendarClient::new(server.uri(), 5);
            let query = ListQuery {
                time_min: "a".to_string(),
                time_max: "b".to_string(),
                single_events: true,
                order_by: "startTime".to_string(),
            };
            let err = client.list_events("expired", "primary", &query).await.unwrap_err();
            assert!(matches!(
                err,
                CalendarError::Http { status: 401, ref body } if body == "invalid credentials"
            ));
        }

        #[tokio::test]
        async fn test_calendar_id_is_encoded() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .mount(&server)
                .await;

            let client = GoogleCalendarClient::new(server.uri(), 5);
            let query = ListQuery {
                time_min: "a".to_string(),
                time_max: "b".to_string(),
                single_events: true,
                order_by: "startTime".to_string(),
            };
            let events = client.list_events("t", "team/cal", &query).await.unwrap();
            assert!(events.is_empty());
            let requests = server.received_requests().await.unwrap();
            assert_eq!(requests[0].url.path(), "/calendars/team%2Fcal/events");
        }
    }
}
