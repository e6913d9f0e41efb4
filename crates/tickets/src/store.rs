//! Table store seam and its Airtable REST implementation.
//!
//! Only HTTP 200 counts as success.  Any other status becomes
//! `Error::Store(body)` carrying the raw response body, which the desk
//! hands back to the assistant unchanged.  Requests are sent once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use tb_domain::config::TicketsConfig;
use tb_domain::error::{Error, Result};
use tb_domain::ticket::{Priority, Ticket, TicketStatus};
use tb_domain::trace::TraceEvent;

pub const FIELD_TITLE: &str = "Title";
pub const FIELD_DETAILS: &str = "Details";
pub const FIELD_PRIORITY: &str = "Priority";
pub const FIELD_CREATED_BY: &str = "Created By";
pub const FIELD_STATUS: &str = "Status";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One row as returned by the table API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: String,
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl TableRecord {
    pub fn text(&self, field: &str) -> &str {
        self.fields.get(field).and_then(Value::as_str).unwrap_or("")
    }

    /// Map the row onto a [`Ticket`].  A missing status column is read as
    /// Pending, the state every ticket is created in.
    pub fn to_ticket(&self) -> Ticket {
        Ticket {
            id: self.id.clone(),
            title: self.text(FIELD_TITLE).to_owned(),
            details: self.text(FIELD_DETAILS).to_owned(),
            priority: self.text(FIELD_PRIORITY).parse::<Priority>().ok(),
            created_by: self.text(FIELD_CREATED_BY).to_owned(),
            status: TicketStatus::from_field(self.text(FIELD_STATUS))
                .unwrap_or(TicketStatus::Pending),
            created_at: self
                .created_time
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<TableRecord>,
    #[serde(default)]
    offset: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert one row and return it as stored.
    async fn create_record(&self, fields: Map<String, Value>) -> Result<TableRecord>;

    /// Rows matching `formula`.  With `max_records` set, exactly one
    /// request is made; otherwise every page is followed.
    async fn list_records(&self, formula: &str, max_records: Option<u32>)
        -> Result<Vec<TableRecord>>;

    /// Patch the given fields of one row and return the row as stored.
    async fn update_record(&self, id: &str, fields: Map<String, Value>) -> Result<TableRecord>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Airtable
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct AirtableStore {
    http: Client,
    table_url: String,
    api_key: String,
}

impl AirtableStore {
    pub fn new(cfg: &TicketsConfig, api_key: String) -> Result<Self> {
        if cfg.table_url.trim().is_empty() {
            return Err(Error::Config("tickets.table_url is empty".into()));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms.max(1)))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            table_url: cfg.table_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    /// Send once and return the body of a 200 response.
    async fn send(&self, method: &str, rb: RequestBuilder) -> Result<String> {
        let start = Instant::now();
        let result = rb.bearer_auth(&self.api_key).send().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                TraceEvent::TableStoreCall {
                    method: method.to_owned(),
                    status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                    duration_ms,
                }
                .emit();
                return Err(from_reqwest(e));
            }
        };

        let status = resp.status();
        TraceEvent::TableStoreCall {
            method: method.to_owned(),
            status: status.as_u16(),
            duration_ms,
        }
        .emit();

        let body = resp.text().await.map_err(from_reqwest)?;
        if status != StatusCode::OK {
            tracing::warn!(method, status = status.as_u16(), "table request rejected");
            return Err(Error::Store(body));
        }
        Ok(body)
    }

    fn parse_page(body: &str) -> Result<RecordPage> {
        serde_json::from_str(body)
            .map_err(|e| Error::Store(format!("unreadable table response: {e}: {body}")))
    }

    fn single(page: RecordPage, body: &str) -> Result<TableRecord> {
        page.records
            .into_iter()
            .next()
            .ok_or_else(|| Error::Store(format!("table response held no record: {body}")))
    }
}

#[async_trait]
impl TableStore for AirtableStore {
    async fn create_record(&self, fields: Map<String, Value>) -> Result<TableRecord> {
        let body = json!({ "records": [{ "fields": fields }] });
        let raw = self
            .send("POST", self.http.post(&self.table_url).json(&body))
            .await?;
        Self::single(Self::parse_page(&raw)?, &raw)
    }

    async fn list_records(
        &self,
        formula: &str,
        max_records: Option<u32>,
    ) -> Result<Vec<TableRecord>> {
        let mut out = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![("filterByFormula", formula.to_owned())];
            if let Some(max) = max_records {
                query.push(("maxRecords", max.to_string()));
            }
            if let Some(ref off) = offset {
                query.push(("offset", off.clone()));
            }

            let raw = self
                .send("GET", self.http.get(&self.table_url).query(&query))
                .await?;
            let page = Self::parse_page(&raw)?;
            out.extend(page.records);

            match page.offset {
                Some(next) if max_records.is_none() => offset = Some(next),
                _ => break,
            }
        }

        Ok(out)
    }

    async fn update_record(&self, id: &str, fields: Map<String, Value>) -> Result<TableRecord> {
        let body = json!({ "records": [{ "id": id, "fields": fields }] });
        let raw = self
            .send("PATCH", self.http.patch(&self.table_url).json(&body))
            .await?;
        Self::single(Self::parse_page(&raw)?, &raw)
    }
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn store(server: &MockServer) -> AirtableStore {
        let cfg = TicketsConfig {
            table_url: server.url("/v0/appBase/Tickets"),
            ..TicketsConfig::default()
        };
        AirtableStore::new(&cfg, "pat-test".into()).unwrap()
    }

    #[test]
    fn empty_table_url_is_rejected() {
        assert!(AirtableStore::new(&TicketsConfig::default(), "k".into()).is_err());
    }

    #[test]
    fn record_maps_to_ticket() {
        let rec: TableRecord = serde_json::from_value(json!({
            "id": "rec1",
            "createdTime": "2024-01-13T09:30:00.000Z",
            "fields": {
                "Title": "Laptop",
                "Details": "Screen cracked",
                "Priority": "High",
                "Created By": "Ada Lovelace"
            }
        }))
        .unwrap();
        let t = rec.to_ticket();
        assert_eq!(t.title, "Laptop");
        assert_eq!(t.priority, Some(Priority::High));
        assert_eq!(t.status, TicketStatus::Pending);
        assert_eq!(t.created_at.unwrap().to_rfc3339(), "2024-01-13T09:30:00+00:00");
    }

    #[tokio::test]
    async fn bounded_list_ignores_offset() {
        let server = MockServer::start();
        let list = server.mock(|when, then| {
            when.method(GET)
                .path("/v0/appBase/Tickets")
                .query_param("filterByFormula", "({Status} = 'Pending')")
                .query_param("maxRecords", "1")
                .header("authorization", "Bearer pat-test");
            then.status(200).json_body(json!({
                "records": [{ "id": "rec1", "fields": {} }],
                "offset": "itr2"
            }));
        });

        let rows = store(&server)
            .list_records("({Status} = 'Pending')", Some(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "rec1");
        assert_eq!(list.calls(), 1);
    }

    #[tokio::test]
    async fn non_200_carries_raw_body() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST).path("/v0/appBase/Tickets");
            then.status(422).body(r#"{"error":"UNKNOWN_FIELD_NAME"}"#);
        });

        let err = store(&server).create_record(Map::new()).await.unwrap_err();
        match err {
            Error::Store(body) => assert_eq!(body, r#"{"error":"UNKNOWN_FIELD_NAME"}"#),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(create.calls(), 1);
    }

    #[tokio::test]
    async fn update_patches_by_record_id() {
        let server = MockServer::start();
        let patch = server.mock(|when, then| {
            when.method(PATCH)
                .path("/v0/appBase/Tickets")
                .json_body(json!({ "records": [{ "id": "rec9", "fields": { "Status": "Done" } }] }));
            then.status(200).json_body(json!({
                "records": [{ "id": "rec9", "fields": { "Title": "VPN", "Status": "Done" } }]
            }));
        });

        let mut fields = Map::new();
        fields.insert(FIELD_STATUS.into(), json!("Done"));
        let rec = store(&server).update_record("rec9", fields).await.unwrap();
        assert_eq!(rec.to_ticket().status, TicketStatus::Done);
        assert_eq!(patch.calls(), 1);
    }
}
