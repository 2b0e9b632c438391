//! ArangoDB REST client (blocking).

use crate::{Aql, CollectionKind, Credentials, QueryExecutor, StoreError};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Per-request timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Cursor batch size for queries that do not set their own.
    pub batch_size: u32,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            batch_size: 1000,
        }
    }
}

/// Standard ArangoDB error body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(rename = "errorNum", default)]
    error_num: u32,
    #[serde(rename = "errorMessage", default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct CursorPage {
    #[serde(default)]
    result: Vec<Value>,
    #[serde(rename = "hasMore", default)]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
}

pub struct ArangoHttpClient {
    client: Client,
    endpoint: Url,
    credentials: Credentials,
    database: String,
    batch_size: u32,
}

impl ArangoHttpClient {
    /// Build a client for `endpoint` (e.g. `http://localhost:8529`).
    ///
    /// No request is sent; the first operation reports connectivity problems.
    pub fn new(
        endpoint: &str,
        database: &str,
        credentials: Credentials,
        options: HttpOptions,
    ) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StoreError::Transport(format!("invalid endpoint `{endpoint}`: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(StoreError::Transport(format!(
                "invalid endpoint `{endpoint}`: not a base URL"
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            credentials,
            database: database.to_string(),
            batch_size: options.batch_size,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// `<endpoint>/_db/<database>/_api/<path...>`, each segment percent-encoded.
    fn api_url(&self, path: &[&str]) -> Result<Url, StoreError> {
        api_url(&self.endpoint, &self.database, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let response = request
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(error_from_body(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

fn api_url(endpoint: &Url, database: &str, path: &[&str]) -> Result<Url, StoreError> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| StoreError::Transport(format!("endpoint `{endpoint}` is not a base URL")))?
        .pop_if_empty()
        .extend(["_db", database, "_api"])
        .extend(path);
    Ok(url)
}

fn error_from_body(status: u16, body: &str) -> StoreError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if err.error_num != 0 || !err.error_message.is_empty() => {
            StoreError::from_response(err.code.unwrap_or(status), err.error_num, err.error_message)
        }
        _ => {
            let message = match body.trim() {
                "" => format!("HTTP {status}"),
                text => text.to_string(),
            };
            StoreError::from_response(status, 0, message)
        }
    }
}

/// Collect every batch of a cursor.
///
/// `fetch(None)` opens the cursor; `fetch(Some(id))` reads its next batch.
fn drain_cursor<F>(mut fetch: F) -> Result<Vec<Value>, StoreError>
where
    F: FnMut(Option<&str>) -> Result<CursorPage, StoreError>,
{
    let mut page = fetch(None)?;
    let mut rows = std::mem::take(&mut page.result);
    while page.has_more {
        let id = page
            .id
            .take()
            .ok_or_else(|| StoreError::Decode("cursor has more results but no id".to_string()))?;
        page = fetch(Some(&id))?;
        rows.append(&mut page.result);
    }
    Ok(rows)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
}

impl QueryExecutor for ArangoHttpClient {
    fn create_collection(&mut self, name: &str, kind: CollectionKind) -> Result<(), StoreError> {
        let url = self.api_url(&["collection"])?;
        let body = json!({ "name": name, "type": kind.type_code() });
        self.send(self.client.post(url).json(&body))?;
        Ok(())
    }

    fn create_database(&mut self, name: &str, users: &[Credentials]) -> Result<(), StoreError> {
        let url = self.api_url(&["database"])?;
        let users: Vec<Value> = users
            .iter()
            .map(|u| json!({ "username": u.username, "passwd": u.password }))
            .collect();
        let body = json!({ "name": name, "users": users });
        self.send(self.client.post(url).json(&body))?;
        Ok(())
    }

    fn drop_database(&mut self, name: &str) -> Result<(), StoreError> {
        let url = self.api_url(&["database", name])?;
        self.send(self.client.delete(url))?;
        Ok(())
    }

    fn run_query(&mut self, query: &Aql) -> Result<Vec<Value>, StoreError> {
        let query = match query.batch_size() {
            Some(_) => query.clone(),
            None => query.clone().with_batch_size(self.batch_size),
        };
        tracing::trace!(
            database = %self.database,
            query = %query.query().trim(),
            "running AQL query"
        );

        drain_cursor(|cursor| match cursor {
            None => {
                let url = self.api_url(&["cursor"])?;
                decode(self.send(self.client.post(url).json(&query))?)
            }
            Some(id) => {
                let url = self.api_url(&["cursor", id])?;
                decode(self.send(self.client.put(url))?)
            }
        })
    }

    fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    fn set_target_database(&mut self, name: &str) {
        self.database = name.to_string();
    }
}
