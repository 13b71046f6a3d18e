//! Transport for the academy backend.
//!
//! The backend is a single web-app endpoint. Reads are `GET ?action=<name>&...`
//! and writes are `POST` with a JSON body `{ "action": <name>, ...fields }`.
//! A response carrying an `error` field is a failure whatever its status.

use std::future::Future;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::api_types::FieldMap;
use super::error::{ApiError, GENERIC_FAILURE};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Maximum redirects followed. The web-app endpoint answers through a redirect.
const MAX_REDIRECTS: usize = 10;

/// Request/response contract of the backend.
///
/// Implemented over HTTP by [`HttpTransport`]; tests substitute a scripted fake.
/// The returned futures are `Send` so client calls can run on spawned tasks.
pub trait Transport: Send + Sync {
  /// Issue a read. `params` are appended after the `action` parameter.
  fn get(
    &self,
    action: &str,
    params: &[(&str, String)],
  ) -> impl Future<Output = Result<Value, ApiError>> + Send;

  /// Issue a mutation. `action` is merged into `fields`.
  fn post(
    &self,
    action: &str,
    fields: Map<String, Value>,
  ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// Backend client over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
  client: Client,
  endpoint: Url,
}

impl HttpTransport {
  pub fn new(endpoint: &str) -> Result<Self> {
    let endpoint =
      Url::parse(endpoint).map_err(|e| eyre!("Invalid backend URL {}: {}", endpoint, e))?;

    let client = Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, endpoint })
  }

  fn read_url(&self, action: &str, params: &[(&str, String)]) -> Url {
    let mut url = self.endpoint.clone();
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("action", action);
      for (name, value) in params {
        query.append_pair(name, value);
      }
    }
    url
  }
}

impl Transport for HttpTransport {
  async fn get(&self, action: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
    let url = self.read_url(action, params);
    debug!(action, "GET {}", url);

    let response = self.client.get(url).send().await?;
    read_response(response).await
  }

  async fn post(&self, action: &str, mut fields: Map<String, Value>) -> Result<Value, ApiError> {
    fields.insert("action".to_string(), Value::String(action.to_string()));
    let body = serde_json::to_string(&fields)
      .map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
    debug!(action, bytes = body.len(), "POST");

    // text/plain keeps the web-app endpoint from demanding a CORS preflight
    let response = self
      .client
      .post(self.endpoint.clone())
      .header(header::CONTENT_TYPE, "text/plain;charset=utf-8")
      .body(body)
      .send()
      .await?;
    read_response(response).await
  }
}

async fn read_response(response: reqwest::Response) -> Result<Value, ApiError> {
  let success = response.status().is_success();
  let body = response.text().await?;
  interpret_response(success, &body)
}

/// Apply the response contract to a status and body.
pub fn interpret_response(success: bool, body: &str) -> Result<Value, ApiError> {
  let value: Value = match serde_json::from_str(body) {
    Ok(value) => value,
    Err(_) if !success => return Err(ApiError::Backend(GENERIC_FAILURE.to_string())),
    Err(e) => return Err(ApiError::unparsable(body, e)),
  };

  if let Some(message) = error_message(&value) {
    return Err(ApiError::Backend(message));
  }
  if !success {
    return Err(ApiError::Backend(GENERIC_FAILURE.to_string()));
  }

  Ok(value)
}

/// Extract a failure message from a truthy `error` field.
fn error_message(value: &Value) -> Option<String> {
  match value.get("error")? {
    Value::Null | Value::Bool(false) => None,
    Value::String(s) if s.is_empty() => None,
    Value::String(s) => Some(s.clone()),
    _ => Some(GENERIC_FAILURE.to_string()),
  }
}

/// Decode a response payload into a domain type, mapping wire columns first.
pub fn decode<T: DeserializeOwned>(value: Value, field_map: Option<&FieldMap>) -> Result<T, ApiError> {
  let value = match field_map {
    Some(map) => map.to_model(value),
    None => value,
  };
  serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

/// Decode a list response row by row.
///
/// Sheet-backed lists often carry blank or half-filled rows. A row that does
/// not decode is skipped instead of failing the whole list.
pub fn decode_rows<T: DeserializeOwned>(
  value: Value,
  field_map: Option<&FieldMap>,
) -> Result<Vec<T>, ApiError> {
  let value = match field_map {
    Some(map) => map.to_model(value),
    None => value,
  };
  let rows = match value {
    Value::Array(rows) => rows,
    other => {
      return Err(ApiError::InvalidResponse(format!(
        "expected a list, got {}",
        json_kind(&other)
      )))
    }
  };

  let mut records = Vec::with_capacity(rows.len());
  for (index, row) in rows.into_iter().enumerate() {
    if is_blank_row(&row) {
      debug!(index, "Skipping blank row");
      continue;
    }
    match serde_json::from_value(row) {
      Ok(record) => records.push(record),
      Err(e) => warn!(index, error = %e, "Skipping malformed row"),
    }
  }

  Ok(records)
}

/// A row whose every cell is empty.
fn is_blank_row(row: &Value) -> bool {
  match row {
    Value::Null => true,
    Value::Object(cells) => cells.values().all(|cell| match cell {
      Value::Null => true,
      Value::String(s) => s.trim().is_empty(),
      _ => false,
    }),
    _ => false,
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "a list",
    Value::Object(_) => "an object",
  }
}

/// Encode a mutation payload as request fields, mapping model fields to wire columns.
pub fn encode<P: Serialize + ?Sized>(
  payload: &P,
  field_map: Option<&FieldMap>,
) -> Result<Map<String, Value>, ApiError> {
  let value = serde_json::to_value(payload).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
  let value = match field_map {
    Some(map) => map.to_wire(value),
    None => value,
  };
  match value {
    Value::Object(fields) => Ok(fields),
    other => Err(ApiError::InvalidPayload(format!(
      "expected an object, got {}",
      other
    ))),
  }
}
