//! HAR 1.2 output types (JSON contract: what we emit).
//!
//! Fields prefixed with `_` are HAR custom fields. Nothing in here carries
//! correlation bookkeeping; that lives in `store::EntryMeta` and `engine::PageState`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HAR_VERSION: &str = "1.2";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Har {
  pub log: Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
  pub version: String,
  pub creator: Creator,
  pub pages: Vec<Page>,
  pub entries: Vec<Entry>,
  #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
  pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
  pub name: String,
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
  pub started_date_time: String,
  pub id: String,
  pub title: String,
  pub page_timings: PageTimings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTimings {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub on_content_load: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub on_load: Option<f64>,
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pageref: Option<String>,
  pub started_date_time: String,
  /// Total elapsed milliseconds: floored sum of the non-negative timings.
  pub time: f64,
  pub request: Request,
  pub response: Response,
  pub cache: Cache,
  pub timings: Timings,
  #[serde(rename = "serverIPAddress", default, skip_serializing_if = "Option::is_none")]
  pub server_ip_address: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub connection: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,

  #[serde(rename = "_requestId")]
  pub request_id: String,
  #[serde(rename = "_initialPriority", default, skip_serializing_if = "Option::is_none")]
  pub initial_priority: Option<String>,
  #[serde(rename = "_priority", default, skip_serializing_if = "Option::is_none")]
  pub priority: Option<String>,
  #[serde(rename = "_resourceType", default, skip_serializing_if = "Option::is_none")]
  pub resource_type: Option<String>,
  #[serde(flatten)]
  pub initiator: Initiator,
  #[serde(rename = "_blocked_queueing", default, skip_serializing_if = "Option::is_none")]
  pub blocked_queueing: Option<f64>,
  #[serde(rename = "_was_pushed", default, skip_serializing_if = "Option::is_none")]
  pub was_pushed: Option<u8>,
  /// Free-form `_`-prefixed custom properties merged from events.
  #[serde(flatten)]
  pub custom: Map<String, Value>,
}

/// `_` fields with a typed home on `Entry`; custom properties may not reuse them.
pub const RESERVED_CUSTOM_FIELDS: &[&str] = &[
  "_requestId",
  "_initialPriority",
  "_priority",
  "_resourceType",
  "_initiator_type",
  "_initiator",
  "_initiator_line",
  "_initiator_column",
  "_initiator_function_name",
  "_initiator_script_id",
  "_blocked_queueing",
  "_was_pushed",
];

/// Who triggered the request, flattened into `_initiator*` custom fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Initiator {
  #[serde(rename = "_initiator_type", default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  #[serde(rename = "_initiator", default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  /// 1-based.
  #[serde(rename = "_initiator_line", default, skip_serializing_if = "Option::is_none")]
  pub line: Option<i64>,
  /// 1-based.
  #[serde(rename = "_initiator_column", default, skip_serializing_if = "Option::is_none")]
  pub column: Option<i64>,
  #[serde(rename = "_initiator_function_name", default, skip_serializing_if = "Option::is_none")]
  pub function_name: Option<String>,
  #[serde(rename = "_initiator_script_id", default, skip_serializing_if = "Option::is_none")]
  pub script_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
  pub method: String,
  pub url: String,
  pub http_version: String,
  pub cookies: Vec<Cookie>,
  pub headers: Vec<Header>,
  pub query_string: Vec<QueryParam>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub post_data: Option<PostData>,
  pub headers_size: i64,
  pub body_size: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
  pub status: i64,
  pub status_text: String,
  pub http_version: String,
  pub cookies: Vec<Cookie>,
  pub headers: Vec<Header>,
  pub content: Content,
  #[serde(rename = "redirectURL")]
  pub redirect_url: String,
  pub headers_size: i64,
  pub body_size: i64,
  #[serde(rename = "_transferSize")]
  pub transfer_size: i64,
  #[serde(rename = "_error", default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
  pub size: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub compression: Option<i64>,
  pub mime_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
  pub name: String,
  pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
  pub name: String,
  pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
  pub name: String,
  pub value: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub domain: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expires: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub http_only: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub secure: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub same_site: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
  pub mime_type: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub params: Vec<PostParam>,
  pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostParam {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub file_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cache {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub before_request: Option<CacheState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheState {
  pub last_access: String,
  #[serde(rename = "eTag")]
  pub e_tag: String,
  pub hit_count: i64,
}

/// Timing breakdown in milliseconds. `-1` means "not applicable".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timings {
  pub blocked: f64,
  pub dns: f64,
  pub connect: f64,
  pub send: f64,
  pub wait: f64,
  pub receive: f64,
  pub ssl: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub comment: Option<String>,
}

impl Timings {
  /// Placeholder before any response timing is known.
  pub fn unknown() -> Self {
    Self {
      blocked: -1.0,
      dns: -1.0,
      connect: -1.0,
      send: 0.0,
      wait: 0.0,
      receive: 0.0,
      ssl: -1.0,
      comment: None,
    }
  }

  /// Timings for entries served from the in-process cache: nothing on the wire.
  pub fn cached() -> Self {
    Self {
      blocked: 0.0,
      ..Self::unknown()
    }
  }

  /// Sum of the non-negative components; `-1` contributes 0.
  pub fn total(&self) -> f64 {
    [
      self.blocked,
      self.dns,
      self.connect,
      self.send,
      self.wait,
      self.receive,
      self.ssl,
    ]
      .iter()
      .map(|t| t.max(0.0))
      .sum()
  }
}
