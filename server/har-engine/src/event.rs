//! Inbound events: the raw `{method, params}` envelope and the closed set of
//! typed events the engine understands.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Inbound envelope (JSON contract: what the caller sends)
// ---------------------------------------------------------------------------

/// One protocol notification. Unknown fields are silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
  pub method: String,
  #[serde(default)]
  pub params: Value,
}

impl InboundEvent {
  pub fn new(method: impl Into<String>, params: Value) -> Self {
    Self {
      method: method.into(),
      params,
    }
  }
}

// ---------------------------------------------------------------------------
// Page domain payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FrameNavigated {
  pub frame: NavigatedFrame,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigatedFrame {
  pub id: String,
  #[serde(default)]
  pub parent_id: Option<String>,
  #[serde(default)]
  pub loader_id: String,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub url_fragment: Option<String>,
}

impl NavigatedFrame {
  pub fn is_root(&self) -> bool {
    self.parent_id.as_deref().map_or(true, str::is_empty)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigatedWithinDocument {
  pub frame_id: String,
  #[serde(default)]
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAttached {
  pub frame_id: String,
  pub parent_frame_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageTimestamp {
  pub timestamp: f64,
}

// ---------------------------------------------------------------------------
// Network domain payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
  pub request_id: String,
  #[serde(default)]
  pub loader_id: String,
  #[serde(default, rename = "documentURL")]
  pub document_url: String,
  pub request: RequestPayload,
  /// Monotonic seconds.
  #[serde(default)]
  pub timestamp: f64,
  /// Wall-clock seconds since the epoch; not monotonic across events.
  #[serde(default)]
  pub wall_time: f64,
  #[serde(default)]
  pub initiator: InitiatorPayload,
  /// Present when this request is the next leg of a redirect chain. Decoded
  /// by the populator.
  #[serde(default)]
  pub redirect_response: Option<Value>,
  #[serde(default, rename = "type")]
  pub resource_type: Option<String>,
  #[serde(default)]
  pub frame_id: Option<String>,
  #[serde(default)]
  pub custom_properties: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
  pub url: String,
  #[serde(default)]
  pub url_fragment: Option<String>,
  pub method: String,
  #[serde(default)]
  pub headers: Map<String, Value>,
  #[serde(default)]
  pub post_data: Option<String>,
  #[serde(default)]
  pub initial_priority: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatorPayload {
  #[serde(default, rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub url: Option<String>,
  /// 0-based.
  #[serde(default)]
  pub line_number: Option<i64>,
  #[serde(default)]
  pub stack: Option<StackTrace>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
  #[serde(default)]
  pub call_frames: Vec<CallFrame>,
}

/// Stack frame; line and column are 0-based.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
  #[serde(default)]
  pub function_name: String,
  #[serde(default)]
  pub script_id: String,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub line_number: i64,
  #[serde(default)]
  pub column_number: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestExtraInfo {
  pub request_id: String,
  #[serde(default)]
  pub headers: Map<String, Value>,
  /// Raw descriptors; each one is decoded best-effort.
  #[serde(default)]
  pub associated_cookies: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
  pub request_id: String,
  #[serde(default)]
  pub loader_id: String,
  #[serde(default)]
  pub frame_id: Option<String>,
  #[serde(default)]
  pub timestamp: f64,
  #[serde(default, rename = "type")]
  pub resource_type: Option<String>,
  /// Decoded by the populator; a shape violation there is fatal.
  pub response: Value,
  #[serde(default)]
  pub custom_properties: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseExtraInfo {
  pub request_id: String,
  #[serde(default)]
  pub headers: Map<String, Value>,
  /// Raw descriptors; each one is decoded best-effort.
  #[serde(default)]
  pub blocked_cookies: Vec<Value>,
  #[serde(default)]
  pub headers_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataReceived {
  pub request_id: String,
  #[serde(default)]
  pub timestamp: f64,
  #[serde(default)]
  pub data_length: i64,
  #[serde(default)]
  pub encoded_data_length: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinished {
  pub request_id: String,
  pub timestamp: f64,
  #[serde(default)]
  pub encoded_data_length: Option<f64>,
  #[serde(default)]
  pub custom_properties: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFailed {
  pub request_id: String,
  #[serde(default)]
  pub timestamp: f64,
  #[serde(default)]
  pub error_text: String,
  #[serde(default)]
  pub canceled: Option<bool>,
  #[serde(default)]
  pub blocked_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestServedFromCache {
  pub request_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChangedPriority {
  pub request_id: String,
  pub new_priority: String,
}

// ---------------------------------------------------------------------------
// Closed event type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Event {
  FrameNavigated(FrameNavigated),
  NavigatedWithinDocument(NavigatedWithinDocument),
  FrameAttached(FrameAttached),
  LoadEventFired(PageTimestamp),
  DomContentEventFired(PageTimestamp),
  RequestWillBeSent(Box<RequestWillBeSent>),
  RequestWillBeSentExtraInfo(RequestExtraInfo),
  ResponseReceived(Box<ResponseReceived>),
  ResponseReceivedExtraInfo(ResponseExtraInfo),
  DataReceived(DataReceived),
  LoadingFinished(LoadingFinished),
  LoadingFailed(LoadingFailed),
  RequestServedFromCache(RequestServedFromCache),
  ResourceChangedPriority(ResourceChangedPriority),
  /// A Page/Network method we do not track, or one whose payload failed to decode.
  Unhandled(String),
  /// A method outside the Page and Network domains.
  Unrecognized(String),
}

fn params<T: DeserializeOwned>(raw: &InboundEvent) -> Result<T, serde_json::Error> {
  T::deserialize(&raw.params)
}

impl Event {
  /// Decode an envelope into a typed event.
  pub fn decode(raw: &InboundEvent) -> Result<Self, serde_json::Error> {
    let event = match raw.method.as_str() {
      "Page.frameNavigated" => Self::FrameNavigated(params(raw)?),
      "Page.navigatedWithinDocument" => Self::NavigatedWithinDocument(params(raw)?),
      "Page.frameAttached" => Self::FrameAttached(params(raw)?),
      "Page.loadEventFired" => Self::LoadEventFired(params(raw)?),
      "Page.domContentEventFired" => Self::DomContentEventFired(params(raw)?),
      "Network.requestWillBeSent" => Self::RequestWillBeSent(Box::new(params(raw)?)),
      "Network.requestWillBeSentExtraInfo" => Self::RequestWillBeSentExtraInfo(params(raw)?),
      "Network.responseReceived" => Self::ResponseReceived(Box::new(params(raw)?)),
      "Network.responseReceivedExtraInfo" => Self::ResponseReceivedExtraInfo(params(raw)?),
      "Network.dataReceived" => Self::DataReceived(params(raw)?),
      "Network.loadingFinished" => Self::LoadingFinished(params(raw)?),
      "Network.loadingFailed" => Self::LoadingFailed(params(raw)?),
      "Network.requestServedFromCache" => Self::RequestServedFromCache(params(raw)?),
      "Network.resourceChangedPriority" => Self::ResourceChangedPriority(params(raw)?),
      m if m.starts_with("Page.") || m.starts_with("Network.") => Self::Unhandled(m.to_string()),
      m => Self::Unrecognized(m.to_string()),
    };
    Ok(event)
  }
}

/// Decode a whole stream, keeping positions aligned with the input so that
/// lookback windows can index into it. Undecodable payloads are logged and
/// become `Unhandled`.
pub fn decode_all(raw: &[InboundEvent]) -> Vec<Event> {
  raw
    .iter()
    .map(|r| {
      Event::decode(r).unwrap_or_else(|e| {
        tracing::warn!(method = %r.method, error = %e, "skipping event with malformed payload");
        Event::Unhandled(r.method.clone())
      })
    })
    .collect()
}
