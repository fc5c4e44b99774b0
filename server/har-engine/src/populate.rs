//! Fill entries from response payloads (normal responses and redirect legs),
//! and apply the terminal events: completion and failure.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::codec::{self, format_millis, floor_millis, ProtocolVersion};
use crate::error::HarError;
use crate::event::{LoadingFailed, LoadingFinished};
use crate::har::{CacheState, Content, Response, Timings};
use crate::store::EntryState;

/// Response payload as reported by the browser.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
  pub url: String,
  pub status: i64,
  #[serde(default)]
  pub status_text: String,
  pub headers: Map<String, Value>,
  #[serde(default)]
  pub headers_text: Option<String>,
  pub mime_type: String,
  #[serde(default)]
  pub request_headers: Option<Map<String, Value>>,
  #[serde(default)]
  pub request_headers_text: Option<String>,
  #[serde(default)]
  pub connection_id: Option<Value>,
  #[serde(default, rename = "remoteIPAddress")]
  pub remote_ip_address: Option<String>,
  #[serde(default)]
  pub from_disk_cache: bool,
  #[serde(default)]
  pub encoded_data_length: f64,
  #[serde(default)]
  pub timing: Option<ResourceTiming>,
  #[serde(default)]
  pub protocol: Option<String>,
  /// Wall-clock milliseconds since the epoch.
  #[serde(default)]
  pub response_time: Option<f64>,
}

impl ResponsePayload {
  /// Best-effort decode for heuristic scans, where a bad payload just means "no match".
  pub fn deserialize_lenient(raw: &Value) -> Option<Self> {
    Self::deserialize(raw).ok()
  }
}

fn not_applicable() -> f64 {
  -1.0
}

/// Millisecond offsets relative to `request_time` (seconds); `-1` when a phase did not happen.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTiming {
  pub request_time: f64,
  #[serde(default = "not_applicable")]
  pub dns_start: f64,
  #[serde(default = "not_applicable")]
  pub dns_end: f64,
  #[serde(default = "not_applicable")]
  pub connect_start: f64,
  #[serde(default = "not_applicable")]
  pub connect_end: f64,
  #[serde(default = "not_applicable")]
  pub ssl_start: f64,
  #[serde(default = "not_applicable")]
  pub ssl_end: f64,
  #[serde(default = "not_applicable")]
  pub send_start: f64,
  #[serde(default = "not_applicable")]
  pub send_end: f64,
  #[serde(default)]
  pub push_start: f64,
  #[serde(default)]
  pub receive_headers_end: f64,
}

fn optional_span(start: f64, end: f64) -> f64 {
  if start >= 0.0 {
    format_millis((end - start).max(0.0))
  } else {
    -1.0
  }
}

impl ResourceTiming {
  /// HAR breakdown. `connect` excludes the TLS handshake, which is reported
  /// separately as `ssl`, so the components never overlap.
  pub fn breakdown(&self) -> Timings {
    let blocked = [self.dns_start, self.connect_start, self.send_start]
      .into_iter()
      .find(|t| *t >= 0.0)
      .map(format_millis)
      .unwrap_or(0.0);
    let dns = optional_span(self.dns_start, self.dns_end);
    let ssl = optional_span(self.ssl_start, self.ssl_end);
    let mut connect = optional_span(self.connect_start, self.connect_end);
    if connect >= 0.0 && ssl >= 0.0 {
      connect = format_millis((connect - ssl).max(0.0));
    }
    let send = if self.send_start >= 0.0 {
      format_millis((self.send_end - self.send_start).max(0.0))
    } else {
      0.0
    };
    let wait = format_millis((self.receive_headers_end - self.send_end.max(0.0)).max(0.0));
    Timings {
      blocked,
      dns,
      connect,
      send,
      wait,
      receive: 0.0,
      ssl,
      comment: None,
    }
  }
}

/// Decode a raw response payload. Failure here is the engine's one fatal error.
pub fn decode_response(request_id: &str, raw: &Value) -> Result<ResponsePayload, HarError> {
  ResponsePayload::deserialize(raw).map_err(|e| {
    tracing::error!(
      request_id,
      payload = %raw,
      error = %e,
      "failed to populate entry from response"
    );
    HarError::population(request_id, e)
  })
}

/// Fill status, headers, cookies, content metadata, sizes and timings from a
/// response (or from the redirect response of the next leg).
pub fn populate(entry: &mut EntryState, raw: &Value) -> Result<(), HarError> {
  let payload = decode_response(&entry.request_id, raw)?;
  let protocol = payload.protocol.clone().unwrap_or_default();
  let http1x = ProtocolVersion::is_http1x(&protocol);
  let headers = codec::parse_headers(&payload.headers);

  let mut response = Response {
    status: payload.status,
    status_text: payload.status_text.clone(),
    http_version: protocol.clone(),
    cookies: codec::parse_response_cookies(
      codec::header_value(&payload.headers, "Set-Cookie").as_deref(),
    ),
    headers,
    content: Content {
      size: 0,
      compression: None,
      mime_type: payload.mime_type.clone(),
      text: None,
      encoding: None,
    },
    redirect_url: codec::header_value(&payload.headers, "Location").unwrap_or_default(),
    headers_size: -1,
    body_size: -1,
    transfer_size: payload.encoded_data_length as i64,
    error: None,
  };
  entry.request.http_version = protocol.clone();

  let pushed = payload.timing.as_ref().is_some_and(|t| t.push_start > 0.0);
  if payload.from_disk_cache {
    if http1x {
      response.headers_size = codec::response_headers_size(
        &protocol,
        response.status,
        &response.status_text,
        &response.headers,
      );
    }
    // A pushed resource can arrive before the parser asks for it; that is not a cache hit.
    if !pushed {
      entry.cache.before_request = Some(CacheState::default());
    }
  } else {
    if let Some(request_headers) = &payload.request_headers {
      entry.request.headers = codec::parse_headers(request_headers);
      entry.request.cookies = codec::parse_request_cookies(
        codec::header_value(request_headers, "Cookie").as_deref(),
      );
    }
    if http1x {
      response.headers_size = match &payload.headers_text {
        Some(text) => text.len() as i64,
        None => codec::response_headers_size(
          &protocol,
          response.status,
          &response.status_text,
          &response.headers,
        ),
      };
      response.body_size = payload.encoded_data_length as i64 - response.headers_size;
      entry.request.headers_size = match &payload.request_headers_text {
        Some(text) => text.len() as i64,
        None => codec::request_headers_size(&entry.request),
      };
    }
  }
  entry.response = Some(response);

  entry.connection = payload.connection_id.as_ref().map(|id| match id {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  });
  entry.server_ip_address = payload
    .remote_ip_address
    .as_deref()
    .map(|ip| ip.trim_start_matches('[').trim_end_matches(']').to_string())
    .filter(|ip| !ip.is_empty());

  match &payload.timing {
    Some(timing) => {
      entry.meta.request_time = Some(timing.request_time);
      entry.meta.receive_headers_end = timing.receive_headers_end;
      if entry.meta.request_sent > 0.0 {
        entry.blocked_queueing = Some(format_millis(
          ((timing.request_time - entry.meta.request_sent) * 1000.0).max(0.0),
        ));
      }
      if pushed {
        entry.was_pushed = Some(1);
      }
      entry.timings = Some(timing.breakdown());
    }
    None => {
      entry.timings = Some(Timings {
        comment: Some("No timings available from the browser".into()),
        ..Timings::unknown()
      });
    }
  }

  if entry.meta.served_from_cache {
    entry.timings = Some(Timings::cached());
  }
  entry.time = entry
    .timings
    .as_ref()
    .map_or(0.0, |t| floor_millis(t.total()));
  Ok(())
}

/// Terminal success: receive timing, total time, transfer/body size, compression.
pub fn complete(entry: &mut EntryState, finished: &LoadingFinished) {
  if entry.meta.served_from_cache {
    entry.timings = Some(Timings::cached());
    entry.time = 0.0;
  } else if let Some(timings) = entry.timings.as_mut() {
    if let Some(request_time) = entry.meta.request_time {
      let headers_received = request_time + entry.meta.receive_headers_end / 1000.0;
      let since = entry.meta.request_sent.max(headers_received);
      timings.receive = format_millis(((finished.timestamp - since) * 1000.0).max(0.0));
    }
    entry.time = floor_millis(timings.total());
  }

  let Some(encoded) = finished.encoded_data_length.filter(|e| *e >= 0.0) else {
    return;
  };
  let Some(response) = entry.response.as_mut() else {
    return;
  };
  response.transfer_size = encoded as i64;
  response.body_size = encoded as i64;
  if ProtocolVersion::is_http1x(&response.http_version) && response.headers_size > -1 {
    response.body_size -= response.headers_size;
  }
  let compression = response.content.size - response.body_size;
  if compression > 0 {
    response.content.compression = Some(compression);
  }
}

/// Terminal failure: the load was aborted, blocked or errored upstream.
pub fn fail(entry: &mut EntryState, failed: &LoadingFailed) {
  let response = entry.response.get_or_insert_with(|| Response {
    status: 0,
    status_text: String::new(),
    http_version: String::new(),
    cookies: Vec::new(),
    headers: Vec::new(),
    content: Content {
      size: 0,
      compression: None,
      mime_type: "x-unknown".into(),
      text: None,
      encoding: None,
    },
    redirect_url: String::new(),
    headers_size: -1,
    body_size: 0,
    transfer_size: 0,
    error: Some(failed.error_text.clone()),
  });
  response.transfer_size = 0;
  response.error = Some(failed.error_text.clone());

  if entry.timings.is_none() {
    let blocked = if entry.meta.request_sent > 0.0 && failed.timestamp > 0.0 {
      format_millis(((failed.timestamp - entry.meta.request_sent) * 1000.0).max(0.0))
    } else {
      0.0
    };
    entry.timings = Some(Timings {
      blocked,
      ..Timings::cached()
    });
  }
  entry.time = entry
    .timings
    .as_ref()
    .map_or(0.0, |t| floor_millis(t.total()));
  entry.server_ip_address = None;
  entry.comment = Some(match failed.blocked_reason.as_deref().filter(|r| !r.is_empty()) {
    Some(reason) => format!("{}; blocked reason: {}", failed.error_text, reason),
    None => failed.error_text.clone(),
  });
}
