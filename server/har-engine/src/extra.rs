//! Supplementary header/cookie information that arrives separately from the
//! request and response it augments.

use serde::Deserialize;
use serde_json::Value;

use crate::codec::{self, ProtocolVersion};
use crate::event::{RequestExtraInfo, ResponseExtraInfo};
use crate::har::Cookie;
use crate::store::EntryState;

/// Browser cookie object as found in cookie descriptors.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowserCookie {
  name: String,
  #[serde(default)]
  value: String,
  #[serde(default)]
  domain: Option<String>,
  #[serde(default)]
  path: Option<String>,
  /// Seconds since the epoch; negative for session cookies.
  #[serde(default)]
  expires: Option<f64>,
  #[serde(default)]
  http_only: Option<bool>,
  #[serde(default)]
  secure: Option<bool>,
  #[serde(default)]
  same_site: Option<String>,
}

impl From<BrowserCookie> for Cookie {
  fn from(c: BrowserCookie) -> Self {
    Cookie {
      name: c.name,
      value: c.value,
      path: c.path,
      domain: c.domain,
      expires: c.expires.filter(|e| *e > 0.0).map(codec::iso_from_wall),
      http_only: c.http_only,
      secure: c.secure,
      same_site: c.same_site,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssociatedCookie {
  cookie: BrowserCookie,
  #[serde(default)]
  blocked_reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockedSetCookie {
  #[serde(default)]
  cookie: Option<BrowserCookie>,
  #[serde(default)]
  cookie_line: Option<String>,
}

impl BlockedSetCookie {
  fn name(&self) -> Option<String> {
    match &self.cookie {
      Some(cookie) => Some(cookie.name.clone()),
      None => self
        .cookie_line
        .as_deref()
        .and_then(codec::parse_set_cookie_line)
        .map(|c| c.name),
    }
  }
}

/// Replace request headers and keep only the cookies the browser actually sent.
pub fn apply_request(entry: &mut EntryState, extra: &RequestExtraInfo) {
  if !extra.headers.is_empty() {
    entry.request.headers = codec::parse_headers(&extra.headers);
  }
  let Some(associated) = &extra.associated_cookies else {
    return;
  };
  entry.request.cookies = associated
    .iter()
    .filter_map(|raw| match AssociatedCookie::deserialize(raw) {
      Ok(c) if c.blocked_reasons.is_empty() => Some(Cookie::from(c.cookie)),
      Ok(_) => None,
      Err(e) => {
        tracing::warn!(request_id = %extra.request_id, error = %e, "skipping malformed associated cookie");
        None
      }
    })
    .collect();
}

/// Replace response headers and drop cookies the browser refused to store.
/// No-op until the entry has a response.
pub fn apply_response(entry: &mut EntryState, extra: &ResponseExtraInfo) {
  let Some(response) = entry.response.as_mut() else {
    return;
  };
  if !extra.headers.is_empty() {
    response.headers = codec::parse_headers(&extra.headers);
    response.cookies = codec::parse_response_cookies(
      codec::header_value(&extra.headers, "Set-Cookie").as_deref(),
    );
    response.redirect_url = codec::header_value(&extra.headers, "Location").unwrap_or_default();
  }
  if let Some(text) = &extra.headers_text {
    if ProtocolVersion::is_http1x(&response.http_version) {
      response.headers_size = text.len() as i64;
    }
  }
  for raw in &extra.blocked_cookies {
    match blocked_cookie_name(raw) {
      Some(name) => response.cookies.retain(|c| c.name != name),
      None => {
        tracing::warn!(request_id = %extra.request_id, descriptor = %raw, "skipping malformed blocked cookie");
      }
    }
  }
}

fn blocked_cookie_name(raw: &Value) -> Option<String> {
  BlockedSetCookie::deserialize(raw).ok()?.name()
}
