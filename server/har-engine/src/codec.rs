//! Pure helpers: millisecond rounding, protocol classification, URL / header /
//! cookie / post-body decomposition, header-size estimates, date formatting.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use url::Url;

use crate::har::{Cookie, Header, PostData, PostParam, QueryParam, Request};

/// Round milliseconds to 3 decimals (microsecond resolution).
pub fn format_millis(ms: f64) -> f64 {
  (ms * 1000.0).round() / 1000.0
}

/// Floor milliseconds to whole milliseconds.
pub fn floor_millis(ms: f64) -> f64 {
  ms.floor()
}

/// Wall-clock seconds since the epoch -> `2015-08-26T11:51:49.592Z`.
pub fn iso_from_wall(secs: f64) -> String {
  DateTime::<Utc>::from_timestamp_millis((secs * 1000.0).round() as i64)
    .unwrap_or_default()
    .to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
  Http1x,
  Http2,
  Http3,
  Other,
}

impl ProtocolVersion {
  pub fn classify(protocol: &str) -> Self {
    let p = protocol.to_ascii_lowercase();
    if p.starts_with("http/1.") {
      Self::Http1x
    } else if p == "h2" || p.starts_with("http/2") || p.starts_with("spdy") {
      Self::Http2
    } else if p.starts_with("h3") || p.starts_with("http/3") || p.starts_with("quic") {
      Self::Http3
    } else {
      Self::Other
    }
  }

  pub fn is_http1x(protocol: &str) -> bool {
    Self::classify(protocol) == Self::Http1x
  }
}

// ---------------------------------------------------------------------------
// URL
// ---------------------------------------------------------------------------

/// Only HTTP(S) requests are tracked; everything else (data:, blob:, ftp:, ...) is ignored.
pub fn is_supported_scheme(url: &str) -> bool {
  let lower = url.trim_start().to_ascii_lowercase();
  lower.starts_with("http://") || lower.starts_with("https://")
}

/// Re-append the fragment (reported separately by the browser) and split out
/// the decoded query. Unparsable URLs are kept verbatim.
pub fn decompose_url(url: &str, fragment: Option<&str>) -> (String, Vec<QueryParam>) {
  let full = match fragment.filter(|f| !f.is_empty()) {
    Some(f) if f.starts_with('#') => format!("{}{}", url, f),
    Some(f) => format!("{}#{}", url, f),
    None => url.to_string(),
  };
  match Url::parse(&full) {
    Ok(parsed) => {
      let query = parsed
        .query_pairs()
        .map(|(name, value)| QueryParam {
          name: name.into_owned(),
          value: value.into_owned(),
        })
        .collect();
      (parsed.as_str().to_string(), query)
    }
    Err(_) => (full, Vec::new()),
  }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

fn value_to_string(v: &Value) -> String {
  match v {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

/// Header object -> ordered list. Multi-line values (Set-Cookie) become one header per line.
pub fn parse_headers(headers: &Map<String, Value>) -> Vec<Header> {
  headers
    .iter()
    .flat_map(|(name, value)| {
      value_to_string(value)
        .split('\n')
        .map(|line| Header {
          name: name.clone(),
          value: line.to_string(),
        })
        .collect::<Vec<_>>()
    })
    .collect()
}

/// Case-insensitive header lookup.
pub fn header_value(headers: &Map<String, Value>, name: &str) -> Option<String> {
  headers
    .iter()
    .find(|(k, _)| k.eq_ignore_ascii_case(name))
    .map(|(_, v)| value_to_string(v))
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

fn split_pair(s: &str) -> (String, String) {
  match s.split_once('=') {
    Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
    None => (s.trim().to_string(), String::new()),
  }
}

/// `Cookie: a=1; b=2` -> cookie list.
pub fn parse_request_cookies(header: Option<&str>) -> Vec<Cookie> {
  let Some(header) = header else {
    return Vec::new();
  };
  header
    .split(';')
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .map(|part| {
      let (name, value) = split_pair(part);
      Cookie {
        name,
        value,
        ..Cookie::default()
      }
    })
    .collect()
}

/// Parse one `Set-Cookie` line. Returns `None` for a line without a cookie name.
pub fn parse_set_cookie_line(line: &str) -> Option<Cookie> {
  let mut parts = line.split(';');
  let (name, value) = split_pair(parts.next()?);
  if name.is_empty() {
    return None;
  }
  let mut cookie = Cookie {
    name,
    value,
    ..Cookie::default()
  };
  for attr in parts.map(str::trim).filter(|a| !a.is_empty()) {
    let (key, val) = split_pair(attr);
    match key.to_ascii_lowercase().as_str() {
      "path" => cookie.path = Some(val),
      "domain" => cookie.domain = Some(val),
      "expires" => cookie.expires = Some(normalize_cookie_date(&val)),
      "httponly" => cookie.http_only = Some(true),
      "secure" => cookie.secure = Some(true),
      "samesite" => cookie.same_site = Some(val),
      _ => {}
    }
  }
  Some(cookie)
}

/// `Set-Cookie` header (newline-separated lines) -> cookie list.
pub fn parse_response_cookies(header: Option<&str>) -> Vec<Cookie> {
  header
    .map(|h| h.lines().filter_map(parse_set_cookie_line).collect())
    .unwrap_or_default()
}

fn normalize_cookie_date(raw: &str) -> String {
  DateTime::parse_from_rfc2822(raw)
    .map(|d| {
      d.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
    })
    .unwrap_or_else(|_| raw.to_string())
}

// ---------------------------------------------------------------------------
// Post data
// ---------------------------------------------------------------------------

/// Decompose a request body by content type. `None` when there is no body.
pub fn parse_post_data(content_type: Option<&str>, body: Option<&str>) -> Option<PostData> {
  let body = body?;
  let mime_type = content_type.unwrap_or_default().to_string();
  let essence = mime_type
    .split(';')
    .next()
    .unwrap_or_default()
    .trim()
    .to_ascii_lowercase();

  let params = match essence.as_str() {
    "application/x-www-form-urlencoded" => url::form_urlencoded::parse(body.as_bytes())
      .map(|(name, value)| PostParam {
        name: name.into_owned(),
        value: Some(value.into_owned()),
        file_name: None,
        content_type: None,
      })
      .collect(),
    "multipart/form-data" => multipart_boundary(&mime_type)
      .map(|b| parse_multipart(body, &b))
      .unwrap_or_default(),
    _ => Vec::new(),
  };

  Some(PostData {
    mime_type,
    params,
    text: body.to_string(),
  })
}

fn multipart_boundary(content_type: &str) -> Option<String> {
  content_type.split(';').map(str::trim).find_map(|p| {
    let (k, v) = p.split_once('=')?;
    k.trim()
      .eq_ignore_ascii_case("boundary")
      .then(|| v.trim().trim_matches('"').to_string())
  })
}

fn parse_multipart(body: &str, boundary: &str) -> Vec<PostParam> {
  let delimiter = format!("--{}", boundary);
  body
    .split(delimiter.as_str())
    .filter_map(|part| {
      let part = part.strip_prefix("\r\n").unwrap_or(part);
      if part.is_empty() || part.starts_with("--") {
        return None;
      }
      let (head, value) = part
        .split_once("\r\n\r\n")
        .or_else(|| part.split_once("\n\n"))?;
      let mut param = PostParam {
        name: String::new(),
        value: Some(value.trim_end_matches(['\r', '\n']).to_string()),
        file_name: None,
        content_type: None,
      };
      for line in head.lines() {
        let Some((key, rest)) = line.split_once(':') else {
          continue;
        };
        if key.trim().eq_ignore_ascii_case("content-disposition") {
          for attr in rest.split(';').map(str::trim) {
            if let Some((k, v)) = attr.split_once('=') {
              let v = v.trim_matches('"').to_string();
              match k.trim().to_ascii_lowercase().as_str() {
                "name" => param.name = v,
                "filename" => param.file_name = Some(v),
                _ => {}
              }
            }
          }
        } else if key.trim().eq_ignore_ascii_case("content-type") {
          param.content_type = Some(rest.trim().to_string());
        }
      }
      (!param.name.is_empty()).then_some(param)
    })
    .collect()
}

// ---------------------------------------------------------------------------
// Header sizes (HTTP/1.x only; h2+ headers are compressed)
// ---------------------------------------------------------------------------

fn headers_block_len(headers: &[Header]) -> usize {
  headers
    .iter()
    .map(|h| h.name.len() + 2 + h.value.len() + 2)
    .sum::<usize>()
    + 2
}

pub fn request_headers_size(request: &Request) -> i64 {
  let status_line = format!(
    "{} {} {}\r\n",
    request.method, request.url, request.http_version
  );
  (status_line.len() + headers_block_len(&request.headers)) as i64
}

pub fn response_headers_size(protocol: &str, status: i64, status_text: &str, headers: &[Header]) -> i64 {
  let status_line = format!("{} {} {}\r\n", protocol, status, status_text);
  (status_line.len() + headers_block_len(headers)) as i64
}
