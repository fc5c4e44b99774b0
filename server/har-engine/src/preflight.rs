//! Heuristic linking of CORS preflight requests to the document that triggered them.
//!
//! A preflight carries no loader id. When a request has an empty loader id,
//! method `OPTIONS` and an `other` initiator, the nearest preceding non-OPTIONS
//! request for its document URL is taken as the trigger.

use crate::event::{Event, RequestWillBeSent};

/// How many events before the preflight are searched.
pub const PREFLIGHT_LOOKBACK: usize = 50;

/// Loader and frame recovered for a preflight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preflight {
  pub loader_id: String,
  pub frame_id: Option<String>,
}

pub fn is_preflight(req: &RequestWillBeSent) -> bool {
  req.loader_id.is_empty() && req.request.method == "OPTIONS" && req.initiator.kind == "other"
}

/// Search `events[at - PREFLIGHT_LOOKBACK .. at]` newest-first.
pub fn recover(events: &[Event], at: usize, req: &RequestWillBeSent) -> Option<Preflight> {
  let at = at.min(events.len());
  let start = at.saturating_sub(PREFLIGHT_LOOKBACK);
  events[start..at].iter().rev().find_map(|e| match e {
    Event::RequestWillBeSent(prior)
      if prior.request.method != "OPTIONS" && prior.request.url == req.document_url =>
    {
      Some(Preflight {
        loader_id: prior.loader_id.clone(),
        frame_id: prior.frame_id.clone(),
      })
    }
    _ => None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::{decode_all, InboundEvent};
  use serde_json::{json, Value};

  fn request(id: &str, loader: &str, frame: &str, method: &str, url: &str, doc: &str) -> InboundEvent {
    InboundEvent::new(
      "Network.requestWillBeSent",
      json!({
        "requestId": id,
        "loaderId": loader,
        "frameId": frame,
        "documentURL": doc,
        "request": {"url": url, "method": method},
        "timestamp": 1.0,
        "initiator": {"type": "other"}
      }),
    )
  }

  fn as_request(e: &Event) -> &RequestWillBeSent {
    match e {
      Event::RequestWillBeSent(r) => r,
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn nearest_matching_request_wins() {
    let events = decode_all(&[
      request("1", "L1", "F1", "GET", "https://app.example/", "https://app.example/"),
      request("2", "L2", "F2", "GET", "https://app.example/", "https://app.example/"),
      request("3", "", "", "OPTIONS", "https://api.example/data", "https://app.example/"),
    ]);
    let pre = as_request(&events[2]);
    assert!(is_preflight(pre));
    let found = recover(&events, 2, pre).unwrap();
    assert_eq!(found.loader_id, "L2");
    assert_eq!(found.frame_id.as_deref(), Some("F2"));
  }

  #[test]
  fn options_requests_are_not_triggers() {
    let events = decode_all(&[
      request("1", "L1", "F1", "OPTIONS", "https://app.example/", "https://app.example/"),
      request("2", "", "", "OPTIONS", "https://api.example/data", "https://app.example/"),
    ]);
    assert!(recover(&events, 1, as_request(&events[1])).is_none());
  }

  #[test]
  fn trigger_outside_lookback_is_ignored() {
    let mut raw = vec![request("1", "L1", "F1", "GET", "https://app.example/", "https://app.example/")];
    raw.extend((0..PREFLIGHT_LOOKBACK).map(|_| InboundEvent::new("Network.dataReceived", Value::Null)));
    raw.push(request("2", "", "", "OPTIONS", "https://api.example/data", "https://app.example/"));
    let events = decode_all(&raw);
    let at = events.len() - 1;
    assert!(recover(&events, at, as_request(&events[at])).is_none());
  }

  #[test]
  fn loader_or_method_mismatch_is_not_preflight() {
    let events = decode_all(&[
      request("1", "L1", "F1", "OPTIONS", "https://api.example/", "https://app.example/"),
      request("2", "", "", "GET", "https://api.example/", "https://app.example/"),
    ]);
    assert!(!is_preflight(as_request(&events[0])));
    assert!(!is_preflight(as_request(&events[1])));
  }
}
