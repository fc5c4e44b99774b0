//! Recovery for pages whose document request was never observed (the
//! instrumentation attached after the request started).

use crate::codec;
use crate::config::{OffsetClock, WallTime};
use crate::event::{Event, NavigatedFrame};
use crate::har::{Initiator, Request};
use crate::populate::ResponsePayload;
use crate::store::{EntryMeta, EntryState};

/// Number of leading events scanned for a document response, and for clock calibration.
pub const RECOVERY_WINDOW: usize = 10;

/// A placeholder document entry, plus the page start (monotonic, wall) when it could be recovered.
#[derive(Debug)]
pub struct Recovered {
  pub entry: EntryState,
  pub start: Option<(f64, f64)>,
}

fn window(events: &[Event]) -> &[Event] {
  &events[..events.len().min(RECOVERY_WINDOW)]
}

/// Offset clock from the first request in the recovery window carrying both clocks.
pub fn calibrate(events: &[Event]) -> OffsetClock {
  window(events)
    .iter()
    .find_map(|e| match e {
      Event::RequestWillBeSent(r) if r.wall_time > 0.0 => {
        Some(OffsetClock::from_pair(r.timestamp, r.wall_time))
      }
      _ => None,
    })
    .unwrap_or_default()
}

/// Build a minimal GET entry for a navigation with no recorded request.
///
/// Prefers a response for the loader id among the earliest events (it carries
/// timing); otherwise falls back to the navigation payload alone.
pub fn recover(events: &[Event], frame: &NavigatedFrame, clock: &dyn WallTime) -> Recovered {
  let found = window(events).iter().find_map(|e| match e {
    Event::ResponseReceived(r) if r.request_id == frame.loader_id => {
      ResponsePayload::deserialize_lenient(&r.response)
    }
    _ => None,
  });

  match found {
    Some(response) => {
      let start = match (&response.timing, response.response_time) {
        (Some(timing), _) => Some((timing.request_time, clock.to_wall(timing.request_time))),
        (None, Some(wall_ms)) => {
          let wall = wall_ms / 1000.0;
          Some((clock.to_monotonic(wall), wall))
        }
        (None, None) => None,
      };
      tracing::debug!(loader_id = %frame.loader_id, "recovered document request from early response");
      Recovered {
        entry: synthetic_entry(&response.url, None, frame, start),
        start,
      }
    }
    None => {
      tracing::debug!(loader_id = %frame.loader_id, "fabricated document request from navigation");
      Recovered {
        entry: synthetic_entry(&frame.url, frame.url_fragment.as_deref(), frame, None),
        start: None,
      }
    }
  }
}

fn synthetic_entry(
  url: &str,
  fragment: Option<&str>,
  frame: &NavigatedFrame,
  start: Option<(f64, f64)>,
) -> EntryState {
  let (url, query_string) = codec::decompose_url(url, fragment);
  let request = Request {
    method: "GET".into(),
    url,
    http_version: String::new(),
    cookies: Vec::new(),
    headers: Vec::new(),
    query_string,
    post_data: None,
    headers_size: -1,
    body_size: 0,
  };
  let meta = EntryMeta {
    request_sent: start.map_or(0.0, |(monotonic, _)| monotonic),
    loader_id: frame.loader_id.clone(),
    frame_id: Some(frame.id.clone()),
    ..EntryMeta::default()
  };
  let mut entry = EntryState::new(frame.loader_id.clone(), request, meta);
  entry.resource_type = Some("document".into());
  entry.initiator = Initiator {
    kind: Some("other".into()),
    ..Initiator::default()
  };
  entry
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::{decode_all, InboundEvent};
  use serde_json::json;

  fn frame() -> NavigatedFrame {
    NavigatedFrame {
      id: "F1".into(),
      parent_id: None,
      loader_id: "L1".into(),
      url: "https://example.com/start".into(),
      url_fragment: Some("#intro".into()),
    }
  }

  fn response_event(request_id: &str, with_timing: bool) -> InboundEvent {
    let mut response = json!({
      "url": "https://example.com/start",
      "status": 200,
      "headers": {},
      "mimeType": "text/html",
      "responseTime": 1_700_000_050_000.0
    });
    if with_timing {
      response["timing"] = json!({"requestTime": 50.0, "sendStart": 0.0, "sendEnd": 1.0, "receiveHeadersEnd": 5.0});
    }
    InboundEvent::new(
      "Network.responseReceived",
      json!({"requestId": request_id, "loaderId": "L1", "frameId": "F1", "response": response}),
    )
  }

  #[test]
  fn early_response_supplies_timing() {
    let events = decode_all(&[response_event("L1", true)]);
    let clock = OffsetClock::from_pair(0.0, 1_700_000_000.0);
    let recovered = recover(&events, &frame(), &clock);
    assert_eq!(recovered.start, Some((50.0, 1_700_000_050.0)));
    assert_eq!(recovered.entry.request_id, "L1");
    assert_eq!(recovered.entry.request.method, "GET");
  }

  #[test]
  fn response_time_used_when_timing_missing() {
    let events = decode_all(&[response_event("L1", false)]);
    let clock = OffsetClock::from_pair(0.0, 1_700_000_000.0);
    let recovered = recover(&events, &frame(), &clock);
    assert_eq!(recovered.start, Some((50.0, 1_700_000_050.0)));
  }

  #[test]
  fn falls_back_to_navigation_payload() {
    let events = decode_all(&[response_event("other", true)]);
    let recovered = recover(&events, &frame(), &OffsetClock::default());
    assert!(recovered.start.is_none());
    assert_eq!(recovered.entry.request.url, "https://example.com/start#intro");
  }

  #[test]
  fn response_outside_window_is_not_used() {
    let mut raw: Vec<InboundEvent> = (0..RECOVERY_WINDOW)
      .map(|_| InboundEvent::new("Runtime.executionContextCreated", json!({})))
      .collect();
    raw.push(response_event("L1", true));
    let events = decode_all(&raw);
    let recovered = recover(&events, &frame(), &OffsetClock::default());
    assert!(recovered.start.is_none());
  }

  #[test]
  fn calibration_uses_first_request_with_wall_time() {
    let raw = vec![InboundEvent::new(
      "Network.requestWillBeSent",
      json!({
        "requestId": "1", "loaderId": "L1",
        "request": {"url": "https://example.com/", "method": "GET"},
        "timestamp": 10.0, "wallTime": 1_700_000_010.0
      }),
    )];
    let clock = calibrate(&decode_all(&raw));
    assert_eq!(clock.offset, 1_700_000_000.0);
  }
}
