//! Entry drafts and the request-id indexed store that owns them during a run.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::har::{self, Cache, Initiator, Request, Response, Timings};

/// Correlation bookkeeping for one entry. Never serialized.
#[derive(Debug, Clone, Default)]
pub struct EntryMeta {
  /// Monotonic seconds of the request event.
  pub request_sent: f64,
  pub loader_id: String,
  pub frame_id: Option<String>,
  /// Monotonic seconds the network stack started the request (response timing).
  pub request_time: Option<f64>,
  /// Milliseconds after `request_time` the response headers arrived.
  pub receive_headers_end: f64,
  pub served_from_cache: bool,
}

/// An entry under construction. It only becomes a `har::Entry` once it has a
/// response.
#[derive(Debug, Clone)]
pub struct EntryState {
  pub pageref: Option<String>,
  pub started_date_time: String,
  pub time: f64,
  pub request: Request,
  pub response: Option<Response>,
  pub cache: Cache,
  pub timings: Option<Timings>,
  pub server_ip_address: Option<String>,
  pub connection: Option<String>,
  pub comment: Option<String>,
  pub request_id: String,
  pub initial_priority: Option<String>,
  pub priority: Option<String>,
  pub resource_type: Option<String>,
  pub initiator: Initiator,
  pub blocked_queueing: Option<f64>,
  pub was_pushed: Option<u8>,
  pub custom: Map<String, Value>,
  pub meta: EntryMeta,
}

impl EntryState {
  pub fn new(request_id: impl Into<String>, request: Request, meta: EntryMeta) -> Self {
    Self {
      pageref: None,
      started_date_time: String::new(),
      time: 0.0,
      request,
      response: None,
      cache: Cache::default(),
      timings: None,
      server_ip_address: None,
      connection: None,
      comment: None,
      request_id: request_id.into(),
      initial_priority: None,
      priority: None,
      resource_type: None,
      initiator: Initiator::default(),
      blocked_queueing: None,
      was_pushed: None,
      custom: Map::new(),
      meta,
    }
  }

  /// Merge free-form properties as `_`-prefixed custom fields. Keys with a
  /// `__` prefix are internal and dropped, as are keys that would shadow one
  /// of the entry's own `_` fields.
  pub fn merge_custom(&mut self, props: &Map<String, Value>) {
    for (key, value) in props {
      if key.starts_with("__") {
        continue;
      }
      let key = if key.starts_with('_') {
        key.clone()
      } else {
        format!("_{}", key)
      };
      if har::RESERVED_CUSTOM_FIELDS.contains(&key.as_str()) {
        tracing::debug!(request_id = %self.request_id, key = %key, "dropping custom property that shadows an entry field");
        continue;
      }
      self.custom.insert(key, value.clone());
    }
  }

  /// Strip bookkeeping. Entries without a response are incomplete and yield `None`.
  pub fn into_har(self) -> Option<har::Entry> {
    let response = self.response?;
    Some(har::Entry {
      pageref: self.pageref,
      started_date_time: self.started_date_time,
      time: self.time,
      request: self.request,
      response,
      cache: self.cache,
      timings: self.timings.unwrap_or_else(Timings::unknown),
      server_ip_address: self.server_ip_address,
      connection: self.connection,
      comment: self.comment,
      request_id: self.request_id,
      initial_priority: self.initial_priority,
      priority: self.priority,
      resource_type: self.resource_type,
      initiator: self.initiator,
      blocked_queueing: self.blocked_queueing,
      was_pushed: self.was_pushed,
      custom: self.custom,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
  Attached(usize),
  Pending(usize),
}

/// Attached entries (in creation order), entries still waiting for a page
/// (with the index of their originating event), and one request-id index over both.
#[derive(Debug, Default)]
pub struct EntryStore {
  attached: Vec<EntryState>,
  pending: Vec<(EntryState, usize)>,
  index: HashMap<String, Slot>,
}

impl EntryStore {
  pub fn push(&mut self, entry: EntryState) {
    self
      .index
      .insert(entry.request_id.clone(), Slot::Attached(self.attached.len()));
    self.attached.push(entry);
  }

  pub fn push_pending(&mut self, entry: EntryState, event_index: usize) {
    self
      .index
      .insert(entry.request_id.clone(), Slot::Pending(self.pending.len()));
    self.pending.push((entry, event_index));
  }

  pub fn contains(&self, request_id: &str) -> bool {
    self.index.contains_key(request_id)
  }

  pub fn get(&self, request_id: &str) -> Option<&EntryState> {
    match *self.index.get(request_id)? {
      Slot::Attached(i) => self.attached.get(i),
      Slot::Pending(i) => self.pending.get(i).map(|(e, _)| e),
    }
  }

  pub fn get_mut(&mut self, request_id: &str) -> Option<&mut EntryState> {
    match *self.index.get(request_id)? {
      Slot::Attached(i) => self.attached.get_mut(i),
      Slot::Pending(i) => self.pending.get_mut(i).map(|(e, _)| e),
    }
  }

  /// Give the entry currently holding `request_id` a fresh identity (the id
  /// with `r` appended until unique) so the next redirect leg can take the id.
  pub fn retire(&mut self, request_id: &str) -> Option<&mut EntryState> {
    let slot = self.index.remove(request_id)?;
    let mut renamed = format!("{}r", request_id);
    while self.index.contains_key(&renamed) {
      renamed.push('r');
    }
    self.index.insert(renamed.clone(), slot);
    let entry = match slot {
      Slot::Attached(i) => self.attached.get_mut(i),
      Slot::Pending(i) => self.pending.get_mut(i).map(|(e, _)| e),
    }?;
    entry.request_id = renamed;
    Some(entry)
  }

  pub fn has_pending(&self) -> bool {
    !self.pending.is_empty()
  }

  /// Remove all page-less entries, in arrival order, with their originating event index.
  pub fn take_pending(&mut self) -> Vec<(EntryState, usize)> {
    let pending = std::mem::take(&mut self.pending);
    self
      .index
      .retain(|_, slot| !matches!(slot, Slot::Pending(_)));
    pending
  }

  pub fn attached_mut(&mut self) -> impl Iterator<Item = &mut EntryState> {
    self.attached.iter_mut()
  }

  pub fn into_attached(self) -> Vec<EntryState> {
    self.attached
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(id: &str) -> EntryState {
    let request = Request {
      method: "GET".into(),
      url: format!("https://example.com/{}", id),
      http_version: String::new(),
      cookies: Vec::new(),
      headers: Vec::new(),
      query_string: Vec::new(),
      post_data: None,
      headers_size: -1,
      body_size: 0,
    };
    EntryState::new(id, request, EntryMeta::default())
  }

  #[test]
  fn lookup_spans_attached_and_pending() {
    let mut store = EntryStore::default();
    store.push(entry("a"));
    store.push_pending(entry("b"), 3);
    assert!(store.get("a").is_some());
    assert!(store.get("b").is_some());
    assert!(store.get("c").is_none());
  }

  #[test]
  fn retire_frees_the_id_with_unique_suffixes() {
    let mut store = EntryStore::default();
    store.push(entry("7"));
    assert_eq!(store.retire("7").unwrap().request_id, "7r");
    store.push(entry("7"));
    assert_eq!(store.retire("7").unwrap().request_id, "7rr");
    store.push(entry("7"));
    assert!(store.get("7r").is_some());
    assert!(store.get("7rr").is_some());
    assert!(store.get("7").is_some());
    assert!(store.retire("missing").is_none());
  }

  #[test]
  fn take_pending_clears_index_and_keeps_order() {
    let mut store = EntryStore::default();
    store.push_pending(entry("x"), 0);
    store.push_pending(entry("y"), 2);
    let pending = store.take_pending();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].0.request_id, "x");
    assert_eq!(pending[1].1, 2);
    assert!(!store.has_pending());
    assert!(!store.contains("x"));
  }

  #[test]
  fn custom_properties_get_single_underscore() {
    let mut e = entry("a");
    let props = serde_json::json!({"team": "perf", "_run": 3, "__secret": true});
    e.merge_custom(props.as_object().unwrap());
    assert_eq!(e.custom.get("_team").unwrap(), "perf");
    assert_eq!(e.custom.get("_run").unwrap(), 3);
    assert!(!e.custom.contains_key("__secret"));
  }

  #[test]
  fn custom_properties_cannot_shadow_entry_fields() {
    let mut e = entry("a");
    let props = serde_json::json!({"requestId": "spoof", "_priority": "Low", "initiator": "x", "label": "ok"});
    e.merge_custom(props.as_object().unwrap());
    assert_eq!(e.custom.len(), 1);
    assert_eq!(e.custom.get("_label").unwrap(), "ok");
    assert_eq!(e.request_id, "a");
  }

  #[test]
  fn incomplete_entry_has_no_har_form() {
    assert!(entry("a").into_har().is_none());
  }
}
