//! Correlation engine: one pass over the event stream, building pages and
//! entries while joining events by request, loader and frame id.
//!
//! All indices live in `Engine`, which is created for a single conversion and
//! consumed by it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::codec;
use crate::config::{Config, WallTime};
use crate::error::HarError;
use crate::event::*;
use crate::extra;
use crate::fabricate;
use crate::har::{CacheState, Initiator, Request};
use crate::populate;
use crate::preflight::{self, Preflight};
use crate::store::{EntryMeta, EntryState, EntryStore};

/// A page under construction. Converted by the finalizer; never serialized.
#[derive(Debug, Clone)]
pub struct PageState {
  /// Internal id, remapped to `page_<n>` at finalization.
  pub id: String,
  pub loader_id: Option<String>,
  pub frame_id: String,
  pub title: String,
  pub started_date_time: String,
  /// Monotonic seconds of the page's first request.
  pub timestamp: Option<f64>,
  /// Wall-clock seconds of the page's first request.
  pub wall_time: Option<f64>,
  pub on_load: Option<f64>,
  pub on_content_load: Option<f64>,
  /// A later root navigation replaced this loader-less page.
  pub superseded: bool,
}

impl PageState {
  pub fn new(loader_id: Option<String>, frame_id: String) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      loader_id,
      frame_id,
      title: String::new(),
      started_date_time: String::new(),
      timestamp: None,
      wall_time: None,
      on_load: None,
      on_content_load: None,
      superseded: false,
    }
  }

  /// Backfill the start from the first associated request. No-op once set.
  pub fn start_from(&mut self, timestamp: f64, wall_time: f64, url: &str) {
    if self.timestamp.is_some() {
      return;
    }
    self.timestamp = Some(timestamp);
    self.wall_time = Some(wall_time);
    self.started_date_time = codec::iso_from_wall(wall_time);
    if self.title.is_empty() {
      self.title = url.to_string();
    }
  }

  /// Milliseconds since the page start, if the page has one.
  fn elapsed_ms(&self, timestamp: f64) -> Option<f64> {
    self
      .timestamp
      .map(|start| codec::format_millis((timestamp - start) * 1000.0))
  }

  /// Attach an entry: set its pageref and, when both clocks are known, its start.
  /// Wall time is not monotonic across events, so the offset comes from the
  /// monotonic timestamps.
  fn adopt(&self, entry: &mut EntryState) {
    entry.pageref = Some(self.id.clone());
    if let (Some(ts), Some(wall)) = (self.timestamp, self.wall_time) {
      if entry.meta.request_sent > 0.0 {
        entry.started_date_time = codec::iso_from_wall(wall + (entry.meta.request_sent - ts));
      }
    }
  }
}

/// Per-run correlation state.
pub struct Engine<'a> {
  config: &'a Config,
  events: &'a [Event],
  clock: Arc<dyn WallTime>,
  pages: Vec<PageState>,
  store: EntryStore,
  /// Loader id -> index of the first request event carrying it.
  loader_first_request: HashMap<String, usize>,
  /// Frame id -> top-level frame id, always fully compressed.
  root_frames: HashMap<String, String>,
  /// Non-HTTP(S) requests; released on their terminal event.
  ignored: HashSet<String>,
  /// Response events that arrived before any page existed.
  pending_responses: Vec<usize>,
  request_extra: HashMap<String, RequestExtraInfo>,
  response_extra: HashMap<String, ResponseExtraInfo>,
  preflights: HashMap<String, Preflight>,
  /// Out-of-domain methods already reported.
  reported: HashSet<String>,
}

impl<'a> Engine<'a> {
  pub fn new(config: &'a Config, events: &'a [Event]) -> Self {
    let clock: Arc<dyn WallTime> = match &config.wall_time {
      Some(clock) => Arc::clone(clock),
      None => Arc::new(fabricate::calibrate(events)),
    };
    Self {
      config,
      events,
      clock,
      pages: Vec::new(),
      store: EntryStore::default(),
      loader_first_request: HashMap::new(),
      root_frames: HashMap::new(),
      ignored: HashSet::new(),
      pending_responses: Vec::new(),
      request_extra: HashMap::new(),
      response_extra: HashMap::new(),
      preflights: HashMap::new(),
      reported: HashSet::new(),
    }
  }

  /// Consume the whole stream. Returns pages in creation order and attached
  /// entries in arrival order.
  pub fn run(mut self) -> Result<(Vec<PageState>, Vec<EntryState>), HarError> {
    let events = self.events;
    for (index, event) in events.iter().enumerate() {
      self.dispatch(index, event)?;
    }
    self.adopt_orphans()?;
    Ok((self.pages, self.store.into_attached()))
  }

  fn dispatch(&mut self, index: usize, event: &'a Event) -> Result<(), HarError> {
    match event {
      Event::FrameNavigated(nav) => self.on_frame_navigated(&nav.frame)?,
      Event::NavigatedWithinDocument(nav) => self.on_navigated_within_document(nav)?,
      Event::FrameAttached(attached) => self.on_frame_attached(attached),
      Event::LoadEventFired(t) => {
        if let Some(page) = self.pages.last_mut() {
          if let Some(ms) = page.elapsed_ms(t.timestamp) {
            page.on_load = Some(ms);
          }
        }
      }
      Event::DomContentEventFired(t) => {
        if let Some(page) = self.pages.last_mut() {
          if let Some(ms) = page.elapsed_ms(t.timestamp) {
            page.on_content_load = Some(ms);
          }
        }
      }
      Event::RequestWillBeSent(req) => self.on_request(index, req)?,
      Event::RequestWillBeSentExtraInfo(extra) => self.on_request_extra(extra),
      Event::ResponseReceived(resp) => self.on_response(index, resp)?,
      Event::ResponseReceivedExtraInfo(extra) => self.on_response_extra(extra),
      Event::DataReceived(data) => {
        if self.ignored.contains(&data.request_id) {
          return Ok(());
        }
        match self.store.get_mut(&data.request_id) {
          // Chunks before the response are dropped.
          Some(entry) => {
            if let Some(response) = entry.response.as_mut() {
              response.content.size += data.data_length;
            }
          }
          None => debug!(request_id = %data.request_id, "data for unknown request"),
        }
      }
      Event::LoadingFinished(finished) => self.on_loading_finished(finished),
      Event::LoadingFailed(failed) => self.on_loading_failed(failed),
      Event::RequestServedFromCache(cached) => {
        if self.ignored.contains(&cached.request_id) {
          return Ok(());
        }
        match self.store.get_mut(&cached.request_id) {
          Some(entry) => {
            entry.meta.served_from_cache = true;
            entry.cache.before_request = Some(CacheState::default());
          }
          None => debug!(request_id = %cached.request_id, "cache hit for unknown request"),
        }
      }
      Event::ResourceChangedPriority(change) => {
        if self.ignored.contains(&change.request_id) {
          return Ok(());
        }
        match self.store.get_mut(&change.request_id) {
          Some(entry) => entry.priority = Some(change.new_priority.clone()),
          None => debug!(request_id = %change.request_id, "priority change for unknown request"),
        }
      }
      Event::Unhandled(_) => {}
      Event::Unrecognized(method) => {
        if self.reported.insert(method.clone()) {
          debug!(method = %method, "ignoring event outside the Page and Network domains");
        }
      }
    }
    Ok(())
  }

  // -------------------------------------------------------------------------
  // Frames and pages
  // -------------------------------------------------------------------------

  fn root_frame(&self, frame_id: &str) -> String {
    self
      .root_frames
      .get(frame_id)
      .cloned()
      .unwrap_or_else(|| frame_id.to_string())
  }

  fn on_frame_attached(&mut self, attached: &FrameAttached) {
    let root = self.root_frame(&attached.parent_frame_id);
    // Frames that hung off the newly attached one now resolve to its root too.
    for target in self.root_frames.values_mut() {
      if *target == attached.frame_id {
        *target = root.clone();
      }
    }
    self.root_frames.insert(attached.frame_id.clone(), root);
  }

  fn on_frame_navigated(&mut self, frame: &NavigatedFrame) -> Result<(), HarError> {
    if !frame.is_root() {
      return Ok(());
    }
    if self
      .pages
      .iter()
      .any(|p| p.loader_id.as_deref() == Some(frame.loader_id.as_str()))
    {
      debug!(loader_id = %frame.loader_id, "duplicate navigation");
      return Ok(());
    }
    if let Some(previous) = self.pages.last_mut() {
      if previous.loader_id.is_none() {
        previous.superseded = true;
      }
    }

    let mut page = PageState::new(Some(frame.loader_id.clone()), frame.id.clone());
    let events = self.events;
    match self.loader_first_request.get(&frame.loader_id).copied() {
      Some(index) => {
        if let Event::RequestWillBeSent(req) = &events[index] {
          page.start_from(req.timestamp, req.wall_time, &req.request.url);
        }
        // The document request is sent before the navigation commits, so it
        // (and anything else on this loader) landed on the previous page.
        for entry in self.store.attached_mut() {
          if entry.meta.loader_id == frame.loader_id {
            page.adopt(entry);
          }
        }
        self.pages.push(page);
      }
      None => {
        let recovered = fabricate::recover(events, frame, self.clock.as_ref());
        let mut entry = recovered.entry;
        if let Some((timestamp, wall)) = recovered.start {
          page.start_from(timestamp, wall, &entry.request.url);
        } else {
          page.title = entry.request.url.clone();
        }
        page.adopt(&mut entry);
        if let Some(extra) = self.request_extra.get(&entry.request_id) {
          extra::apply_request(&mut entry, extra);
        }
        self.store.push(entry);
        self.pages.push(page);
      }
    }
    self.adopt_pending()
  }

  fn on_navigated_within_document(&mut self, nav: &NavigatedWithinDocument) -> Result<(), HarError> {
    let frame_id = self.root_frame(&nav.frame_id);
    if self
      .pages
      .iter()
      .any(|p| !p.superseded && p.frame_id == frame_id)
    {
      return Ok(());
    }
    let mut page = PageState::new(None, frame_id);
    page.title = nav.url.clone();
    self.pages.push(page);
    self.adopt_pending()
  }

  /// Move everything buffered before the first page onto the newest page, then
  /// replay buffered responses.
  fn adopt_pending(&mut self) -> Result<(), HarError> {
    let events = self.events;
    let pending = self.store.take_pending();
    if let Some(page) = self.pages.last_mut() {
      if let Some(Event::RequestWillBeSent(first)) = pending.first().map(|(_, i)| &events[*i]) {
        page.start_from(first.timestamp, first.wall_time, &first.request.url);
      }
      for (mut entry, _) in pending {
        page.adopt(&mut entry);
        self.store.push(entry);
      }
    }
    for index in std::mem::take(&mut self.pending_responses) {
      if let Event::ResponseReceived(resp) = &events[index] {
        if self.store.contains(&resp.request_id) {
          self.apply_response(resp)?;
        } else {
          debug!(request_id = %resp.request_id, "no request matches buffered response");
        }
      }
    }
    Ok(())
  }

  /// Entries still waiting when the stream ends get a page built from the first of them.
  fn adopt_orphans(&mut self) -> Result<(), HarError> {
    if !self.pages.is_empty() || !self.store.has_pending() {
      return Ok(());
    }
    debug!("no navigation seen; creating a page from the first request");
    self.pages.push(PageState::new(None, String::new()));
    self.adopt_pending()
  }

  // -------------------------------------------------------------------------
  // Requests
  // -------------------------------------------------------------------------

  fn on_request(&mut self, index: usize, req: &RequestWillBeSent) -> Result<(), HarError> {
    let request_id = req.request_id.as_str();
    if !codec::is_supported_scheme(&req.request.url) {
      debug!(request_id, url = %req.request.url, "ignoring unsupported scheme");
      self.ignored.insert(req.request_id.clone());
      return Ok(());
    }

    let mut loader_id = req.loader_id.clone();
    let mut frame_id = req.frame_id.clone();
    if preflight::is_preflight(req) {
      if let Some(found) = preflight::recover(self.events, index, req) {
        loader_id = found.loader_id.clone();
        frame_id = found.frame_id.clone();
        self.preflights.insert(req.request_id.clone(), found);
      }
    }
    if !loader_id.is_empty() {
      self.loader_first_request.entry(loader_id.clone()).or_insert(index);
    }

    if let Some(redirect) = &req.redirect_response {
      self.retire_redirect_leg(request_id, redirect)?;
    }

    let mut entry = build_entry(req, loader_id, frame_id);
    if let Some(extra) = self.request_extra.get(request_id) {
      extra::apply_request(&mut entry, extra);
    }
    if self.config.include_custom_properties {
      if let Some(props) = &req.custom_properties {
        entry.merge_custom(props);
      }
    }

    match self.pages.last_mut() {
      None => {
        debug!(request_id, "request before any page; buffering");
        self.store.push_pending(entry, index);
      }
      Some(page) => {
        page.start_from(req.timestamp, req.wall_time, &entry.request.url);
        page.adopt(&mut entry);
        self.store.push(entry);
      }
    }
    Ok(())
  }

  /// Close the previous leg of a redirect chain: it takes a fresh id, its
  /// response comes from the redirect payload, and the extra-info received so
  /// far moves with it so the next leg starts clean.
  fn retire_redirect_leg(&mut self, request_id: &str, redirect: &serde_json::Value) -> Result<(), HarError> {
    let request_extra = self.request_extra.remove(request_id);
    let response_extra = self.response_extra.remove(request_id);
    let Some(previous) = self.store.retire(request_id) else {
      debug!(request_id, "no earlier leg for redirect");
      return Ok(());
    };
    populate::populate(previous, redirect)?;
    if let Some(extra) = &request_extra {
      extra::apply_request(previous, extra);
    }
    if let Some(extra) = &response_extra {
      extra::apply_response(previous, extra);
    }
    let leg = previous.request_id.clone();
    if let Some(extra) = request_extra {
      self.request_extra.insert(leg.clone(), extra);
    }
    if let Some(extra) = response_extra {
      self.response_extra.insert(leg, extra);
    }
    Ok(())
  }

  fn on_request_extra(&mut self, extra: &RequestExtraInfo) {
    if self.ignored.contains(&extra.request_id) {
      return;
    }
    if let Some(entry) = self.store.get_mut(&extra.request_id) {
      extra::apply_request(entry, extra);
    }
    self
      .request_extra
      .insert(extra.request_id.clone(), extra.clone());
  }

  // -------------------------------------------------------------------------
  // Responses
  // -------------------------------------------------------------------------

  fn on_response(&mut self, index: usize, resp: &ResponseReceived) -> Result<(), HarError> {
    if self.ignored.contains(&resp.request_id) {
      return Ok(());
    }
    if self.pages.is_empty() {
      debug!(request_id = %resp.request_id, "response before any page; buffering");
      self.pending_responses.push(index);
      return Ok(());
    }
    self.apply_response(resp)
  }

  fn apply_response(&mut self, resp: &ResponseReceived) -> Result<(), HarError> {
    let request_id = resp.request_id.as_str();
    let frame_id = resp
      .frame_id
      .clone()
      .filter(|f| !f.is_empty())
      .or_else(|| self.preflights.get(request_id).and_then(|p| p.frame_id.clone()));
    let page_index = frame_id
      .map(|f| self.root_frame(&f))
      .and_then(|root| self.pages.iter().rposition(|p| p.frame_id == root))
      .or_else(|| self.pages.len().checked_sub(1));

    let Some(entry) = self.store.get_mut(request_id) else {
      debug!(request_id, "response for unknown request");
      return Ok(());
    };
    populate::populate(entry, &resp.response)?;
    if let Some(extra) = self.request_extra.get(request_id) {
      extra::apply_request(entry, extra);
    }
    if let Some(extra) = self.response_extra.get(request_id) {
      extra::apply_response(entry, extra);
    }
    if self.config.include_custom_properties {
      if let Some(props) = &resp.custom_properties {
        entry.merge_custom(props);
      }
    }

    // A page without a start (its document request was fabricated) is timed
    // from its first response that carries timing.
    let timed = entry
      .meta
      .request_time
      .map(|t| (t, entry.request.url.clone()));
    if let (Some(i), Some((request_time, url))) = (page_index, timed) {
      let page = &mut self.pages[i];
      if page.timestamp.is_none() && entry.pageref.as_deref() == Some(page.id.as_str()) {
        page.start_from(request_time, self.clock.to_wall(request_time), &url);
        if entry.started_date_time.is_empty() {
          entry.meta.request_sent = request_time;
          page.adopt(entry);
        }
      }
    }
    Ok(())
  }

  fn on_response_extra(&mut self, extra: &ResponseExtraInfo) {
    if self.ignored.contains(&extra.request_id) {
      return;
    }
    if let Some(entry) = self.store.get_mut(&extra.request_id) {
      extra::apply_response(entry, extra);
    }
    self
      .response_extra
      .insert(extra.request_id.clone(), extra.clone());
  }

  // -------------------------------------------------------------------------
  // Terminal events
  // -------------------------------------------------------------------------

  fn on_loading_finished(&mut self, finished: &LoadingFinished) {
    if self.ignored.remove(&finished.request_id) {
      return;
    }
    let Some(entry) = self.store.get_mut(&finished.request_id) else {
      debug!(request_id = %finished.request_id, "finished loading unknown request");
      return;
    };
    populate::complete(entry, finished);
    if self.config.include_custom_properties {
      if let Some(props) = &finished.custom_properties {
        entry.merge_custom(props);
      }
    }
  }

  fn on_loading_failed(&mut self, failed: &LoadingFailed) {
    if self.ignored.remove(&failed.request_id) {
      return;
    }
    let Some(entry) = self.store.get_mut(&failed.request_id) else {
      debug!(request_id = %failed.request_id, "failure for unknown request");
      return;
    };
    debug!(
      request_id = %failed.request_id,
      url = %entry.request.url,
      error = %failed.error_text,
      canceled = failed.canceled.unwrap_or(false),
      "load failed"
    );
    populate::fail(entry, failed);
  }
}

/// Request sub-object + initiator for a new entry.
fn build_entry(req: &RequestWillBeSent, loader_id: String, frame_id: Option<String>) -> EntryState {
  let payload = &req.request;
  let (url, query_string) = codec::decompose_url(&payload.url, payload.url_fragment.as_deref());
  let content_type = codec::header_value(&payload.headers, "Content-Type");
  let cookie_header = codec::header_value(&payload.headers, "Cookie");

  let request = Request {
    method: payload.method.clone(),
    url,
    http_version: String::new(),
    cookies: codec::parse_request_cookies(cookie_header.as_deref()),
    headers: codec::parse_headers(&payload.headers),
    query_string,
    post_data: codec::parse_post_data(content_type.as_deref(), payload.post_data.as_deref()),
    headers_size: -1,
    body_size: payload.post_data.as_ref().map_or(0, |b| b.len() as i64),
  };
  let meta = EntryMeta {
    request_sent: req.timestamp,
    loader_id,
    frame_id,
    ..EntryMeta::default()
  };

  let mut entry = EntryState::new(req.request_id.clone(), request, meta);
  entry.initial_priority = payload.initial_priority.clone();
  entry.priority = payload.initial_priority.clone();
  entry.resource_type = req.resource_type.as_ref().map(|t| t.to_ascii_lowercase());
  entry.initiator = initiator(&req.initiator);
  entry
}

/// Initiator detail; source positions become 1-based.
fn initiator(payload: &InitiatorPayload) -> Initiator {
  let mut out = Initiator {
    kind: (!payload.kind.is_empty()).then(|| payload.kind.clone()),
    ..Initiator::default()
  };
  match payload.kind.as_str() {
    "parser" => {
      out.url = payload.url.clone();
      out.line = payload.line_number.map(|l| l + 1);
    }
    "script" => {
      if let Some(top) = payload.stack.as_ref().and_then(|s| s.call_frames.first()) {
        out.url = Some(top.url.clone());
        out.line = Some(top.line_number + 1);
        out.column = Some(top.column_number + 1);
        out.function_name = Some(top.function_name.clone());
        out.script_id = Some(top.script_id.clone());
      }
    }
    _ => {}
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn run(raw: Vec<InboundEvent>) -> (Vec<PageState>, Vec<EntryState>) {
    let config = Config::default();
    let events = decode_all(&raw);
    Engine::new(&config, &events).run().unwrap()
  }

  fn nav(frame: &str, loader: &str, url: &str) -> InboundEvent {
    InboundEvent::new(
      "Page.frameNavigated",
      json!({"frame": {"id": frame, "loaderId": loader, "url": url}}),
    )
  }

  fn request(id: &str, loader: &str, url: &str, ts: f64) -> InboundEvent {
    InboundEvent::new(
      "Network.requestWillBeSent",
      json!({
        "requestId": id,
        "loaderId": loader,
        "frameId": "F1",
        "documentURL": url,
        "request": {"url": url, "method": "GET", "headers": {}, "initialPriority": "High"},
        "timestamp": ts,
        "wallTime": 1_700_000_000.0 + ts,
        "initiator": {"type": "other"},
        "type": "Document"
      }),
    )
  }

  fn response(id: &str, url: &str) -> InboundEvent {
    InboundEvent::new(
      "Network.responseReceived",
      json!({
        "requestId": id,
        "frameId": "F1",
        "response": {"url": url, "status": 200, "headers": {}, "mimeType": "text/html", "protocol": "h2"}
      }),
    )
  }

  #[test]
  fn frame_attachment_compresses_to_root() {
    let config = Config::default();
    let events = decode_all(&[
      InboundEvent::new("Page.frameAttached", json!({"frameId": "B", "parentFrameId": "A"})),
      InboundEvent::new("Page.frameAttached", json!({"frameId": "C", "parentFrameId": "B"})),
      InboundEvent::new("Page.frameAttached", json!({"frameId": "A", "parentFrameId": "ROOT"})),
    ]);
    let mut engine = Engine::new(&config, &events);
    for (i, e) in events.iter().enumerate() {
      engine.dispatch(i, e).unwrap();
    }
    assert_eq!(engine.root_frame("C"), "ROOT");
    assert_eq!(engine.root_frame("B"), "ROOT");
    assert_eq!(engine.root_frame("A"), "ROOT");
    assert_eq!(engine.root_frame("ROOT"), "ROOT");
  }

  #[test]
  fn document_request_moves_to_its_navigation() {
    let (pages, entries) = run(vec![
      request("1", "L1", "https://a.example/", 10.0),
      nav("F1", "L1", "https://a.example/"),
      response("1", "https://a.example/"),
      request("2", "L2", "https://b.example/", 20.0),
      nav("F1", "L2", "https://b.example/"),
      response("2", "https://b.example/"),
    ]);
    assert_eq!(pages.len(), 2);
    assert_eq!(entries[0].pageref.as_deref(), Some(pages[0].id.as_str()));
    assert_eq!(entries[1].pageref.as_deref(), Some(pages[1].id.as_str()));
    assert_eq!(pages[1].timestamp, Some(20.0));
    assert_eq!(pages[1].title, "https://b.example/");
  }

  #[test]
  fn entry_start_derives_from_monotonic_offset() {
    let (pages, entries) = run(vec![
      request("1", "L1", "https://a.example/", 10.0),
      nav("F1", "L1", "https://a.example/"),
      request("2", "L1", "https://a.example/app.js", 10.25),
    ]);
    assert_eq!(pages[0].started_date_time, codec::iso_from_wall(1_700_000_010.0));
    assert_eq!(entries[1].started_date_time, codec::iso_from_wall(1_700_000_010.25));
  }

  #[test]
  fn redirect_legs_get_distinct_ids() {
    let mut second = request("1", "L1", "https://a.example/final", 10.5);
    second.params["redirectResponse"] = json!({
      "url": "https://a.example/", "status": 301, "headers": {"Location": "/final"}, "mimeType": ""
    });
    let (_, entries) = run(vec![
      nav("F1", "L1", "https://a.example/"),
      request("1", "L1", "https://a.example/", 10.0),
      second,
      response("1", "https://a.example/final"),
    ]);
    let ids: Vec<_> = entries.iter().map(|e| e.request_id.as_str()).collect();
    assert_eq!(ids, vec!["L1", "1r", "1"]);
    assert_eq!(entries[1].response.as_ref().unwrap().status, 301);
    assert_eq!(entries[1].response.as_ref().unwrap().redirect_url, "/final");
    assert_eq!(entries[2].response.as_ref().unwrap().status, 200);
  }

  #[test]
  fn script_initiator_is_one_based() {
    let init = initiator(&InitiatorPayload {
      kind: "script".into(),
      url: None,
      line_number: None,
      stack: Some(StackTrace {
        call_frames: vec![CallFrame {
          function_name: "load".into(),
          script_id: "42".into(),
          url: "https://a.example/app.js".into(),
          line_number: 0,
          column_number: 9,
        }],
      }),
    });
    assert_eq!(init.line, Some(1));
    assert_eq!(init.column, Some(10));
    assert_eq!(init.function_name.as_deref(), Some("load"));
    assert_eq!(init.script_id.as_deref(), Some("42"));
  }

  #[test]
  fn parser_initiator_records_document_line() {
    let init = initiator(&InitiatorPayload {
      kind: "parser".into(),
      url: Some("https://a.example/".into()),
      line_number: Some(4),
      stack: None,
    });
    assert_eq!(init.url.as_deref(), Some("https://a.example/"));
    assert_eq!(init.line, Some(5));
  }

  #[test]
  fn preflight_inherits_trigger_loader_and_frame() {
    let (_, entries) = run(vec![
      nav("F1", "L1", "https://app.example/"),
      request("1", "L1", "https://app.example/", 10.0),
      InboundEvent::new(
        "Network.requestWillBeSent",
        json!({
          "requestId": "pf",
          "loaderId": "",
          "documentURL": "https://app.example/",
          "request": {"url": "https://api.example/data", "method": "OPTIONS"},
          "timestamp": 10.5,
          "initiator": {"type": "other"}
        }),
      ),
    ]);
    let pf = entries.iter().find(|e| e.request_id == "pf").unwrap();
    assert_eq!(pf.meta.loader_id, "L1");
    assert_eq!(pf.meta.frame_id.as_deref(), Some("F1"));
  }

  #[test]
  fn requests_without_navigation_get_a_fallback_page() {
    let (pages, entries) = run(vec![
      request("1", "L1", "https://a.example/", 10.0),
      response("1", "https://a.example/"),
    ]);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title, "https://a.example/");
    assert!(entries[0].response.is_some());
  }
}
