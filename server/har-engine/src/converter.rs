//! Public conversion entry points.

use std::collections::HashMap;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::HarError;
use crate::event::{decode_all, InboundEvent};
use crate::finalize::finalize;
use crate::har::Har;

/// A response body fetched by the caller, keyed by request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBody {
  pub text: String,
  /// `text` is base64 (binary content).
  pub base64: bool,
}

/// One-shot converter. Every `convert` call starts from empty state.
#[derive(Debug, Clone)]
pub struct Converter {
  config: Config,
  bodies: HashMap<String, ResponseBody>,
}

impl Converter {
  pub fn new(config: Config) -> Self {
    Self {
      config,
      bodies: HashMap::new(),
    }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  /// Supply a body for `request_id`. Used only with `include_text_from_response_body`.
  pub fn with_response_body(mut self, request_id: impl Into<String>, body: ResponseBody) -> Self {
    self.bodies.insert(request_id.into(), body);
    self
  }

  pub fn convert(&self, raw: &[InboundEvent]) -> Result<Har, HarError> {
    let events = decode_all(raw);
    let (pages, entries) = Engine::new(&self.config, &events).run()?;
    tracing::debug!(
      events = events.len(),
      pages = pages.len(),
      entries = entries.len(),
      "correlation finished"
    );
    Ok(finalize(pages, entries, &self.config, &self.bodies))
  }
}

/// Convert an ordered event stream into a HAR log.
pub fn har_from_events(events: &[InboundEvent], config: &Config) -> Result<Har, HarError> {
  Converter::new(config.clone()).convert(events)
}
