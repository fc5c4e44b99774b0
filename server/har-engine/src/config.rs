//! Conversion configuration with sane defaults.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Converts between the browser's monotonic clock and wall-clock time, both in
/// seconds. Only used when a page has to be timed from a recovered response.
pub trait WallTime: fmt::Debug + Send + Sync {
  fn to_wall(&self, monotonic: f64) -> f64;
  fn to_monotonic(&self, wall: f64) -> f64;
}

/// `wall = monotonic + offset`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OffsetClock {
  pub offset: f64,
}

impl OffsetClock {
  /// Offset observed on an event carrying both clocks.
  pub fn from_pair(monotonic: f64, wall: f64) -> Self {
    Self {
      offset: wall - monotonic,
    }
  }
}

impl WallTime for OffsetClock {
  fn to_wall(&self, monotonic: f64) -> f64 {
    monotonic + self.offset
  }

  fn to_monotonic(&self, wall: f64) -> f64 {
    wall - self.offset
  }
}

/// Options applied uniformly to one conversion.
#[derive(Debug, Clone)]
pub struct Config {
  /// Keep entries served from the browser cache.
  pub include_resources_from_disk_cache: bool,
  /// Fill `content.text` from bodies supplied via `Converter::with_response_body`.
  pub include_text_from_response_body: bool,
  /// Merge `customProperties` carried on events into entries as `_` fields.
  pub include_custom_properties: bool,
  /// Creator name written to the log.
  pub name: String,
  /// Creator version written to the log.
  pub version: String,
  /// Creator comment written to the log.
  pub comment: Option<String>,
  /// Opaque value attached verbatim to the log as `_meta`.
  pub meta: Option<Value>,
  /// Clock conversion for the recovery path. When unset, an offset clock is
  /// calibrated from the stream itself.
  pub wall_time: Option<Arc<dyn WallTime>>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      include_resources_from_disk_cache: false,
      include_text_from_response_body: false,
      include_custom_properties: false,
      name: env!("CARGO_PKG_NAME").to_string(),
      version: env!("CARGO_PKG_VERSION").to_string(),
      comment: Some(env!("CARGO_PKG_REPOSITORY").to_string()),
      meta: None,
      wall_time: None,
    }
  }
}
