//! PushLog HAR Engine: deterministic HAR reconstruction from browser
//! instrumentation events.
//!
//! Consumes an ordered stream of `Page.*` / `Network.*` notifications,
//! correlates requests, responses, supplementary header data and frames into
//! pages and entries, and emits one HAR 1.2 log.
//!
//! No network, no DB; pure computation + per-call in-memory state.

pub mod codec;
pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod event;
pub mod extra;
pub mod fabricate;
pub mod finalize;
pub mod har;
pub mod populate;
pub mod preflight;
pub mod store;

pub use config::{Config, OffsetClock, WallTime};
pub use converter::{har_from_events, Converter, ResponseBody};
pub use error::HarError;
pub use event::InboundEvent;
pub use har::Har;
