//! Binary entrypoint: read events from stdin, write one HAR log to stdout.
//!
//! Input is either a JSON array of `{method, params}` objects or JSON lines,
//! one object per line. Malformed lines are logged and skipped; a fatal
//! conversion error exits non-zero.

use har_engine::{har_from_events, Config, HarError, InboundEvent};
use std::env;
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: har-engine [--include-disk-cache] [--include-text] [--include-custom] \
[--pretty] [--name <s>] [--comment <s>] < events.json > out.har";

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .init();

  if let Err(e) = run_binary() {
    let _ = writeln!(io::stderr(), "har-engine error: {}", e);
    std::process::exit(1);
  }
}

struct Options {
  config: Config,
  pretty: bool,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
  let mut config = Config::default();
  let mut pretty = false;
  let mut iter = args.iter().skip(1);
  while let Some(arg) = iter.next() {
    match arg.as_str() {
      "--include-disk-cache" => config.include_resources_from_disk_cache = true,
      "--include-text" => config.include_text_from_response_body = true,
      "--include-custom" => config.include_custom_properties = true,
      "--pretty" => pretty = true,
      "--name" => config.name = iter.next().ok_or("--name needs a value")?.clone(),
      "--comment" => config.comment = Some(iter.next().ok_or("--comment needs a value")?.clone()),
      "-h" | "--help" => return Err(USAGE.to_string()),
      other => return Err(format!("unknown argument {}\n{}", other, USAGE)),
    }
  }
  Ok(Options { config, pretty })
}

/// A whole-input JSON array, or one event per non-blank line.
fn read_events(raw: &str) -> Result<Vec<InboundEvent>, HarError> {
  if raw.trim_start().starts_with('[') {
    return Ok(serde_json::from_str(raw)?);
  }
  let mut events = Vec::new();
  for (n, line) in raw.lines().enumerate() {
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }
    match serde_json::from_str::<InboundEvent>(trimmed) {
      Ok(event) => events.push(event),
      Err(e) => tracing::warn!(line = n + 1, error = %e, "skipping malformed input line"),
    }
  }
  Ok(events)
}

fn run_binary() -> Result<(), HarError> {
  let args: Vec<String> = env::args().collect();
  let options = match parse_args(&args) {
    Ok(o) => o,
    Err(msg) => {
      eprintln!("{}", msg);
      std::process::exit(2);
    }
  };

  let mut raw = String::new();
  io::stdin().lock().read_to_string(&mut raw)?;
  let events = read_events(&raw)?;
  tracing::info!(events = events.len(), "read input");

  let har = har_from_events(&events, &options.config)?;
  let json = if options.pretty {
    serde_json::to_vec_pretty(&har)?
  } else {
    serde_json::to_vec(&har)?
  };
  let mut out = io::stdout().lock();
  out.write_all(&json)?;
  writeln!(out)?;
  Ok(())
}
