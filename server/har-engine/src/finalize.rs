//! Turn engine state into the output log: filter, attach bodies, drop empty
//! pages and assign stable `page_<n>` ids.

use std::collections::HashMap;

use tracing::debug;

use crate::config::Config;
use crate::converter::ResponseBody;
use crate::engine::PageState;
use crate::har::{self, Creator, Har, Log, Page, PageTimings, HAR_VERSION};
use crate::store::EntryState;

pub fn finalize(
  pages: Vec<PageState>,
  entries: Vec<EntryState>,
  config: &Config,
  bodies: &HashMap<String, ResponseBody>,
) -> Har {
  let mut entries: Vec<har::Entry> = entries
    .into_iter()
    .filter(|e| config.include_resources_from_disk_cache || e.cache.before_request.is_none())
    .filter_map(|e| {
      let request_id = e.request_id.clone();
      let entry = e.into_har();
      if entry.is_none() {
        debug!(request_id = %request_id, "dropping entry without a response");
      }
      entry
    })
    .collect();

  if config.include_text_from_response_body {
    for entry in &mut entries {
      if let Some(body) = bodies.get(&entry.request_id) {
        entry.response.content.text = Some(body.text.clone());
        entry.response.content.encoding = body.base64.then(|| "base64".to_string());
      }
    }
  }

  // Only pages that ended up with entries survive, renumbered in creation order.
  let mut renamed: HashMap<String, String> = HashMap::new();
  let mut kept: Vec<Page> = Vec::new();
  for page in pages {
    if !entries.iter().any(|e| e.pageref.as_deref() == Some(page.id.as_str())) {
      continue;
    }
    let id = format!("page_{}", kept.len() + 1);
    renamed.insert(page.id, id.clone());
    kept.push(Page {
      started_date_time: page.started_date_time,
      id,
      title: page.title,
      page_timings: PageTimings {
        on_content_load: page.on_content_load,
        on_load: page.on_load,
      },
    });
  }

  for entry in &mut entries {
    entry.pageref = entry.pageref.take().and_then(|p| renamed.get(&p).cloned());
  }
  for page in &mut kept {
    if page.started_date_time.is_empty() {
      if let Some(first) = entries
        .iter()
        .find(|e| e.pageref.as_deref() == Some(page.id.as_str()) && !e.started_date_time.is_empty())
      {
        page.started_date_time = first.started_date_time.clone();
      }
    }
  }
  for entry in &mut entries {
    if entry.started_date_time.is_empty() {
      if let Some(page) = kept.iter().find(|p| entry.pageref.as_deref() == Some(p.id.as_str())) {
        entry.started_date_time = page.started_date_time.clone();
      }
    }
  }

  Har {
    log: Log {
      version: HAR_VERSION.to_string(),
      creator: Creator {
        name: config.name.clone(),
        version: config.version.clone(),
        comment: config.comment.clone(),
      },
      pages: kept,
      entries,
      meta: config.meta.clone(),
    },
  }
}
