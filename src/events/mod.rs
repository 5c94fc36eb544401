//! Event descriptors for one architecture.
//!
//! Event files are read into an [`EventCatalog`] used to validate metric
//! formulas, and into perf JSON records grouped by topic for output.

pub mod catalog;
pub mod perfmon;
pub mod topic;
pub mod uncore;

pub use catalog::EventCatalog;
pub use perfmon::{parse_event_file, PerfEventJson, PerfmonEvent};
pub use topic::topic;
pub use uncore::apply_uncore_csv;

use crate::utils::error::EventError;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

/// All events of one architecture
#[derive(Debug, Clone, Default)]
pub struct ArchEvents {
    pub catalog: EventCatalog,

    /// Topic → perf JSON records, in file order
    pub topics: BTreeMap<String, Vec<PerfEventJson>>,

    /// Event name → position in `topics`
    index: HashMap<String, (String, usize)>,
}

impl ArchEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the events of one file
    ///
    /// # Arguments
    /// * `kind` - event file type (`atom`, `core`, `uncore`, ...)
    /// * `source` - where the text came from, for messages
    /// * `text` - file contents
    /// * `hybrid` - the model has both atom and core files
    ///
    /// # Returns
    /// Number of events added to the output
    ///
    /// # Errors
    /// * `EventError::JsonError` - the file is not a perfmon event file
    pub fn add_file(
        &mut self,
        kind: &str,
        source: &str,
        text: &str,
        hybrid: bool,
    ) -> Result<usize, EventError> {
        let events = parse_event_file(text)?;
        let unit = (hybrid && (kind == "atom" || kind == "core")).then(|| format!("cpu_{}", kind));
        let per_pkg = kind.starts_with("uncore");

        let mut seen = HashSet::new();
        let mut added = 0;

        for event in events {
            let Some(mut json) = event.to_perf_json() else {
                debug!("Dropping {}: unsupported filter", event.event_name);
                continue;
            };
            if !seen.insert(event.event_name.clone()) {
                warn!("Dropping duplicated {} in {}", event.event_name, source);
                continue;
            }

            if let Some(unit) = &unit {
                json.entry("Unit".to_string()).or_insert_with(|| unit.clone());
            }
            if per_pkg {
                json.insert("PerPkg".to_string(), "1".to_string());
            }

            self.push_json(&event.topic, json);
            added += 1;

            let name = event.event_name.clone();
            if !self.catalog.register(event) {
                warn!("{} already registered, keeping the first descriptor", name);
            }
        }

        Ok(added)
    }

    fn push_json(&mut self, topic: &str, json: PerfEventJson) {
        let records = self.topics.entry(topic.to_string()).or_default();
        if let Some(name) = json.get("EventName") {
            self.index
                .insert(name.clone(), (topic.to_string(), records.len()));
        }
        records.push(json);
    }

    /// Output record of an event, for in-place rewrites
    pub fn json_mut(&mut self, name: &str) -> Option<&mut PerfEventJson> {
        let (topic, position) = self.index.get(name)?;
        self.topics.get_mut(topic)?.get_mut(*position)
    }

    /// Copy an event's output record under a new name in the same topic
    pub fn clone_as(&mut self, name: &str, new_name: &str) -> Option<&mut PerfEventJson> {
        let (topic, position) = self.index.get(name)?.clone();
        let mut copy = self.topics.get(&topic)?.get(position)?.clone();
        copy.insert("EventName".to_string(), new_name.to_string());
        self.push_json(&topic, copy);
        self.json_mut(new_name)
    }

    /// Number of output records across all topics
    pub fn record_count(&self) -> usize {
        self.topics.values().map(Vec::len).sum()
    }
}
