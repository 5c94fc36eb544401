//! Event Catalog: the events known to one architecture.

use super::perfmon::PerfmonEvent;
use std::collections::HashMap;

/// Name → descriptor map with a case-insensitive side index
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    events: HashMap<String, PerfmonEvent>,
    upper: HashMap<String, String>,
}

impl EventCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event; the first registration of a name wins
    ///
    /// Returns false when the name was already registered.
    pub fn register(&mut self, event: PerfmonEvent) -> bool {
        if self.events.contains_key(&event.event_name) {
            return false;
        }
        self.upper
            .entry(event.event_name.to_uppercase())
            .or_insert_with(|| event.event_name.clone());
        self.events.insert(event.event_name.clone(), event);
        true
    }

    /// Exact-name lookup
    pub fn lookup(&self, name: &str) -> Option<&PerfmonEvent> {
        self.events.get(name)
    }

    /// Exact lookup, falling back to a case-insensitive match
    pub fn lookup_ci(&self, name: &str) -> Option<&PerfmonEvent> {
        self.lookup(name).or_else(|| {
            self.upper
                .get(&name.to_uppercase())
                .and_then(|canonical| self.events.get(canonical))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup_ci(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
