use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStats {
    pub visitors: u64,
}

/// Visit counters for one location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationStats {
    pub visitors: u64,
    pub pages: HashMap<String, PageStats>,
}

/// Visit counters keyed by location name. Counters only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationStore {
    locations: HashMap<String, LocationStats>,
}

impl AggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one visit to `path` from `location`.
    pub fn record(&mut self, location: &str, path: &str) {
        let stats = self.locations.entry(location.to_string()).or_default();
        stats.visitors += 1;
        stats.pages.entry(path.to_string()).or_default().visitors += 1;
    }

    pub fn get(&self, location: &str) -> Option<&LocationStats> {
        self.locations.get(location)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LocationStats)> {
        self.locations.iter()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn total_visitors(&self) -> u64 {
        self.locations.values().map(|stats| stats.visitors).sum()
    }
}

/// Per-run line counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Lines read
    pub total: u64,
    /// Lines counted into the stores
    pub processed: u64,
    /// Lines whose path is excluded by the page filter
    pub ignored: u64,
    /// Lines whose address could not be resolved
    pub nogeo: u64,
    /// Unparsable lines, only non-zero when they are skipped
    pub malformed: u64,
}
