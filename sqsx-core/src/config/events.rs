//! Event name to filter value mapping.

use compact_str::CompactString;
use std::collections::HashMap;

/// Maps logical event names to the `event_type` value subscriptions filter on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsConfig {
    pub filters: HashMap<CompactString, CompactString>,
}

impl EventsConfig {
    pub fn new(filters: HashMap<CompactString, CompactString>) -> Self {
        Self { filters }
    }

    /// The `event_type` attribute value for `event_name`.
    ///
    /// Unmapped names are published under their own name.
    pub fn filter_for<'a>(&'a self, event_name: &'a str) -> &'a str {
        self.filters
            .get(event_name)
            .map(CompactString::as_str)
            .unwrap_or(event_name)
    }
}
