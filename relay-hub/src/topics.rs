//! Mapping of broker topics to state keys

use broker_bridge::topic;

use crate::state::StateKey;

/// A topic filter routed to a state key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRoute {
    pub filter: String,
    pub key: StateKey,
}

/// Static routing table from broker topic filters to state keys
///
/// Routes are checked in insertion order; the first matching filter wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTable {
    routes: Vec<TopicRoute>,
}

impl TopicTable {
    /// An empty table
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route
    pub fn route(mut self, filter: impl Into<String>, key: StateKey) -> Self {
        self.routes.push(TopicRoute {
            filter: filter.into(),
            key,
        });
        self
    }

    /// State key for a concrete topic, if any route matches
    pub fn resolve(&self, topic_name: &str) -> Option<StateKey> {
        self.routes
            .iter()
            .find(|route| topic::matches(&route.filter, topic_name))
            .map(|route| route.key)
    }

    /// Filters to subscribe to so every route can be fed
    pub fn filters(&self) -> Vec<String> {
        self.routes.iter().map(|route| route.filter.clone()).collect()
    }

    pub fn routes(&self) -> &[TopicRoute] {
        &self.routes
    }
}

impl Default for TopicTable {
    /// `led/color`, `led/power` and `nav/+`
    fn default() -> Self {
        Self::new()
            .route("led/color", StateKey::Color)
            .route("led/power", StateKey::Power)
            .route("nav/+", StateKey::Nav)
    }
}
