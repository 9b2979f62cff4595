//! MQTT topic filter helpers
//!
//! Filters use the standard MQTT wildcards: `+` matches exactly one level,
//! `#` matches any number of trailing levels (including zero) and must be
//! the last level of the filter.

/// Check whether `topic` matches the MQTT `filter`
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Check that a subscription filter is well formed
pub fn is_valid_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;

    levels.iter().enumerate().all(|(i, level)| match *level {
        "#" => i == last,
        "+" => true,
        other => !other.contains('#') && !other.contains('+'),
    })
}

/// Last level of a topic (`"nav/up"` -> `"up"`)
pub fn last_level(topic: &str) -> &str {
    topic.rsplit('/').next().unwrap_or(topic)
}
