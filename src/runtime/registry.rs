//! Topic registration and collection for MQTT modules.

use heapless::Vec;

use super::traits::TopicCollector;
use crate::topic::{self, MAX_TOPIC_LEN, TopicString};

/// A registry for topic filters that modules want to subscribe to.
///
/// This registry owns the topic strings (copies them on add), making it
/// suitable for use with the object-safe `TopicCollector` trait.
///
/// # Example
///
/// ```ignore
/// let mut registry = TopicRegistry::<8>::new();
/// rpc_module.register(&mut registry);
///
/// for filter in registry.iter() {
///     client.subscribe(filter, QoS::AtMostOnce).await?;
/// }
/// ```
#[derive(Default)]
pub struct TopicRegistry<const MAX_TOPICS: usize> {
    topics: Vec<TopicString, MAX_TOPICS>,
}

impl<const MAX_TOPICS: usize> TopicRegistry<MAX_TOPICS> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic to the registry by copying the string.
    ///
    /// Returns `true` if successful or already present, `false` if the
    /// registry is full or the topic is too long.
    pub fn add_topic(&mut self, topic: &str) -> bool {
        if topic.len() > MAX_TOPIC_LEN {
            return false;
        }
        if self.contains(topic) {
            return true;
        }

        let mut owned = TopicString::new();
        if owned.push_str(topic).is_err() {
            return false;
        }

        self.topics.push(owned).is_ok()
    }

    /// Get an iterator over the registered topics.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.iter().any(|registered| registered == topic)
    }

    /// Check whether an inbound `topic` is covered by any registered filter.
    pub fn matches(&self, topic: &str) -> bool {
        self.iter().any(|filter| topic::matches_filter(filter, topic))
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }
}

impl<const MAX_TOPICS: usize> TopicCollector for TopicRegistry<MAX_TOPICS> {
    fn add(&mut self, topic: &str) -> bool {
        self.add_topic(topic)
    }
}
