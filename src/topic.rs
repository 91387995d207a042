//! # RPC Topic Grammar
//!
//! Request topics have the shape `<namespace>/<client>/<method>` and responses
//! are published on the request topic with `/response` appended. Responders
//! subscribe with a `+` wildcard in the client segment:
//!
//! ```text
//! MQTTnet.RPC/+/ping                      subscription filter
//! MQTTnet.RPC/7f3a/ping                   request
//! MQTTnet.RPC/7f3a/ping/response          response
//! ```
//!
//! Method names may use `_` or `.` as separators (`deviceA.ping`) but never
//! `+`, `#` or `/`, otherwise the filter above would change meaning.

use heapless::String;

use crate::error::RpcError;

/// Maximum length for a single topic string.
pub const MAX_TOPIC_LEN: usize = 128;

/// Appended to a request topic to form its response topic.
pub const RESPONSE_SUFFIX: &str = "/response";

/// An owned topic with inline storage.
pub type TopicString = String<MAX_TOPIC_LEN>;

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(|c| matches!(c, '+' | '#' | '/'))
}

/// Checks that `method` can be used as a single topic segment.
pub fn validate_method_name(method: &str) -> Result<(), RpcError> {
    if is_valid_segment(method) {
        Ok(())
    } else {
        Err(RpcError::InvalidMethodName)
    }
}

/// Checks that `client_id` can be used as a single topic segment.
pub fn validate_client_id(client_id: &str) -> Result<(), RpcError> {
    if is_valid_segment(client_id) {
        Ok(())
    } else {
        Err(RpcError::InvalidClientId)
    }
}

/// Drops a single trailing `/`, so `"MQTTnet.RPC/"` and `"MQTTnet.RPC"` name
/// the same namespace.
pub fn normalize_namespace(namespace: &str) -> &str {
    namespace.strip_suffix('/').unwrap_or(namespace)
}

/// Checks that a normalized namespace is one or more non-empty, wildcard-free
/// levels.
pub fn validate_namespace(namespace: &str) -> Result<(), RpcError> {
    let valid = !namespace.is_empty()
        && namespace
            .split('/')
            .all(|level| !level.is_empty() && !level.contains(['+', '#']));
    if valid {
        Ok(())
    } else {
        Err(RpcError::InvalidNamespace)
    }
}

/// Checks that `topic` can be published to: non-empty and wildcard-free.
pub fn validate_topic(topic: &str) -> Result<(), RpcError> {
    if topic.is_empty() || topic.contains(['+', '#']) {
        Err(RpcError::InvalidTopic)
    } else {
        Ok(())
    }
}

fn join(parts: &[&str]) -> Result<TopicString, RpcError> {
    let mut topic = TopicString::new();
    for part in parts {
        topic.push_str(part).map_err(|_| RpcError::TopicTooLong)?;
    }
    Ok(topic)
}

/// Builds the filter a responder subscribes to: `<namespace>/+/<method>`.
pub fn subscription_filter(namespace: &str, method: &str) -> Result<TopicString, RpcError> {
    validate_method_name(method)?;
    join(&[namespace, "/+/", method])
}

/// Builds a request topic: `<namespace>/<client>/<method>`.
pub fn request_topic(namespace: &str, client: &str, method: &str) -> Result<TopicString, RpcError> {
    validate_client_id(client)?;
    validate_method_name(method)?;
    join(&[namespace, "/", client, "/", method])
}

/// Builds the response topic for a request topic.
pub fn response_topic(request_topic: &str) -> Result<TopicString, RpcError> {
    join(&[request_topic, RESPONSE_SUFFIX])
}

/// A request topic split into its segments. Borrows from the inbound topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTopic<'a> {
    topic: &'a str,
    client: &'a str,
    method: &'a str,
}

impl<'a> RequestTopic<'a> {
    /// Parses `topic` as `<namespace>/<client>/<method>`.
    ///
    /// Matching is case-sensitive. Anything outside the namespace is
    /// `NotRpcTopic`; anything inside it that is not exactly two non-empty,
    /// wildcard-free segments is `MalformedTopic`. Response topics
    /// (three segments) are therefore never mistaken for requests.
    pub fn parse(namespace: &str, topic: &'a str) -> Result<Self, RpcError> {
        let rest = topic
            .strip_prefix(namespace)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or(RpcError::NotRpcTopic)?;

        let mut segments = rest.split('/');
        let (Some(client), Some(method), None) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(RpcError::MalformedTopic);
        };

        if !is_valid_segment(client) || !is_valid_segment(method) {
            return Err(RpcError::MalformedTopic);
        }

        Ok(Self {
            topic,
            client,
            method,
        })
    }

    /// The full request topic.
    pub fn topic(&self) -> &'a str {
        self.topic
    }

    /// The client segment (a caller-chosen correlation id).
    pub fn client(&self) -> &'a str {
        self.client
    }

    pub fn method(&self) -> &'a str {
        self.method
    }

    pub fn response_topic(&self) -> Result<TopicString, RpcError> {
        response_topic(self.topic)
    }
}

/// Returns `true` if `topic` matches the MQTT topic filter `filter`.
///
/// `+` matches exactly one level and a trailing `#` matches the parent level
/// and everything below it. Wildcards in the first level never match topics
/// starting with `$`.
pub fn matches_filter(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && filter.starts_with(['+', '#']) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
