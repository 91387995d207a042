//! # RPC Caller
//!
//! The calling side of the protocol. By default each call gets its own request
//! topic, `<namespace>/<client_id>-<sequence>/<method>`, so its response topic
//! is unique and identifies the call on the way back. A [`TopicStrategy`]
//! replaces that scheme.
//!
//! `RpcClient` only keeps the bookkeeping. The application owns the MQTT
//! client and performs the I/O:
//!
//! ```ignore
//! let call = rpc.begin("ping", Instant::now())?;
//! client.subscribe(&call.response_topic, call.qos).await?;
//! client.publish(&call.request_topic, b"", call.qos, false).await?;
//!
//! loop {
//!     if let Some(msg) = client.poll().await? {
//!         rpc.on_message(msg.topic, msg.payload);
//!     }
//!     match rpc.poll(call.id, Instant::now()) {
//!         Ok(Some(response)) => break Ok(response),
//!         Ok(None) => continue,
//!         Err(err) => break Err(err),
//!     }
//! }
//! client.unsubscribe(&call.response_topic).await?;
//! ```

use core::fmt::Write;

use embassy_time::Instant;
use heapless::{String, Vec};

use crate::config::RpcOptions;
use crate::error::RpcError;
use crate::logging::{rpc_debug, rpc_warn};
use crate::message::QoS;
use crate::topic::{self, TopicString};

/// Maximum length of the generated client segment (`<client_id>-<sequence>`).
pub const MAX_CLIENT_SEGMENT_LEN: usize = 48;

/// Identifies a call started with [`RpcClient::begin`].
pub type CallId = u32;

/// Topics and QoS for a call in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcCall {
    pub id: CallId,
    /// Publish the request payload here, with `retain = false`.
    pub request_topic: TopicString,
    /// Subscribe here before publishing the request.
    pub response_topic: TopicString,
    pub qos: QoS,
}

/// What a [`TopicStrategy`] knows about the call it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicContext<'c> {
    /// Normalized namespace, without the trailing `/`.
    pub namespace: &'c str,
    pub client_id: &'c str,
    pub method: &'c str,
    /// Not used by any other call in flight.
    pub call_id: CallId,
    pub qos: QoS,
}

/// The request and response topic of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTopics {
    pub request_topic: TopicString,
    pub response_topic: TopicString,
}

/// Names the topics of a call.
///
/// The caller rejects topics that are empty or contain wildcards
/// (`InvalidTopic`) and response topics that another call already waits on
/// (`DuplicateCall`). A `TopicRouter` only sees requests matching
/// `<namespace>/+/<method>`.
pub trait TopicStrategy {
    fn rpc_topics(&self, context: &TopicContext<'_>) -> Result<RpcTopics, RpcError>;
}

/// `<namespace>/<client_id>-<call_id as 8 hex digits>/<method>`, answered on
/// the same topic with `/response` appended.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceTopics;

impl TopicStrategy for SequenceTopics {
    fn rpc_topics(&self, context: &TopicContext<'_>) -> Result<RpcTopics, RpcError> {
        let mut client = String::<MAX_CLIENT_SEGMENT_LEN>::new();
        write!(client, "{}-{:08x}", context.client_id, context.call_id)
            .map_err(|_| RpcError::TopicTooLong)?;

        let request_topic = topic::request_topic(context.namespace, &client, context.method)?;
        let response_topic = topic::response_topic(&request_topic)?;
        Ok(RpcTopics {
            request_topic,
            response_topic,
        })
    }
}

struct WaitingCall<const PAYLOAD_SIZE: usize> {
    id: CallId,
    response_topic: TopicString,
    deadline: Instant,
    // `None` while waiting.
    outcome: Option<Result<Vec<u8, PAYLOAD_SIZE>, RpcError>>,
}

/// Tracks outgoing RPC calls and matches responses to them.
///
/// # Type Parameters
///
/// - `MAX_CALLS`: Maximum number of calls in flight
/// - `PAYLOAD_SIZE`: Maximum response payload size
pub struct RpcClient<'a, const MAX_CALLS: usize, const PAYLOAD_SIZE: usize> {
    options: RpcOptions<'a>,
    strategy: &'a dyn TopicStrategy,
    calls: Vec<WaitingCall<PAYLOAD_SIZE>, MAX_CALLS>,
    next_id: CallId,
}

impl<'a, const MAX_CALLS: usize, const PAYLOAD_SIZE: usize> RpcClient<'a, MAX_CALLS, PAYLOAD_SIZE> {
    /// Create a caller using [`SequenceTopics`].
    ///
    /// A trailing `/` on the namespace is dropped. Fails with
    /// `InvalidClientId` if the client id is not a valid topic segment and
    /// with `InvalidNamespace` if the namespace is empty, has an empty level or
    /// contains a wildcard.
    pub fn new(mut options: RpcOptions<'a>) -> Result<Self, RpcError> {
        topic::validate_client_id(options.client_id)?;
        options.namespace = topic::normalize_namespace(options.namespace);
        topic::validate_namespace(options.namespace)?;
        Ok(Self {
            options,
            strategy: &SequenceTopics,
            calls: Vec::new(),
            next_id: 0,
        })
    }

    /// Use `strategy` to name the topics of later calls.
    pub fn with_strategy(mut self, strategy: &'a dyn TopicStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn options(&self) -> &RpcOptions<'a> {
        &self.options
    }

    /// Start a call to `method`. The call times out at `now + call_timeout`.
    pub fn begin(&mut self, method: &str, now: Instant) -> Result<RpcCall, RpcError> {
        topic::validate_method_name(method)?;
        if self.calls.is_full() {
            return Err(RpcError::TooManyCalls);
        }

        let id = self.free_id();
        let RpcTopics {
            request_topic,
            response_topic,
        } = self.strategy.rpc_topics(&TopicContext {
            namespace: self.options.namespace,
            client_id: self.options.client_id,
            method,
            call_id: id,
            qos: self.options.qos,
        })?;
        topic::validate_topic(&request_topic)?;
        topic::validate_topic(&response_topic)?;
        if request_topic == response_topic {
            return Err(RpcError::InvalidTopic);
        }
        if self
            .calls
            .iter()
            .any(|call| call.response_topic == response_topic)
        {
            return Err(RpcError::DuplicateCall);
        }

        let deadline = now
            .checked_add(self.options.call_timeout)
            .unwrap_or(Instant::MAX);
        self.calls
            .push(WaitingCall {
                id,
                response_topic: response_topic.clone(),
                deadline,
                outcome: None,
            })
            .map_err(|_| RpcError::TooManyCalls)?;
        self.next_id = id.wrapping_add(1);

        rpc_debug!("rpc: call {} started on {}", id, request_topic.as_str());
        Ok(RpcCall {
            id,
            request_topic,
            response_topic,
            qos: self.options.qos,
        })
    }

    /// Offer an inbound message to the waiting calls.
    ///
    /// Returns `true` if the message was the response of a waiting call and
    /// should not be processed further.
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) -> bool {
        let Some(call) = self
            .calls
            .iter_mut()
            .find(|call| call.outcome.is_none() && call.response_topic.as_str() == topic)
        else {
            return false;
        };

        call.outcome = Some(Vec::from_slice(payload).map_err(|_| RpcError::PayloadTooLarge));
        true
    }

    /// Check the state of a call.
    ///
    /// - `Ok(Some(payload))`: the response arrived; the call is finished
    /// - `Ok(None)`: still waiting
    /// - `Err(Timeout)`: the deadline passed; the call is finished
    /// - `Err(UnknownCall)`: no such call (never started, finished or cancelled)
    pub fn poll(
        &mut self,
        id: CallId,
        now: Instant,
    ) -> Result<Option<Vec<u8, PAYLOAD_SIZE>>, RpcError> {
        let index = self.index_of(id).ok_or(RpcError::UnknownCall)?;
        let call = &mut self.calls[index];
        let deadline = call.deadline;
        let outcome = call.outcome.take();

        match outcome {
            Some(outcome) => {
                self.calls.swap_remove(index);
                outcome.map(Some)
            }
            None if now < deadline => Ok(None),
            None => {
                self.calls.swap_remove(index);
                rpc_warn!("rpc: call {} timed out", id);
                Err(RpcError::Timeout)
            }
        }
    }

    /// Mark every waiting call whose deadline has passed as timed out.
    ///
    /// Returns the number of calls that timed out. Their `poll` reports
    /// `Timeout` and late responses are no longer consumed.
    pub fn expire(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        for call in self.calls.iter_mut() {
            if call.outcome.is_none() && now >= call.deadline {
                call.outcome = Some(Err(RpcError::Timeout));
                expired += 1;
            }
        }
        expired
    }

    /// Forget a call. Returns `false` if it was not in flight.
    pub fn cancel(&mut self, id: CallId) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.calls.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Forget every call, e.g. when the connection goes away. Their `poll`
    /// reports `UnknownCall`. Returns the number of calls dropped.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.calls.len();
        self.calls.clear();
        if cancelled > 0 {
            rpc_debug!("rpc: cancelled {} calls", cancelled);
        }
        cancelled
    }

    /// Calls still waiting for a response.
    pub fn pending(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| call.outcome.is_none())
            .count()
    }

    fn index_of(&self, id: CallId) -> Option<usize> {
        self.calls.iter().position(|call| call.id == id)
    }

    // The next sequence number not held by a call in flight. The table has a
    // free slot, so fewer than `MAX_CALLS` ids are skipped.
    fn free_id(&self) -> CallId {
        let mut id = self.next_id;
        while self.index_of(id).is_some() {
            id = id.wrapping_add(1);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_time::Duration;
    use rstest::rstest;

    type Client = RpcClient<'static, 2, 8>;

    fn client() -> Client {
        Client::new(RpcOptions::new("dev").with_call_timeout(Duration::from_secs(2))).unwrap()
    }

    fn at(secs: u64) -> Instant {
        Instant::from_secs(secs)
    }

    #[test]
    fn generates_unique_topics_per_call() {
        let mut rpc = client();
        let first = rpc.begin("ping", at(0)).unwrap();
        let second = rpc.begin("ping", at(0)).unwrap();

        assert_eq!(first.request_topic.as_str(), "MQTTnet.RPC/dev-00000000/ping");
        assert_eq!(
            first.response_topic.as_str(),
            "MQTTnet.RPC/dev-00000000/ping/response"
        );
        assert_eq!(second.request_topic.as_str(), "MQTTnet.RPC/dev-00000001/ping");
        assert_ne!(first.id, second.id);
        assert_eq!(rpc.pending(), 2);
    }

    #[test]
    fn completes_call_on_response() {
        let mut rpc = client();
        let call = rpc.begin("deviceA.ping", at(0)).unwrap();
        assert_eq!(rpc.poll(call.id, at(1)), Ok(None));

        assert!(!rpc.on_message(&call.request_topic, b"ignored"));
        assert!(rpc.on_message(&call.response_topic, b"pong"));
        assert!(!rpc.on_message(&call.response_topic, b"duplicate"));

        let payload = rpc.poll(call.id, at(1)).unwrap().unwrap();
        assert_eq!(payload.as_slice(), b"pong");
        assert_eq!(rpc.poll(call.id, at(1)), Err(RpcError::UnknownCall));
    }

    #[test]
    fn times_out_after_deadline() {
        let mut rpc = client();
        let call = rpc.begin("ping", at(10)).unwrap();
        assert_eq!(rpc.poll(call.id, at(11)), Ok(None));
        assert_eq!(rpc.poll(call.id, at(12)), Err(RpcError::Timeout));
        assert_eq!(rpc.pending(), 0);
    }

    #[test]
    fn expired_calls_ignore_late_responses() {
        let mut rpc = client();
        let call = rpc.begin("ping", at(0)).unwrap();
        assert_eq!(rpc.expire(at(1)), 0);
        assert_eq!(rpc.expire(at(5)), 1);

        assert!(!rpc.on_message(&call.response_topic, b"late"));
        assert_eq!(rpc.poll(call.id, at(5)), Err(RpcError::Timeout));
    }

    #[test]
    fn oversized_response_fails_the_call() {
        let mut rpc = client();
        let call = rpc.begin("ping", at(0)).unwrap();
        assert!(rpc.on_message(&call.response_topic, b"way too large"));
        assert_eq!(rpc.poll(call.id, at(0)), Err(RpcError::PayloadTooLarge));
    }

    #[test]
    fn limits_calls_in_flight() {
        let mut rpc = client();
        let first = rpc.begin("a", at(0)).unwrap();
        rpc.begin("b", at(0)).unwrap();
        assert_eq!(rpc.begin("c", at(0)), Err(RpcError::TooManyCalls));

        assert!(rpc.cancel(first.id));
        assert!(!rpc.cancel(first.id));
        assert!(rpc.begin("c", at(0)).is_ok());
    }

    #[test]
    fn validates_inputs() {
        let mut rpc = client();
        assert_eq!(rpc.begin("device.A+ping", at(0)), Err(RpcError::InvalidMethodName));
        assert!(matches!(
            Client::new(RpcOptions::new("a/b")),
            Err(RpcError::InvalidClientId)
        ));
        assert!(matches!(
            Client::new(RpcOptions::new("")),
            Err(RpcError::InvalidClientId)
        ));
    }

    #[test]
    fn uses_configured_namespace_and_qos() {
        let mut rpc = Client::new(
            RpcOptions::new("dev")
                .with_namespace("Acme.RPC")
                .with_qos(QoS::ExactlyOnce),
        )
        .unwrap();
        let call = rpc.begin("ping", at(0)).unwrap();
        assert!(call.request_topic.starts_with("Acme.RPC/dev-"));
        assert_eq!(call.qos, QoS::ExactlyOnce);
    }

    #[test]
    fn trailing_separator_in_namespace_is_dropped() {
        let mut rpc = Client::new(RpcOptions::new("dev").with_namespace("MQTTnet.RPC/")).unwrap();
        assert_eq!(rpc.options().namespace, "MQTTnet.RPC");

        let call = rpc.begin("ping", at(0)).unwrap();
        assert_eq!(call.request_topic.as_str(), "MQTTnet.RPC/dev-00000000/ping");
    }

    #[rstest]
    #[case("")]
    #[case("/")]
    #[case("a/+")]
    #[case("rpc/#")]
    #[case("a//b")]
    fn invalid_namespace_is_rejected(#[case] namespace: &'static str) {
        assert!(matches!(
            Client::new(RpcOptions::new("dev").with_namespace(namespace)),
            Err(RpcError::InvalidNamespace)
        ));
    }

    #[test]
    fn skips_ids_still_in_flight_after_wrap() {
        let mut rpc = client();
        let first = rpc.begin("a", at(0)).unwrap();
        assert_eq!(first.id, 0);

        rpc.next_id = 0;
        let second = rpc.begin("b", at(0)).unwrap();
        assert_eq!(second.id, 1);
        assert_eq!(second.request_topic.as_str(), "MQTTnet.RPC/dev-00000001/b");

        assert!(rpc.on_message(&second.response_topic, b"pong"));
        assert_eq!(rpc.poll(first.id, at(1)), Ok(None));
        assert_eq!(rpc.poll(second.id, at(1)).unwrap().unwrap().as_slice(), b"pong");
    }

    #[test]
    fn sequence_wraps_to_zero() {
        let mut rpc = client();
        rpc.next_id = CallId::MAX;
        let last = rpc.begin("ping", at(0)).unwrap();
        let wrapped = rpc.begin("ping", at(0)).unwrap();

        assert_eq!(last.request_topic.as_str(), "MQTTnet.RPC/dev-ffffffff/ping");
        assert_eq!(wrapped.id, 0);
        assert_eq!(wrapped.request_topic.as_str(), "MQTTnet.RPC/dev-00000000/ping");
    }

    #[test]
    fn cancel_all_forgets_every_call() {
        let mut rpc = client();
        let first = rpc.begin("a", at(0)).unwrap();
        let second = rpc.begin("b", at(0)).unwrap();

        assert_eq!(rpc.cancel_all(), 2);
        assert_eq!(rpc.pending(), 0);
        assert!(!rpc.on_message(&first.response_topic, b"late"));
        assert_eq!(rpc.poll(first.id, at(0)), Err(RpcError::UnknownCall));
        assert_eq!(rpc.poll(second.id, at(0)), Err(RpcError::UnknownCall));
        assert_eq!(rpc.cancel_all(), 0);
        assert!(rpc.begin("c", at(0)).is_ok());
    }

    struct FixedTopics {
        request: &'static str,
        response: &'static str,
    }

    impl TopicStrategy for FixedTopics {
        fn rpc_topics(&self, _context: &TopicContext<'_>) -> Result<RpcTopics, RpcError> {
            Ok(RpcTopics {
                request_topic: TopicString::try_from(self.request).unwrap(),
                response_topic: TopicString::try_from(self.response).unwrap(),
            })
        }
    }

    #[test]
    fn custom_strategy_names_topics() {
        let strategy = FixedTopics {
            request: "a",
            response: "b",
        };
        let mut rpc = RpcClient::<2, 8>::new(RpcOptions::new("dev"))
            .unwrap()
            .with_strategy(&strategy);

        let call = rpc.begin("ping", at(0)).unwrap();
        assert_eq!(call.request_topic.as_str(), "a");
        assert_eq!(call.response_topic.as_str(), "b");
        assert_eq!(rpc.begin("ping", at(0)), Err(RpcError::DuplicateCall));

        assert!(rpc.on_message("b", b"pong"));
        assert_eq!(rpc.poll(call.id, at(0)).unwrap().unwrap().as_slice(), b"pong");
    }

    #[rstest]
    #[case("", "b")]
    #[case("a/+", "b")]
    #[case("a", "b/#")]
    #[case("a", "a")]
    fn unusable_strategy_topics_are_rejected(
        #[case] request: &'static str,
        #[case] response: &'static str,
    ) {
        let strategy = FixedTopics { request, response };
        let mut rpc = RpcClient::<2, 8>::new(RpcOptions::new("dev"))
            .unwrap()
            .with_strategy(&strategy);

        assert_eq!(rpc.begin("ping", at(0)), Err(RpcError::InvalidTopic));
        assert_eq!(rpc.pending(), 0);
    }

    struct PerDeviceTopics;

    impl TopicStrategy for PerDeviceTopics {
        fn rpc_topics(&self, context: &TopicContext<'_>) -> Result<RpcTopics, RpcError> {
            let mut request_topic = TopicString::new();
            write!(
                request_topic,
                "{}/{}/{}",
                context.namespace, context.client_id, context.method
            )
            .map_err(|_| RpcError::TopicTooLong)?;
            let mut response_topic = TopicString::new();
            write!(response_topic, "replies/{}/{}", context.client_id, context.call_id)
                .map_err(|_| RpcError::TopicTooLong)?;
            Ok(RpcTopics {
                request_topic,
                response_topic,
            })
        }
    }

    #[test]
    fn strategy_sees_call_context() {
        let mut rpc = RpcClient::<2, 8>::new(RpcOptions::new("dev").with_namespace("Acme.RPC/"))
            .unwrap()
            .with_strategy(&PerDeviceTopics);

        let first = rpc.begin("ping", at(0)).unwrap();
        let second = rpc.begin("ping", at(0)).unwrap();
        assert_eq!(first.request_topic.as_str(), "Acme.RPC/dev/ping");
        assert_eq!(first.response_topic.as_str(), "replies/dev/0");
        assert_eq!(second.response_topic.as_str(), "replies/dev/1");
    }
}
