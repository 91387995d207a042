//! # Topic Router
//!
//! Maps RPC method names to handlers and turns an inbound request into the
//! response that must be published. The router never publishes on its own;
//! callers (usually [`RpcModule`](crate::runtime::RpcModule)) hand the returned
//! [`RpcResponse`] to their outbox with the retain flag cleared.
//!
//! The handler table is filled once at startup. Dispatch only needs `&self`,
//! so a finished router can live in a `static` and be shared between tasks.

use heapless::Vec;

use crate::config::RpcOptions;
use crate::error::RpcError;
use crate::logging::{rpc_debug, rpc_warn};
use crate::topic::{self, RequestTopic, TopicString};

/// A response payload with inline storage.
pub type ResponsePayload<const PAYLOAD_SIZE: usize> = Vec<u8, PAYLOAD_SIZE>;

/// Produces the response payload for an RPC request payload.
///
/// Implemented for every `Fn(&[u8]) -> ResponsePayload<N>`, so plain
/// functions and closures can be registered directly:
///
/// ```ignore
/// fn ping(_request: &[u8]) -> ResponsePayload<32> {
///     Vec::from_slice(b"pong").unwrap_or_default()
/// }
/// router.register("ping", &ping)?;
/// ```
pub trait RpcHandler<const PAYLOAD_SIZE: usize> {
    fn handle(&self, request: &[u8]) -> ResponsePayload<PAYLOAD_SIZE>;
}

impl<F, const PAYLOAD_SIZE: usize> RpcHandler<PAYLOAD_SIZE> for F
where
    F: Fn(&[u8]) -> ResponsePayload<PAYLOAD_SIZE>,
{
    fn handle(&self, request: &[u8]) -> ResponsePayload<PAYLOAD_SIZE> {
        self(request)
    }
}

/// The result of a routed request: where and what to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse<const PAYLOAD_SIZE: usize> {
    /// The request topic with `/response` appended.
    pub topic: TopicString,
    pub payload: ResponsePayload<PAYLOAD_SIZE>,
}

impl<const PAYLOAD_SIZE: usize> RpcResponse<PAYLOAD_SIZE> {
    /// RPC responses must never be retained by the broker.
    pub const RETAIN: bool = false;
}

struct Route<'a, const PAYLOAD_SIZE: usize> {
    method: &'a str,
    handler: &'a (dyn RpcHandler<PAYLOAD_SIZE> + Sync),
}

/// Routes RPC request topics to registered handlers.
///
/// # Type Parameters
///
/// - `MAX_METHODS`: Maximum number of registered methods
/// - `PAYLOAD_SIZE`: Maximum response payload size
pub struct TopicRouter<'a, const MAX_METHODS: usize, const PAYLOAD_SIZE: usize> {
    namespace: &'a str,
    routes: Vec<Route<'a, PAYLOAD_SIZE>, MAX_METHODS>,
}

impl<'a, const MAX_METHODS: usize, const PAYLOAD_SIZE: usize>
    TopicRouter<'a, MAX_METHODS, PAYLOAD_SIZE>
{
    /// Create an empty router for `namespace`. A trailing `/` is dropped, so
    /// `"MQTTnet.RPC/"` and `"MQTTnet.RPC"` are equivalent.
    ///
    /// The namespace itself is checked by [`register`](Self::register).
    pub fn new(namespace: &'a str) -> Self {
        Self {
            namespace: topic::normalize_namespace(namespace),
            routes: Vec::new(),
        }
    }

    pub fn with_options(options: &RpcOptions<'a>) -> Self {
        Self::new(options.namespace)
    }

    /// Register `handler` for `method`.
    ///
    /// Fails with `InvalidNamespace` if the router's namespace is empty, has an
    /// empty level or contains a wildcard, with `InvalidMethodName` if the
    /// name is empty or contains `+`, `#` or `/`, with `DuplicateHandler` if
    /// the name is already taken, with `TopicTooLong` if its subscription
    /// filter would not fit a topic buffer, and with `RegistryFull` once
    /// `MAX_METHODS` handlers are registered.
    pub fn register(
        &mut self,
        method: &'a str,
        handler: &'a (dyn RpcHandler<PAYLOAD_SIZE> + Sync),
    ) -> Result<(), RpcError> {
        topic::validate_namespace(self.namespace)?;
        topic::validate_method_name(method)?;
        if self.find(method).is_some() {
            return Err(RpcError::DuplicateHandler);
        }
        topic::subscription_filter(self.namespace, method)?;

        self.routes
            .push(Route { method, handler })
            .map_err(|_| RpcError::RegistryFull)?;

        rpc_debug!("rpc: registered method {}", method);
        Ok(())
    }

    /// Route an inbound message, returning the response to publish.
    ///
    /// Messages outside the namespace are ignored silently. Malformed topics
    /// and unknown methods are logged and dropped.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Option<RpcResponse<PAYLOAD_SIZE>> {
        match self.dispatch(topic, payload) {
            Ok(response) => {
                rpc_debug!(
                    "rpc: {} answered with {} bytes",
                    topic,
                    response.payload.len()
                );
                Some(response)
            }
            Err(RpcError::NotRpcTopic) => None,
            Err(err) => {
                rpc_warn!("rpc: dropping {}: {:?}", topic, err);
                None
            }
        }
    }

    /// Like [`route`](Self::route), but reports why a message produced no
    /// response.
    pub fn dispatch(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<RpcResponse<PAYLOAD_SIZE>, RpcError> {
        let request = RequestTopic::parse(self.namespace, topic)?;
        let route = self
            .find(request.method())
            .ok_or(RpcError::UnknownMethod)?;
        // Build the topic first so the handler never runs for an unanswerable request.
        let response_topic = request.response_topic()?;

        Ok(RpcResponse {
            topic: response_topic,
            payload: route.handler.handle(payload),
        })
    }

    /// Subscription filters (`<namespace>/+/<method>`) in registration order.
    pub fn subscriptions(&self) -> impl Iterator<Item = TopicString> + '_ {
        self.routes
            .iter()
            .filter_map(|route| topic::subscription_filter(self.namespace, route.method).ok())
    }

    /// Registered method names in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.routes.iter().map(|route| route.method)
    }

    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn find(&self, method: &str) -> Option<&Route<'a, PAYLOAD_SIZE>> {
        self.routes.iter().find(|route| route.method == method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_NAMESPACE;
    use crate::topic::MAX_TOPIC_LEN;
    use rstest::rstest;

    type Router<'a> = TopicRouter<'a, 4, 32>;

    fn pong(_request: &[u8]) -> ResponsePayload<32> {
        Vec::from_slice(b"pong").unwrap()
    }

    fn echo(request: &[u8]) -> ResponsePayload<32> {
        Vec::from_slice(request).unwrap()
    }

    fn router() -> Router<'static> {
        let mut router = Router::new(DEFAULT_NAMESPACE);
        router.register("ping", &pong).unwrap();
        router.register("deviceA.echo", &echo).unwrap();
        router
    }

    #[test]
    fn ping_answers_pong() {
        let response = router().route("MQTTnet.RPC/deviceA/ping", b"").unwrap();
        assert_eq!(response.topic.as_str(), "MQTTnet.RPC/deviceA/ping/response");
        assert_eq!(response.payload.as_slice(), b"pong");
        assert!(!RpcResponse::<32>::RETAIN);
    }

    #[rstest]
    #[case("deviceA")]
    #[case("4f1c9e0b7d2a")]
    #[case("client.with.dots")]
    #[case("_")]
    fn any_client_segment_is_routed(#[case] client: &str) {
        let router = router();
        let mut topic = TopicString::new();
        topic.push_str("MQTTnet.RPC/").unwrap();
        topic.push_str(client).unwrap();
        topic.push_str("/deviceA.echo").unwrap();

        let response = router.route(&topic, b"42").unwrap();
        assert!(response.topic.starts_with(topic.as_str()));
        assert!(response.topic.ends_with("/response"));
        assert_eq!(response.payload.as_slice(), b"42");
    }

    #[rstest]
    #[case("Other.Namespace/x/ping", RpcError::NotRpcTopic)]
    #[case("MQTTnet.RPC/ping", RpcError::MalformedTopic)]
    #[case("MQTTnet.RPC/x/ping/response", RpcError::MalformedTopic)]
    #[case("MQTTnet.RPC/x/y/ping", RpcError::MalformedTopic)]
    #[case("MQTTnet.RPC/x/PING", RpcError::UnknownMethod)]
    #[case("MQTTnet.RPC/x/deviceA.ping", RpcError::UnknownMethod)]
    fn unroutable_topics(#[case] topic: &str, #[case] expected: RpcError) {
        let router = router();
        assert_eq!(router.dispatch(topic, b""), Err(expected));
        assert_eq!(router.route(topic, b""), None);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut router = router();
        assert_eq!(router.register("ping", &echo), Err(RpcError::DuplicateHandler));
        let response = router.route("MQTTnet.RPC/x/ping", b"hello").unwrap();
        assert_eq!(response.payload.as_slice(), b"pong");
    }

    #[rstest]
    #[case("device.A+ping")]
    #[case("device#")]
    #[case("a/b")]
    #[case("")]
    fn invalid_method_names_are_rejected(#[case] method: &'static str) {
        let mut router = Router::new(DEFAULT_NAMESPACE);
        assert_eq!(router.register(method, &pong), Err(RpcError::InvalidMethodName));
        assert!(router.is_empty());
    }

    #[test]
    fn trailing_separator_in_namespace_is_dropped() {
        let mut router = TopicRouter::<'static, 2, 32>::new("MQTTnet.RPC/");
        router.register("ping", &pong).unwrap();

        assert_eq!(router.namespace(), "MQTTnet.RPC");
        assert_eq!(
            router.subscriptions().next().unwrap().as_str(),
            "MQTTnet.RPC/+/ping"
        );
        let response = router.dispatch("MQTTnet.RPC/deviceA/ping", b"").unwrap();
        assert_eq!(response.topic.as_str(), "MQTTnet.RPC/deviceA/ping/response");
    }

    #[rstest]
    #[case("")]
    #[case("a/+")]
    #[case("rpc/#")]
    #[case("a//b")]
    fn invalid_namespace_fails_registration(#[case] namespace: &'static str) {
        let mut router = TopicRouter::<'static, 2, 32>::new(namespace);
        assert_eq!(router.register("m", &pong), Err(RpcError::InvalidNamespace));
        assert!(router.is_empty());
        assert_eq!(router.subscriptions().count(), 0);
    }

    #[test]
    fn registry_capacity_is_enforced() {
        let mut router = TopicRouter::<'static, 2, 32>::new(DEFAULT_NAMESPACE);
        router.register("a", &pong).unwrap();
        router.register("b", &pong).unwrap();
        assert_eq!(router.register("c", &pong), Err(RpcError::RegistryFull));
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn closures_capture_state() {
        let greeting = b"hello";
        let handler = move |_request: &[u8]| -> ResponsePayload<32> {
            Vec::from_slice(greeting).unwrap()
        };
        let mut router = TopicRouter::<'_, 1, 32>::new("Acme.RPC");
        router.register("greet", &handler).unwrap();

        let response = router.route("Acme.RPC/c/greet", b"").unwrap();
        assert_eq!(response.payload.as_slice(), b"hello");
        assert_eq!(router.route("MQTTnet.RPC/c/greet", b""), None);
    }

    #[test]
    fn lists_subscriptions_in_order() {
        let router = router();
        let mut filters = router.subscriptions();
        assert_eq!(filters.next().unwrap().as_str(), "MQTTnet.RPC/+/ping");
        assert_eq!(filters.next().unwrap().as_str(), "MQTTnet.RPC/+/deviceA.echo");
        assert!(filters.next().is_none());

        let methods: std::vec::Vec<&str> = router.methods().collect();
        assert_eq!(methods, ["ping", "deviceA.echo"]);
    }

    #[test]
    fn response_topic_overflow_skips_handler() {
        use core::sync::atomic::{AtomicBool, Ordering};

        static CALLED: AtomicBool = AtomicBool::new(false);
        fn flagging(_request: &[u8]) -> ResponsePayload<32> {
            CALLED.store(true, Ordering::Relaxed);
            ResponsePayload::new()
        }

        let mut router = TopicRouter::<'static, 1, 32>::new(DEFAULT_NAMESPACE);
        router.register("m", &flagging).unwrap();

        let mut topic = TopicString::new();
        topic.push_str("MQTTnet.RPC/").unwrap();
        while topic.len() < MAX_TOPIC_LEN - 2 {
            topic.push('c').unwrap();
        }
        topic.push_str("/m").unwrap();

        assert_eq!(router.dispatch(&topic, b""), Err(RpcError::TopicTooLong));
        assert!(!CALLED.load(Ordering::Relaxed));
    }
}
