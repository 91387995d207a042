//! RPC configuration.

use embassy_time::Duration;

use crate::QoS;

/// The namespace used by MQTTnet compatible RPC peers.
pub const DEFAULT_NAMESPACE: &str = "MQTTnet.RPC";

/// Options shared by the responder (`TopicRouter`) and the caller (`RpcClient`).
///
/// ```ignore
/// let options = RpcOptions::new("sensor-7")
///     .with_qos(QoS::AtLeastOnce)
///     .with_call_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RpcOptions<'a> {
    /// Topic namespace, without the trailing `/`.
    pub namespace: &'a str,
    /// Identifier placed in the client segment of outgoing requests.
    pub client_id: &'a str,
    /// QoS used for responses and requests.
    pub qos: QoS,
    /// How long a caller waits for a response.
    pub call_timeout: Duration,
    /// Interval returned from `on_tick` while nothing is queued.
    pub tick_interval: Duration,
}

impl<'a> RpcOptions<'a> {
    pub fn new(client_id: &'a str) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE,
            client_id,
            qos: QoS::AtMostOnce,
            call_timeout: Duration::from_secs(10),
            tick_interval: Duration::from_secs(60),
        }
    }

    pub fn with_namespace(mut self, namespace: &'a str) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

impl Default for RpcOptions<'_> {
    fn default() -> Self {
        Self::new("")
    }
}
