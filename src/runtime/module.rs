//! The RPC responder as an `MqttModule`.

use embassy_time::Duration;
use heapless::Deque;

use super::traits::{MqttModule, PublishOutbox, TopicCollector};
use crate::config::RpcOptions;
use crate::logging::rpc_warn;
use crate::message::{Message, QoS};
use crate::router::{RpcResponse, TopicRouter};

/// Serves the methods of a [`TopicRouter`] through the module runtime.
///
/// - `register` collects `<namespace>/+/<method>` for every method
/// - `on_message` routes the request and queues the response
/// - `on_tick` publishes queued responses, never retained
///
/// Responses are queued because inbound messages borrow the client's receive
/// buffer; the runtime calls `on_tick` right after `on_message` whenever
/// something is queued.
///
/// # Type Parameters
///
/// - `MAX_METHODS`, `PAYLOAD_SIZE`: as on the router
/// - `QUEUE_DEPTH`: responses held between `on_message` and `on_tick`
pub struct RpcModule<
    'r,
    'a,
    const MAX_METHODS: usize,
    const PAYLOAD_SIZE: usize,
    const QUEUE_DEPTH: usize,
> {
    router: &'r TopicRouter<'a, MAX_METHODS, PAYLOAD_SIZE>,
    queue: Deque<RpcResponse<PAYLOAD_SIZE>, QUEUE_DEPTH>,
    qos: QoS,
    tick_interval: Duration,
    dropped: u32,
}

impl<'r, 'a, const MAX_METHODS: usize, const PAYLOAD_SIZE: usize, const QUEUE_DEPTH: usize>
    RpcModule<'r, 'a, MAX_METHODS, PAYLOAD_SIZE, QUEUE_DEPTH>
{
    pub fn new(
        router: &'r TopicRouter<'a, MAX_METHODS, PAYLOAD_SIZE>,
        options: &RpcOptions<'_>,
    ) -> Self {
        Self {
            router,
            queue: Deque::new(),
            qos: options.qos,
            tick_interval: options.tick_interval,
            dropped: 0,
        }
    }

    pub fn router(&self) -> &'r TopicRouter<'a, MAX_METHODS, PAYLOAD_SIZE> {
        self.router
    }

    /// Responses waiting for the next `on_tick`.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Responses discarded because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<const MAX_METHODS: usize, const PAYLOAD_SIZE: usize, const QUEUE_DEPTH: usize> MqttModule
    for RpcModule<'_, '_, MAX_METHODS, PAYLOAD_SIZE, QUEUE_DEPTH>
{
    fn register(&self, collector: &mut dyn TopicCollector) {
        for filter in self.router.subscriptions() {
            if !collector.add(&filter) {
                rpc_warn!("rpc: subscription {} rejected", filter.as_str());
            }
        }
    }

    fn on_message(&mut self, msg: &Message<'_>) {
        let Some(response) = self.router.route(msg.topic, msg.payload) else {
            return;
        };
        if self.queue.push_back(response).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            rpc_warn!("rpc: response queue full, dropped reply to {}", msg.topic);
        }
    }

    fn on_tick(&mut self, outbox: &mut dyn PublishOutbox) -> Duration {
        while let Some(response) = self.queue.pop_front() {
            outbox.publish(
                &response.topic,
                &response.payload,
                self.qos,
                RpcResponse::<PAYLOAD_SIZE>::RETAIN,
            );
        }
        self.tick_interval
    }

    fn needs_immediate_publish(&self) -> bool {
        !self.queue.is_empty()
    }
}
