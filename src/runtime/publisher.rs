//! Publish request handling and outbox implementations.
//!
//! This module provides the `PublishOutbox` implementation used to collect
//! responses from `MqttModule` callbacks, and the channel-based handle used
//! when RPC handlers run on a worker task instead of the MQTT loop.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::{String, Vec};

use super::traits::PublishOutbox;
use crate::QoS;
use crate::logging::rpc_warn;
use crate::router::RpcResponse;

/// An owned publish request with inline storage for topic and payload.
///
/// This allows the outbox to store requests without requiring the original
/// data to remain borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPublishRequest<const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> {
    pub topic: String<TOPIC_SIZE>,
    pub payload: Vec<u8, PAYLOAD_SIZE>,
    pub qos: QoS,
    pub retain: bool,
}

impl<const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
    OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>
{
    /// Copy `topic` and `payload` into a new request.
    ///
    /// Returns `None` if either does not fit.
    pub fn new(topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Option<Self> {
        let mut topic_str = String::new();
        topic_str.push_str(topic).ok()?;

        let mut payload_vec = Vec::new();
        payload_vec.extend_from_slice(payload).ok()?;

        Some(Self {
            topic: topic_str,
            payload: payload_vec,
            qos,
            retain,
        })
    }

    /// Build the publish request for an RPC response. Never retained.
    pub fn from_response<const N: usize>(response: &RpcResponse<N>, qos: QoS) -> Option<Self> {
        Self::new(&response.topic, &response.payload, qos, RpcResponse::<N>::RETAIN)
    }
}

/// A buffered outbox that collects publish requests during module callbacks.
///
/// The MQTT loop drains it after each `on_tick` / `on_start` call and
/// forwards every request to the client.
///
/// # Type Parameters
///
/// - `CAPACITY`: Maximum number of publish requests that can be buffered
/// - `TOPIC_SIZE`: Maximum topic string length
/// - `PAYLOAD_SIZE`: Maximum payload size
pub struct BufferedOutbox<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
{
    requests: Vec<OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>, CAPACITY>,
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
    BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
        }
    }

    /// Remove and return all buffered requests in the order they were queued.
    pub fn drain(
        &mut self,
    ) -> impl Iterator<Item = OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>> + '_ {
        core::mem::take(&mut self.requests).into_iter()
    }

    /// Buffered requests, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>> {
        self.requests.iter()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> Default
    for BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> PublishOutbox
    for BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) {
        let Some(req) = OwnedPublishRequest::new(topic, payload, qos, retain) else {
            rpc_warn!("outbox: {} does not fit, dropped", topic);
            return;
        };

        if self.requests.push(req).is_err() {
            rpc_warn!("outbox: full, dropped {}", topic);
        }
    }
}

pub type PublishRequestChannel<
    M,
    const OUTBOX_DEPTH: usize,
    const TOPIC_SIZE: usize,
    const PAYLOAD_SIZE: usize,
> = Channel<M, OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>, OUTBOX_DEPTH>;

pub type PublishRequestReceiver<
    'a,
    M,
    const OUTBOX_DEPTH: usize,
    const TOPIC_SIZE: usize,
    const PAYLOAD_SIZE: usize,
> = Receiver<'a, M, OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>, OUTBOX_DEPTH>;

/// A handle that lets worker tasks hand RPC responses to the MQTT loop without
/// direct access to the client.
///
/// The handle wraps a channel sender and can be copied into multiple tasks.
/// The MQTT loop receives the requests and performs the actual publish.
pub struct PublisherHandle<
    'a,
    M: RawMutex,
    const OUTBOX_DEPTH: usize,
    const TOPIC_SIZE: usize,
    const PAYLOAD_SIZE: usize,
> {
    tx: Sender<'a, M, OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>, OUTBOX_DEPTH>,
    qos: QoS,
}

impl<M: RawMutex, const OUTBOX_DEPTH: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
    Clone for PublisherHandle<'_, M, OUTBOX_DEPTH, TOPIC_SIZE, PAYLOAD_SIZE>
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex, const OUTBOX_DEPTH: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
    Copy for PublisherHandle<'_, M, OUTBOX_DEPTH, TOPIC_SIZE, PAYLOAD_SIZE>
{
}

impl<'a, M: RawMutex, const OUTBOX_DEPTH: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
    PublisherHandle<'a, M, OUTBOX_DEPTH, TOPIC_SIZE, PAYLOAD_SIZE>
{
    /// Create a handle sending on `channel` with the given response QoS.
    pub fn new(
        channel: &'a PublishRequestChannel<M, OUTBOX_DEPTH, TOPIC_SIZE, PAYLOAD_SIZE>,
        qos: QoS,
    ) -> Self {
        Self {
            tx: channel.sender(),
            qos,
        }
    }

    /// Send a response, waiting while the channel is full.
    ///
    /// Returns `false` if the response does not fit the request buffers.
    pub async fn publish_response<const N: usize>(&self, response: &RpcResponse<N>) -> bool {
        match OwnedPublishRequest::from_response(response, self.qos) {
            Some(req) => {
                self.tx.send(req).await;
                true
            }
            None => false,
        }
    }

    /// Try to send a response without waiting.
    ///
    /// Returns `false` if the channel is full or the response does not fit.
    pub fn try_publish_response<const N: usize>(&self, response: &RpcResponse<N>) -> bool {
        let Some(req) = OwnedPublishRequest::from_response(response, self.qos) else {
            return false;
        };
        if self.tx.try_send(req).is_err() {
            rpc_warn!("publisher: channel full, dropped {}", response.topic.as_str());
            return false;
        }
        true
    }
}
