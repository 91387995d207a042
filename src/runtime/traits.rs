//! MQTT Module trait and utilities.
//!
//! This module defines the object-safe `MqttModule` trait that the RPC
//! responder plugs into, together with the two interfaces a module uses to
//! talk to the (external) MQTT client:
//!
//! - `TopicCollector`: the subscribe side, filled once during registration
//! - `PublishOutbox`: the publish side, drained by the runtime after a callback
//!
//! # Publishing Pattern
//!
//! Modules never perform async I/O directly. Inbound data borrows from the
//! client's receive buffer, so a module records what it wants to send and
//! queues it into a `PublishOutbox` during `on_tick`. The runtime performs the
//! actual publishing after the module method returns.

use embassy_time::Duration;

use crate::message::{Message, QoS};

/// Object-safe trait for queuing MQTT publish requests.
///
/// # Example
///
/// ```ignore
/// fn on_tick(&mut self, outbox: &mut dyn PublishOutbox) -> Duration {
///     outbox.publish("MQTTnet.RPC/c1/ping/response", b"pong", QoS::AtMostOnce, false);
///     Duration::from_secs(30)
/// }
/// ```
pub trait PublishOutbox {
    /// Queue a message for publishing.
    ///
    /// This is synchronous and returns immediately. RPC responses are always
    /// queued with `retain = false`.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool);
}

/// Object-safe trait for collecting topics during registration.
///
/// The runtime provides this to modules during `register()`. Modules
/// call `add()` for each topic filter they want to subscribe to.
pub trait TopicCollector {
    /// Add a topic filter to subscribe to.
    ///
    /// The topic string is copied internally, so it only needs to live
    /// for the duration of this call.
    ///
    /// Returns `true` if the topic was added, `false` if the collector is full.
    fn add(&mut self, topic: &str) -> bool;
}

/// Object-safe trait for MQTT modules that handle incoming messages and periodic tasks.
///
/// Modules are composed together and driven by the application's MQTT loop:
///
/// 1. `register` once, then subscribe to every collected filter
/// 2. `on_start` once the subscriptions are in place
/// 3. `on_message` for every inbound publish
/// 4. `on_tick` periodically, and right after `on_message` whenever
///    `needs_immediate_publish` returns `true`
pub trait MqttModule {
    /// Register topics that this module wants to subscribe to.
    fn register(&self, collector: &mut dyn TopicCollector);

    /// Handle an incoming MQTT message (synchronous processing only).
    ///
    /// Called for every incoming publish; the module decides whether the
    /// topic belongs to it.
    fn on_message(&mut self, msg: &Message<'_>);

    /// Perform periodic tasks and return the desired interval until the next tick.
    ///
    /// The default implementation does nothing and returns a 60-second interval.
    fn on_tick(&mut self, _outbox: &mut dyn PublishOutbox) -> Duration {
        Duration::from_secs(60)
    }

    /// Called once after connection is established and subscriptions are done.
    fn on_start(&mut self, _outbox: &mut dyn PublishOutbox) {}

    /// Check if the module needs to publish immediately after processing a message.
    fn needs_immediate_publish(&self) -> bool {
        false
    }
}

/// A no-op module that does nothing.
///
/// Useful as a placeholder or for testing.
pub struct NoopModule;

impl MqttModule for NoopModule {
    fn register(&self, _collector: &mut dyn TopicCollector) {}

    fn on_message(&mut self, _msg: &Message<'_>) {}
}

/// A composite module that combines two modules into one.
///
/// Both modules receive all messages and ticks, e.g. an RPC responder next
/// to a telemetry module.
pub struct ModulePair<M1, M2> {
    /// First module
    pub first: M1,
    /// Second module
    pub second: M2,
}

impl<M1, M2> ModulePair<M1, M2> {
    pub fn new(first: M1, second: M2) -> Self {
        Self { first, second }
    }
}

impl<M1, M2> MqttModule for ModulePair<M1, M2>
where
    M1: MqttModule,
    M2: MqttModule,
{
    fn register(&self, collector: &mut dyn TopicCollector) {
        self.first.register(collector);
        self.second.register(collector);
    }

    fn on_message(&mut self, msg: &Message<'_>) {
        self.first.on_message(msg);
        self.second.on_message(msg);
    }

    fn on_tick(&mut self, outbox: &mut dyn PublishOutbox) -> Duration {
        let d1 = self.first.on_tick(outbox);
        let d2 = self.second.on_tick(outbox);
        if d1 < d2 { d1 } else { d2 }
    }

    fn on_start(&mut self, outbox: &mut dyn PublishOutbox) {
        self.first.on_start(outbox);
        self.second.on_start(outbox);
    }

    fn needs_immediate_publish(&self) -> bool {
        self.first.needs_immediate_publish() || self.second.needs_immediate_publish()
    }
}

/// Blanket implementation for mutable references to trait objects.
///
/// This allows using `&mut dyn MqttModule` wherever `MqttModule` is expected.
impl<M: MqttModule + ?Sized> MqttModule for &mut M {
    fn register(&self, collector: &mut dyn TopicCollector) {
        (**self).register(collector)
    }

    fn on_message(&mut self, msg: &Message<'_>) {
        (**self).on_message(msg)
    }

    fn on_tick(&mut self, outbox: &mut dyn PublishOutbox) -> Duration {
        (**self).on_tick(outbox)
    }

    fn on_start(&mut self, outbox: &mut dyn PublishOutbox) {
        (**self).on_start(outbox)
    }

    fn needs_immediate_publish(&self) -> bool {
        (**self).needs_immediate_publish()
    }
}
