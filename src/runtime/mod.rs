//! MQTT Runtime Module
//!
//! Plugs the RPC responder into a modular MQTT application.
//!
//! # Overview
//!
//! The MQTT client and its event loop live outside this crate. They talk to
//! modules through three object-safe traits:
//!
//! - `TopicCollector` to gather the filters to subscribe to
//! - `MqttModule::on_message` for every inbound publish
//! - `PublishOutbox` to hand back what should be published
//!
//! A typical loop looks like this:
//!
//! ```ignore
//! let mut registry = TopicRegistry::<8>::new();
//! module.register(&mut registry);
//! for filter in registry.iter() {
//!     client.subscribe(filter, QoS::AtMostOnce).await?;
//! }
//!
//! let mut outbox = BufferedOutbox::<4, MAX_TOPIC_LEN, 64>::new();
//! loop {
//!     let msg = client.next_message().await?;
//!     module.on_message(&msg);
//!     if module.needs_immediate_publish() {
//!         module.on_tick(&mut outbox);
//!         for req in outbox.drain() {
//!             client.publish(&req.topic, &req.payload, req.qos, req.retain).await?;
//!         }
//!     }
//! }
//! ```

pub(crate) mod module;
pub(crate) mod publisher;
pub(crate) mod registry;
pub(crate) mod traits;

pub use module::RpcModule;
pub use publisher::{
    BufferedOutbox, OwnedPublishRequest, PublishRequestChannel, PublishRequestReceiver,
    PublisherHandle,
};
pub use registry::TopicRegistry;
pub use traits::{ModulePair, MqttModule, NoopModule, PublishOutbox, TopicCollector};

pub use crate::message::Message;
