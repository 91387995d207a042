//! # MQTT RPC for Embedded Systems
//!
//! `myrtio-mqtt-rpc` lets a `no_std` device answer remote procedure calls sent
//! by MQTTnet compatible peers, and issue calls of its own. It is transport
//! agnostic: the MQTT client lives elsewhere and is reached only through
//! "subscribe to this filter" and "publish this, not retained".
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** Topics, payloads and handler tables use
//!   `heapless` storage sized by const generics.
//! - **Structural topic routing:** `<namespace>/<client>/<method>` is parsed by
//!   segments, never by substring tests, so dotted method names such as
//!   `deviceA.ping` are unambiguous.
//! - **Runtime integration:** [`runtime::RpcModule`] implements the
//!   object-safe `MqttModule` trait, so the responder composes with other
//!   modules in the same MQTT loop.
//! - **Caller side:** [`client::RpcClient`] correlates responses to calls and
//!   enforces per-call timeouts. A [`client::TopicStrategy`] picks the
//!   request and response topics of each call.
//!
//! ## Topic Layout
//!
//! ```text
//! MQTTnet.RPC/+/ping                      responder subscription
//! MQTTnet.RPC/<client>/ping               request
//! MQTTnet.RPC/<client>/ping/response      response (retain = false)
//! ```
//!
//! ## Responding
//!
//! ```ignore
//! use myrtio_mqtt_rpc::{RpcOptions, TopicRouter, router::ResponsePayload};
//! use myrtio_mqtt_rpc::runtime::{MqttModule, RpcModule, TopicRegistry};
//!
//! fn ping(_request: &[u8]) -> ResponsePayload<64> {
//!     ResponsePayload::from_slice(b"pong").unwrap_or_default()
//! }
//!
//! let options = RpcOptions::new("device-1");
//! let mut router = TopicRouter::<4, 64>::with_options(&options);
//! router.register("ping", &ping)?;
//!
//! let mut module = RpcModule::<4, 64, 2>::new(&router, &options);
//! let mut registry = TopicRegistry::<4>::new();
//! module.register(&mut registry);
//! ```
//!
//! ## Logging
//!
//! Enable one of the `log`, `defmt` or `esp32-log` features to get
//! diagnostics for dropped messages.

#![cfg_attr(not(test), no_std)]

mod logging;

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod router;
pub mod runtime;
pub mod topic;

// Re-export key types for easier access at the crate root.
pub use client::{RpcCall, RpcClient, RpcTopics, SequenceTopics, TopicContext, TopicStrategy};
pub use config::{DEFAULT_NAMESPACE, RpcOptions};
pub use error::RpcError;
pub use message::{Message, QoS};
pub use router::{RpcHandler, RpcResponse, TopicRouter};
