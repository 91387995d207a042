//! # Error Types
//!
//! This module defines the error type shared by the router, the runtime module
//! and the RPC caller. Per-message errors are recovered locally (the message is
//! dropped); registration errors are meant to fail the startup sequence.

/// The error enum for RPC routing and calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RpcError {
    /// The topic does not start with the RPC namespace. Not an RPC message.
    NotRpcTopic,
    /// The topic starts with the namespace but is not `<client>/<method>`.
    MalformedTopic,
    /// No handler is registered for the method in the topic.
    UnknownMethod,
    /// A handler for this method name is already registered.
    DuplicateHandler,
    /// The method name is empty or contains `+`, `#` or `/`.
    InvalidMethodName,
    /// The client identifier is empty or contains `+`, `#` or `/`.
    InvalidClientId,
    /// The namespace is empty, has an empty level or contains `+` or `#`.
    InvalidNamespace,
    /// A generated request or response topic is empty or contains a wildcard.
    InvalidTopic,
    /// The handler table has no room left.
    RegistryFull,
    /// A topic built from the inputs would exceed `MAX_TOPIC_LEN`.
    TopicTooLong,
    /// A payload does not fit the configured buffer size.
    PayloadTooLarge,
    /// The caller already has the maximum number of calls in flight.
    TooManyCalls,
    /// A call is already waiting on the same response topic.
    DuplicateCall,
    /// No call with this identifier is in flight.
    UnknownCall,
    /// The call did not receive a response before its deadline.
    Timeout,
}
