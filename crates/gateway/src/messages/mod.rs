//! Request/reply messages between `ChannelTransport` and a backend

pub mod request;

pub use request::{GatewayReply, GatewayRequest};
