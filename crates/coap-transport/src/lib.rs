//! CoAP Event Adapter - Transport Layer
//!
//! The wire protocol itself is handled by an external listener. This crate
//! defines the boundary with it:
//! - request/response exchange types seen by resource handlers
//! - plain and secure listener endpoints, created through an
//!   [`EndpointFactory`] so key material handling stays opaque
//!
//! The transport is decoupled from resource routing via the `RequestHandler` trait.

pub mod endpoint;
pub mod exchange;

pub use endpoint::{
    DefaultEndpointFactory, Endpoint, EndpointFactory, PortConfig, SecurityConfig, TransportError,
};
pub use exchange::{Exchange, Method, Request, RequestHandler, Response, ResponseCode};
