//! Public extension contracts for attaching coordinator-issued tokens to outbound requests.
//!
//! The trait stays generic over the request type so services can sign requests from any
//! HTTP client; the `reqwest` feature ships a ready-made [`BearerSigner`] plus
//! [`Coordinator::authorize`](crate::coordinator::Coordinator::authorize).

pub mod request_signer;

pub use request_signer::*;
