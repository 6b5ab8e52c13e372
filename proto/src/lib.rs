//! Wire protocol and framed transport shared by the parley server and client.
//!
//! The protocol is a sequence of [`Envelope`] values over one TCP connection
//! per client. [`wire`] defines the envelope and its payload variants;
//! [`transport`] frames them over a byte stream.

pub mod transport;
pub mod wire;

pub use transport::{Connection, FrameSink, FrameStream, TransportError};
pub use wire::{Envelope, Payload};
