//! TCP transport for the Shadow data stream.
//!
//! This is the lowest layer of shadowstream. It knows how to reach the data
//! service ([`Endpoint`]), how to open a connection to it ([`DataStream`]),
//! and how to bound individual blocking reads and writes ([`StreamTimeouts`]).
//! Everything else builds on top of the types provided here.

pub mod endpoint;
pub mod error;
pub mod stream;

pub use endpoint::{Endpoint, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{Result, TransportError};
pub use stream::{DataStream, StreamTimeouts};

#[cfg(feature = "async")]
pub use stream::connect_async;
