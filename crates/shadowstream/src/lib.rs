//! Client for the Shadow motion capture data stream.
//!
//! shadowstream connects to the Configurable data service of the Shadow app,
//! splits its byte stream into messages, and decodes measurement samples
//! while keeping track of the node names announced in between.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP endpoint and connection handling
//! - [`frame`]: Length-prefixed message framing
//! - [`session`]: Handshake, metadata tracking, sample decoding

/// Re-export transport types.
pub mod transport {
    pub use shadowstream_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use shadowstream_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use shadowstream_session::*;
}

pub use shadowstream_session::{
    ChannelRequest, NameMap, Result, Sample, Session, SessionConfig, SessionError,
};
#[cfg(feature = "async")]
pub use shadowstream_session::AsyncSession;
pub use shadowstream_transport::Endpoint;
