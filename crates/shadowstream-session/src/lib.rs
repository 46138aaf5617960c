//! Session layer for the Shadow data stream.
//!
//! Wraps the message framing with protocol interpretation: validates the
//! stream format on connect, tells XML metadata apart from binary samples,
//! keeps the node name map current, and decodes samples.
//!
//! ```no_run
//! use shadowstream_session::{ChannelRequest, Session, SessionConfig};
//!
//! # fn main() -> shadowstream_session::Result<()> {
//! let mut session = Session::connect(&SessionConfig::default())?;
//! session.request_channels(&ChannelRequest::new(["Lq", "c"]), None)?;
//!
//! let sample = session.next_sample(None)?;
//! let names = session.name_map();
//! for (key, values) in sample.iter() {
//!     let name = names.as_deref().and_then(|map| map.get(key)).unwrap_or("?");
//!     println!("{name}: {values:?}");
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "async")]
pub mod async_session;
pub mod error;
pub mod metadata;
pub mod request;
pub mod sample;
pub mod session;

#[cfg(feature = "async")]
pub use async_session::AsyncSession;
pub use error::{Result, SessionError};
pub use metadata::{is_metadata, parse_metadata, NameMap, METADATA_MARKER};
pub use request::ChannelRequest;
pub use sample::{decode_sample, encode_sample, Sample};
pub use session::{Session, SessionConfig, DEFAULT_HANDSHAKE_TIMEOUT};
