//! Length-prefixed message framing for the Shadow data stream.
//!
//! Every message on the wire is a 4-byte big-endian payload length followed
//! by exactly that many payload bytes. This layer owns message boundaries
//! only: it never looks inside a payload.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_message, encode_message, FrameConfig, DEFAULT_MAX_MESSAGE, HEADER_SIZE};
#[cfg(feature = "async")]
pub use codec::MessageCodec;
pub use error::{FrameError, Result};
pub use reader::MessageReader;
pub use writer::MessageWriter;
