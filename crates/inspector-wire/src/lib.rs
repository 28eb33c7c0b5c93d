//! Wire format for the inspector protocol.
//!
//! Two layers live here:
//! - Envelopes: the JSON shapes exchanged with a debugging endpoint
//!   (`sendCommand` requests out; errors, responses, and events in).
//! - Framing: a 2-byte magic ("IN") plus a 4-byte little-endian length in
//!   front of every envelope, for byte-stream transports.

pub mod codec;
pub mod envelope;
pub mod error;

pub use codec::{
    decode_frame, encode_frame, EnvelopeCodec, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use envelope::{
    join_method, normalize_result, split_method, undefined_marker, CommandEnvelope,
    InboundMessage, MessageKind, SEND_COMMAND_VERB,
};
pub use error::{Result, WireError};
