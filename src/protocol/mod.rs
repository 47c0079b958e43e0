//! Protocol module - envelopes, correlation ids, and stream framing.
//!
//! - `{ id, content }` envelope codec with request/response content shapes
//! - Correlation id generators
//! - Length-prefixed frames for byte-stream transports

mod envelope;
mod frame;
mod frame_buffer;
mod id;

pub use envelope::{CorrelationId, Envelope, Request, Response};
pub use frame::{build_frame, decode_length, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};
pub use frame_buffer::FrameBuffer;
pub use id::{IdGenerator, IdStrategy, RandomIds, SequentialIds, RANDOM_ID_LEN};
