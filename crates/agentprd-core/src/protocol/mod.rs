//! Streaming multiplex protocol.
//!
//! A turn's HTTP response body carries three kinds of frames over one
//! chunked text stream:
//!
//! - plain text deltas, passed through unframed;
//! - tool lifecycle events: `"\n__AGENTPRD_TOOL_EVENT__" <json> "\n"`;
//! - one trailing metadata record: `"\n__AGENTPRD_METADATA__\n" <json>`.
//!
//! [`StreamEncoder`] produces the body on the gateway side and
//! [`StreamDecoder`] reassembles it on the client side, chunk by chunk.

mod decoder;
mod encoder;
mod frames;
mod request;
mod tracker;

pub use decoder::{DecodedStream, DecoderState, DecoderUpdate, StreamDecoder, recover_metadata};
pub use encoder::{
    GENERATION_ERROR_NOTICE, GenerationEvent, StreamEncoder, encode_metadata, encode_tool_event,
};
pub use frames::{METADATA_SENTINEL, StreamMetadata, TOOL_EVENT_SENTINEL, ToolEvent, ToolEventKind};
pub use request::{Channel, ChatReply, ChatRequest, RequestContext};
pub use tracker::{ToolCallState, ToolCallTracker};
