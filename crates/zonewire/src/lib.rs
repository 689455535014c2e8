//! # zonewire
//!
//! The protocol spoken between a control plane and the zonelet node agent.
//!
//! ## Framing
//!
//! One JSON document per line. A connection carries any number of sequential
//! request/response exchanges; each request line is answered by exactly one
//! response line.
//!
//! - Request: `{"type":"StartWorkload","workload":{...}}` or `{"type":"GetStatus","id":"..."}`
//! - Response: `{"type":"Status","id":"...","state":"Running"}` or
//!   `{"type":"Error","id":"...","kind":"NotFoundError","message":"..."}`
//!
//! Decoding never panics on unknown input; anything that is not one of the
//! defined shapes is reported as a [`FrameError`] so the agent can answer with
//! a `ProtocolError` and keep the connection open.

pub mod frame;
pub mod message;
pub mod types;

pub use frame::FrameError;
pub use frame::MAX_FRAME_BYTES;
pub use frame::decode_request;
pub use frame::decode_response;
pub use frame::encode_request;
pub use frame::encode_response;
pub use frame::peek_id;
pub use message::ErrorKind;
pub use message::Request;
pub use message::Response;
pub use types::WorkloadSpec;
pub use types::WorkloadState;
