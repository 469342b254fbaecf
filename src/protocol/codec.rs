//! Wire codec contract
//!
//! The wire-level grammar of protocol messages is owned by an external
//! collaborator. A listener cannot serve network connections without a codec
//! configured; the in-process façade never touches it.

use std::io::{BufRead, Write};

use crate::error::Result;

use super::control::Control;
use super::request::RequestOp;
use super::response::ResponseMessage;

/// A decoded request frame: sequence number, operation, request controls
pub type RequestFrame = (i32, RequestOp, Vec<Control>);

/// Encodes and decodes protocol messages for networked dispatch.
///
/// Implementations own framing and the wire grammar. All methods must be
/// callable from multiple connection threads concurrently.
pub trait WireCodec: Send + Sync {
    /// Read the next request frame from the stream.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream (client disconnect).
    fn read_request(&self, reader: &mut dyn BufRead) -> Result<Option<RequestFrame>>;

    /// Write a response message to the stream.
    fn write_response(&self, writer: &mut dyn Write, message: &ResponseMessage) -> Result<()>;
}
