//! Protocol Module
//!
//! Typed requests, responses, result codes, controls, and entries, plus the
//! wire-codec contract for networked dispatch.

mod codec;
mod control;
mod entry;
mod request;
mod response;
mod result_code;

pub use codec::{RequestFrame, WireCodec};
pub use control::{Control, OID_INTERNAL_OPERATION_REQUEST_CONTROL};
pub use entry::{Attribute, Entry};
pub use request::{
    BindRequest, Modification, ModificationType, RequestOp, SearchListener, SearchRequest,
    SearchScope,
};
pub use response::{
    BindResult, CompareResult, ExtendedResult, LdapResult, OpResult, ResponseBody,
    ResponseMessage, SearchEntry, SearchReference, SearchResult,
};
pub use result_code::{ResultCode, DEFAULT_EXTENDED_FAILURE_CODES};

pub(crate) use control::with_internal_marker;
