//! Protocol responses and typed results

use bytes::Bytes;

use super::control::Control;
use super::entry::Entry;
use super::result_code::ResultCode;

/// The result fields shared by every response kind: code, diagnostic
/// message, matched DN, and referral URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpResult {
    pub code: ResultCode,
    pub diagnostic_message: Option<String>,
    pub matched_dn: Option<String>,
    pub referral_urls: Vec<String>,
}

impl OpResult {
    /// A bare result with the given code and no other fields
    pub fn of(code: ResultCode) -> Self {
        Self {
            code,
            diagnostic_message: None,
            matched_dn: None,
            referral_urls: Vec::new(),
        }
    }

    /// A result with a code and diagnostic message
    pub fn with_message(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            diagnostic_message: Some(message.into()),
            matched_dn: None,
            referral_urls: Vec::new(),
        }
    }

    /// A plain success result
    pub fn success() -> Self {
        Self::of(ResultCode::Success)
    }
}

/// Response body, one variant per operation kind
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Add(OpResult),
    Delete(OpResult),
    Modify(OpResult),
    ModifyDn(OpResult),
    Compare(OpResult),
    Bind(OpResult),
    Extended {
        result: OpResult,
        response_oid: Option<String>,
        response_value: Option<Bytes>,
    },
    Search {
        entries: Vec<SearchEntry>,
        references: Vec<SearchReference>,
        result: OpResult,
    },
}

impl ResponseBody {
    /// Lowercase operation kind, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            ResponseBody::Add(_) => "add",
            ResponseBody::Delete(_) => "delete",
            ResponseBody::Modify(_) => "modify",
            ResponseBody::ModifyDn(_) => "modify-dn",
            ResponseBody::Compare(_) => "compare",
            ResponseBody::Bind(_) => "bind",
            ResponseBody::Extended { .. } => "extended",
            ResponseBody::Search { .. } => "search",
        }
    }
}

/// A complete protocol response message
#[derive(Debug, Clone)]
pub struct ResponseMessage {
    /// Message sequence number, echoing the request's
    pub message_id: i32,

    /// Response controls
    pub controls: Vec<Control>,

    /// Operation-specific body
    pub body: ResponseBody,
}

impl ResponseMessage {
    pub fn new(message_id: i32, body: ResponseBody) -> Self {
        Self {
            message_id,
            controls: Vec::new(),
            body,
        }
    }

    /// The shared result fields of the body
    pub fn op_result(&self) -> &OpResult {
        match &self.body {
            ResponseBody::Add(r)
            | ResponseBody::Delete(r)
            | ResponseBody::Modify(r)
            | ResponseBody::ModifyDn(r)
            | ResponseBody::Compare(r)
            | ResponseBody::Bind(r) => r,
            ResponseBody::Extended { result, .. } => result,
            ResponseBody::Search { result, .. } => result,
        }
    }
}

/// An entry returned by a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub entry: Entry,
    pub controls: Vec<Control>,
}

impl SearchEntry {
    pub fn new(entry: Entry) -> Self {
        Self {
            entry,
            controls: Vec::new(),
        }
    }
}

/// A continuation reference returned by a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReference {
    pub referral_urls: Vec<String>,
    pub controls: Vec<Control>,
}

// =============================================================================
// Typed results returned by the façade
// =============================================================================

/// Typed result of an add, delete, modify, modify-DN, or bind operation
#[derive(Debug, Clone)]
pub struct LdapResult {
    pub message_id: i32,
    pub code: ResultCode,
    pub diagnostic_message: Option<String>,
    pub matched_dn: Option<String>,
    pub referral_urls: Vec<String>,
    pub response_controls: Vec<Control>,
}

impl LdapResult {
    pub(crate) fn from_response(message: &ResponseMessage, result: &OpResult) -> Self {
        Self {
            message_id: message.message_id,
            code: result.code,
            diagnostic_message: result.diagnostic_message.clone(),
            matched_dn: result.matched_dn.clone(),
            referral_urls: result.referral_urls.clone(),
            response_controls: message.controls.clone(),
        }
    }

    /// One-line summary for error display
    pub fn summary(&self) -> String {
        match &self.diagnostic_message {
            Some(message) => format!("{}: {}", self.code, message),
            None => self.code.to_string(),
        }
    }
}

/// Typed result of a compare operation
#[derive(Debug, Clone)]
pub struct CompareResult {
    pub result: LdapResult,
}

impl CompareResult {
    /// Whether the assertion value matched
    pub fn compare_matched(&self) -> bool {
        self.result.code == ResultCode::CompareTrue
    }
}

/// Typed result of a bind operation
#[derive(Debug, Clone)]
pub struct BindResult {
    pub result: LdapResult,
}

/// Typed result of an extended operation
#[derive(Debug, Clone)]
pub struct ExtendedResult {
    pub result: LdapResult,
    pub response_oid: Option<String>,
    pub response_value: Option<Bytes>,
}

/// Typed result of a search operation
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub result: LdapResult,

    /// Entries accumulated during the search, in the order produced. Empty
    /// when the request carried a listener.
    pub entries: Vec<SearchEntry>,

    /// References accumulated during the search. Empty when the request
    /// carried a listener.
    pub references: Vec<SearchReference>,

    /// Count of entries produced, whether returned or delivered to a listener
    pub entry_count: usize,

    /// Count of references produced
    pub reference_count: usize,
}
