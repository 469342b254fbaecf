//! Typed operation requests
//!
//! One request shape per operation kind. The façade converts these into
//! [`RequestOp`] values dispatched through the handler chain; a networked
//! listener produces the same values from decoded wire messages, so both
//! invocation paths converge on identical handler input.

use std::sync::Arc;

use bytes::Bytes;

use super::entry::Attribute;
use super::response::{SearchEntry, SearchReference};

/// Search scope relative to the base DN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchScope {
    /// The base entry only
    Base = 0,
    /// Immediate children of the base entry
    OneLevel = 1,
    /// The base entry and all subordinates
    Subtree = 2,
}

/// Modification kind for a modify operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModificationType {
    Add = 0,
    Delete = 1,
    Replace = 2,
}

/// A single attribute modification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub kind: ModificationType,
    pub attribute: String,
    pub values: Vec<String>,
}

impl Modification {
    pub fn new(
        kind: ModificationType,
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            kind,
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Callback receiving search entries and references as they are produced.
/// When a request carries a listener, accumulated sequences are delivered to
/// it instead of being returned in the result.
pub trait SearchListener: Send + Sync {
    fn entry_returned(&self, entry: &SearchEntry);
    fn reference_returned(&self, reference: &SearchReference);
}

/// A typed search request
#[derive(Clone)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: SearchScope,
    /// Filter string; its grammar is owned by the matching engine and is
    /// opaque to this layer.
    pub filter: String,
    /// Requested attributes; empty means all user attributes.
    pub attributes: Vec<String>,
    /// Maximum number of entries to return; 0 means no limit.
    pub size_limit: u32,
    /// Time limit in seconds; 0 means no limit.
    pub time_limit: u32,
    /// Return attribute types only, without values.
    pub types_only: bool,
    /// Optional streaming listener for entries and references.
    pub listener: Option<Arc<dyn SearchListener>>,
}

impl SearchRequest {
    pub fn new(
        base_dn: impl Into<String>,
        scope: SearchScope,
        filter: impl Into<String>,
    ) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope,
            filter: filter.into(),
            attributes: Vec::new(),
            size_limit: 0,
            time_limit: 0,
            types_only: false,
            listener: None,
        }
    }

    pub fn with_attributes(
        mut self,
        attributes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_size_limit(mut self, size_limit: u32) -> Self {
        self.size_limit = size_limit;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn SearchListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

impl std::fmt::Debug for SearchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchRequest")
            .field("base_dn", &self.base_dn)
            .field("scope", &self.scope)
            .field("filter", &self.filter)
            .field("attributes", &self.attributes)
            .field("size_limit", &self.size_limit)
            .field("time_limit", &self.time_limit)
            .field("types_only", &self.types_only)
            .field("listener", &self.listener.as_ref().map(|_| "<listener>"))
            .finish()
    }
}

/// A typed bind request. Only simple binds and the SASL PLAIN mechanism are
/// dispatched; any other mechanism is rejected before reaching the handler.
#[derive(Debug, Clone)]
pub enum BindRequest {
    /// Simple bind with a DN and password
    Simple { dn: String, password: String },

    /// SASL PLAIN bind; the credential is built by joining the three parts
    /// with single NUL separators.
    SaslPlain {
        authorization_id: String,
        authentication_id: String,
        password: Bytes,
    },

    /// Any other SASL mechanism; rejected as unsupported.
    Sasl {
        mechanism: String,
        credentials: Option<Bytes>,
    },
}

impl BindRequest {
    pub fn simple(dn: impl Into<String>, password: impl Into<String>) -> Self {
        BindRequest::Simple {
            dn: dn.into(),
            password: password.into(),
        }
    }
}

/// The low-level operation dispatched through the handler chain.
/// One variant per operation kind.
#[derive(Debug, Clone)]
pub enum RequestOp {
    Add {
        dn: String,
        attributes: Vec<Attribute>,
    },
    Delete {
        dn: String,
    },
    Modify {
        dn: String,
        modifications: Vec<Modification>,
    },
    ModifyDn {
        dn: String,
        new_rdn: String,
        delete_old_rdn: bool,
        new_superior: Option<String>,
    },
    Compare {
        dn: String,
        attribute: String,
        assertion_value: String,
    },
    /// Simple bind, or SASL with a mechanism name and raw credentials.
    Bind {
        dn: String,
        password: Option<Bytes>,
        sasl_mechanism: Option<String>,
        sasl_credentials: Option<Bytes>,
    },
    Search {
        base_dn: String,
        scope: SearchScope,
        filter: String,
        attributes: Vec<String>,
        size_limit: u32,
        time_limit: u32,
        types_only: bool,
    },
    Extended {
        oid: String,
        value: Option<Bytes>,
    },
}

impl RequestOp {
    /// Build the dispatched search op from a typed request, dropping the
    /// listener (delivery happens in the façade, not the handler).
    pub(crate) fn from_search(request: &SearchRequest) -> Self {
        RequestOp::Search {
            base_dn: request.base_dn.clone(),
            scope: request.scope,
            filter: request.filter.clone(),
            attributes: request.attributes.clone(),
            size_limit: request.size_limit,
            time_limit: request.time_limit,
            types_only: request.types_only,
        }
    }

    /// Short operation name for logging
    pub fn kind_name(&self) -> &'static str {
        match self {
            RequestOp::Add { .. } => "add",
            RequestOp::Delete { .. } => "delete",
            RequestOp::Modify { .. } => "modify",
            RequestOp::ModifyDn { .. } => "modify-dn",
            RequestOp::Compare { .. } => "compare",
            RequestOp::Bind { .. } => "bind",
            RequestOp::Search { .. } => "search",
            RequestOp::Extended { .. } => "extended",
        }
    }

    /// The DN or OID the operation targets, for logging
    pub fn target(&self) -> &str {
        match self {
            RequestOp::Add { dn, .. }
            | RequestOp::Delete { dn }
            | RequestOp::Modify { dn, .. }
            | RequestOp::ModifyDn { dn, .. }
            | RequestOp::Compare { dn, .. }
            | RequestOp::Bind { dn, .. } => dn,
            RequestOp::Search { base_dn, .. } => base_dn,
            RequestOp::Extended { oid, .. } => oid,
        }
    }
}
