//! Synchronous operation façade.
//!
//! Every method builds a typed request, appends the in-process marker control
//! to the caller's controls, dispatches straight to the backend with message
//! ID 1, and classifies the response into `Ok(result)` or an error carrying
//! the full result. The listener chains (logging, transport upgrade) are
//! network-path concerns and are deliberately not involved here.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{MemDirError, Result};
use crate::ldif;
use crate::protocol::{
    with_internal_marker, Attribute, BindRequest, BindResult, CompareResult, Control, Entry,
    ExtendedResult, LdapResult, Modification, OpResult, RequestOp, ResponseBody, ResponseMessage,
    ResultCode, SearchEntry, SearchRequest, SearchResult,
};

use super::DirectoryServer;

/// Message ID used for every façade-dispatched request
const FACADE_MESSAGE_ID: i32 = 1;

impl DirectoryServer {
    // =========================================================================
    // Write operations
    // =========================================================================

    /// Add an entry with the given DN and attributes.
    pub fn add(&self, dn: &str, attributes: Vec<Attribute>) -> Result<LdapResult> {
        self.add_with_controls(dn, attributes, &[])
    }

    /// Add a copy of the given entry.
    pub fn add_entry(&self, entry: &Entry) -> Result<LdapResult> {
        self.add_with_controls(&entry.dn, entry.attributes.clone(), &[])
    }

    /// Add the single entry described by the given LDIF lines.
    pub fn add_from_ldif<S: AsRef<str>>(&self, lines: &[S]) -> Result<LdapResult> {
        let mut entries = ldif::read_entries_from_lines(lines)?;
        if entries.len() != 1 {
            return Err(MemDirError::LdifParse(format!(
                "expected exactly one entry, found {}",
                entries.len()
            )));
        }
        let entry = entries.remove(0);
        self.add_entry(&entry)
    }

    pub fn add_with_controls(
        &self,
        dn: &str,
        attributes: Vec<Attribute>,
        controls: &[Control],
    ) -> Result<LdapResult> {
        let request = RequestOp::Add {
            dn: dn.to_string(),
            attributes,
        };
        self.write_op(request, controls)
    }

    /// Delete the entry with the given DN.
    pub fn delete(&self, dn: &str) -> Result<LdapResult> {
        self.delete_with_controls(dn, &[])
    }

    pub fn delete_with_controls(&self, dn: &str, controls: &[Control]) -> Result<LdapResult> {
        let request = RequestOp::Delete {
            dn: dn.to_string(),
        };
        self.write_op(request, controls)
    }

    /// Apply the given modifications to the entry with the given DN.
    pub fn modify(&self, dn: &str, modifications: Vec<Modification>) -> Result<LdapResult> {
        self.modify_with_controls(dn, modifications, &[])
    }

    pub fn modify_with_controls(
        &self,
        dn: &str,
        modifications: Vec<Modification>,
        controls: &[Control],
    ) -> Result<LdapResult> {
        let request = RequestOp::Modify {
            dn: dn.to_string(),
            modifications,
        };
        self.write_op(request, controls)
    }

    /// Rename and optionally relocate the entry with the given DN.
    pub fn modify_dn(
        &self,
        dn: &str,
        new_rdn: &str,
        delete_old_rdn: bool,
        new_superior_dn: Option<&str>,
    ) -> Result<LdapResult> {
        self.modify_dn_with_controls(dn, new_rdn, delete_old_rdn, new_superior_dn, &[])
    }

    pub fn modify_dn_with_controls(
        &self,
        dn: &str,
        new_rdn: &str,
        delete_old_rdn: bool,
        new_superior_dn: Option<&str>,
        controls: &[Control],
    ) -> Result<LdapResult> {
        let request = RequestOp::ModifyDn {
            dn: dn.to_string(),
            new_rdn: new_rdn.to_string(),
            delete_old_rdn,
            new_superior: new_superior_dn.map(str::to_string),
        };
        self.write_op(request, controls)
    }

    // =========================================================================
    // Compare
    // =========================================================================

    /// Compare an assertion value against the named attribute of an entry.
    ///
    /// Both "compare true" and "compare false" are successful outcomes; any
    /// other result code is an error.
    pub fn compare(&self, dn: &str, attribute: &str, assertion_value: &str) -> Result<CompareResult> {
        self.compare_with_controls(dn, attribute, assertion_value, &[])
    }

    pub fn compare_with_controls(
        &self,
        dn: &str,
        attribute: &str,
        assertion_value: &str,
        controls: &[Control],
    ) -> Result<CompareResult> {
        let request = RequestOp::Compare {
            dn: dn.to_string(),
            attribute: attribute.to_string(),
            assertion_value: assertion_value.to_string(),
        };
        let response = self.dispatch(&request, controls);
        let result = expect_result(&request, &response)?;
        let ldap = LdapResult::from_response(&response, result);

        match ldap.code {
            ResultCode::CompareTrue | ResultCode::CompareFalse => {
                Ok(CompareResult { result: ldap })
            }
            _ => Err(MemDirError::Operation(Box::new(ldap))),
        }
    }

    // =========================================================================
    // Bind
    // =========================================================================

    /// Perform a simple bind with the given DN and password.
    pub fn bind_simple(&self, dn: &str, password: &str) -> Result<BindResult> {
        self.bind(BindRequest::Simple {
            dn: dn.to_string(),
            password: password.to_string(),
        })
    }

    /// Perform a bind. Simple and SASL PLAIN binds go through the handler;
    /// any other SASL mechanism is rejected here without touching it.
    pub fn bind(&self, request: BindRequest) -> Result<BindResult> {
        self.bind_with_controls(request, &[])
    }

    pub fn bind_with_controls(
        &self,
        request: BindRequest,
        controls: &[Control],
    ) -> Result<BindResult> {
        let op = match request {
            BindRequest::Simple { dn, password } => RequestOp::Bind {
                dn,
                password: Some(Bytes::from(password.into_bytes())),
                sasl_mechanism: None,
                sasl_credentials: None,
            },
            BindRequest::SaslPlain {
                authorization_id,
                authentication_id,
                password,
            } => RequestOp::Bind {
                dn: String::new(),
                password: None,
                sasl_mechanism: Some("PLAIN".to_string()),
                sasl_credentials: Some(plain_credentials(
                    &authorization_id,
                    &authentication_id,
                    &password,
                )),
            },
            BindRequest::Sasl { mechanism, .. } => {
                return Err(MemDirError::Operation(Box::new(LdapResult {
                    message_id: 0,
                    code: ResultCode::AuthMethodNotSupported,
                    diagnostic_message: Some(format!(
                        "unsupported bind mechanism '{mechanism}'"
                    )),
                    matched_dn: None,
                    referral_urls: Vec::new(),
                    response_controls: Vec::new(),
                })));
            }
        };

        let response = self.dispatch(&op, controls);
        let result = expect_result(&op, &response)?;
        let ldap = LdapResult::from_response(&response, result);

        if ldap.code == ResultCode::Success {
            Ok(BindResult { result: ldap })
        } else {
            Err(MemDirError::Operation(Box::new(ldap)))
        }
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Perform a search.
    ///
    /// With no result listener on the request, matching entries and
    /// references accumulate in the returned result. With a listener, each
    /// is delivered to it instead and the result holds only the counts.
    pub fn search(&self, request: SearchRequest) -> Result<SearchResult> {
        self.search_with_controls(request, &[])
    }

    pub fn search_with_controls(
        &self,
        request: SearchRequest,
        controls: &[Control],
    ) -> Result<SearchResult> {
        let listener = request.listener.clone();
        let op = RequestOp::from_search(&request);
        let response = self.dispatch(&op, controls);

        let ResponseMessage {
            message_id,
            controls: response_controls,
            body,
        } = response;

        let (entries, references, result) = match body {
            ResponseBody::Search {
                entries,
                references,
                result,
            } => (entries, references, result),
            other => {
                return Err(MemDirError::Protocol(format!(
                    "handler returned a {} response for a search request",
                    other.kind_name()
                )))
            }
        };

        let entry_count = entries.len();
        let reference_count = references.len();

        let (kept_entries, kept_references) = match listener {
            Some(listener) => {
                for entry in &entries {
                    listener.entry_returned(entry);
                }
                for reference in &references {
                    listener.reference_returned(reference);
                }
                (Vec::new(), Vec::new())
            }
            None => (entries, references),
        };

        let search_result = SearchResult {
            result: LdapResult {
                message_id,
                code: result.code,
                diagnostic_message: result.diagnostic_message,
                matched_dn: result.matched_dn,
                referral_urls: result.referral_urls,
                response_controls,
            },
            entries: kept_entries,
            references: kept_references,
            entry_count,
            reference_count,
        };

        if search_result.result.code == ResultCode::Success {
            Ok(search_result)
        } else {
            Err(MemDirError::Search(Box::new(search_result)))
        }
    }

    /// Search for at most one entry.
    ///
    /// The size limit is forced to 1 and any result listener is discarded so
    /// the entry is always materialized. A missing search base yields
    /// `Ok(None)` rather than an error.
    pub fn search_for_entry(&self, request: SearchRequest) -> Result<Option<SearchEntry>> {
        let mut request = request;
        request.size_limit = 1;
        request.listener = None;

        match self.search(request) {
            Ok(result) => Ok(result.entries.into_iter().next()),
            Err(MemDirError::Search(result))
                if result.result.code == ResultCode::NoSuchObject =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Extended operations
    // =========================================================================

    /// Process an extended operation.
    ///
    /// A non-success result code raises an error only when it belongs to the
    /// configured failure set and the response carries neither a response
    /// OID nor a response value; otherwise the result is returned as-is for
    /// the caller to inspect.
    pub fn process_extended(&self, oid: &str, value: Option<Bytes>) -> Result<ExtendedResult> {
        self.process_extended_with_controls(oid, value, &[])
    }

    pub fn process_extended_with_controls(
        &self,
        oid: &str,
        value: Option<Bytes>,
        controls: &[Control],
    ) -> Result<ExtendedResult> {
        let request = RequestOp::Extended {
            oid: oid.to_string(),
            value,
        };
        let response = self.dispatch(&request, controls);

        let ResponseMessage {
            message_id,
            controls: response_controls,
            body,
        } = response;

        let (result, response_oid, response_value) = match body {
            ResponseBody::Extended {
                result,
                response_oid,
                response_value,
            } => (result, response_oid, response_value),
            other => {
                return Err(MemDirError::Protocol(format!(
                    "handler returned a {} response for an extended request",
                    other.kind_name()
                )))
            }
        };

        let extended = ExtendedResult {
            result: LdapResult {
                message_id,
                code: result.code,
                diagnostic_message: result.diagnostic_message,
                matched_dn: result.matched_dn,
                referral_urls: result.referral_urls,
                response_controls,
            },
            response_oid,
            response_value,
        };

        let is_hard_failure = extended.response_oid.is_none()
            && extended.response_value.is_none()
            && self
                .config()
                .extended_failure_codes()
                .contains(&extended.result.code);

        if is_hard_failure {
            Err(MemDirError::Operation(Box::new(extended.result)))
        } else {
            Ok(extended)
        }
    }

    // =========================================================================
    // Dispatch plumbing
    // =========================================================================

    pub(crate) fn dispatch(&self, request: &RequestOp, controls: &[Control]) -> ResponseMessage {
        self.backend
            .process(FACADE_MESSAGE_ID, request, &with_internal_marker(controls))
    }

    fn write_op(&self, request: RequestOp, controls: &[Control]) -> Result<LdapResult> {
        let response = self.dispatch(&request, controls);
        let result = expect_result(&request, &response)?;
        let ldap = LdapResult::from_response(&response, result);

        if ldap.code.is_write_success() {
            Ok(ldap)
        } else {
            Err(MemDirError::Operation(Box::new(ldap)))
        }
    }
}

/// SASL PLAIN credential encoding: authzid NUL authcid NUL password
fn plain_credentials(authorization_id: &str, authentication_id: &str, password: &Bytes) -> Bytes {
    let mut buf = BytesMut::with_capacity(
        authorization_id.len() + authentication_id.len() + password.len() + 2,
    );
    buf.put_slice(authorization_id.as_bytes());
    buf.put_u8(0);
    buf.put_slice(authentication_id.as_bytes());
    buf.put_u8(0);
    buf.put_slice(password);
    buf.freeze()
}

/// Extract the operation result, rejecting a response body whose kind does
/// not match the request that produced it.
fn expect_result<'a>(
    request: &RequestOp,
    response: &'a ResponseMessage,
) -> Result<&'a OpResult> {
    let matches = matches!(
        (request, &response.body),
        (RequestOp::Add { .. }, ResponseBody::Add(_))
            | (RequestOp::Delete { .. }, ResponseBody::Delete(_))
            | (RequestOp::Modify { .. }, ResponseBody::Modify(_))
            | (RequestOp::ModifyDn { .. }, ResponseBody::ModifyDn(_))
            | (RequestOp::Compare { .. }, ResponseBody::Compare(_))
            | (RequestOp::Bind { .. }, ResponseBody::Bind(_))
    );

    if matches {
        Ok(response.op_result())
    } else {
        Err(MemDirError::Protocol(format!(
            "handler returned a {} response for a {} request",
            response.body.kind_name(),
            request.kind_name()
        )))
    }
}
