//! Shared test support: an in-memory storage backend with just enough
//! behavior to exercise the server layer, and a line-oriented wire codec for
//! networked round trips.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use memdir::{
    Attribute, Control, DirectoryBackend, DirectoryConfig, DirectoryServer, Entry,
    ListenerDefinition, ModificationType, OperationHandler, OpResult, RequestOp, ResponseBody,
    ResponseMessage, ResultCode, SearchEntry, Snapshot, WireCodec,
};

pub const ADMIN_DN: &str = "cn=admin,dc=example,dc=com";
pub const ADMIN_PASSWORD: &str = "secret";

/// Storage backend over a flat DN-keyed map. Scope handling is suffix-based
/// and filters support "(objectClass=*)" plus single equality assertions,
/// which is all the server-layer tests need.
pub struct TestBackend {
    entries: Mutex<BTreeMap<String, Entry>>,
    /// Controls seen by the most recent operation
    pub last_controls: Mutex<Vec<Control>>,
    /// Number of bind operations that reached this backend
    pub bind_calls: AtomicUsize,
    /// DN whose add is forced to fail, for atomicity tests
    pub fail_add_dn: Mutex<Option<String>>,
    /// When set, every add returns this code without touching state
    pub add_result_override: Mutex<Option<ResultCode>>,
    /// Scripted extended-operation outcome
    pub extended_outcome: Mutex<(ResultCode, Option<String>, Option<Bytes>)>,
}

impl TestBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(BTreeMap::new()),
            last_controls: Mutex::new(Vec::new()),
            bind_calls: AtomicUsize::new(0),
            fail_add_dn: Mutex::new(None),
            add_result_override: Mutex::new(None),
            extended_outcome: Mutex::new((ResultCode::Success, None, None)),
        })
    }

    pub fn bind_call_count(&self) -> usize {
        self.bind_calls.load(Ordering::SeqCst)
    }

    pub fn saw_control(&self, oid: &str) -> bool {
        self.last_controls.lock().iter().any(|c| c.oid == oid)
    }

    fn key(dn: &str) -> String {
        dn.to_lowercase()
    }

    fn matches_filter(entry: &Entry, filter: &str) -> bool {
        if filter == "(objectClass=*)" {
            return true;
        }
        filter
            .strip_prefix('(')
            .and_then(|f| f.strip_suffix(')'))
            .and_then(|f| f.split_once('='))
            .is_some_and(|(name, value)| entry.has_attribute_value(name, value))
    }

    fn in_scope(dn: &str, base_dn: &str, scope: memdir::SearchScope) -> bool {
        let dn = dn.to_lowercase();
        let base = base_dn.to_lowercase();
        match scope {
            memdir::SearchScope::Base => dn == base,
            memdir::SearchScope::OneLevel => dn
                .strip_suffix(&base)
                .and_then(|p| p.strip_suffix(','))
                .is_some_and(|rdn| !rdn.contains(',')),
            memdir::SearchScope::Subtree => {
                dn == base || dn.ends_with(&format!(",{base}"))
            }
        }
    }

    fn result(message_id: i32, body: ResponseBody) -> ResponseMessage {
        ResponseMessage::new(message_id, body)
    }
}

impl OperationHandler for TestBackend {
    fn process(
        &self,
        message_id: i32,
        request: &RequestOp,
        controls: &[Control],
    ) -> ResponseMessage {
        *self.last_controls.lock() = controls.to_vec();

        match request {
            RequestOp::Add { dn, attributes } => {
                if let Some(code) = *self.add_result_override.lock() {
                    return Self::result(message_id, ResponseBody::Add(OpResult::of(code)));
                }
                if self.fail_add_dn.lock().as_deref() == Some(dn.as_str()) {
                    return Self::result(
                        message_id,
                        ResponseBody::Add(OpResult::with_message(
                            ResultCode::UnwillingToPerform,
                            "add rejected by test configuration",
                        )),
                    );
                }
                let mut entries = self.entries.lock();
                let code = if entries.contains_key(&Self::key(dn)) {
                    ResultCode::EntryAlreadyExists
                } else {
                    entries.insert(
                        Self::key(dn),
                        Entry::with_attributes(dn.clone(), attributes.clone()),
                    );
                    ResultCode::Success
                };
                Self::result(
                    message_id,
                    ResponseBody::Add(OpResult::of(code)),
                )
            }

            RequestOp::Delete { dn } => {
                let code = if self.entries.lock().remove(&Self::key(dn)).is_some() {
                    ResultCode::Success
                } else {
                    ResultCode::NoSuchObject
                };
                Self::result(
                    message_id,
                    ResponseBody::Delete(OpResult::of(code)),
                )
            }

            RequestOp::Modify { dn, modifications } => {
                let mut entries = self.entries.lock();
                let code = match entries.get_mut(&Self::key(dn)) {
                    None => ResultCode::NoSuchObject,
                    Some(entry) => {
                        for m in modifications {
                            match m.kind {
                                ModificationType::Replace => {
                                    entry.attributes.retain(|a| {
                                        !a.name.eq_ignore_ascii_case(&m.attribute)
                                    });
                                    entry.attributes.push(Attribute {
                                        name: m.attribute.clone(),
                                        values: m.values.clone(),
                                    });
                                }
                                ModificationType::Add => {
                                    for value in &m.values {
                                        entry.add_attribute_value(&m.attribute, value.clone());
                                    }
                                }
                                ModificationType::Delete => {
                                    entry.attributes.retain(|a| {
                                        !a.name.eq_ignore_ascii_case(&m.attribute)
                                    });
                                }
                            }
                        }
                        ResultCode::Success
                    }
                };
                Self::result(
                    message_id,
                    ResponseBody::Modify(OpResult::of(code)),
                )
            }

            RequestOp::ModifyDn {
                dn,
                new_rdn,
                new_superior,
                ..
            } => {
                let mut entries = self.entries.lock();
                let code = match entries.remove(&Self::key(dn)) {
                    None => ResultCode::NoSuchObject,
                    Some(mut entry) => {
                        let parent = new_superior.clone().unwrap_or_else(|| {
                            dn.split_once(',').map(|(_, p)| p.to_string()).unwrap_or_default()
                        });
                        let new_dn = if parent.is_empty() {
                            new_rdn.clone()
                        } else {
                            format!("{new_rdn},{parent}")
                        };
                        entry.dn = new_dn.clone();
                        entries.insert(Self::key(&new_dn), entry);
                        ResultCode::Success
                    }
                };
                Self::result(
                    message_id,
                    ResponseBody::ModifyDn(OpResult::of(code)),
                )
            }

            RequestOp::Compare {
                dn,
                attribute,
                assertion_value,
            } => {
                let entries = self.entries.lock();
                let code = match entries.get(&Self::key(dn)) {
                    None => ResultCode::NoSuchObject,
                    Some(entry) => {
                        if entry.has_attribute_value(attribute, assertion_value) {
                            ResultCode::CompareTrue
                        } else {
                            ResultCode::CompareFalse
                        }
                    }
                };
                Self::result(
                    message_id,
                    ResponseBody::Compare(OpResult::of(code)),
                )
            }

            RequestOp::Bind {
                dn,
                password,
                sasl_mechanism,
                sasl_credentials,
            } => {
                self.bind_calls.fetch_add(1, Ordering::SeqCst);
                let ok = match sasl_mechanism.as_deref() {
                    None => {
                        dn.eq_ignore_ascii_case(ADMIN_DN)
                            && password.as_deref() == Some(ADMIN_PASSWORD.as_bytes())
                    }
                    Some("PLAIN") => sasl_credentials.as_deref().is_some_and(|creds| {
                        let mut parts = creds.split(|b| *b == 0);
                        let _authz = parts.next();
                        let authn = parts.next().unwrap_or_default();
                        let pw = parts.next().unwrap_or_default();
                        authn == b"admin" && pw == ADMIN_PASSWORD.as_bytes()
                    }),
                    Some(_) => false,
                };
                let code = if ok {
                    ResultCode::Success
                } else {
                    ResultCode::InvalidCredentials
                };
                Self::result(
                    message_id,
                    ResponseBody::Bind(OpResult::of(code)),
                )
            }

            RequestOp::Search {
                base_dn,
                scope,
                filter,
                size_limit,
                ..
            } => {
                let entries = self.entries.lock();
                let base_exists = entries.contains_key(&Self::key(base_dn))
                    || entries
                        .keys()
                        .any(|k| k.ends_with(&format!(",{}", Self::key(base_dn))));
                if !base_exists {
                    return Self::result(
                        message_id,
                        ResponseBody::Search {
                            entries: Vec::new(),
                            references: Vec::new(),
                            result: OpResult::of(ResultCode::NoSuchObject),
                        },
                    );
                }

                let mut found: Vec<SearchEntry> = entries
                    .values()
                    .filter(|e| Self::in_scope(&e.dn, base_dn, *scope))
                    .filter(|e| Self::matches_filter(e, filter))
                    .cloned()
                    .map(SearchEntry::new)
                    .collect();
                if *size_limit > 0 {
                    found.truncate(*size_limit as usize);
                }
                Self::result(
                    message_id,
                    ResponseBody::Search {
                        entries: found,
                        references: Vec::new(),
                        result: OpResult::of(ResultCode::Success),
                    },
                )
            }

            RequestOp::Extended { oid, .. } => {
                let (code, response_oid, response_value) = self.extended_outcome.lock().clone();
                let echoed = response_oid.or_else(|| {
                    (code == ResultCode::Success).then(|| oid.clone())
                });
                Self::result(
                    message_id,
                    ResponseBody::Extended {
                        result: OpResult::of(code),
                        response_oid: echoed,
                        response_value,
                    },
                )
            }
        }
    }
}

impl DirectoryBackend for TestBackend {
    fn entry_exists(&self, dn: &str) -> memdir::Result<bool> {
        Ok(self.entries.lock().contains_key(&Self::key(dn)))
    }

    fn entry_exists_matching(&self, dn: &str, filter: &str) -> memdir::Result<bool> {
        Ok(self
            .entries
            .lock()
            .get(&Self::key(dn))
            .is_some_and(|e| Self::matches_filter(e, filter)))
    }

    fn get_entry(&self, dn: &str) -> memdir::Result<Option<Entry>> {
        Ok(self.entries.lock().get(&Self::key(dn)).cloned())
    }

    fn count_entries(&self, _include_changelog: bool) -> memdir::Result<usize> {
        Ok(self.entries.lock().len())
    }

    fn count_entries_below(&self, base_dn: &str) -> memdir::Result<usize> {
        Ok(self
            .entries
            .lock()
            .values()
            .filter(|e| Self::in_scope(&e.dn, base_dn, memdir::SearchScope::Subtree))
            .count())
    }

    fn clear(&self) -> memdir::Result<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn delete_subtree(&self, base_dn: &str) -> memdir::Result<usize> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !Self::in_scope(&e.dn, base_dn, memdir::SearchScope::Subtree));
        Ok(before - entries.len())
    }

    fn export_entries(
        &self,
        _exclude_generated: bool,
        _exclude_changelog: bool,
    ) -> memdir::Result<Vec<Entry>> {
        Ok(self.entries.lock().values().cloned().collect())
    }

    fn create_snapshot(&self) -> Snapshot {
        Snapshot::new(self.entries.lock().clone())
    }

    fn restore_snapshot(&self, snapshot: &Snapshot) {
        if let Some(state) = snapshot.downcast_ref::<BTreeMap<String, Entry>>() {
            *self.entries.lock() = state.clone();
        }
    }
}

/// Line-oriented codec for networked round trips. One request per line:
/// `SEARCH <base-dn>` or `DELETE <dn>`; responses are the numeric result
/// code on one line.
pub struct LineCodec;

impl WireCodec for LineCodec {
    fn read_request(
        &self,
        reader: &mut dyn BufRead,
    ) -> memdir::Result<Option<(i32, RequestOp, Vec<Control>)>> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let op = match verb {
            "SEARCH" => RequestOp::Search {
                base_dn: rest.to_string(),
                scope: memdir::SearchScope::Base,
                filter: "(objectClass=*)".to_string(),
                attributes: Vec::new(),
                size_limit: 0,
                time_limit: 0,
                types_only: false,
            },
            "DELETE" => RequestOp::Delete {
                dn: rest.to_string(),
            },
            other => RequestOp::Extended {
                oid: other.to_string(),
                value: None,
            },
        };
        Ok(Some((1, op, Vec::new())))
    }

    fn write_response(
        &self,
        writer: &mut dyn Write,
        response: &ResponseMessage,
    ) -> memdir::Result<()> {
        writeln!(writer, "{}", response.op_result().code.int_value())?;
        writer.flush()?;
        Ok(())
    }
}

/// Install a tracing subscriber honoring RUST_LOG, once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a server with one plain ephemeral listener per given name
pub fn server_with_listeners(names: &[&str]) -> (DirectoryServer, Arc<TestBackend>) {
    init_tracing();
    let backend = TestBackend::new();
    let mut builder = DirectoryConfig::builder().codec(Arc::new(LineCodec));
    for name in names {
        builder = builder.listener(ListenerDefinition::new(*name));
    }
    let server = DirectoryServer::new(builder.build(), backend.clone()).unwrap();
    (server, backend)
}

/// An entry with objectClass plus one extra attribute
pub fn person_entry(dn: &str, cn: &str) -> Entry {
    Entry::with_attributes(
        dn,
        vec![
            Attribute::new("objectClass", "person"),
            Attribute::new("cn", cn),
        ],
    )
}
