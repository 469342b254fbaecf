//! Request and response controls

use bytes::Bytes;

/// OID of the marker control appended to every locally dispatched request,
/// flagging it as an in-process invocation rather than network traffic.
/// Carried through to the handler; never interpreted by this layer.
pub const OID_INTERNAL_OPERATION_REQUEST_CONTROL: &str = "1.3.6.1.4.1.30221.2.5.18";

/// A protocol control attached to a request or response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    /// Control type OID
    pub oid: String,

    /// Whether the control is critical to the operation
    pub critical: bool,

    /// Optional encoded control value
    pub value: Option<Bytes>,
}

impl Control {
    /// Create a control with no value
    pub fn new(oid: impl Into<String>, critical: bool) -> Self {
        Self {
            oid: oid.into(),
            critical,
            value: None,
        }
    }

    /// Create a control with an encoded value
    pub fn with_value(oid: impl Into<String>, critical: bool, value: Bytes) -> Self {
        Self {
            oid: oid.into(),
            critical,
            value: Some(value),
        }
    }

    /// The non-critical marker control identifying a local invocation
    pub fn internal_operation_marker() -> Self {
        Self::new(OID_INTERNAL_OPERATION_REQUEST_CONTROL, false)
    }
}

/// Clone the caller's controls and append the local-invocation marker.
pub(crate) fn with_internal_marker(controls: &[Control]) -> Vec<Control> {
    let mut list = Vec::with_capacity(controls.len() + 1);
    list.extend_from_slice(controls);
    list.push(Control::internal_operation_marker());
    list
}
