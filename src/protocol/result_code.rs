//! Protocol result codes (RFC 4511 Appendix A subset)

/// Result codes carried in operation responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    Success = 0,
    OperationsError = 1,
    ProtocolError = 2,
    TimeLimitExceeded = 3,
    SizeLimitExceeded = 4,
    CompareFalse = 5,
    CompareTrue = 6,
    AuthMethodNotSupported = 7,
    StrongAuthRequired = 8,
    Referral = 10,
    NoSuchAttribute = 16,
    UndefinedAttributeType = 17,
    ConstraintViolation = 19,
    AttributeOrValueExists = 20,
    NoSuchObject = 32,
    InvalidDnSyntax = 34,
    InvalidCredentials = 49,
    InsufficientAccessRights = 50,
    Busy = 51,
    Unavailable = 52,
    UnwillingToPerform = 53,
    EntryAlreadyExists = 68,
    Other = 80,
    // Client-side codes used for local failures (same numbering as the
    // UnboundID SDK, since callers branch on them).
    ServerDown = 81,
    LocalError = 82,
    EncodingError = 83,
    DecodingError = 84,
    Timeout = 85,
    ParamError = 89,
    NoMemory = 90,
    ConnectError = 91,
    NoOperation = 16654,
}

impl ResultCode {
    /// Numeric wire value of this result code.
    pub fn int_value(self) -> i32 {
        self as i32
    }

    /// Whether this code indicates overall success for a non-search,
    /// non-compare write operation.
    pub fn is_write_success(self) -> bool {
        matches!(self, ResultCode::Success | ResultCode::NoOperation)
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.int_value())
    }
}

/// The default set of "operational failure" codes for which an extended
/// operation with no response OID and no response value raises an error.
/// Anything outside this set is returned to the caller for interpretation.
pub const DEFAULT_EXTENDED_FAILURE_CODES: &[ResultCode] = &[
    ResultCode::OperationsError,
    ResultCode::ProtocolError,
    ResultCode::Busy,
    ResultCode::Unavailable,
    ResultCode::Other,
    ResultCode::ServerDown,
    ResultCode::LocalError,
    ResultCode::EncodingError,
    ResultCode::DecodingError,
    ResultCode::Timeout,
    ResultCode::NoMemory,
    ResultCode::ConnectError,
];
