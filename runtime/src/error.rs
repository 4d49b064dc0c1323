use std::fmt::Display;

use thiserror::Error;

/// The closed set of failure kinds a manager method can return.
///
/// Kept closed deliberately: the dispatcher serializes this kind (not a
/// free-form string) into the JSON-RPC error object, and clients are
/// expected to match on it rather than parse messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed parameters: zero size, end <= start, misaligned end, out-of-range index.
    Input,
    /// A lookup missed in a required map.
    Empty,
    /// An idempotent-create precondition was violated.
    Exists,
    /// A monetary parameter that must be non-negative was negative.
    ValueNegative,
    /// Spendable amount below the required amount.
    InsufficientBalance,
    /// Caller is not the required principal, or the target is banned/inactive.
    PermissionDenied,
    /// Operation requires a role the target does not hold.
    RoleType,
    /// Dispatcher or per-order nonce mismatch.
    NonceMismatch,
    /// Signature failed to recover the expected address.
    BadSignature,
    /// A registry entry was resolved as the wrong manager kind.
    MisType,
    /// An internal invariant would be violated by completing this call.
    Result,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Input => "Input",
            ErrorKind::Empty => "Empty",
            ErrorKind::Exists => "Exists",
            ErrorKind::ValueNegative => "ValueNegative",
            ErrorKind::InsufficientBalance => "InsufficientBalance",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::RoleType => "RoleType",
            ErrorKind::NonceMismatch => "NonceMismatch",
            ErrorKind::BadSignature => "BadSignature",
            ErrorKind::MisType => "MisType",
            ErrorKind::Result => "Result",
        };
        f.write_str(s)
    }
}

/// The error type returned by every manager method.
///
/// Grounded on the teacher's `ActorError` (exit_code + message): here the
/// closed `ErrorKind` takes the place of `ExitCode`, and there is no
/// associated binary payload since nothing in this engine crosses a VM
/// boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {msg}")]
pub struct ManagerError {
    kind: ErrorKind,
    msg: String,
}

impl ManagerError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, msg: msg.into() }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, msg)
    }
    pub fn empty(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Empty, msg)
    }
    pub fn exists(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Exists, msg)
    }
    pub fn value_negative(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueNegative, msg)
    }
    pub fn insufficient_balance(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientBalance, msg)
    }
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, msg)
    }
    pub fn role_type(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::RoleType, msg)
    }
    pub fn nonce_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NonceMismatch, msg)
    }
    pub fn bad_signature(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadSignature, msg)
    }
    pub fn mistype(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MisType, msg)
    }
    pub fn result(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Result, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    /// Prefix the error message with additional context, keeping the kind.
    pub fn wrap(mut self, msg: impl AsRef<str>) -> Self {
        self.msg = format!("{}: {}", msg.as_ref(), self.msg);
        self
    }
}

/// Convenience macro mirroring the teacher's `actor_error!`.
#[macro_export]
macro_rules! manager_error {
    ( $kind:ident; $msg:expr ) => { $crate::error::ManagerError::$kind($msg.to_string()) };
    ( $kind:ident; $msg:literal $(, $ex:expr)+ ) => {
        $crate::error::ManagerError::$kind(format!($msg, $($ex,)*))
    };
    ( $kind:ident, $msg:expr ) => { $crate::manager_error!($kind; $msg) };
    ( $kind:ident, $msg:literal $(, $ex:expr)+ ) => {
        $crate::manager_error!($kind; $msg $(, $ex)*)
    };
}

/// Adds context to a `ManagerError`'s descriptive message without changing its kind.
pub trait ManagerContext<T> {
    fn context<C>(self, context: C) -> Result<T, ManagerError>
    where
        C: Display;
}

impl<T> ManagerContext<T> for Result<T, ManagerError> {
    fn context<C>(self, context: C) -> Result<T, ManagerError>
    where
        C: Display,
    {
        self.map_err(|err| err.wrap(context.to_string()))
    }
}

/// Adapts a foreign `Result`/`Option` into a `ManagerError` of a chosen kind.
pub trait AsManagerError<T> {
    fn kind_err(self, kind: ErrorKind, context: impl Display) -> Result<T, ManagerError>;
}

impl<T, E: Display> AsManagerError<T> for Result<T, E> {
    fn kind_err(self, kind: ErrorKind, context: impl Display) -> Result<T, ManagerError> {
        self.map_err(|e| ManagerError::new(kind, format!("{}: {}", context, e)))
    }
}

impl<T> AsManagerError<T> for Option<T> {
    fn kind_err(self, kind: ErrorKind, context: impl Display) -> Result<T, ManagerError> {
        self.ok_or_else(|| ManagerError::new(kind, context.to_string()))
    }
}
