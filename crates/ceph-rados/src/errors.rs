//! Error classification for native status codes.
//!
//! Every fallible librados/librbd call reports failure as a negative errno
//! value. [`ErrorCode`] is the pure classifier over those codes; [`RadosError`]
//! is the typed error the rest of the crate raises. A closed set of codes maps
//! to dedicated variants, everything else lands in [`RadosError::Other`].

use thiserror::Error;

/// Result type for all binding operations.
pub type Result<T> = std::result::Result<T, RadosError>;

macro_rules! errno_table {
    ($($name:ident = $code:literal => $desc:literal,)*) => {
        /// Symbolic names for the errno values the native libraries return.
        ///
        /// The table is a pure mapping: no state, no I/O, same code in, same
        /// classification out. Codes outside the table classify as `None`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(clippy::upper_case_acronyms)]
        pub enum ErrorCode {
            $($name,)*
        }

        impl ErrorCode {
            /// Look up the code for a negative native return value.
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)*
                    _ => None,
                }
            }

            /// The errno mnemonic, e.g. `"EPERM"`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)*
                }
            }

            /// The human-readable strerror text.
            pub const fn description(self) -> &'static str {
                match self {
                    $(Self::$name => $desc,)*
                }
            }

            /// The negative native value this mnemonic stands for.
            pub const fn code(self) -> i32 {
                match self {
                    $(Self::$name => $code,)*
                }
            }
        }
    };
}

errno_table! {
    EPERM = -1 => "Operation not permitted",
    ENOENT = -2 => "No such file or directory",
    ESRCH = -3 => "No such process",
    EINTR = -4 => "Interrupted system call",
    EIO = -5 => "Input/output error",
    ENXIO = -6 => "No such device or address",
    E2BIG = -7 => "Argument list too long",
    EBADF = -9 => "Bad file descriptor",
    EAGAIN = -11 => "Resource temporarily unavailable",
    ENOMEM = -12 => "Cannot allocate memory",
    EACCES = -13 => "Permission denied",
    EFAULT = -14 => "Bad address",
    EBUSY = -16 => "Device or resource busy",
    EEXIST = -17 => "File exists",
    EXDEV = -18 => "Invalid cross-device link",
    ENODEV = -19 => "No such device",
    ENOTDIR = -20 => "Not a directory",
    EISDIR = -21 => "Is a directory",
    EINVAL = -22 => "Invalid argument",
    ENFILE = -23 => "Too many open files in system",
    EMFILE = -24 => "Too many open files",
    EFBIG = -27 => "File too large",
    ENOSPC = -28 => "No space left on device",
    ESPIPE = -29 => "Illegal seek",
    EROFS = -30 => "Read-only file system",
    EMLINK = -31 => "Too many links",
    EPIPE = -32 => "Broken pipe",
    EDOM = -33 => "Numerical argument out of domain",
    ERANGE = -34 => "Numerical result out of range",
    EDEADLK = -35 => "Resource deadlock avoided",
    ENAMETOOLONG = -36 => "File name too long",
    ENOLCK = -37 => "No locks available",
    ENOSYS = -38 => "Function not implemented",
    ENOTEMPTY = -39 => "Directory not empty",
    ELOOP = -40 => "Too many levels of symbolic links",
    ENOMSG = -42 => "No message of desired type",
    EIDRM = -43 => "Identifier removed",
    ENODATA = -61 => "No data available",
    ETIME = -62 => "Timer expired",
    EOVERFLOW = -75 => "Value too large for defined data type",
    EMSGSIZE = -90 => "Message too long",
    EPROTONOSUPPORT = -93 => "Protocol not supported",
    EOPNOTSUPP = -95 => "Operation not supported",
    EADDRINUSE = -98 => "Address already in use",
    EADDRNOTAVAIL = -99 => "Cannot assign requested address",
    ENETDOWN = -100 => "Network is down",
    ENETUNREACH = -101 => "Network is unreachable",
    ECONNABORTED = -103 => "Software caused connection abort",
    ECONNRESET = -104 => "Connection reset by peer",
    ENOBUFS = -105 => "No buffer space available",
    EISCONN = -106 => "Transport endpoint is already connected",
    ENOTCONN = -107 => "Transport endpoint is not connected",
    ESHUTDOWN = -108 => "Cannot send after transport endpoint shutdown",
    ETIMEDOUT = -110 => "Connection timed out",
    ECONNREFUSED = -111 => "Connection refused",
    EHOSTDOWN = -112 => "Host is down",
    EHOSTUNREACH = -113 => "No route to host",
    EALREADY = -114 => "Operation already in progress",
    EINPROGRESS = -115 => "Operation now in progress",
    ESTALE = -116 => "Stale file handle",
    EDQUOT = -122 => "Disk quota exceeded",
    ECANCELED = -125 => "Operation canceled",
    ENOTRECOVERABLE = -131 => "State not recoverable",
}

/// The errno mnemonic for a native return value, or `"UNKNOWN_ERROR"` for
/// codes outside the table.
pub fn error_name(code: i32) -> &'static str {
    ErrorCode::from_code(code).map_or("UNKNOWN_ERROR", ErrorCode::name)
}

/// The strerror text for a native return value. Unknown codes yield a
/// best-effort message naming the numeric value rather than failing.
pub fn error_message(code: i32) -> String {
    match ErrorCode::from_code(code) {
        Some(ec) => ec.description().to_owned(),
        None => format!("Unknown error code: {code}"),
    }
}

/// A failed native call: the operation context plus the raw status code.
///
/// Kept structured so callers and tests can inspect the code; the symbolic
/// name and strerror text are rendered only at the `Display` boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStatus {
    /// What the binding was doing, e.g. `"failed to create pool data"`.
    pub context: String,
    /// The negative value the native call returned.
    pub code: i32,
}

impl NativeStatus {
    pub(crate) fn new(context: String, code: i32) -> Self {
        Self { context, code }
    }
}

impl std::fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}; {}: {} ({})",
            self.context,
            error_name(self.code),
            error_message(self.code),
            self.code
        )
    }
}

/// Error type for all librados/librbd binding operations.
#[derive(Debug, Error)]
pub enum RadosError {
    // Local argument validation, raised before any native call.
    #[error("{name} must not be negative (got {value})")]
    NegativeArgument { name: &'static str, value: i64 },

    // Local state checks, raised before any native call.
    #[error("this operation requires a connected cluster handle")]
    Disconnected,

    #[error("this operation must be performed before connecting to the cluster")]
    Connected,

    /// The shared library could not be loaded or a symbol was missing.
    #[error("native library unavailable: {0}")]
    Unavailable(String),

    /// A write call reported success but consumed fewer bytes than given.
    #[error("short write: {written} of {expected} bytes were written")]
    ShortWrite { expected: usize, written: usize },

    // Classified native failures, one variant per code in the closed set.
    #[error("{0}")]
    Permission(NativeStatus),

    #[error("{0}")]
    NotFound(NativeStatus),

    #[error("{0}")]
    InvalidArgument(NativeStatus),

    #[error("{0}")]
    ReadOnly(NativeStatus),

    #[error("{0}")]
    OutOfDomain(NativeStatus),

    #[error("{0}")]
    AlreadyConnected(NativeStatus),

    #[error("{0}")]
    TimedOut(NativeStatus),

    #[error("{0}")]
    InProgress(NativeStatus),

    /// Any other negative native code.
    #[error("{0}")]
    Other(NativeStatus),

    /// A fault raised by the marshaling layer itself rather than by the
    /// native call, wrapped with the fault's type preserved in the text.
    #[error("unexpected fault: {type_name}: {message}")]
    Unexpected { type_name: String, message: String },
}

impl From<crate::sys::LoadError> for RadosError {
    fn from(e: crate::sys::LoadError) -> Self {
        Self::Unavailable(e.0)
    }
}

impl RadosError {
    /// Build the variant selected by the classifier for a negative code.
    pub(crate) fn from_status(context: String, code: i32) -> Self {
        let status = NativeStatus::new(context, code);
        match ErrorCode::from_code(code) {
            Some(ErrorCode::EPERM) => Self::Permission(status),
            Some(ErrorCode::ENOENT) => Self::NotFound(status),
            Some(ErrorCode::EINVAL) => Self::InvalidArgument(status),
            Some(ErrorCode::EROFS) => Self::ReadOnly(status),
            Some(ErrorCode::EDOM) => Self::OutOfDomain(status),
            Some(ErrorCode::EISCONN) => Self::AlreadyConnected(status),
            Some(ErrorCode::ETIMEDOUT) => Self::TimedOut(status),
            Some(ErrorCode::EINPROGRESS) => Self::InProgress(status),
            _ => Self::Other(status),
        }
    }

    /// The raw native status code, when this error came out of a native call.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Permission(s)
            | Self::NotFound(s)
            | Self::InvalidArgument(s)
            | Self::ReadOnly(s)
            | Self::OutOfDomain(s)
            | Self::AlreadyConnected(s)
            | Self::TimedOut(s)
            | Self::InProgress(s)
            | Self::Other(s) => Some(s.code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNKNOWN_ERROR_CODE: i32 = -250;

    #[test]
    fn known_code_has_name() {
        assert_eq!(error_name(-1), "EPERM");
    }

    #[test]
    fn unknown_code_has_fallback_name() {
        assert_eq!(error_name(UNKNOWN_ERROR_CODE), "UNKNOWN_ERROR");
    }

    #[test]
    fn known_code_has_message() {
        assert_eq!(error_message(-1), "Operation not permitted");
    }

    #[test]
    fn unknown_code_has_fallback_message() {
        assert_eq!(
            error_message(UNKNOWN_ERROR_CODE),
            "Unknown error code: -250"
        );
    }

    #[test]
    fn from_code_maps_known_values() {
        assert_eq!(ErrorCode::from_code(-1), Some(ErrorCode::EPERM));
        assert_eq!(ErrorCode::from_code(-131), Some(ErrorCode::ENOTRECOVERABLE));
    }

    #[test]
    fn from_code_rejects_unknown_values() {
        assert_eq!(ErrorCode::from_code(UNKNOWN_ERROR_CODE), None);
    }

    #[test]
    fn classification_is_stable() {
        for code in [-1, -2, -22, -30, -33, -106, -110, -115, -999] {
            assert_eq!(ErrorCode::from_code(code), ErrorCode::from_code(code));
        }
    }

    #[test]
    fn status_renders_name_message_and_code() {
        let status = NativeStatus::new("error message".into(), -131);
        assert_eq!(
            status.to_string(),
            "error message; ENOTRECOVERABLE: State not recoverable (-131)"
        );
    }

    #[test]
    fn error_exposes_native_code() {
        let err = RadosError::from_status("op".into(), -2);
        assert!(matches!(err, RadosError::NotFound(_)));
        assert_eq!(err.code(), Some(-2));

        assert_eq!(RadosError::Disconnected.code(), None);
    }
}
