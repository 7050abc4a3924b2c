use std::ffi::c_int;

use num_enum::{TryFromPrimitive, TryFromPrimitiveError};

use crate::ffi;

/// Result type used throughout this crate.
pub type Result<T, E = FtdiError> = std::result::Result<T, E>;

/// Represents an error raised by this crate or reported by libftdi.
///
/// Native calls report failure through a negative status code. Such failures become
/// [`FtdiError::Status`], carrying the code and the description libftdi stored in the
/// context at the time of the failure:
///
/// ```
/// use ftdi_context::FtdiError;
///
/// let err = FtdiError::Status { code: -3, message: "device not found".into() };
/// assert_eq!(err.code(), Some(-3));
/// assert_eq!(err.to_string(), "-3: device not found");
/// ```
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FtdiError {
    /// libftdi could not allocate a context.
    #[error("cannot initialize libftdi context")]
    Initialization,
    /// A native call returned a negative status code.
    #[error("{code}: {message}")]
    Status {
        /// The negative status code.
        code: i32,
        /// libftdi's description of the failure.
        message: String,
    },
    /// An argument was rejected before any native call was made.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The context has been disposed.
    #[error("context has been disposed")]
    Disposed,
    /// The native library could not be loaded.
    #[error("cannot load libftdi: {0}")]
    Library(String),
    /// The loaded library does not export an optional entry point.
    #[error("{0} is not supported by the loaded libftdi")]
    Unsupported(&'static str),
    /// A field of the native context holds a value this crate does not know.
    #[error("unknown {field} value {value} in libftdi context")]
    UnknownValue {
        /// Name of the context field.
        field: &'static str,
        /// Raw value found in the field.
        value: i32,
    },
}

impl FtdiError {
    /// Get the native status code, if the error carries one.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            FtdiError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        FtdiError::InvalidArgument(message.into())
    }
}

impl<T: TryFromPrimitive> From<TryFromPrimitiveError<T>> for FtdiError {
    fn from(value: TryFromPrimitiveError<T>) -> Self {
        FtdiError::InvalidArgument(value.to_string())
    }
}

impl From<FtdiError> for std::io::Error {
    fn from(value: FtdiError) -> Self {
        let kind = match value {
            FtdiError::InvalidArgument(_) => std::io::ErrorKind::InvalidInput,
            FtdiError::Disposed => std::io::ErrorKind::NotConnected,
            FtdiError::Unsupported(_) => std::io::ErrorKind::Unsupported,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, value)
    }
}

/// Read the `error_str` field of a native context.
///
/// # Safety
///
/// `context` must point to a live `ftdi_context`.
pub(crate) unsafe fn native_error_string(context: *const ffi::ftdi_context) -> String {
    // SAFETY: libftdi only ever stores static, null-terminated strings here
    unsafe { ffi::owned_string((*context).error_str) }
}

/// Map a status code to `Ok(code)` or `Err(FtdiError::Status)`.
///
/// Negative values denote failure for every libftdi entry point; non-negative values are
/// successes and, for transfers, byte counts. The message is read from the context the
/// failing call was made on.
macro_rules! try_ftdi {
    ($context:expr, $status:expr) => {
        match $status {
            code if code < 0 => Err(crate::error::FtdiError::Status {
                code,
                message: unsafe { crate::error::native_error_string($context) },
            }),
            code => Ok::<std::ffi::c_int, crate::error::FtdiError>(code),
        }
    };
}

pub(crate) use try_ftdi;

/// Convert a buffer length to the `int` libftdi takes for transfer sizes.
pub(crate) fn transfer_len(len: usize) -> Result<c_int> {
    c_int::try_from(len)
        .map_err(|_| FtdiError::invalid_argument(format!("transfer of {len} bytes is too large")))
}
