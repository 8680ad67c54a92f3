//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! However, most APIs can fail in more than one way and so return the higher
//! level [`Error`] enum. The concrete error types are convertible to [`Error`],
//! allowing them to be used with `?`, and can be recovered from it with
//! [`TryFrom`]:
//!
//! ```
//! use nanoctl::error::{DataUnavailableError, Error};
//!
//! fn foo() -> Result<(), DataUnavailableError> {
//!     // ...
//! # unimplemented!();
//! }
//!
//! fn bar() -> Result<(), Error> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! ```
//!
//! Errors caused by a call into a controller record the [`Call`] (operation
//! name and arguments) so that failures can be diagnosed from the message
//! alone.

use std::fmt;
use std::time::Duration;

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
    (
        $name:path,
        $self:ident =>
        $display:literal
        $(,
            $($arg:expr),+
        )?
    ) => {
        impl std::error::Error for $name {}

        impl std::fmt::Display for $name {
            fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    $display
                    $(,
                        $($arg),+
                    )?
                )
            }
        }
    };
}

/// Define error enums that contain concrete error types (not other error enums).
///
/// From and TryFrom traits will be implemented for the enum and its underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
macro_rules! error_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_attr:meta])*
                $variant:ident($inner:path)
            ),+
            $(,)?
        }
    ) => {
        $(
            #[$attr]
        )*
        pub enum $name {
            $(
                $(#[$variant_attr])*
                $variant($inner)
            ),+
        }

        impl std::error::Error for $name {}

        // Defer the display to the inner error type
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$variant(e) => e.fmt(f)
                    ),+
                }
            }
        }

        impl From<std::convert::Infallible> for $name {
            fn from(_: std::convert::Infallible) -> Self {
                unreachable!();
            }
        }

        $(
            impl From<$inner> for $name {
                fn from(other: $inner) -> Self {
                    $name::$variant(other)
                }
            }

            impl TryFrom<$name> for $inner {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $name::$variant(value) => Ok(value),
                        value => Err(value)
                    }
                }
            }
        )+
    };
}

/// Implement the accessors shared by all errors wrapping a [`Failure`].
macro_rules! impl_failure_error {
    ($name:ident) => {
        impl $name {
            /// Create a new error.
            pub(crate) fn new(failure: Failure) -> Self {
                $name(failure)
            }

            /// Get the raw return code reported by the controller.
            pub fn code(&self) -> i32 {
                self.0.code
            }

            /// Get the name of the return code.
            ///
            /// The contents of the returned string may change.
            pub fn name(&self) -> &'static str {
                self.0.name
            }

            /// Get the call that failed.
            pub fn call(&self) -> &Call {
                &self.0.call
            }
        }

        impl AsRef<Call> for $name {
            fn as_ref(&self) -> &Call {
                &self.0.call
            }
        }
    };
}

mod code;
pub use code::*;

/// A raw, non-zero return code reported by a controller.
///
/// Backends return this as the error of every fallible call. It carries no
/// meaning on its own until the session translates it with the appropriate
/// lookup table ([`controller_code`] or [`positioner_code`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReturnCode(pub i32);

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "return code {}", self.0)
    }
}

/// The class of failure a return code belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Transport, timeout or server reachability problems.
    Communication,
    /// An invalid parameter, thread context or profile.
    Configuration,
    /// A file, boot image or executable could not be found or opened.
    Resource,
}

/// A record of a call into a controller: the operation name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    operation: &'static str,
    arguments: Box<str>,
}

impl Call {
    /// Record a call to `operation` with pre-formatted `arguments`.
    pub(crate) fn new(operation: &'static str, arguments: impl Into<Box<str>>) -> Self {
        Call {
            operation,
            arguments: arguments.into(),
        }
    }

    /// The name of the operation.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// The formatted arguments the operation was called with.
    pub fn arguments(&self) -> &str {
        &self.arguments
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operation, self.arguments)
    }
}

/// A failed call and its translated return code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Failure {
    call: Call,
    code: i32,
    name: &'static str,
    message: &'static str,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "call to {} returned [{}] {}",
            self.call, self.code, self.message
        )
    }
}

/// A call failed due to a transport, timeout or server reachability problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunicationError(Failure);

impl_error_display! {
    CommunicationError,
    self => "communication error: {}", self.0
}
impl_failure_error! { CommunicationError }

/// A call was rejected because of an invalid parameter, thread context or profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError(Failure);

impl_error_display! {
    ConfigurationError,
    self => "configuration error: {}", self.0
}
impl_failure_error! { ConfigurationError }

/// A call failed because a file, boot image or executable was unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceError(Failure);

impl_error_display! {
    ResourceError,
    self => "resource error: {}", self.0
}
impl_failure_error! { ResourceError }

/// An acquisition returned no data (a size less than or equal to zero).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUnavailableError {
    call: Call,
    size: i32,
}

impl DataUnavailableError {
    pub(crate) fn new(call: Call, size: i32) -> Self {
        DataUnavailableError { call, size }
    }

    /// The size reported by the controller.
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Get the call that returned no data.
    pub fn call(&self) -> &Call {
        &self.call
    }
}

impl_error_display! {
    DataUnavailableError,
    self => "no data available from {}: reported size {}", self.call, self.size
}

/// A polling loop did not observe the expected state within its time bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTimeoutError {
    operation: Box<str>,
    timeout: Duration,
    attempts: u32,
}

impl OperationTimeoutError {
    pub(crate) fn new(operation: impl Into<Box<str>>, timeout: Duration, attempts: u32) -> Self {
        OperationTimeoutError {
            operation: operation.into(),
            timeout,
            attempts,
        }
    }

    /// A description of the operation that timed out.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The time bound that was exceeded.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// How many polling attempts were made before giving up.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl_error_display! {
    OperationTimeoutError,
    self => "{} did not complete within {:?} ({} attempts)", self.operation, self.timeout, self.attempts
}

/// A positioner axis reached the end of travel or its sensor reported an error
/// during a closed-loop move.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionFaultError {
    axis: u32,
    reason: &'static str,
    position: f64,
}

impl MotionFaultError {
    pub(crate) fn new(axis: u32, reason: &'static str, position: f64) -> Self {
        MotionFaultError {
            axis,
            reason,
            position,
        }
    }

    /// The axis that faulted.
    pub fn axis(&self) -> u32 {
        self.axis
    }

    /// A short description of the fault.
    pub fn reason(&self) -> &'static str {
        self.reason
    }

    /// The position of the axis when the fault was detected.
    pub fn position(&self) -> f64 {
        self.position
    }
}

impl_error_display! {
    MotionFaultError,
    self => "axis {} stopped at {}: {}", self.axis, self.position, self.reason
}

error_enum! {
    /// Any error returned by this library.
    #[derive(Debug, Clone, PartialEq)]
    #[non_exhaustive]
    pub enum Error {
        /// See [`CommunicationError`].
        Communication(CommunicationError),
        /// See [`ConfigurationError`].
        Configuration(ConfigurationError),
        /// See [`ResourceError`].
        Resource(ResourceError),
        /// See [`DataUnavailableError`].
        DataUnavailable(DataUnavailableError),
        /// See [`OperationTimeoutError`].
        OperationTimeout(OperationTimeoutError),
        /// See [`MotionFaultError`].
        MotionFault(MotionFaultError),
    }
}

impl Error {
    /// Translate a return code into an error using a lookup table.
    ///
    /// Codes missing from the table are treated as communication errors.
    pub(crate) fn from_code(call: Call, code: ReturnCode, table: fn(i32) -> Option<Entry>) -> Self {
        let entry = table(code.0).unwrap_or(Entry::UNRECOGNIZED);
        let failure = Failure {
            call,
            code: code.0,
            name: entry.name,
            message: entry.message,
        };
        match entry.class {
            ErrorClass::Communication => Error::Communication(CommunicationError::new(failure)),
            ErrorClass::Configuration => Error::Configuration(ConfigurationError::new(failure)),
            ErrorClass::Resource => Error::Resource(ResourceError::new(failure)),
        }
    }

    /// A convenience function for determining if the error is due to a
    /// timeout, either of a single call or of a polling loop.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::OperationTimeout(_) => true,
            Error::Communication(e) => e.0.name.ends_with("Timeout"),
            _ => false,
        }
    }

    /// Get the call that failed, if the error was caused by a single call.
    pub fn call(&self) -> Option<&Call> {
        match self {
            Error::Communication(e) => Some(e.call()),
            Error::Configuration(e) => Some(e.call()),
            Error::Resource(e) => Some(e.call()),
            Error::DataUnavailable(e) => Some(e.call()),
            Error::OperationTimeout(_) | Error::MotionFault(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use static_assertions::{assert_impl_all, const_assert};

    // Keep Result<T, Error> reasonably small.
    const _WORD_SIZE: usize = std::mem::size_of::<&usize>();
    const_assert!(std::mem::size_of::<Error>() <= 12 * _WORD_SIZE);

    assert_impl_all!(Error: Send, Sync, std::error::Error, From<CommunicationError>);
    assert_impl_all!(DataUnavailableError: TryFrom<Error>);
    assert_impl_all!(OperationTimeoutError: TryFrom<Error>);

    #[test]
    fn controller_codes_map_to_classes() {
        let call = || Call::new("set_parameter_async", "address=0x0100, index=0, value=1");

        let err = Error::from_code(call(), ReturnCode(2), controller_code::lookup);
        assert!(matches!(err, Error::Communication(_)));
        assert!(err.is_timeout());

        let err = Error::from_code(call(), ReturnCode(9), controller_code::lookup);
        assert!(matches!(err, Error::Configuration(_)));
        assert!(!err.is_timeout());

        let err = Error::from_code(call(), ReturnCode(6), controller_code::lookup);
        assert!(matches!(err, Error::Resource(_)));

        let err = Error::from_code(call(), ReturnCode(12), controller_code::lookup);
        assert!(matches!(err, Error::Resource(_)));
    }

    #[test]
    fn unrecognized_codes_are_communication_errors() {
        let err = Error::from_code(Call::new("stop", ""), ReturnCode(3), controller_code::lookup);
        let err = CommunicationError::try_from(err).unwrap();
        assert_eq!(err.code(), 3);
        assert_eq!(err.name(), Entry::UNRECOGNIZED.name);
    }

    #[test]
    fn errors_carry_the_failing_call() {
        let err = Error::from_code(
            Call::new("get_parameter_sync", "address=0x0101, index=0"),
            ReturnCode(8),
            controller_code::lookup,
        );
        let call = err.call().unwrap();
        assert_eq!(call.operation(), "get_parameter_sync");
        assert_eq!(call.arguments(), "address=0x0101, index=0");
        let message = err.to_string();
        assert!(message.contains("get_parameter_sync(address=0x0101, index=0)"), "{message}");
        assert!(message.contains("No contact to the server"), "{message}");
    }

    #[test]
    fn positioner_codes_map_to_classes() {
        let call = || Call::new("connect", "device=0");
        let err = Error::from_code(call(), ReturnCode(-1), positioner_code::lookup);
        assert!(matches!(err, Error::Communication(_)));
        let err = Error::from_code(call(), ReturnCode(7), positioner_code::lookup);
        assert!(matches!(err, Error::Resource(_)));
        let err = Error::from_code(call(), ReturnCode(10), positioner_code::lookup);
        assert!(matches!(err, Error::Configuration(_)));
        let err = Error::from_code(call(), ReturnCode(1), positioner_code::lookup);
        assert!(err.is_timeout());
    }

    #[test]
    fn timeout_errors_describe_the_loop() {
        let err: Error = OperationTimeoutError::new(
            "scan command 1 until 0x04",
            Duration::from_millis(250),
            3,
        )
        .into();
        assert!(err.is_timeout());
        assert!(err.call().is_none());
        let err = OperationTimeoutError::try_from(err).unwrap();
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.timeout(), Duration::from_millis(250));
    }
}
