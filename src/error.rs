//! The main error enum for the project lives here, and documents the various
//! conditions that can arise while interacting with the system.

use std::path::PathBuf;
use thiserror::Error;

/// This is our error enum. Every failure a notary or security module can
/// surface is one of these kinds, each carrying enough context to point at
/// the component and operation that produced it.
#[derive(Error, Debug)]
pub enum Error {
    /// A catalog handed to an operation failed structural validation: wrong
    /// attributes, wrong parameters, or a value of the wrong kind.
    #[error("invalid parameter for {module}::{procedure}: {text}")]
    InvalidParameter {
        /// The component that rejected the value.
        module: &'static str,
        /// The operation that rejected the value.
        procedure: &'static str,
        /// What exactly was wrong with it.
        text: String,
    },

    /// A state machine refused the requested transition.
    #[error("invalid event for {module}::{procedure}: {event} is not allowed in the {state} state")]
    InvalidEvent {
        /// The component whose state machine refused.
        module: &'static str,
        /// The operation that raised the event.
        procedure: &'static str,
        /// The refused event.
        event: &'static str,
        /// The state the machine was in at the time.
        state: &'static str,
    },

    /// `activate_key()` received a notarized certificate whose component does
    /// not match the certificate waiting to be activated.
    #[error("the notarized certificate does not match the certificate awaiting activation")]
    InvalidCertificate,

    /// Verification or citation matching was requested for a protocol version
    /// that no registered security module implements.
    #[error("unsupported protocol version {actual} (expected one of: {expected})")]
    UnsupportedProtocol {
        /// The versions the registry does implement.
        expected: String,
        /// The version that was asked for.
        actual: String,
    },

    /// A configuration file could not be loaded, stored, or deleted.
    #[error("configuration storage failed for {}", path.display())]
    Storage {
        /// The file the operation was aimed at.
        path: PathBuf,
        /// The underlying filesystem error.
        #[source]
        cause: std::io::Error,
    },

    /// Catch-all wrapper for any underlying crypto or framework failure. The
    /// original error rides along as the source.
    #[error("unexpected failure in {module}::{procedure}")]
    Unexpected {
        /// The component the failure surfaced in.
        module: &'static str,
        /// The operation that was running.
        procedure: &'static str,
        /// The original failure.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl Error {
    /// Wrap an underlying failure as `Unexpected`, preserving it as the cause.
    pub(crate) fn unexpected<E>(module: &'static str, procedure: &'static str, cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Unexpected {
            module,
            procedure,
            cause: cause.into(),
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        // io::Error and boxed causes are not comparable, but their Debug
        // output is, and that is all the tests need.
        format!("{:?}", self) == format!("{:?}", other)
    }
}

/// Wraps `std::result::Result` around our `Error` enum
pub type Result<T> = std::result::Result<T, Error>;
