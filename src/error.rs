use std::fmt;
use std::panic::Location;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// An error raised anywhere in the library.
///
/// Carries the failure taxonomy in [`ErrorKind`] along with the source
/// location that raised it, so an embedding application can log where a
/// token was rejected without the library guessing at its log layer.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    location: &'static Location<'static>,
}

impl Error {
    #[track_caller]
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self { kind, location: Location::caller() }
    }

    #[track_caller]
    pub(crate) fn malformed_json(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedJson(message.into()))
    }

    #[track_caller]
    pub(crate) fn limit(limit: &'static str) -> Self {
        Self::new(ErrorKind::LimitViolation(limit))
    }

    #[track_caller]
    pub(crate) fn key_import(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::KeyImportFailed(message.into()))
    }

    #[track_caller]
    pub(crate) fn malformed_token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedToken(message.into()))
    }

    /// The kind of failure.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The source location that raised the error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { kind, location } = self;
        write!(f, "{kind} (at {}:{})", location.file(), location.line())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// The failure taxonomy.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("{0} exceeds allowed limit")]
    LimitViolation(&'static str),

    #[error("cannot convert {found} to {wanted}")]
    TypeMismatch { wanted: &'static str, found: &'static str },

    #[error("array index {0} is out of range")]
    IndexOutOfRange(usize),

    #[error("member '{0}' does not exist")]
    UnknownMember(String),

    #[error("member '{0}' is final")]
    FinalMember(String),

    #[error("structure is locked against modification")]
    Locked,

    #[error("invalid StringOrURI: {0}")]
    InvalidStringOrUri(String),

    #[error("algorithm '{0}' is not available")]
    AlgorithmUnavailable(String),

    #[error("key import failed: {0}")]
    KeyImportFailed(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("token is expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token was issued in the future")]
    IssuedInFuture,

    #[error("malformed token: {0}")]
    MalformedToken(String),
}
