use thiserror::Error;

/// Failures of the pure numeral arithmetic.
///
/// Overflow is not an error here; see [`crate::numeral::Step::Overflow`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid alphabet: {0}")]
    InvalidAlphabet(String),

    #[error("Invalid pad character {0:?}: must be absent from the alphabet or equal to its first character")]
    InvalidPadChar(char),

    #[error("Invalid width {width}: {reason}")]
    InvalidWidth { width: usize, reason: String },

    #[error("Invalid representation {raw:?}: {reason}")]
    InvalidRepresentation { raw: String, reason: String },

    #[error("Value {0} does not fit in the configured width")]
    ValueTooLarge(u128),
}

/// Errors reported by a [`crate::contracts::SequenceStore`] backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Sequence already exists: {0}")]
    DuplicateName(String),

    #[error("Sequence not found: {0}")]
    NotFound(String),

    #[error("Stored value of {0} changed since it was read")]
    Conflict(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend timed out: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced to callers of [`crate::service::SequenceService`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Sequence already exists: {0}")]
    DuplicateName(String),

    #[error("Sequence name must not be empty")]
    InvalidName,

    #[error("Invalid alphabet: {0}")]
    InvalidAlphabet(String),

    #[error("Invalid pad character {0:?}")]
    InvalidPadChar(char),

    #[error("Invalid width {width}: {reason}")]
    InvalidWidth { width: usize, reason: String },

    #[error("Invalid initial value: {0}")]
    InvalidInitialValue(String),

    #[error("Sequence not found: {0}")]
    NotFound(String),

    #[error("Sequence exhausted: {0}")]
    SequenceExhausted(String),

    #[error("Concurrent update conflict on {0}")]
    Conflict(String),

    #[error("Gave up on {name} after {attempts} conflicting attempts")]
    ConcurrencyExhausted { name: String, attempts: usize },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend timed out: {0}")]
    BackendTimeout(String),
}

impl SequenceError {
    /// Only lost compare-and-set races are worth another read-compute-write cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SequenceError::Conflict(_))
    }
}

impl From<StoreError> for SequenceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateName(name) => SequenceError::DuplicateName(name),
            StoreError::NotFound(name) => SequenceError::NotFound(name),
            StoreError::Conflict(name) => SequenceError::Conflict(name),
            StoreError::Unavailable(msg) => SequenceError::BackendUnavailable(msg),
            StoreError::Timeout(msg) => SequenceError::BackendTimeout(msg),
            StoreError::Serialization(msg) => {
                SequenceError::BackendUnavailable(format!("corrupt record: {msg}"))
            }
        }
    }
}

impl From<CodecError> for SequenceError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidAlphabet(msg) => SequenceError::InvalidAlphabet(msg),
            CodecError::InvalidPadChar(pad) => SequenceError::InvalidPadChar(pad),
            CodecError::InvalidWidth { width, reason } => {
                SequenceError::InvalidWidth { width, reason }
            }
            e @ (CodecError::InvalidRepresentation { .. } | CodecError::ValueTooLarge(_)) => {
                SequenceError::InvalidInitialValue(e.to_string())
            }
        }
    }
}
