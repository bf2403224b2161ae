use thiserror::Error;

/// Error types for call center operations
///
/// Covers every failure class the routing core can produce, from bad admin
/// input through store and media-server failures. Repository operations
/// return these as structured results; the router decides recovery.
#[derive(Error, Debug)]
pub enum CallCenterError {
    /// Required argument missing or malformed
    ///
    /// # Examples
    /// - Empty queue id on creation
    /// - Login request with no queues
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Queue, agent, or waiting record absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation precondition does not hold
    ///
    /// # Examples
    /// - Login of an already-logged-in agent
    /// - Status transition not allowed by the agent state machine
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Shared store operation failed
    ///
    /// Connection failures, protocol errors, and unparsable stored records
    /// all surface here. During agent selection these degrade to "no agent
    /// available"; elsewhere they propagate to the caller.
    #[error("Store error: {0}")]
    Store(String),

    /// Media-server operation failed
    ///
    /// Answer, playback, origination, and bridge operations can all fail
    /// independently of the control connection being up.
    #[error("Media error: {0}")]
    Media(String),

    /// Operation did not complete within its time limit
    ///
    /// Primarily the agent answer timeout during origination.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Control channel to the media server dropped
    ///
    /// Fatal to the process: routing cannot continue without events.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration validation or parsing failed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for CallCenterError {
    fn from(err: anyhow::Error) -> Self {
        // Unexpected errors from lower-level components map to Internal.
        Self::Internal(err.to_string())
    }
}

impl CallCenterError {
    /// Create a new InvalidInput error with the provided message
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new NotFound error with the provided message
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new IllegalState error with the provided message
    pub fn illegal_state<S: Into<String>>(msg: S) -> Self {
        Self::IllegalState(msg.into())
    }

    /// Create a new Store error with the provided message
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new Media error with the provided message
    pub fn media<S: Into<String>>(msg: S) -> Self {
        Self::Media(msg.into())
    }

    /// Create a new Timeout error with the provided message
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new Transport error with the provided message
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new Configuration error with the provided message
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new Internal error with the provided message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for call center operations
pub type Result<T> = std::result::Result<T, CallCenterError>;
