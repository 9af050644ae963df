//! Error types for the SecurityProfile operator
//!
//! Errors are classified by how the reconciler must react to them:
//! - `NotFound` is benign for the synchronizer (it triggers a create)
//! - `Conflict` is retried a bounded number of times by the conflict retry policy
//! - `Forbidden`/`Unauthenticated` are fatal and surfaced immediately
//! - `Timeout`/`Transport` are left to the controller's requeue
//! - `UnmappedKind` is a programming error and fails fast

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for SecurityProfile operations
#[derive(Debug, Error)]
pub enum Error {
    /// The addressed object does not exist
    #[error("not found: {resource}")]
    NotFound {
        /// Human-readable identity of the missing object
        resource: String,
    },

    /// The object changed between read and write (or already exists on create)
    #[error("conflict on {resource}: {message}")]
    Conflict {
        /// Human-readable identity of the contended object
        resource: String,
        /// Message reported by the API server
        message: String,
    },

    /// The caller lacks permission for the operation
    #[error("forbidden: {message}")]
    Forbidden {
        /// Message reported by the API server
        message: String,
    },

    /// The caller could not be authenticated
    #[error("unauthenticated: {message}")]
    Unauthenticated {
        /// Message reported by the API server
        message: String,
    },

    /// The request did not complete within the configured timeout
    #[error("timeout [{operation}]: {message}")]
    Timeout {
        /// Operation that timed out (e.g. "get", "patch")
        operation: String,
        /// Description of what timed out
        message: String,
    },

    /// Connection or server-side failure talking to the API server
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure
        message: String,
    },

    /// The API server rejected the request as malformed (400/422)
    #[error("invalid request: {message}")]
    Invalid {
        /// Message reported by the API server
        message: String,
    },

    /// A kind string has no entry in the kind table
    #[error("no resource mapping for kind {kind}")]
    UnmappedKind {
        /// The kind that could not be mapped
        kind: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Validation error for SecurityProfile specs
    #[error("validation error for {profile}: {message}")]
    Validation {
        /// Name of the profile with invalid configuration
        profile: String,
        /// Description of what's invalid
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "controller")
        context: String,
    },
}

impl From<kube::Error> for Error {
    /// Classify a kube-rs error by API status code.
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) => {
                let message = ae.message.clone();
                match ae.code {
                    401 => Self::Unauthenticated { message },
                    403 => Self::Forbidden { message },
                    404 => Self::NotFound { resource: message },
                    409 => Self::Conflict {
                        resource: ae.reason.clone(),
                        message,
                    },
                    400 | 422 => Self::Invalid { message },
                    408 | 504 => Self::Timeout {
                        operation: "api".to_string(),
                        message,
                    },
                    _ => Self::Transport {
                        message: format!("{} ({}): {}", ae.reason, ae.code, message),
                    },
                }
            }
            kube::Error::SerdeError(e) => Self::Serialization {
                message: e.to_string(),
                kind: None,
            },
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl Error {
    /// Create a not-found error for the given resource identity
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a conflict error for the given resource identity
    pub fn conflict(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden {
            message: msg.into(),
        }
    }

    /// Create a timeout error for an operation
    pub fn timeout(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
        }
    }

    /// Create an unmapped-kind error
    pub fn unmapped_kind(kind: impl Into<String>) -> Self {
        Self::UnmappedKind { kind: kind.into() }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a validation error without profile context
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            profile: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a validation error for a named profile
    pub fn validation_for(profile: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            profile: profile.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// True for write conflicts, the only error the conflict retry policy handles
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// True when the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this error is retryable by the controller's requeue
    ///
    /// Authorization, validation, mapping and serialization errors need a
    /// configuration or code fix, so requeueing quickly won't help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Conflict { .. } => true,
            Error::Forbidden { .. } => false,
            Error::Unauthenticated { .. } => false,
            Error::Timeout { .. } => true,
            Error::Transport { .. } => true,
            Error::Invalid { .. } => false,
            Error::UnmappedKind { .. } => false,
            Error::Serialization { .. } => false,
            Error::Validation { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Short machine-readable reason, used for status conditions
    pub fn reason(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "NotFound",
            Error::Conflict { .. } => "Conflict",
            Error::Forbidden { .. } => "Forbidden",
            Error::Unauthenticated { .. } => "Unauthenticated",
            Error::Timeout { .. } => "Timeout",
            Error::Transport { .. } => "TransportError",
            Error::Invalid { .. } => "InvalidRequest",
            Error::UnmappedKind { .. } => "UnmappedKind",
            Error::Serialization { .. } => "SerializationError",
            Error::Validation { .. } => "ValidationFailed",
            Error::Internal { .. } => "InternalError",
        }
    }
}
