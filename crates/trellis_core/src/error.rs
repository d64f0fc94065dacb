//! Error types for TRELLIS.

/// Result type used across the workspace
pub type DslResult<T> = Result<T, DslError>;

/// Error raised while declaring kinds or building nodes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DslError {
    /// A kind or relation declaration is invalid. Raised at declaration time.
    #[error("Configuration error in {kind}: {reason}")]
    Configuration {
        /// Kind being declared
        kind: String,
        /// What went wrong
        reason: String,
    },

    /// A slot required by an operation holds no value
    #[error("The following must be present to use {kind}#{operation}: {attribute}")]
    MissingRequiredAttribute {
        /// Kind of the instance that was checked
        kind: String,
        /// Operation that asked for the guarantee
        operation: String,
        /// First absent slot
        attribute: String,
    },

    /// No attribute, relation or reverse relation with this name
    #[error("{kind} has no accessor named {accessor}")]
    UnknownAccessor { kind: String, accessor: String },

    /// Reverse relations can only be read
    #[error("{kind}#{accessor} is read-only")]
    ReadOnlyAccessor { kind: String, accessor: String },

    /// The name of a sealed instance cannot change
    #[error("Name of {kind} {name} is frozen")]
    FrozenName { kind: String, name: String },

    /// A value of the wrong shape was given to a setter
    #[error("Type mismatch for {kind}#{accessor}: expected {expected}")]
    TypeMismatch {
        kind: String,
        accessor: String,
        expected: String,
    },

    /// Initial attributes could not be read
    #[error("Invalid attributes: {reason}")]
    InvalidAttributes { reason: String },

    /// Schema configuration could not be read
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },
}

impl DslError {
    /// Shorthand for a configuration error
    #[must_use]
    pub fn configuration(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an unknown accessor
    #[must_use]
    pub fn unknown_accessor(kind: impl Into<String>, accessor: impl Into<String>) -> Self {
        Self::UnknownAccessor {
            kind: kind.into(),
            accessor: accessor.into(),
        }
    }

    /// Check whether this error was raised at declaration time
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DslError::MissingRequiredAttribute {
            kind: "Deploy".to_string(),
            operation: "run".to_string(),
            attribute: "docker".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "The following must be present to use Deploy#run: docker"
        );

        let err = DslError::unknown_accessor("Ocean", "salinity");
        assert_eq!(format!("{}", err), "Ocean has no accessor named salinity");
    }

    #[test]
    fn test_configuration_error() {
        let err = DslError::configuration("Sea", "relation ocean already declared");
        assert!(err.is_configuration());
        assert!(format!("{}", err).contains("relation ocean already declared"));

        let err = DslError::FrozenName {
            kind: "Sea".to_string(),
            name: "Baltic".to_string(),
        };
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_error_equality() {
        let err1 = DslError::unknown_accessor("Ocean", "depth");
        let err2 = DslError::unknown_accessor("Ocean", "depth");
        assert_eq!(err1, err2);

        let err3 = DslError::unknown_accessor("Ocean", "tide");
        assert_ne!(err1, err3);
    }
}
