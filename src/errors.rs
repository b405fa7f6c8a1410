//! Error handling module
//!
//! Structured error types for descriptor construction, configuration and
//! domain controller discovery.

use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// No qualifying directory server could be located
    #[error("Domain controller discovery failed: {0}")]
    Discovery(String),

    /// Malformed security descriptor grammar
    #[error("SDDL parse error at offset {offset}: {message}")]
    GrammarParse { offset: usize, message: String },

    /// Malformed security identifier
    #[error("Invalid SID: {0}")]
    InvalidSid(String),

    /// Malformed binary structure (descriptor or netlogon response)
    #[error("Failed to decode data: {0}")]
    Decode(String),

    /// A required configuration parameter is absent or empty
    #[error("Missing configuration parameter: {0}")]
    MissingParameter(String),

    /// Configuration file or override could not be processed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    pub(crate) fn grammar(offset: usize, message: impl Into<String>) -> Self {
        ProvisionError::GrammarParse {
            offset,
            message: message.into(),
        }
    }
}

impl From<ldap3::LdapError> for ProvisionError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => ProvisionError::Discovery(format!(
                "LDAP error code {}: {}",
                result.rc, result.text
            )),
            ldap3::LdapError::EndOfStream => {
                ProvisionError::Discovery("Connection closed unexpectedly".to_string())
            }
            ldap3::LdapError::Io { source } => {
                ProvisionError::Discovery(format!("I/O error: {}", source))
            }
            ldap3::LdapError::Timeout { elapsed: _ } => {
                ProvisionError::Timeout("LDAP operation timed out".to_string())
            }
            _ => ProvisionError::Discovery(format!("LDAP error: {}", err)),
        }
    }
}

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProvisionError::Discovery("no writable DC".to_string());
        assert_eq!(
            err.to_string(),
            "Domain controller discovery failed: no writable DC"
        );

        let err = ProvisionError::grammar(7, "unknown ACE type 'X'");
        assert_eq!(
            err.to_string(),
            "SDDL parse error at offset 7: unknown ACE type 'X'"
        );

        let err = ProvisionError::MissingParameter("realm".to_string());
        assert_eq!(err.to_string(), "Missing configuration parameter: realm");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ProvisionError = io_err.into();
        assert!(matches!(err, ProvisionError::Io(_)));
    }

    #[test]
    fn test_ldap_error_conversion() {
        let err: ProvisionError = ldap3::LdapError::EndOfStream.into();
        assert!(matches!(err, ProvisionError::Discovery(_)));
    }
}
