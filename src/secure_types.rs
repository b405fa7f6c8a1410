//! Secure Types Module
//!
//! Credential storage types that zero out sensitive data from memory when
//! dropped. Credentials are handed through to the discovery collaborator
//! without being interpreted by the provisioning helpers.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure string that automatically zeros its contents when dropped.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Creates a new SecureString, taking ownership of the buffer.
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    /// Temporarily exposes the secret as a string slice.
    ///
    /// # Security
    /// The returned reference should be used immediately and not stored.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Authentication material passed to the directory discovery service.
///
/// An empty username means anonymous access.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: SecureString,
}

impl Credentials {
    /// Creates new credentials from username and password.
    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password: SecureString::new(password),
        }
    }

    /// Credentials for an unauthenticated (anonymous) session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Parses a `user[%password]` specification as accepted by `-U`.
    ///
    /// The password is split at the first `%`; a missing password yields an
    /// empty one.
    pub fn from_user_spec(spec: &str) -> Self {
        match spec.split_once('%') {
            Some((user, pass)) => Self::new(user.to_string(), pass.to_string()),
            None => Self::new(spec.to_string(), String::new()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Temporarily exposes the password as a string slice.
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// True when no username was supplied.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("Credentials(anonymous)")
        } else {
            write!(f, "Credentials(username: {}, password: [REDACTED])", self.username)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_string_new() {
        let secret = SecureString::new("my_password".to_string());
        assert_eq!(secret.expose_secret(), "my_password");
    }

    #[test]
    fn test_secure_string_debug() {
        let secret = SecureString::new("password123".to_string());
        let debug_output = format!("{:?}", secret);
        assert_eq!(debug_output, "SecureString([REDACTED])");
        assert!(!debug_output.contains("password123"));
    }

    #[test]
    fn test_credentials_new() {
        let creds = Credentials::new("admin".to_string(), "secret_password".to_string());
        assert_eq!(creds.username(), "admin");
        assert_eq!(creds.password(), "secret_password");
        assert!(!creds.is_anonymous());
    }

    #[test]
    fn test_credentials_anonymous() {
        let creds = Credentials::anonymous();
        assert!(creds.is_anonymous());
        assert_eq!(creds.password(), "");
        assert_eq!(creds.to_string(), "Credentials(anonymous)");
    }

    #[test]
    fn test_credentials_from_user_spec() {
        let creds = Credentials::from_user_spec("Administrator%p%ss");
        assert_eq!(creds.username(), "Administrator");
        assert_eq!(creds.password(), "p%ss");

        let creds = Credentials::from_user_spec("EXAMPLE\\bob");
        assert_eq!(creds.username(), "EXAMPLE\\bob");
        assert_eq!(creds.password(), "");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("testuser".to_string(), "testpass".to_string());
        let debug_output = format!("{:?}", creds);
        assert!(debug_output.contains("testuser"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("testpass"));

        let display_output = format!("{}", creds);
        assert!(!display_output.contains("testpass"));
    }
}
