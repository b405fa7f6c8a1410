//! Timeout handling for synchronous LDAP operations
//!
//! ldap3's `LdapConn` is blocking: connecting can hang if a server is
//! unreachable. The blocking helpers here bound each network call with
//! ldap3's own timeouts, and [`run_blocking_with_timeout`] moves a whole
//! blocking job onto `tokio::task::spawn_blocking` under an overall deadline.

use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry};
use tokio::time::timeout;
use tracing::{debug, error};

use crate::errors::{ProvisionError, Result};
use crate::secure_types::Credentials;

/// Default connection timeout (15 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default per-operation timeout for bind and search (15 seconds)
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Default LDAP port
pub const DEFAULT_LDAP_PORT: u16 = 389;

/// Opens a plain LDAP connection, giving up after `connect_timeout`.
pub(crate) fn ldap_connect(url: &str, connect_timeout: Duration) -> Result<LdapConn> {
    debug!("Connecting to {} (timeout: {}s)", url, connect_timeout.as_secs());
    let settings = LdapConnSettings::new().set_conn_timeout(connect_timeout);
    Ok(LdapConn::with_settings(settings, url)?)
}

/// Simple-binds with `credentials`; anonymous credentials skip the bind.
pub(crate) fn ldap_bind(
    ldap: &mut LdapConn,
    credentials: &Credentials,
    op_timeout: Duration,
) -> Result<()> {
    if credentials.is_anonymous() {
        return Ok(());
    }
    ldap.with_timeout(op_timeout)
        .simple_bind(credentials.username(), credentials.password())?
        .success()?;
    Ok(())
}

/// Base-scope search of the rootDSE.
pub(crate) fn rootdse_search(
    ldap: &mut LdapConn,
    filter: &str,
    attrs: &[&str],
    op_timeout: Duration,
) -> Result<Vec<SearchEntry>> {
    let (entries, _) = ldap
        .with_timeout(op_timeout)
        .search("", Scope::Base, filter, attrs.to_vec())?
        .success()?;
    debug!("rootDSE search returned {} entries", entries.len());
    Ok(entries.into_iter().map(SearchEntry::construct).collect())
}

/// Runs a blocking job on the blocking thread pool with an overall deadline.
///
/// `what` names the job in the timeout error.
pub async fn run_blocking_with_timeout<T, F>(what: &str, deadline: Duration, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let result = timeout(deadline, tokio::task::spawn_blocking(job)).await;

    match result {
        Ok(Ok(inner)) => inner,
        Ok(Err(join_error)) => {
            error!("{}: task join error: {}", what, join_error);
            Err(ProvisionError::Discovery(format!(
                "{} failed: task join error: {}",
                what, join_error
            )))
        }
        Err(_) => {
            error!("{}: timed out after {}s", what, deadline.as_secs());
            Err(ProvisionError::Timeout(format!(
                "{} did not complete within {} seconds",
                what,
                deadline.as_secs()
            )))
        }
    }
}
