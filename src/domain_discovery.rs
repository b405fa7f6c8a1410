//! Domain Controller Discovery Module
//!
//! Locates a writable directory server for the configured realm. The
//! lookup itself goes through the [`DcLocator`] trait; [`LdapPingLocator`]
//! is the network implementation, sending a Netlogon LDAP ping to each
//! candidate server in turn.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{params, LoadParm};
use crate::errors::{ProvisionError, Result};
use crate::ldap_timeout::{
    ldap_bind, ldap_connect, rootdse_search, run_blocking_with_timeout, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_LDAP_PORT, DEFAULT_OPERATION_TIMEOUT,
};
use crate::ldap_utils::{first_binary_value, netlogon_ping_filter};
use crate::netlogon::{NetlogonResponse, ServerType, DEFAULT_NT_VERSION};
use crate::secure_types::Credentials;

/// rootDSE attribute carrying the ping response
const NETLOGON_ATTRIBUTE: &str = "Netlogon";

/// Finds a domain controller for a realm.
pub trait DcLocator: Send + Sync {
    /// Returns the response of a server in `realm` whose server type
    /// contains every bit of `required`.
    fn find_dc(
        &self,
        realm: &str,
        required: ServerType,
        credentials: &Credentials,
    ) -> Result<NetlogonResponse>;
}

/// Returns the DNS name of a writable directory server reachable over LDAP
/// for the configured realm.
///
/// Locator failures are returned as they are; there is no retry.
pub fn find_writable_dc(
    lp: &LoadParm,
    credentials: &Credentials,
    locator: &dyn DcLocator,
) -> Result<String> {
    let realm = lp.require(params::REALM)?;
    info!("Looking for a writable DC in {}", realm);

    let response = locator.find_dc(realm, ServerType::WRITABLE_DS_LDAP, credentials)?;
    if response.dns_host_name.is_empty() {
        return Err(ProvisionError::Discovery(format!(
            "server located for {} did not report a DNS host name",
            realm
        )));
    }

    info!(
        "Found DC {} ({}) for {}",
        response.dns_host_name, response.server_type, realm
    );
    Ok(response.dns_host_name)
}

/// [`find_writable_dc`] on the blocking thread pool, abandoned after
/// `deadline`.
pub async fn find_writable_dc_with_timeout(
    lp: LoadParm,
    credentials: Credentials,
    locator: Arc<dyn DcLocator>,
    deadline: Duration,
) -> Result<String> {
    run_blocking_with_timeout("domain controller discovery", deadline, move || {
        find_writable_dc(&lp, &credentials, locator.as_ref())
    })
    .await
}

/// Locates servers with a Netlogon LDAP ping (MS-ADTS 6.3.3).
///
/// Candidates are tried in order: the configured server list, or the realm
/// name itself so that DNS resolves it to the domain's controllers. The
/// first candidate that answers with the required flags wins.
#[derive(Debug, Clone)]
pub struct LdapPingLocator {
    servers: Vec<String>,
    port: u16,
    connect_timeout: Duration,
    operation_timeout: Duration,
}

impl Default for LdapPingLocator {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            port: DEFAULT_LDAP_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl LdapPingLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_servers(mut self, servers: Vec<String>) -> Self {
        self.servers = servers;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout;
        self
    }

    fn candidates(&self, realm: &str) -> Vec<String> {
        if self.servers.is_empty() {
            vec![realm.to_lowercase()]
        } else {
            self.servers.clone()
        }
    }

    fn url(&self, host: &str) -> String {
        if host.contains(':') && !host.starts_with('[') {
            format!("ldap://[{}]:{}", host, self.port)
        } else {
            format!("ldap://{}:{}", host, self.port)
        }
    }

    /// Pings one server and decodes its answer.
    fn ping(&self, host: &str, realm: &str, credentials: &Credentials) -> Result<NetlogonResponse> {
        let mut ldap = ldap_connect(&self.url(host), self.connect_timeout)?;
        ldap_bind(&mut ldap, credentials, self.operation_timeout)?;

        let filter = netlogon_ping_filter(realm, DEFAULT_NT_VERSION);
        debug!("Pinging {} with filter {}", host, filter);
        let entries = rootdse_search(&mut ldap, &filter, &[NETLOGON_ATTRIBUTE], self.operation_timeout);
        let _ = ldap.unbind();

        let blob = entries?
            .iter()
            .find_map(|entry| first_binary_value(entry, NETLOGON_ATTRIBUTE))
            .ok_or_else(|| {
                ProvisionError::Discovery(format!("{} returned no Netlogon attribute", host))
            })?;

        NetlogonResponse::decode(&blob)
    }
}

impl DcLocator for LdapPingLocator {
    fn find_dc(
        &self,
        realm: &str,
        required: ServerType,
        credentials: &Credentials,
    ) -> Result<NetlogonResponse> {
        let candidates = self.candidates(realm);

        for host in &candidates {
            match self.ping(host, realm, credentials) {
                Ok(response) if response.server_type.contains(required) => {
                    debug!(
                        "{} answered as {} ({})",
                        host, response.dns_host_name, response.server_type
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    warn!(
                        "{} ({}) lacks required flags {}, has {}",
                        host, response.dns_host_name, required, response.server_type
                    );
                }
                Err(e) => {
                    warn!("Netlogon ping to {} failed: {}", host, e);
                }
            }
        }

        Err(ProvisionError::Discovery(format!(
            "no server with {} found for {} (tried {})",
            required,
            realm,
            candidates.join(", ")
        )))
    }
}
