//! Provisioning helpers for an Active Directory compatible domain controller
//!
//! - default security descriptors for the configuration, domain and DNS
//!   naming contexts, built from SDDL against the domain SID
//! - discovery of a writable directory server for the configured realm
//! - the local host's DNS name derived from the configuration

pub mod config;
pub mod descriptors;
pub mod domain_discovery;
pub mod errors;
pub mod hostname;
pub mod ldap_timeout;
mod ldap_utils;
pub mod netlogon;
pub mod sddl;
pub mod secure_types;
pub mod security_descriptor;
pub mod sid;

pub use config::LoadParm;
pub use descriptors::{
    config_partition_descriptor, dns_partition_descriptor, domain_partition_descriptor,
    PartitionKind,
};
pub use domain_discovery::{
    find_writable_dc, find_writable_dc_with_timeout, DcLocator, LdapPingLocator,
};
pub use errors::{ProvisionError, Result};
pub use hostname::compute_fqdn;
pub use netlogon::{NetlogonResponse, ServerType};
pub use secure_types::Credentials;
pub use security_descriptor::SecurityDescriptor;
pub use sid::Sid;
