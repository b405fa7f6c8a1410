//! Host DNS name derivation

use crate::config::{params, LoadParm};
use crate::errors::Result;

/// Returns the full DNS name of the local host, `<netbios name>.<realm>`,
/// lower-cased.
///
/// Used as the default host name for status queries against the local
/// server.
pub fn compute_fqdn(lp: &LoadParm) -> Result<String> {
    let netbios_name = lp.require(params::NETBIOS_NAME)?;
    let realm = lp.require(params::REALM)?;
    Ok(format!(
        "{}.{}",
        netbios_name.to_lowercase(),
        realm.to_lowercase()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProvisionError;

    fn lp(netbios: &str, realm: &str) -> LoadParm {
        let mut lp = LoadParm::new();
        lp.set("netbios name", netbios);
        lp.set("realm", realm);
        lp
    }

    #[test]
    fn test_compute_fqdn() {
        assert_eq!(
            compute_fqdn(&lp("HOST", "EXAMPLE.COM")).unwrap(),
            "host.example.com"
        );
    }

    #[test]
    fn test_compute_fqdn_ignores_input_case() {
        let expected = compute_fqdn(&lp("host", "example.com")).unwrap();
        assert_eq!(compute_fqdn(&lp("HoSt", "Example.Com")).unwrap(), expected);
        assert_eq!(compute_fqdn(&lp("HOST", "EXAMPLE.COM")).unwrap(), expected);
    }

    #[test]
    fn test_compute_fqdn_missing_parameter() {
        let mut only_realm = LoadParm::new();
        only_realm.set("realm", "EXAMPLE.COM");
        assert!(matches!(
            compute_fqdn(&only_realm),
            Err(ProvisionError::MissingParameter(ref k)) if k == "netbios name"
        ));
    }
}
