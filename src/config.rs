//! smb.conf-style parameter store
//!
//! Only the `[global]` section matters to the provisioning helpers. Parameter
//! names compare case-insensitively with all whitespace ignored, so
//! `"netbios name"`, `"NetBIOS Name"` and `"netbiosname"` are the same key.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::errors::{ProvisionError, Result};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/samba/smb.conf";

/// Parameter names used by this crate
pub mod params {
    pub const NETBIOS_NAME: &str = "netbios name";
    pub const REALM: &str = "realm";
}

/// Read-only view of the global configuration parameters.
#[derive(Debug, Clone, Default)]
pub struct LoadParm {
    values: HashMap<String, String>,
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl LoadParm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let lp = Self::parse(&text)?;
        debug!("Loaded {} global parameters from {}", lp.values.len(), path.display());
        Ok(lp)
    }

    /// Parses smb.conf text.
    ///
    /// Lines starting with `#` or `;` are comments, a trailing `\` joins the
    /// next line, and parameters before any section header count as global.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lp = Self::new();
        let mut in_global = true;
        let mut pending = String::new();
        let mut pending_start = 0;

        for (idx, raw) in text.lines().enumerate() {
            if pending.is_empty() {
                pending_start = idx + 1;
            }
            let line = raw.trim();
            if let Some(continued) = line.strip_suffix('\\') {
                pending.push_str(continued);
                pending.push(' ');
                continue;
            }
            pending.push_str(line);
            let line = std::mem::take(&mut pending);
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(section) = line.strip_prefix('[') {
                let name = section.strip_suffix(']').ok_or_else(|| {
                    ProvisionError::Config(format!(
                        "line {}: unterminated section header",
                        pending_start
                    ))
                })?;
                in_global = normalize_key(name) == "global";
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                ProvisionError::Config(format!(
                    "line {}: expected 'name = value'",
                    pending_start
                ))
            })?;

            if in_global {
                lp.set(key, value.trim());
            }
        }

        Ok(lp)
    }

    /// Sets a parameter, replacing any previous value.
    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(normalize_key(key), value.to_string());
    }

    /// Applies a `name=value` override as given on the command line.
    pub fn set_option(&mut self, option: &str) -> Result<()> {
        let (key, value) = option.split_once('=').ok_or_else(|| {
            ProvisionError::Config(format!("invalid option '{}', expected name=value", option))
        })?;
        if key.trim().is_empty() {
            return Err(ProvisionError::Config(format!(
                "invalid option '{}', empty parameter name",
                option
            )));
        }
        self.set(key, value.trim());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    /// Returns a parameter that must be present and non-empty.
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ProvisionError::MissingParameter(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Global parameters
[global]
\tnetbios name = DC1
\trealm = SAMDOM.EXAMPLE.COM
\tserver role = active directory domain controller
\tidmap_ldb:use rfc2307 = \\
\t\tyes

[netlogon]
\tpath = /var/lib/samba/sysvol/samdom.example.com/scripts
\trealm = SHOULD.NOT.LEAK
";

    #[test]
    fn test_parse_global_section() {
        let lp = LoadParm::parse(SAMPLE).unwrap();
        assert_eq!(lp.get("netbios name"), Some("DC1"));
        assert_eq!(lp.get("realm"), Some("SAMDOM.EXAMPLE.COM"));
        assert_eq!(lp.get("idmap_ldb:use rfc2307"), Some("yes"));
        assert_eq!(lp.get("path"), None);
    }

    #[test]
    fn test_key_normalization() {
        let lp = LoadParm::parse(SAMPLE).unwrap();
        assert_eq!(lp.get("NetBIOS Name"), Some("DC1"));
        assert_eq!(lp.get("netbiosname"), Some("DC1"));
        assert_eq!(lp.get("Server Role"), Some("active directory domain controller"));
    }

    #[test]
    fn test_parameters_before_section_are_global() {
        let lp = LoadParm::parse("realm = A.B\n[share]\nrealm = C.D\n").unwrap();
        assert_eq!(lp.get("realm"), Some("A.B"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            LoadParm::parse("[global\n"),
            Err(ProvisionError::Config(_))
        ));
        assert!(matches!(
            LoadParm::parse("[global]\njust some words\n"),
            Err(ProvisionError::Config(_))
        ));
    }

    #[test]
    fn test_set_option_overrides() {
        let mut lp = LoadParm::parse(SAMPLE).unwrap();
        lp.set_option("realm=other.example.org").unwrap();
        assert_eq!(lp.get("realm"), Some("other.example.org"));
        assert!(lp.set_option("no-equals-sign").is_err());
        assert!(lp.set_option(" =value").is_err());
    }

    #[test]
    fn test_require() {
        let mut lp = LoadParm::new();
        lp.set("realm", "");
        assert!(matches!(
            lp.require("realm"),
            Err(ProvisionError::MissingParameter(ref k)) if k == "realm"
        ));
        assert!(matches!(
            lp.require("netbios name"),
            Err(ProvisionError::MissingParameter(_))
        ));
        lp.set("realm", "EXAMPLE.COM");
        assert_eq!(lp.require("realm").unwrap(), "EXAMPLE.COM");
    }

    #[test]
    fn test_load_missing_file() {
        let err = LoadParm::load("/nonexistent/dir/smb.conf").unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }
}
