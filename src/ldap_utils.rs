//! LDAP Utilities
//!
//! RFC 4515 filter escaping and helpers for building the rootDSE
//! Netlogon ping.

use ldap3::SearchEntry;

/// Escapes a string for safe use in an LDAP search filter (RFC 4515).
///
/// The following characters are escaped:
/// - `*` (asterisk) -> `\2a`
/// - `(` (left parenthesis) -> `\28`
/// - `)` (right parenthesis) -> `\29`
/// - `\` (backslash) -> `\5c`
/// - `\0` (NUL) -> `\00`
pub(crate) fn escape_ldap_filter(input: &str) -> String {
    input.chars().fold(String::new(), |mut acc, c| {
        match c {
            '*' => acc.push_str("\\2a"),
            '(' => acc.push_str("\\28"),
            ')' => acc.push_str("\\29"),
            '\\' => acc.push_str("\\5c"),
            '\0' => acc.push_str("\\00"),
            _ => acc.push(c),
        }
        acc
    })
}

/// Escapes raw bytes as `\xx` pairs for an octet-string assertion value.
pub(crate) fn escape_ldap_filter_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{:02x}", b)).collect()
}

/// Filter for the rootDSE Netlogon ping of `realm`.
///
/// `NtVer` is a little-endian u32 carried as a binary assertion value.
pub(crate) fn netlogon_ping_filter(realm: &str, nt_version: u32) -> String {
    format!(
        "(&(DnsDomain={})(NtVer={}))",
        escape_ldap_filter(realm),
        escape_ldap_filter_bytes(&nt_version.to_le_bytes())
    )
}

/// Returns the first value of `attr` as raw bytes.
///
/// ldap3 files values that happen to be valid UTF-8 under `attrs` and the
/// rest under `bin_attrs`, so a binary attribute may land in either map.
pub(crate) fn first_binary_value(entry: &SearchEntry, attr: &str) -> Option<Vec<u8>> {
    entry
        .bin_attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attr))
        .and_then(|(_, values)| values.first().cloned())
        .or_else(|| {
            entry
                .attrs
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(attr))
                .and_then(|(_, values)| values.first())
                .map(|value| value.as_bytes().to_vec())
        })
}
