//! Security identifiers (MS-DTYP 2.4.2)
//!
//! String form `S-1-5-21-...` and the little-endian binary form, plus the
//! two-letter SDDL aliases for well-known and domain-relative principals.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::errors::{ProvisionError, Result};

/// Maximum number of sub-authorities a SID may carry
pub const MAX_SUB_AUTHORITIES: usize = 15;

/// A security identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sid {
    revision: u8,
    authority: u64,
    sub_authorities: Vec<u32>,
}

impl Sid {
    /// Builds a revision-1 SID.
    pub fn new(authority: u64, sub_authorities: &[u32]) -> Result<Self> {
        if authority >= 1 << 48 {
            return Err(ProvisionError::InvalidSid(format!(
                "identifier authority {} exceeds 48 bits",
                authority
            )));
        }
        if sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(ProvisionError::InvalidSid(format!(
                "{} sub-authorities (maximum {})",
                sub_authorities.len(),
                MAX_SUB_AUTHORITIES
            )));
        }
        Ok(Self {
            revision: 1,
            authority,
            sub_authorities: sub_authorities.to_vec(),
        })
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn authority(&self) -> u64 {
        self.authority
    }

    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }

    /// Appends a relative identifier, e.g. domain SID + 512 = Domain Admins.
    pub fn with_rid(&self, rid: u32) -> Result<Self> {
        let mut subs = self.sub_authorities.clone();
        subs.push(rid);
        let mut sid = Self::new(self.authority, &subs)?;
        sid.revision = self.revision;
        Ok(sid)
    }

    /// Size of the binary form in bytes.
    pub fn binary_len(&self) -> usize {
        8 + 4 * self.sub_authorities.len()
    }

    /// Appends the binary form to `out`.
    ///
    /// ```text
    /// Offset  Size  Field
    /// 0       1     Revision
    /// 1       1     SubAuthorityCount
    /// 2       6     IdentifierAuthority (big-endian)
    /// 8       4*N   SubAuthorities (little-endian)
    /// ```
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.revision);
        out.push(self.sub_authorities.len() as u8);
        out.extend_from_slice(&self.authority.to_be_bytes()[2..]);
        for sub in &self.sub_authorities {
            out.extend_from_slice(&sub.to_le_bytes());
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.binary_len());
        self.write_to(&mut out);
        out
    }

    /// Decodes a binary SID from the start of `bytes`; trailing data is
    /// ignored. Returns the SID and the number of bytes consumed.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < 8 {
            return Err(ProvisionError::Decode(
                "SID too short (minimum 8 bytes)".to_string(),
            ));
        }

        let revision = bytes[0];
        let count = bytes[1] as usize;
        if count > MAX_SUB_AUTHORITIES {
            return Err(ProvisionError::Decode(format!(
                "SID claims {} sub-authorities",
                count
            )));
        }
        let len = 8 + count * 4;
        if bytes.len() < len {
            return Err(ProvisionError::Decode(format!(
                "SID data insufficient for {} sub-authorities",
                count
            )));
        }

        let authority = u64::from_be_bytes([
            0, 0, bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);
        let sub_authorities = bytes[8..len]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok((
            Self {
                revision,
                authority,
                sub_authorities,
            },
            len,
        ))
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-", self.revision)?;
        if self.authority >= 1 << 32 {
            write!(f, "0x{:012x}", self.authority)?;
        } else {
            write!(f, "{}", self.authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

impl FromStr for Sid {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| ProvisionError::InvalidSid(format!("'{}': {}", s, why));

        let rest = s
            .strip_prefix("S-")
            .or_else(|| s.strip_prefix("s-"))
            .ok_or_else(|| invalid("must start with 'S-'"))?;
        let mut parts = rest.split('-');

        let revision: u8 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| invalid("bad revision"))?;
        if revision != 1 {
            return Err(invalid("unsupported revision"));
        }

        let authority_str = parts.next().ok_or_else(|| invalid("missing authority"))?;
        let authority = match authority_str
            .strip_prefix("0x")
            .or_else(|| authority_str.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => authority_str.parse(),
        }
        .map_err(|_| invalid("bad identifier authority"))?;

        let sub_authorities = parts
            .map(|p| p.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid("bad sub-authority"))?;

        Self::new(authority, &sub_authorities)
    }
}

impl Serialize for Sid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How an SDDL alias maps to a SID
#[derive(Debug, Clone, Copy)]
enum AliasTarget {
    /// Fixed authority and sub-authorities
    WellKnown(u64, &'static [u32]),
    /// RID appended to the domain SID
    DomainRid(u32),
}

use AliasTarget::{DomainRid, WellKnown};

const NT_AUTHORITY: u64 = 5;

/// SDDL trustee aliases (MS-DTYP 2.4.2.4)
const SID_ALIASES: &[(&str, AliasTarget)] = &[
    ("WD", WellKnown(1, &[0])),
    ("CO", WellKnown(3, &[0])),
    ("CG", WellKnown(3, &[1])),
    ("OW", WellKnown(3, &[4])),
    ("NU", WellKnown(NT_AUTHORITY, &[2])),
    ("IU", WellKnown(NT_AUTHORITY, &[4])),
    ("SU", WellKnown(NT_AUTHORITY, &[6])),
    ("AN", WellKnown(NT_AUTHORITY, &[7])),
    ("ED", WellKnown(NT_AUTHORITY, &[9])),
    ("PS", WellKnown(NT_AUTHORITY, &[10])),
    ("AU", WellKnown(NT_AUTHORITY, &[11])),
    ("RC", WellKnown(NT_AUTHORITY, &[12])),
    ("SY", WellKnown(NT_AUTHORITY, &[18])),
    ("LS", WellKnown(NT_AUTHORITY, &[19])),
    ("NS", WellKnown(NT_AUTHORITY, &[20])),
    ("WR", WellKnown(NT_AUTHORITY, &[33])),
    ("BA", WellKnown(NT_AUTHORITY, &[32, 544])),
    ("BU", WellKnown(NT_AUTHORITY, &[32, 545])),
    ("BG", WellKnown(NT_AUTHORITY, &[32, 546])),
    ("PU", WellKnown(NT_AUTHORITY, &[32, 547])),
    ("AO", WellKnown(NT_AUTHORITY, &[32, 548])),
    ("SO", WellKnown(NT_AUTHORITY, &[32, 549])),
    ("PO", WellKnown(NT_AUTHORITY, &[32, 550])),
    ("BO", WellKnown(NT_AUTHORITY, &[32, 551])),
    ("RE", WellKnown(NT_AUTHORITY, &[32, 552])),
    ("RU", WellKnown(NT_AUTHORITY, &[32, 554])),
    ("RD", WellKnown(NT_AUTHORITY, &[32, 555])),
    ("NO", WellKnown(NT_AUTHORITY, &[32, 556])),
    ("IF", WellKnown(NT_AUTHORITY, &[32, 557])),
    ("MU", WellKnown(NT_AUTHORITY, &[32, 558])),
    ("LU", WellKnown(NT_AUTHORITY, &[32, 559])),
    ("IS", WellKnown(NT_AUTHORITY, &[32, 568])),
    ("CY", WellKnown(NT_AUTHORITY, &[32, 569])),
    ("ER", WellKnown(NT_AUTHORITY, &[32, 573])),
    ("CD", WellKnown(NT_AUTHORITY, &[32, 574])),
    ("RA", WellKnown(NT_AUTHORITY, &[32, 575])),
    ("ES", WellKnown(NT_AUTHORITY, &[32, 576])),
    ("MS", WellKnown(NT_AUTHORITY, &[32, 577])),
    ("HA", WellKnown(NT_AUTHORITY, &[32, 578])),
    ("AA", WellKnown(NT_AUTHORITY, &[32, 579])),
    ("RM", WellKnown(NT_AUTHORITY, &[32, 580])),
    ("LW", WellKnown(16, &[4096])),
    ("ME", WellKnown(16, &[8192])),
    ("HI", WellKnown(16, &[12288])),
    ("SI", WellKnown(16, &[16384])),
    ("RO", DomainRid(498)),
    ("LA", DomainRid(500)),
    ("LG", DomainRid(501)),
    ("DA", DomainRid(512)),
    ("DU", DomainRid(513)),
    ("DG", DomainRid(514)),
    ("DC", DomainRid(515)),
    ("DD", DomainRid(516)),
    ("CA", DomainRid(517)),
    ("SA", DomainRid(518)),
    ("EA", DomainRid(519)),
    ("PA", DomainRid(520)),
    ("CN", DomainRid(522)),
    ("RS", DomainRid(553)),
];

fn alias_sid(target: AliasTarget, domain_sid: &Sid) -> Result<Sid> {
    match target {
        WellKnown(authority, subs) => Sid::new(authority, subs),
        DomainRid(rid) => domain_sid.with_rid(rid),
    }
}

/// Resolves a two-letter SDDL alias. Domain-relative aliases are resolved
/// against `domain_sid`. Lookup is case-insensitive.
pub fn resolve_alias(code: &str, domain_sid: &Sid) -> Option<Sid> {
    SID_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(code))
        .and_then(|(_, target)| alias_sid(*target, domain_sid).ok())
}

/// Returns the SDDL alias naming `sid`, if any.
pub fn alias_for(sid: &Sid, domain_sid: &Sid) -> Option<&'static str> {
    SID_ALIASES.iter().find_map(|(alias, target)| match alias_sid(*target, domain_sid) {
        Ok(candidate) if &candidate == sid => Some(*alias),
        _ => None,
    })
}
