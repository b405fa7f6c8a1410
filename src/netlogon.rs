//! Netlogon LDAP ping response codec
//!
//! A rootDSE search for the `Netlogon` attribute returns a
//! `NETLOGON_SAM_LOGON_RESPONSE_EX` structure (MS-ADTS 6.3.1.9). Fixed fields
//! are little-endian; the string fields are DNS names compressed as in
//! RFC 1035 4.1.4, with pointers relative to the start of the blob.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use serde::Serialize;
use uuid::Uuid;

use crate::errors::{ProvisionError, Result};

/// `LOGON_SAM_LOGON_RESPONSE_EX`
pub const LOGON_SAM_LOGON_RESPONSE_EX: u16 = 23;
/// `LOGON_SAM_USER_UNKNOWN_EX`
pub const LOGON_SAM_USER_UNKNOWN_EX: u16 = 25;

/// NtVersion bits requested in the ping filter and echoed by the server
pub mod nt_version {
    pub const V1: u32 = 0x0000_0001;
    pub const V5: u32 = 0x0000_0002;
    pub const V5EX: u32 = 0x0000_0004;
    pub const V5EX_WITH_IP: u32 = 0x0000_0008;
    pub const WITH_CLOSEST_SITE: u32 = 0x0000_0010;
    pub const AVOID_NT4EMUL: u32 = 0x0100_0000;
    pub const PDC: u32 = 0x1000_0000;
    pub const IP: u32 = 0x2000_0000;
    pub const LOCAL: u32 = 0x4000_0000;
    pub const GC: u32 = 0x8000_0000;
}

/// NtVersion sent by the locator: `V5 | V5EX`
pub const DEFAULT_NT_VERSION: u32 = nt_version::V5 | nt_version::V5EX;

const MAX_POINTER_HOPS: usize = 32;
const MAX_NAME_LEN: usize = 255;
const SOCKADDR_IN_LEN: usize = 16;
const AF_INET: u16 = 2;

/// `DS_FLAG` / `NBT_SERVER_*` bits describing what a server offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct ServerType(u32);

const SERVER_TYPE_NAMES: &[(ServerType, &str)] = &[
    (ServerType::PDC, "PDC"),
    (ServerType::GC, "GC"),
    (ServerType::LDAP, "LDAP"),
    (ServerType::DS, "DS"),
    (ServerType::KDC, "KDC"),
    (ServerType::TIMESERV, "TIMESERV"),
    (ServerType::CLOSEST, "CLOSEST"),
    (ServerType::WRITABLE, "WRITABLE"),
    (ServerType::GOOD_TIMESERV, "GOOD_TIMESERV"),
    (ServerType::NDNC, "NDNC"),
    (ServerType::SELECT_SECRET_DOMAIN_6, "SELECT_SECRET_DOMAIN_6"),
    (ServerType::FULL_SECRET_DOMAIN_6, "FULL_SECRET_DOMAIN_6"),
    (ServerType::ADS_WEB_SERVICE, "ADS_WEB_SERVICE"),
    (ServerType::DS_8, "DS_8"),
    (ServerType::DS_9, "DS_9"),
    (ServerType::DS_10, "DS_10"),
    (ServerType::HAS_DNS_NAME, "HAS_DNS_NAME"),
    (ServerType::IS_DEFAULT_NC, "IS_DEFAULT_NC"),
    (ServerType::FOREST_ROOT, "FOREST_ROOT"),
];

impl ServerType {
    pub const PDC: ServerType = ServerType(0x0000_0001);
    pub const GC: ServerType = ServerType(0x0000_0004);
    pub const LDAP: ServerType = ServerType(0x0000_0008);
    pub const DS: ServerType = ServerType(0x0000_0010);
    pub const KDC: ServerType = ServerType(0x0000_0020);
    pub const TIMESERV: ServerType = ServerType(0x0000_0040);
    pub const CLOSEST: ServerType = ServerType(0x0000_0080);
    pub const WRITABLE: ServerType = ServerType(0x0000_0100);
    pub const GOOD_TIMESERV: ServerType = ServerType(0x0000_0200);
    pub const NDNC: ServerType = ServerType(0x0000_0400);
    pub const SELECT_SECRET_DOMAIN_6: ServerType = ServerType(0x0000_0800);
    pub const FULL_SECRET_DOMAIN_6: ServerType = ServerType(0x0000_1000);
    pub const ADS_WEB_SERVICE: ServerType = ServerType(0x0000_2000);
    pub const DS_8: ServerType = ServerType(0x0000_4000);
    pub const DS_9: ServerType = ServerType(0x0000_8000);
    pub const DS_10: ServerType = ServerType(0x0001_0000);
    pub const HAS_DNS_NAME: ServerType = ServerType(0x2000_0000);
    pub const IS_DEFAULT_NC: ServerType = ServerType(0x4000_0000);
    pub const FOREST_ROOT: ServerType = ServerType(0x8000_0000);

    /// A writable directory server reachable over LDAP.
    pub const WRITABLE_DS_LDAP: ServerType =
        ServerType(Self::LDAP.0 | Self::DS.0 | Self::WRITABLE.0);

    pub const fn empty() -> Self {
        ServerType(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        ServerType(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: ServerType) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the known bits that are set, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        SERVER_TYPE_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl std::ops::BitOr for ServerType {
    type Output = ServerType;

    fn bitor(self, rhs: ServerType) -> ServerType {
        ServerType(self.0 | rhs.0)
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            write!(f, "0x{:08x}", self.0)
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// Decoded `NETLOGON_SAM_LOGON_RESPONSE_EX`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NetlogonResponse {
    pub opcode: u16,
    pub server_type: ServerType,
    pub domain_guid: Uuid,
    pub forest: String,
    pub dns_domain: String,
    /// DNS name of the responding server
    pub dns_host_name: String,
    pub netbios_domain: String,
    pub netbios_computer: String,
    pub user_name: String,
    pub dc_site: String,
    pub client_site: String,
    pub dc_address: Option<SocketAddrV4>,
    pub next_closest_site: Option<String>,
    pub nt_version: u32,
    pub lm_nt_token: u16,
    pub lm20_token: u16,
}

impl NetlogonResponse {
    /// Decodes a response to a ping sent with [`DEFAULT_NT_VERSION`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::decode_for_version(bytes, DEFAULT_NT_VERSION)
    }

    /// Decodes a response; `requested` is the NtVersion the ping asked for,
    /// which decides whether the optional address and closest-site fields
    /// are on the wire.
    pub fn decode_for_version(bytes: &[u8], requested: u32) -> Result<Self> {
        let mut r = Reader::new(bytes);

        let opcode = r.u16()?;
        if opcode != LOGON_SAM_LOGON_RESPONSE_EX && opcode != LOGON_SAM_USER_UNKNOWN_EX {
            return Err(ProvisionError::Decode(format!(
                "unexpected netlogon opcode {}",
                opcode
            )));
        }
        let _sbz = r.u16()?;
        let server_type = ServerType::from_bits(r.u32()?);
        let guid: [u8; 16] = r
            .take(16)?
            .try_into()
            .map_err(|_| ProvisionError::Decode("short domain GUID".to_string()))?;
        let domain_guid = Uuid::from_bytes_le(guid);

        let forest = r.dns_name()?;
        let dns_domain = r.dns_name()?;
        let dns_host_name = r.dns_name()?;
        let netbios_domain = r.dns_name()?;
        let netbios_computer = r.dns_name()?;
        let user_name = r.dns_name()?;
        let dc_site = r.dns_name()?;
        let client_site = r.dns_name()?;

        let dc_address = if requested & nt_version::V5EX_WITH_IP != 0 {
            let size = r.u8()? as usize;
            let raw = r.take(size)?;
            Some(parse_sockaddr_in(raw)?)
        } else {
            None
        };

        let next_closest_site = if requested & nt_version::WITH_CLOSEST_SITE != 0 {
            Some(r.dns_name()?)
        } else {
            None
        };

        let nt_version = r.u32()?;
        let lm_nt_token = r.u16()?;
        let lm20_token = r.u16()?;

        Ok(NetlogonResponse {
            opcode,
            server_type,
            domain_guid,
            forest,
            dns_domain,
            dns_host_name,
            netbios_domain,
            netbios_computer,
            user_name,
            dc_site,
            client_site,
            dc_address,
            next_closest_site,
            nt_version,
            lm_nt_token,
            lm20_token,
        })
    }
}

fn parse_sockaddr_in(raw: &[u8]) -> Result<SocketAddrV4> {
    if raw.len() < SOCKADDR_IN_LEN - 8 {
        return Err(ProvisionError::Decode(format!(
            "DcSockAddr too short ({} bytes)",
            raw.len()
        )));
    }
    let family = u16::from_le_bytes([raw[0], raw[1]]);
    if family != AF_INET {
        return Err(ProvisionError::Decode(format!(
            "unsupported DcSockAddr family {}",
            family
        )));
    }
    // sin_port and sin_addr are in network order
    let port = u16::from_be_bytes([raw[2], raw[3]]);
    let addr = Ipv4Addr::new(raw[4], raw[5], raw[6], raw[7]);
    Ok(SocketAddrV4::new(addr, port))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                ProvisionError::Decode(format!(
                    "netlogon response truncated at offset {} (need {} bytes)",
                    self.pos, n
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a possibly compressed DNS name. The cursor advances past the
    /// inline part only; pointer targets are read out of line.
    fn dns_name(&mut self) -> Result<String> {
        let mut labels: Vec<String> = Vec::new();
        let mut cursor = self.pos;
        let mut resume: Option<usize> = None;
        let mut hops = 0;
        let mut total = 0;

        loop {
            let len = *self.data.get(cursor).ok_or_else(|| {
                ProvisionError::Decode(format!("DNS name truncated at offset {}", cursor))
            })? as usize;

            match len & 0xc0 {
                0x00 => {
                    if len == 0 {
                        cursor += 1;
                        break;
                    }
                    let start = cursor + 1;
                    let label = self.data.get(start..start + len).ok_or_else(|| {
                        ProvisionError::Decode(format!("DNS label truncated at offset {}", start))
                    })?;
                    total += len + 1;
                    if total > MAX_NAME_LEN {
                        return Err(ProvisionError::Decode("DNS name too long".to_string()));
                    }
                    labels.push(String::from_utf8_lossy(label).into_owned());
                    cursor = start + len;
                }
                0xc0 => {
                    let low = *self.data.get(cursor + 1).ok_or_else(|| {
                        ProvisionError::Decode(format!("DNS pointer truncated at offset {}", cursor))
                    })? as usize;
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(ProvisionError::Decode(
                            "DNS name compression loop".to_string(),
                        ));
                    }
                    if resume.is_none() {
                        resume = Some(cursor + 2);
                    }
                    cursor = ((len & 0x3f) << 8) | low;
                }
                _ => {
                    return Err(ProvisionError::Decode(format!(
                        "invalid DNS label type 0x{:02x} at offset {}",
                        len, cursor
                    )));
                }
            }
        }

        self.pos = resume.unwrap_or(cursor);
        Ok(labels.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(out: &mut Vec<u8>, dotted: &str) {
        for label in dotted.split('.').filter(|l| !l.is_empty()) {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
    }

    /// A response as a Windows DC sends it: domain and host names point back
    /// into the forest name.
    fn sample_response(flags: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&LOGON_SAM_LOGON_RESPONSE_EX.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        let guid = Uuid::parse_str("0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9").unwrap();
        out.extend_from_slice(&guid.to_bytes_le());

        // forest at offset 24
        name(&mut out, "example.com");
        // domain: pointer to forest
        out.extend_from_slice(&[0xc0, 24]);
        // host: "dc1" + pointer to forest
        out.push(3);
        out.extend_from_slice(b"dc1");
        out.extend_from_slice(&[0xc0, 24]);
        name(&mut out, "EXAMPLE");
        name(&mut out, "DC1");
        name(&mut out, "");
        name(&mut out, "Default-First-Site-Name");
        // client site: pointer to dc site
        let dc_site_offset = out.len() - "Default-First-Site-Name".len() - 2;
        out.extend_from_slice(&[0xc0, dc_site_offset as u8]);

        out.extend_from_slice(&(nt_version::V1 | nt_version::V5EX).to_le_bytes());
        out.extend_from_slice(&0xffffu16.to_le_bytes());
        out.extend_from_slice(&0xffffu16.to_le_bytes());
        out
    }

    #[test]
    fn test_decode_compressed_names() {
        let flags = 0x0001_f3fd;
        let resp = NetlogonResponse::decode(&sample_response(flags)).unwrap();
        assert_eq!(resp.opcode, LOGON_SAM_LOGON_RESPONSE_EX);
        assert_eq!(resp.server_type.bits(), flags);
        assert_eq!(
            resp.domain_guid.to_string(),
            "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9"
        );
        assert_eq!(resp.forest, "example.com");
        assert_eq!(resp.dns_domain, "example.com");
        assert_eq!(resp.dns_host_name, "dc1.example.com");
        assert_eq!(resp.netbios_domain, "EXAMPLE");
        assert_eq!(resp.netbios_computer, "DC1");
        assert_eq!(resp.user_name, "");
        assert_eq!(resp.dc_site, "Default-First-Site-Name");
        assert_eq!(resp.client_site, "Default-First-Site-Name");
        assert_eq!(resp.dc_address, None);
        assert_eq!(resp.next_closest_site, None);
        assert_eq!(resp.nt_version, nt_version::V1 | nt_version::V5EX);
        assert_eq!(resp.lm_nt_token, 0xffff);
        assert_eq!(resp.lm20_token, 0xffff);
    }

    #[test]
    fn test_decode_with_address_and_closest_site() {
        let mut blob = sample_response(ServerType::WRITABLE_DS_LDAP.bits());
        let tail = blob.split_off(blob.len() - 8);
        blob.push(16);
        blob.extend_from_slice(&AF_INET.to_le_bytes());
        blob.extend_from_slice(&389u16.to_be_bytes());
        blob.extend_from_slice(&[192, 0, 2, 10]);
        blob.extend_from_slice(&[0u8; 8]);
        name(&mut blob, "Branch-Site");
        blob.extend_from_slice(&tail);

        let requested = nt_version::V5EX | nt_version::V5EX_WITH_IP | nt_version::WITH_CLOSEST_SITE;
        let resp = NetlogonResponse::decode_for_version(&blob, requested).unwrap();
        assert_eq!(
            resp.dc_address,
            Some(SocketAddrV4::new(Ipv4Addr::new(192, 0, 2, 10), 389))
        );
        assert_eq!(resp.next_closest_site.as_deref(), Some("Branch-Site"));
        assert_eq!(resp.lm20_token, 0xffff);
    }

    #[test]
    fn test_truncated_response() {
        let blob = sample_response(0);
        for len in [0, 3, 10, 30, blob.len() - 1] {
            assert!(
                matches!(
                    NetlogonResponse::decode(&blob[..len]),
                    Err(ProvisionError::Decode(_))
                ),
                "length {} should fail",
                len
            );
        }
    }

    #[test]
    fn test_wrong_opcode() {
        let mut blob = sample_response(0);
        blob[0] = 19;
        assert!(matches!(
            NetlogonResponse::decode(&blob),
            Err(ProvisionError::Decode(ref m)) if m.contains("opcode")
        ));
    }

    #[test]
    fn test_user_unknown_opcode_accepted() {
        let mut blob = sample_response(0);
        blob[0..2].copy_from_slice(&LOGON_SAM_USER_UNKNOWN_EX.to_le_bytes());
        assert!(NetlogonResponse::decode(&blob).is_ok());
    }

    #[test]
    fn test_pointer_loop_rejected() {
        let mut blob = sample_response(0);
        // forest name becomes a pointer to itself
        blob[24] = 0xc0;
        blob[25] = 24;
        assert!(matches!(
            NetlogonResponse::decode(&blob),
            Err(ProvisionError::Decode(ref m)) if m.contains("loop")
        ));
    }

    #[test]
    fn test_server_type_flags() {
        let writable = ServerType::LDAP | ServerType::DS | ServerType::WRITABLE;
        assert_eq!(writable, ServerType::WRITABLE_DS_LDAP);
        assert_eq!(writable.bits(), 0x118);

        let rodc = ServerType::LDAP | ServerType::DS | ServerType::KDC;
        assert!(!rodc.contains(ServerType::WRITABLE_DS_LDAP));
        assert!((rodc | ServerType::WRITABLE).contains(ServerType::WRITABLE_DS_LDAP));
        assert!(rodc.contains(ServerType::empty()));

        assert_eq!(writable.names(), vec!["LDAP", "DS", "WRITABLE"]);
        assert_eq!(writable.to_string(), "LDAP|DS|WRITABLE");
        assert_eq!(ServerType::empty().to_string(), "0x00000000");
    }
}
