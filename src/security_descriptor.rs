//! Security descriptor model and its self-relative binary form (MS-DTYP 2.4.6)
//!
//! The binary layout matches the NDR `security_descriptor` encoding used when
//! storing `nTSecurityDescriptor`: a 20-byte header followed by the owner
//! SID, group SID, SACL and DACL, each addressed by an offset from the start
//! of the descriptor.

use serde::Serialize;
use uuid::Uuid;

use crate::errors::{ProvisionError, Result};
use crate::sid::Sid;

/// Descriptor revision written by this crate
pub const SECURITY_DESCRIPTOR_REVISION: u8 = 1;

/// ACL revision for ACLs holding only non-object ACEs
pub const ACL_REVISION_NT4: u8 = 2;

/// ACL revision for directory-service ACLs
pub const ACL_REVISION_DS: u8 = 4;

/// Largest ACL the 16-bit AclSize field can describe
pub const MAX_ACL_LEN: usize = u16::MAX as usize;

const HEADER_LEN: usize = 20;
const ACL_HEADER_LEN: usize = 8;
const ACE_HEADER_LEN: usize = 4;

/// Security descriptor control flags (MS-DTYP 2.4.6)
pub mod control_flags {
    pub const OWNER_DEFAULTED: u16 = 0x0001;
    pub const GROUP_DEFAULTED: u16 = 0x0002;
    pub const DACL_PRESENT: u16 = 0x0004;
    pub const DACL_DEFAULTED: u16 = 0x0008;
    pub const SACL_PRESENT: u16 = 0x0010;
    pub const SACL_DEFAULTED: u16 = 0x0020;
    pub const DACL_TRUSTED: u16 = 0x0040;
    pub const SERVER_SECURITY: u16 = 0x0080;
    pub const DACL_AUTO_INHERIT_REQ: u16 = 0x0100;
    pub const SACL_AUTO_INHERIT_REQ: u16 = 0x0200;
    pub const DACL_AUTO_INHERITED: u16 = 0x0400;
    pub const SACL_AUTO_INHERITED: u16 = 0x0800;
    pub const DACL_PROTECTED: u16 = 0x1000;
    pub const SACL_PROTECTED: u16 = 0x2000;
    pub const RM_CONTROL_VALID: u16 = 0x4000;
    pub const SELF_RELATIVE: u16 = 0x8000;
}

/// ACE flag constants (MS-DTYP 2.4.4.1)
pub mod ace_flags {
    pub const OBJECT_INHERIT: u8 = 0x01;
    pub const CONTAINER_INHERIT: u8 = 0x02;
    pub const NO_PROPAGATE_INHERIT: u8 = 0x04;
    pub const INHERIT_ONLY: u8 = 0x08;
    pub const INHERITED: u8 = 0x10;
    pub const SUCCESSFUL_ACCESS: u8 = 0x40;
    pub const FAILED_ACCESS: u8 = 0x80;
}

/// Access rights used by directory objects (MS-ADTS 5.1.3.2)
pub mod access_rights {
    pub const ADS_CREATE_CHILD: u32 = 0x0000_0001;
    pub const ADS_DELETE_CHILD: u32 = 0x0000_0002;
    pub const ADS_LIST: u32 = 0x0000_0004;
    pub const ADS_SELF_WRITE: u32 = 0x0000_0008;
    pub const ADS_READ_PROP: u32 = 0x0000_0010;
    pub const ADS_WRITE_PROP: u32 = 0x0000_0020;
    pub const ADS_DELETE_TREE: u32 = 0x0000_0040;
    pub const ADS_LIST_OBJECT: u32 = 0x0000_0080;
    pub const ADS_CONTROL_ACCESS: u32 = 0x0000_0100;
    pub const DELETE: u32 = 0x0001_0000;
    pub const READ_CONTROL: u32 = 0x0002_0000;
    pub const WRITE_DAC: u32 = 0x0004_0000;
    pub const WRITE_OWNER: u32 = 0x0008_0000;
    pub const GENERIC_ALL: u32 = 0x1000_0000;
    pub const GENERIC_EXECUTE: u32 = 0x2000_0000;
    pub const GENERIC_WRITE: u32 = 0x4000_0000;
    pub const GENERIC_READ: u32 = 0x8000_0000;
}

/// Object ACE flags: which GUIDs follow the mask
mod object_flags {
    pub const OBJECT_TYPE_PRESENT: u32 = 0x1;
    pub const INHERITED_OBJECT_TYPE_PRESENT: u32 = 0x2;
}

/// ACE types (MS-DTYP 2.4.4.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum AceType {
    AccessAllowed = 0x00,
    AccessDenied = 0x01,
    SystemAudit = 0x02,
    SystemAlarm = 0x03,
    AccessAllowedObject = 0x05,
    AccessDeniedObject = 0x06,
    SystemAuditObject = 0x07,
    SystemAlarmObject = 0x08,
}

impl AceType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => AceType::AccessAllowed,
            0x01 => AceType::AccessDenied,
            0x02 => AceType::SystemAudit,
            0x03 => AceType::SystemAlarm,
            0x05 => AceType::AccessAllowedObject,
            0x06 => AceType::AccessDeniedObject,
            0x07 => AceType::SystemAuditObject,
            0x08 => AceType::SystemAlarmObject,
            _ => return None,
        })
    }

    /// Object ACEs carry optional object and inherited-object type GUIDs.
    pub fn is_object(self) -> bool {
        matches!(
            self,
            AceType::AccessAllowedObject
                | AceType::AccessDeniedObject
                | AceType::SystemAuditObject
                | AceType::SystemAlarmObject
        )
    }
}

/// An access control entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ace {
    pub ace_type: AceType,
    pub flags: u8,
    pub access_mask: u32,
    pub object_type: Option<Uuid>,
    pub inherited_object_type: Option<Uuid>,
    pub trustee: Sid,
}

impl Ace {
    fn binary_len(&self) -> usize {
        let mut len = ACE_HEADER_LEN + 4 + self.trustee.binary_len();
        if self.ace_type.is_object() {
            len += 4;
            len += 16 * self.object_type.is_some() as usize;
            len += 16 * self.inherited_object_type.is_some() as usize;
        }
        len
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.ace_type as u8);
        out.push(self.flags);
        out.extend_from_slice(&(self.binary_len() as u16).to_le_bytes());
        out.extend_from_slice(&self.access_mask.to_le_bytes());

        if self.ace_type.is_object() {
            let mut flags = 0u32;
            if self.object_type.is_some() {
                flags |= object_flags::OBJECT_TYPE_PRESENT;
            }
            if self.inherited_object_type.is_some() {
                flags |= object_flags::INHERITED_OBJECT_TYPE_PRESENT;
            }
            out.extend_from_slice(&flags.to_le_bytes());
            if let Some(guid) = &self.object_type {
                out.extend_from_slice(&guid.to_bytes_le());
            }
            if let Some(guid) = &self.inherited_object_type {
                out.extend_from_slice(&guid.to_bytes_le());
            }
        }

        self.trustee.write_to(out);
    }

    /// Parse a single ACE; `data` spans exactly the ACE's declared size.
    ///
    /// ```text
    /// type(1) flags(1) size(2) mask(4)
    /// [object_flags(4) [object_guid(16)] [inherited_guid(16)]]
    /// SID
    /// ```
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ACE_HEADER_LEN + 4 {
            return Err(ProvisionError::Decode("ACE too short".to_string()));
        }

        let ace_type = AceType::from_u8(data[0])
            .ok_or_else(|| ProvisionError::Decode(format!("unsupported ACE type 0x{:02x}", data[0])))?;
        let flags = data[1];
        let access_mask = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        let mut offset = 8;
        let mut object_type = None;
        let mut inherited_object_type = None;

        if ace_type.is_object() {
            if data.len() < offset + 4 {
                return Err(ProvisionError::Decode("object ACE missing flags".to_string()));
            }
            let present = read_u32(data, offset);
            offset += 4;

            if present & object_flags::OBJECT_TYPE_PRESENT != 0 {
                object_type = Some(read_guid(data, offset)?);
                offset += 16;
            }
            if present & object_flags::INHERITED_OBJECT_TYPE_PRESENT != 0 {
                inherited_object_type = Some(read_guid(data, offset)?);
                offset += 16;
            }
        }

        let (trustee, _) = Sid::from_bytes(&data[offset..])?;

        Ok(Self {
            ace_type,
            flags,
            access_mask,
            object_type,
            inherited_object_type,
            trustee,
        })
    }
}

fn read_guid(data: &[u8], offset: usize) -> Result<Uuid> {
    let bytes: [u8; 16] = data
        .get(offset..offset + 16)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ProvisionError::Decode("GUID truncated".to_string()))?;
    Ok(Uuid::from_bytes_le(bytes))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// An access control list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acl {
    pub revision: u8,
    pub aces: Vec<Ace>,
}

impl Acl {
    /// Builds an ACL with the DS revision, as every SDDL-built ACL carries.
    pub fn new(aces: Vec<Ace>) -> Self {
        Self {
            revision: ACL_REVISION_DS,
            aces,
        }
    }

    /// Encoded size: the 8-byte header plus every ACE.
    pub fn binary_len(&self) -> usize {
        ACL_HEADER_LEN + self.aces.iter().map(Ace::binary_len).sum::<usize>()
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.push(self.revision);
        out.push(0);
        out.extend_from_slice(&[0, 0]); // size, patched below
        out.extend_from_slice(&(self.aces.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        for ace in &self.aces {
            ace.write_to(out);
        }
        let size = (out.len() - start) as u16;
        out[start + 2..start + 4].copy_from_slice(&size.to_le_bytes());
    }

    /// Parse an ACL starting at the beginning of `bytes`.
    ///
    /// ```text
    /// Offset  Size  Field
    /// 0       1     Revision
    /// 1       1     Sbz1
    /// 2       2     AclSize
    /// 4       2     AceCount
    /// 6       2     Sbz2
    /// 8       ...   ACE entries
    /// ```
    fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ACL_HEADER_LEN {
            return Err(ProvisionError::Decode(
                "ACL too short (minimum 8 bytes)".to_string(),
            ));
        }

        let revision = bytes[0];
        let acl_size = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        let ace_count = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;

        if acl_size < ACL_HEADER_LEN || acl_size > bytes.len() {
            return Err(ProvisionError::Decode(format!(
                "ACL size {} out of bounds ({} bytes available)",
                acl_size,
                bytes.len()
            )));
        }
        let bytes = &bytes[..acl_size];

        let mut aces = Vec::with_capacity(ace_count);
        let mut offset = ACL_HEADER_LEN;
        for index in 0..ace_count {
            if offset + ACE_HEADER_LEN > bytes.len() {
                return Err(ProvisionError::Decode(format!(
                    "ACE {} header past end of ACL",
                    index
                )));
            }
            let ace_size = u16::from_le_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
            if ace_size < ACE_HEADER_LEN || offset + ace_size > bytes.len() {
                return Err(ProvisionError::Decode(format!(
                    "ACE {} size {} out of bounds",
                    index, ace_size
                )));
            }
            aces.push(Ace::parse(&bytes[offset..offset + ace_size])?);
            offset += ace_size;
        }

        Ok(Self { revision, aces })
    }
}

/// A security descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityDescriptor {
    pub revision: u8,
    pub control: u16,
    pub owner: Option<Sid>,
    pub group: Option<Sid>,
    pub sacl: Option<Acl>,
    pub dacl: Option<Acl>,
}

impl SecurityDescriptor {
    pub fn has_control(&self, flag: u16) -> bool {
        self.control & flag != 0
    }

    /// Encodes the descriptor in self-relative form.
    ///
    /// ```text
    /// Offset  Size  Field
    /// 0       1     Revision
    /// 1       1     Sbz1
    /// 2       2     Control flags
    /// 4       4     Owner SID offset
    /// 8       4     Group SID offset
    /// 12      4     SACL offset
    /// 16      4     DACL offset
    /// ```
    ///
    /// ACLs must fit in [`MAX_ACL_LEN`] bytes; the SDDL parser rejects any
    /// that do not.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.push(self.revision);
        out.push(0);
        out.extend_from_slice(&self.control.to_le_bytes());
        out.resize(HEADER_LEN, 0);

        if let Some(owner) = &self.owner {
            patch_offset(&mut out, 4);
            owner.write_to(&mut out);
        }
        if let Some(group) = &self.group {
            patch_offset(&mut out, 8);
            group.write_to(&mut out);
        }
        if let Some(sacl) = &self.sacl {
            patch_offset(&mut out, 12);
            sacl.write_to(&mut out);
        }
        if let Some(dacl) = &self.dacl {
            patch_offset(&mut out, 16);
            dacl.write_to(&mut out);
        }

        out
    }

    /// Decodes a self-relative descriptor.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ProvisionError::Decode(
                "Security descriptor too short (minimum 20 bytes)".to_string(),
            ));
        }

        let revision = bytes[0];
        if revision != SECURITY_DESCRIPTOR_REVISION {
            return Err(ProvisionError::Decode(format!(
                "unsupported security descriptor revision {}",
                revision
            )));
        }
        let control = u16::from_le_bytes([bytes[2], bytes[3]]);

        let owner = section(bytes, 4)?.map(Sid::from_bytes).transpose()?.map(|(sid, _)| sid);
        let group = section(bytes, 8)?.map(Sid::from_bytes).transpose()?.map(|(sid, _)| sid);
        let sacl = section(bytes, 12)?.map(Acl::parse).transpose()?;
        let dacl = section(bytes, 16)?.map(Acl::parse).transpose()?;

        Ok(Self {
            revision,
            control,
            owner,
            group,
            sacl,
            dacl,
        })
    }
}

/// Returns the tail of `bytes` addressed by the offset stored at header
/// `field`, or `None` for a zero offset.
fn section(bytes: &[u8], field: usize) -> Result<Option<&[u8]>> {
    let offset = read_u32(bytes, field) as usize;
    if offset == 0 {
        return Ok(None);
    }
    if offset < HEADER_LEN || offset >= bytes.len() {
        return Err(ProvisionError::Decode(format!(
            "offset {} at header field {} out of bounds",
            offset, field
        )));
    }
    Ok(Some(&bytes[offset..]))
}

/// Records the current end of `out` as the offset stored at header `field`.
fn patch_offset(out: &mut Vec<u8>, field: usize) {
    let offset = out.len() as u32;
    out[field..field + 4].copy_from_slice(&offset.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> Sid {
        s.parse().unwrap()
    }

    fn sample() -> SecurityDescriptor {
        let replication = Uuid::parse_str("1131f6aa-9c07-11d1-f79f-00c04fc2dcd2").unwrap();
        let user_class = Uuid::parse_str("bf967aba-0de6-11d0-a285-00aa003049e2").unwrap();
        SecurityDescriptor {
            revision: SECURITY_DESCRIPTOR_REVISION,
            control: control_flags::SELF_RELATIVE
                | control_flags::DACL_PRESENT
                | control_flags::SACL_PRESENT,
            owner: Some(sid("S-1-5-32-544")),
            group: Some(sid("S-1-5-18")),
            sacl: Some(Acl::new(vec![Ace {
                ace_type: AceType::SystemAudit,
                flags: ace_flags::SUCCESSFUL_ACCESS,
                access_mask: access_rights::ADS_CONTROL_ACCESS,
                object_type: None,
                inherited_object_type: None,
                trustee: sid("S-1-1-0"),
            }])),
            dacl: Some(Acl::new(vec![
                Ace {
                    ace_type: AceType::AccessAllowedObject,
                    flags: ace_flags::CONTAINER_INHERIT | ace_flags::INHERIT_ONLY,
                    access_mask: access_rights::ADS_CONTROL_ACCESS,
                    object_type: Some(replication),
                    inherited_object_type: Some(user_class),
                    trustee: sid("S-1-5-9"),
                },
                Ace {
                    ace_type: AceType::AccessAllowed,
                    flags: 0,
                    access_mask: access_rights::ADS_READ_PROP | access_rights::READ_CONTROL,
                    object_type: None,
                    inherited_object_type: None,
                    trustee: sid("S-1-5-11"),
                },
            ])),
        }
    }

    #[test]
    fn test_acl_revision() {
        let sd = sample();
        assert_eq!(sd.dacl.as_ref().unwrap().revision, ACL_REVISION_DS);
        // no object ACEs, still DS
        assert_eq!(sd.sacl.as_ref().unwrap().revision, ACL_REVISION_DS);

        let bytes = sd.to_bytes();
        assert_eq!(bytes[read_u32(&bytes, 12) as usize], 4);
    }

    #[test]
    fn test_nt4_acl_round_trip() {
        let mut sd = sample();
        sd.sacl.as_mut().unwrap().revision = ACL_REVISION_NT4;
        let decoded = SecurityDescriptor::from_bytes(&sd.to_bytes()).unwrap();
        assert_eq!(decoded.sacl.unwrap().revision, ACL_REVISION_NT4);
    }

    #[test]
    fn test_acl_binary_len() {
        let sd = sample();
        let dacl = sd.dacl.as_ref().unwrap();
        // header + object ACE (56) + S-1-5-11 ACE (20)
        assert_eq!(dacl.binary_len(), 8 + 56 + 20);

        let bytes = sd.to_bytes();
        let dacl_offset = read_u32(&bytes, 16) as usize;
        let size = u16::from_le_bytes([bytes[dacl_offset + 2], bytes[dacl_offset + 3]]);
        assert_eq!(size as usize, dacl.binary_len());
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1], 0);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 0x8014);
        // owner follows the header directly, group follows the owner
        assert_eq!(read_u32(&bytes, 4), 20);
        assert_eq!(read_u32(&bytes, 8), 20 + 16);
        assert_eq!(read_u32(&bytes, 12), 20 + 16 + 12);
    }

    #[test]
    fn test_object_ace_layout() {
        let sd = sample();
        let bytes = sd.to_bytes();
        let dacl_offset = read_u32(&bytes, 16) as usize;
        let ace = &bytes[dacl_offset + ACL_HEADER_LEN..];
        assert_eq!(ace[0], AceType::AccessAllowedObject as u8);
        assert_eq!(ace[1], 0x0a);
        // header + mask + flags + 2 GUIDs + S-1-5-9
        assert_eq!(u16::from_le_bytes([ace[2], ace[3]]), 4 + 4 + 4 + 32 + 12);
        assert_eq!(read_u32(ace, 8), 0x3);
        // GUID fields are stored little-endian
        assert_eq!(&ace[12..16], &[0xaa, 0xf6, 0x31, 0x11]);
    }

    #[test]
    fn test_decode_roundtrip() {
        let sd = sample();
        let decoded = SecurityDescriptor::from_bytes(&sd.to_bytes()).unwrap();
        assert_eq!(decoded, sd);
    }

    #[test]
    fn test_absent_parts_have_zero_offsets() {
        let sd = SecurityDescriptor {
            revision: SECURITY_DESCRIPTOR_REVISION,
            control: control_flags::SELF_RELATIVE,
            owner: None,
            group: None,
            sacl: None,
            dacl: None,
        };
        let bytes = sd.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(SecurityDescriptor::from_bytes(&bytes).unwrap(), sd);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(SecurityDescriptor::from_bytes(&[1, 0, 0, 0x80]).is_err());

        let mut bytes = sample().to_bytes();
        bytes[0] = 2;
        assert!(SecurityDescriptor::from_bytes(&bytes).is_err());

        let mut bytes = sample().to_bytes();
        bytes[4..8].copy_from_slice(&10_000u32.to_le_bytes());
        assert!(SecurityDescriptor::from_bytes(&bytes).is_err());

        let bytes = sample().to_bytes();
        assert!(SecurityDescriptor::from_bytes(&bytes[..bytes.len() - 4]).is_err());
    }
}
