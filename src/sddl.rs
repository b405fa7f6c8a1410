//! Security Descriptor Definition Language (MS-DTYP 2.5.1)
//!
//! Parses SDDL text into a [`SecurityDescriptor`], resolving domain-relative
//! trustee aliases against a caller-supplied domain SID, and formats
//! descriptors back to SDDL.
//!
//! ```text
//! sddl      = *( "O:" sid / "G:" sid / "D:" acl / "S:" acl )
//! acl       = *( "P" / "AR" / "AI" ) *ace
//! ace       = "(" type ";" flags ";" rights ";" [guid] ";" [guid] ";" sid ")"
//! sid       = "S-1-..." / two-letter alias
//! ```

use uuid::Uuid;

use crate::errors::{ProvisionError, Result};
use crate::security_descriptor::{
    ace_flags, control_flags, Ace, AceType, Acl, SecurityDescriptor, MAX_ACL_LEN,
    SECURITY_DESCRIPTOR_REVISION,
};
use crate::sid::{alias_for, resolve_alias, Sid};

const ACE_TYPES: &[(&str, AceType)] = &[
    ("A", AceType::AccessAllowed),
    ("D", AceType::AccessDenied),
    ("AU", AceType::SystemAudit),
    ("AL", AceType::SystemAlarm),
    ("OA", AceType::AccessAllowedObject),
    ("OD", AceType::AccessDeniedObject),
    ("OU", AceType::SystemAuditObject),
    ("OL", AceType::SystemAlarmObject),
];

const ACE_FLAGS: &[(&str, u8)] = &[
    ("OI", ace_flags::OBJECT_INHERIT),
    ("CI", ace_flags::CONTAINER_INHERIT),
    ("NP", ace_flags::NO_PROPAGATE_INHERIT),
    ("IO", ace_flags::INHERIT_ONLY),
    ("ID", ace_flags::INHERITED),
    ("SA", ace_flags::SUCCESSFUL_ACCESS),
    ("FA", ace_flags::FAILED_ACCESS),
];

/// Single-bit rights, in the order they are written back out
const RIGHTS: &[(&str, u32)] = &[
    ("RP", 0x0000_0010),
    ("WP", 0x0000_0020),
    ("CR", 0x0000_0100),
    ("CC", 0x0000_0001),
    ("DC", 0x0000_0002),
    ("LC", 0x0000_0004),
    ("LO", 0x0000_0080),
    ("RC", 0x0002_0000),
    ("WO", 0x0008_0000),
    ("WD", 0x0004_0000),
    ("SD", 0x0001_0000),
    ("DT", 0x0000_0040),
    ("SW", 0x0000_0008),
    ("GA", 0x1000_0000),
    ("GR", 0x8000_0000),
    ("GW", 0x4000_0000),
    ("GX", 0x2000_0000),
];

/// File and registry composites, accepted on input only
const COMPOSITE_RIGHTS: &[(&str, u32)] = &[
    ("FA", 0x001f_01ff),
    ("FR", 0x0012_0089),
    ("FW", 0x0012_0116),
    ("FX", 0x0012_00a0),
    ("KA", 0x000f_003f),
    ("KR", 0x0002_0019),
    ("KW", 0x0002_0006),
    ("KX", 0x0002_0019),
];

/// Which ACL an `D:`/`S:` component describes
#[derive(Clone, Copy)]
enum AclKind {
    Dacl,
    Sacl,
}

impl AclKind {
    fn present(self) -> u16 {
        match self {
            AclKind::Dacl => control_flags::DACL_PRESENT,
            AclKind::Sacl => control_flags::SACL_PRESENT,
        }
    }

    fn protected(self) -> u16 {
        match self {
            AclKind::Dacl => control_flags::DACL_PROTECTED,
            AclKind::Sacl => control_flags::SACL_PROTECTED,
        }
    }

    fn auto_inherit_req(self) -> u16 {
        match self {
            AclKind::Dacl => control_flags::DACL_AUTO_INHERIT_REQ,
            AclKind::Sacl => control_flags::SACL_AUTO_INHERIT_REQ,
        }
    }

    fn auto_inherited(self) -> u16 {
        match self {
            AclKind::Dacl => control_flags::DACL_AUTO_INHERITED,
            AclKind::Sacl => control_flags::SACL_AUTO_INHERITED,
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    domain_sid: &'a Sid,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ProvisionError {
        ProvisionError::grammar(self.pos, message)
    }

    fn parse_descriptor(&mut self) -> Result<SecurityDescriptor> {
        let mut sd = SecurityDescriptor {
            revision: SECURITY_DESCRIPTOR_REVISION,
            control: control_flags::SELF_RELATIVE,
            owner: None,
            group: None,
            sacl: None,
            dacl: None,
        };

        while !self.rest().is_empty() {
            let start = self.pos;
            if self.eat("O:") {
                if sd.owner.is_some() {
                    return Err(ProvisionError::grammar(start, "duplicate owner"));
                }
                sd.owner = Some(self.parse_sid(false)?);
            } else if self.eat("G:") {
                if sd.group.is_some() {
                    return Err(ProvisionError::grammar(start, "duplicate group"));
                }
                sd.group = Some(self.parse_sid(false)?);
            } else if self.eat("D:") {
                if sd.dacl.is_some() {
                    return Err(ProvisionError::grammar(start, "duplicate DACL"));
                }
                sd.dacl = Some(self.parse_acl(AclKind::Dacl, &mut sd.control)?);
            } else if self.eat("S:") {
                if sd.sacl.is_some() {
                    return Err(ProvisionError::grammar(start, "duplicate SACL"));
                }
                sd.sacl = Some(self.parse_acl(AclKind::Sacl, &mut sd.control)?);
            } else {
                return Err(self.error("expected 'O:', 'G:', 'D:' or 'S:'"));
            }
        }

        Ok(sd)
    }

    fn parse_acl(&mut self, kind: AclKind, control: &mut u16) -> Result<Acl> {
        let start = self.pos;
        *control |= kind.present();
        loop {
            if self.eat("P") {
                *control |= kind.protected();
            } else if self.eat("AR") {
                *control |= kind.auto_inherit_req();
            } else if self.eat("AI") {
                *control |= kind.auto_inherited();
            } else {
                break;
            }
        }

        let mut aces = Vec::new();
        while self.eat("(") {
            aces.push(self.parse_ace()?);
        }
        let acl = Acl::new(aces);
        if acl.binary_len() > MAX_ACL_LEN {
            return Err(ProvisionError::grammar(
                start,
                format!("ACL of {} bytes exceeds {}", acl.binary_len(), MAX_ACL_LEN),
            ));
        }
        Ok(acl)
    }

    /// Parses the body of an ACE after the opening parenthesis.
    fn parse_ace(&mut self) -> Result<Ace> {
        let start = self.pos;
        let end = self.rest().find(')').map(|i| self.pos + i).ok_or_else(|| {
            ProvisionError::grammar(start, "unterminated ACE")
        })?;
        let body = &self.text[start..end];

        let mut fields = Vec::with_capacity(6);
        let mut field_start = start;
        for field in body.split(';') {
            fields.push((field_start, field));
            field_start += field.len() + 1;
        }
        if fields.len() != 6 {
            return Err(ProvisionError::grammar(
                start,
                format!("ACE has {} fields, expected 6", fields.len()),
            ));
        }

        let (at, code) = fields[0];
        let ace_type = ACE_TYPES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, t)| *t)
            .ok_or_else(|| ProvisionError::grammar(at, format!("unknown ACE type '{}'", code)))?;

        let (at, text) = fields[1];
        let flags = parse_codes(text, ACE_FLAGS, at, "ACE flag")?;

        let (at, text) = fields[2];
        let access_mask = parse_rights(text, at)?;

        let object_type = parse_guid(fields[3].1, fields[3].0)?;
        let inherited_object_type = parse_guid(fields[4].1, fields[4].0)?;
        if !ace_type.is_object() && (object_type.is_some() || inherited_object_type.is_some()) {
            return Err(ProvisionError::grammar(
                fields[3].0,
                format!("ACE type '{}' cannot carry object GUIDs", code),
            ));
        }

        let (at, text) = fields[5];
        if text.is_empty() {
            return Err(ProvisionError::grammar(at, "empty trustee"));
        }
        self.pos = at;
        let trustee = self.parse_sid(true)?;
        if self.pos != end {
            return Err(self.error("trailing characters after trustee"));
        }
        self.pos = end + 1;

        Ok(Ace {
            ace_type,
            flags,
            access_mask,
            object_type,
            inherited_object_type,
            trustee,
        })
    }

    /// Parses a SID literal or two-letter alias at the cursor.
    ///
    /// Inside an ACE the literal runs to the closing parenthesis; for owner
    /// and group it stops at the first character that cannot belong to a SID.
    fn parse_sid(&mut self, in_ace: bool) -> Result<Sid> {
        let start = self.pos;
        let rest = self.rest();

        if rest.starts_with("S-") {
            let len = if in_ace {
                rest.find(')').unwrap_or(rest.len())
            } else {
                2 + rest[2..]
                    .find(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | 'x' | 'a'..='f')))
                    .unwrap_or(rest.len() - 2)
            };
            let literal = &rest[..len];
            let sid = literal
                .parse::<Sid>()
                .map_err(|e| ProvisionError::grammar(start, e.to_string()))?;
            self.pos += len;
            return Ok(sid);
        }

        let code = rest
            .get(..2)
            .ok_or_else(|| self.error("expected SID or alias"))?;
        let sid = resolve_alias(code, self.domain_sid)
            .ok_or_else(|| self.error(format!("unknown SID alias '{}'", code)))?;
        self.pos += 2;
        Ok(sid)
    }
}

/// Parses concatenated two-letter codes against `table`, OR-ing the values.
fn parse_codes(text: &str, table: &[(&str, u8)], at: usize, what: &str) -> Result<u8> {
    let mut value = 0;
    let mut offset = 0;
    while offset < text.len() {
        let code = text
            .get(offset..offset + 2)
            .ok_or_else(|| ProvisionError::grammar(at + offset, format!("truncated {}", what)))?;
        let bits = table
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, v)| *v)
            .ok_or_else(|| {
                ProvisionError::grammar(at + offset, format!("unknown {} '{}'", what, code))
            })?;
        value |= bits;
        offset += 2;
    }
    Ok(value)
}

fn parse_rights(text: &str, at: usize) -> Result<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16)
            .map_err(|_| ProvisionError::grammar(at, format!("bad access mask '{}'", text)));
    }
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return text
            .parse()
            .map_err(|_| ProvisionError::grammar(at, format!("bad access mask '{}'", text)));
    }

    let mut mask = 0;
    let mut offset = 0;
    while offset < text.len() {
        let code = text
            .get(offset..offset + 2)
            .ok_or_else(|| ProvisionError::grammar(at + offset, "truncated access right"))?;
        let bits = RIGHTS
            .iter()
            .chain(COMPOSITE_RIGHTS)
            .find(|(c, _)| *c == code)
            .map(|(_, v)| *v)
            .ok_or_else(|| {
                ProvisionError::grammar(at + offset, format!("unknown access right '{}'", code))
            })?;
        mask |= bits;
        offset += 2;
    }
    Ok(mask)
}

fn parse_guid(text: &str, at: usize) -> Result<Option<Uuid>> {
    if text.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(text)
        .map(Some)
        .map_err(|e| ProvisionError::grammar(at, format!("bad GUID '{}': {}", text, e)))
}

impl SecurityDescriptor {
    /// Parses SDDL text. Domain-relative aliases such as `DA` or `EA`
    /// resolve against `domain_sid`.
    pub fn from_sddl(sddl: &str, domain_sid: &Sid) -> Result<Self> {
        if let Some(pos) = sddl.find(|c: char| !c.is_ascii()) {
            return Err(ProvisionError::grammar(pos, "non-ASCII character"));
        }
        Parser {
            text: sddl,
            pos: 0,
            domain_sid,
        }
        .parse_descriptor()
    }

    /// Formats the descriptor as SDDL, using aliases where one exists.
    pub fn to_sddl(&self, domain_sid: &Sid) -> String {
        let mut out = String::new();
        if let Some(owner) = &self.owner {
            out.push_str("O:");
            out.push_str(&format_sid(owner, domain_sid));
        }
        if let Some(group) = &self.group {
            out.push_str("G:");
            out.push_str(&format_sid(group, domain_sid));
        }
        if let Some(dacl) = &self.dacl {
            out.push_str("D:");
            self.format_acl(AclKind::Dacl, dacl, domain_sid, &mut out);
        }
        if let Some(sacl) = &self.sacl {
            out.push_str("S:");
            self.format_acl(AclKind::Sacl, sacl, domain_sid, &mut out);
        }
        out
    }

    fn format_acl(&self, kind: AclKind, acl: &Acl, domain_sid: &Sid, out: &mut String) {
        if self.has_control(kind.protected()) {
            out.push('P');
        }
        if self.has_control(kind.auto_inherit_req()) {
            out.push_str("AR");
        }
        if self.has_control(kind.auto_inherited()) {
            out.push_str("AI");
        }
        for ace in &acl.aces {
            format_ace(ace, domain_sid, out);
        }
    }
}

fn format_sid(sid: &Sid, domain_sid: &Sid) -> String {
    alias_for(sid, domain_sid)
        .map(str::to_string)
        .unwrap_or_else(|| sid.to_string())
}

fn format_ace(ace: &Ace, domain_sid: &Sid, out: &mut String) {
    let type_code = ACE_TYPES
        .iter()
        .find(|(_, t)| *t == ace.ace_type)
        .map(|(c, _)| *c)
        .unwrap_or("A");

    let flags: String = ACE_FLAGS
        .iter()
        .filter(|(_, bit)| ace.flags & bit != 0)
        .map(|(c, _)| *c)
        .collect();

    let guid = |g: &Option<Uuid>| g.map(|g| g.hyphenated().to_string()).unwrap_or_default();

    out.push_str(&format!(
        "({};{};{};{};{};{})",
        type_code,
        flags,
        format_rights(ace.access_mask),
        guid(&ace.object_type),
        guid(&ace.inherited_object_type),
        format_sid(&ace.trustee, domain_sid)
    ));
}

fn format_rights(mask: u32) -> String {
    let known = RIGHTS.iter().fold(0u32, |acc, (_, bit)| acc | bit);
    if mask & !known != 0 {
        return format!("0x{:08x}", mask);
    }
    RIGHTS
        .iter()
        .filter(|(_, bit)| mask & bit != 0)
        .map(|(c, _)| *c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security_descriptor::{access_rights, ACL_REVISION_DS};

    fn domain() -> Sid {
        "S-1-5-21-2212615479-2695158682-2101375467".parse().unwrap()
    }

    #[test]
    fn test_owner_group_aliases() {
        let domain = domain();
        let sd = SecurityDescriptor::from_sddl("O:EAG:DA", &domain).unwrap();
        assert_eq!(sd.owner, Some(domain.with_rid(519).unwrap()));
        assert_eq!(sd.group, Some(domain.with_rid(512).unwrap()));
        assert!(sd.dacl.is_none());
        assert!(sd.sacl.is_none());
        assert_eq!(sd.control, control_flags::SELF_RELATIVE);
    }

    #[test]
    fn test_literal_sid_owner() {
        let sd =
            SecurityDescriptor::from_sddl("O:S-1-5-21-1-2-3-500G:BAD:", &domain()).unwrap();
        assert_eq!(sd.owner.unwrap().to_string(), "S-1-5-21-1-2-3-500");
        assert_eq!(sd.group.unwrap().to_string(), "S-1-5-32-544");
        assert!(sd.dacl.unwrap().aces.is_empty());
    }

    #[test]
    fn test_acl_flags() {
        let sd = SecurityDescriptor::from_sddl("D:PAI(A;;RP;;;WD)S:AI", &domain()).unwrap();
        assert!(sd.has_control(control_flags::DACL_PRESENT));
        assert!(sd.has_control(control_flags::DACL_PROTECTED));
        assert!(sd.has_control(control_flags::DACL_AUTO_INHERITED));
        assert!(sd.has_control(control_flags::SACL_PRESENT));
        assert!(sd.has_control(control_flags::SACL_AUTO_INHERITED));
        assert!(!sd.has_control(control_flags::SACL_PROTECTED));
    }

    #[test]
    fn test_rights_codes() {
        let sd = SecurityDescriptor::from_sddl(
            "D:(A;CI;RPWPCRCCDCLCLORCWOWDSDDTSW;;;EA)",
            &domain(),
        )
        .unwrap();
        let ace = &sd.dacl.unwrap().aces[0];
        assert_eq!(ace.access_mask, 0x000f_01ff);
        assert_eq!(ace.flags, ace_flags::CONTAINER_INHERIT);
        assert_eq!(ace.ace_type, AceType::AccessAllowed);
    }

    #[test]
    fn test_numeric_rights() {
        let sd = SecurityDescriptor::from_sddl("D:(A;;0x1f01ff;;;SY)(D;;16;;;AN)", &domain())
            .unwrap();
        let dacl = sd.dacl.unwrap();
        assert_eq!(dacl.aces[0].access_mask, 0x001f_01ff);
        assert_eq!(dacl.aces[1].access_mask, access_rights::ADS_READ_PROP);
        assert_eq!(dacl.aces[1].ace_type, AceType::AccessDenied);
    }

    #[test]
    fn test_object_ace() {
        let sd = SecurityDescriptor::from_sddl(
            "D:(OA;CIIO;RP;4c164200-20c0-11d0-a768-00aa006e0529;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
            &domain(),
        )
        .unwrap();
        let dacl = sd.dacl.unwrap();
        assert_eq!(dacl.revision, ACL_REVISION_DS);
        let ace = &dacl.aces[0];
        assert_eq!(ace.ace_type, AceType::AccessAllowedObject);
        assert_eq!(
            ace.object_type.unwrap().to_string(),
            "4c164200-20c0-11d0-a768-00aa006e0529"
        );
        assert_eq!(
            ace.inherited_object_type.unwrap().to_string(),
            "bf967aba-0de6-11d0-a285-00aa003049e2"
        );
        assert_eq!(ace.trustee.to_string(), "S-1-5-32-554");
    }

    #[test]
    fn test_audit_ace() {
        let sd = SecurityDescriptor::from_sddl("S:(AU;SA;WPWOWD;;;WD)", &domain()).unwrap();
        let sacl = sd.sacl.unwrap();
        assert_eq!(sacl.revision, ACL_REVISION_DS);
        let ace = &sacl.aces[0];
        assert_eq!(ace.ace_type, AceType::SystemAudit);
        assert_eq!(ace.flags, ace_flags::SUCCESSFUL_ACCESS);
        assert_eq!(
            ace.access_mask,
            access_rights::ADS_WRITE_PROP | access_rights::WRITE_OWNER | access_rights::WRITE_DAC
        );
        assert_eq!(ace.trustee.to_string(), "S-1-1-0");
    }

    #[test]
    fn test_literal_trustee() {
        let sd = SecurityDescriptor::from_sddl("D:(A;;RP;;;S-1-5-21-9-8-7-1105)", &domain())
            .unwrap();
        assert_eq!(
            sd.dacl.unwrap().aces[0].trustee.to_string(),
            "S-1-5-21-9-8-7-1105"
        );
    }

    #[test]
    fn test_errors_carry_offsets() {
        let cases: &[(&str, usize)] = &[
            ("X:BA", 0),
            ("O:ZZ", 2),
            ("D:(X;;RP;;;WD)", 3),
            ("D:(A;QQ;RP;;;WD)", 5),
            ("D:(A;;RPZZ;;;WD)", 8),
            ("D:(A;;RP;not-a-guid;;WD)", 9),
            ("D:(A;;RP;;;WD", 3),
            ("D:(A;;RP;;WD)", 3),
            ("O:BAO:SY", 4),
        ];
        for (sddl, offset) in cases {
            match SecurityDescriptor::from_sddl(sddl, &domain()) {
                Err(ProvisionError::GrammarParse { offset: got, .. }) => {
                    assert_eq!(got, *offset, "offset for {}", sddl)
                }
                other => panic!("{} should fail to parse, got {:?}", sddl, other),
            }
        }
    }

    #[test]
    fn test_plain_acl_has_ds_revision() {
        let sd = SecurityDescriptor::from_sddl("D:(A;;RP;;;WD)", &domain()).unwrap();
        assert_eq!(sd.dacl.unwrap().revision, ACL_REVISION_DS);
    }

    #[test]
    fn test_oversized_acl_rejected() {
        // each (A;;RP;;;WD) encodes to 20 bytes
        let fits = format!("D:{}", "(A;;RP;;;WD)".repeat(3276));
        let sd = SecurityDescriptor::from_sddl(&fits, &domain()).unwrap();
        assert_eq!(sd.dacl.as_ref().unwrap().binary_len(), 65528);
        let bytes = sd.to_bytes();
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 65528);

        let too_big = format!("O:SYD:{}", "(A;;RP;;;WD)".repeat(3277));
        match SecurityDescriptor::from_sddl(&too_big, &domain()) {
            Err(ProvisionError::GrammarParse { offset, .. }) => assert_eq!(offset, 6),
            other => panic!("oversized ACL should fail to parse, got {:?}", other),
        }
    }

    #[test]
    fn test_guid_on_plain_ace_rejected() {
        let err = SecurityDescriptor::from_sddl(
            "D:(A;;RP;4c164200-20c0-11d0-a768-00aa006e0529;;WD)",
            &domain(),
        )
        .unwrap_err();
        assert!(matches!(err, ProvisionError::GrammarParse { .. }));
    }

    #[test]
    fn test_to_sddl_reproduces_canonical_text() {
        let text = "O:EAG:EAD:AI(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;ED)\
                    (A;CIIO;RPWPCRCCLCLORCWOWDSDSW;;;DA)(A;;RPLCLORC;;;AU)\
                    S:(AU;SA;CR;;;BA)(OU;CISA;WP;f30e3bbe-9ff0-11d1-b603-0000f80367c1;bf967aa5-0de6-11d0-a285-00aa003049e2;WD)";
        let sd = SecurityDescriptor::from_sddl(text, &domain()).unwrap();
        assert_eq!(sd.to_sddl(&domain()), text);
    }

    #[test]
    fn test_to_sddl_unknown_bits_as_hex() {
        let sd = SecurityDescriptor::from_sddl("D:(A;;0x00000200;;;SY)", &domain()).unwrap();
        assert_eq!(sd.to_sddl(&domain()), "D:(A;;0x00000200;;;SY)");
    }
}
