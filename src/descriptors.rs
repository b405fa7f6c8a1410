//! Default security descriptors of the well-known naming contexts
//!
//! Each partition head gets a fixed SDDL grammar; only the domain SID
//! substituted for domain-relative trustees (`DA`, `DU`, `DD`, `EA`) varies
//! between provisioned domains. The schema partition's descriptor is produced
//! alongside the schema itself and is not part of this module.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::errors::{ProvisionError, Result};
use crate::security_descriptor::SecurityDescriptor;
use crate::sid::Sid;

/// Configuration naming context (`CN=Configuration,...`)
pub const CONFIG_PARTITION_SDDL: &str = concat!(
    "O:EAG:EAD:",
    "(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6ab-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6ac-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ab-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ac-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(A;;RPLCLORC;;;AU)",
    "(A;CI;RPWPCRCCDCLCLORCWOWDSDDTSW;;;EA)",
    "(A;;RPWPCRCCDCLCLORCWOWDSDDTSW;;;SY)",
    "(A;CIIO;RPWPCRCCLCLORCWOWDSDSW;;;DA)",
    "(OA;;CR;1131f6ad-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;89e95b76-444d-4c62-991a-0facbeda640c;;ED)",
    "(OA;;CR;1131f6ad-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;89e95b76-444d-4c62-991a-0facbeda640c;;BA)",
    "(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;RO)",
    "S:",
    "(AU;SA;WPWOWD;;;WD)",
    "(AU;SA;CR;;;BA)",
    "(AU;SA;CR;;;DU)",
    "(OU;SA;CR;45ec5156-db7e-47bb-b53f-dbeb2d03c40f;;WD)",
);

/// Domain naming context (`DC=example,DC=com`)
pub const DOMAIN_PARTITION_SDDL: &str = concat!(
    "O:BAG:BAD:AI",
    "(OA;CIIO;RP;4c164200-20c0-11d0-a768-00aa006e0529;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;4c164200-20c0-11d0-a768-00aa006e0529;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RP;5f202010-79a5-11d0-9020-00c04fc2d4cf;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;5f202010-79a5-11d0-9020-00c04fc2d4cf;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RP;bc0ac240-79a9-11d0-9020-00c04fc2d4cf;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;bc0ac240-79a9-11d0-9020-00c04fc2d4cf;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RP;59ba2f42-79a2-11d0-9020-00c04fc2d3cf;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;59ba2f42-79a2-11d0-9020-00c04fc2d3cf;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RP;037088f8-0ae1-11d2-b422-00a0c968f939;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;037088f8-0ae1-11d2-b422-00a0c968f939;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;RO)",
    "(OA;;CR;1131f6ad-9c07-11d1-f79f-00c04fc2dcd2;;DD)",
    "(OA;CIIO;RP;b7c69e6d-2cc7-11d2-854e-00a0c983f608;bf967a86-0de6-11d0-a285-00aa003049e2;ED)",
    "(OA;CIIO;RP;b7c69e6d-2cc7-11d2-854e-00a0c983f608;bf967a9c-0de6-11d0-a285-00aa003049e2;ED)",
    "(OA;CIIO;RP;b7c69e6d-2cc7-11d2-854e-00a0c983f608;bf967aba-0de6-11d0-a285-00aa003049e2;ED)",
    "(OA;;CR;89e95b76-444d-4c62-991a-0facbeda640c;;BA)",
    "(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ab-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ac-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ad-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ae-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;e2a36dc9-ae17-47c3-b58b-be34c55ba633;;IF)",
    "(OA;;RP;c7407360-20bf-11d0-a768-00aa006e0529;;RU)",
    "(OA;;RP;b8119fd0-04f6-4762-ab7a-4986c76b3f9a;;RU)",
    "(OA;CIIO;RPLCLORC;;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RPLCLORC;;bf967a9c-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RPLCLORC;;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;;CR;05c74c5e-4deb-43b4-bd9f-86664c2a7fd5;;AU)",
    "(OA;;CR;89e95b76-444d-4c62-991a-0facbeda640c;;ED)",
    "(OA;;CR;ccc2dc7d-a6ad-4a7a-8846-c04e3cc53501;;AU)",
    "(OA;;CR;280f369c-67c7-438e-ae98-1d46f3c6f541;;AU)",
    "(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6ab-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6ac-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6ae-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;RP;b8119fd0-04f6-4762-ab7a-4986c76b3f9a;;AU)",
    "(OA;CIIO;RPWPCR;91e647de-d96f-4b70-9557-d63ff4f3ccd8;;PS)",
    "(A;;RPWPCRCCLCLORCWOWDSW;;;DA)",
    "(A;CI;RPWPCRCCDCLCLORCWOWDSDDTSW;;;EA)",
    "(A;;RPRC;;;RU)",
    "(A;CI;LC;;;RU)",
    "(A;CI;RPWPCRCCLCLORCWOWDSDSW;;;BA)",
    "(A;;RP;;;WD)",
    "(A;;RPLCLORC;;;ED)",
    "(A;;RPLCLORC;;;AU)",
    "(A;;RPWPCRCCDCLCLORCWOWDSDDTSW;;;SY)",
    "S:AI",
    "(OU;CISA;WP;f30e3bbe-9ff0-11d1-b603-0000f80367c1;bf967aa5-0de6-11d0-a285-00aa003049e2;WD)",
    "(OU;CISA;WP;f30e3bbf-9ff0-11d1-b603-0000f80367c1;bf967aa5-0de6-11d0-a285-00aa003049e2;WD)",
    "(AU;SA;CR;;;DU)",
    "(AU;SA;CR;;;BA)",
    "(AU;SA;WPWOWD;;;WD)",
);

/// DNS application partitions (`DC=DomainDnsZones,...`, `DC=ForestDnsZones,...`)
pub const DNS_PARTITION_SDDL: &str = concat!(
    "O:SYG:BAD:AI",
    "(OA;CIIO;RP;4c164200-20c0-11d0-a768-00aa006e0529;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;4c164200-20c0-11d0-a768-00aa006e0529;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RP;5f202010-79a5-11d0-9020-00c04fc2d4cf;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;5f202010-79a5-11d0-9020-00c04fc2d4cf;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RP;bc0ac240-79a9-11d0-9020-00c04fc2d4cf;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;bc0ac240-79a9-11d0-9020-00c04fc2d4cf;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RP;59ba2f42-79a2-11d0-9020-00c04fc2d3cf;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;59ba2f42-79a2-11d0-9020-00c04fc2d3cf;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RP;037088f8-0ae1-11d2-b422-00a0c968f939;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RP;037088f8-0ae1-11d2-b422-00a0c968f939;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;RO)",
    "(OA;CIIO;RP;b7c69e6d-2cc7-11d2-854e-00a0c983f608;bf967a86-0de6-11d0-a285-00aa003049e2;ED)",
    "(OA;CIIO;RP;b7c69e6d-2cc7-11d2-854e-00a0c983f608;bf967a9c-0de6-11d0-a285-00aa003049e2;ED)",
    "(OA;CIIO;RP;b7c69e6d-2cc7-11d2-854e-00a0c983f608;bf967aba-0de6-11d0-a285-00aa003049e2;ED)",
    "(OA;;CR;89e95b76-444d-4c62-991a-0facbeda640c;;BA)",
    "(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ab-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ac-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ad-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;1131f6ae-9c07-11d1-f79f-00c04fc2dcd2;;BA)",
    "(OA;;CR;e2a36dc9-ae17-47c3-b58b-be34c55ba633;;IF)",
    "(OA;;RP;c7407360-20bf-11d0-a768-00aa006e0529;;RU)",
    "(OA;;RP;b8119fd0-04f6-4762-ab7a-4986c76b3f9a;;RU)",
    "(OA;CIIO;RPLCLORC;;4828cc14-1437-45bc-9b07-ad6f015e5f28;RU)",
    "(OA;CIIO;RPLCLORC;;bf967a9c-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;CIIO;RPLCLORC;;bf967aba-0de6-11d0-a285-00aa003049e2;RU)",
    "(OA;;CR;05c74c5e-4deb-43b4-bd9f-86664c2a7fd5;;AU)",
    "(OA;;CR;89e95b76-444d-4c62-991a-0facbeda640c;;ED)",
    "(OA;;CR;ccc2dc7d-a6ad-4a7a-8846-c04e3cc53501;;AU)",
    "(OA;;CR;280f369c-67c7-438e-ae98-1d46f3c6f541;;AU)",
    "(OA;;CR;1131f6aa-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6ab-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6ac-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6ad-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;CR;1131f6ae-9c07-11d1-f79f-00c04fc2dcd2;;ED)",
    "(OA;;RP;b8119fd0-04f6-4762-ab7a-4986c76b3f9a;;AU)",
    "(OA;CIIO;RPWPCR;91e647de-d96f-4b70-9557-d63ff4f3ccd8;;PS)",
    "(A;;RPWPCRCCLCLORCWOWDSW;;;DA)",
    "(A;CI;RPWPCRCCDCLCLORCWOWDSDDTSW;;;EA)",
    "(A;;RPRC;;;RU)",
    "(A;CI;LC;;;RU)",
    "(A;CI;RPWPCRCCLCLORCWOWDSDSW;;;BA)",
    "(A;;RP;;;WD)",
    "(A;;RPLCLORC;;;ED)",
    "(A;;RPLCLORC;;;AU)",
    "(A;;RPWPCRCCDCLCLORCWOWDSDDTSW;;;SY)",
    "S:AI",
    "(OU;CISA;WP;f30e3bbe-9ff0-11d1-b603-0000f80367c1;bf967aa5-0de6-11d0-a285-00aa003049e2;WD)",
    "(OU;CISA;WP;f30e3bbf-9ff0-11d1-b603-0000f80367c1;bf967aa5-0de6-11d0-a285-00aa003049e2;WD)",
    "(AU;SA;CR;;;DU)",
    "(AU;SA;CR;;;BA)",
    "(AU;SA;WPWOWD;;;WD)",
);

/// The naming contexts with a provisioned default descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    Configuration,
    Domain,
    DnsZones,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [
        PartitionKind::Configuration,
        PartitionKind::Domain,
        PartitionKind::DnsZones,
    ];

    /// The fixed SDDL grammar for this partition.
    pub fn sddl(self) -> &'static str {
        match self {
            PartitionKind::Configuration => CONFIG_PARTITION_SDDL,
            PartitionKind::Domain => DOMAIN_PARTITION_SDDL,
            PartitionKind::DnsZones => DNS_PARTITION_SDDL,
        }
    }

    /// The parsed descriptor for `domain_sid`.
    pub fn descriptor(self, domain_sid: &Sid) -> Result<SecurityDescriptor> {
        SecurityDescriptor::from_sddl(self.sddl(), domain_sid)
    }

    /// The descriptor for `domain_sid` in self-relative binary form.
    pub fn build(self, domain_sid: &Sid) -> Result<Vec<u8>> {
        let bytes = self.descriptor(domain_sid)?.to_bytes();
        debug!(
            "Built {} partition descriptor for {} ({} bytes)",
            self, domain_sid, bytes.len()
        );
        Ok(bytes)
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PartitionKind::Configuration => "configuration",
            PartitionKind::Domain => "domain",
            PartitionKind::DnsZones => "dns",
        })
    }
}

impl FromStr for PartitionKind {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "configuration" | "config" => Ok(PartitionKind::Configuration),
            "domain" => Ok(PartitionKind::Domain),
            "dns" | "dnszones" | "dns-zones" => Ok(PartitionKind::DnsZones),
            other => Err(ProvisionError::Config(format!(
                "unknown partition '{}' (expected configuration, domain or dns)",
                other
            ))),
        }
    }
}

/// Security descriptor for the configuration partition head.
pub fn config_partition_descriptor(domain_sid: &Sid) -> Result<Vec<u8>> {
    PartitionKind::Configuration.build(domain_sid)
}

/// Security descriptor for the domain partition head.
pub fn domain_partition_descriptor(domain_sid: &Sid) -> Result<Vec<u8>> {
    PartitionKind::Domain.build(domain_sid)
}

/// Security descriptor for the DNS application partitions.
pub fn dns_partition_descriptor(domain_sid: &Sid) -> Result<Vec<u8>> {
    PartitionKind::DnsZones.build(domain_sid)
}
