//! Self-relative security descriptor parsing
//!
//! Security descriptor properties arrive in their native self-relative
//! binary form. This module turns that blob into owner/group SIDs and the
//! system and discretionary ACLs, enough to render them for display.

use crate::core::error::DecodeError;
use serde::Serialize;
use std::fmt;

const SD_HEADER_LEN: usize = 20;
const ACL_HEADER_LEN: usize = 8;
const ACE_HEADER_LEN: usize = 4;

/// Control bit: the descriptor carries a discretionary ACL
pub const SE_DACL_PRESENT: u16 = 0x0004;
/// Control bit: the descriptor carries a system ACL
pub const SE_SACL_PRESENT: u16 = 0x0010;
/// Control bit: the descriptor uses offsets rather than pointers
pub const SE_SELF_RELATIVE: u16 = 0x8000;

/// Security identifier (`S-1-5-32-544` and friends)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sid {
    pub revision: u8,
    pub authority: u64,
    pub sub_authorities: Vec<u32>,
}

impl Sid {
    /// Parse a SID at the start of `bytes`, returning it and its length
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        if bytes.len() < 8 {
            return Err(invalid("SID header truncated"));
        }
        let revision = bytes[0];
        if revision != 1 {
            return Err(invalid(&format!("unknown SID revision {}", revision)));
        }
        let count = bytes[1] as usize;
        if count > 15 {
            return Err(invalid("too many SID sub-authorities"));
        }
        let len = 8 + count * 4;
        if bytes.len() < len {
            return Err(invalid("SID sub-authorities truncated"));
        }

        // The identifier authority is a 48-bit big-endian value
        let authority = bytes[2..8]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
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
            write!(f, "0x{:012X}", self.authority)?;
        } else {
            write!(f, "{}", self.authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

/// One access control entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ace {
    pub ace_type: u8,
    pub flags: u8,
    pub mask: u32,
    /// Trustee, for the entry types that carry it right after the mask
    pub sid: Option<Sid>,
}

impl Ace {
    /// Short type label used when rendering
    pub fn type_label(&self) -> &'static str {
        match self.ace_type {
            0x00 => "A",
            0x01 => "D",
            0x02 => "AU",
            0x03 => "AL",
            0x05 => "OA",
            0x06 => "OD",
            0x07 => "OU",
            0x08 => "OL",
            0x11 => "ML",
            0x12 => "RA",
            0x13 => "SP",
            _ => "?",
        }
    }

    fn has_plain_sid(ace_type: u8) -> bool {
        matches!(ace_type, 0x00..=0x03 | 0x09 | 0x0A | 0x0D | 0x11..=0x13)
    }
}

/// Access control list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acl {
    pub revision: u8,
    pub aces: Vec<Ace>,
}

impl Acl {
    fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < ACL_HEADER_LEN {
            return Err(invalid("ACL header truncated"));
        }
        let revision = bytes[0];
        let size = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        let count = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
        if size < ACL_HEADER_LEN || size > bytes.len() {
            return Err(invalid("ACL size out of range"));
        }

        let body = &bytes[..size];
        let mut offset = ACL_HEADER_LEN;
        let mut aces = Vec::with_capacity(count);
        for _ in 0..count {
            let header = body
                .get(offset..offset + ACE_HEADER_LEN)
                .ok_or_else(|| invalid("ACE header truncated"))?;
            let ace_type = header[0];
            let flags = header[1];
            let ace_size = u16::from_le_bytes([header[2], header[3]]) as usize;
            if ace_size < ACE_HEADER_LEN + 4 {
                return Err(invalid("ACE too small"));
            }
            let ace = body
                .get(offset..offset + ace_size)
                .ok_or_else(|| invalid("ACE truncated"))?;
            let mask = u32::from_le_bytes([ace[4], ace[5], ace[6], ace[7]]);
            let sid = if Ace::has_plain_sid(ace_type) {
                Some(Sid::parse(&ace[8..])?.0)
            } else {
                None
            };
            aces.push(Ace {
                ace_type,
                flags,
                mask,
                sid,
            });
            offset += ace_size;
        }

        Ok(Self { revision, aces })
    }
}

/// Parsed self-relative security descriptor
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
    /// Parse a self-relative descriptor
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < SD_HEADER_LEN {
            return Err(invalid("descriptor header truncated"));
        }
        let revision = bytes[0];
        if revision != 1 {
            return Err(invalid(&format!("unknown revision {}", revision)));
        }
        let control = u16::from_le_bytes([bytes[2], bytes[3]]);
        if control & SE_SELF_RELATIVE == 0 {
            return Err(invalid("descriptor is not self-relative"));
        }

        let offset_at = |pos: usize| {
            u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
                as usize
        };
        let section = |offset: usize| -> Result<Option<&[u8]>, DecodeError> {
            match offset {
                0 => Ok(None),
                o if o < SD_HEADER_LEN || o >= bytes.len() => {
                    Err(invalid("component offset out of range"))
                }
                o => Ok(Some(&bytes[o..])),
            }
        };

        let owner = section(offset_at(4))?
            .map(|b| Sid::parse(b).map(|(sid, _)| sid))
            .transpose()?;
        let group = section(offset_at(8))?
            .map(|b| Sid::parse(b).map(|(sid, _)| sid))
            .transpose()?;
        let sacl = if control & SE_SACL_PRESENT != 0 {
            section(offset_at(12))?.map(Acl::parse).transpose()?
        } else {
            None
        };
        let dacl = if control & SE_DACL_PRESENT != 0 {
            section(offset_at(16))?.map(Acl::parse).transpose()?
        } else {
            None
        };

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

impl fmt::Display for SecurityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = &self.owner {
            write!(f, "O:{}", owner)?;
        }
        if let Some(group) = &self.group {
            write!(f, "G:{}", group)?;
        }
        if let Some(dacl) = &self.dacl {
            write!(f, "D:")?;
            for ace in &dacl.aces {
                write!(f, "({};0x{:X};", ace.type_label(), ace.mask)?;
                if let Some(sid) = &ace.sid {
                    write!(f, "{}", sid)?;
                }
                write!(f, ")")?;
            }
        }
        if let Some(sacl) = &self.sacl {
            write!(f, "S:{} entries", sacl.aces.len())?;
        }
        Ok(())
    }
}

/// Access-control descriptor property, as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AccessDescriptor {
    /// Parsed from the native binary form
    Binary(SecurityDescriptor),
    /// Textual (SDDL) form, kept verbatim
    Sddl(String),
}

impl fmt::Display for AccessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDescriptor::Binary(sd) => write!(f, "{}", sd),
            AccessDescriptor::Sddl(text) => write!(f, "{}", text),
        }
    }
}

fn invalid(reason: &str) -> DecodeError {
    DecodeError::InvalidSecurityDescriptor(reason.to_string())
}
