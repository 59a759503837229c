//! Property keys and 128-bit identifiers
//!
//! A [`PropertyKey`] names one property slot: a namespace identifier (the
//! "format id") plus an integer index. Keys are stable across process runs,
//! so they are used directly as map keys and as constants in [`keys`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A 128-bit identifier stored in the Windows GUID byte layout
///
/// The first three fields are little-endian on the wire, which is what
/// [`Guid::from_bytes_le`] and [`Guid::to_bytes_le`] deal with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    /// The all-zero identifier
    pub const NULL: Guid = Guid(Uuid::nil());

    /// Size of an identifier on the wire
    pub const SIZE: usize = 16;

    /// Build an identifier from its canonical numeric form
    pub const fn from_u128(value: u128) -> Self {
        Guid(Uuid::from_u128(value))
    }

    /// Read an identifier from its binary (GUID) layout
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Guid(Uuid::from_bytes_le(bytes))
    }

    /// Read an identifier from the start of a buffer
    pub fn from_slice_le(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 16] = bytes.get(..Self::SIZE)?.try_into().ok()?;
        Some(Self::from_bytes_le(raw))
    }

    /// Binary (GUID) layout of this identifier
    pub fn to_bytes_le(&self) -> [u8; 16] {
        self.0.to_bytes_le()
    }

    /// Canonical numeric form
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Parse `xxxxxxxx-xxxx-...` with or without surrounding braces
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim().trim_start_matches('{').trim_end_matches('}');
        Uuid::parse_str(trimmed).ok().map(Guid)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.braced())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self.0.braced())
    }
}

#[cfg(windows)]
impl From<windows::core::GUID> for Guid {
    fn from(guid: windows::core::GUID) -> Self {
        Guid::from_u128(guid.to_u128())
    }
}

#[cfg(windows)]
impl From<Guid> for windows::core::GUID {
    fn from(guid: Guid) -> Self {
        windows::core::GUID::from_u128(guid.as_u128())
    }
}

/// Compound identifier naming one property slot
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyKey {
    /// Namespace (format) identifier
    pub fmtid: Guid,
    /// Index within the namespace
    pub pid: u32,
}

impl PropertyKey {
    /// Size of a key on the wire: identifier followed by a 32-bit index
    pub const SIZE: usize = Guid::SIZE + 4;

    pub const fn new(fmtid: Guid, pid: u32) -> Self {
        Self { fmtid, pid }
    }

    /// Read a key from its binary layout
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let fmtid = Guid::from_slice_le(bytes)?;
        let pid: [u8; 4] = bytes.get(Guid::SIZE..Self::SIZE)?.try_into().ok()?;
        Some(Self {
            fmtid,
            pid: u32::from_le_bytes(pid),
        })
    }

    /// Binary layout of this key
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..Guid::SIZE].copy_from_slice(&self.fmtid.to_bytes_le());
        out[Guid::SIZE..].copy_from_slice(&self.pid.to_le_bytes());
        out
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.fmtid, self.pid)
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyKey({} {})", self.fmtid, self.pid)
    }
}

/// Well-known property keys
pub mod keys {
    use super::{Guid, PropertyKey};

    const FMTID_STORAGE: Guid = Guid::from_u128(0xb725f130_47ef_101a_a5f1_02608c9eebac);
    const FMTID_DEVICE: Guid = Guid::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0);
    const FMTID_DEVICE_INTERFACE: Guid = Guid::from_u128(0x026e516e_b814_414b_83cd_856d6fef4822);
    const FMTID_DEVICE_INTERFACE_HID: Guid =
        Guid::from_u128(0xcbf38310_4a17_4310_a1eb_247f0b67593b);
    const FMTID_PCI_DEVICE: Guid = Guid::from_u128(0x3ab22e31_8264_4b4e_9af5_a8d2d8e33e62);
    const FMTID_PNPX: Guid = Guid::from_u128(0x656a3bb3_ecc0_43fd_8477_4ae0404a96cd);

    /// Device name; also the first entry of the embedded name table
    pub const NAME: PropertyKey = PropertyKey::new(FMTID_STORAGE, 10);

    pub const DEVICE_DESC: PropertyKey = PropertyKey::new(FMTID_DEVICE, 2);
    pub const DEVICE_HARDWARE_IDS: PropertyKey = PropertyKey::new(FMTID_DEVICE, 3);
    pub const DEVICE_CLASS: PropertyKey = PropertyKey::new(FMTID_DEVICE, 9);
    pub const DEVICE_CLASS_GUID: PropertyKey = PropertyKey::new(FMTID_DEVICE, 10);
    pub const DEVICE_MANUFACTURER: PropertyKey = PropertyKey::new(FMTID_DEVICE, 13);
    pub const DEVICE_FRIENDLY_NAME: PropertyKey = PropertyKey::new(FMTID_DEVICE, 14);
    pub const DEVICE_SECURITY: PropertyKey = PropertyKey::new(FMTID_DEVICE, 25);
    pub const DEVICE_SECURITY_SDS: PropertyKey = PropertyKey::new(FMTID_DEVICE, 26);
    pub const DEVICE_IS_PRESENT: PropertyKey = PropertyKey::new(
        Guid::from_u128(0x540b947e_8b40_45bc_a8a2_6a0b894cbda2),
        5,
    );
    pub const DEVICE_INSTANCE_ID: PropertyKey = PropertyKey::new(
        Guid::from_u128(0x78c34fc8_104a_4aca_9ea4_524d52996e57),
        256,
    );

    pub const INTERFACE_FRIENDLY_NAME: PropertyKey = PropertyKey::new(FMTID_DEVICE_INTERFACE, 2);
    pub const INTERFACE_ENABLED: PropertyKey = PropertyKey::new(FMTID_DEVICE_INTERFACE, 3);
    pub const INTERFACE_CLASS_GUID: PropertyKey = PropertyKey::new(FMTID_DEVICE_INTERFACE, 4);
    pub const INTERFACE_REFERENCE_STRING: PropertyKey =
        PropertyKey::new(FMTID_DEVICE_INTERFACE, 5);
    pub const INTERFACE_HID_VENDOR_ID: PropertyKey =
        PropertyKey::new(FMTID_DEVICE_INTERFACE_HID, 5);
    pub const INTERFACE_HID_PRODUCT_ID: PropertyKey =
        PropertyKey::new(FMTID_DEVICE_INTERFACE_HID, 6);

    // Present in the SDK headers but unknown to the property system
    pub const PCI_SUPPORTED_LINK_SUB_STATE: PropertyKey = PropertyKey::new(FMTID_PCI_DEVICE, 36);
    pub const PCI_ON_POST_PATH: PropertyKey = PropertyKey::new(FMTID_PCI_DEVICE, 37);
    pub const PNPX_LAST_NOTIFICATION_TIME: PropertyKey = PropertyKey::new(FMTID_PNPX, 4);
    pub const SSDP_DEV_LIFE_TIME: PropertyKey = PropertyKey::new(FMTID_PNPX, 24577);
    pub const SSDP_NETWORK_INTERFACE: PropertyKey = PropertyKey::new(FMTID_PNPX, 24578);
    pub const WSD_APP_SEQ_INSTANCE_ID: PropertyKey = PropertyKey::new(
        Guid::from_u128(0x92506491_ff95_4724_a05a_5b81885a7c92),
        4100,
    );
    pub const PROCESSOR_NUMBER: PropertyKey = PropertyKey::new(
        Guid::from_u128(0x5724c81d_d5af_4c1f_a103_a06e28f204c6),
        1,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_display_is_braced_lowercase() {
        let guid = Guid::from_u128(0x4d1e55b2_f16f_11cf_88cb_001111000030);
        assert_eq!(guid.to_string(), "{4d1e55b2-f16f-11cf-88cb-001111000030}");
    }

    #[test]
    fn test_guid_parse_with_and_without_braces() {
        let expected = Guid::from_u128(0x4d1e55b2_f16f_11cf_88cb_001111000030);
        assert_eq!(
            Guid::parse("{4D1E55B2-F16F-11CF-88CB-001111000030}"),
            Some(expected)
        );
        assert_eq!(
            Guid::parse("4d1e55b2-f16f-11cf-88cb-001111000030"),
            Some(expected)
        );
        assert_eq!(Guid::parse("not-a-guid"), None);
    }

    #[test]
    fn test_guid_binary_layout_is_mixed_endian() {
        let guid = Guid::from_u128(0x00112233_4455_6677_8899_aabbccddeeff);
        let bytes = guid.to_bytes_le();
        assert_eq!(&bytes[..4], &[0x33, 0x22, 0x11, 0x00]);
        assert_eq!(&bytes[4..6], &[0x55, 0x44]);
        assert_eq!(&bytes[6..8], &[0x77, 0x66]);
        assert_eq!(&bytes[8..], &[0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(Guid::from_bytes_le(bytes), guid);
    }

    #[test]
    fn test_property_key_bytes() {
        let bytes = keys::NAME.to_bytes();
        assert_eq!(bytes.len(), PropertyKey::SIZE);
        assert_eq!(&bytes[16..], &10u32.to_le_bytes());
        assert_eq!(PropertyKey::from_bytes(&bytes), Some(keys::NAME));
        assert_eq!(PropertyKey::from_bytes(&bytes[..19]), None);
    }

    #[test]
    fn test_property_key_equality_and_display() {
        let a = PropertyKey::new(Guid::from_u128(1), 2);
        let b = PropertyKey::new(Guid::from_u128(1), 2);
        let c = PropertyKey::new(Guid::from_u128(1), 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            keys::DEVICE_FRIENDLY_NAME.to_string(),
            "{a45c254e-df1c-4efd-8020-67d146a850e0} 14"
        );
    }
}
