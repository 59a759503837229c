//! HID vendor/product filtering
//!
//! A USB HID peripheral is recognised by the vendor and product ids its
//! first HID interface reports. [`HidFilter::accepts_bag`] is a cheap
//! pre-check on the device's hardware ids, suitable as an enumeration
//! factory; [`HidFilter::matches`] is the authoritative check once
//! interfaces have been read.

use super::key::keys;
use super::model::{Device, PropertyBag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidFilter {
    pub vendor_id: u16,
    /// Any product of the vendor when unset
    pub product_id: Option<u16>,
}

impl HidFilter {
    pub fn new(vendor_id: u16, product_id: Option<u16>) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Check the ids reported by the device's first interface
    pub fn matches(&self, device: &Device) -> bool {
        let Some(first) = device.interfaces().first() else {
            return false;
        };
        first.hid_vendor_id() == self.vendor_id
            && self.product_id.map_or(true, |pid| first.hid_product_id() == pid)
    }

    /// Pre-check a property bag against its hardware ids
    ///
    /// Devices that declare no hardware ids are let through, so only the
    /// interface check in [`matches`](Self::matches) can reject them.
    pub fn accepts_bag(&self, bag: &PropertyBag) -> bool {
        let ids: Vec<String> = bag.get_or(&keys::DEVICE_HARDWARE_IDS, Vec::new());
        if ids.is_empty() {
            return true;
        }

        let vid = format!("VID_{:04X}", self.vendor_id);
        let pid = self.product_id.map(|p| format!("PID_{:04X}", p));
        ids.iter().any(|id| {
            let id = id.to_ascii_uppercase();
            id.contains(&vid) && pid.as_ref().map_or(true, |p| id.contains(p.as_str()))
        })
    }

    /// Enumeration factory built on [`accepts_bag`](Self::accepts_bag)
    pub fn factory(self) -> impl FnMut(PropertyBag) -> Option<Device> {
        move |bag| self.accepts_bag(&bag).then(|| Device::new(bag))
    }
}

/// Parse a 16-bit id written as hex, with or without `0x`
pub fn parse_hex_id(text: &str) -> Option<u16> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u16::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::classes;
    use crate::device::enumerator::{enumerate_with, EnumerationOptions};
    use crate::testdb::MockRegistry;

    #[test]
    fn test_filter_matches_first_interface() {
        let registry = MockRegistry::sample();
        let filter = HidFilter::new(0x04D8, Some(0xF372));
        let found: Vec<Device> = enumerate_with(
            &registry,
            EnumerationOptions::for_class(classes::HID),
            filter.factory(),
        )
        .filter(|d| filter.matches(d))
        .collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "Luxafor Flag");
    }

    #[test]
    fn test_factory_rejects_other_vendors_early() {
        let registry = MockRegistry::sample();
        let stats = registry.stats();
        let filter = HidFilter::new(0x04D8, None);
        let count = enumerate_with(
            &registry,
            EnumerationOptions::for_class(classes::HID),
            filter.factory(),
        )
        .count();
        assert_eq!(count, 1);
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn test_device_without_interfaces_never_matches() {
        let filter = HidFilter::new(0x04D8, None);
        assert!(!filter.matches(&Device::new(PropertyBag::new())));
        assert!(filter.accepts_bag(&PropertyBag::new()));
    }

    #[test]
    fn test_parse_hex_id() {
        assert_eq!(parse_hex_id("04d8"), Some(0x04D8));
        assert_eq!(parse_hex_id("0xF372"), Some(0xF372));
        assert_eq!(parse_hex_id("zz"), None);
        assert_eq!(parse_hex_id("12345"), None);
    }
}
