//! Two-phase property retrieval
//!
//! Every property is read the same way, whichever store it lives in:
//!
//! 1. probe for the wire tag and required size (no buffer)
//! 2. map the tag onto a [`PropertyType`], allocate what it needs
//! 3. fetch into that buffer and decode
//!
//! A failure at any step drops that one key. Nothing here is fatal to the
//! enumeration that called it.

use super::key::PropertyKey;
use super::model::PropertyBag;
use super::registry::{RegistrySession, ScopeOf};
use super::value::{decode, PropertyType, PropertyValue};
use crate::core::error::RegistryError;
use log::{debug, trace};

/// Read one property through the probe/fetch protocol
///
/// Returns `None` when the key is missing, carries an unsupported tag, or
/// cannot be fetched or decoded.
pub fn fetch_property<S: RegistrySession>(
    session: &S,
    scope: ScopeOf<'_, S>,
    key: &PropertyKey,
) -> Option<PropertyValue> {
    let probe = match session.probe(scope, key) {
        Ok(probe) => probe,
        Err(RegistryError::NotFound) => {
            trace!("{} property {} not found", scope.label(), key);
            return None;
        }
        Err(e) => {
            debug!("Probe of {} property {} failed: {}", scope.label(), key, e);
            return None;
        }
    };

    let ty = match PropertyType::from_raw(probe.tag) {
        Ok(ty) => ty,
        Err(e) => {
            debug!("Skipping {} property {}: {}", scope.label(), key, e);
            return None;
        }
    };

    let mut buf = match ty.fetch_len(probe.size) {
        Some(len) => vec![0u8; len],
        None => Vec::new(),
    };
    if !buf.is_empty() {
        if let Err(e) = session.fetch(scope, key, &mut buf) {
            debug!(
                "Fetch of {} property {} ({}, {} bytes) failed: {}",
                scope.label(),
                key,
                ty,
                buf.len(),
                e
            );
            return None;
        }
    }

    match decode(ty, &buf) {
        Ok(value) => {
            trace!("{} property {} = {} ({})", scope.label(), key, value, ty);
            Some(value)
        }
        Err(e) => {
            debug!("Cannot decode {} property {}: {}", scope.label(), key, e);
            None
        }
    }
}

/// Read every declared property of a device or interface
///
/// Returns `None` when the store declares no keys or the key list cannot be
/// read; such entries are treated as enumeration noise by the caller.
pub fn read_bag<S: RegistrySession>(session: &S, scope: ScopeOf<'_, S>) -> Option<PropertyBag> {
    let count = match session.property_key_count(scope) {
        Ok(0) => {
            debug!("{} declares no property keys", scope.label());
            return None;
        }
        Ok(count) => count,
        Err(e) => {
            debug!("Cannot count {} property keys: {}", scope.label(), e);
            return None;
        }
    };

    let property_keys = match session.property_keys(scope, count) {
        Ok(keys) => keys,
        Err(e) => {
            debug!("Cannot list {} property keys: {}", scope.label(), e);
            return None;
        }
    };

    let mut bag = PropertyBag::new();
    for key in property_keys {
        if let Some(value) = fetch_property(session, scope, &key) {
            bag.insert(key, value);
        }
    }
    Some(bag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::enumerator::EnumerationOptions;
    use crate::device::key::keys;
    use crate::device::registry::{DeviceRegistry, PropertyScope};
    use crate::device::security::tests::sample_descriptor;
    use crate::device::security::{AccessDescriptor, SecurityDescriptor};
    use crate::testdb::{MockDevice, MockOutcome, MockProperty, MockRegistry};

    fn single(property: MockProperty) -> MockRegistry {
        MockRegistry::new().with_device(MockDevice::new().with_property(property))
    }

    fn fetch_one(registry: &MockRegistry, key: &PropertyKey) -> Option<PropertyValue> {
        let session = registry.open(&EnumerationOptions::default()).unwrap();
        fetch_property(&session, PropertyScope::Device(&0), key)
    }

    #[test]
    fn test_insufficient_buffer_probe_then_fetch_decodes_bool() {
        let registry = single(
            MockProperty::new(keys::DEVICE_IS_PRESENT, 0x11, vec![1, 0, 0, 0])
                .with_size(4)
                .with_probe(MockOutcome::InsufficientBuffer),
        );
        assert_eq!(
            fetch_one(&registry, &keys::DEVICE_IS_PRESENT),
            Some(PropertyValue::Bool(true))
        );
    }

    #[test]
    fn test_failed_fetch_drops_key() {
        let registry = single(
            MockProperty::new(keys::DEVICE_IS_PRESENT, 0x11, vec![1, 0, 0, 0])
                .with_size(4)
                .failing_fetch(),
        );
        assert_eq!(fetch_one(&registry, &keys::DEVICE_IS_PRESENT), None);

        let session = registry.open(&EnumerationOptions::default()).unwrap();
        let bag = read_bag(&session, PropertyScope::Device(&0)).unwrap();
        assert!(!bag.contains_key(&keys::DEVICE_IS_PRESENT));
    }

    #[test]
    fn test_not_found_and_probe_failure_are_dropped() {
        let registry = single(
            MockProperty::string(keys::NAME, "x").with_probe(MockOutcome::NotFound),
        );
        assert_eq!(fetch_one(&registry, &keys::NAME), None);
        assert_eq!(registry.stats().fetches(), 0);

        let registry = single(
            MockProperty::string(keys::NAME, "x").with_probe(MockOutcome::Failure(5)),
        );
        assert_eq!(fetch_one(&registry, &keys::NAME), None);
    }

    #[test]
    fn test_unknown_tag_is_dropped_without_fetch() {
        let registry = single(MockProperty::new(keys::NAME, 0x0000_1234, vec![1, 2]));
        assert_eq!(fetch_one(&registry, &keys::NAME), None);
        assert_eq!(registry.stats().fetches(), 0);

        let registry = single(MockProperty::new(keys::NAME, 0, vec![]));
        assert_eq!(fetch_one(&registry, &keys::NAME), None);
    }

    #[test]
    fn test_null_and_empty_values_skip_fetch() {
        let registry = single(MockProperty::new(keys::NAME, 0x01, vec![]));
        assert_eq!(fetch_one(&registry, &keys::NAME), Some(PropertyValue::Null));

        let registry = single(MockProperty::string(keys::NAME, "").with_size(0));
        assert_eq!(
            fetch_one(&registry, &keys::NAME),
            Some(PropertyValue::String(String::new()))
        );
        assert_eq!(registry.stats().fetches(), 0);
    }

    #[test]
    fn test_property_key_value_uses_full_width() {
        let registry = single(
            MockProperty::new(keys::NAME, 0x15, keys::DEVICE_DESC.to_bytes().to_vec())
                .with_size(20),
        );
        assert_eq!(
            fetch_one(&registry, &keys::NAME),
            Some(PropertyValue::Key(keys::DEVICE_DESC))
        );
    }

    #[test]
    fn test_security_descriptor_is_fetched_and_parsed() {
        let bytes = sample_descriptor();
        let registry = single(
            MockProperty::new(keys::DEVICE_SECURITY, 0x13, bytes.clone())
                .with_probe(MockOutcome::InsufficientBuffer),
        );
        match fetch_one(&registry, &keys::DEVICE_SECURITY) {
            Some(PropertyValue::Security(AccessDescriptor::Binary(sd))) => {
                assert_eq!(sd, SecurityDescriptor::parse(&bytes).unwrap());
                assert_eq!(sd.dacl.unwrap().aces.len(), 1);
            }
            other => panic!("unexpected value: {:?}", other),
        }
        assert_eq!(registry.stats().fetches(), 1);

        let registry = single(
            MockProperty::new(keys::DEVICE_SECURITY, 0x13, bytes).failing_fetch(),
        );
        assert_eq!(fetch_one(&registry, &keys::DEVICE_SECURITY), None);
    }

    #[test]
    fn test_read_bag_keeps_good_keys_around_bad_ones() {
        let registry = MockRegistry::new().with_device(
            MockDevice::new()
                .with_property(MockProperty::string(keys::NAME, "Hub"))
                .with_property(MockProperty::new(keys::DEVICE_DESC, 0x7777, vec![0]))
                .with_property(MockProperty::uint32(keys::PROCESSOR_NUMBER, 2).failing_fetch())
                .with_property(MockProperty::boolean(keys::DEVICE_IS_PRESENT, true)),
        );
        let session = registry.open(&EnumerationOptions::default()).unwrap();
        let bag = read_bag(&session, PropertyScope::Device(&0)).unwrap();
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.get_or(&keys::NAME, String::new()), "Hub");
        assert!(bag.get_or(&keys::DEVICE_IS_PRESENT, false));
    }

    #[test]
    fn test_read_bag_without_keys() {
        let registry = MockRegistry::new().with_device(MockDevice::new());
        let session = registry.open(&EnumerationOptions::default()).unwrap();
        assert!(read_bag(&session, PropertyScope::Device(&0)).is_none());

        let registry = MockRegistry::new().with_device(MockDevice::named("x").failing_key_count());
        let session = registry.open(&EnumerationOptions::default()).unwrap();
        assert!(read_bag(&session, PropertyScope::Device(&0)).is_none());
    }
}
