//! Lazy device enumeration
//!
//! [`enumerate`] opens one registry session and returns a
//! [`DeviceEnumeration`], a forward-only iterator that reads each device
//! only when it is pulled. The session is released as soon as the walk ends
//! or the iterator is dropped, whichever comes first.
//!
//! # Example
//!
//! ```rust
//! use device_property_explorer::device::{classes, enumerate, EnumerationOptions};
//! use device_property_explorer::testdb::MockRegistry;
//!
//! let registry = MockRegistry::sample();
//! let options = EnumerationOptions::for_class(classes::HID);
//! for device in enumerate(&registry, options) {
//!     println!("{} ({} interfaces)", device, device.interfaces().len());
//! }
//! ```

use super::fetch::read_bag;
use super::key::Guid;
use super::model::{Device, DeviceInterface, PropertyBag};
use super::registry::{DeviceRegistry, PropertyScope, RegistrySession};
use log::{debug, trace, warn};

/// What an enumeration call should cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationOptions {
    /// Restrict to devices exposing this interface class
    pub interface_class: Option<Guid>,
    /// Walk each device's interfaces as well
    pub include_interfaces: bool,
    /// Skip devices that are not currently attached
    pub present_only: bool,
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        Self {
            interface_class: None,
            include_interfaces: true,
            present_only: false,
        }
    }
}

impl EnumerationOptions {
    /// Every device class and every registered interface class
    pub fn all() -> Self {
        Self::default()
    }

    /// Devices exposing one interface class
    pub fn for_class(class: Guid) -> Self {
        Self {
            interface_class: Some(class),
            ..Self::default()
        }
    }

    pub fn with_interfaces(mut self, include: bool) -> Self {
        self.include_interfaces = include;
        self
    }

    pub fn only_present(mut self, present_only: bool) -> Self {
        self.present_only = present_only;
        self
    }
}

/// Builds a device from its property bag, or rejects it by returning `None`
pub type DeviceFactory<'f> = Box<dyn FnMut(PropertyBag) -> Option<Device> + 'f>;

/// Enumerate devices, building each one with [`Device::new`]
pub fn enumerate<R: DeviceRegistry>(
    registry: &R,
    options: EnumerationOptions,
) -> DeviceEnumeration<'static, R::Session> {
    DeviceEnumeration::open(registry, options, None)
}

/// Enumerate devices through a factory
///
/// The factory sees each finished property bag before any interface work is
/// done, so rejecting a device there is cheap.
pub fn enumerate_with<'f, R, F>(
    registry: &R,
    options: EnumerationOptions,
    factory: F,
) -> DeviceEnumeration<'f, R::Session>
where
    R: DeviceRegistry,
    F: FnMut(PropertyBag) -> Option<Device> + 'f,
{
    DeviceEnumeration::open(registry, options, Some(Box::new(factory)))
}

/// Pull-based walk over one registry session
pub struct DeviceEnumeration<'f, S: RegistrySession> {
    session: Option<S>,
    options: EnumerationOptions,
    factory: Option<DeviceFactory<'f>>,
    index: u32,
    interface_classes: Option<Vec<Guid>>,
}

impl<'f, S: RegistrySession> DeviceEnumeration<'f, S> {
    fn open<R>(
        registry: &R,
        options: EnumerationOptions,
        factory: Option<DeviceFactory<'f>>,
    ) -> Self
    where
        R: DeviceRegistry<Session = S>,
    {
        let session = match registry.open(&options) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Cannot open device registry session: {}", e);
                None
            }
        };

        Self {
            session,
            options,
            factory,
            index: 0,
            interface_classes: None,
        }
    }

    /// Whether the session is still held
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Release the session early
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("Device registry session closed after {} entries", self.index);
        }
    }
}

impl<S: RegistrySession> Iterator for DeviceEnumeration<'_, S> {
    type Item = Device;

    fn next(&mut self) -> Option<Device> {
        loop {
            let session = self.session.as_ref()?;
            let index = self.index;
            let Some(handle) = session.device_at(index) else {
                self.close();
                return None;
            };
            // advance before any skip, so a bad entry cannot stall the walk
            self.index += 1;

            let Some(bag) = read_bag(session, PropertyScope::Device(&handle)) else {
                debug!("Skipping device {}: no readable properties", index);
                continue;
            };

            let device = match self.factory.as_mut() {
                Some(factory) => match factory(bag) {
                    Some(device) => device,
                    None => {
                        trace!("Device {} rejected by factory", index);
                        continue;
                    }
                },
                None => Device::new(bag),
            };

            let device = if self.options.include_interfaces {
                let classes = self.interface_classes(index);
                let mut device = device;
                if let Some(session) = self.session.as_ref() {
                    attach_interfaces(session, &handle, &classes, &mut device);
                }
                device
            } else {
                device
            };

            return Some(device);
        }
    }
}

impl<S: RegistrySession> DeviceEnumeration<'_, S> {
    /// Interface classes to walk, read from the registry at most once
    fn interface_classes(&mut self, device_index: u32) -> Vec<Guid> {
        if let Some(class) = self.options.interface_class {
            return vec![class];
        }
        if self.interface_classes.is_none() {
            let classes = self
                .session
                .as_ref()
                .map(|s| s.registered_interface_classes())
                .unwrap_or_default();
            debug!(
                "{} registered interface classes (first needed by device {})",
                classes.len(),
                device_index
            );
            self.interface_classes = Some(classes);
        }
        self.interface_classes.clone().unwrap_or_default()
    }
}

fn attach_interfaces<S: RegistrySession>(
    session: &S,
    device_handle: &S::Device,
    classes: &[Guid],
    device: &mut Device,
) {
    for class in classes {
        let mut index = 0;
        while let Some(handle) = session.interface_at(device_handle, class, index) {
            index += 1;

            let Some(bag) = read_bag(session, PropertyScope::Interface(&handle)) else {
                debug!(
                    "Skipping interface {} of class {}: no readable properties",
                    index - 1,
                    class
                );
                continue;
            };
            let Some(path) = session.interface_path(&handle) else {
                debug!("Skipping interface {} of class {}: no path", index - 1, class);
                continue;
            };
            match DeviceInterface::new(bag, path) {
                Ok(interface) => device.push_interface(interface),
                Err(e) => debug!("Skipping interface {} of class {}: {}", index - 1, class, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::classes;
    use crate::device::key::keys;
    use crate::testdb::{MockDevice, MockInterface, MockProperty, MockRegistry};

    #[test]
    fn test_device_without_keys_is_never_yielded() {
        let registry = MockRegistry::new()
            .with_device(MockDevice::new())
            .with_device(MockDevice::named("Second"))
            .with_device(MockDevice::new())
            .with_device(MockDevice::named("Fourth").failing_key_count());
        let names: Vec<String> = enumerate(&registry, EnumerationOptions::all())
            .map(|d| d.name())
            .collect();
        assert_eq!(names, vec!["Second"]);
    }

    #[test]
    fn test_open_failure_yields_nothing() {
        let registry = MockRegistry::sample().failing_open();
        let mut devices = enumerate(&registry, EnumerationOptions::all());
        assert!(!devices.is_open());
        assert!(devices.next().is_none());
        assert_eq!(registry.stats().opens(), 1);
    }

    #[test]
    fn test_session_closed_on_exhaustion_and_early_drop() {
        let registry = MockRegistry::sample();
        let stats = registry.stats();

        let mut devices = enumerate(&registry, EnumerationOptions::all());
        while devices.next().is_some() {}
        assert!(!devices.is_open());
        assert_eq!(stats.closes(), 1);

        let first = enumerate(&registry, EnumerationOptions::all()).next();
        assert!(first.is_some());
        assert_eq!(stats.opens(), 2);
        assert_eq!(stats.closes(), 2);
    }

    #[test]
    fn test_enumeration_is_lazy() {
        let registry = MockRegistry::sample();
        let stats = registry.stats();
        let mut devices = enumerate(&registry, EnumerationOptions::all().with_interfaces(false));
        assert_eq!(stats.probes(), 0);
        devices.next();
        let after_first = stats.probes();
        assert!(after_first > 0);
        devices.next();
        assert!(stats.probes() > after_first);
    }

    #[test]
    fn test_factory_can_reject_devices() {
        let registry = MockRegistry::sample();
        let names: Vec<String> = enumerate_with(&registry, EnumerationOptions::all(), |bag| {
            let device = Device::new(bag);
            (device.class() == "HIDClass").then_some(device)
        })
        .map(|d| d.name())
        .collect();
        assert_eq!(names, vec!["Luxafor Flag"]);
    }

    #[test]
    fn test_interfaces_for_single_class() {
        let registry = MockRegistry::sample();
        let devices: Vec<Device> =
            enumerate(&registry, EnumerationOptions::for_class(classes::HID)).collect();
        assert_eq!(devices.len(), 2);
        let iface = &devices[0].interfaces()[0];
        assert_eq!(iface.hid_vendor_id(), 0x04D8);
        assert_eq!(iface.hid_product_id(), 0xF372);
        assert!(iface.is_enabled());
        // class given explicitly, so the registered list is never read
        assert_eq!(registry.stats().class_queries(), 0);
    }

    #[test]
    fn test_interface_without_path_is_dropped() {
        let registry = MockRegistry::new().with_device(
            MockDevice::named("Dock")
                .with_interface(
                    MockInterface::new(classes::HID)
                        .with_property(MockProperty::boolean(keys::INTERFACE_ENABLED, true)),
                )
                .with_interface(
                    MockInterface::new(classes::HID)
                        .with_path("")
                        .with_property(MockProperty::boolean(keys::INTERFACE_ENABLED, true)),
                )
                .with_interface(
                    MockInterface::new(classes::HID)
                        .with_path(r"\\?\hid#dock")
                        .with_property(MockProperty::boolean(keys::INTERFACE_ENABLED, true)),
                ),
        );
        let devices: Vec<Device> =
            enumerate(&registry, EnumerationOptions::for_class(classes::HID)).collect();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].interfaces().len(), 1);
        assert_eq!(devices[0].interfaces()[0].path(), r"\\?\hid#dock");
    }

    #[test]
    fn test_registered_classes_read_once_per_session() {
        let registry = MockRegistry::sample();
        let devices: Vec<Device> = enumerate(&registry, EnumerationOptions::all()).collect();
        assert_eq!(devices.len(), 3);
        assert_eq!(registry.stats().class_queries(), 1);

        let hub = devices.iter().find(|d| d.name() == "Generic USB Hub").unwrap();
        assert_eq!(hub.interfaces().len(), 1);
    }

    #[test]
    fn test_without_interfaces() {
        let registry = MockRegistry::sample();
        let devices: Vec<Device> =
            enumerate(&registry, EnumerationOptions::all().with_interfaces(false)).collect();
        assert!(devices.iter().all(|d| d.interfaces().is_empty()));
        assert_eq!(registry.stats().class_queries(), 0);
    }

    #[test]
    fn test_present_only() {
        let registry = MockRegistry::new()
            .with_device(MockDevice::named("Here"))
            .with_device(MockDevice::named("Gone").absent());
        let names: Vec<String> = enumerate(&registry, EnumerationOptions::all().only_present(true))
            .map(|d| d.name())
            .collect();
        assert_eq!(names, vec!["Here"]);
    }
}
