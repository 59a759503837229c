//! In-memory device registry for testing without real hardware
//!
//! [`MockRegistry`] implements the same traits as the SetupAPI backend. Each
//! scripted property can be told how its probe call answers and whether its
//! fetch call fails, which is enough to exercise every branch of the
//! two-phase protocol. [`MockStats`] counts sessions, probes and fetches so
//! tests can check that handles are closed and caches are honoured.

use crate::core::error::{RegistryError, Result};
use crate::device::classes;
use crate::device::enumerator::EnumerationOptions;
use crate::device::key::{keys, Guid, PropertyKey};
use crate::device::registry::{
    interpret_probe, DeviceRegistry, Probe, PropertyScope, RegistrySession,
};
use crate::device::value::{encode_utf16, PropertyType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// How a scripted probe call answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockOutcome {
    Success,
    /// What the real registry reports for a buffer-less probe
    #[default]
    InsufficientBuffer,
    NotFound,
    /// Any other platform error code
    Failure(u32),
}

/// One scripted property
#[derive(Debug, Clone)]
pub struct MockProperty {
    pub key: PropertyKey,
    /// Raw wire tag reported by the probe
    pub tag: u32,
    /// Bytes copied out by the fetch
    pub data: Vec<u8>,
    /// Size reported by the probe, defaults to `data.len()`
    pub reported_size: Option<u32>,
    pub probe: MockOutcome,
    pub fetch_fails: bool,
}

impl MockProperty {
    pub fn new(key: PropertyKey, tag: u32, data: Vec<u8>) -> Self {
        Self {
            key,
            tag,
            data,
            reported_size: None,
            probe: MockOutcome::default(),
            fetch_fails: false,
        }
    }

    pub fn string(key: PropertyKey, value: &str) -> Self {
        Self::new(key, PropertyType::String.as_raw(), encode_utf16(value))
    }

    pub fn string_list(key: PropertyKey, values: &[&str]) -> Self {
        let mut data = Vec::new();
        for value in values {
            data.extend(encode_utf16(value));
        }
        data.extend_from_slice(&[0, 0]);
        Self::new(key, PropertyType::StringList.as_raw(), data)
    }

    pub fn boolean(key: PropertyKey, value: bool) -> Self {
        let byte = if value { 0xFF } else { 0x00 };
        Self::new(key, PropertyType::Boolean.as_raw(), vec![byte])
    }

    pub fn uint16(key: PropertyKey, value: u16) -> Self {
        Self::new(key, PropertyType::UInt16.as_raw(), value.to_le_bytes().to_vec())
    }

    pub fn uint32(key: PropertyKey, value: u32) -> Self {
        Self::new(key, PropertyType::UInt32.as_raw(), value.to_le_bytes().to_vec())
    }

    pub fn guid(key: PropertyKey, value: Guid) -> Self {
        Self::new(key, PropertyType::Guid.as_raw(), value.to_bytes_le().to_vec())
    }

    /// Override the size reported by the probe
    pub fn with_size(mut self, size: u32) -> Self {
        self.reported_size = Some(size);
        self
    }

    pub fn with_probe(mut self, outcome: MockOutcome) -> Self {
        self.probe = outcome;
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fetch_fails = true;
        self
    }
}

/// One scripted interface
#[derive(Debug, Clone)]
pub struct MockInterface {
    pub class: Guid,
    pub path: Option<String>,
    pub properties: Vec<MockProperty>,
}

impl MockInterface {
    pub fn new(class: Guid) -> Self {
        Self {
            class,
            path: None,
            properties: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn with_property(mut self, property: MockProperty) -> Self {
        self.properties.push(property);
        self
    }
}

/// One scripted device
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub properties: Vec<MockProperty>,
    pub interfaces: Vec<MockInterface>,
    pub present: bool,
    /// Make the key-count query fail outright
    pub key_count_fails: bool,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            properties: Vec::new(),
            interfaces: Vec::new(),
            present: true,
            key_count_fails: false,
        }
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device with a name and presence flag, the minimum most tests need
    pub fn named(name: &str) -> Self {
        Self::new()
            .with_property(MockProperty::string(keys::NAME, name))
            .with_property(MockProperty::boolean(keys::DEVICE_IS_PRESENT, true))
    }

    pub fn with_property(mut self, property: MockProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_interface(mut self, interface: MockInterface) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }

    pub fn failing_key_count(mut self) -> Self {
        self.key_count_fails = true;
        self
    }
}

/// Call counters shared between a registry and its sessions
#[derive(Debug, Default)]
pub struct MockStats {
    opens: AtomicUsize,
    closes: AtomicUsize,
    probes: AtomicUsize,
    fetches: AtomicUsize,
    class_queries: AtomicUsize,
}

impl MockStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// How many times the registered class list was read
    pub fn class_queries(&self) -> usize {
        self.class_queries.load(Ordering::SeqCst)
    }
}

/// Scripted device registry
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    devices: Vec<MockDevice>,
    registered_classes: Vec<Guid>,
    open_fails: bool,
    stats: Arc<MockStats>,
}

/// Interface paths of the sample machine
const LIGHT_PATH: &str =
    r"\\?\hid#vid_04d8&pid_f372#7&2a1b3c4d&0&0000#{4d1e55b2-f16f-11cf-88cb-001111000030}";
const KEYBOARD_PATH: &str =
    r"\\?\hid#vid_046d&pid_c31c&mi_00#8&1f2e3d4c&0&0000#{4d1e55b2-f16f-11cf-88cb-001111000030}";
const HUB_PATH: &str =
    r"\\?\usb#vid_05e3&pid_0610#5&3b1a2c&0&1#{a5dcbf10-6530-11d2-901f-00c04fb951ed}";

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: MockDevice) -> Self {
        self.devices.push(device);
        self
    }

    pub fn with_registered_classes(mut self, classes: Vec<Guid>) -> Self {
        self.registered_classes = classes;
        self
    }

    /// Make every session open fail
    pub fn failing_open(mut self) -> Self {
        self.open_fails = true;
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }

    /// A small simulated machine: a HID status light, a keyboard, a USB hub
    /// and a device node without properties
    pub fn sample() -> Self {
        let hid_light = MockDevice::named("Luxafor Flag")
            .with_property(MockProperty::string(keys::DEVICE_DESC, "USB Input Device"))
            .with_property(MockProperty::string(
                keys::DEVICE_MANUFACTURER,
                "(Standard system devices)",
            ))
            .with_property(MockProperty::string(keys::DEVICE_CLASS, "HIDClass"))
            .with_property(MockProperty::guid(
                keys::DEVICE_CLASS_GUID,
                Guid::from_u128(0x745a17a0_74d3_11d0_b6fe_00a0c90f57da),
            ))
            .with_property(MockProperty::string_list(
                keys::DEVICE_HARDWARE_IDS,
                &[r"HID\VID_04D8&PID_F372&REV_0001", r"HID\VID_04D8&PID_F372"],
            ))
            .with_property(MockProperty::string(
                keys::DEVICE_INSTANCE_ID,
                r"HID\VID_04D8&PID_F372\7&2A1B3C4D&0&0000",
            ))
            .with_interface(
                MockInterface::new(classes::HID)
                    .with_path(LIGHT_PATH)
                    .with_property(MockProperty::boolean(keys::INTERFACE_ENABLED, true))
                    .with_property(MockProperty::guid(keys::INTERFACE_CLASS_GUID, classes::HID))
                    .with_property(MockProperty::uint16(keys::INTERFACE_HID_VENDOR_ID, 0x04D8))
                    .with_property(MockProperty::uint16(keys::INTERFACE_HID_PRODUCT_ID, 0xF372)),
            );

        let keyboard = MockDevice::named("HID Keyboard Device")
            .with_property(MockProperty::string(keys::DEVICE_CLASS, "Keyboard"))
            .with_property(MockProperty::string(keys::DEVICE_FRIENDLY_NAME, "Logitech Keyboard"))
            .with_property(MockProperty::string_list(
                keys::DEVICE_HARDWARE_IDS,
                &[r"HID\VID_046D&PID_C31C&REV_6400&MI_00", r"HID\VID_046D&PID_C31C&MI_00"],
            ))
            .with_interface(
                MockInterface::new(classes::HID)
                    .with_path(KEYBOARD_PATH)
                    .with_property(MockProperty::boolean(keys::INTERFACE_ENABLED, true))
                    .with_property(MockProperty::uint16(keys::INTERFACE_HID_VENDOR_ID, 0x046D))
                    .with_property(MockProperty::uint16(keys::INTERFACE_HID_PRODUCT_ID, 0xC31C)),
            );

        let hub = MockDevice::named("Generic USB Hub")
            .with_property(MockProperty::string(keys::DEVICE_CLASS, "USB"))
            .with_property(MockProperty::uint32(keys::PROCESSOR_NUMBER, 0))
            .with_interface(
                MockInterface::new(classes::USB_DEVICE)
                    .with_path(HUB_PATH)
                    .with_property(MockProperty::boolean(keys::INTERFACE_ENABLED, true)),
            );

        Self::new()
            .with_device(hid_light)
            .with_device(keyboard)
            .with_device(hub)
            .with_device(MockDevice::new())
            .with_registered_classes(vec![classes::HID, classes::USB_DEVICE])
    }
}

impl DeviceRegistry for MockRegistry {
    type Session = MockSession;

    fn open(&self, options: &EnumerationOptions) -> Result<MockSession> {
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        if self.open_fails {
            return Err(RegistryError::SessionUnavailable(
                "mock registry configured to fail".to_string(),
            ));
        }

        let devices = self
            .devices
            .iter()
            .filter(|d| !options.present_only || d.present)
            .filter(|d| match options.interface_class {
                Some(class) => d.interfaces.iter().any(|i| i.class == class),
                None => true,
            })
            .cloned()
            .collect();

        Ok(MockSession {
            devices,
            registered_classes: self.registered_classes.clone(),
            stats: Arc::clone(&self.stats),
        })
    }
}

/// An open session over a snapshot of the scripted devices
#[derive(Debug)]
pub struct MockSession {
    devices: Vec<MockDevice>,
    registered_classes: Vec<Guid>,
    stats: Arc<MockStats>,
}

impl MockSession {
    fn properties(&self, scope: PropertyScope<'_, usize, (usize, usize)>) -> &[MockProperty] {
        match scope {
            PropertyScope::Device(d) => &self.devices[*d].properties,
            PropertyScope::Interface((d, i)) => &self.devices[*d].interfaces[*i].properties,
        }
    }

    fn find(
        &self,
        scope: PropertyScope<'_, usize, (usize, usize)>,
        key: &PropertyKey,
    ) -> Option<&MockProperty> {
        self.properties(scope).iter().find(|p| p.key == *key)
    }
}

impl RegistrySession for MockSession {
    type Device = usize;
    type Interface = (usize, usize);

    fn device_at(&self, index: u32) -> Option<usize> {
        let index = index as usize;
        (index < self.devices.len()).then_some(index)
    }

    fn interface_at(&self, device: &usize, class: &Guid, index: u32) -> Option<(usize, usize)> {
        self.devices[*device]
            .interfaces
            .iter()
            .enumerate()
            .filter(|(_, iface)| iface.class == *class)
            .nth(index as usize)
            .map(|(n, _)| (*device, n))
    }

    fn property_key_count(&self, scope: PropertyScope<'_, usize, (usize, usize)>) -> Result<u32> {
        if let PropertyScope::Device(d) = scope {
            if self.devices[*d].key_count_fails {
                return Err(RegistryError::Api {
                    call: "SetupDiGetDevicePropertyKeys",
                    code: 13,
                });
            }
        }
        Ok(self.properties(scope).len() as u32)
    }

    fn property_keys(
        &self,
        scope: PropertyScope<'_, usize, (usize, usize)>,
        count: u32,
    ) -> Result<Vec<PropertyKey>> {
        Ok(self
            .properties(scope)
            .iter()
            .take(count as usize)
            .map(|p| p.key)
            .collect())
    }

    fn probe(
        &self,
        scope: PropertyScope<'_, usize, (usize, usize)>,
        key: &PropertyKey,
    ) -> Result<Probe> {
        self.stats.probes.fetch_add(1, Ordering::SeqCst);
        let property = self.find(scope, key).ok_or(RegistryError::NotFound)?;
        let outcome = match property.probe {
            MockOutcome::Success => Ok(()),
            MockOutcome::InsufficientBuffer => Err(RegistryError::InsufficientBuffer),
            MockOutcome::NotFound => Err(RegistryError::NotFound),
            MockOutcome::Failure(code) => Err(RegistryError::Api {
                call: "SetupDiGetDevicePropertyW",
                code,
            }),
        };
        let size = property
            .reported_size
            .unwrap_or(property.data.len() as u32);
        interpret_probe(outcome, property.tag, size)
    }

    fn fetch(
        &self,
        scope: PropertyScope<'_, usize, (usize, usize)>,
        key: &PropertyKey,
        buf: &mut [u8],
    ) -> Result<()> {
        self.stats.fetches.fetch_add(1, Ordering::SeqCst);
        let property = self.find(scope, key).ok_or(RegistryError::NotFound)?;
        if property.fetch_fails {
            return Err(RegistryError::Api {
                call: "SetupDiGetDevicePropertyW",
                code: 31,
            });
        }
        if property.data.len() > buf.len() {
            return Err(RegistryError::InsufficientBuffer);
        }
        buf[..property.data.len()].copy_from_slice(&property.data);
        Ok(())
    }

    fn interface_path(&self, interface: &(usize, usize)) -> Option<String> {
        let (d, i) = *interface;
        self.devices[d].interfaces[i].path.clone()
    }

    fn registered_interface_classes(&self) -> Vec<Guid> {
        self.stats.class_queries.fetch_add(1, Ordering::SeqCst);
        self.registered_classes.clone()
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}
