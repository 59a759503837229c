//! Device and interface data model
//!
//! A [`Device`] and a [`DeviceInterface`] are immutable property bags with
//! typed accessors on top. Accessors never fail: a missing key, or a key
//! holding a different kind of value, yields the caller's default.

use super::key::{keys, Guid, PropertyKey};
use super::security::AccessDescriptor;
use super::value::PropertyValue;
use crate::core::error::ModelError;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Decoded properties of one device or interface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: HashMap<PropertyKey, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &PropertyKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyValue)> {
        self.values.iter()
    }

    /// Entries ordered by key, for stable output
    pub fn sorted(&self) -> Vec<(&PropertyKey, &PropertyValue)> {
        let mut entries: Vec<_> = self.values.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Typed lookup with a fallback for absent or differently-typed keys
    pub fn get_or<T: FromPropertyValue>(&self, key: &PropertyKey, default: T) -> T {
        self.get(key).and_then(T::from_value).unwrap_or(default)
    }

    pub(crate) fn insert(&mut self, key: PropertyKey, value: PropertyValue) {
        self.values.insert(key, value);
    }
}

impl FromIterator<(PropertyKey, PropertyValue)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (PropertyKey, PropertyValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

// JSON object keys must be strings, so keys are rendered as "{fmtid} pid"
impl Serialize for PropertyBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.sorted()
                .into_iter()
                .map(|(key, value)| (key.to_string(), value)),
        )
    }
}

/// Conversion out of a decoded value, used by the typed accessors
pub trait FromPropertyValue: Sized {
    fn from_value(value: &PropertyValue) -> Option<Self>;
}

macro_rules! from_property_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromPropertyValue for $ty {
                fn from_value(value: &PropertyValue) -> Option<Self> {
                    match value {
                        PropertyValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

from_property_value! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Guid => Guid,
    PropertyKey => Key,
    DateTime<Utc> => Timestamp,
    String => String,
    Vec<String> => StringList,
    Vec<u8> => Blob,
    AccessDescriptor => Security,
}

/// A device node and, when requested, its interfaces
#[derive(Debug, Clone, serde::Serialize)]
pub struct Device {
    properties: PropertyBag,
    interfaces: Vec<DeviceInterface>,
}

impl Device {
    pub fn new(properties: PropertyBag) -> Self {
        Self {
            properties,
            interfaces: Vec::new(),
        }
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn interfaces(&self) -> &[DeviceInterface] {
        &self.interfaces
    }

    pub fn get_or<T: FromPropertyValue>(&self, key: &PropertyKey, default: T) -> T {
        self.properties.get_or(key, default)
    }

    pub fn name(&self) -> String {
        self.get_or(&keys::NAME, String::new())
    }

    pub fn friendly_name(&self) -> String {
        self.get_or(&keys::DEVICE_FRIENDLY_NAME, String::new())
    }

    pub fn description(&self) -> String {
        self.get_or(&keys::DEVICE_DESC, String::new())
    }

    pub fn manufacturer(&self) -> String {
        self.get_or(&keys::DEVICE_MANUFACTURER, String::new())
    }

    /// Setup class name, e.g. `HIDClass`
    pub fn class(&self) -> String {
        self.get_or(&keys::DEVICE_CLASS, String::new())
    }

    pub fn class_guid(&self) -> Guid {
        self.get_or(&keys::DEVICE_CLASS_GUID, Guid::NULL)
    }

    pub fn instance_id(&self) -> String {
        self.get_or(&keys::DEVICE_INSTANCE_ID, String::new())
    }

    pub fn is_present(&self) -> bool {
        self.get_or(&keys::DEVICE_IS_PRESENT, false)
    }

    pub(crate) fn push_interface(&mut self, interface: DeviceInterface) {
        self.interfaces.push(interface);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One interface exposed by a device, addressed by its path
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceInterface {
    path: String,
    properties: PropertyBag,
}

impl DeviceInterface {
    /// Build an interface; the path is mandatory
    pub fn new(properties: PropertyBag, path: impl Into<String>) -> Result<Self, ModelError> {
        let path = path.into();
        if path.is_empty() {
            return Err(ModelError::EmptyInterfacePath);
        }
        Ok(Self { path, properties })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn get_or<T: FromPropertyValue>(&self, key: &PropertyKey, default: T) -> T {
        self.properties.get_or(key, default)
    }

    pub fn friendly_name(&self) -> String {
        self.get_or(&keys::INTERFACE_FRIENDLY_NAME, String::new())
    }

    pub fn device_instance_id(&self) -> String {
        self.get_or(&keys::DEVICE_INSTANCE_ID, String::new())
    }

    pub fn class_guid(&self) -> Guid {
        self.get_or(&keys::INTERFACE_CLASS_GUID, Guid::NULL)
    }

    pub fn is_enabled(&self) -> bool {
        self.get_or(&keys::INTERFACE_ENABLED, false)
    }

    pub fn hid_vendor_id(&self) -> u16 {
        self.get_or(&keys::INTERFACE_HID_VENDOR_ID, 0)
    }

    pub fn hid_product_id(&self) -> u16 {
        self.get_or(&keys::INTERFACE_HID_PRODUCT_ID, 0)
    }
}

impl fmt::Display for DeviceInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.friendly_name())
    }
}
