//! Device registry abstraction
//!
//! The enumerator never talks to the operating system directly. It drives a
//! [`RegistrySession`] obtained from a [`DeviceRegistry`], which keeps the
//! property protocol testable without real hardware:
//!
//! - [`DeviceRegistry`] - opens a session for one enumeration call
//! - [`RegistrySession`] - walks devices and interfaces, lists their
//!   property keys and answers probe/fetch calls
//!
//! Both the SetupAPI backend (Windows only) and
//! [`MockRegistry`](crate::testdb::MockRegistry) implement these traits.
//!
//! Sessions release their underlying handle when dropped, so an abandoned
//! enumeration closes its session as soon as the iterator goes away.

use super::enumerator::EnumerationOptions;
use super::key::{Guid, PropertyKey};
use crate::core::error::{RegistryError, Result};

/// Outcome of the probe call: the wire tag and the size the value needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub tag: u32,
    pub size: u32,
}

/// Which property store a call addresses
pub enum PropertyScope<'a, D, I> {
    Device(&'a D),
    Interface(&'a I),
}

impl<D, I> Clone for PropertyScope<'_, D, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, I> Copy for PropertyScope<'_, D, I> {}

impl<D, I> PropertyScope<'_, D, I> {
    /// Label used in log output
    pub fn label(&self) -> &'static str {
        match self {
            PropertyScope::Device(_) => "device",
            PropertyScope::Interface(_) => "interface",
        }
    }
}

/// Scope type for a given session
pub type ScopeOf<'a, S> =
    PropertyScope<'a, <S as RegistrySession>::Device, <S as RegistrySession>::Interface>;

/// Factory for enumeration sessions
pub trait DeviceRegistry {
    /// Session type produced by this registry
    type Session: RegistrySession;

    /// Open a session covering the devices selected by `options`
    ///
    /// A failure here is reported to the enumerator, which logs it and
    /// yields nothing.
    fn open(&self, options: &EnumerationOptions) -> Result<Self::Session>;
}

/// One open enumeration session
pub trait RegistrySession {
    /// Handle on one device within the session
    type Device;
    /// Handle on one interface of a device
    type Interface;

    /// Device at `index`, or `None` once the registry reports no more entries
    fn device_at(&self, index: u32) -> Option<Self::Device>;

    /// Interface `index` of `device` within interface class `class`
    fn interface_at(
        &self,
        device: &Self::Device,
        class: &Guid,
        index: u32,
    ) -> Option<Self::Interface>;

    /// Number of property keys declared on the scope
    fn property_key_count(
        &self,
        scope: PropertyScope<'_, Self::Device, Self::Interface>,
    ) -> Result<u32>;

    /// The declared property keys, fetched into an array of exactly `count`
    fn property_keys(
        &self,
        scope: PropertyScope<'_, Self::Device, Self::Interface>,
        count: u32,
    ) -> Result<Vec<PropertyKey>>;

    /// Probe a property for its tag and size
    ///
    /// Implementations report the "insufficient buffer" outcome as `Ok`, since
    /// it carries the real metadata. `Err(RegistryError::NotFound)` is the only
    /// true miss.
    fn probe(
        &self,
        scope: PropertyScope<'_, Self::Device, Self::Interface>,
        key: &PropertyKey,
    ) -> Result<Probe>;

    /// Fetch a property into `buf`, which is sized from the probe
    fn fetch(
        &self,
        scope: PropertyScope<'_, Self::Device, Self::Interface>,
        key: &PropertyKey,
        buf: &mut [u8],
    ) -> Result<()>;

    /// OS-assigned path of an interface, if one can be resolved
    fn interface_path(&self, interface: &Self::Interface) -> Option<String>;

    /// Interface classes registered with the system
    fn registered_interface_classes(&self) -> Vec<Guid>;
}

/// Interpret the raw outcome of a probe call
///
/// The probe is issued without a destination buffer, so the registry
/// normally answers "insufficient buffer" while still filling in the tag and
/// size. That outcome and plain success both yield the metadata; anything
/// else (including `NotFound`) is passed through.
pub fn interpret_probe(
    outcome: std::result::Result<(), RegistryError>,
    tag: u32,
    size: u32,
) -> Result<Probe> {
    match outcome {
        Ok(()) | Err(RegistryError::InsufficientBuffer) => Ok(Probe { tag, size }),
        Err(err) => Err(err),
    }
}
