//! Device registry enumeration
//!
//! This module walks the operating system's device registry and turns each
//! device and interface into a bag of typed properties.
//!
//! # Submodules
//!
//! - `key` - property keys and 128-bit identifiers
//! - `value` - wire type tags, decoded values and the decoder
//! - `security` - self-relative security descriptor parsing
//! - `registry` - abstraction traits over the registry service
//! - `fetch` - the two-phase probe/fetch protocol
//! - `enumerator` - lazy, session-scoped device iteration
//! - `model` - `Device`, `DeviceInterface` and typed accessors
//! - `classes` - well-known interface class names
//! - `filter` - HID vendor/product filtering
//! - `setupapi` - the SetupAPI backend (Windows only)
//!
//! # Architecture
//!
//! The enumerator is generic over [`DeviceRegistry`], so the same code runs
//! against the real SetupAPI backend and against
//! [`MockRegistry`](crate::testdb::MockRegistry) in tests.

pub mod classes;
pub mod enumerator;
pub mod fetch;
pub mod filter;
pub mod key;
pub mod model;
pub mod registry;
pub mod security;
pub mod value;

#[cfg(windows)]
pub mod setupapi;

pub use enumerator::{enumerate, enumerate_with, DeviceEnumeration, EnumerationOptions};
pub use filter::HidFilter;
pub use key::{keys, Guid, PropertyKey};
pub use model::{Device, DeviceInterface, FromPropertyValue, PropertyBag};
pub use registry::{DeviceRegistry, Probe, PropertyScope, RegistrySession};
pub use value::{PropertyType, PropertyValue};

#[cfg(windows)]
pub use setupapi::SetupApiRegistry;
