//! Device Property Explorer Library
//!
//! Enumerates the devices and device interfaces known to the Windows device
//! registry, decodes every typed property they carry, and turns property
//! keys into human-readable names.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration and error types
//! - [`device`] - Property keys, the value decoder, the two-phase
//!   probe/fetch protocol and lazy enumeration over a [`device::DeviceRegistry`]
//! - [`names`] - Tiered property key name resolution, including recovery of
//!   the name table embedded in the Device Manager module
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - Mock registry, scenarios and synthetic PE images for testing
//!
//! # Example Usage
//!
//! ```rust,no_run
//! # #[cfg(windows)]
//! # fn main() {
//! use device_property_explorer::device::{
//!     classes, enumerate, EnumerationOptions, SetupApiRegistry,
//! };
//! use device_property_explorer::names::{NameResolver, PropertySystemNames};
//!
//! let registry = SetupApiRegistry::new();
//! let names = NameResolver::new(Box::new(PropertySystemNames));
//!
//! for device in enumerate(&registry, EnumerationOptions::for_class(classes::HID)) {
//!     println!("{}", device);
//!     for (key, value) in device.properties().sorted() {
//!         println!("  {} = {}", names.label(key), value);
//!     }
//!     for interface in device.interfaces() {
//!         println!("  -> {}", interface.path());
//!     }
//! }
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
//!
//! # Testing Without Windows
//!
//! ```rust
//! use device_property_explorer::device::{enumerate, EnumerationOptions, HidFilter};
//! use device_property_explorer::testdb::MockRegistry;
//!
//! let registry = MockRegistry::sample();
//! let filter = HidFilter::new(0x04D8, Some(0xF372));
//! let lights: Vec<_> = enumerate(&registry, EnumerationOptions::all())
//!     .filter(|d| filter.matches(d))
//!     .collect();
//! assert_eq!(lights.len(), 1);
//! ```
//!
//! # Platform Support
//!
//! The SetupAPI backend, the property system name service and the data-file
//! resource loader are Windows only. Everything else, including the decoder
//! and the PE image scanner, builds and is tested on every platform.

pub mod cli;
pub mod core;
pub mod device;
pub mod names;
pub mod testdb;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
