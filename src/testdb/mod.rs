//! Test Database Module
//!
//! Scripted stand-ins for the operating system pieces this crate talks to,
//! so every feature can be exercised without Windows or real hardware.
//!
//! # Features
//!
//! - **Mock Registry**: devices, interfaces and properties with scripted
//!   probe and fetch outcomes, plus session counters
//! - **Scenarios**: named registries with expected enumeration totals,
//!   selectable from the CLI with `--mock=<scenario>`
//! - **Image Builder**: synthetic PE32+ images for the name table scanner
//!
//! # Quick Start
//!
//! ```rust
//! use device_property_explorer::device::{enumerate, EnumerationOptions};
//! use device_property_explorer::testdb::ScenarioLibrary;
//!
//! for scenario in ScenarioLibrary::all() {
//!     let result = scenario.verify();
//!     println!("{}: {}", scenario.name, if result.passed() { "ok" } else { "FAILED" });
//! }
//!
//! let registry = device_property_explorer::testdb::MockRegistry::sample();
//! assert_eq!(enumerate(&registry, EnumerationOptions::all()).count(), 3);
//! ```

pub mod image_builder;
pub mod mock_registry;
pub mod scenarios;

pub use image_builder::ImageBuilder;
pub use mock_registry::{
    MockDevice, MockInterface, MockOutcome, MockProperty, MockRegistry, MockSession, MockStats,
};
pub use scenarios::{ExpectedResults, ScenarioLibrary, ScenarioResult, TestScenario};
