//! Predefined registry scenarios
//!
//! Each scenario is a scripted [`MockRegistry`] together with what a full
//! enumeration of it should produce. They back the `--mock=<scenario>` CLI
//! flag and double as regression fixtures for the enumerator.

use super::mock_registry::{MockDevice, MockInterface, MockOutcome, MockProperty, MockRegistry};
use crate::device::classes;
use crate::device::key::keys;
use crate::device::{enumerate, EnumerationOptions};

/// Expected totals after enumerating every class with interfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectedResults {
    /// Devices yielded
    pub devices: usize,
    /// Interfaces attached across all devices
    pub interfaces: usize,
    /// Device-level properties decoded across all devices
    pub properties: usize,
}

/// A named, scripted registry
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: &'static str,
    pub description: &'static str,
    pub expected: ExpectedResults,
    build: fn() -> MockRegistry,
}

impl TestScenario {
    /// Build a fresh registry for this scenario
    pub fn registry(&self) -> MockRegistry {
        (self.build)()
    }

    /// Enumerate the scenario and compare against its expectations
    pub fn verify(&self) -> ScenarioResult {
        let devices: Vec<_> = enumerate(&self.registry(), EnumerationOptions::all()).collect();
        let actual = ExpectedResults {
            devices: devices.len(),
            interfaces: devices.iter().map(|d| d.interfaces().len()).sum(),
            properties: devices.iter().map(|d| d.properties().len()).sum(),
        };
        ScenarioResult {
            name: self.name,
            expected: self.expected,
            actual,
        }
    }
}

/// Outcome of [`TestScenario::verify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub expected: ExpectedResults,
    pub actual: ExpectedResults,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

/// Collection of all predefined scenarios
pub struct ScenarioLibrary;

impl ScenarioLibrary {
    pub fn all() -> Vec<TestScenario> {
        vec![
            TestScenario {
                name: "sample",
                description: "A HID status light, a keyboard, a USB hub and an empty node",
                expected: ExpectedResults {
                    devices: 3,
                    interfaces: 3,
                    properties: 17,
                },
                build: MockRegistry::sample,
            },
            TestScenario {
                name: "no_devices",
                description: "A registry with nothing in it",
                expected: ExpectedResults::default(),
                build: MockRegistry::new,
            },
            TestScenario {
                name: "session_unavailable",
                description: "The registry handle cannot be opened",
                expected: ExpectedResults::default(),
                build: || MockRegistry::sample().failing_open(),
            },
            TestScenario {
                name: "probe_quirks",
                description: "Every probe and fetch outcome on a single device",
                expected: ExpectedResults {
                    devices: 1,
                    interfaces: 0,
                    properties: 3,
                },
                build: Self::probe_quirks,
            },
            TestScenario {
                name: "malformed_interfaces",
                description: "Interfaces without a path, with an empty path, or without properties",
                expected: ExpectedResults {
                    devices: 1,
                    interfaces: 1,
                    properties: 2,
                },
                build: Self::malformed_interfaces,
            },
            TestScenario {
                name: "unicode_names",
                description: "Non-ASCII device and interface names",
                expected: ExpectedResults {
                    devices: 2,
                    interfaces: 0,
                    properties: 5,
                },
                build: Self::unicode_names,
            },
        ]
    }

    pub fn by_name(name: &str) -> Option<TestScenario> {
        Self::all().into_iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn names() -> Vec<&'static str> {
        Self::all().iter().map(|s| s.name).collect()
    }

    fn probe_quirks() -> MockRegistry {
        MockRegistry::new().with_device(
            MockDevice::named("Probe Quirks")
                .with_property(
                    MockProperty::string(keys::DEVICE_DESC, "answered on first call")
                        .with_probe(MockOutcome::Success),
                )
                .with_property(
                    MockProperty::string(keys::DEVICE_MANUFACTURER, "missing")
                        .with_probe(MockOutcome::NotFound),
                )
                .with_property(
                    MockProperty::string(keys::DEVICE_FRIENDLY_NAME, "access denied")
                        .with_probe(MockOutcome::Failure(5)),
                )
                .with_property(MockProperty::string(keys::DEVICE_CLASS, "lost").failing_fetch())
                .with_property(MockProperty::new(keys::PROCESSOR_NUMBER, 0x99, vec![0; 4])),
        )
    }

    fn malformed_interfaces() -> MockRegistry {
        MockRegistry::new()
            .with_device(
                MockDevice::named("Malformed Interfaces")
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
                        MockInterface::new(classes::HID).with_path(r"\\?\hid#no_properties"),
                    )
                    .with_interface(
                        MockInterface::new(classes::HID)
                            .with_path(r"\\?\hid#valid")
                            .with_property(MockProperty::boolean(keys::INTERFACE_ENABLED, true)),
                    ),
            )
            .with_registered_classes(vec![classes::HID])
    }

    fn unicode_names() -> MockRegistry {
        MockRegistry::new()
            .with_device(
                MockDevice::named("Überwachungskamera ☃").with_property(MockProperty::string(
                    keys::DEVICE_MANUFACTURER,
                    "株式会社テスト",
                )),
            )
            .with_device(MockDevice::named("Клавиатура"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        for scenario in ScenarioLibrary::all() {
            let result = scenario.verify();
            assert!(result.passed(), "{}: {:?}", scenario.name, result);
        }
    }

    #[test]
    fn test_scenario_names_unique() {
        let mut names = ScenarioLibrary::names();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_by_name() {
        assert!(ScenarioLibrary::by_name("SAMPLE").is_some());
        assert!(ScenarioLibrary::by_name("nope").is_none());
    }
}
