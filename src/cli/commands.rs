//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands. Commands
//! that read the device registry are generic over [`DeviceRegistry`] so the
//! same handlers drive SetupAPI and the `--mock` sample registry.

use crate::cli::progress::{print_divider, print_header, print_info, print_success, print_warning};
use crate::cli::progress::EnumerationProgress;
use crate::cli::{Args, Commands};
use crate::core::config::{
    get_config_path, init_config, open_config_in_editor, write_default_config, Config,
    OutputFormat,
};
use crate::device::filter::parse_hex_id;
use crate::device::{
    classes, enumerate, enumerate_with, Device, DeviceRegistry, EnumerationOptions, Guid,
    HidFilter, PropertyBag, PropertyKey, PropertyValue, RegistrySession,
};
use crate::names::{static_names, NameResolver};
use crate::testdb::ScenarioLibrary;
use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::PathBuf;

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config) -> Result<()> {
    let resolver = NameResolver::system(&config.names);

    let command = match &args.command {
        Some(Commands::Config { path, reset }) => return handle_config_command(*path, *reset),
        Some(Commands::GenerateConfig { output }) => return generate_config_file(output.clone()),
        Some(Commands::ShowConfig) => {
            show_config(config);
            return Ok(());
        }
        Some(Commands::Name { fmtid, pid }) => return resolve_key_name(&resolver, fmtid, *pid),
        Some(Commands::Names { scan_only }) => return list_names(&resolver, *scan_only),
        Some(Commands::List {
            class,
            no_interfaces,
            present,
            vid,
            pid,
            json,
        }) => RegistryCommand::List(ListRequest::from_args(
            config,
            class.as_deref(),
            *no_interfaces,
            *present,
            vid.as_deref(),
            pid.as_deref(),
            *json,
        )?),
        Some(Commands::Show {
            pattern,
            class,
            json,
        }) => RegistryCommand::Show(ShowRequest::from_args(
            config,
            pattern,
            class.as_deref(),
            *json,
        )?),
        Some(Commands::Classes) => RegistryCommand::Classes,
        None => RegistryCommand::List(ListRequest::from_args(
            config, None, false, false, None, None, false,
        )?),
    };

    if let Some(name) = &args.mock {
        let scenario = ScenarioLibrary::by_name(name).ok_or_else(|| {
            anyhow!(
                "Unknown scenario '{}'. Available: {}",
                name,
                ScenarioLibrary::names().join(", ")
            )
        })?;
        info!("Using mock scenario '{}': {}", scenario.name, scenario.description);
        return run_registry_command(&scenario.registry(), &command, &resolver);
    }
    run_system_registry_command(&command, &resolver)
}

/// A command that reads the device registry, with its flags already merged
/// over the configuration
#[derive(Debug, Clone)]
pub enum RegistryCommand {
    List(ListRequest),
    Show(ShowRequest),
    Classes,
}

#[cfg(windows)]
fn run_system_registry_command(command: &RegistryCommand, resolver: &NameResolver) -> Result<()> {
    let registry = crate::device::SetupApiRegistry::new();
    run_registry_command(&registry, command, resolver)
}

#[cfg(not(windows))]
fn run_system_registry_command(
    _command: &RegistryCommand,
    _resolver: &NameResolver,
) -> Result<()> {
    warn!("Run with --mock to explore the built-in sample registry");
    Err(crate::core::error::RegistryError::Unsupported.into())
}

/// Dispatch the commands that need a device registry
pub fn run_registry_command<R: DeviceRegistry>(
    registry: &R,
    command: &RegistryCommand,
    resolver: &NameResolver,
) -> Result<()> {
    match command {
        RegistryCommand::List(request) => list_devices(registry, request),
        RegistryCommand::Show(request) => show_devices(registry, request, resolver),
        RegistryCommand::Classes => list_classes(registry),
    }
}

fn parse_class_arg(text: &str) -> Result<Guid> {
    classes::parse_class(text).ok_or_else(|| {
        anyhow!(
            "Unknown interface class '{}'. Use a GUID or a name from 'devprops classes'",
            text
        )
    })
}

// ============================================================================
// list
// ============================================================================

/// Everything `list` needs after CLI flags are merged over the config
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub options: EnumerationOptions,
    pub filter: Option<HidFilter>,
    pub format: OutputFormat,
    pub show_empty: bool,
}

impl ListRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn from_args(
        config: &Config,
        class: Option<&str>,
        no_interfaces: bool,
        present: bool,
        vid: Option<&str>,
        pid: Option<&str>,
        json: bool,
    ) -> Result<Self> {
        let mut options = config.enumeration.to_options()?;
        if let Some(class) = class {
            options.interface_class = Some(parse_class_arg(class)?);
        }
        if no_interfaces {
            options.include_interfaces = false;
        }
        if present {
            options.present_only = true;
        }

        let filter = match vid {
            Some(vid) => {
                let vendor_id =
                    parse_hex_id(vid).ok_or_else(|| anyhow!("Invalid vendor id '{}'", vid))?;
                let product_id = pid
                    .map(|p| parse_hex_id(p).ok_or_else(|| anyhow!("Invalid product id '{}'", p)))
                    .transpose()?;
                // the filter reads the ids from the device's HID interface
                options.include_interfaces = true;
                if options.interface_class.is_none() {
                    options.interface_class = Some(classes::HID);
                }
                Some(HidFilter::new(vendor_id, product_id))
            }
            None => None,
        };

        Ok(Self {
            options,
            filter,
            format: if json {
                OutputFormat::Json
            } else {
                config.output.format
            },
            show_empty: config.output.show_empty,
        })
    }
}

/// Enumerate devices for a list request
pub fn collect_devices<R: DeviceRegistry>(
    registry: &R,
    request: &ListRequest,
    progress: &EnumerationProgress,
) -> Vec<Device> {
    let devices: Vec<Device> = match request.filter {
        Some(filter) => enumerate_with(registry, request.options.clone(), filter.factory())
            .filter(|d| filter.matches(d))
            .inspect(|d| progress.device_read(d))
            .collect(),
        None => enumerate(registry, request.options.clone())
            .inspect(|d| progress.device_read(d))
            .collect(),
    };

    if request.show_empty {
        return devices;
    }
    devices
        .into_iter()
        .filter(|d| {
            let keep = !d.name().is_empty() || !d.friendly_name().is_empty();
            if !keep {
                debug!("Hiding unnamed device {}", d.instance_id());
            }
            keep
        })
        .collect()
}

/// List devices and their interfaces
pub fn list_devices<R: DeviceRegistry>(registry: &R, request: &ListRequest) -> Result<()> {
    let progress = match request.format {
        OutputFormat::Json => EnumerationProgress::hidden(),
        OutputFormat::Text => EnumerationProgress::new(),
    };
    let devices = collect_devices(registry, request, &progress);
    progress.finish();

    if request.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        info!("No devices found.");
        if request.options.present_only {
            info!("Tip: drop --present to include devices that are not attached");
        }
        return Ok(());
    }

    info!("Found {} device(s):", devices.len());
    println!();
    for (i, device) in devices.iter().enumerate() {
        for line in describe_device(i + 1, device) {
            println!("{}", line);
        }
        println!();
    }
    Ok(())
}

/// Text summary of one device and its interfaces
pub fn describe_device(number: usize, device: &Device) -> Vec<String> {
    let mut lines = vec![format!("[{}] {}", number, display_name(device))];

    let class = device.class();
    if !class.is_empty() || !device.class_guid().is_null() {
        lines.push(format!("    Class: {} {}", class, device.class_guid()));
    }
    for (label, value) in [
        ("Description", device.description()),
        ("Manufacturer", device.manufacturer()),
        ("Instance ID", device.instance_id()),
    ] {
        if !value.is_empty() {
            lines.push(format!("    {}: {}", label, value));
        }
    }
    lines.push(format!("    Present: {}", device.is_present()));
    lines.push(format!("    Properties: {}", device.properties().len()));

    for interface in device.interfaces() {
        let class = classes::class_name(&interface.class_guid())
            .unwrap_or_else(|| interface.class_guid().to_string());
        let mut line = format!("    - {}", interface.path());
        if !interface.class_guid().is_null() {
            line.push_str(&format!(" [{}]", class));
        }
        if interface.hid_vendor_id() != 0 {
            line.push_str(&format!(
                " VID {:04X} PID {:04X}",
                interface.hid_vendor_id(),
                interface.hid_product_id()
            ));
        }
        if !interface.is_enabled() {
            line.push_str(" (disabled)");
        }
        lines.push(line);
    }
    lines
}

fn display_name(device: &Device) -> String {
    let friendly = device.friendly_name();
    let name = device.name();
    match (name.is_empty(), friendly.is_empty()) {
        (false, false) if friendly != name => format!("{} ({})", name, friendly),
        (true, false) => friendly,
        (true, true) => "(unnamed device)".to_string(),
        _ => name,
    }
}

// ============================================================================
// show
// ============================================================================

/// One property with its resolved label
#[derive(Debug, Serialize)]
pub struct NamedProperty<'a> {
    pub key: String,
    pub name: String,
    pub kind: &'static str,
    pub value: &'a PropertyValue,
}

#[derive(Debug, Serialize)]
struct InterfaceReport<'a> {
    path: &'a str,
    properties: Vec<NamedProperty<'a>>,
}

#[derive(Debug, Serialize)]
struct DeviceReport<'a> {
    name: String,
    properties: Vec<NamedProperty<'a>>,
    interfaces: Vec<InterfaceReport<'a>>,
}

/// Properties of a bag sorted by key, with resolved names
pub fn named_properties<'a>(
    bag: &'a PropertyBag,
    resolver: &NameResolver,
) -> Vec<NamedProperty<'a>> {
    bag.sorted()
        .into_iter()
        .map(|(key, value)| NamedProperty {
            key: key.to_string(),
            name: resolver.resolve_name(key),
            kind: value.kind(),
            value,
        })
        .collect()
}

/// Case-insensitive match on name, friendly name or instance id
pub fn matches_pattern(device: &Device, pattern: &str) -> bool {
    let pattern = pattern.to_lowercase();
    [device.name(), device.friendly_name(), device.instance_id()]
        .iter()
        .any(|field| field.to_lowercase().contains(&pattern))
}

/// Everything `show` needs after CLI flags are merged over the config
#[derive(Debug, Clone)]
pub struct ShowRequest {
    pub options: EnumerationOptions,
    pub pattern: String,
    pub format: OutputFormat,
}

impl ShowRequest {
    pub fn from_args(
        config: &Config,
        pattern: &str,
        class: Option<&str>,
        json: bool,
    ) -> Result<Self> {
        let mut options = config.enumeration.to_options()?;
        if let Some(class) = class {
            options.interface_class = Some(parse_class_arg(class)?);
        }
        Ok(Self {
            options,
            pattern: pattern.to_string(),
            format: if json {
                OutputFormat::Json
            } else {
                config.output.format
            },
        })
    }
}

/// Dump every property of matching devices
pub fn show_devices<R: DeviceRegistry>(
    registry: &R,
    request: &ShowRequest,
    resolver: &NameResolver,
) -> Result<()> {
    let pattern = request.pattern.as_str();
    let format = request.format;
    let devices: Vec<Device> = enumerate(registry, request.options.clone())
        .filter(|d| matches_pattern(d, pattern))
        .collect();

    if devices.is_empty() {
        warn!("No device matches '{}'", pattern);
        return Ok(());
    }

    if format == OutputFormat::Json {
        let reports: Vec<DeviceReport<'_>> = devices
            .iter()
            .map(|device| DeviceReport {
                name: display_name(device),
                properties: named_properties(device.properties(), resolver),
                interfaces: device
                    .interfaces()
                    .iter()
                    .map(|i| InterfaceReport {
                        path: i.path(),
                        properties: named_properties(i.properties(), resolver),
                    })
                    .collect(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for device in &devices {
        print_header(&display_name(device));
        print_properties(device.properties(), resolver);
        for interface in device.interfaces() {
            println!();
            println!("  Interface {}", interface.path());
            print_divider();
            print_properties(interface.properties(), resolver);
        }
    }
    Ok(())
}

fn print_properties(bag: &PropertyBag, resolver: &NameResolver) {
    for property in named_properties(bag, resolver) {
        println!("{}", format_property(&property));
    }
}

/// One aligned `name [type] = value` line
pub fn format_property(property: &NamedProperty<'_>) -> String {
    let label = if property.name.is_empty() {
        property.key.as_str()
    } else {
        property.name.as_str()
    };
    format!(
        "  {:<44} {:<12} {}",
        label,
        format!("[{}]", property.kind),
        property.value
    )
}

// ============================================================================
// name / names / classes
// ============================================================================

/// Resolve one key given on the command line
pub fn resolve_key_name(resolver: &NameResolver, fmtid: &str, pid: u32) -> Result<()> {
    let fmtid = Guid::parse(fmtid).ok_or_else(|| anyhow!("Invalid format identifier '{}'", fmtid))?;
    let key = PropertyKey::new(fmtid, pid);
    let name = resolver.resolve_name(&key);
    if name.is_empty() {
        println!("{}: (no name)", key);
    } else {
        println!("{}: {}", key, name);
    }
    Ok(())
}

/// Print the built-in table and the table recovered from the module scan
pub fn list_names(resolver: &NameResolver, scan_only: bool) -> Result<()> {
    if !scan_only {
        print_header("Built-in names");
        print_table(&static_names());
    }

    print_header("Recovered from module");
    let recovered = resolver.fallback_names();
    if recovered.is_empty() {
        print_warning(&format!(
            "No names recovered from {}",
            resolver.module_path().display()
        ));
    } else {
        print_table(recovered);
        println!();
        print_success(&format!(
            "{} names from {}",
            recovered.len(),
            resolver.module_path().display()
        ));
    }
    Ok(())
}

fn print_table(table: &std::collections::HashMap<PropertyKey, String>) {
    let mut entries: Vec<_> = table.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (key, name) in entries {
        println!("  {:<52} {}", key.to_string(), name);
    }
}

/// Registered interface classes with their SDK names
pub fn list_classes<R: DeviceRegistry>(registry: &R) -> Result<()> {
    let session = registry
        .open(&EnumerationOptions::all())
        .context("Cannot open the device registry")?;
    let mut registered = session.registered_interface_classes();
    registered.sort();

    info!("{} registered interface classes", registered.len());
    for class in &registered {
        match classes::class_name(class) {
            Some(name) => println!("  {}  {}", class, name),
            None => println!("  {}", class),
        }
    }
    Ok(())
}

// ============================================================================
// config
// ============================================================================

/// Handle the `config` command - open, show path, or reset the config file
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        let path = match get_config_path() {
            Some(path) => {
                write_default_config(&path)?;
                path
            }
            None => init_config()?,
        };
        info!("Reset config file at: {}", path.display());
        return Ok(());
    }

    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if path.exists() {
            info!("Config file exists at: {}", path.display());
        } else {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    info!("Opening configuration file in default editor...");
    match open_config_in_editor() {
        Ok(path) => {
            info!("Config file: {}", path.display());
            info!("Run 'devprops show-config' to verify your settings.");
        }
        Err(e) => {
            error!("Failed to open config file: {}", e);
            if let Some(path) = get_config_path() {
                info!("You can manually edit the config at: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            write_default_config(&path)?;
            path
        }
        None => init_config()?,
    };

    print_success(&format!("Configuration file: {}", output_path.display()));
    print_info("Edit this file to change enumeration, name resolution and output settings.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("[enumeration]");
    info!(
        "  interface_class = {:?}",
        config
            .enumeration
            .interface_class
            .as_deref()
            .unwrap_or("(all)")
    );
    info!(
        "  include_interfaces = {}",
        config.enumeration.include_interfaces
    );
    info!("  present_only = {}", config.enumeration.present_only);
    info!("");
    info!("[names]");
    info!("  resolve_names = {}", config.names.resolve_names);
    info!("  scan_module = {}", config.names.scan_module);
    info!(
        "  module_path = \"{}\"",
        config
            .names
            .module_path
            .clone()
            .unwrap_or_else(crate::names::default_module_path)
            .display()
    );
    info!("");
    info!("[output]");
    info!("  format = {:?}", config.output.format);
    info!("  show_empty = {}", config.output.show_empty);
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::keys;
    use crate::names::NoNameService;
    use crate::testdb::{MockDevice, MockProperty, MockRegistry};

    fn request(vid: Option<&str>, pid: Option<&str>) -> ListRequest {
        ListRequest::from_args(&Config::default(), None, false, false, vid, pid, false).unwrap()
    }

    #[test]
    fn test_list_request_defaults() {
        let request = request(None, None);
        assert_eq!(request.options, EnumerationOptions::all());
        assert!(request.filter.is_none());
        assert_eq!(request.format, OutputFormat::Text);
    }

    #[test]
    fn test_vid_filter_narrows_to_hid() {
        let request = request(Some("04d8"), Some("f372"));
        assert_eq!(request.options.interface_class, Some(classes::HID));
        assert_eq!(request.filter, Some(HidFilter::new(0x04D8, Some(0xF372))));

        let progress = EnumerationProgress::hidden();
        let devices = collect_devices(&MockRegistry::sample(), &request, &progress);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name(), "Luxafor Flag");
    }

    #[test]
    fn test_invalid_arguments_rejected() {
        let config = Config::default();
        let bad_class =
            ListRequest::from_args(&config, Some("nope"), false, false, None, None, false);
        assert!(bad_class.is_err());
        let bad_vid =
            ListRequest::from_args(&config, None, false, false, Some("xyz"), None, false);
        assert!(bad_vid.is_err());
    }

    #[test]
    fn test_unnamed_devices_hidden_unless_requested() {
        let registry = MockRegistry::new()
            .with_device(MockDevice::named("Named"))
            .with_device(
                MockDevice::new().with_property(MockProperty::uint32(keys::PROCESSOR_NUMBER, 2)),
            );

        let mut request = request(None, None);
        let progress = EnumerationProgress::hidden();
        assert_eq!(collect_devices(&registry, &request, &progress).len(), 1);

        request.show_empty = true;
        assert_eq!(collect_devices(&registry, &request, &progress).len(), 2);
    }

    #[test]
    fn test_describe_device_lists_interfaces() {
        let options = EnumerationOptions::for_class(classes::HID);
        let devices: Vec<Device> = enumerate(&MockRegistry::sample(), options).collect();
        let lines = describe_device(1, &devices[0]);
        assert_eq!(lines[0], "[1] Luxafor Flag");
        assert!(lines
            .iter()
            .any(|l| l == "    Class: HIDClass {745a17a0-74d3-11d0-b6fe-00a0c90f57da}"));
        assert!(lines
            .iter()
            .any(|l| l.contains("[GUID_DEVINTERFACE_HID] VID 04D8 PID F372")));

        let keyboard = describe_device(2, &devices[1]);
        assert_eq!(keyboard[0], "[2] HID Keyboard Device (Logitech Keyboard)");
    }

    #[test]
    fn test_named_properties_use_resolver() {
        let resolver = NameResolver::new(Box::new(NoNameService));
        let options = EnumerationOptions::for_class(classes::USB_DEVICE);
        let devices: Vec<Device> = enumerate(&MockRegistry::sample(), options).collect();
        let interface = &devices[0].interfaces()[0];
        let named = named_properties(interface.properties(), &resolver);
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].name, "Device Interface Enabled");
        assert_eq!(named[0].kind, "bool");
        assert!(format_property(&named[0]).starts_with("  Device Interface Enabled"));
    }

    #[test]
    fn test_matches_pattern() {
        let devices: Vec<Device> =
            enumerate(&MockRegistry::sample(), EnumerationOptions::all()).collect();
        let hits: Vec<String> = devices
            .iter()
            .filter(|d| matches_pattern(d, "logitech"))
            .map(|d| d.name())
            .collect();
        assert_eq!(hits, vec!["HID Keyboard Device".to_string()]);
        assert!(devices.iter().any(|d| matches_pattern(d, "vid_04d8")));
    }

    #[test]
    fn test_show_request_merges_class() {
        let config = Config::default();
        let request = ShowRequest::from_args(&config, "Hub", Some("usb_device"), false).unwrap();
        assert_eq!(request.options.interface_class, Some(classes::USB_DEVICE));
        assert_eq!(request.format, config.output.format);
        assert!(ShowRequest::from_args(&config, "Hub", Some("nope"), false).is_err());
    }

    #[test]
    fn test_mock_registry_commands_run() {
        let resolver = NameResolver::new(Box::new(NoNameService));
        let registry = MockRegistry::sample();
        let config = Config::default();
        run_registry_command(&registry, &RegistryCommand::Classes, &resolver).unwrap();
        let show = ShowRequest::from_args(&config, "hub", None, true).unwrap();
        assert_eq!(show.format, OutputFormat::Json);
        run_registry_command(&registry, &RegistryCommand::Show(show), &resolver).unwrap();
        let list = RegistryCommand::List(request(None, None));
        run_registry_command(&registry, &list, &resolver).unwrap();
        assert!(resolve_key_name(&resolver, "not-a-guid", 1).is_err());
    }
}
