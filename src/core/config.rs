//! Configuration module for the device property explorer
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\device_property_explorer\config.toml
//! - Linux/macOS: ~/.config/device_property_explorer/config.toml

use crate::device::classes;
use crate::device::enumerator::EnumerationOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for config directory
const APP_NAME: &str = "device_property_explorer";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Local files that take precedence over the standard location
const LOCAL_CONFIG_FILES: [&str; 2] = ["./config.toml", "./devprops.toml"];

/// Get the standard configuration directory for the application.
///
/// Returns:
/// - Windows: %APPDATA%\device_property_explorer
/// - Linux/macOS: ~/.config/device_property_explorer
pub fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join(APP_NAME))
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".config").join(APP_NAME))
    }
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Ensure the configuration directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let config_dir = get_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::WriteError(config_dir.clone(), e.to_string()))?;
    }

    Ok(config_dir)
}

/// Write the default configuration to `path`, replacing any existing file.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| ConfigError::WriteError(parent.to_path_buf(), e.to_string()))?;
    }
    fs::write(path, Config::generate_default_config())
        .map_err(|e| ConfigError::WriteError(path.to_path_buf(), e.to_string()))
}

/// Initialize the configuration file if it doesn't exist.
///
/// Returns the path to the config file.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let config_path = ensure_config_dir()?.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        write_default_config(&config_path)?;
    }

    Ok(config_path)
}

/// Open the configuration file in the default application.
pub fn open_config_in_editor() -> Result<PathBuf, ConfigError> {
    let config_path = init_config()?;

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .arg("/C")
            .arg("start")
            .arg("")
            .arg(&config_path)
            .spawn()
            .map_err(|e| ConfigError::OpenError(config_path.clone(), e.to_string()))?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(&config_path)
            .spawn()
            .map_err(|e| ConfigError::OpenError(config_path.clone(), e.to_string()))?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(&config_path)
            .spawn()
            .map_err(|e| ConfigError::OpenError(config_path.clone(), e.to_string()))?;
    }

    Ok(config_path)
}

/// How listings are printed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Which devices to walk
    pub enumeration: EnumerationConfig,

    /// Property key name resolution
    pub names: NamesConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Enumeration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnumerationConfig {
    /// Interface class GUID or alias (e.g. "hid"); all classes when unset
    pub interface_class: Option<String>,

    /// Read each device's interfaces
    pub include_interfaces: bool,

    /// Skip devices that are not currently attached
    pub present_only: bool,
}

/// Name resolution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NamesConfig {
    /// Ask the property system for canonical names
    pub resolve_names: bool,

    /// Fall back to the table embedded in the Device Manager module
    pub scan_module: bool,

    /// Module to scan; `%SystemRoot%\System32\devmgr.dll` when unset
    pub module_path: Option<PathBuf>,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// text or json
    pub format: OutputFormat,

    /// List devices that have neither a name nor a friendly name
    pub show_empty: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            interface_class: None,
            include_interfaces: true,
            present_only: false,
        }
    }
}

impl EnumerationConfig {
    /// Translate into enumeration options, resolving the class alias
    pub fn to_options(&self) -> Result<EnumerationOptions, ConfigError> {
        let options = match self.interface_class.as_deref().map(str::trim) {
            None | Some("") => EnumerationOptions::all(),
            Some(text) => {
                let class = classes::parse_class(text).ok_or_else(|| {
                    ConfigError::InvalidValue("enumeration.interface_class", text.to_string())
                })?;
                EnumerationOptions::for_class(class)
            }
        };
        Ok(options
            .with_interfaces(self.include_interfaces)
            .only_present(self.present_only))
    }
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            resolve_names: true,
            scan_module: true,
            module_path: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            show_empty: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./devprops.log"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./config.toml
    /// 2. ./devprops.toml
    /// 3. the standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        for path in LOCAL_CONFIG_FILES.iter().map(PathBuf::from) {
            if path.exists() {
                return Self::load(path);
            }
        }

        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        Ok(Self::default())
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        LOCAL_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .or_else(get_config_path)
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILES[0]))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::WriteError(path.as_ref().to_path_buf(), e.to_string()))?;

        Ok(())
    }

    /// Generate a default config file with comments
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// Failed to serialize configuration to TOML
    SerializeError(String),
    /// Failed to write configuration file
    WriteError(PathBuf, String),
    /// Could not determine config directory
    ConfigDirNotFound,
    /// Failed to open config file in editor
    OpenError(PathBuf, String),
    /// A setting has a value that cannot be interpreted
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ParseError(path, err) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::SerializeError(err) => {
                write!(f, "Failed to serialize configuration: {}", err)
            }
            ConfigError::WriteError(path, err) => {
                write!(
                    f,
                    "Failed to write config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ConfigDirNotFound => {
                write!(f, "Could not determine configuration directory")
            }
            ConfigError::OpenError(path, err) => {
                write!(
                    f,
                    "Failed to open config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::InvalidValue(setting, value) => {
                write!(f, "Invalid value for {}: '{}'", setting, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.enumeration.include_interfaces);
        assert!(!config.enumeration.present_only);
        assert!(config.names.resolve_names);
        assert!(config.names.scan_module);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed: Config = toml::from_str(&Config::generate_default_config()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[enumeration]
interface_class = "hid"
present_only = true

[output]
format = "json"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.enumeration.interface_class.as_deref(), Some("hid"));
        assert!(config.enumeration.present_only);
        assert!(config.enumeration.include_interfaces);
        assert_eq!(config.output.format, OutputFormat::Json);

        let options = config.enumeration.to_options().unwrap();
        assert_eq!(options.interface_class, Some(classes::HID));
        assert!(options.present_only);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load("/no/such/config.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::FileNotFound(_)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output\nformat = 1").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_, _)));
        assert!(err.to_string().starts_with("Failed to parse config file"));
    }

    #[test]
    fn test_unknown_class_alias_rejected() {
        let config = EnumerationConfig {
            interface_class: Some("not-a-class".to_string()),
            ..Default::default()
        };
        let err = config.to_options().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for enumeration.interface_class: 'not-a-class'"
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.names.module_path = Some(PathBuf::from("C:\\Windows\\System32\\devmgr.dll"));
        config.output.show_empty = true;
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);

        write_default_config(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }
}
