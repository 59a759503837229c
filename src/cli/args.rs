//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Explore the Windows device registry: devices, interfaces and every typed property they carry
#[derive(Parser, Debug)]
#[command(name = "devprops")]
#[command(version)]
#[command(
    about = "Enumerate devices and interfaces and decode their properties",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Use a scripted registry instead of the system one (`--mock` or `--mock=<scenario>`)
    #[arg(
        long,
        global = true,
        value_name = "SCENARIO",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "sample"
    )]
    pub mock: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List devices and their interfaces
    List {
        /// Interface class as a GUID or alias (e.g. "hid", "usb_device")
        #[arg(long, value_name = "CLASS")]
        class: Option<String>,

        /// Skip interface enumeration
        #[arg(long)]
        no_interfaces: bool,

        /// Only devices currently attached
        #[arg(long)]
        present: bool,

        /// HID vendor id in hex
        #[arg(long, value_name = "HEX")]
        vid: Option<String>,

        /// HID product id in hex (requires --vid)
        #[arg(long, value_name = "HEX", requires = "vid")]
        pid: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Dump every property of devices whose name contains a pattern
    Show {
        /// Case-insensitive substring of the name, friendly name or instance id
        pattern: String,

        /// Interface class as a GUID or alias
        #[arg(long, value_name = "CLASS")]
        class: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Resolve the display name of one property key
    Name {
        /// Format identifier, e.g. {a45c254e-df1c-4efd-8020-67d146a850e0}
        fmtid: String,

        /// Property index within the format
        pid: u32,
    },

    /// Print the built-in and recovered key name tables
    Names {
        /// Only the table recovered from the Device Manager module
        #[arg(long)]
        scan_only: bool,
    },

    /// List registered interface classes
    Classes,

    /// Open configuration file in default editor (creates if missing)
    Config {
        /// Show config file path instead of opening it
        #[arg(long)]
        path: bool,

        /// Reset config to defaults
        #[arg(long)]
        reset: bool,
    },

    /// Generate a default configuration file
    GenerateConfig {
        /// Output path for the configuration file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_list_with_filter() {
        let args = Args::parse_from([
            "devprops", "list", "--mock", "--class", "hid", "--vid", "04d8", "--pid", "f372",
        ]);
        assert_eq!(args.mock.as_deref(), Some("sample"));
        match args.command {
            Some(Commands::List {
                class, vid, pid, ..
            }) => {
                assert_eq!(class.as_deref(), Some("hid"));
                assert_eq!(vid.as_deref(), Some("04d8"));
                assert_eq!(pid.as_deref(), Some("f372"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_pid_requires_vid() {
        assert!(Args::try_parse_from(["devprops", "list", "--pid", "f372"]).is_err());
    }

    #[test]
    fn test_mock_scenario_name() {
        let args = Args::parse_from(["devprops", "--mock=probe_quirks", "classes"]);
        assert_eq!(args.mock.as_deref(), Some("probe_quirks"));
        assert!(matches!(args.command, Some(Commands::Classes)));
    }

    #[test]
    fn test_bare_mock_before_subcommand() {
        let args = Args::parse_from(["devprops", "--mock", "list"]);
        assert_eq!(args.mock.as_deref(), Some("sample"));
        assert!(matches!(args.command, Some(Commands::List { .. })));
    }

    #[test]
    fn test_parse_name() {
        let args = Args::parse_from([
            "devprops",
            "name",
            "{b725f130-47ef-101a-a5f1-02608c9eebac}",
            "10",
        ]);
        assert!(matches!(args.command, Some(Commands::Name { pid: 10, .. })));
    }
}
