//! Property key display names
//!
//! [`NameResolver`] maps a [`PropertyKey`] to a human-readable label. Names
//! come from three places, consulted in order:
//!
//! 1. a small static table of keys the system has no canonical name for
//! 2. the live property system ([`NameService`])
//! 3. a table recovered from the Device Manager module on disk
//!    ([`image::NameTableScanner`], 64-bit only)
//!
//! Every answer, including "no name", is cached for the life of the
//! resolver. Share one resolver (for instance behind an `Arc`) to get a
//! process-wide cache.

pub mod image;

use crate::core::config::NamesConfig;
use crate::device::key::{keys, PropertyKey};
use image::NameTableScanner;
use log::{debug, trace};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};

/// Live canonical-name lookup
pub trait NameService: Send + Sync {
    fn canonical_name(&self, key: &PropertyKey) -> Option<String>;
}

/// A name service that knows nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNameService;

impl NameService for NoNameService {
    fn canonical_name(&self, _key: &PropertyKey) -> Option<String> {
        None
    }
}

#[cfg(windows)]
pub use self::property_system::PropertySystemNames;

#[cfg(windows)]
mod property_system {
    use super::NameService;
    use crate::device::key::PropertyKey;
    use windows::Win32::{
        Devices::Properties::DEVPROPKEY, System::Com::CoTaskMemFree,
        UI::Shell::PropertiesSystem::PSGetNameFromPropertyKey,
    };

    /// Names from `PSGetNameFromPropertyKey`
    #[derive(Debug, Default, Clone, Copy)]
    pub struct PropertySystemNames;

    impl NameService for PropertySystemNames {
        fn canonical_name(&self, key: &PropertyKey) -> Option<String> {
            let native = DEVPROPKEY {
                fmtid: key.fmtid.into(),
                pid: key.pid,
            };
            // PROPERTYKEY and DEVPROPKEY share a layout
            let name = unsafe { PSGetNameFromPropertyKey(&native as *const DEVPROPKEY as *const _) }
                .ok()?;
            if name.is_null() {
                return None;
            }
            let text = unsafe { name.to_string() }.ok();
            unsafe { CoTaskMemFree(Some(name.0 as *const _)) };
            text.filter(|t| !t.is_empty())
        }
    }
}

/// Keys the property system has no canonical name for
pub fn static_names() -> HashMap<PropertyKey, String> {
    [
        (keys::INTERFACE_CLASS_GUID, "Device Interface Class Guid"),
        (keys::INTERFACE_ENABLED, "Device Interface Enabled"),
        (
            keys::PCI_SUPPORTED_LINK_SUB_STATE,
            "Pci Device Supported Link Sub State",
        ),
        (keys::PNPX_LAST_NOTIFICATION_TIME, "PNPX Last Notification Time"),
        (keys::WSD_APP_SEQ_INSTANCE_ID, "WSD App Seq Instance ID"),
        (keys::PROCESSOR_NUMBER, "Processor Number"),
        (keys::SSDP_DEV_LIFE_TIME, "SSDP Dev Life Time"),
        (keys::SSDP_NETWORK_INTERFACE, "SSDP Network Interface"),
        (keys::PCI_ON_POST_PATH, "Pci Device On Post Path"),
        (
            keys::INTERFACE_REFERENCE_STRING,
            "Device Interface Reference String",
        ),
    ]
    .into_iter()
    .map(|(key, name)| (key, name.to_string()))
    .collect()
}

/// Default location of the module carrying the embedded name table
pub fn default_module_path() -> PathBuf {
    let root = std::env::var_os("SystemRoot").unwrap_or_else(|| "C:\\Windows".into());
    PathBuf::from(root).join("System32").join("devmgr.dll")
}

struct Tables {
    cache: RwLock<HashMap<PropertyKey, String>>,
    /// Recovered from the module scan, consulted after the live service
    fallback: HashMap<PropertyKey, String>,
}

/// Tiered, caching property key name resolver
pub struct NameResolver {
    service: Box<dyn NameService>,
    scanner: Option<Box<dyn NameTableScanner>>,
    module_path: PathBuf,
    tables: OnceLock<Tables>,
}

impl NameResolver {
    pub fn new(service: Box<dyn NameService>) -> Self {
        Self {
            service,
            scanner: None,
            module_path: default_module_path(),
            tables: OnceLock::new(),
        }
    }

    /// Enable the module scan fallback
    pub fn with_scanner(
        mut self,
        scanner: Box<dyn NameTableScanner>,
        module_path: impl Into<PathBuf>,
    ) -> Self {
        self.scanner = Some(scanner);
        self.module_path = module_path.into();
        self
    }

    /// The platform's resolver, honouring the `[names]` settings
    #[cfg_attr(not(windows), allow(unused_variables))]
    pub fn system(config: &NamesConfig) -> Self {
        #[cfg(windows)]
        {
            let service: Box<dyn NameService> = if config.resolve_names {
                Box::new(PropertySystemNames)
            } else {
                Box::new(NoNameService)
            };
            let resolver = Self::new(service);
            if config.scan_module {
                let path = config
                    .module_path
                    .clone()
                    .unwrap_or_else(default_module_path);
                resolver.with_scanner(Box::new(image::ModuleNameScanner::system()), path)
            } else {
                resolver
            }
        }
        #[cfg(not(windows))]
        {
            Self::new(Box::new(NoNameService))
        }
    }

    pub fn module_path(&self) -> &std::path::Path {
        &self.module_path
    }

    fn tables(&self) -> &Tables {
        self.tables.get_or_init(|| {
            let fallback = match &self.scanner {
                Some(scanner) if cfg!(target_pointer_width = "64") => {
                    scanner.scan_for_names(&self.module_path)
                }
                Some(_) => {
                    debug!("Module name scan is only supported on 64-bit builds");
                    HashMap::new()
                }
                None => HashMap::new(),
            };
            Tables {
                cache: RwLock::new(static_names()),
                fallback,
            }
        })
    }

    /// Display name for `key`, empty when no tier knows it
    pub fn resolve_name(&self, key: &PropertyKey) -> String {
        let tables = self.tables();
        {
            let cache = tables.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(name) = cache.get(key) {
                return name.clone();
            }
        }

        let name = self
            .service
            .canonical_name(key)
            .or_else(|| tables.fallback.get(key).cloned())
            .unwrap_or_default();
        trace!("Resolved {} to {:?}", key, name);

        let mut cache = tables.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.entry(*key).or_insert(name).clone()
    }

    /// Display name, or the key itself when unresolved
    pub fn label(&self, key: &PropertyKey) -> String {
        let name = self.resolve_name(key);
        if name.is_empty() {
            key.to_string()
        } else {
            name
        }
    }

    /// The table recovered from the module scan
    pub fn fallback_names(&self) -> &HashMap<PropertyKey, String> {
        &self.tables().fallback
    }

    /// Number of cached answers, including empty ones
    pub fn cached_len(&self) -> usize {
        self.tables()
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl std::fmt::Debug for NameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameResolver")
            .field("scanner", &self.scanner.is_some())
            .field("module_path", &self.module_path)
            .field("initialized", &self.tables.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::key::Guid;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingService {
        calls: Arc<AtomicUsize>,
        names: HashMap<PropertyKey, String>,
    }

    impl NameService for CountingService {
        fn canonical_name(&self, key: &PropertyKey) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.names.get(key).cloned()
        }
    }

    struct FixedScanner {
        scans: Arc<AtomicUsize>,
        names: HashMap<PropertyKey, String>,
    }

    impl NameTableScanner for FixedScanner {
        fn scan_for_names(&self, _module: &Path) -> HashMap<PropertyKey, String> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.names.clone()
        }
    }

    fn counting(names: &[(PropertyKey, &str)]) -> (NameResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = CountingService {
            calls: calls.clone(),
            names: names.iter().map(|(k, n)| (*k, n.to_string())).collect(),
        };
        (NameResolver::new(Box::new(service)), calls)
    }

    #[test]
    fn test_static_names_skip_service() {
        let (resolver, calls) = counting(&[]);
        assert_eq!(
            resolver.resolve_name(&keys::INTERFACE_ENABLED),
            "Device Interface Enabled"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(static_names().len(), 10);
    }

    #[test]
    fn test_service_result_is_cached() {
        let (resolver, calls) = counting(&[(keys::NAME, "Name")]);
        assert_eq!(resolver.resolve_name(&keys::NAME), "Name");
        assert_eq!(resolver.resolve_name(&keys::NAME), "Name");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unresolved_key_cached_as_empty() {
        let (resolver, calls) = counting(&[]);
        let key = PropertyKey::new(Guid::from_u128(42), 1);
        assert_eq!(resolver.resolve_name(&key), "");
        assert_eq!(resolver.resolve_name(&key), "");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.label(&key), key.to_string());
    }

    #[test]
    fn test_fallback_used_after_service_and_scanned_once() {
        let key = PropertyKey::new(Guid::from_u128(7), 3);
        let scans = Arc::new(AtomicUsize::new(0));
        let scanner = FixedScanner {
            scans: scans.clone(),
            names: HashMap::from([(key, "Widget Color".to_string())]),
        };
        let (resolver, calls) = counting(&[]);
        let resolver = resolver.with_scanner(Box::new(scanner), "devmgr.dll");

        if cfg!(target_pointer_width = "64") {
            assert_eq!(resolver.resolve_name(&key), "Widget Color");
            assert_eq!(resolver.fallback_names().len(), 1);
        } else {
            assert_eq!(resolver.resolve_name(&key), "");
        }
        assert_eq!(resolver.resolve_name(&key), resolver.resolve_name(&key));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(scans.load(Ordering::SeqCst) <= 1);
    }

    #[test]
    fn test_service_wins_over_fallback() {
        let scanner = FixedScanner {
            scans: Arc::new(AtomicUsize::new(0)),
            names: HashMap::from([(keys::NAME, "Scanned".to_string())]),
        };
        let (resolver, _) = counting(&[(keys::NAME, "Name")]);
        let resolver = resolver.with_scanner(Box::new(scanner), "devmgr.dll");
        assert_eq!(resolver.resolve_name(&keys::NAME), "Name");
    }

    #[test]
    fn test_system_resolver_answers_static_names() {
        let config = NamesConfig {
            resolve_names: false,
            scan_module: false,
            module_path: None,
        };
        let resolver = NameResolver::system(&config);
        assert_eq!(
            resolver.resolve_name(&keys::INTERFACE_ENABLED),
            "Device Interface Enabled"
        );
        assert_eq!(resolver.cached_len(), static_names().len());
    }

    #[test]
    fn test_shared_resolver_across_threads() {
        let (resolver, calls) = counting(&[(keys::DEVICE_DESC, "Device Description")]);
        let resolver = Arc::new(resolver);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = resolver.clone();
                std::thread::spawn(move || resolver.resolve_name(&keys::DEVICE_DESC))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "Device Description");
        }
        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(resolver.cached_len(), 11);
    }
}
