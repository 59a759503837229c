//! SetupAPI backend for the device registry
//!
//! Wraps a device information set (`HDEVINFO`) in a session that is
//! destroyed on drop. All property calls go through the unified
//! `SetupDiGet*PropertyW` entry points, which report the DEVPROPTYPE tag
//! alongside the data.

use super::enumerator::EnumerationOptions;
use super::key::{Guid, PropertyKey};
use super::registry::{interpret_probe, DeviceRegistry, Probe, PropertyScope, RegistrySession};
use super::value::utf16_until_nul;
use crate::core::error::{RegistryError, Result};
use log::{debug, trace, warn};
use std::mem::size_of;
use windows::{
    core::{w, GUID, PCWSTR, PWSTR},
    Win32::{
        Devices::{
            DeviceAndDriverInstallation::{
                SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInfo, SetupDiEnumDeviceInterfaces,
                SetupDiGetClassDevsW, SetupDiGetDeviceInterfaceDetailW,
                SetupDiGetDeviceInterfacePropertyKeys, SetupDiGetDeviceInterfacePropertyW,
                SetupDiGetDevicePropertyKeys, SetupDiGetDevicePropertyW, DIGCF_ALLCLASSES,
                DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO, SP_DEVICE_INTERFACE_DATA,
                SP_DEVICE_INTERFACE_DETAIL_DATA_W, SP_DEVINFO_DATA,
            },
            Properties::{DEVPROPKEY, DEVPROPTYPE},
        },
        Foundation::{
            ERROR_INSUFFICIENT_BUFFER, ERROR_NOT_FOUND, ERROR_NO_MORE_ITEMS, ERROR_SUCCESS, HWND,
        },
        System::Registry::{
            RegCloseKey, RegEnumKeyExW, RegOpenKeyExW, HKEY, HKEY_LOCAL_MACHINE, KEY_READ,
        },
    },
};

/// DevicePath follows the 4-byte cbSize field of the detail structure
const DETAIL_PATH_OFFSET: usize = 4;

/// Registry key whose subkeys are the registered interface class GUIDs
const DEVICE_CLASSES_KEY: PCWSTR = w!("SYSTEM\\CurrentControlSet\\Control\\DeviceClasses");

/// The live Windows device registry
#[derive(Debug, Default, Clone, Copy)]
pub struct SetupApiRegistry;

impl SetupApiRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceRegistry for SetupApiRegistry {
    type Session = SetupApiSession;

    fn open(&self, options: &EnumerationOptions) -> Result<SetupApiSession> {
        let mut flags = DIGCF_DEVICEINTERFACE;
        if options.interface_class.is_none() {
            flags |= DIGCF_ALLCLASSES;
        }
        if options.present_only {
            flags |= DIGCF_PRESENT;
        }

        let class: Option<GUID> = options.interface_class.map(GUID::from);
        let handle = unsafe {
            SetupDiGetClassDevsW(
                class.as_ref().map(|g| g as *const GUID),
                PCWSTR::null(),
                HWND::default(),
                flags,
            )
        }
        .map_err(|e| RegistryError::SessionUnavailable(format!("SetupDiGetClassDevsW: {}", e)))?;

        debug!(
            "Opened device information set (class: {:?}, flags: 0x{:X})",
            options.interface_class, flags.0
        );
        Ok(SetupApiSession { handle })
    }
}

/// An open device information set
pub struct SetupApiSession {
    handle: HDEVINFO,
}

impl Drop for SetupApiSession {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = SetupDiDestroyDeviceInfoList(self.handle) {
                warn!("Failed to destroy device information set: {}", e);
            }
        }
    }
}

type Scope<'a> = PropertyScope<'a, SP_DEVINFO_DATA, SP_DEVICE_INTERFACE_DATA>;

impl RegistrySession for SetupApiSession {
    type Device = SP_DEVINFO_DATA;
    type Interface = SP_DEVICE_INTERFACE_DATA;

    fn device_at(&self, index: u32) -> Option<SP_DEVINFO_DATA> {
        let mut data = SP_DEVINFO_DATA {
            cbSize: size_of::<SP_DEVINFO_DATA>() as u32,
            ..Default::default()
        };
        match unsafe { SetupDiEnumDeviceInfo(self.handle, index, &mut data) } {
            Ok(()) => Some(data),
            Err(e) => {
                if e.code() != ERROR_NO_MORE_ITEMS.to_hresult() {
                    debug!("SetupDiEnumDeviceInfo({}) stopped: {}", index, e);
                }
                None
            }
        }
    }

    fn interface_at(
        &self,
        device: &SP_DEVINFO_DATA,
        class: &Guid,
        index: u32,
    ) -> Option<SP_DEVICE_INTERFACE_DATA> {
        let class = GUID::from(*class);
        let mut data = SP_DEVICE_INTERFACE_DATA {
            cbSize: size_of::<SP_DEVICE_INTERFACE_DATA>() as u32,
            ..Default::default()
        };
        unsafe {
            SetupDiEnumDeviceInterfaces(
                self.handle,
                Some(device as *const SP_DEVINFO_DATA),
                &class,
                index,
                &mut data,
            )
        }
        .ok()
        .map(|_| data)
    }

    fn property_key_count(&self, scope: Scope<'_>) -> Result<u32> {
        let mut count = 0u32;
        let result = unsafe {
            match scope {
                PropertyScope::Device(device) => SetupDiGetDevicePropertyKeys(
                    self.handle,
                    device,
                    None,
                    Some(&mut count as *mut u32),
                    0,
                ),
                PropertyScope::Interface(interface) => SetupDiGetDeviceInterfacePropertyKeys(
                    self.handle,
                    interface,
                    None,
                    Some(&mut count as *mut u32),
                    0,
                ),
            }
        };
        // the sizing call reports insufficient buffer whenever keys exist
        if count > 0 {
            return Ok(count);
        }
        result
            .map(|_| 0)
            .map_err(|e| classify("SetupDiGetDevicePropertyKeys", e))
    }

    fn property_keys(&self, scope: Scope<'_>, count: u32) -> Result<Vec<PropertyKey>> {
        let mut native = vec![DEVPROPKEY::default(); count as usize];
        unsafe {
            match scope {
                PropertyScope::Device(device) => {
                    SetupDiGetDevicePropertyKeys(self.handle, device, Some(&mut native), None, 0)
                }
                PropertyScope::Interface(interface) => SetupDiGetDeviceInterfacePropertyKeys(
                    self.handle,
                    interface,
                    Some(&mut native),
                    None,
                    0,
                ),
            }
        }
        .map_err(|e| classify("SetupDiGetDevicePropertyKeys", e))?;

        Ok(native
            .iter()
            .map(|k| PropertyKey::new(Guid::from(k.fmtid), k.pid))
            .collect())
    }

    fn probe(&self, scope: Scope<'_>, key: &PropertyKey) -> Result<Probe> {
        let native = to_native(key);
        let mut tag = DEVPROPTYPE::default();
        let mut size = 0u32;
        let outcome = unsafe {
            match scope {
                PropertyScope::Device(device) => SetupDiGetDevicePropertyW(
                    self.handle,
                    device,
                    &native,
                    &mut tag,
                    None,
                    Some(&mut size as *mut u32),
                    0,
                ),
                PropertyScope::Interface(interface) => SetupDiGetDeviceInterfacePropertyW(
                    self.handle,
                    interface,
                    &native,
                    &mut tag,
                    None,
                    Some(&mut size as *mut u32),
                    0,
                ),
            }
        };
        interpret_probe(
            outcome.map_err(|e| classify("SetupDiGetDevicePropertyW", e)),
            tag.0,
            size,
        )
    }

    fn fetch(&self, scope: Scope<'_>, key: &PropertyKey, buf: &mut [u8]) -> Result<()> {
        let native = to_native(key);
        let mut tag = DEVPROPTYPE::default();
        unsafe {
            match scope {
                PropertyScope::Device(device) => SetupDiGetDevicePropertyW(
                    self.handle,
                    device,
                    &native,
                    &mut tag,
                    Some(buf),
                    None,
                    0,
                ),
                PropertyScope::Interface(interface) => SetupDiGetDeviceInterfacePropertyW(
                    self.handle,
                    interface,
                    &native,
                    &mut tag,
                    Some(buf),
                    None,
                    0,
                ),
            }
        }
        .map_err(|e| classify("SetupDiGetDevicePropertyW", e))
    }

    fn interface_path(&self, interface: &SP_DEVICE_INTERFACE_DATA) -> Option<String> {
        let mut size = 0u32;
        let _ = unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                self.handle,
                interface,
                None,
                0,
                Some(&mut size as *mut u32),
                None,
            )
        };
        if (size as usize) < DETAIL_PATH_OFFSET + 2 {
            trace!("SetupDiGetDeviceInterfaceDetailW reported no path ({} bytes)", size);
            return None;
        }

        // u32 storage keeps the detail header aligned
        let mut storage = vec![0u32; (size as usize).div_ceil(4)];
        let detail = storage.as_mut_ptr() as *mut SP_DEVICE_INTERFACE_DETAIL_DATA_W;
        unsafe {
            // cbSize covers only the fixed part of the structure
            (*detail).cbSize = size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32;
            SetupDiGetDeviceInterfaceDetailW(self.handle, interface, Some(detail), size, None, None)
        }
        .map_err(|e| debug!("SetupDiGetDeviceInterfaceDetailW failed: {}", e))
        .ok()?;

        let bytes: Vec<u8> = storage.iter().flat_map(|w| w.to_le_bytes()).collect();
        device_path(&bytes, size as usize)
    }

    fn registered_interface_classes(&self) -> Vec<Guid> {
        registered_interface_classes()
    }
}

/// Interface class GUIDs listed under `HKLM\...\Control\DeviceClasses`
pub fn registered_interface_classes() -> Vec<Guid> {
    let mut key = HKEY::default();
    let status =
        unsafe { RegOpenKeyExW(HKEY_LOCAL_MACHINE, DEVICE_CLASSES_KEY, 0, KEY_READ, &mut key) };
    if status != ERROR_SUCCESS {
        warn!("Cannot open DeviceClasses registry key: error {}", status.0);
        return Vec::new();
    }
    let key = RegKey(key);

    let mut classes = Vec::new();
    let mut index = 0u32;
    loop {
        let mut name = [0u16; 256];
        let mut len = name.len() as u32;
        let status = unsafe {
            RegEnumKeyExW(
                key.0,
                index,
                PWSTR(name.as_mut_ptr()),
                &mut len,
                None,
                PWSTR::null(),
                None,
                None,
            )
        };
        if status != ERROR_SUCCESS {
            break;
        }
        index += 1;

        let text = String::from_utf16_lossy(&name[..len as usize]);
        match Guid::parse(&text) {
            Some(guid) => classes.push(guid),
            None => trace!("Ignoring DeviceClasses subkey {}", text),
        }
    }
    classes
}

/// Closes a registry key on drop
struct RegKey(HKEY);

impl Drop for RegKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

/// Read the DevicePath out of the first `size` bytes of a detail buffer
fn device_path(detail: &[u8], size: usize) -> Option<String> {
    let path = utf16_until_nul(detail.get(DETAIL_PATH_OFFSET..size)?);
    (!path.is_empty()).then_some(path)
}

fn to_native(key: &PropertyKey) -> DEVPROPKEY {
    DEVPROPKEY {
        fmtid: key.fmtid.into(),
        pid: key.pid,
    }
}

/// Map a SetupAPI failure onto the registry error taxonomy
fn classify(call: &'static str, err: windows::core::Error) -> RegistryError {
    let code = err.code();
    if code == ERROR_INSUFFICIENT_BUFFER.to_hresult() {
        RegistryError::InsufficientBuffer
    } else if code == ERROR_NOT_FOUND.to_hresult() {
        RegistryError::NotFound
    } else {
        RegistryError::Api {
            call,
            code: (code.0 as u32) & 0xFFFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::value::encode_utf16;

    fn detail_buffer(path: &str) -> Vec<u8> {
        let mut bytes = 8u32.to_le_bytes().to_vec();
        bytes.extend(encode_utf16(path));
        bytes
    }

    #[test]
    fn test_device_path_reads_after_header() {
        let detail = detail_buffer(r"\\?\hid#vid_04d8&pid_f372");
        assert_eq!(
            device_path(&detail, detail.len()).as_deref(),
            Some(r"\\?\hid#vid_04d8&pid_f372")
        );
    }

    #[test]
    fn test_device_path_short_size() {
        let detail = detail_buffer("x");
        for size in 0..DETAIL_PATH_OFFSET {
            assert_eq!(device_path(&detail, size), None);
        }
        assert_eq!(device_path(&detail, detail.len() + 8), None);
    }

    #[test]
    fn test_device_path_empty() {
        let detail = detail_buffer("");
        assert_eq!(device_path(&detail, detail.len()), None);
    }

    #[test]
    fn test_classify_error_codes() {
        let err = windows::core::Error::from(ERROR_NOT_FOUND.to_hresult());
        assert!(matches!(classify("call", err), RegistryError::NotFound));
        let err = windows::core::Error::from(ERROR_INSUFFICIENT_BUFFER.to_hresult());
        assert!(matches!(classify("call", err), RegistryError::InsufficientBuffer));
    }
}
