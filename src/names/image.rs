//! Embedded name table recovery from a PE image
//!
//! The Device Manager module carries a static array pairing property keys
//! with string resource ids, but does not export it. The array is found
//! heuristically:
//!
//! 1. parse the PE headers for the image base and section table
//! 2. scan code sections for `lea r15, [rip+disp32]` (`4C 8D 3D`)
//! 3. resolve the displacement to a file offset and check that the first
//!    entry there points at the well-known `NAME` key
//! 4. walk 16-byte entries `{ u64 key address, u32 resource id, u32 pad }`
//!    until an address falls outside the image
//!
//! Any mismatch abandons that candidate and the scan moves on by one byte.
//! This depends on the exact layout of one system binary and is strictly
//! best-effort.

use crate::core::error::ImageError;
use crate::device::key::{keys, PropertyKey};
use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const PE_SIGNATURE: u32 = 0x0000_4550;
const FILE_HEADER_LEN: usize = 20;
const SECTION_HEADER_LEN: usize = 40;
const OPTIONAL_MAGIC_PE32: u16 = 0x10b;
const OPTIONAL_MAGIC_PE32_PLUS: u16 = 0x20b;
const SCN_CNT_CODE: u32 = 0x0000_0020;

/// `lea r15, [rip+disp32]`
const LEA_R15_RIP: [u8; 3] = [0x4C, 0x8D, 0x3D];
const LEA_LEN: usize = 7;
const TABLE_ENTRY_LEN: usize = 16;

/// One section header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub raw_size: u32,
    pub raw_offset: u32,
    pub characteristics: u32,
}

impl Section {
    pub fn is_code(&self) -> bool {
        self.characteristics & SCN_CNT_CODE != 0
    }

    fn contains(&self, rva: u32) -> bool {
        let span = if self.virtual_size == 0 {
            self.raw_size
        } else {
            self.virtual_size
        };
        rva >= self.virtual_address && (rva - self.virtual_address) < span
    }
}

/// A parsed PE image held in memory
#[derive(Debug)]
pub struct PeImage<'a> {
    data: &'a [u8],
    image_base: u64,
    is_64: bool,
    sections: Vec<Section>,
}

impl<'a> PeImage<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, ImageError> {
        if data.get(..2) != Some(b"MZ".as_slice()) {
            return Err(ImageError::NotPe("missing MZ header"));
        }
        let pe_offset = read_u32(data, 0x3C).ok_or(ImageError::Truncated(0x3C))? as usize;
        if read_u32(data, pe_offset) != Some(PE_SIGNATURE) {
            return Err(ImageError::NotPe("missing PE signature"));
        }

        let file_header = pe_offset + 4;
        let section_count =
            read_u16(data, file_header + 2).ok_or(ImageError::Truncated(file_header))? as usize;
        let optional_len =
            read_u16(data, file_header + 16).ok_or(ImageError::Truncated(file_header))? as usize;

        let optional = file_header + FILE_HEADER_LEN;
        let magic = read_u16(data, optional).ok_or(ImageError::Truncated(optional))?;
        let (image_base, is_64) = match magic {
            OPTIONAL_MAGIC_PE32 => (
                read_u32(data, optional + 28).ok_or(ImageError::Truncated(optional))? as u64,
                false,
            ),
            OPTIONAL_MAGIC_PE32_PLUS => (
                read_u64(data, optional + 24).ok_or(ImageError::Truncated(optional))?,
                true,
            ),
            other => return Err(ImageError::UnsupportedMagic(other)),
        };

        let table = optional + optional_len;
        let mut sections = Vec::with_capacity(section_count);
        for i in 0..section_count {
            let at = table + i * SECTION_HEADER_LEN;
            let header = data
                .get(at..at + SECTION_HEADER_LEN)
                .ok_or(ImageError::Truncated(at))?;
            let name_len = header[..8].iter().position(|b| *b == 0).unwrap_or(8);
            sections.push(Section {
                name: String::from_utf8_lossy(&header[..name_len]).into_owned(),
                virtual_size: le_u32(&header[8..12]),
                virtual_address: le_u32(&header[12..16]),
                raw_size: le_u32(&header[16..20]),
                raw_offset: le_u32(&header[20..24]),
                characteristics: le_u32(&header[36..40]),
            });
        }

        Ok(Self {
            data,
            image_base,
            is_64,
            sections,
        })
    }

    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    pub fn is_64(&self) -> bool {
        self.is_64
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Translate a relative virtual address to a file offset
    ///
    /// Fails for addresses outside every section, and for the uninitialised
    /// tail of a section that has no bytes in the file.
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        let section = self.sections.iter().find(|s| s.contains(rva))?;
        let delta = rva - section.virtual_address;
        if delta >= section.raw_size {
            return None;
        }
        let offset = section.raw_offset as usize + delta as usize;
        (offset < self.data.len()).then_some(offset)
    }

    /// Translate an absolute virtual address to a file offset
    pub fn va_to_offset(&self, va: u64) -> Option<usize> {
        let rva = va.checked_sub(self.image_base)?;
        self.rva_to_offset(u32::try_from(rva).ok()?)
    }

    fn key_at(&self, offset: usize) -> Option<PropertyKey> {
        PropertyKey::from_bytes(self.data.get(offset..offset + PropertyKey::SIZE)?)
    }
}

/// One recovered `(key, string resource id)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameTableEntry {
    pub key: PropertyKey,
    pub resource_id: u32,
}

/// Locate and walk every key/name table referenced from code
pub fn find_name_tables(image: &PeImage<'_>) -> Vec<NameTableEntry> {
    let mut entries = Vec::new();
    let mut walked = HashSet::new();

    for section in image.sections.iter().filter(|s| s.is_code()) {
        let start = section.raw_offset as usize;
        let end = (start + section.raw_size as usize).min(image.data.len());
        let mut pos = start;
        while pos + LEA_LEN <= end {
            if image.data[pos..pos + 3] != LEA_R15_RIP {
                pos += 1;
                continue;
            }

            if let Some(anchor) = candidate_anchor(image, section, pos) {
                if walked.insert(anchor) {
                    let before = entries.len();
                    walk_table(image, anchor, &mut entries);
                    debug!(
                        "Name table at file offset 0x{:X}: {} entries",
                        anchor,
                        entries.len() - before
                    );
                }
            }
            pos += 1;
        }
    }
    entries
}

/// Resolve a `lea` at `pos` and check its target starts with the NAME key
fn candidate_anchor(image: &PeImage<'_>, section: &Section, pos: usize) -> Option<usize> {
    let disp = read_u32(image.data, pos + 3)? as i32;
    let instr_rva = section.virtual_address as i64 + (pos - section.raw_offset as usize) as i64;
    let target_rva = u32::try_from(instr_rva + LEA_LEN as i64 + disp as i64).ok()?;
    let anchor = image.rva_to_offset(target_rva)?;

    let first_va = read_u64(image.data, anchor)?;
    let first_key = image.key_at(image.va_to_offset(first_va)?)?;
    if first_key != keys::NAME {
        trace!("lea at 0x{:X} does not reference the name table", pos);
        return None;
    }
    Some(anchor)
}

fn walk_table(image: &PeImage<'_>, anchor: usize, entries: &mut Vec<NameTableEntry>) {
    let mut at = anchor;
    loop {
        let Some(va) = read_u64(image.data, at) else { break };
        if va < image.image_base {
            break;
        }
        let Some(resource_id) = read_u32(image.data, at + 8) else { break };
        let Some(key) = image.va_to_offset(va).and_then(|off| image.key_at(off)) else {
            break;
        };
        entries.push(NameTableEntry { key, resource_id });
        at += TABLE_ENTRY_LEN;
    }
}

/// Source of string resources for a module
pub trait ResourceStrings {
    fn load_string(&self, id: u32) -> Option<String>;
}

/// Opens a module's string resources without executing it
pub trait ResourceLoader: Send + Sync {
    fn open(&self, module: &Path) -> Option<Box<dyn ResourceStrings>>;
}

/// Recovers a key → display name table from a module on disk
pub trait NameTableScanner: Send + Sync {
    fn scan_for_names(&self, module: &Path) -> HashMap<PropertyKey, String>;
}

/// [`NameTableScanner`] over a PE file plus its string resources
pub struct ModuleNameScanner {
    loader: Box<dyn ResourceLoader>,
}

impl ModuleNameScanner {
    pub fn new(loader: Box<dyn ResourceLoader>) -> Self {
        Self { loader }
    }

    /// Scanner backed by the system resource loader
    #[cfg(windows)]
    pub fn system() -> Self {
        Self::new(Box::new(DataFileLoader))
    }

    /// Match table entries against already-loaded image bytes
    pub fn names_from_image(
        data: &[u8],
        strings: &dyn ResourceStrings,
    ) -> Result<HashMap<PropertyKey, String>, ImageError> {
        let image = PeImage::parse(data)?;
        let mut names = HashMap::new();
        for entry in find_name_tables(&image) {
            match strings.load_string(entry.resource_id) {
                Some(name) if !name.trim().is_empty() => {
                    names.entry(entry.key).or_insert(name);
                }
                _ => trace!("No string resource {} for {}", entry.resource_id, entry.key),
            }
        }
        Ok(names)
    }
}

impl NameTableScanner for ModuleNameScanner {
    fn scan_for_names(&self, module: &Path) -> HashMap<PropertyKey, String> {
        let data = match std::fs::read(module) {
            Ok(data) => data,
            Err(e) => {
                warn!("Cannot read {}: {}", module.display(), e);
                return HashMap::new();
            }
        };
        let Some(strings) = self.loader.open(module) else {
            warn!("Cannot load string resources from {}", module.display());
            return HashMap::new();
        };

        match Self::names_from_image(&data, strings.as_ref()) {
            Ok(names) => {
                debug!("Recovered {} names from {}", names.len(), module.display());
                names
            }
            Err(e) => {
                warn!("Cannot parse {}: {}", module.display(), e);
                HashMap::new()
            }
        }
    }
}

#[cfg(windows)]
pub use self::windows_resources::{DataFileLoader, DataFileModule};

#[cfg(windows)]
mod windows_resources {
    use super::{ResourceLoader, ResourceStrings};
    use log::debug;
    use std::path::Path;
    use windows::{
        core::{HSTRING, PWSTR},
        Win32::{
            Foundation::{FreeLibrary, HANDLE, HINSTANCE, HMODULE},
            System::LibraryLoader::{LoadLibraryExW, LOAD_LIBRARY_AS_DATAFILE},
            UI::WindowsAndMessaging::LoadStringW,
        },
    };

    /// A module mapped as a data file, freed on drop
    pub struct DataFileModule(HMODULE);

    impl DataFileModule {
        pub fn open(path: &Path) -> windows::core::Result<Self> {
            let path = HSTRING::from(path.as_os_str());
            let module =
                unsafe { LoadLibraryExW(&path, HANDLE::default(), LOAD_LIBRARY_AS_DATAFILE)? };
            Ok(Self(module))
        }
    }

    impl ResourceStrings for DataFileModule {
        fn load_string(&self, id: u32) -> Option<String> {
            let mut buffer = vec![0u16; 1024];
            let len = unsafe {
                LoadStringW(
                    HINSTANCE(self.0 .0),
                    id,
                    PWSTR(buffer.as_mut_ptr()),
                    buffer.len() as i32,
                )
            };
            (len > 0).then(|| String::from_utf16_lossy(&buffer[..len as usize]))
        }
    }

    impl Drop for DataFileModule {
        fn drop(&mut self) {
            unsafe {
                let _ = FreeLibrary(self.0);
            }
        }
    }

    /// Loads modules with `LOAD_LIBRARY_AS_DATAFILE`
    pub struct DataFileLoader;

    impl ResourceLoader for DataFileLoader {
        fn open(&self, module: &Path) -> Option<Box<dyn ResourceStrings>> {
            match DataFileModule::open(module) {
                Ok(m) => Some(Box::new(m)),
                Err(e) => {
                    debug!("LoadLibraryExW({}) failed: {}", module.display(), e);
                    None
                }
            }
        }
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let b = data.get(at..at.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at.checked_add(4)?).map(le_u32)
}

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    let b: [u8; 8] = data.get(at..at.checked_add(8)?)?.try_into().ok()?;
    Some(u64::from_le_bytes(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::key::Guid;
    use crate::testdb::ImageBuilder;
    use std::io::Write;

    const BASE: u64 = 0x1_8000_0000;

    fn widget_key() -> PropertyKey {
        PropertyKey::new(Guid::from_u128(0x1234_5678_9abc_def0_1122_3344_5566_7788), 7)
    }

    struct TableStrings(HashMap<u32, String>);

    impl ResourceStrings for TableStrings {
        fn load_string(&self, id: u32) -> Option<String> {
            self.0.get(&id).cloned()
        }
    }

    struct TableLoader(HashMap<u32, String>);

    impl ResourceLoader for TableLoader {
        fn open(&self, _module: &Path) -> Option<Box<dyn ResourceStrings>> {
            Some(Box::new(TableStrings(self.0.clone())))
        }
    }

    /// NAME entry, one widget entry, an out-of-range address, then a
    /// valid-looking entry that must never be reached
    fn synthetic_image() -> Vec<u8> {
        let mut builder = ImageBuilder::new(BASE);
        let name_rva = builder.push_key(&keys::NAME);
        let widget_rva = builder.push_key(&widget_key());
        let decoy_rva = builder.push_key(&keys::DEVICE_DESC);
        let table_rva = builder.push_table(&[
            (BASE + name_rva as u64, 100),
            (BASE + widget_rva as u64, 200),
            (BASE + 0x9000, 300),
            (BASE + decoy_rva as u64, 400),
        ]);

        builder.push_code(&[0x48, 0x83, 0xEC, 0x28]);
        // points into the key area, first entry is not a NAME reference
        builder.push_lea_r15(widget_rva);
        builder.push_code(&[0x4C, 0x8D]);
        builder.push_lea_r15(table_rva);
        builder.push_code(&[0xC3]);
        builder.build()
    }

    #[test]
    fn test_parse_headers() {
        let data = synthetic_image();
        let image = PeImage::parse(&data).unwrap();
        assert_eq!(image.image_base(), BASE);
        assert!(image.is_64());
        assert_eq!(image.sections().len(), 2);
        assert!(image.sections()[0].is_code());
        assert!(!image.sections()[1].is_code());
        let rdata = &image.sections()[1];
        assert_eq!(rdata.name, ".rdata");
        assert_eq!(
            image.rva_to_offset(ImageBuilder::RDATA_RVA + 4),
            Some(rdata.raw_offset as usize + 4)
        );
        assert_eq!(image.rva_to_offset(0x9000), None);
        assert_eq!(image.va_to_offset(0x10), None);
    }

    #[test]
    fn test_rejects_non_pe() {
        assert!(matches!(PeImage::parse(b"hello"), Err(ImageError::NotPe(_))));
        let mut data = synthetic_image();
        data[0x40] = b'X';
        assert!(matches!(PeImage::parse(&data), Err(ImageError::NotPe(_))));
    }

    #[test]
    fn test_walk_stops_at_out_of_range_address() {
        let data = synthetic_image();
        let image = PeImage::parse(&data).unwrap();
        let entries = find_name_tables(&image);
        assert_eq!(
            entries,
            vec![
                NameTableEntry {
                    key: keys::NAME,
                    resource_id: 100
                },
                NameTableEntry {
                    key: widget_key(),
                    resource_id: 200
                },
            ]
        );
    }

    #[test]
    fn test_scan_recovers_single_mapping() {
        let data = synthetic_image();
        let strings = TableStrings(HashMap::from([
            (100, "   ".to_string()),
            (200, "Widget Color".to_string()),
            (400, "Never Read".to_string()),
        ]));
        let names = ModuleNameScanner::names_from_image(&data, &strings).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names.get(&widget_key()).map(String::as_str), Some("Widget Color"));
    }

    #[test]
    fn test_scan_for_names_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&synthetic_image()).unwrap();

        let scanner = ModuleNameScanner::new(Box::new(TableLoader(HashMap::from([
            (100, "Name".to_string()),
            (200, "Widget Color".to_string()),
        ]))));
        let names = scanner.scan_for_names(file.path());
        assert_eq!(names.get(&keys::NAME).map(String::as_str), Some("Name"));
        assert_eq!(names.len(), 2);

        let missing = scanner.scan_for_names(Path::new("/definitely/not/here.dll"));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_image_without_table_yields_nothing() {
        let mut builder = ImageBuilder::new(BASE);
        let rva = builder.push_key(&keys::DEVICE_DESC);
        builder.push_lea_r15(rva);
        let data = builder.build();
        let image = PeImage::parse(&data).unwrap();
        assert!(find_name_tables(&image).is_empty());
    }
}
