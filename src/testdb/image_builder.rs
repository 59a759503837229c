//! Synthetic PE32+ images
//!
//! Builds a minimal two-section image (`.text` and `.rdata`) good enough
//! for the name table scanner. Nothing here is loadable.

use crate::device::key::PropertyKey;

const FILE_ALIGNMENT: usize = 0x200;
const HEADERS_SIZE: usize = 0x400;
const PE_OFFSET: usize = 0x40;
const OPTIONAL_HEADER_SIZE: u16 = 0xF0;
const MACHINE_AMD64: u16 = 0x8664;

#[derive(Debug, Clone)]
pub struct ImageBuilder {
    image_base: u64,
    code: Vec<u8>,
    data: Vec<u8>,
}

impl ImageBuilder {
    pub const TEXT_RVA: u32 = 0x1000;
    pub const RDATA_RVA: u32 = 0x2000;

    pub fn new(image_base: u64) -> Self {
        Self {
            image_base,
            code: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    /// Append a property key to `.rdata`, returning its RVA
    pub fn push_key(&mut self, key: &PropertyKey) -> u32 {
        self.push_data(&key.to_bytes())
    }

    /// Append 16-byte `{ address, resource id, pad }` entries, returning the
    /// RVA of the first
    pub fn push_table(&mut self, entries: &[(u64, u32)]) -> u32 {
        while self.data.len() % 8 != 0 {
            self.data.push(0);
        }
        let rva = self.next_data_rva();
        for (address, id) in entries {
            self.data.extend_from_slice(&address.to_le_bytes());
            self.data.extend_from_slice(&id.to_le_bytes());
            self.data.extend_from_slice(&[0; 4]);
        }
        rva
    }

    pub fn push_data(&mut self, bytes: &[u8]) -> u32 {
        let rva = self.next_data_rva();
        self.data.extend_from_slice(bytes);
        rva
    }

    /// Append `lea r15, [rip+disp32]` targeting `target_rva`
    pub fn push_lea_r15(&mut self, target_rva: u32) {
        let next = Self::TEXT_RVA as i64 + self.code.len() as i64 + 7;
        let disp = (target_rva as i64 - next) as i32;
        self.code.extend_from_slice(&[0x4C, 0x8D, 0x3D]);
        self.code.extend_from_slice(&disp.to_le_bytes());
    }

    pub fn push_code(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    fn next_data_rva(&self) -> u32 {
        Self::RDATA_RVA + self.data.len() as u32
    }

    pub fn build(&self) -> Vec<u8> {
        let text_raw = align(self.code.len().max(1));
        let rdata_raw = align(self.data.len().max(1));
        let text_offset = HEADERS_SIZE;
        let rdata_offset = text_offset + text_raw;

        let mut out = vec![0u8; rdata_offset + rdata_raw];
        out[0..2].copy_from_slice(b"MZ");
        put_u32(&mut out, 0x3C, PE_OFFSET as u32);
        out[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        let file_header = PE_OFFSET + 4;
        put_u16(&mut out, file_header, MACHINE_AMD64);
        put_u16(&mut out, file_header + 2, 2);
        put_u16(&mut out, file_header + 16, OPTIONAL_HEADER_SIZE);

        let optional = file_header + 20;
        put_u16(&mut out, optional, 0x20b);
        put_u64(&mut out, optional + 24, self.image_base);
        put_u32(&mut out, optional + 32, 0x1000);
        put_u32(&mut out, optional + 36, FILE_ALIGNMENT as u32);

        let sections = optional + OPTIONAL_HEADER_SIZE as usize;
        write_section(
            &mut out,
            sections,
            b".text",
            (Self::TEXT_RVA, self.code.len(), text_offset, text_raw),
            0x6000_0020,
        );
        write_section(
            &mut out,
            sections + 40,
            b".rdata",
            (Self::RDATA_RVA, self.data.len(), rdata_offset, rdata_raw),
            0x4000_0040,
        );

        out[text_offset..text_offset + self.code.len()].copy_from_slice(&self.code);
        out[rdata_offset..rdata_offset + self.data.len()].copy_from_slice(&self.data);
        out
    }
}

fn write_section(
    out: &mut [u8],
    at: usize,
    name: &[u8],
    (rva, virtual_size, raw_offset, raw_size): (u32, usize, usize, usize),
    characteristics: u32,
) {
    out[at..at + name.len()].copy_from_slice(name);
    put_u32(out, at + 8, virtual_size as u32);
    put_u32(out, at + 12, rva);
    put_u32(out, at + 16, raw_size as u32);
    put_u32(out, at + 20, raw_offset as u32);
    put_u32(out, at + 36, characteristics);
}

fn align(len: usize) -> usize {
    len.div_ceil(FILE_ALIGNMENT) * FILE_ALIGNMENT
}

fn put_u16(out: &mut [u8], at: usize, value: u16) {
    out[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut [u8], at: usize, value: u32) {
    out[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut [u8], at: usize, value: u64) {
    out[at..at + 8].copy_from_slice(&value.to_le_bytes());
}
