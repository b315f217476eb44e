//! Minimal ELF symbol table reader
//!
//! Only what is needed to find a local symbol by name: the file header, the section header
//! table, the section name table, the symbol table and its string table. Both classes and both
//! byte orders are understood, as is extended section numbering. Every read is checked against
//! the file length.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::trace;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

const SHT_STRTAB: u32 = 3;
const SHN_UNDEF: u16 = 0;
const SHN_XINDEX: u16 = 0xffff;

// Upper bound on the section count, to keep a corrupt header from allocating a huge table
const MAX_SECTIONS: u64 = 0x10000;

/// Errors reading an ELF file
#[derive(thiserror::Error, Debug)]
pub enum ElfError {
    /// The file could not be read
    #[error("Failed to read ELF file: {0}")]
    Io(#[from] std::io::Error),
    /// The file does not start with the ELF magic
    #[error("Not an ELF file")]
    BadMagic,
    /// `EI_CLASS` is neither 32 nor 64 bit
    #[error("Unsupported ELF class {0}")]
    UnsupportedClass(u8),
    /// `EI_DATA` is neither little nor big endian
    #[error("Unsupported ELF data encoding {0}")]
    UnsupportedEncoding(u8),
    /// A table is inconsistent with itself or the header
    #[error("Malformed {0}")]
    Malformed(&'static str),
    /// A table reaches past the end of the file
    #[error("{what} at offset {offset:#x} with size {size:#x} exceeds file length {len:#x}")]
    OutOfBounds {
        /// What was being read
        what: &'static str,
        /// Start of the read
        offset: u64,
        /// Length of the read
        size: u64,
        /// Length of the file
        len: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Elf32,
    Elf64,
}

impl Class {
    fn section_header_size(self) -> u64 {
        match self {
            Class::Elf32 => 40,
            Class::Elf64 => 64,
        }
    }

    fn symbol_size(self) -> u64 {
        match self {
            Class::Elf32 => 16,
            Class::Elf64 => 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    fn u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf),
        }
    }

    fn u64(self, buf: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(buf),
            Endian::Big => BigEndian::read_u64(buf),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SectionHeader {
    name: u32,
    kind: u32,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
}

/// An opened ELF file with its section header table loaded
#[derive(Debug)]
pub struct ElfFile<R> {
    reader: R,
    len: u64,
    class: Class,
    endian: Endian,
    sections: Vec<SectionHeader>,
    shstrndx: usize,
}

impl ElfFile<BufReader<File>> {
    /// Opens the ELF file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ElfError> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        ElfFile::parse(BufReader::new(file), len)
    }
}

impl<R: Read + Seek> ElfFile<R> {
    /// Reads the file and section headers of an ELF image of `len` bytes
    pub fn parse(reader: R, len: u64) -> Result<Self, ElfError> {
        let mut elf = ElfFile {
            reader,
            len,
            class: Class::Elf64,
            endian: Endian::Little,
            sections: Vec::new(),
            shstrndx: 0,
        };

        let ident = elf.read_at("ELF identification", 0, 16)?;
        if ident[..4] != ELF_MAGIC {
            return Err(ElfError::BadMagic);
        }
        elf.class = match ident[4] {
            ELFCLASS32 => Class::Elf32,
            ELFCLASS64 => Class::Elf64,
            other => return Err(ElfError::UnsupportedClass(other)),
        };
        elf.endian = match ident[5] {
            ELFDATA2LSB => Endian::Little,
            ELFDATA2MSB => Endian::Big,
            other => return Err(ElfError::UnsupportedEncoding(other)),
        };

        let e = elf.endian;
        let (shoff, shentsize, shnum, shstrndx) = match elf.class {
            Class::Elf64 => {
                let header = elf.read_at("ELF header", 0, 64)?;
                (
                    e.u64(&header[40..]),
                    e.u16(&header[58..]),
                    e.u16(&header[60..]),
                    e.u16(&header[62..]),
                )
            }
            Class::Elf32 => {
                let header = elf.read_at("ELF header", 0, 52)?;
                (
                    e.u32(&header[32..]) as u64,
                    e.u16(&header[46..]),
                    e.u16(&header[48..]),
                    e.u16(&header[50..]),
                )
            }
        };
        if shoff == 0 {
            return Err(ElfError::Malformed("ELF header: no section header table"));
        }
        let entsize = shentsize as u64;
        if entsize < elf.class.section_header_size() {
            return Err(ElfError::Malformed("ELF header: section header entry size"));
        }

        // With extended numbering the real values live in section 0
        let first = elf.read_section_header(shoff)?;
        let count = if shnum == 0 { first.size } else { shnum as u64 };
        let shstrndx = if shstrndx == SHN_XINDEX {
            first.link as u64
        } else {
            shstrndx as u64
        };
        if count == 0 || count > MAX_SECTIONS {
            return Err(ElfError::Malformed("section header table: section count"));
        }
        if shstrndx == SHN_UNDEF as u64 || shstrndx >= count {
            return Err(ElfError::Malformed("ELF header: section name table index"));
        }
        elf.check_bounds("section header table", shoff, count * entsize)?;

        let mut sections = Vec::with_capacity(count as usize);
        sections.push(first);
        for i in 1..count {
            sections.push(elf.read_section_header(shoff + i * entsize)?);
        }
        trace!(
            class = ?elf.class,
            endian = ?elf.endian,
            sections = sections.len(),
            "Loaded ELF section headers"
        );
        elf.sections = sections;
        elf.shstrndx = shstrndx as usize;
        Ok(elf)
    }

    /// Finds the value of the symbol named `name` in the `.symtab` section
    ///
    /// Returns `Ok(None)` if the file has no symbol table or the symbol is not in it.
    pub fn symbol_value(&mut self, name: &str) -> Result<Option<u64>, ElfError> {
        let shstrtab = self.sections[self.shstrndx];
        let names = self.read_section("section name table", &shstrtab)?;

        let section_name = |section: &SectionHeader| c_str_at(&names, section.name as usize);
        let Some(symtab) = self.sections.iter().find(|s| section_name(s) == Some(&b".symtab"[..])).copied()
        else {
            return Ok(None);
        };
        let strtab = self
            .sections
            .get(symtab.link as usize)
            .filter(|s| symtab.link != 0 && s.kind == SHT_STRTAB)
            .or_else(|| self.sections.iter().find(|s| section_name(s) == Some(&b".strtab"[..])))
            .copied()
            .ok_or(ElfError::Malformed("symbol table: no string table"))?;

        let symsize = if symtab.entsize == 0 {
            self.class.symbol_size()
        } else {
            symtab.entsize
        };
        if symsize < self.class.symbol_size() {
            return Err(ElfError::Malformed("symbol table: entry size"));
        }

        let strings = self.read_section("string table", &strtab)?;
        let symbols = self.read_section("symbol table", &symtab)?;
        let e = self.endian;
        for entry in symbols.chunks_exact(symsize as usize) {
            let name_offset = e.u32(entry) as usize;
            if name_offset == 0 || c_str_at(&strings, name_offset) != Some(name.as_bytes()) {
                continue;
            }
            let value = match self.class {
                Class::Elf64 => e.u64(&entry[8..]),
                Class::Elf32 => e.u32(&entry[4..]) as u64,
            };
            return Ok(Some(value));
        }
        Ok(None)
    }

    fn read_section_header(&mut self, offset: u64) -> Result<SectionHeader, ElfError> {
        let e = self.endian;
        let header = match self.class {
            Class::Elf64 => {
                let buf = self.read_at("section header", offset, 64)?;
                SectionHeader {
                    name: e.u32(&buf[0..]),
                    kind: e.u32(&buf[4..]),
                    offset: e.u64(&buf[24..]),
                    size: e.u64(&buf[32..]),
                    link: e.u32(&buf[40..]),
                    entsize: e.u64(&buf[56..]),
                }
            }
            Class::Elf32 => {
                let buf = self.read_at("section header", offset, 40)?;
                SectionHeader {
                    name: e.u32(&buf[0..]),
                    kind: e.u32(&buf[4..]),
                    offset: e.u32(&buf[16..]) as u64,
                    size: e.u32(&buf[20..]) as u64,
                    link: e.u32(&buf[24..]),
                    entsize: e.u32(&buf[36..]) as u64,
                }
            }
        };
        Ok(header)
    }

    fn read_section(&mut self, what: &'static str, section: &SectionHeader) -> Result<Vec<u8>, ElfError> {
        self.read_at(what, section.offset, section.size)
    }

    fn check_bounds(&self, what: &'static str, offset: u64, size: u64) -> Result<(), ElfError> {
        match offset.checked_add(size) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(ElfError::OutOfBounds {
                what,
                offset,
                size,
                len: self.len,
            }),
        }
    }

    fn read_at(&mut self, what: &'static str, offset: u64, size: u64) -> Result<Vec<u8>, ElfError> {
        self.check_bounds(what, offset, size)?;
        let mut buf = vec![0; size as usize];
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

fn c_str_at(table: &[u8], offset: usize) -> Option<&[u8]> {
    let rest = table.get(offset..)?;
    let end = rest.iter().position(|&b| b == 0)?;
    Some(&rest[..end])
}
