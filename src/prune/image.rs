//! Native executable image verification (ELF and Mach-O).
//!
//! Only the structural headers are checked: identification bytes, header
//! sizes, and that every table the header points at lies inside the file.
//! That is enough to tell a real executable from a README, a license file,
//! a leftover archive or a truncated download.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

/// Magic byte signatures.
pub mod magic {
    /// ELF magic bytes: 0x7F 'E' 'L' 'F'
    pub const ELF: [u8; 4] = [0x7F, b'E', b'L', b'F'];
    /// Mach-O 32-bit header magic.
    pub const MACHO_32: u32 = 0xFEED_FACE;
    /// Mach-O 64-bit header magic.
    pub const MACHO_64: u32 = 0xFEED_FACF;
    /// Mach-O fat/universal header magic (always big-endian on disk).
    pub const MACHO_FAT: u32 = 0xCAFE_BABE;
}

/// Java class files share the fat magic; real universal binaries carry only
/// a handful of slices while class files put their version number here.
const MAX_FAT_ARCHES: u32 = 16;

const FAT_ARCH_SIZE: u64 = 20;

/// Errors produced while verifying an executable image.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The file could not be read.
    #[error("IO error reading image: {0}")]
    Io(#[source] io::Error),

    /// The file ends before a structure the header refers to.
    #[error("truncated image: needed {needed} bytes, file has {actual}")]
    Truncated {
        /// Bytes required.
        needed: u64,
        /// Bytes present.
        actual: u64,
    },

    /// The identification bytes do not belong to the expected format.
    #[error("not a {format} image")]
    BadMagic {
        /// Expected format name.
        format: &'static str,
    },

    /// Header fields are inconsistent.
    #[error("malformed {format} image: {reason}")]
    Malformed {
        /// Format name.
        format: &'static str,
        /// What was wrong.
        reason: String,
    },
}

impl ImageError {
    /// Returns true when the file itself could not be read, as opposed to
    /// being read and rejected.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            reason: reason.into(),
        }
    }
}

/// Native executable image format of a target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Executable and Linkable Format (Linux).
    Elf,
    /// Mach object format, thin or universal (macOS).
    MachO,
}

impl ImageFormat {
    /// Human-readable format name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Elf => "ELF",
            Self::MachO => "Mach-O",
        }
    }

    /// Verifies the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Io`] if the file cannot be opened or read, and
    /// another variant if the content is not a valid image.
    pub fn verify_path(self, path: &Path) -> Result<(), ImageError> {
        let mut file = File::open(path).map_err(ImageError::Io)?;
        self.verify(&mut file)
    }

    /// Verifies an image read from `reader`.
    ///
    /// # Errors
    ///
    /// See [`verify_path`](Self::verify_path).
    pub fn verify<R: Read + Seek>(self, reader: &mut R) -> Result<(), ImageError> {
        let len = reader.seek(SeekFrom::End(0)).map_err(ImageError::Io)?;
        match self {
            Self::Elf => verify_elf(reader, len),
            Self::MachO => verify_macho(reader, len),
        }
    }
}

#[derive(Clone, Copy)]
struct Endian {
    little: bool,
}

impl Endian {
    fn u16(self, buf: &[u8], at: usize) -> u16 {
        let bytes = [buf[at], buf[at + 1]];
        if self.little {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        }
    }

    fn u32(self, buf: &[u8], at: usize) -> u32 {
        let bytes = [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]];
        if self.little {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        }
    }

    fn u64(self, buf: &[u8], at: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[at..at + 8]);
        if self.little {
            u64::from_le_bytes(bytes)
        } else {
            u64::from_be_bytes(bytes)
        }
    }
}

fn read_at<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    offset: u64,
    buf: &mut [u8],
) -> Result<(), ImageError> {
    let needed = offset.saturating_add(buf.len() as u64);
    if needed > len {
        return Err(ImageError::Truncated {
            needed,
            actual: len,
        });
    }
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(ImageError::Io)?;
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ImageError::Truncated {
                needed,
                actual: len,
            }
        } else {
            ImageError::Io(e)
        }
    })
}

fn ensure_within(len: u64, offset: u64, size: u64) -> Result<(), ImageError> {
    let needed = offset.saturating_add(size);
    if needed > len {
        return Err(ImageError::Truncated {
            needed,
            actual: len,
        });
    }
    Ok(())
}

// ==================== ELF ====================

const ELF: &str = "ELF";
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;
const EV_CURRENT: u8 = 1;
const SHN_XINDEX: u16 = 0xFFFF;

fn verify_elf<R: Read + Seek>(reader: &mut R, len: u64) -> Result<(), ImageError> {
    let mut ident = [0u8; 16];
    if len < ident.len() as u64 {
        return Err(ImageError::BadMagic { format: ELF });
    }
    read_at(reader, len, 0, &mut ident)?;
    if ident[..4] != magic::ELF {
        return Err(ImageError::BadMagic { format: ELF });
    }

    let is_64 = match ident[4] {
        ELFCLASS32 => false,
        ELFCLASS64 => true,
        class => return Err(ImageError::malformed(ELF, format!("invalid class {class}"))),
    };
    let endian = match ident[5] {
        ELFDATA2LSB => Endian { little: true },
        ELFDATA2MSB => Endian { little: false },
        data => {
            return Err(ImageError::malformed(
                ELF,
                format!("invalid data encoding {data}"),
            ));
        }
    };
    if ident[6] != EV_CURRENT {
        return Err(ImageError::malformed(
            ELF,
            format!("invalid ident version {}", ident[6]),
        ));
    }

    let header_size: usize = if is_64 { 64 } else { 52 };
    let mut header = vec![0u8; header_size];
    read_at(reader, len, 0, &mut header)?;

    if endian.u32(&header, 20) != u32::from(EV_CURRENT) {
        return Err(ImageError::malformed(ELF, "invalid header version"));
    }

    // Offsets of e_phoff/e_shoff and the trailing u16 fields differ by class.
    let (phoff, shoff, tail) = if is_64 {
        (endian.u64(&header, 32), endian.u64(&header, 40), 52)
    } else {
        (
            u64::from(endian.u32(&header, 28)),
            u64::from(endian.u32(&header, 32)),
            40,
        )
    };
    let ehsize = endian.u16(&header, tail);
    let phentsize = endian.u16(&header, tail + 2);
    let phnum = endian.u16(&header, tail + 4);
    let shentsize = endian.u16(&header, tail + 6);
    let shnum = endian.u16(&header, tail + 8);
    let shstrndx = endian.u16(&header, tail + 10);

    if usize::from(ehsize) < header_size {
        return Err(ImageError::malformed(
            ELF,
            format!("header size {ehsize} too small"),
        ));
    }

    if phnum > 0 {
        let min_entry = if is_64 { 56 } else { 32 };
        if phentsize < min_entry {
            return Err(ImageError::malformed(
                ELF,
                format!("program header entry size {phentsize} too small"),
            ));
        }
        ensure_within(len, phoff, u64::from(phnum) * u64::from(phentsize))?;
    }

    if shnum > 0 {
        if shoff == 0 {
            return Err(ImageError::malformed(
                ELF,
                "section headers declared without offset",
            ));
        }
        let min_entry = if is_64 { 64 } else { 40 };
        if shentsize < min_entry {
            return Err(ImageError::malformed(
                ELF,
                format!("section header entry size {shentsize} too small"),
            ));
        }
        if shstrndx != SHN_XINDEX && shstrndx >= shnum {
            return Err(ImageError::malformed(
                ELF,
                format!("section name index {shstrndx} out of range"),
            ));
        }
        ensure_within(len, shoff, u64::from(shnum) * u64::from(shentsize))?;
    }

    Ok(())
}

// ==================== Mach-O ====================

const MACHO: &str = "Mach-O";

fn verify_macho<R: Read + Seek>(reader: &mut R, len: u64) -> Result<(), ImageError> {
    let mut head = [0u8; 8];
    if len < head.len() as u64 {
        return Err(ImageError::BadMagic { format: MACHO });
    }
    read_at(reader, len, 0, &mut head)?;

    let be = Endian { little: false };
    if be.u32(&head, 0) == magic::MACHO_FAT {
        return verify_fat(reader, len, be.u32(&head, 4));
    }
    verify_thin(reader, len, 0, len)
}

fn verify_fat<R: Read + Seek>(reader: &mut R, len: u64, nfat_arch: u32) -> Result<(), ImageError> {
    if nfat_arch == 0 || nfat_arch > MAX_FAT_ARCHES {
        return Err(ImageError::BadMagic { format: MACHO });
    }

    let be = Endian { little: false };
    let mut table = vec![0u8; (u64::from(nfat_arch) * FAT_ARCH_SIZE) as usize];
    read_at(reader, len, 8, &mut table)?;

    for entry in table.chunks_exact(FAT_ARCH_SIZE as usize) {
        let offset = u64::from(be.u32(entry, 8));
        let size = u64::from(be.u32(entry, 12));
        ensure_within(len, offset, size)?;
        verify_thin(reader, len, offset, offset + size)?;
    }
    Ok(())
}

/// Verifies a thin Mach-O image occupying `[start, end)` of the file.
fn verify_thin<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    start: u64,
    end: u64,
) -> Result<(), ImageError> {
    let mut magic_bytes = [0u8; 4];
    if end.saturating_sub(start) < 4 {
        return Err(ImageError::BadMagic { format: MACHO });
    }
    read_at(reader, len, start, &mut magic_bytes)?;

    let (endian, is_64) = match (
        u32::from_le_bytes(magic_bytes),
        u32::from_be_bytes(magic_bytes),
    ) {
        (magic::MACHO_32, _) => (Endian { little: true }, false),
        (magic::MACHO_64, _) => (Endian { little: true }, true),
        (_, magic::MACHO_32) => (Endian { little: false }, false),
        (_, magic::MACHO_64) => (Endian { little: false }, true),
        _ => return Err(ImageError::BadMagic { format: MACHO }),
    };

    let header_size: u64 = if is_64 { 32 } else { 28 };
    let mut header = vec![0u8; header_size as usize];
    read_at(reader, len, start, &mut header)?;

    let ncmds = endian.u32(&header, 16);
    let sizeofcmds = u64::from(endian.u32(&header, 20));
    let cmds_start = start + header_size;
    let cmds_end = cmds_start.saturating_add(sizeofcmds);
    if cmds_end > end {
        return Err(ImageError::Truncated {
            needed: cmds_end,
            actual: end,
        });
    }

    let mut commands = vec![0u8; sizeofcmds as usize];
    read_at(reader, len, cmds_start, &mut commands)?;

    let mut cursor: usize = 0;
    for index in 0..ncmds {
        if cursor + 8 > commands.len() {
            return Err(ImageError::malformed(
                MACHO,
                format!("load command {index} outside command area"),
            ));
        }
        let cmdsize = endian.u32(&commands, cursor + 4) as usize;
        if cmdsize < 8 || cursor + cmdsize > commands.len() {
            return Err(ImageError::malformed(
                MACHO,
                format!("load command {index} has invalid size {cmdsize}"),
            ));
        }
        cursor += cmdsize;
    }

    Ok(())
}
