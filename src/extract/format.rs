//! Archive format identification by suffix and magic bytes.

/// Compression layer wrapped around the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// gzip (`.gz`, `.tgz`).
    Gzip,
    /// bzip2 (`.bz2`, `.tbz`).
    Bzip2,
    /// xz / LZMA2 (`.xz`, `.txz`).
    Xz,
    /// Zstandard (`.zst`, `.tzst`).
    Zstd,
    /// Raw zlib stream (`.zz`).
    Zlib,
    /// Brotli (`.br`). The stream has no magic number.
    Brotli,
    /// Snappy framing format (`.sz`).
    Snappy,
}

/// Recognized archive suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Plain tarball.
    Tar,
    /// Compressed tarball.
    CompressedTar(Compression),
    /// Single compressed file (payload may still turn out to be a tarball).
    Compressed(Compression),
    /// Zip archive.
    Zip,
    /// 7-Zip archive.
    SevenZip,
    /// RAR archive (v4 or v5).
    Rar,
}

/// Every recognized suffix and what it implies.
const SUFFIXES: &[(&str, ArchiveFormat)] = &[
    (".tar", ArchiveFormat::Tar),
    (".tar.gz", ArchiveFormat::CompressedTar(Compression::Gzip)),
    (".tgz", ArchiveFormat::CompressedTar(Compression::Gzip)),
    (".gz", ArchiveFormat::Compressed(Compression::Gzip)),
    (".gzip", ArchiveFormat::Compressed(Compression::Gzip)),
    (".tar.bz2", ArchiveFormat::CompressedTar(Compression::Bzip2)),
    (".tbz", ArchiveFormat::CompressedTar(Compression::Bzip2)),
    (".tbz2", ArchiveFormat::CompressedTar(Compression::Bzip2)),
    (".bz2", ArchiveFormat::Compressed(Compression::Bzip2)),
    (".tar.xz", ArchiveFormat::CompressedTar(Compression::Xz)),
    (".txz", ArchiveFormat::CompressedTar(Compression::Xz)),
    (".xz", ArchiveFormat::Compressed(Compression::Xz)),
    (".tar.zst", ArchiveFormat::CompressedTar(Compression::Zstd)),
    (".tzst", ArchiveFormat::CompressedTar(Compression::Zstd)),
    (".zst", ArchiveFormat::Compressed(Compression::Zstd)),
    (".tar.br", ArchiveFormat::CompressedTar(Compression::Brotli)),
    (".br", ArchiveFormat::Compressed(Compression::Brotli)),
    (".tar.sz", ArchiveFormat::CompressedTar(Compression::Snappy)),
    (".sz", ArchiveFormat::Compressed(Compression::Snappy)),
    (".zip", ArchiveFormat::Zip),
    (".zz", ArchiveFormat::Compressed(Compression::Zlib)),
    (".7z", ArchiveFormat::SevenZip),
    (".rar", ArchiveFormat::Rar),
];

/// Matched suffix of a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuffixMatch {
    /// The suffix, including the leading dot, as listed.
    pub suffix: &'static str,
    /// Format implied by the suffix.
    pub format: ArchiveFormat,
}

impl SuffixMatch {
    /// File name with the suffix removed.
    #[must_use]
    pub fn strip<'a>(&self, file_name: &'a str) -> &'a str {
        &file_name[..file_name.len().saturating_sub(self.suffix.len())]
    }
}

/// Finds the longest recognized suffix of `file_name`, case-insensitively,
/// so `.tar.gz` wins over `.gz`.
#[must_use]
pub fn match_suffix(file_name: &str) -> Option<SuffixMatch> {
    let lower = file_name.to_ascii_lowercase();
    SUFFIXES
        .iter()
        .filter(|(suffix, _)| lower.ends_with(suffix) && lower.len() > suffix.len())
        .max_by_key(|(suffix, _)| suffix.len())
        .map(|&(suffix, format)| SuffixMatch { suffix, format })
}

/// Extension of a name that has no recognized suffix, if it looks like one.
///
/// Version numbers and target triples (`tool-v1.2.3-linux-amd64`) contain
/// dots without carrying an extension; those names are treated as bare
/// binaries.
#[must_use]
pub fn unrecognized_extension(file_name: &str) -> Option<&str> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let looks_like_extension = !extension.is_empty()
        && extension.len() <= 10
        && extension.chars().all(|c| c.is_ascii_alphanumeric())
        && extension.chars().any(|c| c.is_ascii_alphabetic());
    looks_like_extension.then_some(extension)
}

// ==================== Magic bytes ====================

const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const SEVEN_ZIP_MAGIC: &[u8] = &[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C];
const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07";
const SNAPPY_MAGIC: &[u8] = b"\xff\x06\x00\x00sNaPpY";
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8] = b"ustar";

/// Content-derived format, when the header bytes are conclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    /// A compression layer.
    Compressed(Compression),
    /// A zip archive.
    Zip,
    /// A 7-Zip archive.
    SevenZip,
    /// A RAR archive.
    Rar,
    /// An uncompressed tarball.
    Tar,
}

impl Sniffed {
    /// True for matches on a checksum heuristic rather than a magic number.
    /// A recognized suffix takes precedence over these.
    #[must_use]
    pub fn is_heuristic(self) -> bool {
        matches!(self, Self::Compressed(Compression::Zlib))
    }
}

/// Identifies a format from the first bytes of a file.
#[must_use]
pub fn sniff(head: &[u8]) -> Option<Sniffed> {
    if head.starts_with(GZIP_MAGIC) {
        Some(Sniffed::Compressed(Compression::Gzip))
    } else if head.starts_with(XZ_MAGIC) {
        Some(Sniffed::Compressed(Compression::Xz))
    } else if head.starts_with(ZSTD_MAGIC) {
        Some(Sniffed::Compressed(Compression::Zstd))
    } else if head.starts_with(BZIP2_MAGIC) {
        Some(Sniffed::Compressed(Compression::Bzip2))
    } else if head.starts_with(SNAPPY_MAGIC) {
        Some(Sniffed::Compressed(Compression::Snappy))
    } else if head.starts_with(ZIP_MAGIC) || head.starts_with(ZIP_EMPTY_MAGIC) {
        Some(Sniffed::Zip)
    } else if head.starts_with(SEVEN_ZIP_MAGIC) {
        Some(Sniffed::SevenZip)
    } else if head.starts_with(RAR_MAGIC) {
        Some(Sniffed::Rar)
    } else if is_tar_header(head) {
        Some(Sniffed::Tar)
    } else if is_zlib_header(head) {
        Some(Sniffed::Compressed(Compression::Zlib))
    } else {
        None
    }
}

/// True when `head` carries the POSIX `ustar` marker.
#[must_use]
pub fn is_tar_header(head: &[u8]) -> bool {
    head.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()) == Some(TAR_MAGIC)
}

/// zlib: CM=8, window ≤ 32K, header checksum divisible by 31.
fn is_zlib_header(head: &[u8]) -> bool {
    match head {
        [cmf, flg, ..] => {
            cmf & 0x0F == 8 && cmf >> 4 <= 7 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_suffix_wins() {
        let m = match_suffix("tool-linux-amd64.tar.gz").unwrap();
        assert_eq!(m.suffix, ".tar.gz");
        assert_eq!(m.format, ArchiveFormat::CompressedTar(Compression::Gzip));
        assert_eq!(m.strip("tool-linux-amd64.tar.gz"), "tool-linux-amd64");

        let m = match_suffix("tool.gz").unwrap();
        assert_eq!(m.format, ArchiveFormat::Compressed(Compression::Gzip));
    }

    #[test]
    fn test_every_listed_suffix_is_recognized() {
        for (suffix, format) in SUFFIXES {
            let name = format!("tool{suffix}");
            assert_eq!(match_suffix(&name).map(|m| m.format), Some(*format), "{name}");
        }
    }

    #[test]
    fn test_suffix_match_is_case_insensitive() {
        assert_eq!(match_suffix("TOOL.ZIP").map(|m| m.format), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn test_bare_suffix_is_not_an_archive_name() {
        assert!(match_suffix(".zip").is_none());
    }

    #[test]
    fn test_rar_7z_brotli_snappy_suffixes() {
        assert_eq!(match_suffix("tool.rar").map(|m| m.format), Some(ArchiveFormat::Rar));
        assert_eq!(match_suffix("tool.7z").map(|m| m.format), Some(ArchiveFormat::SevenZip));
        assert_eq!(
            match_suffix("tool.tar.br").map(|m| m.format),
            Some(ArchiveFormat::CompressedTar(Compression::Brotli))
        );
        assert_eq!(
            match_suffix("tool.sz").map(|m| m.format),
            Some(ArchiveFormat::Compressed(Compression::Snappy))
        );
    }

    #[test]
    fn test_unknown_extensions_are_unrecognized() {
        for name in ["tool.exe", "tool.deb", "tool.msi"] {
            assert!(match_suffix(name).is_none(), "{name}");
            assert!(unrecognized_extension(name).is_some(), "{name}");
        }
    }

    #[test]
    fn test_version_dots_are_not_extensions() {
        assert_eq!(unrecognized_extension("tool"), None);
        assert_eq!(unrecognized_extension("tool-v1.2.3"), None);
        assert_eq!(unrecognized_extension("bat-v0.24.0-x86_64-unknown-linux-gnu"), None);
        assert_eq!(unrecognized_extension("tool.AppImage"), Some("AppImage"));
    }

    #[test]
    fn test_sniff_magic_bytes() {
        assert_eq!(
            sniff(&[0x1F, 0x8B, 8, 0]),
            Some(Sniffed::Compressed(Compression::Gzip))
        );
        assert_eq!(sniff(b"BZh91AY&SY"), Some(Sniffed::Compressed(Compression::Bzip2)));
        assert_eq!(
            sniff(&[0xFD, b'7', b'z', b'X', b'Z', 0, 0]),
            Some(Sniffed::Compressed(Compression::Xz))
        );
        assert_eq!(
            sniff(&[0x28, 0xB5, 0x2F, 0xFD, 0]),
            Some(Sniffed::Compressed(Compression::Zstd))
        );
        assert_eq!(sniff(b"PK\x03\x04rest"), Some(Sniffed::Zip));
        assert_eq!(sniff(b"7z\xbc\xaf\x27\x1c\x00\x04"), Some(Sniffed::SevenZip));
        assert_eq!(sniff(b"Rar!\x1a\x07\x01\x00"), Some(Sniffed::Rar));
        assert_eq!(
            sniff(b"\xff\x06\x00\x00sNaPpY\x01"),
            Some(Sniffed::Compressed(Compression::Snappy))
        );
        assert_eq!(sniff(&[0x78, 0x9C, 0, 0]), Some(Sniffed::Compressed(Compression::Zlib)));
        assert_eq!(sniff(b"\x7fELF"), None);
    }

    #[test]
    fn test_sniff_tar_header() {
        let mut head = vec![0u8; 512];
        head[257..262].copy_from_slice(b"ustar");
        assert_eq!(sniff(&head), Some(Sniffed::Tar));
        assert!(!is_tar_header(&head[..200]));
    }
}
