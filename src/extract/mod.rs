//! Archive dispatch and extraction.
//!
//! A downloaded asset is either a recognized archive (closed suffix set),
//! a bare binary (no extension), or unsupported. Archives are identified by
//! magic bytes first and by suffix second, then every regular-file entry is
//! written into the destination directory by base name. Directory structure
//! inside the archive is dropped; name clashes get a numeric suffix.
//!
//! Extraction is blocking I/O. [`extract_in_background`] runs it on the
//! blocking thread pool.

mod error;
mod format;

pub use error::ExtractError;
pub use format::{ArchiveFormat, Compression, SuffixMatch, match_suffix};

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sevenz_rust::{Password, SevenZReader};
use tracing::{debug, instrument, warn};
use zip::ZipArchive;

use crate::download::create_unique_file;
use format::{Sniffed, is_tar_header, sniff, unrecognized_extension};

/// Bytes inspected for magic numbers (one tar header block).
const HEADER_PROBE_LEN: usize = 512;

/// Internal buffer size for the brotli decoder.
const BROTLI_BUFFER_LEN: usize = 4096;

/// Result of dispatching one downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// No extension: the download is the binary itself.
    BareBinary,
    /// Archive unpacked; paths of the files written.
    Extracted {
        /// Files created in the destination directory.
        files: Vec<PathBuf>,
    },
}

impl ExtractOutcome {
    /// True when an archive was unpacked.
    #[must_use]
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted { .. })
    }
}

/// Container resolved from content and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Zip,
    SevenZip,
    Rar,
    Tar,
    Stream {
        compression: Compression,
        tar_by_name: bool,
    },
}

impl Layout {
    fn resolve(sniffed: Option<Sniffed>, by_name: ArchiveFormat) -> Self {
        let tar_by_name = matches!(by_name, ArchiveFormat::Tar | ArchiveFormat::CompressedTar(_));
        let sniffed = sniffed.filter(|s| {
            !s.is_heuristic() || by_name == ArchiveFormat::Compressed(Compression::Zlib)
        });
        match (sniffed, by_name) {
            (Some(Sniffed::Zip), _) | (None, ArchiveFormat::Zip) => Self::Zip,
            (Some(Sniffed::SevenZip), _) | (None, ArchiveFormat::SevenZip) => Self::SevenZip,
            (Some(Sniffed::Rar), _) | (None, ArchiveFormat::Rar) => Self::Rar,
            (Some(Sniffed::Tar), _) | (None, ArchiveFormat::Tar) => Self::Tar,
            (Some(Sniffed::Compressed(compression)), _)
            | (
                None,
                ArchiveFormat::CompressedTar(compression) | ArchiveFormat::Compressed(compression),
            ) => Self::Stream {
                compression,
                tar_by_name,
            },
        }
    }
}

/// Extracts `file_path` into `destination_dir`.
///
/// # Errors
///
/// - [`ExtractError::UnsupportedFormat`] when the name carries an extension
///   outside the recognized set
/// - [`ExtractError::Archive`] when the content cannot be decoded
/// - [`ExtractError::Io`] when reading or writing fails
///
/// Files written before a failure are removed.
#[instrument(fields(file = %file_path.display()))]
pub fn extract(file_path: &Path, destination_dir: &Path) -> Result<ExtractOutcome, ExtractError> {
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let Some(suffix) = match_suffix(&file_name) else {
        if let Some(extension) = unrecognized_extension(&file_name) {
            return Err(ExtractError::unsupported(file_path, extension));
        }
        debug!("no archive extension, treating as bare binary");
        return Ok(ExtractOutcome::BareBinary);
    };

    let mut extraction = Extraction::new(file_path, destination_dir);
    match extraction.run(&file_name, suffix) {
        Ok(()) => {
            debug!(files = extraction.created.len(), "archive extracted");
            Ok(ExtractOutcome::Extracted {
                files: extraction.created,
            })
        }
        Err(e) => {
            extraction.rollback();
            Err(e)
        }
    }
}

/// Runs [`extract`] on the blocking thread pool.
///
/// # Errors
///
/// Same as [`extract`], plus [`ExtractError::Task`] if the blocking task
/// panics or is cancelled.
pub async fn extract_in_background(
    file_path: PathBuf,
    destination_dir: PathBuf,
) -> Result<ExtractOutcome, ExtractError> {
    let task_path = file_path.clone();
    tokio::task::spawn_blocking(move || extract(&task_path, &destination_dir))
        .await
        .map_err(|e| ExtractError::task(&file_path, e))?
}

struct Extraction<'a> {
    source: &'a Path,
    destination: &'a Path,
    created: Vec<PathBuf>,
}

impl<'a> Extraction<'a> {
    fn new(source: &'a Path, destination: &'a Path) -> Self {
        Self {
            source,
            destination,
            created: Vec::new(),
        }
    }

    fn run(&mut self, file_name: &str, suffix: SuffixMatch) -> Result<(), ExtractError> {
        let mut file = File::open(self.source).map_err(|e| ExtractError::io(self.source, e))?;
        let head = read_head(&mut file).map_err(|e| ExtractError::io(self.source, e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| ExtractError::io(self.source, e))?;

        let layout = Layout::resolve(sniff(&head), suffix.format);
        debug!(?layout, suffix = suffix.suffix, "resolved archive layout");

        match layout {
            Layout::Zip => self.unpack_zip(file),
            Layout::SevenZip => self.unpack_seven_zip(),
            Layout::Rar => self.unpack_rar(),
            Layout::Tar => self.unpack_tar(file),
            Layout::Stream {
                compression,
                tar_by_name,
            } => {
                let mut decoder = decoder_for(compression, file)
                    .map_err(|e| ExtractError::archive(self.source, e))?;
                let inner_head =
                    read_head(&mut decoder).map_err(|e| ExtractError::archive(self.source, e))?;
                let is_tar = is_tar_header(&inner_head) || tar_by_name;
                let payload = Cursor::new(inner_head).chain(decoder);
                if is_tar {
                    self.unpack_tar(payload)
                } else {
                    self.write_entry(payload, suffix.strip(file_name))
                }
            }
        }
    }

    fn unpack_tar<R: Read>(&mut self, reader: R) -> Result<(), ExtractError> {
        let mut archive = tar::Archive::new(reader);
        let entries = archive
            .entries()
            .map_err(|e| ExtractError::archive(self.source, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| ExtractError::archive(self.source, e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry
                .path()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
            let Some(name) = name else {
                warn!("skipping tar entry without a file name");
                continue;
            };
            self.write_entry(entry, &name)?;
        }
        Ok(())
    }

    fn unpack_zip(&mut self, file: File) -> Result<(), ExtractError> {
        let mut archive =
            ZipArchive::new(file).map_err(|e| ExtractError::archive(self.source, e))?;

        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|e| ExtractError::archive(self.source, e))?;
            if entry.is_dir() || entry.is_symlink() {
                continue;
            }
            let name = entry
                .enclosed_name()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
            let Some(name) = name else {
                warn!(entry = entry.name(), "skipping zip entry with unsafe path");
                continue;
            };
            self.write_entry(entry, &name)?;
        }
        Ok(())
    }

    fn unpack_seven_zip(&mut self) -> Result<(), ExtractError> {
        let source = self.source;
        let mut archive = SevenZReader::open(source, Password::empty())
            .map_err(|e| ExtractError::archive(source, e))?;

        let mut failure = None;
        archive
            .for_each_entries(|entry, reader| {
                if entry.is_directory() || !entry.has_stream() {
                    return Ok(true);
                }
                let name = Path::new(entry.name())
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                let written = match name {
                    Some(name) => self.write_entry(reader, &name),
                    None => {
                        warn!(entry = entry.name(), "skipping 7z entry without a file name");
                        io::copy(reader, &mut io::sink())
                            .map(|_| ())
                            .map_err(|e| ExtractError::archive(source, e))
                    }
                };
                match written {
                    Ok(()) => Ok(true),
                    Err(e) => {
                        failure = Some(e);
                        Ok(false)
                    }
                }
            })
            .map_err(|e| ExtractError::archive(source, e))?;
        failure.map_or(Ok(()), Err)
    }

    fn unpack_rar(&mut self) -> Result<(), ExtractError> {
        let source = self.source;
        let mut archive = unrar::Archive::new(source)
            .open_for_processing()
            .map_err(|e| ExtractError::archive(source, e))?;

        while let Some(header) = archive
            .read_header()
            .map_err(|e| ExtractError::archive(source, e))?
        {
            let entry = header.entry();
            let name = if entry.is_file() {
                entry
                    .filename
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            } else {
                None
            };
            archive = match name {
                Some(name) => {
                    let (data, rest) = header
                        .read()
                        .map_err(|e| ExtractError::archive(source, e))?;
                    self.write_entry(Cursor::new(data), &name)?;
                    rest
                }
                None => header
                    .skip()
                    .map_err(|e| ExtractError::archive(source, e))?,
            };
        }
        Ok(())
    }

    fn write_entry<R: Read>(&mut self, mut reader: R, name: &str) -> Result<(), ExtractError> {
        let (path, file) = create_unique_file(self.destination, name)
            .map_err(|e| ExtractError::io(&self.destination.join(name), e))?;
        self.created.push(path.clone());

        let mut writer = BufWriter::new(file);
        io::copy(&mut reader, &mut writer).map_err(|e| ExtractError::io(&path, e))?;
        writer.flush().map_err(|e| ExtractError::io(&path, e))?;
        debug!(path = %path.display(), "extracted entry");
        Ok(())
    }

    fn rollback(&mut self) {
        for path in self.created.drain(..) {
            let _ = std::fs::remove_file(&path);
        }
    }
}

fn decoder_for(compression: Compression, file: File) -> io::Result<Box<dyn Read>> {
    Ok(match compression {
        Compression::Gzip => Box::new(flate2::read::MultiGzDecoder::new(file)),
        Compression::Zlib => Box::new(flate2::read::ZlibDecoder::new(file)),
        Compression::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(file)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(file)),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(file)?),
        Compression::Brotli => Box::new(brotli::Decompressor::new(file, BROTLI_BUFFER_LEN)),
        Compression::Snappy => Box::new(snap::read::FrameDecoder::new(file)),
    })
}

/// Reads up to [`HEADER_PROBE_LEN`] bytes without failing on short input.
fn read_head<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(HEADER_PROBE_LEN);
    reader
        .take(HEADER_PROBE_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(head)
}
