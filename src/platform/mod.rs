//! Supported target platforms and asset-name matching.
//!
//! The set of supported `(os, arch)` pairs is closed. Anything outside the
//! table is rejected when the run starts, never at first use.
//!
//! # Example
//!
//! ```
//! use getghrel_core::platform::{Arch, Os, Platform, PlatformPattern};
//!
//! let platform = Platform::new(Os::Linux, Arch::Amd64);
//! let pattern = PlatformPattern::new(platform).unwrap();
//! assert!(pattern.matches("bat-v0.24.0-x86_64-unknown-linux-gnu.tar.gz"));
//! assert!(!pattern.matches("bat-v0.24.0-x86_64-apple-darwin.tar.gz"));
//! ```

mod pattern;

pub use pattern::PlatformPattern;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::prune::ImageFormat;

/// Errors raised while selecting the target platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The operating system or architecture is not in the supported table.
    #[error(
        "unsupported platform {os}/{arch}\n  Suggestion: supported targets are darwin/amd64, darwin/arm64, linux/amd64 and linux/arm64"
    )]
    Unsupported {
        /// Operating system name as reported or requested.
        os: String,
        /// Architecture name as reported or requested.
        arch: String,
    },

    /// A platform pattern failed to compile.
    #[error("invalid platform pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl PlatformError {
    /// Creates an `Unsupported` error.
    pub fn unsupported(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::Unsupported {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

/// Target operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// macOS.
    Darwin,
    /// Linux.
    Linux,
}

impl Os {
    /// Keywords identifying this OS inside an asset name.
    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Darwin => &["apple", "darwin", "macos", "mac"],
            Self::Linux => &["linux"],
        }
    }

    /// Keywords of every other OS, supported or not.
    #[must_use]
    pub fn foreign_keywords(self) -> Vec<&'static str> {
        let mut keywords = vec!["freebsd", "netbsd", "openbsd", "windows"];
        for other in [Self::Darwin, Self::Linux] {
            if other != self {
                keywords.extend_from_slice(other.keywords());
            }
        }
        keywords
    }

    /// Canonical name (Go `GOOS` spelling).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
        }
    }
}

impl FromStr for Os {
    type Err = PlatformError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "darwin" | "macos" | "mac" | "osx" => Ok(Self::Darwin),
            "linux" => Ok(Self::Linux),
            _ => Err(PlatformError::unsupported(value, "*")),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// `x86_64`.
    Amd64,
    /// `aarch64`.
    Arm64,
}

impl Arch {
    /// Keywords identifying this architecture inside an asset name.
    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Amd64 => &["amd64", "x86_64"],
            Self::Arm64 => &["arm64", "aarch64"],
        }
    }

    /// Canonical name (Go `GOARCH` spelling).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

impl FromStr for Arch {
    type Err = PlatformError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "amd64" | "x86_64" | "x64" => Ok(Self::Amd64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            _ => Err(PlatformError::unsupported("*", value)),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every `(os, arch)` pair the matcher and the pruner know how to handle.
pub const SUPPORTED_PLATFORMS: [Platform; 4] = [
    Platform::new(Os::Darwin, Arch::Amd64),
    Platform::new(Os::Darwin, Arch::Arm64),
    Platform::new(Os::Linux, Arch::Amd64),
    Platform::new(Os::Linux, Arch::Arm64),
];

/// A supported `(os, arch)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl Platform {
    /// Creates a platform from its parts.
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Resolves a platform from free-form names (e.g. `"macos"`, `"aarch64"`).
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`] when either name, or the pair,
    /// is outside the supported table.
    pub fn from_names(os: &str, arch: &str) -> Result<Self, PlatformError> {
        let unsupported = || PlatformError::unsupported(os, arch);
        let platform = Self::new(
            os.parse().map_err(|_| unsupported())?,
            arch.parse().map_err(|_| unsupported())?,
        );
        if SUPPORTED_PLATFORMS.contains(&platform) {
            Ok(platform)
        } else {
            Err(unsupported())
        }
    }

    /// Detects the platform this process is running on.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`] on hosts outside the table.
    pub fn host() -> Result<Self, PlatformError> {
        Self::from_names(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Native executable image format for this platform.
    #[must_use]
    pub fn image_format(self) -> ImageFormat {
        match self.os {
            Os::Darwin => ImageFormat::MachO,
            Os::Linux => ImageFormat::Elf,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
