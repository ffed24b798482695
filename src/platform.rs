//! Host OS and macOS release detection.
use std::fmt;

use crate::exec::Executor;
use crate::version::MacVersion;

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    MacOs,
    Linux,
    Windows,
}

impl Os {
    /// Parse the OS name used in settings documents.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "macos" => Some(Self::MacOs),
            "linux" => Some(Self::Linux),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// The OS this binary was built for; other Unix-likes count as Linux.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOs => write!(f, "macos"),
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    /// Running macOS release; `None` off macOS or when the release is not
    /// one we know.
    pub mac_version: Option<MacVersion>,
}

impl Platform {
    /// Detect the current platform, asking `sw_vers` for the macOS release.
    pub fn detect(executor: &dyn Executor) -> Self {
        let os = Os::current();
        let mac_version = if os == Os::MacOs {
            detect_mac_version(executor)
        } else {
            None
        };
        Self { os, mac_version }
    }

    /// Create a platform with explicit values.
    #[must_use]
    pub const fn new(os: Os, mac_version: Option<MacVersion>) -> Self {
        Self { os, mac_version }
    }

    #[must_use]
    pub fn is_macos(&self) -> bool {
        self.os == Os::MacOs
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mac_version {
            Some(v) => write!(f, "{} ({v})", self.os),
            None => write!(f, "{}", self.os),
        }
    }
}

fn detect_mac_version(executor: &dyn Executor) -> Option<MacVersion> {
    if !executor.which("sw_vers") {
        tracing::debug!("sw_vers not found; macOS release unknown");
        return None;
    }
    let output = executor
        .run("sw_vers", &["-productVersion"])
        .inspect_err(|e| tracing::debug!("sw_vers failed: {e:#}"))
        .ok()?;
    let raw = output.stdout.trim();
    MacVersion::from_version_str(raw)
        .inspect_err(|e| tracing::debug!("host release not recognised: {e}"))
        .ok()
}
