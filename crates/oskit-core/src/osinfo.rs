//! Operating system identity.
//!
//! [`OsInfo::query`] takes a one-shot snapshot of the running OS. The probe is
//! chosen at compile time: Windows, POSIX (`uname`), an RTOS build (the `rtos`
//! feature), or bare metal for targets with no operating system at all.

use crate::error::Result;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Longest `name` / `version_string` kept in a snapshot, in bytes.
pub const MAX_TEXT_LEN: usize = 63;

/// Broad operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    #[default]
    Unknown,
    Posix,
    Windows,
    Rtos,
    BareMetal,
}

impl OsFamily {
    /// Families that only exist on embedded targets.
    pub fn is_embedded(self) -> bool {
        matches!(self, Self::Rtos | Self::BareMetal)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Posix => "posix",
            Self::Windows => "windows",
            Self::Rtos => "rtos",
            Self::BareMetal => "baremetal",
        };
        f.write_str(s)
    }
}

/// Concrete operating system kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    #[default]
    Unknown,
    Linux,
    MacOs,
    Windows,
    Bsd,
    Rtos,
    BareMetal,
}

impl OsType {
    /// The family this type belongs to.
    pub fn family(self) -> OsFamily {
        match self {
            Self::Unknown => OsFamily::Unknown,
            Self::Linux | Self::MacOs | Self::Bsd => OsFamily::Posix,
            Self::Windows => OsFamily::Windows,
            Self::Rtos => OsFamily::Rtos,
            Self::BareMetal => OsFamily::BareMetal,
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::Bsd => "bsd",
            Self::Rtos => "rtos",
            Self::BareMetal => "baremetal",
        };
        f.write_str(s)
    }
}

/// Snapshot of the running operating system.
///
/// The default value is the zeroed snapshot a failed probe stands for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OsInfo {
    pub family: OsFamily,

    #[serde(rename = "type")]
    pub os_type: OsType,

    pub version_major: u32,
    pub version_minor: u32,
    pub version_patch: u32,

    pub is_embedded: bool,
    pub is_64bit: bool,

    /// Short display name, never empty on success.
    pub name: String,

    /// Platform-native version text.
    pub version_string: String,
}

impl OsInfo {
    /// Probe the running operating system.
    pub fn query() -> Result<Self> {
        let info = probe()?;
        debug!(
            "OS probe: {} ({}) {}.{}.{}",
            info.name, info.os_type, info.version_major, info.version_minor, info.version_patch
        );
        Ok(info)
    }

    /// Check that type, family, and the embedded flag agree with each other.
    pub fn is_consistent(&self) -> bool {
        self.os_type.family() == self.family && self.is_embedded == self.family.is_embedded()
    }

    fn new(family: OsFamily, os_type: OsType, name: &str, version_string: &str) -> Self {
        Self {
            family,
            os_type,
            is_embedded: family.is_embedded(),
            is_64bit: is_64bit_target(),
            name: clamp_text(name),
            version_string: clamp_text(version_string),
            ..Default::default()
        }
    }
}

/// Probe the running OS, returning `None` when the probe fails.
pub fn query() -> Option<OsInfo> {
    OsInfo::query().ok()
}

/// OS family of the host, or [`OsFamily::Unknown`] when the probe fails.
pub fn family() -> OsFamily {
    query().map(|info| info.family).unwrap_or_default()
}

/// OS type of the host, or [`OsType::Unknown`] when the probe fails.
pub fn os_type() -> OsType {
    query().map(|info| info.os_type).unwrap_or_default()
}

/// Whether the host is an embedded target, false when the probe fails.
pub fn is_embedded() -> bool {
    query().map(|info| info.is_embedded).unwrap_or(false)
}

/// Whether the native pointer width exceeds 32 bits, false when the probe fails.
pub fn is_64bit() -> bool {
    query().map(|info| info.is_64bit).unwrap_or(false)
}

fn is_64bit_target() -> bool {
    usize::BITS > 32
}

/// Truncate to [`MAX_TEXT_LEN`] bytes on a character boundary.
fn clamp_text(text: &str) -> String {
    if text.len() <= MAX_TEXT_LEN {
        return text.to_string();
    }
    let mut end = MAX_TEXT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Best-effort `major.minor.patch` parse of a release string.
///
/// Parsing stops at the first component that does not start with a digit;
/// missing components stay 0. `"6.1.0-13-amd64"` gives `[6, 1, 0]`.
pub(crate) fn parse_release(release: &str) -> [u32; 3] {
    let mut parts = [0u32; 3];
    let mut rest = release.trim_start();

    for (i, slot) in parts.iter_mut().enumerate() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            break;
        }
        *slot = rest[..digits].parse().unwrap_or(u32::MAX);
        rest = &rest[digits..];

        if i < 2 {
            match rest.strip_prefix('.') {
                Some(next) => rest = next,
                None => break,
            }
        }
    }

    parts
}

#[cfg(all(windows, not(feature = "rtos")))]
fn probe() -> Result<OsInfo> {
    use windows_sys::Win32::System::SystemInformation::{
        GetVersionExA, OSVERSIONINFOA, OSVERSIONINFOEXA,
    };

    let mut info = OsInfo::new(OsFamily::Windows, OsType::Windows, "Windows", "");

    // SAFETY: OSVERSIONINFOEXA is plain data; the size field tells the API
    // which layout it was handed.
    let mut ver: OSVERSIONINFOEXA = unsafe { std::mem::zeroed() };
    ver.dwOSVersionInfoSize = std::mem::size_of::<OSVERSIONINFOEXA>() as u32;

    // SAFETY: `ver` is a live, writable OSVERSIONINFOEXA whose size field is
    // set, and the EX layout begins with the plain OSVERSIONINFOA layout.
    let ok = unsafe { GetVersionExA(&mut ver as *mut OSVERSIONINFOEXA as *mut OSVERSIONINFOA) };
    if ok != 0 {
        info.version_major = ver.dwMajorVersion;
        info.version_minor = ver.dwMinorVersion;
        info.version_patch = ver.dwBuildNumber;

        let len = ver
            .szCSDVersion
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(ver.szCSDVersion.len());
        info.version_string = clamp_text(&String::from_utf8_lossy(&ver.szCSDVersion[..len]));
    } else {
        debug!(
            "GetVersionExA failed: {}",
            std::io::Error::last_os_error()
        );
    }

    Ok(info)
}

#[cfg(all(unix, not(feature = "rtos")))]
fn probe() -> Result<OsInfo> {
    use crate::error::Error;

    let uts = nix::sys::utsname::uname().map_err(|e| {
        debug!("uname failed: {}", e);
        Error::Probe(format!("uname failed: {}", e))
    })?;

    let sysname = uts.sysname().to_string_lossy();
    let release = uts.release().to_string_lossy();

    let (os_type, name) = posix_flavor(&sysname);
    let mut info = OsInfo::new(OsFamily::Posix, os_type, &name, &release);

    let [major, minor, patch] = parse_release(&release);
    info.version_major = major;
    info.version_minor = minor;
    info.version_patch = patch;

    Ok(info)
}

#[cfg(all(unix, not(feature = "rtos")))]
fn posix_flavor(sysname: &str) -> (OsType, String) {
    if cfg!(target_os = "macos") {
        (OsType::MacOs, "macOS".to_string())
    } else if cfg!(any(target_os = "linux", target_os = "android")) {
        (OsType::Linux, "Linux".to_string())
    } else if sysname.is_empty() {
        (OsType::Bsd, "Unix".to_string())
    } else {
        (OsType::Bsd, sysname.to_string())
    }
}

#[cfg(feature = "rtos")]
fn probe() -> Result<OsInfo> {
    Ok(OsInfo::new(OsFamily::Rtos, OsType::Rtos, "RTOS", "unknown"))
}

#[cfg(not(any(windows, unix, feature = "rtos")))]
fn probe() -> Result<OsInfo> {
    Ok(OsInfo::new(
        OsFamily::BareMetal,
        OsType::BareMetal,
        "BareMetal",
        "n/a",
    ))
}
