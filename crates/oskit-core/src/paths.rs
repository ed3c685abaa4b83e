//! Platform-native path primitives.
//!
//! Everything here works on the textual form of a path using the host
//! separator (`\` on Windows, `/` elsewhere). No operation translates between
//! the two forms, and none of the text operations resolve `.` or `..`.
//!
//! `abspath`, `relpath`, and the `exists`/`isdir`/`isfile` tests touch the
//! filesystem; the rest are pure string functions.

use crate::error::PathError;
use std::fs;
use std::path::PathBuf;

/// Separator between path components on the host.
pub const SEPARATOR: char = if cfg!(windows) { '\\' } else { '/' };

/// Name of the executable search-path environment variable on the host.
pub const PATH_ENV: &str = if cfg!(windows) { "Path" } else { "PATH" };

/// The host path separator.
pub fn separator() -> char {
    SEPARATOR
}

/// The host search-path environment variable name.
pub fn envvar() -> &'static str {
    PATH_ENV
}

/// Join two paths with exactly one separator.
///
/// No separator is added when `a` is empty or already ends with one.
pub fn join(a: &str, b: &str) -> String {
    join_with(SEPARATOR, a, b)
}

/// Join any number of components, skipping `None`.
///
/// Exactly one separator goes between consecutive present components.
/// Returns `None` only when no components were passed at all.
///
/// ```
/// use oskit_core::paths::{joinv, SEPARATOR};
///
/// let joined = joinv(["a", "b", "c"]).unwrap();
/// assert_eq!(joined, format!("a{0}b{0}c", SEPARATOR));
/// assert_eq!(joinv([Some("a"), None, Some("c")]).unwrap(), format!("a{}c", SEPARATOR));
/// ```
pub fn joinv<'a, I, P>(paths: I) -> Option<String>
where
    I: IntoIterator<Item = P>,
    P: Into<Option<&'a str>>,
{
    joinv_with(SEPARATOR, paths)
}

/// Collapse runs of separators into one and drop a trailing separator.
///
/// A bare root (`/`, or `X:\` on Windows) keeps its separator.
pub fn normalize(path: &str) -> String {
    normalize_with(SEPARATOR, path)
}

/// Resolve `path` to an absolute path.
///
/// POSIX resolves symlinks and fails when the target does not exist. Windows
/// resolves against the current directory and does not require existence.
pub fn abspath(path: &str) -> Result<String, PathError> {
    resolve(path)
}

/// Express `path` relative to `start`.
///
/// Both arguments are made absolute first; the result is whatever follows
/// `start` as a literal prefix of `path` (so it usually begins with a
/// separator). Fails when `start` is not a prefix of `path`.
pub fn relpath(path: &str, start: &str) -> Result<String, PathError> {
    let abs_path = abspath(path)?;
    let abs_start = abspath(start)?;

    match abs_path.strip_prefix(abs_start.as_str()) {
        Some(rest) => Ok(rest.to_string()),
        None => Err(PathError::NotUnderStart {
            path: abs_path,
            start: abs_start,
        }),
    }
}

/// Last component of `path`; the whole input when it has no separator.
pub fn basename(path: &str) -> String {
    basename_with(SEPARATOR, path)
}

/// Everything before the last separator, or `None` when there is none.
pub fn dirname(path: &str) -> Option<String> {
    dirname_with(SEPARATOR, path)
}

/// Extension including the dot, or `None` when the path contains no dot.
///
/// The split uses the last `.` anywhere in the path, not just in the final
/// component: `/etc/a.d/file` reports `.d/file`.
pub fn extname(path: &str) -> Option<String> {
    path.rfind('.').map(|idx| path[idx..].to_string())
}

/// `path` without the text from its last `.` onward.
///
/// Same whole-path split as [`extname`]. Paths without a dot come back as-is.
pub fn strip_ext(path: &str) -> String {
    match path.rfind('.') {
        Some(idx) => path[..idx].to_string(),
        None => path.to_string(),
    }
}

/// Whether `path` is absolute in host syntax.
pub fn isabs(path: &str) -> bool {
    if cfg!(windows) {
        isabs_windows(path)
    } else {
        isabs_posix(path)
    }
}

/// Whether anything exists at `path`. Any stat failure counts as absent.
pub fn exists(path: &str) -> bool {
    fs::metadata(path).is_ok()
}

/// Whether `path` is a directory. Any stat failure counts as false.
pub fn isdir(path: &str) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Whether `path` is a regular file. Any stat failure counts as false.
pub fn isfile(path: &str) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

fn join_with(sep: char, a: &str, b: &str) -> String {
    let mut out = String::with_capacity(a.len() + b.len() + 1);
    out.push_str(a);
    if !a.is_empty() && !a.ends_with(sep) {
        out.push(sep);
    }
    out.push_str(b);
    out
}

fn joinv_with<'a, I, P>(sep: char, paths: I) -> Option<String>
where
    I: IntoIterator<Item = P>,
    P: Into<Option<&'a str>>,
{
    let mut iter = paths.into_iter().peekable();
    iter.peek()?;

    let mut out = String::new();
    let mut first = true;
    for item in iter {
        let Some(part): Option<&'a str> = item.into() else {
            continue;
        };
        if !first {
            out.push(sep);
        }
        out.push_str(part);
        first = false;
    }
    Some(out)
}

fn normalize_with(sep: char, path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_sep = false;
    for c in path.chars() {
        let is_sep = c == sep;
        if !(is_sep && prev_sep) {
            out.push(c);
        }
        prev_sep = is_sep;
    }
    if out.len() > 1 && out.ends_with(sep) && !is_drive_root(&out) {
        out.pop();
    }
    out
}

fn is_drive_root(path: &str) -> bool {
    matches!(path.as_bytes(), [_, b':', _])
}

fn basename_with(sep: char, path: &str) -> String {
    match path.rfind(sep) {
        Some(idx) => path[idx + sep.len_utf8()..].to_string(),
        None => path.to_string(),
    }
}

fn dirname_with(sep: char, path: &str) -> Option<String> {
    path.rfind(sep).map(|idx| path[..idx].to_string())
}

fn isabs_posix(path: &str) -> bool {
    path.starts_with('/')
}

fn isabs_windows(path: &str) -> bool {
    let bytes = path.as_bytes();
    match bytes {
        [b'/' | b'\\', ..] => true,
        [_, b':', b'/' | b'\\', ..] => true,
        _ => false,
    }
}

#[cfg(not(windows))]
fn resolve(path: &str) -> Result<String, PathError> {
    let resolved = fs::canonicalize(path).map_err(|source| PathError::Resolve {
        path: path.to_string(),
        source,
    })?;
    resolved
        .into_os_string()
        .into_string()
        .map_err(|raw| PathError::NonUtf8(PathBuf::from(raw)))
}

#[cfg(windows)]
fn resolve(path: &str) -> Result<String, PathError> {
    use std::ffi::CString;
    use windows_sys::Win32::Storage::FileSystem::GetFullPathNameA;

    let resolve_err = |source: std::io::Error| PathError::Resolve {
        path: path.to_string(),
        source,
    };

    let c_path = CString::new(path)
        .map_err(|e| resolve_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

    let mut buf = vec![0u8; 260];
    loop {
        // SAFETY: `buf` is writable for `buf.len()` bytes and `c_path` is
        // NUL-terminated for the duration of the call.
        let len = unsafe {
            GetFullPathNameA(
                c_path.as_ptr() as *const u8,
                buf.len() as u32,
                buf.as_mut_ptr(),
                std::ptr::null_mut(),
            )
        } as usize;

        if len == 0 {
            return Err(resolve_err(std::io::Error::last_os_error()));
        }
        if len < buf.len() {
            buf.truncate(len);
            break;
        }
        buf.resize(len, 0);
    }

    String::from_utf8(buf).map_err(|e| {
        PathError::NonUtf8(PathBuf::from(String::from_utf8_lossy(e.as_bytes()).into_owned()))
    })
}
