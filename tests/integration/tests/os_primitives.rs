//! Identity, path, and bitwise primitives used from outside the crate.

use oskit_core::bitwise::{BitEntry, BitTable};
use oskit_core::osinfo::{self, OsFamily, OsInfo, OsType};
use oskit_core::paths::{self, SEPARATOR};
use oskit_integration_tests::init_tracing;
use tempfile::TempDir;

#[test]
fn test_identity_snapshot_is_consistent() {
    init_tracing();

    let info = OsInfo::query().unwrap();
    assert!(!info.name.is_empty());
    assert!(info.is_consistent());
    assert_ne!(info.family, OsFamily::Unknown);
    assert_ne!(info.os_type, OsType::Unknown);
    assert_eq!(info.is_64bit, cfg!(target_pointer_width = "64"));
    assert_eq!(osinfo::family(), info.family);
    assert_eq!(osinfo::os_type(), info.os_type);
}

#[cfg(unix)]
#[test]
fn test_identity_on_posix() {
    let info = osinfo::query().unwrap();
    assert_eq!(info.family, OsFamily::Posix);
    assert!(matches!(
        info.os_type,
        OsType::Linux | OsType::MacOs | OsType::Bsd
    ));
    assert!(!info.version_string.is_empty());
    assert!(!info.is_embedded);

    if cfg!(target_os = "linux") {
        assert_eq!(info.name, "Linux");
        assert!(info.version_major > 0);
    }
    if cfg!(target_os = "macos") {
        assert_eq!(info.name, "macOS");
    }
}

#[test]
fn test_identity_serializes_type_field() {
    let info = OsInfo::query().unwrap();
    let json = serde_json::to_value(&info).unwrap();
    assert!(json.get("type").is_some());
    assert!(json.get("family").is_some());
}

#[test]
fn test_join_scenarios() {
    let sep = SEPARATOR;
    let root = format!("{}a", sep);

    assert_eq!(paths::join(&root, "b"), format!("{0}a{0}b", sep));
    assert_eq!(paths::join(&format!("{}{}", root, sep), "b"), format!("{0}a{0}b", sep));
    assert_eq!(
        paths::joinv(["a", "b", "c"]).unwrap(),
        format!("a{0}b{0}c", sep)
    );
}

#[test]
fn test_join_then_empty_normalizes_stable() {
    let nested = format!("{0}x{0}{0}", SEPARATOR);
    let cases = [("a", "b"), ("", "b"), (nested.as_str(), "y")];

    for (p, q) in cases {
        let joined = paths::join(p, q);
        assert_eq!(
            paths::normalize(&paths::join(&joined, "")),
            paths::normalize(&joined),
            "join({:?}, {:?})",
            p,
            q
        );
        let once = paths::normalize(&joined);
        assert_eq!(paths::normalize(&once), once);
    }
}

#[test]
fn test_filesystem_queries() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.txt");
    std::fs::write(&file, "hi").unwrap();

    let dir_str = dir.path().to_str().unwrap();
    let file_str = file.to_str().unwrap();

    assert!(paths::exists(file_str));
    assert!(paths::isfile(file_str));
    assert!(!paths::isdir(file_str));
    assert!(paths::isdir(dir_str));
    assert!(!paths::exists(&paths::join(dir_str, "missing")));

    let abs = paths::abspath(file_str).unwrap();
    assert!(paths::isabs(&abs));
    assert_eq!(paths::basename(&abs), "notes.txt");
    assert_eq!(paths::extname(&abs).as_deref(), Some(".txt"));

    let rel = paths::relpath(file_str, dir_str).unwrap();
    assert!(rel.ends_with("notes.txt"));
}

#[test]
fn test_relpath_outside_start_fails() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let err = paths::relpath(a.path().to_str().unwrap(), b.path().to_str().unwrap());
    assert!(err.is_err());
}

#[test]
fn test_bitwise_scenario() {
    static ENTRIES: [BitEntry<'static>; 3] = [
        BitEntry::new("read", 1),
        BitEntry::new("write", 2),
        BitEntry::new("execute", 4),
    ];
    let table = BitTable::try_new(&ENTRIES).unwrap();

    assert_eq!(table.parse("read|write"), 3);
    assert_eq!(table.format(3), "read|write");
    assert_eq!(table.format(0), "");
    assert_eq!(table.lookup("execute").unwrap(), 4);

    for bits in 0..=table.all() {
        assert_eq!(table.parse(&table.format(bits)), bits);
    }

    let mut small = [0u8; 4];
    assert!(table.format_into(3, &mut small).is_err());
}
