// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fs;
use std::time::SystemTime;

use crate::{DirectoryTarget, FileTarget, PhonyTarget, Stamp, Target};

#[test]
fn stamps_order_oldest_first() {
    assert!(Stamp::Oldest < Stamp::Mtime(SystemTime::UNIX_EPOCH));
    assert!(Stamp::Mtime(SystemTime::UNIX_EPOCH) < Stamp::Mtime(SystemTime::now()));
}

#[test]
fn missing_file_has_no_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let target = FileTarget::new(dir.path().join("nope"));
    assert_eq!(target.timestamp(), None);
}

#[test]
fn existing_file_reports_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out");
    fs::write(&path, "x").unwrap();
    match FileTarget::new(&path).timestamp() {
        Some(Stamp::Mtime(_)) => {}
        other => panic!("expected an mtime stamp, got {other:?}"),
    }
}

#[test]
fn equal_paths_share_an_identity() {
    let one = FileTarget::new("x");
    let other = FileTarget::new("x");
    assert_eq!(one.id(), other.id());
}

#[test]
fn existing_directory_is_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let target = DirectoryTarget::new(dir.path());
    assert_eq!(target.timestamp(), Some(Stamp::Oldest));
}

#[test]
fn missing_directory_has_no_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let target = DirectoryTarget::new(dir.path().join("sub"));
    assert_eq!(target.timestamp(), None);
}

#[test]
fn file_at_directory_path_is_not_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain");
    fs::write(&path, "x").unwrap();
    assert_eq!(DirectoryTarget::new(&path).timestamp(), None);
}

#[test]
fn phony_targets_are_named() {
    let all = PhonyTarget::new("all");
    let test = PhonyTarget::new("test");
    assert_ne!(all.id(), test.id());
    assert_eq!(all.timestamp(), None);
}
