// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be copied and pasted across crates, but there doesn't appear to be a way to include inner attributes from a common source.
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]
// Arc<Mutex> can be more clear than needing to grok Orderings:
#![allow(clippy::mutex_atomic)]

mod id;

pub use crate::id::{IdValue, TargetId, TargetIdBuilder};

use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

pub type TargetHandle = Arc<dyn Target>;

///
/// A point on the build timeline, as consulted by the staleness oracle.
///
/// `Oldest` is the distinguished "exists, but its age is irrelevant" minimum: it never exceeds any
/// other stamp, so a target carrying it never forces dependents to rebuild.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stamp {
    Oldest,
    Mtime(SystemTime),
}

///
/// An addressable build artifact description: what to produce, not how.
///
/// Equal `TargetId`s must mean behaviorally interchangeable targets - the graph relies on that to
/// share one node per id.
///
pub trait Target: Send + Sync + 'static {
    fn id(&self) -> &TargetId;

    ///
    /// When the target was last produced: `None` if it does not exist yet, `Some(Stamp::Oldest)`
    /// if it exists but should never force a rebuild, or its modification time.
    ///
    fn timestamp(&self) -> Option<Stamp>;

    ///
    /// An optional working directory for this target's recipe. Relative paths are resolved
    /// against the executor's base working directory at dispatch time.
    ///
    fn working_dir(&self) -> Option<&Path> {
        None
    }

    /// Concrete access for rule factories that match on target types.
    fn as_any(&self) -> &dyn Any;
}

/// The modification time of `path`, or `None` if it cannot be observed.
pub fn file_mtime(path: &Path) -> Option<Stamp> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .map(Stamp::Mtime)
}

///
/// Identifies a file by its path.
///
#[derive(Clone)]
pub struct FileTarget {
    id: TargetId,
    path: PathBuf,
}

impl FileTarget {
    pub fn new(path: impl Into<PathBuf>) -> FileTarget {
        let path = path.into();
        let id = TargetId::builder("FileTarget")
            .attr("path", path.as_path())
            .build();
        FileTarget { id, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Target for FileTarget {
    fn id(&self) -> &TargetId {
        &self.id
    }

    fn timestamp(&self) -> Option<Stamp> {
        file_mtime(&self.path)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

///
/// Identifies a directory. A directory that exists reports `Stamp::Oldest`: its mtime churns with
/// unrelated activity inside it, and existence is all dependents care about.
///
#[derive(Clone)]
pub struct DirectoryTarget {
    id: TargetId,
    path: PathBuf,
}

impl DirectoryTarget {
    pub fn new(path: impl Into<PathBuf>) -> DirectoryTarget {
        let path = path.into();
        let id = TargetId::builder("DirectoryTarget")
            .attr("path", path.as_path())
            .build();
        DirectoryTarget { id, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Target for DirectoryTarget {
    fn id(&self) -> &TargetId {
        &self.id
    }

    fn timestamp(&self) -> Option<Stamp> {
        if self.path.is_dir() {
            Some(Stamp::Oldest)
        } else {
            None
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

///
/// A named target with no filesystem existence and therefore no timestamp: it is considered never
/// built, and is re-made on every run unless its rule has no recipe.
///
#[derive(Clone)]
pub struct PhonyTarget {
    id: TargetId,
}

impl PhonyTarget {
    pub fn new(name: &str) -> PhonyTarget {
        let id = TargetId::builder("PhonyTarget").attr("name", name).build();
        PhonyTarget { id }
    }
}

impl Target for PhonyTarget {
    fn id(&self) -> &TargetId {
        &self.id
    }

    fn timestamp(&self) -> Option<Stamp> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod target_tests;
