// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use targets::{file_mtime, IdValue, Stamp, Target, TargetId};

/// Maps a C++ source file path to the object file path it compiles to.
pub type ObjectPathFn = Arc<dyn Fn(&Path) -> PathBuf + Send + Sync>;

fn paths_attr(paths: &[PathBuf]) -> IdValue {
    IdValue::List(paths.iter().map(|path| IdValue::from(path.as_path())).collect())
}

///
/// Identifies an object file by its path, the source it compiles, and the compilation flags -
/// the same source compiled with different flags is a different target.
///
pub struct ObjectFileTarget {
    id: TargetId,
    path: PathBuf,
    cxxflags: String,
    cpp_path: PathBuf,
}

impl ObjectFileTarget {
    pub fn new(
        path: impl Into<PathBuf>,
        cxxflags: &str,
        cpp_path: impl Into<PathBuf>,
    ) -> ObjectFileTarget {
        let path = path.into();
        let cpp_path = cpp_path.into();
        let id = TargetId::builder("ObjectFileTarget")
            .attr("path", path.as_path())
            .attr("cxxflags", cxxflags)
            .attr("cpp_path", cpp_path.as_path())
            .build();
        ObjectFileTarget {
            id,
            path,
            cxxflags: cxxflags.to_owned(),
            cpp_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cxxflags(&self) -> &str {
        &self.cxxflags
    }

    pub fn cpp_path(&self) -> &Path {
        &self.cpp_path
    }
}

impl Target for ObjectFileTarget {
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
/// Identifies an artifact produced by linking: an executable or a shared library.
///
/// The object-path mapping is deliberately not part of the identity: it is a convenience for rule
/// construction, and two artifacts with the same path, flags and sources are the same artifact
/// however their object paths are derived.
///
pub struct LinkedArtifactTarget {
    id: TargetId,
    path: PathBuf,
    cxxflags: String,
    ldflags: String,
    cpp_paths: Vec<PathBuf>,
    object_path_for: ObjectPathFn,
}

impl LinkedArtifactTarget {
    pub fn new(
        path: impl Into<PathBuf>,
        cxxflags: &str,
        ldflags: &str,
        cpp_paths: Vec<PathBuf>,
        object_path_for: impl Fn(&Path) -> PathBuf + Send + Sync + 'static,
    ) -> LinkedArtifactTarget {
        let path = path.into();
        let id = TargetId::builder("LinkedArtifactTarget")
            .attr("path", path.as_path())
            .attr("cxxflags", cxxflags)
            .attr("ldflags", ldflags)
            .attr("cpp_paths", paths_attr(&cpp_paths))
            .build();
        LinkedArtifactTarget {
            id,
            path,
            cxxflags: cxxflags.to_owned(),
            ldflags: ldflags.to_owned(),
            cpp_paths,
            object_path_for: Arc::new(object_path_for),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cxxflags(&self) -> &str {
        &self.cxxflags
    }

    pub fn ldflags(&self) -> &str {
        &self.ldflags
    }

    pub fn cpp_paths(&self) -> &[PathBuf] {
        &self.cpp_paths
    }

    pub fn object_path_for(&self) -> ObjectPathFn {
        self.object_path_for.clone()
    }
}

impl Target for LinkedArtifactTarget {
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
/// Identifies a static library assembled with `ar`.
///
pub struct StaticLibraryTarget {
    id: TargetId,
    path: PathBuf,
    cxxflags: String,
    cpp_paths: Vec<PathBuf>,
    object_path_for: ObjectPathFn,
}

impl StaticLibraryTarget {
    pub fn new(
        path: impl Into<PathBuf>,
        cxxflags: &str,
        cpp_paths: Vec<PathBuf>,
        object_path_for: impl Fn(&Path) -> PathBuf + Send + Sync + 'static,
    ) -> StaticLibraryTarget {
        let path = path.into();
        let id = TargetId::builder("StaticLibraryTarget")
            .attr("path", path.as_path())
            .attr("cxxflags", cxxflags)
            .attr("cpp_paths", paths_attr(&cpp_paths))
            .build();
        StaticLibraryTarget {
            id,
            path,
            cxxflags: cxxflags.to_owned(),
            cpp_paths,
            object_path_for: Arc::new(object_path_for),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cxxflags(&self) -> &str {
        &self.cxxflags
    }

    pub fn cpp_paths(&self) -> &[PathBuf] {
        &self.cpp_paths
    }

    pub fn object_path_for(&self) -> ObjectPathFn {
        self.object_path_for.clone()
    }
}

impl Target for StaticLibraryTarget {
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
/// Identifies the act of computing one source file's header dependencies. It has no timestamp, so
/// the scan re-runs on every build.
///
pub struct HeaderScanTarget {
    id: TargetId,
    cpp_path: PathBuf,
}

impl HeaderScanTarget {
    pub fn new(cpp_path: impl Into<PathBuf>) -> HeaderScanTarget {
        let cpp_path = cpp_path.into();
        let id = TargetId::builder("HeaderScanTarget")
            .attr("cpp_path", cpp_path.as_path())
            .build();
        HeaderScanTarget { id, cpp_path }
    }

    pub fn cpp_path(&self) -> &Path {
        &self.cpp_path
    }
}

impl Target for HeaderScanTarget {
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

///
/// Identifies a hand-written `.cpp` or `.h` file.
///
pub struct SourceFileTarget {
    id: TargetId,
    path: PathBuf,
}

impl SourceFileTarget {
    pub fn new(path: impl Into<PathBuf>) -> SourceFileTarget {
        let path = path.into();
        let id = TargetId::builder("SourceFileTarget")
            .attr("path", path.as_path())
            .build();
        SourceFileTarget { id, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Target for SourceFileTarget {
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
