// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fnv::FnvHashMap as HashMap;
use itertools::Itertools;
use parking_lot::Mutex;

use graph::{
    BuildSession, EntryId, ExpansionError, JobValue, Recipe, Rule, RuleFactory, RuleSetBuilder,
    SourceRule,
};
use targets::{DirectoryTarget, TargetHandle};

use crate::artifacts::{
    HeaderScanTarget, LinkedArtifactTarget, ObjectFileTarget, SourceFileTarget,
    StaticLibraryTarget,
};
use crate::makedeps::{parse_object_file_make_deps, ObjectFileDeps};
use crate::shell::{sh, sh_capture};

///
/// Header lists discovered by scan recipes, keyed by source file. Object rules read the latest
/// scan results when their node is (re-)expanded, which is how dynamically discovered
/// dependencies flow back into the graph.
///
pub type DiscoveredHeaders = Arc<Mutex<HashMap<PathBuf, Vec<PathBuf>>>>;

///
/// A ruleset builder preloaded with the C++ rule family. Callers register their own rules on top
/// (a build-mode rule, say) and finalize it with `build`.
///
pub fn cpp_ruleset() -> RuleSetBuilder {
    let discovered: DiscoveredHeaders = Arc::new(Mutex::new(HashMap::default()));
    let mut builder = RuleSetBuilder::new();
    builder.factory(Arc::new(DirectoryRuleFactory));
    builder.factory(Arc::new(LinkedArtifactRuleFactory));
    builder.factory(Arc::new(StaticLibraryRuleFactory));
    builder.factory(Arc::new(ObjectFileRuleFactory {
        discovered: discovered.clone(),
    }));
    builder.factory(Arc::new(HeaderScanRuleFactory { discovered }));
    builder.factory(Arc::new(CppSourceRuleFactory));
    builder
}

/// The directory a produced file lands in, as a dependency target. `None` for bare filenames.
fn parent_directory(path: &Path) -> Option<TargetHandle> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            Some(Arc::new(DirectoryTarget::new(parent)))
        }
        _ => None,
    }
}

struct DirectoryRule {
    target: TargetHandle,
    path: PathBuf,
}

impl Rule for DirectoryRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        Ok(Vec::new())
    }

    fn recipe(&self) -> Option<Recipe> {
        let path = self.path.clone();
        Some(Box::new(move |context| {
            sh(&format!("mkdir -p {}", path.display()), &context)?;
            Ok(None)
        }))
    }
}

struct DirectoryRuleFactory;

impl RuleFactory for DirectoryRuleFactory {
    fn name(&self) -> &str {
        "DirectoryRule"
    }

    fn matches(&self, target: &TargetHandle) -> bool {
        target.as_any().is::<DirectoryTarget>()
    }

    fn instantiate(&self, target: TargetHandle) -> Arc<dyn Rule> {
        let path = target
            .as_any()
            .downcast_ref::<DirectoryTarget>()
            .expect("matched a DirectoryTarget")
            .path()
            .to_path_buf();
        Arc::new(DirectoryRule { target, path })
    }
}

struct LinkedArtifactRule {
    target: TargetHandle,
    path: PathBuf,
    ldflags: String,
    object_targets: Vec<TargetHandle>,
    object_paths: Vec<PathBuf>,
}

impl Rule for LinkedArtifactRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        let mut deps: Vec<TargetHandle> = parent_directory(&self.path).into_iter().collect();
        deps.extend(self.object_targets.iter().cloned());
        Ok(deps)
    }

    fn recipe(&self) -> Option<Recipe> {
        let command = format!(
            "gcc {} -o {} {}",
            self.object_paths.iter().map(|path| path.display()).join(" "),
            self.path.display(),
            self.ldflags
        );
        Some(Box::new(move |context| {
            sh(&command, &context)?;
            Ok(None)
        }))
    }
}

/// Expands a compiled-artifact target's sources into per-source object file targets.
fn object_targets_for(
    cpp_paths: &[PathBuf],
    cxxflags: &str,
    object_path_for: &dyn Fn(&Path) -> PathBuf,
) -> (Vec<TargetHandle>, Vec<PathBuf>) {
    let mut object_targets = Vec::with_capacity(cpp_paths.len());
    let mut object_paths = Vec::with_capacity(cpp_paths.len());
    for cpp_path in cpp_paths {
        let object_path = object_path_for(cpp_path);
        let target: TargetHandle = Arc::new(ObjectFileTarget::new(
            object_path.clone(),
            cxxflags,
            cpp_path,
        ));
        object_targets.push(target);
        object_paths.push(object_path);
    }
    (object_targets, object_paths)
}

struct LinkedArtifactRuleFactory;

impl RuleFactory for LinkedArtifactRuleFactory {
    fn name(&self) -> &str {
        "LinkedArtifactRule"
    }

    fn matches(&self, target: &TargetHandle) -> bool {
        target.as_any().is::<LinkedArtifactTarget>()
    }

    fn instantiate(&self, target: TargetHandle) -> Arc<dyn Rule> {
        let artifact = target
            .as_any()
            .downcast_ref::<LinkedArtifactTarget>()
            .expect("matched a LinkedArtifactTarget");
        let path = artifact.path().to_path_buf();
        let ldflags = artifact.ldflags().to_owned();
        let object_path_for = artifact.object_path_for();
        let (object_targets, object_paths) = object_targets_for(
            artifact.cpp_paths(),
            artifact.cxxflags(),
            &*object_path_for,
        );
        Arc::new(LinkedArtifactRule {
            target,
            path,
            ldflags,
            object_targets,
            object_paths,
        })
    }
}

struct StaticLibraryRule {
    target: TargetHandle,
    path: PathBuf,
    object_targets: Vec<TargetHandle>,
    object_paths: Vec<PathBuf>,
}

impl Rule for StaticLibraryRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        let mut deps: Vec<TargetHandle> = parent_directory(&self.path).into_iter().collect();
        deps.extend(self.object_targets.iter().cloned());
        Ok(deps)
    }

    fn recipe(&self) -> Option<Recipe> {
        let command = format!(
            "ar rcs {} {}",
            self.path.display(),
            self.object_paths.iter().map(|path| path.display()).join(" ")
        );
        Some(Box::new(move |context| {
            sh(&command, &context)?;
            Ok(None)
        }))
    }
}

struct StaticLibraryRuleFactory;

impl RuleFactory for StaticLibraryRuleFactory {
    fn name(&self) -> &str {
        "StaticLibraryRule"
    }

    fn matches(&self, target: &TargetHandle) -> bool {
        target.as_any().is::<StaticLibraryTarget>()
    }

    fn instantiate(&self, target: TargetHandle) -> Arc<dyn Rule> {
        let library = target
            .as_any()
            .downcast_ref::<StaticLibraryTarget>()
            .expect("matched a StaticLibraryTarget");
        let path = library.path().to_path_buf();
        let object_path_for = library.object_path_for();
        let (object_targets, object_paths) =
            object_targets_for(library.cpp_paths(), library.cxxflags(), &*object_path_for);
        Arc::new(StaticLibraryRule {
            target,
            path,
            object_targets,
            object_paths,
        })
    }
}

struct ObjectFileRule {
    target: TargetHandle,
    path: PathBuf,
    cxxflags: String,
    cpp_path: PathBuf,
    discovered: DiscoveredHeaders,
}

impl Rule for ObjectFileRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        let mut deps: Vec<TargetHandle> = parent_directory(&self.path).into_iter().collect();
        deps.push(Arc::new(HeaderScanTarget::new(&self.cpp_path)));
        deps.push(Arc::new(SourceFileTarget::new(&self.cpp_path)));
        if let Some(headers) = self.discovered.lock().get(&self.cpp_path) {
            deps.extend(
                headers
                    .iter()
                    .map(|header| -> TargetHandle { Arc::new(SourceFileTarget::new(header)) }),
            );
        }
        Ok(deps)
    }

    fn recipe(&self) -> Option<Recipe> {
        let command = format!(
            "gcc -c {} -o {} {}",
            self.cpp_path.display(),
            self.path.display(),
            self.cxxflags
        );
        Some(Box::new(move |context| {
            sh(&command, &context)?;
            Ok(None)
        }))
    }
}

struct ObjectFileRuleFactory {
    discovered: DiscoveredHeaders,
}

impl RuleFactory for ObjectFileRuleFactory {
    fn name(&self) -> &str {
        "ObjectFileRule"
    }

    fn matches(&self, target: &TargetHandle) -> bool {
        target.as_any().is::<ObjectFileTarget>()
    }

    fn instantiate(&self, target: TargetHandle) -> Arc<dyn Rule> {
        let object = target
            .as_any()
            .downcast_ref::<ObjectFileTarget>()
            .expect("matched an ObjectFileTarget");
        let path = object.path().to_path_buf();
        let cxxflags = object.cxxflags().to_owned();
        let cpp_path = object.cpp_path().to_path_buf();
        Arc::new(ObjectFileRule {
            target,
            path,
            cxxflags,
            cpp_path,
            discovered: self.discovered.clone(),
        })
    }
}

struct HeaderScanRule {
    target: TargetHandle,
    cpp_path: PathBuf,
    discovered: DiscoveredHeaders,
}

impl Rule for HeaderScanRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        Ok(vec![Arc::new(SourceFileTarget::new(&self.cpp_path))])
    }

    fn recipe(&self) -> Option<Recipe> {
        let cpp_path = self.cpp_path.clone();
        Some(Box::new(move |context| {
            let stdout = sh_capture(&format!("gcc -MM {}", cpp_path.display()), &context)?;
            let scan = parse_object_file_make_deps(&stdout)?;
            let value: JobValue = Arc::new(scan);
            Ok(Some(value))
        }))
    }

    ///
    /// Records the discovered headers and re-expands every dependent object node so the new
    /// header dependencies are materialized before the object is dispatched.
    ///
    fn on_success(
        &self,
        session: &mut dyn BuildSession,
        entry: EntryId,
        value: Option<JobValue>,
    ) -> Result<(), ExpansionError> {
        if let Some(scan) = value
            .as_ref()
            .and_then(|value| value.downcast_ref::<ObjectFileDeps>())
        {
            let headers = scan.header_filenames.iter().map(PathBuf::from).collect();
            self.discovered.lock().insert(self.cpp_path.clone(), headers);
        }
        for predecessor in session.dep_graph().predecessors(entry) {
            session.expand(predecessor)?;
        }
        Ok(())
    }
}

struct HeaderScanRuleFactory {
    discovered: DiscoveredHeaders,
}

impl RuleFactory for HeaderScanRuleFactory {
    fn name(&self) -> &str {
        "HeaderScanRule"
    }

    fn matches(&self, target: &TargetHandle) -> bool {
        target.as_any().is::<HeaderScanTarget>()
    }

    fn instantiate(&self, target: TargetHandle) -> Arc<dyn Rule> {
        let scan = target
            .as_any()
            .downcast_ref::<HeaderScanTarget>()
            .expect("matched a HeaderScanTarget");
        let cpp_path = scan.cpp_path().to_path_buf();
        Arc::new(HeaderScanRule {
            target,
            cpp_path,
            discovered: self.discovered.clone(),
        })
    }
}

struct CppSourceRuleFactory;

impl RuleFactory for CppSourceRuleFactory {
    fn name(&self) -> &str {
        "CppSourceFileRule"
    }

    fn matches(&self, target: &TargetHandle) -> bool {
        target.as_any().is::<SourceFileTarget>()
    }

    fn instantiate(&self, target: TargetHandle) -> Arc<dyn Rule> {
        Arc::new(SourceRule::new(target))
    }
}
