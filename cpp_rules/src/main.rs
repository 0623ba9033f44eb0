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

//! The demo build script: compiles and links every `.cpp` under `src/` into one artifact per
//! requested build mode, the way a user script drives the executor.

use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use cpp_rules::{cpp_ruleset, LinkedArtifactTarget};
use forge::{
    GraphExecutor, Recipe, Rule, RuleFactory, Stamp, Target, TargetHandle, TargetId,
};

const SRC_DIR: &str = "src";
const BUILD_DIR: &str = "build";
const ARTIFACT_FILENAME: &str = "app";

const CXXFLAGS_COMMON: &str = "-Wall -Werror";
const LDFLAGS: &str = "-lstdc++";

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum BuildMode {
    Release,
    Debug,
}

impl BuildMode {
    fn dirname(self) -> &'static str {
        match self {
            BuildMode::Release => "release",
            BuildMode::Debug => "debug",
        }
    }

    fn cxxflags(self) -> String {
        match self {
            BuildMode::Release => format!("{CXXFLAGS_COMMON} -O2 -flto -march=native"),
            BuildMode::Debug => format!("{CXXFLAGS_COMMON} -O0 -g3"),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dirname())
    }
}

/// The phony root for one build mode.
struct BuildModeTarget {
    id: TargetId,
    mode: BuildMode,
}

impl BuildModeTarget {
    fn new(mode: BuildMode) -> BuildModeTarget {
        let id = TargetId::builder("BuildModeTarget")
            .attr("mode", mode.dirname())
            .build();
        BuildModeTarget { id, mode }
    }
}

impl Target for BuildModeTarget {
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

struct BuildModeRule {
    target: TargetHandle,
    mode: BuildMode,
    cpp_paths: Vec<PathBuf>,
}

impl Rule for BuildModeRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        let mode_build_dir = Path::new(BUILD_DIR).join(self.mode.dirname());
        let object_dir = mode_build_dir.clone();
        let artifact: TargetHandle = Arc::new(LinkedArtifactTarget::new(
            mode_build_dir.join(ARTIFACT_FILENAME),
            &self.mode.cxxflags(),
            LDFLAGS,
            self.cpp_paths.clone(),
            move |cpp: &Path| {
                let object = cpp.with_extension("o");
                let relative = object.strip_prefix(SRC_DIR).unwrap_or(&object);
                object_dir.join(relative)
            },
        ));
        Ok(vec![artifact])
    }

    fn has_recipe(&self) -> bool {
        false
    }

    fn recipe(&self) -> Option<Recipe> {
        None
    }
}

struct BuildModeRuleFactory {
    cpp_paths: Vec<PathBuf>,
}

impl RuleFactory for BuildModeRuleFactory {
    fn name(&self) -> &str {
        "BuildModeRule"
    }

    fn matches(&self, target: &TargetHandle) -> bool {
        target.as_any().is::<BuildModeTarget>()
    }

    fn instantiate(&self, target: TargetHandle) -> Arc<dyn Rule> {
        let mode = target
            .as_any()
            .downcast_ref::<BuildModeTarget>()
            .expect("matched a BuildModeTarget")
            .mode;
        Arc::new(BuildModeRule {
            target,
            mode,
            cpp_paths: self.cpp_paths.clone(),
        })
    }
}

#[derive(Parser)]
#[command(
    name = "cpp_build",
    about = "Builds the C++ tree under ./src with the graph executor"
)]
struct Args {
    /// Build modes to produce.
    #[arg(value_enum, default_values_t = [BuildMode::Release])]
    targets: Vec<BuildMode>,

    /// Number of worker threads.
    #[arg(short = 'j', long = "jobs", default_value_t = NonZeroUsize::MIN)]
    jobs: NonZeroUsize,
}

fn cpp_sources() -> Vec<PathBuf> {
    glob::glob(&format!("{SRC_DIR}/**/*.cpp"))
        .expect("The source glob is well-formed")
        .filter_map(Result::ok)
        .collect()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let working_dir = std::env::current_dir().expect("The working directory is accessible");
    let mut builder = cpp_ruleset();
    builder.factory(Arc::new(BuildModeRuleFactory {
        cpp_paths: cpp_sources(),
    }));

    let mut executor = GraphExecutor::new(builder.build(), args.jobs.get(), working_dir);
    let roots: Vec<TargetHandle> = args
        .targets
        .iter()
        .map(|&mode| -> TargetHandle { Arc::new(BuildModeTarget::new(mode)) })
        .collect();

    match executor.build(roots) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
