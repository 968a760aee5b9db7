//! Turning a resolved unit into a concrete program invocation

use crate::config::{ArgumentStyle, LaunchSpec};
use crate::graph::ResolvedUnit;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Fully rendered invocation of one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitCommand {
    /// Program path or bare name looked up on PATH
    pub program: String,
    pub args: Vec<String>,
    pub env: IndexMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl UnitCommand {
    /// Program and arguments joined for display
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Locates executables and renders options for resolved units
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    project_root: PathBuf,
    package_prefixes: Vec<PathBuf>,
}

impl CommandBuilder {
    pub fn new(project_root: impl Into<PathBuf>, package_prefixes: Vec<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            package_prefixes,
        }
    }

    pub fn build(&self, unit: &ResolvedUnit) -> UnitCommand {
        let spec = &unit.spec;
        let mut args: Vec<String> = spec.arguments().to_vec();
        args.extend(render_options(spec));

        UnitCommand {
            program: self.locate(spec),
            args,
            env: unit.env.clone(),
            working_dir: spec.working_dir().map(Path::to_path_buf),
        }
    }

    /// Program lookup: explicit paths as given, then package install
    /// prefixes, then the cargo release directory, then PATH.
    fn locate(&self, spec: &LaunchSpec) -> String {
        let executable = spec.executable();
        if executable.contains(std::path::MAIN_SEPARATOR) || executable.contains('/') {
            return executable.to_string();
        }

        let Some(package) = spec.package() else {
            return executable.to_string();
        };

        self.package_prefixes
            .iter()
            .map(|prefix| prefix.join("lib").join(package).join(executable))
            .chain(std::iter::once(
                self.project_root.join("target/release").join(executable),
            ))
            .find(|candidate| candidate.is_file())
            .map(|found| found.to_string_lossy().into_owned())
            .unwrap_or_else(|| executable.to_string())
    }
}

/// Options, remappings and the instance name rendered per argument style
pub fn render_options(spec: &LaunchSpec) -> Vec<String> {
    let mut args = Vec::new();
    match spec.argument_style() {
        ArgumentStyle::Ros => {
            args.push("--ros-args".to_string());
            args.push("-r".to_string());
            args.push(format!("__node:={}", spec.name()));
            if let Some(ns) = spec.namespace() {
                args.push("-r".to_string());
                args.push(format!("__ns:=/{}", ns));
            }
            for remap in spec.remappings() {
                args.push("-r".to_string());
                args.push(format!("{}:={}", remap.from, remap.to));
            }
            for (key, value) in spec.options() {
                args.push("-p".to_string());
                args.push(format!("{}:={}", key, value));
            }
        }
        ArgumentStyle::Flags => {
            for remap in spec.remappings() {
                args.push("--remap".to_string());
                args.push(format!("{}:={}", remap.from, remap.to));
            }
            for (key, value) in spec.options() {
                args.push(format!("--{}", key));
                args.push(value.to_string());
            }
        }
    }
    args
}
