//! Launch file YAML schema definitions

use crate::config::descriptor::{
    ArgDefinition, ArgumentStyle, Condition, DescriptorError, Entry, IncludeSpec, LaunchGraph,
    LaunchSpec, OutputMode, ParamValue, RestartPolicy,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root launch file document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchFile {
    /// Launch file format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Argument definitions with defaults
    #[serde(default)]
    pub args: IndexMap<String, ArgDefinition>,

    /// Environment variables (applied to every unit of this graph and its includes)
    #[serde(default)]
    pub env: IndexMap<String, String>,

    /// Declarations in launch order
    #[serde(default)]
    pub launch: Vec<EntryConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// A single declaration: `- node: {...}` or `- include: {...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryConfig {
    Node(NodeConfig),
    Include(IncludeConfig),
}

/// Node configuration as written in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub package: Option<String>,

    #[serde(default)]
    pub executable: Option<String>,

    /// Instance name (defaults to the executable's file name)
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub output: OutputMode,

    /// Positional arguments passed verbatim
    #[serde(default)]
    pub arguments: Vec<String>,

    /// `[from, to]` pairs
    #[serde(default)]
    pub remappings: Vec<Vec<String>>,

    /// List of single- or multi-key maps, flattened in order
    #[serde(default)]
    pub parameters: Vec<IndexMap<String, ParamValue>>,

    #[serde(default)]
    pub env: IndexMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<String>,

    #[serde(default)]
    pub enabled: Condition,

    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub argument_style: ArgumentStyle,

    #[serde(default)]
    pub restart: RestartPolicy,

    #[serde(default)]
    pub respawn_delay_ms: Option<u64>,

    #[serde(default)]
    pub startup_delay_ms: Option<u64>,

    /// Stop waiting on the graph once this unit terminates
    #[serde(default)]
    pub required: bool,
}

/// Include configuration as written in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncludeConfig {
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default)]
    pub overlay: IndexMap<String, ParamValue>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub enabled: Condition,
}

impl NodeConfig {
    /// Build the immutable descriptor; `index` is the position in the file
    pub fn to_spec(&self, index: usize) -> Result<LaunchSpec, DescriptorError> {
        let executable = self.executable.clone().ok_or_else(|| {
            DescriptorError::malformed(
                self.context(index),
                "'executable' is required",
            )
        })?;

        let mut builder = LaunchSpec::builder(executable)
            .output(self.output)
            .arguments(self.arguments.iter().cloned())
            .enabled(self.enabled.clone())
            .argument_style(self.argument_style)
            .restart(self.restart)
            .required(self.required);

        if let Some(package) = &self.package {
            builder = builder.package(package.clone());
        }
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Some(ns) = &self.namespace {
            builder = builder.namespace(ns.clone());
        }
        if let Some(dir) = &self.working_dir {
            builder = builder.working_dir(dir.clone());
        }
        if let Some(group) = &self.group {
            builder = builder.group(group.clone());
        }
        if let Some(delay) = self.respawn_delay_ms {
            builder = builder.respawn_delay_ms(delay);
        }
        if let Some(delay) = self.startup_delay_ms {
            builder = builder.startup_delay_ms(delay);
        }

        for pair in &self.remappings {
            match pair.as_slice() {
                [from, to] => builder = builder.remap(from.clone(), to.clone()),
                _ => {
                    return Err(DescriptorError::malformed(
                        self.context(index),
                        format!(
                            "remapping must be a [from, to] pair, got {} element(s)",
                            pair.len()
                        ),
                    ))
                }
            }
        }

        for map in &self.parameters {
            for (key, value) in map {
                builder = builder.option(key.clone(), value.clone());
            }
        }

        for (key, value) in &self.env {
            builder = builder.env(key.clone(), value.clone());
        }

        builder.build()
    }

    fn context(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("node '{}'", name),
            None => format!("launch entry #{}", index),
        }
    }
}

impl IncludeConfig {
    pub fn to_spec(&self, index: usize) -> Result<IncludeSpec, DescriptorError> {
        let file = self.file.clone().ok_or_else(|| {
            DescriptorError::malformed(
                format!("include at launch entry #{}", index),
                "'file' is required",
            )
        })?;

        let mut spec = IncludeSpec::new(file)?.with_enabled(self.enabled.clone());
        for (key, value) in &self.overlay {
            spec = spec.with_overlay(key.clone(), value.clone());
        }
        if let Some(ns) = &self.namespace {
            spec = spec.with_namespace(ns.clone());
        }
        Ok(spec)
    }
}

impl LaunchFile {
    /// Load launch file from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LaunchFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| LaunchFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse launch file from YAML string
    pub fn from_yaml(content: &str) -> Result<Self, LaunchFileError> {
        let launch_file: LaunchFile = serde_yaml::from_str(content)?;
        Ok(launch_file)
    }

    /// Build the descriptor model for this document
    pub fn to_graph(&self) -> Result<LaunchGraph, LaunchFileError> {
        let mut entries = Vec::with_capacity(self.launch.len());
        for (index, entry) in self.launch.iter().enumerate() {
            let entry = match entry {
                EntryConfig::Node(node) => Entry::Unit(node.to_spec(index)?),
                EntryConfig::Include(include) => Entry::Include(include.to_spec(index)?),
            };
            entries.push(entry);
        }

        Ok(LaunchGraph {
            version: self.version.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            entries,
        })
    }
}

impl LaunchGraph {
    /// Parse and build a graph from YAML in one step
    pub fn from_yaml(content: &str) -> Result<Self, LaunchFileError> {
        LaunchFile::from_yaml(content)?.to_graph()
    }
}

/// Errors that can occur when loading a launch file
#[derive(Debug, thiserror::Error)]
pub enum LaunchFileError {
    #[error("Failed to read launch file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse launch file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Launch graph not found: {0}")]
    NotFound(String),
}
