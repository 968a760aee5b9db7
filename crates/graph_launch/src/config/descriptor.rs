//! Immutable descriptors for launchable units and sub-graph includes

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Option and overlay values can be strings, booleans, or numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    /// Parse a command-line string into the narrowest matching value
    pub fn parse_loose(s: &str) -> Self {
        if s.eq_ignore_ascii_case("true") {
            return ParamValue::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return ParamValue::Bool(false);
        }
        if let Ok(i) = s.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return ParamValue::Float(f);
        }
        ParamValue::String(s.to_string())
    }

    /// Check if value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            ParamValue::Bool(b) => *b,
            ParamValue::Int(i) => *i != 0,
            ParamValue::Float(f) => *f != 0.0,
            ParamValue::String(s) => {
                !s.is_empty()
                    && !s.eq_ignore_ascii_case("false")
                    && !s.eq_ignore_ascii_case("0")
                    && !s.eq_ignore_ascii_case("no")
            }
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

/// Where a unit's stdout/stderr go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Forward output lines to the launcher log
    Screen,
    /// Append output to `<log_dir>/<unit>.log`
    #[default]
    Log,
    /// Forward and append
    Both,
}

/// How options and remappings are rendered on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentStyle {
    /// `--ros-args -r from:=to -p key:=value`
    #[default]
    Ros,
    /// `--remap from:=to --key value`
    Flags,
}

/// Restart policy for a unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart (default)
    #[default]
    Never,
    /// Always restart on exit
    Always,
    /// Only restart on abnormal exit
    OnFailure,
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestartPolicy::Never => "never",
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
        })
    }
}

/// Enabled condition: a literal boolean or a substitution expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Literal(bool),
    Expr(String),
}

impl Default for Condition {
    fn default() -> Self {
        Condition::Literal(true)
    }
}

/// A topic or parameter name remapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapping {
    pub from: String,
    pub to: String,
}

/// Description of one launchable unit
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub(crate) package: Option<String>,
    pub(crate) executable: String,
    pub(crate) name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) output: OutputMode,
    pub(crate) remappings: Vec<Remapping>,
    pub(crate) options: Vec<(String, ParamValue)>,
    pub(crate) arguments: Vec<String>,
    pub(crate) env: IndexMap<String, String>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) enabled: Condition,
    pub(crate) group: Option<String>,
    pub(crate) argument_style: ArgumentStyle,
    pub(crate) restart: RestartPolicy,
    pub(crate) respawn_delay_ms: Option<u64>,
    pub(crate) startup_delay_ms: Option<u64>,
    pub(crate) required: bool,
}

impl LaunchSpec {
    /// Start a descriptor for `executable`; see [`LaunchSpecBuilder`]
    pub fn builder(executable: impl Into<String>) -> LaunchSpecBuilder {
        LaunchSpecBuilder::new(executable)
    }

    /// Package the executable is installed under, if any
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Executable name or path
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Unit name, defaulting to the executable's file name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Name including the namespace, e.g. `camera/driver`
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    /// Where stdout and stderr go
    pub fn output(&self) -> OutputMode {
        self.output
    }

    /// Topic remappings in declaration order
    pub fn remappings(&self) -> &[Remapping] {
        &self.remappings
    }

    /// Configuration options in declaration order
    pub fn options(&self) -> &[(String, ParamValue)] {
        &self.options
    }

    /// Value of a single option
    pub fn option(&self, key: &str) -> Option<&ParamValue> {
        self.options.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Raw arguments, passed before any rendered options
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Environment set on this unit only
    pub fn env(&self) -> &IndexMap<String, String> {
        &self.env
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Condition evaluated at resolve time; false drops the unit
    pub fn enabled(&self) -> &Condition {
        &self.enabled
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// How options and remappings are rendered on the command line
    pub fn argument_style(&self) -> ArgumentStyle {
        self.argument_style
    }

    pub fn restart(&self) -> RestartPolicy {
        self.restart
    }

    /// Per-unit respawn delay, overriding the supervisor default
    pub fn respawn_delay_ms(&self) -> Option<u64> {
        self.respawn_delay_ms
    }

    /// Delay between `start` and this unit's spawn
    pub fn startup_delay_ms(&self) -> Option<u64> {
        self.startup_delay_ms
    }

    /// Whether this unit ending should end the whole launch
    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// Builder for [`LaunchSpec`]; `build` performs the structural checks
#[derive(Debug, Clone)]
pub struct LaunchSpecBuilder {
    spec: LaunchSpec,
    name_set: bool,
}

impl LaunchSpecBuilder {
    fn new(executable: impl Into<String>) -> Self {
        Self {
            spec: LaunchSpec {
                package: None,
                executable: executable.into(),
                name: String::new(),
                namespace: None,
                output: OutputMode::default(),
                remappings: Vec::new(),
                options: Vec::new(),
                arguments: Vec::new(),
                env: IndexMap::new(),
                working_dir: None,
                enabled: Condition::default(),
                group: None,
                argument_style: ArgumentStyle::default(),
                restart: RestartPolicy::default(),
                respawn_delay_ms: None,
                startup_delay_ms: None,
                required: false,
            },
            name_set: false,
        }
    }

    /// Look the executable up under this package's install prefix
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.spec.package = Some(package.into());
        self
    }

    /// Override the default unit name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.spec.name = name.into();
        self.name_set = true;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.spec.namespace = Some(namespace.into());
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.spec.output = output;
        self
    }

    /// Add a `from:=to` remapping
    pub fn remap(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.spec.remappings.push(Remapping {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Append an option. A repeated key replaces the earlier value in place.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.spec.options.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.spec.options.push((key, value)),
        }
        self
    }

    pub fn argument(mut self, arg: impl Into<String>) -> Self {
        self.spec.arguments.push(arg.into());
        self
    }

    /// Append raw arguments in order
    pub fn arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a unit environment variable; later values win
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.working_dir = Some(dir.into());
        self
    }

    pub fn enabled(mut self, condition: Condition) -> Self {
        self.spec.enabled = condition;
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.spec.group = Some(group.into());
        self
    }

    pub fn argument_style(mut self, style: ArgumentStyle) -> Self {
        self.spec.argument_style = style;
        self
    }

    /// What the supervisor does when the process ends on its own
    pub fn restart(mut self, policy: RestartPolicy) -> Self {
        self.spec.restart = policy;
        self
    }

    pub fn respawn_delay_ms(mut self, delay: u64) -> Self {
        self.spec.respawn_delay_ms = Some(delay);
        self
    }

    pub fn startup_delay_ms(mut self, delay: u64) -> Self {
        self.spec.startup_delay_ms = Some(delay);
        self
    }

    /// Mark the unit as required; see [`LaunchSpec::is_required`]
    pub fn required(mut self, required: bool) -> Self {
        self.spec.required = required;
        self
    }

    /// Check the descriptor and fill in the default name.
    ///
    /// Fails with [`DescriptorError::MalformedDescriptor`] on an empty
    /// executable, package, name, remapping side or option key.
    pub fn build(mut self) -> Result<LaunchSpec, DescriptorError> {
        let context = if self.name_set {
            format!("node '{}'", self.spec.name)
        } else {
            format!("node with executable '{}'", self.spec.executable)
        };

        if self.spec.executable.trim().is_empty() {
            return Err(DescriptorError::malformed(context, "'executable' is required"));
        }
        if matches!(&self.spec.package, Some(p) if p.trim().is_empty()) {
            return Err(DescriptorError::malformed(context, "'package' must not be empty"));
        }
        if !self.name_set {
            // ROS convention: an unnamed node is named after its executable
            self.spec.name = Path::new(&self.spec.executable)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.spec.executable.clone());
        }
        if self.spec.name.trim().is_empty() {
            return Err(DescriptorError::malformed(context, "'name' must not be empty"));
        }
        if let Some(r) = self
            .spec
            .remappings
            .iter()
            .find(|r| r.from.is_empty() || r.to.is_empty())
        {
            return Err(DescriptorError::malformed(
                context,
                format!("remapping '{}' -> '{}' has an empty side", r.from, r.to),
            ));
        }
        if self.spec.options.iter().any(|(k, _)| k.is_empty()) {
            return Err(DescriptorError::malformed(context, "option keys must not be empty"));
        }

        Ok(self.spec)
    }
}

/// Reference to another launch graph plus the overlay applied to it
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeSpec {
    pub(crate) source: String,
    pub(crate) overlay: IndexMap<String, ParamValue>,
    pub(crate) namespace: Option<String>,
    pub(crate) enabled: Condition,
}

impl IncludeSpec {
    /// Include of `source`, which must not be empty
    pub fn new(source: impl Into<String>) -> Result<Self, DescriptorError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(DescriptorError::malformed("include", "'file' is required"));
        }
        Ok(Self {
            source,
            overlay: IndexMap::new(),
            namespace: None,
            enabled: Condition::default(),
        })
    }

    /// Override option `key` in the included units; a matching declared
    /// argument of the included graph is bound too
    pub fn with_overlay(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.overlay.insert(key.into(), value.into());
        self
    }

    /// Prefix the included units' namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_enabled(mut self, condition: Condition) -> Self {
        self.enabled = condition;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn overlay(&self) -> &IndexMap<String, ParamValue> {
        &self.overlay
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn enabled(&self) -> &Condition {
        &self.enabled
    }
}

/// One declaration in a launch graph
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Unit(LaunchSpec),
    Include(IncludeSpec),
}

impl From<LaunchSpec> for Entry {
    fn from(spec: LaunchSpec) -> Self {
        Entry::Unit(spec)
    }
}

impl From<IncludeSpec> for Entry {
    fn from(spec: IncludeSpec) -> Self {
        Entry::Include(spec)
    }
}

/// Declared launch argument
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArgDefinition {
    /// Default value; an argument without one must be provided
    #[serde(default)]
    pub default: Option<ParamValue>,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// One launch document: declared args, environment and ordered entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchGraph {
    pub version: String,
    pub args: IndexMap<String, ArgDefinition>,
    pub env: IndexMap<String, String>,
    pub entries: Vec<Entry>,
}

impl LaunchGraph {
    pub fn new() -> Self {
        Self {
            version: "1.0".to_string(),
            ..Default::default()
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, default: Option<ParamValue>) -> Self {
        self.args.insert(
            name.into(),
            ArgDefinition {
                default,
                description: None,
            },
        );
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_entry(mut self, entry: impl Into<Entry>) -> Self {
        self.entries.push(entry.into());
        self
    }

    /// All unique group names declared directly in this graph
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .entries
            .iter()
            .filter_map(|e| match e {
                Entry::Unit(spec) => spec.group.clone(),
                Entry::Include(_) => None,
            })
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }

    pub fn unit_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, Entry::Unit(_)))
            .count()
    }

    pub fn include_count(&self) -> usize {
        self.entries.len() - self.unit_count()
    }
}

/// Structural errors raised while building descriptors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("Malformed descriptor ({context}): {reason}")]
    MalformedDescriptor { context: String, reason: String },
}

impl DescriptorError {
    pub(crate) fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        DescriptorError::MalformedDescriptor {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
