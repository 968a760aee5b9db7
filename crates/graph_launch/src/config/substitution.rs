//! Substitution engine for `$(arg)`, `$(env)`, `$(pkg_share)`, `$(timestamp)` patterns

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Regex for matching substitution patterns: $(type value) or $(type)
static SUBSTITUTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\((\w+)\s+([^)]+)\)|\$\((\w+)\)").unwrap());

/// Nested substitutions are expanded at most this many times
const MAX_PASSES: usize = 10;

/// Variables visible while resolving one launch graph
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext {
    /// Launch arguments in scope for the current graph
    pub args: IndexMap<String, String>,
    /// Effective launch environment, consulted before the process environment
    pub env: IndexMap<String, String>,
    /// Install prefixes searched by `pkg_share` / `pkg_prefix`
    pub package_prefixes: Vec<PathBuf>,
    /// Directory of the graph being resolved, for `$(dirname)`
    pub base_dir: Option<PathBuf>,
}

impl SubstitutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_package_prefixes(mut self, prefixes: Vec<PathBuf>) -> Self {
        self.package_prefixes = prefixes;
        self
    }

    pub fn with_base_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base_dir = dir;
        self
    }

    /// Substitute all patterns in a string
    pub fn substitute(&self, input: &str) -> Result<String, SubstitutionError> {
        let mut current = input.to_string();

        for _ in 0..MAX_PASSES {
            if !SUBSTITUTION_PATTERN.is_match(&current) {
                return Ok(current);
            }
            current = self.substitute_once(&current)?;
        }

        if SUBSTITUTION_PATTERN.is_match(&current) {
            return Err(SubstitutionError::MaxIterationsExceeded(input.to_string()));
        }
        Ok(current)
    }

    /// Perform a single pass of substitution
    fn substitute_once(&self, input: &str) -> Result<String, SubstitutionError> {
        let mut error: Option<SubstitutionError> = None;

        let result = SUBSTITUTION_PATTERN.replace_all(input, |caps: &Captures| {
            if error.is_some() {
                return String::new();
            }
            match self.resolve_capture(caps) {
                Ok(value) => value,
                Err(e) => {
                    error = Some(e);
                    String::new()
                }
            }
        });

        match error {
            Some(e) => Err(e),
            None => Ok(result.into_owned()),
        }
    }

    fn resolve_capture(&self, caps: &Captures) -> Result<String, SubstitutionError> {
        if let (Some(kind), Some(value)) = (caps.get(1), caps.get(2)) {
            return self.resolve_typed(kind.as_str(), value.as_str().trim());
        }
        if let Some(kind) = caps.get(3) {
            return self.resolve_typed(kind.as_str(), "");
        }
        Err(SubstitutionError::InvalidPattern(
            caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default(),
        ))
    }

    fn resolve_typed(&self, kind: &str, value: &str) -> Result<String, SubstitutionError> {
        match kind {
            "arg" => self
                .args
                .get(value)
                .cloned()
                .ok_or_else(|| SubstitutionError::UndefinedArg(value.to_string())),
            "env" => self.resolve_env(value),
            "pkg_prefix" => self.find_package(value).map(|p| p.display().to_string()),
            "pkg_share" => self
                .find_package(value)
                .map(|p| p.join("share").join(value).display().to_string()),
            "dirname" => Ok(self
                .base_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| ".".to_string())),
            "timestamp" => Ok(format_now(value, "%Y%m%d_%H%M%S")),
            "date" => Ok(format_now(value, "%Y-%m-%d")),
            _ => Err(SubstitutionError::UnknownType(kind.to_string())),
        }
    }

    fn resolve_env(&self, name: &str) -> Result<String, SubstitutionError> {
        if let Some(value) = self.env.get(name) {
            return Ok(value.clone());
        }
        std::env::var(name).map_err(|_| SubstitutionError::UndefinedEnv(name.to_string()))
    }

    /// First prefix that contains `share/<package>`
    fn find_package(&self, package: &str) -> Result<PathBuf, SubstitutionError> {
        if package.is_empty() {
            return Err(SubstitutionError::InvalidPattern("$(pkg_share)".to_string()));
        }
        self.package_prefixes
            .iter()
            .find(|prefix| prefix.join("share").join(package).is_dir())
            .cloned()
            .ok_or_else(|| SubstitutionError::UnknownPackage(package.to_string()))
    }
}

fn format_now(format: &str, default: &str) -> String {
    let now = chrono::Local::now();
    if format.is_empty() {
        now.format(default).to_string()
    } else {
        now.format(format).to_string()
    }
}

/// Errors that can occur during substitution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionError {
    #[error("Unknown substitution type: {0}")]
    UnknownType(String),

    #[error("Undefined argument: {0}")]
    UndefinedArg(String),

    #[error("Undefined environment variable: {0}")]
    UndefinedEnv(String),

    #[error("Package not found in any prefix: {0}")]
    UnknownPackage(String),

    #[error("Invalid substitution pattern: {0}")]
    InvalidPattern(String),

    #[error("Maximum substitution iterations exceeded for: {0}")]
    MaxIterationsExceeded(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_substitution() {
        let ctx = SubstitutionContext::new().with_arg("frame", "base_link");
        assert_eq!(ctx.substitute("$(arg frame)").unwrap(), "base_link");
    }

    #[test]
    fn test_env_prefers_launch_env() {
        let ctx = SubstitutionContext::new().with_env("PATH", "/launch/bin");
        assert_eq!(ctx.substitute("$(env PATH)").unwrap(), "/launch/bin");
    }

    #[test]
    fn test_undefined_env() {
        let ctx = SubstitutionContext::new();
        let result = ctx.substitute("$(env GRAPH_LAUNCH_SURELY_UNSET_VARIABLE)");
        assert!(matches!(result, Err(SubstitutionError::UndefinedEnv(_))));
    }

    #[test]
    fn test_timestamp_substitution() {
        let ctx = SubstitutionContext::new();
        let result = ctx.substitute("odom_$(timestamp).db").unwrap();
        assert!(result.starts_with("odom_"));
        assert!(result.ends_with(".db"));
        assert_eq!(result.len(), "odom_".len() + 15 + ".db".len());
    }

    #[test]
    fn test_nested_substitution() {
        let ctx = SubstitutionContext::new()
            .with_arg("outer", "$(arg inner)")
            .with_arg("inner", "resolved");
        assert_eq!(ctx.substitute("$(arg outer)").unwrap(), "resolved");
    }

    #[test]
    fn test_self_referencing_arg_is_bounded() {
        let ctx = SubstitutionContext::new().with_arg("loop", "x$(arg loop)");
        assert!(matches!(
            ctx.substitute("$(arg loop)"),
            Err(SubstitutionError::MaxIterationsExceeded(_))
        ));
    }

    #[test]
    fn test_unknown_type() {
        let ctx = SubstitutionContext::new();
        assert_eq!(
            ctx.substitute("$(find realsense2_camera)"),
            Err(SubstitutionError::UnknownType("find".to_string()))
        );
    }

    #[test]
    fn test_pkg_share_lookup() {
        let prefix = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(prefix.path().join("share/realsense2_camera")).unwrap();

        let ctx = SubstitutionContext::new()
            .with_package_prefixes(vec![PathBuf::from("/nonexistent"), prefix.path().into()]);
        let share = ctx.substitute("$(pkg_share realsense2_camera)/launch").unwrap();
        assert_eq!(
            share,
            format!("{}/share/realsense2_camera/launch", prefix.path().display())
        );

        assert!(matches!(
            ctx.substitute("$(pkg_share missing_pkg)"),
            Err(SubstitutionError::UnknownPackage(_))
        ));
    }

    #[test]
    fn test_dirname() {
        let ctx = SubstitutionContext::new().with_base_dir(Some(PathBuf::from("/opt/launch")));
        assert_eq!(ctx.substitute("$(dirname)/rs.yaml").unwrap(), "/opt/launch/rs.yaml");
    }

    #[test]
    fn test_no_substitution_needed() {
        let ctx = SubstitutionContext::new();
        assert_eq!(ctx.substitute("plain string").unwrap(), "plain string");
    }
}
