//! Command-line interface for graph_launch

use crate::graph::ResolveOptions;
use crate::runtime::{ament_prefixes, default_log_dir, FailurePolicy, SupervisorConfig};
use argh::FromArgs;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Launch a graph of processes described in a YAML launch file
#[derive(FromArgs, Debug)]
pub struct LaunchArgs {
    /// path to the launch file (default: launch/camera_odometry.launch.yaml)
    #[argh(
        positional,
        default = "String::from(\"launch/camera_odometry.launch.yaml\")"
    )]
    pub launch_file: String,

    /// override launch arguments (format: key:=value)
    #[argh(option, short = 'a', from_str_fn(parse_arg_override))]
    pub arg: Vec<(String, String)>,

    /// only launch units in these groups (comma-separated)
    #[argh(option, short = 'g', from_str_fn(parse_groups))]
    pub groups: Option<Vec<String>>,

    /// explicitly enable these units (comma-separated)
    #[argh(option, from_str_fn(parse_units))]
    pub enable: Option<Vec<String>>,

    /// explicitly disable these units (comma-separated)
    #[argh(option, from_str_fn(parse_units))]
    pub disable: Option<Vec<String>>,

    /// package install prefix to search (default: AMENT_PREFIX_PATH)
    #[argh(option)]
    pub prefix: Vec<PathBuf>,

    /// directory for unit log files (default: ~/.graph_launch/log)
    #[argh(option)]
    pub log_dir: Option<PathBuf>,

    /// seconds between SIGTERM and SIGKILL on shutdown
    #[argh(option, default = "5")]
    pub grace_secs: u64,

    /// what to do when a unit fails: report or shutdown
    #[argh(option, default = "FailurePolicy::Report")]
    pub on_failure: FailurePolicy,

    /// show launch plan without executing
    #[argh(switch)]
    pub dry_run: bool,

    /// print the launch plan as JSON (with --dry-run)
    #[argh(switch)]
    pub json: bool,

    /// validate launch file and exit
    #[argh(switch)]
    pub validate: bool,

    /// log level (error, warn, info, debug, trace)
    #[argh(option, short = 'l', default = "String::from(\"info\")")]
    pub log_level: String,
}

/// Parse argument override in format "key:=value"
fn parse_arg_override(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, ":=").collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!(
            "Invalid argument format '{}'. Expected 'key:=value'",
            s
        ));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Parse comma-separated group list
fn parse_groups(s: &str) -> Result<Vec<String>, String> {
    Ok(split_list(s))
}

/// Parse comma-separated unit list
fn parse_units(s: &str) -> Result<Vec<String>, String> {
    Ok(split_list(s))
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

impl LaunchArgs {
    /// Argument overrides in command-line order; later values win
    pub fn arg_overrides(&self) -> IndexMap<String, String> {
        self.arg.iter().cloned().collect()
    }

    fn package_prefixes(&self) -> Vec<PathBuf> {
        if self.prefix.is_empty() {
            ament_prefixes()
        } else {
            self.prefix.clone()
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        let as_set = |units: &Option<Vec<String>>| -> HashSet<String> {
            units.iter().flatten().cloned().collect()
        };

        ResolveOptions {
            arg_overrides: self.arg_overrides(),
            include_groups: self
                .groups
                .as_ref()
                .map(|g| g.iter().cloned().collect()),
            enable_units: as_set(&self.enable),
            disable_units: as_set(&self.disable),
            package_prefixes: self.package_prefixes(),
        }
    }

    pub fn supervisor_config(&self, project_root: PathBuf) -> SupervisorConfig {
        SupervisorConfig {
            project_root,
            grace_period: Duration::from_secs(self.grace_secs),
            package_prefixes: self.package_prefixes(),
            log_dir: self.log_dir.clone().unwrap_or_else(default_log_dir),
            failure_policy: self.on_failure,
            ..SupervisorConfig::default()
        }
    }
}
