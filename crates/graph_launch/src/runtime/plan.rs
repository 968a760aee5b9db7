//! Dry-run launch plan

use crate::config::RestartPolicy;
use crate::graph::ResolvedGraph;
use crate::runtime::command::{CommandBuilder, UnitCommand};
use indexmap::IndexMap;
use serde::Serialize;

/// What `start` would do for a resolved graph
#[derive(Debug, Clone, Serialize)]
pub struct LaunchPlan {
    /// Units in launch order
    pub units: Vec<LaunchPlanUnit>,
    /// Resolved root arguments
    pub args: IndexMap<String, String>,
    /// Launch graphs that were loaded
    pub sources: Vec<String>,
}

/// A unit in the launch plan
#[derive(Debug, Clone, Serialize)]
pub struct LaunchPlanUnit {
    pub name: String,
    pub command: UnitCommand,
    pub group: Option<String>,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_delay_ms: Option<u64>,
    pub restart: RestartPolicy,
    pub required: bool,
}

impl LaunchPlan {
    pub fn build(graph: &ResolvedGraph, commands: &CommandBuilder) -> Self {
        let units = graph
            .launch_order()
            .map(|unit| LaunchPlanUnit {
                name: unit.key(),
                command: commands.build(unit),
                group: unit.spec.group().map(str::to_string),
                origin: unit.origin.clone(),
                startup_delay_ms: unit.spec.startup_delay_ms(),
                restart: unit.spec.restart(),
                required: unit.spec.is_required(),
            })
            .collect();

        Self {
            units,
            args: graph.args().clone(),
            sources: graph.sources().to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for LaunchPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Launch Plan")?;
        writeln!(f, "===========")?;
        writeln!(f)?;

        if !self.sources.is_empty() {
            writeln!(f, "Sources:")?;
            for source in &self.sources {
                writeln!(f, "  {}", source)?;
            }
            writeln!(f)?;
        }

        if !self.args.is_empty() {
            writeln!(f, "Arguments:")?;
            for (key, value) in &self.args {
                writeln!(f, "  {}: {}", key, value)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Units (in launch order):")?;
        for (i, unit) in self.units.iter().enumerate() {
            writeln!(f)?;
            writeln!(
                f,
                "  {}. {}{}",
                i + 1,
                unit.name,
                unit.group
                    .as_ref()
                    .map(|g| format!(" [{}]", g))
                    .unwrap_or_default()
            )?;
            writeln!(f, "     Command: {}", unit.command.command_line())?;

            if let Some(dir) = &unit.command.working_dir {
                writeln!(f, "     Working dir: {}", dir.display())?;
            }

            if let Some(delay) = unit.startup_delay_ms {
                writeln!(f, "     Startup delay: {}ms", delay)?;
            }

            if unit.restart != RestartPolicy::Never {
                writeln!(f, "     Restart: {}", unit.restart)?;
            }

            if unit.required {
                writeln!(f, "     Required: yes")?;
            }

            if !unit.command.env.is_empty() {
                writeln!(f, "     Environment:")?;
                for (key, value) in &unit.command.env {
                    writeln!(f, "       {}={}", key, value)?;
                }
            }
        }

        Ok(())
    }
}
