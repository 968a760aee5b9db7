//! Include expansion, overlay application and graph flattening

use crate::config::{
    Condition, Entry, IncludeSpec, LaunchFileError, LaunchSpec, ParamValue, Remapping,
    SubstitutionContext, SubstitutionError,
};
use crate::graph::loader::{GraphLoader, LoadedGraph};
use crate::graph::resolved::{ResolvedGraph, ResolvedUnit};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::PathBuf;

/// Knobs applied while resolving
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Root argument overrides (`-a key:=value`)
    pub arg_overrides: IndexMap<String, String>,
    /// Groups to include (None = all groups)
    pub include_groups: Option<HashSet<String>>,
    /// Units to enable regardless of their condition
    pub enable_units: HashSet<String>,
    /// Units to drop
    pub disable_units: HashSet<String>,
    /// Install prefixes for `$(pkg_share)` / `$(pkg_prefix)`
    pub package_prefixes: Vec<PathBuf>,
}

/// Merge an overlay into an option list. Colliding keys take the overlay
/// value and keep their position; new keys are appended in overlay order.
pub fn apply_overlay(
    options: &[(String, ParamValue)],
    overlay: &IndexMap<String, ParamValue>,
) -> Vec<(String, ParamValue)> {
    let mut merged: Vec<(String, ParamValue)> = options
        .iter()
        .map(|(key, value)| {
            let value = overlay.get(key).unwrap_or(value).clone();
            (key.clone(), value)
        })
        .collect();

    for (key, value) in overlay {
        if !options.iter().any(|(existing, _)| existing == key) {
            merged.push((key.clone(), value.clone()));
        }
    }
    merged
}

/// Include bookkeeping for one resolution
#[derive(Debug, Default)]
struct Walk {
    /// Graphs currently being expanded, root first
    stack: Vec<String>,
    /// Every graph loaded, in load order
    sources: Vec<String>,
}

/// Expands a root graph into a [`ResolvedGraph`]
pub struct Resolver<L> {
    loader: L,
    options: ResolveOptions,
}

impl<L: GraphLoader> Resolver<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Load the root graph through the loader and resolve it
    pub fn resolve_source(&self, source: &str) -> Result<ResolvedGraph, ResolveError> {
        let root = self
            .loader
            .load(source, None)
            .map_err(|error| ResolveError::Load {
                reference: source.to_string(),
                error,
            })?;
        self.resolve(&root)
    }

    pub fn resolve(&self, root: &LoadedGraph) -> Result<ResolvedGraph, ResolveError> {
        for name in self.options.arg_overrides.keys() {
            if !root.graph.args.contains_key(name) {
                return Err(ResolveError::UnknownArgument(name.clone()));
            }
        }

        let mut walk = Walk {
            stack: vec![root.id.clone()],
            sources: vec![root.id.clone()],
        };
        let ctx = self.context_for(root, &self.options.arg_overrides, &IndexMap::new())?;

        let mut units = Vec::new();
        self.expand(root, &ctx, None, &mut walk, &mut units)?;

        let mut seen = HashSet::new();
        for unit in &units {
            let key = unit.key();
            if !seen.insert(key.clone()) {
                return Err(ResolveError::DuplicateUnitName(key));
            }
        }

        log::debug!(
            "Resolved {} unit(s) from {} graph(s)",
            units.len(),
            walk.sources.len()
        );

        Ok(ResolvedGraph {
            units,
            args: ctx.args,
            sources: walk.sources,
        })
    }

    /// Build the substitution scope of `graph`: its declared args bound from
    /// `bindings` or their defaults, and `outer_env` extended with its env.
    fn context_for(
        &self,
        graph: &LoadedGraph,
        bindings: &IndexMap<String, String>,
        outer_env: &IndexMap<String, String>,
    ) -> Result<SubstitutionContext, ResolveError> {
        let mut ctx = SubstitutionContext::new()
            .with_package_prefixes(self.options.package_prefixes.clone())
            .with_base_dir(graph.base_dir.clone());
        ctx.env = outer_env.clone();

        for (name, def) in &graph.graph.args {
            let value = match (bindings.get(name), &def.default) {
                (Some(bound), _) => bound.clone(),
                (None, Some(default)) => default.to_string(),
                (None, None) => {
                    return Err(ResolveError::MissingArgument {
                        graph: graph.id.clone(),
                        arg: name.clone(),
                    })
                }
            };
            ctx.args.insert(name.clone(), value);
        }

        for (key, value) in &graph.graph.env {
            let resolved = substitute(&ctx, value, || format!("{} env '{}'", graph.id, key))?;
            ctx.env.insert(key.clone(), resolved);
        }

        Ok(ctx)
    }

    fn expand(
        &self,
        graph: &LoadedGraph,
        ctx: &SubstitutionContext,
        namespace: Option<&str>,
        walk: &mut Walk,
        out: &mut Vec<ResolvedUnit>,
    ) -> Result<(), ResolveError> {
        for entry in &graph.graph.entries {
            match entry {
                Entry::Unit(spec) => {
                    if let Some(unit) = self.resolve_unit(spec, ctx, namespace, &graph.id)? {
                        out.push(unit);
                    }
                }
                Entry::Include(include) => {
                    self.expand_include(include, graph, ctx, namespace, walk, out)?;
                }
            }
        }
        Ok(())
    }

    fn expand_include(
        &self,
        include: &IncludeSpec,
        parent: &LoadedGraph,
        ctx: &SubstitutionContext,
        namespace: Option<&str>,
        walk: &mut Walk,
        out: &mut Vec<ResolvedUnit>,
    ) -> Result<(), ResolveError> {
        let describe = || format!("include '{}'", include.source());

        if !condition_holds(include.enabled(), ctx, describe)? {
            log::debug!("Skipping disabled include '{}'", include.source());
            return Ok(());
        }

        let source = substitute(ctx, include.source(), describe)?;
        let child = self
            .loader
            .load(&source, Some(parent))
            .map_err(|error| ResolveError::Load {
                reference: source.clone(),
                error,
            })?;

        if let Some(pos) = walk.stack.iter().position(|id| *id == child.id) {
            let mut chain = walk.stack[pos..].to_vec();
            chain.push(child.id);
            return Err(ResolveError::CyclicInclude { chain });
        }

        let mut overlay = IndexMap::with_capacity(include.overlay().len());
        for (key, value) in include.overlay() {
            let value = match value {
                ParamValue::String(s) => {
                    ParamValue::String(substitute(ctx, s, || format!("overlay '{}'", key))?)
                }
                other => other.clone(),
            };
            overlay.insert(key.clone(), value);
        }

        // Overlay keys naming a declared argument of the sub-graph bind it
        let bindings: IndexMap<String, String> = overlay
            .iter()
            .filter(|(key, _)| child.graph.args.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect();

        let include_ns = include
            .namespace()
            .map(|ns| substitute(ctx, ns, describe))
            .transpose()?;
        let child_ns = join_namespace(namespace, include_ns.as_deref());

        log::debug!(
            "Including '{}' ({} overlay key(s))",
            child.id,
            overlay.len()
        );

        walk.stack.push(child.id.clone());
        if !walk.sources.contains(&child.id) {
            walk.sources.push(child.id.clone());
        }

        let child_ctx = self.context_for(&child, &bindings, &ctx.env)?;
        let mut expanded = Vec::new();
        self.expand(&child, &child_ctx, child_ns.as_deref(), walk, &mut expanded)?;
        walk.stack.pop();

        out.extend(expanded.into_iter().map(|mut unit| {
            unit.spec.options = apply_overlay(&unit.spec.options, &overlay);
            unit
        }));
        Ok(())
    }

    /// Substitute every field of `spec`; None when the unit is filtered out
    fn resolve_unit(
        &self,
        spec: &LaunchSpec,
        ctx: &SubstitutionContext,
        namespace: Option<&str>,
        origin: &str,
    ) -> Result<Option<ResolvedUnit>, ResolveError> {
        let field = |name: &str| {
            let unit = spec.name().to_string();
            let name = name.to_string();
            move || format!("node '{}' {}", unit, name)
        };

        let name = substitute(ctx, spec.name(), field("name"))?;
        let unit_ns = spec
            .namespace()
            .map(|ns| substitute(ctx, ns, field("namespace")))
            .transpose()?;
        let namespace = join_namespace(namespace, unit_ns.as_deref());
        let key = match &namespace {
            Some(ns) => format!("{}/{}", ns, name),
            None => name.clone(),
        };
        let group = spec
            .group()
            .map(|g| substitute(ctx, g, field("group")))
            .transpose()?;

        if let Some(groups) = &self.options.include_groups {
            if !group.as_ref().is_some_and(|g| groups.contains(g)) {
                log::debug!("Skipping '{}': not in selected groups", key);
                return Ok(None);
            }
        }
        if self.options.disable_units.contains(&key) {
            log::debug!("Skipping '{}': explicitly disabled", key);
            return Ok(None);
        }
        if !self.options.enable_units.contains(&key)
            && !condition_holds(spec.enabled(), ctx, field("enabled"))?
        {
            log::debug!("Skipping '{}': condition is false", key);
            return Ok(None);
        }

        let mut resolved = spec.clone();
        resolved.name = name;
        resolved.namespace = namespace;
        resolved.group = group;
        resolved.enabled = Condition::Literal(true);
        resolved.executable = substitute(ctx, spec.executable(), field("executable"))?;
        resolved.package = spec
            .package()
            .map(|p| substitute(ctx, p, field("package")))
            .transpose()?;
        resolved.working_dir = spec
            .working_dir()
            .map(|d| substitute(ctx, &d.to_string_lossy(), field("working_dir")).map(PathBuf::from))
            .transpose()?;

        resolved.arguments = spec
            .arguments()
            .iter()
            .map(|arg| substitute(ctx, arg, field("arguments")))
            .collect::<Result<_, _>>()?;

        resolved.remappings = Vec::with_capacity(spec.remappings().len());
        let mut remapped = HashSet::new();
        for remap in spec.remappings() {
            let from = substitute(ctx, &remap.from, field("remappings"))?;
            let to = substitute(ctx, &remap.to, field("remappings"))?;
            if !remapped.insert(from.clone()) {
                return Err(ResolveError::DuplicateRemapping { unit: key, key: from });
            }
            resolved.remappings.push(Remapping { from, to });
        }

        resolved.options = Vec::with_capacity(spec.options().len());
        for (opt, value) in spec.options() {
            let value = match value {
                ParamValue::String(s) => {
                    ParamValue::String(substitute(ctx, s, field(&format!("parameter '{}'", opt)))?)
                }
                other => other.clone(),
            };
            resolved.options.push((opt.clone(), value));
        }

        resolved.env = IndexMap::with_capacity(spec.env().len());
        for (k, v) in spec.env() {
            let value = substitute(ctx, v, field(&format!("env '{}'", k)))?;
            resolved.env.insert(k.clone(), value);
        }

        let mut env = ctx.env.clone();
        env.extend(resolved.env.clone());

        Ok(Some(ResolvedUnit {
            spec: resolved,
            env,
            origin: origin.to_string(),
        }))
    }
}

fn substitute(
    ctx: &SubstitutionContext,
    value: &str,
    context: impl FnOnce() -> String,
) -> Result<String, ResolveError> {
    ctx.substitute(value)
        .map_err(|source| ResolveError::Substitution {
            context: context(),
            source,
        })
}

fn condition_holds(
    condition: &Condition,
    ctx: &SubstitutionContext,
    context: impl FnOnce() -> String,
) -> Result<bool, ResolveError> {
    match condition {
        Condition::Literal(b) => Ok(*b),
        Condition::Expr(expr) => {
            let value = substitute(ctx, expr, context)?;
            Ok(ParamValue::parse_loose(&value).is_truthy())
        }
    }
}

/// `outer/inner` with surrounding slashes trimmed; None when both are empty
fn join_namespace(outer: Option<&str>, inner: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [outer, inner]
        .into_iter()
        .flatten()
        .map(|ns| ns.trim_matches('/'))
        .filter(|ns| !ns.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Errors that abort resolution before any process starts
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Failed to load '{reference}': {error}")]
    Load {
        reference: String,
        #[source]
        error: LaunchFileError,
    },

    #[error("Cyclic include detected: {}", .chain.join(" -> "))]
    CyclicInclude { chain: Vec<String> },

    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    #[error("Argument '{arg}' of '{graph}' has no default and was not provided")]
    MissingArgument { graph: String, arg: String },

    #[error("Substitution failed in {context}: {source}")]
    Substitution {
        context: String,
        #[source]
        source: SubstitutionError,
    },

    #[error("Node '{unit}' remaps '{key}' more than once")]
    DuplicateRemapping { unit: String, key: String },

    #[error("Duplicate unit name: {0}")]
    DuplicateUnitName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LaunchGraph, LaunchSpec};
    use crate::graph::loader::MemoryLoader;

    fn unit(name: &str) -> LaunchSpec {
        LaunchSpec::builder(format!("bin/{}", name))
            .name(name)
            .build()
            .unwrap()
    }

    fn include(source: &str) -> IncludeSpec {
        IncludeSpec::new(source).unwrap()
    }

    fn root(graph: LaunchGraph) -> LoadedGraph {
        LoadedGraph {
            id: "root".to_string(),
            base_dir: None,
            graph,
        }
    }

    fn names(graph: &ResolvedGraph) -> Vec<String> {
        graph.names()
    }

    #[test]
    fn test_declaration_order_preserved() {
        let loader = MemoryLoader::new().with_graph(
            "sub",
            LaunchGraph::new()
                .with_entry(unit("unitB"))
                .with_entry(unit("unitC")),
        );
        let graph = LaunchGraph::new()
            .with_entry(unit("unitA"))
            .with_entry(include("sub"))
            .with_entry(unit("unitD"));

        let resolved = Resolver::new(loader).resolve(&root(graph)).unwrap();
        assert_eq!(names(&resolved), vec!["unitA", "unitB", "unitC", "unitD"]);
        assert_eq!(resolved.sources(), ["root".to_string(), "sub".to_string()]);
        assert_eq!(resolved.get("unitB").unwrap().origin, "sub");
    }

    #[test]
    fn test_unit_count_is_sum_over_included_graphs() {
        let loader = MemoryLoader::new()
            .with_graph(
                "leaf",
                LaunchGraph::new()
                    .with_entry(unit("l1"))
                    .with_entry(unit("l2"))
                    .with_entry(unit("l3")),
            )
            .with_graph(
                "mid",
                LaunchGraph::new()
                    .with_entry(unit("m1"))
                    .with_entry(include("leaf").with_namespace("left"))
                    .with_entry(include("leaf").with_namespace("right")),
            );
        let graph = LaunchGraph::new()
            .with_entry(unit("r1"))
            .with_entry(include("mid"));

        let resolved = Resolver::new(loader).resolve(&root(graph)).unwrap();
        // root 1 + mid 1 + leaf 3 twice
        assert_eq!(resolved.len(), 8);
        assert!(resolved.get("left/l2").is_some());
        assert!(resolved.get("right/l2").is_some());
        // The diamond is fine; the leaf is only listed once as a source
        assert_eq!(resolved.sources().len(), 3);
    }

    #[test]
    fn test_empty_overlay_matches_standalone() {
        let sub = LaunchGraph::new()
            .with_arg("frame", Some(ParamValue::from("base_link")))
            .with_entry(
                LaunchSpec::builder("rgbd_odometry")
                    .package("rtabmap_odom")
                    .option("frame_id", "$(arg frame)")
                    .option("wait_imu_to_init", true)
                    .remap("imu", "/camera/camera/imu")
                    .build()
                    .unwrap(),
            );
        let loader = MemoryLoader::new().with_graph("sub", sub.clone());

        let standalone = Resolver::new(&loader).resolve_source("sub").unwrap();
        let included = Resolver::new(&loader)
            .resolve(&root(LaunchGraph::new().with_entry(include("sub"))))
            .unwrap();

        assert_eq!(standalone.len(), 1);
        assert_eq!(included.units()[0].spec, standalone.units()[0].spec);
    }

    #[test]
    fn test_overlay_replaces_in_place_and_appends() {
        let sub = LaunchGraph::new().with_entry(
            LaunchSpec::builder("realsense2_camera_node")
                .name("camera")
                .option("enable_color", false)
                .option("enable_depth", true)
                .build()
                .unwrap(),
        );
        let loader = MemoryLoader::new().with_graph("rs", sub);
        let graph = LaunchGraph::new().with_entry(
            include("rs")
                .with_overlay("enable_color", true)
                .with_overlay("pointcloud.enable", "true"),
        );

        let resolved = Resolver::new(loader).resolve(&root(graph)).unwrap();
        let options = resolved.units()[0].spec.options();
        assert_eq!(
            options,
            &[
                ("enable_color".to_string(), ParamValue::Bool(true)),
                ("enable_depth".to_string(), ParamValue::Bool(true)),
                ("pointcloud.enable".to_string(), ParamValue::from("true")),
            ]
        );
    }

    #[test]
    fn test_outer_overlay_wins_over_nested() {
        let loader = MemoryLoader::new()
            .with_graph(
                "inner",
                LaunchGraph::new().with_entry(
                    LaunchSpec::builder("driver").option("fps", 15i64).build().unwrap(),
                ),
            )
            .with_graph(
                "outer",
                LaunchGraph::new().with_entry(include("inner").with_overlay("fps", 30i64)),
            );
        let graph = LaunchGraph::new().with_entry(include("outer").with_overlay("fps", 60i64));

        let resolved = Resolver::new(loader).resolve(&root(graph)).unwrap();
        assert_eq!(
            resolved.units()[0].spec.option("fps"),
            Some(&ParamValue::Int(60))
        );
    }

    #[test]
    fn test_apply_overlay_empty_is_identity() {
        let options = vec![
            ("a".to_string(), ParamValue::Int(1)),
            ("b".to_string(), ParamValue::from("x")),
        ];
        assert_eq!(apply_overlay(&options, &IndexMap::new()), options);
    }

    #[test]
    fn test_cyclic_include_fails() {
        let loader = MemoryLoader::new()
            .with_graph("a", LaunchGraph::new().with_entry(include("b")))
            .with_graph("b", LaunchGraph::new().with_entry(include("a")));

        let err = Resolver::new(loader).resolve_source("a").unwrap_err();
        match err {
            ResolveError::CyclicInclude { chain } => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_include_fails() {
        let loader = MemoryLoader::new().with_graph(
            "loop",
            LaunchGraph::new()
                .with_entry(unit("x"))
                .with_entry(include("loop")),
        );
        assert!(matches!(
            Resolver::new(loader).resolve_source("loop"),
            Err(ResolveError::CyclicInclude { .. })
        ));
    }

    #[test]
    fn test_overlay_binds_declared_args() {
        let sub = LaunchGraph::new()
            .with_arg("camera_name", Some(ParamValue::from("camera")))
            .with_arg("profile", None)
            .with_entry(
                LaunchSpec::builder("realsense2_camera_node")
                    .name("$(arg camera_name)")
                    .option("rgb_camera.color_profile", "$(arg profile)")
                    .build()
                    .unwrap(),
            );
        let loader = MemoryLoader::new().with_graph("rs", sub);
        let graph = LaunchGraph::new()
            .with_arg("res", Some(ParamValue::from("640,480,30")))
            .with_entry(include("rs").with_overlay("profile", "$(arg res)"));

        let resolved = Resolver::new(loader).resolve(&root(graph)).unwrap();
        let camera = resolved.get("camera").unwrap();
        assert_eq!(
            camera.spec.option("rgb_camera.color_profile"),
            Some(&ParamValue::from("640,480,30"))
        );
        // Root args are reported, sub-graph args are scoped away
        assert_eq!(resolved.args().get("res").map(String::as_str), Some("640,480,30"));
        assert!(resolved.args().get("camera_name").is_none());
    }

    #[test]
    fn test_missing_argument() {
        let sub = LaunchGraph::new()
            .with_arg("profile", None)
            .with_entry(unit("camera"));
        let loader = MemoryLoader::new().with_graph("rs", sub);
        let graph = LaunchGraph::new().with_entry(include("rs"));

        assert!(matches!(
            Resolver::new(loader).resolve(&root(graph)),
            Err(ResolveError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_unknown_override() {
        let options = ResolveOptions {
            arg_overrides: [("nope".to_string(), "1".to_string())].into_iter().collect(),
            ..Default::default()
        };
        let result = Resolver::new(MemoryLoader::new())
            .with_options(options)
            .resolve(&root(LaunchGraph::new()));
        assert!(matches!(result, Err(ResolveError::UnknownArgument(_))));
    }

    #[test]
    fn test_override_drives_condition() {
        let graph = LaunchGraph::new()
            .with_arg("use_imu", Some(ParamValue::Bool(false)))
            .with_entry(unit("odom"))
            .with_entry(
                LaunchSpec::builder("imu_filter")
                    .enabled(Condition::Expr("$(arg use_imu)".to_string()))
                    .build()
                    .unwrap(),
            );

        let off = Resolver::new(MemoryLoader::new())
            .resolve(&root(graph.clone()))
            .unwrap();
        assert_eq!(names(&off), vec!["odom"]);

        let options = ResolveOptions {
            arg_overrides: [("use_imu".to_string(), "true".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let on = Resolver::new(MemoryLoader::new())
            .with_options(options)
            .resolve(&root(graph))
            .unwrap();
        assert_eq!(names(&on), vec!["odom", "imu_filter"]);
    }

    #[test]
    fn test_disabled_include_is_not_loaded() {
        let graph = LaunchGraph::new()
            .with_entry(unit("a"))
            .with_entry(include("does-not-exist").with_enabled(Condition::Literal(false)));
        let resolved = Resolver::new(MemoryLoader::new())
            .resolve(&root(graph))
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_missing_include_is_load_error() {
        let graph = LaunchGraph::new().with_entry(include("does-not-exist"));
        assert!(matches!(
            Resolver::new(MemoryLoader::new()).resolve(&root(graph)),
            Err(ResolveError::Load { .. })
        ));
    }

    #[test]
    fn test_duplicate_remapping() {
        let spec = LaunchSpec::builder("rgbd_odometry")
            .remap("imu", "/a")
            .remap("imu", "/b")
            .build()
            .unwrap();
        let result = Resolver::new(MemoryLoader::new())
            .resolve(&root(LaunchGraph::new().with_entry(spec)));
        assert!(matches!(result, Err(ResolveError::DuplicateRemapping { .. })));
    }

    #[test]
    fn test_duplicate_unit_name() {
        let loader = MemoryLoader::new().with_graph("sub", LaunchGraph::new().with_entry(unit("a")));
        let graph = LaunchGraph::new()
            .with_entry(unit("a"))
            .with_entry(include("sub"));
        assert!(matches!(
            Resolver::new(loader).resolve(&root(graph)),
            Err(ResolveError::DuplicateUnitName(name)) if name == "a"
        ));
    }

    #[test]
    fn test_group_and_explicit_filters() {
        let grouped = |name: &str, group: &str| {
            LaunchSpec::builder(name).group(group).build().unwrap()
        };
        let graph = LaunchGraph::new()
            .with_entry(grouped("camera", "sensors"))
            .with_entry(grouped("imu", "sensors"))
            .with_entry(grouped("odom", "estimation"))
            .with_entry(
                LaunchSpec::builder("viz")
                    .enabled(Condition::Literal(false))
                    .build()
                    .unwrap(),
            );

        let options = ResolveOptions {
            include_groups: Some(["sensors".to_string()].into_iter().collect()),
            disable_units: ["imu".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let resolved = Resolver::new(MemoryLoader::new())
            .with_options(options)
            .resolve(&root(graph.clone()))
            .unwrap();
        assert_eq!(names(&resolved), vec!["camera"]);

        let options = ResolveOptions {
            enable_units: ["viz".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let resolved = Resolver::new(MemoryLoader::new())
            .with_options(options)
            .resolve(&root(graph))
            .unwrap();
        assert_eq!(names(&resolved), vec!["camera", "imu", "odom", "viz"]);
    }

    #[test]
    fn test_env_inheritance() {
        let sub = LaunchGraph::new()
            .with_env("CAMERA_MODE", "depth")
            .with_entry(
                LaunchSpec::builder("driver")
                    .env("LOG_LEVEL", "debug")
                    .build()
                    .unwrap(),
            );
        let loader = MemoryLoader::new().with_graph("sub", sub);
        let graph = LaunchGraph::new()
            .with_env("LOG_LEVEL", "info")
            .with_env("ROS_DOMAIN_ID", "7")
            .with_entry(include("sub"));

        let resolved = Resolver::new(loader).resolve(&root(graph)).unwrap();
        let env = &resolved.units()[0].env;
        assert_eq!(env["ROS_DOMAIN_ID"], "7");
        assert_eq!(env["CAMERA_MODE"], "depth");
        assert_eq!(env["LOG_LEVEL"], "debug");
    }

    #[test]
    fn test_join_namespace() {
        assert_eq!(join_namespace(None, None), None);
        assert_eq!(join_namespace(Some("/camera/"), None), Some("camera".to_string()));
        assert_eq!(
            join_namespace(Some("robot"), Some("/camera")),
            Some("robot/camera".to_string())
        );
        assert_eq!(join_namespace(Some("/"), Some("")), None);
    }
}
