//! Graph Launch CLI
//!
//! Usage:
//!   graph_launch launch/camera_odometry.launch.yaml
//!   graph_launch launch/camera_odometry.launch.yaml -a enable_sync:=false
//!   graph_launch launch/camera_odometry.launch.yaml --dry-run --json

use graph_launch::{FileLoader, LaunchArgs, LaunchFile, Resolver, Supervisor, WaitOutcome};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let args: LaunchArgs = argh::from_env();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "error" => "error",
        "warn" => "warn",
        "info" => "info",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };
    let env = env_logger::Env::default().default_filter_or(log_level);
    env_logger::init_from_env(env);

    // Validate only mode: structure of the root file, then a full resolve
    if args.validate {
        let launch_file = match LaunchFile::from_file(&args.launch_file) {
            Ok(lf) => lf,
            Err(e) => {
                log::error!("Failed to load launch file: {}", e);
                std::process::exit(1);
            }
        };
        let graph = match launch_file.to_graph() {
            Ok(graph) => graph,
            Err(e) => {
                log::error!("Invalid launch file: {}", e);
                std::process::exit(1);
            }
        };
        let resolved = match Resolver::new(FileLoader::new())
            .with_options(args.resolve_options())
            .resolve_source(&args.launch_file)
        {
            Ok(resolved) => resolved,
            Err(e) => {
                log::error!("Failed to resolve launch graph: {}", e);
                std::process::exit(1);
            }
        };

        println!("Launch file '{}' is valid", args.launch_file);
        println!("  Version: {}", graph.version);
        println!("  Args: {}", graph.args.len());
        println!("  Entries: {} units, {} includes", graph.unit_count(), graph.include_count());
        println!("  Groups: {}", graph.groups().join(", "));
        println!("  Resolved units: {}", resolved.len());
        return;
    }

    // Resolve the full graph before starting anything
    log::info!("Loading launch file: {}", args.launch_file);
    let resolver = Resolver::new(FileLoader::new()).with_options(args.resolve_options());
    let graph = match resolver.resolve_source(&args.launch_file) {
        Ok(graph) => graph,
        Err(e) => {
            log::error!("Failed to resolve launch graph: {}", e);
            std::process::exit(1);
        }
    };

    let project_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            log::error!("Failed to get current directory: {}", e);
            std::process::exit(1);
        }
    };
    let mut supervisor = Supervisor::new(args.supervisor_config(project_root));

    // Dry run mode
    if args.dry_run {
        let plan = supervisor.plan(&graph);
        if args.json {
            match plan.to_json() {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    log::error!("Failed to serialize launch plan: {}", e);
                    std::process::exit(1);
                }
            }
        } else {
            println!("{}", plan);
        }
        return;
    }

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    // Set up Ctrl+C handler
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, initiating shutdown...");
        let _ = shutdown_tx.send(());
    }) {
        log::error!("Error setting Ctrl+C handler: {}", e);
        std::process::exit(1);
    }

    // Launch all units
    let report = match supervisor.start(&graph).await {
        Ok(report) => report,
        Err(e) => {
            log::error!("Launch failed: {}", e);
            supervisor.shutdown().await;
            std::process::exit(1);
        }
    };

    // Wait for shutdown signal or for the launch to settle
    let outcome = supervisor.wait(shutdown_rx).await;

    // Shutdown all units
    supervisor.shutdown().await;

    for (name, state) in supervisor.status() {
        log::info!("  {}: {}", name, state);
    }

    let failed = !report.is_success() || matches!(outcome, WaitOutcome::UnitFailed(_));
    log::info!("Launcher exiting");
    if failed {
        std::process::exit(1);
    }
}
