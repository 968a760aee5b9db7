//! Graph Launch
//!
//! Launch a graph of cooperating processes described in YAML.
//!
//! # Overview
//!
//! - Describe units (processes) and includes of other launch files
//! - Resolve includes into one flat, ordered graph, applying argument overlays
//! - Start every unit without waiting for readiness, watch for unexpected exits
//! - Shut down in reverse order: SIGTERM, grace period, SIGKILL
//!
//! # Example Launch File
//!
//! ```yaml
//! version: "1.0"
//!
//! args:
//!   enable_sync:
//!     default: false
//!
//! launch:
//!   - node:
//!       package: tf2_ros
//!       executable: static_transform_publisher
//!       arguments: ["0", "0", "0", "0", "0", "0", base_link, camera_link]
//!
//!   - include:
//!       file: rs_camera.launch.yaml
//!       overlay:
//!         enable_sync: "$(arg enable_sync)"
//!
//!   - node:
//!       package: rtabmap_odom
//!       executable: rgbd_odometry
//!       name: rtabmap_odometry
//!       output: screen
//!       remappings:
//!         - [imu, /camera/camera/imu]
//!       parameters:
//!         - frame_id: base_link
//! ```

pub mod cli;
pub mod config;
pub mod graph;
pub mod runtime;

pub use cli::LaunchArgs;
pub use config::{
    DescriptorError, IncludeSpec, LaunchFile, LaunchFileError, LaunchGraph, LaunchSpec,
    SubstitutionContext, SubstitutionError,
};
pub use graph::{
    FileLoader, GraphLoader, MemoryLoader, ResolveError, ResolveOptions, ResolvedGraph, Resolver,
};
pub use runtime::{
    FailurePolicy, LaunchPlan, StartReport, Supervisor, SupervisorConfig, SupervisorError,
    UnitError, UnitState, WaitOutcome,
};
