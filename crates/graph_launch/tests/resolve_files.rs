//! Resolution of launch files on disk

use graph_launch::config::ParamValue;
use graph_launch::{FileLoader, LaunchFileError, ResolveError, ResolveOptions, Resolver};
use std::path::{Path, PathBuf};

fn repo_launch_file(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../launch")
        .join(name)
        .display()
        .to_string()
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn camera_odometry_resolves_in_declaration_order() {
    let graph = Resolver::new(FileLoader::new())
        .resolve_source(&repo_launch_file("camera_odometry.launch.yaml"))
        .unwrap();

    assert_eq!(
        graph.names(),
        vec!["static_transform_publisher", "camera/camera", "rtabmap_odometry"]
    );
    assert_eq!(graph.sources().len(), 2);

    let tf = graph.get("static_transform_publisher").unwrap();
    assert_eq!(
        tf.spec.arguments(),
        ["0", "0", "0", "0", "0", "0", "base_link", "camera_link"]
    );

    let odom = graph.get("rtabmap_odometry").unwrap();
    assert_eq!(odom.spec.remappings().len(), 4);
    assert_eq!(
        odom.spec.option("frame_id"),
        Some(&ParamValue::String("base_link".to_string()))
    );
    assert_eq!(odom.spec.option("wait_imu_to_init"), Some(&ParamValue::Bool(true)));

    for unit in graph.units() {
        assert_eq!(unit.env.get("RCUTILS_COLORIZED_OUTPUT").map(String::as_str), Some("1"));
    }
}

#[test]
fn camera_overlay_replaces_in_place_and_appends() {
    let graph = Resolver::new(FileLoader::new())
        .resolve_source(&repo_launch_file("camera_odometry.launch.yaml"))
        .unwrap();
    let camera = graph.get("camera/camera").unwrap();
    let keys: Vec<&str> = camera.spec.options().iter().map(|(k, _)| k.as_str()).collect();

    // Declared parameters keep their position
    assert_eq!(keys[0], "camera_name");
    assert_eq!(keys[1], "enable_sync");
    assert_eq!(camera.spec.option("enable_sync"), Some(&ParamValue::Bool(true)));
    assert_eq!(camera.spec.option("unite_imu_method"), Some(&ParamValue::Int(2)));
    assert_eq!(
        camera.spec.option("rgb_camera.color_profile"),
        Some(&ParamValue::String("640,480,30".to_string()))
    );

    // Overlay keys the driver does not declare are appended
    let appended = keys
        .iter()
        .position(|k| *k == "pointcloud.allow_no_texture_points")
        .unwrap();
    assert!(appended > keys.iter().position(|k| *k == "depth_module.depth_profile").unwrap());
    assert_eq!(keys.last(), Some(&"hole_filling_filter.enable"));
}

#[test]
fn root_arguments_can_be_overridden() {
    let options = ResolveOptions {
        arg_overrides: [("frame_id".to_string(), "odom".to_string())]
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let graph = Resolver::new(FileLoader::new())
        .with_options(options)
        .resolve_source(&repo_launch_file("camera_odometry.launch.yaml"))
        .unwrap();

    assert_eq!(graph.args()["frame_id"], "odom");
    assert_eq!(
        graph.get("static_transform_publisher").unwrap().spec.arguments()[6],
        "odom"
    );
}

#[test]
fn relative_includes_resolve_against_including_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "robot.launch.yaml",
        r#"
launch:
  - include:
      file: sensors/imu.launch.yaml
      namespace: sensors
  - node:
      executable: fusion
"#,
    );
    write(
        dir.path(),
        "sensors/imu.launch.yaml",
        r#"
launch:
  - node:
      executable: imu_driver
      name: imu
      working_dir: "$(dirname)"
"#,
    );

    let graph = Resolver::new(FileLoader::new())
        .resolve_source(&root.display().to_string())
        .unwrap();

    assert_eq!(graph.names(), vec!["sensors/imu", "fusion"]);
    let imu = graph.get("sensors/imu").unwrap();
    let expected = dir.path().join("sensors").canonicalize().unwrap();
    assert_eq!(imu.spec.working_dir(), Some(expected.as_path()));
}

#[test]
fn file_include_cycle_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(
        dir.path(),
        "a.launch.yaml",
        "launch:\n  - include:\n      file: b.launch.yaml\n",
    );
    write(
        dir.path(),
        "b.launch.yaml",
        "launch:\n  - node:\n      executable: talker\n  - include:\n      file: a.launch.yaml\n",
    );

    let err = Resolver::new(FileLoader::new())
        .resolve_source(&a.display().to_string())
        .unwrap_err();

    match err {
        ResolveError::CyclicInclude { chain } => {
            assert_eq!(chain.len(), 3);
            assert_eq!(chain.first(), chain.last());
            assert!(chain[1].ends_with("b.launch.yaml"));
        }
        other => panic!("expected CyclicInclude, got {other}"),
    }
}

#[test]
fn unknown_node_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "bad.launch.yaml",
        "launch:\n  - node:\n      executable: talker\n      depends_on: [listener]\n",
    );

    let err = Resolver::new(FileLoader::new())
        .resolve_source(&root.display().to_string())
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Load {
            error: LaunchFileError::Parse(_),
            ..
        }
    ));
}

#[test]
fn missing_include_reports_reference() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "root.launch.yaml",
        "launch:\n  - include:\n      file: nowhere.launch.yaml\n",
    );

    let err = Resolver::new(FileLoader::new())
        .resolve_source(&root.display().to_string())
        .unwrap_err();
    match err {
        ResolveError::Load { reference, error } => {
            assert_eq!(reference, "nowhere.launch.yaml");
            assert!(matches!(error, LaunchFileError::Io { .. }));
        }
        other => panic!("expected Load, got {other}"),
    }
}
