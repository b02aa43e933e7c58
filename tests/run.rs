//! Integration tests for the `run` command.
use std::path::PathBuf;
use subsector::cli::{RunOpts, handle_run_command};
use subsector::settings::Settings;
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("SUBSECTOR_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
        debug_model: true,
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();

    for file_name in [
        "metadata.toml",
        "subsector_results.csv",
        "technology_results.csv",
        "emissions.csv",
        "fuel_consumption.csv",
        "debug_subsector_state.csv",
        "subsectors_out.toml",
        "subsector_info.log",
        "subsector_error.log",
    ] {
        assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
    }

    // Second time will fail because the output folder is no longer empty
    let err = handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap_err();
    assert_eq!(
        err.chain().next().unwrap().to_string(),
        format!(
            "Failed to create output directory: {}",
            output_dir.display()
        )
    );
}
