//! Integration tests for the `example run` command.
use cemo::cli::RunOpts;
use cemo::cli::example::handle_example_run_command;
use cemo::settings::Settings;
use tempfile::tempdir;

/// Run the bundled demo in template-test mode, which solves one week per year without merging.
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("CEMO_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        template_test: true,
        debug_model: true,
        ..RunOpts::default()
    };
    handle_example_run_command("simple", &opts, Some(Settings::default())).unwrap();

    let output_dir = tempdir.path();
    assert!(output_dir.join("2020.json").is_file());
    assert!(output_dir.join("debug_problem_2021.csv").is_file());
    assert!(!output_dir.join("scenario.json").exists());
}
