//! Integration tests for the `validate` command.
use cemo::cli::handle_validate_command;
use cemo::log::is_logger_initialised;
use cemo::settings::Settings;
use std::path::PathBuf;

/// Get the path to the demo scenario.
fn get_scenario_path() -> PathBuf {
    PathBuf::from("demos/simple/scenario.toml")
}

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("CEMO_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_validate_command(&get_scenario_path(), Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());
}
