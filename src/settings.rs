//! Program settings, read from `settings.toml` in the user's config directory.
//!
//! Settings are defaults for every run: the log level, where results go when no output folder is
//! given, and solver options used when a scenario does not set them.
use crate::config::{SolverOptions, SolverSection, parse_solver_options};
use crate::get_cemo_config_dir;
use crate::input::{input_err_msg, read_toml};
use crate::log::DEFAULT_LOG_LEVEL;
use crate::output::OUTPUT_DIRECTORY_ROOT;
use anyhow::{Context, Result};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# Program settings for cemo
# Uncomment a line to change a setting from its default
";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(OUTPUT_DIRECTORY_ROOT)
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_cemo_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, Clone, DocumentedFields, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether to overwrite output folders by default
    #[serde(default)]
    pub overwrite: bool,
    /// Whether to write the constraint counts and selected clusters to CSV files
    #[serde(default)]
    pub debug_model: bool,
    /// Folder under which a scenario's results go when no output folder is given
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Solver options (`key=value key=value`) for scenarios which do not set them
    #[serde(default)]
    pub solver_options: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            overwrite: false,
            debug_model: false,
            results_dir: default_results_dir(),
            solver_options: String::new(),
        }
    }
}

impl Settings {
    /// Read the contents of the settings file in the user's config directory.
    ///
    /// If the file is not present, default values for settings will be used
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read from the specified path, falling back to defaults if there is no file
    pub fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let settings: Settings = read_toml(file_path)?;
        settings
            .default_solver_options()
            .with_context(|| input_err_msg(file_path))?;

        Ok(settings)
    }

    /// The default solver options
    pub fn default_solver_options(&self) -> Result<SolverOptions> {
        parse_solver_options(&self.solver_options)
    }

    /// Fill in solver options which the scenario leaves unset, for both solves
    pub fn apply_solver_defaults(&self, solver: &mut SolverSection) -> Result<()> {
        let defaults = self.default_solver_options()?;
        for options in [
            &mut solver.dispatch_solver_options,
            &mut solver.cluster_solver_options,
        ] {
            for (key, value) in &defaults {
                options.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        Ok(())
    }

    /// The output folder for the scenario file at `scenario_path`
    pub fn output_dir_for(&self, scenario_path: &Path) -> Result<PathBuf> {
        let stem = crate::output::scenario_stem(scenario_path)?;
        Ok(self.results_dir.join(stem))
    }

    /// The settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("Could not convert settings to TOML")
    }

    /// The contents of the default settings file, with every setting commented out
    pub fn default_file_contents() -> String {
        let settings_raw = Settings::default()
            .to_toml()
            .expect("Default settings are valid TOML");

        // Document each setting with its doc comment
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.lines() {
            if let Some(last) = line.find('=') {
                let field = line[..last].trim();
                let docs = Settings::get_field_docs(field).expect("Missing doc comment for field");
                for line in docs.lines() {
                    write!(&mut out, "\n# # {}\n", line.trim()).unwrap();
                }

                writeln!(&mut out, "# {}", line.trim()).unwrap();
            }
        }

        out
    }
}
