//! The command line interface for the simulation.
use crate::cluster::{ClusterSettings, cluster_year};
use crate::config::ScenarioConfig;
use crate::formulation::{Formulation, ModelOption};
use crate::log;
use crate::model::Model;
use crate::model::adjust::clip_exogenous_capacity;
use crate::model::parameters::{CarryForward, YearParameters};
use crate::output::metadata::write_metadata;
use crate::output::{create_output_directory, scenario_stem};
use crate::settings::Settings;
use crate::simulation::RunOptions;
use crate::timeline::{Timeline, financial_year_bounds};
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the simulation.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write additional information to CSV files
    #[arg(long)]
    pub debug_model: bool,
    /// Skip years which already have output in the output directory
    #[arg(long)]
    pub resume: bool,
    /// Model only the first week of each year to check the input data
    #[arg(long)]
    pub template_test: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a scenario.
    Run {
        /// Path to the scenario file.
        scenario: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Manage example scenarios.
    Example {
        /// The available subcommands for managing example scenarios.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Validate a scenario and build, without solving, the model of every year.
    Validate {
        /// Path to the scenario file.
        scenario: PathBuf,
    },
    /// Select representative weeks for one year of a scenario.
    Cluster {
        /// Path to the scenario file.
        scenario: PathBuf,
        /// The financial year to cluster
        #[arg(long)]
        year: u32,
        /// Number of clusters, instead of the scenario's `cluster_sets`
        #[arg(short)]
        k: Option<usize>,
    },
    /// Manage program settings.
    Settings {
        /// The subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { scenario, opts } => handle_run_command(&scenario, &opts, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate { scenario } => handle_validate_command(&scenario, None),
            Self::Cluster { scenario, year, k } => handle_cluster_command(&scenario, year, k, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start cemo
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ cemo --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        // Output program help in markdown format
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Handle the `run` command.
pub fn handle_run_command(
    scenario_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;

    // These settings can be overridden by command-line argument
    if opts.debug_model {
        settings.debug_model = true;
    }
    if opts.overwrite {
        settings.overwrite = true;
    }

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = settings.output_dir_for(scenario_path)?;
        &pathbuf
    };

    let overwrite = create_output_directory(output_path, settings.overwrite, opts.resume)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(Some(settings.log_level.as_str()), Some(output_path))
        .context("Failed to initialise logging.")?;

    // Load the scenario to run
    let mut model = Model::from_path(scenario_path).context("Failed to load scenario.")?;
    settings
        .apply_solver_defaults(&mut model.config.solver)
        .context("Invalid solver options in settings.")?;
    info!("Loaded scenario from {}", scenario_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let options = RunOptions {
        resume: opts.resume,
        template_test: opts.template_test,
        debug_model: settings.debug_model,
    };
    write_metadata(output_path, scenario_path, &model.config, &options)?;

    // Run the simulation
    let run_name = scenario_stem(scenario_path)?;
    crate::simulation::run(&model, output_path, &run_name, &options)?;
    info!("Simulation complete!");

    Ok(())
}

/// Handle the `validate` command.
///
/// Every year's formulation is built, starting from the initial capacity, to check that the
/// template data is complete for every simulated year.
pub fn handle_validate_command(scenario_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(settings.log_level.as_str()), None)
        .context("Failed to initialise logging.")?;

    let model = Model::from_path(scenario_path).context("Failed to validate scenario.")?;
    let state = CarryForward::initial(&model);
    for year in model.config.years() {
        let mut parameters = YearParameters::new(&model, *year, &state)?;
        clip_exogenous_capacity(&mut parameters);
        let (start, end) = financial_year_bounds(*year)?;
        let timeline = Timeline::single(model.traces.timestamps_between(start, end)?)?;
        let traces = model
            .traces
            .sample(
                &model.zones,
                &model.technologies,
                &model.zone_technologies,
                &timeline,
            )
            .with_context(|| format!("Failed to validate year {year}."))?;
        let options = ModelOption::from_policy(&parameters.policy);
        let formulation = Formulation::build(&model, &parameters, &timeline, &traces, &options);
        info!(
            "Year {year}: {} columns, {} rows",
            formulation.num_columns(),
            formulation.num_rows()
        );
    }
    info!("Scenario validation successful!");

    Ok(())
}

/// Handle the `cluster` command.
pub fn handle_cluster_command(
    scenario_path: &Path,
    year: u32,
    clusters: Option<usize>,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    log::init(Some(settings.log_level.as_str()), None)
        .context("Failed to initialise logging.")?;

    let config = ScenarioConfig::from_path(scenario_path).context("Failed to load scenario.")?;
    let mut cluster_settings = ClusterSettings::from_config(&config.advanced);
    if let Some(clusters) = clusters {
        cluster_settings.clusters = clusters;
    }
    let model = Model::from_config(config).context("Failed to load scenario.")?;

    let clustering = cluster_year(&model.traces, &model.technologies, year, &cluster_settings)?;
    println!("start,days,weight,members,extreme");
    for week in &clustering.weeks {
        println!(
            "{},{},{},{},{}",
            week.start, week.days, week.weight, week.members, week.extreme
        );
    }

    Ok(())
}
