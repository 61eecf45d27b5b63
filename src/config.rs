//! Defines the [`ScenarioConfig`] struct, which represents the contents of a scenario file.
use crate::input::{input_err_msg, is_sorted_and_unique, read_toml};
use crate::region::{NEM_REGIONS, RegionID};
use crate::units::Dimensionless;
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The earliest year with historical data
pub const FIRST_SUPPORTED_YEAR: u32 = 2018;

/// The last full year of data
pub const LAST_SUPPORTED_YEAR: u32 = 2050;

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_cluster_sets, usize, 6);

/// The contents of a scenario file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Years and policy settings
    pub scenario: ScenarioSection,
    /// Input files and clustering settings
    pub advanced: AdvancedSection,
    /// Options passed to the solver
    #[serde(default)]
    pub solver: SolverSection,
}

/// The `[scenario]` section of a scenario file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSection {
    /// Name of the scenario
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Simulated years, sorted on load
    pub years: Vec<u32>,
    /// Discount rate used to annualise capital costs
    pub discount_rate: Dimensionless,
    /// Cost of emissions per year ($/tonne CO2)
    pub cost_emit: Option<Vec<f64>>,
    /// System-wide emissions limit per year (Mt CO2)
    pub nem_emit_limit: Option<Vec<f64>>,
    /// System-wide renewable share per year
    pub nem_ret_ratio: Option<Vec<f64>>,
    /// System-wide renewable energy per year (GWh)
    pub nem_ret_gwh: Option<Vec<f64>>,
    /// Operating reserve as a share of demand per year
    pub nem_disp_ratio: Option<Vec<f64>>,
    /// Share of hourly generation from dispatchable sources per year
    pub nem_re_disp_ratio: Option<Vec<f64>>,
    /// Regional renewable share per year
    #[serde(default)]
    pub region_ret_ratio: Vec<RegionRatios>,
    /// Whether to cap unserved energy
    #[serde(default)]
    pub unserved_limit: bool,
    /// Whether transmission may be built in each year
    pub manual_intercon_build: Option<Vec<bool>>,
}

/// Renewable share targets for one region
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RegionRatios {
    /// The region
    pub region: RegionID,
    /// Target per simulated year
    pub ratios: Vec<f64>,
}

/// The `[advanced]` section of a scenario file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AdvancedSection {
    /// Folder containing the template tables
    pub template: PathBuf,
    /// Custom cost table
    pub custom_costs: Option<PathBuf>,
    /// Exogenous capacity changes
    pub exogenous_capacity: Option<PathBuf>,
    /// Exogenous transmission builds
    pub exogenous_transmission: Option<PathBuf>,
    /// Whether to decide capacity with a clustered model
    #[serde(default)]
    pub cluster: bool,
    /// Number of representative weeks
    #[serde(default = "default_cluster_sets")]
    pub cluster_sets: usize,
    /// Use the member-wise maximum rather than the mean as a cluster's representative
    #[serde(default)]
    pub max_synthetic: bool,
    /// Add the most resource-stressed week to the clusters
    #[serde(default)]
    pub extreme_week: bool,
}

/// The `[solver]` section of a scenario file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SolverSection {
    /// Options for the full-year solve, as `key=value` pairs
    #[serde(default, deserialize_with = "deserialise_solver_options")]
    pub dispatch_solver_options: SolverOptions,
    /// Options for the clustered capacity solve, as `key=value` pairs
    #[serde(default, deserialize_with = "deserialise_solver_options")]
    pub cluster_solver_options: SolverOptions,
}

/// A typed value for a solver option
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SolverOptionValue {
    /// A flag
    Bool(bool),
    /// An integer
    Int(i32),
    /// A real number
    Float(f64),
    /// Anything else
    String(String),
}

impl SolverOptionValue {
    fn parse(s: &str) -> Self {
        match s {
            "true" | "True" => return Self::Bool(true),
            "false" | "False" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(value) = s.parse() {
            Self::Int(value)
        } else if let Ok(value) = s.parse() {
            Self::Float(value)
        } else {
            Self::String(s.to_string())
        }
    }
}

impl fmt::Display for SolverOptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value}"),
        }
    }
}

/// Solver options keyed by name
pub type SolverOptions = IndexMap<String, SolverOptionValue>;

/// Parse solver options given as `key=value key=value`
pub fn parse_solver_options(s: &str) -> Result<SolverOptions> {
    let mut options = SolverOptions::new();
    for item in s.split_whitespace() {
        let Some((key, value)) = item.split_once('=') else {
            bail!("Invalid solver option `{item}`: expected key=value");
        };
        ensure!(
            !key.is_empty() && !value.is_empty(),
            "Invalid solver option `{item}`: expected key=value"
        );
        options.insert(key.to_string(), SolverOptionValue::parse(value));
    }

    Ok(options)
}

fn deserialise_solver_options<'de, D>(deserialiser: D) -> Result<SolverOptions, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserialiser)?;
    parse_solver_options(&s).map_err(serde::de::Error::custom)
}

/// Policy settings which apply to one simulated year
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearPolicy {
    /// Cost of emissions ($/tonne CO2)
    pub cost_emit: f64,
    /// Emissions limit (Mt CO2)
    pub nem_emit_limit: Option<f64>,
    /// System-wide renewable share
    pub nem_ret_ratio: Option<f64>,
    /// System-wide renewable energy (GWh)
    pub nem_ret_gwh: Option<f64>,
    /// Operating reserve as a share of demand
    pub nem_disp_ratio: Option<f64>,
    /// Dispatchable share of hourly generation
    pub nem_re_disp_ratio: Option<f64>,
    /// Renewable share per region
    pub region_ret_ratio: IndexMap<RegionID, f64>,
    /// Whether unserved energy is capped
    pub unserved_limit: bool,
    /// Whether transmission may be built, if building is manual
    pub manual_intercon_build: Option<bool>,
}

/// Check that the `years` parameter is valid
fn check_years(years: &[u32]) -> Result<()> {
    ensure!(!years.is_empty(), "`years` is empty");
    for year in years {
        ensure!(
            *year <= LAST_SUPPORTED_YEAR,
            "`years`: last full year of data is {LAST_SUPPORTED_YEAR}, got {year}"
        );
        ensure!(
            *year >= FIRST_SUPPORTED_YEAR,
            "`years`: no historical data before {FIRST_SUPPORTED_YEAR}, got {year}"
        );
    }
    ensure!(is_sorted_and_unique(years), "`years` must be unique");

    Ok(())
}

/// Check that the `discount_rate` parameter is valid
fn check_discount_rate(value: Dimensionless) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&value.value()),
        "discount_rate must be between 0 and 1"
    );

    Ok(())
}

/// Check that a per-year list has one non-negative entry per year
fn check_per_year_costs(name: &str, values: Option<&[f64]>, num_years: usize) -> Result<()> {
    let Some(values) = values else {
        return Ok(());
    };
    ensure!(
        values.len() == num_years,
        "`{name}` must have one entry per simulated year"
    );
    ensure!(
        values.iter().all(|value| *value >= 0.0),
        "`{name}` values must be >= 0"
    );

    Ok(())
}

/// Check that a per-year list has one entry per year between 0 and 1
fn check_per_year_ratios(name: &str, values: Option<&[f64]>, num_years: usize) -> Result<()> {
    let Some(values) = values else {
        return Ok(());
    };
    ensure!(
        values.len() == num_years,
        "`{name}` must have one entry per simulated year"
    );
    ensure!(
        values.iter().all(|value| (0.0..=1.0).contains(value)),
        "`{name}` values must be between 0 and 1"
    );

    Ok(())
}

/// Check that a referenced file or folder exists
fn check_path_exists(name: &str, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        ensure!(path.exists(), "`{name}`: {} not found", path.display());
    }

    Ok(())
}

/// Make a path from the scenario file absolute
fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl ScenarioConfig {
    /// Read a scenario file.
    ///
    /// Relative paths in the file are resolved against the folder containing it.
    ///
    /// # Returns
    ///
    /// The scenario or an error naming the offending field
    pub fn from_path<P: AsRef<Path>>(file_path: P) -> Result<ScenarioConfig> {
        let file_path = file_path.as_ref();
        let mut config: ScenarioConfig = read_toml(file_path)?;

        let base = file_path.parent().unwrap_or(Path::new(""));
        config.resolve_paths(base);
        config.scenario.years.sort_unstable();
        config
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let advanced = &mut self.advanced;
        advanced.template = resolve_path(base, &advanced.template);
        for path in [
            &mut advanced.custom_costs,
            &mut advanced.exogenous_capacity,
            &mut advanced.exogenous_transmission,
        ]
        .into_iter()
        .flatten()
        {
            *path = resolve_path(base, path);
        }
    }

    /// Validate parameters after reading in file
    pub fn validate(&self) -> Result<()> {
        let scenario = &self.scenario;
        let num_years = scenario.years.len();

        check_years(&scenario.years)?;
        check_discount_rate(scenario.discount_rate)?;

        check_per_year_costs("cost_emit", scenario.cost_emit.as_deref(), num_years)?;
        check_per_year_costs(
            "nem_emit_limit",
            scenario.nem_emit_limit.as_deref(),
            num_years,
        )?;
        check_per_year_costs("nem_ret_gwh", scenario.nem_ret_gwh.as_deref(), num_years)?;
        check_per_year_ratios("nem_ret_ratio", scenario.nem_ret_ratio.as_deref(), num_years)?;
        check_per_year_ratios(
            "nem_disp_ratio",
            scenario.nem_disp_ratio.as_deref(),
            num_years,
        )?;
        check_per_year_ratios(
            "nem_re_disp_ratio",
            scenario.nem_re_disp_ratio.as_deref(),
            num_years,
        )?;
        for region in &scenario.region_ret_ratio {
            ensure!(
                NEM_REGIONS.contains(&region.region.value()),
                "`region_ret_ratio` region {} is not a NEM region ({}-{})",
                region.region,
                NEM_REGIONS.start(),
                NEM_REGIONS.end()
            );
            check_per_year_ratios(
                &format!("region_ret_ratio for region {}", region.region),
                Some(&region.ratios),
                num_years,
            )?;
        }
        if let Some(flags) = &scenario.manual_intercon_build {
            ensure!(
                flags.len() == num_years,
                "`manual_intercon_build` must have one entry per simulated year"
            );
        }

        let advanced = &self.advanced;
        ensure!(
            advanced.template.is_dir(),
            "`template`: {} not found",
            advanced.template.display()
        );
        check_path_exists("custom_costs", advanced.custom_costs.as_deref())?;
        check_path_exists("exogenous_capacity", advanced.exogenous_capacity.as_deref())?;
        check_path_exists(
            "exogenous_transmission",
            advanced.exogenous_transmission.as_deref(),
        )?;
        ensure!(advanced.cluster_sets >= 1, "`cluster_sets` must be >= 1");

        Ok(())
    }

    /// The simulated years, in order
    pub fn years(&self) -> &[u32] {
        &self.scenario.years
    }

    /// The policy settings for a simulated year
    pub fn policy_for_year(&self, year: u32) -> Result<YearPolicy> {
        let scenario = &self.scenario;
        let Some(idx) = scenario.years.iter().position(|y| *y == year) else {
            bail!("{year} is not a simulated year");
        };
        let at = |values: &Option<Vec<f64>>| values.as_ref().map(|values| values[idx]);

        Ok(YearPolicy {
            cost_emit: at(&scenario.cost_emit).unwrap_or(0.0),
            nem_emit_limit: at(&scenario.nem_emit_limit),
            nem_ret_ratio: at(&scenario.nem_ret_ratio),
            nem_ret_gwh: at(&scenario.nem_ret_gwh),
            nem_disp_ratio: at(&scenario.nem_disp_ratio),
            nem_re_disp_ratio: at(&scenario.nem_re_disp_ratio),
            region_ret_ratio: scenario
                .region_ret_ratio
                .iter()
                .map(|region| (region.region, region.ratios[idx]))
                .collect(),
            unserved_limit: scenario.unserved_limit,
            manual_intercon_build: scenario
                .manual_intercon_build
                .as_ref()
                .map(|flags| flags[idx]),
        })
    }

    /// The year before a simulated year, from which exogenous changes are accumulated
    pub fn previous_year(&self, year: u32) -> u32 {
        self.scenario
            .years
            .iter()
            .copied()
            .take_while(|y| *y < year)
            .last()
            .unwrap_or(crate::input::exogenous::EXOGENOUS_BASE_YEAR)
    }
}
