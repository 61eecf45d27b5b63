//! The module responsible for writing output data to disk.
use crate::cluster::RepresentativeWeek;
use crate::formulation::{CostComponent, Formulation, VarIndex, VarName};
use crate::input::input_err_msg;
use crate::model::Model;
use crate::model::parameters::{CarryForward, YearParameters};
use crate::region::{RegionID, ZoneID};
use crate::simulation::YearOutcome;
use crate::technology::TechnologyID;
use crate::timeline::{IntervalID, TIMESTAMP_FORMAT, Timeline};
use crate::units::{Capacity, Money};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

pub mod metadata;

/// Default root folder for scenario-specific output folders
pub const OUTPUT_DIRECTORY_ROOT: &str = "cemo_results";

/// The output file name for the cost summary
const SUMMARY_FILE_NAME: &str = "summary.csv";

/// The file name of a scenario without its extension
pub fn scenario_stem(scenario_path: &Path) -> Result<String> {
    let stem = scenario_path
        .file_stem()
        .context("Scenario path has no file name")?
        .to_str()
        .context("Invalid chars in scenario file name")?;

    Ok(stem.to_string())
}

/// Create the output folder.
///
/// A folder with files in it is only reused with `overwrite` (its contents are deleted) or
/// `resume` (its contents are kept).
///
/// # Returns
///
/// Whether existing output is being overwritten
pub fn create_output_directory(output_dir: &Path, overwrite: bool, resume: bool) -> Result<bool> {
    if output_dir.is_dir() {
        if output_dir.read_dir()?.next().is_none() {
            return Ok(false);
        }
        if resume {
            return Ok(false);
        }
        ensure!(
            overwrite,
            "Output folder already contains files (use --overwrite or --resume)"
        );
        fs::remove_dir_all(output_dir)?;
        fs::create_dir_all(output_dir)?;
        return Ok(true);
    }

    fs::create_dir_all(output_dir)?;
    Ok(false)
}

fn write_err_msg(file_path: &Path) -> String {
    format!("Error writing {}", file_path.display())
}

/// A value for a (zone, technology) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PairValue {
    zone: ZoneID,
    technology: TechnologyID,
    value: f64,
}

/// A value for a directed link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinkValue {
    source: ZoneID,
    dest: ZoneID,
    value: f64,
}

/// A value for a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ZoneValue {
    zone: ZoneID,
    value: f64,
}

/// The file form of [`CarryForward`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CarryForwardRecord {
    capacity: Vec<PairValue>,
    transmission: Vec<LinkValue>,
    cost: Vec<ZoneValue>,
}

impl From<&CarryForward> for CarryForwardRecord {
    fn from(state: &CarryForward) -> Self {
        Self {
            capacity: state
                .capacity
                .iter()
                .map(|((zone, technology), value)| PairValue {
                    zone: *zone,
                    technology: *technology,
                    value: value.value(),
                })
                .collect(),
            transmission: state
                .transmission
                .iter()
                .map(|((source, dest), value)| LinkValue {
                    source: *source,
                    dest: *dest,
                    value: value.value(),
                })
                .collect(),
            cost: state
                .cost
                .iter()
                .map(|(zone, value)| ZoneValue {
                    zone: *zone,
                    value: value.value(),
                })
                .collect(),
        }
    }
}

impl From<CarryForwardRecord> for CarryForward {
    fn from(record: CarryForwardRecord) -> Self {
        Self {
            capacity: record
                .capacity
                .into_iter()
                .map(|row| ((row.zone, row.technology), Capacity(row.value)))
                .collect(),
            transmission: record
                .transmission
                .into_iter()
                .map(|row| ((row.source, row.dest), Capacity(row.value)))
                .collect(),
            cost: record
                .cost
                .into_iter()
                .map(|row| (row.zone, Money(row.value)))
                .collect(),
        }
    }
}

/// One part of the index of a variable or dual
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum IndexPart {
    Id(u32),
    Timestamp(String),
}

/// A value with its index
#[derive(Debug, Clone, PartialEq, Serialize)]
struct IndexedValue {
    index: Vec<IndexPart>,
    value: f64,
}

#[derive(Serialize)]
struct ZoneRecord<'a> {
    id: ZoneID,
    name: &'a str,
    region: RegionID,
}

#[derive(Serialize)]
struct TechnologyRecord<'a> {
    id: TechnologyID,
    name: &'a str,
}

#[derive(Serialize)]
struct SetsRecord<'a> {
    regions: Vec<RegionID>,
    zones: Vec<ZoneRecord<'a>>,
    technologies: Vec<TechnologyRecord<'a>>,
    zone_technologies: Vec<(ZoneID, TechnologyID)>,
    links: Vec<(ZoneID, ZoneID)>,
    intervals: Vec<String>,
}

#[derive(Serialize)]
struct PairParametersRecord {
    zone: ZoneID,
    technology: TechnologyID,
    build_cost: f64,
    fuel_price: f64,
    heat_rate: f64,
    cost_fom: f64,
    cost_vom: f64,
    cost_retire: f64,
    fixed_charge_rate: f64,
    build_limit: f64,
    initial: f64,
    exogenous_built: f64,
    exogenous_retired: f64,
}

#[derive(Serialize)]
struct LinkParametersRecord {
    source: ZoneID,
    dest: ZoneID,
    loss: f64,
    build_cost: f64,
    fixed_charge_rate: f64,
    initial: f64,
    exogenous: f64,
}

#[derive(Serialize)]
struct ParamsRecord {
    discount_rate: f64,
    cost_emit: f64,
    pairs: Vec<PairParametersRecord>,
    links: Vec<LinkParametersRecord>,
    carried_cost: Vec<ZoneValue>,
    historical_repayment: Vec<ZoneValue>,
}

#[derive(Serialize)]
struct DualsRecord {
    srmc: Vec<IndexedValue>,
}

/// Everything written for one solved year
#[derive(Serialize)]
struct YearRecord<'a> {
    year: u32,
    sets: SetsRecord<'a>,
    params: ParamsRecord,
    vars: IndexMap<VarName, Vec<IndexedValue>>,
    duals: DualsRecord,
    objective_value: f64,
    system_cost: f64,
    costs: IndexMap<CostComponent, f64>,
    clusters: Option<&'a [RepresentativeWeek]>,
}

fn timestamp(timeline: &Timeline, t: IntervalID) -> IndexPart {
    IndexPart::Timestamp(timeline.timestamp(t).format(TIMESTAMP_FORMAT).to_string())
}

fn index_parts(timeline: &Timeline, index: VarIndex) -> Vec<IndexPart> {
    let id = IndexPart::Id;
    match index {
        VarIndex::Pair(zone, tech) => vec![id(zone.value()), id(tech.value())],
        VarIndex::PairInterval(zone, tech, t) => {
            vec![id(zone.value()), id(tech.value()), timestamp(timeline, t)]
        }
        VarIndex::ZoneInterval(zone, t) => vec![id(zone.value()), timestamp(timeline, t)],
        VarIndex::Link(source, dest) => vec![id(source.value()), id(dest.value())],
        VarIndex::LinkInterval(source, dest, t) => {
            vec![id(source.value()), id(dest.value()), timestamp(timeline, t)]
        }
    }
}

fn sets_record<'a>(model: &'a Model, timeline: &Timeline) -> SetsRecord<'a> {
    SetsRecord {
        regions: model.regions.keys().copied().collect(),
        zones: model
            .zones
            .values()
            .map(|zone| ZoneRecord {
                id: zone.id,
                name: &zone.name,
                region: zone.region_id,
            })
            .collect(),
        technologies: model
            .technologies
            .values()
            .map(|technology| TechnologyRecord {
                id: technology.id,
                name: &technology.name,
            })
            .collect(),
        zone_technologies: model.zone_technologies.keys().copied().collect(),
        links: model.network.iter().map(|link| link.key()).collect(),
        intervals: timeline
            .timestamps()
            .iter()
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .collect(),
    }
}

fn zone_values(values: &IndexMap<ZoneID, Money>) -> Vec<ZoneValue> {
    values
        .iter()
        .map(|(zone, value)| ZoneValue {
            zone: *zone,
            value: value.value(),
        })
        .collect()
}

fn params_record(parameters: &YearParameters) -> ParamsRecord {
    ParamsRecord {
        discount_rate: parameters.discount_rate.value(),
        cost_emit: parameters.policy.cost_emit,
        pairs: parameters
            .pairs
            .iter()
            .map(|((zone, technology), pair)| PairParametersRecord {
                zone: *zone,
                technology: *technology,
                build_cost: pair.build_cost.value(),
                fuel_price: pair.fuel_price.value(),
                heat_rate: pair.heat_rate.value(),
                cost_fom: pair.cost_fom.value(),
                cost_vom: pair.cost_vom.value(),
                cost_retire: pair.cost_retire.value(),
                fixed_charge_rate: pair.fixed_charge_rate.value(),
                build_limit: pair.build_limit.value(),
                initial: pair.initial.value(),
                exogenous_built: pair.exogenous_built.value(),
                exogenous_retired: pair.exogenous_retired.value(),
            })
            .collect(),
        links: parameters
            .links
            .iter()
            .map(|((source, dest), link)| LinkParametersRecord {
                source: *source,
                dest: *dest,
                loss: link.loss.value(),
                build_cost: link.build_cost.value(),
                fixed_charge_rate: link.fixed_charge_rate.value(),
                initial: link.initial.value(),
                exogenous: link.exogenous.value(),
            })
            .collect(),
        carried_cost: zone_values(&parameters.carried_cost),
        historical_repayment: zone_values(&parameters.historical_repayment),
    }
}

fn year_record<'a>(model: &'a Model, outcome: &'a YearOutcome) -> YearRecord<'a> {
    let timeline = &outcome.timeline;
    let solution = &outcome.solution;

    // Every kind of variable is listed, even if the model has none of it
    let mut vars: IndexMap<VarName, Vec<IndexedValue>> = VarName::iter()
        .map(|name| (name, Vec::new()))
        .collect();
    for (key, value) in solution.values() {
        vars[&key.name].push(IndexedValue {
            index: index_parts(timeline, key.index),
            value,
        });
    }

    let srmc = solution
        .prices()
        .map(|(zone, t, value)| IndexedValue {
            index: vec![IndexPart::Id(zone.value()), timestamp(timeline, t)],
            value,
        })
        .collect();

    YearRecord {
        year: outcome.parameters.year,
        sets: sets_record(model, timeline),
        params: params_record(&outcome.parameters),
        vars,
        duals: DualsRecord { srmc },
        objective_value: solution.objective_value().value(),
        system_cost: solution.system_cost().value(),
        costs: solution
            .costs()
            .iter()
            .filter(|(component, _)| **component != CostComponent::Shadow)
            .map(|(component, cost)| (*component, cost.value()))
            .collect(),
        clusters: outcome.clustering.as_ref().map(|c| c.weeks.as_slice()),
    }
}

/// The costs of a year, read back from its output file
#[derive(Debug, Deserialize)]
struct YearCosts {
    year: u32,
    objective_value: f64,
    system_cost: f64,
    costs: IndexMap<String, f64>,
}

/// Represents a row in the summary CSV file
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct SummaryRow {
    year: u32,
    component: String,
    value: f64,
}

/// Represents a row in the debug clusters CSV file
#[derive(Serialize)]
struct ClusterRow {
    year: u32,
    start: String,
    days: usize,
    weight: f64,
    members: usize,
    extreme: bool,
}

/// Represents a row in the debug problem CSV file
#[derive(Serialize)]
struct ProblemRow {
    year: u32,
    kind: &'static str,
    name: String,
    count: usize,
}

/// Writes the results of a simulation to an output folder
pub struct DataWriter {
    output_path: PathBuf,
    debug_model: bool,
}

impl DataWriter {
    /// Prepare to write to an existing output folder
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `debug_model` - Whether to include extra CSV files for debugging the model
    pub fn create(output_path: &Path, debug_model: bool) -> Result<Self> {
        ensure!(
            output_path.is_dir(),
            "Output folder {} does not exist",
            output_path.display()
        );

        Ok(Self {
            output_path: output_path.to_path_buf(),
            debug_model,
        })
    }

    fn year_path(&self, year: u32) -> PathBuf {
        self.output_path.join(format!("{year}.json"))
    }

    fn carry_forward_path(&self, year: u32) -> PathBuf {
        self.output_path.join(format!("carry_forward_{year}.json"))
    }

    /// Whether output for `year` has been written
    pub fn year_written(&self, year: u32) -> bool {
        self.year_path(year).is_file()
    }

    /// Whether `year` can be skipped on resume.
    ///
    /// Every year needs its results and all but the last also the state carried into the next.
    pub fn year_complete(&self, year: u32, is_last: bool) -> bool {
        self.year_written(year) && (is_last || self.carry_forward_path(year).is_file())
    }

    /// Write the results of a solved year, and debug files if requested
    pub fn write_year(&self, model: &Model, outcome: &YearOutcome) -> Result<()> {
        let year = outcome.parameters.year;
        let file_path = self.year_path(year);
        let file = File::create(&file_path).with_context(|| write_err_msg(&file_path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &year_record(model, outcome))?;
        writer.flush()?;
        info!("Results for {year} written to {}", file_path.display());

        if self.debug_model {
            self.write_debug_problem(year, &outcome.formulation)?;
            if let Some(clustering) = &outcome.clustering {
                self.write_debug_clusters(year, &clustering.weeks)?;
            }
        }

        Ok(())
    }

    /// Write the state carried from `year` into the next year
    pub fn write_carry_forward(&self, year: u32, state: &CarryForward) -> Result<()> {
        let file_path = self.carry_forward_path(year);
        let contents = serde_json::to_string_pretty(&CarryForwardRecord::from(state))?;
        fs::write(&file_path, contents).with_context(|| write_err_msg(&file_path))
    }

    /// Read the state carried from `year` into the next year
    pub fn read_carry_forward(&self, year: u32) -> Result<CarryForward> {
        let file_path = self.carry_forward_path(year);
        let contents = fs::read_to_string(&file_path).with_context(|| input_err_msg(&file_path))?;
        let record: CarryForwardRecord =
            serde_json::from_str(&contents).with_context(|| input_err_msg(&file_path))?;

        Ok(record.into())
    }

    fn read_year_costs(&self, year: u32) -> Result<YearCosts> {
        let file_path = self.year_path(year);
        let file = File::open(&file_path).with_context(|| input_err_msg(&file_path))?;
        serde_json::from_reader(BufReader::new(file)).with_context(|| input_err_msg(&file_path))
    }

    /// Write the costs of every year written so far to the summary file
    pub fn write_summary(&self, years: &[u32]) -> Result<()> {
        let file_path = self.output_path.join(SUMMARY_FILE_NAME);
        let mut writer = csv::Writer::from_path(&file_path)?;
        for year in years.iter().filter(|year| self.year_written(**year)) {
            let costs = self.read_year_costs(*year)?;
            let totals = [
                ("objective_value".to_string(), costs.objective_value),
                ("system_cost".to_string(), costs.system_cost),
            ];
            for (component, value) in costs.costs.into_iter().chain(totals) {
                writer.serialize(SummaryRow {
                    year: costs.year,
                    component,
                    value,
                })?;
            }
        }
        writer.flush()?;

        Ok(())
    }

    /// Merge the results of all years into `<run_name>.json`.
    ///
    /// The first line describes the run and each following line is one year's results.
    pub fn merge(&self, model: &Model, run_name: &str, years: &[u32]) -> Result<()> {
        let file_path = self.output_path.join(format!("{run_name}.json"));
        let mut writer = BufWriter::new(File::create(&file_path)?);

        let config = &model.config;
        let meta = serde_json::json!({
            "meta": {
                "name": config.scenario.name,
                "description": config.scenario.description,
                "years": years,
                "discount_rate": config.scenario.discount_rate,
                "policy": config.scenario,
                "solver": "highs",
                "solver_options": config.solver.dispatch_solver_options,
                "cluster": config.advanced.cluster,
                "cluster_sets": config.advanced.cluster_sets,
            }
        });
        writeln!(writer, "{meta}")?;

        for year in years {
            let year_path = self.year_path(*year);
            let file = File::open(&year_path).with_context(|| input_err_msg(&year_path))?;
            for line in BufReader::new(file).lines() {
                writeln!(writer, "{}", line?)?;
            }
        }
        writer.flush()?;
        info!("Merged results written to {}", file_path.display());

        Ok(())
    }

    fn write_debug_problem(&self, year: u32, formulation: &Formulation) -> Result<()> {
        let file_path = self.output_path.join(format!("debug_problem_{year}.csv"));
        let mut writer = csv::Writer::from_path(file_path)?;

        let mut columns: IndexMap<VarName, usize> = IndexMap::new();
        for (key, _) in formulation.columns() {
            *columns.entry(key.name).or_insert(0) += 1;
        }
        for (name, count) in columns {
            writer.serialize(ProblemRow {
                year,
                kind: "column",
                name: name.to_string(),
                count,
            })?;
        }
        for (family, count) in formulation.family_sizes() {
            writer.serialize(ProblemRow {
                year,
                kind: "row",
                name: family.to_string(),
                count,
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    fn write_debug_clusters(&self, year: u32, weeks: &[RepresentativeWeek]) -> Result<()> {
        let file_path = self.output_path.join(format!("debug_clusters_{year}.csv"));
        let mut writer = csv::Writer::from_path(file_path)?;
        for week in weeks {
            writer.serialize(ClusterRow {
                year,
                start: week.start.to_string(),
                days: week.days,
                weight: week.weight,
                members: week.members,
                extreme: week.extreme,
            })?;
        }
        writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::simulation::{RunOptions, simulate_year};
    use rstest::{fixture, rstest};
    use tempfile::tempdir;

    #[fixture]
    fn outcome(model: Model) -> (Model, YearOutcome) {
        let state = CarryForward::initial(&model);
        let outcome = simulate_year(&model, 2020, &state, &RunOptions::default()).unwrap();
        (model, outcome)
    }

    #[rstest]
    #[case(false, false, true, Ok(false))]
    #[case(false, false, false, Err(()))]
    #[case(true, false, false, Ok(true))]
    #[case(false, true, false, Ok(false))]
    fn reuse_output_directory(
        #[case] overwrite: bool,
        #[case] resume: bool,
        #[case] empty: bool,
        #[case] expected: Result<bool, ()>,
    ) {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("out");
        fs::create_dir(&output_dir).unwrap();
        let old_file = output_dir.join("2020.json");
        if !empty {
            fs::write(&old_file, "{}").unwrap();
        }

        let result = create_output_directory(&output_dir, overwrite, resume).map_err(|_| ());
        assert_eq!(result, expected);
        if overwrite && !empty {
            assert!(!old_file.exists());
        }
        if resume && !empty {
            assert!(old_file.exists());
        }
    }

    #[test]
    fn new_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("a").join("b");
        assert!(!create_output_directory(&output_dir, false, false).unwrap());
        assert!(output_dir.is_dir());
    }

    #[rstest]
    fn carry_forward_survives_file(outcome: (Model, YearOutcome)) {
        let (_, outcome) = outcome;
        let dir = tempdir().unwrap();
        let writer = DataWriter::create(dir.path(), false).unwrap();
        let state = outcome.solution.carry_forward(&outcome.parameters);

        writer.write_carry_forward(2020, &state).unwrap();
        assert_eq!(writer.read_carry_forward(2020).unwrap(), state);
        assert!(writer.read_carry_forward(2025).is_err());
    }

    #[rstest]
    fn resume_needs_carry_forward(outcome: (Model, YearOutcome)) {
        let (model, outcome) = outcome;
        let dir = tempdir().unwrap();
        let writer = DataWriter::create(dir.path(), false).unwrap();
        assert!(!writer.year_complete(2020, true));

        // Results without the carried state, e.g. after an interrupted run
        writer.write_year(&model, &outcome).unwrap();
        assert!(writer.year_complete(2020, true));
        assert!(!writer.year_complete(2020, false));

        let state = outcome.solution.carry_forward(&outcome.parameters);
        writer.write_carry_forward(2020, &state).unwrap();
        assert!(writer.year_complete(2020, false));
    }

    #[rstest]
    fn year_output_files(outcome: (Model, YearOutcome)) {
        let (model, outcome) = outcome;
        let dir = tempdir().unwrap();
        let writer = DataWriter::create(dir.path(), true).unwrap();

        assert!(!writer.year_written(2020));
        writer.write_year(&model, &outcome).unwrap();
        assert!(writer.year_written(2020));
        assert!(dir.path().join("debug_problem_2020.csv").is_file());
        // No clustering in the fixture
        assert!(!dir.path().join("debug_clusters_2020.csv").exists());

        let contents = fs::read_to_string(dir.path().join("2020.json")).unwrap();
        let record: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(record["year"], 2020);
        assert_eq!(
            record["duals"]["srmc"].as_array().unwrap().len(),
            model.zones.len() * 24
        );
        assert_eq!(record["vars"]["gen_disp"][0]["index"][2], "2019-07-01 00:00:00");
        assert!(record["vars"]["hyb_cap_new"].is_array());
        assert!(record["costs"].get("shadow").is_none());

        writer.write_summary(&[2020]).unwrap();
        let mut reader = csv::Reader::from_path(dir.path().join(SUMMARY_FILE_NAME)).unwrap();
        let rows: Vec<SummaryRow> = reader.deserialize().map(|row| row.unwrap()).collect();
        assert!(rows.iter().any(|row| row.component == "system_cost"));
        assert!(rows.iter().all(|row| row.year == 2020));

        writer.merge(&model, "test", &[2020]).unwrap();
        let merged = fs::read_to_string(dir.path().join("test.json")).unwrap();
        let lines: Vec<&str> = merged.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("{\"meta\""));
    }
}
