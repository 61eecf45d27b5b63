//! Functionality for running the multi-year simulation.
//!
//! Years are simulated in order. Each year's capacity and cost state is carried into the next, so
//! a year cannot start until the previous one has been solved and written.
use crate::cluster::{ClusterSettings, Clustering, cluster_year};
use crate::config::SolverOptions;
use crate::formulation::{Formulation, ModelOption, VarKey};
use crate::model::Model;
use crate::model::adjust::clip_exogenous_capacity;
use crate::model::parameters::{CarryForward, YearParameters};
use crate::output::DataWriter;
use crate::solution::Solution;
use crate::solver::solve;
use crate::timeline::{Timeline, financial_year_bounds, first_week_bounds};
use crate::trace::SampledTraces;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;

/// How a simulation is run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip years for which output already exists
    pub resume: bool,
    /// Model only the first week of each year, without clustering or merging outputs
    pub template_test: bool,
    /// Write extra CSV files for debugging the model
    pub debug_model: bool,
}

/// Everything produced by simulating one year
#[derive(Debug, Clone)]
pub struct YearOutcome {
    /// Parameters the year was built with, after clipping
    pub parameters: YearParameters,
    /// The intervals of the full-year solve
    pub timeline: Timeline,
    /// The solved full-year formulation
    pub formulation: Formulation,
    /// The full-year solution
    pub solution: Solution,
    /// Representative weeks, if capacity was decided by a clustered solve
    pub clustering: Option<Clustering>,
}

/// Run the simulation.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - Folder to write results to
/// * `run_name` - Name of the merged results file
/// * `options` - How to run
pub fn run(model: &Model, output_path: &Path, run_name: &str, options: &RunOptions) -> Result<()> {
    let writer = DataWriter::create(output_path, options.debug_model)?;
    let years = model.config.years();

    let mut state = CarryForward::initial(model);
    for (idx, &year) in years.iter().enumerate() {
        let is_last = idx + 1 == years.len();

        if options.resume && writer.year_complete(year, is_last) {
            info!("Output for {year} already exists, skipping");
            if !is_last {
                state = writer
                    .read_carry_forward(year)
                    .with_context(|| format!("Cannot resume from year {year}"))?;
            }
            continue;
        }

        info!("Simulating year {year}");
        let outcome = simulate_year(model, year, &state, options)?;

        // The last year has nothing to carry into. Carried state is written before the results.
        let next = if is_last {
            None
        } else {
            let next = outcome.solution.carry_forward(&outcome.parameters);
            writer.write_carry_forward(year, &next)?;
            Some(next)
        };
        writer.write_year(model, &outcome)?;
        if let Some(next) = next {
            state = next;
        }
    }

    writer.write_summary(years)?;
    if options.template_test {
        info!("Template test: results are not merged");
    } else {
        writer.merge(model, run_name, years)?;
    }

    Ok(())
}

/// Build and solve the model for one year.
///
/// With clustering enabled, capacity is decided by a solve over the representative weeks and then
/// fixed in the full-year solve.
pub fn simulate_year(
    model: &Model,
    year: u32,
    state: &CarryForward,
    options: &RunOptions,
) -> Result<YearOutcome> {
    let mut parameters = YearParameters::new(model, year, state)?;
    let clipped = clip_exogenous_capacity(&mut parameters);
    if clipped > 0 {
        warn!("{clipped} exogenous capacity values clipped for year {year}");
    }

    let (start, end) = if options.template_test {
        first_week_bounds(year)?
    } else {
        financial_year_bounds(year)?
    };
    let timeline = Timeline::single(model.traces.timestamps_between(start, end)?)?;
    let traces = sample_traces(model, &timeline)?;
    let policy_options = ModelOption::from_policy(&parameters.policy);
    let mut formulation =
        Formulation::build(model, &parameters, &timeline, &traces, &policy_options);
    drop(traces);

    let clustering = if !model.config.advanced.cluster {
        None
    } else if options.template_test {
        info!("Template test: clustering skipped");
        None
    } else {
        let settings = ClusterSettings::from_config(&model.config.advanced);
        Some(cluster_year(&model.traces, &model.technologies, year, &settings)?)
    };

    if let Some(clustering) = &clustering {
        let capacity = clustered_capacity(
            model,
            &parameters,
            clustering,
            &policy_options,
            &model.config.solver.cluster_solver_options,
        )?;
        debug!("Fixing {} capacity decisions for year {year}", capacity.len());
        formulation = formulation.fix_columns(capacity)?;
    }

    let raw = solve(&formulation, &model.config.solver.dispatch_solver_options)
        .with_context(|| format!("Full-year solve failed for year {year}"))?;
    let solution = Solution::new(&formulation, &raw, &timeline, &parameters);
    info!(
        "Year {year} solved with objective value {:.2}",
        solution.objective_value().value()
    );

    Ok(YearOutcome {
        parameters,
        timeline,
        formulation,
        solution,
        clustering,
    })
}

/// Decide capacity over the representative weeks.
///
/// Unserved energy is always capped here so that the weeks cannot trade building for shortfall.
/// Returns the rounded first-stage decisions.
fn clustered_capacity(
    model: &Model,
    parameters: &YearParameters,
    clustering: &Clustering,
    policy_options: &[ModelOption],
    solver_options: &SolverOptions,
) -> Result<Vec<(VarKey, f64)>> {
    let year = parameters.year;
    let timeline = clustering.timeline(&model.traces)?;
    let traces = sample_traces(model, &timeline)?;

    let mut options = policy_options.to_vec();
    if !options.contains(&ModelOption::UnservedLimit) {
        options.push(ModelOption::UnservedLimit);
    }

    let formulation = Formulation::build(model, parameters, &timeline, &traces, &options);
    let raw = solve(&formulation, solver_options)
        .with_context(|| format!("Clustered capacity solve failed for year {year}"))?;
    let solution = Solution::new(&formulation, &raw, &timeline, parameters);
    info!(
        "Clustered capacity solve for year {year} over {} weeks",
        clustering.weeks.len()
    );

    Ok(solution.first_stage_values().collect())
}

fn sample_traces(model: &Model, timeline: &Timeline) -> Result<SampledTraces> {
    model.traces.sample(
        &model.zones,
        &model.technologies,
        &model.zone_technologies,
        timeline,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::RepresentativeWeek;
    use crate::fixture::model;
    use crate::formulation::{VarIndex, VarName};
    use crate::region::ZoneID;
    use crate::technology::TechnologyID;
    use crate::units::Capacity;
    use chrono::NaiveDate;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn simulate_fixture_year(model: Model) {
        let state = CarryForward::initial(&model);
        let outcome = simulate_year(&model, 2020, &state, &RunOptions::default()).unwrap();

        assert!(outcome.clustering.is_none());
        assert_eq!(outcome.timeline.len(), 24);
        assert_eq!(
            outcome.solution.prices().count(),
            model.zones.len() * outcome.timeline.len()
        );

        // Capacity carried forward is the solved operating capacity
        let next = outcome.solution.carry_forward(&outcome.parameters);
        for (key, capacity) in &next.capacity {
            let value = outcome
                .solution
                .value(&VarKey::new(
                    if model.technologies[&key.1].is_storage() {
                        VarName::StorCapOp
                    } else if model.technologies[&key.1].is_hybrid() {
                        VarName::HybCapOp
                    } else {
                        VarName::GenCapOp
                    },
                    VarIndex::Pair(key.0, key.1),
                ))
                .unwrap();
            assert_approx_eq!(f64, capacity.value(), value);
        }
    }

    #[rstest]
    fn infeasible_year_names_phase(mut model: Model) {
        // Unserved energy cannot be capped if no capacity may be built or kept
        model.config.scenario.unserved_limit = true;
        for zone_technology in model.zone_technologies.values_mut() {
            zone_technology.build_limit = Capacity(0.0);
        }
        model.initial_capacity.clear();

        let state = CarryForward::initial(&model);
        let err = simulate_year(&model, 2020, &state, &RunOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Full-year solve failed for year 2020");
    }

    #[rstest]
    fn clustered_capacity_is_rounded(model: Model) {
        let state = CarryForward::initial(&model);
        let parameters = YearParameters::new(&model, 2020, &state).unwrap();
        // One representative day standing for the whole year
        let clustering = Clustering {
            weeks: vec![RepresentativeWeek {
                start: NaiveDate::from_ymd_opt(2019, 7, 1).unwrap(),
                days: 1,
                weight: 1.0,
                members: 1,
                extreme: false,
            }],
            periods: 1,
        };

        let capacity = clustered_capacity(
            &model,
            &parameters,
            &clustering,
            &[],
            &SolverOptions::new(),
        )
        .unwrap();
        assert!(capacity.iter().all(|(key, _)| key.name.is_first_stage()));
        assert!(capacity.iter().all(|(_, value)| *value == 0.0 || value.abs() >= 1.0));
        assert!(capacity.iter().any(|(key, _)| *key
            == VarKey::new(
                VarName::GenCapNew,
                VarIndex::Pair(ZoneID(1), TechnologyID(8))
            )));
    }
}
