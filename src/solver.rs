//! Solve a [`Formulation`] with HiGHS.
use crate::config::{SolverOptionValue, SolverOptions};
use crate::formulation::{Formulation, Row};
use highs::{HighsModelStatus, HighsStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use log::{debug, info};
use std::fmt;

/// A decision variable in the HiGHS problem
type Variable = highs::Col;

/// The ways a solve can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelError {
    /// HiGHS rejected the problem or failed to run
    Incoherent(HighsStatus),
    /// HiGHS ran but did not find an optimal solution
    NonOptimal(HighsModelStatus),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Incoherent(status) => write!(f, "Incoherent model: {status:?}"),
            ModelError::NonOptimal(status) => write!(f, "No optimal solution found: {status:?}"),
        }
    }
}

impl std::error::Error for ModelError {}

/// Column values and row duals of an optimal solution
#[derive(Debug, Clone, PartialEq)]
pub struct RawSolution {
    /// Value of each column, in the order of the formulation
    pub columns: Vec<f64>,
    /// Dual value of each row, in the order of the formulation
    pub duals: Vec<f64>,
}

/// Solve a formulation to optimality.
///
/// # Arguments
///
/// * `formulation` - The problem to solve
/// * `options` - HiGHS options, passed through unchanged
pub fn solve(formulation: &Formulation, options: &SolverOptions) -> Result<RawSolution, ModelError> {
    let mut problem = Problem::default();
    let variables: Vec<Variable> = formulation
        .columns()
        .map(|(_, column)| problem.add_column(column.cost(), column.lower..=column.upper))
        .collect();
    for row in formulation.rows() {
        problem.add_row(row.lower..=row.upper, merged_terms(row, &variables));
    }
    debug!(
        "Solving problem with {} columns and {} rows",
        formulation.num_columns(),
        formulation.num_rows()
    );

    let mut model = problem.optimise(Sense::Minimise);
    enable_highs_logging(&mut model);
    for (name, value) in options {
        info!("Setting solver option {name}={value}");
        match value {
            SolverOptionValue::Bool(value) => model.set_option(name.as_str(), *value),
            SolverOptionValue::Int(value) => model.set_option(name.as_str(), *value),
            SolverOptionValue::Float(value) => model.set_option(name.as_str(), *value),
            SolverOptionValue::String(value) => model.set_option(name.as_str(), value.as_str()),
        }
    }

    let solved = model.try_solve().map_err(ModelError::Incoherent)?;
    match solved.status() {
        HighsModelStatus::Optimal => {
            let solution = solved.get_solution();
            Ok(RawSolution {
                columns: solution.columns().to_vec(),
                duals: solution.dual_rows().to_vec(),
            })
        }
        status => Err(ModelError::NonOptimal(status)),
    }
}

/// The terms of a row with repeated variables combined.
///
/// A wrapped-around reference to the same interval, as in a one-interval segment, would
/// otherwise give HiGHS duplicate entries.
fn merged_terms(row: &Row, variables: &[Variable]) -> Vec<(Variable, f64)> {
    let mut merged: IndexMap<usize, f64> = IndexMap::new();
    for (var, coeff) in &row.terms {
        *merged.entry(var.index()).or_insert(0.0) += coeff;
    }

    merged
        .into_iter()
        .filter(|(_, coeff)| *coeff != 0.0)
        .map(|(idx, coeff)| (variables[idx], coeff))
        .collect()
}

/// Enable the HiGHS console log if solver output is wanted
fn enable_highs_logging(model: &mut highs::Model) {
    if !crate::log::solver_output_enabled() {
        model.set_option("output_flag", false);
        return;
    }

    model.set_option("log_to_console", true);
    model.set_option("output_flag", true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::formulation;
    use rstest::rstest;

    #[test]
    fn model_error_messages() {
        assert_eq!(
            ModelError::NonOptimal(HighsModelStatus::Infeasible).to_string(),
            "No optimal solution found: Infeasible"
        );
        assert_eq!(
            ModelError::Incoherent(HighsStatus::Error).to_string(),
            "Incoherent model: Error"
        );
    }

    #[rstest]
    fn solves_fixture(formulation: Formulation) {
        let solution = solve(&formulation, &SolverOptions::new()).unwrap();
        assert_eq!(solution.columns.len(), formulation.num_columns());
        assert_eq!(solution.duals.len(), formulation.num_rows());

        // Every row holds to tolerance
        for row in formulation.rows() {
            let activity = row.activity(&solution.columns);
            assert!(activity >= row.lower - 1e-4 && activity <= row.upper + 1e-4);
        }
    }

    #[rstest]
    fn infeasible_bounds(formulation: Formulation) {
        use crate::formulation::{VarIndex, VarKey, VarName};
        use crate::region::ZoneID;
        use crate::technology::TechnologyID;

        // Operating capacity of no-build hydro is fixed by its initial capacity
        let key = VarKey::new(VarName::GenCapOp, VarIndex::Pair(ZoneID(3), TechnologyID(18)));
        let formulation = formulation.fix_columns([(key, 50.0)]).unwrap();
        let err = solve(&formulation, &SolverOptions::new()).unwrap_err();
        assert!(matches!(err, ModelError::NonOptimal(_)));
    }
}
