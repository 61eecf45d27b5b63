//! Results of a solved year: variable values, marginal prices and costs.
use crate::formulation::{CostComponent, Formulation, VarIndex, VarKey, VarName};
use crate::input::capacity::CapacityMap;
use crate::model::TransmissionMap;
use crate::model::parameters::{CarryForward, YearParameters, annualised_cost_of_builds};
use crate::region::ZoneID;
use crate::solver::RawSolution;
use crate::timeline::{IntervalID, Timeline};
use crate::units::{Capacity, Money};
use indexmap::IndexMap;
use strum::IntoEnumIterator;

/// Solved first-stage values between these bounds are treated as zero
const ROUNDING_BOUNDS: (f64, f64) = (-1e-6, 1.0);

/// Round a solved capacity decision before it is fixed in a later solve.
///
/// Builds of less than 1 MW and solver noise around zero become exactly zero. Anything else,
/// including larger negative values, is returned unchanged.
pub fn round_first_stage(value: f64) -> f64 {
    let (lower, upper) = ROUNDING_BOUNDS;
    if value > lower && value < upper {
        0.0
    } else {
        value
    }
}

/// The solution of one simulated year
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    values: IndexMap<VarKey, f64>,
    prices: IndexMap<(ZoneID, IntervalID), f64>,
    costs: IndexMap<CostComponent, Money>,
}

impl Solution {
    /// Combine a raw solution with the formulation it solves.
    ///
    /// # Arguments
    ///
    /// * `formulation` - The solved formulation
    /// * `raw` - Column values and row duals from the solver
    /// * `timeline` - The timeline the formulation was built on
    /// * `parameters` - Parameters of the year
    pub fn new(
        formulation: &Formulation,
        raw: &RawSolution,
        timeline: &Timeline,
        parameters: &YearParameters,
    ) -> Self {
        let values: IndexMap<_, _> = formulation
            .columns()
            .map(|(key, _)| *key)
            .zip(raw.columns.iter().copied())
            .collect();

        // Duals are per annual hour; divide by the hours each interval stands for
        let prices = formulation
            .balance_keys()
            .zip_duals(&raw.duals)
            .map(|(&(zone_id, t), dual)| ((zone_id, t), dual / timeline.annual_weight(t)))
            .collect();

        let mut costs: IndexMap<_, _> = CostComponent::iter().map(|c| (c, Money(0.0))).collect();
        for ((_, column), value) in formulation.columns().zip(&raw.columns) {
            for (component, cost) in &column.costs {
                costs[component] += Money(cost * value);
            }
        }
        add_exogenous_costs(&mut costs, parameters);

        Self {
            values,
            prices,
            costs,
        }
    }

    /// Value of a variable, if it exists
    pub fn value(&self, key: &VarKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// All variable values in the order of the formulation
    pub fn values(&self) -> impl Iterator<Item = (&VarKey, f64)> {
        self.values.iter().map(|(key, value)| (key, *value))
    }

    /// Marginal price of energy per zone and interval ($/MWh)
    pub fn prices(&self) -> impl Iterator<Item = (ZoneID, IntervalID, f64)> + '_ {
        self.prices
            .iter()
            .map(|((zone_id, t), price)| (*zone_id, *t, *price))
    }

    /// Annual cost by component, including exogenous builds, retirements and repayments
    pub fn costs(&self) -> &IndexMap<CostComponent, Money> {
        &self.costs
    }

    /// The optimised annual cost, excluding constant terms and shadow penalties
    pub fn objective_value(&self) -> Money {
        self.lp_costs().sum()
    }

    /// Total annual system cost
    pub fn system_cost(&self) -> Money {
        self.costs
            .iter()
            .filter(|(component, _)| **component != CostComponent::Shadow)
            .map(|(_, cost)| *cost)
            .sum()
    }

    fn lp_costs(&self) -> impl Iterator<Item = Money> + '_ {
        self.costs
            .iter()
            .filter(|(component, _)| {
                !matches!(component, CostComponent::Shadow | CostComponent::Repayment)
            })
            .map(|(_, cost)| *cost)
    }

    /// Capacity decisions, rounded, for fixing in the full-year solve
    pub fn first_stage_values(&self) -> impl Iterator<Item = (VarKey, f64)> + '_ {
        self.values
            .iter()
            .filter(|(key, _)| key.name.is_first_stage())
            .map(|(key, value)| (*key, round_first_stage(*value)))
    }

    /// Values of a capacity variable indexed by (zone, technology)
    fn pair_values(&self, names: &[VarName]) -> CapacityMap {
        self.values
            .iter()
            .filter(|(key, _)| names.contains(&key.name))
            .filter_map(|(key, value)| match key.index {
                VarIndex::Pair(zone_id, tech) => Some(((zone_id, tech), Capacity(*value))),
                _ => None,
            })
            .collect()
    }

    /// Values of a capacity variable indexed by link
    fn link_values(&self, name: VarName) -> TransmissionMap {
        self.values
            .iter()
            .filter(|(key, _)| key.name == name)
            .filter_map(|(key, value)| match key.index {
                VarIndex::Link(source, dest) => Some(((source, dest), Capacity(*value))),
                _ => None,
            })
            .collect()
    }

    /// The state the next simulated year starts from.
    ///
    /// Operating capacity becomes the next year's initial capacity and the annualised cost of
    /// this year's builds is added to each zone's carried cost.
    pub fn carry_forward(&self, parameters: &YearParameters) -> CarryForward {
        let capacity = self.pair_values(&[VarName::GenCapOp, VarName::StorCapOp, VarName::HybCapOp]);
        let transmission = self.link_values(VarName::InterconCapOp);
        let new_capacity =
            self.pair_values(&[VarName::GenCapNew, VarName::StorCapNew, VarName::HybCapNew]);
        let new_transmission = self.link_values(VarName::InterconCapNew);

        let cost = parameters
            .carried_cost
            .iter()
            .map(|(zone_id, carried)| {
                let builds =
                    annualised_cost_of_builds(parameters, *zone_id, &new_capacity, &new_transmission);
                (*zone_id, *carried + builds)
            })
            .collect();

        CarryForward {
            capacity,
            transmission,
            cost,
        }
    }
}

/// Costs which do not depend on any decision: exogenous builds and retirements and repayments of
/// earlier builds
fn add_exogenous_costs(costs: &mut IndexMap<CostComponent, Money>, parameters: &YearParameters) {
    for pair in parameters.pairs.values() {
        costs[&CostComponent::Capital] += pair.annualised_build_cost(pair.exogenous_built);
        if pair.capacity_class.has_retirement() {
            costs[&CostComponent::Retirement] += pair.cost_retire * pair.exogenous_retired;
        }
    }
    for link in parameters.links.values() {
        costs[&CostComponent::TransmissionBuild] += link.annualised_build_cost(link.exogenous);
    }
    for zone_id in parameters.carried_cost.keys() {
        costs[&CostComponent::Repayment] += parameters.repayment(*zone_id);
    }
}
