//! The linear program of one simulated year.
//!
//! A [`Formulation`] is built once from the model, the year's parameters and a timeline, and is
//! not modified afterwards except to fix first-stage decisions to values found by the clustered
//! capacity solve. It does not depend on a particular solver: [`crate::solver`] translates it into
//! a HiGHS problem.
//!
//! Every decision variable is a column identified by a [`VarKey`]. Constraints are grouped into
//! families, each built by a pure function of the [`FormulationContext`]. The load balance
//! constraints always come first so that their dual values, the marginal prices, can be found
//! by position.
use crate::config::YearPolicy;
use crate::model::Model;
use crate::model::parameters::YearParameters;
use crate::region::{RegionID, ZoneID};
use crate::technology::TechnologyID;
use crate::timeline::{IntervalID, Timeline};
use crate::trace::SampledTraces;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use std::ops::Range;
use strum::{Display, EnumIter};

pub mod balance;
pub mod capacity;
pub mod commitment;
pub mod policy;
pub mod storage;
pub mod variables;

/// Cost of unserved energy ($/MWh)
pub const COST_UNSERVED: f64 = 980_000.0;

/// Shadow cost of surplus energy ($/MWh)
pub const COST_SURPLUS: f64 = COST_UNSERVED + 10.0;

/// Cost of moving energy over an interconnector ($/MWh)
pub const COST_TRANSMISSION_FLOW: f64 = 0.02339;

/// Unserved energy may not exceed this fraction of a region's demand when capped
pub const UNSERVED_LIMIT_FRACTION: f64 = 2e-5;

/// A column of the problem, by position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(usize);

impl Var {
    /// Position of the column in the problem
    pub fn index(self) -> usize {
        self.0
    }
}

/// The kind of a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VarName {
    /// New generation capacity
    GenCapNew,
    /// Operating generation capacity
    GenCapOp,
    /// Endogenously retired generation capacity
    GenCapRet,
    /// New storage capacity
    StorCapNew,
    /// Operating storage capacity
    StorCapOp,
    /// New hybrid capacity
    HybCapNew,
    /// Operating hybrid capacity
    HybCapOp,
    /// New transfer capacity
    InterconCapNew,
    /// Operating transfer capacity
    InterconCapOp,
    /// Generator output
    GenDisp,
    /// Committed capacity
    GenDispCom,
    /// Capacity started up
    GenDispComP,
    /// Capacity shut down
    GenDispComM,
    /// Capacity which has been on for at least its minimum up-time
    GenDispComS,
    /// Storage output
    StorDisp,
    /// Storage charging
    StorCharge,
    /// Stored energy
    StorLevel,
    /// Storage output held in reserve
    StorReserve,
    /// Hybrid output
    HybDisp,
    /// Hybrid charging from its collector
    HybCharge,
    /// Energy stored in a hybrid
    HybLevel,
    /// Hybrid output held in reserve
    HybReserve,
    /// Unserved energy
    Unserved,
    /// Surplus energy
    Surplus,
    /// Flow on an interconnector
    InterconDisp,
}

impl VarName {
    /// Whether the variable is a capacity decision shared by every interval of the year
    pub fn is_first_stage(self) -> bool {
        matches!(
            self,
            Self::GenCapNew
                | Self::GenCapRet
                | Self::StorCapNew
                | Self::HybCapNew
                | Self::InterconCapNew
        )
    }
}

/// The index of a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarIndex {
    /// A (zone, technology) pair
    Pair(ZoneID, TechnologyID),
    /// A (zone, technology) pair in an interval
    PairInterval(ZoneID, TechnologyID, IntervalID),
    /// A zone in an interval
    ZoneInterval(ZoneID, IntervalID),
    /// A directed link
    Link(ZoneID, ZoneID),
    /// A directed link in an interval
    LinkInterval(ZoneID, ZoneID, IntervalID),
}

impl VarIndex {
    /// The interval, for time-indexed variables
    pub fn interval(&self) -> Option<IntervalID> {
        match self {
            Self::Pair(..) | Self::Link(..) => None,
            Self::PairInterval(_, _, t) | Self::ZoneInterval(_, t) | Self::LinkInterval(_, _, t) => {
                Some(*t)
            }
        }
    }
}

/// Identifies a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarKey {
    /// The kind of variable
    pub name: VarName,
    /// Its index
    pub index: VarIndex,
}

impl VarKey {
    /// Create a new [`VarKey`]
    pub fn new(name: VarName, index: VarIndex) -> Self {
        Self { name, index }
    }
}

/// A component of the annual system cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CostComponent {
    /// Annualised cost of new generation, storage and hybrid capacity
    Capital,
    /// Annualised cost of capacity built in earlier years
    Repayment,
    /// Fixed O&M
    Fixed,
    /// Variable O&M
    Operating,
    /// Fuel, including startup fuel
    Fuel,
    /// Unserved energy
    Unserved,
    /// Annualised cost of new transfer capacity
    TransmissionBuild,
    /// Flow over interconnectors
    TransmissionFlow,
    /// Cost of emissions
    Emissions,
    /// Endogenous and exogenous retirement
    Retirement,
    /// Penalty on surplus energy, not part of the system cost
    Shadow,
}

/// A decision variable with its bounds and objective coefficients
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Annual cost per unit, by cost component
    pub costs: Vec<(CostComponent, f64)>,
}

impl Column {
    /// A non-negative variable without cost
    pub fn free() -> Self {
        Self {
            lower: 0.0,
            upper: f64::INFINITY,
            costs: Vec::new(),
        }
    }

    /// A non-negative variable with a single cost
    pub fn with_cost(component: CostComponent, cost: f64) -> Self {
        let mut column = Self::free();
        column.add_cost(component, cost);
        column
    }

    /// Add to the cost of the variable, ignoring zero coefficients
    pub fn add_cost(&mut self, component: CostComponent, cost: f64) {
        if cost != 0.0 {
            self.costs.push((component, cost));
        }
    }

    /// Objective coefficient
    pub fn cost(&self) -> f64 {
        self.costs.iter().map(|(_, cost)| cost).sum()
    }
}

/// A linear constraint `lower <= sum(coeff * var) <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Coefficients of the variables
    pub terms: Vec<(Var, f64)>,
}

impl Row {
    /// `sum(terms) == rhs`
    pub fn equal(terms: Vec<(Var, f64)>, rhs: f64) -> Self {
        Self {
            lower: rhs,
            upper: rhs,
            terms,
        }
    }

    /// `sum(terms) <= rhs`
    pub fn at_most(terms: Vec<(Var, f64)>, rhs: f64) -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: rhs,
            terms,
        }
    }

    /// `sum(terms) >= rhs`
    pub fn at_least(terms: Vec<(Var, f64)>, rhs: f64) -> Self {
        Self {
            lower: rhs,
            upper: f64::INFINITY,
            terms,
        }
    }

    /// Evaluate the left-hand side for the given column values
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values[var.index()])
            .sum()
    }
}

/// A family of constraints built by one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConstraintFamily {
    /// Supply equals demand in every zone and interval
    LoadBalance,
    /// Operating generation capacity
    GenCapacity,
    /// Operating storage capacity
    StorCapacity,
    /// Operating hybrid capacity
    HybCapacity,
    /// Dispatch within the available capacity
    CapacityFactor,
    /// Operating capacity within the build limit
    BuildLimit,
    /// Storage state of charge
    StorLevel,
    /// Storage charge, discharge and reserve within capacity
    StorFlow,
    /// Storage reserve backed by stored energy
    StorReserve,
    /// Stored energy within the hours of storage
    StorMaxLevel,
    /// Hybrid state of charge
    HybLevel,
    /// Hybrid charging within the collector output
    HybCharge,
    /// Hybrid discharge and reserve within capacity
    HybFlow,
    /// Hybrid reserve backed by stored energy
    HybReserve,
    /// Hybrid stored energy within the hours of storage
    HybMaxLevel,
    /// Dispatch above the minimum stable load of committed capacity
    MinLoad,
    /// Ramping down limited by shutdowns
    RampDown,
    /// Ramping up limited by startups
    RampUp,
    /// Shutdowns limited to capacity past its minimum up-time
    RampDownUptime,
    /// Capacity past its minimum up-time
    Uptime,
    /// Committed capacity follows startups and shutdowns
    CommittedCapacity,
    /// Operating transfer capacity
    InterconCapacity,
    /// Flow within transfer capacity
    InterconFlow,
    /// Caps on annual generation
    GenerationLimit,
    /// Cap on unserved energy per region
    UnservedLimit,
    /// Cap on system-wide emissions
    EmissionLimit,
    /// System-wide renewable share
    NemRetRatio,
    /// System-wide renewable energy
    NemRetGwh,
    /// Renewable share per region
    RegionRetRatio,
    /// Operating reserve margin per region and interval
    OperatingReserve,
    /// Dispatchable share of generation per region and interval
    NemReDispRatio,
}

/// A policy setting which adds constraints or changes bounds
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOption {
    /// Cap unserved energy in each region
    UnservedLimit,
    /// Cap system-wide emissions (Mt CO2 per year)
    EmissionLimit(f64),
    /// Minimum system-wide renewable share
    NemRetRatio(f64),
    /// Minimum system-wide renewable energy (GWh per year)
    NemRetGwh(f64),
    /// Minimum renewable share of a region
    RegionRetRatio(RegionID, f64),
    /// Minimum operating reserve as a share of demand
    OperatingReserve(f64),
    /// Minimum dispatchable share of hourly generation
    NemReDispRatio(f64),
    /// Transmission is only built where allowed
    ManualTransmission {
        /// Whether new transfer capacity may be built this year
        build_allowed: bool,
    },
}

impl ModelOption {
    /// The options enabled by a year's policy settings
    pub fn from_policy(policy: &YearPolicy) -> Vec<ModelOption> {
        let mut options = Vec::new();
        if policy.unserved_limit {
            options.push(Self::UnservedLimit);
        }
        if let Some(limit) = policy.nem_emit_limit {
            options.push(Self::EmissionLimit(limit));
        }
        if let Some(ratio) = policy.nem_ret_ratio {
            options.push(Self::NemRetRatio(ratio));
        }
        if let Some(gwh) = policy.nem_ret_gwh {
            options.push(Self::NemRetGwh(gwh));
        }
        for (region_id, ratio) in &policy.region_ret_ratio {
            options.push(Self::RegionRetRatio(*region_id, *ratio));
        }
        if let Some(ratio) = policy.nem_disp_ratio {
            options.push(Self::OperatingReserve(ratio));
        }
        if let Some(ratio) = policy.nem_re_disp_ratio {
            options.push(Self::NemReDispRatio(ratio));
        }
        if let Some(build_allowed) = policy.manual_intercon_build {
            options.push(Self::ManualTransmission { build_allowed });
        }

        options
    }

    /// The constraint families the option contributes
    pub fn families(&self) -> &'static [ConstraintFamily] {
        match self {
            Self::UnservedLimit => &[ConstraintFamily::UnservedLimit],
            Self::EmissionLimit(_) => &[ConstraintFamily::EmissionLimit],
            Self::NemRetRatio(_) => &[ConstraintFamily::NemRetRatio],
            Self::NemRetGwh(_) => &[ConstraintFamily::NemRetGwh],
            Self::RegionRetRatio(..) => &[ConstraintFamily::RegionRetRatio],
            Self::OperatingReserve(_) => &[ConstraintFamily::OperatingReserve],
            Self::NemReDispRatio(_) => &[ConstraintFamily::NemReDispRatio],
            Self::ManualTransmission { .. } => &[],
        }
    }

    /// Whether the option allows new transfer capacity
    fn allows_transmission_build(&self) -> bool {
        !matches!(
            self,
            Self::ManualTransmission {
                build_allowed: false
            }
        )
    }
}

/// Constraint families present in every formulation, after the load balance
const CORE_FAMILIES: [ConstraintFamily; 23] = [
    ConstraintFamily::GenCapacity,
    ConstraintFamily::StorCapacity,
    ConstraintFamily::HybCapacity,
    ConstraintFamily::CapacityFactor,
    ConstraintFamily::BuildLimit,
    ConstraintFamily::StorLevel,
    ConstraintFamily::StorFlow,
    ConstraintFamily::StorReserve,
    ConstraintFamily::StorMaxLevel,
    ConstraintFamily::HybLevel,
    ConstraintFamily::HybCharge,
    ConstraintFamily::HybFlow,
    ConstraintFamily::HybReserve,
    ConstraintFamily::HybMaxLevel,
    ConstraintFamily::MinLoad,
    ConstraintFamily::RampDown,
    ConstraintFamily::RampUp,
    ConstraintFamily::RampDownUptime,
    ConstraintFamily::Uptime,
    ConstraintFamily::CommittedCapacity,
    ConstraintFamily::InterconCapacity,
    ConstraintFamily::InterconFlow,
    ConstraintFamily::GenerationLimit,
];

/// Build the rows of a core constraint family
fn core_rows(ctx: &FormulationContext, family: ConstraintFamily) -> Vec<Row> {
    match family {
        ConstraintFamily::GenCapacity => capacity::gen_capacity(ctx),
        ConstraintFamily::StorCapacity => capacity::stor_capacity(ctx),
        ConstraintFamily::HybCapacity => capacity::hyb_capacity(ctx),
        ConstraintFamily::CapacityFactor => capacity::capacity_factor(ctx),
        ConstraintFamily::BuildLimit => capacity::build_limit(ctx),
        ConstraintFamily::StorLevel => storage::stor_level(ctx),
        ConstraintFamily::StorFlow => storage::stor_flow(ctx),
        ConstraintFamily::StorReserve => storage::stor_reserve(ctx),
        ConstraintFamily::StorMaxLevel => storage::stor_max_level(ctx),
        ConstraintFamily::HybLevel => storage::hyb_level(ctx),
        ConstraintFamily::HybCharge => storage::hyb_charge(ctx),
        ConstraintFamily::HybFlow => storage::hyb_flow(ctx),
        ConstraintFamily::HybReserve => storage::hyb_reserve(ctx),
        ConstraintFamily::HybMaxLevel => storage::hyb_max_level(ctx),
        ConstraintFamily::MinLoad => commitment::min_load(ctx),
        ConstraintFamily::RampDown => commitment::ramp_down(ctx),
        ConstraintFamily::RampUp => commitment::ramp_up(ctx),
        ConstraintFamily::RampDownUptime => commitment::ramp_down_uptime(ctx),
        ConstraintFamily::Uptime => commitment::uptime(ctx),
        ConstraintFamily::CommittedCapacity => commitment::committed_capacity(ctx),
        ConstraintFamily::InterconCapacity => capacity::intercon_capacity(ctx),
        ConstraintFamily::InterconFlow => capacity::intercon_flow(ctx),
        ConstraintFamily::GenerationLimit => policy::generation_limits(ctx),
        ConstraintFamily::LoadBalance
        | ConstraintFamily::UnservedLimit
        | ConstraintFamily::EmissionLimit
        | ConstraintFamily::NemRetRatio
        | ConstraintFamily::NemRetGwh
        | ConstraintFamily::RegionRetRatio
        | ConstraintFamily::OperatingReserve
        | ConstraintFamily::NemReDispRatio => Vec::new(),
    }
}

/// Keys of a block of constraints along with the row offset of the block
#[derive(Debug, Clone, PartialEq)]
pub struct KeysWithOffset<T> {
    offset: usize,
    keys: Vec<T>,
}

impl<T> KeysWithOffset<T> {
    /// Zip the keys with the corresponding dual values in the solution, accounting for the offset
    pub fn zip_duals<'a>(&'a self, duals: &'a [f64]) -> impl Iterator<Item = (&'a T, f64)> {
        assert!(
            self.offset + self.keys.len() <= duals.len(),
            "Bad constraint keys: dual rows out of range"
        );

        self.keys.iter().zip(duals[self.offset..].iter().copied())
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether there are no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The (zone, interval) of each load balance constraint
pub type BalanceKeys = KeysWithOffset<(ZoneID, IntervalID)>;

/// Everything a constraint rule may read
pub struct FormulationContext<'a> {
    /// The model
    pub model: &'a Model,
    /// Parameters for the year
    pub parameters: &'a YearParameters,
    /// The modelled intervals
    pub timeline: &'a Timeline,
    /// Demand and capacity factors at the modelled intervals
    pub traces: &'a SampledTraces,
    columns: &'a IndexMap<VarKey, Column>,
}

impl FormulationContext<'_> {
    /// Look up a variable.
    ///
    /// # Panics
    ///
    /// If the variable was not created, which means the index sets are inconsistent.
    pub fn var(&self, name: VarName, index: VarIndex) -> Var {
        Var(self
            .columns
            .get_index_of(&VarKey::new(name, index))
            .expect("No variable found for given key"))
    }

    /// A variable indexed by (zone, technology)
    pub fn pair_var(&self, name: VarName, zone_id: ZoneID, technology_id: TechnologyID) -> Var {
        self.var(name, VarIndex::Pair(zone_id, technology_id))
    }

    /// A variable indexed by (zone, technology, interval)
    pub fn pair_interval_var(
        &self,
        name: VarName,
        zone_id: ZoneID,
        technology_id: TechnologyID,
        t: IntervalID,
    ) -> Var {
        self.var(name, VarIndex::PairInterval(zone_id, technology_id, t))
    }

    /// A variable indexed by (zone, interval)
    pub fn zone_interval_var(&self, name: VarName, zone_id: ZoneID, t: IntervalID) -> Var {
        self.var(name, VarIndex::ZoneInterval(zone_id, t))
    }

    /// A variable indexed by (source, dest)
    pub fn link_var(&self, name: VarName, source: ZoneID, dest: ZoneID) -> Var {
        self.var(name, VarIndex::Link(source, dest))
    }

    /// A variable indexed by (source, dest, interval)
    pub fn link_interval_var(
        &self,
        name: VarName,
        source: ZoneID,
        dest: ZoneID,
        t: IntervalID,
    ) -> Var {
        self.var(name, VarIndex::LinkInterval(source, dest, t))
    }

    /// Hours of the year represented by interval `t`
    pub fn weight(&self, t: IntervalID) -> f64 {
        self.timeline.annual_weight(t)
    }
}

/// The linear program of one simulated year
#[derive(Debug, Clone, PartialEq)]
pub struct Formulation {
    columns: IndexMap<VarKey, Column>,
    rows: Vec<Row>,
    families: Vec<(ConstraintFamily, Range<usize>)>,
    balance_keys: BalanceKeys,
    options: Vec<ModelOption>,
}

impl Formulation {
    /// Build the formulation.
    ///
    /// # Arguments
    ///
    /// * `model` - The model
    /// * `parameters` - Parameters for the year
    /// * `timeline` - The modelled intervals
    /// * `traces` - Traces sampled at the modelled intervals
    /// * `options` - Policy settings
    pub fn build(
        model: &Model,
        parameters: &YearParameters,
        timeline: &Timeline,
        traces: &SampledTraces,
        options: &[ModelOption],
    ) -> Self {
        let allow_transmission_build = options
            .iter()
            .all(ModelOption::allows_transmission_build);
        let columns =
            variables::add_variables(model, parameters, timeline, allow_transmission_build);
        let ctx = FormulationContext {
            model,
            parameters,
            timeline,
            traces,
            columns: &columns,
        };

        let mut rows = Vec::new();
        let mut families = Vec::new();
        let mut push = |family: ConstraintFamily, new_rows: Vec<Row>| {
            let start = rows.len();
            rows.extend(new_rows);
            families.push((family, start..rows.len()));
        };

        // Must come first: duals are read by position
        let (keys, balance_rows) = balance::load_balance(&ctx);
        let balance_keys = BalanceKeys {
            offset: 0,
            keys,
        };
        push(ConstraintFamily::LoadBalance, balance_rows);

        for family in CORE_FAMILIES {
            push(family, core_rows(&ctx, family));
        }
        for option in options {
            for family in option.families() {
                push(*family, policy::option_rows(&ctx, option));
            }
        }

        let formulation = Self {
            columns,
            rows,
            families,
            balance_keys,
            options: options.to_vec(),
        };
        debug!(
            "Formulation for {} has {} columns and {} rows",
            parameters.year,
            formulation.num_columns(),
            formulation.num_rows()
        );

        formulation
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// The columns in order
    pub fn columns(&self) -> impl Iterator<Item = (&VarKey, &Column)> {
        self.columns.iter()
    }

    /// Look up a column
    pub fn column(&self, key: &VarKey) -> Option<&Column> {
        self.columns.get(key)
    }

    /// The rows in order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The rows of a constraint family
    pub fn family_rows(&self, family: ConstraintFamily) -> impl Iterator<Item = &Row> {
        self.families
            .iter()
            .filter(move |(f, _)| *f == family)
            .flat_map(|(_, range)| &self.rows[range.clone()])
    }

    /// Number of rows per constraint family
    pub fn family_sizes(&self) -> IndexMap<ConstraintFamily, usize> {
        let mut sizes = IndexMap::new();
        for (family, range) in &self.families {
            *sizes.entry(*family).or_insert(0) += range.len();
        }
        sizes
    }

    /// Keys of the load balance constraints
    pub fn balance_keys(&self) -> &BalanceKeys {
        &self.balance_keys
    }

    /// The policy settings the formulation was built with
    pub fn options(&self) -> &[ModelOption] {
        &self.options
    }

    /// Fix variables to the given values by setting both bounds
    pub fn fix_columns<I>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (VarKey, f64)>,
    {
        for (key, value) in values {
            let column = self
                .columns
                .get_mut(&key)
                .with_context(|| format!("Cannot fix unknown variable {key:?}"))?;
            column.lower = value;
            column.upper = value;
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{formulation, model, sampled_traces, timeline, year_parameters};
    use crate::model::Model;
    use rstest::rstest;

    #[rstest]
    fn balance_rows_come_first(formulation: Formulation, timeline: Timeline, model: Model) {
        let keys = formulation.balance_keys();
        assert_eq!(keys.len(), model.zones.len() * timeline.len());
        let duals: Vec<f64> = (0..formulation.num_rows()).map(|i| i as f64).collect();
        let first = keys.zip_duals(&duals).next().unwrap();
        assert_eq!(first.1, 0.0);
        assert_eq!(
            formulation.family_sizes()[&ConstraintFamily::LoadBalance],
            keys.len()
        );
    }

    #[rstest]
    fn variables_follow_sparsity(formulation: Formulation) {
        // Storage is only declared in zone 1 and hybrids only in zone 2
        assert!(formulation
            .column(&VarKey::new(
                VarName::StorCapOp,
                VarIndex::Pair(ZoneID(1), TechnologyID(15))
            ))
            .is_some());
        assert!(formulation
            .columns()
            .all(|(key, _)| !matches!(key.index, VarIndex::Pair(ZoneID(3), TechnologyID(15)))));
        // Hydro is no-build
        assert!(formulation
            .column(&VarKey::new(
                VarName::GenCapNew,
                VarIndex::Pair(ZoneID(3), TechnologyID(18))
            ))
            .is_none());
        // Commitment variables only for the commitment technology
        assert!(formulation.columns().all(|(key, _)| key.name != VarName::GenDispCom
            || matches!(key.index, VarIndex::PairInterval(_, TechnologyID(2), _))));
    }

    #[rstest]
    fn disabled_options_add_nothing(
        model: Model,
        year_parameters: YearParameters,
        timeline: Timeline,
        sampled_traces: SampledTraces,
    ) {
        let plain = Formulation::build(&model, &year_parameters, &timeline, &sampled_traces, &[]);
        let manual = Formulation::build(
            &model,
            &year_parameters,
            &timeline,
            &sampled_traces,
            &[ModelOption::ManualTransmission {
                build_allowed: true,
            }],
        );
        assert_eq!(plain.rows(), manual.rows());
        assert_eq!(plain.num_columns(), manual.num_columns());
    }

    #[rstest]
    fn manual_transmission_blocks_builds(
        model: Model,
        year_parameters: YearParameters,
        timeline: Timeline,
        sampled_traces: SampledTraces,
    ) {
        let formulation = Formulation::build(
            &model,
            &year_parameters,
            &timeline,
            &sampled_traces,
            &[ModelOption::ManualTransmission {
                build_allowed: false,
            }],
        );
        let column = formulation
            .column(&VarKey::new(
                VarName::InterconCapNew,
                VarIndex::Link(ZoneID(1), ZoneID(2)),
            ))
            .unwrap();
        assert_eq!((column.lower, column.upper), (0.0, 0.0));
    }

    #[rstest]
    #[case(ModelOption::UnservedLimit, ConstraintFamily::UnservedLimit, 2)]
    #[case(ModelOption::EmissionLimit(10.0), ConstraintFamily::EmissionLimit, 1)]
    #[case(ModelOption::NemRetRatio(0.5), ConstraintFamily::NemRetRatio, 1)]
    #[case(ModelOption::RegionRetRatio(RegionID(1), 0.5), ConstraintFamily::RegionRetRatio, 1)]
    #[case(ModelOption::OperatingReserve(0.1), ConstraintFamily::OperatingReserve, 2 * 24)]
    #[case(ModelOption::NemReDispRatio(0.1), ConstraintFamily::NemReDispRatio, 2 * 24)]
    fn options_add_families(
        model: Model,
        year_parameters: YearParameters,
        timeline: Timeline,
        sampled_traces: SampledTraces,
        #[case] option: ModelOption,
        #[case] family: ConstraintFamily,
        #[case] num_rows: usize,
    ) {
        let formulation =
            Formulation::build(&model, &year_parameters, &timeline, &sampled_traces, &[option]);
        assert_eq!(formulation.family_sizes()[&family], num_rows);
    }

    #[rstest]
    fn fixing_columns(formulation: Formulation) {
        let key = VarKey::new(VarName::GenCapNew, VarIndex::Pair(ZoneID(1), TechnologyID(8)));
        let formulation = formulation.fix_columns([(key, 120.0)]).unwrap();
        let column = formulation.column(&key).unwrap();
        assert_eq!((column.lower, column.upper), (120.0, 120.0));

        let unknown = VarKey::new(VarName::GenCapNew, VarIndex::Pair(ZoneID(3), TechnologyID(18)));
        assert!(formulation.fix_columns([(unknown, 1.0)]).is_err());
    }

    #[test]
    fn options_from_policy() {
        let policy = YearPolicy {
            nem_ret_ratio: Some(0.3),
            region_ret_ratio: [(RegionID(1), 0.4), (RegionID(2), 0.2)]
                .into_iter()
                .collect(),
            manual_intercon_build: Some(false),
            ..YearPolicy::default()
        };
        let options = ModelOption::from_policy(&policy);
        assert_eq!(
            options,
            [
                ModelOption::NemRetRatio(0.3),
                ModelOption::RegionRetRatio(RegionID(1), 0.4),
                ModelOption::RegionRetRatio(RegionID(2), 0.2),
                ModelOption::ManualTransmission {
                    build_allowed: false
                },
            ]
        );
        assert!(options[3].families().is_empty());
    }
}
