//! Creation of the decision variables and their objective coefficients.
//!
//! Variables are only created where they apply: new capacity for buildable pairs, retirement for
//! retireable generators and commitment variables for generators subject to unit commitment.
//! Costs are annual: per-interval costs are scaled by the hours of the year each interval
//! represents.
use super::{
    COST_SURPLUS, COST_TRANSMISSION_FLOW, COST_UNSERVED, Column, CostComponent, VarIndex, VarKey,
    VarName,
};
use crate::model::Model;
use crate::model::parameters::{PairParameters, YearParameters};
use crate::model::sets::TechSet;
use crate::region::ZoneID;
use crate::technology::{CommitmentParameters, Technology, TechnologyID};
use crate::timeline::{IntervalID, Timeline};
use crate::units::Capacity;
use indexmap::IndexMap;

/// Emission rates are in kg/MWh and emission costs in $/tonne
const KG_PER_TONNE: f64 = 1000.0;

/// Names of the capacity variables of each kind of technology
struct CapacityNames {
    new: VarName,
    op: VarName,
}

const GEN: CapacityNames = CapacityNames {
    new: VarName::GenCapNew,
    op: VarName::GenCapOp,
};
const STOR: CapacityNames = CapacityNames {
    new: VarName::StorCapNew,
    op: VarName::StorCapOp,
};
const HYB: CapacityNames = CapacityNames {
    new: VarName::HybCapNew,
    op: VarName::HybCapOp,
};

/// Create every variable of the formulation.
///
/// Capacity variables come first, followed by the per-interval variables.
pub fn add_variables(
    model: &Model,
    parameters: &YearParameters,
    timeline: &Timeline,
    allow_transmission_build: bool,
) -> IndexMap<VarKey, Column> {
    let mut columns = IndexMap::new();
    let sets = &model.sets;

    for (set, names) in [
        (TechSet::Generator, GEN),
        (TechSet::Storage, STOR),
        (TechSet::Hybrid, HYB),
    ] {
        for (zone_id, technology_id) in sets.pairs(set) {
            let pair = parameters.pair(zone_id, technology_id);
            let index = VarIndex::Pair(zone_id, technology_id);
            if pair.capacity_class.has_new_build() {
                let cost = pair.annualised_build_cost(Capacity(1.0));
                columns.insert(
                    VarKey::new(names.new, index),
                    Column::with_cost(CostComponent::Capital, cost.value()),
                );
            }
            columns.insert(
                VarKey::new(names.op, index),
                Column::with_cost(CostComponent::Fixed, pair.cost_fom.value()),
            );
        }
    }
    for (zone_id, technology_id) in sets.pairs(TechSet::Retireable) {
        let pair = parameters.pair(zone_id, technology_id);
        columns.insert(
            VarKey::new(VarName::GenCapRet, VarIndex::Pair(zone_id, technology_id)),
            Column::with_cost(CostComponent::Retirement, pair.cost_retire.value()),
        );
    }

    for ((source, dest), link) in &parameters.links {
        let mut new = Column::with_cost(
            CostComponent::TransmissionBuild,
            link.annualised_build_cost(Capacity(1.0)).value(),
        );
        if !allow_transmission_build {
            new.upper = 0.0;
        }
        columns.insert(
            VarKey::new(VarName::InterconCapNew, VarIndex::Link(*source, *dest)),
            new,
        );
        columns.insert(
            VarKey::new(VarName::InterconCapOp, VarIndex::Link(*source, *dest)),
            Column::free(),
        );
    }

    for t in timeline.iter() {
        let weight = timeline.annual_weight(t);
        add_interval_variables(&mut columns, model, parameters, t, weight);
    }

    columns
}

/// Create the variables of one interval
fn add_interval_variables(
    columns: &mut IndexMap<VarKey, Column>,
    model: &Model,
    parameters: &YearParameters,
    t: IntervalID,
    weight: f64,
) {
    let sets = &model.sets;
    let cost_emit = parameters.policy.cost_emit;

    for (zone_id, technology_id) in sets.pairs(TechSet::Generator) {
        let technology = &model.technologies[&technology_id];
        let pair = parameters.pair(zone_id, technology_id);
        let index = VarIndex::PairInterval(zone_id, technology_id, t);
        let fuel = sets.zone(zone_id).contains(TechSet::Fuel, technology_id);

        let emissions = if fuel {
            emission_cost(technology, cost_emit)
        } else {
            0.0
        };
        let mut disp = Column::free();
        disp.add_cost(CostComponent::Operating, weight * pair.cost_vom.value());
        disp.add_cost(CostComponent::Emissions, weight * emissions);
        match technology.commitment {
            Some(commitment) => {
                let costs = commitment_costs(pair, &commitment);
                disp.add_cost(CostComponent::Fuel, weight * costs.dispatch);
                add_commitment_variables(
                    columns,
                    (zone_id, technology_id, t),
                    weight,
                    &costs,
                    emissions,
                );
            }
            None => disp.add_cost(CostComponent::Fuel, weight * full_load_fuel_cost(pair)),
        }
        columns.insert(VarKey::new(VarName::GenDisp, index), disp);
    }

    for (set, disp, charge, level, reserve) in [
        (
            TechSet::Storage,
            VarName::StorDisp,
            VarName::StorCharge,
            VarName::StorLevel,
            VarName::StorReserve,
        ),
        (
            TechSet::Hybrid,
            VarName::HybDisp,
            VarName::HybCharge,
            VarName::HybLevel,
            VarName::HybReserve,
        ),
    ] {
        for (zone_id, technology_id) in sets.pairs(set) {
            let pair = parameters.pair(zone_id, technology_id);
            let index = VarIndex::PairInterval(zone_id, technology_id, t);
            columns.insert(
                VarKey::new(disp, index),
                Column::with_cost(CostComponent::Operating, weight * pair.cost_vom.value()),
            );
            for name in [charge, level, reserve] {
                columns.insert(VarKey::new(name, index), Column::free());
            }
        }
    }

    for zone_id in sets.zones() {
        let index = VarIndex::ZoneInterval(zone_id, t);
        columns.insert(
            VarKey::new(VarName::Unserved, index),
            Column::with_cost(CostComponent::Unserved, weight * COST_UNSERVED),
        );
        columns.insert(
            VarKey::new(VarName::Surplus, index),
            Column::with_cost(CostComponent::Shadow, weight * COST_SURPLUS),
        );
    }

    for (source, dest) in parameters.links.keys() {
        columns.insert(
            VarKey::new(VarName::InterconDisp, VarIndex::LinkInterval(*source, *dest, t)),
            Column::with_cost(CostComponent::TransmissionFlow, weight * COST_TRANSMISSION_FLOW),
        );
    }
}

/// Fuel cost per MWh at full load
fn full_load_fuel_cost(pair: &PairParameters) -> f64 {
    pair.fuel_price.value() * pair.heat_rate.value()
}

/// Cost of emissions per MWh of a fuel generator
fn emission_cost(technology: &Technology, cost_emit: f64) -> f64 {
    cost_emit * technology.emit_rate / KG_PER_TONNE
}

/// Per-unit costs of a generator under unit commitment.
///
/// The heat rate curve is linearised between minimum load, where efficiency is reduced by
/// `effrate`, and full load. Fuel burnt is split into a part proportional to dispatch and a
/// part proportional to committed capacity.
struct CommitmentCosts {
    /// Fuel cost per MWh dispatched
    dispatch: f64,
    /// Fuel cost per MW committed
    committed: f64,
    /// Fuel cost per MW started
    startup: f64,
}

fn commitment_costs(pair: &PairParameters, commitment: &CommitmentParameters) -> CommitmentCosts {
    let full_load = full_load_fuel_cost(pair);
    let m = commitment.mincap;
    let e = commitment.effrate;

    CommitmentCosts {
        dispatch: full_load * (1.0 - m / e) / (1.0 - m),
        committed: full_load * m * (1.0 / e - 1.0) / (1.0 - m),
        startup: pair.fuel_price.value() * commitment.penalty,
    }
}

/// Create the commitment variables of one generator and interval
fn add_commitment_variables(
    columns: &mut IndexMap<VarKey, Column>,
    (zone_id, technology_id, t): (ZoneID, TechnologyID, IntervalID),
    weight: f64,
    costs: &CommitmentCosts,
    emission_cost: f64,
) {
    let index = VarIndex::PairInterval(zone_id, technology_id, t);

    columns.insert(
        VarKey::new(VarName::GenDispCom, index),
        Column::with_cost(CostComponent::Fuel, weight * costs.committed),
    );

    let mut startup = Column::with_cost(CostComponent::Fuel, weight * costs.startup);
    startup.add_cost(CostComponent::Emissions, weight * emission_cost);
    columns.insert(VarKey::new(VarName::GenDispComP, index), startup);

    columns.insert(VarKey::new(VarName::GenDispComM, index), Column::free());
    columns.insert(VarKey::new(VarName::GenDispComS, index), Column::free());
}
