//! Policy constraints and caps on annual generation.
//!
//! Annual quantities are sums over the modelled intervals weighted by the hours of the year each
//! interval represents.
use super::{FormulationContext, ModelOption, Row, UNSERVED_LIMIT_FRACTION, Var, VarName};
use crate::model::sets::TechSet;
use crate::region::RegionID;
use crate::timeline::{HOURS_IN_YEAR, IntervalID};
use itertools::Itertools;

/// Emission rates are in kg/MWh
const KG_PER_TONNE: f64 = 1000.0;

/// Targets in GWh against dispatch in MW
const MWH_PER_GWH: f64 = 1000.0;

/// The rows added by a policy option
pub fn option_rows(ctx: &FormulationContext, option: &ModelOption) -> Vec<Row> {
    match option {
        ModelOption::UnservedLimit => unserved_limit(ctx),
        ModelOption::EmissionLimit(limit) => vec![emission_limit(ctx, *limit)],
        ModelOption::NemRetRatio(ratio) => {
            let regions: Vec<_> = ctx.model.sets.regions().collect();
            vec![ret_ratio(ctx, &regions, *ratio)]
        }
        ModelOption::NemRetGwh(gwh) => vec![ret_gwh(ctx, *gwh)],
        ModelOption::RegionRetRatio(region_id, ratio) => vec![ret_ratio(ctx, &[*region_id], *ratio)],
        ModelOption::OperatingReserve(ratio) => operating_reserve(ctx, *ratio),
        ModelOption::NemReDispRatio(ratio) => re_disp_ratio(ctx, *ratio),
        ModelOption::ManualTransmission { .. } => Vec::new(),
    }
}

/// Unserved energy in each region within a fraction of the region's demand
fn unserved_limit(ctx: &FormulationContext) -> Vec<Row> {
    let sets = &ctx.model.sets;
    sets.regions()
        .map(|region_id| {
            let mut terms = Vec::new();
            let mut demand = 0.0;
            for t in ctx.timeline.iter() {
                let weight = ctx.weight(t);
                demand += weight * ctx.traces.region_demand(region_id, t);
                for zone_id in sets.zones_in_region(region_id) {
                    terms.push((ctx.zone_interval_var(VarName::Unserved, zone_id, t), weight));
                }
            }
            Row::at_most(terms, UNSERVED_LIMIT_FRACTION * demand)
        })
        .collect()
}

/// Annual emissions of fuel generators, including startups, in Mt
fn emission_limit(ctx: &FormulationContext, limit: f64) -> Row {
    let sets = &ctx.model.sets;
    let mut terms = Vec::new();
    for t in ctx.timeline.iter() {
        let weight = ctx.weight(t);
        for (zone_id, tech) in sets.pairs(TechSet::Fuel) {
            let rate = weight * ctx.model.technologies[&tech].emit_rate / KG_PER_TONNE;
            terms.push((ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t), rate));
            if sets.zone(zone_id).contains(TechSet::Commitment, tech) {
                terms.push((
                    ctx.pair_interval_var(VarName::GenDispComP, zone_id, tech, t),
                    rate,
                ));
            }
        }
    }

    Row::at_most(terms, limit * 1e6)
}

/// Weighted output of renewable generators and hybrids in the given regions
fn renewable_output(
    ctx: &FormulationContext,
    regions: &[RegionID],
    t: IntervalID,
) -> impl Iterator<Item = Var> {
    let sets = &ctx.model.sets;
    let mut vars = Vec::new();
    for region_id in regions {
        for (zone_id, tech) in sets.pairs_in_region(*region_id, TechSet::Renewable) {
            vars.push(ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t));
        }
        for (zone_id, tech) in sets.pairs_in_region(*region_id, TechSet::Hybrid) {
            vars.push(ctx.pair_interval_var(VarName::HybDisp, zone_id, tech, t));
        }
    }

    vars.into_iter()
}

/// Renewable share of generation in the given regions of at least `ratio`:
/// `renewable - ratio * (generators + hybrids) >= 0`
fn ret_ratio(ctx: &FormulationContext, regions: &[RegionID], ratio: f64) -> Row {
    let sets = &ctx.model.sets;
    let mut terms = Vec::new();
    for t in ctx.timeline.iter() {
        let weight = ctx.weight(t);
        terms.extend(renewable_output(ctx, regions, t).map(|var| (var, weight)));
        for region_id in regions {
            for (zone_id, tech) in sets.pairs_in_region(*region_id, TechSet::Generator) {
                terms.push((
                    ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t),
                    -ratio * weight,
                ));
            }
            for (zone_id, tech) in sets.pairs_in_region(*region_id, TechSet::Hybrid) {
                terms.push((
                    ctx.pair_interval_var(VarName::HybDisp, zone_id, tech, t),
                    -ratio * weight,
                ));
            }
        }
    }

    Row::at_least(terms, 0.0)
}

/// System-wide renewable energy of at least `gwh`
fn ret_gwh(ctx: &FormulationContext, gwh: f64) -> Row {
    let regions: Vec<_> = ctx.model.sets.regions().collect();
    let mut terms = Vec::new();
    for t in ctx.timeline.iter() {
        let weight = ctx.weight(t);
        terms.extend(renewable_output(ctx, &regions, t).map(|var| (var, weight)));
    }

    Row::at_least(terms, gwh * MWH_PER_GWH)
}

/// Spare dispatchable capacity in each region and interval covers `ratio` of its demand.
///
/// Dispatchable generators contribute their unused operating capacity and committed generators
/// their unused committed capacity, whether or not they are tagged dispatchable. Storage and
/// hybrids contribute their reserve.
fn operating_reserve(ctx: &FormulationContext, ratio: f64) -> Vec<Row> {
    let sets = &ctx.model.sets;
    let mut rows = Vec::new();
    for region_id in sets.regions() {
        for t in ctx.timeline.iter() {
            let mut terms = Vec::new();
            for zone_id in sets.zones_in_region(region_id) {
                let zone = sets.zone(zone_id);
                let generators = zone
                    .get(TechSet::Dispatchable)
                    .chain(zone.get(TechSet::Commitment))
                    .unique();
                for tech in generators {
                    let headroom = if zone.contains(TechSet::Commitment, tech) {
                        ctx.pair_interval_var(VarName::GenDispCom, zone_id, tech, t)
                    } else {
                        ctx.pair_var(VarName::GenCapOp, zone_id, tech)
                    };
                    terms.push((headroom, 1.0));
                    terms.push((
                        ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t),
                        -1.0,
                    ));
                }
                for tech in zone.get(TechSet::Storage) {
                    terms.push((
                        ctx.pair_interval_var(VarName::StorReserve, zone_id, tech, t),
                        1.0,
                    ));
                }
                for tech in zone.get(TechSet::Hybrid) {
                    terms.push((
                        ctx.pair_interval_var(VarName::HybReserve, zone_id, tech, t),
                        1.0,
                    ));
                }
            }
            let demand = ctx.traces.region_demand(region_id, t);
            rows.push(Row::at_least(terms, ratio * demand));
        }
    }

    rows
}

/// Renewable dispatchable generators, storage and hybrids supply at least `ratio` of the output
/// in each region and interval
fn re_disp_ratio(ctx: &FormulationContext, ratio: f64) -> Vec<Row> {
    let sets = &ctx.model.sets;
    let mut rows = Vec::new();
    for region_id in sets.regions() {
        for t in ctx.timeline.iter() {
            let mut terms = Vec::new();
            for zone_id in sets.zones_in_region(region_id) {
                let zone = sets.zone(zone_id);
                for tech in zone.get(TechSet::Generator) {
                    let share = if zone.contains(TechSet::RenewableDispatchable, tech) {
                        1.0 - ratio
                    } else {
                        -ratio
                    };
                    terms.push((
                        ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t),
                        share,
                    ));
                }
                for tech in zone.get(TechSet::Storage) {
                    terms.push((
                        ctx.pair_interval_var(VarName::StorDisp, zone_id, tech, t),
                        1.0 - ratio,
                    ));
                }
                for tech in zone.get(TechSet::Hybrid) {
                    terms.push((
                        ctx.pair_interval_var(VarName::HybDisp, zone_id, tech, t),
                        1.0 - ratio,
                    ));
                }
            }
            rows.push(Row::at_least(terms, 0.0));
        }
    }

    rows
}

/// Caps on the annual output of a pair, on its annual capacity factor and on the output of a
/// technology across all zones
pub fn generation_limits(ctx: &FormulationContext) -> Vec<Row> {
    let limits = &ctx.model.generation_limits;
    let sets = &ctx.model.sets;
    let annual_output = |zone_id, tech| {
        ctx.timeline
            .iter()
            .map(move |t| {
                (
                    ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t),
                    ctx.weight(t),
                )
            })
            .collect::<Vec<_>>()
    };

    let mut rows = Vec::new();
    for ((zone_id, tech), energy) in &limits.zone_energy {
        if sets.zone(*zone_id).contains(TechSet::Generator, *tech) {
            rows.push(Row::at_most(annual_output(*zone_id, *tech), energy.value()));
        }
    }
    for ((zone_id, tech), cf) in &limits.zone_capacity_factor {
        if sets.zone(*zone_id).contains(TechSet::Generator, *tech) {
            let mut terms = annual_output(*zone_id, *tech);
            terms.push((
                ctx.pair_var(VarName::GenCapOp, *zone_id, *tech),
                -cf.value() * HOURS_IN_YEAR,
            ));
            rows.push(Row::at_most(terms, 0.0));
        }
    }
    for (tech, energy) in &limits.system_energy {
        let terms: Vec<_> = sets
            .zones()
            .filter(|zone_id| sets.zone(*zone_id).contains(TechSet::Generator, *tech))
            .flat_map(|zone_id| annual_output(zone_id, *tech))
            .collect();
        if !terms.is_empty() {
            rows.push(Row::at_most(terms, energy.value()));
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{model, sampled_traces, timeline, year_parameters};
    use crate::formulation::{ConstraintFamily, Formulation};
    use crate::model::Model;
    use crate::model::parameters::YearParameters;
    use crate::model::sets::ModelSets;
    use crate::region::ZoneID;
    use crate::technology::{TechnologyID, TechnologyTag};
    use crate::timeline::Timeline;
    use crate::trace::SampledTraces;
    use crate::units::{Dimensionless, Energy};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn build(
        model: &Model,
        year_parameters: &YearParameters,
        timeline: &Timeline,
        sampled_traces: &SampledTraces,
        option: ModelOption,
    ) -> Formulation {
        Formulation::build(model, year_parameters, timeline, sampled_traces, &[option])
    }

    #[rstest]
    fn unserved_limit_scales_with_demand(
        model: Model,
        year_parameters: YearParameters,
        timeline: Timeline,
        sampled_traces: SampledTraces,
    ) {
        let formulation = build(
            &model,
            &year_parameters,
            &timeline,
            &sampled_traces,
            ModelOption::UnservedLimit,
        );
        let rows: Vec<_> = formulation
            .family_rows(ConstraintFamily::UnservedLimit)
            .collect();
        // QLD: 400 MW all year
        assert_approx_eq!(f64, rows[1].upper, 2e-5 * 400.0 * 8760.0, epsilon = 1e-6);
    }

    #[rstest]
    fn emission_limit_in_tonnes(
        model: Model,
        year_parameters: YearParameters,
        timeline: Timeline,
        sampled_traces: SampledTraces,
    ) {
        let formulation = build(
            &model,
            &year_parameters,
            &timeline,
            &sampled_traces,
            ModelOption::EmissionLimit(2.5),
        );
        let row = formulation
            .family_rows(ConstraintFamily::EmissionLimit)
            .next()
            .unwrap();
        assert_approx_eq!(f64, row.upper, 2.5e6);
        // Three fuel pairs, one of which also counts startups
        assert_eq!(row.terms.len(), 4 * timeline.len());
        assert_approx_eq!(f64, row.terms[0].1, 8760.0 / 24.0 * 0.8);
    }

    #[rstest]
    fn ret_ratio_coefficients(
        model: Model,
        year_parameters: YearParameters,
        timeline: Timeline,
        sampled_traces: SampledTraces,
    ) {
        let formulation = build(
            &model,
            &year_parameters,
            &timeline,
            &sampled_traces,
            ModelOption::RegionRetRatio(RegionID(2), 0.4),
        );
        let row = formulation
            .family_rows(ConstraintFamily::RegionRetRatio)
            .next()
            .unwrap();
        // QLD has ocgt and hydro, neither renewable
        let weight = 8760.0 / 24.0;
        assert!(row.terms.iter().all(|(_, coeff)| (coeff + 0.4 * weight).abs() < 1e-9));
        assert_eq!(row.terms.len(), 2 * timeline.len());
    }

    #[rstest]
    fn operating_reserve_uses_committed_capacity(
        model: Model,
        year_parameters: YearParameters,
        timeline: Timeline,
        sampled_traces: SampledTraces,
    ) {
        let formulation = build(
            &model,
            &year_parameters,
            &timeline,
            &sampled_traces,
            ModelOption::OperatingReserve(0.1),
        );
        let row = formulation
            .family_rows(ConstraintFamily::OperatingReserve)
            .next()
            .unwrap();
        // NSW at hour 0: 800 MW
        assert_approx_eq!(f64, row.lower, 80.0);
        // ocgt and ccgt headroom, battery and cst reserve
        assert_eq!(row.terms.len(), 6);
    }

    #[rstest]
    fn operating_reserve_includes_untagged_committed_generators(
        mut model: Model,
        year_parameters: YearParameters,
        timeline: Timeline,
        sampled_traces: SampledTraces,
    ) {
        model
            .technologies
            .get_mut(&TechnologyID(2))
            .unwrap()
            .tags
            .shift_remove(&TechnologyTag::Dispatchable);
        model.sets = ModelSets::new(
            &model.regions,
            &model.zones,
            &model.technologies,
            &model.zone_technologies,
            &model.network,
        )
        .unwrap();
        let zone = model.sets.zone(ZoneID(1));
        assert!(!zone.contains(TechSet::Dispatchable, TechnologyID(2)));
        assert!(zone.contains(TechSet::Commitment, TechnologyID(2)));

        let formulation = build(
            &model,
            &year_parameters,
            &timeline,
            &sampled_traces,
            ModelOption::OperatingReserve(0.1),
        );
        let row = formulation
            .family_rows(ConstraintFamily::OperatingReserve)
            .next()
            .unwrap();
        // ccgt still offers its unused committed capacity
        assert_eq!(row.terms.len(), 6);
    }

    #[rstest]
    fn generation_limits_only_for_declared_generators(
        mut model: Model,
        year_parameters: YearParameters,
        timeline: Timeline,
        sampled_traces: SampledTraces,
    ) {
        let limits = &mut model.generation_limits;
        limits
            .zone_energy
            .insert((ZoneID(3), TechnologyID(18)), Energy(1e6));
        limits
            .zone_capacity_factor
            .insert((ZoneID(1), TechnologyID(8)), Dimensionless(0.1));
        limits.system_energy.insert(TechnologyID(12), Energy(2e6));
        limits.system_energy.insert(TechnologyID(99), Energy(2e6));

        let formulation =
            Formulation::build(&model, &year_parameters, &timeline, &sampled_traces, &[]);
        let rows: Vec<_> = formulation
            .family_rows(ConstraintFamily::GenerationLimit)
            .collect();
        assert_eq!(rows.len(), 3);
        assert_approx_eq!(f64, rows[1].terms.last().unwrap().1, -876.0);
        // Wind in zones 1 and 2
        assert_eq!(rows[2].terms.len(), 2 * timeline.len());
    }
}
