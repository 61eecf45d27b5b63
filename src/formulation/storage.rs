//! State of charge and power limits of storage and hybrid technologies.
//!
//! Levels wrap around within each timeline segment, so each represented week ends where it
//! started.
use super::{FormulationContext, Row, VarName};
use crate::model::sets::TechSet;
use crate::region::ZoneID;
use crate::technology::{TechnologyID, TechnologyKind};
use crate::timeline::IntervalID;

/// Build one row per (pair, interval) of a set
fn per_interval<F>(ctx: &FormulationContext, set: TechSet, mut row: F) -> Vec<Row>
where
    F: FnMut(ZoneID, TechnologyID, &TechnologyKind, IntervalID) -> Row,
{
    let mut rows = Vec::new();
    for (zone_id, tech) in ctx.model.sets.pairs(set) {
        let kind = &ctx.model.technologies[&tech].kind;
        for t in ctx.timeline.iter() {
            rows.push(row(zone_id, tech, kind, t));
        }
    }

    rows
}

/// `level - level[prev] + disp - efficiency * charge = 0`
fn level_balance(
    ctx: &FormulationContext,
    names: [VarName; 3],
    (zone_id, tech, t): (ZoneID, TechnologyID, IntervalID),
    efficiency: f64,
) -> Row {
    let [level, disp, charge] = names;
    let prev = ctx.timeline.prev(t, 1);
    Row::equal(
        vec![
            (ctx.pair_interval_var(level, zone_id, tech, t), 1.0),
            (ctx.pair_interval_var(level, zone_id, tech, prev), -1.0),
            (ctx.pair_interval_var(disp, zone_id, tech, t), 1.0),
            (ctx.pair_interval_var(charge, zone_id, tech, t), -efficiency),
        ],
        0.0,
    )
}

/// `level - hours * cap_op <= 0`
fn max_level(
    ctx: &FormulationContext,
    level: VarName,
    op: VarName,
    (zone_id, tech, t): (ZoneID, TechnologyID, IntervalID),
    kind: &TechnologyKind,
) -> Row {
    let hours = kind.charge_hours().unwrap_or_default();
    Row::at_most(
        vec![
            (ctx.pair_interval_var(level, zone_id, tech, t), 1.0),
            (ctx.pair_var(op, zone_id, tech), -hours),
        ],
        0.0,
    )
}

/// `reserve - level <= 0`
fn reserve_backed(
    ctx: &FormulationContext,
    reserve: VarName,
    level: VarName,
    (zone_id, tech, t): (ZoneID, TechnologyID, IntervalID),
) -> Row {
    Row::at_most(
        vec![
            (ctx.pair_interval_var(reserve, zone_id, tech, t), 1.0),
            (ctx.pair_interval_var(level, zone_id, tech, t), -1.0),
        ],
        0.0,
    )
}

pub fn stor_level(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, TechSet::Storage, |zone_id, tech, kind, t| {
        let efficiency = match kind {
            TechnologyKind::Storage {
                round_trip_efficiency,
                ..
            } => round_trip_efficiency.value(),
            _ => 1.0,
        };
        level_balance(
            ctx,
            [VarName::StorLevel, VarName::StorDisp, VarName::StorCharge],
            (zone_id, tech, t),
            efficiency,
        )
    })
}

/// Charging, discharging and reserve share the storage power rating
pub fn stor_flow(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, TechSet::Storage, |zone_id, tech, _, t| {
        Row::at_most(
            vec![
                (ctx.pair_interval_var(VarName::StorCharge, zone_id, tech, t), 1.0),
                (ctx.pair_interval_var(VarName::StorDisp, zone_id, tech, t), 1.0),
                (ctx.pair_interval_var(VarName::StorReserve, zone_id, tech, t), 1.0),
                (ctx.pair_var(VarName::StorCapOp, zone_id, tech), -1.0),
            ],
            0.0,
        )
    })
}

pub fn stor_reserve(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, TechSet::Storage, |zone_id, tech, _, t| {
        reserve_backed(ctx, VarName::StorReserve, VarName::StorLevel, (zone_id, tech, t))
    })
}

pub fn stor_max_level(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, TechSet::Storage, |zone_id, tech, kind, t| {
        max_level(
            ctx,
            VarName::StorLevel,
            VarName::StorCapOp,
            (zone_id, tech, t),
            kind,
        )
    })
}

pub fn hyb_level(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, TechSet::Hybrid, |zone_id, tech, _, t| {
        level_balance(
            ctx,
            [VarName::HybLevel, VarName::HybDisp, VarName::HybCharge],
            (zone_id, tech, t),
            1.0,
        )
    })
}

/// The collector, sized at `collector_multiple` times the rated output, limits charging
pub fn hyb_charge(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, TechSet::Hybrid, |zone_id, tech, kind, t| {
        let multiple = match kind {
            TechnologyKind::Hybrid {
                collector_multiple, ..
            } => collector_multiple.value(),
            _ => 1.0,
        };
        let cf = ctx.traces.capacity_factor(zone_id, tech, t);
        Row::at_most(
            vec![
                (ctx.pair_interval_var(VarName::HybCharge, zone_id, tech, t), 1.0),
                (ctx.pair_var(VarName::HybCapOp, zone_id, tech), -cf * multiple),
            ],
            0.0,
        )
    })
}

pub fn hyb_flow(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, TechSet::Hybrid, |zone_id, tech, _, t| {
        Row::at_most(
            vec![
                (ctx.pair_interval_var(VarName::HybDisp, zone_id, tech, t), 1.0),
                (ctx.pair_interval_var(VarName::HybReserve, zone_id, tech, t), 1.0),
                (ctx.pair_var(VarName::HybCapOp, zone_id, tech), -1.0),
            ],
            0.0,
        )
    })
}

pub fn hyb_reserve(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, TechSet::Hybrid, |zone_id, tech, _, t| {
        reserve_backed(ctx, VarName::HybReserve, VarName::HybLevel, (zone_id, tech, t))
    })
}

pub fn hyb_max_level(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, TechSet::Hybrid, |zone_id, tech, kind, t| {
        max_level(
            ctx,
            VarName::HybLevel,
            VarName::HybCapOp,
            (zone_id, tech, t),
            kind,
        )
    })
}

#[cfg(test)]
mod tests {
    use crate::fixture::{formulation, timeline};
    use crate::formulation::{ConstraintFamily, Formulation};
    use crate::timeline::Timeline;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(ConstraintFamily::StorLevel)]
    #[case(ConstraintFamily::StorFlow)]
    #[case(ConstraintFamily::StorReserve)]
    #[case(ConstraintFamily::StorMaxLevel)]
    #[case(ConstraintFamily::HybLevel)]
    #[case(ConstraintFamily::HybCharge)]
    #[case(ConstraintFamily::HybFlow)]
    #[case(ConstraintFamily::HybReserve)]
    #[case(ConstraintFamily::HybMaxLevel)]
    fn one_row_per_interval(
        formulation: Formulation,
        timeline: Timeline,
        #[case] family: ConstraintFamily,
    ) {
        // One storage and one hybrid pair
        assert_eq!(formulation.family_sizes()[&family], timeline.len());
    }

    #[rstest]
    fn level_wraps_around(formulation: Formulation) {
        let rows: Vec<_> = formulation.family_rows(ConstraintFamily::StorLevel).collect();
        let first = rows[0];
        let last = rows[rows.len() - 1];
        // The first interval refers to the level of the last
        assert_eq!(first.terms[1].0, last.terms[0].0);
        assert_approx_eq!(f64, first.terms[3].1, -0.8);
    }

    #[rstest]
    fn hybrid_charge_follows_collector(formulation: Formulation) {
        let rows: Vec<_> = formulation.family_rows(ConstraintFamily::HybCharge).collect();
        // Night time: no charging
        assert_approx_eq!(f64, rows[2].terms[1].1, 0.0);
        // Daytime: capacity factor 0.6 with a solar multiple of 2
        assert_approx_eq!(f64, rows[12].terms[1].1, -1.2);
    }
}
