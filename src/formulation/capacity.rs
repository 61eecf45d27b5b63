//! Capacity accounting, availability and transmission constraints.
use super::{FormulationContext, Row, VarName};
use crate::model::sets::TechSet;
use crate::network::LINK_DERATINGS;
use crate::technology::LAND_CONSTRAINED_TECHNOLOGY;
use crate::units::Capacity;

/// `cap_op - new + ret = init + exo - ret_exo`, with the new and retirement terms only where the
/// pair's capacity class has them
fn capacity_recursion(
    ctx: &FormulationContext,
    set: TechSet,
    op: VarName,
    new: VarName,
    ret: Option<VarName>,
) -> Vec<Row> {
    ctx.model
        .sets
        .pairs(set)
        .map(|(zone_id, tech)| {
            let pair = ctx.parameters.pair(zone_id, tech);
            let mut terms = vec![(ctx.pair_var(op, zone_id, tech), 1.0)];
            if pair.capacity_class.has_new_build() {
                terms.push((ctx.pair_var(new, zone_id, tech), -1.0));
            }
            let mut rhs = pair.initial + pair.exogenous_built;
            if let Some(ret) = ret
                && pair.capacity_class.has_retirement()
            {
                terms.push((ctx.pair_var(ret, zone_id, tech), 1.0));
                rhs = rhs - pair.exogenous_retired;
            }

            Row::equal(terms, rhs.value())
        })
        .collect()
}

pub fn gen_capacity(ctx: &FormulationContext) -> Vec<Row> {
    capacity_recursion(
        ctx,
        TechSet::Generator,
        VarName::GenCapOp,
        VarName::GenCapNew,
        Some(VarName::GenCapRet),
    )
}

pub fn stor_capacity(ctx: &FormulationContext) -> Vec<Row> {
    capacity_recursion(
        ctx,
        TechSet::Storage,
        VarName::StorCapOp,
        VarName::StorCapNew,
        None,
    )
}

pub fn hyb_capacity(ctx: &FormulationContext) -> Vec<Row> {
    capacity_recursion(
        ctx,
        TechSet::Hybrid,
        VarName::HybCapOp,
        VarName::HybCapNew,
        None,
    )
}

/// Generator output limited by the capacity factor. Under unit commitment the committed
/// capacity is limited instead.
pub fn capacity_factor(ctx: &FormulationContext) -> Vec<Row> {
    let mut rows = Vec::new();
    for (zone_id, tech) in ctx.model.sets.pairs(TechSet::Generator) {
        let committed = ctx.model.sets.zone(zone_id).contains(TechSet::Commitment, tech);
        let limited = if committed {
            VarName::GenDispCom
        } else {
            VarName::GenDisp
        };
        let cap_op = ctx.pair_var(VarName::GenCapOp, zone_id, tech);
        for t in ctx.timeline.iter() {
            let cf = ctx.traces.capacity_factor(zone_id, tech, t);
            rows.push(Row::at_most(
                vec![
                    (ctx.pair_interval_var(limited, zone_id, tech, t), 1.0),
                    (cap_op, -cf),
                ],
                0.0,
            ));
        }
    }

    rows
}

/// Operating capacity within the build limit of every pair.
///
/// In zones with hybrids, the limit of [`LAND_CONSTRAINED_TECHNOLOGY`] is shared with them.
pub fn build_limit(ctx: &FormulationContext) -> Vec<Row> {
    let sets = &ctx.model.sets;
    let mut rows = Vec::new();
    for (set, op) in [
        (TechSet::Generator, VarName::GenCapOp),
        (TechSet::Storage, VarName::StorCapOp),
        (TechSet::Hybrid, VarName::HybCapOp),
    ] {
        for (zone_id, tech) in sets.pairs(set) {
            let mut terms = vec![(ctx.pair_var(op, zone_id, tech), 1.0)];
            if tech == LAND_CONSTRAINED_TECHNOLOGY && set == TechSet::Generator {
                terms.extend(
                    sets.zone(zone_id)
                        .get(TechSet::Hybrid)
                        .map(|hyb| (ctx.pair_var(VarName::HybCapOp, zone_id, hyb), 1.0)),
                );
            }
            let limit = ctx.parameters.pair(zone_id, tech).build_limit;
            rows.push(Row::at_most(terms, limit.value()));
        }
    }

    rows
}

/// Operating transfer capacity is shared by both directions of a link:
/// `cap_op(s, d) = init + exo + new(s, d) + new(d, s)`
pub fn intercon_capacity(ctx: &FormulationContext) -> Vec<Row> {
    ctx.parameters
        .links
        .iter()
        .map(|((source, dest), link)| {
            let mut terms = vec![
                (ctx.link_var(VarName::InterconCapOp, *source, *dest), 1.0),
                (ctx.link_var(VarName::InterconCapNew, *source, *dest), -1.0),
            ];
            if ctx.parameters.links.contains_key(&(*dest, *source)) {
                terms.push((ctx.link_var(VarName::InterconCapNew, *dest, *source), -1.0));
            }
            let rhs: Capacity = link.initial + link.exogenous;

            Row::equal(terms, rhs.value())
        })
        .collect()
}

/// Flow within operating transfer capacity, derated where [`LINK_DERATINGS`] apply
pub fn intercon_flow(ctx: &FormulationContext) -> Vec<Row> {
    let sets = &ctx.model.sets;
    let mut rows = Vec::new();
    for (source, dest) in ctx.parameters.links.keys() {
        let deratings: Vec<_> = LINK_DERATINGS
            .iter()
            .filter(|derating| {
                let (zone_id, tech) = derating.generator;
                derating.link == (*source, *dest)
                    && sets.zone(zone_id).contains(TechSet::Generator, tech)
            })
            .collect();
        let cap_op = ctx.link_var(VarName::InterconCapOp, *source, *dest);
        for t in ctx.timeline.iter() {
            let mut terms = vec![
                (ctx.link_interval_var(VarName::InterconDisp, *source, *dest, t), 1.0),
                (cap_op, -1.0),
            ];
            for derating in &deratings {
                let (zone_id, tech) = derating.generator;
                terms.push((
                    ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t),
                    derating.coefficient,
                ));
            }
            rows.push(Row::at_most(terms, 0.0));
        }
    }

    rows
}
