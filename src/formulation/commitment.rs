//! Linearised unit commitment of slow-starting generators.
//!
//! Committed capacity is a continuous variable. Startups and shutdowns change it, ramping is
//! limited by the capacity started or shut down, and capacity must stay committed for the
//! technology's minimum up-time before it can be shut down again.
use super::{FormulationContext, Row, VarName};
use crate::model::sets::TechSet;
use crate::region::ZoneID;
use crate::technology::{CommitmentParameters, TechnologyID};
use crate::timeline::IntervalID;

/// Build one row per (committed generator, interval)
fn per_interval<F>(ctx: &FormulationContext, mut row: F) -> Vec<Row>
where
    F: FnMut(ZoneID, TechnologyID, &CommitmentParameters, IntervalID) -> Row,
{
    let mut rows = Vec::new();
    for (zone_id, tech) in ctx.model.sets.pairs(TechSet::Commitment) {
        let Some(commitment) = &ctx.model.technologies[&tech].commitment else {
            continue;
        };
        for t in ctx.timeline.iter() {
            rows.push(row(zone_id, tech, commitment, t));
        }
    }

    rows
}

/// `disp - mincap * com >= 0`
pub fn min_load(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, |zone_id, tech, commitment, t| {
        Row::at_least(
            vec![
                (ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t), 1.0),
                (
                    ctx.pair_interval_var(VarName::GenDispCom, zone_id, tech, t),
                    -commitment.mincap,
                ),
            ],
            0.0,
        )
    })
}

/// `disp <= com + (rate_down - 1) * com_m[next]`
pub fn ramp_down(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, |zone_id, tech, commitment, t| {
        let next = ctx.timeline.next(t);
        Row::at_most(
            vec![
                (ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t), 1.0),
                (ctx.pair_interval_var(VarName::GenDispCom, zone_id, tech, t), -1.0),
                (
                    ctx.pair_interval_var(VarName::GenDispComM, zone_id, tech, next),
                    1.0 - commitment.rate_down,
                ),
            ],
            0.0,
        )
    })
}

/// `disp <= com[prev] + rate_up * com_p`
pub fn ramp_up(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, |zone_id, tech, commitment, t| {
        let prev = ctx.timeline.prev(t, 1);
        Row::at_most(
            vec![
                (ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t), 1.0),
                (ctx.pair_interval_var(VarName::GenDispCom, zone_id, tech, prev), -1.0),
                (
                    ctx.pair_interval_var(VarName::GenDispComP, zone_id, tech, t),
                    -commitment.rate_up,
                ),
            ],
            0.0,
        )
    })
}

/// Only capacity past its minimum up-time can shut down: `com_m <= com_s`
pub fn ramp_down_uptime(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, |zone_id, tech, _, t| {
        Row::at_most(
            vec![
                (ctx.pair_interval_var(VarName::GenDispComM, zone_id, tech, t), 1.0),
                (ctx.pair_interval_var(VarName::GenDispComS, zone_id, tech, t), -1.0),
            ],
            0.0,
        )
    })
}

/// `com_s = com_s[prev] + com_p[t - uptime] - com_m`
pub fn uptime(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, |zone_id, tech, commitment, t| {
        let prev = ctx.timeline.prev(t, 1);
        let started = ctx.timeline.prev(t, commitment.uptime as usize);
        Row::equal(
            vec![
                (ctx.pair_interval_var(VarName::GenDispComS, zone_id, tech, t), 1.0),
                (ctx.pair_interval_var(VarName::GenDispComS, zone_id, tech, prev), -1.0),
                (
                    ctx.pair_interval_var(VarName::GenDispComP, zone_id, tech, started),
                    -1.0,
                ),
                (ctx.pair_interval_var(VarName::GenDispComM, zone_id, tech, t), 1.0),
            ],
            0.0,
        )
    })
}

/// `com = com[prev] - com_m + com_p[prev]`
pub fn committed_capacity(ctx: &FormulationContext) -> Vec<Row> {
    per_interval(ctx, |zone_id, tech, _, t| {
        let prev = ctx.timeline.prev(t, 1);
        Row::equal(
            vec![
                (ctx.pair_interval_var(VarName::GenDispCom, zone_id, tech, t), 1.0),
                (ctx.pair_interval_var(VarName::GenDispCom, zone_id, tech, prev), -1.0),
                (ctx.pair_interval_var(VarName::GenDispComM, zone_id, tech, t), 1.0),
                (ctx.pair_interval_var(VarName::GenDispComP, zone_id, tech, prev), -1.0),
            ],
            0.0,
        )
    })
}

#[cfg(test)]
mod tests {
    use crate::fixture::{formulation, timeline};
    use crate::formulation::{ConstraintFamily, Formulation, VarIndex, VarKey, VarName};
    use crate::region::ZoneID;
    use crate::technology::TechnologyID;
    use crate::timeline::{IntervalID, Timeline};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn key_of(formulation: &Formulation, idx: usize) -> VarKey {
        *formulation.columns().nth(idx).unwrap().0
    }

    #[rstest]
    fn uptime_refers_back_by_minimum_up_time(formulation: Formulation, timeline: Timeline) {
        assert_eq!(
            formulation.family_sizes()[&ConstraintFamily::Uptime],
            timeline.len()
        );
        let row = formulation
            .family_rows(ConstraintFamily::Uptime)
            .nth(5)
            .unwrap();
        // ccgt has an up-time of four intervals
        assert_eq!(
            key_of(&formulation, row.terms[2].0.index()),
            VarKey::new(
                VarName::GenDispComP,
                VarIndex::PairInterval(ZoneID(1), TechnologyID(2), IntervalID(1))
            )
        );
    }

    #[rstest]
    fn ramp_down_coefficient(formulation: Formulation) {
        let row = formulation
            .family_rows(ConstraintFamily::RampDown)
            .next()
            .unwrap();
        assert_approx_eq!(f64, row.terms[2].1, 1.0 - 0.87);
        assert_eq!(
            key_of(&formulation, row.terms[2].0.index()).index,
            VarIndex::PairInterval(ZoneID(1), TechnologyID(2), IntervalID(1))
        );
    }
}
