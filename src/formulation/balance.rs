//! Supply and demand balance of each zone.
use super::{FormulationContext, Row, VarName};
use crate::model::sets::TechSet;
use crate::region::ZoneID;
use crate::timeline::IntervalID;

/// One row per (zone, interval): generation, discharge, imports and unserved energy meet demand,
/// storage charging, exports (grossed up for losses) and surplus.
///
/// Hybrids charge from their own collector so their charging does not draw on the zone.
pub fn load_balance(ctx: &FormulationContext) -> (Vec<(ZoneID, IntervalID)>, Vec<Row>) {
    let sets = &ctx.model.sets;
    let mut keys = Vec::new();
    let mut rows = Vec::new();

    for zone_id in sets.zones() {
        let zone = sets.zone(zone_id);
        for t in ctx.timeline.iter() {
            let mut terms = Vec::new();
            for tech in zone.get(TechSet::Generator) {
                terms.push((ctx.pair_interval_var(VarName::GenDisp, zone_id, tech, t), 1.0));
            }
            for tech in zone.get(TechSet::Hybrid) {
                terms.push((ctx.pair_interval_var(VarName::HybDisp, zone_id, tech, t), 1.0));
            }
            for tech in zone.get(TechSet::Storage) {
                terms.push((ctx.pair_interval_var(VarName::StorDisp, zone_id, tech, t), 1.0));
                terms.push((
                    ctx.pair_interval_var(VarName::StorCharge, zone_id, tech, t),
                    -1.0,
                ));
            }
            for source in ctx.model.network.sources(zone_id) {
                terms.push((
                    ctx.link_interval_var(VarName::InterconDisp, source, zone_id, t),
                    1.0,
                ));
            }
            for dest in sets.links_from(zone_id) {
                let loss = ctx.parameters.link(zone_id, dest).loss.value();
                terms.push((
                    ctx.link_interval_var(VarName::InterconDisp, zone_id, dest, t),
                    -(1.0 + loss),
                ));
            }
            terms.push((ctx.zone_interval_var(VarName::Unserved, zone_id, t), 1.0));
            terms.push((ctx.zone_interval_var(VarName::Surplus, zone_id, t), -1.0));

            keys.push((zone_id, t));
            rows.push(Row::equal(terms, ctx.traces.zone_demand(zone_id, t)));
        }
    }

    (keys, rows)
}

#[cfg(test)]
mod tests {
    use crate::fixture::formulation;
    use crate::formulation::{ConstraintFamily, Formulation};
    use crate::region::ZoneID;
    use crate::timeline::IntervalID;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn demand_on_right_hand_side(formulation: Formulation) {
        let keys: Vec<_> = formulation
            .balance_keys()
            .zip_duals(&vec![0.0; formulation.num_rows()])
            .map(|(key, _)| *key)
            .collect();
        let rows: Vec<_> = formulation
            .family_rows(ConstraintFamily::LoadBalance)
            .collect();
        assert_eq!(keys.len(), rows.len());

        let idx = keys
            .iter()
            .position(|key| *key == (ZoneID(1), IntervalID(18)))
            .unwrap();
        assert_approx_eq!(f64, rows[idx].lower, 600.0);
        assert_approx_eq!(f64, rows[idx].upper, 600.0);

        // Zone 2 has two wind/solar generators, a hybrid, imports from 1 and 3, exports to 1 and
        // 3, unserved and surplus
        let idx = keys
            .iter()
            .position(|key| *key == (ZoneID(2), IntervalID(0)))
            .unwrap();
        assert_eq!(rows[idx].terms.len(), 9);
    }
}
