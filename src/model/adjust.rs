//! Clipping of exogenous inputs which would make a year's model infeasible.
//!
//! Historical capacity data and exogenous changes are not guaranteed to respect the build limits
//! of the template, nor to retire no more than exists. Rather than letting the solver report an
//! infeasible model, the inputs are truncated to the nearest feasible value before the
//! formulation is built and each change is logged.
use super::parameters::YearParameters;
use crate::units::Capacity;
use log::warn;

/// Clip initial capacity, exogenous builds and exogenous retirements of every pair.
///
/// * initial capacity is capped at the build limit
/// * exogenous builds are capped at the headroom left by the initial capacity
/// * exogenous retirements of retireable pairs are capped at the initial capacity
///
/// # Returns
///
/// The number of values which were changed
pub fn clip_exogenous_capacity(parameters: &mut YearParameters) -> usize {
    let mut num_clipped = 0;
    for ((zone_id, technology_id), pair) in &mut parameters.pairs {
        let limit = pair.build_limit;

        if pair.initial > limit {
            warn!(
                "Initial capacity of technology {technology_id} in zone {zone_id} clipped from \
                 {} to the build limit of {} MW",
                pair.initial.value(),
                limit.value()
            );
            pair.initial = limit;
            num_clipped += 1;
        }

        if pair.initial + pair.exogenous_built > limit {
            let clipped = limit - pair.initial;
            warn!(
                "Exogenous capacity of technology {technology_id} in zone {zone_id} clipped from \
                 {} to {} MW",
                pair.exogenous_built.value(),
                clipped.value()
            );
            pair.exogenous_built = clipped;
            num_clipped += 1;
        }

        if pair.capacity_class.has_retirement()
            && pair.initial - pair.exogenous_retired < Capacity(0.0)
        {
            warn!(
                "Exogenous retirement of technology {technology_id} in zone {zone_id} clipped \
                 from {} to {} MW",
                pair.exogenous_retired.value(),
                pair.initial.value()
            );
            pair.exogenous_retired = pair.initial;
            num_clipped += 1;
        }
    }

    num_clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::year_parameters;
    use crate::model::parameters::YearParameters;
    use crate::region::ZoneID;
    use crate::technology::TechnologyID;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(50.0, 20.0, 10.0, 50.0, 20.0, 10.0, 0)]
    #[case(150.0, 20.0, 10.0, 100.0, 0.0, 10.0, 2)]
    #[case(60.0, 70.0, 10.0, 60.0, 40.0, 10.0, 1)]
    #[case(30.0, 0.0, 45.0, 30.0, 0.0, 30.0, 1)]
    fn clipping(
        mut year_parameters: YearParameters,
        #[case] initial: f64,
        #[case] built: f64,
        #[case] retired: f64,
        #[case] expected_initial: f64,
        #[case] expected_built: f64,
        #[case] expected_retired: f64,
        #[case] expected_clipped: usize,
    ) {
        let key = (ZoneID(1), TechnologyID(2));
        {
            let pair = &mut year_parameters.pairs[&key];
            pair.build_limit = Capacity(100.0);
            pair.initial = Capacity(initial);
            pair.exogenous_built = Capacity(built);
            pair.exogenous_retired = Capacity(retired);
        }

        assert_eq!(
            clip_exogenous_capacity(&mut year_parameters),
            expected_clipped
        );
        let pair = &year_parameters.pairs[&key];
        assert_approx_eq!(f64, pair.initial.value(), expected_initial);
        assert_approx_eq!(f64, pair.exogenous_built.value(), expected_built);
        assert_approx_eq!(f64, pair.exogenous_retired.value(), expected_retired);
    }
}
