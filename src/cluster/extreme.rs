//! Detection of the week with the least renewable resource relative to demand.
use anyhow::{Result, ensure};

/// Ratio of available resource to normalised demand for each interval.
///
/// Demand is normalised by its mean so that the ratio is dimensionless. Intervals without demand
/// are not stressed and get an infinite ratio.
pub fn resource_ratio(resource: &[f64], demand: &[f64]) -> Result<Vec<f64>> {
    ensure!(
        resource.len() == demand.len(),
        "Resource and demand series have different lengths"
    );
    ensure!(!demand.is_empty(), "No demand to compare resource against");

    let mean_demand = demand.iter().sum::<f64>() / demand.len() as f64;
    Ok(resource
        .iter()
        .zip(demand)
        .map(|(r, d)| {
            let normalised = d / mean_demand;
            if normalised > 0.0 {
                r / normalised
            } else {
                f64::INFINITY
            }
        })
        .collect())
}

/// Centred rolling mean over `window` values, wrapping around at both ends
pub fn circular_rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 || window == 0 {
        return values.to_vec();
    }

    let half = window / 2;
    let divisor = window as f64;
    (0..n)
        .map(|centre| {
            let start = centre + n * (window / n + 1) - half;
            (0..window).map(|k| values[(start + k) % n]).sum::<f64>() / divisor
        })
        .collect()
}

/// Index of the first interval of the most stressed window of `window` intervals.
///
/// The smoothed ratio is lowest at the window's centre. The window is moved to lie wholly within
/// the series if the centre is too close to either end.
pub fn most_stressed_start(ratio: &[f64], window: usize) -> Option<usize> {
    if ratio.len() < window || window == 0 {
        return None;
    }

    let smoothed = circular_rolling_mean(ratio, window);
    let centre = smoothed
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, _)| idx)?;

    Some(centre.saturating_sub(window / 2).min(ratio.len() - window))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn ratio_normalises_demand() {
        let ratio = resource_ratio(&[0.5, 0.5, 0.2], &[100.0, 200.0, 0.0]).unwrap();
        assert_approx_eq!(f64, ratio[0], 0.5);
        assert_approx_eq!(f64, ratio[1], 0.25);
        assert!(ratio[2].is_infinite());
        assert!(resource_ratio(&[0.1], &[]).is_err());
    }

    #[test]
    fn rolling_mean_wraps() {
        let smoothed = circular_rolling_mean(&[3.0, 0.0, 0.0, 0.0], 3);
        assert_approx_eq!(f64, smoothed[0], 1.0);
        assert_approx_eq!(f64, smoothed[1], 1.0);
        assert_approx_eq!(f64, smoothed[2], 0.0);
        assert_approx_eq!(f64, smoothed[3], 1.0);
    }

    #[rstest]
    #[case(10, Some(8))]
    #[case(1, Some(0))]
    #[case(16, Some(14))]
    fn stressed_window(#[case] dip: usize, #[case] expected: Option<usize>) {
        let mut ratio = vec![1.0; 20];
        ratio[dip] = 0.0;
        ratio[(dip + 1) % 20] = 0.0;
        assert_eq!(most_stressed_start(&ratio, 4), expected);
    }

    #[test]
    fn window_longer_than_series() {
        assert_eq!(most_stressed_start(&[1.0, 2.0], 3), None);
    }
}
