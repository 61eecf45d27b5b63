//! Reduce a financial year to a few weighted representative weeks.
//!
//! The year is cut into whole weekday-to-weekday periods. Each period becomes one vector of its
//! hourly regional demand, and the vectors are grouped by average-linkage agglomeration. Each
//! cluster is represented by the real period closest to the cluster's synthetic member, weighted by
//! the share of the year's periods in the cluster.
use crate::config::AdvancedSection;
use crate::technology::{TechnologyMap, TechnologyTag};
use crate::timeline::{Timeline, financial_year_bounds};
use crate::trace::Traces;
use anyhow::{Context, Result, ensure};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info, warn};
use serde::Serialize;

pub mod calendar;
pub mod extreme;
pub mod linkage;
use calendar::PeriodPattern;
use extreme::{most_stressed_start, resource_ratio};
use linkage::{average_linkage, cityblock};

/// How to cluster a year
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterSettings {
    /// Number of clusters to form
    pub clusters: usize,
    /// Use the member-wise maximum rather than the mean as the synthetic member
    pub max_synthetic: bool,
    /// Add the most resource-stressed week to the clusters
    pub extreme_week: bool,
    /// Days making up a period
    pub pattern: PeriodPattern,
}

impl ClusterSettings {
    /// Settings from the `[advanced]` section of a scenario
    pub fn from_config(advanced: &AdvancedSection) -> Self {
        Self {
            clusters: advanced.cluster_sets,
            max_synthetic: advanced.max_synthetic,
            extreme_week: advanced.extreme_week,
            pattern: PeriodPattern::default(),
        }
    }
}

/// The whole periods of a year as vectors to be clustered
#[derive(Debug, Clone, PartialEq)]
pub struct Periods {
    /// First day of each period
    pub dates: Vec<NaiveDate>,
    /// The values of each period, series after series
    pub vectors: Vec<Vec<f64>>,
    /// Days in each period
    pub days: usize,
    /// Intervals in each day
    pub intervals_per_day: usize,
}

impl Periods {
    /// Cut series into whole periods of financial year `year`.
    ///
    /// # Arguments
    ///
    /// * `timestamps` - Timestamps of the values in each series
    /// * `series` - Series to combine into each period's vector
    /// * `year` - The financial year
    /// * `pattern` - Days making up a period
    pub fn new(
        timestamps: &[NaiveDateTime],
        series: &[Vec<f64>],
        year: u32,
        pattern: PeriodPattern,
    ) -> Result<Self> {
        ensure!(
            series.iter().all(|values| values.len() == timestamps.len()),
            "Every series must have a value for each timestamp"
        );

        let (start, end) = financial_year_bounds(year)?;
        let (first, last) = pattern.trim(start.date(), end.date());

        // Indices of the intervals of each kept day
        let mut days: Vec<(NaiveDate, Vec<usize>)> = Vec::new();
        for (idx, ts) in timestamps.iter().enumerate() {
            let date = ts.date();
            if date < first || date > last || !pattern.contains(date.weekday()) {
                continue;
            }
            match days.last_mut() {
                Some((day, intervals)) if *day == date => intervals.push(idx),
                _ => days.push((date, vec![idx])),
            }
        }

        let intervals_per_day = days.first().map_or(0, |(_, intervals)| intervals.len());
        ensure!(
            days.iter()
                .all(|(_, intervals)| intervals.len() == intervals_per_day),
            "Every day of year {year} must have the same number of intervals"
        );

        let period_days = pattern.len();
        let count = days.len() / period_days;
        ensure!(
            count > 0,
            "Year {year} has no whole periods of {period_days} days"
        );

        let mut dates = Vec::with_capacity(count);
        let mut vectors = Vec::with_capacity(count);
        for period in days.chunks_exact(period_days) {
            dates.push(period[0].0);
            let vector = series
                .iter()
                .flat_map(|values| {
                    period
                        .iter()
                        .flat_map(|(_, intervals)| intervals.iter().map(|idx| values[*idx]))
                })
                .collect();
            vectors.push(vector);
        }

        Ok(Self {
            dates,
            vectors,
            days: period_days,
            intervals_per_day,
        })
    }

    /// Number of periods
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether there are no periods
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// A week standing in for part of the year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepresentativeWeek {
    /// First day of the week
    pub start: NaiveDate,
    /// Days in the week
    pub days: usize,
    /// Fraction of the year the week represents
    pub weight: f64,
    /// Number of periods in the cluster
    pub members: usize,
    /// Whether this is the added extreme week
    pub extreme: bool,
}

impl RepresentativeWeek {
    /// The first and last hour of the week
    pub fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.start.and_time(NaiveTime::MIN);
        let days = i64::try_from(self.days).unwrap_or(7);
        (start, start + Duration::days(days) - Duration::hours(1))
    }
}

/// The representative weeks of one year
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// The selected weeks in date order, with any extreme week last
    pub weeks: Vec<RepresentativeWeek>,
    /// Number of periods the year was cut into
    pub periods: usize,
}

impl Clustering {
    /// A timeline with one segment per representative week
    pub fn timeline(&self, traces: &Traces) -> Result<Timeline> {
        let segments = self
            .weeks
            .iter()
            .map(|week| {
                let (start, end) = week.bounds();
                Ok((traces.timestamps_between(start, end)?, week.weight))
            })
            .collect::<Result<Vec<_>>>()?;

        Timeline::from_segments(segments)
    }

    /// Sum of the weights of all weeks
    pub fn total_weight(&self) -> f64 {
        self.weeks.iter().map(|week| week.weight).sum()
    }
}

/// The element-wise mean or maximum of a cluster's members
fn synthetic_member(members: &[&Vec<f64>], max_synthetic: bool) -> Vec<f64> {
    let len = members.first().map_or(0, |v| v.len());
    (0..len)
        .map(|i| {
            let values = members.iter().map(|v| v[i]);
            if max_synthetic {
                values.fold(f64::NEG_INFINITY, f64::max)
            } else {
                values.sum::<f64>() / members.len() as f64
            }
        })
        .collect()
}

/// Cluster periods and pick a real period to represent each cluster.
///
/// # Arguments
///
/// * `periods` - The periods of the year
/// * `clusters` - Number of clusters, between 1 and the number of periods
/// * `max_synthetic` - Represent clusters by their maximum rather than their mean
pub fn select_weeks(
    periods: &Periods,
    clusters: usize,
    max_synthetic: bool,
) -> Result<Vec<RepresentativeWeek>> {
    ensure!(clusters >= 1, "Number of clusters must be at least 1");
    ensure!(
        clusters <= periods.len(),
        "Cannot form {clusters} clusters from {} periods",
        periods.len()
    );

    let labels = average_linkage(&periods.vectors, clusters);
    let mut weeks = Vec::with_capacity(clusters);
    for label in 0..clusters {
        let members: Vec<usize> = (0..periods.len()).filter(|i| labels[*i] == label).collect();
        let vectors: Vec<&Vec<f64>> = members.iter().map(|i| &periods.vectors[*i]).collect();
        let synthetic = synthetic_member(&vectors, max_synthetic);

        // The first of equally close members
        let anchor = members
            .iter()
            .map(|i| (*i, cityblock(&periods.vectors[*i], &synthetic)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .context("Empty cluster")?;

        weeks.push(RepresentativeWeek {
            start: periods.dates[anchor],
            days: periods.days,
            weight: members.len() as f64 / periods.len() as f64,
            members: members.len(),
            extreme: false,
        });
    }
    weeks.sort_by_key(|week| week.start);

    Ok(weeks)
}

/// The first day of the period with the least renewable resource relative to demand.
///
/// Resource is the mean capacity factor of the renewable and hybrid traces. Returns `None` if
/// there are no such traces.
pub fn extreme_week_start(
    traces: &Traces,
    technologies: &TechnologyMap,
    timestamps: &[NaiveDateTime],
    window: usize,
) -> Result<Option<NaiveDate>> {
    let renewable: Vec<_> = traces
        .capacity_factors
        .iter()
        .filter(|((_, tech), _)| {
            technologies
                .get(tech)
                .is_some_and(|technology| {
                    technology.has_tag(TechnologyTag::Renewable) || technology.is_hybrid()
                })
        })
        .collect();
    if renewable.is_empty() {
        return Ok(None);
    }

    let mut resource = Vec::with_capacity(timestamps.len());
    let mut demand = Vec::with_capacity(timestamps.len());
    for ts in timestamps {
        let mut total = 0.0;
        for ((zone_id, tech), series) in &renewable {
            total += series.get(ts).copied().with_context(|| {
                format!("No capacity factor for technology {tech} in zone {zone_id} at {ts}")
            })?;
        }
        resource.push(total / renewable.len() as f64);
        demand.push(
            traces
                .demand
                .keys()
                .map(|region_id| traces.region_demand(*region_id, *ts))
                .sum::<Result<f64>>()?,
        );
    }

    let ratio = resource_ratio(&resource, &demand)?;
    Ok(most_stressed_start(&ratio, window).map(|idx| timestamps[idx].date()))
}

/// Cluster the regional demand of financial year `year` into representative weeks.
///
/// With an extreme week, it is added with the weight of one period and the weights of the
/// clusters are scaled down so that all weights still sum to 1.
pub fn cluster_year(
    traces: &Traces,
    technologies: &TechnologyMap,
    year: u32,
    settings: &ClusterSettings,
) -> Result<Clustering> {
    let (start, end) = financial_year_bounds(year)?;
    let timestamps = traces.timestamps_between(start, end)?;
    let series = traces
        .demand
        .keys()
        .map(|region_id| {
            timestamps
                .iter()
                .map(|ts| traces.region_demand(*region_id, *ts))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let periods = Periods::new(&timestamps, &series, year, settings.pattern)?;
    debug!(
        "Year {year} has {} periods starting {}",
        periods.len(),
        periods.dates[0]
    );
    let mut weeks = select_weeks(&periods, settings.clusters, settings.max_synthetic)?;

    if settings.extreme_week {
        let window = periods.days * periods.intervals_per_day;
        match extreme_week_start(traces, technologies, &timestamps, window)? {
            Some(start) => {
                let total = (periods.len() + 1) as f64;
                for week in &mut weeks {
                    week.weight = week.members as f64 / total;
                }
                info!("Adding extreme week starting {start} for year {year}");
                weeks.push(RepresentativeWeek {
                    start,
                    days: periods.days,
                    weight: 1.0 / total,
                    members: 1,
                    extreme: true,
                });
            }
            None => warn!("No renewable traces for year {year}; no extreme week added"),
        }
    }

    info!(
        "Clustered {} periods of year {year} into {} representative weeks",
        periods.len(),
        weeks.len()
    );
    Ok(Clustering {
        weeks,
        periods: periods.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::technologies;
    use crate::region::{RegionID, ZoneID};
    use crate::technology::TechnologyID;
    use crate::timeline::parse_timestamp;
    use crate::trace::Series;
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::{fixture, rstest};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// A series over all of financial year 2020 following `f(timestamp)`
    fn year_series(f: impl Fn(NaiveDateTime) -> f64) -> Series {
        let start = parse_timestamp("2019-07-01 00:00:00").unwrap();
        (0..8784)
            .map(|h| start + Duration::hours(h))
            .map(|ts| (ts, f(ts)))
            .collect()
    }

    /// Demand doubles from 4 October 2019
    #[fixture]
    fn stepped_traces() -> Traces {
        let step = date("2019-10-04");
        Traces {
            demand: indexmap! {
                RegionID(1) => year_series(|ts| if ts.date() < step { 100.0 } else { 200.0 }),
            },
            ..Default::default()
        }
    }

    fn settings(clusters: usize) -> ClusterSettings {
        ClusterSettings {
            clusters,
            max_synthetic: false,
            extreme_week: false,
            pattern: PeriodPattern::default(),
        }
    }

    #[rstest]
    fn periods_of_year(stepped_traces: Traces) {
        let (start, end) = financial_year_bounds(2020).unwrap();
        let timestamps = stepped_traces.timestamps_between(start, end).unwrap();
        let series = vec![
            timestamps
                .iter()
                .map(|ts| stepped_traces.region_demand(RegionID(1), *ts).unwrap())
                .collect(),
        ];
        let periods = Periods::new(&timestamps, &series, 2020, PeriodPattern::default()).unwrap();

        // 5 July 2019 to 30 June 2020 holds 362 days
        assert_eq!(periods.len(), 51);
        assert_eq!(periods.dates[0], date("2019-07-05"));
        assert_eq!(periods.dates[50], date("2020-06-19"));
        assert_eq!(periods.intervals_per_day, 24);
        assert!(periods.vectors.iter().all(|v| v.len() == 168));
    }

    #[rstest]
    fn two_clusters_of_doubled_demand(stepped_traces: Traces, technologies: TechnologyMap) {
        let clustering = cluster_year(&stepped_traces, &technologies, 2020, &settings(2)).unwrap();

        assert_eq!(clustering.periods, 51);
        assert_eq!(clustering.weeks.len(), 2);
        assert_eq!(clustering.weeks[0].start, date("2019-07-05"));
        assert_eq!(clustering.weeks[0].members, 13);
        assert_approx_eq!(f64, clustering.weeks[0].weight, 13.0 / 51.0);
        assert_eq!(clustering.weeks[1].start, date("2019-10-04"));
        assert_approx_eq!(f64, clustering.weeks[1].weight, 38.0 / 51.0);
        assert_approx_eq!(f64, clustering.total_weight(), 1.0, epsilon = 1e-12);

        // The same inputs give the same weeks
        let again = cluster_year(&stepped_traces, &technologies, 2020, &settings(2)).unwrap();
        assert_eq!(clustering, again);
    }

    #[rstest]
    fn timeline_of_clusters(stepped_traces: Traces, technologies: TechnologyMap) {
        let clustering = cluster_year(&stepped_traces, &technologies, 2020, &settings(2)).unwrap();
        let timeline = clustering.timeline(&stepped_traces).unwrap();

        assert_eq!(timeline.len(), 2 * 168);
        assert_eq!(timeline.segments().len(), 2);
        assert_eq!(
            timeline.timestamps()[168],
            parse_timestamp("2019-10-04 00:00:00").unwrap()
        );
        assert_approx_eq!(f64, timeline.segments()[1].weight, 38.0 / 51.0);
    }

    #[rstest]
    fn too_many_clusters(stepped_traces: Traces, technologies: TechnologyMap) {
        let result = cluster_year(&stepped_traces, &technologies, 2020, &settings(60));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Cannot form 60 clusters from 51 periods"
        );
    }

    #[rstest]
    #[case(false, 1)]
    #[case(true, 2)]
    fn anchor_is_closest_to_synthetic(#[case] max_synthetic: bool, #[case] expected: usize) {
        let periods = Periods {
            dates: vec![date("2019-07-05"), date("2019-07-12"), date("2019-07-19")],
            vectors: vec![vec![1.0], vec![2.0], vec![9.0]],
            days: 7,
            intervals_per_day: 24,
        };
        let weeks = select_weeks(&periods, 1, max_synthetic).unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].start, periods.dates[expected]);
        assert_eq!(weeks[0].members, 3);
    }

    #[rstest]
    fn extreme_week_added(technologies: TechnologyMap) {
        let calm = date("2020-01-10");
        let traces = Traces {
            demand: indexmap! { RegionID(1) => year_series(|_| 100.0) },
            capacity_factors: indexmap! {
                (ZoneID(1), TechnologyID(12)) => year_series(|ts| {
                    let offset = (ts.date() - calm).num_days();
                    if (0..7).contains(&offset) { 0.0 } else { 0.5 }
                }),
            },
            ..Default::default()
        };
        let settings = ClusterSettings {
            extreme_week: true,
            ..settings(1)
        };

        let clustering = cluster_year(&traces, &technologies, 2020, &settings).unwrap();
        assert_eq!(clustering.weeks.len(), 2);
        let extreme = &clustering.weeks[1];
        assert!(extreme.extreme);
        assert_eq!(extreme.start, calm);
        assert_approx_eq!(f64, extreme.weight, 1.0 / 52.0);
        assert_approx_eq!(f64, clustering.weeks[0].weight, 51.0 / 52.0);
        assert_approx_eq!(f64, clustering.total_weight(), 1.0, epsilon = 1e-12);
    }

    #[rstest]
    fn extreme_week_skipped_without_renewables(
        stepped_traces: Traces,
        technologies: TechnologyMap,
    ) {
        let settings = ClusterSettings {
            extreme_week: true,
            ..settings(2)
        };
        let clustering = cluster_year(&stepped_traces, &technologies, 2020, &settings).unwrap();
        assert_eq!(clustering.weeks.len(), 2);
        assert!(clustering.weeks.iter().all(|week| !week.extreme));
    }
}
