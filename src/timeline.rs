//! The ordered, cyclic dispatch intervals of a model.
//!
//! A timeline is made of one or more segments of hourly intervals. A full-year model has a single
//! segment; a clustered model has one segment per representative week. The interval before the
//! first one of a segment is the last one of the same segment, so state-carrying constraints wrap
//! around within each segment.
use crate::id::define_id_type;
use anyhow::{Context, Result, ensure};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

define_id_type! {IntervalID}

/// The format of timestamps in input and output files
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Hours in a year without a leap day
pub const HOURS_IN_YEAR: f64 = 8760.0;

/// Hours in a year with a leap day
pub const HOURS_IN_LEAP_YEAR: f64 = 8784.0;

/// A contiguous run of intervals representing a fraction of the year
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    start: usize,
    len: usize,
    /// Fraction of the year represented by this segment
    pub weight: f64,
}

impl Segment {
    /// Iterate over the intervals in the segment
    pub fn iter(&self) -> impl Iterator<Item = IntervalID> + use<> {
        (self.start..self.start + self.len).map(to_interval)
    }

    /// Number of intervals in the segment
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the segment has no intervals
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The dispatch intervals of a model
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    timestamps: Vec<NaiveDateTime>,
    segments: Vec<Segment>,
    segment_of: Vec<usize>,
    hours_in_year: f64,
}

fn to_interval(idx: usize) -> IntervalID {
    IntervalID(u32::try_from(idx).expect("Too many intervals"))
}

fn index(t: IntervalID) -> usize {
    t.value() as usize
}

impl Timeline {
    /// Create a timeline with a single segment covering the whole year
    pub fn single(timestamps: Vec<NaiveDateTime>) -> Result<Self> {
        Self::from_segments(vec![(timestamps, 1.0)])
    }

    /// Create a timeline from weighted segments of hourly timestamps.
    ///
    /// Weights must be positive and sum to 1.
    pub fn from_segments(segments: Vec<(Vec<NaiveDateTime>, f64)>) -> Result<Self> {
        ensure!(!segments.is_empty(), "Timeline has no segments");
        let total: f64 = segments.iter().map(|(_, w)| w).sum();
        ensure!(
            (total - 1.0).abs() < 1e-9,
            "Segment weights must sum to 1 (got {total})"
        );

        let mut timestamps = Vec::new();
        let mut segment_of = Vec::new();
        let mut out = Vec::new();
        for (idx, (seg_timestamps, weight)) in segments.into_iter().enumerate() {
            ensure!(!seg_timestamps.is_empty(), "Timeline segment {idx} is empty");
            ensure!(weight > 0.0, "Timeline segment {idx} has non-positive weight");
            ensure!(
                seg_timestamps.is_sorted_by(|a, b| a < b),
                "Timestamps in timeline segment {idx} must be strictly increasing"
            );
            out.push(Segment {
                start: timestamps.len(),
                len: seg_timestamps.len(),
                weight,
            });
            segment_of.extend(std::iter::repeat_n(idx, seg_timestamps.len()));
            timestamps.extend(seg_timestamps);
        }

        let last = timestamps.last().context("Timeline has no intervals")?;
        let hours_in_year = hours_in_year(last.year());

        Ok(Self {
            timestamps,
            segments: out,
            segment_of,
            hours_in_year,
        })
    }

    /// Number of intervals
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether there are no intervals
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Iterate over all intervals in order
    pub fn iter(&self) -> impl Iterator<Item = IntervalID> + use<> {
        (0..self.len()).map(to_interval)
    }

    /// The segments of the timeline
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The index of the segment an interval belongs to
    pub fn segment_index(&self, t: IntervalID) -> usize {
        self.segment_of[index(t)]
    }

    /// The timestamp of an interval
    pub fn timestamp(&self, t: IntervalID) -> NaiveDateTime {
        self.timestamps[index(t)]
    }

    /// All timestamps in order
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// The interval `k` steps before `t`, wrapping around within its segment
    pub fn prev(&self, t: IntervalID, k: usize) -> IntervalID {
        let seg = &self.segments[self.segment_index(t)];
        let offset = index(t) - seg.start;
        let k = k % seg.len;
        to_interval(seg.start + (offset + seg.len - k) % seg.len)
    }

    /// The interval after `t`, wrapping around within its segment
    pub fn next(&self, t: IntervalID) -> IntervalID {
        let seg = &self.segments[self.segment_index(t)];
        let offset = index(t) - seg.start;
        to_interval(seg.start + (offset + 1) % seg.len)
    }

    /// Hours of a year represented by one hour of interval `t`
    pub fn annual_weight(&self, t: IntervalID) -> f64 {
        let seg = &self.segments[self.segment_index(t)];
        seg.weight * self.hours_in_year / seg.len as f64
    }

    /// Hours in the year being modelled
    pub fn hours_in_year(&self) -> f64 {
        self.hours_in_year
    }

    /// Ratio of hours in the year to the number of modelled intervals
    pub fn year_correction_factor(&self) -> f64 {
        self.hours_in_year / self.len() as f64
    }
}

/// Hours in a year, counting the leap day if `calendar_year` has one
pub fn hours_in_year(calendar_year: i32) -> f64 {
    if NaiveDate::from_ymd_opt(calendar_year, 2, 29).is_some() {
        HOURS_IN_LEAP_YEAR
    } else {
        HOURS_IN_YEAR
    }
}

/// The first and last hour of financial year `year` (1 July of `year - 1` to 30 June of `year`)
pub fn financial_year_bounds(year: u32) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let year = i32::try_from(year)?;
    let start = NaiveDate::from_ymd_opt(year - 1, 7, 1).context("Invalid year")?;
    let end = NaiveDate::from_ymd_opt(year, 6, 30).context("Invalid year")?;

    Ok((
        start.and_time(NaiveTime::MIN),
        end.and_hms_opt(23, 0, 0).context("Invalid time")?,
    ))
}

/// The first and last hour of the first week of financial year `year`
pub fn first_week_bounds(year: u32) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let (start, _) = financial_year_bounds(year)?;
    let end = NaiveDate::from_ymd_opt(start.year(), 7, 7)
        .and_then(|d| d.and_hms_opt(23, 0, 0))
        .context("Invalid year")?;

    Ok((start, end))
}

/// Parse a timestamp in [`TIMESTAMP_FORMAT`]
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
        .with_context(|| format!("Invalid timestamp: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn hours(start: &str, n: usize) -> Vec<NaiveDateTime> {
        let start = parse_timestamp(start).unwrap();
        (0..n)
            .map(|h| start + chrono::Duration::hours(h as i64))
            .collect()
    }

    #[test]
    fn prev_and_next_wrap_within_segment() {
        let timeline = Timeline::from_segments(vec![
            (hours("2019-07-05 00:00:00", 4), 0.5),
            (hours("2019-08-02 00:00:00", 3), 0.5),
        ])
        .unwrap();

        assert_eq!(timeline.prev(IntervalID(0), 1), IntervalID(3));
        assert_eq!(timeline.prev(IntervalID(2), 1), IntervalID(1));
        assert_eq!(timeline.prev(IntervalID(1), 3), IntervalID(2));
        assert_eq!(timeline.next(IntervalID(3)), IntervalID(0));
        assert_eq!(timeline.prev(IntervalID(4), 1), IntervalID(6));
        assert_eq!(timeline.next(IntervalID(6)), IntervalID(4));
        assert_eq!(timeline.prev(IntervalID(5), 7), IntervalID(4));
    }

    #[test]
    fn annual_weights_cover_the_year() {
        let timeline = Timeline::from_segments(vec![
            (hours("2019-07-05 00:00:00", 168), 0.75),
            (hours("2019-08-02 00:00:00", 168), 0.25),
        ])
        .unwrap();
        let total: f64 = timeline.iter().map(|t| timeline.annual_weight(t)).sum();
        assert_approx_eq!(f64, total, HOURS_IN_YEAR, epsilon = 1e-9);
    }

    #[rstest]
    #[case("2019-07-01 00:00:00", 24, 365.0)]
    #[case("2019-07-01 00:00:00", 8784, 1.0)]
    #[case("2020-06-01 00:00:00", 24, 366.0)]
    fn year_correction_factor(#[case] start: &str, #[case] n: usize, #[case] expected: f64) {
        let timeline = Timeline::single(hours(start, n)).unwrap();
        assert_approx_eq!(f64, timeline.year_correction_factor(), expected);
    }

    #[rstest]
    #[case(vec![0.5, 0.4])]
    #[case(vec![1.0, 0.0])]
    fn bad_weights(#[case] weights: Vec<f64>) {
        let segments = weights
            .into_iter()
            .map(|w| (hours("2019-07-05 00:00:00", 2), w))
            .collect();
        assert!(Timeline::from_segments(segments).is_err());
    }

    #[test]
    fn financial_year() {
        let (start, end) = financial_year_bounds(2020).unwrap();
        assert_eq!(start, parse_timestamp("2019-07-01 00:00:00").unwrap());
        assert_eq!(end, parse_timestamp("2020-06-30 23:00:00").unwrap());
        let (_, end) = first_week_bounds(2020).unwrap();
        assert_eq!(end, parse_timestamp("2019-07-07 23:00:00").unwrap());
    }
}
