use std::fmt;

use crate::logname::SeriesKey;

/// Display statistic of one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Mean(f64),
    /// Nothing left after dropping zero samples
    NoData,
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Mean(value) => write!(f, "{value:5.2}"),
            Statistic::NoData => f.write_str("no data"),
        }
    }
}

/// How samples of a cell are averaged.
///
/// Exact zeros are instrumentation artifacts (a run where the throughput
/// tool never connected) and are dropped under every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AveragePolicy {
    #[default]
    Mean,
    /// Drop the lowest and highest sample when more than three remain
    TrimmedMean,
}

impl AveragePolicy {
    pub fn apply(&self, samples: &[f64]) -> Statistic {
        let mut values: Vec<f64> = samples.iter().copied().filter(|v| *v != 0.0).collect();

        if *self == AveragePolicy::TrimmedMean && values.len() > 3 {
            values.sort_by(f64::total_cmp);
            values.pop();
            values.remove(0);
        }

        if values.is_empty() {
            return Statistic::NoData;
        }
        Statistic::Mean(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// One association count or depth of a series
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub number: u32,
    pub statistic: Statistic,
    /// Every extracted sample, zeros included
    pub samples: Vec<f64>,
}

impl Row {
    /// `<number> <statistic> (<samples>)`
    pub fn dataset_line(&self) -> String {
        let samples: Vec<String> = self.samples.iter().map(|v| format!("{v:?}")).collect();
        format!("{:2} {} ({})", self.number, self.statistic, samples.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSeries {
    pub key: SeriesKey,
    pub rows: Vec<Row>,
}

impl AggregatedSeries {
    /// Name used for the series' dataset file
    pub fn name(&self) -> String {
        self.key.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    policy: AveragePolicy,
}

impl Aggregator {
    pub fn new(policy: AveragePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AveragePolicy {
        self.policy
    }

    /// Collapse `(number, samples)` cells into a series, keeping their order
    pub fn aggregate<I>(&self, key: SeriesKey, cells: I) -> AggregatedSeries
    where
        I: IntoIterator<Item = (u32, Vec<f64>)>,
    {
        let rows = cells
            .into_iter()
            .map(|(number, samples)| Row {
                number,
                statistic: self.policy.apply(&samples),
                samples,
            })
            .collect();
        AggregatedSeries { key, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logname::Sweep;

    #[test]
    fn test_zero_samples_filtered() {
        let stat = AveragePolicy::Mean.apply(&[10.0, 0.0, 20.0]);
        assert_eq!(stat, Statistic::Mean(15.0));
        assert_eq!(stat.to_string(), "15.00");
    }

    #[test]
    fn test_no_data() {
        assert_eq!(AveragePolicy::Mean.apply(&[0.0, 0.0]), Statistic::NoData);
        assert_eq!(AveragePolicy::Mean.apply(&[]), Statistic::NoData);
        assert_eq!(Statistic::NoData.to_string(), "no data");
    }

    #[test]
    fn test_two_decimals_padded() {
        // Padded to five columns so datasets line up
        assert_eq!(AveragePolicy::Mean.apply(&[5.2]).to_string(), " 5.20");
        assert_eq!(AveragePolicy::Mean.apply(&[1.0, 2.0, 2.0]).to_string(), " 1.67");
        assert_eq!(AveragePolicy::Mean.apply(&[92000.0]).to_string(), "92000.00");
    }

    #[test]
    fn test_trimmed_mean() {
        let samples = [0.0, 100.0, 10.0, 12.0, 14.0, 1.0];
        assert_eq!(AveragePolicy::TrimmedMean.apply(&samples), Statistic::Mean(12.0));

        // Too few samples to trim
        assert_eq!(
            AveragePolicy::TrimmedMean.apply(&[1.0, 2.0, 9.0]),
            Statistic::Mean(4.0)
        );
        assert_eq!(AveragePolicy::TrimmedMean.apply(&[0.0]), Statistic::NoData);
    }

    #[test]
    fn test_dataset_line() {
        let series = Aggregator::default().aggregate(
            SeriesKey::new("N", Sweep::Associations),
            vec![(1, vec![92061.0, 0.0, 92841.5]), (10, vec![])],
        );

        assert_eq!(series.name(), "N");
        assert_eq!(series.rows[0].dataset_line(), " 1 92451.25 (92061.0, 0.0, 92841.5)");
        assert_eq!(series.rows[1].dataset_line(), "10 no data ()");
    }
}
