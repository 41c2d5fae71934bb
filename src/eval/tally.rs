//! Per-configuration win counting across queries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the win report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyRow {
    pub config_name: String,
    pub wins: usize,
    /// Share of all recorded wins, in percent.
    pub win_percentage: f64,
}

/// Machine-readable stats for one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyStats {
    pub wins: usize,
    pub win_percentage: f64,
}

/// Win counts keyed by configuration, in registration order.
#[derive(Debug, Clone, Default)]
pub struct WinTally {
    counts: Vec<(String, usize)>,
}

impl WinTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally with every configuration pre-registered at zero wins, so the
    /// report lists them all and ties keep declaration order.
    pub fn with_configs<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tally = Self::new();
        for name in names {
            tally.register(name);
        }
        tally
    }

    pub fn register(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.counts.iter().any(|(n, _)| *n == name) {
            self.counts.push((name, 0));
        }
    }

    /// Count one win. Unknown names are registered on first use.
    pub fn record(&mut self, config_name: &str) {
        match self.counts.iter_mut().find(|(n, _)| n == config_name) {
            Some((_, wins)) => *wins += 1,
            None => self.counts.push((config_name.to_string(), 1)),
        }
    }

    pub fn wins(&self, config_name: &str) -> usize {
        self.counts
            .iter()
            .find(|(n, _)| n == config_name)
            .map(|(_, w)| *w)
            .unwrap_or(0)
    }

    /// Sum of all wins, which equals the number of scored queries.
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, w)| w).sum()
    }

    fn percentage(&self, wins: usize) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            wins as f64 / total as f64 * 100.0
        }
    }

    /// Rows sorted by wins descending; equal wins keep registration order.
    pub fn report(&self) -> Vec<TallyRow> {
        let mut rows: Vec<TallyRow> = self
            .counts
            .iter()
            .map(|(name, wins)| TallyRow {
                config_name: name.clone(),
                wins: *wins,
                win_percentage: self.percentage(*wins),
            })
            .collect();
        rows.sort_by(|a, b| b.wins.cmp(&a.wins));
        rows
    }

    pub fn to_map(&self) -> BTreeMap<String, TallyStats> {
        self.counts
            .iter()
            .map(|(name, wins)| {
                (
                    name.clone(),
                    TallyStats {
                        wins: *wins,
                        win_percentage: self.percentage(*wins),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sorted_by_wins() {
        let mut tally = WinTally::with_configs(["a", "b", "c"]);
        tally.record("b");
        tally.record("c");
        tally.record("b");

        let report = tally.report();
        let names: Vec<&str> = report.iter().map(|r| r.config_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert_eq!(report[0].wins, 2);
        assert!((report[0].win_percentage - 66.666).abs() < 0.01);
        assert_eq!(report[2].win_percentage, 0.0);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let mut tally = WinTally::with_configs(["first", "second", "third"]);
        tally.record("third");
        tally.record("second");

        let names: Vec<String> = tally.report().into_iter().map(|r| r.config_name).collect();
        assert_eq!(names, vec!["second", "third", "first"]);
    }

    #[test]
    fn test_empty_tally_reports_zero_percent() {
        let tally = WinTally::with_configs(["a", "b"]);
        assert_eq!(tally.total(), 0);
        assert!(tally.report().iter().all(|r| r.win_percentage == 0.0));
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let mut tally = WinTally::with_configs(["a", "b", "c"]);
        for name in ["a", "a", "b", "c", "c", "c", "a"] {
            tally.record(name);
        }
        let sum: f64 = tally.report().iter().map(|r| r.win_percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert_eq!(tally.total(), 7);
    }

    #[test]
    fn test_to_map_and_unknown_names() {
        let mut tally = WinTally::new();
        tally.record("late");
        tally.register("late");

        let map = tally.to_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map["late"].wins, 1);
        assert_eq!(map["late"].win_percentage, 100.0);
        assert_eq!(tally.wins("missing"), 0);
    }
}
