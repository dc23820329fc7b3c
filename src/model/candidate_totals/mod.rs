//! Aggregating admitted votes into a report.
//!
//! Candidates are reported in grouping order: the order in which each
//! candidate received their first vote. This order is a pure function of the
//! vote sequence, so the report (and the winner) is reproducible.
//!
//! Tie-break: when several candidates share the highest count, the winner is
//! the one earliest in grouping order, i.e. the one who was voted for first.
//! [`Report::leaders`] exposes the full set of tied candidates for callers who
//! want to present a tie differently.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::error::Result;
use crate::model::ballot::BallotBox;

/// The result for a single candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateTotals {
    pub candidate_name: String,
    pub count: u64,
    /// Share of all admitted votes, in the range 0 to 100.
    pub percentage: f64,
}

impl Display for CandidateTotals {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} vote{} ({:.2}%)",
            self.candidate_name,
            self.count,
            if self.count != 1 { "s" } else { "" },
            self.percentage
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Candidate(String),
    NoVotes,
}

impl Display for Winner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Candidate(name) => write!(f, "{name}"),
            Self::NoVotes => write!(f, "No votes cast"),
        }
    }
}

/// The final election report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Per-candidate results in grouping order. Empty iff no votes were cast.
    pub totals: Vec<CandidateTotals>,
    pub total: u64,
    pub winner: Winner,
}

impl Report {
    /// All candidates sharing the highest count, in grouping order.
    pub fn leaders(&self) -> Vec<&str> {
        let max = self.totals.iter().map(|t| t.count).max().unwrap_or(0);
        self.totals
            .iter()
            .filter(|t| max > 0 && t.count == max)
            .map(|t| t.candidate_name.as_str())
            .collect()
    }

    /// True iff more than one candidate shares the highest count.
    pub fn is_tie(&self) -> bool {
        self.leaders().len() > 1
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total Votes Casted: {}", self.total)?;
        writeln!(f)?;
        for totals in &self.totals {
            writeln!(f, "{totals}")?;
        }
        writeln!(f)?;
        write!(f, "Winner: {}", self.winner)
    }
}

/// Build a report from per-candidate counts, given in grouping order.
pub fn tally(counts: Vec<(String, u64)>) -> Report {
    let total: u64 = counts.iter().map(|(_, count)| count).sum();

    // Strictly greater, so the earliest candidate keeps a tied lead.
    let mut winner: Option<(&str, u64)> = None;
    for (name, count) in &counts {
        if winner.map_or(true, |(_, best)| *count > best) {
            winner = Some((name.as_str(), *count));
        }
    }
    let winner = match winner {
        Some((name, _)) if total > 0 => Winner::Candidate(name.to_string()),
        _ => Winner::NoVotes,
    };

    let totals = if total == 0 {
        Vec::new()
    } else {
        counts
            .into_iter()
            .map(|(candidate_name, count)| CandidateTotals {
                candidate_name,
                count,
                percentage: 100.0 * count as f64 / total as f64,
            })
            .collect()
    };

    Report {
        totals,
        total,
        winner,
    }
}

/// Aggregate everything currently in the ballot box. Read-only.
pub fn aggregate(ballots: &BallotBox) -> Result<Report> {
    Ok(tally(ballots.candidate_counts()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u64)]) -> Vec<(String, u64)> {
        pairs.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn clear_winner() {
        let report = tally(counts(&[("X", 2), ("Y", 1)]));
        assert_eq!(report.total, 3);
        assert_eq!(report.winner, Winner::Candidate("X".to_string()));
        assert_eq!(report.totals[0].to_string(), "X: 2 votes (66.67%)");
        assert_eq!(report.totals[1].to_string(), "Y: 1 vote (33.33%)");
        assert!(!report.is_tie());
    }

    #[test]
    fn no_votes() {
        let report = tally(Vec::new());
        assert_eq!(report.total, 0);
        assert!(report.totals.is_empty());
        assert_eq!(report.winner, Winner::NoVotes);
        assert_eq!(report.winner.to_string(), "No votes cast");
        assert!(report.leaders().is_empty());
        assert_eq!(
            report.to_string(),
            "Total Votes Casted: 0\n\n\nWinner: No votes cast"
        );
    }

    #[test]
    fn tie_goes_to_first_in_grouping_order() {
        let report = tally(counts(&[("Y", 2), ("X", 2), ("Z", 1)]));
        assert_eq!(report.winner, Winner::Candidate("Y".to_string()));
        assert_eq!(report.leaders(), vec!["Y", "X"]);
        assert!(report.is_tie());

        // Same counts, different first appearance.
        let report = tally(counts(&[("X", 2), ("Y", 2), ("Z", 1)]));
        assert_eq!(report.winner, Winner::Candidate("X".to_string()));
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        for pairs in [
            &[("A", 1), ("B", 1), ("C", 1)][..],
            &[("A", 7), ("B", 3), ("C", 5), ("D", 11)][..],
            &[("A", 1)][..],
        ] {
            let report = tally(counts(pairs));
            let sum: f64 = report.totals.iter().map(|t| t.percentage).sum();
            let tolerance = 0.01 * report.totals.len() as f64;
            assert!((sum - 100.0).abs() <= tolerance, "sum was {sum}");
        }
    }

    #[test]
    fn rendering() {
        let report = tally(counts(&[("John Doe", 2), ("Jane Smith", 1)]));
        assert_eq!(
            report.to_string(),
            "Total Votes Casted: 3\n\n\
             John Doe: 2 votes (66.67%)\n\
             Jane Smith: 1 vote (33.33%)\n\n\
             Winner: John Doe"
        );
    }

    #[store_test]
    async fn aggregate_reads_the_ballot_box(ballots: BallotBox) {
        ballots.cast("A", "X").unwrap();
        ballots.cast("B", "Y").unwrap();
        ballots.cast("C", "X").unwrap();

        let report = aggregate(&ballots).unwrap();
        assert_eq!(report.total, ballots.votes().unwrap().len() as u64);
        assert_eq!(report.winner, Winner::Candidate("X".to_string()));

        // Aggregating is repeatable and changes nothing.
        assert_eq!(aggregate(&ballots).unwrap(), report);
        assert_eq!(ballots.votes().unwrap().len(), 3);
    }
}
