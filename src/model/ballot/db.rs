use log::{debug, info};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use crate::error::{Error, Result};
use crate::model::{
    db::{is_unique_violation, Store},
    id::Id,
};

use super::{CandidateSet, NewVote, Vote, VoteCore};

/// The durable, append-only record of admitted votes.
///
/// At most one vote exists per voter name. This holds across threads sharing
/// a [`Store`] (the connection lock), across processes sharing the database
/// file (an immediate transaction), and against anything that bypasses both
/// (the unique index on `votes.user_name`).
#[derive(Debug, Clone)]
pub struct BallotBox {
    store: Store,
    candidates: CandidateSet,
}

impl BallotBox {
    pub fn new(store: Store, candidates: CandidateSet) -> Self {
        Self { store, candidates }
    }

    /// The candidates this ballot box accepts votes for.
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Admit a vote, unless the voter has already voted.
    ///
    /// Fails with [`Error::UnknownCandidate`] or [`Error::DuplicateVote`]
    /// without writing anything.
    pub fn cast(&self, voter_name: &str, candidate_name: &str) -> Result<Vote> {
        if !self.candidates.contains(candidate_name) {
            return Err(Error::UnknownCandidate(candidate_name.to_string()));
        }

        let mut conn = self.store.lock()?;
        // Dropping `tx` without committing rolls back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<Id> = tx
            .query_row(
                "SELECT id FROM votes WHERE user_name = ?1",
                params![voter_name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            debug!("Voter {voter_name} already holds vote {id}");
            return Err(Error::DuplicateVote(voter_name.to_string()));
        }

        let inserted = tx.execute(
            "INSERT INTO votes (user_name, candidate_name) VALUES (?1, ?2)",
            params![voter_name, candidate_name],
        );
        if is_unique_violation(inserted.as_ref()) {
            return Err(Error::DuplicateVote(voter_name.to_string()));
        }
        inserted?;
        let id = Id::from(tx.last_insert_rowid());
        tx.commit()?;

        info!("Vote {id} for {candidate_name} by {voter_name} registered");
        Ok(Vote {
            id,
            vote: NewVote {
                voter_name: voter_name.to_string(),
                candidate_name: candidate_name.to_string(),
            },
        })
    }

    /// Whether a vote has been admitted for this voter.
    pub fn has_voted(&self, voter_name: &str) -> Result<bool> {
        let conn = self.store.lock()?;
        let existing: Option<Id> = conn
            .query_row(
                "SELECT id FROM votes WHERE user_name = ?1",
                params![voter_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing.is_some())
    }

    /// Every admitted vote, in admission order.
    pub fn votes(&self) -> Result<Vec<Vote>> {
        let conn = self.store.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, user_name, candidate_name FROM votes ORDER BY id ASC")?;
        let votes = stmt
            .query_map([], vote_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(votes)
    }

    /// Vote counts per candidate, ordered by each candidate's first vote.
    pub fn candidate_counts(&self) -> Result<Vec<(String, u64)>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(
            "SELECT candidate_name, COUNT(*), MIN(id) AS first_vote
             FROM votes
             GROUP BY candidate_name
             ORDER BY first_vote ASC",
        )?;
        let counts = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, count.unsigned_abs()))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }
}

fn vote_from_row(row: &Row<'_>) -> rusqlite::Result<Vote> {
    Ok(Vote {
        id: row.get(0)?,
        vote: VoteCore {
            voter_name: row.get(1)?,
            candidate_name: row.get(2)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[store_test]
    async fn second_cast_is_a_duplicate(ballots: BallotBox) {
        let vote = ballots.cast("B", "X").unwrap();
        assert_eq!(vote.voter_name, "B");
        assert_eq!(vote.candidate_name, "X");

        let err = ballots.cast("B", "Y").unwrap_err();
        assert!(matches!(err, Error::DuplicateVote(ref name) if name == "B"));

        // The original vote is untouched and nothing else was written.
        let votes = ballots.votes().unwrap();
        assert_eq!(votes, vec![vote]);
        assert!(ballots.has_voted("B").unwrap());
        assert!(!ballots.has_voted("A").unwrap());
    }

    #[store_test]
    async fn unknown_candidates_are_rejected(ballots: BallotBox) {
        let err = ballots.cast("B", "Nobody").unwrap_err();
        assert!(matches!(err, Error::UnknownCandidate(ref name) if name == "Nobody"));
        assert!(ballots.votes().unwrap().is_empty());

        // The rejected attempt did not use up the voter's vote.
        ballots.cast("B", "X").unwrap();
    }

    #[store_test]
    async fn concurrent_casts_admit_one_vote(ballots: BallotBox) {
        let results = std::thread::scope(|scope| {
            let handles = (0..8)
                .map(|i| {
                    let ballots = ballots.clone();
                    let candidate = if i % 2 == 0 { "X" } else { "Y" };
                    scope.spawn(move || ballots.cast("B", candidate))
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::DuplicateVote(_))));
        assert_eq!(ballots.votes().unwrap().len(), 1);
    }

    #[store_test]
    async fn different_voters_vote_independently(ballots: BallotBox) {
        std::thread::scope(|scope| {
            for name in ["A", "B", "C", "D"] {
                let ballots = ballots.clone();
                scope.spawn(move || ballots.cast(name, "X").unwrap());
            }
        });

        let voters = ballots
            .votes()
            .unwrap()
            .into_iter()
            .map(|v| v.vote.voter_name)
            .collect::<HashSet<_>>();
        assert_eq!(voters.len(), 4);
    }

    #[test]
    fn duplicates_are_caught_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votes.db");
        let first = BallotBox::new(Store::open(&path).unwrap(), CandidateSet::example());
        let second = BallotBox::new(Store::open(&path).unwrap(), CandidateSet::example());

        first.cast("B", "X").unwrap();
        let err = second.cast("B", "Y").unwrap_err();
        assert!(matches!(err, Error::DuplicateVote(_)));
        assert_eq!(second.votes().unwrap().len(), 1);
    }

    #[store_test]
    async fn counts_follow_first_appearance(ballots: BallotBox) {
        ballots.cast("A", "Y").unwrap();
        ballots.cast("B", "X").unwrap();
        ballots.cast("C", "X").unwrap();
        ballots.cast("D", "Z").unwrap();

        assert_eq!(
            ballots.candidate_counts().unwrap(),
            vec![
                ("Y".to_string(), 1),
                ("X".to_string(), 2),
                ("Z".to_string(), 1)
            ]
        );
    }
}
