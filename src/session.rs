//! One voter's path through the booth: capture, identify, cast.
//!
//! Authentication produces an explicit [`VoterSession`], which is the only way
//! to cast. Outcomes are plain data for whatever presents them.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::capture::Capture;
use crate::error::{Error, Result};
use crate::logging::SessionId;
use crate::matcher::Matcher;
use crate::model::{
    ballot::{BallotBox, Vote},
    candidate_totals::{self, Report},
    id::Id,
    voter::Voter,
};
use crate::verifier::Verifier;

/// Proof that a particular voter was recognised at the booth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoterSession {
    pub id: SessionId,
    pub voter_id: Id,
    pub voter_name: String,
    pub authenticated_at: DateTime<Utc>,
}

impl VoterSession {
    fn new(id: SessionId, voter: &Voter) -> Self {
        Self {
            id,
            voter_id: voter.id,
            voter_name: voter.name.clone(),
            authenticated_at: Utc::now(),
        }
    }

    /// Whether the session is older than `ttl` at time `now`.
    pub fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.authenticated_at > ttl
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(VoterSession),
    NotRecognized,
}

impl Display for AuthOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authenticated(session) => write!(
                f,
                "Authenticated as {}. Please vote for a candidate.",
                session.voter_name
            ),
            Self::NotRecognized => write!(f, "Face not recognized. Please try again."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastOutcome {
    Accepted(Vote),
    AlreadyVoted,
}

impl Display for CastOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted(vote) => write!(f, "Thank you for voting for {}.", vote.candidate_name),
            Self::AlreadyVoted => write!(f, "You have already voted."),
        }
    }
}

/// Everything a voting station needs, wired together.
pub struct Booth<C, V> {
    capture: C,
    matcher: Matcher<V>,
    ballots: BallotBox,
    session_ttl: Duration,
}

impl<C, V> Booth<C, V>
where
    C: Capture,
    V: Verifier,
{
    pub fn new(capture: C, matcher: Matcher<V>, ballots: BallotBox, session_ttl: Duration) -> Self {
        Self {
            capture,
            matcher,
            ballots,
            session_ttl,
        }
    }

    pub fn ballots(&self) -> &BallotBox {
        &self.ballots
    }

    /// Capture a face and try to recognise it.
    ///
    /// Fails only if the capture or the registry is unavailable.
    pub async fn authenticate(&self) -> Result<AuthOutcome> {
        let session = SessionId::next();
        let probe = self.capture.capture_probe().await.map_err(|e| {
            warn!("{session} capture failed: {e}");
            Error::from(e)
        })?;

        Ok(match self.matcher.identify(session, &probe).await? {
            Some(voter) => AuthOutcome::Authenticated(VoterSession::new(session, &voter)),
            None => AuthOutcome::NotRecognized,
        })
    }

    /// Cast the authenticated voter's vote.
    ///
    /// A repeat vote is an expected outcome, not an error.
    pub fn cast(&self, session: &VoterSession, candidate_name: &str) -> Result<CastOutcome> {
        self.cast_at(session, candidate_name, Utc::now())
    }

    fn cast_at(
        &self,
        session: &VoterSession,
        candidate_name: &str,
        now: DateTime<Utc>,
    ) -> Result<CastOutcome> {
        if session.is_expired_at(self.session_ttl, now) {
            return Err(Error::SessionExpired(session.id));
        }
        match self.ballots.cast(&session.voter_name, candidate_name) {
            Ok(vote) => Ok(CastOutcome::Accepted(vote)),
            Err(Error::DuplicateVote(_)) => {
                info!("{} {} has already voted", session.id, session.voter_name);
                Ok(CastOutcome::AlreadyVoted)
            }
            Err(e) => Err(e),
        }
    }

    /// The current results.
    pub fn report(&self) -> Result<Report> {
        candidate_totals::aggregate(&self.ballots)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;

    use super::*;
    use crate::capture::{CaptureError, Probe};
    use crate::model::candidate_totals::Winner;
    use crate::model::voter::{NewVoter, Registry, TemplateRef};
    use crate::verifier::VerifyError;

    /// Hands out a queue of pictures, then reports the camera as gone.
    struct QueuedCapture(std::sync::Mutex<Vec<Vec<u8>>>);

    impl QueuedCapture {
        fn new(pictures: &[&str]) -> Self {
            let mut queue = pictures
                .iter()
                .map(|p| p.as_bytes().to_vec())
                .collect::<Vec<_>>();
            queue.reverse();
            Self(std::sync::Mutex::new(queue))
        }
    }

    #[async_trait]
    impl Capture for QueuedCapture {
        async fn capture_probe(&self) -> std::result::Result<Probe, CaptureError> {
            self.0
                .lock()
                .unwrap()
                .pop()
                .map(Probe::new)
                .ok_or(CaptureError::Empty)
        }
    }

    /// Matches a probe whose bytes are the voter's name.
    struct NameVerifier(HashMap<TemplateRef, String>);

    #[async_trait]
    impl Verifier for NameVerifier {
        async fn verify(
            &self,
            probe: &Probe,
            template: &TemplateRef,
        ) -> std::result::Result<bool, VerifyError> {
            Ok(self.0.get(template).map(|n| n.as_bytes()) == Some(probe.bytes()))
        }
    }

    fn booth(
        registry: Registry,
        ballots: BallotBox,
        pictures: &[&str],
    ) -> Booth<QueuedCapture, NameVerifier> {
        let mut templates = HashMap::new();
        for name in ["Malini", "Dharanya", "Devadharshini"] {
            let voter = registry.enroll(NewVoter::example(name)).unwrap();
            templates.insert(voter.template.clone(), name.to_string());
        }
        let matcher = Matcher::new(
            registry,
            NameVerifier(templates),
            StdDuration::from_secs(5),
        );
        Booth::new(
            QueuedCapture::new(pictures),
            matcher,
            ballots,
            Duration::minutes(2),
        )
    }

    async fn authenticated(booth: &Booth<QueuedCapture, NameVerifier>) -> VoterSession {
        match booth.authenticate().await.unwrap() {
            AuthOutcome::Authenticated(session) => session,
            AuthOutcome::NotRecognized => panic!("expected to be recognised"),
        }
    }

    #[store_test]
    async fn full_session(registry: Registry, ballots: BallotBox) {
        let booth = booth(registry, ballots, &["Dharanya", "Malini", "Dharanya"]);

        let session = authenticated(&booth).await;
        assert_eq!(session.voter_name, "Dharanya");
        let outcome = booth.cast(&session, "John Doe").unwrap();
        assert_eq!(outcome.to_string(), "Thank you for voting for John Doe.");

        let session = authenticated(&booth).await;
        assert_eq!(
            AuthOutcome::Authenticated(session.clone()).to_string(),
            "Authenticated as Malini. Please vote for a candidate."
        );
        booth.cast(&session, "Jane Smith").unwrap();

        // Coming back for a second go.
        let session = authenticated(&booth).await;
        let outcome = booth.cast(&session, "Jane Smith").unwrap();
        assert_eq!(outcome, CastOutcome::AlreadyVoted);
        assert_eq!(outcome.to_string(), "You have already voted.");

        let report = booth.report().unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.winner, Winner::Candidate("John Doe".to_string()));
        assert!(report.is_tie());
    }

    #[store_test]
    async fn strangers_are_not_recognised(registry: Registry, ballots: BallotBox) {
        let booth = booth(registry, ballots, &["Someone Else"]);
        let outcome = booth.authenticate().await.unwrap();
        assert_eq!(outcome, AuthOutcome::NotRecognized);
        assert_eq!(outcome.to_string(), "Face not recognized. Please try again.");
    }

    #[store_test]
    async fn capture_failures_surface(registry: Registry, ballots: BallotBox) {
        let booth = booth(registry, ballots, &[]);
        let err = booth.authenticate().await.unwrap_err();
        assert!(matches!(err, Error::CaptureUnavailable(_)));
    }

    #[store_test]
    async fn expired_sessions_cannot_vote(registry: Registry, ballots: BallotBox) {
        let booth = booth(registry, ballots, &["Malini"]);
        let session = authenticated(&booth).await;

        let later = session.authenticated_at + Duration::minutes(3);
        let err = booth.cast_at(&session, "John Doe", later).unwrap_err();
        assert!(matches!(err, Error::SessionExpired(id) if id == session.id));
        assert!(!booth.ballots().has_voted("Malini").unwrap());

        // Still within the window.
        let soon = session.authenticated_at + Duration::minutes(1);
        booth.cast_at(&session, "John Doe", soon).unwrap();
    }

    #[store_test]
    async fn unknown_candidates_are_errors(registry: Registry, ballots: BallotBox) {
        let booth = booth(registry, ballots, &["Malini"]);
        let session = authenticated(&booth).await;
        let err = booth.cast(&session, "Nobody").unwrap_err();
        assert!(matches!(err, Error::UnknownCandidate(_)));
    }
}
