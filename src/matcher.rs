//! Resolving a probe to at most one enrolled voter.
//!
//! Voters are checked one at a time in enrollment order, and the first one the
//! verifier accepts wins. Later voters are never consulted, even if they would
//! also match. A verifier failure for one voter (error or timeout) counts as a
//! non-match for that voter only, and the scan moves on.

use std::time::Duration;

use log::{debug, info, warn};

use crate::capture::Probe;
use crate::error::Result;
use crate::logging::SessionId;
use crate::model::voter::{Registry, Voter};
use crate::verifier::{Verifier, VerifyError};

/// The outcome of comparing a probe against one voter's template.
#[derive(Debug)]
pub enum Verification {
    Matched,
    NotMatched,
    Failed(VerifyError),
}

impl Verification {
    fn from_response(
        response: std::result::Result<std::result::Result<bool, VerifyError>, Duration>,
    ) -> Self {
        match response {
            Ok(Ok(true)) => Self::Matched,
            Ok(Ok(false)) => Self::NotMatched,
            Ok(Err(err)) => Self::Failed(err),
            Err(limit) => Self::Failed(VerifyError::TimedOut(limit)),
        }
    }
}

pub struct Matcher<V> {
    registry: Registry,
    verifier: V,
    verify_timeout: Duration,
}

impl<V> Matcher<V>
where
    V: Verifier,
{
    /// Each individual verifier call is abandoned after `verify_timeout`.
    pub fn new(registry: Registry, verifier: V, verify_timeout: Duration) -> Self {
        Self {
            registry,
            verifier,
            verify_timeout,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Find the first enrolled voter whose template matches `probe`.
    ///
    /// `Ok(None)` means nobody matched. Only a registry failure is an error.
    /// Dropping the returned future abandons the scan; nothing needs undoing.
    pub async fn identify(&self, session: SessionId, probe: &Probe) -> Result<Option<Voter>> {
        let voters = self.registry.list_all()?;
        debug!("{session} scanning {} enrolled voters", voters.len());

        for voter in voters {
            match self.check(probe, &voter).await {
                Verification::Matched => {
                    info!("{session} matched voter {} ({})", voter.id, voter.name);
                    return Ok(Some(voter));
                }
                Verification::NotMatched => {}
                Verification::Failed(err) => {
                    warn!(
                        "{session} verification against voter {} failed, treating as no match: {err}",
                        voter.id
                    );
                }
            }
        }

        info!("{session} matched no enrolled voter");
        Ok(None)
    }

    /// Compare the probe against a single voter, within the time limit.
    pub async fn check(&self, probe: &Probe, voter: &Voter) -> Verification {
        let response = tokio::time::timeout(
            self.verify_timeout,
            self.verifier.verify(probe, &voter.template),
        )
        .await
        .map_err(|_| self.verify_timeout);
        Verification::from_response(response)
    }
}
