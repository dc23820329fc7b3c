use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::model::ballot::{Candidate, CandidateSet};

/// Default location of the config file.
pub const CONFIG_PATH: &str = "Facevote.toml";

/// Prefix for environment variable overrides, e.g. `FACEVOTE_SESSION_TTL`.
pub const ENV_PREFIX: &str = "FACEVOTE_";

/// Application configuration, derived from built-in defaults, then the
/// config file, then `FACEVOTE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    database: PathBuf,
    verifier_command: Vec<String>,
    verify_timeout: u64,
    session_ttl: u32,
    candidates: CandidateSet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("voting_system.db"),
            verifier_command: Vec::new(),
            verify_timeout: 30,
            session_ttl: 120,
            candidates: CandidateSet::new(vec![
                Candidate {
                    name: "John Doe".to_string(),
                    symbol: Some("Book Symbol".to_string()),
                    description: Some(
                        "John Doe is a community leader known for his work in education reform."
                            .to_string(),
                    ),
                },
                Candidate {
                    name: "Jane Smith".to_string(),
                    symbol: Some("Car Symbol".to_string()),
                    description: Some(
                        "Jane Smith has spearheaded multiple environmental projects.".to_string(),
                    ),
                },
            ]),
        }
    }
}

impl Config {
    /// The layered configuration sources, lowest priority first.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load the configuration. A missing config file is not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Path of the SQLite database file.
    pub fn database(&self) -> &Path {
        &self.database
    }

    /// Override the database path, e.g. from the command line.
    pub fn set_database(&mut self, database: impl Into<PathBuf>) {
        self.database = database.into();
    }

    /// External face verification command, run as `<command...> <probe> <template>`.
    pub fn verifier_command(&self) -> &[String] {
        &self.verifier_command
    }

    /// How long a single template comparison may take before it counts as a failure.
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout)
    }

    /// How long an authenticated voter has to cast their vote.
    pub fn session_ttl(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.session_ttl.into())
    }

    /// The candidates on the ballot.
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }
}
