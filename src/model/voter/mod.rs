use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::id::Id;

mod db;
pub use db::Registry;

/// Where a voter's reference face image lives.
///
/// Nothing checks that the file exists at enrollment time; a bad reference
/// only shows up as a verification failure when matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateRef(PathBuf);

impl TemplateRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Display for TemplateRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Display name. Votes are keyed on this, and it is not required to be unique.
    pub name: String,
    pub template: TemplateRef,
}

impl VoterCore {
    pub fn new(name: impl Into<String>, template: TemplateRef) -> Self {
        Self {
            name: name.into(),
            template,
        }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// An enrolled voter, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterCore {
        pub fn example(name: &str) -> Self {
            Self::new(name, TemplateRef::new(format!("faces/{name}.jpg")))
        }
    }
}
