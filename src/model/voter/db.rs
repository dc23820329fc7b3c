use std::path::PathBuf;

use log::{debug, info};
use rusqlite::{params, OptionalExtension, Row};

use crate::error::Result;
use crate::model::{db::Store, id::Id};

use super::{NewVoter, TemplateRef, Voter, VoterCore};

/// Every enrolled voter and their reference template.
///
/// Voters are append-only: there is no update or removal.
#[derive(Debug, Clone)]
pub struct Registry {
    store: Store,
}

impl Registry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Enroll a new voter. Duplicate names are accepted.
    pub fn enroll(&self, voter: NewVoter) -> Result<Voter> {
        let conn = self.store.lock()?;
        conn.execute(
            "INSERT INTO voters (name, face_path) VALUES (?1, ?2)",
            params![voter.name, voter.template.to_string()],
        )?;
        let id = Id::from(conn.last_insert_rowid());
        info!("Enrolled voter {id} ({})", voter.name);
        Ok(Voter { id, voter })
    }

    /// All voters in enrollment order. Matching precedence follows this order.
    pub fn list_all(&self) -> Result<Vec<Voter>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare("SELECT id, name, face_path FROM voters ORDER BY id ASC")?;
        let voters = stmt
            .query_map([], voter_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Loaded {} enrolled voters", voters.len());
        Ok(voters)
    }

    /// Look up a single voter.
    pub fn get(&self, id: Id) -> Result<Option<Voter>> {
        let conn = self.store.lock()?;
        let voter = conn
            .query_row(
                "SELECT id, name, face_path FROM voters WHERE id = ?1",
                params![id],
                voter_from_row,
            )
            .optional()?;
        Ok(voter)
    }

    /// Number of enrolled voters.
    pub fn count(&self) -> Result<u64> {
        let conn = self.store.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM voters", [], |row| row.get(0))?;
        Ok(count.unsigned_abs())
    }
}

fn voter_from_row(row: &Row<'_>) -> rusqlite::Result<Voter> {
    let face_path: String = row.get(2)?;
    Ok(Voter {
        id: row.get(0)?,
        voter: VoterCore::new(
            row.get::<_, String>(1)?,
            TemplateRef::new(PathBuf::from(face_path)),
        ),
    })
}
