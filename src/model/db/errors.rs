//! rusqlite reports constraint failures as generic SQLite errors.
//! This module picks out the ones we care about.

use rusqlite::{ffi, Error as DbError, ErrorCode};

/// Return true if the given result is a `UNIQUE` constraint violation.
pub fn is_unique_violation<T>(result: Result<T, &DbError>) -> bool {
    if let Err(DbError::SqliteFailure(err, _)) = result {
        return err.code == ErrorCode::ConstraintViolation
            && err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE;
    }
    false
}
