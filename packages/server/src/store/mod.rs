//! `common::repository` implementations over a sea-orm connection.

mod evidence;
mod records;

pub use evidence::SeaEvidenceIndex;
pub use records::SeaRecordStore;

use common::StoreError;
use sea_orm::{DbErr, SqlErr};

fn store_error(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Duplicate(detail),
        _ => StoreError::Unavailable(err.to_string()),
    }
}
