//! Database layer (Supabase PostgREST, in-memory for tests).

pub mod memory;
pub mod supabase;

pub use memory::MemoryDiaryStore;
pub use supabase::SupabaseDiaryStore;

use crate::error::AppError;
use crate::models::{DiaryEntry, DiarySummary, NewDiaryEntry, VerifiedUser};
use async_trait::async_trait;
use uuid::Uuid;

/// Table names as constants.
pub mod tables {
    pub const DIARY_ENTRIES: &str = "diary_entries";
}

/// Maximum rows returned by a listing.
pub const LIST_LIMIT: usize = 100;

/// Diary entry repository. Every operation is scoped to `user`.
#[async_trait]
pub trait DiaryStore: Send + Sync {
    /// Insert with `user_id` forced to `user.id`.
    async fn insert(&self, user: &VerifiedUser, entry: NewDiaryEntry)
        -> Result<DiaryEntry, AppError>;

    /// Caller's entries, newest first, at most [`LIST_LIMIT`].
    async fn list(&self, user: &VerifiedUser) -> Result<Vec<DiarySummary>, AppError>;

    /// Delete where both id and owner match; returns the deleted row.
    async fn delete(&self, user: &VerifiedUser, id: &str) -> Result<DiaryEntry, AppError>;
}

/// Parse an entry id. Malformed ids cannot match any row.
pub fn parse_entry_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id.trim()).map_err(|_| AppError::NotFoundOrForbidden)
}
