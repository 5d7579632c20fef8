//! In-process diary repository.
//!
//! Same ownership rules as the PostgREST store; used by the test suites
//! and for running the API without a backend.

use crate::db::{parse_entry_id, DiaryStore, LIST_LIMIT};
use crate::error::AppError;
use crate::models::{DiaryEntry, DiarySummary, NewDiaryEntry, VerifiedUser};
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryDiaryStore {
    rows: DashMap<Uuid, DiaryEntry>,
    table_missing: bool,
}

impl MemoryDiaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose table "does not exist yet"; inserts fail with
    /// [`AppError::TableMissing`].
    pub fn without_table() -> Self {
        Self {
            rows: DashMap::new(),
            table_missing: true,
        }
    }

    /// Total rows across all users.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl DiaryStore for MemoryDiaryStore {
    async fn insert(
        &self,
        user: &VerifiedUser,
        entry: NewDiaryEntry,
    ) -> Result<DiaryEntry, AppError> {
        if self.table_missing {
            return Err(AppError::TableMissing);
        }

        let row = DiaryEntry {
            id: Uuid::new_v4(),
            user_id: user.id.clone(),
            earth_diary: entry.earth_diary,
            mars_diary: entry.mars_diary,
            mars_event: entry.mars_event,
            image_url: entry.image_url,
            sol_number: Some(entry.sol_number),
            created_at: entry.created_at,
        };
        self.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list(&self, user: &VerifiedUser) -> Result<Vec<DiarySummary>, AppError> {
        if self.table_missing {
            return Err(AppError::TableMissing);
        }

        let mut rows: Vec<DiaryEntry> = self
            .rows
            .iter()
            .filter(|r| r.user_id == user.id)
            .map(|r| r.value().clone())
            .collect();

        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        rows.truncate(LIST_LIMIT);
        Ok(rows.into_iter().map(DiarySummary::from).collect())
    }

    async fn delete(&self, user: &VerifiedUser, id: &str) -> Result<DiaryEntry, AppError> {
        let id = parse_entry_id(id)?;
        self.rows
            .remove_if(&id, |_, row| row.user_id == user.id)
            .map(|(_, row)| row)
            .ok_or(AppError::NotFoundOrForbidden)
    }
}
