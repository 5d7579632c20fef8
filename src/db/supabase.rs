// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgREST-backed diary repository.
//!
//! Requests carry the caller's access token so the table's row-level
//! security applies; every query also filters on `user_id` explicitly.

use crate::db::{parse_entry_id, tables, DiaryStore, LIST_LIMIT};
use crate::error::AppError;
use crate::models::diary::SUMMARY_COLUMNS;
use crate::models::{DiaryEntry, DiarySummary, NewDiaryEntry, VerifiedUser};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// PostgREST client for `diary_entries`.
#[derive(Clone)]
pub struct SupabaseDiaryStore {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    user_id: &'a str,
    earth_diary: &'a str,
    mars_diary: &'a str,
    mars_event: Option<&'a str>,
    image_url: Option<&'a str>,
    sol_number: u64,
    created_at: DateTime<Utc>,
}

/// Error body returned by PostgREST.
#[derive(Debug, Default, Deserialize)]
pub struct PostgrestError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PostgrestError {
    /// The table has not been created yet (first run).
    pub fn is_table_missing(&self) -> bool {
        if matches!(self.code.as_deref(), Some("42P01") | Some("PGRST205")) {
            return true;
        }
        self.message.as_deref().is_some_and(|m| {
            (m.contains("relation") && m.contains("does not exist"))
                || m.contains("Could not find the table")
        })
    }
}

impl SupabaseDiaryStore {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, tables::DIARY_ENTRIES)
    }

    fn request(&self, method: reqwest::Method, user: &VerifiedUser) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.table_url())
            .header("apikey", &self.anon_key)
            .bearer_auth(&user.access_token)
    }

    /// Check status and decode, mapping PostgREST errors.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let parsed: PostgrestError = serde_json::from_str(&body).unwrap_or_default();

            if parsed.is_table_missing() {
                return Err(AppError::TableMissing);
            }

            return Err(AppError::Persistence(format!(
                "{} HTTP {}: {}",
                operation, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Persistence(format!("{} JSON parse error: {}", operation, e)))
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl DiaryStore for SupabaseDiaryStore {
    async fn insert(
        &self,
        user: &VerifiedUser,
        entry: NewDiaryEntry,
    ) -> Result<DiaryEntry, AppError> {
        let row = InsertRow {
            user_id: &user.id,
            earth_diary: &entry.earth_diary,
            mars_diary: &entry.mars_diary,
            mars_event: entry.mars_event.as_deref(),
            image_url: entry.image_url.as_deref(),
            sol_number: entry.sol_number,
            created_at: entry.created_at,
        };

        let response = self
            .request(reqwest::Method::POST, user)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Insert request failed: {}", e)))?;

        let rows: Vec<DiaryEntry> = self.check_response_json(response, "Insert").await?;
        let inserted = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Persistence("Insert returned no row".to_string()))?;

        tracing::info!(user_id = %user.id, diary_id = %inserted.id, "Diary saved");
        Ok(inserted)
    }

    async fn list(&self, user: &VerifiedUser) -> Result<Vec<DiarySummary>, AppError> {
        let response = self
            .request(reqwest::Method::GET, user)
            .query(&[
                ("select", SUMMARY_COLUMNS.to_string()),
                ("user_id", eq(&user.id)),
                ("order", "created_at.desc".to_string()),
                ("limit", LIST_LIMIT.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("List request failed: {}", e)))?;

        let rows: Vec<DiarySummary> = self.check_response_json(response, "List").await?;
        tracing::debug!(user_id = %user.id, count = rows.len(), "Listed diaries");
        Ok(rows)
    }

    async fn delete(&self, user: &VerifiedUser, id: &str) -> Result<DiaryEntry, AppError> {
        let id = parse_entry_id(id)?;

        let response = self
            .request(reqwest::Method::DELETE, user)
            .header("Prefer", "return=representation")
            .query(&[("id", eq(&id.to_string())), ("user_id", eq(&user.id))])
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Delete request failed: {}", e)))?;

        let rows: Vec<DiaryEntry> = self.check_response_json(response, "Delete").await?;
        let deleted = rows
            .into_iter()
            .next()
            .ok_or(AppError::NotFoundOrForbidden)?;

        tracing::info!(user_id = %user.id, diary_id = %deleted.id, "Diary deleted");
        Ok(deleted)
    }
}
