// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Diary entry model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Placeholder event text when no flavor events were sampled.
pub const CALM_SOL_EVENT: &str = "今日火星平静如常";

/// Stored diary row (`diary_entries`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DiaryEntry {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    /// Owner; always the verified caller
    pub user_id: String,
    pub earth_diary: String,
    pub mars_diary: String,
    #[serde(default)]
    pub mars_event: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sol_number: Option<u64>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

/// Insert payload. `user_id` is filled from the verified identity.
#[derive(Debug, Clone, Serialize)]
pub struct NewDiaryEntry {
    pub earth_diary: String,
    pub mars_diary: String,
    pub mars_event: Option<String>,
    pub image_url: Option<String>,
    pub sol_number: u64,
    pub created_at: DateTime<Utc>,
}

/// Columns returned by the list query (no `user_id`).
pub const SUMMARY_COLUMNS: &str =
    "id,earth_diary,mars_diary,mars_event,image_url,sol_number,created_at";

/// Row as returned by the timeline listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DiarySummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    pub earth_diary: String,
    pub mars_diary: String,
    #[serde(default)]
    pub mars_event: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sol_number: Option<u64>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl From<DiaryEntry> for DiarySummary {
    fn from(entry: DiaryEntry) -> Self {
        Self {
            id: entry.id,
            earth_diary: entry.earth_diary,
            mars_diary: entry.mars_diary,
            mars_event: entry.mars_event,
            image_url: entry.image_url,
            sol_number: entry.sol_number,
            created_at: entry.created_at,
        }
    }
}

/// Output of one narrative generation round.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MarsDiary {
    pub mars_diary: String,
    pub mars_event: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub sol_number: u64,
}
