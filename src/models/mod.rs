// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod diary;
pub mod user;

pub use diary::{DiaryEntry, DiarySummary, MarsDiary, NewDiaryEntry};
pub use user::{AuthUserRecord, VerifiedUser};
