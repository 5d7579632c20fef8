// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod diary;
pub mod gemini;
pub mod identity;
pub mod image_gen;
pub mod image_store;
pub mod prompt;
pub mod proxy;
pub mod storage;

pub use diary::DiaryService;
pub use gemini::{GeminiClient, SamplingConfig, TextModel};
pub use identity::{IdentityProvider, JwtIdentityProvider, SupabaseAuth};
pub use image_gen::{GeneratedImage, ImageGenClient, ImageModel};
pub use image_store::{ImagePersistence, LocalImageStore, PersistedImage};
pub use proxy::ImageProxy;
pub use storage::{ObjectStore, SupabaseStorage};
