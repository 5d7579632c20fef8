// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, Request, Response};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use mars_diary::config::Config;
use mars_diary::db::MemoryDiaryStore;
use mars_diary::error::AppError;
use mars_diary::routes::create_router;
use mars_diary::services::identity::{Claims, AUTHENTICATED_AUDIENCE};
use mars_diary::services::prompt::ImagePrompt;
use mars_diary::services::{
    DiaryService, GeneratedImage, ImageModel, ImagePersistence, ImageProxy, JwtIdentityProvider,
    LocalImageStore, ObjectStore, SamplingConfig, TextModel,
};
use mars_diary::AppState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &[u8] = b"test_jwt_secret_32_bytes_minimum!";
pub const FAKE_MARS_DIARY: &str = "火星第9000日，穹顶外的沙尘暴停了，我在温室里种下了第一株土豆。";
pub const FAKE_STORAGE_PREFIX: &str = "https://storage.test/storage/v1/object/public/diary-images/";

/// 1x1 transparent PNG.
#[allow(dead_code)]
pub const TINY_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// One queued answer from [`FakeTextModel`].
#[allow(dead_code)]
pub enum ScriptedReply {
    Text(String),
    Fail,
}

/// Text model that records prompts. Queued replies are used first, in
/// order; after that every call returns the default reply.
pub struct FakeTextModel {
    reply: String,
    script: Mutex<VecDeque<ScriptedReply>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeTextModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue the answers for the next calls.
    pub fn script(&self, replies: impl IntoIterator<Item = ScriptedReply>) {
        self.script.lock().unwrap().extend(replies);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for FakeTextModel {
    async fn generate(&self, prompt: &str, _sampling: &SamplingConfig) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail) => Err(AppError::Generation("model unavailable".to_string())),
            None => Ok(self.reply.clone()),
        }
    }
}

/// Image model returning a fixed result.
pub struct FakeImageModel {
    image: GeneratedImage,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeImageModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageModel for FakeImageModel {
    async fn generate(&self, _prompt: &ImagePrompt) -> Result<GeneratedImage, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.image.clone())
    }
}

/// In-memory object store; optionally fails every upload.
#[derive(Default)]
pub struct FakeObjectStore {
    fail_uploads: bool,
    pub uploaded: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn upload(
        &self,
        path: &str,
        _bytes: Bytes,
        _content_type: &str,
    ) -> Result<String, AppError> {
        if self.fail_uploads {
            return Err(AppError::Persistence("bucket quota exceeded".to_string()));
        }
        self.uploaded.lock().unwrap().push(path.to_string());
        Ok(format!("{}{}", FAKE_STORAGE_PREFIX, path))
    }

    async fn remove(&self, path: &str) -> Result<(), AppError> {
        self.removed.lock().unwrap().push(path.to_string());
        Ok(())
    }

    fn path_from_public_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(FAKE_STORAGE_PREFIX).map(str::to_string)
    }
}

/// Knobs for [`create_test_app_with`].
#[derive(Default)]
pub struct TestOptions {
    /// Diary table has not been created
    pub table_missing: bool,
    /// Object storage rejects uploads
    pub storage_fails: bool,
    /// Local upload directory cannot be created
    pub uploads_unwritable: bool,
    /// Image model result (defaults to an inline PNG)
    pub image: Option<GeneratedImage>,
}

/// Test app plus handles on every fake behind it.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub text_model: Arc<FakeTextModel>,
    pub image_model: Arc<FakeImageModel>,
    pub object_store: Arc<FakeObjectStore>,
    pub diaries: Arc<MemoryDiaryStore>,
    pub upload_dir: TempDir,
}

#[allow(dead_code)]
impl TestApp {
    /// Send one request through a fresh clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Create a test app with offline fakes.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(TestOptions::default())
}

#[allow(dead_code)]
pub fn create_test_app_with(options: TestOptions) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();

    let mut config = Config::test_default();
    config.supabase_jwt_secret = Some(TEST_JWT_SECRET.to_vec());
    config.upload_dir = if options.uploads_unwritable {
        // A regular file where a parent directory should be.
        let blocker = upload_dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        blocker.join("images")
    } else {
        upload_dir.path().join("images")
    };

    let text_model = Arc::new(FakeTextModel::new(FAKE_MARS_DIARY));
    let image_model = Arc::new(FakeImageModel {
        image: options.image.unwrap_or_else(|| GeneratedImage::Base64 {
            data: TINY_PNG_BASE64.to_string(),
            mime: "image/png".to_string(),
        }),
        calls: AtomicUsize::new(0),
    });
    let object_store = Arc::new(FakeObjectStore {
        fail_uploads: options.storage_fails,
        ..Default::default()
    });
    let diaries = Arc::new(if options.table_missing {
        MemoryDiaryStore::without_table()
    } else {
        MemoryDiaryStore::new()
    });

    let local = LocalImageStore::new(config.upload_dir.clone());
    let images = ImagePersistence::new(object_store.clone(), local.clone());

    let state = Arc::new(AppState {
        identity: Arc::new(JwtIdentityProvider::new(TEST_JWT_SECRET)),
        diaries: diaries.clone(),
        diary_service: DiaryService::new(text_model.clone(), image_model.clone(), images),
        proxy: ImageProxy::new(local),
        config,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        text_model,
        image_model,
        object_store,
        diaries,
        upload_dir,
    }
}

/// Mint an access token the way the identity provider would.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, secret: &[u8]) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        aud: AUTHENTICATED_AUDIENCE.to_string(),
        exp: now + 3600,
        email: Some(format!("{}@example.com", user_id)),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap()
}

/// JSON request, optionally authenticated as `user_id`.
#[allow(dead_code)]
pub fn json_request(
    method: &str,
    uri: &str,
    user_id: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user_id) = user_id {
        builder = builder.header(
            header::AUTHORIZATION,
            format!("Bearer {}", create_test_jwt(user_id, TEST_JWT_SECRET)),
        );
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Bodiless request, optionally authenticated as `user_id`.
#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str, user_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header(
            header::AUTHORIZATION,
            format!("Bearer {}", create_test_jwt(user_id, TEST_JWT_SECRET)),
        );
    }
    builder.body(Body::empty()).unwrap()
}

/// Read a JSON response body.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
