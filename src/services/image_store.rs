// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image persistence with fallbacks.
//!
//! Order of preference for a generated image:
//! 1. Managed object storage under `{user_id}/` (public URL)
//! 2. Local upload directory (`/uploads/images/<user_id>/<file>`)
//! 3. The original source URL, unchanged

use crate::error::AppError;
use crate::services::storage::ObjectStore;
use axum::body::Bytes;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// URL prefix under which local fallback images are served.
pub const LOCAL_PUBLIC_PREFIX: &str = "/uploads/images/";

/// Sent on every outbound image fetch; some CDNs reject clients without one.
pub const IMAGE_FETCH_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; MarsDiaryBot/0.1; +https://github.com/mars-diary)";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];
const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Where an image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistedImage {
    Managed(String),
    Local(String),
    External(String),
}

impl PersistedImage {
    pub fn url(&self) -> &str {
        match self {
            PersistedImage::Managed(url)
            | PersistedImage::Local(url)
            | PersistedImage::External(url) => url,
        }
    }

    /// Short status tag reported to clients.
    pub fn status(&self) -> &'static str {
        match self {
            PersistedImage::Managed(_) => "stored",
            PersistedImage::Local(_) => "local",
            PersistedImage::External(_) => "external",
        }
    }

    pub fn into_url(self) -> String {
        match self {
            PersistedImage::Managed(url)
            | PersistedImage::Local(url)
            | PersistedImage::External(url) => url,
        }
    }
}

/// Image bytes plus their content type.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Build a reqwest client for server-side image fetches.
pub fn image_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(IMAGE_FETCH_USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Map an image content type to a file extension.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Map a file extension to its content type (JPEG when unknown).
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

fn extension_from_url(source: &str) -> Option<&'static str> {
    let parsed = url::Url::parse(source).ok()?;
    let ext = Path::new(parsed.path()).extension()?.to_str()?.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.iter().copied().find(|e| *e == ext)
}

/// Extension from the content type, then the URL path, defaulting to `jpg`.
pub fn infer_extension(content_type: &str, source: &str) -> &'static str {
    extension_for_content_type(content_type)
        .or_else(|| extension_from_url(source))
        .unwrap_or("jpg")
}

/// `mars-diary-<unix millis>-<6 random chars>.<ext>`
pub fn generate_file_name(ext: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| NAME_ALPHABET[rng.gen_range(0..NAME_ALPHABET.len())] as char)
        .collect();
    format!(
        "mars-diary-{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        suffix,
        ext
    )
}

/// Decode a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(source: &str) -> Result<DownloadedImage, AppError> {
    let invalid = |why: &str| AppError::Validation(format!("Invalid data URL: {}", why));

    let rest = source
        .strip_prefix("data:")
        .ok_or_else(|| invalid("missing scheme"))?;
    let (meta, payload) = rest.split_once(',').ok_or_else(|| invalid("missing payload"))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| invalid("not base64"))?;
    if !mime.starts_with("image/") {
        return Err(invalid("not an image"));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| invalid(&e.to_string()))?;

    Ok(DownloadedImage {
        bytes: Bytes::from(bytes),
        content_type: mime.to_string(),
    })
}

/// True for references under the local upload prefix, valid or not.
pub fn is_local_path(reference: &str) -> bool {
    reference.starts_with(LOCAL_PUBLIC_PREFIX)
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Split `/uploads/images/<owner>/<file>` into its owner and file name.
///
/// Exactly two plain segments are accepted.
pub fn split_local_path(public_path: &str) -> Option<(&str, &str)> {
    let rest = public_path.strip_prefix(LOCAL_PUBLIC_PREFIX)?;
    let (owner, file) = rest.split_once('/')?;
    (is_safe_segment(owner) && is_safe_segment(file)).then_some((owner, file))
}

/// Local fallback image directory.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a public `/uploads/images/<owner>/<file>` path to a file on
    /// disk. Anything that could walk out of the upload directory resolves
    /// to `None`.
    pub fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let (owner, file) = split_local_path(public_path)?;
        Some(self.root.join(owner).join(file))
    }

    /// Write `bytes` as `file_name` in `owner`'s folder; returns the public path.
    pub async fn save(&self, owner: &str, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let public_path = format!("{}{}/{}", LOCAL_PUBLIC_PREFIX, owner, file_name);
        let target = self
            .resolve(&public_path)
            .ok_or_else(|| AppError::Validation(format!("Invalid image path: {}", public_path)))?;
        let folder = self.root.join(owner);

        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| AppError::Persistence(format!("Create upload dir failed: {}", e)))?;
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| AppError::Persistence(format!("Write image failed: {}", e)))?;

        tracing::info!(path = %target.display(), size = bytes.len(), "Image saved locally");
        Ok(public_path)
    }

    /// Read a stored image and its content type.
    pub async fn read(&self, public_path: &str) -> Result<(Bytes, &'static str), AppError> {
        let not_found = || AppError::NotFound("图片不存在".to_string());
        let file = self.resolve(public_path).ok_or_else(not_found)?;

        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(AppError::Internal(e.into())),
        };

        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Ok((Bytes::from(bytes), content_type_for_extension(ext)))
    }

    /// Delete a stored image. `Ok(false)` if it did not exist.
    pub async fn delete(&self, public_path: &str) -> Result<bool, AppError> {
        let Some(file) = self.resolve(public_path) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Persistence(format!("Delete image failed: {}", e))),
        }
    }
}

/// Persists generated images, falling back when storage is unavailable.
#[derive(Clone)]
pub struct ImagePersistence {
    http: reqwest::Client,
    object_store: Arc<dyn ObjectStore>,
    local: LocalImageStore,
}

impl ImagePersistence {
    pub fn new(object_store: Arc<dyn ObjectStore>, local: LocalImageStore) -> Self {
        Self {
            http: image_http_client(),
            object_store,
            local,
        }
    }

    pub fn local(&self) -> &LocalImageStore {
        &self.local
    }

    /// Fetch image bytes from an `http(s)` or `data:` URL.
    pub async fn download(&self, source_url: &str) -> Result<DownloadedImage, AppError> {
        if source_url.starts_with("data:") {
            return decode_data_url(source_url);
        }

        let response = self
            .http
            .get(source_url)
            .header(reqwest::header::ACCEPT, "image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Image download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Image download HTTP {}",
                response.status()
            )));
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let content_type = match header_type {
            Some(ct) if ct.starts_with("image/") => ct,
            Some(ct) if ct != "application/octet-stream" => {
                return Err(AppError::Upstream(format!(
                    "Downloaded content is not an image: {}",
                    ct
                )))
            }
            _ => content_type_for_extension(infer_extension("", source_url)).to_string(),
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Upstream(format!("Image body read failed: {}", e)))?;

        Ok(DownloadedImage {
            bytes,
            content_type,
        })
    }

    /// Store `source_url` for `user_id`. Never fails; see the module docs.
    pub async fn persist(&self, source_url: &str, user_id: &str) -> PersistedImage {
        let image = match self.download(source_url).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Image download failed; keeping source URL");
                return PersistedImage::External(source_url.to_string());
            }
        };

        let file_name = generate_file_name(infer_extension(&image.content_type, source_url));
        let object_path = format!("{}/{}", user_id, file_name);

        match self
            .object_store
            .upload(&object_path, image.bytes.clone(), &image.content_type)
            .await
        {
            Ok(public_url) => return PersistedImage::Managed(public_url),
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Storage upload failed; trying local disk");
            }
        }

        match self.local.save(user_id, &file_name, &image.bytes).await {
            Ok(path) => PersistedImage::Local(path),
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Local save failed; keeping source URL");
                PersistedImage::External(source_url.to_string())
            }
        }
    }

    /// Delete the stored copy behind `image_url` if this service owns it.
    ///
    /// Returns `Ok(true)` when something was removed.
    pub async fn remove(&self, image_url: &str, user_id: &str) -> Result<bool, AppError> {
        if is_local_path(image_url) {
            return match split_local_path(image_url) {
                Some((owner, _)) if owner == user_id => self.local.delete(image_url).await,
                _ => {
                    tracing::warn!(path = %image_url, user_id, "Refusing to delete local image outside caller's folder");
                    Ok(false)
                }
            };
        }

        let Some(path) = self.object_store.path_from_public_url(image_url) else {
            return Ok(false);
        };

        if !path.starts_with(&format!("{}/", user_id)) {
            tracing::warn!(path = %path, user_id, "Refusing to delete image outside caller's folder");
            return Ok(false);
        }

        self.object_store.remove(&path).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_extension() {
        assert_eq!(infer_extension("image/png", "https://x/a.jpg"), "png");
        assert_eq!(infer_extension("image/jpeg; charset=binary", ""), "jpg");
        assert_eq!(infer_extension("", "https://x/a.WEBP?sig=1"), "webp");
        assert_eq!(infer_extension("application/octet-stream", "https://x/a"), "jpg");
        assert_eq!(infer_extension("", "not a url"), "jpg");
    }

    #[test]
    fn test_generate_file_name_shape() {
        let name = generate_file_name("png");
        assert!(name.starts_with("mars-diary-"));
        assert!(name.ends_with(".png"));
        let parts: Vec<&str> = name.trim_end_matches(".png").split('-').collect();
        assert_eq!(parts.len(), 4);
        assert!(parts[2].parse::<i64>().is_ok());
        assert_eq!(parts[3].len(), 6);
        assert_ne!(generate_file_name("png"), generate_file_name("png"));
    }

    #[test]
    fn test_decode_data_url() {
        let image = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(&image.bytes[..], b"hello");
        assert_eq!(image.content_type, "image/png");

        assert!(decode_data_url("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(decode_data_url("data:image/png,raw").is_err());
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let store = LocalImageStore::new("/srv/uploads");
        assert_eq!(
            store.resolve("/uploads/images/user-a/mars-diary-1-abc.png"),
            Some(PathBuf::from("/srv/uploads/user-a/mars-diary-1-abc.png"))
        );
        assert!(store.resolve("/uploads/images/../secret").is_none());
        assert!(store.resolve("/uploads/images/user-a/../secret").is_none());
        assert!(store.resolve("/uploads/images/mars-diary-1-abc.png").is_none());
        assert!(store.resolve("/uploads/images/a/b/c.png").is_none());
        assert!(store.resolve("/uploads/images/user-a/").is_none());
        assert!(store.resolve("/uploads/images/").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
    }

    #[tokio::test]
    async fn test_local_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path().join("nested"));

        let path = store
            .save("user-a", "mars-diary-1-abcdef.gif", b"GIF89a")
            .await
            .unwrap();
        assert_eq!(path, "/uploads/images/user-a/mars-diary-1-abcdef.gif");
        assert!(dir.path().join("nested/user-a/mars-diary-1-abcdef.gif").exists());

        let (bytes, content_type) = store.read(&path).await.unwrap();
        assert_eq!(&bytes[..], b"GIF89a");
        assert_eq!(content_type, "image/gif");

        assert!(store.delete(&path).await.unwrap());
        assert!(!store.delete(&path).await.unwrap());
        assert!(matches!(
            store.read(&path).await.unwrap_err(),
            AppError::NotFound(_)
        ));

        assert!(matches!(
            store.save("../escape", "a.png", b"x").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_local_only_for_owner() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = ImagePersistence::new(
            Arc::new(crate::services::storage::SupabaseStorage::new(
                "http://127.0.0.1:9",
                "diary-images",
                "service-key",
            )),
            LocalImageStore::new(dir.path()),
        );
        let path = persistence
            .local()
            .save("user-b", "mars-diary-2-qwerty.png", b"png")
            .await
            .unwrap();

        assert!(!persistence.remove(&path, "user-a").await.unwrap());
        assert!(dir.path().join("user-b/mars-diary-2-qwerty.png").exists());

        assert!(!persistence
            .remove("/uploads/images/../user-b/mars-diary-2-qwerty.png", "user-a")
            .await
            .unwrap());

        assert!(persistence.remove(&path, "user-b").await.unwrap());
        assert!(!dir.path().join("user-b/mars-diary-2-qwerty.png").exists());
    }
}
