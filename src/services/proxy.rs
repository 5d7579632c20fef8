// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Same-origin image proxy.
//!
//! Serves local fallback images and relays remote HTTPS images so the
//! browser never talks to third-party CDNs directly.

use crate::error::AppError;
use crate::services::image_store::{
    image_http_client, is_local_path, split_local_path, LocalImageStore,
};
use axum::body::{Body, Bytes};
use futures_util::TryStreamExt;

/// Classified proxy input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    Local(String),
    Remote(url::Url),
}

/// Image bytes ready to be returned to the client.
pub struct ProxiedImage {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: Body,
}

/// Classify a caller-supplied reference; anything unusable is a 400.
pub fn classify(reference: Option<&str>) -> Result<ImageReference, AppError> {
    let reference = reference
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::Validation("缺少图片地址".to_string()))?;

    if is_local_path(reference) {
        if split_local_path(reference).is_none() {
            return Err(AppError::Validation("本地图片路径无效".to_string()));
        }
        return Ok(ImageReference::Local(reference.to_string()));
    }

    let url = url::Url::parse(reference)
        .map_err(|_| AppError::Validation("图片地址格式无效".to_string()))?;

    if url.scheme() != "https" || url.host_str().is_none() {
        return Err(AppError::Validation("仅支持HTTPS图片地址".to_string()));
    }

    Ok(ImageReference::Remote(url))
}

/// Fetches images for the proxy endpoint.
#[derive(Clone)]
pub struct ImageProxy {
    http: reqwest::Client,
    local: LocalImageStore,
}

impl ImageProxy {
    pub fn new(local: LocalImageStore) -> Self {
        Self {
            http: image_http_client(),
            local,
        }
    }

    pub async fn fetch(&self, reference: ImageReference) -> Result<ProxiedImage, AppError> {
        match reference {
            ImageReference::Local(path) => {
                let (bytes, content_type): (Bytes, _) = self.local.read(&path).await?;
                Ok(ProxiedImage {
                    content_type: content_type.to_string(),
                    content_length: Some(bytes.len() as u64),
                    body: Body::from(bytes),
                })
            }
            ImageReference::Remote(url) => self.fetch_remote(url).await,
        }
    }

    async fn fetch_remote(&self, url: url::Url) -> Result<ProxiedImage, AppError> {
        let response = self
            .http
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Proxy fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Proxy fetch HTTP {} for {}",
                response.status(),
                url.host_str().unwrap_or_default()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !content_type.starts_with("image/") {
            return Err(AppError::Validation("该地址不是图片".to_string()));
        }

        let content_length = response.content_length();
        let stream = response.bytes_stream().map_err(std::io::Error::other);

        Ok(ProxiedImage {
            content_type,
            content_length,
            body: Body::from_stream(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(Some("/uploads/images/user-a/a.png")).unwrap(),
            ImageReference::Local("/uploads/images/user-a/a.png".into())
        );
        assert!(matches!(
            classify(Some("https://cdn.example/a.png")).unwrap(),
            ImageReference::Remote(u) if u.host_str() == Some("cdn.example")
        ));

        for bad in [
            None,
            Some(""),
            Some("   "),
            Some("http://cdn.example/a.png"),
            Some("ftp://cdn.example/a.png"),
            Some("data:image/png;base64,AAAA"),
            Some("javascript:alert(1)"),
            Some("not a url"),
            Some("/etc/passwd"),
            Some("/uploads/images/../x"),
            Some("/uploads/images/user-a/../../x"),
            Some("/uploads/images/a.png"),
            Some("/uploads/images/"),
        ] {
            assert!(
                matches!(classify(bad), Err(AppError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    async fn remote(server: &MockServer, file: &str) -> Result<ProxiedImage, AppError> {
        let dir = tempfile::tempdir().unwrap();
        let proxy = ImageProxy::new(LocalImageStore::new(dir.path()));
        let url = url::Url::parse(&format!("{}/{}", server.uri(), file)).unwrap();
        proxy.fetch(ImageReference::Remote(url)).await
    }

    #[tokio::test]
    async fn test_fetch_remote_streams_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sol.png"))
            .and(header_exists("user-agent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"\x89PNG remote".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let image = remote(&server, "sol.png").await.unwrap();
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.content_length, Some(11));
        let body = axum::body::to_bytes(image.body, usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"\x89PNG remote");
    }

    #[tokio::test]
    async fn test_fetch_remote_rejects_non_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        assert!(matches!(
            remote(&server, "page").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_remote_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(matches!(
            remote(&server, "gone.png").await,
            Err(AppError::Upstream(_))
        ));
    }
}
