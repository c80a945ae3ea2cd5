use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{ResolveError, TrackResolver};
use crate::{audio::StreamLocator, protocol::Track};

/// Plays what it is given: `http(s)://` references stream from the URL,
/// `file://` and plain paths from local disk. Remote references are checked
/// with a `HEAD` request so dead links fail here instead of in the decoder.
pub struct DirectResolver {
    client: reqwest::Client,
    probe_urls: bool,
}

impl DirectResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            probe_urls: true,
        }
    }

    /// Skips the `HEAD` check.
    pub fn without_probe(mut self) -> Self {
        self.probe_urls = false;
        self
    }

    fn classify(uri: &str) -> Result<StreamLocator, ResolveError> {
        let uri = uri.trim();
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(StreamLocator::Url(uri.to_string()));
        }
        if uri.contains("://") && !uri.starts_with("file://") {
            return Err(ResolveError::Unavailable(format!(
                "unsupported scheme in '{}'",
                uri
            )));
        }

        let path = PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri));
        if path.as_os_str().is_empty() {
            return Err(ResolveError::Unavailable("empty track reference".into()));
        }
        if !path.is_file() {
            return Err(ResolveError::Unavailable(format!(
                "no such file: {}",
                path.display()
            )));
        }
        Ok(StreamLocator::File(path))
    }
}

#[async_trait]
impl TrackResolver for DirectResolver {
    fn name(&self) -> &str {
        "direct"
    }

    async fn resolve(&self, track: &Track) -> Result<StreamLocator, ResolveError> {
        let locator = Self::classify(&track.info.uri)?;

        if let (true, StreamLocator::Url(url)) = (self.probe_urls, &locator) {
            let response = self
                .client
                .head(url)
                .send()
                .await
                .map_err(|e| ResolveError::Http(e.to_string()))?;
            let status = response.status();
            // Some hosts reject HEAD outright; only definite misses fail.
            if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
                return Err(ResolveError::Unavailable(format!("{} returned {}", url, status)));
            }
        }

        debug!("Resolved '{}' to {}", track.title(), locator);
        Ok(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TrackInfo;

    fn track(uri: &str) -> Track {
        Track::new(TrackInfo {
            title: "t".into(),
            duration: 1,
            uri: uri.into(),
            thumbnail: None,
            requester: None,
        })
    }

    #[tokio::test]
    async fn test_urls_pass_through() {
        let resolver = DirectResolver::new(reqwest::Client::new()).without_probe();
        assert_eq!(
            resolver.resolve(&track("https://cdn.example/a.mp3")).await,
            Ok(StreamLocator::Url("https://cdn.example/a.mp3".into()))
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let resolver = DirectResolver::new(reqwest::Client::new());
        assert!(matches!(
            resolver.resolve(&track("/definitely/not/here.flac")).await,
            Err(ResolveError::Unavailable(_))
        ));
        assert!(matches!(
            resolver.resolve(&track("ytsearch://whatever")).await,
            Err(ResolveError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_existing_file_resolves() {
        let path = std::env::temp_dir().join(format!("voxmix-resolve-{}.wav", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"RIFF").expect("write temp file");
        let resolver = DirectResolver::new(reqwest::Client::new());
        let uri = format!("file://{}", path.display());
        assert_eq!(
            resolver.resolve(&track(&uri)).await,
            Ok(StreamLocator::File(path.clone()))
        );
        let _ = std::fs::remove_file(path);
    }
}
