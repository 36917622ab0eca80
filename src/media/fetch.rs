use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;

use super::{ MediaError, MediaFetcher };

/// Downloads remote images for inline encoding, bounded by a per-request
/// timeout and a body size ceiling.
pub struct HttpMediaFetcher {
    http: HttpClient,
    max_bytes: usize,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, MediaError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::Config(e.to_string()))?;
        Ok(Self { http, max_bytes })
    }

    fn too_large(&self, url: &str) -> MediaError {
        MediaError::Fetch(format!("{} exceeds the {} byte image limit", url, self.max_bytes))
    }
}

fn map_err(err: reqwest::Error) -> MediaError {
    if err.is_timeout() { MediaError::Timeout } else { MediaError::Fetch(err.to_string()) }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let mut resp = self.http
            .get(url)
            .send().await
            .map_err(map_err)?
            .error_for_status()
            .map_err(map_err)?;
        if resp.content_length().is_some_and(|len| len > (self.max_bytes as u64)) {
            return Err(self.too_large(url));
        }

        // Content-Length may be absent or wrong; enforce the ceiling while reading.
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(map_err)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
