use async_trait::async_trait;
use chrono::Utc;
use log::{ debug, info };
use reqwest::{ multipart::{ Form, Part }, Client as HttpClient };
use serde::Deserialize;
use sha2::{ Digest, Sha256 };

use super::{ HostedMedia, MediaError, MediaHost, MediaSource };
use crate::cli::Args;

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

#[derive(Debug, Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudinaryCredentials {
    pub fn from_args(args: &Args) -> Option<Self> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        Some(Self {
            cloud_name: non_empty(&args.cloudinary_cloud_name)?,
            api_key: non_empty(&args.cloudinary_api_key)?,
            api_secret: non_empty(&args.cloudinary_api_secret)?,
        })
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct CloudinaryMediaHost {
    http: HttpClient,
    credentials: CloudinaryCredentials,
    folder: String,
    api_base: String,
}

/// Signed-upload signature: the signed parameters sorted by name, joined as a
/// query string, with the secret appended, hashed with SHA-256.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl CloudinaryMediaHost {
    pub fn new(
        credentials: CloudinaryCredentials,
        folder: String,
        api_base: Option<String>
    ) -> Result<Self, MediaError> {
        let http = HttpClient::builder().build().map_err(|e| MediaError::Config(e.to_string()))?;
        Ok(Self {
            http,
            credentials,
            folder,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/image/upload",
            self.api_base.trim_end_matches('/'),
            self.credentials.cloud_name
        )
    }

    fn file_part(source: MediaSource) -> Result<Part, MediaError> {
        match source {
            MediaSource::DataUri(uri) | MediaSource::RemoteUrl(uri) => Ok(Part::text(uri)),
            MediaSource::Bytes { data, filename, content_type } => {
                let part = Part::bytes(data).file_name(filename);
                match content_type {
                    Some(ct) => part.mime_str(&ct).map_err(|e| MediaError::Upload(e.to_string())),
                    None => Ok(part),
                }
            }
        }
    }
}

#[async_trait]
impl MediaHost for CloudinaryMediaHost {
    async fn upload(&self, source: MediaSource) -> Result<HostedMedia, MediaError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("folder", self.folder.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.credentials.api_secret
        );

        let form = Form::new()
            .part("file", Self::file_part(source)?)
            .text("api_key", self.credentials.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let url = self.upload_url();
        debug!("Uploading image to {}", url);
        let resp = self.http
            .post(&url)
            .multipart(form)
            .send().await
            .map_err(|e| MediaError::Upload(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json
                ::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(MediaError::Upload(format!("{}: {}", status, message)));
        }

        let uploaded = resp
            .json::<UploadResponse>().await
            .map_err(|e| MediaError::Upload(e.to_string()))?;
        info!("Image hosted as {}", uploaded.public_id);

        Ok(HostedMedia {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }
}
