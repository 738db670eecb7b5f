// ABOUTME: TikTok inbox video upload through the content posting API
// ABOUTME: Initialises a single-chunk FILE_UPLOAD and PUTs the bytes to the returned URL

use crate::constants::endpoints::TIKTOK_INBOX_INIT_PATH;
use crate::errors::{AppError, AppResult};
use crate::logging::redact;
use crate::models::AuthProvider;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// `source_info` of an inbox init request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceInfo {
    /// Always `FILE_UPLOAD`
    pub source: &'static str,
    /// Total bytes
    pub video_size: u64,
    /// Bytes per chunk
    pub chunk_size: u64,
    /// Number of chunks
    pub total_chunk_count: u32,
}

impl SourceInfo {
    /// Whole file sent as one chunk
    #[must_use]
    pub const fn single_chunk(video_size: u64) -> Self {
        Self {
            source: "FILE_UPLOAD",
            video_size,
            chunk_size: video_size,
            total_chunk_count: 1,
        }
    }
}

#[derive(Serialize)]
struct InitRequest {
    source_info: SourceInfo,
}

/// Where and under which id TikTok expects the video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxUpload {
    /// Pre-signed upload URL
    pub upload_url: String,
    /// Publish id reported back to the user
    pub publish_id: String,
}

/// Read `data.upload_url` and `data.publish_id` from an init response
///
/// # Errors
///
/// Returns an external service error when TikTok reports an error or a field is missing
pub fn parse_init_response(value: &Value) -> AppResult<InboxUpload> {
    if let Some(code) = value
        .pointer("/error/code")
        .and_then(Value::as_str)
        .filter(|c| *c != "ok")
    {
        let message = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(AppError::external_service(
            AuthProvider::Tiktok.as_str(),
            format!("Upload init failed ({code}): {message}"),
        ));
    }

    let field = |name: &str| {
        value
            .pointer(&format!("/data/{name}"))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| {
                AppError::external_service(
                    AuthProvider::Tiktok.as_str(),
                    format!("Upload init response lacks {name}"),
                )
            })
    };

    Ok(InboxUpload {
        upload_url: field("upload_url")?,
        publish_id: field("publish_id")?,
    })
}

/// `Content-Range` value covering the whole body
#[must_use]
pub fn full_content_range(len: u64) -> String {
    format!("bytes 0-{}/{len}", len.saturating_sub(1))
}

/// Sends videos to the user's TikTok inbox
#[derive(Debug, Clone)]
pub struct TikTokUploadService {
    client: Client,
    api_base: String,
}

impl TikTokUploadService {
    /// Create the service against a content API base URL
    #[must_use]
    pub fn new(client: Client, api_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_owned(),
        }
    }

    /// Upload `video` to the inbox of the token's owner and return the publish id
    ///
    /// # Errors
    ///
    /// Returns an error for an empty video, a failed init or a rejected upload
    pub async fn upload_to_inbox(
        &self,
        access_token: &str,
        video: Bytes,
        content_type: &str,
    ) -> AppResult<String> {
        if video.is_empty() {
            return Err(AppError::invalid_input("Video file is empty"));
        }
        let size = video.len() as u64;

        let upload = self.init_upload(access_token, size).await?;
        debug!(
            publish_id = %upload.publish_id,
            upload_url = %redact(&upload.upload_url),
            "TikTok inbox upload initialised"
        );

        let response = self
            .client
            .put(&upload.upload_url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, size)
            .header(CONTENT_RANGE, full_content_range(size))
            .body(video)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "TikTok video upload rejected");
            return Err(AppError::external_service(
                AuthProvider::Tiktok.as_str(),
                format!("Video upload returned HTTP {status}"),
            ));
        }

        info!(publish_id = %upload.publish_id, bytes = size, "Video sent to TikTok inbox");
        Ok(upload.publish_id)
    }

    async fn init_upload(&self, access_token: &str, size: u64) -> AppResult<InboxUpload> {
        let url = format!("{}{TIKTOK_INBOX_INIT_PATH}", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&InitRequest {
                source_info: SourceInfo::single_chunk(size),
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body).map_err(|e| {
            AppError::external_service(
                AuthProvider::Tiktok.as_str(),
                format!("Unreadable upload init response (HTTP {status}): {e}"),
            )
        })?;

        let upload = parse_init_response(&value)?;
        if !status.is_success() {
            return Err(AppError::external_service(
                AuthProvider::Tiktok.as_str(),
                format!("Upload init returned HTTP {status}"),
            ));
        }
        Ok(upload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_init_response() {
        let upload = parse_init_response(&json!({
            "data": {
                "publish_id": "v_inbox_file~v2.123",
                "upload_url": "https://open-upload.tiktokapis.com/video/?upload_id=1"
            },
            "error": {"code": "ok", "message": "", "log_id": "x"}
        }))
        .unwrap();
        assert_eq!(upload.publish_id, "v_inbox_file~v2.123");
    }

    #[test]
    fn test_parse_init_errors() {
        assert!(parse_init_response(&json!({
            "data": {},
            "error": {"code": "spam_risk_too_many_pending_share", "message": "slow down"}
        }))
        .is_err());
        assert!(parse_init_response(&json!({"data": {"publish_id": "p"}})).is_err());
    }

    #[test]
    fn test_single_chunk_source_info() {
        let body = serde_json::to_value(InitRequest {
            source_info: SourceInfo::single_chunk(2048),
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"source_info": {
                "source": "FILE_UPLOAD",
                "video_size": 2048,
                "chunk_size": 2048,
                "total_chunk_count": 1
            }})
        );
        assert_eq!(full_content_range(2048), "bytes 0-2047/2048");
    }
}
