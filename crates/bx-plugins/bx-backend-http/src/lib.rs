//! # bx-backend-http Implementation
//!
//! This module implements `PostingBackend` against the marketplace REST API
//! and maps its response envelopes and status codes onto `AppError`.

mod envelope;

use std::time::Duration;

use async_trait::async_trait;
use bx_core::dto::{
    CreatePostRequest, CreatedPost, ImageUpload, ListParams, StatusChange, UpdatePostRequest,
    UploadedImage,
};
use bx_core::error::{AppError, Result};
use bx_core::models::{RawPostRow, SellerId};
use bx_core::session::SessionContext;
use bx_core::status::{Status, Transition};
use bx_core::traits::PostingBackend;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use envelope::{backend_message, flatten_page, unwrap_envelope};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct RejectBody<'a> {
    reason: &'a str,
}

#[derive(Serialize)]
struct StatusBody {
    status: Status,
}

fn transport(err: reqwest::Error) -> AppError {
    AppError::Network(err.to_string())
}

fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| AppError::Network(format!("unexpected response body: {err}")))
}

/// Status endpoints answer with a row, a bare id or nothing at all.
fn row_or_default(value: Value) -> RawPostRow {
    match value {
        Value::Object(_) => serde_json::from_value(value).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "Ignoring undecodable status response");
            RawPostRow::default()
        }),
        _ => RawPostRow::default(),
    }
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    bearer: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration, session: &SessionContext) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer: session.bearer(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(bearer) = &self.bearer {
            request = request.header(AUTHORIZATION, bearer);
        }
        request
    }

    /// Sends the request and returns the unwrapped payload.
    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Value> {
        tracing::debug!(%path, "Backend request");
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(body) => body,
                Err(_) => Value::String(text),
            }
        };

        if status.is_success() {
            return Ok(unwrap_envelope(body));
        }

        let explained = backend_message(&body).or_else(|| {
            body.as_str()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        });
        tracing::warn!(%path, status = status.as_u16(), message = ?explained, "Backend rejected request");
        Err(match (status, explained) {
            (StatusCode::NOT_FOUND, None) => {
                AppError::NotFound("Resource".to_string(), path.to_string())
            }
            (StatusCode::UNAUTHORIZED, message) => AppError::Unauthorized(
                message.unwrap_or_else(|| reason_phrase(status)),
            ),
            (_, message) => AppError::BackendRejection {
                status: Some(status.as_u16()),
                message: message.unwrap_or_else(|| reason_phrase(status)),
            },
        })
    }

    async fn rows(&self, path: &str, request: RequestBuilder) -> Result<Vec<RawPostRow>> {
        match flatten_page(self.send(path, request).await?) {
            Value::Null => Ok(Vec::new()),
            value => decode(value),
        }
    }
}

#[async_trait]
impl PostingBackend for HttpBackend {
    async fn create_posting(&self, request: &CreatePostRequest) -> Result<CreatedPost> {
        let path = "/posts";
        decode(
            self.send(path, self.request(Method::POST, path).json(request))
                .await?,
        )
    }

    async fn get_posting(&self, post_id: i64) -> Result<RawPostRow> {
        let path = format!("/posts/{post_id}");
        decode(self.send(&path, self.request(Method::GET, &path)).await?)
    }

    async fn update_posting(&self, post_id: i64, request: &UpdatePostRequest) -> Result<RawPostRow> {
        let path = format!("/posts/{post_id}");
        let value = self
            .send(&path, self.request(Method::PUT, &path).json(request))
            .await?;
        Ok(row_or_default(value))
    }

    async fn delete_posting(&self, post_id: i64) -> Result<()> {
        let path = format!("/posts/{post_id}");
        self.send(&path, self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn update_posting_status(&self, post_id: i64, change: &StatusChange) -> Result<RawPostRow> {
        let (path, request) = match &change.transition {
            Transition::Approve => {
                let path = format!("/admin/posts/{post_id}/approve");
                let request = self.request(Method::PUT, &path);
                (path, request)
            }
            Transition::Reject { reason } => {
                let path = format!("/admin/posts/{post_id}/reject");
                let request = self.request(Method::PUT, &path).json(&RejectBody {
                    reason: reason.trim(),
                });
                (path, request)
            }
            Transition::PassInspection | Transition::FailInspection { .. } => {
                let report = change.inspection.as_ref().ok_or_else(|| {
                    AppError::Validation("an inspection report is required".to_string())
                })?;
                let path = format!("/inspection/{post_id}/submit");
                let request = self.request(Method::POST, &path).json(report);
                (path, request)
            }
            _ => {
                let path = format!("/posts/{post_id}/status");
                let request = self.request(Method::PUT, &path).json(&StatusBody {
                    status: change.target(),
                });
                (path, request)
            }
        };
        let value = self.send(&path, request).await?;
        tracing::info!(post_id, from = %change.from, to = %change.target(), "Backend accepted status change");
        Ok(row_or_default(value))
    }

    async fn list_by_seller(&self, seller_id: SellerId) -> Result<Vec<RawPostRow>> {
        let path = format!("/posts/seller/{seller_id}");
        self.rows(&path, self.request(Method::GET, &path)).await
    }

    async fn list_by_status(&self, status: Status) -> Result<Vec<RawPostRow>> {
        let path = format!("/posts/status/{status}");
        self.rows(&path, self.request(Method::GET, &path)).await
    }

    async fn list_all(&self, params: ListParams) -> Result<Vec<RawPostRow>> {
        let path = "/posts";
        self.rows(path, self.request(Method::GET, path).query(&params))
            .await
    }

    async fn upload_image(&self, upload: ImageUpload) -> Result<UploadedImage> {
        let path = "/images";
        let image = Part::bytes(upload.data.to_vec())
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|err| {
                AppError::Validation(format!("invalid image content type: {err}"))
            })?;
        let form = Form::new()
            .text("postId", upload.post_id.to_string())
            .part("image", image)
            .text("imageType", upload.image_type)
            .text("isThumbnail", upload.is_thumbnail.to_string());

        match self
            .send(path, self.request(Method::POST, path).multipart(form))
            .await?
        {
            Value::String(url) => Ok(UploadedImage {
                url: Some(url),
                ..Default::default()
            }),
            value => decode(value),
        }
    }
}
