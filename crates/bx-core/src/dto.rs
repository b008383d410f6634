//! Request and response bodies exchanged with the posting backend.

use serde::{Deserialize, Serialize};

use crate::builder::parse_price;
use crate::error::{AppError, Result};
use crate::models::{FlexNumber, InspectionReport, PostingDraft, PostingPatch, RawImage, SellerId};
use crate::status::{Status, Transition};

/// Body of `POST /posts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub seller_id: i64,
    pub brand_id: i64,
    pub category_id: i64,
    pub bicycle_name: String,
    pub bicycle_color: String,
    pub price: u64,
    pub bicycle_description: String,
    pub groupset: String,
    pub frame_material: String,
    pub brake_type: String,
    pub size: String,
    pub model_year: i32,
}

impl CreatePostRequest {
    /// Builds the request from a form that passed `validate_for_publish`.
    pub fn from_draft(draft: &PostingDraft, seller_id: SellerId) -> Result<Self> {
        fn text(value: &Option<String>, field: &str) -> Result<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| AppError::Validation(format!("{field} is required")))
        }
        Ok(Self {
            seller_id: seller_id.0,
            brand_id: draft
                .brand_id
                .ok_or_else(|| AppError::Validation("brand is required".into()))?,
            category_id: draft
                .category_id
                .ok_or_else(|| AppError::Validation("category is required".into()))?,
            bicycle_name: text(&draft.name, "name")?,
            bicycle_color: text(&draft.color, "color")?,
            price: draft
                .price
                .as_deref()
                .and_then(parse_price)
                .ok_or_else(|| AppError::Validation("price must be a number (VND)".into()))?,
            bicycle_description: text(&draft.description, "description")?,
            groupset: text(&draft.groupset, "groupset")?,
            frame_material: text(&draft.frame_material, "frame material")?,
            brake_type: text(&draft.brake_type, "brake type")?,
            size: text(&draft.frame_size, "frame size")?,
            model_year: draft
                .model_year
                .ok_or_else(|| AppError::Validation("model year is required".into()))?,
        })
    }
}

/// Response of `POST /posts`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatedPost {
    #[serde(alias = "post_id")]
    pub post_id: Option<FlexNumber>,
    pub id: Option<FlexNumber>,
    #[serde(alias = "post_status")]
    pub post_status: Option<String>,
    pub status: Option<String>,
    #[serde(deserialize_with = "crate::models::null_as_empty")]
    pub images: Vec<RawImage>,
}

impl CreatedPost {
    pub fn server_id(&self) -> Option<i64> {
        self.post_id
            .as_ref()
            .or(self.id.as_ref())
            .and_then(FlexNumber::as_i64)
    }
}

/// Body of `PUT /posts/{id}`; only the fields being changed are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bicycle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bicycle_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bicycle_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groupset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brake_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_year: Option<i32>,
}

impl From<&PostingPatch> for UpdatePostRequest {
    fn from(patch: &PostingPatch) -> Self {
        Self {
            bicycle_name: patch.name.clone(),
            brand_id: patch.brand_id,
            category_id: patch.category_id,
            bicycle_color: patch.color.clone(),
            price: patch.price,
            bicycle_description: patch.description.clone(),
            groupset: patch.groupset.clone(),
            frame_material: patch.frame_material.clone(),
            brake_type: patch.brake_type.clone(),
            size: patch.frame_size.clone(),
            model_year: patch.model_year,
        }
    }
}

/// A lifecycle move to be confirmed by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub transition: Transition,
    /// Status the posting is in before the move.
    pub from: Status,
    /// Present for inspector submissions.
    pub inspection: Option<InspectionReport>,
}

impl StatusChange {
    pub fn new(transition: Transition, from: Status) -> Self {
        Self {
            transition,
            from,
            inspection: None,
        }
    }

    pub fn with_inspection(mut self, report: InspectionReport) -> Self {
        self.inspection = Some(report);
        self
    }

    pub fn target(&self) -> Status {
        self.transition.target()
    }
}

/// Paging for `GET /posts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListParams {
    pub page: u32,
    pub size: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self { page: 0, size: 200 }
    }
}

/// A photo to attach to a persisted post.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub post_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub data: bytes::Bytes,
    pub image_type: String,
    pub is_thumbnail: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: Option<String>,
    #[serde(alias = "image_url")]
    pub image_url: Option<String>,
}

impl UploadedImage {
    pub fn location(&self) -> Option<&str> {
        self.image_url.as_deref().or(self.url.as_deref())
    }
}
