//! # Domain Models
//!
//! These structs represent the core entities of bike-exchange.
//! Persisted snapshots use camelCase JSON so cache entries stay readable by
//! the browser frontend that shares the same storage layout.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::builder::format_price;
use crate::status::Status;

/// Numeric user id of the seller; partition key of the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SellerId(pub i64);

impl fmt::Display for SellerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The canonical bicycle posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Posting {
    /// Server post id once persisted, `draft-<uuid>` before that.
    pub id: String,
    /// Human-facing display code (e.g. "POST-2024-4821").
    pub posting_code: String,
    pub name: String,
    pub brand: Option<String>,
    pub brand_id: Option<i64>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub frame_size: Option<String>,
    pub frame_material: Option<String>,
    pub groupset: Option<String>,
    pub brake_type: Option<String>,
    pub model_year: Option<i32>,
    pub color: Option<String>,
    pub description: Option<String>,
    /// Price in VND.
    pub price: Option<u64>,
    /// Always derived from `price`; see [`Posting::set_price`].
    pub price_display: String,
    /// Ordered; the first required photo is the drive side shot.
    pub image_urls: Vec<String>,
    /// Primary/thumbnail image.
    pub image_url: Option<String>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub seller_id: Option<SellerId>,
    #[serde(default)]
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Posting {
    pub fn set_price(&mut self, price: Option<u64>) {
        self.price = price;
        self.price_display = price.map(format_price).unwrap_or_default();
    }

    /// Numeric backend id, if this posting has been persisted.
    pub fn server_id(&self) -> Option<i64> {
        self.id.trim().parse().ok()
    }

    pub fn is_persisted(&self) -> bool {
        self.server_id().is_some()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Newest first by `createdAt`; ties broken by id so the order is total.
pub fn sort_newest_first(postings: &mut [Posting]) {
    postings.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Identifier accepted by lookups: route parameters arrive as text, backend
/// ids as numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupId {
    Text(String),
    Number(i64),
}

impl LookupId {
    /// Matches as given first, then by numeric coercion of both sides.
    pub fn matches(&self, id: &str) -> bool {
        let wanted = match self {
            LookupId::Text(text) => {
                if text == id {
                    return true;
                }
                text.trim().parse::<i64>().ok()
            }
            LookupId::Number(n) => Some(*n),
        };
        match (wanted, id.trim().parse::<i64>()) {
            (Some(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for LookupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupId::Text(text) => f.write_str(text),
            LookupId::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for LookupId {
    fn from(value: &str) -> Self {
        LookupId::Text(value.to_string())
    }
}

impl From<String> for LookupId {
    fn from(value: String) -> Self {
        LookupId::Text(value)
    }
}

impl From<&String> for LookupId {
    fn from(value: &String) -> Self {
        LookupId::Text(value.clone())
    }
}

impl From<i64> for LookupId {
    fn from(value: i64) -> Self {
        LookupId::Number(value)
    }
}

/// Payload of the seller's "Post a Bike" form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostingDraft {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub brand_id: Option<i64>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub frame_size: Option<String>,
    pub frame_material: Option<String>,
    pub groupset: Option<String>,
    pub brake_type: Option<String>,
    pub model_year: Option<i32>,
    pub color: Option<String>,
    pub description: Option<String>,
    /// Raw form text; digits are extracted by the builder.
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub image_urls: Vec<String>,
    /// Explicit status override; wins over the caller's default.
    pub status: Option<Status>,
    pub views: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Posting> for PostingDraft {
    fn from(posting: &Posting) -> Self {
        Self {
            name: Some(posting.name.clone()),
            brand: posting.brand.clone(),
            brand_id: posting.brand_id,
            category: posting.category.clone(),
            category_id: posting.category_id,
            frame_size: posting.frame_size.clone(),
            frame_material: posting.frame_material.clone(),
            groupset: posting.groupset.clone(),
            brake_type: posting.brake_type.clone(),
            model_year: posting.model_year,
            color: posting.color.clone(),
            description: posting.description.clone(),
            price: posting.price.map(|price| price.to_string()),
            image_url: posting.image_url.clone(),
            image_urls: posting.image_urls.clone(),
            status: Some(posting.status),
            views: Some(posting.views),
            created_at: Some(posting.created_at),
            updated_at: Some(posting.updated_at),
        }
    }
}

/// Number that some backend versions send as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FlexNumber {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FlexNumber::Int(n) => Some(*n),
            FlexNumber::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            FlexNumber::Float(_) => None,
            FlexNumber::Text(text) => text.trim().parse().ok(),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|n| u64::try_from(n).ok())
    }
}

/// Java backends send `null` for empty collections.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Image entry nested in a backend post row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawImage {
    #[serde(alias = "image_url")]
    pub image_url: Option<String>,
    pub url: Option<String>,
    #[serde(alias = "is_thumbnail")]
    pub is_thumbnail: bool,
    #[serde(alias = "image_type")]
    pub image_type: Option<String>,
}

impl RawImage {
    pub fn location(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .or(self.url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

/// A post row as returned by the marketplace backend.
///
/// Field names vary between endpoints (camelCase vs snake_case, `postId`
/// vs `id`); every known spelling has its own slot and the builder picks
/// the first present one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawPostRow {
    #[serde(alias = "post_id")]
    pub post_id: Option<FlexNumber>,
    pub id: Option<FlexNumber>,
    #[serde(alias = "bicycle_name")]
    pub bicycle_name: Option<String>,
    #[serde(alias = "bike_name")]
    pub bike_name: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "brand_name")]
    pub brand_name: Option<String>,
    pub brand: Option<String>,
    #[serde(alias = "brand_id")]
    pub brand_id: Option<FlexNumber>,
    #[serde(alias = "category_name")]
    pub category_name: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "category_id")]
    pub category_id: Option<FlexNumber>,
    pub size: Option<String>,
    #[serde(alias = "frame_size")]
    pub frame_size: Option<String>,
    #[serde(alias = "frame_material")]
    pub frame_material: Option<String>,
    pub groupset: Option<String>,
    #[serde(alias = "brake_type")]
    pub brake_type: Option<String>,
    #[serde(alias = "model_year")]
    pub model_year: Option<FlexNumber>,
    #[serde(alias = "bicycle_color")]
    pub bicycle_color: Option<String>,
    pub color: Option<String>,
    #[serde(alias = "bicycle_description")]
    pub bicycle_description: Option<String>,
    pub description: Option<String>,
    pub price: Option<FlexNumber>,
    #[serde(alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(alias = "image_urls", deserialize_with = "null_as_empty")]
    pub image_urls: Vec<String>,
    #[serde(alias = "thumbnail_url")]
    pub thumbnail_url: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub images: Vec<RawImage>,
    #[serde(alias = "post_status")]
    pub post_status: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "rejection_reason")]
    pub rejection_reason: Option<String>,
    #[serde(alias = "seller_id")]
    pub seller_id: Option<FlexNumber>,
    pub views: Option<FlexNumber>,
    #[serde(alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(alias = "updated_at")]
    pub updated_at: Option<String>,
}

impl RawPostRow {
    /// `postId`, else `id`.
    pub fn server_id(&self) -> Option<i64> {
        self.post_id
            .as_ref()
            .or(self.id.as_ref())
            .and_then(FlexNumber::as_i64)
    }
}

/// Shallow edit of a posting. Status and seller are deliberately absent:
/// status moves only through transitions and the seller never changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingPatch {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub brand_id: Option<i64>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub frame_size: Option<String>,
    pub frame_material: Option<String>,
    pub groupset: Option<String>,
    pub brake_type: Option<String>,
    pub model_year: Option<i32>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    pub image_url: Option<String>,
    pub image_urls: Option<Vec<String>>,
}

impl PostingPatch {
    pub fn touches_images(&self) -> bool {
        self.image_url.is_some() || self.image_urls.is_some()
    }

    /// Fields the backend update endpoint cannot carry. Photos change only
    /// through uploads; brand and category are stored by id.
    pub fn unsendable_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.touches_images() {
            fields.push("images");
        }
        if self.brand.is_some() && self.brand_id.is_none() {
            fields.push("brand");
        }
        if self.category.is_some() && self.category_id.is_none() {
            fields.push("category");
        }
        fields
    }
}

/// Outcome of a physical inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionResult {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallCondition {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    pub result: InspectionResult,
    pub overall_condition: OverallCondition,
    pub notes: String,
}

/// Photo slots of the posting form. The six non-defect slots are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoSlot {
    DriveSide,
    NonDriveSide,
    Cockpit,
    Drivetrain,
    FrontBrake,
    RearBrake,
    Defect,
}

impl PhotoSlot {
    pub const REQUIRED: [PhotoSlot; 6] = [
        PhotoSlot::DriveSide,
        PhotoSlot::NonDriveSide,
        PhotoSlot::Cockpit,
        PhotoSlot::Drivetrain,
        PhotoSlot::FrontBrake,
        PhotoSlot::RearBrake,
    ];

    /// Image type understood by the backend.
    pub fn image_type(self) -> &'static str {
        match self {
            PhotoSlot::DriveSide => "OVERALL_DRIVE_SIDE",
            PhotoSlot::NonDriveSide => "OVERALL_NON_DRIVE_SIDE",
            PhotoSlot::Cockpit => "COCKPIT_AREA",
            PhotoSlot::Drivetrain => "DRIVETRAIN_CLOSEUP",
            PhotoSlot::FrontBrake => "FRONT_BRAKE",
            PhotoSlot::RearBrake => "REAR_BRAKE",
            PhotoSlot::Defect => "DEFECT_POINT",
        }
    }

    /// The drive side shot doubles as the listing thumbnail.
    pub fn is_thumbnail(self) -> bool {
        self == PhotoSlot::DriveSide
    }
}

/// A photo picked in the form, not yet uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub slot: PhotoSlot,
    pub file_name: String,
    pub content_type: String,
    pub data: bytes::Bytes,
}
