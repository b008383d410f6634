//! # Posting Builder
//!
//! Normalizes a seller form payload or a raw backend row into one canonical
//! [`Posting`]. Pure apart from id generation; the clock is passed in.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{FlexNumber, Posting, PostingDraft, RawImage, RawPostRow, SellerId};
use crate::status::Status;

pub const UNTITLED: &str = "Untitled";

/// The two payload shapes the builder understands.
#[derive(Debug, Clone)]
pub enum PostingInput {
    Form(PostingDraft),
    Row(RawPostRow),
}

/// Defaults applied to fields the input does not carry.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext {
    pub default_status: Status,
    pub seller_id: Option<SellerId>,
    pub now: DateTime<Utc>,
}

impl BuildContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            default_status: Status::Pending,
            seller_id: None,
            now,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.default_status = status;
        self
    }

    pub fn with_seller(mut self, seller_id: Option<SellerId>) -> Self {
        self.seller_id = seller_id;
        self
    }
}

pub fn build_posting(input: PostingInput, ctx: &BuildContext) -> Posting {
    match input {
        PostingInput::Form(draft) => from_form(draft, ctx),
        PostingInput::Row(row) => from_row(row, ctx),
    }
}

/// Primary image precedence: explicit image, first of `image_urls`, first raw
/// image flagged as thumbnail, first raw image.
pub fn resolve_primary_image(
    explicit: Option<&str>,
    image_urls: &[String],
    images: &[RawImage],
) -> Option<String> {
    explicit
        .filter(|url| !url.is_empty())
        .or_else(|| image_urls.first().map(String::as_str))
        .or_else(|| {
            images
                .iter()
                .find(|image| image.is_thumbnail)
                .and_then(RawImage::location)
        })
        .or_else(|| images.first().and_then(RawImage::location))
        .map(str::to_string)
}

/// Formats VND with dot grouping, e.g. `1.500.000 ₫`.
pub fn format_price(price: u64) -> String {
    let digits = price.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped.push_str(" ₫");
    grouped
}

/// Extracts the digits of a free-text price ("15.000.000 ₫" → 15000000).
pub fn parse_price(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Backend timestamps come as RFC 3339 or as zone-less local date-times.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn new_local_id() -> String {
    format!("draft-{}", Uuid::now_v7())
}

fn random_posting_code(now: DateTime<Utc>) -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let n = 1000 + u16::from_be_bytes([bytes[0], bytes[1]]) % 9000;
    format!("POST-{}-{n}", now.year())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn from_form(draft: PostingDraft, ctx: &BuildContext) -> Posting {
    let image_urls: Vec<String> = if !draft.image_urls.is_empty() {
        draft.image_urls.clone()
    } else {
        draft.image_url.iter().cloned().collect()
    };
    let image_url = resolve_primary_image(draft.image_url.as_deref(), &image_urls, &[]);
    let created_at = draft.created_at.unwrap_or(ctx.now);

    let mut posting = Posting {
        id: new_local_id(),
        posting_code: random_posting_code(created_at),
        name: non_empty(draft.name).unwrap_or_else(|| UNTITLED.to_string()),
        brand: non_empty(draft.brand),
        brand_id: draft.brand_id,
        category: non_empty(draft.category),
        category_id: draft.category_id,
        frame_size: non_empty(draft.frame_size),
        frame_material: non_empty(draft.frame_material),
        groupset: non_empty(draft.groupset),
        brake_type: non_empty(draft.brake_type),
        model_year: draft.model_year,
        color: non_empty(draft.color),
        description: non_empty(draft.description),
        price: None,
        price_display: String::new(),
        image_urls,
        image_url,
        status: draft.status.unwrap_or(ctx.default_status),
        rejection_reason: None,
        seller_id: ctx.seller_id,
        views: draft.views.unwrap_or(0),
        created_at,
        updated_at: draft.updated_at.unwrap_or(created_at),
    };
    posting.set_price(draft.price.as_deref().and_then(parse_price));
    posting
}

/// Builds every backend row that carries a server id. A row without one
/// cannot be matched against earlier loads, so it is dropped.
pub fn build_rows(rows: Vec<RawPostRow>, ctx: &BuildContext) -> Vec<Posting> {
    rows.into_iter()
        .filter(|row| {
            let keep = row.server_id().is_some();
            if !keep {
                tracing::warn!(name = ?row.bicycle_name.as_ref().or(row.name.as_ref()), "Dropping backend row without a post id");
            }
            keep
        })
        .map(|row| from_row(row, ctx))
        .collect()
}

fn from_row(row: RawPostRow, ctx: &BuildContext) -> Posting {
    let server_id = row.server_id();

    let image_urls: Vec<String> = if !row.image_urls.is_empty() {
        row.image_urls.clone()
    } else if !row.images.is_empty() {
        row.images
            .iter()
            .filter_map(RawImage::location)
            .map(str::to_string)
            .collect()
    } else {
        row.image_url
            .iter()
            .chain(row.thumbnail_url.iter())
            .take(1)
            .cloned()
            .collect()
    };
    let explicit = row.image_url.as_deref().or(row.thumbnail_url.as_deref());
    let image_url = resolve_primary_image(explicit, &row.image_urls, &row.images)
        .or_else(|| image_urls.first().cloned());

    let status = match row.post_status.as_deref().or(row.status.as_deref()) {
        Some(raw) => raw.parse::<Status>().unwrap_or_else(|_| {
            tracing::warn!(status = raw, post_id = ?server_id, "Unknown posting status from backend, using default");
            ctx.default_status
        }),
        None => ctx.default_status,
    };

    let created_at = row
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(ctx.now);
    let updated_at = row
        .updated_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(created_at);

    let (id, posting_code) = match server_id {
        Some(n) => (
            n.to_string(),
            format!("POST-{}-{:04}", created_at.year(), n.rem_euclid(10_000)),
        ),
        None => (new_local_id(), random_posting_code(created_at)),
    };

    let mut posting = Posting {
        id,
        posting_code,
        name: non_empty(row.bicycle_name)
            .or(non_empty(row.bike_name))
            .or(non_empty(row.name))
            .unwrap_or_else(|| UNTITLED.to_string()),
        brand: non_empty(row.brand_name).or(non_empty(row.brand)),
        brand_id: row.brand_id.as_ref().and_then(FlexNumber::as_i64),
        category: non_empty(row.category_name).or(non_empty(row.category)),
        category_id: row.category_id.as_ref().and_then(FlexNumber::as_i64),
        frame_size: non_empty(row.size).or(non_empty(row.frame_size)),
        frame_material: non_empty(row.frame_material),
        groupset: non_empty(row.groupset),
        brake_type: non_empty(row.brake_type),
        model_year: row
            .model_year
            .as_ref()
            .and_then(FlexNumber::as_i64)
            .and_then(|year| i32::try_from(year).ok()),
        color: non_empty(row.bicycle_color).or(non_empty(row.color)),
        description: non_empty(row.bicycle_description).or(non_empty(row.description)),
        price: None,
        price_display: String::new(),
        image_urls,
        image_url,
        rejection_reason: if status == Status::Rejected {
            non_empty(row.rejection_reason)
        } else {
            None
        },
        status,
        seller_id: row
            .seller_id
            .as_ref()
            .and_then(FlexNumber::as_i64)
            .map(SellerId)
            .or(ctx.seller_id),
        views: row.views.as_ref().and_then(FlexNumber::as_u64).unwrap_or(0),
        created_at,
        updated_at,
    };
    posting.set_price(row.price.as_ref().and_then(|price| match price {
        FlexNumber::Text(text) => parse_price(text),
        other => other.as_u64(),
    }));
    posting
}

/// Fills fields the backend row left empty with what the seller typed.
pub fn overlay_form(posting: &mut Posting, draft: &PostingDraft) {
    fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
        if slot.is_none() {
            slot.clone_from(value);
        }
    }
    if posting.name == UNTITLED {
        if let Some(name) = non_empty(draft.name.clone()) {
            posting.name = name;
        }
    }
    fill(&mut posting.brand, &draft.brand);
    fill(&mut posting.brand_id, &draft.brand_id);
    fill(&mut posting.category, &draft.category);
    fill(&mut posting.category_id, &draft.category_id);
    fill(&mut posting.frame_size, &draft.frame_size);
    fill(&mut posting.frame_material, &draft.frame_material);
    fill(&mut posting.groupset, &draft.groupset);
    fill(&mut posting.brake_type, &draft.brake_type);
    fill(&mut posting.model_year, &draft.model_year);
    fill(&mut posting.color, &draft.color);
    fill(&mut posting.description, &draft.description);
    if posting.price.is_none() {
        posting.set_price(draft.price.as_deref().and_then(parse_price));
    }
}

/// Checks that the form carries everything the backend requires to publish.
pub fn validate_for_publish(draft: &PostingDraft) -> Result<()> {
    fn blank(value: &Option<String>) -> bool {
        value.as_deref().map_or(true, |v| v.trim().is_empty())
    }
    let mut missing = Vec::new();
    if blank(&draft.name) {
        missing.push("name");
    }
    if draft.brand_id.is_none() {
        missing.push("brand");
    }
    if draft.category_id.is_none() {
        missing.push("category");
    }
    if draft.price.as_deref().and_then(parse_price).is_none() {
        missing.push("price");
    }
    if blank(&draft.frame_size) {
        missing.push("frame size");
    }
    if blank(&draft.frame_material) {
        missing.push("frame material");
    }
    if blank(&draft.groupset) {
        missing.push("groupset");
    }
    if blank(&draft.brake_type) {
        missing.push("brake type");
    }
    if draft.model_year.is_none() {
        missing.push("model year");
    }
    if blank(&draft.color) {
        missing.push("color");
    }
    if blank(&draft.description) {
        missing.push("description");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx() -> BuildContext {
        BuildContext::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap())
    }

    fn image(url: &str, thumb: bool) -> RawImage {
        RawImage {
            image_url: Some(url.to_string()),
            is_thumbnail: thumb,
            ..Default::default()
        }
    }

    #[test]
    fn test_form_defaults() {
        let posting = build_posting(PostingInput::Form(PostingDraft::default()), &ctx());
        assert_eq!(posting.name, UNTITLED);
        assert_eq!(posting.status, Status::Pending);
        assert_eq!(posting.views, 0);
        assert_eq!(posting.image_url, None);
        assert!(posting.id.starts_with("draft-"));
        assert!(posting.posting_code.starts_with("POST-2024-"));
        assert_eq!(posting.created_at, ctx().now);
        assert_eq!(posting.updated_at, ctx().now);
    }

    #[test]
    fn test_explicit_status_and_timestamps_win() {
        let created = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let draft = PostingDraft {
            status: Some(Status::Draft),
            created_at: Some(created),
            ..Default::default()
        };
        let posting = build_posting(PostingInput::Form(draft), &ctx().with_status(Status::Pending));
        assert_eq!(posting.status, Status::Draft);
        assert_eq!(posting.created_at, created);
        assert_eq!(posting.updated_at, created);
    }

    #[test]
    fn test_primary_image_precedence() {
        let urls = vec!["list-0.jpg".to_string(), "list-1.jpg".to_string()];
        let images = vec![image("raw-0.jpg", false), image("raw-thumb.jpg", true)];

        assert_eq!(
            resolve_primary_image(Some("explicit.jpg"), &urls, &images).as_deref(),
            Some("explicit.jpg")
        );
        assert_eq!(
            resolve_primary_image(None, &urls, &images).as_deref(),
            Some("list-0.jpg")
        );
        assert_eq!(
            resolve_primary_image(None, &[], &images).as_deref(),
            Some("raw-thumb.jpg")
        );
        assert_eq!(
            resolve_primary_image(None, &[], &images[..1]).as_deref(),
            Some("raw-0.jpg")
        );
        assert_eq!(resolve_primary_image(Some(""), &[], &[]), None);
    }

    #[test]
    fn test_primary_image_is_deterministic() {
        let images = vec![image("a.jpg", false), image("b.jpg", true), image("c.jpg", true)];
        let first = resolve_primary_image(None, &[], &images);
        for _ in 0..10 {
            assert_eq!(resolve_primary_image(None, &[], &images), first);
        }
        assert_eq!(first.as_deref(), Some("b.jpg"));
    }

    #[test]
    fn test_row_normalization() {
        let row: RawPostRow = serde_json::from_value(serde_json::json!({
            "post_id": 7,
            "bicycle_name": "Giant TCR",
            "brand_name": "Giant",
            "price": 15000000,
            "post_status": "ADMIN_APPROVED",
            "seller_id": 42,
            "views": 12,
            "created_at": "2024-04-30T10:15:00",
            "images": [
                { "image_url": "side.jpg", "is_thumbnail": false },
                { "image_url": "thumb.jpg", "is_thumbnail": true }
            ]
        }))
        .unwrap();
        let posting = build_posting(PostingInput::Row(row), &ctx());
        assert_eq!(posting.id, "7");
        assert_eq!(posting.posting_code, "POST-2024-0007");
        assert_eq!(posting.name, "Giant TCR");
        assert_eq!(posting.brand.as_deref(), Some("Giant"));
        assert_eq!(posting.status, Status::AdminApproved);
        assert_eq!(posting.seller_id, Some(SellerId(42)));
        assert_eq!(posting.views, 12);
        assert_eq!(posting.price_display, "15.000.000 ₫");
        assert_eq!(posting.image_urls, vec!["side.jpg", "thumb.jpg"]);
        assert_eq!(posting.image_url.as_deref(), Some("thumb.jpg"));
        assert_eq!(
            posting.created_at,
            Utc.with_ymd_and_hms(2024, 4, 30, 10, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_rows_without_post_id_are_dropped() {
        let rows = vec![
            RawPostRow {
                bicycle_name: Some("No id".into()),
                post_status: Some("PENDING".into()),
                ..Default::default()
            },
            RawPostRow {
                id: Some(FlexNumber::Text("12".into())),
                ..Default::default()
            },
        ];
        let postings = build_rows(rows, &ctx());
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].id, "12");
    }

    #[test]
    fn test_negative_post_id_code_has_four_digits() {
        let row = RawPostRow {
            post_id: Some(FlexNumber::Int(-7)),
            created_at: Some("2024-04-30T10:15:00".into()),
            ..Default::default()
        };
        let posting = build_posting(PostingInput::Row(row), &ctx());
        assert_eq!(posting.posting_code, "POST-2024-9993");
    }

    #[test]
    fn test_row_with_unknown_status_uses_default() {
        let row = RawPostRow {
            post_id: Some(FlexNumber::Int(3)),
            status: Some("VERIFIED".into()),
            ..Default::default()
        };
        let posting = build_posting(PostingInput::Row(row), &ctx());
        assert_eq!(posting.status, Status::Pending);
    }

    #[test]
    fn test_price_helpers() {
        assert_eq!(format_price(0), "0 ₫");
        assert_eq!(format_price(999), "999 ₫");
        assert_eq!(format_price(1_500_000), "1.500.000 ₫");
        assert_eq!(parse_price("15.000.000 ₫"), Some(15_000_000));
        assert_eq!(parse_price("abc"), None);
    }

    #[test]
    fn test_display_price_is_never_trusted() {
        let draft = PostingDraft {
            price: Some("2,000,000".into()),
            ..Default::default()
        };
        let mut posting = build_posting(PostingInput::Form(draft), &ctx());
        assert_eq!(posting.price_display, "2.000.000 ₫");
        posting.set_price(Some(1_800_000));
        assert_eq!(posting.price_display, "1.800.000 ₫");
    }

    #[test]
    fn test_publish_validation_lists_missing_fields() {
        let draft = PostingDraft {
            name: Some("Trek Fuel EX 8".into()),
            ..Default::default()
        };
        let err = validate_for_publish(&draft).unwrap_err();
        match err {
            AppError::Validation(message) => {
                assert!(message.contains("brand"));
                assert!(message.contains("price"));
                assert!(!message.contains("name,"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_overlay_keeps_server_fields() {
        let row = RawPostRow {
            post_id: Some(FlexNumber::Int(9)),
            bicycle_name: Some("Server name".into()),
            ..Default::default()
        };
        let mut posting = build_posting(PostingInput::Row(row), &ctx());
        let draft = PostingDraft {
            name: Some("Form name".into()),
            brand: Some("Trek".into()),
            price: Some("1000".into()),
            ..Default::default()
        };
        overlay_form(&mut posting, &draft);
        assert_eq!(posting.name, "Server name");
        assert_eq!(posting.brand.as_deref(), Some("Trek"));
        assert_eq!(posting.price, Some(1000));
    }
}
