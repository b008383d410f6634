//! # Public Listing Aggregator
//!
//! Builds the marketplace view: postings that are `AVAILABLE` or
//! `ADMIN_APPROVED`. Best effort: a marketplace page showing nothing is
//! better than one that fails, so this never returns an error.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::join_all;

use crate::builder::{build_rows, BuildContext};
use crate::dto::ListParams;
use crate::error::Result;
use crate::models::{sort_newest_first, Posting, RawPostRow};
use crate::status::Status;
use crate::traits::PostingBackend;

/// Collapses duplicate ids, keeping the last occurrence in its position.
pub fn dedupe_last_wins(postings: Vec<Posting>) -> Vec<Posting> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Posting> = Vec::with_capacity(postings.len());
    for posting in postings {
        match index.get(&posting.id) {
            Some(&slot) => unique[slot] = posting,
            None => {
                index.insert(posting.id.clone(), unique.len());
                unique.push(posting);
            }
        }
    }
    unique
}

fn visible(rows: Vec<RawPostRow>, ctx: &BuildContext) -> Vec<Posting> {
    build_rows(rows, ctx)
        .into_iter()
        .filter(|posting| posting.status.is_publicly_visible())
        .collect()
}

/// Primary strategy: one unfiltered fetch, filtered client-side.
async fn from_full_listing<B>(backend: &B, params: ListParams) -> Result<Vec<Posting>>
where
    B: PostingBackend + ?Sized,
{
    let rows = backend.list_all(params).await?;
    let ctx = BuildContext::new(Utc::now());
    Ok(dedupe_last_wins(visible(rows, &ctx)))
}

/// Fallback strategy: one fetch per visible status, issued concurrently.
/// `None` when every fetch failed.
async fn from_status_listings<B>(backend: &B) -> Option<Vec<Posting>>
where
    B: PostingBackend + ?Sized,
{
    let now = Utc::now();
    let results = join_all(
        Status::PUBLIC
            .into_iter()
            .map(|status| async move { (status, backend.list_by_status(status).await) }),
    )
    .await;

    let mut succeeded = false;
    let mut union = Vec::new();
    for (status, result) in results {
        match result {
            Ok(rows) => {
                succeeded = true;
                let ctx = BuildContext::new(now).with_status(status);
                union.extend(visible(rows, &ctx));
            }
            Err(err) => {
                tracing::warn!(%status, error = %err, "Public listing fetch by status failed");
            }
        }
    }
    succeeded.then(|| dedupe_last_wins(union))
}

/// Fetches the public marketplace collection, newest first.
pub async fn fetch_public_postings<B>(backend: &B, params: ListParams) -> Vec<Posting>
where
    B: PostingBackend + ?Sized,
{
    let mut postings = match from_full_listing(backend, params).await {
        Ok(postings) if !postings.is_empty() => postings,
        Ok(_) => {
            tracing::debug!("Full listing had no public postings, trying per-status listings");
            from_status_listings(backend).await.unwrap_or_default()
        }
        Err(err) => {
            tracing::warn!(error = %err, "Full listing failed, trying per-status listings");
            from_status_listings(backend).await.unwrap_or_else(|| {
                tracing::warn!("All public listing strategies failed");
                Vec::new()
            })
        }
    };
    sort_newest_first(&mut postings);
    postings
}
