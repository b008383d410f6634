//! # Posting Repository
//!
//! The single source of truth the UI queries for "my postings" and the write
//! path for every mutation.
//!
//! # Developer Note
//! Reads degrade to the local cache when the backend fails; writes always
//! propagate their error so the caller can tell the user. Server responses
//! are *merged* into what is already known rather than replacing it, since a
//! partial or paginated response must never make postings disappear.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;

use crate::builder::{
    build_posting, build_rows, overlay_form, resolve_primary_image, validate_for_publish,
    BuildContext, PostingInput,
};
use crate::cache::LocalCacheStore;
use crate::dto::{CreatePostRequest, ImageUpload, ListParams, StatusChange, UpdatePostRequest};
use crate::error::{AppError, Result};
use crate::models::{
    sort_newest_first, FlexNumber, InspectionReport, InspectionResult, LookupId, Photo, PhotoSlot,
    Posting, PostingDraft, PostingPatch, RawPostRow, SellerId,
};
use crate::public::{dedupe_last_wins, fetch_public_postings};
use crate::status::{Status, Transition};
use crate::traits::{KeyValueStore, PostingBackend};

/// Merges postings by id. Precedence: `fetched` over `in_memory` over
/// `cached`. Result is newest first.
///
/// Idempotent: merging the output with the same `fetched` again is a no-op.
pub fn merge_postings(
    fetched: Vec<Posting>,
    in_memory: Vec<Posting>,
    cached: Vec<Posting>,
) -> Vec<Posting> {
    let mut by_id: HashMap<String, Posting> = HashMap::new();
    for posting in cached.into_iter().chain(in_memory).chain(fetched) {
        by_id.insert(posting.id.clone(), posting);
    }
    let mut merged: Vec<Posting> = by_id.into_values().collect();
    sort_newest_first(&mut merged);
    merged
}

/// Shallow merge of `patch` into `posting`.
fn apply_patch(posting: &mut Posting, patch: PostingPatch) {
    fn set<T>(slot: &mut Option<T>, value: Option<T>) {
        if value.is_some() {
            *slot = value;
        }
    }
    let touches_images = patch.touches_images();
    if let Some(name) = patch.name.filter(|name| !name.trim().is_empty()) {
        posting.name = name;
    }
    set(&mut posting.brand, patch.brand);
    set(&mut posting.brand_id, patch.brand_id);
    set(&mut posting.category, patch.category);
    set(&mut posting.category_id, patch.category_id);
    set(&mut posting.frame_size, patch.frame_size);
    set(&mut posting.frame_material, patch.frame_material);
    set(&mut posting.groupset, patch.groupset);
    set(&mut posting.brake_type, patch.brake_type);
    set(&mut posting.model_year, patch.model_year);
    set(&mut posting.color, patch.color);
    set(&mut posting.description, patch.description);
    if patch.price.is_some() {
        posting.set_price(patch.price);
    }
    if touches_images {
        if let Some(urls) = patch.image_urls.filter(|urls| !urls.is_empty()) {
            posting.image_urls = urls;
        } else if posting.image_urls.is_empty() {
            posting.image_urls = patch.image_url.iter().cloned().collect();
        }
        posting.image_url =
            resolve_primary_image(patch.image_url.as_deref(), &posting.image_urls, &[]);
    }
}

pub struct PostingRepository<B, S> {
    backend: Arc<B>,
    cache: LocalCacheStore<S>,
    /// The signed-in seller's postings, newest first.
    postings: Vec<Posting>,
    /// Marketplace postings.
    public: Vec<Posting>,
    /// Admin or inspector review queue.
    worklist: Vec<Posting>,
    worklist_status: Option<Status>,
    list_params: ListParams,
}

impl<B, S> PostingRepository<B, S>
where
    B: PostingBackend,
    S: KeyValueStore,
{
    pub fn new(backend: Arc<B>, store: Arc<S>) -> Self {
        Self {
            backend,
            cache: LocalCacheStore::new(store),
            postings: Vec::new(),
            public: Vec::new(),
            worklist: Vec::new(),
            worklist_status: None,
            list_params: ListParams::default(),
        }
    }

    pub fn with_list_params(mut self, params: ListParams) -> Self {
        self.list_params = params;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &LocalCacheStore<S> {
        &self.cache
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn public_postings(&self) -> &[Posting] {
        &self.public
    }

    pub fn worklist(&self) -> &[Posting] {
        &self.worklist
    }

    fn seller_postings(&self, seller_id: SellerId) -> Vec<Posting> {
        self.postings
            .iter()
            .filter(|posting| posting.seller_id == Some(seller_id))
            .cloned()
            .collect()
    }

    async fn persist(&self, seller_id: Option<SellerId>) {
        if let Some(seller_id) = seller_id {
            self.cache
                .save(seller_id, &self.seller_postings(seller_id))
                .await;
        }
    }

    fn own_index(&self, id: &LookupId) -> Option<usize> {
        self.postings.iter().position(|posting| id.matches(&posting.id))
    }

    fn own_or_not_found(&self, id: &LookupId) -> Result<usize> {
        self.own_index(id)
            .ok_or_else(|| AppError::posting_not_found(id.to_string()))
    }

    /// Looks across own, public and review postings.
    pub fn get_posting_by_id(&self, id: impl Into<LookupId>) -> Option<&Posting> {
        let id = id.into();
        self.postings
            .iter()
            .chain(self.public.iter())
            .chain(self.worklist.iter())
            .find(|posting| id.matches(&posting.id))
    }

    /// Builds a posting from the form, prepends it and caches it. Local only.
    pub async fn add_posting(
        &mut self,
        draft: PostingDraft,
        initial_status: Status,
        seller_id: Option<SellerId>,
    ) -> Posting {
        let ctx = BuildContext::new(Utc::now())
            .with_status(initial_status)
            .with_seller(seller_id);
        let posting = build_posting(PostingInput::Form(draft), &ctx);
        tracing::debug!(posting_id = %posting.id, status = %posting.status, "Posting added");
        self.postings.insert(0, posting.clone());
        self.persist(seller_id).await;
        posting
    }

    /// Shallow edit. An unknown id is a no-op (`None`): background refreshes
    /// may legitimately race optimistic edits.
    pub async fn update_posting(
        &mut self,
        id: impl Into<LookupId>,
        patch: PostingPatch,
    ) -> Option<Posting> {
        let id = id.into();
        let Some(index) = self.own_index(&id) else {
            tracing::debug!(%id, "Ignoring update for unknown posting");
            return None;
        };
        let posting = &mut self.postings[index];
        apply_patch(posting, patch);
        posting.touch(Utc::now());
        let updated = posting.clone();
        self.persist(updated.seller_id).await;
        Some(updated)
    }

    /// Edits a posting, confirming with the backend first when it is
    /// persisted. Drafts are edited locally. A persisted posting refuses
    /// fields the update endpoint cannot carry.
    pub async fn update_posting_on_server(
        &mut self,
        id: impl Into<LookupId>,
        patch: PostingPatch,
    ) -> Result<Posting> {
        let id = id.into();
        let index = self.own_or_not_found(&id)?;
        if let Some(post_id) = self.postings[index].server_id() {
            let unsendable = patch.unsendable_fields();
            if !unsendable.is_empty() {
                return Err(AppError::Validation(format!(
                    "cannot change {} of a submitted posting with an edit",
                    unsendable.join(", ")
                )));
            }
            self.backend
                .update_posting(post_id, &UpdatePostRequest::from(&patch))
                .await?;
        }
        let posting = &mut self.postings[index];
        apply_patch(posting, patch);
        posting.touch(Utc::now());
        let updated = posting.clone();
        self.persist(updated.seller_id).await;
        Ok(updated)
    }

    /// Local-only status change for states the backend does not track.
    pub async fn update_posting_status(
        &mut self,
        id: impl Into<LookupId>,
        status: Status,
    ) -> Result<Posting> {
        let id = id.into();
        let index = self.own_or_not_found(&id)?;
        let current = self.postings[index].status;
        let next = current.transition(status)?;
        if next == Status::Rejected {
            return Err(AppError::Validation(
                "a rejection requires a reason and must go through the backend".to_string(),
            ));
        }
        let posting = &mut self.postings[index];
        posting.status = next;
        posting.rejection_reason = None;
        posting.touch(Utc::now());
        let updated = posting.clone();
        tracing::info!(posting_id = %updated.id, from = %current, to = %next, "Posting status changed locally");
        self.persist(updated.seller_id).await;
        Ok(updated)
    }

    /// Validates locally, asks the backend, and applies only on success.
    pub async fn update_posting_status_on_server(
        &mut self,
        id: impl Into<LookupId>,
        transition: Transition,
    ) -> Result<Posting> {
        self.transition_on_server(id.into(), transition, None).await
    }

    /// Inspector result: pass makes the posting public, fail rejects it with
    /// the inspector's notes as the reason.
    pub async fn submit_inspection(
        &mut self,
        id: impl Into<LookupId>,
        report: InspectionReport,
    ) -> Result<Posting> {
        let transition = match report.result {
            InspectionResult::Pass => Transition::PassInspection,
            InspectionResult::Fail => Transition::FailInspection {
                reason: report.notes.clone(),
            },
        };
        self.transition_on_server(id.into(), transition, Some(report))
            .await
    }

    async fn transition_on_server(
        &mut self,
        id: LookupId,
        transition: Transition,
        inspection: Option<InspectionReport>,
    ) -> Result<Posting> {
        let current = self
            .get_posting_by_id(id.clone())
            .cloned()
            .ok_or_else(|| AppError::posting_not_found(id.to_string()))?;
        let next = transition.apply(current.status)?;
        let post_id = current.server_id().ok_or_else(|| {
            AppError::Validation(format!(
                "posting {} has not been submitted to the server yet",
                current.id
            ))
        })?;

        let mut change = StatusChange::new(transition.clone(), current.status);
        if let Some(report) = inspection {
            change = change.with_inspection(report);
        }
        self.backend.update_posting_status(post_id, &change).await?;

        let now = Utc::now();
        let reason = transition.reason().map(str::to_string);
        let mut updated = current.clone();
        for posting in self
            .postings
            .iter_mut()
            .chain(self.public.iter_mut())
            .chain(self.worklist.iter_mut())
            .filter(|posting| posting.id == current.id)
        {
            posting.status = next;
            posting.rejection_reason = if next == Status::Rejected {
                reason.clone()
            } else {
                None
            };
            posting.touch(now);
            updated = posting.clone();
        }
        self.public.retain(|posting| posting.status.is_publicly_visible());
        if let Some(queue_status) = self.worklist_status {
            self.worklist.retain(|posting| posting.status == queue_status);
        }
        tracing::info!(posting_id = %current.id, from = %current.status, to = %next, "Posting status confirmed by backend");

        if self.own_index(&LookupId::from(&current.id)).is_some() {
            self.persist(current.seller_id).await;
        }
        Ok(updated)
    }

    /// Deletes on the backend (persisted postings only) and then locally.
    /// Backend failures propagate: a silent failure would leave a posting
    /// that looks deleted but still exists server-side.
    pub async fn delete_posting(&mut self, id: impl Into<LookupId>) -> Result<()> {
        let id = id.into();
        let index = self.own_or_not_found(&id)?;
        let target = self.postings[index].clone();
        if let Some(post_id) = target.server_id() {
            self.backend.delete_posting(post_id).await?;
        }
        self.postings.retain(|posting| posting.id != target.id);
        self.public.retain(|posting| posting.id != target.id);
        self.worklist.retain(|posting| posting.id != target.id);
        tracing::info!(posting_id = %target.id, "Posting deleted");
        self.persist(target.seller_id).await;
        Ok(())
    }

    fn replace_seller_postings(&mut self, seller_id: SellerId, merged: Vec<Posting>) {
        self.postings
            .retain(|posting| posting.seller_id != Some(seller_id));
        self.postings.extend(merged);
        sort_newest_first(&mut self.postings);
    }

    /// Fetches the seller's postings and merges them with the cache and the
    /// in-memory collection. Falls back to the cache when the fetch fails.
    pub async fn load_postings_by_seller(&mut self, seller_id: SellerId) -> Result<Vec<Posting>> {
        let cached = self.cache.load(seller_id).await;
        let in_memory = self.seller_postings(seller_id);

        match self.backend.list_by_seller(seller_id).await {
            Ok(rows) => {
                let ctx = BuildContext::new(Utc::now()).with_seller(Some(seller_id));
                let fetched = build_rows(rows, &ctx);
                tracing::debug!(%seller_id, fetched = fetched.len(), cached = cached.len(), "Merging seller postings");
                let merged = merge_postings(fetched, in_memory, cached);
                self.cache.save(seller_id, &merged).await;
                self.replace_seller_postings(seller_id, merged.clone());
                Ok(merged)
            }
            Err(err) if !cached.is_empty() => {
                tracing::warn!(%seller_id, error = %err, cached = cached.len(), "Seller fetch failed, serving cached postings");
                let merged = merge_postings(Vec::new(), in_memory, cached);
                self.replace_seller_postings(seller_id, merged.clone());
                Ok(merged)
            }
            Err(err) => Err(err),
        }
    }

    /// Refreshes the marketplace collection. Never fails.
    pub async fn load_public_postings(&mut self) -> Vec<Posting> {
        self.public = fetch_public_postings(self.backend.as_ref(), self.list_params).await;
        self.public.clone()
    }

    /// Loads the review queue for `status` (admin: `PENDING`, inspector:
    /// `ADMIN_APPROVED`).
    pub async fn load_worklist(&mut self, status: Status) -> Result<Vec<Posting>> {
        let rows = self.backend.list_by_status(status).await?;
        let ctx = BuildContext::new(Utc::now()).with_status(status);
        let mut queue = dedupe_last_wins(
            build_rows(rows, &ctx)
                .into_iter()
                .filter(|posting| posting.status == status)
                .collect(),
        );
        sort_newest_first(&mut queue);
        self.worklist = queue.clone();
        self.worklist_status = Some(status);
        Ok(queue)
    }

    /// Public postings plus the seller's own visible ones, newest first.
    pub fn marketplace_postings(&self) -> Vec<Posting> {
        let mut combined = dedupe_last_wins(
            self.public
                .iter()
                .chain(
                    self.postings
                        .iter()
                        .filter(|posting| posting.status.is_publicly_visible()),
                )
                .cloned()
                .collect(),
        );
        sort_newest_first(&mut combined);
        combined
    }

    /// Creates the posting on the backend, uploads its photos, and adds the
    /// server's view of it to the collection. `replacing` names a local
    /// draft that this submission supersedes.
    pub async fn publish(
        &mut self,
        draft: PostingDraft,
        seller_id: SellerId,
        photos: Vec<Photo>,
        replacing: Option<LookupId>,
    ) -> Result<Posting> {
        validate_for_publish(&draft)?;
        let missing: Vec<&str> = PhotoSlot::REQUIRED
            .iter()
            .filter(|slot| !photos.iter().any(|photo| photo.slot == **slot))
            .map(|slot| slot.image_type())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "missing required photos: {}",
                missing.join(", ")
            )));
        }

        let request = CreatePostRequest::from_draft(&draft, seller_id)?;
        let created = self.backend.create_posting(&request).await?;
        let post_id = created.server_id().ok_or_else(|| AppError::BackendRejection {
            status: None,
            message: "create post response did not include a postId".to_string(),
        })?;

        let mut ordered: Vec<Photo> = Vec::with_capacity(photos.len());
        for slot in PhotoSlot::REQUIRED {
            if let Some(photo) = photos.iter().find(|photo| photo.slot == slot) {
                ordered.push(photo.clone());
            }
        }
        ordered.extend(photos.into_iter().filter(|photo| photo.slot == PhotoSlot::Defect));

        let backend = self.backend.as_ref();
        let uploaded = try_join_all(ordered.into_iter().map(|photo| {
            backend.upload_image(ImageUpload {
                post_id,
                file_name: photo.file_name,
                content_type: photo.content_type,
                data: photo.data,
                image_type: photo.slot.image_type().to_string(),
                is_thumbnail: photo.slot.is_thumbnail(),
            })
        }))
        .await?;
        let uploaded_urls: Vec<String> = uploaded
            .iter()
            .filter_map(|image| image.location().map(str::to_string))
            .collect();

        let row = match self.backend.get_posting(post_id).await {
            Ok(mut row) => {
                if row.server_id().is_none() {
                    row.post_id = Some(FlexNumber::Int(post_id));
                }
                row
            }
            Err(err) => {
                tracing::warn!(post_id, error = %err, "Re-reading the new post failed, using create response");
                RawPostRow {
                    post_id: Some(FlexNumber::Int(post_id)),
                    post_status: created.post_status.clone().or(created.status.clone()),
                    images: created.images.clone(),
                    ..Default::default()
                }
            }
        };

        let ctx = BuildContext::new(Utc::now())
            .with_status(Status::Pending)
            .with_seller(Some(seller_id));
        let mut posting = build_posting(PostingInput::Row(row), &ctx);
        overlay_form(&mut posting, &draft);
        posting.seller_id = Some(seller_id);
        if posting.image_urls.is_empty() {
            posting.image_url = resolve_primary_image(None, &uploaded_urls, &[]);
            posting.image_urls = uploaded_urls;
        }

        if let Some(replaced) = replacing {
            self.postings.retain(|existing| !replaced.matches(&existing.id));
        }
        self.postings.retain(|existing| existing.id != posting.id);
        self.postings.insert(0, posting.clone());
        tracing::info!(posting_id = %posting.id, %seller_id, "Posting published");
        self.persist(Some(seller_id)).await;
        Ok(posting)
    }

    /// Submits a local draft (`DRAFT -> PENDING`) by publishing it.
    pub async fn submit_draft(
        &mut self,
        id: impl Into<LookupId>,
        seller_id: SellerId,
        photos: Vec<Photo>,
    ) -> Result<Posting> {
        let id = id.into();
        let index = self.own_or_not_found(&id)?;
        let posting = &self.postings[index];
        Transition::Submit.apply(posting.status)?;
        let mut draft = PostingDraft::from(posting);
        draft.status = None;
        draft.created_at = None;
        draft.updated_at = None;
        let local_id = LookupId::from(&posting.id);
        self.publish(draft, seller_id, photos, Some(local_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{CreatedPost, UploadedImage};
    use crate::storage::MemoryStore;
    use crate::traits::MockPostingBackend;
    use chrono::{Duration, TimeZone};

    fn posting(id: &str, name: &str, minutes: i64) -> Posting {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        let draft = PostingDraft {
            name: Some(name.into()),
            created_at: Some(created),
            ..Default::default()
        };
        let mut posting = build_posting(
            PostingInput::Form(draft),
            &BuildContext::new(created).with_seller(Some(SellerId(42))),
        );
        posting.id = id.to_string();
        posting
    }

    fn repo(backend: MockPostingBackend) -> (PostingRepository<MockPostingBackend, MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (PostingRepository::new(Arc::new(backend), Arc::clone(&store)), store)
    }

    fn complete_draft() -> PostingDraft {
        PostingDraft {
            name: Some("Trek Fuel EX 8".into()),
            brand_id: Some(3),
            category_id: Some(1),
            price: Some("45000000".into()),
            frame_size: Some("M".into()),
            frame_material: Some("Aluminium".into()),
            groupset: Some("SLX".into()),
            brake_type: Some("Hydraulic disc".into()),
            model_year: Some(2022),
            color: Some("Blue".into()),
            description: Some("Well kept".into()),
            ..Default::default()
        }
    }

    fn photos() -> Vec<Photo> {
        PhotoSlot::REQUIRED
            .iter()
            .rev()
            .map(|slot| Photo {
                slot: *slot,
                file_name: format!("{}.jpg", slot.image_type()),
                content_type: "image/jpeg".into(),
                data: bytes::Bytes::from_static(b"jpeg"),
            })
            .collect()
    }

    #[test]
    fn test_merge_precedence_and_order() {
        let cached = vec![posting("1", "cached", 1), posting("2", "cached", 2)];
        let in_memory = vec![posting("2", "memory", 2), posting("draft-x", "memory", 5)];
        let fetched = vec![posting("1", "fetched", 1), posting("3", "fetched", 3)];

        let merged = merge_postings(fetched, in_memory, cached);
        let view: Vec<(&str, &str)> = merged.iter().map(|p| (p.id.as_str(), p.name.as_str())).collect();
        assert_eq!(
            view,
            vec![("draft-x", "memory"), ("3", "fetched"), ("2", "memory"), ("1", "fetched")]
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let cached = vec![posting("1", "old", 1), posting("9", "cache-only", 9)];
        let fetched = vec![posting("1", "new", 1), posting("4", "new", 4)];

        let once = merge_postings(fetched.clone(), Vec::new(), cached);
        let twice = merge_postings(fetched, Vec::new(), once.clone());
        assert_eq!(once, twice);
        assert!(once.iter().any(|p| p.id == "9"));
        assert_eq!(once.iter().find(|p| p.id == "1").unwrap().name, "new");
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_noop() {
        let (mut repo, store) = repo(MockPostingBackend::new());
        let patch = PostingPatch {
            name: Some("x".into()),
            ..Default::default()
        };
        assert!(repo.update_posting("nope", patch).await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_recomputes_primary_image_and_price() {
        let (mut repo, _) = repo(MockPostingBackend::new());
        let draft = PostingDraft {
            image_urls: vec!["a.jpg".into(), "b.jpg".into()],
            price: Some("1000".into()),
            ..Default::default()
        };
        let added = repo.add_posting(draft, Status::Draft, Some(SellerId(42))).await;
        assert_eq!(added.image_url.as_deref(), Some("a.jpg"));

        let updated = repo
            .update_posting(
                added.id.as_str(),
                PostingPatch {
                    image_urls: Some(vec!["c.jpg".into(), "a.jpg".into()]),
                    price: Some(2_500_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.image_urls, vec!["c.jpg", "a.jpg"]);
        assert_eq!(updated.image_url.as_deref(), Some("c.jpg"));
        assert_eq!(updated.price_display, "2.500.000 ₫");
        assert!(updated.updated_at >= added.updated_at);
        assert_eq!(updated.seller_id, Some(SellerId(42)));
    }

    #[tokio::test]
    async fn test_local_status_change_is_validated() {
        let (mut repo, _) = repo(MockPostingBackend::new());
        let added = repo
            .add_posting(PostingDraft::default(), Status::Draft, Some(SellerId(42)))
            .await;

        let err = repo
            .update_posting_status(added.id.as_str(), Status::Available)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AppError::InvalidTransition {
                from: Status::Draft,
                to: Status::Available
            }
        );
        assert_eq!(repo.postings()[0].status, Status::Draft);

        let moved = repo
            .update_posting_status(added.id.as_str(), Status::Pending)
            .await
            .unwrap();
        assert_eq!(moved.status, Status::Pending);
    }

    #[tokio::test]
    async fn test_status_change_on_unknown_id_surfaces() {
        let (mut repo, _) = repo(MockPostingBackend::new());
        assert!(matches!(
            repo.update_posting_status("42", Status::Pending).await,
            Err(AppError::NotFound(..))
        ));
        assert!(matches!(
            repo.update_posting_status_on_server(42, Transition::Approve).await,
            Err(AppError::NotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_server_transition_not_applied_on_failure() {
        let mut backend = MockPostingBackend::new();
        backend.expect_list_by_status().returning(|_| {
            Ok(vec![RawPostRow {
                post_id: Some(FlexNumber::Int(7)),
                post_status: Some("PENDING".into()),
                ..Default::default()
            }])
        });
        backend
            .expect_update_posting_status()
            .times(1)
            .returning(|_, _| {
                Err(AppError::BackendRejection {
                    status: Some(409),
                    message: "Post already reviewed".into(),
                })
            });
        let (mut repo, _) = repo(backend);
        repo.load_worklist(Status::Pending).await.unwrap();

        let err = repo
            .update_posting_status_on_server("7", Transition::Approve)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Post already reviewed");
        assert_eq!(repo.get_posting_by_id(7).unwrap().status, Status::Pending);
    }

    #[tokio::test]
    async fn test_invalid_transition_never_reaches_backend() {
        let mut backend = MockPostingBackend::new();
        backend.expect_list_by_status().returning(|_| {
            Ok(vec![RawPostRow {
                post_id: Some(FlexNumber::Int(7)),
                post_status: Some("PENDING".into()),
                ..Default::default()
            }])
        });
        backend.expect_update_posting_status().never();
        let (mut repo, _) = repo(backend);
        repo.load_worklist(Status::Pending).await.unwrap();

        assert!(matches!(
            repo.update_posting_status_on_server(7, Transition::PassInspection)
                .await,
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_propagates_backend_failure() {
        let mut backend = MockPostingBackend::new();
        backend
            .expect_delete_posting()
            .returning(|_| Err(AppError::Network("timeout".into())));
        let (mut repo, _) = repo(backend);
        let mut added = repo
            .add_posting(PostingDraft::default(), Status::Pending, Some(SellerId(42)))
            .await;
        added.id = "15".into();
        repo.postings[0] = added;

        assert!(matches!(
            repo.delete_posting("15").await,
            Err(AppError::Network(_))
        ));
        assert_eq!(repo.postings().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_draft_is_local_and_clears_cache() {
        let mut backend = MockPostingBackend::new();
        backend.expect_delete_posting().never();
        let (mut repo, store) = repo(backend);
        let added = repo
            .add_posting(PostingDraft::default(), Status::Draft, Some(SellerId(42)))
            .await;
        assert!(store.contains("bx.postings.seller.42"));

        repo.delete_posting(added.id.as_str()).await.unwrap();

        assert!(repo.postings().is_empty());
        assert!(!store.contains("bx.postings.seller.42"));
        assert!(matches!(
            repo.delete_posting(added.id.as_str()).await,
            Err(AppError::NotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_load_error_without_cache_is_raised() {
        let mut backend = MockPostingBackend::new();
        backend
            .expect_list_by_seller()
            .returning(|_| Err(AppError::Network("down".into())));
        let (mut repo, _) = repo(backend);
        assert!(matches!(
            repo.load_postings_by_seller(SellerId(42)).await,
            Err(AppError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_requires_all_photos() {
        let mut backend = MockPostingBackend::new();
        backend.expect_create_posting().never();
        let (mut repo, _) = repo(backend);
        let mut partial = photos();
        partial.pop();

        let err = repo
            .publish(complete_draft(), SellerId(42), partial, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(message) if message.contains("OVERALL_DRIVE_SIDE")));
    }

    #[tokio::test]
    async fn test_publish_uploads_thumbnail_and_keeps_order() {
        let mut backend = MockPostingBackend::new();
        backend.expect_create_posting().times(1).returning(|_| {
            Ok(CreatedPost {
                post_id: Some(FlexNumber::Int(7)),
                ..Default::default()
            })
        });
        backend
            .expect_upload_image()
            .times(6)
            .returning(|upload| {
                Ok(UploadedImage {
                    image_url: Some(format!("https://cdn.example/{}", upload.image_type)),
                    ..Default::default()
                })
            });
        backend
            .expect_get_posting()
            .returning(|_| Err(AppError::Network("flaky".into())));
        let (mut repo, _) = repo(backend);

        let posting = repo
            .publish(complete_draft(), SellerId(42), photos(), None)
            .await
            .unwrap();

        assert_eq!(posting.id, "7");
        assert_eq!(posting.status, Status::Pending);
        assert_eq!(posting.name, "Trek Fuel EX 8");
        assert_eq!(posting.price, Some(45_000_000));
        assert_eq!(
            posting.image_url.as_deref(),
            Some("https://cdn.example/OVERALL_DRIVE_SIDE")
        );
        assert_eq!(posting.image_urls.len(), 6);
        assert_eq!(repo.postings()[0].id, "7");
    }
}
