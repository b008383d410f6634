//! Role-scoped entry points: one desk per actor of the listing lifecycle.
//! Each desk checks the session once at construction and then only exposes
//! the operations that actor may perform.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cancel::unless_cancelled;
use crate::error::Result;
use crate::models::{InspectionReport, LookupId, Photo, Posting, PostingDraft, PostingPatch};
use crate::notifier::{Notification, StatusChangeNotifier};
use crate::repository::PostingRepository;
use crate::session::{Role, SessionContext, UserProfile};
use crate::status::{Status, Transition};
use crate::traits::{KeyValueStore, PostingBackend};

/// Outcome of a seller refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub postings: Vec<Posting>,
    pub notifications: Vec<Notification>,
}

pub struct SellerDesk<B, S> {
    profile: UserProfile,
    repository: PostingRepository<B, S>,
    notifier: StatusChangeNotifier<S>,
}

impl<B, S> SellerDesk<B, S>
where
    B: PostingBackend,
    S: KeyValueStore,
{
    pub fn new(session: &SessionContext, backend: Arc<B>, store: Arc<S>) -> Result<Self> {
        let profile = session.user()?.clone();
        Ok(Self {
            profile,
            repository: PostingRepository::new(backend, Arc::clone(&store)),
            notifier: StatusChangeNotifier::new(store),
        })
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn repository(&self) -> &PostingRepository<B, S> {
        &self.repository
    }

    pub fn postings(&self) -> &[Posting] {
        self.repository.postings()
    }

    pub fn postings_with_status(&self, status: Status) -> Vec<&Posting> {
        self.postings()
            .iter()
            .filter(|posting| posting.status == status)
            .collect()
    }

    /// Case-insensitive match on name, brand or posting code. A blank query
    /// matches everything.
    pub fn search(&self, query: &str) -> Vec<&Posting> {
        let query = query.trim().to_lowercase();
        self.postings()
            .iter()
            .filter(|posting| {
                query.is_empty()
                    || posting.name.to_lowercase().contains(&query)
                    || posting
                        .brand
                        .as_deref()
                        .is_some_and(|brand| brand.to_lowercase().contains(&query))
                    || posting.posting_code.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Number of postings per status; every status is present.
    pub fn status_counts(&self) -> HashMap<Status, usize> {
        let mut counts: HashMap<Status, usize> =
            Status::ALL.into_iter().map(|status| (status, 0)).collect();
        for posting in self.postings() {
            *counts.entry(posting.status).or_default() += 1;
        }
        counts
    }

    /// Keeps the form locally as a `DRAFT`.
    pub async fn save_draft(&mut self, draft: PostingDraft) -> Posting {
        self.repository
            .add_posting(draft, Status::Draft, Some(self.profile.id))
            .await
    }

    /// Submits the form straight to review.
    pub async fn publish(&mut self, draft: PostingDraft, photos: Vec<Photo>) -> Result<Posting> {
        self.repository
            .publish(draft, self.profile.id, photos, None)
            .await
    }

    /// Submits a previously saved draft; the draft is replaced by the
    /// server's posting.
    pub async fn submit_draft(
        &mut self,
        id: impl Into<LookupId>,
        photos: Vec<Photo>,
    ) -> Result<Posting> {
        self.repository
            .submit_draft(id, self.profile.id, photos)
            .await
    }

    pub async fn edit(&mut self, id: impl Into<LookupId>, patch: PostingPatch) -> Result<Posting> {
        self.repository.update_posting_on_server(id, patch).await
    }

    pub async fn mark_sold(&mut self, id: impl Into<LookupId>) -> Result<Posting> {
        self.repository
            .update_posting_status_on_server(id, Transition::MarkSold)
            .await
    }

    pub async fn relist(&mut self, id: impl Into<LookupId>) -> Result<Posting> {
        self.repository
            .update_posting_status_on_server(id, Transition::Relist)
            .await
    }

    pub async fn remove(&mut self, id: impl Into<LookupId>) -> Result<()> {
        self.repository.delete_posting(id).await
    }

    /// Reloads the seller's postings and reports status changes since the
    /// last refresh.
    pub async fn refresh(&mut self) -> Result<SyncReport> {
        let postings = self
            .repository
            .load_postings_by_seller(self.profile.id)
            .await?;
        let notifications = self.notifier.observe(&postings).await;
        Ok(SyncReport {
            postings,
            notifications,
        })
    }

    /// [`Self::refresh`], abandoned without side effects on the in-memory
    /// collection when `token` fires first.
    pub async fn refresh_until(&mut self, token: &CancellationToken) -> Option<Result<SyncReport>> {
        unless_cancelled(token, self.refresh()).await
    }

    /// Public marketplace view including the seller's own visible postings.
    pub async fn marketplace(&mut self) -> Vec<Posting> {
        self.repository.load_public_postings().await;
        self.repository.marketplace_postings()
    }
}

pub struct AdminDesk<B, S> {
    repository: PostingRepository<B, S>,
}

impl<B, S> AdminDesk<B, S>
where
    B: PostingBackend,
    S: KeyValueStore,
{
    pub fn new(session: &SessionContext, backend: Arc<B>, store: Arc<S>) -> Result<Self> {
        session.require_role(Role::Admin)?;
        Ok(Self {
            repository: PostingRepository::new(backend, store),
        })
    }

    pub async fn pending_queue(&mut self) -> Result<Vec<Posting>> {
        self.repository.load_worklist(Status::Pending).await
    }

    pub fn queue(&self) -> &[Posting] {
        self.repository.worklist()
    }

    pub async fn approve(&mut self, id: impl Into<LookupId>) -> Result<Posting> {
        self.repository
            .update_posting_status_on_server(id, Transition::Approve)
            .await
    }

    pub async fn reject(&mut self, id: impl Into<LookupId>, reason: &str) -> Result<Posting> {
        self.repository
            .update_posting_status_on_server(
                id,
                Transition::Reject {
                    reason: reason.to_string(),
                },
            )
            .await
    }
}

pub struct InspectorDesk<B, S> {
    repository: PostingRepository<B, S>,
}

impl<B, S> InspectorDesk<B, S>
where
    B: PostingBackend,
    S: KeyValueStore,
{
    pub fn new(session: &SessionContext, backend: Arc<B>, store: Arc<S>) -> Result<Self> {
        session.require_role(Role::Inspector)?;
        Ok(Self {
            repository: PostingRepository::new(backend, store),
        })
    }

    pub async fn inspection_queue(&mut self) -> Result<Vec<Posting>> {
        self.repository.load_worklist(Status::AdminApproved).await
    }

    pub fn queue(&self) -> &[Posting] {
        self.repository.worklist()
    }

    pub async fn submit_result(
        &mut self,
        id: impl Into<LookupId>,
        report: InspectionReport,
    ) -> Result<Posting> {
        self.repository.submit_inspection(id, report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{FlexNumber, InspectionResult, OverallCondition, RawPostRow, SellerId};
    use crate::storage::MemoryStore;
    use crate::traits::MockPostingBackend;

    fn session(role: Role) -> SessionContext {
        SessionContext::signed_in(
            UserProfile {
                id: SellerId(42),
                email: "someone@example.com".into(),
                full_name: None,
            },
            role,
            None,
        )
    }

    fn approved_row() -> RawPostRow {
        RawPostRow {
            post_id: Some(FlexNumber::Int(9)),
            bicycle_name: Some("Giant TCR".into()),
            post_status: Some("ADMIN_APPROVED".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_desks_check_roles() {
        let backend = Arc::new(MockPostingBackend::new());
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            AdminDesk::new(&session(Role::Member), Arc::clone(&backend), Arc::clone(&store)),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            InspectorDesk::new(&session(Role::Admin), Arc::clone(&backend), Arc::clone(&store)),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            SellerDesk::new(&SessionContext::anonymous(), backend, store),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_inspection_rejects_with_notes() {
        let mut backend = MockPostingBackend::new();
        backend
            .expect_list_by_status()
            .returning(|_| Ok(vec![approved_row()]));
        backend
            .expect_update_posting_status()
            .withf(|id, change| {
                *id == 9
                    && change.target() == Status::Rejected
                    && change.inspection.as_ref().map(|r| r.result) == Some(InspectionResult::Fail)
            })
            .times(1)
            .returning(|_, _| Ok(RawPostRow::default()));
        let mut desk = InspectorDesk::new(
            &session(Role::Inspector),
            Arc::new(backend),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();

        assert_eq!(desk.inspection_queue().await.unwrap().len(), 1);
        let rejected = desk
            .submit_result(
                "9",
                InspectionReport {
                    result: InspectionResult::Fail,
                    overall_condition: OverallCondition::Poor,
                    notes: "Cracked chainstay".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(rejected.status, Status::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Cracked chainstay"));
        assert!(desk.queue().is_empty());
    }

    #[tokio::test]
    async fn test_failed_inspection_needs_notes() {
        let mut backend = MockPostingBackend::new();
        backend
            .expect_list_by_status()
            .returning(|_| Ok(vec![approved_row()]));
        backend.expect_update_posting_status().never();
        let mut desk = InspectorDesk::new(
            &session(Role::Inspector),
            Arc::new(backend),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        desk.inspection_queue().await.unwrap();

        let err = desk
            .submit_result(
                9,
                InspectionReport {
                    result: InspectionResult::Fail,
                    overall_condition: OverallCondition::Fair,
                    notes: "  ".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
