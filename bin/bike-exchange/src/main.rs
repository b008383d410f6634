//! # bike-exchange Binary
//!
//! Assembles the client from configuration, syncs the configured seller's
//! postings (reporting status changes since the last run) and prints the
//! public marketplace.

use std::sync::Arc;

use bx_backend_http::HttpBackend;
use bx_core::{
    Posting, PostingRepository, Role, SellerDesk, SellerId, SessionContext, Tone, UserProfile,
};
use configs::Settings;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "cache-fs")]
use bx_cache_fs::FileStore;

#[cfg(not(feature = "cache-fs"))]
use bx_core::MemoryStore;

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_postings(title: &str, postings: &[Posting]) {
    println!("{title} ({})", postings.len());
    for posting in postings {
        println!(
            "  {:<16} {:<15} {:<14} {}",
            posting.posting_code,
            posting.status.label(),
            posting.price_display,
            posting.name
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(settings.log.json);

    let session = match settings.sync.seller_id {
        Some(id) => SessionContext::signed_in(
            UserProfile {
                id: SellerId(id),
                email: String::new(),
                full_name: None,
            },
            Role::Member,
            settings.api.token.clone(),
        ),
        None => SessionContext {
            token: settings.api.token.clone(),
            ..SessionContext::anonymous()
        },
    };

    // 1. Initialize Backend Implementation
    let backend = Arc::new(HttpBackend::new(
        &settings.api.base_url,
        settings.timeout(),
        &session,
    )?);

    // 2. Initialize Cache Implementation
    #[cfg(feature = "cache-fs")]
    let store = Arc::new(FileStore::new(&settings.cache.dir));

    #[cfg(not(feature = "cache-fs"))]
    let store = Arc::new(MemoryStore::new());

    tracing::info!(backend = %backend.base_url(), "bike-exchange starting");

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    // 3. Seller sync (only with a configured seller)
    let marketplace = if session.user.is_some() {
        let mut desk = SellerDesk::new(&session, Arc::clone(&backend), Arc::clone(&store))?;
        match desk.refresh_until(&shutdown).await {
            None => {
                tracing::info!("Interrupted before the seller sync finished");
                return Ok(());
            }
            Some(Err(err)) => {
                tracing::error!(error = %err, "Seller sync failed");
                return Err(err.into());
            }
            Some(Ok(report)) => {
                for notification in &report.notifications {
                    match notification.tone {
                        Tone::Warning => tracing::warn!(posting_id = %notification.posting_id, "{}: {}", notification.title, notification.message),
                        _ => tracing::info!(posting_id = %notification.posting_id, "{}: {}", notification.title, notification.message),
                    }
                }
                print_postings("My postings", &report.postings);
            }
        }
        desk.marketplace().await
    } else {
        let mut repository = PostingRepository::new(Arc::clone(&backend), store);
        repository.load_public_postings().await
    };

    print_postings("Marketplace", &marketplace);
    Ok(())
}
