use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Runs `operation` unless `token` is cancelled first.
///
/// A cancelled operation is dropped at its current suspension point, so a
/// fetch whose caller went away never applies its result.
pub async fn unless_cancelled<F, T>(token: &CancellationToken, operation: F) -> Option<T>
where
    F: Future<Output = T>,
{
    if token.is_cancelled() {
        return None;
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = operation => Some(output),
    }
}
