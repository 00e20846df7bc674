//! Cancel-on-first-error join over concurrent tasks.

use crate::{Result, cancel::CancelToken};
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::debug;

/// Drive `tasks` concurrently until all succeed or one fails.
///
/// The first error cancels `cancel`, drops every task still pending and is
/// returned. Errors from other tasks are never observed.
pub async fn join_first_error<F>(tasks: impl IntoIterator<Item = F>, cancel: &CancelToken) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let mut pending: FuturesUnordered<F> = tasks.into_iter().collect();

    while let Some(result) = pending.next().await {
        if let Err(err) = result {
            cancel.cancel();
            if !pending.is_empty() {
                debug!("Cancelling {} pending tasks after failure: {}", pending.len(), err);
            }
            return Err(err);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[test]
    fn test_all_succeed() {
        smol::block_on(async {
            let counter = Arc::new(AtomicUsize::new(0));
            let cancel = CancelToken::new();

            let tasks = (0..3).map(|_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });

            join_first_error(tasks, &cancel).await.unwrap();
            assert_eq!(counter.load(Ordering::SeqCst), 3);
            assert!(!cancel.is_cancelled());
        });
    }

    #[test]
    fn test_first_error_short_circuits() {
        smol::block_on(async {
            let cancel = CancelToken::new();

            let slow: BoxFuture<'static, Result<()>> = async {
                smol::Timer::after(Duration::from_secs(30)).await;
                Ok(())
            }
            .boxed();
            let failing: BoxFuture<'static, Result<()>> =
                async { Err(Error::readiness("b", "unhealthy")) }.boxed();

            let start = Instant::now();
            let err = join_first_error(vec![slow, failing], &cancel).await.unwrap_err();

            assert!(start.elapsed() < Duration::from_secs(5));
            assert!(cancel.is_cancelled());
            match err {
                Error::Readiness { service, .. } => assert_eq!(service, "b"),
                other => panic!("Expected readiness error, got {:?}", other),
            }
        });
    }
}
