use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::queue::RankingQueue;
use crate::ranking;

/// The only task that writes ranks. Each wake-up drains every pending
/// request and answers all of them with the result of one full pass.
pub async fn ranking_worker(
    pool: SqlitePool,
    queue: Arc<RankingQueue>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    log::info!("Ranking worker initialized");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                log::info!("Ranking worker received shutdown signal, stopping");
                break;
            }

            batch = queue.pop_all() => {
                let triggered_by: Vec<i64> = batch.iter().filter_map(|r| r.user_id).collect();
                log::debug!(
                    "Ranking pass for {} request(s), triggered by users {triggered_by:?}",
                    batch.len()
                );

                let result = ranking::recompute_all(&pool).await;
                let reply = match &result {
                    Ok(summary) => {
                        log::info!(
                            "Ranking recomputed: {} ranked, {} unranked",
                            summary.ranked,
                            summary.unranked
                        );
                        Ok(*summary)
                    }
                    Err(e) => {
                        // Accepted verdicts stay as they are; the next pass retries
                        log::error!("Ranking recomputation failed: {e:#}");
                        Err(format!("{e:#}"))
                    }
                };

                for request in batch {
                    if let Some(responder) = request.responder {
                        if responder.send(reply.clone()).is_err() {
                            log::warn!("Failed to send ranking result back to requester");
                        }
                    }
                }
            }
        };
    }

    log::info!("Ranking worker has shut down gracefully");
    Ok(())
}
