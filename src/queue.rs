use std::collections::VecDeque;

use anyhow::anyhow;
use tokio::sync::{Mutex, Notify, oneshot};

use crate::ranking::RankingSummary;

pub type RankReply = Result<RankingSummary, String>;

/// A request for a full ranking pass
pub struct RankRequest {
    /// User whose acceptance caused the request, for logging only
    pub user_id: Option<i64>,
    pub responder: Option<oneshot::Sender<RankReply>>,
}

/// Hands ranking passes to the single ranking worker.
///
/// Requests that pile up while a pass is running are served by one
/// following pass.
pub struct RankingQueue {
    queue: Mutex<VecDeque<RankRequest>>,
    notify: Notify,
}

impl RankingQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub async fn push(&self, request: RankRequest) {
        self.queue.lock().await.push_back(request);
        self.notify.notify_one();
    }

    /// Waits for at least one request and takes every pending one
    pub async fn pop_all(&self) -> Vec<RankRequest> {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if !queue.is_empty() {
                    return queue.drain(..).collect();
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }

    /// Fire-and-forget
    pub async fn request(&self, user_id: Option<i64>) {
        self.push(RankRequest {
            user_id,
            responder: None,
        })
        .await;
    }

    /// Waits until a pass that started after this call has finished
    pub async fn request_blocking(&self, user_id: Option<i64>) -> anyhow::Result<RankingSummary> {
        let (tx, rx) = oneshot::channel();
        self.push(RankRequest {
            user_id,
            responder: Some(tx),
        })
        .await;

        rx.await
            .map_err(|e| anyhow!("Ranking worker dropped the request: {e}"))?
            .map_err(|e| anyhow!(e))
    }
}

impl Default for RankingQueue {
    fn default() -> Self {
        Self::new()
    }
}
