// Test utilities for standing up mock upstream services
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Shared request counter for mock handlers.
#[derive(Clone, Default)]
pub struct HitCounter(Arc<AtomicUsize>);

impl HitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit and return the new total.
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[test]
    fn test_hit_counter() {
        let counter = HitCounter::new();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.hit(), 1);
        assert_eq!(counter.clone().hit(), 2);
        assert_eq!(counter.count(), 2);
    }

    #[tokio::test]
    async fn test_spawn_upstream_serves_router() {
        let base = spawn_upstream(Router::new().route("/ping", get(|| async { "pong" }))).await;
        let body = reqwest::get(format!("{}/ping", base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "pong");
    }
}
