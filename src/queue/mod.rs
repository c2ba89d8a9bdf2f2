//! Rate-limited request dispatch.
//!
//! Every upstream service gets exactly one [`RequestQueue`]. The queue owns the
//! shared HTTP client for that host, a bounded backlog and a single worker
//! task that waits on a token bucket before each dispatch, so any number of
//! concurrent callers turn into one rate-shaped stream of requests.

use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Jobs waiting for the limiter beyond this many make `enqueue` wait.
pub const BACKLOG_CAPACITY: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type Limiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

type Job = Box<dyn FnOnce(reqwest::Client) -> BoxFuture<'static, Result<QueuedResponse>> + Send>;

struct QueuedJob {
    job: Job,
    done: oneshot::Sender<Result<QueuedResponse>>,
}

/// Status and raw body of a dispatched request.
#[derive(Debug, Clone)]
pub struct QueuedResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl QueuedResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn error_for_status(self, service: &'static str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Status {
                service,
                status: self.status,
            })
        }
    }
}

/// Resolves to the result of one queued job.
///
/// If the queue goes away before the job runs, the handle resolves to
/// [`Error::Cancelled`] instead of hanging.
pub struct JobHandle {
    receiver: oneshot::Receiver<Result<QueuedResponse>>,
}

impl Future for JobHandle {
    type Output = Result<QueuedResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Cancelled)))
    }
}

pub struct RequestQueue {
    client: reqwest::Client,
    sender: mpsc::Sender<QueuedJob>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RequestQueue {
    /// Create a queue allowing `rate` requests per second with bursts of
    /// `burst`. Values below 1 are raised to 1.
    ///
    /// Must be called from within a Tokio runtime: the worker is spawned
    /// immediately.
    pub fn new(rate: u32, burst: u32) -> Self {
        let client = client_or_default(
            reqwest::Client::builder().timeout(REQUEST_TIMEOUT),
            "request queue",
        );
        Self::with_client(client, rate, burst)
    }

    pub fn with_client(client: reqwest::Client, rate: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(rate).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(rate).allow_burst(burst));

        let (sender, receiver) = mpsc::channel(BACKLOG_CAPACITY);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(
            receiver,
            client.clone(),
            limiter,
            cancel.clone(),
        ));

        Self {
            client,
            sender,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// The shared client jobs are dispatched with. Use it to build requests.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Submit a job. Waits only while the backlog is full.
    pub async fn enqueue<F, Fut>(&self, job: F) -> JobHandle
    where
        F: FnOnce(reqwest::Client) -> Fut + Send + 'static,
        Fut: Future<Output = Result<QueuedResponse>> + Send + 'static,
    {
        let (done, receiver) = oneshot::channel();
        let handle = JobHandle { receiver };

        if self.cancel.is_cancelled() {
            let _ = done.send(Err(Error::Cancelled));
            return handle;
        }

        let queued = QueuedJob {
            job: Box::new(move |client| job(client).boxed()),
            done,
        };

        // A shutdown while we wait for backlog space drops `queued`, which
        // resolves the handle as cancelled.
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            sent = self.sender.send(queued) => {
                if let Err(mpsc::error::SendError(rejected)) = sent {
                    let _ = rejected.done.send(Err(Error::Cancelled));
                }
            }
        }

        handle
    }

    /// Send a prepared request through the queue and collect status and body.
    /// Non-2xx statuses are returned as-is; callers decide what they mean.
    pub async fn execute(
        &self,
        request: reqwest::Request,
        service: &'static str,
    ) -> Result<QueuedResponse> {
        let handle = self
            .enqueue(move |client| async move {
                let response = client
                    .execute(request)
                    .await
                    .map_err(|e| Error::http(service, e))?;
                let status = response.status();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| Error::http(service, e))?;
                Ok(QueuedResponse {
                    status,
                    body: body.to_vec(),
                })
            })
            .await;
        handle.await
    }

    /// Stop accepting work and wait for the worker to exit. The job in flight
    /// finishes; everything still queued resolves to [`Error::Cancelled`].
    ///
    /// Safe to call repeatedly and concurrently; every call returns after the
    /// worker is gone.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.take() {
            if let Err(e) = handle.await {
                tracing::error!("Request queue worker exited abnormally: {}", e);
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Build `builder`, falling back to reqwest's defaults (no timeout) on failure.
pub(crate) fn client_or_default(builder: reqwest::ClientBuilder, label: &str) -> reqwest::Client {
    builder.build().unwrap_or_else(|e| {
        tracing::warn!("Failed to build {} HTTP client, using defaults: {}", label, e);
        reqwest::Client::default()
    })
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<QueuedJob>,
    client: reqwest::Client,
    limiter: Limiter,
    cancel: CancellationToken,
) {
    loop {
        let queued = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = receiver.recv() => match next {
                Some(queued) => queued,
                None => break,
            },
        };

        if queued.done.is_closed() {
            tracing::debug!("Skipping queued request abandoned by its caller");
            continue;
        }

        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = limiter.until_ready() => true,
        };
        if !ready {
            let _ = queued.done.send(Err(Error::Cancelled));
            break;
        }

        let QueuedJob { job, done } = queued;
        let client = client.clone();

        // Jobs run in their own task so a panic unwinds there, not here.
        let result = match tokio::spawn(async move { job(client).await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                tracing::error!("Queued request job panicked");
                Err(Error::JobPanicked)
            }
            Err(_) => Err(Error::Cancelled),
        };

        let _ = done.send(result);
    }

    receiver.close();
    let mut cancelled = 0usize;
    while let Some(pending) = receiver.recv().await {
        let _ = pending.done.send(Err(Error::Cancelled));
        cancelled += 1;
    }

    if cancelled > 0 {
        tracing::debug!("Cancelled {} queued requests at shutdown", cancelled);
    }
}
