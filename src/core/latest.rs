//! Purpose: Collect-latest holder folding resource states into one observable value.
//! Exports: `LatestQuery`, `QueryState`.
//! Role: Per-view state container; a new launch supersedes the previous one.
//! Invariants: Only the most recent launch may write into the shared state.
//! Invariants: Superseded or cancelled launches stop being observed; their late results are dropped.

use crate::core::pipeline::Resource;
use crate::core::state::{Failure, ResourceState};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Clone, Debug, PartialEq)]
pub struct QueryState<T> {
    pub is_loading: bool,
    pub data: Option<T>,
    pub error: Option<Failure>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            is_loading: false,
            data: None,
            error: None,
        }
    }
}

impl<T> QueryState<T> {
    pub fn apply(&mut self, state: ResourceState<T>) {
        match state {
            ResourceState::Idle => *self = Self::default(),
            ResourceState::Loading => self.is_loading = true,
            ResourceState::Success(data) => {
                self.is_loading = false;
                self.data = Some(data);
                self.error = None;
            }
            ResourceState::Failure(failure) => {
                self.is_loading = false;
                self.error = Some(failure);
            }
        }
    }
}

pub struct LatestQuery<T> {
    cell: Arc<watch::Sender<QueryState<T>>>,
    generation: Arc<AtomicU64>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Default for LatestQuery<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestQuery<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (cell, _) = watch::channel(QueryState::default());
        Self {
            cell: Arc::new(cell),
            generation: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
        }
    }

    /// Starts observing `resource`, cancelling whatever launch came before.
    /// Must be called from within a tokio runtime.
    pub fn launch(&self, resource: Resource<T>) {
        // Generation bump, spawn, and handle swap happen under one lock so the
        // newest generation always owns the stored handle.
        let mut slot = self.lock_current();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cell = self.cell.clone();
        let latest = self.generation.clone();
        let handle = tokio::spawn(async move {
            let mut states = Box::pin(resource.states());
            while let Some(state) = states.next().await {
                let current = cell.send_if_modified(|query| {
                    if latest.load(Ordering::SeqCst) != generation {
                        return false;
                    }
                    query.apply(state);
                    true
                });
                if !current {
                    tracing::debug!(generation, "superseded launch stopped");
                    break;
                }
            }
        });
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Stops observing the in-flight launch; state keeps its last value.
    pub fn cancel(&self) {
        let mut slot = self.lock_current();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        self.cell.send_if_modified(|query| {
            let was_loading = query.is_loading;
            query.is_loading = false;
            was_loading
        });
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.current
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.cell.subscribe()
    }

    pub fn snapshot(&self) -> QueryState<T> {
        self.cell.borrow().clone()
    }
}

impl<T> Drop for LatestQuery<T> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.current.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::pipeline::Pipeline;
    use crate::core::state::{FailureKind, MSG_NOT_FOUND};
    use crate::core::transport::{ApiRequest, RawResponse, Transport};
    use std::time::Duration;

    /// Answers `/slow/<label>` after a delay and `/fast/<label>` at once.
    struct Delayed;

    impl Transport for Delayed {
        fn execute(&self, request: &ApiRequest) -> Result<RawResponse, Error> {
            let label = request.segments.last().cloned().unwrap_or_default();
            match request.segments.first().map(String::as_str) {
                Some("slow") => std::thread::sleep(Duration::from_millis(300)),
                Some("missing") => return Ok(RawResponse::new(404, "")),
                _ => {}
            }
            Ok(RawResponse::new(200, format!("\"{label}\"")))
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Arc::new(Delayed))
    }

    #[test]
    fn fold_rules() {
        let mut query = QueryState::default();
        query.apply(ResourceState::Loading);
        assert!(query.is_loading);
        query.apply(ResourceState::Success(1u8));
        assert_eq!(query.data, Some(1));
        assert!(!query.is_loading);
        query.apply(ResourceState::Failure(Failure::new(
            FailureKind::NotFound,
            MSG_NOT_FOUND,
        )));
        assert_eq!(query.data, Some(1));
        assert!(query.error.is_some());
        query.apply(ResourceState::Success(2u8));
        assert_eq!(query.error, None);
        query.apply(ResourceState::Idle);
        assert_eq!(query, QueryState::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn later_launch_supersedes_earlier() {
        let query = LatestQuery::<String>::new();
        let mut rx = query.subscribe();
        let pipeline = pipeline();

        query.launch(pipeline.resource(ApiRequest::patch(&["slow", "first"])));
        query.launch(pipeline.resource(ApiRequest::patch(&["fast", "second"])));

        let settled = rx
            .wait_for(|state| state.data.is_some())
            .await
            .expect("sender alive")
            .clone();
        assert_eq!(settled.data.as_deref(), Some("second"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(query.snapshot().data.as_deref(), Some("second"));
        assert!(!query.snapshot().is_loading);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failure_after_success_is_observed() {
        let query = LatestQuery::<String>::new();
        let mut rx = query.subscribe();
        let pipeline = pipeline();

        query.launch(pipeline.resource(ApiRequest::get(&["fast", "cart"])));
        rx.wait_for(|state| state.data.is_some())
            .await
            .expect("sender alive");

        // Each launch starts from Idle, so the earlier data is reset first.
        query.launch(pipeline.resource(ApiRequest::get(&["missing", "cart"])));
        let failed = rx
            .wait_for(|state| state.error.is_some())
            .await
            .expect("sender alive")
            .clone();
        assert_eq!(
            failed.error.map(|failure| failure.kind()),
            Some(FailureKind::NotFound)
        );
        assert!(!failed.is_loading);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_drops_late_result() {
        let query = LatestQuery::<String>::new();
        query.launch(pipeline().resource(ApiRequest::get(&["slow", "orders"])));
        tokio::time::sleep(Duration::from_millis(50)).await;
        query.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let state = query.snapshot();
        assert_eq!(state.data, None);
        assert!(!state.is_loading);
    }

    #[test]
    fn concurrent_launches_always_settle() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime");
        let pipeline = pipeline();
        for round in 0..300 {
            let query = Arc::new(LatestQuery::<String>::new());
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let launchers: Vec<_> = ["left", "right"]
                .into_iter()
                .map(|label| {
                    let query = query.clone();
                    let barrier = barrier.clone();
                    let resource = pipeline.resource(ApiRequest::get(&["fast", label]));
                    let handle = runtime.handle().clone();
                    std::thread::spawn(move || {
                        let _entered = handle.enter();
                        barrier.wait();
                        query.launch(resource);
                    })
                })
                .collect();
            for launcher in launchers {
                launcher.join().expect("launcher thread");
            }
            let mut rx = query.subscribe();
            let settled = runtime.block_on(async {
                tokio::time::timeout(
                    Duration::from_secs(2),
                    rx.wait_for(|state| state.data.is_some() || state.error.is_some()),
                )
                .await
                .map(|state| state.is_ok())
                .unwrap_or(false)
            });
            assert!(settled, "round {round} never reached a terminal state");
        }
    }
}
