//! Purpose: Cold, single-shot resource pipeline over a blocking `Transport`.
//! Exports: `Pipeline`, `Resource`, `decode_response`.
//! Role: The one place where transport outcomes become `ResourceState` values.
//! Invariants: Nothing touches the network until the state stream is polled past `Loading`.
//! Invariants: Each invocation performs exactly one round trip and yields exactly one terminal state.
//! Invariants: No `Error` escapes; every failure path becomes a `Failure`.
#![allow(clippy::result_large_err)]

use crate::core::classify::classify_status;
use crate::core::error::Error;
use crate::core::state::{Failure, FailureKind, MSG_GENERIC, ResourceState};
use crate::core::transport::{ApiRequest, RawResponse, Transport};
use futures_util::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Clone)]
pub struct Pipeline {
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn resource<T>(&self, request: ApiRequest) -> Resource<T> {
        self.try_resource(Ok(request))
    }

    /// Builds a resource from a request that may have failed to construct;
    /// the construction error surfaces as the terminal `Failure`.
    pub fn try_resource<T>(&self, request: Result<ApiRequest, Error>) -> Resource<T> {
        Resource {
            transport: self.transport.clone(),
            request,
            payload: PhantomData,
        }
    }
}

/// One invocation of a remote operation; consumed by `states` or `outcome`.
pub struct Resource<T> {
    transport: Arc<dyn Transport>,
    request: Result<ApiRequest, Error>,
    payload: PhantomData<fn() -> T>,
}

impl<T> Resource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub fn path(&self) -> Option<String> {
        self.request.as_ref().ok().map(ApiRequest::path)
    }

    /// `Idle`, `Loading`, then one terminal state.
    pub fn states(self) -> impl Stream<Item = ResourceState<T>> + Send + 'static {
        stream::iter([ResourceState::Idle, ResourceState::Loading])
            .chain(stream::once(async move { ResourceState::from(self.outcome().await) }))
    }

    pub async fn outcome(self) -> Result<T, Failure> {
        let request = self.request.map_err(|err| Failure::transport(&err))?;
        let transport = self.transport;
        let path = request.path();
        let joined = tokio::task::spawn_blocking(move || transport.execute(&request)).await;
        let response = match joined {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::debug!(%path, error = %err, "transport error");
                return Err(Failure::transport(&err));
            }
            Err(join_err) => {
                tracing::warn!(%path, error = %join_err, "request task did not complete");
                return Err(Failure::new(FailureKind::Transport, join_err.to_string()));
            }
        };
        decode_response(&response).inspect_err(|failure| {
            tracing::debug!(%path, status = response.status, kind = ?failure.kind(), "request failed");
        })
    }
}

/// 2xx bodies must decode into `T`; everything else is classified by status.
pub fn decode_response<T: DeserializeOwned>(response: &RawResponse) -> Result<T, Failure> {
    if !response.is_success() {
        return Err(classify_status(response.status, &response.body));
    }
    serde_json::from_str(&response.body).map_err(|err| {
        tracing::warn!(status = response.status, error = %err, "response body did not match payload schema");
        Failure::new(FailureKind::Decode, MSG_GENERIC)
    })
}
