//! Purpose: Wire transport, interceptors, session store, and endpoint groups together.
//! Exports: `StorefrontClient`.
//! Role: Entry point for library consumers and the CLI.
//! Invariants: Every request passes through log, bearer, and 403-eviction interceptors.
//! Invariants: `login` writes the session only after a successful sign-in.
#![allow(clippy::result_large_err)]

use super::auth::{AuthApi, LoginRequest};
use super::cart::CartApi;
use super::catalog::{CatalogApi, HomeListing, ProductDetails};
use super::envelope::Envelope;
use crate::config::ClientConfig;
use crate::core::error::Error;
use crate::core::interceptor::{BearerAuth, ForbiddenEviction, InterceptedTransport, RequestLog};
use crate::core::pipeline::{Pipeline, Resource};
use crate::core::prefs::RecentlyViewed;
use crate::core::session::{Area, Gate, SessionIdentity, SessionStore, gate};
use crate::core::state::Failure;
use crate::core::storage::{EncryptedFileStorage, KeyValueStorage, PlainFileStorage};
use crate::core::transport::{HttpTransport, Transport};
use std::sync::Arc;

#[derive(Clone)]
pub struct StorefrontClient {
    session: SessionStore,
    recent: RecentlyViewed,
    pipeline: Pipeline,
}

impl StorefrontClient {
    /// Wraps `transport` with the standard interceptor chain.
    pub fn new(
        transport: impl Transport + 'static,
        secure: Arc<dyn KeyValueStorage>,
        prefs: Arc<dyn KeyValueStorage>,
    ) -> Self {
        let session = SessionStore::new(secure);
        let transport = InterceptedTransport::new(transport)
            .with(RequestLog)
            .with(BearerAuth::new(session.clone()))
            .with(ForbiddenEviction::new(session.clone()));
        Self {
            session,
            recent: RecentlyViewed::new(prefs),
            pipeline: Pipeline::new(Arc::new(transport)),
        }
    }

    /// HTTP transport plus on-disk storage under the configured data dir.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        let mut transport =
            HttpTransport::new(config.base_url.clone())?.with_timeout(config.timeout);
        if let Some(ca) = &config.tls_ca {
            transport = transport.with_tls_ca_file(ca)?;
        }
        let secure = EncryptedFileStorage::open(config.secure_dir())?;
        let prefs = PlainFileStorage::open(config.prefs_dir())?;
        tracing::debug!(base_url = %transport.base_url(), dir = %config.data_dir.display(), "client ready");
        Ok(Self::new(transport, Arc::new(secure), Arc::new(prefs)))
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn recently_viewed(&self) -> &RecentlyViewed {
        &self.recent
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.pipeline.clone())
    }

    pub fn catalog(&self) -> CatalogApi {
        CatalogApi::new(self.pipeline.clone())
    }

    pub fn cart(&self) -> CartApi {
        CartApi::new(self.pipeline.clone())
    }

    /// Signs in and stores the returned identity; failures leave the session untouched.
    pub async fn login(&self, request: &LoginRequest) -> Result<SessionIdentity, Failure> {
        let outcome = self.auth().sign_in(request).outcome().await;
        self.finish_sign_in(outcome).map(|envelope| envelope.data)
    }

    /// Applies a terminal sign-in result to the session store. Callers that
    /// drive `auth().sign_in(..).states()` themselves route the result here.
    pub fn finish_sign_in(
        &self,
        outcome: Result<Envelope<SessionIdentity>, Failure>,
    ) -> Result<Envelope<SessionIdentity>, Failure> {
        let envelope = outcome?;
        self.session
            .set_identity(envelope.data.clone())
            .map_err(|err| Failure::local(&err))?;
        Ok(envelope)
    }

    pub fn logout(&self) -> Result<(), Error> {
        self.session.clear_identity()
    }

    pub fn gate(&self, area: Area) -> Gate {
        gate(self.session.current_identity().as_ref(), area)
    }

    /// Home listing personalized with the recently viewed ids.
    pub fn home(&self) -> Resource<Envelope<HomeListing>> {
        let recent_view = self.recent.as_query().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring unreadable recently viewed list");
            String::new()
        });
        self.catalog().home_listing(&recent_view)
    }

    /// Product details; the id is recorded as recently viewed only once the
    /// details actually load.
    pub async fn view_product(
        &self,
        product_id: &str,
    ) -> Result<Envelope<ProductDetails>, Failure> {
        let outcome = self.catalog().product(product_id).outcome().await;
        self.finish_view(product_id, outcome)
    }

    /// Records `product_id` as recently viewed when `outcome` succeeded.
    pub fn finish_view<T>(
        &self,
        product_id: &str,
        outcome: Result<T, Failure>,
    ) -> Result<T, Failure> {
        if outcome.is_ok() {
            if let Err(err) = self.recent.record(product_id) {
                tracing::warn!(error = %err, "failed to record recently viewed product");
            }
        }
        outcome
    }
}

impl std::fmt::Debug for StorefrontClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontClient")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
