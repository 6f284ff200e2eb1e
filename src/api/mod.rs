//! Purpose: Define the public Rust API boundary for the storefront client.
//! Exports: Client wiring, endpoint groups, DTOs, and the core state/session types.
//! Role: Public, additive-only surface; hides transport and storage internals.
//! Invariants: Consumers react to `ResourceState`/`Failure`, never to raw status codes.
//! Invariants: Session mutations go through `SessionStore` only.

mod auth;
mod cart;
mod catalog;
mod client;
mod envelope;
mod validation;

pub use crate::config::{ClientConfig, ConfigOverrides};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::latest::{LatestQuery, QueryState};
pub use crate::core::pipeline::{Pipeline, Resource};
pub use crate::core::prefs::RecentlyViewed;
pub use crate::core::session::{Area, Gate, SessionIdentity, SessionStore, gate};
pub use crate::core::state::{Failure, FailureKind, ResourceState};
pub use crate::core::storage::{
    EncryptedFileStorage, KeyValueStorage, MemoryStorage, PlainFileStorage,
};
pub use crate::core::transport::{ApiRequest, HttpTransport, Method, RawResponse, Transport};
pub use auth::{
    AuthApi, CodeResetRequest, LoginRequest, RegisterData, RegisterRequest,
    RequestCodeResetRequest,
};
pub use cart::{
    AddToCartRequest, Cart, CartAction, CartApi, CartData, CartItem, Order, OrderData,
    PopulatedCart, PopulatedCartItem, PopulatedOrder, RateProductRequest,
};
pub use catalog::{
    CatalogApi, Categories, CategoryData, CategoryProducts, DiscountType, HomeListing,
    ProductDetails, ProductSummary, PublicUser, Rating, RelatedFilter,
};
pub use client::StorefrontClient;
pub use envelope::{Envelope, NoData};
pub use validation::normalize_username;
