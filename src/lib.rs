//! Purpose: Storefront client library used by the `storefront` CLI and tests.
//! Exports: `api` (stable surface), `core` (pipeline, session, storage, transport), `config`.
//! Role: Resource-state pipeline and credential lifecycle over the storefront REST API.
//! Invariants: Every remote call surfaces as `ResourceState`; no error escapes uncaught.
//! Invariants: The session store is the only shared mutable state.
pub mod api;
pub mod config;
pub mod core;
