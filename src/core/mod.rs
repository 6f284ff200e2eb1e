// Core modules: transport, resource states, session persistence.
pub mod classify;
pub mod error;
pub mod interceptor;
pub mod latest;
pub mod pipeline;
pub mod prefs;
pub mod session;
pub mod state;
pub mod storage;
pub mod transport;
