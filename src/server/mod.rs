//! Gateway server: authentication, capability registry, dispatch and transports.
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod registry;
pub mod runtime;
