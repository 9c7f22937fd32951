//! REST API client module for the user administration backend.
//!
//! This module provides the `UserGateway` trait the controllers depend on,
//! and `ApiClient`, its reqwest-based implementation.
//!
//! Authenticated requests carry the session token as a bearer credential;
//! the token itself is obtained through `POST /user/login`.

pub mod client;
pub mod error;
pub mod gateway;

pub use client::ApiClient;
pub use error::ApiError;
pub use gateway::UserGateway;
