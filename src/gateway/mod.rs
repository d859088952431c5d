//! Gateway Module
//!
//! Single entry point for clients: global rate limiting, bearer token
//! verification and path-rewriting proxying to the services.

pub mod credentials;
pub mod proxy;
pub mod routes;

pub use credentials::{bearer_token, CredentialService, StaticCredentials};
pub use proxy::{rewrite_path, GatewayState, MAX_BODY_BYTES};
pub use routes::create_gateway_router;
