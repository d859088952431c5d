//! Admission Module
//!
//! Rate limiting backed by the shared counter store. The gateway mounts a
//! token bucket per client IP; services mount fixed windows on sensitive
//! routes. Both fail closed by default when the store is unreachable.

mod controller;
mod middleware;
mod policy;


pub use controller::{AdmissionController, Decision, DEFAULT_REJECTION};
pub use middleware::{
    client_ip, enforce, peer_addr, AdmissionLayer, RATELIMIT_LIMIT, RATELIMIT_REMAINING,
};
pub use policy::LimitPolicy;
