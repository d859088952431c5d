//! Request and Response models
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{CreatePostRequest, ListQuery};
pub use responses::{
    CreatedResponse, ErrorResponse, HealthResponse, MessageResponse, PostListing, StatsResponse,
};
