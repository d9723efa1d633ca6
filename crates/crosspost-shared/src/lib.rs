//! # Crosspost Shared
//!
//! Request/response types shared between the API server and its clients.
//! Dashboard and CLI consumers deserialize exactly these shapes.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
