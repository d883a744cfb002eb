//! # Processing Gateway
//!
//! The request-forwarding and validation pipeline that sits between public
//! clients and the downstream audio-enhancement processor.
//!
//! ## Flow for an upload:
//! 1. **validator**: reject empty, oversized, or unsupported files locally
//! 2. **client**: health-gate the processor, then stream the file to `/process`
//! 3. **wire**: translate the processor's snake_case reply into the public shape
//!
//! ## Key Components:
//! - **FileValidator**: Pure metadata checks, no I/O
//! - **ProcessingGateway**: Health check, forward, download proxy
//! - **FileBody**: Single-read byte stream with a size guard
//! - **content_type**: Shared extension → MIME table

pub mod body;          // Streamed upload body with size enforcement
pub mod client;        // ProcessingGateway (outbound HTTP)
pub mod content_type;  // Extension → MIME mapping
pub mod validator;     // FileValidator and IncomingFile
pub mod wire;          // Downstream and public response shapes

pub use body::FileBody;
pub use client::{Cancelled, ProcessingGateway};
pub use content_type::content_type_for;
pub use validator::IncomingFile;
pub use wire::GatewayResponse;
