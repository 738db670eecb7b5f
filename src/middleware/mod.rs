// ABOUTME: HTTP middleware for session authentication and request tracing
// ABOUTME: Provides the SessionUser extractor and the request id / trace layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Session cookie authentication and the `SessionUser` extractor
pub mod auth;
/// Request id propagation and per-request tracing spans
pub mod tracing;

// Session authentication
pub use auth::{authenticate_session, SessionUser};

// Request tracing
pub use tracing::{
    create_request_span, propagate_request_id_layer, set_request_id_layer, trace_layer,
    RequestSpan, REQUEST_ID_HEADER,
};
