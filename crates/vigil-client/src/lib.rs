//! vigil-client - HTTP client for the vigil insight server.
//!
//! The client speaks the server's REST API and implements
//! [`InsightSource`](vigil_core::InsightSource), so a
//! [`BubbleSession`](vigil_core::BubbleSession) can poll a remote queue.
//!
//! # Example
//!
//! ```ignore
//! use vigil_client::InsightClient;
//! use vigil_core::{CheckRequest, EngagementLevel, Exchange};
//!
//! let client = InsightClient::new("http://localhost:8080")?;
//! client.ingest_exchange(&Exchange::new("ws", "I'll send the deck tomorrow", "conv-1")).await?;
//!
//! let response = client.check(&CheckRequest::new("ws", 45, EngagementLevel::Idle)).await?;
//! ```

mod client;

pub use client::InsightClient;
