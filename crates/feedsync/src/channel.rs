//! Sales channel gateway.
//!
//! The [`ChannelAdapter`] trait is the one seam between the reconciliation
//! engine and a concrete channel (auction marketplace, B2B catalog,
//! broadcast list). The engine is generic over it; adapters are
//! independent implementations.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use feedsync::channel::{RateLimitedChannel, RestChannel, rate_limits};
//! use feedsync::http::reqwest_transport::ReqwestTransport;
//!
//! let transport = Arc::new(ReqwestTransport::with_timeout(Duration::from_secs(30))?);
//! let channel = RestChannel::new("b2b", "https://partner.example.com/api", transport);
//! let channel = RateLimitedChannel::new(channel, rate_limits::DEFAULT_RPS);
//! ```

mod errors;
mod rate_limit;
mod rest;
mod types;

pub use errors::{ChannelError, ErrorClass, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, RateLimitedChannel, rate_limits};
pub use rest::RestChannel;
pub use types::{ChannelAdapter, RemoteListingRef, RemoteStatus};
