//! The `hawk-interceptor` crate signs outgoing HTTP requests with
//! [Hawk](https://github.com/hueniverse/hawk) `Authorization` headers, as one stage of a
//! client-side request chain.
//!
//! The MAC computation is done by the [`hawk`](https://docs.rs/hawk) crate.  This crate validates
//! the configuration, decides each request's method, hands the request to the signer, and writes
//! the resulting header.  It can also keep the clock used for Hawk timestamps in sync with an
//! SNTP server, since Hawk servers reject requests whose timestamp is too far off.
//!
//! # Examples
//!
//! ## Signing requests in a chain
//!
//! An [`Interceptor`] is initialized once, with an [`InterceptorConfig`], and then called for each
//! request with the config `init` returned.
//!
//! ```
//! use hawk_interceptor::{HawkInterceptor, Interceptor, InterceptorConfig, OutgoingRequest};
//!
//! let interceptor = HawkInterceptor::default();
//! let config: InterceptorConfig = r#"{
//!     "credentials": {"id": "abc", "key": "secret", "algorithm": "sha256"},
//!     "ext": "app-specific-data"
//! }"#.parse().unwrap();
//! let config = interceptor.init(config).unwrap();
//!
//! // no method and no entity, so this is signed as a GET
//! let request = OutgoingRequest::new("https://api.example.com/api/items");
//! let request = interceptor.request(request, &config).unwrap();
//!
//! let header = request.get_header("Authorization").unwrap();
//! assert!(header.starts_with("Hawk id=\"abc\", ts=\""));
//! assert!(header.contains("ext=\"app-specific-data\""));
//! ```
//!
//! ## Clock synchronization
//!
//! With the nested config shape, `sntp` enables synchronization of the clock that supplies
//! timestamps.  The job runs in the background until the [`ClockSync`] is stopped:
//!
//! ```no_run
//! use hawk_interceptor::{ClockSync, HawkInterceptor, Interceptor, InterceptorConfig};
//! use std::sync::Arc;
//!
//! let clock = Arc::new(ClockSync::new());
//! let interceptor = HawkInterceptor::new(clock.clone());
//! let config: InterceptorConfig = r#"{
//!     "hawk": {"credentials": {"id": "abc", "key": "secret", "algorithm": "sha256"}},
//!     "sntp": {"host": "nist1-sj.ustiming.org", "timeout": 1000},
//!     "logLevel": "INFO"
//! }"#.parse().unwrap();
//! let config = interceptor.init(config).unwrap();
//!
//! // ... at shutdown
//! clock.stop();
//! ```
//!
//! ## Signing `http` requests
//!
//! ```
//! use hawk_interceptor::{
//!     ClockSync, Credentials, FlatConfig, HawkInterceptor, HawkSigner, Interceptor, SignRequest,
//! };
//!
//! let config = HawkInterceptor::default()
//!     .init(FlatConfig::new(Credentials::new("abc", "secret", "sha256")).into())
//!     .unwrap();
//! let signer = HawkSigner::new(ClockSync::global().clone());
//!
//! let mut request = http::Request::builder()
//!     .method("POST")
//!     .uri("http://localhost:8000/resource")
//!     .body(())
//!     .unwrap();
//! request.sign_hawk(&signer, &config).unwrap();
//! assert!(request.headers().contains_key(http::header::AUTHORIZATION));
//! ```

mod clock;
mod config;
mod error;
mod interceptor;
mod request;
mod sign;
mod signer;

pub use crate::clock::{ClockSync, Sntp, TimeSource};
pub use crate::config::{
    Credentials, FlatConfig, HawkConfig, InterceptorConfig, NestedConfig, SigningConfig,
    SigningOptions, SntpConfig, SntpOptions,
};
pub use crate::error::*;
pub use crate::interceptor::{HawkInterceptor, Interceptor};
pub use crate::request::{OutgoingRequest, AUTHORIZATION};
pub use crate::sign::SignRequest;
pub use crate::signer::{HawkSigner, Sign, SignedHeader};
