use crate::clock::ClockSync;
use crate::config::{InterceptorConfig, SigningConfig};
use crate::error::*;
use crate::request::{OutgoingRequest, AUTHORIZATION};
use crate::signer::{HawkSigner, Sign};
use log::{debug, info, Level};
use std::sync::Arc;

/// A stage in a request chain.  The chain calls `init` once, when it is built, and `request` for
/// every outgoing request, passing the config returned from `init`.
pub trait Interceptor {
    type Config;

    fn init(&self, config: InterceptorConfig) -> Result<Self::Config>;

    fn request(&self, request: OutgoingRequest, config: &Self::Config) -> Result<OutgoingRequest>;
}

/// An interceptor that adds a Hawk `Authorization` header to each request.
///
/// # Examples
///
/// ```
/// use hawk_interceptor::{Credentials, FlatConfig, HawkInterceptor, Interceptor, OutgoingRequest};
///
/// let interceptor = HawkInterceptor::default();
/// let config = interceptor
///     .init(FlatConfig::new(Credentials::new("abc", "secret", "sha256")).into())
///     .unwrap();
///
/// let request = interceptor
///     .request(OutgoingRequest::new("http://localhost:8000/api/items"), &config)
///     .unwrap();
/// assert!(request.get_header("Authorization").unwrap().starts_with("Hawk id=\"abc\""));
/// ```
pub struct HawkInterceptor<S = HawkSigner> {
    signer: S,
    clock: Arc<ClockSync>,
}

impl HawkInterceptor<HawkSigner> {
    /// Create an interceptor that signs with the `hawk` crate, taking timestamps from `clock`.
    pub fn new(clock: Arc<ClockSync>) -> Self {
        HawkInterceptor {
            signer: HawkSigner::new(clock.clone()),
            clock,
        }
    }
}

impl<S: Sign> HawkInterceptor<S> {
    pub fn with_signer(signer: S, clock: Arc<ClockSync>) -> Self {
        HawkInterceptor { signer, clock }
    }

    pub fn clock(&self) -> &Arc<ClockSync> {
        &self.clock
    }
}

impl Default for HawkInterceptor<HawkSigner> {
    /// An interceptor sharing the process-wide [`ClockSync::global`].
    fn default() -> Self {
        HawkInterceptor::new(ClockSync::global().clone())
    }
}

impl<S: Sign> Interceptor for HawkInterceptor<S> {
    type Config = SigningConfig;

    fn init(&self, config: InterceptorConfig) -> Result<SigningConfig> {
        let config = config.normalize()?;

        if let Some(options) = config.sntp().options() {
            let log_offset = config.log_level() >= Level::Info;
            let started = self.clock.start(options, move |offset| {
                if log_offset {
                    info!("sntp offset = {}", offset);
                }
            });
            if started && config.log_level() >= Level::Debug {
                debug!("init(): clock sync started");
            }
        }

        if config.log_level() >= Level::Debug {
            debug!("init() is done - config is valid");
        }
        Ok(config)
    }

    fn request(
        &self,
        mut request: OutgoingRequest,
        config: &SigningConfig,
    ) -> Result<OutgoingRequest> {
        request.headers_mut();
        let header = self
            .signer
            .sign(&request.path, request.effective_method(), config)?;
        request.set_header(AUTHORIZATION, header.field);
        if config.log_level() >= Level::Debug {
            debug!(
                "request(): Authorization : {}",
                request.get_header(AUTHORIZATION).unwrap_or_default()
            );
        }
        Ok(request)
    }
}
