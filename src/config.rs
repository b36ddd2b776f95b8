use crate::error::*;
use log::LevelFilter;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Hawk credentials: an id, the key associated with that id, and the name of the digest
/// algorithm agreed with the server (`sha256`, for example).
///
/// The key is secret material; the `Debug` impl does not print it.
#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Credentials {
    pub id: String,
    pub key: String,
    pub algorithm: String,
}

impl Credentials {
    pub fn new<S1, S2, S3>(id: S1, key: S2, algorithm: S3) -> Credentials
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Credentials {
            id: id.into(),
            key: key.into(),
            algorithm: algorithm.into(),
        }
    }

    fn validate(&self, prefix: &'static str) -> Result<()> {
        let missing = |field| Error::MissingCredential { prefix, field };
        if self.id.is_empty() {
            return Err(missing("id"));
        }
        if self.key.is_empty() {
            return Err(missing("key"));
        }
        if self.algorithm.is_empty() {
            return Err(missing("algorithm"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("key", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// The optional Hawk attributes passed through to the signer with every request.
///
/// Like `hawk::RequestBuilder`, this is built with chained setters:
///
/// ```
/// use hawk_interceptor::SigningOptions;
/// let options = SigningOptions::new()
///     .ext("app-specific-data")
///     .payload("{\"some\":\"payload\"}")
///     .content_type("application/json");
/// assert_eq!(options.ext.as_deref(), Some("app-specific-data"));
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SigningOptions {
    /// Application-specific data sent in the `ext` attribute
    pub ext: Option<String>,
    /// A pre-calculated timestamp, in seconds since the Unix epoch
    pub timestamp: Option<u64>,
    /// A pre-generated nonce
    pub nonce: Option<String>,
    /// Offset applied to the local clock; ignored if `timestamp` is set
    pub localtime_offset_msec: Option<i64>,
    /// Request body used to compute the payload hash; ignored if `hash` is set
    pub payload: Option<String>,
    /// Content type of `payload`
    pub content_type: Option<String>,
    /// Pre-calculated payload hash, base64-encoded.  Non-zero trailing bits in the last symbol
    /// are tolerated; the header carries the canonical encoding.
    pub hash: Option<String>,
    /// Oz application id
    pub app: Option<String>,
    /// Oz delegated-by application id
    pub dlg: Option<String>,
}

impl SigningOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ext<S: Into<String>>(mut self, ext: S) -> Self {
        self.ext = Some(ext.into());
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn nonce<S: Into<String>>(mut self, nonce: S) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn localtime_offset_msec(mut self, offset: i64) -> Self {
        self.localtime_offset_msec = Some(offset);
        self
    }

    pub fn payload<S: Into<String>>(mut self, payload: S) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn hash<S: Into<String>>(mut self, hash: S) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn app<S: Into<String>>(mut self, app: S) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn dlg<S: Into<String>>(mut self, dlg: S) -> Self {
        self.dlg = Some(dlg.into());
        self
    }
}

/// Credentials plus signing options, as found at the top level of a flat config or under the
/// `hawk` key of a nested one.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct HawkConfig {
    pub credentials: Option<Credentials>,
    #[serde(flatten)]
    pub options: SigningOptions,
}

/// Config with credentials and signing options at the top level.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatConfig {
    #[serde(flatten)]
    pub hawk: HawkConfig,
    pub log_level: Option<String>,
}

impl FlatConfig {
    pub fn new(credentials: Credentials) -> Self {
        FlatConfig {
            hawk: HawkConfig {
                credentials: Some(credentials),
                options: SigningOptions::default(),
            },
            log_level: None,
        }
    }

    pub fn options(mut self, options: SigningOptions) -> Self {
        self.hawk.options = options;
        self
    }

    pub fn log_level<S: Into<String>>(mut self, log_level: S) -> Self {
        self.log_level = Some(log_level.into());
        self
    }
}

/// Config with a `hawk` sub-object and an optional `sntp` setting.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedConfig {
    pub hawk: HawkConfig,
    /// Either a boolean or an options object; see [`SntpOptions`].
    pub sntp: Option<Value>,
    pub log_level: Option<String>,
}

impl NestedConfig {
    pub fn new(credentials: Credentials) -> Self {
        NestedConfig {
            hawk: HawkConfig {
                credentials: Some(credentials),
                options: SigningOptions::default(),
            },
            sntp: None,
            log_level: None,
        }
    }

    pub fn options(mut self, options: SigningOptions) -> Self {
        self.hawk.options = options;
        self
    }

    pub fn sntp<V: Into<Value>>(mut self, sntp: V) -> Self {
        self.sntp = Some(sntp.into());
        self
    }

    pub fn log_level<S: Into<String>>(mut self, log_level: S) -> Self {
        self.log_level = Some(log_level.into());
        self
    }
}

/// Interceptor configuration, in either of its two accepted shapes.
///
/// ```
/// use hawk_interceptor::InterceptorConfig;
/// let config: InterceptorConfig = r#"{
///     "hawk": {
///         "credentials": {"id": "dh37fgj492je", "key": "no-secret", "algorithm": "sha256"},
///         "ext": "app-specific-data"
///     },
///     "sntp": false,
///     "logLevel": "DEBUG"
/// }"#.parse().unwrap();
/// assert!(matches!(config, InterceptorConfig::Nested(_)));
/// ```
#[derive(Clone, Debug)]
pub enum InterceptorConfig {
    Flat(FlatConfig),
    Nested(NestedConfig),
}

impl InterceptorConfig {
    /// Interpret a JSON value as a config.  Objects with a `hawk` key are nested configs; any
    /// other object is a flat config.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) if map.contains_key("hawk") => Ok(InterceptorConfig::Nested(
                NestedConfig::deserialize(value)?,
            )),
            Value::Object(_) => Ok(InterceptorConfig::Flat(FlatConfig::deserialize(value)?)),
            _ => Err(Error::NotAnObject),
        }
    }

    /// Validate this config and produce the canonical form used for signing.
    pub(crate) fn normalize(self) -> Result<SigningConfig> {
        let (prefix, hawk, sntp, log_level) = match self {
            InterceptorConfig::Flat(c) => ("", c.hawk, None, c.log_level),
            InterceptorConfig::Nested(c) => ("hawk.", c.hawk, c.sntp, c.log_level),
        };

        let log_level = parse_log_level(log_level.as_deref())?;
        let credentials = hawk.credentials.ok_or(Error::MissingCredentials(prefix))?;
        credentials.validate(prefix)?;
        let sntp = SntpConfig::from_value(sntp)?;
        let hash = hawk.options.hash.as_deref().map(decode_hash).transpose()?;
        let timestamp = match hawk.options.timestamp {
            Some(ts) => Some(
                UNIX_EPOCH
                    .checked_add(Duration::from_secs(ts))
                    .ok_or(Error::InvalidTimestamp(ts))?,
            ),
            None => None,
        };

        Ok(SigningConfig {
            credentials,
            options: hawk.options,
            hash,
            timestamp,
            sntp,
            log_level,
        })
    }
}

impl FromStr for InterceptorConfig {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)?;
        InterceptorConfig::from_json(&value)
    }
}

impl From<FlatConfig> for InterceptorConfig {
    fn from(c: FlatConfig) -> Self {
        InterceptorConfig::Flat(c)
    }
}

impl From<NestedConfig> for InterceptorConfig {
    fn from(c: NestedConfig) -> Self {
        InterceptorConfig::Nested(c)
    }
}

fn decode_hash(hash: &str) -> Result<Vec<u8>> {
    let config = base64::STANDARD.decode_allow_trailing_bits(true);
    Ok(base64::decode_config(hash, config)?)
}

fn parse_log_level(level: Option<&str>) -> Result<LevelFilter> {
    match level {
        None => Ok(LevelFilter::Warn),
        Some(l) if l.eq_ignore_ascii_case("fatal") => Ok(LevelFilter::Error),
        Some(l) => LevelFilter::from_str(l).map_err(|_| Error::InvalidLogLevel(l.to_string())),
    }
}

const DEFAULT_SNTP_TIMEOUT_MS: u64 = 1000;

/// Options for the SNTP clock synchronization.  Every field has a default, so `{}` is a valid
/// options object.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct SntpOptions {
    pub host: String,
    pub port: u16,
    /// Log the address the host resolved to
    pub resolve_reference: bool,
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    #[serde(rename = "clockSyncRefresh")]
    pub refresh_ms: u64,
}

impl SntpOptions {
    /// The time to wait for a server reply.  A `timeout` of 0 uses the default, since the worker
    /// must not block forever on a silent server.
    pub fn timeout(&self) -> Duration {
        match self.timeout_ms {
            0 => Duration::from_millis(DEFAULT_SNTP_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

impl Default for SntpOptions {
    fn default() -> Self {
        SntpOptions {
            host: "pool.ntp.org".to_string(),
            port: 123,
            resolve_reference: false,
            timeout_ms: DEFAULT_SNTP_TIMEOUT_MS,
            refresh_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// Whether, and how, to synchronize the clock used for Hawk timestamps.
#[derive(Clone, Debug, PartialEq)]
pub enum SntpConfig {
    Disabled,
    Defaults,
    Custom(SntpOptions),
}

impl SntpConfig {
    fn from_value(value: Option<Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(SntpConfig::Disabled),
            Some(Value::Bool(true)) => Ok(SntpConfig::Defaults),
            Some(v @ Value::Object(_)) => serde_json::from_value(v)
                .map(SntpConfig::Custom)
                .map_err(|e| Error::SntpType(format!("an unrecognized options object ({})", e))),
            Some(Value::Number(_)) => Err(Error::SntpType("number".to_string())),
            Some(Value::String(_)) => Err(Error::SntpType("string".to_string())),
            Some(Value::Array(_)) => Err(Error::SntpType("array".to_string())),
        }
    }

    /// The options to start clock sync with, if it is enabled.
    pub fn options(&self) -> Option<SntpOptions> {
        match self {
            SntpConfig::Disabled => None,
            SntpConfig::Defaults => Some(SntpOptions::default()),
            SntpConfig::Custom(o) => Some(o.clone()),
        }
    }
}

/// A validated interceptor configuration.  This is produced once by `init` and shared, read-only,
/// by every request signed afterward.
#[derive(Clone, Debug)]
pub struct SigningConfig {
    credentials: Credentials,
    options: SigningOptions,
    hash: Option<Vec<u8>>,
    timestamp: Option<SystemTime>,
    sntp: SntpConfig,
    log_level: LevelFilter,
}

impl SigningConfig {
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn options(&self) -> &SigningOptions {
        &self.options
    }

    /// The decoded `hash` option.
    pub fn hash(&self) -> Option<&[u8]> {
        self.hash.as_deref()
    }

    /// The `timestamp` option as a time.
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }

    pub fn sntp(&self) -> &SntpConfig {
        &self.sntp
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }
}
