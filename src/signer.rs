use crate::clock::{shift, ClockSync};
use crate::config::{Credentials, SigningConfig};
use crate::error::*;
use hawk::{DigestAlgorithm, PayloadHasher, RequestBuilder, SHA256, SHA384, SHA512};
use rand::RngCore;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use url::{Position, Url};

/// A Hawk `Authorization` header value, including the `Hawk ` scheme prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedHeader {
    pub field: String,
}

/// A signing primitive: computes the `Authorization` header for a request.
pub trait Sign {
    fn sign(&self, path: &str, method: &str, config: &SigningConfig) -> Result<SignedHeader>;
}

/// Signs requests with the `hawk` crate, taking timestamps from a [`ClockSync`].
#[derive(Clone)]
pub struct HawkSigner {
    clock: Arc<ClockSync>,
}

impl HawkSigner {
    pub fn new(clock: Arc<ClockSync>) -> Self {
        HawkSigner { clock }
    }

    fn timestamp(&self, config: &SigningConfig) -> Result<SystemTime> {
        if let Some(ts) = config.timestamp() {
            return Ok(ts);
        }
        let offset = config.options().localtime_offset_msec.unwrap_or(0);
        shift(self.clock.now(), offset)
            .filter(|ts| *ts >= UNIX_EPOCH)
            .ok_or(Error::TimestampOutOfRange(offset))
    }
}

impl Sign for HawkSigner {
    fn sign(&self, path: &str, method: &str, config: &SigningConfig) -> Result<SignedHeader> {
        let options = config.options();
        let credentials = config.credentials();
        let algorithm = digest_algorithm(&credentials.algorithm)?;

        let hash = match (config.hash(), &options.payload) {
            (Some(hash), _) => Some(hash.to_vec()),
            (None, Some(payload)) => {
                let content_type = normalize_content_type(options.content_type.as_deref());
                Some(PayloadHasher::hash(content_type, algorithm, payload)?)
            }
            (None, None) => None,
        };

        let method = method.to_ascii_uppercase();
        let resource = Resource::parse(path);
        let request = RequestBuilder::new(&method, resource.host(), resource.port, resource.path())
            .hash(hash.as_deref())
            .ext(options.ext.as_deref())
            .app(options.app.as_deref())
            .dlg(options.dlg.as_deref())
            .request();

        let nonce = match options.nonce {
            Some(ref n) => n.clone(),
            None => random_nonce(),
        };
        let header = request.make_header_full(
            &hawk_credentials(credentials, algorithm)?,
            self.timestamp(config)?,
            nonce,
        )?;

        Ok(SignedHeader {
            field: format!("Hawk {}", header),
        })
    }
}

fn digest_algorithm(name: &str) -> Result<DigestAlgorithm> {
    match name.to_ascii_lowercase().as_str() {
        "sha256" => Ok(SHA256),
        "sha384" => Ok(SHA384),
        "sha512" => Ok(SHA512),
        _ => Err(Error::UnsupportedAlgorithm(name.to_string())),
    }
}

fn hawk_credentials(
    credentials: &Credentials,
    algorithm: DigestAlgorithm,
) -> Result<hawk::Credentials> {
    Ok(hawk::Credentials {
        id: credentials.id.clone(),
        key: hawk::Key::new(credentials.key.as_bytes(), algorithm)?,
    })
}

/// Lower-case the content type and strip any parameters, as Hawk does before hashing.
fn normalize_content_type(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn random_nonce() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::encode_config(&bytes, base64::URL_SAFE_NO_PAD)
}

/// The host, port, and resource (path and query) that go into the MAC.
struct Resource<'a> {
    url: Option<Url>,
    raw: &'a str,
    port: u16,
}

impl<'a> Resource<'a> {
    /// A path that is not an absolute URL is signed as-is, with an empty host and port 443.
    fn parse(path: &'a str) -> Resource<'a> {
        match Url::parse(path) {
            Ok(url) if url.has_host() => {
                let port = url.port_or_known_default().unwrap_or(443);
                Resource {
                    url: Some(url),
                    raw: path,
                    port,
                }
            }
            _ => Resource {
                url: None,
                raw: path,
                port: 443,
            },
        }
    }

    fn host(&self) -> &str {
        self.url.as_ref().and_then(|u| u.host_str()).unwrap_or("")
    }

    fn path(&self) -> &str {
        match self.url {
            Some(ref url) => &url[Position::BeforePath..Position::AfterQuery],
            None => self.raw,
        }
    }
}
