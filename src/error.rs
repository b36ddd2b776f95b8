use failure::Fail;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Fail, Debug)]
pub enum Error {
    #[fail(display = "config is required and must be an Object")]
    NotAnObject,

    #[fail(display = "{}credentials are required", _0)]
    MissingCredentials(&'static str),

    #[fail(
        display = "{}credentials.{} is required and must be a non-empty String",
        prefix, field
    )]
    MissingCredential {
        prefix: &'static str,
        field: &'static str,
    },

    #[fail(display = "Unsupported log level: {}", _0)]
    InvalidLogLevel(String),

    #[fail(
        display = "config.sntp must be a Boolean or an options object, but was found to be : {}",
        _0
    )]
    SntpType(String),

    #[fail(display = "Invalid config: {}", _0)]
    InvalidConfig(#[fail(cause)] serde_json::Error),

    #[fail(display = "Unsupported Hawk algorithm: {}", _0)]
    UnsupportedAlgorithm(String),

    #[fail(display = "Invalid url: {}", _0)]
    InvalidUrl(String),

    #[fail(display = "{}", _0)]
    Hawk(#[fail(cause)] hawk::Error),

    #[fail(display = "hash must be a base64-encoded digest: {}", _0)]
    InvalidHash(#[fail(cause)] base64::DecodeError),

    #[fail(display = "timestamp is out of range: {}", _0)]
    InvalidTimestamp(u64),

    #[fail(display = "localtimeOffsetMsec moves the clock out of range: {}", _0)]
    TimestampOutOfRange(i64),

    #[fail(display = "Invalid header value: {}", _0)]
    InvalidHeader(#[fail(cause)] http::header::InvalidHeaderValue),

    #[fail(display = "Invalid SNTP response: {}", _0)]
    Sntp(&'static str),

    #[fail(display = "{}", _0)]
    Io(#[fail(cause)] std::io::Error),
}

impl Error {
    /// True for the errors `init` reports for a malformed configuration.
    pub fn is_config_error(&self) -> bool {
        match self {
            Error::NotAnObject
            | Error::MissingCredentials(_)
            | Error::MissingCredential { .. }
            | Error::InvalidLogLevel(_)
            | Error::SntpType(_)
            | Error::InvalidConfig(_)
            | Error::InvalidHash(_)
            | Error::InvalidTimestamp(_) => true,
            _ => false,
        }
    }
}

impl From<hawk::Error> for Error {
    fn from(e: hawk::Error) -> Self {
        Error::Hawk(e)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::InvalidHash(e)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeader(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidConfig(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
