use crate::config::SigningConfig;
use crate::error::*;
use crate::signer::Sign;
use http::header::{HeaderValue, AUTHORIZATION};
use log::debug;

pub trait SignRequest {
    /// Sign a request with the given signer and config, setting its `Authorization` header.
    fn sign_hawk<S: Sign>(&mut self, signer: &S, config: &SigningConfig) -> Result<&mut Self>;
}

impl<B> SignRequest for http::Request<B> {
    fn sign_hawk<S: Sign>(&mut self, signer: &S, config: &SigningConfig) -> Result<&mut Self> {
        let uri = self.uri().to_string();
        let header = signer.sign(&uri, self.method().as_str(), config)?;
        if config.log_level() >= log::Level::Debug {
            debug!("sign_hawk(): Authorization : {}", header.field);
        }
        self.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&header.field)?);
        Ok(self)
    }
}
