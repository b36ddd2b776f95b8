use std::collections::BTreeMap;

pub const AUTHORIZATION: &str = "Authorization";

/// An outgoing request, as threaded through an interceptor chain before transport.
///
/// `path` is either an absolute URL or a bare path.  A missing `method` is decided by the
/// interceptors (see [`OutgoingRequest::effective_method`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingRequest {
    pub path: String,
    pub method: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub entity: Option<Vec<u8>>,
}

impl OutgoingRequest {
    pub fn new<S: Into<String>>(path: S) -> Self {
        OutgoingRequest {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers_mut().insert(name.into(), value.into());
        self
    }

    pub fn entity<B: Into<Vec<u8>>>(mut self, entity: B) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// The headers, creating an empty set if there are none yet.
    pub fn headers_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.headers.get_or_insert_with(BTreeMap::new)
    }

    /// Get a header value, ignoring the case of the name.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.as_ref().and_then(|h| {
            h.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }

    /// Set a header, replacing any existing header whose name differs only in case.
    pub fn set_header<V: Into<String>>(&mut self, name: &str, value: V) {
        let headers = self.headers_mut();
        headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        headers.insert(name.to_string(), value.into());
    }

    /// The method the request will be sent with: the explicit method if any, otherwise `POST`
    /// for requests with an entity and `GET` for those without.
    pub fn effective_method(&self) -> &str {
        match self.method {
            Some(ref m) => m.as_str(),
            None if self.entity.is_some() => "POST",
            None => "GET",
        }
    }
}
