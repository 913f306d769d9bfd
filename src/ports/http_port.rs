//! Blocking HTTP transport port trait.

use crate::domain::error::QuantError;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpPort {
    /// GET `url` with `query` appended. Transport failures (DNS, connect,
    /// timeout) are `QuantError::TransientSource`; any HTTP status is returned
    /// as a response for the caller to judge.
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, QuantError>;
}

impl<T: HttpPort + ?Sized> HttpPort for &T {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse, QuantError> {
        (**self).get(url, query)
    }
}
