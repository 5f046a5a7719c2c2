//! Request drivers
//!
//! - `WarmupDriver` primes the target over throwaway connections
//! - `PairedSampler` collects the labeled, randomly ordered pairs
//!
//! Both send strictly one request at a time.

pub mod sampler;
pub mod warmup;

pub use sampler::{CollectionSummary, PairedSampler};
pub use warmup::{WarmupDriver, WarmupReport};

use crate::{
    client::{ProbeRequest, ProbeResponse},
    models::{Config, Slot, TimingSample},
    token::{Token, TokenForge},
};

/// Endpoint and header conventions shared by every probe
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub url: String,
    /// Response header carrying the server's own processing time
    pub runtime_header: String,
    pub forge: TokenForge,
}

impl ProbeTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            runtime_header: crate::defaults::DEFAULT_RUNTIME_HEADER.to_string(),
            forge: TokenForge::default(),
        }
    }

    pub fn with_runtime_header(mut self, header: impl Into<String>) -> Self {
        self.runtime_header = header.into();
        self
    }

    pub fn with_forge(mut self, forge: TokenForge) -> Self {
        self.forge = forge;
        self
    }

    /// Authorized GET carrying `token`
    pub fn request(&self, token: &Token) -> ProbeRequest {
        ProbeRequest::authorized_get(self.url.as_str(), self.forge.authorization_value(token))
    }

    /// Turn a response into the sample stored for `slot`
    pub fn sample(&self, slot: Slot, token: &Token, response: &ProbeResponse) -> TimingSample {
        TimingSample {
            token: token.as_str().to_string(),
            elapsed_microseconds: response.elapsed_microseconds,
            server_runtime: response.header(&self.runtime_header).map(str::to_string),
            slot,
            status: response.status,
        }
    }
}

impl From<&Config> for ProbeTarget {
    fn from(config: &Config) -> Self {
        Self::new(config.target_url.as_str()).with_runtime_header(config.runtime_header.as_str())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_config() {
        let config = Config {
            target_url: "http://10.0.0.5:8000/users/".to_string(),
            runtime_header: "X-Server-Time".to_string(),
            ..Config::default()
        };
        let target = ProbeTarget::from(&config);

        assert_eq!(target.url, "http://10.0.0.5:8000/users/");
        assert_eq!(target.runtime_header, "X-Server-Time");
    }

    #[test]
    fn test_request_and_sample() {
        let target = ProbeTarget::new("http://127.0.0.1:8000/users/");
        let token = TokenForge::build("AAAA", "1", 3).unwrap();

        let request = target.request(&token);
        assert_eq!(request.header("Authorization"), Some("Token AAAA100"));
        assert_eq!(request.header("Accept-Encoding"), Some("identity"));

        let response = ProbeResponse {
            status: 401,
            headers: vec![("x-runtime".to_string(), "0.0042".to_string())],
            elapsed_microseconds: 1234,
        };
        let sample = target.sample(Slot::One, &token, &response);
        assert_eq!(sample.token, "AAAA100");
        assert_eq!(sample.elapsed_microseconds, 1234);
        assert_eq!(sample.server_runtime.as_deref(), Some("0.0042"));
        assert_eq!(sample.slot, Slot::One);
        assert_eq!(sample.status, 401);
    }
}
