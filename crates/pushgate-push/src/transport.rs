//! HTTP delivery of encrypted push messages (RFC 8030)
//!
//! The dispatcher only needs the response status of a single POST, so the
//! transport is a narrow trait. [`HyperTransport`] is the production
//! implementation; tests substitute an in-memory one.

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::fmt::Debug;
use std::time::Duration;

use crate::prelude::*;
use pushgate_types::utils::truncate_endpoint;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One push message, fully prepared for the wire
#[derive(Debug, Clone)]
pub struct PushRequest {
	pub endpoint: String,
	/// `vapid t=..., k=...`
	pub authorization: String,
	/// Seconds the push service should keep an undelivered message
	pub ttl: u32,
	/// `aes128gcm` encoded payload
	pub body: Vec<u8>,
}

#[async_trait]
pub trait PushTransport: Debug + Send + Sync {
	/// POST the message and return the HTTP status code of the push service
	///
	/// Network errors are `TransientDelivery`, exceeded deadlines `Timeout`.
	async fn post(&self, request: PushRequest) -> ClResult<u16>;
}

/// hyper + rustls client with connect and total request timeouts
#[derive(Debug, Clone)]
pub struct HyperTransport {
	client: Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>,
	request_timeout: Duration,
}

impl HyperTransport {
	pub fn new(connect_timeout: Duration, request_timeout: Duration) -> ClResult<Self> {
		let mut http = HttpConnector::new();
		http.enforce_http(false);
		http.set_connect_timeout(Some(connect_timeout));

		let connector = HttpsConnectorBuilder::new()
			.with_provider_and_webpki_roots(rustls::crypto::aws_lc_rs::default_provider())
			.map_err(|e| Error::ConfigError(format!("TLS setup failed: {}", e)))?
			.https_or_http()
			.enable_http1()
			.enable_http2()
			.wrap_connector(http);

		let client = Client::builder(TokioExecutor::new()).build(connector);
		Ok(Self { client, request_timeout })
	}

	pub fn with_defaults() -> ClResult<Self> {
		Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
	}
}

#[async_trait]
impl PushTransport for HyperTransport {
	async fn post(&self, request: PushRequest) -> ClResult<u16> {
		let http_request = hyper::Request::builder()
			.method(hyper::Method::POST)
			.uri(&request.endpoint)
			.header(hyper::header::AUTHORIZATION, &request.authorization)
			.header(hyper::header::CONTENT_TYPE, "application/octet-stream")
			.header(hyper::header::CONTENT_ENCODING, "aes128gcm")
			.header("TTL", request.ttl)
			.body(Full::new(Bytes::from(request.body)))
			.map_err(|e| Error::ValidationError(format!("cannot build push request: {}", e)))?;

		match tokio::time::timeout(self.request_timeout, self.client.request(http_request)).await {
			Ok(Ok(response)) => Ok(response.status().as_u16()),
			Ok(Err(err)) => {
				if is_timeout(&err) {
					Err(Error::Timeout)
				} else {
					debug!(
						endpoint = %truncate_endpoint(&request.endpoint),
						error = %err,
						"Push request failed"
					);
					Err(Error::TransientDelivery(format!("network error: {}", err)))
				}
			}
			Err(_) => Err(Error::Timeout),
		}
	}
}

/// Connect timeouts surface as an `io::ErrorKind::TimedOut` somewhere in the
/// source chain of the client error
fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
	let mut source = Some(err);
	while let Some(current) = source {
		if let Some(io) = current.downcast_ref::<std::io::Error>() {
			if io.kind() == std::io::ErrorKind::TimedOut {
				return true;
			}
		}
		source = current.source();
	}
	false
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug)]
	struct Wrapped(std::io::Error);

	impl std::fmt::Display for Wrapped {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			write!(f, "connect error")
		}
	}

	impl std::error::Error for Wrapped {
		fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
			Some(&self.0)
		}
	}

	#[test]
	fn test_is_timeout_walks_source_chain() {
		let timed_out = Wrapped(std::io::Error::from(std::io::ErrorKind::TimedOut));
		assert!(is_timeout(&timed_out));

		let refused = Wrapped(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
		assert!(!is_timeout(&refused));
	}
}

// vim: ts=4
