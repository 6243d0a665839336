//! HyperTransport Integration Tests
//!
//! Runs the real hyper client against a local wiremock push service:
//! 1. Status codes are passed through untouched
//! 2. Web Push headers are present on the wire
//! 3. Slow push services and refused connections map to transient errors
#![allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]

#[cfg(test)]
mod tests {
	use pushgate_push::transport::{HyperTransport, PushRequest, PushTransport};
	use pushgate_types::prelude::*;
	use std::time::Duration;
	use wiremock::matchers::{body_bytes, header, headers, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn request(endpoint: String) -> PushRequest {
		PushRequest {
			endpoint,
			authorization: "vapid t=aaa.bbb.ccc, k=BKEY".into(),
			ttl: 86400,
			body: vec![1, 2, 3, 4],
		}
	}

	fn transport(request_timeout: Duration) -> HyperTransport {
		HyperTransport::new(Duration::from_secs(2), request_timeout)
			.expect("Failed to create transport")
	}

	#[tokio::test]
	async fn test_created_with_push_headers() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/wpush/v2/abc"))
			// wiremock splits header values on commas
			.and(headers("authorization", vec!["vapid t=aaa.bbb.ccc", "k=BKEY"]))
			.and(header("content-type", "application/octet-stream"))
			.and(header("content-encoding", "aes128gcm"))
			.and(header("ttl", "86400"))
			.and(body_bytes(vec![1u8, 2, 3, 4]))
			.respond_with(ResponseTemplate::new(201))
			.expect(1)
			.mount(&server)
			.await;

		let status = transport(Duration::from_secs(5))
			.post(request(format!("{}/wpush/v2/abc", server.uri())))
			.await
			.expect("Failed to post");
		assert_eq!(status, 201);
	}

	#[tokio::test]
	async fn test_error_statuses_are_returned() {
		let server = MockServer::start().await;
		Mock::given(path("/gone")).respond_with(ResponseTemplate::new(410)).mount(&server).await;
		Mock::given(path("/busy")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

		let transport = transport(Duration::from_secs(5));
		let gone = transport.post(request(format!("{}/gone", server.uri()))).await.unwrap();
		let busy = transport.post(request(format!("{}/busy", server.uri()))).await.unwrap();
		assert_eq!(gone, 410);
		assert_eq!(busy, 503);
	}

	#[tokio::test]
	async fn test_slow_push_service_times_out() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
			.mount(&server)
			.await;

		let result = transport(Duration::from_millis(200))
			.post(request(format!("{}/slow", server.uri())))
			.await;
		assert!(matches!(result, Err(Error::Timeout)));
	}

	#[tokio::test]
	async fn test_refused_connection_is_transient() {
		// grab a free port and release it again
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		drop(listener);

		let result = transport(Duration::from_secs(5))
			.post(request(format!("http://127.0.0.1:{}/push", port)))
			.await;
		let err = result.unwrap_err();
		assert!(matches!(err, Error::TransientDelivery(_)));
		assert!(err.is_retryable());
	}
}

// vim: ts=4
