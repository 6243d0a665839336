//! Utility functions

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::prelude::*;

/// Encode bytes as unpadded base64url
pub fn encode_b64url(input: impl AsRef<[u8]>) -> String {
	URL_SAFE_NO_PAD.encode(input)
}

/// Decode base64url, tolerating trailing `=` padding some browsers still send
pub fn decode_b64url(input: &str) -> ClResult<Vec<u8>> {
	Ok(URL_SAFE_NO_PAD.decode(input.trim().trim_end_matches('='))?)
}

/// Decode base64url into a fixed-size array
pub fn decode_b64url_array<const N: usize>(input: &str) -> ClResult<[u8; N]> {
	let bytes = decode_b64url(input)?;
	let len = bytes.len();
	bytes
		.try_into()
		.map_err(|_| Error::ValidationError(format!("expected {} bytes, got {}", N, len)))
}

/// Shorten an endpoint URL for log output
pub fn truncate_endpoint(endpoint: &str) -> &str {
	const MAX_LEN: usize = 80;
	match endpoint.char_indices().nth(MAX_LEN) {
		Some((idx, _)) => &endpoint[..idx],
		None => endpoint,
	}
}


// vim: ts=4
