//! VAPID authentication (RFC 8292)
//!
//! The push service learns who is sending from a short-lived ES256 JWT in the
//! `Authorization` header. The token only depends on the push service origin
//! and the key material, so it is cached per (server key, audience) until
//! shortly before it expires.

use lru::LruCache;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{DerSignature, SigningKey};
use p256::elliptic_curve::rand_core::OsRng;
use serde::Serialize;
use std::num::NonZeroUsize;
use zeroize::Zeroizing;

use crate::codec;
use crate::prelude::*;
use pushgate_types::config::VapidKeyMaterial;
use pushgate_types::utils::{decode_b64url, encode_b64url};

/// JWT lifetime, the maximum RFC 8292 recommends
pub const TOKEN_LIFETIME_SECS: i64 = 12 * 3600;

/// Cached tokens are refreshed this long before they expire
pub const CACHE_SKEW_SECS: i64 = 60;

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// `{"typ":"JWT","alg":"ES256"}`
const JWT_HEADER: &str = r#"{"typ":"JWT","alg":"ES256"}"#;

#[derive(Serialize)]
struct VapidClaims<'a> {
	aud: &'a str,
	exp: i64,
	sub: &'a str,
}

/// A signed `Authorization` header value and the expiry of its JWT
#[derive(Debug, Clone)]
pub struct VapidToken {
	pub header: String,
	pub expires_at: Timestamp,
}

/// Origin of a push endpoint, used as the JWT `aud` claim
///
/// `https://fcm.googleapis.com/fcm/send/abc` gives `https://fcm.googleapis.com`.
/// A port is only kept when it is not the scheme default.
pub fn audience_from_endpoint(endpoint: &str) -> ClResult<String> {
	let url = url::Url::parse(endpoint)
		.map_err(|e| Error::ValidationError(format!("invalid push endpoint: {}", e)))?;
	let host = url
		.host_str()
		.filter(|host| !host.is_empty())
		.ok_or_else(|| Error::ValidationError("push endpoint has no host".into()))?;

	Ok(match url.port() {
		Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
		None => format!("{}://{}", url.scheme(), host),
	})
}

/// Build the `vapid t=<jwt>, k=<public key>` header value for an audience
pub fn build_authorization_header(audience: &str, keys: &VapidKeyMaterial) -> ClResult<String> {
	Ok(build_authorization_header_at(audience, keys, Timestamp::now())?.header)
}

/// Build the header with `now` as the reference time for the `exp` claim
pub fn build_authorization_header_at(
	audience: &str,
	keys: &VapidKeyMaterial,
	now: Timestamp,
) -> ClResult<VapidToken> {
	let expires_at = now.add_seconds(TOKEN_LIFETIME_SECS);
	let claims = VapidClaims { aud: audience, exp: expires_at.0, sub: &keys.subject };
	let claims_json = serde_json::to_vec(&claims)
		.map_err(|e| Error::VapidSigningFailed(format!("claims serialization: {}", e)))?;

	let signing_input = format!("{}.{}", encode_b64url(JWT_HEADER), encode_b64url(claims_json));
	let signature = sign_es256(signing_input.as_bytes(), &keys.private_key)?;
	let jwt = format!("{}.{}", signing_input, encode_b64url(signature));

	Ok(VapidToken { header: format!("vapid t={}, k={}", jwt, keys.public_key), expires_at })
}

/// ECDSA P-256 / SHA-256 signature in JWS form (`R || S`)
fn sign_es256(input: &[u8], private_key: &str) -> ClResult<[u8; codec::RAW_SIGNATURE_LEN]> {
	let scalar = Zeroizing::new(
		decode_b64url(private_key)
			.map_err(|_| Error::VapidSigningFailed("private key is not base64url".into()))?,
	);
	let secret = codec::raw_private_scalar_to_structured(&scalar)
		.and_then(|der| der.to_secret_key())
		.map_err(|e| Error::VapidSigningFailed(e.to_string()))?;

	let signing_key = SigningKey::from(&secret);
	let signature: DerSignature =
		signing_key.try_sign(input).map_err(|e| Error::VapidSigningFailed(e.to_string()))?;

	codec::der_signature_to_raw(signature.as_bytes())
		.map_err(|e| Error::VapidSigningFailed(e.to_string()))
}

/// Generate a fresh VAPID key pair
pub fn generate_vapid_keys(subject: &str) -> ClResult<VapidKeyMaterial> {
	let secret = p256::SecretKey::random(&mut OsRng);
	let public_key = codec::public_key_to_raw(&secret.public_key())?;
	let mut private_key = Zeroizing::new([0u8; codec::PRIVATE_SCALAR_LEN]);
	private_key.copy_from_slice(&secret.to_bytes());

	let keys = VapidKeyMaterial::new(
		encode_b64url(public_key),
		encode_b64url(private_key.as_slice()),
		subject,
	);
	keys.validate()?;
	Ok(keys)
}

/// Cache of signed VAPID headers per (server key, audience)
///
/// The lock is held while a missing token is signed, so concurrent sends to
/// the same push service produce a single token.
#[derive(Debug)]
pub struct VapidCache {
	tokens: parking_lot::Mutex<LruCache<(Box<str>, String), VapidToken>>,
}

impl VapidCache {
	pub fn new(max_entries: usize) -> Self {
		let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
		Self { tokens: parking_lot::Mutex::new(LruCache::new(capacity)) }
	}

	pub fn authorization_header(&self, audience: &str, keys: &VapidKeyMaterial) -> ClResult<String> {
		self.authorization_header_at(audience, keys, Timestamp::now())
	}

	pub fn authorization_header_at(
		&self,
		audience: &str,
		keys: &VapidKeyMaterial,
		now: Timestamp,
	) -> ClResult<String> {
		let key = (keys.public_key.clone(), audience.to_string());
		let mut tokens = self.tokens.lock();
		if let Some(token) = tokens.get(&key) {
			if now < token.expires_at.add_seconds(-CACHE_SKEW_SECS) {
				return Ok(token.header.clone());
			}
			debug!(audience = %audience, "VAPID token expiring, re-signing");
		}

		let token = build_authorization_header_at(audience, keys, now)?;
		let header = token.header.clone();
		tokens.put(key, token);
		Ok(header)
	}

	pub fn len(&self) -> usize {
		self.tokens.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.lock().is_empty()
	}
}

impl Default for VapidCache {
	fn default() -> Self {
		Self::new(DEFAULT_CACHE_CAPACITY)
	}
}


// vim: ts=4
