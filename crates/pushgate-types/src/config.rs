//! VAPID key material and the provider it is loaded through.
//!
//! Keys are read once at process start and handed to the dispatcher as an
//! immutable value. Nothing in the delivery path reads configuration lazily.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use std::fmt::Debug;
use zeroize::Zeroizing;

use crate::prelude::*;
use crate::utils::{decode_b64url, decode_b64url_array};

pub const ENV_VAPID_PUBLIC_KEY: &str = "VAPID_PUBLIC_KEY";
pub const ENV_VAPID_PRIVATE_KEY: &str = "VAPID_PRIVATE_KEY";
pub const ENV_VAPID_SUBJECT: &str = "VAPID_SUBJECT";

pub const PUBLIC_KEY_LEN: usize = 65;
pub const PRIVATE_KEY_LEN: usize = 32;

/// Application server identity (RFC 8292)
#[derive(Clone)]
pub struct VapidKeyMaterial {
	/// Uncompressed P-256 point, base64url
	pub public_key: Box<str>,
	/// Raw 32-byte scalar, base64url
	pub private_key: Zeroizing<Box<str>>,
	/// `mailto:` URI or `https:` URL identifying the sender
	pub subject: Box<str>,
}

impl VapidKeyMaterial {
	pub fn new(
		public_key: impl Into<Box<str>>,
		private_key: impl Into<Box<str>>,
		subject: impl Into<Box<str>>,
	) -> Self {
		Self {
			public_key: public_key.into(),
			private_key: Zeroizing::new(private_key.into()),
			subject: subject.into(),
		}
	}

	/// Check lengths, the subject scheme, and that the public key belongs to
	/// the private scalar
	pub fn validate(&self) -> ClResult<()> {
		if !(self.subject.starts_with("mailto:") || self.subject.starts_with("https://")) {
			return Err(Error::ConfigError(format!(
				"VAPID subject must be a mailto: or https: URI, got {:?}",
				self.subject
			)));
		}

		let public_key: [u8; PUBLIC_KEY_LEN] = decode_b64url_array(&self.public_key)
			.map_err(|e| Error::ConfigError(format!("VAPID public key: {}", e)))?;
		if public_key[0] != 0x04 {
			return Err(Error::ConfigError("VAPID public key is not an uncompressed point".into()));
		}

		let private_key = Zeroizing::new(
			decode_b64url(&self.private_key)
				.map_err(|e| Error::ConfigError(format!("VAPID private key: {}", e)))?,
		);
		if private_key.len() != PRIVATE_KEY_LEN {
			return Err(Error::ConfigError(format!(
				"VAPID private key must be {} bytes, got {}",
				PRIVATE_KEY_LEN,
				private_key.len()
			)));
		}
		let secret = p256::SecretKey::from_slice(&private_key)
			.map_err(|_| Error::ConfigError("VAPID private key is not a valid P-256 scalar".into()))?;

		let derived = secret.public_key().to_encoded_point(false);
		if derived.as_bytes() != public_key.as_slice() {
			return Err(Error::ConfigError(
				"VAPID public key does not match the private key".into(),
			));
		}
		Ok(())
	}
}

impl Debug for VapidKeyMaterial {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VapidKeyMaterial")
			.field("public_key", &self.public_key)
			.field("private_key", &"<redacted>")
			.field("subject", &self.subject)
			.finish()
	}
}

/// Source of process-wide configuration
pub trait ConfigProvider: Debug + Send + Sync {
	fn vapid_keys(&self) -> ClResult<VapidKeyMaterial>;
}

/// Reads VAPID keys from `VAPID_PUBLIC_KEY`, `VAPID_PRIVATE_KEY` and `VAPID_SUBJECT`
#[derive(Debug, Default)]
pub struct EnvConfigProvider;

impl ConfigProvider for EnvConfigProvider {
	fn vapid_keys(&self) -> ClResult<VapidKeyMaterial> {
		let read = |name: &str| {
			std::env::var(name)
				.map_err(|_| Error::ConfigError(format!("environment variable {} is not set", name)))
		};
		Ok(VapidKeyMaterial::new(
			read(ENV_VAPID_PUBLIC_KEY)?,
			read(ENV_VAPID_PRIVATE_KEY)?,
			read(ENV_VAPID_SUBJECT)?,
		))
	}
}

/// Fixed key material, mostly for embedding and tests
#[derive(Debug)]
pub struct StaticConfigProvider(pub VapidKeyMaterial);

impl ConfigProvider for StaticConfigProvider {
	fn vapid_keys(&self) -> ClResult<VapidKeyMaterial> {
		Ok(self.0.clone())
	}
}


// vim: ts=4
