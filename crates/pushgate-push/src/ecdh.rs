//! One-shot ECDH against a subscriber key
//!
//! Every message gets a fresh ephemeral P-256 key pair. The secret half is
//! dropped (and zeroized) as soon as the shared secret has been computed.

use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::rand_core::{CryptoRngCore, OsRng};
use zeroize::Zeroizing;

use crate::codec::{self, UNCOMPRESSED_POINT_LEN};
use crate::prelude::*;
use pushgate_types::utils::encode_b64url;

pub const SHARED_SECRET_LEN: usize = 32;

/// Result of a key agreement
pub struct Agreement {
	/// Application server ephemeral public key, sent as the record key id
	pub ephemeral_public_key: [u8; UNCOMPRESSED_POINT_LEN],
	pub shared_secret: Zeroizing<[u8; SHARED_SECRET_LEN]>,
}

impl std::fmt::Debug for Agreement {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Agreement")
			.field("ephemeral_public_key", &encode_b64url(self.ephemeral_public_key))
			.field("shared_secret", &"<redacted>")
			.finish()
	}
}

/// Agree on a shared secret with a subscriber using the OS random source
pub fn agree(subscriber_public_key: &[u8]) -> ClResult<Agreement> {
	agree_with_rng(&mut OsRng, subscriber_public_key)
}

/// Agree on a shared secret with a subscriber, drawing the ephemeral key from `rng`
pub fn agree_with_rng(
	rng: &mut impl CryptoRngCore,
	subscriber_public_key: &[u8],
) -> ClResult<Agreement> {
	let subscriber = load_subscriber_key(subscriber_public_key)?;

	let ephemeral = EphemeralSecret::random(rng);
	let ephemeral_public_key = codec::public_key_to_raw(&ephemeral.public_key())
		.map_err(|e| Error::CryptoError(e.to_string()))?;
	let shared = ephemeral.diffie_hellman(&subscriber);

	let mut shared_secret = Zeroizing::new([0u8; SHARED_SECRET_LEN]);
	shared_secret.copy_from_slice(shared.raw_secret_bytes().as_slice());

	Ok(Agreement { ephemeral_public_key, shared_secret })
}

/// Agreement with a caller-provided static key. Only used to replay
/// published test vectors, which fix the sender key.
#[cfg(test)]
pub(crate) fn agree_with_secret(
	subscriber_public_key: &[u8],
	secret: &p256::SecretKey,
) -> ClResult<Agreement> {
	let subscriber = load_subscriber_key(subscriber_public_key)?;

	let ephemeral_public_key = codec::public_key_to_raw(&secret.public_key())?;
	let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), subscriber.as_affine());

	let mut shared_secret = Zeroizing::new([0u8; SHARED_SECRET_LEN]);
	shared_secret.copy_from_slice(shared.raw_secret_bytes().as_slice());

	Ok(Agreement { ephemeral_public_key, shared_secret })
}

fn load_subscriber_key(raw: &[u8]) -> ClResult<p256::PublicKey> {
	let der = codec::raw_public_key_to_structured(raw).map_err(|e| match e {
		Error::InvalidKeyFormat(msg) => Error::InvalidSubscriptionKey(msg),
		other => other,
	})?;
	der.to_public_key().map_err(|_| Error::KeyAgreementFailed)
}

#[cfg(test)]
mod tests {
	use super::*;
	use pushgate_types::utils::decode_b64url;

	const UA_PUBLIC: &str = "BCVxsr7N_eNgVRqvHtD0zTZsEc6-VV-JvLexhqUzORcxaOzi6-AYWXvTBHm4bjyPjs7Vd8pZGH6SRpkNtoIAiw4";
	const UA_PRIVATE: &str = "q1dXpw3UpT5VOmu_cf_v6ih07Aems3njxI-JWgLcM94";

	#[test]
	fn test_agreement_matches_subscriber_side() {
		let ua_public = decode_b64url(UA_PUBLIC).unwrap();
		let agreement = agree(&ua_public).unwrap();
		assert_eq!(agreement.ephemeral_public_key[0], 0x04);

		// the subscriber derives the same secret from our ephemeral public key
		let ua_secret = p256::SecretKey::from_slice(&decode_b64url(UA_PRIVATE).unwrap()).unwrap();
		let ephemeral =
			p256::PublicKey::from_sec1_bytes(&agreement.ephemeral_public_key).unwrap();
		let theirs = p256::ecdh::diffie_hellman(ua_secret.to_nonzero_scalar(), ephemeral.as_affine());
		assert_eq!(theirs.raw_secret_bytes().as_slice(), agreement.shared_secret.as_slice());
	}

	#[test]
	fn test_fresh_ephemeral_key_per_call() {
		let ua_public = decode_b64url(UA_PUBLIC).unwrap();
		let first = agree(&ua_public).unwrap();
		let second = agree(&ua_public).unwrap();
		assert_ne!(first.ephemeral_public_key, second.ephemeral_public_key);
		assert_ne!(first.shared_secret.as_slice(), second.shared_secret.as_slice());
	}

	#[test]
	fn test_bad_length_is_subscription_error() {
		let ua_public = decode_b64url(UA_PUBLIC).unwrap();
		let err = agree(&ua_public[..33]).unwrap_err();
		assert!(matches!(err, Error::InvalidSubscriptionKey(_)));
		assert!(err.is_subscription_data_error());
	}

	#[test]
	fn test_point_off_curve_fails_agreement() {
		let mut ua_public = decode_b64url(UA_PUBLIC).unwrap();
		ua_public[40] ^= 0xff;
		assert!(matches!(agree(&ua_public), Err(Error::KeyAgreementFailed)));
	}

	#[test]
	fn test_debug_redacts_secret() {
		let ua_public = decode_b64url(UA_PUBLIC).unwrap();
		let agreement = agree(&ua_public).unwrap();
		assert!(format!("{:?}", agreement).contains("<redacted>"));
	}
}

// vim: ts=4
