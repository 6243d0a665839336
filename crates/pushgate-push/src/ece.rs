//! Web Push message encryption (RFC 8291)
//!
//! Produces a single `aes128gcm` record (RFC 8188) whose header carries the
//! salt, the record size and the sender's ephemeral public key as key id:
//!
//! ```text
//! salt (16) | rs (4, BE) | idlen (1) | keyid (65) | ciphertext | tag (16)
//! ```

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use hmac::{Hmac, Mac};
use p256::elliptic_curve::rand_core::{CryptoRngCore, OsRng};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::codec::UNCOMPRESSED_POINT_LEN;
use crate::ecdh::{self, Agreement};
use crate::prelude::*;

pub const SALT_LEN: usize = 16;
pub const AUTH_SECRET_LEN: usize = 16;
pub const RECORD_SIZE: u32 = 4096;
pub const TAG_LEN: usize = 16;

/// Delimiter of the last (and only) record
const LAST_RECORD_PADDING: u8 = 0x02;

/// Largest plaintext that still fits into one record with its delimiter
pub const MAX_PLAINTEXT_LEN: usize = RECORD_SIZE as usize - TAG_LEN - 1;

const KEY_ID_LEN: u8 = 65;
const HEADER_LEN: usize = SALT_LEN + 4 + 1 + UNCOMPRESSED_POINT_LEN;

const KEY_INFO: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

type HmacSha256 = Hmac<Sha256>;

/// Encrypted push message body, ready to be POSTed
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedMessage(Vec<u8>);

impl EncryptedMessage {
	pub fn salt(&self) -> &[u8] {
		&self.0[..SALT_LEN]
	}

	pub fn record_size(&self) -> u32 {
		let mut rs = [0u8; 4];
		rs.copy_from_slice(&self.0[SALT_LEN..SALT_LEN + 4]);
		u32::from_be_bytes(rs)
	}

	/// Sender ephemeral public key
	pub fn key_id(&self) -> &[u8] {
		&self.0[SALT_LEN + 5..HEADER_LEN]
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl std::fmt::Debug for EncryptedMessage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "EncryptedMessage({} bytes)", self.0.len())
	}
}

/// Encrypt a payload for one subscriber
///
/// `subscriber_public_key` is the raw 65-byte `p256dh` key and `auth_secret`
/// the 16-byte `auth` value from the browser subscription.
pub fn encrypt(
	plaintext: &[u8],
	subscriber_public_key: &[u8],
	auth_secret: &[u8],
) -> ClResult<EncryptedMessage> {
	encrypt_with_rng(&mut OsRng, plaintext, subscriber_public_key, auth_secret)
}

/// Same as [`encrypt`], drawing the salt and then the ephemeral key from `rng`
pub fn encrypt_with_rng(
	rng: &mut impl CryptoRngCore,
	plaintext: &[u8],
	subscriber_public_key: &[u8],
	auth_secret: &[u8],
) -> ClResult<EncryptedMessage> {
	let auth_secret: &[u8; AUTH_SECRET_LEN] = auth_secret.try_into().map_err(|_| {
		Error::InvalidSubscriptionKey(format!(
			"auth secret must be {} bytes, got {}",
			AUTH_SECRET_LEN,
			auth_secret.len()
		))
	})?;
	if plaintext.len() > MAX_PLAINTEXT_LEN {
		return Err(Error::PayloadTooLarge(plaintext.len()));
	}

	let mut salt = [0u8; SALT_LEN];
	rng.try_fill_bytes(&mut salt).map_err(|e| Error::CryptoError(e.to_string()))?;

	let agreement = ecdh::agree_with_rng(rng, subscriber_public_key)?;
	seal(plaintext, subscriber_public_key, auth_secret, &salt, &agreement)
}

/// Deterministic part of the encryption, once salt and agreement are fixed
fn seal(
	plaintext: &[u8],
	subscriber_public_key: &[u8],
	auth_secret: &[u8; AUTH_SECRET_LEN],
	salt: &[u8; SALT_LEN],
	agreement: &Agreement,
) -> ClResult<EncryptedMessage> {
	// IKM from the ECDH secret, bound to both public keys
	let prk_key = hmac_sha256(auth_secret, &[agreement.shared_secret.as_slice()])?;
	let ikm: Zeroizing<[u8; 32]> = hkdf_expand(
		&prk_key,
		&[KEY_INFO, subscriber_public_key, agreement.ephemeral_public_key.as_slice()],
	)?;

	let prk = hmac_sha256(salt, &[ikm.as_slice()])?;
	let cek: Zeroizing<[u8; 16]> = hkdf_expand(&prk, &[CEK_INFO])?;
	let nonce: Zeroizing<[u8; 12]> = hkdf_expand(&prk, &[NONCE_INFO])?;

	let mut padded = Zeroizing::new(Vec::with_capacity(plaintext.len() + 1));
	padded.extend_from_slice(plaintext);
	padded.push(LAST_RECORD_PADDING);

	let cipher = Aes128Gcm::new_from_slice(cek.as_slice())
		.map_err(|e| Error::EncryptionFailed(e.to_string()))?;
	let ciphertext = cipher
		.encrypt(Nonce::from_slice(nonce.as_slice()), padded.as_slice())
		.map_err(|e| Error::EncryptionFailed(e.to_string()))?;

	let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
	out.extend_from_slice(salt);
	out.extend_from_slice(&RECORD_SIZE.to_be_bytes());
	out.push(KEY_ID_LEN);
	out.extend_from_slice(&agreement.ephemeral_public_key);
	out.extend_from_slice(&ciphertext);
	Ok(EncryptedMessage(out))
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> ClResult<Zeroizing<[u8; 32]>> {
	let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
		.map_err(|e| Error::CryptoError(e.to_string()))?;
	for part in parts {
		mac.update(part);
	}
	let mut out = Zeroizing::new([0u8; 32]);
	out.copy_from_slice(&mac.finalize().into_bytes());
	Ok(out)
}

/// Single-block HKDF-Expand (RFC 5869): `T(1) = HMAC(PRK, info | 0x01)`
fn hkdf_expand<const N: usize>(prk: &[u8; 32], info: &[&[u8]]) -> ClResult<Zeroizing<[u8; N]>> {
	let mut parts = info.to_vec();
	parts.push(&[0x01u8][..]);
	let block = hmac_sha256(prk, &parts)?;

	let mut out = Zeroizing::new([0u8; N]);
	let src = block
		.get(..N)
		.ok_or_else(|| Error::CryptoError(format!("HKDF output of {} bytes needs more than one block", N)))?;
	out.copy_from_slice(src);
	Ok(out)
}


// vim: ts=4
