//! EC key and signature codec
//!
//! Browsers and VAPID configuration carry P-256 keys as raw bytes (a 65-byte
//! uncompressed point, a 32-byte scalar) while the crypto primitives load
//! DER structures. ECDSA signers emit DER signatures while JWS (RFC 7518)
//! needs the fixed 64-byte `R || S` form. All of those conversions live here.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePublicKey;
use zeroize::Zeroizing;

use crate::prelude::*;

pub const UNCOMPRESSED_POINT_LEN: usize = 65;
pub const PRIVATE_SCALAR_LEN: usize = 32;
pub const RAW_SIGNATURE_LEN: usize = 64;

const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// SubjectPublicKeyInfo header for an id-ecPublicKey / prime256v1 key with
/// a 65-byte BIT STRING payload
const SPKI_P256_PREFIX: [u8; 26] = [
	0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a,
	0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

/// SEC1 ECPrivateKey header up to the 32-byte OCTET STRING
const SEC1_P256_PREFIX: [u8; 7] = [0x30, 0x31, 0x02, 0x01, 0x01, 0x04, 0x20];

/// `[0] { OID prime256v1 }` parameters trailer
const SEC1_P256_SUFFIX: [u8; 12] =
	[0xa0, 0x0a, 0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];

const SPKI_LEN: usize = SPKI_P256_PREFIX.len() + UNCOMPRESSED_POINT_LEN;
const SEC1_LEN: usize = SEC1_P256_PREFIX.len() + PRIVATE_SCALAR_LEN + SEC1_P256_SUFFIX.len();

const DER_SEQUENCE: u8 = 0x30;
const DER_INTEGER: u8 = 0x02;

/// DER SubjectPublicKeyInfo wrapping a raw P-256 point
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyDer([u8; SPKI_LEN]);

impl PublicKeyDer {
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	/// Load the key. Fails when the point is not on the curve.
	pub fn to_public_key(&self) -> ClResult<p256::PublicKey> {
		p256::PublicKey::from_public_key_der(&self.0)
			.map_err(|_| Error::InvalidKeyFormat("point is not on the P-256 curve".into()))
	}
}

impl std::fmt::Debug for PublicKeyDer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "PublicKeyDer({} bytes)", self.0.len())
	}
}

/// DER SEC1 ECPrivateKey wrapping a raw P-256 scalar
pub struct PrivateKeyDer(Zeroizing<[u8; SEC1_LEN]>);

impl PrivateKeyDer {
	pub fn as_bytes(&self) -> &[u8] {
		self.0.as_slice()
	}

	pub fn to_secret_key(&self) -> ClResult<p256::SecretKey> {
		p256::SecretKey::from_sec1_der(self.0.as_slice())
			.map_err(|_| Error::InvalidKeyFormat("not a valid P-256 private scalar".into()))
	}
}

impl std::fmt::Debug for PrivateKeyDer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "PrivateKeyDer(<redacted>)")
	}
}

/// Wrap a raw 65-byte uncompressed point into SubjectPublicKeyInfo DER
pub fn raw_public_key_to_structured(raw: &[u8]) -> ClResult<PublicKeyDer> {
	if raw.len() != UNCOMPRESSED_POINT_LEN {
		return Err(Error::InvalidKeyFormat(format!(
			"public key must be {} bytes, got {}",
			UNCOMPRESSED_POINT_LEN,
			raw.len()
		)));
	}
	if raw.first() != Some(&UNCOMPRESSED_POINT_TAG) {
		return Err(Error::InvalidKeyFormat("public key is not an uncompressed point".into()));
	}

	let mut der = [0u8; SPKI_LEN];
	der[..SPKI_P256_PREFIX.len()].copy_from_slice(&SPKI_P256_PREFIX);
	der[SPKI_P256_PREFIX.len()..].copy_from_slice(raw);
	Ok(PublicKeyDer(der))
}

/// Wrap a raw 32-byte scalar into a SEC1 ECPrivateKey DER for P-256
pub fn raw_private_scalar_to_structured(raw: &[u8]) -> ClResult<PrivateKeyDer> {
	if raw.len() != PRIVATE_SCALAR_LEN {
		return Err(Error::InvalidKeyFormat(format!(
			"private key must be {} bytes, got {}",
			PRIVATE_SCALAR_LEN,
			raw.len()
		)));
	}

	let mut der = Zeroizing::new([0u8; SEC1_LEN]);
	let scalar_end = SEC1_P256_PREFIX.len() + PRIVATE_SCALAR_LEN;
	der[..SEC1_P256_PREFIX.len()].copy_from_slice(&SEC1_P256_PREFIX);
	der[SEC1_P256_PREFIX.len()..scalar_end].copy_from_slice(raw);
	der[scalar_end..].copy_from_slice(&SEC1_P256_SUFFIX);
	Ok(PrivateKeyDer(der))
}

/// Encode a public key as a raw 65-byte uncompressed point
pub fn public_key_to_raw(key: &p256::PublicKey) -> ClResult<[u8; UNCOMPRESSED_POINT_LEN]> {
	let point = key.to_encoded_point(false);
	point
		.as_bytes()
		.try_into()
		.map_err(|_| Error::InvalidKeyFormat("unexpected encoded point length".into()))
}

/// Convert a DER `SEQUENCE { INTEGER r, INTEGER s }` ECDSA signature into the
/// 64-byte `R || S` form used by JWS ES256
pub fn der_signature_to_raw(der: &[u8]) -> ClResult<[u8; RAW_SIGNATURE_LEN]> {
	let (sequence, rest) = read_tlv(der, DER_SEQUENCE)?;
	if !rest.is_empty() {
		return Err(Error::MalformedSignature);
	}
	let (r, rest) = read_tlv(sequence, DER_INTEGER)?;
	let (s, rest) = read_tlv(rest, DER_INTEGER)?;
	if !rest.is_empty() {
		return Err(Error::MalformedSignature);
	}

	let mut raw = [0u8; RAW_SIGNATURE_LEN];
	let (raw_r, raw_s) = raw.split_at_mut(RAW_SIGNATURE_LEN / 2);
	copy_integer(r, raw_r)?;
	copy_integer(s, raw_s)?;
	Ok(raw)
}

/// Read one DER element with the expected tag, returning (content, remainder)
fn read_tlv(input: &[u8], tag: u8) -> ClResult<(&[u8], &[u8])> {
	let (&found, rest) = input.split_first().ok_or(Error::MalformedSignature)?;
	if found != tag {
		return Err(Error::MalformedSignature);
	}
	let (&len_byte, rest) = rest.split_first().ok_or(Error::MalformedSignature)?;
	let (len, rest) = match len_byte {
		0..=0x7f => (usize::from(len_byte), rest),
		// P-256 signatures never exceed 72 bytes, one length octet is enough
		0x81 => {
			let (&len, rest) = rest.split_first().ok_or(Error::MalformedSignature)?;
			if len < 0x80 {
				return Err(Error::MalformedSignature);
			}
			(usize::from(len), rest)
		}
		_ => return Err(Error::MalformedSignature),
	};
	if rest.len() < len {
		return Err(Error::MalformedSignature);
	}
	Ok(rest.split_at(len))
}

/// Strip sign padding and left-pad a big-endian INTEGER into `out`
fn copy_integer(int: &[u8], out: &mut [u8]) -> ClResult<()> {
	if int.is_empty() || int.first().is_some_and(|b| b & 0x80 != 0) {
		// empty or negative
		return Err(Error::MalformedSignature);
	}
	let start = int.iter().position(|&b| b != 0).unwrap_or(int.len());
	let digits = &int[start..];
	if digits.len() > out.len() {
		return Err(Error::MalformedSignature);
	}
	let offset = out.len() - digits.len();
	out[offset..].copy_from_slice(digits);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use pushgate_types::utils::decode_b64url;

	// RFC 8291 appendix A user agent public key
	const UA_PUBLIC: &str = "BCVxsr7N_eNgVRqvHtD0zTZsEc6-VV-JvLexhqUzORcxaOzi6-AYWXvTBHm4bjyPjs7Vd8pZGH6SRpkNtoIAiw4";
	// RFC 8291 appendix A application server key pair
	const AS_PRIVATE: &str = "yfWPiYE-n46HLnH0KqZOF1fJJU3MYrct3AELtAQ-oRw";
	const AS_PUBLIC: &str = "BP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIgDll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A8";

	#[test]
	fn test_public_key_roundtrip() {
		let raw = decode_b64url(UA_PUBLIC).unwrap();
		let der = raw_public_key_to_structured(&raw).unwrap();
		assert_eq!(der.as_bytes().len(), 91);
		assert_eq!(&der.as_bytes()[..26], &SPKI_P256_PREFIX);

		let key = der.to_public_key().unwrap();
		assert_eq!(public_key_to_raw(&key).unwrap().as_slice(), raw.as_slice());
	}

	#[test]
	fn test_public_key_rejects_wrong_length() {
		let raw = decode_b64url(UA_PUBLIC).unwrap();
		assert!(matches!(raw_public_key_to_structured(&raw[..64]), Err(Error::InvalidKeyFormat(_))));
		assert!(matches!(raw_public_key_to_structured(&[]), Err(Error::InvalidKeyFormat(_))));
	}

	#[test]
	fn test_public_key_rejects_compressed_prefix() {
		let mut raw = decode_b64url(UA_PUBLIC).unwrap();
		raw[0] = 0x02;
		assert!(matches!(raw_public_key_to_structured(&raw), Err(Error::InvalidKeyFormat(_))));
	}

	#[test]
	fn test_public_key_off_curve_fails_on_load() {
		let mut raw = decode_b64url(UA_PUBLIC).unwrap();
		raw[64] ^= 0x01;
		let der = raw_public_key_to_structured(&raw).unwrap();
		assert!(der.to_public_key().is_err());
	}

	#[test]
	fn test_private_scalar_roundtrip() {
		let raw = decode_b64url(AS_PRIVATE).unwrap();
		let der = raw_private_scalar_to_structured(&raw).unwrap();
		assert_eq!(der.as_bytes().len(), 51);

		let secret = der.to_secret_key().unwrap();
		let public = public_key_to_raw(&secret.public_key()).unwrap();
		assert_eq!(public.as_slice(), decode_b64url(AS_PUBLIC).unwrap().as_slice());
	}

	#[test]
	fn test_private_scalar_rejects_wrong_length() {
		assert!(matches!(
			raw_private_scalar_to_structured(&[1u8; 31]),
			Err(Error::InvalidKeyFormat(_))
		));
	}

	#[test]
	fn test_private_scalar_rejects_zero() {
		let der = raw_private_scalar_to_structured(&[0u8; 32]).unwrap();
		assert!(der.to_secret_key().is_err());
	}

	#[test]
	fn test_der_signature_plain() {
		// r and s both 32 bytes, high bit clear
		let mut der = vec![0x30, 0x44, 0x02, 0x20];
		der.extend_from_slice(&[0x11; 32]);
		der.extend_from_slice(&[0x02, 0x20]);
		der.extend_from_slice(&[0x22; 32]);

		let raw = der_signature_to_raw(&der).unwrap();
		assert_eq!(&raw[..32], &[0x11; 32]);
		assert_eq!(&raw[32..], &[0x22; 32]);
	}

	#[test]
	fn test_der_signature_strips_sign_padding() {
		// r has a 0x00 sign byte, s is short and must be left padded
		let mut der = vec![0x30, 0x25, 0x02, 0x21, 0x00];
		der.extend_from_slice(&[0xff; 32]);
		der.extend_from_slice(&[0x02, 0x02, 0x01, 0x02]);
		der[1] = u8::try_from(der.len() - 2).unwrap();

		let raw = der_signature_to_raw(&der).unwrap();
		assert_eq!(&raw[..32], &[0xff; 32]);
		assert_eq!(&raw[32..62], &[0u8; 30]);
		assert_eq!(&raw[62..], &[0x01, 0x02]);
	}

	#[test]
	fn test_der_signature_malformed() {
		assert!(matches!(der_signature_to_raw(&[]), Err(Error::MalformedSignature)));
		// wrong outer tag
		assert!(matches!(
			der_signature_to_raw(&[0x31, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]),
			Err(Error::MalformedSignature)
		));
		// length runs past the end
		assert!(matches!(
			der_signature_to_raw(&[0x30, 0x06, 0x02, 0x05, 0x01]),
			Err(Error::MalformedSignature)
		));
		// missing s
		assert!(matches!(
			der_signature_to_raw(&[0x30, 0x03, 0x02, 0x01, 0x01]),
			Err(Error::MalformedSignature)
		));
		// trailing garbage after the sequence
		assert!(matches!(
			der_signature_to_raw(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01, 0x00]),
			Err(Error::MalformedSignature)
		));
		// integer wider than 32 significant bytes
		let mut der = vec![0x30, 0x27, 0x02, 0x22, 0x00];
		der.extend_from_slice(&[0x7f; 33]);
		der.extend_from_slice(&[0x02, 0x01, 0x01]);
		assert!(matches!(der_signature_to_raw(&der), Err(Error::MalformedSignature)));
	}

	#[test]
	fn test_der_signature_from_signer() {
		use p256::ecdsa::{signature::Signer, DerSignature, Signature, SigningKey};

		let raw_key = decode_b64url(AS_PRIVATE).unwrap();
		let signing_key = SigningKey::from_slice(&raw_key).unwrap();
		let der: DerSignature = signing_key.sign(b"signing input");
		let fixed: Signature = signing_key.sign(b"signing input");

		let raw = der_signature_to_raw(der.as_bytes()).unwrap();
		assert_eq!(raw.as_slice(), fixed.to_bytes().as_slice());
	}
}

// vim: ts=4
