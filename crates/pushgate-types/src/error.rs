//! Error type shared by every Pushgate crate.
//!
//! The delivery variants are grouped so callers can decide between retrying,
//! deactivating a subscription, or aborting a whole batch without matching on
//! error strings.

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	Parse,
	ValidationError(String),
	ConfigError(String),
	Internal(String),

	// key and signature codec
	InvalidKeyFormat(String),
	MalformedSignature,

	// subscriber data
	InvalidSubscriptionKey(String),
	KeyAgreementFailed,

	// crypto infrastructure
	EncryptionFailed(String),
	/// Plaintext does not fit into a single record
	PayloadTooLarge(usize),
	CryptoError(String),
	VapidSigningFailed(String),

	// delivery
	TransientDelivery(String),
	Timeout,
	PermanentDelivery(u16),
	/// The send was never started (batch cancelled or short-circuited)
	Aborted,

	// externals
	Io(std::io::Error),
}

impl Error {
	/// Stored subscriber keys are unusable. Retrying will not help; the caller
	/// should consider deactivating the subscription.
	pub fn is_subscription_data_error(&self) -> bool {
		matches!(self, Error::InvalidSubscriptionKey(_) | Error::KeyAgreementFailed)
	}

	/// Systemic misconfiguration that will recur for every subscription.
	pub fn is_batch_fatal(&self) -> bool {
		matches!(self, Error::VapidSigningFailed(_))
	}

	/// Signing or encryption failed before anything was sent.
	pub fn is_crypto(&self) -> bool {
		matches!(
			self,
			Error::InvalidKeyFormat(_)
				| Error::MalformedSignature
				| Error::InvalidSubscriptionKey(_)
				| Error::KeyAgreementFailed
				| Error::EncryptionFailed(_)
				| Error::PayloadTooLarge(_)
				| Error::CryptoError(_)
				| Error::VapidSigningFailed(_)
		)
	}

	/// Eligible for a caller-driven retry with the same subscription and payload.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Error::TransientDelivery(_)
				| Error::Timeout
				| Error::Aborted
				| Error::CryptoError(_)
				| Error::EncryptionFailed(_)
		)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::Parse => write!(f, "parse error"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::InvalidKeyFormat(msg) => write!(f, "invalid key format: {}", msg),
			Error::MalformedSignature => write!(f, "malformed DER signature"),
			Error::InvalidSubscriptionKey(msg) => write!(f, "invalid subscription key: {}", msg),
			Error::KeyAgreementFailed => write!(f, "key agreement failed"),
			Error::EncryptionFailed(msg) => write!(f, "encryption failed: {}", msg),
			Error::PayloadTooLarge(len) => {
				write!(f, "payload of {} bytes does not fit into one record", len)
			}
			Error::CryptoError(msg) => write!(f, "crypto error: {}", msg),
			Error::VapidSigningFailed(msg) => write!(f, "VAPID signing failed: {}", msg),
			Error::TransientDelivery(msg) => write!(f, "transient delivery error: {}", msg),
			Error::Timeout => write!(f, "push request timed out"),
			Error::PermanentDelivery(status) => {
				write!(f, "subscription gone (HTTP {})", status)
			}
			Error::Aborted => write!(f, "send aborted before start"),
			Error::Io(err) => write!(f, "I/O error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::debug!("serde_json error: {}", err);
		Self::Parse
	}
}

impl From<base64::DecodeError> for Error {
	fn from(err: base64::DecodeError) -> Self {
		tracing::debug!("base64 decode error: {}", err);
		Self::Parse
	}
}


// vim: ts=4
