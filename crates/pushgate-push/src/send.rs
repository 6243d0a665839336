//! Web Push notification sending
//!
//! The [`Dispatcher`] turns a notification into one authenticated, encrypted
//! POST per subscription and classifies the push service response:
//!
//! - 200/201: delivered
//! - 404/410: the subscription is gone and is flagged inactive
//! - anything else, timeouts and network errors: transient, left to the caller
//!
//! Batches run with bounded concurrency and stop starting new sends once the
//! cancellation token fires or VAPID signing fails.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::ece;
use crate::prelude::*;
use crate::transport::{
	HyperTransport, PushRequest, PushTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
use crate::vapid::{self, VapidCache};
use pushgate_types::config::VapidKeyMaterial;
use pushgate_types::subscription_adapter::PushSubscription;
use pushgate_types::utils::{decode_b64url, truncate_endpoint};

/// Default push message TTL (24 hours)
pub const DEFAULT_TTL: u32 = 86400;

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Notification payload delivered to the service worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
	pub title: String,
	pub body: String,
	/// Free-form data for the service worker (click target, ids, ...)
	#[serde(default)]
	pub data: serde_json::Map<String, serde_json::Value>,
	/// Creation time (Unix seconds)
	pub timestamp: Timestamp,
}

impl NotificationPayload {
	pub fn new(
		title: impl Into<String>,
		body: impl Into<String>,
		data: serde_json::Map<String, serde_json::Value>,
	) -> Self {
		Self { title: title.into(), body: body.into(), data, timestamp: Timestamp::now() }
	}
}

/// Result of one delivery attempt
#[derive(Debug)]
pub enum SendOutcome {
	/// Accepted by the push service
	Sent,
	/// Subscription no longer exists; it has been flagged inactive
	Invalidated { status: u16 },
	/// Not delivered, subscription untouched
	TransientFailure(Error),
}

impl SendOutcome {
	pub fn is_sent(&self) -> bool {
		matches!(self, SendOutcome::Sent)
	}

	pub fn is_invalidated(&self) -> bool {
		matches!(self, SendOutcome::Invalidated { .. })
	}

	pub fn error(&self) -> Option<&Error> {
		match self {
			SendOutcome::TransientFailure(err) => Some(err),
			_ => None,
		}
	}

	pub fn into_result(self) -> ClResult<()> {
		match self {
			SendOutcome::Sent => Ok(()),
			SendOutcome::Invalidated { status } => Err(Error::PermanentDelivery(status)),
			SendOutcome::TransientFailure(err) => Err(err),
		}
	}
}

/// Outcome of a batch, `results` in input order
#[derive(Debug, Default)]
pub struct BatchResult {
	pub sent_count: usize,
	pub results: Vec<SendOutcome>,
}

impl BatchResult {
	pub fn invalidated_count(&self) -> usize {
		self.results.iter().filter(|r| r.is_invalidated()).count()
	}

	pub fn failed_count(&self) -> usize {
		self.results.iter().filter(|r| r.error().is_some()).count()
	}
}

/// Dispatcher tuning
#[derive(Debug, Clone)]
pub struct DispatcherOpts {
	/// `TTL` header value in seconds
	pub ttl: u32,
	pub connect_timeout: Duration,
	/// Total time allowed for one POST, connect included
	pub request_timeout: Duration,
	/// Maximum sends in flight within a batch
	pub concurrency: usize,
	/// Reuse signed VAPID tokens per push service
	pub jwt_cache: bool,
	pub jwt_cache_capacity: usize,
}

impl Default for DispatcherOpts {
	fn default() -> Self {
		Self {
			ttl: DEFAULT_TTL,
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			concurrency: DEFAULT_CONCURRENCY,
			jwt_cache: true,
			jwt_cache_capacity: vapid::DEFAULT_CACHE_CAPACITY,
		}
	}
}

#[derive(Debug)]
pub struct Dispatcher {
	keys: VapidKeyMaterial,
	transport: Arc<dyn PushTransport>,
	opts: DispatcherOpts,
	jwt_cache: Option<VapidCache>,
}

impl Dispatcher {
	pub fn new(
		keys: VapidKeyMaterial,
		transport: Arc<dyn PushTransport>,
		opts: DispatcherOpts,
	) -> Self {
		let jwt_cache = opts.jwt_cache.then(|| VapidCache::new(opts.jwt_cache_capacity));
		Self { keys, transport, opts, jwt_cache }
	}

	/// Dispatcher over the hyper transport configured from `opts`
	pub fn with_hyper(keys: VapidKeyMaterial, opts: DispatcherOpts) -> ClResult<Self> {
		let transport = HyperTransport::new(opts.connect_timeout, opts.request_timeout)?;
		Ok(Self::new(keys, Arc::new(transport), opts))
	}

	pub fn opts(&self) -> &DispatcherOpts {
		&self.opts
	}

	pub fn vapid_public_key(&self) -> &str {
		&self.keys.public_key
	}

	/// Deliver a payload to one subscription
	///
	/// On 404/410 the subscription is flagged inactive in place; persisting
	/// that is up to the caller.
	pub async fn send(
		&self,
		subscription: &mut PushSubscription,
		payload: &NotificationPayload,
	) -> SendOutcome {
		let endpoint = truncate_endpoint(&subscription.endpoint).to_string();
		if !subscription.active {
			debug!(endpoint = %endpoint, "Skipping inactive push subscription");
			return SendOutcome::TransientFailure(Error::ValidationError(
				"subscription is inactive".into(),
			));
		}

		let status = match self.deliver(subscription, payload).await {
			Ok(status) => status,
			Err(err) => {
				if err.is_crypto() {
					error!(endpoint = %endpoint, error = %err, "Push notification not sent");
				} else {
					warn!(endpoint = %endpoint, error = %err, "Push notification delivery failed");
				}
				return SendOutcome::TransientFailure(err);
			}
		};

		match status {
			200 | 201 => {
				debug!(endpoint = %endpoint, status, "Push notification sent");
				SendOutcome::Sent
			}
			404 | 410 => {
				info!(endpoint = %endpoint, status, "Push subscription gone, deactivating");
				subscription.active = false;
				subscription.updated_at = Timestamp::now();
				SendOutcome::Invalidated { status }
			}
			_ => {
				warn!(endpoint = %endpoint, status, "Push service rejected notification");
				SendOutcome::TransientFailure(Error::TransientDelivery(format!("HTTP {}", status)))
			}
		}
	}

	/// Build a payload stamped with the current time and send it
	pub async fn send_to_one(
		&self,
		subscription: &mut PushSubscription,
		title: &str,
		body: &str,
		data: serde_json::Map<String, serde_json::Value>,
	) -> SendOutcome {
		let payload = NotificationPayload::new(title, body, data);
		self.send(subscription, &payload).await
	}

	/// Deliver a payload to many subscriptions
	///
	/// Sends in flight when `cancel` fires are completed; the rest, and every
	/// send after a VAPID signing failure, are reported as
	/// `TransientFailure(Error::Aborted)`.
	pub async fn send_to_many(
		&self,
		subscriptions: &mut [PushSubscription],
		payload: &NotificationPayload,
		cancel: &CancellationToken,
	) -> BatchResult {
		let halted = AtomicBool::new(false);
		let halted = &halted;

		let results: Vec<SendOutcome> = stream::iter(subscriptions.iter_mut())
			.map(move |subscription| async move {
				if cancel.is_cancelled() || halted.load(Ordering::Acquire) {
					return SendOutcome::TransientFailure(Error::Aborted);
				}
				let outcome = self.send(subscription, payload).await;
				if outcome.error().is_some_and(Error::is_batch_fatal) {
					halted.store(true, Ordering::Release);
				}
				outcome
			})
			.buffered(self.opts.concurrency.max(1))
			.collect()
			.await;

		let batch = BatchResult { sent_count: results.iter().filter(|r| r.is_sent()).count(), results };
		if halted.load(Ordering::Acquire) {
			error!("VAPID signing failed, push batch aborted");
		}
		debug!(
			sent = batch.sent_count,
			invalidated = batch.invalidated_count(),
			failed = batch.failed_count(),
			"Push batch finished"
		);
		batch
	}

	async fn deliver(
		&self,
		subscription: &PushSubscription,
		payload: &NotificationPayload,
	) -> ClResult<u16> {
		let audience = vapid::audience_from_endpoint(&subscription.endpoint)?;
		let authorization = match &self.jwt_cache {
			Some(cache) => cache.authorization_header(&audience, &self.keys)?,
			None => vapid::build_authorization_header(&audience, &self.keys)?,
		};

		let p256dh = decode_b64url(&subscription.p256dh)
			.map_err(|_| Error::InvalidSubscriptionKey("p256dh is not base64url".into()))?;
		let auth = decode_b64url(&subscription.auth)
			.map_err(|_| Error::InvalidSubscriptionKey("auth is not base64url".into()))?;
		let plaintext = serde_json::to_vec(payload)
			.map_err(|e| Error::EncryptionFailed(format!("payload serialization: {}", e)))?;
		let message = ece::encrypt(&plaintext, &p256dh, &auth)?;

		self.transport
			.post(PushRequest {
				endpoint: subscription.endpoint.to_string(),
				authorization,
				ttl: self.opts.ttl,
				body: message.into_bytes(),
			})
			.await
	}
}


// vim: ts=4
