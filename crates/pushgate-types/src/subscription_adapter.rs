//! Adapter that stores browser push subscriptions.
//!
//! Pushgate never owns persistence; it reads and writes subscription records
//! through this trait. Implementations must keep the (`user`, `endpoint`)
//! pair unique and must never return inactive records from the `list_active_*`
//! queries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;

use crate::prelude::*;

/// A single browser registration
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
	/// Assigned by the adapter on first save
	pub id: Option<SubscriptionId>,
	pub user: UserId,
	pub tenant: Option<TenantId>,
	/// Push service URL
	pub endpoint: Box<str>,
	/// Subscriber P-256 public key (65 bytes uncompressed, base64url)
	pub p256dh: Box<str>,
	/// Subscriber auth secret (16 bytes, base64url)
	pub auth: Box<str>,
	pub active: bool,
	pub user_agent: Option<Box<str>>,
	#[serde(default)]
	pub topics: Vec<Box<str>>,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

impl PushSubscription {
	pub fn new(
		user: UserId,
		endpoint: impl Into<Box<str>>,
		p256dh: impl Into<Box<str>>,
		auth: impl Into<Box<str>>,
	) -> Self {
		let now = Timestamp::now();
		Self {
			id: None,
			user,
			tenant: None,
			endpoint: endpoint.into(),
			p256dh: p256dh.into(),
			auth: auth.into(),
			active: true,
			user_agent: None,
			topics: Vec::new(),
			created_at: now,
			updated_at: now,
		}
	}

	pub fn has_topic(&self, topic: &str) -> bool {
		self.topics.iter().any(|t| t.as_ref() == topic)
	}
}

/// Browser's PushSubscription JSON (`PushSubscription.toJSON()`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSubscription {
	/// Push endpoint URL
	pub endpoint: Box<str>,
	/// Expiration time (Unix timestamp in ms, from browser)
	#[serde(rename = "expirationTime", default)]
	pub expiration_time: Option<i64>,
	pub keys: BrowserSubscriptionKeys,
}

/// Browser subscription keys format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSubscriptionKeys {
	/// P-256 public key (base64url encoded)
	pub p256dh: Box<str>,
	/// Auth secret (base64url encoded)
	pub auth: Box<str>,
}

#[async_trait]
pub trait SubscriptionAdapter: Debug + Send + Sync {
	/// Active subscriptions owned by a user
	async fn list_active_by_user(&self, user: UserId) -> ClResult<Vec<PushSubscription>>;

	/// Active subscriptions belonging to a tenant
	async fn list_active_by_tenant(&self, tenant: TenantId) -> ClResult<Vec<PushSubscription>>;

	/// Active subscriptions following a topic
	async fn list_active_by_topic(&self, topic: &str) -> ClResult<Vec<PushSubscription>>;

	/// Any subscription (active or not) for a user and endpoint
	async fn read_by_user_endpoint(
		&self,
		user: UserId,
		endpoint: &str,
	) -> ClResult<Option<PushSubscription>>;

	/// All subscriptions (of any user) registered for an endpoint
	async fn list_by_endpoint(&self, endpoint: &str) -> ClResult<Vec<PushSubscription>>;

	/// Insert or update a subscription, returning its id
	async fn save(&self, subscription: &PushSubscription) -> ClResult<SubscriptionId>;

	/// Flag a subscription as inactive
	async fn mark_inactive(&self, subscription: &PushSubscription) -> ClResult<()>;
}


// vim: ts=4
