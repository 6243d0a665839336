//! In-memory subscription adapter
//!
//! Keeps push subscriptions in a `BTreeMap` behind a lock. Nothing is
//! persisted; meant for embedding, demos and tests.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use pushgate_types::prelude::*;
use pushgate_types::subscription_adapter::{PushSubscription, SubscriptionAdapter};

#[derive(Debug, Default)]
struct Store {
	next_id: u64,
	subscriptions: BTreeMap<SubscriptionId, PushSubscription>,
}

impl Store {
	fn find_by_user_endpoint(&self, user: UserId, endpoint: &str) -> Option<&PushSubscription> {
		self.subscriptions.values().find(|s| s.user == user && s.endpoint.as_ref() == endpoint)
	}

	fn list_active(&self, filter: impl Fn(&PushSubscription) -> bool) -> Vec<PushSubscription> {
		self.subscriptions.values().filter(|s| s.active && filter(s)).cloned().collect()
	}
}

#[derive(Debug, Default)]
pub struct SubscriptionAdapterMemory {
	store: RwLock<Store>,
}

impl SubscriptionAdapterMemory {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored subscriptions, active or not
	pub fn len(&self) -> usize {
		self.store.read().subscriptions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.store.read().subscriptions.is_empty()
	}
}

#[async_trait]
impl SubscriptionAdapter for SubscriptionAdapterMemory {
	async fn list_active_by_user(&self, user: UserId) -> ClResult<Vec<PushSubscription>> {
		Ok(self.store.read().list_active(|s| s.user == user))
	}

	async fn list_active_by_tenant(&self, tenant: TenantId) -> ClResult<Vec<PushSubscription>> {
		Ok(self.store.read().list_active(|s| s.tenant == Some(tenant)))
	}

	async fn list_active_by_topic(&self, topic: &str) -> ClResult<Vec<PushSubscription>> {
		Ok(self.store.read().list_active(|s| s.has_topic(topic)))
	}

	async fn read_by_user_endpoint(
		&self,
		user: UserId,
		endpoint: &str,
	) -> ClResult<Option<PushSubscription>> {
		Ok(self.store.read().find_by_user_endpoint(user, endpoint).cloned())
	}

	async fn list_by_endpoint(&self, endpoint: &str) -> ClResult<Vec<PushSubscription>> {
		let store = self.store.read();
		Ok(store
			.subscriptions
			.values()
			.filter(|s| s.endpoint.as_ref() == endpoint)
			.cloned()
			.collect())
	}

	async fn save(&self, subscription: &PushSubscription) -> ClResult<SubscriptionId> {
		let mut store = self.store.write();

		if let Some(existing) = store.find_by_user_endpoint(subscription.user, &subscription.endpoint)
		{
			if existing.id != subscription.id {
				return Err(Error::ValidationError(format!(
					"user {} already has a subscription for this endpoint",
					subscription.user
				)));
			}
		}

		let id = match subscription.id {
			Some(id) if store.subscriptions.contains_key(&id) => id,
			Some(_) => return Err(Error::NotFound),
			None => {
				store.next_id += 1;
				SubscriptionId(store.next_id)
			}
		};

		let mut record = subscription.clone();
		record.id = Some(id);
		store.subscriptions.insert(id, record);
		tracing::debug!(id = %id, user = %subscription.user, "Stored push subscription");
		Ok(id)
	}

	async fn mark_inactive(&self, subscription: &PushSubscription) -> ClResult<()> {
		let mut store = self.store.write();

		let id = match subscription.id {
			Some(id) => id,
			None => store
				.find_by_user_endpoint(subscription.user, &subscription.endpoint)
				.and_then(|s| s.id)
				.ok_or(Error::NotFound)?,
		};
		let record = store.subscriptions.get_mut(&id).ok_or(Error::NotFound)?;
		record.active = false;
		record.updated_at = Timestamp::now();
		Ok(())
	}
}

// vim: ts=4
