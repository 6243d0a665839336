//! Subscription lifecycle against the in-memory adapter
//!
//! Tests for:
//! 1. Id assignment and (user, endpoint) uniqueness
//! 2. Active-only listing by user, tenant and topic
//! 3. Deactivation by id and by (user, endpoint)
#![allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]

#[cfg(test)]
mod tests {
	use pushgate_subscription_adapter_memory::SubscriptionAdapterMemory;
	use pushgate_types::prelude::*;
	use pushgate_types::subscription_adapter::{PushSubscription, SubscriptionAdapter};

	fn subscription(user: u64, endpoint: &str) -> PushSubscription {
		PushSubscription::new(UserId(user), endpoint, "p256dh", "auth")
	}

	#[tokio::test]
	async fn test_save_assigns_ids() {
		let adapter = SubscriptionAdapterMemory::new();

		let first = adapter.save(&subscription(1, "https://push.example/a")).await.unwrap();
		let second = adapter.save(&subscription(1, "https://push.example/b")).await.unwrap();
		assert_ne!(first, second);
		assert_eq!(adapter.len(), 2);

		let stored = adapter
			.read_by_user_endpoint(UserId(1), "https://push.example/a")
			.await
			.unwrap()
			.expect("subscription should exist");
		assert_eq!(stored.id, Some(first));
	}

	#[tokio::test]
	async fn test_user_endpoint_is_unique() {
		let adapter = SubscriptionAdapterMemory::new();
		adapter.save(&subscription(1, "https://push.example/a")).await.unwrap();

		let duplicate = adapter.save(&subscription(1, "https://push.example/a")).await;
		assert!(matches!(duplicate, Err(Error::ValidationError(_))));

		// another user may share the endpoint
		adapter.save(&subscription(2, "https://push.example/a")).await.unwrap();
		let shared = adapter.list_by_endpoint("https://push.example/a").await.unwrap();
		assert_eq!(shared.len(), 2);
	}

	#[tokio::test]
	async fn test_update_existing() {
		let adapter = SubscriptionAdapterMemory::new();
		let id = adapter.save(&subscription(1, "https://push.example/a")).await.unwrap();

		let mut sub = adapter
			.read_by_user_endpoint(UserId(1), "https://push.example/a")
			.await
			.unwrap()
			.unwrap();
		sub.p256dh = "rotated".into();
		assert_eq!(adapter.save(&sub).await.unwrap(), id);
		assert_eq!(adapter.len(), 1);

		let mut unknown = subscription(1, "https://push.example/z");
		unknown.id = Some(SubscriptionId(999));
		assert!(matches!(adapter.save(&unknown).await, Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn test_list_active_filters() {
		let adapter = SubscriptionAdapterMemory::new();

		let mut news = subscription(1, "https://push.example/a");
		news.tenant = Some(TenantId(7));
		news.topics = vec!["news".into()];
		adapter.save(&news).await.unwrap();

		let mut other = subscription(2, "https://push.example/b");
		other.tenant = Some(TenantId(7));
		adapter.save(&other).await.unwrap();

		let mut stale = subscription(1, "https://push.example/c");
		stale.active = false;
		stale.topics = vec!["news".into()];
		adapter.save(&stale).await.unwrap();

		assert_eq!(adapter.list_active_by_user(UserId(1)).await.unwrap().len(), 1);
		assert_eq!(adapter.list_active_by_tenant(TenantId(7)).await.unwrap().len(), 2);
		assert_eq!(adapter.list_active_by_tenant(TenantId(8)).await.unwrap().len(), 0);
		let topic = adapter.list_active_by_topic("news").await.unwrap();
		assert_eq!(topic.len(), 1);
		assert_eq!(topic[0].endpoint.as_ref(), "https://push.example/a");
	}

	#[tokio::test]
	async fn test_mark_inactive() {
		let adapter = SubscriptionAdapterMemory::new();
		adapter.save(&subscription(1, "https://push.example/a")).await.unwrap();
		adapter.save(&subscription(1, "https://push.example/b")).await.unwrap();

		// by (user, endpoint), the record carries no id
		adapter.mark_inactive(&subscription(1, "https://push.example/a")).await.unwrap();

		// by id
		let b = adapter
			.read_by_user_endpoint(UserId(1), "https://push.example/b")
			.await
			.unwrap()
			.unwrap();
		adapter.mark_inactive(&b).await.unwrap();

		assert!(adapter.list_active_by_user(UserId(1)).await.unwrap().is_empty());
		assert_eq!(adapter.len(), 2);

		let missing = adapter.mark_inactive(&subscription(3, "https://push.example/x")).await;
		assert!(matches!(missing, Err(Error::NotFound)));
	}
}

// vim: ts=4
