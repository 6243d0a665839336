//! Push service - wires the dispatcher to subscription storage and configuration

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigProvider;
use crate::prelude::*;
use crate::push::codec;
use crate::push::{audience_from_endpoint, Dispatcher, DispatcherOpts, HyperTransport, PushTransport};
use crate::subscription_adapter::{BrowserSubscription, PushSubscription, SubscriptionAdapter};
use crate::utils::{decode_b64url, truncate_endpoint};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const AUTH_SECRET_LEN: usize = 16;

/// Install the `tracing` subscriber, filtered by `RUST_LOG`. Call once.
pub fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();
}

/// A browser asking to receive notifications
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
	pub user: UserId,
	pub tenant: Option<TenantId>,
	pub subscription: BrowserSubscription,
	pub user_agent: Option<Box<str>>,
	/// Replaces the stored topics when given
	pub topics: Option<Vec<Box<str>>>,
}

pub struct PushServiceBuilder {
	opts: DispatcherOpts,
	config_provider: Option<Arc<dyn ConfigProvider>>,
	subscription_adapter: Option<Arc<dyn SubscriptionAdapter>>,
	transport: Option<Arc<dyn PushTransport>>,
	cancel: Option<CancellationToken>,
}

impl PushServiceBuilder {
	pub fn new() -> Self {
		PushServiceBuilder {
			opts: DispatcherOpts::default(),
			config_provider: None,
			subscription_adapter: None,
			transport: None,
			cancel: None,
		}
	}

	// Opts
	pub fn ttl(&mut self, ttl: u32) -> &mut Self {
		self.opts.ttl = ttl;
		self
	}
	pub fn connect_timeout(&mut self, timeout: Duration) -> &mut Self {
		self.opts.connect_timeout = timeout;
		self
	}
	pub fn request_timeout(&mut self, timeout: Duration) -> &mut Self {
		self.opts.request_timeout = timeout;
		self
	}
	pub fn concurrency(&mut self, concurrency: usize) -> &mut Self {
		self.opts.concurrency = concurrency;
		self
	}
	pub fn jwt_cache(&mut self, enabled: bool) -> &mut Self {
		self.opts.jwt_cache = enabled;
		self
	}
	pub fn jwt_cache_capacity(&mut self, capacity: usize) -> &mut Self {
		self.opts.jwt_cache_capacity = capacity;
		self
	}
	pub fn opts(&mut self, opts: DispatcherOpts) -> &mut Self {
		self.opts = opts;
		self
	}
	pub fn cancel_token(&mut self, cancel: CancellationToken) -> &mut Self {
		self.cancel = Some(cancel);
		self
	}

	// Collaborators
	pub fn config_provider(&mut self, config_provider: Arc<dyn ConfigProvider>) -> &mut Self {
		self.config_provider = Some(config_provider);
		self
	}
	pub fn subscription_adapter(
		&mut self,
		subscription_adapter: Arc<dyn SubscriptionAdapter>,
	) -> &mut Self {
		self.subscription_adapter = Some(subscription_adapter);
		self
	}
	pub fn transport(&mut self, transport: Arc<dyn PushTransport>) -> &mut Self {
		self.transport = Some(transport);
		self
	}

	/// Load and validate the VAPID keys and assemble the service
	pub fn build(&self) -> ClResult<PushService> {
		let Some(config_provider) = &self.config_provider else {
			error!("FATAL: No config provider configured");
			return Err(Error::Internal("No config provider configured".to_string()));
		};
		let Some(subscription_adapter) = &self.subscription_adapter else {
			error!("FATAL: No subscription adapter configured");
			return Err(Error::Internal("No subscription adapter configured".to_string()));
		};

		let keys = config_provider.vapid_keys().map_err(|e| {
			error!("FATAL: Cannot load VAPID keys: {}", e);
			e
		})?;
		keys.validate().map_err(|e| {
			error!("FATAL: Invalid VAPID keys: {}", e);
			e
		})?;

		let transport: Arc<dyn PushTransport> = match &self.transport {
			Some(transport) => transport.clone(),
			None => Arc::new(HyperTransport::new(
				self.opts.connect_timeout,
				self.opts.request_timeout,
			)?),
		};

		info!(
			"Push service ready (VAPID subject {}, concurrency {}, TTL {}s)",
			keys.subject, self.opts.concurrency, self.opts.ttl
		);
		Ok(PushService {
			dispatcher: Arc::new(Dispatcher::new(keys, transport, self.opts.clone())),
			subscription_adapter: subscription_adapter.clone(),
			cancel: self.cancel.clone().unwrap_or_default(),
		})
	}
}

impl Default for PushServiceBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Application-level push API
///
/// Cheap to clone; clones share the dispatcher, its JWT cache and the
/// cancellation token.
#[derive(Debug, Clone)]
pub struct PushService {
	dispatcher: Arc<Dispatcher>,
	subscription_adapter: Arc<dyn SubscriptionAdapter>,
	cancel: CancellationToken,
}

impl PushService {
	pub fn builder() -> PushServiceBuilder {
		PushServiceBuilder::new()
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	/// Public VAPID key for `PushManager.subscribe({ applicationServerKey })`
	pub fn vapid_public_key(&self) -> &str {
		self.dispatcher.vapid_public_key()
	}

	pub fn cancel_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	/// Stop starting new sends; in-flight ones finish
	pub fn shutdown(&self) {
		info!("Push service shutting down");
		self.cancel.cancel();
	}

	/// Notify every active subscription of a user
	pub async fn send_to_user(
		&self,
		user: UserId,
		title: &str,
		body: &str,
		data: serde_json::Map<String, serde_json::Value>,
	) -> ClResult<BatchResult> {
		let subscriptions = self.subscription_adapter.list_active_by_user(user).await?;
		let payload = NotificationPayload::new(title, body, data);
		let batch = self.deliver_and_persist(subscriptions, &payload).await;
		info!(user = %user, "Push notifications sent: {}/{}", batch.sent_count, batch.results.len());
		Ok(batch)
	}

	/// Notify every active subscription of a tenant
	pub async fn send_to_tenant(
		&self,
		tenant: TenantId,
		title: &str,
		body: &str,
		data: serde_json::Map<String, serde_json::Value>,
	) -> ClResult<BatchResult> {
		let subscriptions = self.subscription_adapter.list_active_by_tenant(tenant).await?;
		let payload = NotificationPayload::new(title, body, data);
		let batch = self.deliver_and_persist(subscriptions, &payload).await;
		info!(
			tenant = %tenant,
			"Push notifications sent: {}/{}",
			batch.sent_count,
			batch.results.len()
		);
		Ok(batch)
	}

	/// Notify every active subscription following a topic
	pub async fn send_to_topic(
		&self,
		topic: &str,
		title: &str,
		body: &str,
		data: serde_json::Map<String, serde_json::Value>,
	) -> ClResult<BatchResult> {
		let subscriptions = self.subscription_adapter.list_active_by_topic(topic).await?;
		let payload = NotificationPayload::new(title, body, data);
		let batch = self.deliver_and_persist(subscriptions, &payload).await;
		info!(topic = %topic, "Push notifications sent: {}/{}", batch.sent_count, batch.results.len());
		Ok(batch)
	}

	/// Send to a single caller-held subscription
	pub async fn send_to_one(
		&self,
		subscription: &mut PushSubscription,
		title: &str,
		body: &str,
		data: serde_json::Map<String, serde_json::Value>,
	) -> SendOutcome {
		let outcome = self.dispatcher.send_to_one(subscription, title, body, data).await;
		if outcome.is_invalidated() {
			self.persist_inactive(subscription).await;
		}
		outcome
	}

	/// Send to caller-held subscriptions
	pub async fn send_to_many(
		&self,
		subscriptions: &mut [PushSubscription],
		title: &str,
		body: &str,
		data: serde_json::Map<String, serde_json::Value>,
	) -> BatchResult {
		let payload = NotificationPayload::new(title, body, data);
		let batch = self.dispatcher.send_to_many(subscriptions, &payload, &self.cancel).await;
		for (subscription, outcome) in subscriptions.iter().zip(&batch.results) {
			if outcome.is_invalidated() {
				self.persist_inactive(subscription).await;
			}
		}
		batch
	}

	/// Register a browser subscription, or reactivate and refresh it when the
	/// user already registered this endpoint
	pub async fn subscribe(&self, request: SubscribeRequest) -> ClResult<SubscriptionId> {
		let SubscribeRequest { user, tenant, subscription, user_agent, topics } = request;
		validate_browser_subscription(&subscription)?;

		let now = Timestamp::now();
		let endpoint = subscription.endpoint;
		let existing =
			self.subscription_adapter.read_by_user_endpoint(user, &endpoint).await?;

		let (record, reactivated) = match existing {
			Some(mut record) => {
				record.p256dh = subscription.keys.p256dh;
				record.auth = subscription.keys.auth;
				record.active = true;
				record.updated_at = now;
				if tenant.is_some() {
					record.tenant = tenant;
				}
				if user_agent.is_some() {
					record.user_agent = user_agent;
				}
				if let Some(topics) = topics {
					record.topics = topics;
				}
				(record, true)
			}
			None => {
				let mut record = PushSubscription::new(
					user,
					endpoint,
					subscription.keys.p256dh,
					subscription.keys.auth,
				);
				record.tenant = tenant;
				record.user_agent = user_agent;
				record.topics = topics.unwrap_or_default();
				(record, false)
			}
		};

		let id = self.subscription_adapter.save(&record).await?;
		info!(
			user = %user,
			subscription_id = %id,
			endpoint = %truncate_endpoint(&record.endpoint),
			"Push subscription {}",
			if reactivated { "reactivated" } else { "created" }
		);
		Ok(id)
	}

	/// Deactivate every subscription registered for an endpoint
	///
	/// Returns `false` when there was nothing active to deactivate.
	pub async fn unsubscribe(&self, endpoint: &str) -> ClResult<bool> {
		let subscriptions = self.subscription_adapter.list_by_endpoint(endpoint).await?;
		let mut deactivated = false;
		for subscription in subscriptions.iter().filter(|s| s.active) {
			self.subscription_adapter.mark_inactive(subscription).await?;
			deactivated = true;
		}
		if deactivated {
			info!(endpoint = %truncate_endpoint(endpoint), "Push subscription removed");
		}
		Ok(deactivated)
	}

	async fn deliver_and_persist(
		&self,
		mut subscriptions: Vec<PushSubscription>,
		payload: &NotificationPayload,
	) -> BatchResult {
		if subscriptions.is_empty() {
			debug!("No active push subscriptions");
			return BatchResult::default();
		}

		let batch = self.dispatcher.send_to_many(&mut subscriptions, payload, &self.cancel).await;
		for (subscription, outcome) in subscriptions.iter().zip(&batch.results) {
			if outcome.is_invalidated() {
				self.persist_inactive(subscription).await;
			}
		}
		batch
	}

	async fn persist_inactive(&self, subscription: &PushSubscription) {
		if let Err(e) = self.subscription_adapter.mark_inactive(subscription).await {
			warn!(
				endpoint = %truncate_endpoint(&subscription.endpoint),
				error = %e,
				"Failed to deactivate push subscription"
			);
		}
	}
}

/// Reject subscriptions whose keys could never be used for encryption
fn validate_browser_subscription(subscription: &BrowserSubscription) -> ClResult<()> {
	let endpoint = subscription.endpoint.as_ref();
	if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
		return Err(Error::ValidationError("push endpoint must be an http(s) URL".into()));
	}
	audience_from_endpoint(endpoint)?;

	let p256dh = decode_b64url(&subscription.keys.p256dh)
		.map_err(|_| Error::ValidationError("p256dh is not base64url".into()))?;
	codec::raw_public_key_to_structured(&p256dh)
		.and_then(|der| der.to_public_key())
		.map_err(|e| Error::ValidationError(format!("p256dh: {}", e)))?;

	let auth = decode_b64url(&subscription.keys.auth)
		.map_err(|_| Error::ValidationError("auth is not base64url".into()))?;
	if auth.len() != AUTH_SECRET_LEN {
		return Err(Error::ValidationError(format!(
			"auth secret must be {} bytes, got {}",
			AUTH_SECRET_LEN,
			auth.len()
		)));
	}
	Ok(())
}


// vim: ts=4
