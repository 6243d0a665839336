//! Minimal Pushgate sender
//!
//! `pushgate-basic-sender keygen` prints a fresh VAPID key pair.
//! Without arguments it registers every browser subscription found in
//! `SUBSCRIPTIONS_FILE` (a JSON array of `PushSubscription.toJSON()` values)
//! and sends them one notification. VAPID keys come from the environment.

use std::{env, path, sync::Arc};

use pushgate::config::EnvConfigProvider;
use pushgate::prelude::*;
use pushgate::push::generate_vapid_keys;
use pushgate::subscription_adapter::BrowserSubscription;
use pushgate::SubscribeRequest;
use pushgate_subscription_adapter_memory::SubscriptionAdapterMemory;

/// All subscriptions from the file are registered to this user
const SENDER_USER: UserId = UserId(1);

pub struct Config {
	pub subscriptions_file: path::PathBuf,
	pub title: String,
	pub body: String,
	pub url: Option<String>,
	pub concurrency: usize,
	pub subject: String,
}

impl Config {
	fn from_env() -> Self {
		Config {
			subscriptions_file: path::PathBuf::from(
				env::var("SUBSCRIPTIONS_FILE").unwrap_or("./subscriptions.json".to_string()),
			),
			title: env::var("PUSH_TITLE").unwrap_or("Pushgate".to_string()),
			body: env::var("PUSH_BODY").unwrap_or("Hello from Pushgate".to_string()),
			url: env::var("PUSH_URL").ok(),
			concurrency: env::var("PUSH_CONCURRENCY")
				.ok()
				.and_then(|c| c.parse().ok())
				.unwrap_or(8),
			subject: env::var("VAPID_SUBJECT").unwrap_or("mailto:admin@localhost".to_string()),
		}
	}
}

#[tokio::main]
async fn main() -> ClResult<()> {
	pushgate::init_tracing();
	let config = Config::from_env();

	let res = match env::args().nth(1).as_deref() {
		Some("keygen") => keygen(&config),
		Some(other) => Err(Error::ValidationError(format!("unknown command: {}", other))),
		None => send(&config).await,
	};
	if let Err(e) = &res {
		error!("FATAL: {}", e);
	}
	res
}

fn keygen(config: &Config) -> ClResult<()> {
	let keys = generate_vapid_keys(&config.subject)?;
	println!("VAPID_PUBLIC_KEY={}", keys.public_key);
	println!("VAPID_PRIVATE_KEY={}", &*keys.private_key);
	println!("VAPID_SUBJECT={}", keys.subject);
	Ok(())
}

async fn send(config: &Config) -> ClResult<()> {
	info!("Pushgate basic sender V{}", pushgate::VERSION);

	let raw = tokio::fs::read(&config.subscriptions_file).await?;
	let subscriptions: Vec<BrowserSubscription> = serde_json::from_slice(&raw)?;
	info!(
		"Loaded {} subscriptions from {}",
		subscriptions.len(),
		config.subscriptions_file.display()
	);

	let service = PushService::builder()
		.config_provider(Arc::new(EnvConfigProvider))
		.subscription_adapter(Arc::new(SubscriptionAdapterMemory::new()))
		.concurrency(config.concurrency)
		.build()?;

	for subscription in subscriptions {
		let endpoint = subscription.endpoint.clone();
		let request = SubscribeRequest {
			user: SENDER_USER,
			tenant: None,
			subscription,
			user_agent: None,
			topics: None,
		};
		if let Err(e) = service.subscribe(request).await {
			warn!(endpoint = %endpoint, error = %e, "Skipping subscription");
		}
	}

	let cancel = service.cancel_token();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!("Interrupted, finishing in-flight sends");
			cancel.cancel();
		}
	});

	let mut data = serde_json::Map::new();
	if let Some(url) = &config.url {
		data.insert("url".to_string(), url.clone().into());
	}

	let batch = service.send_to_user(SENDER_USER, &config.title, &config.body, data).await?;
	info!(
		"Done: {} sent, {} gone, {} failed",
		batch.sent_count,
		batch.invalidated_count(),
		batch.failed_count()
	);
	Ok(())
}

// vim: ts=4
