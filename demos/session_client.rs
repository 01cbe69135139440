//! Demonstrates the reqwest-backed session client against a mock API whose access token has
//! already expired: the first call is refreshed once and replayed transparently.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use auth_session::{
	ReqwestSessionClient, SessionConfig,
	auth::Credential,
	session::{CallbackObserver, SessionTermination},
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/jobs").header("authorization", "Bearer demo-stale");
			then.status(401).body("token expired");
		})
		.await;
	let jobs = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/jobs").header("authorization", "Bearer demo-fresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("[{\"id\":1,\"title\":\"Rust engineer\"}]");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh-token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"data\":{\"tokens\":{\"accessToken\":\"demo-fresh\",\"expiresIn\":900}}}");
		})
		.await;
	let config = SessionConfig::builder(server.url("/api")).build()?;
	let store = Arc::new(MemoryStore::default());
	let client = ReqwestSessionClient::new(config, store.clone())?.with_observer(Arc::new(
		CallbackObserver::new(|termination: &SessionTermination| {
			println!("Session ended: {:?}.", termination.cause);
		}),
	));

	client.login_with(Credential::new("demo-stale").with_refresh_token("demo-refresh")).await?;

	let response = client.get("jobs").await?;

	println!("Jobs after a transparent refresh: {}.", response.text());
	println!(
		"Refresh attempts: {}, stored token: {:?}.",
		client.refresh_metrics().attempts(),
		store.snapshot().map(|credential| credential.access_token.expose().to_owned()),
	);

	expired.assert_async().await;
	jobs.assert_async().await;
	refresh.assert_async().await;

	client.logout().await?;

	Ok(())
}
