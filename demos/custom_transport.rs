//! Demonstrates plugging a hand-written transport and refresh endpoint into [`SessionClient`].
//!
//! 1. Implement [`HttpTransport`] for whatever HTTP stack the application already uses.
//! 2. Implement [`AuthServer`] for the application's refresh endpoint.
//! 3. Fire several requests at once after the access token expired; only one refresh runs.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
use futures::future;
use http::{StatusCode, header::AUTHORIZATION};
use parking_lot::Mutex;
// self
use auth_session::{
	SessionClient, SessionConfig,
	auth::Credential,
	http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
	refresh::{AuthServer, RefreshFuture, RefreshedCredential},
	store::MemoryStore,
};

/// Accepts exactly one bearer token, which the refresh endpoint rotates.
#[derive(Debug)]
struct InMemoryApi {
	accepted: Mutex<String>,
}
impl InMemoryApi {
	fn accepts(&self, request: &ApiRequest) -> bool {
		let expected = format!("Bearer {}", self.accepted.lock());

		request
			.headers
			.get(AUTHORIZATION)
			.is_some_and(|value| value.as_bytes() == expected.as_bytes())
	}
}

#[derive(Debug)]
struct InMemoryTransport {
	api: Arc<InMemoryApi>,
}
impl HttpTransport for InMemoryTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		let accepted = self.api.accepts(&request);
		let path = request.url.path().to_owned();

		Box::pin(async move {
			tokio::task::yield_now().await;

			Ok(if accepted {
				ApiResponse::new(StatusCode::OK, format!("payload for {path}"))
			} else {
				ApiResponse::new(StatusCode::UNAUTHORIZED, "token expired")
			})
		})
	}
}

#[derive(Debug)]
struct InMemoryAuthServer {
	api: Arc<InMemoryApi>,
	calls: AtomicUsize,
}
impl AuthServer for InMemoryAuthServer {
	fn perform_refresh(&self, _current: Option<Credential>) -> RefreshFuture<'_> {
		let generation = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

		Box::pin(async move {
			let token = format!("rotated-{generation}");

			*self.api.accepted.lock() = token.clone();

			Ok(RefreshedCredential::Issued(Credential::new(token)))
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let api = Arc::new(InMemoryApi { accepted: Mutex::new("server-side-only".into()) });
	let server = Arc::new(InMemoryAuthServer { api: api.clone(), calls: AtomicUsize::new(0) });
	let store = Arc::new(MemoryStore::with_credential(Credential::new("expired")));
	let client: SessionClient<InMemoryTransport> = SessionClient::with_transport(
		SessionConfig::builder("https://api.example.com/v1").build()?,
		InMemoryTransport { api },
		store,
		server.clone(),
	);
	let responses = future::join_all(["jobs", "profile", "applications"].map(|path| {
		let client = client.clone();

		async move { client.get(path).await }
	}))
	.await;

	for response in responses {
		println!("{}", response?.text());
	}

	println!(
		"Refresh calls for three concurrent expiries: {}.",
		server.calls.load(Ordering::SeqCst)
	);

	Ok(())
}
