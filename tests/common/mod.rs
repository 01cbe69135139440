//! In-process collaborators shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use auth_session::{
	SessionClient, SessionConfig,
	auth::Credential,
	error::{RefreshError, TransportError},
	http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
	refresh::{AuthServer, RefreshFuture, RefreshedCredential},
	session::{SessionObserver, SessionTermination},
	store::{CredentialStore, MemoryStore, StoreFuture},
};
use http::{StatusCode, header::AUTHORIZATION};
use parking_lot::Mutex;

/// Server-side view of which access token is currently accepted.
#[derive(Clone, Debug)]
pub struct Backend {
	valid: Arc<Mutex<String>>,
	jar: Arc<Mutex<String>>,
}
impl Backend {
	pub fn new(valid: &str) -> Self {
		Self { valid: Arc::new(Mutex::new(valid.into())), jar: Arc::new(Mutex::new(valid.into())) }
	}

	/// Invalidates every access token handed out so far.
	pub fn expire(&self) {
		*self.valid.lock() = "expired-by-server".into();
	}

	/// Accepts `token` from now on.
	pub fn accept(&self, token: &str) {
		*self.valid.lock() = token.into();
	}

	/// Rotates the cookie jar shared with the transport.
	pub fn set_cookie(&self, token: &str) {
		*self.jar.lock() = token.into();
	}

	fn authorizes(&self, request: &ApiRequest) -> bool {
		let presented = match request.headers.get(AUTHORIZATION) {
			Some(value) =>
				value.to_str().unwrap_or_default().trim_start_matches("Bearer ").to_owned(),
			None => self.jar.lock().clone(),
		};

		presented == *self.valid.lock()
	}
}

/// Transport that answers `401` unless the request carries the accepted token.
#[derive(Clone, Debug)]
pub struct ScriptedTransport {
	backend: Backend,
	sends: Arc<AtomicUsize>,
	failing_replays: Arc<Mutex<Vec<String>>>,
	status_overrides: Arc<Mutex<Vec<(String, StatusCode)>>>,
}
impl ScriptedTransport {
	pub fn new(backend: Backend) -> Self {
		Self {
			backend,
			sends: Default::default(),
			failing_replays: Default::default(),
			status_overrides: Default::default(),
		}
	}

	/// Authorized requests to `path` fail at the transport layer.
	pub fn fail_authorized(&self, path: &str) {
		self.failing_replays.lock().push(path.into());
	}

	/// Requests to `path` always answer `status`.
	pub fn answer(&self, path: &str, status: StatusCode) {
		self.status_overrides.lock().push((path.into(), status));
	}

	pub fn sends(&self) -> usize {
		self.sends.load(Ordering::SeqCst)
	}
}
impl HttpTransport for ScriptedTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		self.sends.fetch_add(1, Ordering::SeqCst);

		let path = request.url.path().to_owned();
		let forced = self
			.status_overrides
			.lock()
			.iter()
			.find(|(candidate, _)| *candidate == path)
			.map(|(_, status)| *status);
		let authorized = self.backend.authorizes(&request);
		let fail = authorized && self.failing_replays.lock().contains(&path);

		Box::pin(async move {
			tokio::task::yield_now().await;

			if fail {
				return Err(TransportError::Io(std::io::Error::other("connection reset")));
			}
			if let Some(status) = forced {
				return Ok(ApiResponse::new(status, "forced"));
			}
			if authorized {
				Ok(ApiResponse::new(StatusCode::OK, format!("ok:{path}")))
			} else {
				Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "token expired"))
			}
		})
	}
}

/// What the next refresh call does.
#[derive(Clone, Debug)]
pub enum RefreshStep {
	/// Issue `fresh-<n>` after `delay`.
	Issue { delay: StdDuration },
	/// Rotate the cookie jar to `fresh-<n>` and return no credential body.
	Ambient { delay: StdDuration },
	/// Issue a token the backend never accepts.
	IssueUnaccepted,
	/// Reject after `delay`.
	Reject { delay: StdDuration },
}

/// Refresh endpoint that follows a script and counts its calls.
#[derive(Clone, Debug)]
pub struct ScriptedAuthServer {
	backend: Backend,
	calls: Arc<AtomicUsize>,
	script: Arc<Mutex<VecDeque<RefreshStep>>>,
	fallback: RefreshStep,
}
impl ScriptedAuthServer {
	pub fn new(backend: Backend, fallback: RefreshStep) -> Self {
		Self { backend, calls: Default::default(), script: Default::default(), fallback }
	}

	/// Queues a step that runs before the fallback.
	pub fn push(&self, step: RefreshStep) {
		self.script.lock().push_back(step);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl AuthServer for ScriptedAuthServer {
	fn perform_refresh(&self, _current: Option<Credential>) -> RefreshFuture<'_> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
		let step = self.script.lock().pop_front().unwrap_or_else(|| self.fallback.clone());
		let backend = self.backend.clone();

		Box::pin(async move {
			match step {
				RefreshStep::Issue { delay } => {
					tokio::time::sleep(delay).await;

					let token = format!("fresh-{call}");

					backend.accept(&token);

					Ok(RefreshedCredential::Issued(
						Credential::new(token).with_refresh_token(format!("refresh-{call}")),
					))
				},
				RefreshStep::Ambient { delay } => {
					tokio::time::sleep(delay).await;

					let token = format!("fresh-{call}");

					backend.accept(&token);
					backend.set_cookie(&token);

					Ok(RefreshedCredential::Ambient)
				},
				RefreshStep::IssueUnaccepted =>
					Ok(RefreshedCredential::Issued(Credential::new("never-accepted"))),
				RefreshStep::Reject { delay } => {
					tokio::time::sleep(delay).await;

					Err(RefreshError::Rejected {
						status: Some(401),
						message: "refresh token reuse detected".into(),
					})
				},
			}
		})
	}
}

/// Observer that counts terminations.
#[derive(Debug, Default)]
pub struct RecordingObserver {
	terminations: Mutex<Vec<SessionTermination>>,
}
impl RecordingObserver {
	pub fn count(&self) -> usize {
		self.terminations.lock().len()
	}

	pub fn terminations(&self) -> Vec<SessionTermination> {
		self.terminations.lock().clone()
	}
}
impl SessionObserver for RecordingObserver {
	fn on_terminated(&self, termination: &SessionTermination) {
		self.terminations.lock().push(termination.clone());
	}
}

/// Store whose writes suspend before reaching the wrapped [`MemoryStore`].
#[derive(Debug)]
pub struct SlowWriteStore {
	inner: Arc<MemoryStore>,
	delay: StdDuration,
}
impl CredentialStore for SlowWriteStore {
	fn current(&self) -> StoreFuture<'_, Option<Credential>> {
		self.inner.current()
	}

	fn replace(&self, credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.replace(credential).await
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		self.inner.clear()
	}
}

/// Fully wired session used by the coordination tests.
pub struct Harness {
	pub client: SessionClient<ScriptedTransport>,
	pub backend: Backend,
	pub transport: ScriptedTransport,
	pub server: ScriptedAuthServer,
	pub store: Arc<MemoryStore>,
	pub observer: Arc<RecordingObserver>,
}
impl Harness {
	/// Session whose stored access token is already rejected by the backend.
	pub fn expired(server_step: RefreshStep) -> Self {
		Self::assemble(server_step, None)
	}

	/// Same as [`Harness::expired`], but every store write stalls for `delay` first.
	pub fn expired_with_slow_writes(server_step: RefreshStep, delay: StdDuration) -> Self {
		Self::assemble(server_step, Some(delay))
	}

	fn assemble(server_step: RefreshStep, write_delay: Option<StdDuration>) -> Self {
		let backend = Backend::new("initial");
		let transport = ScriptedTransport::new(backend.clone());
		let server = ScriptedAuthServer::new(backend.clone(), server_step);
		let store = Arc::new(MemoryStore::with_credential(
			Credential::new("stale").with_refresh_token("refresh-0"),
		));
		let observer = Arc::new(RecordingObserver::default());

		backend.expire();

		let config = SessionConfig::builder("https://api.example.com/api")
			.build()
			.expect("Harness config should build.");
		let session_store: Arc<dyn CredentialStore> = match write_delay {
			Some(delay) => Arc::new(SlowWriteStore { inner: store.clone(), delay }),
			None => store.clone(),
		};
		let client: SessionClient<ScriptedTransport> = SessionClient::with_transport(
			config,
			transport.clone(),
			session_store,
			Arc::new(server.clone()),
		)
		.with_observer(observer.clone());

		Self { client, backend, transport, server, store, observer }
	}
}

pub const SHORT: StdDuration = StdDuration::from_millis(50);
