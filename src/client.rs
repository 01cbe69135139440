//! Caller-facing HTTP client that keeps the session authenticated transparently.

// crates.io
use bytes::Bytes;
use http::{HeaderMap, Method};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	config::SessionConfig,
	http::{
		ApiRequest, ApiResponse, BearerSigner, ExpiryPolicy, HttpTransport, RequestSigner,
		StatusExpiryPolicy,
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::{AuthServer, PendingRequest, RefreshCoordinator, RefreshMetrics, RefreshPhase},
	session::{LoggingObserver, SessionObserver},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestTransport, refresh::HttpAuthServer};

#[cfg(feature = "reqwest")]
/// Session client specialized for the crate's default reqwest transport stack.
pub type ReqwestSessionClient = SessionClient<ReqwestTransport>;

/// Classification of a single transport round trip.
#[derive(Clone, Debug)]
pub enum SendOutcome {
	/// The response is final and goes back to the caller as-is.
	Delivered(ApiResponse),
	/// The response signals an expired credential and must be routed to the coordinator.
	CredentialExpired(ApiResponse),
}

/// HTTP client that signs, sends, refreshes, and replays on behalf of its callers.
///
/// Callers only ever observe a final response, a transport/configuration error, or a terminal
/// [`Error::AuthenticationFailed`]; credential expiry is handled internally by the
/// [`RefreshCoordinator`] shared by every clone of the client.
pub struct SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport used for every caller request.
	pub transport: Arc<T>,
	/// Validated session configuration.
	pub config: SessionConfig,
	store: Arc<dyn CredentialStore>,
	signer: Arc<dyn RequestSigner>,
	expiry: Arc<dyn ExpiryPolicy>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<T> SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client over caller-provided collaborators.
	///
	/// Defaults: [`BearerSigner`], a [`StatusExpiryPolicy`] matching
	/// [`SessionConfig::expiry_status`] that exempts the refresh path, and a
	/// [`LoggingObserver`].
	pub fn with_transport(
		config: SessionConfig,
		transport: impl Into<Arc<T>>,
		store: Arc<dyn CredentialStore>,
		server: Arc<dyn AuthServer>,
	) -> Self {
		let expiry =
			StatusExpiryPolicy::new(config.expiry_status).exempt_path(&config.refresh_path);
		let observer: Arc<dyn SessionObserver> = Arc::new(LoggingObserver);
		let coordinator =
			Arc::new(RefreshCoordinator::new(store.clone(), server, observer));

		Self {
			transport: transport.into(),
			config,
			store,
			signer: Arc::new(BearerSigner),
			expiry: Arc::new(expiry),
			coordinator,
		}
	}

	/// Replaces the session observer.
	///
	/// The coordinator stays shared, so clones made before this call keep refreshing in the same
	/// single-flight group and report to the new observer as well.
	pub fn with_observer(self, observer: Arc<dyn SessionObserver>) -> Self {
		self.coordinator.set_observer(observer);

		self
	}

	/// Replaces the request signer.
	pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
		self.signer = signer;

		self
	}

	/// Replaces the expired-credential policy.
	pub fn with_expiry_policy(mut self, expiry: Arc<dyn ExpiryPolicy>) -> Self {
		self.expiry = expiry;

		self
	}

	/// Refresh coordinator shared by every clone of this client.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
		&self.coordinator
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		self.coordinator.metrics()
	}

	/// Current coordinator phase.
	pub fn refresh_phase(&self) -> RefreshPhase {
		self.coordinator.phase()
	}

	/// Stores the credential obtained by a login flow.
	pub async fn login_with(&self, credential: Credential) -> Result<()> {
		self.store.replace(credential).await?;

		Ok(())
	}

	/// Returns the credential currently attached to requests.
	pub async fn current_credential(&self) -> Result<Option<Credential>> {
		Ok(self.store.current().await?)
	}

	/// Ends the session: waiting requests fail, the store is cleared, the observer is notified.
	pub async fn logout(&self) -> Result<()> {
		self.coordinator.logout().await
	}

	/// Issues `method target` with explicit headers and body.
	///
	/// `target` is either an absolute `http(s)` URL or a path below the configured base URL.
	pub async fn request(
		&self,
		method: Method,
		target: &str,
		headers: HeaderMap,
		body: Option<Bytes>,
	) -> Result<ApiResponse> {
		let url = self.config.resolve(target)?;
		let mut request = ApiRequest::new(method, url).headers(headers);

		request.body = body;

		self.send(request).await
	}

	/// Issues a `GET` request.
	pub async fn get(&self, target: &str) -> Result<ApiResponse> {
		self.request(Method::GET, target, HeaderMap::new(), None).await
	}

	/// Issues a `DELETE` request.
	pub async fn delete(&self, target: &str) -> Result<ApiResponse> {
		self.request(Method::DELETE, target, HeaderMap::new(), None).await
	}

	/// Issues a `POST` request with a JSON body.
	pub async fn post<B>(&self, target: &str, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send_json(Method::POST, target, body).await
	}

	/// Issues a `PUT` request with a JSON body.
	pub async fn put<B>(&self, target: &str, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send_json(Method::PUT, target, body).await
	}

	/// Issues a `PATCH` request with a JSON body.
	pub async fn patch<B>(&self, target: &str, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send_json(Method::PATCH, target, body).await
	}

	/// Sends a fully built request through the sign/send/refresh/replay pipeline.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send_with_refresh(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn send_json<B>(&self, method: Method, target: &str, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		let url = self.config.resolve(target)?;
		let request = ApiRequest::new(method, url).json(body)?;

		self.send(request).await
	}

	async fn send_with_refresh(&self, request: ApiRequest) -> Result<ApiResponse> {
		let mut pending = PendingRequest::new(self.apply_defaults(request));

		loop {
			match self.dispatch(&pending).await? {
				SendOutcome::Delivered(response) => return Ok(response),
				SendOutcome::CredentialExpired(response) =>
					self.coordinator.handle_expired(&mut pending, &response).await?,
			}
		}
	}

	/// Signs `pending` with the credential currently in the store and sends it once.
	async fn dispatch(&self, pending: &PendingRequest) -> Result<SendOutcome> {
		let credential = self.store.current().await?;
		let mut request = pending.request.clone();

		self.signer.sign(&mut request, credential.as_ref())?;

		let response = self.transport.send(request).await?;

		if self.expiry.is_expired(&pending.request, &response) {
			Ok(SendOutcome::CredentialExpired(response))
		} else {
			Ok(SendOutcome::Delivered(response))
		}
	}

	fn apply_defaults(&self, mut request: ApiRequest) -> ApiRequest {
		for (name, value) in &self.config.default_headers {
			if !request.headers.contains_key(name) {
				request.headers.insert(name.clone(), value.clone());
			}
		}

		request
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Creates a client over reqwest with the bundled [`HttpAuthServer`].
	///
	/// The transport and the refresh adapter share one cookie-aware reqwest client, so
	/// cookie-only credential rotation keeps working across replays.
	pub fn new(config: SessionConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
		let transport = ReqwestTransport::from_config(&config)?;
		let server = HttpAuthServer::new(&transport, config.refresh_url()?);

		Ok(Self::with_transport(config, transport, store, Arc::new(server)))
	}
}
impl<T> Clone for SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			store: self.store.clone(),
			signer: self.signer.clone(),
			expiry: self.expiry.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}
