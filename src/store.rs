//! Credential storage contract and built-in store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::Credential};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend that exclusively owns persistence of the session credential.
///
/// The refresh coordinator is the only writer during a session: it calls
/// [`replace`](CredentialStore::replace) once per successful refresh cycle and
/// [`clear`](CredentialStore::clear) once per terminated session.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the credential that should be attached to the next request, if any.
	fn current(&self) -> StoreFuture<'_, Option<Credential>>;

	/// Replaces the stored credential.
	fn replace(&self, credential: Credential) -> StoreFuture<'_, ()>;

	/// Removes every stored credential.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
