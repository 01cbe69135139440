//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	store::{CredentialStore, StoreFuture},
};

/// Thread-safe storage backend that keeps the credential in-process.
///
/// Besides the credential itself, the store counts writes so callers can verify how many times
/// the session was rotated or cleared.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	slot: Arc<RwLock<Option<Credential>>>,
	replacements: Arc<AtomicU64>,
	clears: Arc<AtomicU64>,
}
impl MemoryStore {
	/// Creates a store seeded with an initial credential.
	pub fn with_credential(credential: Credential) -> Self {
		let store = Self::default();

		*store.slot.write() = Some(credential);

		store
	}

	/// Returns a snapshot of the stored credential without going through the async contract.
	pub fn snapshot(&self) -> Option<Credential> {
		self.slot.read().clone()
	}

	/// Number of [`replace`](CredentialStore::replace) calls observed so far.
	pub fn replacements(&self) -> u64 {
		self.replacements.load(Ordering::Relaxed)
	}

	/// Number of [`clear`](CredentialStore::clear) calls observed so far.
	pub fn clears(&self) -> u64 {
		self.clears.load(Ordering::Relaxed)
	}
}
impl CredentialStore for MemoryStore {
	fn current(&self) -> StoreFuture<'_, Option<Credential>> {
		let slot = self.slot.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn replace(&self, credential: Credential) -> StoreFuture<'_, ()> {
		let slot = self.slot.clone();
		let replacements = self.replacements.clone();

		Box::pin(async move {
			*slot.write() = Some(credential);
			replacements.fetch_add(1, Ordering::Relaxed);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.slot.clone();
		let clears = self.clears.clone();

		Box::pin(async move {
			slot.write().take();
			clears.fetch_add(1, Ordering::Relaxed);

			Ok(())
		})
	}
}
