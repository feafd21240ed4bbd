//! File-backed [`TokenStore`] that lets several processes on one host share a token.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
	process,
};
// self
use crate::{
	_prelude::*,
	auth::{HolderId, RefreshLock},
	store::{
		LockOutcome, Snapshot, SnapshotFile, StoreError, StoreFuture, StoreKey, StoredToken,
		TokenStore,
	},
};

/// Persists token and lease records to a JSON file.
///
/// The file is re-read before every operation so writes from other processes are observed.
/// Replacement goes through a per-process temporary file and an atomic rename, which keeps
/// readers from seeing torn writes; concurrent writers are last-writer-wins.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	guard: Arc<Mutex<()>>,
}
impl FileStore {
	/// Opens (or creates the parent directory for) a store at the provided path.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		if path.exists() {
			Self::load_snapshot(&path)?;
		}

		Ok(Self { path, guard: Default::default() })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Snapshot::default());
		}

		let file: SnapshotFile =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(file.into())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(&SnapshotFile::from(snapshot)).map_err(|e| {
				StoreError::Serialization {
					message: format!("Failed to serialize store snapshot: {e}"),
				}
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension(format!("tmp-{}", process::id()));

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Result<T, StoreError> {
		let _guard = self.guard.lock();
		let snapshot = Self::load_snapshot(&self.path)?;

		Ok(f(&snapshot))
	}

	fn update<T>(&self, f: impl FnOnce(&mut Snapshot) -> (T, bool)) -> Result<T, StoreError> {
		let _guard = self.guard.lock();
		let mut snapshot = Self::load_snapshot(&self.path)?;
		let (value, changed) = f(&mut snapshot);

		if changed {
			self.persist(&snapshot)?;
		}

		Ok(value)
	}
}
impl TokenStore for FileStore {
	fn fetch_token<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<StoredToken>> {
		Box::pin(async move { self.read(|snapshot| snapshot.tokens.get(key).cloned()) })
	}

	fn save_token(&self, key: StoreKey, record: StoredToken) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.update(|snapshot| {
				snapshot.tokens.insert(key, record);

				((), true)
			})
		})
	}

	fn fetch_lock<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<RefreshLock>> {
		Box::pin(async move { self.read(|snapshot| snapshot.locks.get(key).cloned()) })
	}

	fn acquire_lock(
		&self,
		key: StoreKey,
		lock: RefreshLock,
		lease_ttl: Duration,
	) -> StoreFuture<'_, LockOutcome> {
		Box::pin(async move {
			self.update(|snapshot| {
				let outcome = snapshot.acquire_lock(key, lock, lease_ttl);
				let changed = matches!(outcome, LockOutcome::Acquired);

				(outcome, changed)
			})
		})
	}

	fn override_lock(&self, key: StoreKey, lock: RefreshLock) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.update(|snapshot| {
				snapshot.locks.insert(key, lock);

				((), true)
			})
		})
	}

	fn release_lock<'a>(
		&'a self,
		key: &'a StoreKey,
		holder: &'a HolderId,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			self.update(|snapshot| {
				let removed = snapshot.release_lock(key, holder);

				(removed, removed)
			})
		})
	}
}
