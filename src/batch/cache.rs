//! Fixed-TTL value cache with lazy expiry.

// crates.io
use tokio::time::Instant;
// self
use crate::_prelude::*;

/// Cached value plus the instant it was stored.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
	/// Cached value.
	pub value: V,
	/// Instant the value was stored.
	pub cached_at: Instant,
}

/// Map whose entries expire `ttl` after insertion; stale entries are dropped when read.
#[derive(Debug)]
pub struct TtlCache<K, V> {
	ttl: StdDuration,
	entries: HashMap<K, CacheEntry<V>>,
}
impl<K, V> TtlCache<K, V>
where
	K: Eq + Hash,
	V: Clone,
{
	/// Creates an empty cache.
	pub fn new(ttl: StdDuration) -> Self {
		Self { ttl, entries: HashMap::new() }
	}

	/// Returns the value for `key` if it is younger than the TTL at `now`.
	pub fn get<Q>(&mut self, key: &Q, now: Instant) -> Option<V>
	where
		K: std::borrow::Borrow<Q>,
		Q: ?Sized + Eq + Hash,
	{
		let fresh = self
			.entries
			.get(key)
			.map(|entry| now.saturating_duration_since(entry.cached_at) < self.ttl)?;

		if fresh {
			self.entries.get(key).map(|entry| entry.value.clone())
		} else {
			self.entries.remove(key);

			None
		}
	}

	/// Stores `value`, replacing any previous entry.
	pub fn insert(&mut self, key: K, value: V, now: Instant) {
		self.entries.insert(key, CacheEntry { value, cached_at: now });
	}

	/// Drops the entry for `key`.
	pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
	where
		K: std::borrow::Borrow<Q>,
		Q: ?Sized + Eq + Hash,
	{
		self.entries.remove(key).map(|entry| entry.value)
	}

	/// Drops every entry.
	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Number of stored entries, stale ones included.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn entries_expire_lazily() {
		let start = Instant::now();
		let mut cache = TtlCache::new(StdDuration::from_secs(30));

		cache.insert("005930".to_owned(), 71_000, start);

		assert_eq!(cache.get("005930", start + StdDuration::from_secs(29)), Some(71_000));
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get("005930", start + StdDuration::from_secs(30)), None);
		assert!(cache.is_empty());
	}
}
