//! Client-facing quote queue: collection window, deduplication, TTL cache, paced batches.
//!
//! Callers submit keys through [`RequestBatcher::fetch`]. Fresh cache entries are answered
//! inline; everything else goes through a bounded channel to a single worker task that runs an
//! explicit state machine:
//!
//! ```text
//! Idle --item--> Collecting --collect_delay--> Draining --more pending--> Sleeping
//!                                                 ^                           |
//!                                                 +-------batch_delay---------+
//! Draining --nothing pending--> Idle
//! ```
//!
//! Every pending key is fetched once per drain, however many callers wait on it, and each
//! caller is resolved independently; a failed lookup resolves only its own callers with `None`.

pub mod cache;
pub mod fetcher;

pub use cache::*;
pub use fetcher::*;

// crates.io
use futures_util::future;
use tokio::{
	sync::{mpsc, oneshot},
	time::{self, Instant},
};
// self
use crate::{
	_prelude::*,
	config::BatchConfig,
	error::ConfigError,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

type Responder<V> = oneshot::Sender<Option<V>>;
type SharedCache<V> = Arc<Mutex<TtlCache<String, V>>>;

/// One submitted lookup awaiting resolution.
#[derive(Debug)]
struct QueueItem<V> {
	key: String,
	responder: Responder<V>,
}

/// Worker phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WorkerState {
	Idle,
	Collecting,
	Draining,
	Sleeping,
}

/// Batched, cached front end for a [`QuoteFetcher`].
pub struct RequestBatcher<F>
where
	F: QuoteFetcher,
{
	fetcher: Arc<F>,
	config: BatchConfig,
	cache: SharedCache<F::Value>,
	sender: Mutex<Option<mpsc::Sender<QueueItem<F::Value>>>>,
}
impl<F> RequestBatcher<F>
where
	F: QuoteFetcher,
{
	/// Creates a batcher; the worker task is spawned on the first cache miss.
	pub fn new(fetcher: impl Into<Arc<F>>, config: BatchConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		Ok(Self {
			fetcher: fetcher.into(),
			cache: Arc::new(Mutex::new(TtlCache::new(config.cache_ttl))),
			config,
			sender: Mutex::new(None),
		})
	}

	/// Active configuration.
	pub fn config(&self) -> &BatchConfig {
		&self.config
	}

	/// Returns the value for `key`, from the cache when fresh, otherwise through the queue.
	///
	/// `None` means the lookup failed or the upstream had no value.
	pub async fn fetch(&self, key: impl Into<String>) -> Option<F::Value> {
		let key = key.into();

		if let Some(value) = self.cache.lock().get(&key, Instant::now()) {
			return Some(value);
		}

		let (responder, resolved) = oneshot::channel();
		let mut item = QueueItem { key, responder };

		loop {
			match self.worker().send(item).await {
				Ok(()) => break,
				Err(mpsc::error::SendError(returned)) => {
					self.reset_worker();

					item = returned;
				},
			}
		}

		resolved.await.ok().flatten()
	}

	/// Looks up every distinct key concurrently; the map has one entry per distinct key.
	pub async fn fetch_many<I, K>(&self, keys: I) -> HashMap<String, Option<F::Value>>
	where
		I: IntoIterator<Item = K>,
		K: Into<String>,
	{
		let mut distinct = keys.into_iter().map(Into::into).collect::<Vec<String>>();

		distinct.sort();
		distinct.dedup();

		let values = future::join_all(distinct.iter().map(|key| self.fetch(key.clone()))).await;

		distinct.into_iter().zip(values).collect()
	}

	/// Drops the cached value for `key`.
	pub fn invalidate(&self, key: &str) {
		self.cache.lock().remove(key);
	}

	/// Drops every cached value.
	pub fn clear_cache(&self) {
		self.cache.lock().clear();
	}

	fn worker(&self) -> mpsc::Sender<QueueItem<F::Value>> {
		let mut sender = self.sender.lock();

		match sender.as_ref() {
			Some(tx) if !tx.is_closed() => tx.clone(),
			_ => {
				let (tx, rx) = mpsc::channel(self.config.queue_capacity);
				let worker = BatchWorker {
					fetcher: self.fetcher.clone(),
					config: self.config.clone(),
					cache: self.cache.clone(),
					queue: rx,
					pending: Vec::new(),
					waiters: HashMap::new(),
				};

				tokio::spawn(worker.run());
				*sender = Some(tx.clone());

				tx
			},
		}
	}

	fn reset_worker(&self) {
		*self.sender.lock() = None;
	}
}
impl<F> Debug for RequestBatcher<F>
where
	F: QuoteFetcher,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestBatcher")
			.field("config", &self.config)
			.field("cached", &self.cache.lock().len())
			.finish()
	}
}

struct BatchWorker<F>
where
	F: QuoteFetcher,
{
	fetcher: Arc<F>,
	config: BatchConfig,
	cache: SharedCache<F::Value>,
	queue: mpsc::Receiver<QueueItem<F::Value>>,
	// Keys in first-submission order; `waiters` holds every caller per key.
	pending: Vec<String>,
	waiters: HashMap<String, Vec<Responder<F::Value>>>,
}
impl<F> BatchWorker<F>
where
	F: QuoteFetcher,
{
	async fn run(mut self) {
		let mut state = WorkerState::Idle;

		loop {
			state = match state {
				WorkerState::Idle => match self.queue.recv().await {
					Some(item) => {
						self.enqueue(item);

						WorkerState::Collecting
					},
					None => break,
				},
				WorkerState::Collecting => {
					time::sleep(self.config.collect_delay).await;
					self.absorb_queued();

					WorkerState::Draining
				},
				WorkerState::Draining => {
					self.drain_batch().await;
					self.absorb_queued();

					if self.pending.is_empty() { WorkerState::Idle } else { WorkerState::Sleeping }
				},
				WorkerState::Sleeping => {
					time::sleep(self.config.batch_delay).await;
					self.absorb_queued();

					WorkerState::Draining
				},
			};
		}
	}

	fn absorb_queued(&mut self) {
		while let Ok(item) = self.queue.try_recv() {
			self.enqueue(item);
		}
	}

	fn enqueue(&mut self, item: QueueItem<F::Value>) {
		let QueueItem { key, responder } = item;

		if responder.is_closed() {
			return;
		}
		// The key may have been fetched while this item sat in the channel.
		if let Some(value) = self.cache.lock().get(&key, Instant::now()) {
			let _ = responder.send(Some(value));

			return;
		}

		match self.waiters.get_mut(&key) {
			Some(waiting) => waiting.push(responder),
			None => {
				self.pending.push(key.clone());
				self.waiters.insert(key, vec![responder]);
			},
		}
	}

	async fn drain_batch(&mut self) {
		const KIND: OpKind = OpKind::BatchDrain;

		let take = self.pending.len().min(self.config.batch_size);
		let keys = self.pending.drain(..take).collect::<Vec<_>>();
		let span = OpSpan::new(KIND, "drain_batch");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		tracing::debug!(batch = keys.len(), remaining = self.pending.len(), "Draining batch.");

		let fetcher = self.fetcher.clone();
		let results = span
			.instrument(future::join_all(keys.iter().map(|key| fetcher.fetch(key))))
			.await;
		let mut failures = 0_usize;

		for (key, result) in keys.iter().zip(results) {
			let value = match result {
				Ok(Some(value)) => {
					self.cache.lock().insert(key.clone(), value.clone(), Instant::now());

					Some(value)
				},
				Ok(None) => None,
				Err(e) => {
					failures += 1;
					tracing::warn!(key = %key, error = %e, "Lookup failed; resolving with None.");

					None
				},
			};

			for responder in self.waiters.remove(key).unwrap_or_default() {
				let _ = responder.send(value.clone());
			}
		}

		obs::record_op_outcome(
			KIND,
			if failures == 0 { OpOutcome::Success } else { OpOutcome::Failure },
		);
	}
}
