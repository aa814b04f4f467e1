use std::{
	collections::HashMap,
	sync::{Arc, OnceLock, RwLock, Weak},
	time::Duration as StdDuration,
};

use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use uuid::Uuid;

use poi_domain::PlaceResult;

use crate::RankingPipeline;

const SHARD_COUNT: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub enum JobPoll {
	Pending,
	Done(Arc<[PlaceResult]>),
	/// The pipeline errored or panicked. Nothing to return.
	Failed,
	NotFound,
}

enum Outcome {
	Done(Arc<[PlaceResult]>),
	Failed,
}

struct Completion {
	completed_at: OffsetDateTime,
	outcome: Outcome,
}

#[derive(Default)]
struct JobSlot {
	completion: OnceLock<Completion>,
}
impl JobSlot {
	/// Returns `false` when the slot already holds an outcome; the first one is kept.
	fn complete(&self, outcome: Outcome) -> bool {
		self.completion.set(Completion { completed_at: OffsetDateTime::now_utc(), outcome }).is_ok()
	}

	fn poll(&self) -> JobPoll {
		match self.completion.get() {
			None => JobPoll::Pending,
			Some(Completion { outcome: Outcome::Done(results), .. }) => JobPoll::Done(results.clone()),
			Some(Completion { outcome: Outcome::Failed, .. }) => JobPoll::Failed,
		}
	}

	fn expired(&self, now: OffsetDateTime, retention: Duration) -> bool {
		self.completion
			.get()
			.and_then(|completion| completion.completed_at.checked_add(retention))
			.is_some_and(|deadline| deadline <= now)
	}
}

struct JobTable {
	shards: Vec<RwLock<HashMap<Uuid, Arc<JobSlot>>>>,
	retention: Duration,
}
impl JobTable {
	fn shard(&self, id: &Uuid) -> &RwLock<HashMap<Uuid, Arc<JobSlot>>> {
		&self.shards[(id.as_u128() % SHARD_COUNT as u128) as usize]
	}

	fn insert(&self, id: Uuid, slot: Arc<JobSlot>) {
		let mut shard = self.shard(&id).write().unwrap_or_else(|err| err.into_inner());

		shard.insert(id, slot);
	}

	fn get(&self, id: &Uuid) -> Option<Arc<JobSlot>> {
		let shard = self.shard(id).read().unwrap_or_else(|err| err.into_inner());

		shard.get(id).cloned()
	}

	fn sweep(&self, now: OffsetDateTime) -> usize {
		let mut evicted = 0;

		for shard in &self.shards {
			let mut shard = shard.write().unwrap_or_else(|err| err.into_inner());
			let before = shard.len();

			shard.retain(|_, slot| !slot.expired(now, self.retention));

			evicted += before - shard.len();
		}

		evicted
	}

	fn len(&self) -> usize {
		self.shards
			.iter()
			.map(|shard| shard.read().unwrap_or_else(|err| err.into_inner()).len())
			.sum()
	}
}

/// Background semantic ranking jobs, keyed by random job id.
///
/// A job is visible to `poll` as soon as `submit` returns. Its outcome is written once by the
/// task that ran it; completed jobs are evicted by `sweep` after the retention window.
pub struct JobCache {
	table: Arc<JobTable>,
	pipeline: Arc<dyn RankingPipeline>,
}
impl JobCache {
	pub fn new(pipeline: Arc<dyn RankingPipeline>, retention: Duration) -> Self {
		let shards = (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect();

		Self { table: Arc::new(JobTable { shards, retention }), pipeline }
	}

	/// Registers a pending job and schedules its single background run.
	///
	/// Must be called from within a Tokio runtime.
	pub fn submit(&self, keywords: Vec<String>, candidates: Vec<String>) -> Uuid {
		let id = Uuid::new_v4();
		let slot = Arc::new(JobSlot::default());

		self.table.insert(id, slot.clone());

		let pipeline = self.pipeline.clone();
		// The inner task isolates panics in the pipeline so they surface as a join error.
		let run = tokio::spawn(async move { pipeline.rank(&keywords, &candidates).await });

		tokio::spawn(async move {
			let outcome = match run.await {
				Ok(Ok(results)) => {
					tracing::info!(job_id = %id, places = results.len(), "Ranking job finished.");

					Outcome::Done(results.into())
				},
				Ok(Err(err)) => {
					tracing::error!(job_id = %id, error = %err, "Ranking job failed.");

					Outcome::Failed
				},
				Err(err) => {
					tracing::error!(job_id = %id, error = %err, "Ranking job panicked.");

					Outcome::Failed
				},
			};

			if !slot.complete(outcome) {
				tracing::warn!(job_id = %id, "Ranking job completed twice; keeping the first outcome.");
			}
		});

		id
	}

	pub fn poll(&self, job_id: &str) -> JobPoll {
		let Ok(id) = Uuid::parse_str(job_id) else {
			return JobPoll::NotFound;
		};

		self.table.get(&id).map(|slot| slot.poll()).unwrap_or(JobPoll::NotFound)
	}

	/// Evicts jobs whose retention window has passed by `now`. Pending jobs are kept.
	pub fn sweep(&self, now: OffsetDateTime) -> usize {
		self.table.sweep(now)
	}

	pub fn len(&self) -> usize {
		self.table.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Sweeps on a fixed interval until the cache is dropped.
	pub fn spawn_reaper(&self, interval: StdDuration) -> JoinHandle<()> {
		let table: Weak<JobTable> = Arc::downgrade(&self.table);

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);

			// The first tick completes immediately.
			ticker.tick().await;

			loop {
				ticker.tick().await;

				let Some(table) = table.upgrade() else {
					tracing::debug!("Job cache dropped. Reaper stopped.");

					break;
				};
				let evicted = table.sweep(OffsetDateTime::now_utc());

				if evicted > 0 {
					tracing::info!(evicted, "Expired ranking jobs evicted.");
				}
			}
		})
	}
}
