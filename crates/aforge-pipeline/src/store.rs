//! Concurrency-safe in-memory job table.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use aforge_models::{Job, JobId, JobUpdate};

use crate::error::StoreError;

/// The single source of truth for job state.
///
/// Backed by a sharded map so updates to different jobs proceed in
/// parallel while updates to the same job serialize on its entry. Job
/// records are mutated only through [`JobStore::update`], which applies
/// the monotonicity rules from [`Job::apply`] atomically. Terminal
/// records are kept indefinitely for pollers; cleanup is the caller's
/// concern.
///
/// Cloning the store is cheap and shares the underlying table.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: std::sync::Arc<DashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job with a freshly generated ID.
    pub fn create(&self, prompt: impl Into<String>) -> Result<Job, StoreError> {
        self.insert_new(JobId::new(), prompt)
    }

    /// Create a job under a caller-assigned ID.
    pub fn insert_new(&self, id: JobId, prompt: impl Into<String>) -> Result<Job, StoreError> {
        match self.jobs.entry(id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                let job = Job::new(id, prompt);
                slot.insert(job.clone());
                Ok(job)
            }
        }
    }

    /// Snapshot a job record.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// Atomically merge `update` into the record and bump `updated_at`.
    ///
    /// Rejects with [`StoreError::InvalidTransition`] any write that
    /// would move the state off a forward edge, lower a monotonic
    /// counter, or mutate a terminal record. Rejected writes leave the
    /// record untouched.
    pub fn update(&self, id: &JobId, update: JobUpdate) -> Result<Job, StoreError> {
        let mut entry = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        entry.value_mut().apply(&update)?;
        Ok(entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
