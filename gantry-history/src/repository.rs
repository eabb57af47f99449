//! Pipeline History Repository
//!
//! Cache-aside reads of recorded pipeline runs, bulk history pages, active
//! instance views and the single comment mutation.
//!
//! Two concurrent misses on the same key may both query the store and both
//! write the cache; the last write wins. A failed read never writes the
//! cache. An id-keyed miss that overlaps a comment update on the same run
//! does not write its result back, so the update's eviction sticks.

use gantry_core::domain::instance::PipelineInstanceModel;
use gantry_core::domain::pipeline::same_name;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::{self, CacheStore};
use crate::config::ConfigProvider;
use crate::error::{HistoryError, Result};
use crate::gateway::{
    CommentUpdate, GatewayError, HistoryById, HistoryByIds, HistoryCount, NameAndCounter,
    PageQuery, StoreGateway,
};

/// Tunables for the repository
#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    /// Resolve history pages through the lightweight id range query.
    /// When disabled, pages are loaded with the full by-name query.
    pub range_paging: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self { range_paging: true }
    }
}

/// Cache-aside repository over the pipeline history store
pub struct PipelineHistoryRepository {
    gateway: Arc<dyn StoreGateway>,
    cache: Arc<dyn CacheStore>,
    config: Arc<dyn ConfigProvider>,
    options: RepositoryOptions,
    invalidations: Invalidations,
}

impl PipelineHistoryRepository {
    /// Creates a repository with default options
    pub fn new(
        gateway: Arc<dyn StoreGateway>,
        cache: Arc<dyn CacheStore>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            gateway,
            cache,
            config,
            options: RepositoryOptions::default(),
            invalidations: Invalidations::new(),
        }
    }

    pub fn with_options(mut self, options: RepositoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    // =============================================================================
    // Single Instance Lookups
    // =============================================================================

    /// Looks up one run by pipeline name and counter
    ///
    /// Served from `history:<name>:<counter>` when cached. On miss the record
    /// and its material revisions are fetched, and the enriched model is
    /// cached under the name/counter key.
    ///
    /// The name/counter entry is not evicted by [`Self::update_comment`], so
    /// it may report a comment older than the store's until the cache store
    /// drops it.
    pub async fn find_history_by_name_and_counter(
        &self,
        name: &str,
        counter: i32,
    ) -> Result<PipelineInstanceModel> {
        let key = cache::name_and_counter_key(name, counter);

        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("History cache hit: {}", key);
            return Ok(cached);
        }

        tracing::debug!("History cache miss: {}", key);

        let params = NameAndCounter::new(name, counter);
        let mut pim = self
            .gateway
            .history_by_name_and_counter(&params)
            .await
            .inspect_err(log_gateway_failure)?
            .ok_or_else(|| HistoryError::not_found_by_name(name, counter))?;

        if !same_name(&pim.name, name) || pim.counter != counter {
            return Err(invariant_violation(format!(
                "lookup of {}/{} returned run {}/{} (id {})",
                name, counter, pim.name, pim.counter, pim.id
            )));
        }

        self.verify_canonical_entry(&pim)?;
        self.attach_material_revisions(&mut pim).await?;

        self.cache.put(&key, pim.clone());

        Ok(pim)
    }

    /// Looks up one run by store id through the canonical `history:<id>` entry
    pub async fn find_history_by_id(&self, id: i64) -> Result<PipelineInstanceModel> {
        let key = cache::id_key(id);

        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("History cache hit: {}", key);
            return Ok(cached);
        }

        tracing::debug!("History cache miss: {}", key);

        let epochs = self.invalidations.snapshot();
        let mut pim = self
            .gateway
            .history_by_id(&HistoryById { id })
            .await
            .inspect_err(log_gateway_failure)?
            .ok_or_else(|| HistoryError::not_found_by_id(id))?;

        if pim.id != id {
            return Err(invariant_violation(format!(
                "lookup of id {} returned run {}/{} with id {}",
                id, pim.name, pim.counter, pim.id
            )));
        }

        self.attach_material_revisions(&mut pim).await?;

        self.invalidations
            .put_if_current(self.cache.as_ref(), &epochs, pim.clone());

        Ok(pim)
    }

    // =============================================================================
    // Comment Mutation
    // =============================================================================

    /// Replaces the comment of a run and evicts its `history:<id>` entry
    ///
    /// The `history:<name>:<counter>` entry is left in place.
    pub async fn update_comment(&self, name: &str, counter: i32, comment: &str) -> Result<()> {
        let params = NameAndCounter::new(name, counter);
        let pipeline = self
            .gateway
            .pipeline_by_name_and_counter(&params)
            .await
            .inspect_err(log_gateway_failure)?
            .ok_or_else(|| HistoryError::not_found_by_name(name, counter))?;

        let update = CommentUpdate {
            name: name.to_string(),
            counter,
            comment: comment.to_string(),
        };
        let updated = self
            .gateway
            .update_comment(&update)
            .await
            .inspect_err(log_gateway_failure)?;

        if updated == 0 {
            tracing::warn!(
                "Comment update for {}/{} matched no rows (id {})",
                name,
                counter,
                pipeline.id
            );
            return Err(HistoryError::not_found_by_name(name, counter));
        }

        self.invalidations.invalidate(self.cache.as_ref(), pipeline.id);

        tracing::info!(
            "Comment updated for {}/{} (id {})",
            name,
            counter,
            pipeline.id
        );

        Ok(())
    }

    // =============================================================================
    // Bulk Views
    // =============================================================================

    /// Loads one page of a pipeline's history, most recent run first
    ///
    /// A page shorter than `page_size` is the last one; an empty page is not
    /// an error.
    pub async fn load_history(
        &self,
        name: &str,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<PipelineInstanceModel>> {
        if page_size == 0 {
            return Ok(Vec::new());
        }

        let page = PageQuery {
            name: name.to_string(),
            page_size,
            offset,
        };

        if !self.options.range_paging {
            return self.load_history_by_name(&page).await;
        }

        let ids = self
            .gateway
            .pipeline_range(&page)
            .await
            .inspect_err(log_gateway_failure)?;

        tracing::debug!(
            "History range for {} (size {}, offset {}): {} ids",
            name,
            page_size,
            offset,
            ids.len()
        );

        match ids.as_slice() {
            [] => Ok(Vec::new()),
            [id] => match self.find_history_by_id(*id).await {
                Ok(pim) => Ok(vec![pim]),
                Err(HistoryError::NotFound(_)) => Err(invariant_violation(format!(
                    "history range listed id {} but no record was found",
                    id
                ))),
                Err(err) => Err(err),
            },
            _ => self.load_history_by_ids(&ids).await,
        }
    }

    /// Active runs of a configured pipeline, in the store's order
    ///
    /// Unconfigured pipelines yield an empty list without touching the store.
    pub async fn load_active_instances_for(
        &self,
        name: &str,
    ) -> Result<Vec<PipelineInstanceModel>> {
        if !self.config.is_configured(name) {
            tracing::debug!("Pipeline {} is not configured; no active instances", name);
            return Ok(Vec::new());
        }

        let active = self
            .gateway
            .all_active_instances()
            .await
            .inspect_err(log_gateway_failure)?;

        let mut instances = Vec::new();
        for pim in active.iter().filter(|p| same_name(&p.name, name)) {
            instances.push(self.find_history_by_id(pim.id).await?);
        }

        tracing::debug!("Pipeline {} has {} active instances", name, instances.len());

        Ok(instances)
    }

    /// Number of recorded runs of a pipeline
    pub async fn count_history(&self, name: &str) -> Result<i64> {
        let count = self
            .gateway
            .count_history(&HistoryCount {
                name: name.to_string(),
            })
            .await
            .inspect_err(log_gateway_failure)?;

        Ok(count)
    }

    // =============================================================================
    // Helpers
    // =============================================================================

    /// Resolves several ids, fetching every cache miss with one batch query
    async fn load_history_by_ids(&self, ids: &[i64]) -> Result<Vec<PipelineInstanceModel>> {
        let mut resolved: HashMap<i64, PipelineInstanceModel> = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();

        for &id in ids {
            match self.cache.get(&cache::id_key(id)) {
                Some(cached) => {
                    resolved.insert(id, cached);
                }
                None => missing.push(id),
            }
        }

        tracing::debug!(
            "History page: {} cached, {} to load",
            resolved.len(),
            missing.len()
        );

        if !missing.is_empty() {
            let epochs = self.invalidations.snapshot();
            let fetched = self
                .gateway
                .history_by_ids(&HistoryByIds {
                    ids: missing.clone(),
                })
                .await
                .inspect_err(log_gateway_failure)?;

            let mut loaded = Vec::with_capacity(fetched.len());
            for mut pim in fetched {
                if !missing.contains(&pim.id) {
                    return Err(invariant_violation(format!(
                        "batch load of {:?} returned unexpected id {}",
                        missing, pim.id
                    )));
                }
                self.attach_material_revisions(&mut pim).await?;
                loaded.push(pim);
            }

            if let Some(absent) = missing
                .iter()
                .find(|id| !loaded.iter().any(|pim| pim.id == **id))
            {
                return Err(invariant_violation(format!(
                    "history range listed id {} but no record was found",
                    absent
                )));
            }

            // Only cache once the whole page has loaded
            for pim in loaded {
                self.invalidations
                    .put_if_current(self.cache.as_ref(), &epochs, pim.clone());
                resolved.insert(pim.id, pim);
            }
        }

        Ok(ids.iter().filter_map(|id| resolved.remove(id)).collect())
    }

    /// Loads a page with the heavier by-name query and caches each run by id
    async fn load_history_by_name(&self, page: &PageQuery) -> Result<Vec<PipelineInstanceModel>> {
        let epochs = self.invalidations.snapshot();
        let mut records = self
            .gateway
            .history_by_name(page)
            .await
            .inspect_err(log_gateway_failure)?;

        for pim in records.iter_mut() {
            self.attach_material_revisions(pim).await?;
        }

        for pim in &records {
            self.invalidations
                .put_if_current(self.cache.as_ref(), &epochs, pim.clone());
        }

        Ok(records)
    }

    async fn attach_material_revisions(&self, pim: &mut PipelineInstanceModel) -> Result<()> {
        let revisions = self
            .gateway
            .material_revisions_for_pipeline(&HistoryById { id: pim.id })
            .await
            .inspect_err(log_gateway_failure)?;

        pim.set_material_revisions(revisions);
        Ok(())
    }

    /// Fails if `history:<id>` holds a different run than the store returned
    fn verify_canonical_entry(&self, pim: &PipelineInstanceModel) -> Result<()> {
        match self.cache.get(&cache::id_key(pim.id)) {
            Some(cached) if !cached.same_run_as(pim) => Err(invariant_violation(format!(
                "cache entry for id {} holds {}/{} but the store has {}/{}",
                pim.id, cached.name, cached.counter, pim.name, pim.counter
            ))),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Invalidation
// =============================================================================

const INVALIDATION_STRIPES: usize = 64;

/// Epoch counters bumped by comment updates, striped by run id
///
/// A reader snapshots the epochs before querying the store and writes its
/// result to `history:<id>` only if the run's stripe has not moved since.
/// The check and the write happen under the lock the update holds while it
/// bumps and evicts, so a stale write cannot land after the eviction.
struct Invalidations {
    epochs: Mutex<[u64; INVALIDATION_STRIPES]>,
}

struct EpochSnapshot([u64; INVALIDATION_STRIPES]);

impl Invalidations {
    fn new() -> Self {
        Self {
            epochs: Mutex::new([0; INVALIDATION_STRIPES]),
        }
    }

    fn stripe(id: i64) -> usize {
        id.rem_euclid(INVALIDATION_STRIPES as i64) as usize
    }

    fn snapshot(&self) -> EpochSnapshot {
        EpochSnapshot(*self.epochs.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Caches `pim` under its id key unless an update overlapped the read
    fn put_if_current(
        &self,
        store: &dyn CacheStore,
        snapshot: &EpochSnapshot,
        pim: PipelineInstanceModel,
    ) {
        let epochs = self.epochs.lock().unwrap_or_else(PoisonError::into_inner);
        let stripe = Self::stripe(pim.id);

        if epochs[stripe] != snapshot.0[stripe] {
            tracing::debug!(
                "Skipping cache write for id {}: updated while loading",
                pim.id
            );
            return;
        }

        store.put(&cache::id_key(pim.id), pim);
    }

    /// Bumps the run's epoch and evicts its id key
    fn invalidate(&self, store: &dyn CacheStore, id: i64) {
        let mut epochs = self.epochs.lock().unwrap_or_else(PoisonError::into_inner);
        let stripe = Self::stripe(id);
        epochs[stripe] = epochs[stripe].wrapping_add(1);
        store.remove(&cache::id_key(id));
    }
}

fn invariant_violation(message: String) -> HistoryError {
    tracing::error!("Pipeline history drift: {}", message);
    HistoryError::InvariantViolation(message)
}

fn log_gateway_failure(err: &GatewayError) {
    tracing::warn!("Store gateway failure: {}", err);
}
