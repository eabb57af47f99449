//! In-memory fakes that record every interaction

use async_trait::async_trait;
use chrono::Utc;
use gantry_core::domain::instance::{
    BuildCause, PipelineInstanceModel, StageInstanceModel, StageState,
};
use gantry_core::domain::material::{Material, MaterialRevision, MaterialRevisions, Modification};
use gantry_core::domain::pipeline::{Pipeline, same_name};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::cache::{CacheStore, InMemoryCache};
use crate::gateway::{
    CommentUpdate, GatewayError, GatewayResult, HistoryById, HistoryByIds, HistoryCount,
    NameAndCounter, PageQuery, StoreGateway,
};

pub fn instance(id: i64, name: &str, counter: i32) -> PipelineInstanceModel {
    let mut pim = PipelineInstanceModel::new(
        name,
        counter,
        counter.to_string(),
        BuildCause::manual_forced(),
        vec![StageInstanceModel {
            name: "build".to_string(),
            counter: 1,
            state: StageState::Building,
            approved_by: Some("changes".to_string()),
            scheduled_at: Some(Utc::now()),
        }],
    );
    pim.id = id;
    pim
}

pub fn revisions_for(revision: &str) -> MaterialRevisions {
    MaterialRevisions::new(vec![MaterialRevision {
        material: Material {
            fingerprint: "fp-repo".to_string(),
            name: "repo".to_string(),
            material_type: "git".to_string(),
        },
        modifications: vec![Modification::new(
            "lgao",
            "Fixing the not checked in files",
            Some("foo@bar.com".to_string()),
            Utc::now(),
            revision,
        )],
        changed: true,
    }])
}

// =============================================================================
// Gateway
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    HistoryByNameAndCounter(NameAndCounter),
    PipelineByNameAndCounter(NameAndCounter),
    HistoryById(i64),
    HistoryByIds(Vec<i64>),
    MaterialRevisions(i64),
    UpdateComment(CommentUpdate),
    PipelineRange(PageQuery),
    HistoryByName(PageQuery),
    AllActive,
    CountHistory(String),
}

/// Pauses one store read until the test releases it
#[derive(Default)]
pub struct Gate {
    /// Signalled once the read has taken its snapshot of the records
    pub entered: Notify,
    pub release: Notify,
}

/// In-memory store whose name matching folds case like `LOWER(name)`
#[derive(Default)]
pub struct FakeGateway {
    records: Mutex<Vec<PipelineInstanceModel>>,
    revisions: Mutex<HashMap<i64, MaterialRevisions>>,
    active: Mutex<Vec<PipelineInstanceModel>>,
    hidden: Mutex<HashSet<i64>>,
    calls: Mutex<Vec<Query>>,
    failing: AtomicBool,
    failing_revisions: AtomicBool,
    failing_revision_ids: Mutex<HashSet<i64>>,
    failing_batch: AtomicBool,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pim: PipelineInstanceModel) {
        self.records.lock().unwrap().push(pim);
    }

    pub fn set_revisions(&self, id: i64, revisions: MaterialRevisions) {
        self.revisions.lock().unwrap().insert(id, revisions);
    }

    pub fn add_active(&self, pim: PipelineInstanceModel) {
        self.active.lock().unwrap().push(pim);
    }

    /// Keeps a record listed by range queries but unreadable by id
    pub fn hide_record(&self, id: i64) {
        self.hidden.lock().unwrap().insert(id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_revisions(&self, failing: bool) {
        self.failing_revisions.store(failing, Ordering::SeqCst);
    }

    pub fn fail_revisions_for(&self, id: i64) {
        self.failing_revision_ids.lock().unwrap().insert(id);
    }

    pub fn fail_batch(&self, failing: bool) {
        self.failing_batch.store(failing, Ordering::SeqCst);
    }

    /// Holds the next `history_by_id` call after it has read the records
    pub fn hold_next_history_by_id(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Query> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, query: Query) -> GatewayResult<()> {
        self.calls.lock().unwrap().push(query);
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn find(&self, predicate: impl Fn(&PipelineInstanceModel) -> bool) -> Option<PipelineInstanceModel> {
        self.records.lock().unwrap().iter().find(|p| predicate(p)).cloned()
    }

    fn page(&self, params: &PageQuery) -> Vec<PipelineInstanceModel> {
        let mut matching: Vec<PipelineInstanceModel> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|p| same_name(&p.name, &params.name))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.counter.cmp(&a.counter));
        matching
            .into_iter()
            .skip(params.offset as usize)
            .take(params.page_size as usize)
            .collect()
    }
}

#[async_trait]
impl StoreGateway for FakeGateway {
    async fn history_by_name_and_counter(
        &self,
        params: &NameAndCounter,
    ) -> GatewayResult<Option<PipelineInstanceModel>> {
        self.record(Query::HistoryByNameAndCounter(params.clone()))?;
        Ok(self.find(|p| same_name(&p.name, &params.name) && p.counter == params.counter))
    }

    async fn pipeline_by_name_and_counter(
        &self,
        params: &NameAndCounter,
    ) -> GatewayResult<Option<Pipeline>> {
        self.record(Query::PipelineByNameAndCounter(params.clone()))?;
        Ok(self
            .find(|p| same_name(&p.name, &params.name) && p.counter == params.counter)
            .map(|p| Pipeline {
                id: p.id,
                name: p.name,
                counter: p.counter,
                label: p.label,
                comment: p.comment,
            }))
    }

    async fn history_by_id(
        &self,
        params: &HistoryById,
    ) -> GatewayResult<Option<PipelineInstanceModel>> {
        self.record(Query::HistoryById(params.id))?;
        let hidden = self.hidden.lock().unwrap().contains(&params.id);
        let found = self.find(|p| p.id == params.id).filter(|_| !hidden);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        Ok(found)
    }

    async fn history_by_ids(
        &self,
        params: &HistoryByIds,
    ) -> GatewayResult<Vec<PipelineInstanceModel>> {
        self.record(Query::HistoryByIds(params.ids.clone()))?;
        if self.failing_batch.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("batch query failed".to_string()));
        }
        let hidden = self.hidden.lock().unwrap().clone();
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|p| params.ids.contains(&p.id) && !hidden.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn material_revisions_for_pipeline(
        &self,
        params: &HistoryById,
    ) -> GatewayResult<MaterialRevisions> {
        self.record(Query::MaterialRevisions(params.id))?;
        if self.failing_revisions.load(Ordering::SeqCst)
            || self.failing_revision_ids.lock().unwrap().contains(&params.id)
        {
            return Err(GatewayError::Unavailable("revisions unavailable".to_string()));
        }
        Ok(self
            .revisions
            .lock()
            .unwrap()
            .get(&params.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_comment(&self, params: &CommentUpdate) -> GatewayResult<u64> {
        self.record(Query::UpdateComment(params.clone()))?;
        let mut updated = 0;
        for pim in self.records.lock().unwrap().iter_mut() {
            if same_name(&pim.name, &params.name) && pim.counter == params.counter {
                pim.comment = Some(params.comment.clone());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn pipeline_range(&self, params: &PageQuery) -> GatewayResult<Vec<i64>> {
        self.record(Query::PipelineRange(params.clone()))?;
        Ok(self.page(params).iter().map(|p| p.id).collect())
    }

    async fn history_by_name(
        &self,
        params: &PageQuery,
    ) -> GatewayResult<Vec<PipelineInstanceModel>> {
        self.record(Query::HistoryByName(params.clone()))?;
        Ok(self.page(params))
    }

    async fn all_active_instances(&self) -> GatewayResult<Vec<PipelineInstanceModel>> {
        self.record(Query::AllActive)?;
        Ok(self.active.lock().unwrap().clone())
    }

    async fn count_history(&self, params: &HistoryCount) -> GatewayResult<i64> {
        self.record(Query::CountHistory(params.name.clone()))?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|p| same_name(&p.name, &params.name))
            .count() as i64)
    }
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    Get(String),
    Put(String),
    Remove(String),
}

/// Wraps an [`InMemoryCache`] and logs every operation
pub struct RecordingCache {
    inner: InMemoryCache,
    ops: Mutex<Vec<CacheOp>>,
}

impl RecordingCache {
    pub fn new(inner: InMemoryCache) -> Self {
        Self {
            inner,
            ops: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped cache; operations on it are not recorded
    pub fn inner(&self) -> &InMemoryCache {
        &self.inner
    }

    pub fn ops(&self) -> Vec<CacheOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn puts(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Put(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn removes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Remove(key) => Some(key),
                _ => None,
            })
            .collect()
    }
}

impl CacheStore for RecordingCache {
    fn get(&self, key: &str) -> Option<PipelineInstanceModel> {
        self.ops.lock().unwrap().push(CacheOp::Get(key.to_string()));
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: PipelineInstanceModel) {
        self.ops.lock().unwrap().push(CacheOp::Put(key.to_string()));
        self.inner.put(key, value);
    }

    fn remove(&self, key: &str) {
        self.ops.lock().unwrap().push(CacheOp::Remove(key.to_string()));
        self.inner.remove(key);
    }
}
