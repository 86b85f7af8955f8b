//! In-memory stores for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use fhir_bridge::adapters::database::{
    ChangeLogRetention, ChangeReader, CursorStore, LoadFailure, LoadItem, LoadReport,
    ReadRequest, SourceStore, TargetStore,
};
use fhir_bridge::core::mapping::{CompileOptions, MappingEngine, MappingRegistry};
use fhir_bridge::core::state::SyncCursor;
use fhir_bridge::core::sync::{SyncOrchestrator, SyncSettings};
use fhir_bridge::domain::{
    BridgeError, ChangeEvent, ChangeId, Operation, Result, SourceRecord, TenantId,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub fn tenant() -> TenantId {
    TenantId::new(1).unwrap()
}

pub fn patient(id: i64) -> SourceRecord {
    let first: String = FirstName().fake();
    let last: String = LastName().fake();
    SourceRecord::new()
        .with("patient_id", id)
        .with("medical_record_number", format!("MRN{id:06}"))
        .with("first_name", first)
        .with("last_name", last)
        .with("date_of_birth", "1980-04-02")
        .with("gender", "F")
}

pub fn encounter(id: i64, patient_id: i64) -> SourceRecord {
    SourceRecord::new()
        .with("encounter_id", id)
        .with("patient_id", patient_id)
        .with("encounter_type", "inpatient")
        .with("admission_date", "2024-03-01T08:30:00")
        .with("status", "active")
}

pub fn lab_result(id: i64, patient_id: i64) -> SourceRecord {
    SourceRecord::new()
        .with("lab_id", id)
        .with("patient_id", patient_id)
        .with("test_name", "Hemoglobin")
        .with("result_value", "13.5")
        .with("result_unit", "g/dL")
        .with("abnormal_flag", "normal")
        .with("performed_date", "2024-03-02T07:00:00")
}

/// Source tables keyed by their integer key
#[derive(Default)]
pub struct MemorySource {
    tables: Mutex<HashMap<String, BTreeMap<i64, SourceRecord>>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    extract_calls: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, table: &str, id: i64, record: SourceRecord) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .insert(id, record);
    }

    pub fn remove(&self, table: &str, id: i64) {
        if let Some(rows) = self.tables.lock().unwrap().get_mut(table) {
            rows.remove(&id);
        }
    }

    /// Blocks every extract until the returned semaphore gets permits
    pub fn hold_extracts(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    async fn extract(
        &self,
        table: &str,
        _key_column: &str,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<SourceRecord>> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| BridgeError::Other(e.to_string()))?;
        }

        let tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let lower = after.map_or(i64::MIN, |a| a.saturating_add(1));
        Ok(rows
            .range(lower..)
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn fetch_by_id(
        &self,
        table: &str,
        _key_column: &str,
        id: i64,
    ) -> Result<Option<SourceRecord>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    async fn count(&self, table: &str) -> Result<u64> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .map_or(0, |rows| rows.len() as u64))
    }
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub resource: Value,
    pub content_hash: String,
    pub writes: usize,
}

type DocumentKey = (i32, String, i64);

/// Target documents and cursors
#[derive(Default)]
pub struct MemoryTarget {
    documents: Mutex<BTreeMap<DocumentKey, StoredDocument>>,
    cursors: Mutex<HashMap<i32, SyncCursor>>,
    rejected_ids: Mutex<HashSet<i64>>,
    fail_batches: AtomicBool,
    batches: AtomicUsize,
}

impl MemoryTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records with this source id fail individually
    pub fn reject(&self, source_id: i64) {
        self.rejected_ids.lock().unwrap().insert(source_id);
    }

    /// Every batch transaction fails as a whole
    pub fn fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    pub fn document(&self, tenant: TenantId, table: &str, id: i64) -> Option<StoredDocument> {
        self.documents
            .lock()
            .unwrap()
            .get(&(tenant.get(), table.to_string(), id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn stored_cursor(&self, tenant: TenantId) -> Option<SyncCursor> {
        self.cursors.lock().unwrap().get(&tenant.get()).cloned()
    }
}

#[async_trait]
impl TargetStore for MemoryTarget {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_batch(&self, tenant: TenantId, items: Vec<LoadItem>) -> Result<LoadReport> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(BridgeError::Load("commit failed".to_string()));
        }

        let rejected = self.rejected_ids.lock().unwrap().clone();
        let mut documents = self.documents.lock().unwrap();
        let mut report = LoadReport::default();

        for item in items {
            if rejected.contains(&item.source_id) {
                report.failures.push(LoadFailure {
                    source_id: item.source_id,
                    error: "value too long for type character varying(64)".to_string(),
                });
                continue;
            }

            let key = (tenant.get(), item.source_table.clone(), item.source_id);
            let hash = item.document.content_hash();
            match documents.get_mut(&key) {
                Some(existing) if existing.content_hash == hash => report.unchanged += 1,
                Some(existing) => {
                    existing.resource = item.document.to_value();
                    existing.content_hash = hash;
                    existing.writes += 1;
                    report.loaded += 1;
                }
                None => {
                    documents.insert(
                        key,
                        StoredDocument {
                            resource: item.document.to_value(),
                            content_hash: hash,
                            writes: 1,
                        },
                    );
                    report.loaded += 1;
                }
            }
        }
        Ok(report)
    }

    async fn delete(&self, tenant: TenantId, source_table: &str, source_id: i64) -> Result<bool> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .remove(&(tenant.get(), source_table.to_string(), source_id))
            .is_some())
    }

    async fn count(&self, tenant: TenantId, source_table: Option<&str>) -> Result<u64> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .keys()
            .filter(|(t, table, _)| {
                *t == tenant.get() && source_table.map_or(true, |s| s == table.as_str())
            })
            .count() as u64)
    }
}

#[async_trait]
impl CursorStore for MemoryTarget {
    async fn load_cursor(&self, tenant: TenantId) -> Result<Option<SyncCursor>> {
        Ok(self.cursors.lock().unwrap().get(&tenant.get()).cloned())
    }

    async fn save_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        self.cursors
            .lock()
            .unwrap()
            .insert(cursor.tenant_id.get(), cursor.clone());
        Ok(())
    }
}

/// Append-only change log
#[derive(Default)]
pub struct MemoryChangeLog {
    events: Mutex<Vec<ChangeEvent>>,
    open: Mutex<HashMap<usize, Vec<ChangeEvent>>>,
    next_txn: AtomicUsize,
    reads: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MemoryChangeLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, table: &str, operation: Operation, record_id: i64) -> ChangeId {
        self.push_at(table, operation, record_id, Utc::now())
    }

    pub fn push_at(
        &self,
        table: &str,
        operation: Operation,
        record_id: i64,
        changed_at: DateTime<Utc>,
    ) -> ChangeId {
        let mut events = self.events.lock().unwrap();
        let change_id = next_change_id(&events);
        events.push(ChangeEvent {
            change_id,
            table_name: table.to_string(),
            operation,
            record_id,
            old_data: None,
            new_data: None,
            changed_at,
            actor: Some("postgres".to_string()),
        });
        change_id
    }

    /// Opens a source transaction whose events stay invisible until commit
    pub fn begin(&self) -> usize {
        let txn = self.next_txn.fetch_add(1, Ordering::SeqCst);
        self.open.lock().unwrap().insert(txn, Vec::new());
        txn
    }

    /// Logs a mutation inside an open transaction
    pub fn stage(&self, txn: usize, table: &str, operation: Operation, record_id: i64) {
        let mut open = self.open.lock().unwrap();
        let staged = open.get_mut(&txn).expect("transaction is not open");
        staged.push(ChangeEvent {
            change_id: ChangeId::new(0),
            table_name: table.to_string(),
            operation,
            record_id,
            old_data: None,
            new_data: None,
            changed_at: Utc::now(),
            actor: Some("postgres".to_string()),
        });
    }

    /// Commits a transaction, numbering its events after every committed one
    pub fn commit(&self, txn: usize) -> Vec<ChangeId> {
        let staged = self
            .open
            .lock()
            .unwrap()
            .remove(&txn)
            .expect("transaction is not open");
        let mut events = self.events.lock().unwrap();
        let mut numbered = Vec::with_capacity(staged.len());
        for mut event in staged {
            event.change_id = next_change_id(&events);
            numbered.push(event.change_id);
            events.push(event);
        }
        numbered
    }

    /// Appends an event with an explicit id
    pub fn push_with_id(&self, change_id: i64, table: &str, operation: Operation, record_id: i64) {
        self.events.lock().unwrap().push(ChangeEvent {
            change_id: ChangeId::new(change_id),
            table_name: table.to_string(),
            operation,
            record_id,
            old_data: None,
            new_data: None,
            changed_at: Utc::now(),
            actor: None,
        });
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

fn next_change_id(events: &[ChangeEvent]) -> ChangeId {
    let last = events.iter().map(|e| e.change_id.get()).max().unwrap_or(0);
    ChangeId::new(last + 1)
}

#[async_trait]
impl ChangeReader for MemoryChangeLog {
    async fn read(&self, request: &ReadRequest) -> Result<Vec<ChangeEvent>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::Read("connection reset by peer".to_string()));
        }

        let since = request.since.unwrap_or(ChangeId::new(0));
        let mut events: Vec<ChangeEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.change_id > since)
            .filter(|e| request.table.as_ref().map_or(true, |t| &e.table_name == t))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.change_id);
        events.truncate(request.limit);
        Ok(events)
    }

    async fn latest_id(&self) -> Result<ChangeId> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::Read("connection reset by peer".to_string()));
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.change_id)
            .max()
            .unwrap_or(ChangeId::new(0)))
    }
}

#[async_trait]
impl ChangeLogRetention for MemoryChangeLog {
    async fn purge(&self, retain_days: u32, up_to: ChangeId) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(retain_days));
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| !(e.changed_at < cutoff && e.change_id <= up_to));
        Ok((before - events.len()) as u64)
    }
}

pub fn builtin_engine() -> MappingEngine {
    MappingEngine::new(MappingRegistry::builtin(CompileOptions::default()).unwrap())
}

pub struct Harness {
    pub source: Arc<MemorySource>,
    pub target: Arc<MemoryTarget>,
    pub log: Arc<MemoryChangeLog>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SyncSettings::default())
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        let source = MemorySource::new();
        let target = MemoryTarget::new();
        let log = MemoryChangeLog::new();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&source) as Arc<dyn SourceStore>,
            Arc::clone(&target) as Arc<dyn TargetStore>,
            Arc::clone(&log) as Arc<dyn ChangeReader>,
            builtin_engine(),
            settings,
        ));
        Self {
            source,
            target,
            log,
            orchestrator,
        }
    }
}
