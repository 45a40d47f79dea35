//! StateStore — redb-backed object store for the ramp control plane.
//!
//! Typed CRUD over policies, revisions, configurations, routes, and plan
//! states. All values are JSON-serialized into redb's `&[u8]` value
//! columns under `{namespace}/{name}` keys. The store supports both
//! on-disk and in-memory backends (the latter for testing).

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use ramp_core::{Configuration, ObjectKey, PlanState, Policy, Revision, Route};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// All tables share the same shape: `&str` keys, JSON `&[u8]` values.
type Table = TableDefinition<'static, &'static str, &'static [u8]>;

fn txn_err(e: impl Display) -> StateError {
    StateError::Transaction(e.to_string())
}

fn table_err(kind: &'static str, e: impl Display) -> StateError {
    StateError::Table {
        kind,
        reason: e.to_string(),
    }
}

fn object_err(op: &'static str, kind: &'static str, key: &str, e: impl Display) -> StateError {
    StateError::Object {
        op,
        kind,
        key: key.to_string(),
        reason: e.to_string(),
    }
}

fn encode_err(kind: &'static str, key: &str, e: impl Display) -> StateError {
    StateError::Encode {
        kind,
        key: key.to_string(),
        reason: e.to_string(),
    }
}

fn corrupt_err(kind: &'static str, key: &str, e: impl Display) -> StateError {
    StateError::Corrupt {
        kind,
        key: key.to_string(),
        reason: e.to_string(),
    }
}

/// Thread-safe object store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(|e| StateError::Open(e.to_string()))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "object store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(|e| StateError::Open(e.to_string()))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory object store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(txn_err)?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(POLICIES).map_err(|e| table_err("policy", e))?;
        txn.open_table(REVISIONS)
            .map_err(|e| table_err("revision", e))?;
        txn.open_table(CONFIGURATIONS)
            .map_err(|e| table_err("configuration", e))?;
        txn.open_table(ROUTES).map_err(|e| table_err("route", e))?;
        txn.open_table(PLAN_STATES)
            .map_err(|e| table_err("plan state", e))?;
        txn.commit().map_err(txn_err)?;
        Ok(())
    }

    // ── Generic plumbing ───────────────────────────────────────────

    fn put<T: Serialize>(
        &self,
        table: Table,
        kind: &'static str,
        key: &str,
        value: &T,
    ) -> StateResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| encode_err(kind, key, e))?;
        let txn = self.db.begin_write().map_err(txn_err)?;
        {
            let mut table = txn.open_table(table).map_err(|e| table_err(kind, e))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(|e| object_err("store", kind, key, e))?;
        }
        txn.commit().map_err(txn_err)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(
        &self,
        table: Table,
        kind: &'static str,
        key: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(txn_err)?;
        let table = txn.open_table(table).map_err(|e| table_err(kind, e))?;
        match table.get(key).map_err(|e| object_err("load", kind, key, e))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value())
                    .map_err(|e| corrupt_err(kind, key, e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, table: Table, kind: &'static str, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(txn_err)?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(|e| table_err(kind, e))?;
            existed = table
                .remove(key)
                .map_err(|e| object_err("delete", kind, key, e))?
                .is_some();
        }
        txn.commit().map_err(txn_err)?;
        Ok(existed)
    }

    fn list<T: DeserializeOwned>(&self, table: Table, kind: &'static str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(txn_err)?;
        let table = txn.open_table(table).map_err(|e| table_err(kind, e))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(|e| table_err(kind, e))? {
            let (key, value) = entry.map_err(|e| table_err(kind, e))?;
            let item = serde_json::from_slice(value.value())
                .map_err(|e| corrupt_err(kind, key.value(), e))?;
            results.push(item);
        }
        Ok(results)
    }

    // ── Policies ───────────────────────────────────────────────────

    pub fn put_policy(&self, policy: &Policy) -> StateResult<()> {
        self.put(POLICIES, "policy", &policy.table_key(), policy)?;
        debug!(key = %policy.key(), "policy stored");
        Ok(())
    }

    pub fn get_policy(&self, key: &ObjectKey) -> StateResult<Option<Policy>> {
        self.get(POLICIES, "policy", &key.table_key())
    }

    /// Delete a policy. Returns true if it existed.
    pub fn delete_policy(&self, key: &ObjectKey) -> StateResult<bool> {
        self.delete(POLICIES, "policy", &key.table_key())
    }

    pub fn list_policies(&self) -> StateResult<Vec<Policy>> {
        self.list(POLICIES, "policy")
    }

    // ── Revisions ──────────────────────────────────────────────────

    pub fn put_revision(&self, revision: &Revision) -> StateResult<()> {
        self.put(REVISIONS, "revision", &revision.table_key(), revision)?;
        debug!(key = %revision.key(), configuration = %revision.configuration, "revision stored");
        Ok(())
    }

    pub fn get_revision(&self, key: &ObjectKey) -> StateResult<Option<Revision>> {
        self.get(REVISIONS, "revision", &key.table_key())
    }

    /// All revisions owned by a configuration, in no particular order.
    ///
    /// The counterpart of a `configuration=<name>` label selector: the
    /// scan filters on the revision's back-reference.
    pub fn list_revisions_for_configuration(
        &self,
        namespace: &str,
        configuration: &str,
    ) -> StateResult<Vec<Revision>> {
        let all: Vec<Revision> = self.list(REVISIONS, "revision")?;
        Ok(all
            .into_iter()
            .filter(|r| r.namespace == namespace && r.configuration == configuration)
            .collect())
    }

    // ── Configurations ─────────────────────────────────────────────

    pub fn put_configuration(&self, cfg: &Configuration) -> StateResult<()> {
        self.put(CONFIGURATIONS, "configuration", &cfg.table_key(), cfg)?;
        debug!(key = %cfg.key(), "configuration stored");
        Ok(())
    }

    pub fn get_configuration(&self, key: &ObjectKey) -> StateResult<Option<Configuration>> {
        self.get(CONFIGURATIONS, "configuration", &key.table_key())
    }

    pub fn list_configurations(&self) -> StateResult<Vec<Configuration>> {
        self.list(CONFIGURATIONS, "configuration")
    }

    // ── Routes ─────────────────────────────────────────────────────

    pub fn put_route(&self, route: &Route) -> StateResult<()> {
        self.put(ROUTES, "route", &route.table_key(), route)?;
        debug!(key = %route.key(), targets = route.spec.traffic.len(), "route stored");
        Ok(())
    }

    pub fn get_route(&self, key: &ObjectKey) -> StateResult<Option<Route>> {
        self.get(ROUTES, "route", &key.table_key())
    }

    pub fn list_routes(&self) -> StateResult<Vec<Route>> {
        self.list(ROUTES, "route")
    }

    // ── Plan states ────────────────────────────────────────────────

    pub fn put_plan_state(&self, ps: &PlanState) -> StateResult<()> {
        self.put(PLAN_STATES, "plan state", &ps.table_key(), ps)?;
        debug!(key = %ps.key(), "plan state stored");
        Ok(())
    }

    pub fn get_plan_state(&self, key: &ObjectKey) -> StateResult<Option<PlanState>> {
        self.get(PLAN_STATES, "plan state", &key.table_key())
    }

    pub fn list_plan_states(&self) -> StateResult<Vec<PlanState>> {
        self.list(PLAN_STATES, "plan state")
    }
}
