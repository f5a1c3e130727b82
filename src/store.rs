//! Record persistence
//!
//! `Repository<T>` is the per-entity contract the reconciler depends on.
//! `MemoryStore` keeps every table in insertion order and serializes to a
//! single JSON document, which is how the workspace persists it.

use crate::error::{Result, TabreconError};
use crate::model::{ColumnMapping, DatasetFile, RowMatch, RowRecord, Workflow};
use chrono::Utc;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// A persisted entity owned by a workflow
pub trait Record: Clone {
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    /// The owning workflow; a workflow owns itself
    fn workflow_id(&self) -> Uuid;

    fn touch(&mut self);
}

impl Record for Workflow {
    const KIND: &'static str = "Workflow";

    fn id(&self) -> Uuid {
        self.id
    }

    fn workflow_id(&self) -> Uuid {
        self.id
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

macro_rules! owned_record {
    ($ty:ty, $kind:literal) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn workflow_id(&self) -> Uuid {
                self.workflow_id
            }

            fn touch(&mut self) {
                self.updated_at = Utc::now();
            }
        }
    };
}

owned_record!(DatasetFile, "DatasetFile");
owned_record!(RowRecord, "RowRecord");
owned_record!(ColumnMapping, "ColumnMapping");
owned_record!(RowMatch, "RowMatch");

/// Key-addressable storage for one entity type
pub trait Repository<T: Record> {
    /// Insert a new record; its id must be unused
    fn create(&mut self, record: T) -> Result<T>;

    fn get(&self, id: Uuid) -> Result<T>;

    /// Every record, in insertion order
    fn list(&self) -> Result<Vec<T>>;

    /// All records of `workflow_id`, in insertion order
    fn list_by_workflow(&self, workflow_id: Uuid) -> Result<Vec<T>>;

    /// Replace the stored record with the same id
    fn update(&mut self, record: T) -> Result<T>;

    fn delete(&mut self, id: Uuid) -> Result<T>;
}

/// Everything the reconciler needs to persist
pub trait Store:
    Repository<Workflow>
    + Repository<DatasetFile>
    + Repository<RowRecord>
    + Repository<ColumnMapping>
    + Repository<RowMatch>
{
}

impl<S> Store for S where
    S: Repository<Workflow>
        + Repository<DatasetFile>
        + Repository<RowRecord>
        + Repository<ColumnMapping>
        + Repository<RowMatch>
{
}

/// In-memory table keyed by record id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table<T> {
    records: IndexMap<Uuid, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            records: IndexMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    fn create(&mut self, record: T) -> Result<T> {
        let id = record.id();
        if self.records.contains_key(&id) {
            return Err(TabreconError::invalid_input(format!(
                "{} {} already exists",
                T::KIND,
                id
            )));
        }
        self.records.insert(id, record.clone());
        Ok(record)
    }

    fn get(&self, id: Uuid) -> Result<T> {
        self.records
            .get(&id)
            .cloned()
            .ok_or_else(|| TabreconError::not_found(T::KIND, id))
    }

    fn list(&self) -> Vec<T> {
        self.records.values().cloned().collect()
    }

    fn list_by_workflow(&self, workflow_id: Uuid) -> Vec<T> {
        self.records
            .values()
            .filter(|r| r.workflow_id() == workflow_id)
            .cloned()
            .collect()
    }

    fn update(&mut self, mut record: T) -> Result<T> {
        let id = record.id();
        let slot = self
            .records
            .get_mut(&id)
            .ok_or_else(|| TabreconError::not_found(T::KIND, id))?;
        record.touch();
        *slot = record.clone();
        Ok(record)
    }

    fn delete(&mut self, id: Uuid) -> Result<T> {
        self.records
            .shift_remove(&id)
            .ok_or_else(|| TabreconError::not_found(T::KIND, id))
    }
}

/// All workflow tables held in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub workflows: Table<Workflow>,
    #[serde(default)]
    pub files: Table<DatasetFile>,
    #[serde(default)]
    pub rows: Table<RowRecord>,
    #[serde(default)]
    pub column_mappings: Table<ColumnMapping>,
    #[serde(default)]
    pub matches: Table<RowMatch>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store document, or an empty store when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

macro_rules! memory_repository {
    ($ty:ty, $field:ident) => {
        impl Repository<$ty> for MemoryStore {
            fn create(&mut self, record: $ty) -> Result<$ty> {
                self.$field.create(record)
            }

            fn get(&self, id: Uuid) -> Result<$ty> {
                self.$field.get(id)
            }

            fn list(&self) -> Result<Vec<$ty>> {
                Ok(self.$field.list())
            }

            fn list_by_workflow(&self, workflow_id: Uuid) -> Result<Vec<$ty>> {
                Ok(self.$field.list_by_workflow(workflow_id))
            }

            fn update(&mut self, record: $ty) -> Result<$ty> {
                self.$field.update(record)
            }

            fn delete(&mut self, id: Uuid) -> Result<$ty> {
                self.$field.delete(id)
            }
        }
    };
}

memory_repository!(Workflow, workflows);
memory_repository!(DatasetFile, files);
memory_repository!(RowRecord, rows);
memory_repository!(ColumnMapping, column_mappings);
memory_repository!(RowMatch, matches);

/// Read a JSON document of type `T` from disk
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
