//! Engine handle for one job run.
//!
//! A [`Session`] owns the credentials used to reach remote storage and a
//! catalog of named in-memory relations that later stages can query.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use sparkify_core::config::AwsConfig;
use sparkify_core::ConfigError;
use sparkify_storage::{Location, StorageBackend};

use crate::error::EtlError;

type Relation = Arc<dyn Any + Send + Sync>;

pub struct Session {
    aws: AwsConfig,
    relations: HashMap<String, (Relation, usize)>,
    started: Instant,
}

impl Session {
    /// Create the engine handle. Credentials are taken from `aws` only; the
    /// process environment is never modified.
    pub fn create(aws: &AwsConfig) -> Result<Self, EtlError> {
        if aws.region.trim().is_empty() {
            return Err(ConfigError::Missing("AWS region".into()).into());
        }
        info!(
            region = %aws.region,
            credentials = aws.is_configured(),
            "Session created"
        );
        Ok(Self {
            aws: aws.clone(),
            relations: HashMap::new(),
            started: Instant::now(),
        })
    }

    /// Open a storage backend for `location` with this session's credentials.
    /// A local root must already exist.
    pub fn open(&self, location: &Location) -> Result<StorageBackend, EtlError> {
        Ok(StorageBackend::open(location, &self.aws)?)
    }

    /// Open `location` for writing, creating a missing local root.
    pub fn open_output(&self, location: &Location) -> Result<StorageBackend, EtlError> {
        Ok(StorageBackend::create(location, &self.aws)?)
    }

    /// Register `rows` under `name`, replacing any relation of that name.
    pub fn register<T: Send + Sync + 'static>(&mut self, name: &str, rows: Vec<T>) -> Arc<Vec<T>> {
        let count = rows.len();
        let rows = Arc::new(rows);
        let erased: Relation = rows.clone();
        if self.relations.insert(name.to_string(), (erased, count)).is_some() {
            debug!(relation = name, "Replaced registered relation");
        }
        info!(relation = name, rows = count, "Registered relation");
        rows
    }

    /// Look up a registered relation by name and row type.
    pub fn relation<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<Vec<T>>, EtlError> {
        let (relation, _) = self
            .relations
            .get(name)
            .ok_or_else(|| EtlError::RelationNotFound(name.to_string()))?;
        relation
            .clone()
            .downcast::<Vec<T>>()
            .map_err(|_| EtlError::RelationType {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn relation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.relations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Release the handle and every registered relation.
    pub fn stop(self) {
        for name in self.relation_names() {
            debug!(relation = name, rows = self.relations[name].1, "Dropping relation");
        }
        info!(
            relations = self.relations.len(),
            "Session stopped after {:.1}s",
            self.started.elapsed().as_secs_f64()
        );
    }
}
