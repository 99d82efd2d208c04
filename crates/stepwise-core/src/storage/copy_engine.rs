//! Batch copy engine for sled stores.
//!
//! Copies every record tree from the source store into the destination store.
//! Records pass through the [`RecordTransform`] registered for the mapping's
//! rule; the built-in `copy` rule keeps them unchanged. The source is read
//! through a snapshot and never written.

use super::sled_backend::{StoreSnapshot, META_TREE};
use super::{CopyEngineConfig, SledStoreConfig, StoreLocation, TransformEngine};
use crate::error::Error;
use crate::mapping::{Mapping, MappingRule};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Per-record rewrite applied while copying a hop.
pub trait RecordTransform: Send + Sync {
    /// Rewrite one record of `tree`. `Ok(None)` drops the record.
    fn transform_record(&self, tree: &str, key: &[u8], value: &[u8])
        -> Result<Option<Vec<u8>>, Error>;
}

impl<F> RecordTransform for F
where
    F: Fn(&str, &[u8], &[u8]) -> Result<Option<Vec<u8>>, Error> + Send + Sync,
{
    fn transform_record(
        &self,
        tree: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        self(tree, key, value)
    }
}

/// [`TransformEngine`] copying sled stores batch by batch.
#[derive(Clone)]
pub struct CopyEngine {
    store: SledStoreConfig,
    config: CopyEngineConfig,
    transforms: HashMap<String, Arc<dyn RecordTransform>>,
}

impl CopyEngine {
    /// Create an engine opening stores with `store` settings.
    pub fn new(store: SledStoreConfig, config: CopyEngineConfig) -> Self {
        Self {
            store,
            config,
            transforms: HashMap::new(),
        }
    }

    /// Register the record transform for a mapping rule.
    pub fn with_transform(
        mut self,
        rule: impl Into<String>,
        transform: impl RecordTransform + 'static,
    ) -> Self {
        self.transforms.insert(rule.into(), Arc::new(transform));
        self
    }

    /// Rules this engine can apply.
    pub fn rules(&self) -> Vec<&str> {
        let mut rules: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        if !self.transforms.contains_key(MappingRule::COPY) {
            rules.push(MappingRule::COPY);
        }
        rules.sort_unstable();
        rules
    }

    fn record_transform(&self, rule: &MappingRule) -> Result<Option<&dyn RecordTransform>, Error> {
        match self.transforms.get(rule.as_str()) {
            Some(transform) => Ok(Some(transform.as_ref())),
            None if rule.as_str() == MappingRule::COPY => Ok(None),
            None => Err(Error::Transform(format!(
                "no record transform registered for rule {rule}"
            ))),
        }
    }
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new(SledStoreConfig::default(), CopyEngineConfig::default())
    }
}

impl TransformEngine for CopyEngine {
    fn transform(
        &self,
        source: &StoreLocation,
        mapping: &Mapping,
        destination: &StoreLocation,
        progress: &(dyn Fn(f64) + Sync),
    ) -> Result<(), Error> {
        let record_transform = self.record_transform(&mapping.rule)?;

        let snapshot = StoreSnapshot::open(&self.store, source)?;
        let src = snapshot.db();
        let dst = self.store.to_sled_config(destination.path()).open()?;

        let trees: Vec<sled::IVec> = src
            .tree_names()
            .into_iter()
            .filter(|name| &name[..] != META_TREE)
            .collect();

        let mut total = 0usize;
        for name in &trees {
            total += src.open_tree(name)?.len();
        }

        progress(0.0);
        let mut processed = 0usize;
        let report = |processed: usize| {
            if total > 0 {
                progress(processed as f64 / total as f64);
            }
        };

        for name in &trees {
            let tree_name = String::from_utf8_lossy(name).into_owned();
            let src_tree = src.open_tree(name)?;
            let dst_tree = dst.open_tree(name)?;

            let mut batch = sled::Batch::default();
            let mut in_batch = 0usize;
            for item in src_tree.iter() {
                let (key, value) = item?;
                let output = match record_transform {
                    None => Some(value.to_vec()),
                    Some(transform) => transform.transform_record(&tree_name, &key, &value)?,
                };
                if let Some(output) = output {
                    batch.insert(key, output);
                }

                in_batch += 1;
                processed += 1;
                if in_batch >= self.config.batch_size {
                    dst_tree.apply_batch(std::mem::take(&mut batch))?;
                    in_batch = 0;
                    report(processed);
                }
            }

            if in_batch > 0 {
                dst_tree.apply_batch(batch)?;
                report(processed);
            }
            debug!(tree = %tree_name, mapping = %mapping.name, "tree copied");
        }

        dst.flush()?;
        progress(1.0);
        Ok(())
    }
}
