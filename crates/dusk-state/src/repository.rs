//! Capability implementations over [`StateStore`].
//!
//! The store doubles as a local instance registry (for standalone
//! deployments and tests) and as the postponement token store.

use async_trait::async_trait;
use tracing::{debug, warn};

use dusk_core::{
    Instance, InstanceRepository, InstanceStatus, PostponementToken, StopOutcome, TokenStore,
};

use crate::error::StateError;
use crate::store::StateStore;

#[async_trait]
impl InstanceRepository for StateStore {
    async fn list_eligible_running_instances(&self) -> anyhow::Result<Vec<Instance>> {
        let mut instances = Vec::new();
        for record in self.list_instances()? {
            if !record.is_eligible() || record.status != InstanceStatus::Running {
                continue;
            }
            match record.to_instance() {
                Ok(instance) => instances.push(instance),
                // One bad tag must not hide the rest of the fleet.
                Err(e) => warn!(instance_id = %record.id, error = %e, "skipping instance"),
            }
        }
        Ok(instances)
    }

    async fn get_instance(&self, id: &str) -> anyhow::Result<Option<Instance>> {
        match StateStore::get_instance(self, id)? {
            Some(record) => Ok(Some(record.to_instance()?)),
            None => Ok(None),
        }
    }

    async fn set_tags(&self, id: &str, tags: &[(&str, &str)]) -> anyhow::Result<()> {
        self.update_instance(id, |record| {
            for (key, value) in tags {
                record.tags.insert((*key).to_string(), (*value).to_string());
            }
            true
        })?
        .ok_or_else(|| StateError::InstanceNotFound(id.to_string()))?;
        debug!(instance_id = %id, count = tags.len(), "tags set");
        Ok(())
    }

    async fn set_tags_if(
        &self,
        id: &str,
        guard_key: &str,
        expected: Option<&str>,
        tags: &[(&str, &str)],
    ) -> anyhow::Result<bool> {
        let (applied, _) = self
            .update_instance(id, |record| {
                if record.tag(guard_key) != expected {
                    return false;
                }
                for (key, value) in tags {
                    record.tags.insert((*key).to_string(), (*value).to_string());
                }
                true
            })?
            .ok_or_else(|| StateError::InstanceNotFound(id.to_string()))?;
        if !applied {
            debug!(instance_id = %id, guard_key, "conditional tag write lost its guard");
        }
        Ok(applied)
    }

    async fn delete_tags(&self, id: &str, keys: &[&str]) -> anyhow::Result<()> {
        self.update_instance(id, |record| {
            let before = record.tags.len();
            record.tags.retain(|k, _| !keys.contains(&k.as_str()));
            record.tags.len() != before
        })?
        .ok_or_else(|| StateError::InstanceNotFound(id.to_string()))?;
        debug!(instance_id = %id, ?keys, "tags deleted");
        Ok(())
    }

    async fn stop_instance(&self, id: &str) -> anyhow::Result<StopOutcome> {
        let mut previous = InstanceStatus::Stopped;
        let (_, record) = self
            .update_instance(id, |record| {
                previous = record.status;
                record.status = InstanceStatus::Stopped;
                previous != InstanceStatus::Stopped
            })?
            .ok_or_else(|| StateError::InstanceNotFound(id.to_string()))?;
        Ok(StopOutcome {
            instance_id: record.id,
            previous,
            current: record.status,
        })
    }
}

#[async_trait]
impl TokenStore for StateStore {
    async fn put(&self, token: &PostponementToken) -> anyhow::Result<()> {
        Ok(self.put_token(token)?)
    }

    async fn take(&self, token: &str, now_epoch: i64) -> anyhow::Result<Option<PostponementToken>> {
        Ok(self.take_token(token, now_epoch)?)
    }

    async fn remove(&self, token: &str) -> anyhow::Result<bool> {
        Ok(self.remove_token(token)?)
    }

    async fn purge_expired(&self, now_epoch: i64) -> anyhow::Result<u32> {
        Ok(self.purge_expired_tokens(now_epoch)?)
    }
}
