//! Persisted instance records for the local registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use dusk_core::{Instance, InstanceStatus, Schedule, TAG_NAME, TAG_OPT_IN};

use crate::error::{StateError, StateResult};

/// One instance in the local registry: lifecycle state plus raw tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceRecord {
    pub id: String,
    pub status: InstanceStatus,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Unix timestamp (seconds) of the last write.
    #[serde(default)]
    pub updated_at: u64,
}

impl InstanceRecord {
    pub fn new(id: impl Into<String>, status: InstanceStatus) -> Self {
        Self {
            id: id.into(),
            status,
            tags: BTreeMap::new(),
            updated_at: 0,
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Opted in via `autoshutdown=true` (case-sensitive).
    pub fn is_eligible(&self) -> bool {
        self.tags.get(TAG_OPT_IN).is_some_and(|v| v == "true")
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Parse the tags into the scheduler's typed view.
    pub fn to_instance(&self) -> StateResult<Instance> {
        let schedule = Schedule::from_tags(&self.tags).map_err(|source| StateError::Schedule {
            id: self.id.clone(),
            source,
        })?;
        Ok(Instance {
            id: self.id.clone(),
            display_name: self.tags.get(TAG_NAME).filter(|n| !n.is_empty()).cloned(),
            status: self.status,
            eligible: self.is_eligible(),
            schedule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dusk_core::{ShutdownTime, TAG_SCHEDULED_TIME};

    #[test]
    fn eligibility_is_case_sensitive() {
        let rec = InstanceRecord::new("i-1", InstanceStatus::Running).with_tag(TAG_OPT_IN, "True");
        assert!(!rec.is_eligible());
        let rec = rec.with_tag(TAG_OPT_IN, "true");
        assert!(rec.is_eligible());
    }

    #[test]
    fn converts_to_instance() {
        let rec = InstanceRecord::new("i-1", InstanceStatus::Running)
            .with_tag(TAG_OPT_IN, "true")
            .with_tag(TAG_NAME, "builder")
            .with_tag(TAG_SCHEDULED_TIME, "1800");

        let inst = rec.to_instance().unwrap();
        assert!(inst.eligible);
        assert_eq!(inst.label(), "builder(i-1)");
        assert_eq!(inst.schedule.scheduled_time, ShutdownTime::new(18, 0));
        assert!(!inst.schedule.is_tracked());
    }

    #[test]
    fn bad_schedule_tag_names_instance() {
        let rec = InstanceRecord::new("i-9", InstanceStatus::Running)
            .with_tag(TAG_SCHEDULED_TIME, "25:00");
        let err = rec.to_instance().unwrap_err();
        assert!(err.to_string().contains("i-9"));
    }
}
