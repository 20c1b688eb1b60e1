// SPDX-License-Identifier: MIT

//! Top-level fleet state (spec.md §3): owned by the Fleet Manager and
//! written atomically on each transition.

use crate::ids::AgentName;
use crate::job::JobStatus;
use crate::schedule::ScheduleStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-agent status view derived from Job and ScheduleState records,
/// not a separate source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusView {
    pub agent_name: AgentName,
    pub running_job_count: u32,
    pub last_job_status: Option<JobStatus>,
    pub schedules: HashMap<String, ScheduleStatus>,
}

impl AgentStatusView {
    pub fn new(agent_name: AgentName) -> Self {
        Self {
            agent_name,
            running_job_count: 0,
            last_job_status: None,
            schedules: HashMap::new(),
        }
    }
}

/// Top-level fleet state (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetState {
    pub started_at: DateTime<Utc>,
    pub agents: HashMap<String, AgentStatusView>,
}

impl FleetState {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self { started_at, agents: HashMap::new() }
    }

    pub fn agent_view_mut(&mut self, agent_name: &AgentName) -> &mut AgentStatusView {
        self.agents
            .entry(agent_name.to_string())
            .or_insert_with(|| AgentStatusView::new(agent_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_view_mut_creates_entry_on_first_access() {
        let mut fleet = FleetState::new(Utc::now());
        let name = AgentName::new("alpha");
        assert!(fleet.agents.is_empty());
        fleet.agent_view_mut(&name).running_job_count = 2;
        assert_eq!(fleet.agents.get("alpha").unwrap().running_job_count, 2);
    }
}
