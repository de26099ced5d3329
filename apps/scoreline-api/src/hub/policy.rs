//! Per-category queue policy.
//!
//! | category   | capacity | when full | fan-out            |
//! |------------|----------|-----------|--------------------|
//! | chat       | 1024     | drop      | topic subscribers  |
//! | cricket    | 256      | block     | every client       |
//! | football   | 256      | block     | every client       |
//! | tournament | 64       | block     | every client       |
//!
//! Chat is high-volume and best-effort; score and standings updates are
//! low-volume and must not be lost, so their producers wait for room.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::event::Category;

/// What a producer does when the category's intake queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backpressure {
    /// Wait for room.
    Block,
    /// Discard the new event and log a warning.
    Drop,
}

impl FromStr for Backpressure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "drop" => Ok(Self::Drop),
            other => Err(format!("expected block or drop, got `{other}`")),
        }
    }
}

/// Which clients receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fanout {
    All,
    Topic,
}

impl FromStr for Fanout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "topic" => Ok(Self::Topic),
            other => Err(format!("expected all or topic, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    pub capacity: usize,
    pub backpressure: Backpressure,
    pub fanout: Fanout,
}

impl CategoryPolicy {
    pub const fn default_for(category: Category) -> Self {
        match category {
            Category::Chat => Self {
                capacity: 1024,
                backpressure: Backpressure::Drop,
                fanout: Fanout::Topic,
            },
            Category::Cricket | Category::Football => Self {
                capacity: 256,
                backpressure: Backpressure::Block,
                fanout: Fanout::All,
            },
            Category::Tournament => Self {
                capacity: 64,
                backpressure: Backpressure::Block,
                fanout: Fanout::All,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Indexed by [`Category::index`].
    policies: [CategoryPolicy; 4],
    /// Bound of each client's outbound queue.
    pub client_send_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            policies: Category::ALL.map(CategoryPolicy::default_for),
            client_send_buffer: 64,
        }
    }
}

impl HubConfig {
    pub fn policy(&self, category: Category) -> CategoryPolicy {
        self.policies[category.index()]
    }

    pub fn with_policy(mut self, category: Category, policy: CategoryPolicy) -> Self {
        self.policies[category.index()] = policy;
        self
    }
}
