// SPDX-License-Identifier: GPL-3.0-only

//! Camera session configuration
//!
//! [`ReconciliationEngine`] is the public surface. The other modules are its
//! building blocks and are public so callers can observe individual
//! properties and the topology manager.

pub mod appliers;
pub mod engine;
pub mod lifecycle;
pub mod pending;
pub mod property;
pub mod store;
pub mod topology;

pub use engine::ReconciliationEngine;
pub use lifecycle::SessionPhase;
pub use pending::{PendingConfigBuffer, PendingKey, PendingWrite};
pub use property::ConfigurableProperty;
pub use store::{ConfigKey, ConfigValue, ConfigurationStore};
pub use topology::{
    ActiveFormat, SessionTopologyManager, SessionTopologyState, TopologyKind, TopologyOutcome,
    TopologyStatus, TopologyTask,
};
