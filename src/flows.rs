//! The wizards of the bot.
//!
//! Each module builds one [`FlowDefinition`], [`register_all`] puts them
//! into a registry.

use std::fmt;
use std::sync::Arc;

use crate::conversation::Scratch;
use crate::error::{Error, RegistryError};
use crate::event::StepEvent;
use crate::flow::{FlowDefinition, Reply, StateRegistry};
use crate::repository::{RecordId, Repository};
use crate::request::{ServiceRequest, Technician};

pub mod browse;
pub mod connection_order;
pub mod service_request;
pub mod assign_technician;

/// What the flows need from the outside world
#[derive(Clone)]
pub struct Services {
    pub requests: Arc<dyn Repository<ServiceRequest>>,
    pub technicians: Arc<dyn Repository<Technician>>,
    /// Items per page when browsing lists
    pub page_size: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowKind {
    ConnectionOrder,
    ServiceRequest,
    AssignTechnician,
}

impl FlowKind {
    pub const ALL: &'static [FlowKind] =
        &[ FlowKind::ConnectionOrder,
           FlowKind::ServiceRequest,
           FlowKind::AssignTechnician ];

    /// Flow name in the registry
    pub const fn id(self) -> &'static str {
        match self {
            FlowKind::ConnectionOrder  => "connection_order",
            FlowKind::ServiceRequest   => "service_request",
            FlowKind::AssignTechnician => "assign_technician",
        }
    }

    pub const fn human_name(self) -> &'static str {
        match self {
            FlowKind::ConnectionOrder  => "Order a connection",
            FlowKind::ServiceRequest   => "Report a problem",
            FlowKind::AssignTechnician => "Assign a technician",
        }
    }

    pub fn from_id(id: &str) -> Option<FlowKind> {
        FlowKind::ALL.iter().cloned().find(|k| k.id() == id)
    }

    pub fn build(self, services: &Services) -> FlowDefinition {
        match self {
            FlowKind::ConnectionOrder  => connection_order::flow(services),
            FlowKind::ServiceRequest   => service_request::flow(services),
            FlowKind::AssignTechnician => assign_technician::flow(services),
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.human_name())
    }
}

/// Registers every flow, fails on the first broken one
pub fn register_all(registry: &mut StateRegistry, services: &Services) -> Result<(), RegistryError> {
    for kind in FlowKind::ALL.iter().cloned() {
        registry.register_flow(kind.build(services))?;
    }
    Ok(())
}

/// Button that leaves the flow
pub(crate) fn with_cancel(reply: Reply) -> Reply {
    reply.button("Cancel", StepEvent::cancel_token())
}

/// Back and cancel buttons
pub(crate) fn with_nav(reply: Reply) -> Reply {
    with_cancel(reply.button("Back", StepEvent::back_token()))
}

/// Scratch value that must be there, the flow can't go on without it
pub(crate) fn required_str<'a>(scratch: &'a Scratch, key: &str) -> Result<&'a str, Error> {
    scratch.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("\"{key}\" is missing from scratch").into())
}

pub(crate) fn required_id(scratch: &Scratch, key: &str) -> Result<RecordId, Error> {
    scratch.get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| format!("\"{key}\" is missing from scratch").into())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::context_store::MemContextStore;
    use crate::dispatch::Engine;
    use crate::repository::MemRepository;
    use crate::role::Role;
    use crate::role_gate::{RoleGate, StaffDirectory};

    pub struct Setup {
        pub engine: Engine,
        pub store: MemContextStore,
        pub requests: MemRepository<ServiceRequest>,
        pub technicians: MemRepository<Technician>,
    }

    pub const CONTROLLER: u64 = 500;

    pub fn setup(technicians: Vec<Technician>) -> Setup {
        let requests: MemRepository<ServiceRequest> = MemRepository::new();
        let technicians = MemRepository::seeded(technicians).unwrap();
        let services = Services {
            requests: Arc::new(requests.clone()),
            technicians: Arc::new(technicians.clone()),
            page_size: 1,
        };
        let mut registry = StateRegistry::new();
        register_all(&mut registry, &services).unwrap();

        let store = MemContextStore::new();
        let staff = StaffDirectory::new(HashMap::from([(CONTROLLER, Role::Controller)]));
        let gate = RoleGate::new(Arc::new(staff), Duration::from_secs(300), Duration::ZERO);
        let engine = Engine::new(Arc::new(registry), Arc::new(store.clone()), Arc::new(gate));
        Setup { engine, store, requests, technicians }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_flows_register() {
        let setup = testing::setup(Vec::new());
        for kind in FlowKind::ALL.iter().cloned() {
            assert!(setup.engine.registry().flow(kind.id()).is_some());
            assert_eq!(Some(kind), FlowKind::from_id(kind.id()));
        }
    }
}
