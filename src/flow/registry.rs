use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::{RegistryError, StepError};
use crate::event::StepEvent;
use crate::flow::{FlowDefinition, Input, StepHandler, Target};

/// All flows the engine knows about.
///
/// Filled at startup, then handed to the engine and never changed again
#[derive(Default)]
pub struct StateRegistry {
    flows: HashMap<String, Arc<FlowDefinition>>,
}

impl StateRegistry {
    pub fn new() -> StateRegistry {
        StateRegistry::default()
    }

    /// Checks the flow and adds it.
    ///
    /// Every error here means the flow is broken and the process should not
    /// start.
    pub fn register_flow(&mut self, flow: FlowDefinition) -> Result<(), RegistryError> {
        log::info!("-> register_flow {}", flow.name());
        if self.flows.contains_key(flow.name()) {
            return Err(RegistryError::DuplicateFlow(flow.name().to_string()))
        }
        validate(&flow)?;
        self.flows.insert(flow.name().to_string(), Arc::new(flow));
        Ok(())
    }

    pub fn flow(&self, name: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.get(name).cloned()
    }

    pub fn flow_names(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(|k| k.as_str())
    }

    /// Finds the transition of `state` that accepts `event`.
    ///
    /// Returns its handler, where it leads and the parsed event
    pub fn resolve(
        &self,
        flow_name: &str,
        state: &str,
        event: &StepEvent,
    ) -> Result<(Arc<dyn StepHandler>, Target, Input), StepError> {
        let flow = self.flows.get(flow_name)
            .ok_or_else(|| StepError::UnknownFlow(flow_name.to_string()))?;

        for t in flow.transitions_from(state) {
            if let Some(input) = t.matcher.parse(event) {
                return Ok((t.handler.clone(), t.target.clone(), input));
            }
        }

        Err(StepError::NoMatchingTransition {
            flow: flow_name.to_string(),
            state: state.to_string(),
            event: event.to_string(),
        })
    }
}

fn validate(flow: &FlowDefinition) -> Result<(), RegistryError> {
    let name = flow.name().to_string();
    let unknown = |state: &str| RegistryError::UnknownState {
        flow: name.clone(), state: state.to_string() };

    let mut states: HashSet<&str> = HashSet::new();
    for s in flow.states() {
        if !states.insert(s) {
            return Err(RegistryError::DuplicateState {
                flow: name.clone(), state: s.clone() })
        }
    }

    if !states.contains(flow.initial()) {
        return Err(unknown(flow.initial()))
    }

    for t in flow.transitions() {
        if !states.contains(t.from.as_str()) {
            return Err(unknown(&t.from))
        }
        if let Target::State(to) = &t.target {
            if !states.contains(to.as_str()) {
                return Err(unknown(to))
            }
        }
        t.matcher.validate()
            .map_err(|reason| RegistryError::InvalidMatcher {
                flow: name.clone(), reason })?;
    }

    for s in flow.prompted_states() {
        if !states.contains(s) {
            return Err(unknown(s))
        }
    }

    // Two transitions of one state must not compete for the same event
    for (ii, a) in flow.transitions().iter().enumerate() {
        for b in flow.transitions()[ii + 1..].iter() {
            if a.from == b.from && a.matcher.overlaps(&b.matcher) {
                return Err(RegistryError::AmbiguousTransition {
                    flow: name.clone(),
                    state: a.from.clone(),
                    matcher: a.matcher.to_string(),
                })
            }
        }
    }

    let reachable = reachable_from(flow);
    for s in flow.states() {
        if !reachable.contains(s.as_str()) {
            return Err(RegistryError::UnreachableState {
                flow: name.clone(),
                state: s.clone(),
                initial: flow.initial().to_string(),
            })
        }
    }

    for s in flow.states() {
        if flow.transitions_from(s).next().is_none() {
            return Err(RegistryError::DeadEndState {
                flow: name.clone(), state: s.clone() })
        }
    }

    Ok(())
}

/// Breadth-first walk over the transitions starting at the initial state
fn reachable_from(flow: &FlowDefinition) -> HashSet<&str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    seen.insert(flow.initial());
    queue.push_back(flow.initial());

    while let Some(state) = queue.pop_front() {
        for t in flow.transitions_from(state) {
            if let Target::State(to) = &t.target {
                if seen.insert(to.as_str()) {
                    queue.push_back(to.as_str());
                }
            }
        }
    }
    seen
}
