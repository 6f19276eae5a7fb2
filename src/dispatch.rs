use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;

use crate::audit::{AuditEntry, AuditSink};
use crate::context_store::ContextStore;
use crate::conversation::{Conversation, ConversationId, Phase, Scratch};
use crate::error::{Error, StepError};
use crate::event::StepEvent;
use crate::flow::{Directive, FlowDefinition, Reply, StateRegistry, Target};
use crate::role_gate::RoleGate;
use crate::Offset;

/// What happened to a conversation after one event.
///
/// Every error is folded into one of these, the caller only has to render it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A fresh conversation waits in its initial state
    Started { state: String, reply: Reply },

    /// Moved to `state`
    Advanced { state: String, reply: Reply },

    /// Still in `state`, usually the input didn't pass validation
    Stayed { state: String, reply: Reply },

    /// Went back to `state`
    Returned { state: String, reply: Reply },

    Completed { reply: Reply },

    Cancelled { reply: Reply },

    /// Nothing in `state` accepts the event, ask the user to retry
    NoMatch { state: String },

    /// Something broke. The conversation is as it was unless `cancelled`
    Failed { cancelled: bool },

    /// The subject's role doesn't allow the flow
    Denied,
}

impl Outcome {
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Outcome::Started { reply, .. } |
            Outcome::Advanced { reply, .. } |
            Outcome::Stayed { reply, .. } |
            Outcome::Returned { reply, .. } |
            Outcome::Completed { reply } |
            Outcome::Cancelled { reply } => Some(reply),
            _ => None,
        }
    }

    /// State the conversation is in now, None if it is over or never began
    pub fn state(&self) -> Option<&str> {
        match self {
            Outcome::Started { state, .. } |
            Outcome::Advanced { state, .. } |
            Outcome::Stayed { state, .. } |
            Outcome::Returned { state, .. } |
            Outcome::NoMatch { state } => Some(state),
            _ => None,
        }
    }

    /// True if the conversation no longer exists
    pub fn is_terminal(&self) -> bool {
        matches!(self,
                 Outcome::Completed { .. } |
                 Outcome::Cancelled { .. } |
                 Outcome::Failed { cancelled: true })
    }
}

type Locks = Mutex<HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>>;

/// Above this many idle per-conversation locks they get dropped
const LOCKS_SOFT_LIMIT: usize = 256;

/// Runs events through flows.
///
/// Cheap to clone, all clones share the same registry, store and locks.
/// Events of one conversation are applied one after another in the order
/// they arrived. Different conversations don't wait for each other.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<StateRegistry>,
    store: Arc<dyn ContextStore>,
    gate: Arc<RoleGate>,
    audit: Option<Arc<dyn AuditSink>>,
    locks: Arc<Locks>,
}

impl Engine {
    pub fn new(
        registry: Arc<StateRegistry>,
        store: Arc<dyn ContextStore>,
        gate: Arc<RoleGate>,
    ) -> Engine {
        Engine {
            registry,
            store,
            gate,
            audit: None,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Engine {
        self.audit = Some(audit);
        self
    }

    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &RoleGate {
        &self.gate
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    /// Begins `flow_name` from scratch, dropping whatever was going on
    pub async fn start(&self, id: ConversationId, flow_name: &str) -> Outcome {
        log::info!("-> start {id} {flow_name}");
        let _guard = match self.lock(id).await {
            Ok(guard) => guard,
            Err(e) => {
                log::warn!("start {id}: {e}");
                return Outcome::Failed { cancelled: false }
            },
        };
        let flow = match self.admit(id, flow_name).await {
            Ok(flow) => flow,
            Err(outcome) => return outcome,
        };

        let conv = Conversation::start(id, flow.name(), flow.initial());
        if let Err(e) = self.store.save(&conv).await {
            log::warn!("start {id} {flow_name}: {e}");
            return Outcome::Failed { cancelled: false }
        }
        Outcome::Started {
            state: flow.initial().to_string(),
            reply: prompt(&flow, flow.initial(), &conv.scratch).await,
        }
    }

    /// Applies one event to the conversation.
    ///
    /// Never fails, errors end up as `Outcome::Failed` or `Outcome::NoMatch`
    /// and in the log.
    pub async fn dispatch(&self, id: ConversationId, flow_name: &str, event: StepEvent) -> Outcome {
        log::info!("-> dispatch {id} {flow_name} {event}");
        // Queue up before anything awaits, so events keep their arrival order
        let _guard = match self.lock(id).await {
            Ok(guard) => guard,
            Err(e) => {
                log::warn!("dispatch {id}: {e}");
                return Outcome::Failed { cancelled: false }
            },
        };
        let flow = match self.admit(id, flow_name).await {
            Ok(flow) => flow,
            Err(outcome) => return outcome,
        };

        let stepped = AssertUnwindSafe(self.step(id, &flow, &event)).catch_unwind().await;
        match stepped {
            Ok(Ok(outcome)) => outcome,
            Err(panic) => {
                log::error!("dispatch {id} {flow_name} {event}: panicked: {}", panic_message(&panic));
                Outcome::Failed { cancelled: false }
            },
            Ok(Err(e)) => {
                log::warn!("dispatch {id} {flow_name} {event}: {e}");
                if matches!(e, StepError::HandlerFailure { .. }) && flow.cancel_on_failure() {
                    match self.store.clear(id).await {
                        Ok(()) => return Outcome::Failed { cancelled: true },
                        Err(e) => log::warn!("dispatch {id}: can't cancel: {e}"),
                    }
                }
                Outcome::Failed { cancelled: false }
            },
        }
    }

    /// Name of the flow the conversation is in, if any
    pub async fn active_flow(&self, id: ConversationId) -> Option<String> {
        match self.store.load(id).await {
            Ok(Some(conv)) if conv.is_active() => Some(conv.flow_name),
            Ok(_) => None,
            Err(e) => {
                log::warn!("active_flow {id}: {e}");
                None
            },
        }
    }

    /// Clears conversations quiet for longer than `idle`, returns how many.
    ///
    /// Each one is checked again under its lock, a conversation that got an
    /// event after the listing stays.
    pub async fn reap_idle(&self, idle: std::time::Duration) -> Result<usize, Error> {
        let idle = chrono::Duration::from_std(idle)
            .map_err(|e| format!("idle timeout: {e}"))?;
        let cutoff = Offset::now() - idle;
        let mut reaped = 0;
        for id in self.store.idle_since(cutoff).await? {
            let _guard = self.lock(id).await?;
            match self.store.load(id).await? {
                Some(conv) if conv.last_activity_at < cutoff => {
                    log::info!("{id}: idle since before {cutoff}, dropping");
                    self.store.clear(id).await?;
                    reaped += 1;
                },
                _ => log::debug!("{id}: active again, keeping"),
            }
        }
        Ok(reaped)
    }

    async fn admit(&self, id: ConversationId, flow_name: &str) -> Result<Arc<FlowDefinition>, Outcome> {
        let flow = self.registry.flow(flow_name).ok_or_else(|| {
            log::warn!("{id}: {}", StepError::UnknownFlow(flow_name.to_string()));
            Outcome::Failed { cancelled: false }
        })?;
        let allowed = AssertUnwindSafe(self.gate.authorize(id.user_id, flow.required_roles()))
            .catch_unwind().await
            .unwrap_or_else(|panic| {
                log::error!("{id}: role check panicked: {}", panic_message(&panic));
                false
            });
        if !allowed {
            log::info!("{id} may not use {flow_name}");
            return Err(Outcome::Denied)
        }
        Ok(flow)
    }

    /// Takes the conversation's place in line synchronously, the first
    /// poll enqueues the waiter
    async fn lock(&self, id: ConversationId) -> Result<tokio::sync::OwnedMutexGuard<()>, String> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|e| format!("lock: {e:?}"))?;
            if locks.len() > LOCKS_SOFT_LIMIT {
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            locks.entry(id).or_default().clone()
        };
        // tokio's mutex is fair, waiters get it in the order they came
        Ok(lock.lock_owned().await)
    }

    /// Conversation the event applies to, a fresh one if there is nothing
    /// active in this flow
    async fn current(&self, id: ConversationId, flow: &FlowDefinition) -> Result<Conversation, StepError> {
        let existing = self.store.load(id).await.map_err(StepError::Store)?;
        let conv = match existing {
            Some(conv) if conv.is_active() && conv.flow_name == flow.name() => conv,
            Some(conv) if conv.is_active() => {
                log::info!("{id} abandons {} for {}", conv.flow_name, flow.name());
                Conversation::start(id, flow.name(), flow.initial())
            },
            Some(mut conv) if conv.phase == Phase::Unstarted => {
                // Keeps whatever scratch was merged before the flow began
                conv.flow_name = flow.name().to_string();
                conv.phase = Phase::Active(flow.initial().to_string());
                conv
            },
            _ => Conversation::start(id, flow.name(), flow.initial()),
        };
        Ok(conv)
    }

    async fn step(
        &self,
        id: ConversationId,
        flow: &FlowDefinition,
        event: &StepEvent,
    ) -> Result<Outcome, StepError> {
        let mut conv = self.current(id, flow).await?;
        let state = conv.state().unwrap_or(flow.initial()).to_string();

        match event {
            StepEvent::Cancel => {
                self.store.clear(id).await.map_err(StepError::Store)?;
                self.audit(id, flow, &state, "cancelled", event).await;
                return Ok(Outcome::Cancelled { reply: Reply::default() })
            },
            StepEvent::Back => {
                let prev = match conv.go_back() {
                    Some(prev) => prev.to_string(),
                    None => {
                        log::info!("{id}: nothing to go back to from {state}");
                        return Ok(Outcome::NoMatch { state })
                    },
                };
                self.store.save(&conv).await.map_err(StepError::Store)?;
                self.audit(id, flow, &state, &prev, event).await;
                let reply = prompt(flow, &prev, &conv.scratch).await;
                return Ok(Outcome::Returned { state: prev, reply })
            },
            _ => (),
        }

        let (handler, target, input) = match self.registry.resolve(flow.name(), &state, event) {
            Ok(found) => found,
            Err(e @ StepError::NoMatchingTransition { .. }) => {
                log::info!("{id}: {e}");
                return Ok(Outcome::NoMatch { state })
            },
            Err(e) => return Err(e),
        };

        let output = guarded(handler.handle(id, input, &conv.scratch)).await
            .map_err(|source| StepError::HandlerFailure { state: state.clone(), source })?;

        let outcome = match (output.directive, target) {
            (Directive::Cancel, _) => {
                self.store.clear(id).await.map_err(StepError::Store)?;
                self.audit(id, flow, &state, "cancelled", event).await;
                Outcome::Cancelled { reply: output.reply }
            },
            (Directive::Stay, _) => {
                conv.merge(output.update);
                self.store.save(&conv).await.map_err(StepError::Store)?;
                let reply = or_prompt(output.reply, flow, &state, &conv).await;
                Outcome::Stayed { state: state.clone(), reply }
            },
            (Directive::Advance, Target::Completed) => {
                self.store.clear(id).await.map_err(StepError::Store)?;
                self.audit(id, flow, &state, "completed", event).await;
                Outcome::Completed { reply: output.reply }
            },
            (Directive::Advance, Target::State(next)) => {
                conv.merge(output.update);
                conv.move_to(&next);
                self.store.save(&conv).await.map_err(StepError::Store)?;
                self.audit(id, flow, &state, &next, event).await;
                let reply = or_prompt(output.reply, flow, &next, &conv).await;
                Outcome::Advanced { state: next, reply }
            },
        };
        log::debug!("{id} {}: {state} -> {outcome:?}", flow.name());
        Ok(outcome)
    }

    async fn audit(&self, id: ConversationId, flow: &FlowDefinition, from: &str, to: &str, event: &StepEvent) {
        let audit = match &self.audit {
            Some(audit) => audit,
            None => return,
        };
        let entry = AuditEntry {
            conversation: id,
            flow: flow.name().to_string(),
            from: from.to_string(),
            to: to.to_string(),
            event: event.to_string(),
            at: Offset::now(),
        };
        if let Err(e) = audit.record(&entry).await {
            log::warn!("audit {id}: {e}");
        }
    }
}

async fn or_prompt(reply: Reply, flow: &FlowDefinition, state: &str, conv: &Conversation) -> Reply {
    if reply.is_empty() {
        prompt(flow, state, &conv.scratch).await
    } else {
        reply
    }
}

/// Prompt of `state`. The step is already stored when prompts render, so a
/// broken prompt gives an empty reply instead of failing the step
async fn prompt(flow: &FlowDefinition, state: &str, scratch: &Scratch) -> Reply {
    match AssertUnwindSafe(flow.prompt(state, scratch)).catch_unwind().await {
        Ok(reply) => reply,
        Err(panic) => {
            log::error!("prompt of {state} in {} panicked: {}", flow.name(), panic_message(&panic));
            Reply::default()
        },
    }
}

/// Runs collaborator code, a panic in it becomes an error
async fn guarded<T, F>(fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(format!("panicked: {}", panic_message(&panic)).into()),
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
