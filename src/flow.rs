use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::conversation::Scratch;
use crate::role::Role;

pub mod matcher;
pub mod step;
mod registry;

pub use matcher::{Input, Matcher};
pub use registry::StateRegistry;
pub use step::{Button, Directive, Reply, StepHandler, StepOutput, step_fn, store_as};

/// Where a transition leads
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    State(String),
    /// The flow is done, the conversation is cleared
    Completed,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::State(state) => write!(f, "{state}"),
            Target::Completed => write!(f, "<completed>"),
        }
    }
}

#[derive(Clone)]
pub struct Transition {
    pub from: String,
    pub matcher: Matcher,
    pub target: Target,
    pub handler: Arc<dyn StepHandler>,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --{}--> {}", self.from, self.matcher, self.target)
    }
}

/// What the user is asked when a state is entered.
///
/// Runs after every transition into the state, so it may look at live data
/// such as the list a cursor browses.
#[async_trait]
pub trait Prompt: Send + Sync {
    async fn render(&self, scratch: &Scratch) -> Reply;
}

struct FnPrompt<F>(F);

#[async_trait]
impl<F> Prompt for FnPrompt<F>
where
    F: Fn(&Scratch) -> Reply + Send + Sync,
{
    async fn render(&self, scratch: &Scratch) -> Reply {
        (self.0)(scratch)
    }
}

/// Named immutable graph of states.
///
/// Built with [`FlowDefinition::builder`] and checked by
/// [`StateRegistry::register_flow`].
#[derive(Clone)]
pub struct FlowDefinition {
    name: String,
    states: Vec<String>,
    initial: String,
    transitions: Vec<Transition>,
    prompts: Vec<(String, Arc<dyn Prompt>)>,
    required_roles: BTreeSet<Role>,
    cancel_on_failure: bool,
}

impl FlowDefinition {
    pub fn builder(name: &str) -> FlowBuilder {
        FlowBuilder {
            def: FlowDefinition {
                name: name.to_string(),
                states: Vec::new(),
                initial: String::new(),
                transitions: Vec::new(),
                prompts: Vec::new(),
                required_roles: BTreeSet::new(),
                cancel_on_failure: false,
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transitions_from<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.from == state)
    }

    /// States that have a prompt declared
    pub fn prompted_states(&self) -> impl Iterator<Item = &str> {
        self.prompts.iter().map(|(s, _)| s.as_str())
    }

    /// Empty set means anybody may use the flow
    pub fn required_roles(&self) -> &BTreeSet<Role> {
        &self.required_roles
    }

    pub fn cancel_on_failure(&self) -> bool {
        self.cancel_on_failure
    }

    /// What to ask when entering `state`, empty reply if nothing declared
    pub async fn prompt(&self, state: &str, scratch: &Scratch) -> Reply {
        match self.prompts.iter().find(|(s, _)| s == state) {
            Some((_, prompt)) => prompt.render(scratch).await,
            None => Reply::default(),
        }
    }
}

impl fmt::Debug for FlowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowDefinition")
            .field("name", &self.name)
            .field("states", &self.states)
            .field("initial", &self.initial)
            .field("transitions", &self.transitions)
            .field("required_roles", &self.required_roles)
            .finish()
    }
}

pub struct FlowBuilder {
    def: FlowDefinition,
}

impl FlowBuilder {
    /// Declares states, the first one is initial unless `initial` says otherwise
    pub fn states(mut self, states: &[&str]) -> FlowBuilder {
        self.def.states = states.iter().map(|s| s.to_string()).collect();
        if self.def.initial.is_empty() {
            if let Some(first) = states.first() {
                self.def.initial = first.to_string();
            }
        }
        self
    }

    pub fn initial(mut self, state: &str) -> FlowBuilder {
        self.def.initial = state.to_string();
        self
    }

    /// Only these roles may use the flow
    pub fn roles(mut self, roles: &[Role]) -> FlowBuilder {
        self.def.required_roles = roles.iter().copied().collect();
        self
    }

    /// Handler failures cancel the conversation instead of keeping it
    pub fn cancel_on_failure(mut self) -> FlowBuilder {
        self.def.cancel_on_failure = true;
        self
    }

    pub fn prompt(self, state: &str, reply: Reply) -> FlowBuilder {
        self.prompt_with(state, move |_scratch| reply.clone())
    }

    /// Prompt that depends on what was collected so far
    pub fn prompt_with<F>(self, state: &str, prompt: F) -> FlowBuilder
    where
        F: Fn(&Scratch) -> Reply + Send + Sync + 'static,
    {
        self.prompt_from(state, FnPrompt(prompt))
    }

    pub fn prompt_from<P: Prompt + 'static>(mut self, state: &str, prompt: P) -> FlowBuilder {
        self.def.prompts.push((state.to_string(), Arc::new(prompt)));
        self
    }

    pub fn on<H: StepHandler + 'static>(
        mut self,
        from: &str,
        matcher: Matcher,
        to: &str,
        handler: H,
    ) -> FlowBuilder {
        self.def.transitions.push(Transition {
            from: from.to_string(),
            matcher,
            target: Target::State(to.to_string()),
            handler: Arc::new(handler),
        });
        self
    }

    /// Transition that finishes the flow
    pub fn finish<H: StepHandler + 'static>(
        mut self,
        from: &str,
        matcher: Matcher,
        handler: H,
    ) -> FlowBuilder {
        self.def.transitions.push(Transition {
            from: from.to_string(),
            matcher,
            target: Target::Completed,
            handler: Arc::new(handler),
        });
        self
    }

    pub fn build(self) -> FlowDefinition {
        self.def
    }
}
