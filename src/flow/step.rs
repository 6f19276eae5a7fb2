use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::conversation::{ConversationId, Scratch};
use crate::error::Error;
use crate::flow::matcher::Input;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub token: String,
}

/// What the user sees after a step.
///
/// `text` is telegram HTML, anything the user typed goes through
/// [`crate::markup::escape_html`] first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub buttons: Vec<Button>,
}

impl Reply {
    pub fn text<S: Into<String>>(text: S) -> Reply {
        Reply { text: text.into(), buttons: Vec::new() }
    }

    pub fn button<L: Into<String>, T: Into<String>>(mut self, label: L, token: T) -> Reply {
        self.buttons.push(Button { label: label.into(), token: token.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.buttons.is_empty()
    }
}

/// What the engine does after the handler returned
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Directive {
    /// Follow the transition
    #[default]
    Advance,

    /// Keep the current state, e.g. the input didn't pass validation
    Stay,

    /// Drop the conversation
    Cancel,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepOutput {
    /// Merged into the conversation scratch
    pub update: Scratch,

    /// Empty reply means "show the prompt of the next state"
    pub reply: Reply,

    pub directive: Directive,
}

impl StepOutput {
    pub fn advance() -> StepOutput {
        StepOutput::default()
    }

    pub fn stay(reply: Reply) -> StepOutput {
        StepOutput { reply, directive: Directive::Stay, ..Default::default() }
    }

    pub fn cancel(reply: Reply) -> StepOutput {
        StepOutput { reply, directive: Directive::Cancel, ..Default::default() }
    }

    pub fn set<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> StepOutput {
        self.update.insert(key.into(), value.into());
        self
    }

    pub fn reply(mut self, reply: Reply) -> StepOutput {
        self.reply = reply;
        self
    }
}

/// Code run for a transition.
///
/// Gets the parsed input and a read-only view of the scratch. Changes to the
/// scratch are returned in [`StepOutput::update`] and only applied if the
/// handler succeeds.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(
        &self,
        id: ConversationId,
        input: Input,
        scratch: &Scratch,
    ) -> Result<StepOutput, Error>;
}

/// Synchronous closure as a handler, see [`step_fn`].
///
/// The closure doesn't get the conversation id, handlers that need to know
/// who they talk to implement [`StepHandler`] themselves.
pub struct FnHandler<F>(F);

/// Wraps a closure into a [`StepHandler`]
pub fn step_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(Input, &Scratch) -> Result<StepOutput, Error> + Send + Sync,
{
    FnHandler(f)
}

#[async_trait]
impl<F> StepHandler for FnHandler<F>
where
    F: Fn(Input, &Scratch) -> Result<StepOutput, Error> + Send + Sync,
{
    async fn handle(
        &self,
        _id: ConversationId,
        input: Input,
        scratch: &Scratch,
    ) -> Result<StepOutput, Error> {
        (self.0)(input, scratch)
    }
}

/// Handler that stores the input under `key` and moves on
pub fn store_as(key: &'static str) -> FnHandler<impl Fn(Input, &Scratch) -> Result<StepOutput, Error> + Send + Sync> {
    step_fn(move |input, _scratch| {
        let value = match input {
            Input::Text(text) => Value::from(text),
            Input::Choice(choice) => Value::from(choice),
            Input::Index(ii) => Value::from(ii),
            Input::Location { latitude, longitude } =>
                serde_json::json!({ "latitude": latitude, "longitude": longitude }),
            Input::Media { kind, reference } =>
                serde_json::json!({ "kind": kind.id(), "reference": reference }),
        };
        Ok(StepOutput::advance().set(key, value))
    })
}

/// Text of scratch `key`, empty if missing
pub fn scratch_str<'a>(scratch: &'a Scratch, key: &str) -> &'a str {
    scratch.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID: ConversationId = ConversationId::new(1, 1);

    #[tokio::test]
    async fn test_store_as() {
        let h = store_as("address");
        let out = h.handle(ID, Input::Text("Chilanzor 15".into()), &Scratch::new()).await.unwrap();
        assert_eq!(Directive::Advance, out.directive);
        assert_eq!(Some(&json!("Chilanzor 15")), out.update.get("address"));
        assert!(out.reply.is_empty());
    }

    #[tokio::test]
    async fn test_closure_sees_scratch() {
        let h = step_fn(|_input: Input, scratch: &Scratch| {
            let region = scratch_str(scratch, "region").to_string();
            Ok(StepOutput::stay(Reply::text(region)))
        });
        let mut scratch = Scratch::new();
        scratch.insert("region".into(), json!("toshkent"));
        let out = h.handle(ID, Input::Choice("x".into()), &scratch).await.unwrap();
        assert_eq!(Directive::Stay, out.directive);
        assert_eq!("toshkent", out.reply.text);
    }
}
