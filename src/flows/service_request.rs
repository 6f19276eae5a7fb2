use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::Region;
use crate::conversation::{ConversationId, Scratch};
use crate::error::Error;
use crate::event::MediaKind;
use crate::flow::{FlowDefinition, Input, Matcher, Reply, StepHandler, StepOutput, step_fn, store_as};
use crate::markup;
use crate::flows::{FlowKind, Services, required_str, with_cancel, with_nav};
use crate::repository::Repository;
use crate::request::{Attachment, RequestKind, ServiceRequest};
use crate::role::Role;

const MIN_DESCRIPTION_CHARS: usize = 10;

/// Photos and files we keep per request
const MAX_ATTACHMENTS: usize = 5;

/// Problem report: region, description, optional location, optional media
pub fn flow(services: &Services) -> FlowDefinition {
    FlowDefinition::builder(FlowKind::ServiceRequest.id())
        .states(&["region", "description", "location", "media", "confirm"])
        .roles(&[Role::Client, Role::CallCenter])
        .prompt("region", region_reply())
        .prompt("description", description_reply(None))
        .prompt("location", location_reply())
        .prompt_with("media", media_reply)
        .prompt_with("confirm", confirm_reply)
        .on("region", Matcher::choice("region", &Region::ids()[..]), "description", store_as("region"))
        .on("description", Matcher::text(), "location", step_fn(check_description))
        .on("location", Matcher::location(), "media", store_as("location"))
        .on("location", Matcher::choice("skip", &["location"]), "media",
            step_fn(|_input, _scratch| Ok(StepOutput::advance())))
        .on("media", Matcher::media(), "media", step_fn(add_attachment))
        .on("media", Matcher::choice("media", &["done"]), "confirm",
            step_fn(|_input, _scratch| Ok(StepOutput::advance())))
        .finish("confirm", Matcher::choice("confirm", &["yes"]),
                CreateRepair { requests: services.requests.clone() })
        .finish("confirm", Matcher::choice("confirm", &["no"]), step_fn(|_input, _scratch| {
            Ok(StepOutput::cancel(Reply::text("Ok, the report is dropped.")))
        }))
        .build()
}

fn region_reply() -> Reply {
    let reply = Region::ALL.iter().fold(
        Reply::text("Where is the problem?"),
        |reply, r| reply.button(r.name(), Matcher::token("region", r.id())));
    with_cancel(reply)
}

fn description_reply(note: Option<&str>) -> Reply {
    let ask = "Describe what is wrong, one message please.";
    let text = match note {
        Some(note) => format!("{note}\n{ask}"),
        None => ask.to_string(),
    };
    with_nav(Reply::text(text))
}

fn location_reply() -> Reply {
    with_nav(Reply::text("Share the location so the technician finds you, or skip this step.")
             .button("Skip", Matcher::token("skip", "location")))
}

fn attachments(scratch: &Scratch) -> &[Value] {
    scratch.get("attachments")
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

fn media_reply(scratch: &Scratch) -> Reply {
    let n = attachments(scratch).len();
    let text = if n == 0 {
        "Send photos or videos of the problem, or press Done.".to_string()
    } else {
        format!("Got {n} of {MAX_ATTACHMENTS}. Send more or press Done.")
    };
    with_nav(Reply::text(text).button("Done", Matcher::token("media", "done")))
}

fn confirm_reply(scratch: &Scratch) -> Reply {
    let region = scratch.get("region")
        .and_then(|v| v.as_str())
        .and_then(Region::from_id)
        .map(Region::name)
        .unwrap_or("?");
    let location = if scratch.contains_key("location") { "shared" } else { "not shared" };
    let text = format!(
        "Please check your report:\n\
         Region: {region}\n\
         Problem: {}\n\
         Location: {location}\n\
         Attachments: {}",
        markup::escape_html(scratch.get("description").and_then(|v| v.as_str()).unwrap_or("?")),
        attachments(scratch).len());
    with_nav(Reply::text(text)
             .button("Send", Matcher::token("confirm", "yes"))
             .button("Drop", Matcher::token("confirm", "no")))
}

fn check_description(input: Input, _scratch: &Scratch) -> Result<StepOutput, Error> {
    let description = match input {
        Input::Text(text) => text,
        other => return Err(format!("description from {other:?}").into()),
    };
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        let note = "Please tell a bit more, so the technician knows what to bring.";
        return Ok(StepOutput::stay(description_reply(Some(note))))
    }
    Ok(StepOutput::advance().set("description", description))
}

fn add_attachment(input: Input, scratch: &Scratch) -> Result<StepOutput, Error> {
    let (kind, reference) = match input {
        Input::Media { kind, reference } => (kind, reference),
        other => return Err(format!("attachment from {other:?}").into()),
    };
    let mut all = attachments(scratch).to_vec();
    if all.len() >= MAX_ATTACHMENTS {
        return Ok(StepOutput::stay(
            with_nav(Reply::text(format!("That's enough, {MAX_ATTACHMENTS} files at most."))
                     .button("Done", Matcher::token("media", "done")))))
    }
    all.push(json!({ "kind": kind.id(), "reference": reference }));
    // Stays, the prompt shows the new count
    Ok(StepOutput::stay(Reply::default()).set("attachments", all))
}

struct CreateRepair {
    requests: Arc<dyn Repository<ServiceRequest>>,
}

fn parse_attachment(v: &Value) -> Option<Attachment> {
    let kind = match v.get("kind")?.as_str()? {
        "photo" => MediaKind::Photo,
        "video" => MediaKind::Video,
        "document" => MediaKind::Document,
        _ => return None,
    };
    let reference = v.get("reference")?.as_str()?.to_string();
    Some(Attachment { kind, reference })
}

#[async_trait]
impl StepHandler for CreateRepair {
    async fn handle(&self, id: ConversationId, _input: Input, scratch: &Scratch) -> Result<StepOutput, Error> {
        let region = Region::from_id(required_str(scratch, "region")?)
            .ok_or("bad region in scratch")?;
        let description = required_str(scratch, "description")?.to_string();

        let mut request = ServiceRequest::new(
            RequestKind::Repair { description }, id.user_id, id.chat_id, region);
        request.location = scratch.get("location").and_then(|l| {
            Some((l.get("latitude")?.as_f64()?, l.get("longitude")?.as_f64()?))
        });
        request.attachments = attachments(scratch).iter()
            .filter_map(parse_attachment)
            .collect();

        let request = self.requests.create(request).await?;
        log::info!("{id} created repair request {:?}", request.id);
        let number = request.id.map(|n| format!(" #{n}")).unwrap_or_default();
        Ok(StepOutput::advance().reply(Reply::text(format!(
            "Thank you! Report{number} is registered, a technician will contact you."))))
    }
}
