use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::{ConnectionType, Region, Tariff};
use crate::conversation::{ConversationId, Scratch};
use crate::error::Error;
use crate::flow::{FlowDefinition, Input, Matcher, Reply, StepHandler, StepOutput, step_fn, store_as};
use crate::markup;
use crate::flows::{FlowKind, Services, required_str, with_cancel, with_nav};
use crate::repository::Repository;
use crate::request::{RequestKind, ServiceRequest};
use crate::role::Role;

/// Shorter addresses are certainly not addresses
const MIN_ADDRESS_CHARS: usize = 3;

/// New line for a client: region, contract type, tariff, address.
///
/// Scratch keys are named after the states.
pub fn flow(services: &Services) -> FlowDefinition {
    FlowDefinition::builder(FlowKind::ConnectionOrder.id())
        .states(&["region", "type", "tariff", "address", "confirm"])
        .roles(&[Role::Client, Role::CallCenter])
        .prompt("region", region_reply())
        .prompt("type", type_reply())
        .prompt_with("tariff", |scratch| tariff_reply(scratch, None))
        .prompt("address", address_reply(None))
        .prompt_with("confirm", confirm_reply)
        .on("region", Matcher::choice("region", &Region::ids()[..]), "type", store_as("region"))
        .on("type", Matcher::choice("type", &ConnectionType::ids()[..]), "tariff", store_as("type"))
        .on("tariff", Matcher::choice("tariff", &Tariff::ids()[..]), "address", step_fn(choose_tariff))
        .on("address", Matcher::text(), "confirm", step_fn(check_address))
        .finish("confirm", Matcher::choice("confirm", &["yes"]),
                CreateRequest { requests: services.requests.clone() })
        .finish("confirm", Matcher::choice("confirm", &["no"]), step_fn(|_input, _scratch| {
            Ok(StepOutput::cancel(Reply::text("Ok, the request is dropped.")))
        }))
        .build()
}

fn region_reply() -> Reply {
    let reply = Region::ALL.iter().fold(
        Reply::text("Which region should we connect?"),
        |reply, r| reply.button(r.name(), Matcher::token("region", r.id())));
    with_cancel(reply)
}

fn type_reply() -> Reply {
    let reply = ConnectionType::ALL.iter().fold(
        Reply::text("Who will sign the contract?"),
        |reply, t| reply.button(t.name(), Matcher::token("type", t.id())));
    with_nav(reply)
}

fn tariff_reply(scratch: &Scratch, note: Option<&str>) -> Reply {
    let connection_type = scratch.get("type")
        .and_then(|v| v.as_str())
        .and_then(ConnectionType::from_id)
        .unwrap_or(ConnectionType::B2c);
    let text = match note {
        Some(note) => format!("{note}\nPick a tariff:"),
        None => "Pick a tariff:".to_string(),
    };
    let reply = Tariff::available_for(connection_type).into_iter().fold(
        Reply::text(text),
        |reply, t| reply.button(t.name(), Matcher::token("tariff", t.id())));
    with_nav(reply)
}

fn address_reply(note: Option<&str>) -> Reply {
    let ask = "Send the address: street, house, apartment.";
    let text = match note {
        Some(note) => format!("{note}\n{ask}"),
        None => ask.to_string(),
    };
    with_nav(Reply::text(text))
}

fn confirm_reply(scratch: &Scratch) -> Reply {
    let name = |key: &str, lookup: fn(&str) -> Option<&'static str>| {
        scratch.get(key)
            .and_then(|v| v.as_str())
            .and_then(lookup)
            .unwrap_or("?")
    };
    let text = format!(
        "Please check your request:\n\
         Region: {}\n\
         Contract: {}\n\
         Tariff: {}\n\
         Address: {}",
        name("region", |id| Region::from_id(id).map(Region::name)),
        name("type", |id| ConnectionType::from_id(id).map(ConnectionType::name)),
        name("tariff", |id| Tariff::from_id(id).map(Tariff::name)),
        markup::escape_html(scratch.get("address").and_then(|v| v.as_str()).unwrap_or("?")));
    let reply = Reply::text(text)
        .button("Send", Matcher::token("confirm", "yes"))
        .button("Drop", Matcher::token("confirm", "no"));
    with_nav(reply)
}

fn choose_tariff(input: Input, scratch: &Scratch) -> Result<StepOutput, Error> {
    let tariff = match input {
        Input::Choice(id) => Tariff::from_id(&id)
            .ok_or_else(|| format!("unknown tariff {id}"))?,
        other => return Err(format!("tariff from {other:?}").into()),
    };
    let connection_type = ConnectionType::from_id(required_str(scratch, "type")?)
        .ok_or("bad contract type in scratch")?;
    if !tariff.is_available_for(connection_type) {
        let note = format!("\"{tariff}\" is not available for {}.", connection_type.name());
        return Ok(StepOutput::stay(tariff_reply(scratch, Some(&note))))
    }
    Ok(StepOutput::advance().set("tariff", tariff.id()))
}

fn check_address(input: Input, _scratch: &Scratch) -> Result<StepOutput, Error> {
    let address = match input {
        Input::Text(text) => text,
        other => return Err(format!("address from {other:?}").into()),
    };
    if address.chars().count() < MIN_ADDRESS_CHARS {
        return Ok(StepOutput::stay(address_reply(Some("This address is too short."))))
    }
    Ok(StepOutput::advance().set("address", address))
}

struct CreateRequest {
    requests: Arc<dyn Repository<ServiceRequest>>,
}

#[async_trait]
impl StepHandler for CreateRequest {
    async fn handle(&self, id: ConversationId, _input: Input, scratch: &Scratch) -> Result<StepOutput, Error> {
        let region = Region::from_id(required_str(scratch, "region")?)
            .ok_or("bad region in scratch")?;
        let connection_type = ConnectionType::from_id(required_str(scratch, "type")?)
            .ok_or("bad contract type in scratch")?;
        let tariff = Tariff::from_id(required_str(scratch, "tariff")?)
            .ok_or("bad tariff in scratch")?;

        let mut request = ServiceRequest::new(
            RequestKind::Connection { connection_type, tariff },
            id.user_id, id.chat_id, region);
        request.address = Some(required_str(scratch, "address")?.to_string());

        let request = self.requests.create(request).await?;
        log::info!("{id} created connection request {:?}", request.id);
        let number = request.id.map(|n| format!(" #{n}")).unwrap_or_default();
        Ok(StepOutput::advance().reply(Reply::text(format!(
            "Thank you! Your request{number} is registered, a manager will call you soon."))))
    }
}
