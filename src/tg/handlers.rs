use teloxide::{
    prelude::*,
    dispatching::UpdateHandler,
};

use crate::conversation::ConversationId;
use crate::dispatch::Engine;
use crate::error::Error;
use crate::event::StepEvent;
use crate::tg::{self, commands, event, menu, render, Command, HandlerResult};

pub fn schema() -> UpdateHandler<Error> {
    let command_handler = teloxide::filter_command::<Command, _>()
        .endpoint(commands::handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::endpoint(handle_message));

    let callback_query_handler = Update::filter_callback_query()
        .endpoint(handle_callback_query);

    dptree::entry()
        .branch(message_handler)
        .branch(callback_query_handler)
}

/// Feeds the event to the user's active flow, or shows the menu if there
/// is none
pub(crate) async fn route(
    bot: &AutoSend<Bot>,
    engine: &Engine,
    chat_id: ChatId,
    id: ConversationId,
    event: StepEvent,
) -> HandlerResult {
    let flow_name = match engine.active_flow(id).await {
        Some(flow_name) => flow_name,
        None => {
            log::debug!("{id}: no active flow for {event}");
            if event == StepEvent::Cancel {
                bot.send_message(chat_id, "There is nothing to cancel.").await?;
            }
            return menu::main_menu(bot, chat_id, engine, id.user_id).await
        },
    };

    let outcome = engine.dispatch(id, &flow_name, event).await;
    render::send(bot, chat_id, render::render(&outcome)).await?;
    if outcome.is_terminal() {
        menu::main_menu(bot, chat_id, engine, id.user_id).await?;
    }
    Ok(())
}

async fn handle_message(
    bot: AutoSend<Bot>,
    msg: Message,
    engine: Engine,
) -> HandlerResult {
    let user = match msg.from() {
        Some(user) => user.clone(),
        None => return Ok(()),
    };
    let id = tg::conversation_id(msg.chat.id, &user);
    let event = match event::from_message(&msg) {
        Some(event) => event,
        None => {
            log::debug!("-> handle_message {id}: nothing to do with it");
            return Ok(())
        },
    };
    log::info!("-> handle_message {id}: {event}");
    route(&bot, &engine, msg.chat.id, id, event).await
}

async fn handle_callback_query(
    bot: AutoSend<Bot>,
    q: CallbackQuery,
    engine: Engine,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let (data, chat_id) = match (q.data.as_deref(), q.message.as_ref()) {
        (Some(data), Some(msg)) => (data, msg.chat.id),
        _ => {
            log::warn!("-> handle_callback_query without data or message");
            return Ok(())
        },
    };
    let id = tg::conversation_id(chat_id, &q.from);
    log::info!("-> handle_callback_query {id}: {data}");

    if let Some(kind) = menu::parse_token(data) {
        let outcome = engine.start(id, kind.id()).await;
        return render::send(&bot, chat_id, render::render(&outcome)).await
    }
    route(&bot, &engine, chat_id, id, event::from_callback(data)).await
}
