use teloxide::{
    prelude::*,
    utils::command::BotCommands,
};

use crate::dispatch::Engine;
use crate::event::StepEvent;
use crate::tg::{self, menu, HandlerResult};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename = "snake_case",
          description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Start here")]
    Start,
    #[command(description = "Show main menu")]
    Menu,
    #[command(description = "Leave what you are doing")]
    Cancel,
    #[command(description = "Go one step back")]
    Back,
    #[command(description = "Show this text")]
    Help,
}

pub async fn handle_command(
    bot: AutoSend<Bot>,
    msg: Message,
    command: Command,
    engine: Engine,
) -> HandlerResult {
    let user = match msg.from() {
        Some(user) => user.clone(),
        None => return Ok(()),
    };
    let id = tg::conversation_id(msg.chat.id, &user);
    log::info!("-> handle_command {id} {command:?}");

    match command {
        Command::Start |
        Command::Menu => menu::main_menu(&bot, msg.chat.id, &engine, id.user_id).await?,
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        },
        Command::Cancel => {
            tg::handlers::route(&bot, &engine, msg.chat.id, id, StepEvent::Cancel).await?
        },
        Command::Back => {
            tg::handlers::route(&bot, &engine, msg.chat.id, id, StepEvent::Back).await?
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(matches!(Command::parse("/start", "desk_bot"), Ok(Command::Start)));
        assert!(matches!(Command::parse("/cancel", "desk_bot"), Ok(Command::Cancel)));
        assert!(matches!(Command::parse("/back", "desk_bot"), Ok(Command::Back)));
        assert!(Command::parse("/assign", "desk_bot").is_err());
    }

    #[test]
    fn test_help_lists_commands() {
        let help = Command::descriptions().to_string();
        for name in ["/start", "/menu", "/cancel", "/back", "/help"] {
            assert!(help.contains(name), "{name} is missing from {help}");
        }
    }
}
