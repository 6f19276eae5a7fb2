use teloxide::{
    prelude::*,
    payloads::SendMessageSetters,
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
};

use crate::dispatch::Engine;
use crate::flows::FlowKind;
use crate::role_gate::SubjectId;
use crate::tg::HandlerResult;

pub const MENU_PREFIX: &str = "menu";

/// Callback token that starts `kind`
pub fn token(kind: FlowKind) -> String {
    format!("{MENU_PREFIX} {}", kind.id())
}

pub fn parse_token(token: &str) -> Option<FlowKind> {
    match token.split_once(' ') {
        Some((MENU_PREFIX, id)) => FlowKind::from_id(id),
        _ => None,
    }
}

/// Flows the subject's role allows, in menu order
pub async fn items(engine: &Engine, subject: SubjectId) -> Vec<FlowKind> {
    let mut items = Vec::new();
    for kind in FlowKind::ALL.iter().copied() {
        let flow = match engine.registry().flow(kind.id()) {
            Some(flow) => flow,
            None => continue,
        };
        if engine.gate().authorize(subject, flow.required_roles()).await {
            items.push(kind);
        }
    }
    items
}

pub fn keyboard(items: &[FlowKind]) -> InlineKeyboardMarkup {
    let rows = items
        .iter()
        .map(|kind| [InlineKeyboardButton::callback(kind.human_name(), token(*kind))]);
    InlineKeyboardMarkup::new(rows)
}

/// Shows the main menu with buttons
pub async fn main_menu(
    bot: &AutoSend<Bot>,
    chat_id: ChatId,
    engine: &Engine,
    subject: SubjectId,
) -> HandlerResult {
    log::info!("-> main_menu {subject}");
    let items = items(engine, subject).await;
    if items.is_empty() {
        bot.send_message(chat_id, "There is nothing you can do here yet.").await?;
        return Ok(())
    }
    bot.send_message(chat_id, "What would you like to do?")
        .reply_markup(keyboard(&items))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::{setup, CONTROLLER};

    #[tokio::test]
    async fn test_menu_depends_on_role() {
        let s = setup(Vec::new());
        assert_eq!(vec![FlowKind::ConnectionOrder, FlowKind::ServiceRequest],
                   items(&s.engine, 42).await);
        assert_eq!(vec![FlowKind::AssignTechnician],
                   items(&s.engine, CONTROLLER).await);
    }

    #[test]
    fn test_tokens() {
        for kind in FlowKind::ALL.iter().copied() {
            assert_eq!(Some(kind), parse_token(&token(kind)));
        }
        assert_eq!(None, parse_token("menu"));
        assert_eq!(None, parse_token("menu nothing"));
        assert_eq!(None, parse_token("pick connection_order"));
    }

    #[test]
    fn test_one_button_per_row() {
        let kb = keyboard(FlowKind::ALL);
        assert_eq!(FlowKind::ALL.len(), kb.inline_keyboard.len());
        assert!(kb.inline_keyboard.iter().all(|row| row.len() == 1));
    }
}
