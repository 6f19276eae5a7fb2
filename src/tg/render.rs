use teloxide::{
    prelude::*,
    payloads::SendMessageSetters,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
};

use crate::dispatch::Outcome;
use crate::event::NAV_PREFIX;
use crate::flow::{Button, Reply};
use crate::flows::browse::PAGE_PREFIX;
use crate::tg::HandlerResult;

pub const DIDNT_UNDERSTAND: &str =
    "Sorry, I didn't understand that. Please use the buttons or try again.";
pub const WENT_WRONG: &str = "Something went wrong, please try again later.";
pub const NOT_ALLOWED: &str = "Sorry, this is not available to you.";

/// Message ready to be sent
#[derive(Clone, Debug, PartialEq)]
pub struct Rendered {
    /// Telegram HTML
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Rendered {
    fn plain<S: Into<String>>(text: S) -> Rendered {
        Rendered { text: text.into(), keyboard: None }
    }

    fn from_reply(reply: &Reply, fallback: &str) -> Rendered {
        let text = if reply.text.trim().is_empty() {
            fallback.to_string()
        } else {
            reply.text.clone()
        };
        Rendered { text, keyboard: keyboard(&reply.buttons) }
    }
}

pub fn render(outcome: &Outcome) -> Rendered {
    match outcome {
        Outcome::Started { reply, .. } |
        Outcome::Advanced { reply, .. } |
        Outcome::Stayed { reply, .. } |
        Outcome::Returned { reply, .. } => Rendered::from_reply(reply, "Ok."),
        Outcome::Completed { reply } => Rendered::from_reply(reply, "Done."),
        Outcome::Cancelled { reply } => Rendered::from_reply(reply, "Cancelled."),
        Outcome::NoMatch { .. } => Rendered::plain(DIDNT_UNDERSTAND),
        Outcome::Failed { cancelled: false } => Rendered::plain(WENT_WRONG),
        Outcome::Failed { cancelled: true } => {
            Rendered::plain(format!("{WENT_WRONG}\nThe operation was cancelled."))
        },
        Outcome::Denied => Rendered::plain(NOT_ALLOWED),
    }
}

fn prefix(button: &Button) -> &str {
    button.token.split(' ').next().unwrap_or("")
}

/// Choices get a row each, navigation and paging buttons share one
pub fn keyboard(buttons: &[Button]) -> Option<InlineKeyboardMarkup> {
    if buttons.is_empty() {
        return None
    }
    let shared = |b: &Button| matches!(prefix(b), NAV_PREFIX | PAGE_PREFIX);

    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    let mut last_prefix: Option<&str> = None;
    for b in buttons {
        let btn = InlineKeyboardButton::callback(b.label.clone(), b.token.clone());
        match rows.last_mut() {
            Some(row) if shared(b) && last_prefix == Some(prefix(b)) => row.push(btn),
            _ => rows.push(vec![btn]),
        }
        last_prefix = Some(prefix(b));
    }
    Some(InlineKeyboardMarkup::new(rows))
}

pub async fn send(bot: &AutoSend<Bot>, chat_id: ChatId, rendered: Rendered) -> HandlerResult {
    let bot = bot.clone().parse_mode(ParseMode::Html);
    let request = bot.send_message(chat_id, rendered.text);
    match rendered.keyboard {
        Some(keyboard) => { request.reply_markup(keyboard).await?; },
        None => { request.await?; },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StepEvent;

    fn labels(kb: &InlineKeyboardMarkup) -> Vec<Vec<String>> {
        kb.inline_keyboard.iter()
            .map(|row| row.iter().map(|b| b.text.clone()).collect())
            .collect()
    }

    #[test]
    fn test_layout() {
        let reply = Reply::text("x")
            .button("Toshkent", "region toshkent")
            .button("Samarkand", "region samarqand")
            .button("<", "page prev")
            .button(">", "page next")
            .button("Back", StepEvent::back_token())
            .button("Cancel", StepEvent::cancel_token());
        let kb = keyboard(&reply.buttons).unwrap();
        let expected = vec![
            vec!["Toshkent".to_string()],
            vec!["Samarkand".to_string()],
            vec!["<".to_string(), ">".to_string()],
            vec!["Back".to_string(), "Cancel".to_string()],
        ];
        assert_eq!(expected, labels(&kb));
    }

    #[test]
    fn test_no_buttons_no_keyboard() {
        assert_eq!(None, keyboard(&[]));
    }

    #[test]
    fn test_generic_texts() {
        assert_eq!(DIDNT_UNDERSTAND, render(&Outcome::NoMatch { state: "region".into() }).text);
        assert_eq!(NOT_ALLOWED, render(&Outcome::Denied).text);
        assert_eq!(WENT_WRONG, render(&Outcome::Failed { cancelled: false }).text);
        assert!(render(&Outcome::Failed { cancelled: true }).text.starts_with(WENT_WRONG));
    }

    #[test]
    fn test_empty_replies_get_a_text() {
        let r = render(&Outcome::Cancelled { reply: Reply::default() });
        assert_eq!(Rendered { text: "Cancelled.".into(), keyboard: None }, r);

        let r = render(&Outcome::Advanced {
            state: "type".into(),
            reply: Reply::text("Who?").button("Person", "type b2c"),
        });
        assert_eq!("Who?", r.text);
        assert!(r.keyboard.is_some());
    }
}
