use teloxide::prelude::*;

use crate::event::{MediaKind, StepEvent};

/// Event of an incoming message, None for what flows can't use
/// (stickers, polls, service messages)
pub fn from_message(msg: &Message) -> Option<StepEvent> {
    if let Some(text) = msg.text() {
        return Some(StepEvent::from_text(text))
    }
    if let Some(location) = msg.location() {
        return Some(StepEvent::Location {
            latitude: location.latitude,
            longitude: location.longitude,
        })
    }
    let kind = if msg.photo().is_some() {
        MediaKind::Photo
    } else if msg.video().is_some() {
        MediaKind::Video
    } else if msg.document().is_some() {
        MediaKind::Document
    } else {
        return None
    };
    Some(StepEvent::Media { kind, reference: media_reference(msg.chat.id, msg.id) })
}

/// Event of a pressed inline button
pub fn from_callback(data: &str) -> StepEvent {
    StepEvent::from_token(data)
}

/// Media is referred to by the message carrying it, staff can forward it
/// from there
pub fn media_reference(chat_id: ChatId, message_id: i32) -> String {
    format!("msg:{}:{message_id}", chat_id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_reference() {
        assert_eq!("msg:-100500:17", media_reference(ChatId(-100500), 17));
    }

    #[test]
    fn test_callback() {
        assert_eq!(StepEvent::Cancel, from_callback("nav cancel"));
        assert_eq!(StepEvent::Selection("page next".into()), from_callback("page next"));
    }
}
