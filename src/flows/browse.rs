//! One-item-at-a-time browsing inside a flow.
//!
//! A browsing state has a [`BrowsePrompt`] that renders the current page of
//! a [`Listing`], a `page prev|next` transition handled by [`TurnPage`] and
//! a `pick <id>` transition of its own. The cursor lives in the scratch,
//! the list is fetched again for every render.

use std::sync::Arc;

use async_trait::async_trait;

use crate::conversation::{ConversationId, Scratch};
use crate::error::Error;
use crate::flow::{Input, Matcher, Prompt, Reply, StepHandler, StepOutput};
use crate::flows::with_cancel;
use crate::markup;
use crate::navigation::Cursor;
use crate::repository::RecordId;

pub const PAGE_PREFIX: &str = "page";
pub const PICK_PREFIX: &str = "pick";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub id: RecordId,
    /// Shown in the message
    pub text: String,
    /// Shown on the button
    pub label: String,
}

/// A live list the user browses
#[async_trait]
pub trait Listing: Send + Sync {
    /// Cursor name, also the scratch key suffix
    fn collection(&self) -> &'static str;

    /// Header of the message
    fn title(&self) -> &'static str;

    /// Shown instead of an empty list
    fn empty_text(&self) -> &'static str;

    async fn items(&self, scratch: &Scratch) -> Result<Vec<Item>, Error>;
}

pub fn page_matcher() -> Matcher {
    Matcher::choice(PAGE_PREFIX, &["prev", "next"])
}

pub fn pick_matcher() -> Matcher {
    Matcher::index(PICK_PREFIX)
}

/// Renders the page the cursor points at
pub struct BrowsePrompt<L> {
    listing: Arc<L>,
    page_size: usize,
}

impl<L: Listing> BrowsePrompt<L> {
    pub fn new(listing: Arc<L>, page_size: usize) -> BrowsePrompt<L> {
        BrowsePrompt { listing, page_size }
    }
}

#[async_trait]
impl<L: Listing> Prompt for BrowsePrompt<L> {
    async fn render(&self, scratch: &Scratch) -> Reply {
        let items = match self.listing.items(scratch).await {
            Ok(items) => items,
            Err(e) => {
                log::warn!("can't list {}: {e}", self.listing.collection());
                return with_cancel(Reply::text("Can't load the list right now, try again later."))
            },
        };
        if items.is_empty() {
            return with_cancel(Reply::text(self.listing.empty_text()))
        }

        let cursor = Cursor::from_scratch(scratch, self.listing.collection(), self.page_size);
        let page = cursor.page_slice(&items);

        let mut text = format!("{} ({})\n", markup::bold(self.listing.title()), page.position());
        let mut reply = Reply::default();
        for item in page.items.iter() {
            text.push('\n');
            text.push_str(&markup::escape_html(&item.text));
            reply = reply.button(&item.label, Matcher::token(PICK_PREFIX, item.id));
        }
        if page.has_prev {
            reply = reply.button("<< Previous", Matcher::token(PAGE_PREFIX, "prev"));
        }
        if page.has_next {
            reply = reply.button("Next >>", Matcher::token(PAGE_PREFIX, "next"));
        }
        reply.text = text;
        with_cancel(reply)
    }
}

/// Moves the cursor, the engine then shows the prompt again
pub struct TurnPage<L> {
    listing: Arc<L>,
    page_size: usize,
}

impl<L: Listing> TurnPage<L> {
    pub fn new(listing: Arc<L>, page_size: usize) -> TurnPage<L> {
        TurnPage { listing, page_size }
    }
}

#[async_trait]
impl<L: Listing> StepHandler for TurnPage<L> {
    async fn handle(&self, _id: ConversationId, input: Input, scratch: &Scratch) -> Result<StepOutput, Error> {
        let total = self.listing.items(scratch).await?.len();
        let cursor = Cursor::from_scratch(scratch, self.listing.collection(), self.page_size);
        let cursor = match input {
            Input::Choice(dir) if dir == "prev" => cursor.retreat(total),
            Input::Choice(dir) if dir == "next" => cursor.advance(total),
            other => return Err(format!("can't turn page with {other:?}").into()),
        };
        Ok(StepOutput::stay(Reply::default())
           .set(cursor.scratch_key(), cursor.to_value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Item>);

    #[async_trait]
    impl Listing for Fixed {
        fn collection(&self) -> &'static str { "fixed" }
        fn title(&self) -> &'static str { "Things" }
        fn empty_text(&self) -> &'static str { "Nothing here" }
        async fn items(&self, _scratch: &Scratch) -> Result<Vec<Item>, Error> {
            Ok(self.0.clone())
        }
    }

    fn fixed(n: u64) -> Arc<Fixed> {
        Arc::new(Fixed((1..=n).map(|id| Item {
            id, text: format!("thing <{id}>"), label: format!("Take {id}") }).collect()))
    }

    fn tokens(reply: &Reply) -> Vec<&str> {
        reply.buttons.iter().map(|b| b.token.as_str()).collect()
    }

    #[tokio::test]
    async fn test_first_page() {
        let reply = BrowsePrompt::new(fixed(3), 1).render(&Scratch::new()).await;
        assert_eq!("<b>Things</b> (1/3)\n\nthing &lt;1&gt;", reply.text);
        assert_eq!(vec!["pick 1", "page next", "nav cancel"], tokens(&reply));
    }

    #[tokio::test]
    async fn test_turning_pages_clamps() {
        let listing = fixed(2);
        let turn = TurnPage::new(listing.clone(), 1);
        let id = ConversationId::new(1, 1);
        let next = Input::Choice("next".into());

        let mut scratch = Scratch::new();
        for _ in 0..3 {
            let out = turn.handle(id, next.clone(), &scratch).await.unwrap();
            assert!(out.reply.is_empty());
            scratch.extend(out.update);
        }
        assert_eq!(1, Cursor::from_scratch(&scratch, "fixed", 1).index);

        let reply = BrowsePrompt::new(listing, 1).render(&scratch).await;
        assert_eq!(vec!["pick 2", "page prev", "nav cancel"], tokens(&reply));
    }

    #[tokio::test]
    async fn test_empty_list() {
        let reply = BrowsePrompt::new(fixed(0), 1).render(&Scratch::new()).await;
        assert_eq!("Nothing here", reply.text);
        assert_eq!(vec!["nav cancel"], tokens(&reply));
    }
}
