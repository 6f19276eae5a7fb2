use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::conversation::Scratch;

/// Position while browsing a list one page at a time.
///
/// The cursor never remembers how long the list is. Every operation takes
/// the current length, so a list that shrank since the last render just
/// moves the cursor back inside instead of breaking navigation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub collection: String,
    /// Page index, with `page_size == 1` it is the item index
    pub index: usize,
    pub page_size: usize,
}

/// What is visible at a cursor
#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub index: usize,
    pub pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<'a, T> Page<'a, T> {
    /// "3/5" style position, "0/0" for an empty list
    pub fn position(&self) -> String {
        if self.pages == 0 {
            return "0/0".to_string()
        }
        format!("{}/{}", self.index + 1, self.pages)
    }
}

impl Cursor {
    pub fn new(collection: &str, page_size: usize) -> Cursor {
        Cursor {
            collection: collection.to_string(),
            index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size.max(1))
    }

    fn last(&self, total: usize) -> usize {
        self.pages(total).max(1) - 1
    }

    fn with_index(&self, index: usize) -> Cursor {
        Cursor { index, ..self.clone() }
    }

    /// Same cursor moved inside `total`
    pub fn clamped(&self, total: usize) -> Cursor {
        self.with_index(self.index.min(self.last(total)))
    }

    pub fn advance(&self, total: usize) -> Cursor {
        let index = self.clamped(total).index;
        self.with_index((index + 1).min(self.last(total)))
    }

    pub fn retreat(&self, total: usize) -> Cursor {
        let index = self.clamped(total).index;
        self.with_index(index.saturating_sub(1))
    }

    pub fn jump(&self, index: usize, total: usize) -> Cursor {
        self.with_index(index.min(self.last(total)))
    }

    /// Items of the current page of `collection`
    pub fn page_slice<'a, T>(&self, collection: &'a [T]) -> Page<'a, T> {
        let total = collection.len();
        let index = self.clamped(total).index;
        let pages = self.pages(total);
        let start = (index * self.page_size.max(1)).min(total);
        let end = start.saturating_add(self.page_size.max(1)).min(total);
        Page {
            items: &collection[start..end],
            index,
            pages,
            has_prev: index > 0,
            has_next: index + 1 < pages,
        }
    }

    /// Where the cursor is kept in the conversation scratch
    pub fn scratch_key(&self) -> String {
        Cursor::scratch_key_of(&self.collection)
    }

    pub fn scratch_key_of(collection: &str) -> String {
        format!("cursor:{collection}")
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "index": self.index, "page_size": self.page_size })
    }

    /// Cursor saved in `scratch`, or a new one at the start
    pub fn from_scratch(scratch: &Scratch, collection: &str, page_size: usize) -> Cursor {
        let saved = scratch.get(&Cursor::scratch_key_of(collection));
        let index = saved
            .and_then(|v| v.get("index"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let page_size = saved
            .and_then(|v| v.get("page_size"))
            .and_then(Value::as_u64)
            .map(|p| p as usize)
            .unwrap_or(page_size);
        Cursor { index: index as usize, ..Cursor::new(collection, page_size) }
    }
}
