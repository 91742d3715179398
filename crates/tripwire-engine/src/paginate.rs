//! Lazy page streams over token-paginated list calls

use futures::stream::{self, Stream};
use std::collections::HashSet;
use std::future::Future;

use crate::cloud::Page;
use crate::error::{CloudError, CloudResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Walks a list call page by page
///
/// Stops when a page carries no continuation token (or an empty one). A
/// token that was already handed out ends the walk with
/// [`CloudError::RepeatedPageToken`].
pub struct Paginator<F> {
    fetch: F,
    cursor: Cursor,
    seen: HashSet<String>,
}

impl<F, Fut, T> Paginator<F>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = CloudResult<Page<T>>>,
{
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            cursor: Cursor::Start,
            seen: HashSet::new(),
        }
    }

    /// Fetch the next page; `None` once the listing is exhausted
    pub async fn next_page(&mut self) -> CloudResult<Option<Vec<T>>> {
        let token = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = (self.fetch)(token).await?;

        if let Some(next) = page.next_token.filter(|t| !t.is_empty()) {
            if !self.seen.insert(next.clone()) {
                return Err(CloudError::RepeatedPageToken { token: next });
            }
            self.cursor = Cursor::Next(next);
        }

        Ok(Some(page.items))
    }
}

/// Turn a page fetcher into a stream of pages
///
/// Nothing is fetched until the stream is polled.
pub fn paginate<F, Fut, T>(fetch: F) -> impl Stream<Item = CloudResult<Vec<T>>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = CloudResult<Page<T>>>,
{
    stream::try_unfold(Paginator::new(fetch), |mut paginator| async move {
        Ok(paginator.next_page().await?.map(|items| (items, paginator)))
    })
}
