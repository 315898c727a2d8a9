use futures::{pin_mut, stream, Stream, StreamExt};
use std::future::Future;
use tracing::warn;

use crate::catalog::{Page, ProviderError};

/// Items gathered from a paginated source, and whether the source was read
/// to the end (or to its cap) without a transient failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub complete: bool,
}

impl<T> Fetched<T> {
    pub fn empty() -> Self {
        Fetched {
            items: Vec::new(),
            complete: true,
        }
    }
}

struct Cursor<F> {
    fetch: F,
    offset: u32,
    remaining: usize,
    done: bool,
}

/// Lazily walks an offset/limit paginated source.
///
/// Stops after the provider reports no next page, after `cap` entries, on an
/// empty page, or right after yielding an error.
pub fn paginate<T, F, Fut>(
    page_size: u32,
    cap: usize,
    fetch: F,
) -> impl Stream<Item = Result<Vec<T>, ProviderError>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ProviderError>>,
{
    let cursor = Cursor {
        fetch,
        offset: 0,
        remaining: cap,
        done: false,
    };
    stream::unfold(cursor, move |mut cursor| async move {
        if cursor.done || cursor.remaining == 0 || page_size == 0 {
            return None;
        }
        let limit = page_size.min(u32::try_from(cursor.remaining).unwrap_or(u32::MAX));
        match (cursor.fetch)(cursor.offset, limit).await {
            Ok(page) => {
                let mut items = page.items;
                items.truncate(cursor.remaining);
                let got = items.len();
                cursor.offset += got as u32;
                cursor.remaining -= got;
                cursor.done = !page.has_next || got == 0;
                Some((Ok(items), cursor))
            }
            Err(err) => {
                cursor.done = true;
                Some((Err(err), cursor))
            }
        }
    })
}

/// Drains a page stream, keeping whatever arrived before a transient error.
/// Fatal errors are returned as-is.
pub async fn drain<T, S>(pages: S, source: &str) -> Result<Fetched<T>, ProviderError>
where
    S: Stream<Item = Result<Vec<T>, ProviderError>>,
{
    pin_mut!(pages);
    let mut items = Vec::new();
    while let Some(page) = pages.next().await {
        match page {
            Ok(page) => items.extend(page),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(
                    "Fetching {source} stopped early after {} items: {err}",
                    items.len()
                );
                return Ok(Fetched {
                    items,
                    complete: false,
                });
            }
        }
    }
    Ok(Fetched {
        items,
        complete: true,
    })
}
