//! Pagination over the asset-list menu.
//!
//! The remote reports page totals unreliably: some builds only print
//! `Page 1/N` on the first page, and some repeat the final page forever
//! instead of terminating. [`enumerate_assets`] drives the list and
//! next-page keystrokes, merges pagination state defensively, and stops
//! early (with a warning, not an error) when a page fails to advance
//! progress. Hard failures such as exchange timeouts and transport errors
//! abort the whole enumeration; the caller never receives a partial result
//! dressed up as a complete one.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::Result;
use crate::page::{AssetSet, PageParser, Pagination};
use crate::session::MenuSession;

/// Enumerate every asset behind the menu, deduplicated by address in
/// first-seen order.
///
/// # Errors
///
/// Propagates any exchange or transport failure; accumulated partial
/// results are discarded.
pub async fn enumerate_assets<T, P>(session: &MenuSession<T>, parser: &P) -> Result<AssetSet>
where
    T: AsyncReadExt + AsyncWriteExt + Unpin + Send,
    P: PageParser,
{
    let dialect = session.dialect();
    let list_key = dialect.list_key.clone();
    let next_page_key = dialect.next_page_key.clone();

    let text = session.exchange(&list_key).await?;
    let first = parser.parse_page(&text);

    let mut state = first.pagination.unwrap_or(Pagination {
        current_page: 1,
        total_pages: 1,
    });

    let mut assets = AssetSet::new();
    assets.merge(first.records);
    tracing::debug!(
        page = state.current_page,
        total = state.total_pages,
        assets = assets.len(),
        "seeded asset set from first page"
    );

    while state.current_page < state.total_pages {
        let text = session.exchange(&next_page_key).await?;
        let page = parser.parse_page(&text);

        // Some remotes only print pagination metadata on the first page.
        // Adopt a reported total only when it claims more than one page;
        // otherwise count the page locally.
        match page.pagination {
            Some(reported) if reported.total_pages > 1 => state = reported,
            _ => state.current_page += 1,
        }

        let fetched = page.records.len();
        let added = assets.merge(page.records);

        if fetched == 0 && state.current_page < state.total_pages {
            tracing::warn!(
                page = state.current_page,
                total = state.total_pages,
                "empty page before expected end; remote truncated results"
            );
            break;
        }

        if added == 0 && state.current_page < state.total_pages {
            tracing::warn!(
                page = state.current_page,
                total = state.total_pages,
                "page yielded no new addresses; remote appears to repeat itself"
            );
            break;
        }

        tracing::debug!(
            page = state.current_page,
            total = state.total_pages,
            fetched,
            added,
            "merged page"
        );
    }

    Ok(assets)
}
