//! Paginated fetch loop
//!
//! Turns a [`PageSource`] into a lazy stream of records. Pages are fetched
//! strictly one after another; the next request is only issued once every
//! record of the previous page has been consumed.

use super::page::PageSource;
use super::params::SearchParams;
use crate::error::Result;
use crate::pagination::{NextPage, OffsetPaginator, PaginationState};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

struct FetchState<'a, S: ?Sized> {
    source: &'a S,
    base_query: Vec<(String, String)>,
    paginator: OffsetPaginator,
    pagination: PaginationState,
    buffered: VecDeque<Value>,
    finished: bool,
}

/// Stream every record matching `params`
///
/// The stream ends after an empty page, a short page, or a page fetched past
/// `max_offset`. The first error ends it: the error is yielded and nothing
/// follows.
pub fn paginate<'a, S>(
    source: &'a S,
    params: &SearchParams,
    max_offset: u32,
) -> Result<BoxStream<'a, Result<Value>>>
where
    S: PageSource + ?Sized + 'a,
{
    let paginator = OffsetPaginator::new(params.limit)?.with_max_offset(max_offset);

    let state = FetchState {
        source,
        base_query: params.to_query(),
        paginator,
        pagination: PaginationState::new(),
        buffered: VecDeque::new(),
        finished: false,
    };

    Ok(stream::unfold(state, |st| next_record(st)).boxed())
}

async fn next_record<'a, S>(
    mut st: FetchState<'a, S>,
) -> Option<(Result<Value>, FetchState<'a, S>)>
where
    S: PageSource + ?Sized,
{
    loop {
        if let Some(record) = st.buffered.pop_front() {
            return Some((Ok(record), st));
        }
        if st.finished {
            return None;
        }

        let offset = st.pagination.offset;
        let mut query = st.base_query.clone();
        query.extend(st.paginator.page_params(&st.pagination));

        let page = match st.source.fetch_page(&query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(offset, "Page fetch failed, aborting pagination: {e}");
                st.finished = true;
                return Some((Err(e), st));
            }
        };

        let count = page.len();
        debug!(offset, count, total = ?page.total, "Fetched page");

        let next = st.paginator.process_page(count, &mut st.pagination);
        st.buffered.extend(page.records);

        if let NextPage::Done(reason) = next {
            info!(
                pages = st.pagination.pages,
                records = st.pagination.total_fetched,
                "Pagination finished: {reason}"
            );
            st.finished = true;
        }
    }
}
