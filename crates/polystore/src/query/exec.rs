//! The shared page-draining loop behind `iterate`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StoreResult;

/// A source of result pages, typically wrapping a backend cursor or scroll.
///
/// `next_page` returns `None` once the source is exhausted. Sources must not
/// prefetch: the draining loop guarantees that after early termination no
/// further page is requested.
#[async_trait]
pub(crate) trait PageSource: Send {
    type Item: Send;

    async fn next_page(&mut self) -> StoreResult<Option<Vec<Self::Item>>>;
}

/// What a draining run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DrainOutcome {
    /// Items handed to the handler.
    pub(crate) yielded: u64,
    /// True when the handler or the cancellation token stopped the run.
    pub(crate) stopped_early: bool,
}

/// Streams items out of `source` one at a time.
///
/// The cancellation token is checked once per yielded item, before the
/// handler runs. A `false` from the handler stops the run immediately; in
/// both cases no further page is fetched. A mid-stream backend error aborts
/// the remaining iteration (already-yielded items are not retracted).
pub(crate) async fn drain_pages<S, F>(
    source: &mut S,
    cancel: &CancellationToken,
    mut handler: F,
) -> StoreResult<DrainOutcome>
where
    S: PageSource,
    F: FnMut(S::Item) -> bool + Send,
{
    let mut outcome = DrainOutcome {
        yielded: 0,
        stopped_early: false,
    };

    'pages: while let Some(page) = source.next_page().await? {
        for item in page {
            if cancel.is_cancelled() {
                outcome.stopped_early = true;
                break 'pages;
            }
            outcome.yielded += 1;
            if !handler(item) {
                outcome.stopped_early = true;
                break 'pages;
            }
        }
    }

    Ok(outcome)
}
