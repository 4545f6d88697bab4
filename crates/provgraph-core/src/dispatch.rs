//! Bounded-concurrency fan-out for batch ingestion.
//!
//! [`dispatch`] runs one unit of work per input item with at most `limit`
//! in flight. Results are written back at the item's input position, so the
//! output order always matches the input order. The first error cancels the
//! batch: no further items are started, in-flight futures are dropped, and
//! that error is returned. Work that already committed is not rolled back.

use std::{future::Future, pin::pin};

use futures::{StreamExt as _, stream};
use tokio_util::sync::CancellationToken;

use crate::Error;

/// Default number of concurrently dispatched items per batch.
pub const DEFAULT_CONCURRENCY: usize = 16;

pub async fn dispatch<I, T, E, F, Fut>(
  cancel: &CancellationToken,
  limit: usize,
  items: Vec<I>,
  mut work: F,
) -> Result<Vec<T>, E>
where
  F: FnMut(I) -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: From<Error>,
{
  let batch = cancel.child_token();
  let mut slots: Vec<Option<T>> =
    std::iter::repeat_with(|| None).take(items.len()).collect();

  let pending = stream::iter(items.into_iter().enumerate())
    .map(|(index, item)| {
      let started = !batch.is_cancelled();
      let fut = started.then(|| work(item));
      async move {
        match fut {
          Some(fut) => (index, fut.await),
          None => (index, Err(E::from(Error::Cancelled))),
        }
      }
    })
    .buffer_unordered(limit.max(1));
  let mut pending = pin!(pending);

  loop {
    let next = tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        batch.cancel();
        return Err(E::from(Error::Cancelled));
      }
      next = pending.next() => next,
    };

    match next {
      Some((index, Ok(value))) => slots[index] = Some(value),
      Some((index, Err(err))) => {
        batch.cancel();
        tracing::warn!(index, "batch item failed; cancelling remaining work");
        return Err(err);
      }
      None => break,
    }
  }

  Ok(slots.into_iter().flatten().collect())
}
