//! In-process document transport.
//!
//! Collectors hand [`Document`]s to an [`Emitter`]; a single [`Subscriber`]
//! decodes and applies them to the store. The queue is bounded, so
//! publishing waits when the ingestor falls behind. Documents that cannot be
//! decoded or applied are logged and skipped. Redelivery of a document is
//! harmless because every ingestion is an idempotent upsert.

use std::sync::Arc;

use bytes::Bytes;
use provgraph_core::{Classify as _, document::Document, store::GraphStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Create a connected emitter/subscriber pair with room for `capacity`
/// queued documents.
pub fn channel(capacity: usize) -> (Emitter, Subscriber) {
  let (tx, rx) = mpsc::channel(capacity.max(1));
  (Emitter { tx }, Subscriber { rx })
}

#[derive(Debug, Clone)]
pub struct Emitter {
  tx: mpsc::Sender<Bytes>,
}

impl Emitter {
  pub async fn publish(&self, document: &Document) -> Result<(), Error> {
    let bytes = Bytes::from(document.to_bytes()?);
    self.tx.send(bytes).await.map_err(|_| Error::QueueClosed)?;
    tracing::debug!(id = %document.id, kind = document.request.kind(), "document published");
    Ok(())
  }
}

/// Counts reported by [`Subscriber::run`] once it stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
  pub applied: u64,
  pub skipped: u64,
}

#[derive(Debug)]
pub struct Subscriber {
  rx: mpsc::Receiver<Bytes>,
}

impl Subscriber {
  /// Apply documents until every emitter has been dropped and the queue is
  /// drained, or until `cancel` fires.
  pub async fn run<S: GraphStore>(mut self, store: Arc<S>, cancel: CancellationToken) -> Delivery {
    let mut delivery = Delivery::default();
    loop {
      let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => break,
        next = self.rx.recv() => match next {
          Some(bytes) => bytes,
          None => break,
        },
      };
      if apply(store.as_ref(), &bytes).await {
        delivery.applied += 1;
      } else {
        delivery.skipped += 1;
      }
    }
    tracing::info!(applied = delivery.applied, skipped = delivery.skipped, "document subscriber stopped");
    delivery
  }
}

async fn apply<S: GraphStore>(store: &S, bytes: &[u8]) -> bool {
  let Document { id, collector, source, request } = match Document::from_slice(bytes) {
    Ok(document) => document,
    Err(e) => {
      tracing::warn!(error = %e, len = bytes.len(), "dropping undecodable document");
      return false;
    }
  };

  let kind = request.kind();
  match request.apply(store).await {
    Ok(node) => {
      tracing::debug!(%id, kind, %node, %collector, "document applied");
      true
    }
    Err(e) => {
      tracing::warn!(
        %id, kind, %collector, %source,
        error = %e, error_kind = ?e.kind(),
        "dropping failed document"
      );
      false
    }
  }
}
