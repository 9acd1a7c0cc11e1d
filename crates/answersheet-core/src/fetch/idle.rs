//! Network-idle detection from request lifecycle events.

use futures_util::{Stream, StreamExt};
use std::collections::HashSet;
use std::hash::Hash;
use std::pin::pin;
use std::time::Duration;

/// Request lifecycle event, keyed by request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NetworkEvent<K> {
    Started(K),
    /// Finished or failed.
    Done(K),
}

/// Resolves once at most `max_inflight` requests have been pending for a full
/// `idle_window` with no further events, or when the event stream ends.
pub(crate) async fn wait_for_idle<S, K>(events: S, idle_window: Duration, max_inflight: usize)
where
    S: Stream<Item = NetworkEvent<K>>,
    K: Hash + Eq,
{
    let mut events = pin!(events);
    let mut inflight: HashSet<K> = HashSet::new();
    loop {
        let quiet = tokio::time::sleep(idle_window);
        tokio::select! {
            event = events.next() => match event {
                Some(NetworkEvent::Started(id)) => {
                    inflight.insert(id);
                }
                Some(NetworkEvent::Done(id)) => {
                    inflight.remove(&id);
                }
                None => return,
            },
            _ = quiet, if inflight.len() <= max_inflight => return,
        }
    }
}
