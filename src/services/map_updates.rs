//! Coalesced map refresh signals.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use indexmap::IndexSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::{
    host::MapUpdateSink,
    state::{SharedState, chunk::ChunkPos},
};

/// Per-world set of chunks whose map tiles must be redrawn.
#[derive(Debug, Default)]
pub struct MapUpdateQueue {
    worlds: DashMap<String, IndexSet<ChunkPos>>,
}

impl MapUpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `center` and its eight neighbours.
    pub fn queue(&self, dimension: &str, center: ChunkPos) {
        let mut entry = self.worlds.entry(dimension.to_owned()).or_default();
        entry.insert(center);
        entry.extend(center.ring());
    }

    /// Worlds with pending updates.
    pub fn worlds_needing_updates(&self) -> Vec<String> {
        self.worlds
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.iter().all(|entry| entry.value().is_empty())
    }

    /// Take every pending batch, leaving the queue empty.
    pub fn drain(&self) -> Vec<(String, Vec<ChunkPos>)> {
        let worlds: Vec<String> = self.worlds.iter().map(|entry| entry.key().clone()).collect();
        worlds
            .into_iter()
            .filter_map(|world| {
                let (world, chunks) = self.worlds.remove(&world)?;
                (!chunks.is_empty()).then(|| (world, chunks.into_iter().collect()))
            })
            .collect()
    }
}

/// Queue a refresh around every chunk the party holds, in every dimension.
pub async fn queue_party(state: &SharedState, party_id: uuid::Uuid) {
    let territory = state.territory().lock().await;
    for (dimension, chunk) in territory.claims() {
        if chunk.party_id == party_id {
            state.map_updates().queue(dimension, chunk.pos);
        }
    }
}

/// Push pending batches to `sink`, returning how many chunks were flushed.
pub fn flush(state: &SharedState, sink: &dyn MapUpdateSink) -> usize {
    let mut flushed = 0;
    for (dimension, chunks) in state.map_updates().drain() {
        debug!(dimension = %dimension, chunks = chunks.len(), "flushing map updates");
        flushed += chunks.len();
        sink.refresh(&dimension, &chunks);
    }
    flushed
}

/// Periodically flush the queue until the task is dropped.
pub async fn run(state: SharedState, sink: Arc<dyn MapUpdateSink>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        flush(&state, sink.as_ref());
    }
}
