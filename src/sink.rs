//! Write targets for fetched chunks.

use crate::error::FetchBenchError;

use bytes::Bytes;

/// Chunk sink trait.
///
/// Defines the interface for write targets of fetched chunk data.
pub trait ChunkSink: Send + Sync {
    /// Write one chunk of data at the given grid position.
    ///
    /// # Arguments
    ///
    /// * `index`: Position of the chunk in the chunk grid
    /// * `data`: The chunk data
    fn write_chunk(&self, index: &[usize], data: Bytes) -> Result<(), FetchBenchError>;
}

/// A write target that discards all data.
///
/// Writing a chunk forces its upstream fetch, transfer and decode without
/// incurring any local storage cost, isolating the benchmark's cost model to
/// the transfer itself. Writes never fail and perform no validation.
#[derive(Debug, Default)]
pub struct DevNullStore;

impl DevNullStore {
    /// Returns a new DevNullStore.
    pub fn new() -> Self {
        Self
    }
}

impl ChunkSink for DevNullStore {
    fn write_chunk(&self, _index: &[usize], data: Bytes) -> Result<(), FetchBenchError> {
        drop(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_chunk_discards() {
        let store = DevNullStore::new();
        store
            .write_chunk(&[0, 0], Bytes::from_static(&[1, 2, 3, 4]))
            .unwrap();
        store.write_chunk(&[], Bytes::new()).unwrap();
        store
            .write_chunk(&[9, 9, 9], Bytes::from(vec![0; 1 << 20]))
            .unwrap();
    }
}
