//! Chunked iteration over work items.
//!
//! This module provides [`ChunkedItemIterator`], the single entry point for
//! turning an item collection, a lazy producer, or a newline-delimited byte
//! stream into fixed-size batches with a known total count.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::BoxError;

/// Source of work items, invoked once per execution to obtain the full set.
pub trait ItemSource: Send + Sync {
    /// Fetch all items to process.
    ///
    /// # Errors
    ///
    /// Returns an error if the items cannot be produced.
    fn fetch_items(&self) -> Result<Vec<String>, BoxError>;
}

impl<F> ItemSource for F
where
    F: Fn() -> Result<Vec<String>, BoxError> + Send + Sync,
{
    fn fetch_items(&self) -> Result<Vec<String>, BoxError> {
        self()
    }
}

/// A materialized sequence of items partitioned into fixed-size batches.
///
/// Batches are at most `batch_size` long; the final batch may be a partial.
/// The item count is known at construction so it can be reported before any
/// work starts.
#[derive(Debug)]
pub struct ChunkedItemIterator {
    items: Vec<String>,
    batch_size: usize,
}

impl ChunkedItemIterator {
    /// Create an iterator over a single item, in one batch of one.
    pub fn from_item(item: impl Into<String>) -> Self {
        Self {
            items: vec![item.into()],
            batch_size: 1,
        }
    }

    /// Invoke `source` once and partition the produced items.
    ///
    /// `batch_size` must be at least 1.
    ///
    /// # Errors
    ///
    /// Returns the source's error if fetching fails.
    pub fn from_callable(
        source: &dyn ItemSource,
        batch_size: usize,
    ) -> Result<Self, BoxError> {
        debug_assert!(batch_size >= 1);
        let items = source.fetch_items()?;
        Ok(Self { items, batch_size })
    }

    /// Read a newline-delimited byte stream to EOF, one item per line.
    ///
    /// The final record need not be newline-terminated. Empty input yields
    /// zero batches. `batch_size` must be at least 1.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading from the stream fails.
    pub async fn from_stream<R>(reader: R, batch_size: usize) -> std::io::Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        debug_assert!(batch_size >= 1);
        let mut lines = BufReader::new(reader).lines();
        let mut items = Vec::new();
        while let Some(line) = lines.next_line().await? {
            items.push(line);
        }
        Ok(Self { items, batch_size })
    }

    /// Total number of items across all batches.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.len() as u64
    }

    /// Lazy sequence of ordered batches.
    pub fn batches(&self) -> impl Iterator<Item = &[String]> {
        self.items.chunks(self.batch_size)
    }

    /// Flat sequence of items, by reference.
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// Consume the iterator, yielding owned items in order.
    pub fn into_items(self) -> impl Iterator<Item = String> + Send {
        self.items.into_iter()
    }
}
