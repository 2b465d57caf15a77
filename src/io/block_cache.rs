use std::io::SeekFrom;
use std::num::NonZeroUsize;

use bytes::{Bytes, BytesMut};
use lru::LruCache;

use super::stream::{resolve_seek, Stream};
use crate::error::IoError;

/// Default block size: 64KB
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default cache capacity in number of blocks.
/// 64 blocks * 64KB = 4MB default cache size.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Block-based caching layer that wraps any [`Stream`].
///
/// Directory parsing issues many small reads at scattered offsets (entry
/// counts, entry tables, indirect values, next pointers). Against a file or a
/// slow backend each of those would be a separate system call; the cache
/// amortizes them into fewer block-sized reads.
///
/// - Fixed-size blocks with LRU eviction
/// - Reads spanning several blocks are stitched together
/// - Writes go straight to the inner stream and evict the blocks they touch
pub struct CachedStream<S> {
    inner: S,
    block_size: usize,
    cache: LruCache<u64, Bytes>,
    position: u64,
    hits: u64,
    misses: u64,
}

impl<S: Stream> CachedStream<S> {
    /// Wrap `inner` with the default block size and capacity.
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap `inner` with a custom block size and capacity.
    ///
    /// Zero values are bumped to 1.
    pub fn with_capacity(inner: S, block_size: usize, capacity: usize) -> Self {
        Self {
            inner,
            block_size: block_size.max(1),
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            position: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Number of block lookups served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of block lookups that went to the inner stream.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Access the wrapped stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Unwrap the cache, returning the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Get a block from cache or fetch it from the inner stream.
    fn get_block(&mut self, block_idx: u64) -> Result<Bytes, IoError> {
        if let Some(data) = self.cache.get(&block_idx) {
            self.hits += 1;
            return Ok(data.clone());
        }

        self.misses += 1;
        let data = self.fetch_block_from_source(block_idx)?;
        self.cache.put(block_idx, data.clone());
        Ok(data)
    }

    /// Fetch a block directly from the inner stream.
    fn fetch_block_from_source(&mut self, block_idx: u64) -> Result<Bytes, IoError> {
        let offset = block_idx * self.block_size as u64;
        let size = self.inner.size();

        // The last block may be partial
        let remaining = size.saturating_sub(offset);
        if remaining == 0 {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: self.block_size as u64,
                size,
            });
        }

        let len = std::cmp::min(self.block_size as u64, remaining) as usize;
        self.inner.read_exact_at(offset, len)
    }

    /// Calculate which block contains the given offset.
    #[inline]
    fn block_for_offset(&self, offset: u64) -> u64 {
        offset / self.block_size as u64
    }

    /// Calculate the offset within a block.
    #[inline]
    fn offset_within_block(&self, offset: u64) -> usize {
        (offset % self.block_size as u64) as usize
    }

    fn invalidate(&mut self, start: u64, end: u64) {
        if end <= start {
            return;
        }
        let first = self.block_for_offset(start);
        let last = self.block_for_offset(end - 1);
        for block_idx in first..=last {
            self.cache.pop(&block_idx);
        }
    }
}

impl<S: Stream> Stream for CachedStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let size = self.inner.size();
        if self.position >= size || buf.is_empty() {
            return Ok(0);
        }

        let len = std::cmp::min(buf.len() as u64, size - self.position) as usize;
        let bytes = self.read_exact_at(self.position, len)?;
        buf[..len].copy_from_slice(&bytes);
        self.position += len as u64;
        Ok(len)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        let old_size = self.inner.size();
        self.inner.seek(SeekFrom::Start(self.position))?;
        let n = self.inner.write(buf)?;

        let start = self.position;
        self.position += n as u64;
        self.invalidate(start, self.position);

        // The previously-last block was cached short; drop it once the stream grows.
        if self.inner.size() != old_size && old_size > 0 {
            let tail = self.block_for_offset(old_size - 1);
            self.cache.pop(&tail);
        }

        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, IoError> {
        self.position = resolve_seek(pos, self.position, self.inner.size())?;
        Ok(self.position)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn close(&mut self) -> Result<(), IoError> {
        self.cache.clear();
        self.inner.close()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }

    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        // Validate range
        let size = self.inner.size();
        let in_bounds = offset
            .checked_add(len as u64)
            .map_or(false, |end| end <= size);
        if !in_bounds {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }

        // Handle zero-length reads
        if len == 0 {
            return Ok(Bytes::new());
        }

        let start_block = self.block_for_offset(offset);
        let end_block = self.block_for_offset(offset + len as u64 - 1);

        if start_block == end_block {
            // Single block read (common case)
            let block = self.get_block(start_block)?;
            let block_offset = self.offset_within_block(offset);
            Ok(block.slice(block_offset..block_offset + len))
        } else {
            // Multi-block read: fetch all required blocks and combine
            let mut result = BytesMut::with_capacity(len);
            let mut remaining = len;
            let mut current_offset = offset;

            for block_idx in start_block..=end_block {
                let block = self.get_block(block_idx)?;
                let block_offset = self.offset_within_block(current_offset);
                let bytes_in_block = std::cmp::min(block.len() - block_offset, remaining);

                result.extend_from_slice(&block[block_offset..block_offset + bytes_in_block]);

                remaining -= bytes_in_block;
                current_offset += bytes_in_block as u64;
            }

            Ok(result.freeze())
        }
    }
}
