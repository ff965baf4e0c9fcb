//! Object download and line framing
//!
//! An object is downloaded whole into memory and then read back line by
//! line, through a gzip decoder when the source is compressed. Concatenated
//! gzip members are decoded as one stream.

use crate::error::{IngestError, Result};
use crate::store::{ObjectHandle, ObjectStore};
use flate2::read::MultiGzDecoder;
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use tracing::debug;

/// Downloads the objects of one source
#[derive(Clone)]
pub struct ObjectFetcher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    compressed: bool,
}

impl ObjectFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, compressed: bool) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            compressed,
        }
    }

    pub async fn fetch(&self, handle: &ObjectHandle) -> Result<FetchedObject> {
        let data = self.store.download(&self.bucket, &handle.key, handle.size).await?;

        debug!(
            key = %handle.key,
            bytes = data.len(),
            compressed = self.compressed,
            "Downloaded object"
        );

        Ok(FetchedObject {
            key: handle.key.clone(),
            data,
            compressed: self.compressed,
        })
    }
}

/// A downloaded object held in memory
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub key: String,
    pub data: Vec<u8>,
    pub compressed: bool,
}

impl FetchedObject {
    /// Size of the object as stored, before decompression
    pub fn stored_len(&self) -> usize {
        self.data.len()
    }

    /// Read the content line by line; lines longer than `max_line_bytes`
    /// fail the read
    pub fn lines(&self, max_line_bytes: usize) -> LineReader<'_> {
        let inner: Box<dyn BufRead + Send + '_> = if self.compressed {
            Box::new(BufReader::new(MultiGzDecoder::new(self.data.as_slice())))
        } else {
            Box::new(self.data.as_slice())
        };

        LineReader {
            key: &self.key,
            compressed: self.compressed,
            inner,
            buf: Vec::new(),
            line: 0,
            max_line_bytes,
        }
    }
}

/// Line iterator over a fetched object
pub struct LineReader<'a> {
    key: &'a str,
    compressed: bool,
    inner: Box<dyn BufRead + Send + 'a>,
    buf: Vec<u8>,
    line: usize,
    max_line_bytes: usize,
}

impl LineReader<'_> {
    /// The next line without its `\n` or `\r\n` terminator, or `None` at the
    /// end of the content
    pub fn next_line(&mut self) -> Result<Option<&[u8]>> {
        self.buf.clear();

        let (key, compressed) = (self.key, self.compressed);

        // Room for the terminator, plus one byte to detect overflow
        let limit = self.max_line_bytes as u64 + 3;
        let read = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .map_err(|source| {
                let key = key.to_string();
                if compressed {
                    IngestError::Decompression { key, source }
                } else {
                    IngestError::Read { key, source }
                }
            })?;

        if read == 0 {
            return Ok(None);
        }
        self.line += 1;

        let mut end = self.buf.len();
        if self.buf[..end].ends_with(b"\n") {
            end -= 1;
        }
        if self.buf[..end].ends_with(b"\r") {
            end -= 1;
        }

        if end > self.max_line_bytes {
            return Err(IngestError::LineTooLong {
                key: self.key.to_string(),
                line: self.line,
                limit: self.max_line_bytes,
            });
        }

        Ok(Some(&self.buf[..end]))
    }

    /// 1-based number of the line last returned
    pub fn line_number(&self) -> usize {
        self.line
    }
}
