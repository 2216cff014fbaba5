//! # Trace sources.
//!
//! A [`TraceStream`] yields the trace in bounded chunks until `eof`. The
//! loader feeds every chunk to the engine before asking for the next one.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use super::state::TraceSource;
use crate::error::StreamError;

/// One piece of a trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceChunk {
    pub data: Vec<u8>,
    /// No chunk follows this one.
    pub eof: bool,
    /// Bytes read so far, this chunk included.
    pub bytes_read: u64,
    /// Total size when known, else 0.
    pub bytes_total: u64,
}

impl TraceChunk {
    /// Progress line shown while loading: a percentage when the size is known.
    pub fn progress(&self) -> String {
        if self.bytes_total > 0 {
            let pct = self.bytes_read.saturating_mul(100) / self.bytes_total;
            format!("Loading trace {pct}%")
        } else {
            format!("Loading trace {} MB", self.bytes_read / 1_000_000)
        }
    }
}

#[async_trait]
pub trait TraceStream: Send {
    /// Reads the next chunk. Calling again after `eof` yields empty chunks.
    async fn read_chunk(&mut self) -> Result<TraceChunk, StreamError>;
}

/// Opens a stream over `source`; `None` for sources that stream nothing.
pub fn open_stream(source: &TraceSource, chunk_size: usize) -> Option<Box<dyn TraceStream>> {
    match source {
        TraceSource::File { path } => Some(Box::new(TraceFileStream::new(path, chunk_size))),
        TraceSource::ArrayBuffer { data, .. } => {
            Some(Box::new(TraceBufferStream::new(Arc::clone(data), chunk_size)))
        }
        TraceSource::Url { url } => Some(Box::new(TraceHttpStream::new(url, chunk_size))),
        TraceSource::HttpRpc => None,
    }
}

/// Slices an in-memory buffer.
pub struct TraceBufferStream {
    data: Arc<Vec<u8>>,
    offset: usize,
    chunk_size: usize,
}

impl TraceBufferStream {
    pub fn new(data: Arc<Vec<u8>>, chunk_size: usize) -> Self {
        Self {
            data,
            offset: 0,
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl TraceStream for TraceBufferStream {
    async fn read_chunk(&mut self) -> Result<TraceChunk, StreamError> {
        let end = (self.offset + self.chunk_size).min(self.data.len());
        let data = self.data[self.offset..end].to_vec();
        self.offset = end;
        Ok(TraceChunk {
            data,
            eof: end == self.data.len(),
            bytes_read: end as u64,
            bytes_total: self.data.len() as u64,
        })
    }
}

/// Reads a local file; opened on the first read.
pub struct TraceFileStream {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    chunk_size: usize,
    bytes_read: u64,
    bytes_total: u64,
}

impl TraceFileStream {
    pub fn new(path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            path: path.into(),
            file: None,
            chunk_size: chunk_size.max(1),
            bytes_read: 0,
            bytes_total: 0,
        }
    }
}

#[async_trait]
impl TraceStream for TraceFileStream {
    async fn read_chunk(&mut self) -> Result<TraceChunk, StreamError> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => {
                let file = tokio::fs::File::open(&self.path).await?;
                self.bytes_total = file.metadata().await?.len();
                file
            }
        };

        let mut data = Vec::with_capacity(self.chunk_size);
        (&mut file).take(self.chunk_size as u64).read_to_end(&mut data).await?;
        self.file = Some(file);
        self.bytes_read += data.len() as u64;
        Ok(TraceChunk {
            eof: data.len() < self.chunk_size || self.bytes_read >= self.bytes_total,
            data,
            bytes_read: self.bytes_read,
            bytes_total: self.bytes_total,
        })
    }
}

/// Downloads a trace, regrouping the response body into chunks.
pub struct TraceHttpStream {
    url: String,
    client: reqwest::Client,
    response: Option<reqwest::Response>,
    pending: Vec<u8>,
    done: bool,
    chunk_size: usize,
    bytes_read: u64,
    bytes_total: u64,
}

impl TraceHttpStream {
    pub fn new(url: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            response: None,
            pending: Vec::new(),
            done: false,
            chunk_size: chunk_size.max(1),
            bytes_read: 0,
            bytes_total: 0,
        }
    }

    async fn response(&mut self) -> Result<&mut reqwest::Response, StreamError> {
        let resp = match self.response.take() {
            Some(resp) => resp,
            None => self.connect().await?,
        };
        Ok(self.response.insert(resp))
    }

    async fn connect(&mut self) -> Result<reqwest::Response, StreamError> {
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(StreamError::Status {
                url: self.url.clone(),
                status: resp.status().as_u16(),
            });
        }
        self.bytes_total = resp.content_length().unwrap_or(0);
        tracing::debug!(url = %self.url, total = self.bytes_total, "trace download started");
        Ok(resp)
    }
}

#[async_trait]
impl TraceStream for TraceHttpStream {
    async fn read_chunk(&mut self) -> Result<TraceChunk, StreamError> {
        while !self.done && self.pending.len() < self.chunk_size {
            match self.response().await?.chunk().await? {
                Some(bytes) => self.pending.extend_from_slice(&bytes),
                None => self.done = true,
            }
        }

        let take = self.pending.len().min(self.chunk_size);
        let data: Vec<u8> = self.pending.drain(..take).collect();
        self.bytes_read += data.len() as u64;
        Ok(TraceChunk {
            data,
            eof: self.done && self.pending.is_empty(),
            bytes_read: self.bytes_read,
            bytes_total: self.bytes_total,
        })
    }
}
