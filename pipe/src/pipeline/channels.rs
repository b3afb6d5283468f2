//! Inter-stage channels.
//!
//! Both ends of every channel are created close-on-exec, so a child only ever
//! holds the ends explicitly installed as its standard streams. Each end is
//! claimed at most once; whatever is still held when a [`Channel`] is dropped
//! is closed with it.

use crate::errors::PipeError;
use os_pipe::{PipeReader, PipeWriter};
use tracing::trace;

/// A unidirectional byte stream from stage `index` to stage `index + 1`.
#[derive(Debug)]
pub struct Channel {
    index: usize,
    reader: Option<PipeReader>,
    writer: Option<PipeWriter>,
}

impl Channel {
    /// Opens a fresh, empty channel.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::ResourceExhausted`] if the OS cannot create it.
    pub fn open(index: usize) -> Result<Self, PipeError> {
        let (reader, writer) = os_pipe::pipe().map_err(|err| {
            PipeError::resource_exhausted(format!("create channel {}", index + 1), err)
        })?;
        Ok(Self {
            index,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    /// Returns the channel index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Claims the read end. Returns `None` if it was already claimed.
    pub fn take_reader(&mut self) -> Option<PipeReader> {
        self.reader.take()
    }

    /// Claims the write end. Returns `None` if it was already claimed.
    pub fn take_writer(&mut self) -> Option<PipeWriter> {
        self.writer.take()
    }

    /// Returns true if neither end is still held here.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }
}

/// Opens the `stage_count - 1` channels a pipeline of `stage_count` stages
/// needs.
///
/// # Errors
///
/// Returns [`PipeError::ResourceExhausted`] on the first failed allocation.
/// Channels opened before the failure are closed before returning.
pub fn allocate_channels(stage_count: usize) -> Result<Vec<Channel>, PipeError> {
    let wanted = stage_count.saturating_sub(1);
    let mut channels = Vec::with_capacity(wanted);
    for index in 0..wanted {
        // On error `channels` drops here, closing every end opened so far.
        channels.push(Channel::open(index)?);
    }
    trace!(channels = channels.len(), "Allocated channels");
    Ok(channels)
}
