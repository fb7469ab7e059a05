// src/output.rs

//! Output stream that leaves a file untouched when its content would not
//! change.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::context::BuildContext;
use crate::errors::Result;

/// Buffered writer for one target file.
///
/// Nothing reaches the disk until [`FileOutput::close`]. At that point the
/// buffer is compared with the file's current content: identical bytes are
/// discarded (the file keeps its modification time and is not refreshed),
/// anything else is written out and refreshed in the owning context.
///
/// Dropping an unclosed output commits it as well; failures are then only
/// logged.
pub struct FileOutput<'a> {
    ctx: &'a mut BuildContext,
    path: PathBuf,
    buffer: Vec<u8>,
    closed: bool,
}

impl<'a> FileOutput<'a> {
    pub(crate) fn new(ctx: &'a mut BuildContext, path: PathBuf) -> Self {
        Self {
            ctx,
            path,
            buffer: Vec::new(),
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Commit the buffered bytes. Returns `true` if the file was written.
    pub fn close(mut self) -> Result<bool> {
        self.closed = true;
        self.commit()
    }

    fn commit(&mut self) -> Result<bool> {
        let fs = self.ctx.file_system();

        if fs.is_file(&self.path) && fs.read(&self.path)? == self.buffer {
            debug!(path = ?self.path, "output unchanged, skipping write");
            return Ok(false);
        }

        fs.write(&self.path, &self.buffer)?;
        debug!(path = ?self.path, bytes = self.buffer.len(), "output written");
        self.ctx.refresh(&self.path);
        Ok(true)
    }
}

impl Write for FileOutput<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FileOutput<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.commit() {
            warn!(path = ?self.path, error = %e, "failed to write output on drop");
        }
    }
}
