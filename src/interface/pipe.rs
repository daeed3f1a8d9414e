//! In-Memory Pipe Implementation for the capposix interface
//!
//! ## Pipe Module
//!
//! This module provides the ring buffer channel behind substrate pipes and
//! behind both directions of an in-memory stream connection.

/// To learn more about pipes
/// [pipe(7)](https://man7.org/linux/man-pages/man7/pipe.7.html)
use crate::interface;
use crate::interface::substrate::{SubstrateError, SubstrateResult};

use parking_lot::Mutex;
use ringbuf::{Consumer, Producer, RingBuffer};
use std::cmp::min;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

// the standard size of a Linux page, which is also PIPE_BUF
const PAGE_SIZE: usize = 4096;

/// Which end of a pipe a reference is held on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeEnd {
    Read,
    Write,
}

/// # Description
/// Helper function to create pipe objects
///
/// # Arguments
///
/// * `size` - Size of the channel in bytes
///
/// # Returns
///
/// EmulatedPipe object
///
pub fn new_pipe(size: usize) -> EmulatedPipe {
    EmulatedPipe::new_with_capacity(size)
}

/// # Description
/// In-memory pipe struct
///
/// # Fields
///
/// * `write_end` - Reference to the write end of the pipe protected by a Mutex.
/// * `read_end` - Reference to the read end of the pipe protected by a Mutex.
/// * `refcount_write` - Count of open write references.
/// * `refcount_read` - Count of open read references.
/// * `eof` - Flag signifying the pipe has finished being written to.
/// * `size` - Size of pipe buffer in bytes.
#[derive(Clone)]
pub struct EmulatedPipe {
    write_end: Arc<Mutex<Producer<u8>>>,
    read_end: Arc<Mutex<Consumer<u8>>>,
    refcount_write: Arc<AtomicU32>,
    refcount_read: Arc<AtomicU32>,
    eof: Arc<AtomicBool>,
    size: usize,
}

impl EmulatedPipe {
    /// # Description
    /// Creates an in-memory pipe object with one reference on each end
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the channel in bytes
    ///
    pub fn new_with_capacity(size: usize) -> EmulatedPipe {
        let rb = RingBuffer::<u8>::new(size);
        let (prod, cons) = rb.split();
        EmulatedPipe {
            write_end: Arc::new(Mutex::new(prod)),
            read_end: Arc::new(Mutex::new(cons)),
            refcount_write: Arc::new(AtomicU32::new(1)),
            refcount_read: Arc::new(AtomicU32::new(1)),
            eof: Arc::new(AtomicBool::new(false)),
            size: size,
        }
    }

    /// # Description
    /// Setter for EOF flag
    pub fn set_eof(&self) {
        self.eof.store(true, Ordering::SeqCst);
    }

    pub fn is_eof(&self) -> bool {
        self.eof.load(Ordering::SeqCst)
    }

    /// # Description
    /// Getter for write references
    pub fn get_write_ref(&self) -> u32 {
        self.refcount_write.load(Ordering::SeqCst)
    }

    /// # Description
    /// Getter for read references
    pub fn get_read_ref(&self) -> u32 {
        self.refcount_read.load(Ordering::SeqCst)
    }

    /// # Description
    /// Increase references to one end of the pipe
    pub fn incr_ref(&self, end: PipeEnd) {
        match end {
            PipeEnd::Read => self.refcount_read.fetch_add(1, Ordering::SeqCst),
            PipeEnd::Write => self.refcount_write.fetch_add(1, Ordering::SeqCst),
        };
    }

    /// # Description
    /// Decrease references to one end of the pipe. Dropping the last write
    /// reference marks the pipe as finished so readers drain and then see EOF.
    pub fn decr_ref(&self, end: PipeEnd) {
        match end {
            PipeEnd::Read => {
                self.refcount_read.fetch_sub(1, Ordering::SeqCst);
            }
            PipeEnd::Write => {
                if self.refcount_write.fetch_sub(1, Ordering::SeqCst) == 1 {
                    self.set_eof();
                }
            }
        }
    }

    /// Number of bytes currently buffered
    pub fn bytes_available(&self) -> usize {
        self.read_end.lock().len()
    }

    /// Number of bytes that can be written without blocking
    pub fn space_available(&self) -> usize {
        self.write_end.lock().remaining()
    }

    // a write only proceeds once this much space is free, so small writes stay atomic
    fn write_threshold(&self) -> usize {
        min(PAGE_SIZE, self.size)
    }

    /// # Description
    /// Checks if pipe is currently ready for reading, used by poll_oneoff
    ///
    /// # Returns
    ///
    /// True if a read would not block: data is buffered or the writers are gone
    ///
    pub fn check_select_read(&self) -> bool {
        let read_end = self.read_end.lock();
        read_end.len() > 0 || self.is_eof()
    }

    /// # Description
    /// Checks if pipe is currently ready for writing, used by poll_oneoff
    ///
    /// # Returns
    ///
    /// True if a write would not block. A pipe with no readers is writable
    /// since the write fails immediately with a broken pipe.
    ///
    pub fn check_select_write(&self) -> bool {
        if self.get_read_ref() == 0 {
            return true;
        }
        let write_end = self.write_end.lock();

        // Linux considers a pipe writeable if there is at least PAGE_SIZE (PIPE_BUF) remaining space
        write_end.remaining() >= self.write_threshold()
    }

    /// ### Description
    ///
    /// write_to_pipe writes the given bytes to the circular buffer.
    ///
    /// ### Arguments
    ///
    /// * `buf` - the data being written.
    /// * `nonblocking` - if this attempt to write is nonblocking
    ///
    /// ### Returns
    ///
    /// Upon successful completion, the amount of bytes written is returned.
    ///
    /// ### Errors
    ///
    /// * `Again` - Non-blocking is enabled and nothing could be written.
    /// * `Pipe` - All read references have been closed.
    ///
    /// [write(2)](https://man7.org/linux/man-pages/man2/write.2.html)
    pub fn write_to_pipe(&self, buf: &[u8], nonblocking: bool) -> SubstrateResult<usize> {
        let length = buf.len();
        let threshold = self.write_threshold();
        let mut write_end = self.write_end.lock();
        let mut bytes_written = 0;

        while bytes_written < length {
            if self.get_read_ref() == 0 {
                // all read ends are closed
                return Err(SubstrateError::Pipe);
            }

            let remaining = write_end.remaining();

            // wait for a page of free space, see the atomicity notes in pipe(7)
            if remaining < threshold {
                if nonblocking {
                    // report a partial write if we got anything in, otherwise try again later
                    if bytes_written > 0 {
                        return Ok(bytes_written);
                    }
                    return Err(SubstrateError::Again);
                }
                interface::cap_yield();
                continue;
            }

            let bytes_to_write = min(length, bytes_written + remaining);
            write_end.push_slice(&buf[bytes_written..bytes_to_write]);
            bytes_written = bytes_to_write;
        }

        Ok(bytes_written)
    }

    /// ### Description
    ///
    /// read_from_pipe reads up to `buf.len()` bytes from the circular buffer.
    ///
    /// ### Arguments
    ///
    /// * `buf` - the buffer being read into.
    /// * `nonblocking` - if this attempt to read is nonblocking
    ///
    /// ### Returns
    ///
    /// The amount of bytes read, 0 once the pipe is drained and all writers
    /// are gone.
    ///
    /// ### Errors
    ///
    /// * `Again` - Non-blocking is enabled and there is no data in the pipe.
    ///
    /// [read(2)](https://man7.org/linux/man-pages/man2/read.2.html)
    pub fn read_from_pipe(&self, buf: &mut [u8], nonblocking: bool) -> SubstrateResult<usize> {
        let mut read_end = self.read_end.lock();
        let mut pipe_space = read_end.len();

        if nonblocking && pipe_space == 0 {
            if self.is_eof() {
                return Ok(0);
            }
            return Err(SubstrateError::Again);
        }

        // wait for something to be in the pipe, but break on eof
        while pipe_space == 0 {
            if self.is_eof() {
                // one more look, a writer may have pushed right before finishing
                pipe_space = read_end.len();
                if pipe_space == 0 {
                    return Ok(0);
                }
                break;
            }
            interface::cap_yield();
            pipe_space = read_end.len();
        }

        let bytes_to_read = min(buf.len(), pipe_space);
        read_end.pop_slice(&mut buf[0..bytes_to_read]);

        Ok(bytes_to_read)
    }
}

impl fmt::Debug for EmulatedPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmulatedPipe")
            .field("refcount read", &self.refcount_read)
            .field("refcount write", &self.refcount_write)
            .field("eof", &self.eof)
            .field("size", &self.size)
            .finish()
    }
}
