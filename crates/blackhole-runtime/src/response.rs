//! The canned response
//!
//! Built once at startup: status line, `Content-Type`, `Content-Length`
//! (computed from the body), blank line, body. Shared read-only between
//! threads as an `Arc<[u8]>`.

use blackhole_core::error::{BhError, BhResult};
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::Arc;

/// Immutable wire bytes of the one response the server sends.
#[derive(Debug, Clone)]
pub struct Response {
    bytes: Arc<[u8]>,
    body_len: usize,
}

impl Response {
    /// Build the response around `body`.
    pub fn from_body(status_line: &str, content_type: &str, body: &[u8]) -> Self {
        let header = format!(
            "{}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             \r\n",
            status_line,
            content_type,
            body.len()
        );
        let mut bytes = Vec::with_capacity(header.len() + body.len());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(body);
        Self {
            bytes: bytes.into(),
            body_len: body.len(),
        }
    }

    /// Map `path` read-only and build the response around its contents.
    pub fn from_file(
        path: impl AsRef<Path>,
        status_line: &str,
        content_type: &str,
    ) -> BhResult<Self> {
        let path = path.as_ref();
        let file_error = |e: std::io::Error| BhError::ResponseFile {
            path: path.display().to_string(),
            errno: e.raw_os_error().unwrap_or(libc::EIO),
        };

        let file = File::open(path).map_err(file_error)?;
        let len = file.metadata().map_err(file_error)?.len() as usize;
        let mapped = MappedFile::map(&file, len).map_err(file_error)?;
        Ok(Self::from_body(status_line, content_type, mapped.as_slice()))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn body_len(&self) -> usize {
        self.body_len
    }

    #[inline]
    pub fn header_len(&self) -> usize {
        self.bytes.len() - self.body_len
    }
}

/// Read-only private mapping, unmapped on drop.
struct MappedFile {
    ptr: *mut libc::c_void,
    len: usize,
}

impl MappedFile {
    /// Map `len` bytes of `file`. Zero-length files are not mapped.
    fn map(file: &File, len: usize) -> std::io::Result<Self> {
        if len == 0 {
            return Ok(Self {
                ptr: std::ptr::null_mut(),
                len: 0,
            });
        }
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_PRIVATE,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self { ptr, len })
    }

    fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr as *const u8, self.len) }
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        if self.len != 0 {
            unsafe {
                libc::munmap(self.ptr, self.len);
            }
        }
    }
}
