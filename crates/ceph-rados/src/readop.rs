//! Batched read operations against a single object.

use crate::call::handle_code;
use crate::errors::{RadosError, Result};
use crate::marshal::{self, MarshalResult};
use crate::sys;
use libc::c_int;
use std::marker::PhantomData;
use std::ptr;

/// One queued read and its landing area.
///
/// Boxed so the native operation can hold stable pointers into it between
/// queueing and [`ReadOp::operate`].
struct ReadSlot {
    buf: Vec<u8>,
    bytes_read: usize,
    rval: c_int,
}

/// Index of a queued read within a [`ReadOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHandle(usize);

/// A batch of reads executed against one object in a single round trip.
///
/// Queue ranges with [`queue_read`](ReadOp::queue_read), run the batch with
/// [`operate`](ReadOp::operate), then pull each range's bytes and status out
/// by its [`ReadHandle`]. The native operation is released on drop.
pub struct ReadOp<'pool> {
    op: sys::rados_read_op_t,
    ioctx: sys::rados_ioctx_t,
    slots: Vec<Box<ReadSlot>>,
    _pool: PhantomData<&'pool ()>,
}

unsafe impl Send for ReadOp<'_> {}

impl ReadOp<'_> {
    pub(crate) fn from_raw(op: sys::rados_read_op_t, ioctx: sys::rados_ioctx_t) -> Self {
        Self {
            op,
            ioctx,
            slots: Vec::new(),
            _pool: PhantomData,
        }
    }

    /// Queue a read of `len` bytes starting at `offset`.
    pub fn queue_read(&mut self, offset: i64, len: i64) -> Result<ReadHandle> {
        if offset < 0 {
            return Err(RadosError::NegativeArgument {
                name: "offset",
                value: offset,
            });
        }
        if len < 0 {
            return Err(RadosError::NegativeArgument {
                name: "len",
                value: len,
            });
        }
        let lib = sys::librados()?;
        let mut slot = Box::new(ReadSlot {
            buf: vec![0u8; len as usize],
            bytes_read: 0,
            rval: 0,
        });
        unsafe {
            (lib.rados_read_op_read)(
                self.op,
                offset as u64,
                slot.buf.len(),
                slot.buf.as_mut_ptr().cast(),
                &mut slot.bytes_read,
                &mut slot.rval,
            );
        }
        self.slots.push(slot);
        Ok(ReadHandle(self.slots.len() - 1))
    }

    /// Execute every queued read against `oid` in one round trip.
    pub fn operate(&mut self, oid: &str) -> Result<()> {
        let lib = sys::librados()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let oid_c = marshal::cstring(oid)?;
                Ok(unsafe {
                    (lib.rados_read_op_operate)(
                        self.op,
                        self.ioctx,
                        oid_c.as_ptr(),
                        sys::LIBRADOS_OPERATION_NOFLAG,
                    )
                })
            },
            || format!("failed to execute a batched read against {oid}"),
        )?;
        Ok(())
    }

    /// Bytes actually read into a queued range.
    pub fn bytes_read(&self, handle: ReadHandle) -> usize {
        self.slots[handle.0].bytes_read
    }

    /// Per-range native status code, zero on success.
    pub fn return_value(&self, handle: ReadHandle) -> i32 {
        self.slots[handle.0].rval
    }

    /// The bytes read into a queued range, trimmed to the actual length.
    pub fn data(&self, handle: ReadHandle) -> &[u8] {
        let slot = &self.slots[handle.0];
        &slot.buf[..slot.bytes_read]
    }
}

impl Drop for ReadOp<'_> {
    fn drop(&mut self) {
        if self.op.is_null() {
            return;
        }
        if let Ok(lib) = sys::librados() {
            unsafe { (lib.rados_release_read_op)(self.op) };
        }
        self.op = ptr::null_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_queue_arguments_are_rejected_locally() {
        let mut op = ReadOp::from_raw(ptr::null_mut(), ptr::null_mut());
        assert!(matches!(
            op.queue_read(-1, 8),
            Err(RadosError::NegativeArgument { name: "offset", value: -1 })
        ));
        assert!(matches!(
            op.queue_read(0, -8),
            Err(RadosError::NegativeArgument { name: "len", value: -8 })
        ));
    }
}
