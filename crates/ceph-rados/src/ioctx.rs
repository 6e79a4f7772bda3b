//! The per-pool I/O context and object operations.

use crate::call::handle_code;
use crate::errors::{RadosError, Result};
use crate::list::ListCtx;
use crate::marshal::{self, MarshalResult};
use crate::readop::ReadOp;
use crate::sys::{self, LibRados};
use libc::{c_int, time_t};
use std::marker::PhantomData;
use std::ptr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Size and modification time of one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub name: String,
    pub size: u64,
    pub mtime: SystemTime,
}

/// Aggregate usage counters for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStat {
    pub num_bytes: u64,
    pub num_kb: u64,
    pub num_objects: u64,
    pub num_object_clones: u64,
    pub num_object_copies: u64,
    pub num_objects_missing_on_primary: u64,
    pub num_objects_unfound: u64,
    pub num_objects_degraded: u64,
    pub num_rd: u64,
    pub num_rd_kb: u64,
    pub num_wr: u64,
    pub num_wr_kb: u64,
}

impl From<sys::rados_pool_stat_t> for PoolStat {
    fn from(s: sys::rados_pool_stat_t) -> Self {
        Self {
            num_bytes: s.num_bytes,
            num_kb: s.num_kb,
            num_objects: s.num_objects,
            num_object_clones: s.num_object_clones,
            num_object_copies: s.num_object_copies,
            num_objects_missing_on_primary: s.num_objects_missing_on_primary,
            num_objects_unfound: s.num_objects_unfound,
            num_objects_degraded: s.num_objects_degraded,
            num_rd: s.num_rd,
            num_rd_kb: s.num_rd_kb,
            num_wr: s.num_wr,
            num_wr_kb: s.num_wr_kb,
        }
    }
}

/// An owning handle to a per-pool I/O context.
///
/// Created by [`Rados::ioctx_create`](crate::Rados::ioctx_create) and tied to
/// the cluster handle's lifetime. The native context is released exactly
/// once, on drop or through
/// [`Rados::ioctx_destroy`](crate::Rados::ioctx_destroy).
///
/// Negative `offset`, `len` and `size` arguments are rejected locally before
/// any native call is made.
pub struct IoCtx<'cluster> {
    ioctx: sys::rados_ioctx_t,
    _cluster: PhantomData<&'cluster ()>,
}

unsafe impl Send for IoCtx<'_> {}

fn lib() -> Result<&'static LibRados> {
    Ok(sys::librados()?)
}

fn require_non_negative(name: &'static str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(RadosError::NegativeArgument { name, value });
    }
    Ok(())
}

impl IoCtx<'_> {
    pub(crate) fn from_raw(ioctx: sys::rados_ioctx_t) -> Self {
        Self {
            ioctx,
            _cluster: PhantomData,
        }
    }

    /// The raw native context pointer, for layering companion native
    /// libraries (such as the block-device client) on top of this pool.
    #[must_use]
    pub fn raw(&self) -> sys::rados_ioctx_t {
        self.ioctx
    }

    /// The numeric id of the pool this context is scoped to.
    pub fn pool_id(&self) -> Result<i64> {
        let lib = lib()?;
        Ok(unsafe { (lib.rados_ioctx_get_id)(self.ioctx) })
    }

    /// Set the owner id of the pool.
    pub fn set_owner(&self, auid: u64) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe { (lib.rados_ioctx_pool_set_auid)(self.ioctx, auid) })
            },
            || format!("failed to set the pool owner to {auid}"),
        )?;
        Ok(())
    }

    /// The owner id of the pool.
    pub fn owner(&self) -> Result<u64> {
        let lib = lib()?;
        let mut auid = 0u64;
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe { (lib.rados_ioctx_pool_get_auid)(self.ioctx, &mut auid) })
            },
            || "failed to get the pool owner".to_owned(),
        )?;
        Ok(auid)
    }

    /// The name of the pool this context is scoped to.
    pub fn pool_name(&self) -> Result<String> {
        let lib = lib()?;
        let mut buf = [0u8; 1024];
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe {
                    (lib.rados_ioctx_get_pool_name)(
                        self.ioctx,
                        buf.as_mut_ptr().cast(),
                        buf.len() as u32,
                    )
                })
            },
            || "failed to get the pool name".to_owned(),
        )?;
        Ok(marshal::buf_to_string(&buf))
    }

    /// Steer placement of all subsequent operations on this context.
    ///
    /// Objects written under the same locator key share a placement group,
    /// which [`clone_range`](IoCtx::clone_range) requires.
    pub fn set_locator_key(&self, key: &str) -> Result<()> {
        let lib = lib()?;
        let key_c = marshal::cstring(key).map_err(|e| RadosError::Unexpected {
            type_name: "NulError".to_owned(),
            message: e.to_string(),
        })?;
        unsafe { (lib.rados_ioctx_locator_set_key)(self.ioctx, key_c.as_ptr()) };
        Ok(())
    }

    /// Stop steering placement; subsequent operations hash by object name.
    pub fn clear_locator_key(&self) -> Result<()> {
        let lib = lib()?;
        unsafe { (lib.rados_ioctx_locator_set_key)(self.ioctx, ptr::null()) };
        Ok(())
    }

    /// Names of all objects in the pool, in one pass.
    pub fn list_objects(&self) -> Result<Vec<String>> {
        let mut cursor = self.list_objects_paged(1024)?;
        let mut names = Vec::new();
        loop {
            let fetched = cursor.next_objects()?;
            names.extend_from_slice(cursor.objects());
            if fetched == 0 {
                return Ok(names);
            }
        }
    }

    /// Open a resumable cursor over the pool's objects, fetching up to
    /// `page_size` names per call.
    pub fn list_objects_paged(&self, page_size: usize) -> Result<ListCtx<'_>> {
        let lib = lib()?;
        let mut list: sys::rados_list_ctx_t = ptr::null_mut();
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe { (lib.rados_objects_list_open)(self.ioctx, &mut list) })
            },
            || "failed to open an object listing".to_owned(),
        )?;
        Ok(ListCtx::from_raw(list, page_size))
    }

    /// Write `data` to `oid` at a byte offset.
    pub fn write(&self, oid: &str, data: &[u8], offset: i64) -> Result<()> {
        require_non_negative("offset", offset)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let oid_c = marshal::cstring(oid)?;
                Ok(unsafe {
                    (lib.rados_write)(
                        self.ioctx,
                        oid_c.as_ptr(),
                        data.as_ptr().cast(),
                        data.len(),
                        offset as u64,
                    )
                })
            },
            || format!("failed writing {} bytes at offset {offset} to {oid}", data.len()),
        )?;
        Ok(())
    }

    /// Replace the entire contents of `oid` with `data` (truncate + write).
    pub fn write_full(&self, oid: &str, data: &[u8]) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let oid_c = marshal::cstring(oid)?;
                Ok(unsafe {
                    (lib.rados_write_full)(
                        self.ioctx,
                        oid_c.as_ptr(),
                        data.as_ptr().cast(),
                        data.len(),
                    )
                })
            },
            || format!("failed writing {} bytes to {oid}", data.len()),
        )?;
        Ok(())
    }

    /// Append `data` to the end of `oid`.
    pub fn append(&self, oid: &str, data: &[u8]) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let oid_c = marshal::cstring(oid)?;
                Ok(unsafe {
                    (lib.rados_append)(
                        self.ioctx,
                        oid_c.as_ptr(),
                        data.as_ptr().cast(),
                        data.len(),
                    )
                })
            },
            || format!("failed appending {} bytes to {oid}", data.len()),
        )?;
        Ok(())
    }

    /// Read up to `len` bytes from `oid` starting at `offset`.
    ///
    /// Returns the bytes actually read, which is fewer than `len` at end of
    /// object.
    pub fn read(&self, oid: &str, len: i64, offset: i64) -> Result<Vec<u8>> {
        require_non_negative("len", len)?;
        require_non_negative("offset", offset)?;
        let lib = lib()?;
        let mut buf = vec![0u8; len as usize];
        let read = handle_code(
            || -> MarshalResult<c_int> {
                let oid_c = marshal::cstring(oid)?;
                Ok(unsafe {
                    (lib.rados_read)(
                        self.ioctx,
                        oid_c.as_ptr(),
                        buf.as_mut_ptr().cast(),
                        buf.len(),
                        offset as u64,
                    )
                })
            },
            || format!("failed reading {len} bytes at offset {offset} from {oid}"),
        )?;
        buf.truncate(read as usize);
        Ok(buf)
    }

    /// Remove `oid` from the pool.
    pub fn remove(&self, oid: &str) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let oid_c = marshal::cstring(oid)?;
                Ok(unsafe { (lib.rados_remove)(self.ioctx, oid_c.as_ptr()) })
            },
            || format!("failed removing {oid}"),
        )?;
        debug!(oid, "removed object");
        Ok(())
    }

    /// Resize `oid` to `size` bytes.
    ///
    /// Enlarging zero-fills the new region; shrinking discards the tail.
    pub fn truncate(&self, oid: &str, size: i64) -> Result<()> {
        require_non_negative("size", size)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let oid_c = marshal::cstring(oid)?;
                Ok(unsafe { (lib.rados_trunc)(self.ioctx, oid_c.as_ptr(), size as u64) })
            },
            || format!("failed resizing {oid} to {size} bytes"),
        )?;
        Ok(())
    }

    /// Copy a byte range from `src` into `dst`.
    ///
    /// Source and destination must share a placement group; set a locator
    /// key on this context first (see [`set_locator_key`](IoCtx::set_locator_key)).
    pub fn clone_range(
        &self,
        dst: &str,
        dst_offset: i64,
        src: &str,
        src_offset: i64,
        len: i64,
    ) -> Result<()> {
        require_non_negative("dst_offset", dst_offset)?;
        require_non_negative("src_offset", src_offset)?;
        require_non_negative("len", len)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let dst_c = marshal::cstring(dst)?;
                let src_c = marshal::cstring(src)?;
                Ok(unsafe {
                    (lib.rados_clone_range)(
                        self.ioctx,
                        dst_c.as_ptr(),
                        dst_offset as u64,
                        src_c.as_ptr(),
                        src_offset as u64,
                        len as usize,
                    )
                })
            },
            || format!("failed to copy {len} bytes from {src} to {dst}"),
        )?;
        Ok(())
    }

    /// Size and modification time of `oid`.
    pub fn stat(&self, oid: &str) -> Result<ObjectStat> {
        let lib = lib()?;
        let mut size = 0u64;
        let mut mtime: time_t = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                let oid_c = marshal::cstring(oid)?;
                Ok(unsafe { (lib.rados_stat)(self.ioctx, oid_c.as_ptr(), &mut size, &mut mtime) })
            },
            || format!("failed performing a stat on {oid}"),
        )?;
        Ok(ObjectStat {
            name: oid.to_owned(),
            size,
            mtime: UNIX_EPOCH + Duration::from_secs(mtime.max(0) as u64),
        })
    }

    /// Aggregate usage counters for the pool.
    pub fn pool_stat(&self) -> Result<PoolStat> {
        let lib = lib()?;
        let mut stat = sys::rados_pool_stat_t::default();
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe { (lib.rados_ioctx_pool_stat)(self.ioctx, &mut stat) })
            },
            || "failed retrieving the pool stats".to_owned(),
        )?;
        Ok(stat.into())
    }

    /// Create a pool snapshot named `name`.
    pub fn snap_create(&self, name: &str) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe { (lib.rados_ioctx_snap_create)(self.ioctx, name_c.as_ptr()) })
            },
            || format!("failed to create snapshot {name}"),
        )?;
        debug!(snapshot = name, "created pool snapshot");
        Ok(())
    }

    /// Remove the pool snapshot named `name`.
    pub fn snap_remove(&self, name: &str) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe { (lib.rados_ioctx_snap_remove)(self.ioctx, name_c.as_ptr()) })
            },
            || format!("failed to remove snapshot {name}"),
        )?;
        debug!(snapshot = name, "removed pool snapshot");
        Ok(())
    }

    /// The numeric id of the snapshot named `name`.
    pub fn snap_lookup(&self, name: &str) -> Result<u64> {
        let lib = lib()?;
        let mut id: sys::rados_snap_t = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe { (lib.rados_ioctx_snap_lookup)(self.ioctx, name_c.as_ptr(), &mut id) })
            },
            || format!("failed to look up the id of snapshot {name}"),
        )?;
        Ok(id)
    }

    /// The name of the snapshot with numeric id `id`.
    pub fn snap_name(&self, id: u64) -> Result<String> {
        let lib = lib()?;
        let mut buf = [0u8; 512];
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe {
                    (lib.rados_ioctx_snap_get_name)(
                        self.ioctx,
                        id,
                        buf.as_mut_ptr().cast(),
                        buf.len() as c_int,
                    )
                })
            },
            || format!("failed to look up the name of snapshot {id}"),
        )?;
        Ok(marshal::buf_to_string(&buf))
    }

    /// The creation time of the snapshot with numeric id `id`.
    pub fn snap_stamp(&self, id: u64) -> Result<SystemTime> {
        let lib = lib()?;
        let mut time: time_t = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe { (lib.rados_ioctx_snap_get_stamp)(self.ioctx, id, &mut time) })
            },
            || format!("failed to retrieve the timestamp of snapshot {id}"),
        )?;
        Ok(UNIX_EPOCH + Duration::from_secs(time.max(0) as u64))
    }

    /// Ids of every snapshot of the pool.
    pub fn snap_list(&self) -> Result<Vec<u64>> {
        let lib = lib()?;
        let mut snaps: Vec<sys::rados_snap_t> = vec![0; 64];
        loop {
            let r = unsafe {
                (lib.rados_ioctx_snap_list)(self.ioctx, snaps.as_mut_ptr(), snaps.len() as c_int)
            };
            if r == crate::errors::ErrorCode::ERANGE.code() {
                snaps.resize(snaps.len() * 2, 0);
                continue;
            }
            let count = handle_code(
                || -> MarshalResult<c_int> { Ok(r) },
                || "failed to list the pool snapshots".to_owned(),
            )? as usize;
            snaps.truncate(count);
            return Ok(snaps);
        }
    }

    /// Open a batched read operation against objects in this pool.
    pub fn read_op(&self) -> Result<ReadOp<'_>> {
        let lib = lib()?;
        let op = unsafe { (lib.rados_create_read_op)() };
        Ok(ReadOp::from_raw(op, self.ioctx))
    }
}

impl Drop for IoCtx<'_> {
    fn drop(&mut self) {
        if self.ioctx.is_null() {
            return;
        }
        if let Ok(lib) = sys::librados() {
            unsafe { (lib.rados_ioctx_destroy)(self.ioctx) };
        }
        self.ioctx = ptr::null_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A context that never touches the native library; only local argument
    // validation may run against it.
    fn stub() -> IoCtx<'static> {
        IoCtx::from_raw(ptr::null_mut())
    }

    #[test]
    fn negative_read_arguments_are_rejected_locally() {
        let io = stub();
        assert!(matches!(
            io.read("oid", -1, 0),
            Err(RadosError::NegativeArgument { name: "len", value: -1 })
        ));
        assert!(matches!(
            io.read("oid", 16, -4),
            Err(RadosError::NegativeArgument { name: "offset", value: -4 })
        ));
    }

    #[test]
    fn negative_write_offset_is_rejected_locally() {
        let io = stub();
        assert!(matches!(
            io.write("oid", b"data", -1),
            Err(RadosError::NegativeArgument { name: "offset", value: -1 })
        ));
    }

    #[test]
    fn negative_truncate_size_is_rejected_locally() {
        let io = stub();
        assert!(matches!(
            io.truncate("oid", -9),
            Err(RadosError::NegativeArgument { name: "size", value: -9 })
        ));
    }

    #[test]
    fn negative_clone_range_arguments_are_rejected_locally() {
        let io = stub();
        assert!(matches!(
            io.clone_range("dst", -1, "src", 0, 8),
            Err(RadosError::NegativeArgument { name: "dst_offset", .. })
        ));
        assert!(matches!(
            io.clone_range("dst", 0, "src", -1, 8),
            Err(RadosError::NegativeArgument { name: "src_offset", .. })
        ));
        assert!(matches!(
            io.clone_range("dst", 0, "src", 0, -8),
            Err(RadosError::NegativeArgument { name: "len", .. })
        ));
    }
}
