//! Operations on one open image.

use crate::sys::{self, LibRbd};
use ceph_rados::call::handle_code;
use ceph_rados::marshal::{self, MarshalResult};
use ceph_rados::{RadosError, Result};
use libc::c_int;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::ptr;
use tracing::debug;

/// The parent an image was cloned from, when it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParent {
    pub pool_id: i64,
    pub image_name: String,
}

/// Metadata of an open image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub size: u64,
    pub obj_size: u64,
    pub num_objs: u64,
    pub order: i32,
    pub block_name_prefix: String,
    pub parent: Option<ImageParent>,
}

/// One snapshot of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapInfo {
    pub id: u64,
    pub size: u64,
    pub name: String,
}

/// A child image of a snapshot: the pool it lives in and its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildImage {
    pub pool: String,
    pub image: String,
}

fn lib() -> Result<&'static LibRbd> {
    Ok(sys::librbd()?)
}

/// An owning handle to an open image.
///
/// Obtained from [`Rbd::open`](crate::Rbd::open) and tied to the pool
/// context's lifetime. The native handle is released exactly once, on
/// [`close`](RbdImage::close) or on drop.
pub struct RbdImage<'pool> {
    image: sys::rbd_image_t,
    name: String,
    _pool: PhantomData<&'pool ()>,
}

unsafe impl Send for RbdImage<'_> {}

impl RbdImage<'_> {
    pub(crate) fn from_raw(image: sys::rbd_image_t, name: String) -> Self {
        Self {
            image,
            name,
            _pool: PhantomData,
        }
    }

    /// The name this image was opened under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metadata of the image: size, object layout and clone parentage.
    pub fn stat(&self) -> Result<ImageInfo> {
        let lib = lib()?;
        let mut info = sys::rbd_image_info_t::zeroed();
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe {
                    (lib.rbd_stat)(self.image, &mut info, std::mem::size_of_val(&info))
                })
            },
            || format!("failed to stat image {}", self.name),
        )?;
        let parent_name = marshal::fixed_cstr(&info.parent_name);
        let parent = if info.parent_pool >= 0 && !parent_name.is_empty() {
            Some(ImageParent {
                pool_id: info.parent_pool,
                image_name: parent_name,
            })
        } else {
            None
        };
        Ok(ImageInfo {
            size: info.size,
            obj_size: info.obj_size,
            num_objs: info.num_objs,
            order: info.order,
            block_name_prefix: marshal::fixed_cstr(&info.block_name_prefix),
            parent,
        })
    }

    /// Whether the image uses the legacy (format 1) on-disk layout.
    pub fn is_old_format(&self) -> Result<bool> {
        let lib = lib()?;
        let mut old: u8 = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe { (lib.rbd_get_old_format)(self.image, &mut old) })
            },
            || format!("failed to query the format of image {}", self.name),
        )?;
        Ok(old == 1)
    }

    /// Read into `buf` starting at a byte offset. Returns the bytes actually
    /// read, which is fewer than `buf.len()` at the end of the image.
    pub fn read(&self, offset: i64, buf: &mut [u8]) -> Result<usize> {
        if offset < 0 {
            return Err(RadosError::NegativeArgument {
                name: "offset",
                value: offset,
            });
        }
        let lib = lib()?;
        let len = buf.len();
        let read = handle_code(
            || -> Result<i64> {
                Ok(unsafe {
                    (lib.rbd_read)(self.image, offset as u64, len, buf.as_mut_ptr().cast()) as i64
                })
            },
            || {
                format!(
                    "failed reading {len} bytes at offset {offset} from image {}",
                    self.name
                )
            },
        )?;
        Ok(read as usize)
    }

    /// Write all of `data` at a byte offset.
    ///
    /// A write the native library completes only partially is reported as
    /// [`RadosError::ShortWrite`] rather than silently accepted.
    pub fn write(&self, data: &[u8], offset: i64) -> Result<()> {
        if offset < 0 {
            return Err(RadosError::NegativeArgument {
                name: "offset",
                value: offset,
            });
        }
        let lib = lib()?;
        let written = handle_code(
            || -> Result<i64> {
                Ok(unsafe {
                    (lib.rbd_write)(self.image, offset as u64, data.len(), data.as_ptr().cast())
                        as i64
                })
            },
            || {
                format!(
                    "failed writing {} bytes at offset {offset} to image {}",
                    data.len(),
                    self.name
                )
            },
        )? as usize;
        if written < data.len() {
            return Err(RadosError::ShortWrite {
                expected: data.len(),
                written,
            });
        }
        Ok(())
    }

    /// Resize the image to `size` bytes.
    pub fn resize(&self, size: i64) -> Result<()> {
        if size < 0 {
            return Err(RadosError::NegativeArgument {
                name: "size",
                value: size,
            });
        }
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe { (lib.rbd_resize)(self.image, size as u64) })
            },
            || format!("failed to resize image {} to {size} bytes", self.name),
        )?;
        debug!(image = %self.name, size, "resized image");
        Ok(())
    }

    /// Copy all parent data into this clone, severing the dependency on the
    /// parent snapshot.
    pub fn flatten(&self) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> { Ok(unsafe { (lib.rbd_flatten)(self.image) }) },
            || format!("failed to flatten image {}", self.name),
        )?;
        debug!(image = %self.name, "flattened image");
        Ok(())
    }

    /// Copy this image's content into another open image.
    pub fn copy_to(&self, dest: &RbdImage<'_>) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe { (lib.rbd_copy2)(self.image, dest.image) })
            },
            || format!("failed to copy image {} to {}", self.name, dest.name),
        )?;
        Ok(())
    }

    /// Create a snapshot of the image's current content.
    pub fn snap_create(&self, name: &str) -> Result<()> {
        self.snap_call(name, |lib| lib.rbd_snap_create, "create snapshot")?;
        debug!(image = %self.name, snapshot = name, "created snapshot");
        Ok(())
    }

    /// Remove a snapshot. Protected snapshots must be unprotected first.
    pub fn snap_remove(&self, name: &str) -> Result<()> {
        self.snap_call(name, |lib| lib.rbd_snap_remove, "remove snapshot")?;
        debug!(image = %self.name, snapshot = name, "removed snapshot");
        Ok(())
    }

    /// Protect a snapshot against removal, a precondition for cloning it.
    pub fn snap_protect(&self, name: &str) -> Result<()> {
        self.snap_call(name, |lib| lib.rbd_snap_protect, "protect snapshot")
    }

    /// Remove the removal protection from a snapshot.
    pub fn snap_unprotect(&self, name: &str) -> Result<()> {
        self.snap_call(name, |lib| lib.rbd_snap_unprotect, "unprotect snapshot")
    }

    fn snap_call(
        &self,
        name: &str,
        select: fn(&LibRbd) -> unsafe extern "C" fn(sys::rbd_image_t, *const libc::c_char) -> c_int,
        what: &str,
    ) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe { select(lib)(self.image, name_c.as_ptr()) })
            },
            || format!("failed to {what} {name} of image {}", self.name),
        )?;
        Ok(())
    }

    /// Whether a snapshot is protected against removal.
    pub fn snap_is_protected(&self, name: &str) -> Result<bool> {
        let lib = lib()?;
        let mut protected: c_int = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe {
                    (lib.rbd_snap_is_protected)(self.image, name_c.as_ptr(), &mut protected)
                })
            },
            || format!("failed to query protection of snapshot {name} of image {}", self.name),
        )?;
        Ok(protected == 1)
    }

    /// Pin reads to a snapshot, or return to the live image with `None`.
    pub fn snap_set(&self, name: Option<&str>) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = name.map(marshal::cstring).transpose()?;
                let name_ptr = name_c.as_ref().map_or(ptr::null(), |s| s.as_ptr());
                Ok(unsafe { (lib.rbd_snap_set)(self.image, name_ptr) })
            },
            || {
                format!(
                    "failed to set image {} to snapshot {}",
                    self.name,
                    name.unwrap_or("(live)")
                )
            },
        )?;
        Ok(())
    }

    /// Every snapshot of the image.
    pub fn snap_list(&self) -> Result<Vec<SnapInfo>> {
        let lib = lib()?;
        let mut max: c_int = 16;
        loop {
            let mut entries = vec![sys::rbd_snap_info_t::zeroed(); max as usize];
            let r = unsafe { (lib.rbd_snap_list)(self.image, entries.as_mut_ptr(), &mut max) };
            // A too-small array comes back as ERANGE with `max` raised to the
            // required capacity.
            if r == ceph_rados::ErrorCode::ERANGE.code() {
                continue;
            }
            let count = handle_code(
                || -> MarshalResult<c_int> { Ok(r) },
                || format!("failed to list the snapshots of image {}", self.name),
            )? as usize;
            let snaps = entries[..count]
                .iter()
                .map(|e| SnapInfo {
                    id: e.id,
                    size: e.size,
                    name: if e.name.is_null() {
                        String::new()
                    } else {
                        unsafe { std::ffi::CStr::from_ptr(e.name) }
                            .to_string_lossy()
                            .into_owned()
                    },
                })
                .collect();
            // Frees the name strings the native list allocated.
            unsafe { (lib.rbd_snap_list_end)(entries.as_mut_ptr()) };
            return Ok(snaps);
        }
    }

    /// Every child cloned from the currently set snapshot of this image.
    pub fn list_children(&self) -> Result<Vec<ChildImage>> {
        let lib = lib()?;
        let mut pools_len: usize = 512;
        let mut images_len: usize = 512;
        loop {
            let mut pools = vec![0u8; pools_len];
            let mut images = vec![0u8; images_len];
            let r = unsafe {
                (lib.rbd_list_children)(
                    self.image,
                    pools.as_mut_ptr().cast(),
                    &mut pools_len,
                    images.as_mut_ptr().cast(),
                    &mut images_len,
                )
            };
            if r == ceph_rados::ErrorCode::ERANGE.code() {
                continue;
            }
            handle_code(
                || -> MarshalResult<c_int> { Ok(r) },
                || format!("failed to list the children of image {}", self.name),
            )?;
            let pool_names = marshal::packed_strings(&pools[..pools_len.min(pools.len())]);
            let image_names = marshal::packed_strings(&images[..images_len.min(images.len())]);
            return Ok(pool_names
                .into_iter()
                .zip(image_names)
                .map(|(pool, image)| ChildImage { pool, image })
                .collect());
        }
    }

    /// Release the native handle, surfacing any error the release reports.
    ///
    /// Safe to call more than once; drop performs the same release silently
    /// if this was never called.
    pub fn close(&mut self) -> Result<()> {
        if self.image.is_null() {
            return Ok(());
        }
        let lib = lib()?;
        let image = self.image;
        self.image = ptr::null_mut();
        handle_code(
            || -> std::result::Result<c_int, Infallible> {
                Ok(unsafe { (lib.rbd_close)(image) })
            },
            || format!("failed to close image {}", self.name),
        )?;
        Ok(())
    }
}

impl Drop for RbdImage<'_> {
    fn drop(&mut self) {
        if self.image.is_null() {
            return;
        }
        if let Ok(lib) = sys::librbd() {
            unsafe { (lib.rbd_close)(self.image) };
        }
        self.image = ptr::null_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub() -> RbdImage<'static> {
        RbdImage::from_raw(ptr::null_mut(), "img".to_owned())
    }

    #[test]
    fn negative_read_offset_is_rejected_locally() {
        let image = stub();
        let mut buf = [0u8; 8];
        assert!(matches!(
            image.read(-1, &mut buf),
            Err(RadosError::NegativeArgument { name: "offset", value: -1 })
        ));
    }

    #[test]
    fn read_releases_its_buffer_borrow() {
        let image = stub();
        let mut buf = [0u8; 8];
        let result = image.read(-1, &mut buf);
        // The buffer must be usable again as soon as the call returns.
        assert_eq!(buf, [0u8; 8]);
        assert!(result.is_err());
    }

    #[test]
    fn negative_write_offset_is_rejected_locally() {
        let image = stub();
        assert!(matches!(
            image.write(b"data", -3),
            Err(RadosError::NegativeArgument { name: "offset", value: -3 })
        ));
    }

    #[test]
    fn negative_resize_size_is_rejected_locally() {
        let image = stub();
        assert!(matches!(
            image.resize(-1),
            Err(RadosError::NegativeArgument { name: "size", value: -1 })
        ));
    }

    #[test]
    fn close_on_released_handle_is_a_no_op() {
        let mut image = stub();
        assert!(image.close().is_ok());
        assert!(image.close().is_ok());
    }
}
