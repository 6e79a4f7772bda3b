//! Pool-level image management: create, clone, rename, remove, open.

use crate::image::RbdImage;
use crate::sys::{self, LibRbd};
use ceph_rados::call::handle_code;
use ceph_rados::marshal::{self, MarshalResult};
use ceph_rados::{ErrorCode, IoCtx, RadosError, Result};
use libc::c_int;
use std::ptr;
use tracing::debug;

fn lib() -> Result<&'static LibRbd> {
    Ok(sys::librbd()?)
}

fn require_non_negative(name: &'static str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(RadosError::NegativeArgument { name, value });
    }
    Ok(())
}

/// The block-device client for one pool.
///
/// Borrows the pool's [`IoCtx`]; images it opens borrow it in turn.
pub struct Rbd<'pool> {
    ioctx: &'pool IoCtx<'pool>,
}

impl<'pool> Rbd<'pool> {
    /// Bind the block-device client to a pool.
    #[must_use]
    pub fn new(ioctx: &'pool IoCtx<'pool>) -> Self {
        Self { ioctx }
    }

    /// The (major, minor, extra) version of the loaded native library.
    pub fn version() -> Result<(i32, i32, i32)> {
        let lib = lib()?;
        let (mut major, mut minor, mut extra) = (0 as c_int, 0 as c_int, 0 as c_int);
        unsafe { (lib.rbd_version)(&mut major, &mut minor, &mut extra) };
        Ok((major, minor, extra))
    }

    /// Create an image of `size` bytes with default settings.
    pub fn create(&self, name: &str, size: i64) -> Result<()> {
        require_non_negative("size", size)?;
        let lib = lib()?;
        let mut order: c_int = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe {
                    (lib.rbd_create)(self.ioctx.raw(), name_c.as_ptr(), size as u64, &mut order)
                })
            },
            || format!("failed to create image {name} of {size} bytes"),
        )?;
        debug!(image = name, size, "created image");
        Ok(())
    }

    /// Create an image with an explicit feature mask (new-format image).
    pub fn create_with_features(&self, name: &str, size: i64, features: u64) -> Result<()> {
        require_non_negative("size", size)?;
        let lib = lib()?;
        let mut order: c_int = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe {
                    (lib.rbd_create2)(
                        self.ioctx.raw(),
                        name_c.as_ptr(),
                        size as u64,
                        features,
                        &mut order,
                    )
                })
            },
            || format!("failed to create image {name} of {size} bytes"),
        )?;
        debug!(image = name, size, features, "created image");
        Ok(())
    }

    /// Create an image with explicit features and striping parameters.
    pub fn create_with_striping(
        &self,
        name: &str,
        size: i64,
        features: u64,
        stripe_unit: u64,
        stripe_count: u64,
    ) -> Result<()> {
        require_non_negative("size", size)?;
        let lib = lib()?;
        let mut order: c_int = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe {
                    (lib.rbd_create3)(
                        self.ioctx.raw(),
                        name_c.as_ptr(),
                        size as u64,
                        features,
                        &mut order,
                        stripe_unit,
                        stripe_count,
                    )
                })
            },
            || format!("failed to create image {name} of {size} bytes"),
        )?;
        debug!(image = name, size, features, "created image");
        Ok(())
    }

    /// Clone a protected snapshot of an image in this pool into a child
    /// image, which may live in a different pool.
    ///
    /// `features` must include layering for the clone to be accepted.
    pub fn clone_image(
        &self,
        parent_name: &str,
        parent_snap: &str,
        child_pool: &IoCtx<'_>,
        child_name: &str,
        features: u64,
    ) -> Result<()> {
        let lib = lib()?;
        let mut order: c_int = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                let parent_c = marshal::cstring(parent_name)?;
                let snap_c = marshal::cstring(parent_snap)?;
                let child_c = marshal::cstring(child_name)?;
                Ok(unsafe {
                    (lib.rbd_clone)(
                        self.ioctx.raw(),
                        parent_c.as_ptr(),
                        snap_c.as_ptr(),
                        child_pool.raw(),
                        child_c.as_ptr(),
                        features,
                        &mut order,
                    )
                })
            },
            || format!("failed to clone {parent_name}@{parent_snap} into {child_name}"),
        )?;
        debug!(
            parent = parent_name,
            snapshot = parent_snap,
            child = child_name,
            "cloned image"
        );
        Ok(())
    }

    /// Clone a protected snapshot with explicit striping parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn clone_image_with_striping(
        &self,
        parent_name: &str,
        parent_snap: &str,
        child_pool: &IoCtx<'_>,
        child_name: &str,
        features: u64,
        stripe_unit: u64,
        stripe_count: u64,
    ) -> Result<()> {
        let lib = lib()?;
        let mut order: c_int = 0;
        handle_code(
            || -> MarshalResult<c_int> {
                let parent_c = marshal::cstring(parent_name)?;
                let snap_c = marshal::cstring(parent_snap)?;
                let child_c = marshal::cstring(child_name)?;
                Ok(unsafe {
                    (lib.rbd_clone2)(
                        self.ioctx.raw(),
                        parent_c.as_ptr(),
                        snap_c.as_ptr(),
                        child_pool.raw(),
                        child_c.as_ptr(),
                        features,
                        &mut order,
                        stripe_unit,
                        stripe_count,
                    )
                })
            },
            || format!("failed to clone {parent_name}@{parent_snap} into {child_name}"),
        )?;
        Ok(())
    }

    /// Remove an image from the pool.
    pub fn remove(&self, name: &str) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe { (lib.rbd_remove)(self.ioctx.raw(), name_c.as_ptr()) })
            },
            || format!("failed to remove image {name}"),
        )?;
        debug!(image = name, "removed image");
        Ok(())
    }

    /// Rename an image within the pool.
    pub fn rename(&self, src: &str, dst: &str) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let src_c = marshal::cstring(src)?;
                let dst_c = marshal::cstring(dst)?;
                Ok(unsafe { (lib.rbd_rename)(self.ioctx.raw(), src_c.as_ptr(), dst_c.as_ptr()) })
            },
            || format!("failed to rename image {src} to {dst}"),
        )?;
        debug!(from = src, to = dst, "renamed image");
        Ok(())
    }

    /// Names of every image in the pool.
    pub fn list(&self) -> Result<Vec<String>> {
        let lib = lib()?;
        let mut size: usize = 1024;
        loop {
            let mut buf = vec![0u8; size];
            let r = unsafe {
                (lib.rbd_list)(self.ioctx.raw(), buf.as_mut_ptr().cast(), &mut size)
            };
            // The native call reports the required buffer length through
            // `size` when the given one is too small.
            if r == ErrorCode::ERANGE.code() {
                continue;
            }
            handle_code(
                || -> MarshalResult<c_int> { Ok(r) },
                || "failed to list the images in the pool".to_owned(),
            )?;
            return Ok(marshal::packed_strings(&buf[..size.min(buf.len())]));
        }
    }

    /// Open an image, optionally at a snapshot, for reading and writing.
    pub fn open(&self, name: &str, snapshot: Option<&str>) -> Result<RbdImage<'pool>> {
        self.open_with(name, snapshot, false)
    }

    /// Open an image, optionally at a snapshot, read-only.
    pub fn open_read_only(&self, name: &str, snapshot: Option<&str>) -> Result<RbdImage<'pool>> {
        self.open_with(name, snapshot, true)
    }

    fn open_with(
        &self,
        name: &str,
        snapshot: Option<&str>,
        read_only: bool,
    ) -> Result<RbdImage<'pool>> {
        let lib = lib()?;
        let mut image: sys::rbd_image_t = ptr::null_mut();
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                let snap_c = snapshot.map(marshal::cstring).transpose()?;
                let snap_ptr = snap_c.as_ref().map_or(ptr::null(), |s| s.as_ptr());
                let open = if read_only {
                    lib.rbd_open_read_only
                } else {
                    lib.rbd_open
                };
                Ok(unsafe { open(self.ioctx.raw(), name_c.as_ptr(), &mut image, snap_ptr) })
            },
            || format!("failed to open image {name}"),
        )?;
        Ok(RbdImage::from_raw(image, name.to_owned()))
    }

    /// Close an open image.
    ///
    /// Dropping the image has the same effect; this exists for callers that
    /// want the release to be explicit and checked.
    pub fn close(&self, image: RbdImage<'_>) -> Result<()> {
        let mut image = image;
        image.close()
    }
}
