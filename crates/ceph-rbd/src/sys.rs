//! Native symbol table for librbd.
//!
//! Resolved at runtime like the object-store table, from the block-device
//! client library that ships alongside it.

use ceph_rados::symbol_table;
use ceph_rados::sys::{LoadError, open_shared_library, rados_ioctx_t};
use libc::{c_char, c_int, c_void};
use std::sync::LazyLock;

/// Opaque handle to an open image.
#[allow(non_camel_case_types)]
pub type rbd_image_t = *mut c_void;

/// Copy-on-write cloning of snapshots into child images.
pub const RBD_FEATURE_LAYERING: u64 = 1;

/// Image metadata, as written by `rbd_stat`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(non_camel_case_types)]
pub struct rbd_image_info_t {
    pub size: u64,
    pub obj_size: u64,
    pub num_objs: u64,
    pub order: c_int,
    pub block_name_prefix: [c_char; 24],
    pub parent_pool: i64,
    pub parent_name: [c_char; 96],
}

impl rbd_image_info_t {
    /// An all-zero value for the native call to fill in.
    #[must_use]
    pub fn zeroed() -> Self {
        // Plain scalar and array fields; the all-zero bit pattern is valid.
        unsafe { std::mem::zeroed() }
    }
}

/// One snapshot entry, as written by `rbd_snap_list`.
///
/// The `name` pointer is owned by the native list and is only valid until
/// `rbd_snap_list_end` is called on the backing array.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(non_camel_case_types)]
pub struct rbd_snap_info_t {
    pub id: u64,
    pub size: u64,
    pub name: *const c_char,
}

impl rbd_snap_info_t {
    #[must_use]
    pub fn zeroed() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

symbol_table! {
    /// Every librbd entry point this binding marshals into.
    pub struct LibRbd {
        fn rbd_version(major: *mut c_int, minor: *mut c_int, extra: *mut c_int);
        fn rbd_create(
            io: rados_ioctx_t,
            name: *const c_char,
            size: u64,
            order: *mut c_int,
        ) -> c_int;
        fn rbd_create2(
            io: rados_ioctx_t,
            name: *const c_char,
            size: u64,
            features: u64,
            order: *mut c_int,
        ) -> c_int;
        fn rbd_create3(
            io: rados_ioctx_t,
            name: *const c_char,
            size: u64,
            features: u64,
            order: *mut c_int,
            stripe_unit: u64,
            stripe_count: u64,
        ) -> c_int;
        fn rbd_clone(
            p_ioctx: rados_ioctx_t,
            p_name: *const c_char,
            p_snap_name: *const c_char,
            c_ioctx: rados_ioctx_t,
            c_name: *const c_char,
            features: u64,
            c_order: *mut c_int,
        ) -> c_int;
        fn rbd_clone2(
            p_ioctx: rados_ioctx_t,
            p_name: *const c_char,
            p_snap_name: *const c_char,
            c_ioctx: rados_ioctx_t,
            c_name: *const c_char,
            features: u64,
            c_order: *mut c_int,
            stripe_unit: u64,
            stripe_count: u64,
        ) -> c_int;
        fn rbd_remove(io: rados_ioctx_t, name: *const c_char) -> c_int;
        fn rbd_rename(
            io: rados_ioctx_t,
            srcname: *const c_char,
            destname: *const c_char,
        ) -> c_int;
        fn rbd_list(io: rados_ioctx_t, names: *mut c_char, size: *mut usize) -> c_int;
        fn rbd_open(
            io: rados_ioctx_t,
            name: *const c_char,
            image: *mut rbd_image_t,
            snap_name: *const c_char,
        ) -> c_int;
        fn rbd_open_read_only(
            io: rados_ioctx_t,
            name: *const c_char,
            image: *mut rbd_image_t,
            snap_name: *const c_char,
        ) -> c_int;
        fn rbd_close(image: rbd_image_t) -> c_int;
        fn rbd_stat(image: rbd_image_t, info: *mut rbd_image_info_t, infosize: usize) -> c_int;
        fn rbd_get_old_format(image: rbd_image_t, old: *mut u8) -> c_int;
        fn rbd_read(image: rbd_image_t, ofs: u64, len: usize, buf: *mut c_char) -> isize;
        fn rbd_write(image: rbd_image_t, ofs: u64, len: usize, buf: *const c_char) -> isize;
        fn rbd_resize(image: rbd_image_t, size: u64) -> c_int;
        fn rbd_flatten(image: rbd_image_t) -> c_int;
        fn rbd_copy2(src: rbd_image_t, dest: rbd_image_t) -> c_int;
        fn rbd_snap_create(image: rbd_image_t, snapname: *const c_char) -> c_int;
        fn rbd_snap_remove(image: rbd_image_t, snapname: *const c_char) -> c_int;
        fn rbd_snap_protect(image: rbd_image_t, snapname: *const c_char) -> c_int;
        fn rbd_snap_unprotect(image: rbd_image_t, snapname: *const c_char) -> c_int;
        fn rbd_snap_is_protected(
            image: rbd_image_t,
            snapname: *const c_char,
            is_protected: *mut c_int,
        ) -> c_int;
        fn rbd_snap_set(image: rbd_image_t, snapname: *const c_char) -> c_int;
        fn rbd_snap_list(
            image: rbd_image_t,
            snaps: *mut rbd_snap_info_t,
            max_snaps: *mut c_int,
        ) -> c_int;
        fn rbd_snap_list_end(snaps: *mut rbd_snap_info_t);
        fn rbd_list_children(
            image: rbd_image_t,
            pools: *mut c_char,
            pools_len: *mut usize,
            images: *mut c_char,
            images_len: *mut usize,
        ) -> c_int;
    }
}

impl LibRbd {
    fn load() -> Result<Self, LoadError> {
        let library = open_shared_library(&["librbd.so.1", "librbd.so", "librbd.dylib"])?;
        Self::resolve(library).map_err(|e| LoadError(format!("librbd: {e}")))
    }
}

static LIBRBD: LazyLock<Result<LibRbd, LoadError>> = LazyLock::new(LibRbd::load);

/// The process-wide librbd symbol table.
pub fn librbd() -> Result<&'static LibRbd, LoadError> {
    LIBRBD.as_ref().map_err(Clone::clone)
}
