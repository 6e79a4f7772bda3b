//! Native symbol table for librados.
//!
//! Entry points are resolved at runtime from the shared library, the way the
//! native layer is actually deployed (there is no compile-time linkage, so
//! this crate builds and its unit tests run on hosts without Ceph installed).
//! The resolved table is cached for the process lifetime; a missing library
//! or symbol surfaces as a [`LoadError`], never a panic.

use libc::{c_char, c_int, c_uint, c_void, time_t};
use std::sync::LazyLock;
use thiserror::Error;

/// Opaque handle to a cluster connection.
#[allow(non_camel_case_types)]
pub type rados_t = *mut c_void;

/// Opaque handle to a pool I/O context.
#[allow(non_camel_case_types)]
pub type rados_ioctx_t = *mut c_void;

/// Opaque handle to an object-list iterator.
#[allow(non_camel_case_types)]
pub type rados_list_ctx_t = *mut c_void;

/// Opaque handle to a batched read operation.
#[allow(non_camel_case_types)]
pub type rados_read_op_t = *mut c_void;

/// Numeric snapshot id.
#[allow(non_camel_case_types)]
pub type rados_snap_t = u64;

/// Flag value for `rados_read_op_operate` when no flags apply.
pub const LIBRADOS_OPERATION_NOFLAG: c_int = 0;

/// Cluster-wide capacity statistics, as written by `rados_cluster_stat`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
#[allow(non_camel_case_types)]
pub struct rados_cluster_stat_t {
    pub kb: u64,
    pub kb_used: u64,
    pub kb_avail: u64,
    pub num_objects: u64,
}

/// Per-pool usage counters, as written by `rados_ioctx_pool_stat`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
#[allow(non_camel_case_types)]
pub struct rados_pool_stat_t {
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

/// The shared library or one of its symbols could not be resolved.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct LoadError(pub String);

/// Open the first loadable candidate shared object.
pub fn open_shared_library(candidates: &[&str]) -> Result<libloading::Library, LoadError> {
    let mut last_error = String::new();
    for name in candidates {
        // Loading a shared object runs its initializers; that is the deal
        // with any dynamic library and is what the native layer expects.
        match unsafe { libloading::Library::new(name) } {
            Ok(lib) => return Ok(lib),
            Err(e) => last_error = format!("{name}: {e}"),
        }
    }
    Err(LoadError(last_error))
}

/// Declare a struct of resolved `unsafe extern "C"` function pointers, one
/// field per native entry point, plus a `resolve` constructor that looks
/// every symbol up out of an open [`libloading::Library`].
#[macro_export]
macro_rules! symbol_table {
    (
        $(#[$meta:meta])*
        $vis:vis struct $table:ident {
            $(fn $sym:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;)*
        }
    ) => {
        $(#[$meta])*
        $vis struct $table {
            $(pub $sym: unsafe extern "C" fn($($ty),*) $(-> $ret)?,)*
            /// Keeps the shared object mapped for as long as the table lives.
            _library: ::libloading::Library,
        }

        impl $table {
            fn resolve(
                library: ::libloading::Library,
            ) -> ::std::result::Result<Self, ::libloading::Error> {
                $(
                    let $sym = unsafe {
                        *library.get::<unsafe extern "C" fn($($ty),*) $(-> $ret)?>(
                            concat!(stringify!($sym), "\0").as_bytes(),
                        )?
                    };
                )*
                Ok(Self {
                    $($sym,)*
                    _library: library,
                })
            }
        }
    };
}

symbol_table! {
    /// Every librados entry point this binding marshals into.
    pub struct LibRados {
        fn rados_version(major: *mut c_int, minor: *mut c_int, extra: *mut c_int);
        fn rados_create(cluster: *mut rados_t, id: *const c_char) -> c_int;
        fn rados_create2(
            cluster: *mut rados_t,
            clustername: *const c_char,
            name: *const c_char,
            flags: u64,
        ) -> c_int;
        fn rados_conf_read_file(cluster: rados_t, path: *const c_char) -> c_int;
        fn rados_conf_set(
            cluster: rados_t,
            option: *const c_char,
            value: *const c_char,
        ) -> c_int;
        fn rados_conf_get(
            cluster: rados_t,
            option: *const c_char,
            buf: *mut c_char,
            len: usize,
        ) -> c_int;
        fn rados_connect(cluster: rados_t) -> c_int;
        fn rados_shutdown(cluster: rados_t);
        fn rados_cluster_fsid(cluster: rados_t, buf: *mut c_char, len: usize) -> c_int;
        fn rados_cluster_stat(cluster: rados_t, result: *mut rados_cluster_stat_t) -> c_int;
        fn rados_pool_create(cluster: rados_t, pool_name: *const c_char) -> c_int;
        fn rados_pool_create_with_auid(
            cluster: rados_t,
            pool_name: *const c_char,
            auid: u64,
        ) -> c_int;
        fn rados_pool_create_with_crush_rule(
            cluster: rados_t,
            pool_name: *const c_char,
            crush_rule_num: u8,
        ) -> c_int;
        fn rados_pool_create_with_all(
            cluster: rados_t,
            pool_name: *const c_char,
            auid: u64,
            crush_rule_num: u8,
        ) -> c_int;
        fn rados_pool_delete(cluster: rados_t, pool_name: *const c_char) -> c_int;
        fn rados_pool_list(cluster: rados_t, buf: *mut c_char, len: usize) -> c_int;
        fn rados_pool_lookup(cluster: rados_t, pool_name: *const c_char) -> i64;
        fn rados_pool_reverse_lookup(
            cluster: rados_t,
            id: i64,
            buf: *mut c_char,
            len: usize,
        ) -> c_int;
        fn rados_get_instance_id(cluster: rados_t) -> u64;
        fn rados_ioctx_create(
            cluster: rados_t,
            pool_name: *const c_char,
            ioctx: *mut rados_ioctx_t,
        ) -> c_int;
        fn rados_ioctx_destroy(ioctx: rados_ioctx_t);
        fn rados_ioctx_get_id(ioctx: rados_ioctx_t) -> i64;
        fn rados_ioctx_pool_set_auid(ioctx: rados_ioctx_t, auid: u64) -> c_int;
        fn rados_ioctx_pool_get_auid(ioctx: rados_ioctx_t, auid: *mut u64) -> c_int;
        fn rados_ioctx_get_pool_name(
            ioctx: rados_ioctx_t,
            buf: *mut c_char,
            maxlen: c_uint,
        ) -> c_int;
        fn rados_ioctx_locator_set_key(ioctx: rados_ioctx_t, key: *const c_char);
        fn rados_ioctx_pool_stat(ioctx: rados_ioctx_t, stats: *mut rados_pool_stat_t) -> c_int;
        fn rados_objects_list_open(ioctx: rados_ioctx_t, ctx: *mut rados_list_ctx_t) -> c_int;
        fn rados_objects_list_next(
            ctx: rados_list_ctx_t,
            entry: *mut *const c_char,
            key: *mut *const c_char,
        ) -> c_int;
        fn rados_objects_list_close(ctx: rados_list_ctx_t);
        fn rados_write(
            ioctx: rados_ioctx_t,
            oid: *const c_char,
            buf: *const c_char,
            len: usize,
            off: u64,
        ) -> c_int;
        fn rados_write_full(
            ioctx: rados_ioctx_t,
            oid: *const c_char,
            buf: *const c_char,
            len: usize,
        ) -> c_int;
        fn rados_append(
            ioctx: rados_ioctx_t,
            oid: *const c_char,
            buf: *const c_char,
            len: usize,
        ) -> c_int;
        fn rados_read(
            ioctx: rados_ioctx_t,
            oid: *const c_char,
            buf: *mut c_char,
            len: usize,
            off: u64,
        ) -> c_int;
        fn rados_remove(ioctx: rados_ioctx_t, oid: *const c_char) -> c_int;
        fn rados_trunc(ioctx: rados_ioctx_t, oid: *const c_char, size: u64) -> c_int;
        fn rados_clone_range(
            ioctx: rados_ioctx_t,
            dst: *const c_char,
            dst_off: u64,
            src: *const c_char,
            src_off: u64,
            len: usize,
        ) -> c_int;
        fn rados_stat(
            ioctx: rados_ioctx_t,
            oid: *const c_char,
            size: *mut u64,
            mtime: *mut time_t,
        ) -> c_int;
        fn rados_ioctx_snap_create(ioctx: rados_ioctx_t, snapname: *const c_char) -> c_int;
        fn rados_ioctx_snap_remove(ioctx: rados_ioctx_t, snapname: *const c_char) -> c_int;
        fn rados_ioctx_snap_lookup(
            ioctx: rados_ioctx_t,
            snapname: *const c_char,
            id: *mut rados_snap_t,
        ) -> c_int;
        fn rados_ioctx_snap_get_name(
            ioctx: rados_ioctx_t,
            id: rados_snap_t,
            name: *mut c_char,
            maxlen: c_int,
        ) -> c_int;
        fn rados_ioctx_snap_get_stamp(
            ioctx: rados_ioctx_t,
            id: rados_snap_t,
            time: *mut time_t,
        ) -> c_int;
        fn rados_ioctx_snap_list(
            ioctx: rados_ioctx_t,
            snaps: *mut rados_snap_t,
            maxlen: c_int,
        ) -> c_int;
        fn rados_create_read_op() -> rados_read_op_t;
        fn rados_release_read_op(read_op: rados_read_op_t);
        fn rados_read_op_read(
            read_op: rados_read_op_t,
            offset: u64,
            len: usize,
            buf: *mut c_char,
            bytes_read: *mut usize,
            prval: *mut c_int,
        );
        fn rados_read_op_operate(
            read_op: rados_read_op_t,
            ioctx: rados_ioctx_t,
            oid: *const c_char,
            flags: c_int,
        ) -> c_int;
    }
}

impl LibRados {
    fn load() -> Result<Self, LoadError> {
        let library = open_shared_library(&["librados.so.2", "librados.so", "librados.dylib"])?;
        Self::resolve(library).map_err(|e| LoadError(format!("librados: {e}")))
    }
}

static LIBRADOS: LazyLock<Result<LibRados, LoadError>> = LazyLock::new(LibRados::load);

/// The process-wide librados symbol table.
pub fn librados() -> Result<&'static LibRados, LoadError> {
    LIBRADOS.as_ref().map_err(Clone::clone)
}
