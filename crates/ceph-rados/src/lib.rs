//! Safe bindings to the librados C API of a Ceph cluster.
//!
//! The crate wraps the native object-store client behind owning Rust handles:
//! [`Rados`] for the cluster connection, [`IoCtx`] for per-pool I/O,
//! [`ListCtx`] for paged object listings and [`ReadOp`] for batched reads.
//! Every fallible native call funnels through one checked-call site that
//! classifies negative status codes into [`RadosError`] variants.
//!
//! The native library is resolved at runtime, so this crate builds and its
//! unit tests run on hosts without the library installed; operations then
//! fail with [`RadosError::Unavailable`].

pub mod call;
pub mod errors;
pub mod marshal;
pub mod sys;

mod cluster;
mod ioctx;
mod list;
mod readop;

pub use cluster::{ClusterStat, Rados};
pub use errors::{ErrorCode, NativeStatus, RadosError, Result, error_message, error_name};
pub use ioctx::{IoCtx, ObjectStat, PoolStat};
pub use list::ListCtx;
pub use readop::{ReadHandle, ReadOp};
