//! Safe bindings to the librbd C API, the block-device layer of a Ceph
//! cluster.
//!
//! [`Rbd`] binds to a pool through a [`ceph_rados::IoCtx`] and manages
//! images: create, clone, rename, remove, list. [`RbdImage`] is one open
//! image and carries the data path (read, write, resize) and the snapshot
//! family (create, protect, clone bookkeeping, flatten).
//!
//! Errors share [`RadosError`] with the object-store crate; both libraries
//! speak the same negative-errno convention.

pub mod sys;

mod image;
mod rbd;

pub use ceph_rados::{RadosError, Result};
pub use image::{ChildImage, ImageInfo, ImageParent, RbdImage, SnapInfo};
pub use rbd::Rbd;
pub use sys::RBD_FEATURE_LAYERING;
