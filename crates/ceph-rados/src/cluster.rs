//! The owning cluster-connection handle.

use crate::call::handle_code;
use crate::errors::{RadosError, Result};
use crate::ioctx::IoCtx;
use crate::marshal::{self, MarshalResult};
use crate::sys::{self, LibRados};
use libc::c_int;
use std::path::Path;
use std::ptr;
use tracing::debug;

/// Cluster-wide capacity statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterStat {
    pub kb: u64,
    pub kb_used: u64,
    pub kb_avail: u64,
    pub num_objects: u64,
}

/// An owning handle to a cluster connection.
///
/// The handle starts disconnected. Configuration (`conf_read_file`,
/// `conf_set`) is only legal before [`connect`](Rados::connect); everything
/// that talks to the cluster is only legal after it. The native resource is
/// released exactly once, on [`shutdown`](Rados::shutdown) or on drop.
///
/// Multiple handles may coexist; each owns an independent native connection.
/// A handle may move between threads but provides no internal
/// synchronization for concurrent use.
pub struct Rados {
    cluster: sys::rados_t,
    connected: bool,
}

// The handle owns its pointer exclusively; moving it between threads is fine.
unsafe impl Send for Rados {}

fn lib() -> Result<&'static LibRados> {
    Ok(sys::librados()?)
}

impl Rados {
    /// Create a disconnected cluster handle authenticating as `id`.
    pub fn new(id: Option<&str>) -> Result<Self> {
        let lib = lib()?;
        let mut cluster: sys::rados_t = ptr::null_mut();
        handle_code(
            || -> MarshalResult<c_int> {
                let id_c = id.map(marshal::cstring).transpose()?;
                let id_ptr = id_c.as_ref().map_or(ptr::null(), |s| s.as_ptr());
                Ok(unsafe { (lib.rados_create)(&mut cluster, id_ptr) })
            },
            || format!("failed to create a cluster handle for id {}", id.unwrap_or("(default)")),
        )?;
        debug!(id, "created cluster handle");
        Ok(Self {
            cluster,
            connected: false,
        })
    }

    /// Create a disconnected cluster handle for a named cluster and user.
    ///
    /// `flags` is reserved by the native library for future use.
    pub fn with_cluster_name(cluster_name: &str, user_name: &str, flags: u64) -> Result<Self> {
        let lib = lib()?;
        let mut cluster: sys::rados_t = ptr::null_mut();
        handle_code(
            || -> MarshalResult<c_int> {
                let cluster_c = marshal::cstring(cluster_name)?;
                let user_c = marshal::cstring(user_name)?;
                Ok(unsafe {
                    (lib.rados_create2)(&mut cluster, cluster_c.as_ptr(), user_c.as_ptr(), flags)
                })
            },
            || {
                format!(
                    "failed to create a cluster handle for cluster {cluster_name} as {user_name}"
                )
            },
        )?;
        debug!(cluster_name, user_name, "created cluster handle");
        Ok(Self {
            cluster,
            connected: false,
        })
    }

    /// Some operations are only legal connected, others only disconnected.
    fn verify_connected(&self, required: bool) -> Result<()> {
        if required && !self.connected {
            return Err(RadosError::Disconnected);
        }
        if !required && self.connected {
            return Err(RadosError::Connected);
        }
        Ok(())
    }

    /// Apply a configuration file to this (still disconnected) handle.
    pub fn conf_read_file(&self, path: &Path) -> Result<()> {
        self.verify_connected(false)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let path_c = std::ffi::CString::new(path.as_os_str().as_encoded_bytes())?;
                Ok(unsafe { (lib.rados_conf_read_file)(self.cluster, path_c.as_ptr()) })
            },
            || format!("failed reading configuration file {}", path.display()),
        )?;
        Ok(())
    }

    /// Set a configuration option on this (still disconnected) handle.
    pub fn conf_set(&self, option: &str, value: &str) -> Result<()> {
        self.verify_connected(false)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let option_c = marshal::cstring(option)?;
                let value_c = marshal::cstring(value)?;
                Ok(unsafe {
                    (lib.rados_conf_set)(self.cluster, option_c.as_ptr(), value_c.as_ptr())
                })
            },
            || format!("could not set configuration option {option}"),
        )?;
        Ok(())
    }

    /// Read back the value of a configuration option.
    pub fn conf_get(&self, option: &str) -> Result<String> {
        let lib = lib()?;
        let mut buf = [0u8; 256];
        handle_code(
            || -> MarshalResult<c_int> {
                let option_c = marshal::cstring(option)?;
                Ok(unsafe {
                    (lib.rados_conf_get)(
                        self.cluster,
                        option_c.as_ptr(),
                        buf.as_mut_ptr().cast(),
                        buf.len(),
                    )
                })
            },
            || format!("unable to retrieve the value of configuration option {option}"),
        )?;
        Ok(marshal::buf_to_string(&buf))
    }

    /// Connect to the cluster. Blocks until the connection is established.
    pub fn connect(&mut self) -> Result<()> {
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> { Ok(unsafe { (lib.rados_connect)(self.cluster) }) },
            || "the connection to the cluster failed".to_owned(),
        )?;
        self.connected = true;
        debug!("connected to cluster");
        Ok(())
    }

    /// Whether [`connect`](Rados::connect) has succeeded on this handle.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The cluster's unique fsid.
    pub fn cluster_fsid(&self) -> Result<String> {
        self.verify_connected(true)?;
        let lib = lib()?;
        let mut buf = [0u8; 64];
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe {
                    (lib.rados_cluster_fsid)(self.cluster, buf.as_mut_ptr().cast(), buf.len())
                })
            },
            || "unable to retrieve the cluster fsid".to_owned(),
        )?;
        Ok(marshal::buf_to_string(&buf))
    }

    /// Cluster-wide capacity statistics.
    pub fn cluster_stat(&self) -> Result<ClusterStat> {
        self.verify_connected(true)?;
        let lib = lib()?;
        let mut stat = sys::rados_cluster_stat_t::default();
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe { (lib.rados_cluster_stat)(self.cluster, &mut stat) })
            },
            || "failed retrieving the cluster stats".to_owned(),
        )?;
        Ok(ClusterStat {
            kb: stat.kb,
            kb_used: stat.kb_used,
            kb_avail: stat.kb_avail,
            num_objects: stat.num_objects,
        })
    }

    /// Create a pool with default settings.
    pub fn pool_create(&self, name: &str) -> Result<()> {
        self.verify_connected(true)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe { (lib.rados_pool_create)(self.cluster, name_c.as_ptr()) })
            },
            || format!("failed to create pool {name}"),
        )?;
        debug!(pool = name, "created pool");
        Ok(())
    }

    /// Create a pool owned by `auid`.
    pub fn pool_create_with_owner(&self, name: &str, auid: u64) -> Result<()> {
        self.verify_connected(true)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe {
                    (lib.rados_pool_create_with_auid)(self.cluster, name_c.as_ptr(), auid)
                })
            },
            || format!("failed to create pool {name} with owner {auid}"),
        )?;
        debug!(pool = name, auid, "created pool");
        Ok(())
    }

    /// Create a pool with a specific placement rule.
    pub fn pool_create_with_rule(&self, name: &str, crush_rule: u8) -> Result<()> {
        self.verify_connected(true)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe {
                    (lib.rados_pool_create_with_crush_rule)(
                        self.cluster,
                        name_c.as_ptr(),
                        crush_rule,
                    )
                })
            },
            || format!("failed to create pool {name} with rule {crush_rule}"),
        )?;
        debug!(pool = name, crush_rule, "created pool");
        Ok(())
    }

    /// Create a pool owned by `auid` with a specific placement rule.
    pub fn pool_create_with_owner_and_rule(
        &self,
        name: &str,
        auid: u64,
        crush_rule: u8,
    ) -> Result<()> {
        self.verify_connected(true)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe {
                    (lib.rados_pool_create_with_all)(self.cluster, name_c.as_ptr(), auid, crush_rule)
                })
            },
            || format!("failed to create pool {name} with owner {auid} and rule {crush_rule}"),
        )?;
        debug!(pool = name, auid, crush_rule, "created pool");
        Ok(())
    }

    /// Delete a pool and everything in it.
    pub fn pool_delete(&self, name: &str) -> Result<()> {
        self.verify_connected(true)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<c_int> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe { (lib.rados_pool_delete)(self.cluster, name_c.as_ptr()) })
            },
            || format!("failed to delete pool {name}"),
        )?;
        debug!(pool = name, "deleted pool");
        Ok(())
    }

    /// Names of every pool in the cluster.
    pub fn pool_list(&self) -> Result<Vec<String>> {
        self.verify_connected(true)?;
        let lib = lib()?;
        let mut buf = vec![0u8; 256];
        loop {
            let needed = handle_code(
                || -> MarshalResult<c_int> {
                    Ok(unsafe {
                        (lib.rados_pool_list)(self.cluster, buf.as_mut_ptr().cast(), buf.len())
                    })
                },
                || "could not list the pools".to_owned(),
            )? as usize;
            if needed <= buf.len() {
                return Ok(marshal::packed_strings(&buf[..needed]));
            }
            buf = vec![0u8; needed];
        }
    }

    /// The numeric id of the pool called `name`.
    pub fn pool_lookup(&self, name: &str) -> Result<i64> {
        self.verify_connected(true)?;
        let lib = lib()?;
        handle_code(
            || -> MarshalResult<i64> {
                let name_c = marshal::cstring(name)?;
                Ok(unsafe { (lib.rados_pool_lookup)(self.cluster, name_c.as_ptr()) })
            },
            || format!("could not fetch the id of pool {name}; does it exist?"),
        )
    }

    /// The name of the pool with numeric id `id`.
    pub fn pool_reverse_lookup(&self, id: i64) -> Result<String> {
        self.verify_connected(true)?;
        let lib = lib()?;
        let mut buf = [0u8; 512];
        handle_code(
            || -> MarshalResult<c_int> {
                Ok(unsafe {
                    (lib.rados_pool_reverse_lookup)(
                        self.cluster,
                        id,
                        buf.as_mut_ptr().cast(),
                        buf.len(),
                    )
                })
            },
            || format!("could not fetch the name of pool {id}; does it exist?"),
        )?;
        Ok(marshal::buf_to_string(&buf))
    }

    /// Open an I/O context scoped to `pool`.
    ///
    /// The returned context borrows this handle; the handle must outlive it.
    pub fn ioctx_create(&self, pool: &str) -> Result<IoCtx<'_>> {
        self.verify_connected(true)?;
        let lib = lib()?;
        let mut ioctx: sys::rados_ioctx_t = ptr::null_mut();
        handle_code(
            || -> MarshalResult<c_int> {
                let pool_c = marshal::cstring(pool)?;
                Ok(unsafe { (lib.rados_ioctx_create)(self.cluster, pool_c.as_ptr(), &mut ioctx) })
            },
            || format!("failed to create an I/O context for pool {pool}"),
        )?;
        Ok(IoCtx::from_raw(ioctx))
    }

    /// Destroy an I/O context created by this handle.
    ///
    /// Dropping the context has the same effect; this exists for callers
    /// that want the release to be explicit.
    pub fn ioctx_destroy(&self, ioctx: IoCtx<'_>) {
        drop(ioctx);
    }

    /// The globally unique id of this connection.
    pub fn instance_id(&self) -> Result<u64> {
        self.verify_connected(true)?;
        let lib = lib()?;
        Ok(unsafe { (lib.rados_get_instance_id)(self.cluster) })
    }

    /// The (major, minor, extra) version of the loaded native library.
    pub fn version() -> Result<(i32, i32, i32)> {
        let lib = lib()?;
        let (mut major, mut minor, mut extra) = (0 as c_int, 0 as c_int, 0 as c_int);
        unsafe { (lib.rados_version)(&mut major, &mut minor, &mut extra) };
        Ok((major, minor, extra))
    }

    /// Release the native connection.
    ///
    /// Safe to call more than once; the owned pointer is nulled on the first
    /// call so the resource cannot be released twice.
    pub fn shutdown(&mut self) {
        // A shut-down handle always reports disconnected, even when the
        // native resource was already released.
        self.connected = false;
        if self.cluster.is_null() {
            return;
        }
        if let Ok(lib) = sys::librados() {
            unsafe { (lib.rados_shutdown)(self.cluster) };
        }
        self.cluster = ptr::null_mut();
        debug!("cluster handle shut down");
    }
}

impl Drop for Rados {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A handle that never touches the native library; only the local state
    // checks may run against it.
    fn stub(connected: bool) -> Rados {
        Rados {
            cluster: ptr::null_mut(),
            connected,
        }
    }

    #[test]
    fn config_mutation_fails_once_connected() {
        let cluster = stub(true);
        assert!(matches!(
            cluster.conf_set("mon_host", "10.0.0.1"),
            Err(RadosError::Connected)
        ));
        assert!(matches!(
            cluster.conf_read_file(Path::new("/etc/ceph/ceph.conf")),
            Err(RadosError::Connected)
        ));
    }

    #[test]
    fn cluster_operations_fail_until_connected() {
        let cluster = stub(false);
        assert!(matches!(
            cluster.pool_create("data"),
            Err(RadosError::Disconnected)
        ));
        assert!(matches!(
            cluster.pool_list(),
            Err(RadosError::Disconnected)
        ));
        assert!(matches!(
            cluster.cluster_fsid(),
            Err(RadosError::Disconnected)
        ));
        assert!(matches!(
            cluster.instance_id(),
            Err(RadosError::Disconnected)
        ));
        assert!(matches!(
            cluster.ioctx_create("data"),
            Err(RadosError::Disconnected)
        ));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut cluster = stub(true);
        cluster.shutdown();
        assert!(!cluster.is_connected());
        // A second shutdown and the drop at end of scope are both no-ops.
        cluster.shutdown();
    }
}
