//! End-to-end tests against a real cluster.
//!
//! Gated the same way as the object-store suite: set `CEPH_CONF_FILE` and
//! `CEPH_TEST_POOL`, otherwise every test is a silent pass.

use ceph_rados::Rados;
use ceph_rbd::{RBD_FEATURE_LAYERING, RadosError, Rbd};
use std::path::Path;

const MIB: i64 = 1 << 20;

fn connect() -> Option<(Rados, String)> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let conf = std::env::var("CEPH_CONF_FILE").ok()?;
    let pool = std::env::var("CEPH_TEST_POOL").ok()?;
    let mut cluster = Rados::new(std::env::var("CEPH_ID").ok().as_deref()).expect("create handle");
    cluster.conf_read_file(Path::new(&conf)).expect("read conf");
    cluster.connect().expect("connect");
    Some((cluster, pool))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{:08x}", rand::random::<u32>())
}

#[test]
fn image_data_round_trips_through_the_block_layer() {
    let Some((cluster, pool)) = connect() else {
        return;
    };
    let io = cluster.ioctx_create(&pool).expect("ioctx");
    let rbd = Rbd::new(&io);
    let name = unique("img");

    rbd.create(&name, 4 * MIB).expect("create");
    assert!(rbd.list().expect("list").contains(&name));

    {
        let image = rbd.open(&name, None).expect("open");
        assert_eq!(image.stat().expect("stat").size, 4 * MIB as u64);

        image.write(b"block payload", 0).expect("write");
        let mut buf = vec![0u8; 13];
        assert_eq!(image.read(0, &mut buf).expect("read"), 13);
        assert_eq!(&buf, b"block payload");

        image.resize(8 * MIB).expect("resize");
        assert_eq!(image.stat().expect("stat").size, 8 * MIB as u64);
    }

    rbd.remove(&name).expect("remove");
    assert!(!rbd.list().expect("list").contains(&name));
}

#[test]
fn rename_moves_an_image_within_the_pool() {
    let Some((cluster, pool)) = connect() else {
        return;
    };
    let io = cluster.ioctx_create(&pool).expect("ioctx");
    let rbd = Rbd::new(&io);
    let old = unique("img");
    let new = unique("img");

    rbd.create(&old, MIB).expect("create");
    rbd.rename(&old, &new).expect("rename");
    let names = rbd.list().expect("list");
    assert!(!names.contains(&old));
    assert!(names.contains(&new));

    rbd.remove(&new).expect("remove");
}

#[test]
fn clone_chain_survives_flattening_the_child() {
    let Some((cluster, pool)) = connect() else {
        return;
    };
    let io = cluster.ioctx_create(&pool).expect("ioctx");
    let rbd = Rbd::new(&io);
    let parent = unique("parent");
    let child = unique("child");

    rbd.create_with_features(&parent, 4 * MIB, RBD_FEATURE_LAYERING)
        .expect("create parent");
    {
        let image = rbd.open(&parent, None).expect("open parent");
        image.write(b"inherited bytes", 0).expect("write");
        image.snap_create("base").expect("snap_create");
        image.snap_protect("base").expect("snap_protect");
        assert!(image.snap_is_protected("base").expect("snap_is_protected"));

        rbd.clone_image(&parent, "base", &io, &child, RBD_FEATURE_LAYERING)
            .expect("clone");

        image.snap_set(Some("base")).expect("snap_set");
        image.snap_set(None).expect("snap_set back");
    }

    {
        let image = rbd.open(&child, None).expect("open child");
        let parent_info = image.stat().expect("stat").parent.expect("has parent");
        assert_eq!(parent_info.image_name, parent);

        let mut buf = vec![0u8; 15];
        image.read(0, &mut buf).expect("read");
        assert_eq!(&buf, b"inherited bytes");

        image.flatten().expect("flatten");
        assert!(image.stat().expect("stat").parent.is_none());
    }

    rbd.remove(&child).expect("remove child");
    {
        let image = rbd.open(&parent, None).expect("open parent");
        image.snap_unprotect("base").expect("snap_unprotect");
        image.snap_remove("base").expect("snap_remove");
        assert!(image.snap_list().expect("snap_list").is_empty());
    }
    rbd.remove(&parent).expect("remove parent");
}

#[test]
fn protected_snapshot_refuses_removal() {
    let Some((cluster, pool)) = connect() else {
        return;
    };
    let io = cluster.ioctx_create(&pool).expect("ioctx");
    let rbd = Rbd::new(&io);
    let name = unique("img");

    rbd.create_with_features(&name, MIB, RBD_FEATURE_LAYERING)
        .expect("create");
    {
        let image = rbd.open(&name, None).expect("open");
        image.snap_create("keep").expect("snap_create");
        image.snap_protect("keep").expect("snap_protect");

        assert!(matches!(
            image.snap_remove("keep"),
            Err(RadosError::Other(_) | RadosError::Permission(_))
        ));

        image.snap_unprotect("keep").expect("snap_unprotect");
        image.snap_remove("keep").expect("snap_remove");
    }
    rbd.remove(&name).expect("remove");
}
