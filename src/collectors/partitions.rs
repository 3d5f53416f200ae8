use crate::collectors::mounts::MountEntry;
use crate::models::partition::Partition;
use crate::sys;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Filesystems that never hold operator data.
const SKIP_FS: &[&str] = &[
    "proc", "sysfs", "devpts", "tmpfs", "devtmpfs", "cgroup", "cgroup2",
    "pstore", "efivarfs", "securityfs", "debugfs", "tracefs", "bpf",
    "hugetlbfs", "mqueue", "fusectl", "configfs", "binfmt_misc",
    "nsfs", "rpc_pipefs", "autofs", "squashfs", "ramfs", "devfs",
    "fdescfs", "procfs", "linprocfs", "nullfs",
];

const SKIP_MOUNT_PREFIX: &[&str] = &[
    "/proc", "/sys", "/dev", "/run/user", "/snap",
];

/// Source of partition snapshots. Every call re-reads the OS.
pub trait Inventory {
    fn partitions(&self) -> Vec<Partition>;
}

/// Reads the live system.
pub struct SystemInventory {
    pub mount_query_timeout: Duration,
}

impl Inventory for SystemInventory {
    fn partitions(&self) -> Vec<Partition> {
        list_partitions(self.mount_query_timeout)
    }
}

/// Canned snapshot for tests.
#[cfg(test)]
pub struct FixedInventory(pub Vec<Partition>);

#[cfg(test)]
impl Inventory for FixedInventory {
    fn partitions(&self) -> Vec<Partition> {
        self.0.clone()
    }
}

/// Enumerate real, locally mounted partitions with usage numbers.
///
/// Uses the OS mount table when the platform has one; otherwise probes a
/// fixed set of well-known roots. The two sources are never mixed.
pub fn list_partitions(timeout: Duration) -> Vec<Partition> {
    match sys::mount_table(timeout) {
        Some(entries) => {
            let real: Vec<MountEntry> = entries.into_iter().filter(is_real_mount).collect();
            stat_all(&real)
        }
        None => {
            log::info!("no mount table available, probing fallback roots");
            let mut parts = stat_all(&sys::fallback_roots());
            dedup_same_filesystem(&mut parts);
            parts
        }
    }
}

/// Whether a mount table row is a real, operator-relevant filesystem.
pub fn is_real_mount(entry: &MountEntry) -> bool {
    if SKIP_FS.contains(&entry.fs_type.as_str()) { return false; }
    if SKIP_MOUNT_PREFIX.iter().any(|p| under_prefix(&entry.mount, p)) { return false; }
    // Skip loop-mounted snaps
    if entry.device.starts_with("/dev/loop") && entry.mount.contains("/snap") { return false; }
    true
}

fn under_prefix(mount: &str, prefix: &str) -> bool {
    mount == prefix || mount.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

fn stat_all(entries: &[MountEntry]) -> Vec<Partition> {
    let mut out = Vec::new();
    for entry in entries {
        let root = sys::root_path(&entry.mount);
        // Single-file bind mounts (/etc/hosts in containers) are not partitions
        if !root.is_dir() {
            log::debug!("skipping {}: not a directory", entry.mount);
            continue;
        }
        match sys::space(&root) {
            Ok(space) => {
                let mut p = Partition::new(entry.mount.clone(), space.total, space.free);
                p.device  = entry.device.clone();
                p.fs_type = entry.fs_type.clone();
                p.label   = sys::volume_label(entry);
                out.push(p);
            }
            Err(e) => log::debug!("skipping {}: {e:#}", entry.mount),
        }
    }
    out
}

/// `/` and the home directory are often the same filesystem; keep the first.
fn dedup_same_filesystem(parts: &mut Vec<Partition>) {
    let mut seen_dev = HashSet::new();
    let mut seen_usage = HashSet::new();
    parts.retain(|p| match sys::device_id(Path::new(&p.mount_point)) {
        Some(dev) => seen_dev.insert(dev),
        None      => seen_usage.insert((p.total_bytes, p.free_bytes)),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(device: &str, mount: &str, fs_type: &str) -> MountEntry {
        MountEntry { device: device.into(), mount: mount.into(), fs_type: fs_type.into() }
    }

    #[test]
    fn pseudo_filesystems_are_skipped() {
        assert!(!is_real_mount(&entry("proc", "/proc", "proc")));
        assert!(!is_real_mount(&entry("tmpfs", "/run", "tmpfs")));
        assert!(!is_real_mount(&entry("devfs", "/dev", "devfs")));
        assert!(!is_real_mount(&entry("/dev/sda2", "/sys/firmware/efi", "vfat")));
        assert!(!is_real_mount(&entry("/dev/loop3", "/snap/core/1234", "ext4")));
    }

    #[test]
    fn real_filesystems_are_kept() {
        assert!(is_real_mount(&entry("/dev/sda1", "/", "ext4")));
        assert!(is_real_mount(&entry("overlay", "/", "overlay")));
        assert!(is_real_mount(&entry("/dev/nvme0n1p3", "/home", "btrfs")));
        assert!(is_real_mount(&entry("/dev/sdb1", "/devdata", "xfs")));
        assert!(is_real_mount(&entry("C:", "C:", "NTFS")));
    }

    #[test]
    fn inventory_usage_adds_up() {
        let parts = list_partitions(Duration::from_secs(5));
        for p in &parts {
            assert_eq!(p.used_bytes() + p.free_bytes, p.total_bytes, "{}", p.mount_point);
        }
    }

    #[cfg(unix)]
    #[test]
    fn stat_all_drops_missing_and_non_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        let mount = dir.path().to_string_lossy().into_owned();
        let rows = vec![
            entry("", &mount, "ext4"),
            entry("", &file.to_string_lossy(), "ext4"),
            entry("", "/definitely/not/mounted/here", "ext4"),
        ];
        let parts = stat_all(&rows);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].mount_point, mount);
        assert!(parts[0].total_bytes > 0);
    }

    #[cfg(unix)]
    #[test]
    fn fallback_dedups_shared_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::create_dir(&a).unwrap();
        std::fs::create_dir(&b).unwrap();
        let mut parts = vec![
            Partition::new(a.to_string_lossy(), 100, 50),
            Partition::new(b.to_string_lossy(), 100, 40),
        ];
        dedup_same_filesystem(&mut parts);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].mount_point, a.to_string_lossy());
    }
}
