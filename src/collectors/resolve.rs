use crate::models::partition::Partition;
use crate::sys;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Find the partition in `partitions` that contains `path`.
///
/// Order of evidence: device identity when it singles out one mount point,
/// then the platform's own mount query, then the longest mount-point prefix.
pub fn partition_for_path(path: &Path, partitions: &[Partition], timeout: Duration) -> Option<Partition> {
    let path = canonical(path);

    let by_device: Vec<&Partition> = match sys::device_id(&path) {
        Some(dev) => partitions
            .iter()
            .filter(|p| sys::device_id(&sys::root_path(&p.mount_point)) == Some(dev))
            .collect(),
        None => Vec::new(),
    };
    if let [only] = by_device.as_slice() {
        return Some((*only).clone());
    }

    let pool: Vec<&Partition> = if by_device.is_empty() {
        partitions.iter().collect()
    } else {
        by_device
    };

    if let Some(mp) = sys::native_mount_point(&path, timeout) {
        let want = fold_case(&sys::root_path(&mp));
        if let Some(p) = pool.iter().find(|p| fold_case(&sys::root_path(&p.mount_point)) == want) {
            return Some((*p).clone());
        }
        log::debug!("native mount point {mp} for {} is not a listed partition", path.display());
    }

    longest_prefix(&path, &pool)
        .or_else(|| longest_prefix(&path, &partitions.iter().collect::<Vec<_>>()))
        .cloned()
}

/// Partition whose mount point is the deepest component-wise prefix of `path`.
pub fn longest_prefix<'a>(path: &Path, pool: &[&'a Partition]) -> Option<&'a Partition> {
    let path = fold_case(path);
    pool.iter()
        .copied()
        .filter(|p| path.starts_with(fold_case(&sys::root_path(&p.mount_point))))
        .max_by_key(|p| sys::root_path(&p.mount_point).components().count())
}

/// Absolute, symlink-resolved form of `path` where that is possible.
fn canonical(path: &Path) -> PathBuf {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map(|d| d.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };
    match std::fs::canonicalize(&abs) {
        Ok(c)  => strip_verbatim(c),
        Err(_) => abs,
    }
}

/// Windows canonical paths come back as `\\?\C:\...`, which never prefix-match `C:\`.
fn strip_verbatim(p: PathBuf) -> PathBuf {
    match p.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
        Some(rest) => PathBuf::from(rest),
        None       => p,
    }
}

fn fold_case(p: &Path) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(p.to_string_lossy().to_lowercase())
    } else {
        p.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(mount: &str) -> Partition {
        Partition::new(mount, 1000, 500)
    }

    #[cfg(unix)]
    #[test]
    fn prefix_prefers_deepest_mount() {
        let parts = [part("/"), part("/home"), part("/home/alice/data")];
        let pool: Vec<&Partition> = parts.iter().collect();
        let hit = longest_prefix(Path::new("/home/alice/data/x.bin"), &pool).unwrap();
        assert_eq!(hit.mount_point, "/home/alice/data");
        let hit = longest_prefix(Path::new("/home/alice/notes"), &pool).unwrap();
        assert_eq!(hit.mount_point, "/home");
        let hit = longest_prefix(Path::new("/var/log"), &pool).unwrap();
        assert_eq!(hit.mount_point, "/");
    }

    #[cfg(unix)]
    #[test]
    fn prefix_matches_whole_components_only() {
        let parts = [part("/mnt/data")];
        let pool: Vec<&Partition> = parts.iter().collect();
        assert!(longest_prefix(Path::new("/mnt/database/file"), &pool).is_none());
        assert!(longest_prefix(Path::new("/mnt/data"), &pool).is_some());
        assert!(longest_prefix(Path::new("/mnt/data/"), &pool).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn resolves_path_inside_listed_mount() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("nested");
        std::fs::create_dir(&inner).unwrap();
        let mount = std::fs::canonicalize(dir.path()).unwrap();
        let parts = [Partition::new(mount.to_string_lossy(), 1000, 500)];
        let hit = partition_for_path(&inner, &parts, Duration::from_secs(5)).unwrap();
        assert_eq!(hit.mount_point, mount.to_string_lossy());
    }

    #[cfg(unix)]
    #[test]
    fn sibling_mounts_on_one_device_resolve_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        let (a, b) = (root.join("a"), root.join("b"));
        std::fs::create_dir(&a).unwrap();
        std::fs::create_dir_all(b.join("x")).unwrap();
        let parts = [
            Partition::new(a.to_string_lossy(), 1000, 500),
            Partition::new(b.to_string_lossy(), 1000, 500),
        ];
        assert_eq!(sys::device_id(&a), sys::device_id(&b));

        let hit = partition_for_path(&b.join("x"), &parts, Duration::from_secs(5)).unwrap();
        assert_eq!(hit.mount_point, b.to_string_lossy());
        let hit = partition_for_path(&a, &parts, Duration::from_secs(5)).unwrap();
        assert_eq!(hit.mount_point, a.to_string_lossy());
    }

    #[cfg(unix)]
    #[test]
    fn unrelated_path_is_not_found() {
        let parts = [part("/definitely/not/mounted")];
        assert!(partition_for_path(Path::new("/tmp"), &parts, Duration::from_secs(5)).is_none());
    }

    #[test]
    fn verbatim_prefix_is_stripped() {
        assert_eq!(strip_verbatim(PathBuf::from(r"\\?\C:\Users")), PathBuf::from(r"C:\Users"));
        assert_eq!(strip_verbatim(PathBuf::from("/usr")), PathBuf::from("/usr"));
    }
}
