use std::path::{Path, PathBuf, MAIN_SEPARATOR};

pub const FAKE_DIR:         &str = "FAKETMP";
pub const FAKE_FILENAME:    &str = "fakefile.tmp";
pub const MOUNT_FILENAME:   &str = "testfile";

/// Where the filler file lives relative to a partition's mount point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillerLayout {
    /// `X:\FAKETMP\fakefile.tmp` under a drive-letter root.
    DriveRoot,
    /// `<mount>/testfile` directly under the mount point.
    MountRoot,
}

impl FillerLayout {
    pub fn native() -> Self {
        if cfg!(windows) { FillerLayout::DriveRoot } else { FillerLayout::MountRoot }
    }

    /// Deterministic filler path for a mount point.
    pub fn path_for(&self, mount_point: &str) -> PathBuf {
        match self {
            FillerLayout::DriveRoot => {
                let root = format!("{}{}", mount_point.trim_end_matches(['\\', '/']), MAIN_SEPARATOR);
                Path::new(&root).join(FAKE_DIR).join(FAKE_FILENAME)
            }
            FillerLayout::MountRoot => Path::new(mount_point).join(MOUNT_FILENAME),
        }
    }

    /// Filler path inside a user-owned directory on the same partition.
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(MOUNT_FILENAME)
    }

    /// The directory the layout creates on demand and may clean up afterwards.
    pub fn owned_dir<'a>(&self, filler: &'a Path) -> Option<&'a Path> {
        match self {
            FillerLayout::DriveRoot => filler
                .parent()
                .filter(|d| d.file_name().is_some_and(|n| n == FAKE_DIR)),
            FillerLayout::MountRoot => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn mount_root_paths() {
        let l = FillerLayout::MountRoot;
        assert_eq!(l.path_for("/"), PathBuf::from("/testfile"));
        assert_eq!(l.path_for("/Volumes/Data"), PathBuf::from("/Volumes/Data/testfile"));
        assert_eq!(l.path_for("/mnt/usb/"), PathBuf::from("/mnt/usb/testfile"));
        assert_eq!(l.owned_dir(&l.path_for("/mnt/usb")), None);
    }

    #[cfg(unix)]
    #[test]
    fn drive_root_paths_on_unix_separators() {
        let l = FillerLayout::DriveRoot;
        let p = l.path_for("/mnt/usb");
        assert_eq!(p, PathBuf::from("/mnt/usb/FAKETMP/fakefile.tmp"));
        assert_eq!(l.owned_dir(&p), Some(Path::new("/mnt/usb/FAKETMP")));
        assert_eq!(l.path_for("/"), PathBuf::from("/FAKETMP/fakefile.tmp"));
    }

    #[cfg(windows)]
    #[test]
    fn drive_root_paths() {
        let l = FillerLayout::DriveRoot;
        assert_eq!(l.path_for("C:"), PathBuf::from(r"C:\FAKETMP\fakefile.tmp"));
        assert_eq!(l.path_for(r"D:\"), PathBuf::from(r"D:\FAKETMP\fakefile.tmp"));
    }

    #[test]
    fn home_variant_uses_plain_filename() {
        let l = FillerLayout::MountRoot;
        assert_eq!(l.path_in(Path::new("home")), Path::new("home").join("testfile"));
    }
}
