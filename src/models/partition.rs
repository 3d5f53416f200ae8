use crate::util::human::fmt_gb;
use std::fmt;

/// One mounted partition with a point-in-time usage snapshot.
///
/// Stale as soon as anything writes to the filesystem; callers re-query
/// the inventory instead of holding on to these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub mount_point: String,
    pub device:      String,
    pub fs_type:     String,
    pub label:       String,
    pub total_bytes: u64,
    /// Bytes available to the invoking user.
    pub free_bytes:  u64,
}

impl Partition {
    pub fn new(mount_point: impl Into<String>, total_bytes: u64, free_bytes: u64) -> Self {
        Self {
            mount_point: mount_point.into(),
            device:      String::new(),
            fs_type:     String::new(),
            label:       String::new(),
            total_bytes,
            free_bytes:  free_bytes.min(total_bytes),
        }
    }

    pub fn used_bytes(&self) -> u64 {
        self.total_bytes - self.free_bytes
    }

    pub fn use_pct(&self) -> f64 {
        if self.total_bytes == 0 { return 0.0; }
        self.used_bytes() as f64 / self.total_bytes as f64 * 100.0
    }

    /// Free space in whole MiB, truncated.
    pub fn free_mb(&self) -> u64 {
        self.free_bytes / crate::util::human::MIB
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  | total: {} | used: {} | free: {}",
            self.mount_point,
            fmt_gb(self.total_bytes),
            fmt_gb(self.used_bytes()),
            fmt_gb(self.free_bytes),
        )?;
        if !self.label.is_empty() {
            write!(f, "  [{}]", self.label)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_is_total_minus_free() {
        let p = Partition::new("/data", 100_000_000_000, 20_000_000_000);
        assert_eq!(p.used_bytes(), 80_000_000_000);
        assert_eq!(p.used_bytes() + p.free_bytes, p.total_bytes);
    }

    #[test]
    fn free_is_clamped_to_total() {
        let p = Partition::new("/odd", 10, 25);
        assert_eq!(p.free_bytes, 10);
        assert_eq!(p.used_bytes(), 0);
    }

    #[test]
    fn free_mb_truncates() {
        let p = Partition::new("/data", 100_000_000_000, 20_000_000_000);
        assert_eq!(p.free_mb(), 19073);
    }

    #[test]
    fn display_includes_label_when_present() {
        let mut p = Partition::new("/mnt/usb", 2 * 1_073_741_824, 1_073_741_824);
        assert_eq!(p.to_string(), "/mnt/usb  | total: 2.00 GB | used: 1.00 GB | free: 1.00 GB");
        p.label = "BACKUP".into();
        assert!(p.to_string().ends_with("[BACKUP]"));
    }
}
