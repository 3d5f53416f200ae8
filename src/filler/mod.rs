pub mod strategy;
pub mod layout;

use crate::collectors::partitions::Inventory;
use crate::collectors::resolve::partition_for_path;
use crate::error::FillError;
use crate::models::partition::Partition;
use crate::sys;
use crate::util::human::{fmt_bytes, MIB};
use strategy::{AllocError, Allocate};
use layout::FillerLayout;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// MiB to allocate so that `reserve_mb` MiB stay free.
pub fn fill_size_mb(free_bytes: u64, reserve_mb: u64) -> Result<u64, FillError> {
    let free_mb = free_bytes / MIB;
    if free_mb <= reserve_mb {
        return Err(FillError::InsufficientSpace { free_mb, reserve_mb });
    }
    Ok(free_mb - reserve_mb)
}

/// Creates, finds and deletes filler files.
pub struct Filler {
    inventory: Box<dyn Inventory>,
    allocator: Box<dyn Allocate>,
    layout:    FillerLayout,
    mount_query_timeout: Duration,
    home:      Option<PathBuf>,
}

impl Filler {
    pub fn new(
        inventory: Box<dyn Inventory>,
        allocator: Box<dyn Allocate>,
        layout: FillerLayout,
        mount_query_timeout: Duration,
    ) -> Self {
        Self {
            inventory,
            allocator,
            layout,
            mount_query_timeout,
            home: dirs::home_dir(),
        }
    }

    /// Home directory used as the writable stand-in for a read-only mount root.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn inventory(&self) -> &dyn Inventory {
        self.inventory.as_ref()
    }

    /// Fresh snapshot of the partition containing `path`.
    pub fn partition_for(&self, path: &Path) -> Option<Partition> {
        partition_for_path(path, &self.inventory.partitions(), self.mount_query_timeout)
    }

    /// Where `fill` would put the filler for `partition`.
    pub fn target_path(&self, partition: &Partition) -> PathBuf {
        let primary = self.layout.path_for(&partition.mount_point);
        if self.layout != FillerLayout::MountRoot
            || sys::is_writable(&sys::root_path(&partition.mount_point))
        {
            return primary;
        }
        match self.home_on(partition, &self.inventory.partitions()) {
            Some(home) => self.layout.path_in(&home),
            None       => primary,
        }
    }

    /// Fill the partition holding `target` so that about `reserve_mb` MB stay free.
    pub fn fill(&self, target: &Path, reserve_mb: u64) -> Result<PathBuf, FillError> {
        let part = self
            .partition_for(target)
            .ok_or_else(|| FillError::PartitionNotFound(target.to_path_buf()))?;

        let fill_mb = fill_size_mb(part.free_bytes, reserve_mb)?;
        let path = self.target_path(&part);
        let failed = |reason: String| FillError::AllocationFailed { path: path.clone(), reason };

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| failed(format!("cannot create {}: {e}", parent.display())))?;
                log::info!("created directory {}", parent.display());
            }
        }

        let len = fill_mb * MIB;
        log::info!("filling {} with {} ({} MB) at {}", part.mount_point, fmt_bytes(len), fill_mb, path.display());
        match self.allocator.allocate(&path, len) {
            Ok(()) => Ok(path),
            Err(AllocError::TimedOut(timeout)) => Err(FillError::AllocationTimeout { path, timeout }),
            Err(AllocError::Unavailable(reason)) | Err(AllocError::Failed(reason)) => {
                Err(FillError::AllocationFailed { path, reason })
            }
        }
    }

    /// Delete a filler file and, where the layout owns it, its emptied directory.
    pub fn remove(&self, path: &Path) -> Result<String, FillError> {
        let size = match fs::metadata(path) {
            Ok(m) if m.is_file() => m.len(),
            _ => return Err(FillError::RemovalNotFound(path.to_path_buf())),
        };

        fs::remove_file(path).map_err(|source| FillError::RemovalFailed { path: path.to_path_buf(), source })?;
        log::info!("deleted {}", path.display());

        if let Some(dir) = self.layout.owned_dir(path) {
            let empty = fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(false);
            if empty {
                match fs::remove_dir(dir) {
                    Ok(())  => log::info!("removed empty directory {}", dir.display()),
                    Err(e)  => log::debug!("left {} in place: {e}", dir.display()),
                }
            }
        }

        Ok(format!("released {} ({})", fmt_bytes(size), path.display()))
    }

    /// Existing filler files at the known paths of every mounted partition.
    ///
    /// A file reachable through several mount points (bind mounts) is listed once.
    pub fn list_filler_files(&self) -> Vec<(PathBuf, u64)> {
        let parts = self.inventory.partitions();
        let mut seen_paths = HashSet::new();
        let mut seen_files = HashSet::new();
        let mut out = Vec::new();
        for part in &parts {
            for path in self.candidate_paths(part, &parts) {
                if !seen_paths.insert(path.clone()) { continue; }
                let meta = match fs::metadata(&path) {
                    Ok(m) if m.is_file() => m,
                    _ => continue,
                };
                if let Some(id) = sys::file_identity(&meta) {
                    if !seen_files.insert(id) {
                        log::debug!("{} is an alias of an already listed filler", path.display());
                        continue;
                    }
                }
                out.push((path, meta.len()));
            }
        }
        out
    }

    fn candidate_paths(&self, partition: &Partition, all: &[Partition]) -> Vec<PathBuf> {
        let mut paths = vec![self.layout.path_for(&partition.mount_point)];
        if self.layout == FillerLayout::MountRoot {
            if let Some(home) = self.home_on(partition, all) {
                paths.push(self.layout.path_in(&home));
            }
        }
        paths
    }

    /// The home directory, if it lives on `partition`.
    fn home_on(&self, partition: &Partition, all: &[Partition]) -> Option<PathBuf> {
        let home = self.home.as_ref()?;
        let owner = partition_for_path(home, all, self.mount_query_timeout)?;
        (owner.mount_point == partition.mount_point).then(|| home.clone())
    }
}
