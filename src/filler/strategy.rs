//! Ways of turning "a file of N bytes" into disk usage, ordered per platform
//! from fastest to most conservative.

use crate::config::TimeoutConfig;
use crate::util::human::MIB;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::util::command::{run_with_timeout, RunOutcome};
use std::process::Command;

#[derive(Debug, Error)]
pub enum AllocError {
    /// This method cannot run here; the next one in the chain should try.
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl From<io::Error> for AllocError {
    fn from(e: io::Error) -> Self {
        AllocError::Failed(e.to_string())
    }
}

/// Create a file of exactly `len` bytes at `path`, replacing any existing one.
pub trait Allocate {
    fn name(&self) -> &'static str;
    fn allocate(&self, path: &Path, len: u64) -> Result<(), AllocError>;
}

fn create_truncated(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

// ── fallocate(2) ─────────────────────────────────────────────────────

/// Reserves real blocks without writing them. Instant on ext4, xfs, btrfs.
#[cfg(target_os = "linux")]
pub struct Fallocate;

#[cfg(target_os = "linux")]
impl Allocate for Fallocate {
    fn name(&self) -> &'static str { "fallocate" }

    fn allocate(&self, path: &Path, len: u64) -> Result<(), AllocError> {
        use std::os::unix::io::AsRawFd;

        let file = create_truncated(path)?;
        let len = libc::off_t::try_from(len)
            .map_err(|_| AllocError::Failed(format!("length {len} does not fit off_t")))?;
        let ret = unsafe { libc::fallocate(file.as_raw_fd(), 0, 0, len) };
        if ret == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EOPNOTSUPP) | Some(libc::ENOSYS) => {
                Err(AllocError::Unavailable(format!("fallocate not supported here: {err}")))
            }
            _ => Err(AllocError::Failed(format!("fallocate: {err}"))),
        }
    }
}

// ── dd ───────────────────────────────────────────────────────────────

/// `dd if=/dev/zero` in 1 MiB blocks; every byte is written.
#[cfg(unix)]
pub struct DdZeroFill {
    pub timeout: Duration,
}

#[cfg(unix)]
impl Allocate for DdZeroFill {
    fn name(&self) -> &'static str { "dd" }

    fn allocate(&self, path: &Path, len: u64) -> Result<(), AllocError> {
        if len % MIB != 0 {
            return Err(AllocError::Unavailable(format!("{len} is not a whole number of MiB")));
        }
        let mut of = std::ffi::OsString::from("of=");
        of.push(path.as_os_str());
        let mut cmd = Command::new("dd");
        // Numeric block size: GNU dd rejects BSD's "1m"
        cmd.arg("if=/dev/zero")
            .arg(of)
            .arg(format!("bs={}", MIB))
            .arg(format!("count={}", len / MIB));

        let out = run_with_timeout(&mut cmd, self.timeout).map_err(|e| AllocError::Failed(format!("{e:#}")))?;
        match &out {
            RunOutcome::Missing  => Err(AllocError::Unavailable("dd not found".into())),
            RunOutcome::TimedOut => Err(AllocError::TimedOut(self.timeout)),
            RunOutcome::Exited { status, .. } if !status.success() => {
                Err(AllocError::Failed(format!("dd failed: {}", out.diagnostic())))
            }
            RunOutcome::Exited { .. } if !path.is_file() => {
                Err(AllocError::Failed("dd did not produce the target file".into()))
            }
            RunOutcome::Exited { .. } => Ok(()),
        }
    }
}

// ── fsutil ───────────────────────────────────────────────────────────

/// `fsutil file createnew`: NTFS allocates the length without writing it.
#[cfg(windows)]
pub struct Fsutil {
    pub timeout: Duration,
}

#[cfg(windows)]
impl Allocate for Fsutil {
    fn name(&self) -> &'static str { "fsutil" }

    fn allocate(&self, path: &Path, len: u64) -> Result<(), AllocError> {
        let mut cmd = Command::new("fsutil");
        cmd.args(["file", "createnew"]).arg(path).arg(len.to_string());
        let out = run_with_timeout(&mut cmd, self.timeout).map_err(|e| AllocError::Failed(format!("{e:#}")))?;
        match &out {
            RunOutcome::Missing  => Err(AllocError::Unavailable("fsutil not found".into())),
            RunOutcome::TimedOut => Err(AllocError::TimedOut(self.timeout)),
            RunOutcome::Exited { status, .. } if status.success() => Ok(()),
            RunOutcome::Exited { .. } => {
                Err(AllocError::Failed(format!("fsutil failed: {}", out.diagnostic())))
            }
        }
    }
}

// ── in-process writers ───────────────────────────────────────────────

/// Writes zero blocks from this process. Works everywhere; as slow as the disk.
pub struct ZeroFill {
    pub block_size: usize,
}

impl Default for ZeroFill {
    fn default() -> Self {
        Self { block_size: MIB as usize }
    }
}

impl Allocate for ZeroFill {
    fn name(&self) -> &'static str { "zero-fill" }

    fn allocate(&self, path: &Path, len: u64) -> Result<(), AllocError> {
        let mut file = create_truncated(path)?;
        let block = vec![0u8; self.block_size.max(1)];
        let mut left = len;
        while left > 0 {
            let n = left.min(block.len() as u64) as usize;
            file.write_all(&block[..n])?;
            left -= n as u64;
        }
        file.sync_all()?;
        Ok(())
    }
}

/// Extends the file length in one call. The result may be sparse.
pub struct SetLen;

impl Allocate for SetLen {
    fn name(&self) -> &'static str { "set-len" }

    fn allocate(&self, path: &Path, len: u64) -> Result<(), AllocError> {
        let file = create_truncated(path)?;
        file.set_len(len)?;
        Ok(())
    }
}

// ── chain ────────────────────────────────────────────────────────────

/// Tries each method in order, moving on only when one is unavailable.
pub struct AllocatorChain {
    methods: Vec<Box<dyn Allocate>>,
}

impl AllocatorChain {
    pub fn new(methods: Vec<Box<dyn Allocate>>) -> Self {
        Self { methods }
    }

    /// The platform's preferred order.
    pub fn for_platform(timeouts: &TimeoutConfig) -> Self {
        let mut methods: Vec<Box<dyn Allocate>> = Vec::new();
        #[cfg(target_os = "linux")]
        methods.push(Box::new(Fallocate));
        #[cfg(unix)]
        methods.push(Box::new(DdZeroFill { timeout: Duration::from_secs(timeouts.dd_sec) }));
        #[cfg(windows)]
        methods.push(Box::new(Fsutil { timeout: Duration::from_secs(timeouts.fsutil_sec) }));
        #[cfg(not(windows))]
        methods.push(Box::new(ZeroFill::default()));
        #[cfg(windows)]
        methods.push(Box::new(SetLen));
        Self::new(methods)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.methods.iter().map(|m| m.name()).collect()
    }
}

impl Allocate for AllocatorChain {
    fn name(&self) -> &'static str { "chain" }

    fn allocate(&self, path: &Path, len: u64) -> Result<(), AllocError> {
        let mut skipped = Vec::new();
        for m in &self.methods {
            log::info!("allocating {} bytes at {} with {}", len, path.display(), m.name());
            match m.allocate(path, len) {
                Err(AllocError::Unavailable(why)) => {
                    log::info!("{} unavailable: {}", m.name(), why);
                    skipped.push(format!("{}: {}", m.name(), why));
                }
                other => return other,
            }
        }
        Err(AllocError::Failed(format!("no allocation method available ({})", skipped.join("; "))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Refuses(Rc<Cell<u32>>);

    impl Allocate for Refuses {
        fn name(&self) -> &'static str { "refuses" }
        fn allocate(&self, _: &Path, _: u64) -> Result<(), AllocError> {
            self.0.set(self.0.get() + 1);
            Err(AllocError::Unavailable("not here".into()))
        }
    }

    struct Breaks;

    impl Allocate for Breaks {
        fn name(&self) -> &'static str { "breaks" }
        fn allocate(&self, _: &Path, _: u64) -> Result<(), AllocError> {
            Err(AllocError::Failed("disk on fire".into()))
        }
    }

    #[test]
    fn zero_fill_writes_exact_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        ZeroFill { block_size: 4096 }.allocate(&path, 3 * 4096 + 17).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 3 * 4096 + 17);
    }

    #[test]
    fn set_len_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, vec![1u8; 10_000]).unwrap();
        SetLen.allocate(&path, 2 * MIB).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 2 * MIB);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn fallocate_reserves_length_or_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        match Fallocate.allocate(&path, 4 * MIB) {
            Ok(()) => assert_eq!(std::fs::metadata(&path).unwrap().len(), 4 * MIB),
            Err(AllocError::Unavailable(_)) => {}
            Err(e) => panic!("unexpected failure: {e}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn dd_writes_whole_mebibytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let dd = DdZeroFill { timeout: Duration::from_secs(60) };
        dd.allocate(&path, 2 * MIB).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 2 * MIB);
        assert!(matches!(dd.allocate(&path, MIB + 1), Err(AllocError::Unavailable(_))));
    }

    #[test]
    fn chain_moves_past_unavailable_methods() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let calls = Rc::new(Cell::new(0));
        let chain = AllocatorChain::new(vec![Box::new(Refuses(calls.clone())), Box::new(SetLen)]);
        chain.allocate(&path, MIB).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), MIB);
    }

    #[test]
    fn chain_stops_at_first_real_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let chain = AllocatorChain::new(vec![Box::new(Breaks), Box::new(SetLen)]);
        assert!(matches!(chain.allocate(&path, MIB), Err(AllocError::Failed(_))));
        assert!(!path.exists());
    }

    #[test]
    fn chain_with_nothing_usable_fails() {
        let chain = AllocatorChain::new(vec![Box::new(Refuses(Rc::new(Cell::new(0))))]);
        let err = chain.allocate(Path::new("unused"), MIB).unwrap_err();
        assert!(err.to_string().contains("no allocation method available"));
    }

    #[test]
    fn platform_chain_ends_with_an_in_process_writer() {
        let chain = AllocatorChain::for_platform(&TimeoutConfig::default());
        let last = *chain.names().last().unwrap();
        assert!(last == "zero-fill" || last == "set-len");
    }
}
