use crate::filler::{fill_size_mb, Filler};
use crate::models::partition::Partition;
use crate::sys;
use crate::util::human::{fmt_gb, fmt_mb_as_gb, MIB};
use std::io::{self, BufRead, Write};

/// Mutating action chosen on the command line or in the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Fill,
    Remove,
}

impl Action {
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "fill"   => Some(Action::Fill),
            "remove" => Some(Action::Remove),
            _        => None,
        }
    }
}

/// Line-oriented console front end over a `Filler`.
pub struct Shell<'a, R, W> {
    input:      R,
    out:        W,
    filler:     &'a Filler,
    reserve_mb: u64,
}

impl<'a, R: BufRead, W: Write> Shell<'a, R, W> {
    pub fn new(input: R, out: W, filler: &'a Filler, reserve_mb: u64) -> Self {
        Self { input, out, filler, reserve_mb }
    }

    pub fn print_header(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", "═".repeat(60))?;
        writeln!(self.out, "  diskfill: simulate a full disk")?;
        writeln!(self.out, "  version {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.out, "{}", "═".repeat(60))?;
        writeln!(self.out)?;
        self.out.flush()
    }

    /// Top-level loop: 1 fill, 2 remove, 0 exit. End of input also exits.
    pub fn run_menu(&mut self) -> io::Result<()> {
        loop {
            writeln!(self.out, "Choose an action:")?;
            writeln!(self.out, "  1. Fill a partition (create filler file)")?;
            writeln!(self.out, "  2. Release space (delete filler files)")?;
            writeln!(self.out, "  0. Exit")?;
            writeln!(self.out)?;
            match self.prompt_choice("Enter option (0/1/2): ", 2, true)? {
                None | Some(0) => {
                    writeln!(self.out, "Bye.")?;
                    return self.out.flush();
                }
                Some(1) => self.run(Action::Fill)?,
                Some(_) => self.run(Action::Remove)?,
            }
            writeln!(self.out)?;
        }
    }

    pub fn run(&mut self, action: Action) -> io::Result<()> {
        match action {
            Action::Fill   => self.run_fill(),
            Action::Remove => self.run_remove(),
        }
    }

    /// Pick a partition, preview, confirm, fill, then show the partition again.
    pub fn run_fill(&mut self) -> io::Result<()> {
        let parts = self.filler.inventory().partitions();
        if parts.is_empty() {
            writeln!(self.out, "[error] no usable partition found.")?;
            return self.end_banner("Fill not performed");
        }
        self.print_partitions("Current disks", &parts)?;

        let idx = match self.prompt_choice("Select partition to fill (number): ", parts.len(), false)? {
            Some(i) => i,
            None    => {
                writeln!(self.out, "[cancelled] no partition selected.")?;
                return self.end_banner("Fill cancelled");
            }
        };
        let part = &parts[idx - 1];
        let filler_path = self.filler.target_path(part);

        writeln!(self.out)?;
        writeln!(self.out, "About to fill:")?;
        writeln!(self.out, "  partition:    {}", part.mount_point)?;
        writeln!(self.out, "  total:        {}", fmt_gb(part.total_bytes))?;
        writeln!(self.out, "  free now:     {}", fmt_gb(part.free_bytes))?;
        writeln!(self.out, "  reserve:      {}", fmt_mb_as_gb(self.reserve_mb))?;
        match fill_size_mb(part.free_bytes, self.reserve_mb) {
            Ok(mb) => writeln!(self.out, "  filler size:  about {}", fmt_gb(mb * MIB))?,
            Err(e) => {
                writeln!(self.out)?;
                writeln!(self.out, "[failed] {}", e)?;
                return self.end_banner("Fill not performed");
            }
        }
        writeln!(self.out, "  filler file:  {}", filler_path.display())?;
        writeln!(self.out)?;

        if !self.confirm("A large file will be created to fill this partition. Continue? (y/N): ")? {
            writeln!(self.out, "[cancelled] fill cancelled.")?;
            return self.end_banner("Fill cancelled");
        }

        match self.filler.fill(&sys::root_path(&part.mount_point), self.reserve_mb) {
            Ok(path) => {
                writeln!(self.out)?;
                writeln!(self.out, "[done] created filler file {}", path.display())?;
                let after = self.filler.inventory().partitions();
                if let Some(p) = after.iter().find(|p| p.mount_point == part.mount_point) {
                    writeln!(self.out)?;
                    self.print_partitions("After fill", std::slice::from_ref(p))?;
                }
                self.end_banner("Fill finished")
            }
            Err(e) => {
                writeln!(self.out, "[failed] {}", e)?;
                self.end_banner("Fill not completed")
            }
        }
    }

    /// Find existing filler files, confirm once, delete them all.
    pub fn run_remove(&mut self) -> io::Result<()> {
        let existing = self.filler.list_filler_files();
        writeln!(self.out, "Filler files on this machine")?;
        writeln!(self.out, "{}", "─".repeat(60))?;
        if existing.is_empty() {
            writeln!(self.out, "  No filler files created by this tool were found; nothing to release.")?;
            writeln!(self.out, "{}", "─".repeat(60))?;
            return self.end_banner("Release check finished (nothing to release)");
        }
        for (i, (path, size)) in existing.iter().enumerate() {
            writeln!(self.out, "  {}. {}", i + 1, path.display())?;
            writeln!(self.out, "     size: {}", fmt_gb(*size))?;
        }
        writeln!(self.out, "{}", "─".repeat(60))?;
        writeln!(self.out)?;

        if !self.confirm("Delete the filler files above to release space? (y/N): ")? {
            writeln!(self.out, "[cancelled] release cancelled.")?;
            return self.end_banner("Release cancelled");
        }

        let mut all_ok = true;
        for (path, _) in &existing {
            match self.filler.remove(path) {
                Ok(msg) => writeln!(self.out, "[ok] {}", msg)?,
                Err(e)  => {
                    writeln!(self.out, "[failed] {}", e)?;
                    all_ok = false;
                }
            }
        }
        writeln!(self.out)?;
        if all_ok {
            writeln!(self.out, "[done] disk space released.")?;
            self.end_banner("Release finished")
        } else {
            self.end_banner("Release partially failed")
        }
    }

    fn print_partitions(&mut self, title: &str, parts: &[Partition]) -> io::Result<()> {
        writeln!(self.out, "{}", title)?;
        writeln!(self.out, "{}", "─".repeat(60))?;
        for (i, p) in parts.iter().enumerate() {
            writeln!(self.out, "  {}. {}", i + 1, p)?;
        }
        writeln!(self.out, "{}", "─".repeat(60))?;
        writeln!(self.out)
    }

    fn end_banner(&mut self, what: &str) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", "═".repeat(60))?;
        writeln!(self.out, "  [{}]", what)?;
        writeln!(self.out, "{}", "═".repeat(60))?;
        writeln!(self.out)?;
        self.out.flush()
    }

    /// 1-based choice in `1..=max` (or 0 when allowed). Re-prompts until valid;
    /// `None` only when input is exhausted.
    fn prompt_choice(&mut self, prompt: &str, max: usize, allow_zero: bool) -> io::Result<Option<usize>> {
        loop {
            let line = match self.ask(prompt)? {
                Some(l) => l,
                None    => return Ok(None),
            };
            match line.trim().parse::<usize>() {
                Ok(0) if allow_zero        => return Ok(Some(0)),
                Ok(n) if (1..=max).contains(&n) => return Ok(Some(n)),
                _ => writeln!(self.out, "  Invalid input, please try again.")?,
            }
        }
    }

    /// `y` / `yes` in any case; everything else, including EOF, is a no.
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        Ok(self
            .ask(prompt)?
            .map(|s| matches!(s.trim().to_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false))
    }

    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.out, "{}", prompt)?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.out)?;
            return Ok(None);
        }
        Ok(Some(line))
    }
}
