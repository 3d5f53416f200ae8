/// One row of the OS mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device:  String,
    pub mount:   String,
    pub fs_type: String,
}

impl MountEntry {
    /// A probed root with no device or type information.
    pub fn bare(mount: impl Into<String>) -> Self {
        Self { device: String::new(), mount: mount.into(), fs_type: String::new() }
    }
}

/// Parse `/proc/self/mounts`: `device mount fstype options dump pass`.
pub fn parse_proc_mounts(content: &str) -> Vec<MountEntry> {
    let mut v = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 { continue; }
        v.push(MountEntry {
            device:  unescape_octal(fields[0]),
            mount:   unescape_octal(fields[1]),
            fs_type: fields[2].to_string(),
        });
    }
    v
}

/// Parse BSD/macOS `mount` output: `/dev/disk1s1 on / (apfs, local, journaled)`.
pub fn parse_mount_output(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let (device, rest) = line.split_once(" on ")?;
            let (mount, opts) = match rest.rfind(" (") {
                Some(i) => (&rest[..i], &rest[i + 2..]),
                None    => (rest, ""),
            };
            let fs_type = opts
                .trim_end_matches(')')
                .split(',')
                .next()
                .unwrap_or("")
                .trim();
            Some(MountEntry {
                device:  device.trim().to_string(),
                mount:   mount.trim().to_string(),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Mount point column of `df -P <path>` output.
pub fn parse_df_mount_point(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.trim().lines().collect();
    if lines.len() < 2 { return None; }
    lines.last()?.split_whitespace().last().map(str::to_string)
}

/// The kernel escapes space, tab, newline and backslash as `\ooo`.
pub fn unescape_octal(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal(&bytes[i + 1..i + 4]) {
            let code = (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(code);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal(digits: &[u8]) -> bool {
    digits.len() == 3 && digits[0] <= b'3' && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}

/// udev encodes unsafe label characters as `\xHH` in `/dev/disk/by-label` names.
#[cfg(target_os = "linux")]
pub fn decode_hex_escapes(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'x') && i + 3 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 2..i + 4]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proc_mounts_rows() {
        let content = "\
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid 0 0
/dev/sdb1 /mnt/my\\040disk xfs rw 0 0
garbage
";
        let rows = parse_proc_mounts(content);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], MountEntry { device: "/dev/sda1".into(), mount: "/".into(), fs_type: "ext4".into() });
        assert_eq!(rows[2].mount, "/mnt/my disk");
    }

    #[test]
    fn bsd_mount_output() {
        let content = "\
/dev/disk3s1s1 on / (apfs, sealed, local, read-only, journaled)
devfs on /dev (devfs, local, nobrowse)
/dev/disk5s1 on /Volumes/Untitled Disk (msdos, local, nodev, nosuid, noowners)
map auto_home on /System/Volumes/Data/home (autofs, automounted, nobrowse)
";
        let rows = parse_mount_output(content);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].mount, "/");
        assert_eq!(rows[0].fs_type, "apfs");
        assert_eq!(rows[1].fs_type, "devfs");
        assert_eq!(rows[2].mount, "/Volumes/Untitled Disk");
        assert_eq!(rows[2].fs_type, "msdos");
        assert_eq!(rows[3].device, "map auto_home");
    }

    #[test]
    fn df_last_column_of_last_line() {
        let out = "\
Filesystem     1024-blocks      Used Available Capacity  Mounted on
/dev/disk3s5     482797652 312104520 145384780    69%    /System/Volumes/Data
";
        assert_eq!(parse_df_mount_point(out).as_deref(), Some("/System/Volumes/Data"));
        assert_eq!(parse_df_mount_point("Filesystem Mounted on\n"), None);
    }

    #[test]
    fn octal_escapes() {
        assert_eq!(unescape_octal(r"/a\040b\011c"), "/a b\tc");
        assert_eq!(unescape_octal(r"/plain"), "/plain");
        assert_eq!(unescape_octal(r"/trail\04"), r"/trail\04");
        assert_eq!(unescape_octal(r"/back\134slash"), r"/back\slash");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn hex_escapes() {
        assert_eq!(decode_hex_escapes(r"My\x20Disk"), "My Disk");
        assert_eq!(decode_hex_escapes(r"odd\xZZ"), r"odd\xZZ");
        assert_eq!(decode_hex_escapes("DATA"), "DATA");
    }
}
