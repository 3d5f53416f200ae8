pub const MIB: u64 = 1_048_576;
pub const GIB: u64 = 1_073_741_824;

/// Format a raw byte count into a human-readable string: "12.5 MB"
pub fn fmt_bytes(bytes: u64) -> String {
    const TB: f64 = 1_099_511_627_776.0;
    const GB: f64 = GIB as f64;
    const MB: f64 = MIB as f64;
    const KB: f64 = 1_024.0;
    let b = bytes as f64;
    if b >= TB      { format!("{:.1} TB", b / TB) }
    else if b >= GB { format!("{:.1} GB", b / GB) }
    else if b >= MB { format!("{:.1} MB", b / MB) }
    else if b >= KB { format!("{:.1} KB", b / KB) }
    else            { format!("{:.0} B",  b) }
}

/// Fixed GB with two decimals, used in the partition table: "18.13 GB"
pub fn fmt_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB as f64)
}

/// Megabytes expressed in GB: "0.50 GB" for 510 MB
pub fn fmt_mb_as_gb(mb: u64) -> String {
    format!("{:.2} GB", mb as f64 / 1024.0)
}
