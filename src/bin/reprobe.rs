//! # reprobe
//!
//! Asks the kernel to re-read the partition table of `DEST_DISK`.
//!
//! Provisioning workflows run this after an action has rewritten a disk's
//! partition table so that the new partitions show up without a reboot.
//! Failures are printed but never fail the workflow step: the process always
//! exits with status 0.

use anyhow::{Context, Result};
use std::env;

const DISK_VAR: &str = "DEST_DISK";

fn main() {
    if let Err(e) = run() {
        eprintln!("reprobe: {:#}", e);
    }
}

fn run() -> Result<()> {
    let disk = env::var(DISK_VAR).with_context(|| format!("{} is not set", DISK_VAR))?;
    reprobe(&disk)?;
    println!("Re-read partition table of {}", disk);
    Ok(())
}

#[cfg(target_os = "linux")]
fn reprobe(disk: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    // BLKRRPART is _IO(0x12, 95) in <linux/fs.h>.
    nix::ioctl_none!(blkrrpart, 0x12, 95);

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o644)
        .open(disk)
        .with_context(|| format!("Failed to open {}", disk))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", disk))?;

    // SAFETY: the descriptor stays open for the duration of the call and
    // BLKRRPART takes no argument.
    unsafe { blkrrpart(file.as_raw_fd()) }
        .with_context(|| format!("BLKRRPART failed on {}", disk))?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn reprobe(disk: &str) -> Result<()> {
    anyhow::bail!("re-reading the partition table of {} is only supported on Linux", disk)
}
