//! Volume discovery and filesystem identification.
//!
//! Volumes are searched in UBI, then MTD, then block partitions, matching
//! how flash devices usually stack them.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use fstools_shared::constants::magic;
use fstools_shared::{FstoolsError, FstoolsResult};

use crate::volume::{FilesystemCondition, Volume, VolumeKind};

/// Where the kernel exposes volume metadata.
#[derive(Clone, Debug)]
pub struct ProbeRoots {
    pub proc_mtd: PathBuf,
    pub sys_ubi: PathBuf,
    pub sys_block: PathBuf,
    pub dev: PathBuf,
}

impl Default for ProbeRoots {
    fn default() -> Self {
        Self {
            proc_mtd: PathBuf::from("/proc/mtd"),
            sys_ubi: PathBuf::from("/sys/class/ubi"),
            sys_block: PathBuf::from("/sys/class/block"),
            dev: PathBuf::from("/dev"),
        }
    }
}

/// One line of `/proc/mtd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtdPartition {
    pub index: u32,
    pub size: u64,
    pub erase_size: u64,
    pub name: String,
}

/// Parse `/proc/mtd`:
///
/// ```text
/// dev:    size   erasesize  name
/// mtd5: 00e00000 00010000 "rootfs_data"
/// ```
pub fn parse_proc_mtd(text: &str) -> Vec<MtdPartition> {
    text.lines().filter_map(parse_mtd_line).collect()
}

fn parse_mtd_line(line: &str) -> Option<MtdPartition> {
    let (dev, rest) = line.split_once(':')?;
    let index = dev.trim().strip_prefix("mtd")?.parse().ok()?;

    let mut fields = rest.split_whitespace();
    let size = u64::from_str_radix(fields.next()?, 16).ok()?;
    let erase_size = u64::from_str_radix(fields.next()?, 16).ok()?;

    let name = rest.split_once('"')?.1.rsplit_once('"')?.0.to_string();

    Some(MtdPartition {
        index,
        size,
        erase_size,
        name,
    })
}

/// Device name of a block partition whose uevent matches `name`.
///
/// Matches either the partition label (`PARTNAME=`) or the kernel device
/// name (`DEVNAME=`).
pub fn uevent_matches(uevent: &str, name: &str) -> Option<String> {
    let mut devname = None;
    let mut partname = None;
    for line in uevent.lines() {
        if let Some(v) = line.strip_prefix("DEVNAME=") {
            devname = Some(v.trim());
        } else if let Some(v) = line.strip_prefix("PARTNAME=") {
            partname = Some(v.trim());
        }
    }

    let devname = devname?;
    if devname == name || partname == Some(name) {
        Some(devname.to_string())
    } else {
        None
    }
}

/// Identify the filesystem from the first bytes of a volume.
pub fn classify_header(header: &[u8]) -> FilesystemCondition {
    let Some(first) = header.get(..4) else {
        return FilesystemCondition::None;
    };
    let first: [u8; 4] = [first[0], first[1], first[2], first[3]];
    let be = u32::from_be_bytes(first);
    let le = u32::from_le_bytes(first);

    if be == magic::SNAPSHOT {
        return FilesystemCondition::Snapshot;
    }
    if be == magic::DEADCODE || le == magic::DEADCODE {
        return FilesystemCondition::Deadcode;
    }
    if u16::from_be_bytes([first[0], first[1]]) == magic::JFFS2
        || u16::from_le_bytes([first[0], first[1]]) == magic::JFFS2
    {
        return FilesystemCondition::Jffs2;
    }
    if le == magic::UBIFS {
        return FilesystemCondition::Ubifs;
    }

    let off = magic::EXT4_MAGIC_OFFSET;
    if let Some(bytes) = header.get(off..off + 2) {
        if u16::from_le_bytes([bytes[0], bytes[1]]) == magic::EXT4 {
            return FilesystemCondition::Ext4;
        }
    }

    FilesystemCondition::None
}

/// Read the probe window of `device` and classify it.
pub fn identify(device: &Path) -> FstoolsResult<FilesystemCondition> {
    let file = File::open(device).map_err(|e| {
        FstoolsError::Storage(format!("Failed to open {}: {}", device.display(), e))
    })?;

    let mut header = Vec::with_capacity(magic::PROBE_LEN);
    file.take(magic::PROBE_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|e| {
            FstoolsError::Storage(format!("Failed to read {}: {}", device.display(), e))
        })?;

    Ok(classify_header(&header))
}

/// Find a volume called `name`.
pub fn find_volume(roots: &ProbeRoots, name: &str) -> Option<Volume> {
    find_ubi(roots, name)
        .or_else(|| find_mtd(roots, name))
        .or_else(|| find_block(roots, name))
}

fn find_ubi(roots: &ProbeRoots, name: &str) -> Option<Volume> {
    let entries = std::fs::read_dir(&roots.sys_ubi).ok()?;
    for entry in entries.flatten() {
        let dev = entry.file_name().to_string_lossy().into_owned();
        // ubiX is the device, ubiX_Y are its volumes
        if !dev.contains('_') {
            continue;
        }
        let Ok(vol_name) = std::fs::read_to_string(entry.path().join("name")) else {
            continue;
        };
        if vol_name.trim() == name || dev == name {
            tracing::debug!("Found UBI volume {} as {}", name, dev);
            return Some(Volume::new(name, VolumeKind::Ubi, roots.dev.join(dev)));
        }
    }
    None
}

fn find_mtd(roots: &ProbeRoots, name: &str) -> Option<Volume> {
    let text = std::fs::read_to_string(&roots.proc_mtd).ok()?;
    let part = parse_proc_mtd(&text)
        .into_iter()
        .find(|p| p.name == name || format!("mtd{}", p.index) == name)?;

    tracing::debug!(
        "Found MTD partition {} as mtd{} (size={:#x}, erasesize={:#x})",
        name,
        part.index,
        part.size,
        part.erase_size
    );
    Some(Volume::new(
        name,
        VolumeKind::Mtd { index: part.index },
        roots.dev.join(format!("mtdblock{}", part.index)),
    ))
}

fn find_block(roots: &ProbeRoots, name: &str) -> Option<Volume> {
    let entries = std::fs::read_dir(&roots.sys_block).ok()?;
    for entry in entries.flatten() {
        let Ok(uevent) = std::fs::read_to_string(entry.path().join("uevent")) else {
            continue;
        };
        if let Some(devname) = uevent_matches(&uevent, name) {
            tracing::debug!("Found block partition {} as {}", name, devname);
            return Some(Volume::new(name, VolumeKind::Block, roots.dev.join(devname)));
        }
    }
    None
}
