//! Archive entry model shared by extraction and repacking.

/// What an archive entry materializes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file (type flags `0`, NUL and `7`).
    File,
    /// Directory (type flag `5`).
    Directory,
    /// Symbolic link (type flag `2`).
    Symlink,
    /// Hard link (type flag `1`).
    HardLink,
    /// Any other type flag (devices, FIFOs, sparse files).
    Other(u8),
}

impl EntryKind {
    /// Classify a raw tar type flag.
    pub fn from_type_flag(flag: u8) -> Self {
        match flag {
            b'0' | b'\0' | b'7' => Self::File,
            b'5' => Self::Directory,
            b'2' => Self::Symlink,
            b'1' => Self::HardLink,
            other => Self::Other(other),
        }
    }

    /// Whether this entry points at another path instead of holding content.
    pub fn is_link(self) -> bool {
        matches!(self, Self::Symlink | Self::HardLink)
    }
}

/// One materializable archive member, with any long-name continuation applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full member name, possibly supplied by a preceding continuation record.
    pub full_name: String,
    /// Entry type.
    pub kind: EntryKind,
    /// POSIX permission bits.
    pub mode: u32,
    /// Link target for symlinks and hard links.
    pub link_target: Option<String>,
    /// Declared content length in bytes.
    pub size: u64,
}

impl ArchiveEntry {
    /// Member name without a trailing slash.
    pub fn trimmed_name(&self) -> &str {
        self.full_name.trim_end_matches('/')
    }
}
