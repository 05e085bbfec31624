//! Entry scanning shared by extraction and repacking.
//!
//! Archives are read with `tar`'s raw entry iterator, so GNU long-name
//! records and PAX headers arrive as entries of their own. [`EntryScan`]
//! carries what they declare over to the entry that follows.

use std::io::{self, Read};

use quarry_schema::{ArchiveEntry, EntryKind};

/// Pending overrides collected from continuation records.
#[derive(Debug, Default)]
pub struct EntryScan {
    pending_name: Option<String>,
    pending_link: Option<String>,
}

impl EntryScan {
    /// A scan with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the next raw entry.
    ///
    /// Continuation records (GNU `L`/`K`, PAX `x`/`g`) are consumed and
    /// yield `None`; pending names apply to exactly the next real entry.
    ///
    /// # Errors
    ///
    /// Returns an IO error if a header field or continuation body cannot be read.
    pub fn next_entry<R: Read>(
        &mut self,
        entry: &mut tar::Entry<'_, R>,
    ) -> io::Result<Option<ArchiveEntry>> {
        let entry_type = entry.header().entry_type();

        if entry_type.is_gnu_longname() {
            self.pending_name = Some(read_record(entry)?);
            return Ok(None);
        }
        if entry_type.is_gnu_longlink() {
            self.pending_link = Some(read_record(entry)?);
            return Ok(None);
        }
        if entry_type.is_pax_local_extensions() {
            if let Some(extensions) = entry.pax_extensions()? {
                for extension in extensions {
                    let extension = extension?;
                    let value = String::from_utf8_lossy(extension.value_bytes()).into_owned();
                    match extension.key_bytes() {
                        b"path" => self.pending_name = Some(value),
                        b"linkpath" => self.pending_link = Some(value),
                        _ => {}
                    }
                }
            }
            return Ok(None);
        }
        if entry_type.is_pax_global_extensions() {
            return Ok(None);
        }

        let header = entry.header();
        let full_name = match self.pending_name.take() {
            Some(name) => name,
            None => String::from_utf8_lossy(&header.path_bytes()).into_owned(),
        };
        let link_target = self.pending_link.take().or_else(|| {
            header
                .link_name_bytes()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .filter(|name| !name.is_empty())
        });

        Ok(Some(ArchiveEntry {
            full_name,
            kind: EntryKind::from_type_flag(entry_type.as_byte()),
            mode: header.mode()?,
            link_target,
            size: header.size()?,
        }))
    }
}

fn read_record<R: Read>(entry: &mut tar::Entry<'_, R>) -> io::Result<String> {
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
