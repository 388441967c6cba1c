//! Accumulation of the sections of one table version.

use super::section::{Section, SectionError};
use super::CurrentNext;
use crate::packet::Pid;
use std::error;
use std::fmt;

/// Reasons for which [`BinaryTable::add_section()`](struct.BinaryTable.html#method.add_section)
/// rejects a section.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AddSectionError {
    /// The section itself failed validation
    InvalidSection(SectionError),
    /// The section's PID, table id, table id extension, version or current/next indicator
    /// differs from those of the sections already in the table
    IdentityMismatch,
    /// The section disagrees with the sections already in the table about the number of the
    /// last section
    LastSectionMismatch { expected: u8, actual: u8 },
    /// A section with this number is already present
    DuplicateSection { section_number: u8 },
}

impl fmt::Display for AddSectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AddSectionError::InvalidSection(ref e) => write!(f, "invalid section: {}", e),
            AddSectionError::IdentityMismatch => {
                write!(f, "section does not belong to this table")
            }
            AddSectionError::LastSectionMismatch { expected, actual } => write!(
                f,
                "last section number {} differs from the table's {}",
                actual, expected
            ),
            AddSectionError::DuplicateSection { section_number } => {
                write!(f, "section {} already present", section_number)
            }
        }
    }
}

impl error::Error for AddSectionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            AddSectionError::InvalidSection(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableIdentity {
    source_pid: Pid,
    table_id: u8,
    table_id_extension: Option<u16>,
    version: u8,
    current_next: CurrentNext,
    last_section_number: u8,
}

impl TableIdentity {
    fn of(section: &Section) -> TableIdentity {
        TableIdentity {
            source_pid: section.source_pid(),
            table_id: section.table_id(),
            table_id_extension: section.table_id_extension(),
            version: section.version(),
            current_next: section.current_next(),
            last_section_number: section.last_section_number(),
        }
    }

    fn same_table(&self, other: &TableIdentity) -> bool {
        self.source_pid == other.source_pid
            && self.table_id == other.table_id
            && self.table_id_extension == other.table_id_extension
            && self.version == other.version
            && self.current_next == other.current_next
    }
}

/// The sections of one version of a table, possibly not all received yet.
///
/// Sections may be added in any order; the table is complete once every section number from
/// `0` up to the `last_section_number` announced by its sections is present.  A short
/// section makes up a complete table by itself.
///
/// Sections are held by (shared) reference, so a `BinaryTable` is cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct BinaryTable {
    identity: Option<TableIdentity>,
    sections: Vec<Option<Section>>,
    present: usize,
}

impl BinaryTable {
    pub fn new() -> BinaryTable {
        BinaryTable::default()
    }

    /// Builds a complete table from a single section.
    pub fn from_section(section: Section) -> Result<BinaryTable, AddSectionError> {
        let mut table = BinaryTable::new();
        table.add_section(section)?;
        Ok(table)
    }

    /// Add a section, returning `Ok(true)` if this section completed the table.
    ///
    /// The first section added to an empty table determines the identity of the table and
    /// its expected number of sections.  Sections that do not match are rejected and leave
    /// the table unchanged.
    pub fn add_section(&mut self, section: Section) -> Result<bool, AddSectionError> {
        if let Err(e) = section.validity() {
            return Err(AddSectionError::InvalidSection(e.clone()));
        }
        let id = TableIdentity::of(&section);
        match self.identity {
            None => {
                self.identity = Some(id);
                self.sections.clear();
                self.sections
                    .resize(usize::from(id.last_section_number) + 1, None);
                self.present = 0;
            }
            Some(ref existing) => {
                if !existing.same_table(&id) {
                    return Err(AddSectionError::IdentityMismatch);
                }
                if existing.last_section_number != id.last_section_number {
                    return Err(AddSectionError::LastSectionMismatch {
                        expected: existing.last_section_number,
                        actual: id.last_section_number,
                    });
                }
            }
        }
        let section_number = section.section_number();
        let slot = &mut self.sections[usize::from(section_number)];
        if slot.is_some() {
            return Err(AddSectionError::DuplicateSection { section_number });
        }
        *slot = Some(section);
        self.present += 1;
        Ok(self.is_complete())
    }

    /// `true` if the table holds at least one section and no section is missing.
    pub fn is_complete(&self) -> bool {
        self.present > 0 && self.present == self.sections.len()
    }

    /// `true` if no section has been added since creation or the last `clear()`.
    pub fn is_empty(&self) -> bool {
        self.present == 0
    }

    /// Remove all sections; the next section added will define a new identity.
    pub fn clear(&mut self) {
        self.identity = None;
        self.sections.clear();
        self.present = 0;
    }

    /// Table id; `0` for an empty table.
    pub fn table_id(&self) -> u8 {
        self.identity.map(|i| i.table_id).unwrap_or(0)
    }

    /// Table id extension of a table made of long sections, `None` for a short section table
    /// (or an empty table).
    pub fn table_id_extension(&self) -> Option<u16> {
        self.identity.and_then(|i| i.table_id_extension)
    }

    pub fn version(&self) -> u8 {
        self.identity.map(|i| i.version).unwrap_or(0)
    }

    /// PID from which the sections of this table were demultiplexed.
    pub fn source_pid(&self) -> Option<Pid> {
        self.identity.map(|i| i.source_pid)
    }

    pub fn current_next(&self) -> CurrentNext {
        self.identity
            .map(|i| i.current_next)
            .unwrap_or(CurrentNext::Current)
    }

    pub fn is_current(&self) -> bool {
        self.current_next() == CurrentNext::Current
    }

    /// `true` if the table is made of a single short section.
    pub fn is_short(&self) -> bool {
        self.identity
            .map(|i| i.table_id_extension.is_none())
            .unwrap_or(false)
    }

    /// Number of sections present so far.
    pub fn section_count(&self) -> usize {
        self.present
    }

    /// Number of sections making up the complete table (`last_section_number + 1`); `0` for an
    /// empty table.
    pub fn expected_section_count(&self) -> usize {
        self.sections.len()
    }

    /// The section with the given number, if present.
    pub fn section(&self, section_number: u8) -> Option<&Section> {
        self.sections
            .get(usize::from(section_number))
            .and_then(|s| s.as_ref())
    }

    /// The sections present, in section number order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter_map(|s| s.as_ref())
    }

    /// Sum of the sizes of all sections present.
    pub fn total_size(&self) -> usize {
        self.sections().map(|s| s.size()).sum()
    }
}
