//! Types for the sections and tables of *Program Specific Information* (and the private
//! tables of derived standards) carried in a transport stream.
//!
//! # Concepts
//!
//! * A PSI *Table* can split into *Sections*
//! * A Section can be split across a small number of individual transport stream *Packets*,
//!   and a single packet may hold the end of one section and the start of the next
//! * A section either uses the *long* 'section syntax' (with version, section numbering and a
//!   trailing CRC) or is a *short* section holding only a 3-byte header and its payload.
//!
//! # Core types
//!
//! * [`Section`](section/struct.Section.html) is a validated, immutable view of one section
//! * [`BinaryTable`](table/struct.BinaryTable.html) collects the sections of one table version
//!   and knows when all of them have arrived
//! * [`SectionDemux`](../demultiplex/struct.SectionDemux.html) turns *Packets* into *Sections*
//!   and *Tables*
//!
//! Interpretation of the payload of specific table types is left to calling code.

pub mod section;
pub mod table;

pub use self::section::{Etid, LongSectionFields, Section, SectionError};
pub use self::table::{AddSectionError, BinaryTable};

/// The value of the _current_next_indicator_ field of a long section.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CurrentNext {
    /// The table is applicable now
    Current,
    /// The table will become applicable at some future time
    Next,
}

impl CurrentNext {
    fn from_bit(v: u8) -> CurrentNext {
        if v & 1 == 1 {
            CurrentNext::Current
        } else {
            CurrentNext::Next
        }
    }
}

/// Whether the `CRC_32` field of long sections is checked when a section is validated.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CrcValidation {
    /// Sections whose CRC does not match their content are invalid
    Check,
    /// The CRC field is not examined.  Useful when fuzzing, to give more chances of test data
    /// reaching deeper into the parser.
    Ignore,
}

impl Default for CrcValidation {
    fn default() -> Self {
        CrcValidation::Check
    }
}

/// The 3-byte header which starts every section, short or long.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SectionCommonHeader {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub private_indicator: bool,
    pub section_length: usize,
}

impl SectionCommonHeader {
    pub const SIZE: usize = 3;

    /// Panics if the given slice is not exactly `SectionCommonHeader::SIZE` bytes long
    pub fn new(buf: &[u8]) -> SectionCommonHeader {
        assert_eq!(buf.len(), Self::SIZE);
        SectionCommonHeader {
            table_id: buf[0],
            section_syntax_indicator: buf[1] & 0b1000_0000 != 0,
            private_indicator: buf[1] & 0b0100_0000 != 0,
            section_length: ((u16::from(buf[1] & 0b0000_1111) << 8) | u16::from(buf[2])) as usize,
        }
    }

    /// The size of the whole section this header announces, header included.
    pub fn total_size(&self) -> usize {
        Self::SIZE + self.section_length
    }
}

/// Represents the fields that appear within sections that use the common 'section syntax'
/// (i.e. long sections), immediately after the `SectionCommonHeader`.
#[derive(Debug)]
pub struct TableSyntaxHeader<'buf> {
    buf: &'buf [u8],
}

impl<'buf> TableSyntaxHeader<'buf> {
    pub const SIZE: usize = 5;

    /// Panics if fewer than `TableSyntaxHeader::SIZE` bytes are given
    pub fn new(buf: &'buf [u8]) -> TableSyntaxHeader<'buf> {
        assert!(buf.len() >= Self::SIZE);
        TableSyntaxHeader { buf }
    }
    /// The initial 16-bit field within a 'section syntax' table (which immediately follows the
    /// `section_length` field), known as the _table_id_extension_.
    /// _13818-1_ refers to this field as,
    ///  - `transport_stream_id` when it appears within a Program Association Section
    ///  - part of the `reserved` field when it appears within a Conditional Access Section
    ///  - `program_number` when it appears within a Program Map Section
    ///  - `table_id_extension` when it appears within a Private Section
    pub fn id(&self) -> u16 {
        u16::from(self.buf[0]) << 8 | u16::from(self.buf[1])
    }
    /// A 5-bit value that can be used to quickly check if this table has changed since the last
    /// time it was periodically inserted within the transport stream being read.
    pub fn version(&self) -> u8 {
        (self.buf[2] >> 1) & 0b0001_1111
    }
    /// Is this table applicable now, or will it become applicable at some future time.
    pub fn current_next_indicator(&self) -> CurrentNext {
        CurrentNext::from_bit(self.buf[2])
    }
    /// The number of this section, within a potentially multi-section table.
    pub fn section_number(&self) -> u8 {
        self.buf[3]
    }
    /// Indicates the value of `section_number()` that will appear within the last section within
    /// a table.
    pub fn last_section_number(&self) -> u8 {
        self.buf[4]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn common_header() {
        let data = hex!("02b017");
        let header = SectionCommonHeader::new(&data[..]);
        assert_eq!(header.table_id, 2);
        assert!(header.section_syntax_indicator);
        assert!(!header.private_indicator);
        assert_eq!(header.section_length, 0x17);
        assert_eq!(header.total_size(), 0x1a);
    }

    #[test]
    fn syntax_header() {
        let data = hex!("0001c30204");
        let header = TableSyntaxHeader::new(&data[..]);
        assert_eq!(header.id(), 1);
        assert_eq!(header.version(), 1);
        assert_eq!(header.current_next_indicator(), CurrentNext::Current);
        assert_eq!(header.section_number(), 2);
        assert_eq!(header.last_section_number(), 4);
    }
}
