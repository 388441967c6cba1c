//! A validated, immutable representation of one complete section.

use super::{CrcValidation, CurrentNext, SectionCommonHeader, TableSyntaxHeader};
use crate::mpegts_crc;
use crate::packet::Pid;
use std::error;
use std::fmt;
use std::sync::Arc;

/// Reasons for which a byte range is not a valid section.
///
/// The `Display` implementation gives a short diagnosis suitable for logging.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SectionError {
    /// Not enough bytes to hold the headers the section claims to have
    TooShort { actual: usize, minimum: usize },
    /// The header's `section_length` field does not match the number of bytes captured
    LengthMismatch { declared: usize, actual: usize },
    /// The header's `section_length` would make the section larger than the maximum allowed
    TooLong { declared: usize },
    /// `section_number` is larger than `last_section_number`
    InvalidSectionNumber {
        section_number: u8,
        last_section_number: u8,
    },
    /// The trailing `CRC_32` field does not match the section content
    InvalidCrc { stored: u32, computed: u32 },
}

impl fmt::Display for SectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SectionError::TooShort { actual, minimum } => {
                write!(f, "section too short ({} bytes, at least {} required)", actual, minimum)
            }
            SectionError::LengthMismatch { declared, actual } => write!(
                f,
                "invalid section length (header declares {} bytes, got {})",
                declared, actual
            ),
            SectionError::TooLong { declared } => write!(
                f,
                "invalid section length ({} bytes, maximum is {})",
                declared,
                Section::MAX_SIZE
            ),
            SectionError::InvalidSectionNumber {
                section_number,
                last_section_number,
            } => write!(
                f,
                "invalid section number {} (last section number is {})",
                section_number, last_section_number
            ),
            SectionError::InvalidCrc { stored, computed } => write!(
                f,
                "invalid CRC32 (stored {:#010x}, computed {:#010x})",
                stored, computed
            ),
        }
    }
}

impl error::Error for SectionError {}

/// _Extended table id_: identifies the table a section belongs to within the stream of one PID.
///
/// Long sections are identified by both their `table_id` and `table_id_extension`; short
/// sections by `table_id` alone.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct Etid {
    pub table_id: u8,
    pub table_id_extension: Option<u16>,
}

/// Header values for building a long section with
/// [`Section::long()`](struct.Section.html#method.long).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LongSectionFields {
    pub table_id: u8,
    pub private_indicator: bool,
    pub table_id_extension: u16,
    /// 5-bit version number
    pub version: u8,
    pub current_next: CurrentNext,
    pub section_number: u8,
    pub last_section_number: u8,
}

/// One complete MPEG section, either short or long.
///
/// The bytes are reference counted, so cloning a `Section` (e.g. to keep it in a
/// [`BinaryTable`](../table/struct.BinaryTable.html) while also handing it to a callback) does
/// not copy the data.  There is no API to modify a section once created.
///
/// The outcome of validation is computed once, when the section is created, and is available
/// from `validity()`.  Header accessors on an invalid section return whatever the bytes hold
/// (or zero where there are not enough bytes) and should not be relied upon.
#[derive(Clone, PartialEq, Eq)]
pub struct Section {
    data: Arc<[u8]>,
    source_pid: Pid,
    validity: Result<(), SectionError>,
}

impl Section {
    /// The largest total size of any section, header included (private sections).
    pub const MAX_SIZE: usize = 4096;
    /// Size of the trailing CRC of long sections.
    pub const CRC_SIZE: usize = 4;
    /// Combined size of the headers of a long section.
    pub const LONG_HEADER_SIZE: usize = SectionCommonHeader::SIZE + TableSyntaxHeader::SIZE;
    /// Smallest possible long section (no payload).
    pub const MIN_LONG_SIZE: usize = Self::LONG_HEADER_SIZE + Self::CRC_SIZE;

    /// Validate the given bytes as one complete section, checking the CRC of long sections.
    ///
    /// This never fails: malformed input produces a `Section` for which `is_valid()` is false.
    pub fn new(data: impl Into<Arc<[u8]>>, source_pid: Pid) -> Section {
        Self::with_crc_validation(data, source_pid, CrcValidation::Check)
    }

    /// Like `new()`, but the caller decides whether the CRC is checked.
    pub fn with_crc_validation(
        data: impl Into<Arc<[u8]>>,
        source_pid: Pid,
        crc_validation: CrcValidation,
    ) -> Section {
        let data = data.into();
        let validity = validate(&data, crc_validation);
        Section {
            data,
            source_pid,
            validity,
        }
    }

    /// Build a valid long section with the given header fields and payload, computing the
    /// `section_length` and `CRC_32` fields.
    ///
    /// Panics if `version` does not fit in 5 bits, if `section_number` is greater than
    /// `last_section_number`, or if the payload is too large for a section.
    pub fn long(fields: LongSectionFields, payload: &[u8], source_pid: Pid) -> Section {
        assert!(fields.version < 32, "version {} is not 5 bits", fields.version);
        assert!(fields.section_number <= fields.last_section_number);
        let total = Self::MIN_LONG_SIZE + payload.len();
        assert!(total <= Self::MAX_SIZE, "section of {} bytes is too large", total);
        let section_length = total - SectionCommonHeader::SIZE;
        let mut data = Vec::with_capacity(total);
        data.push(fields.table_id);
        data.push(
            0b1000_0000
                | (if fields.private_indicator { 0b0100_0000 } else { 0 })
                | 0b0011_0000
                | (section_length >> 8) as u8,
        );
        data.push(section_length as u8);
        data.extend_from_slice(&fields.table_id_extension.to_be_bytes());
        let current = match fields.current_next {
            CurrentNext::Current => 1,
            CurrentNext::Next => 0,
        };
        data.push(0b1100_0000 | fields.version << 1 | current);
        data.push(fields.section_number);
        data.push(fields.last_section_number);
        data.extend_from_slice(payload);
        let crc = mpegts_crc::sum32(&data[..]);
        data.extend_from_slice(&crc.to_be_bytes());
        Section::new(data, source_pid)
    }

    /// Build a valid short section.
    ///
    /// Panics if the payload is too large for a section.
    pub fn short(
        table_id: u8,
        private_indicator: bool,
        payload: &[u8],
        source_pid: Pid,
    ) -> Section {
        let total = SectionCommonHeader::SIZE + payload.len();
        assert!(total <= Self::MAX_SIZE, "section of {} bytes is too large", total);
        let section_length = payload.len();
        let mut data = Vec::with_capacity(total);
        data.push(table_id);
        data.push(
            (if private_indicator { 0b0100_0000 } else { 0 })
                | 0b0011_0000
                | (section_length >> 8) as u8,
        );
        data.push(section_length as u8);
        data.extend_from_slice(payload);
        Section::new(data, source_pid)
    }

    /// `Ok` if the section passed validation, otherwise the reason it did not.
    pub fn validity(&self) -> Result<(), &SectionError> {
        self.validity.as_ref().map(|_| ())
    }

    pub fn is_valid(&self) -> bool {
        self.validity.is_ok()
    }

    /// The PID of the packets from which this section was demultiplexed.
    pub fn source_pid(&self) -> Pid {
        self.source_pid
    }

    fn byte(&self, index: usize) -> u8 {
        self.data.get(index).copied().unwrap_or(0)
    }

    pub fn table_id(&self) -> u8 {
        self.byte(0)
    }

    /// `true` if the _section_syntax_indicator_ is set, meaning that the section has the
    /// table syntax header and a trailing CRC.
    pub fn is_long(&self) -> bool {
        self.byte(1) & 0b1000_0000 != 0
    }

    pub fn is_short(&self) -> bool {
        !self.is_long()
    }

    pub fn private_indicator(&self) -> bool {
        self.byte(1) & 0b0100_0000 != 0
    }

    /// The _section_length_ header field: the number of bytes following the 3-byte common
    /// header.
    pub fn section_length(&self) -> usize {
        usize::from(self.byte(1) & 0b0000_1111) << 8 | usize::from(self.byte(2))
    }

    // the table syntax header of a long section, if the section is long enough to hold one
    fn syntax_header(&self) -> Option<TableSyntaxHeader<'_>> {
        if self.is_long() && self.data.len() >= Self::LONG_HEADER_SIZE {
            Some(TableSyntaxHeader::new(
                &self.data[SectionCommonHeader::SIZE..Self::LONG_HEADER_SIZE],
            ))
        } else {
            None
        }
    }

    /// The _table_id_extension_ of a long section, `None` for a short section.
    pub fn table_id_extension(&self) -> Option<u16> {
        self.syntax_header().map(|h| h.id())
    }

    /// The 5-bit version of a long section; always `0` for a short section.
    pub fn version(&self) -> u8 {
        self.syntax_header().map(|h| h.version()).unwrap_or(0)
    }

    /// The _current_next_indicator_ of a long section.  Short sections are always applicable
    /// immediately, so report `Current`.
    pub fn current_next(&self) -> CurrentNext {
        self.syntax_header()
            .map(|h| h.current_next_indicator())
            .unwrap_or(CurrentNext::Current)
    }

    pub fn is_current(&self) -> bool {
        self.current_next() == CurrentNext::Current
    }

    pub fn is_next(&self) -> bool {
        self.current_next() == CurrentNext::Next
    }

    /// Section number within the table; always `0` for a short section.
    pub fn section_number(&self) -> u8 {
        self.syntax_header()
            .map(|h| h.section_number())
            .unwrap_or(0)
    }

    /// Number of the last section of the table; always `0` for a short section.
    pub fn last_section_number(&self) -> u8 {
        self.syntax_header()
            .map(|h| h.last_section_number())
            .unwrap_or(0)
    }

    pub fn etid(&self) -> Etid {
        Etid {
            table_id: self.table_id(),
            table_id_extension: self.table_id_extension(),
        }
    }

    /// The section content following the headers, excluding the CRC of long sections.
    ///
    /// Empty if the section is too short to have any payload.
    pub fn payload(&self) -> &[u8] {
        let range = if self.is_long() {
            if self.data.len() < Self::MIN_LONG_SIZE {
                return &[];
            }
            Self::LONG_HEADER_SIZE..self.data.len() - Self::CRC_SIZE
        } else {
            if self.data.len() < SectionCommonHeader::SIZE {
                return &[];
            }
            SectionCommonHeader::SIZE..self.data.len()
        };
        &self.data[range]
    }

    /// The value of the trailing `CRC_32` field of a long section.
    pub fn crc32(&self) -> Option<u32> {
        if self.is_long() && self.data.len() >= Self::MIN_LONG_SIZE {
            let d = &self.data[self.data.len() - Self::CRC_SIZE..];
            Some(u32::from_be_bytes([d[0], d[1], d[2], d[3]]))
        } else {
            None
        }
    }

    /// Total size of the section in bytes, headers and CRC included.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The complete section, as it appeared in the transport stream.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..]
    }

    /// `true` if both sections have byte-identical content (irrespective of the PID they were
    /// found on).
    pub fn same_content(&self, other: &Section) -> bool {
        self.data == other.data
    }
}

fn validate(data: &[u8], crc_validation: CrcValidation) -> Result<(), SectionError> {
    if data.len() < SectionCommonHeader::SIZE {
        return Err(SectionError::TooShort {
            actual: data.len(),
            minimum: SectionCommonHeader::SIZE,
        });
    }
    let header = SectionCommonHeader::new(&data[..SectionCommonHeader::SIZE]);
    let declared = header.total_size();
    if declared > Section::MAX_SIZE {
        return Err(SectionError::TooLong { declared });
    }
    if declared != data.len() {
        return Err(SectionError::LengthMismatch {
            declared,
            actual: data.len(),
        });
    }
    if !header.section_syntax_indicator {
        return Ok(());
    }
    if data.len() < Section::MIN_LONG_SIZE {
        return Err(SectionError::TooShort {
            actual: data.len(),
            minimum: Section::MIN_LONG_SIZE,
        });
    }
    let syntax = TableSyntaxHeader::new(&data[SectionCommonHeader::SIZE..]);
    if syntax.section_number() > syntax.last_section_number() {
        return Err(SectionError::InvalidSectionNumber {
            section_number: syntax.section_number(),
            last_section_number: syntax.last_section_number(),
        });
    }
    if crc_validation == CrcValidation::Check {
        let (content, crc) = data.split_at(data.len() - Section::CRC_SIZE);
        let stored = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
        let computed = mpegts_crc::sum32(content);
        if stored != computed {
            return Err(SectionError::InvalidCrc { stored, computed });
        }
    }
    Ok(())
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Section");
        d.field("source_pid", &self.source_pid);
        d.field("table_id", &self.table_id());
        d.field("size", &self.size());
        if self.is_long() {
            d.field("table_id_extension", &self.table_id_extension());
            d.field("version", &self.version());
            d.field("current_next", &self.current_next());
            d.field("section_number", &self.section_number());
            d.field("last_section_number", &self.last_section_number());
        }
        d.field("validity", &self.validity);
        d.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use bitstream_io::{BigEndian, BitWrite, BitWriter};
    use hex_literal::hex;
    use std::io;

    fn make_test_data<F>(builder: F) -> Vec<u8>
    where
        F: Fn(&mut BitWriter<&mut Vec<u8>, BigEndian>) -> Result<(), io::Error>,
    {
        let mut data: Vec<u8> = Vec::new();
        {
            let mut w = BitWriter::endian(&mut data, BigEndian);
            builder(&mut w).unwrap();
        }
        data
    }

    fn fields() -> LongSectionFields {
        LongSectionFields {
            table_id: 0x42,
            private_indicator: true,
            table_id_extension: 0x1234,
            version: 17,
            current_next: CurrentNext::Current,
            section_number: 2,
            last_section_number: 5,
        }
    }

    #[test]
    fn pat_from_stream() {
        let sect = Section::new(&hex!("00B00D0001C100000001E1E02D507804")[..], Pid::PAT);
        assert_eq!(sect.validity(), Ok(()));
        assert_eq!(sect.table_id(), 0);
        assert!(sect.is_long());
        assert_eq!(sect.table_id_extension(), Some(1));
        assert_eq!(sect.version(), 0);
        assert!(sect.is_current());
        assert_eq!(sect.section_number(), 0);
        assert_eq!(sect.last_section_number(), 0);
        assert_eq!(sect.payload(), &hex!("0001E1E0")[..]);
        assert_eq!(sect.crc32(), Some(0x2D507804));
        assert_eq!(sect.source_pid(), Pid::PAT);
    }

    #[test]
    fn long_round_trip() {
        let payload = b"some table content";
        let sect = Section::long(fields(), &payload[..], Pid::new(0x100));
        assert!(sect.is_valid());
        let parsed = Section::new(sect.bytes().to_vec(), Pid::new(0x100));
        assert_eq!(parsed.validity(), Ok(()));
        assert_eq!(parsed.table_id(), 0x42);
        assert!(parsed.private_indicator());
        assert_eq!(parsed.table_id_extension(), Some(0x1234));
        assert_eq!(parsed.version(), 17);
        assert_eq!(parsed.current_next(), CurrentNext::Current);
        assert_eq!(parsed.section_number(), 2);
        assert_eq!(parsed.last_section_number(), 5);
        assert_eq!(parsed.payload(), &payload[..]);
        assert_eq!(
            parsed.crc32(),
            Some(mpegts_crc::sum32(&parsed.bytes()[..parsed.size() - 4]))
        );
        assert_eq!(parsed, sect);
    }

    #[test]
    fn long_header_layout() {
        let sect = Section::long(fields(), &[0xaa, 0xbb], Pid::new(0x100));
        let expected = make_test_data(|w| {
            // common section header
            w.write(8, 0x42u8)?; // table_id
            w.write_bit(true)?; // section_syntax_indicator
            w.write_bit(true)?; // private_indicator
            w.write(2, 3u8)?; // reserved
            w.write(12, 11u16)?; // section_length
            // section syntax header
            w.write(16, 0x1234u16)?; // table_id_extension
            w.write(2, 3u8)?; // reserved
            w.write(5, 17u8)?; // version
            w.write_bit(true)?; // current_next_indicator
            w.write(8, 2u8)?; // section_number
            w.write(8, 5u8)?; // last_section_number
            w.write(8, 0xaau8)?;
            w.write(8, 0xbbu8)
        });
        assert_eq!(&sect.bytes()[..sect.size() - 4], &expected[..]);
    }

    #[test]
    fn short_section() {
        let sect = Section::short(0x70, false, &hex!("e4d1123456"), Pid::new(0x14));
        assert_eq!(sect.validity(), Ok(()));
        assert!(sect.is_short());
        assert_eq!(sect.section_length(), 5);
        assert_eq!(sect.table_id_extension(), None);
        assert_eq!(sect.section_number(), 0);
        assert_eq!(sect.last_section_number(), 0);
        assert!(sect.is_current());
        assert_eq!(sect.crc32(), None);
        assert_eq!(sect.payload(), &hex!("e4d1123456")[..]);
        assert_eq!(
            sect.etid(),
            Etid {
                table_id: 0x70,
                table_id_extension: None
            }
        );
    }

    #[test]
    fn bad_crc() {
        let mut data = hex!("00B00D0001C100000001E1E02D507804");
        data[10] ^= 0x01;
        let sect = Section::new(&data[..], Pid::PAT);
        assert_matches!(sect.validity(), Err(SectionError::InvalidCrc { .. }));
        assert!(sect.validity().unwrap_err().to_string().starts_with("invalid CRC32"));
        let ignored = Section::with_crc_validation(&data[..], Pid::PAT, CrcValidation::Ignore);
        assert!(ignored.is_valid());
    }

    #[test]
    fn length_mismatch() {
        let data = hex!("00B00D0001C100000001E1E02D5078");
        let sect = Section::new(&data[..], Pid::PAT);
        assert_eq!(
            sect.validity(),
            Err(&SectionError::LengthMismatch {
                declared: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn invalid_section_number() {
        let mut f = fields();
        f.section_number = 0;
        f.last_section_number = 0;
        let good = Section::long(f, &[], Pid::new(0x100));
        let mut data = good.bytes().to_vec();
        data[6] = 3; // section_number > last_section_number
        let sect = Section::new(data, Pid::new(0x100));
        assert_matches!(
            sect.validity(),
            Err(SectionError::InvalidSectionNumber {
                section_number: 3,
                last_section_number: 0
            })
        );
        assert!(sect
            .validity()
            .unwrap_err()
            .to_string()
            .starts_with("invalid section number"));
    }

    #[test]
    fn too_short() {
        assert_matches!(
            Section::new(&[0u8, 0][..], Pid::PAT).validity(),
            Err(SectionError::TooShort { actual: 2, minimum: 3 })
        );
        // long section with no room for the syntax header or CRC
        assert_matches!(
            Section::new(&hex!("00b00100")[..], Pid::PAT).validity(),
            Err(SectionError::TooShort { actual: 4, minimum: 12 })
        );
        let sect = Section::new(&hex!("00b00100")[..], Pid::PAT);
        assert!(sect.payload().is_empty());
        assert_eq!(sect.crc32(), None);
    }

    #[test]
    fn too_long() {
        let data = hex!("803fff");
        assert_matches!(
            Section::new(&data[..], Pid::PAT).validity(),
            Err(SectionError::TooLong { declared: 4098 })
        );
    }

    #[test]
    fn clone_shares_data() {
        let sect = Section::long(fields(), b"abc", Pid::new(0x100));
        let copy = sect.clone();
        assert!(std::ptr::eq(sect.bytes().as_ptr(), copy.bytes().as_ptr()));
        assert!(sect.same_content(&copy));
        assert!(!format!("{:?}", copy).is_empty());
    }
}
