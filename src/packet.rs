//! A [`Packet`](./struct.Packet.html) struct and associated infrastructure to read an MPEG
//! Transport Stream packet, plus the owned [`TsPacket`](./struct.TsPacket.html) used where
//! packets have to be stored (queues) or produced (packetizer).

use log::warn;
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;

/// the different values indicating whether a `Packet`'s `adaptation_field()` and `payload()`
/// methods will return `Some` or `None`.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AdaptationControl {
    /// This value is used if the transport stream packet `adaptation_control` field uses the value
    /// `0b00`, which is not defined by the standard.
    Reserved,
    /// indicates that this packet contains a payload, but not an adaptation field
    PayloadOnly,
    /// indicates that this packet contains an adaptation field, but not a payload
    AdaptationFieldOnly,
    /// indicates that this packet contains both an adaptation field and a payload
    AdaptationFieldAndPayload,
}

impl AdaptationControl {
    #[inline(always)]
    fn from(val: u8) -> AdaptationControl {
        match val {
            0 => AdaptationControl::Reserved,
            1 => AdaptationControl::PayloadOnly,
            2 => AdaptationControl::AdaptationFieldOnly,
            3 => AdaptationControl::AdaptationFieldAndPayload,
            _ => panic!("invalid value {}", val),
        }
    }

    /// True if this AdaptationControl variant indicates that the packet will have a payload
    #[inline(always)]
    pub fn has_payload(self) -> bool {
        match self {
            AdaptationControl::Reserved | AdaptationControl::AdaptationFieldOnly => false,
            AdaptationControl::PayloadOnly | AdaptationControl::AdaptationFieldAndPayload => true,
        }
    }
}

/// Indicates content scrambling in use, if any.
///
/// Actual content scrambling schemes, indicated through the `u8` value in the `Undefined`
/// variant, are undefined in ISO/IEC 13818-1 (left to be described by other specifications).
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TransportScramblingControl {
    /// The stream is not scrambled.
    NotScrambled,
    /// The stream is scrambled using a scheme not defined in ISO/IEC 13818-1.
    Undefined(u8),
}

impl TransportScramblingControl {
    fn from(val: u8) -> TransportScramblingControl {
        match val {
            0 => TransportScramblingControl::NotScrambled,
            1..=3 => TransportScramblingControl::Undefined(val),
            _ => panic!("invalid value {}", val),
        }
    }

    /// `true` for any value other than `NotScrambled`
    pub fn is_scrambled(self) -> bool {
        self != TransportScramblingControl::NotScrambled
    }
}

/// A _Clock Reference_ is used to represent the values of PCR and ESCR fields within the transport
/// stream data.
///
/// A _Clock Reference_ includes a 33-bit, 90kHz `base` component, together with another 9-bit,
/// high-resolution `extension` component.
///
/// Together these can be viewed as a 42-bit, 27MHz quantity (e.g. `let full_value = pcr as u64`).
/// Since the clock reference is limited to 33-bits, at a rate of 90kHz a continuously increasing
/// clock value will wrap-around approximately every 26.5 hours.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ClockRef {
    base: u64,
    extension: u16,
}

impl From<ClockRef> for u64 {
    fn from(pcr: ClockRef) -> u64 {
        pcr.base * 300 + u64::from(pcr.extension)
    }
}

impl fmt::Debug for ClockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "PCR{{{:08x}:{:04x}}}", self.base, self.extension)
    }
}
impl ClockRef {
    /// Number of distinct 27MHz values a clock reference can take before it wraps around to
    /// zero (2^33 * 300).
    pub const WRAP: u64 = (1 << 33) * 300;

    /// Frequency of the 27MHz system clock.
    pub const SYSTEM_CLOCK_FREQUENCY: u64 = 27_000_000;

    /// Panics if `data` is shorter than 6 bytes
    pub fn from_slice(data: &[u8]) -> ClockRef {
        ClockRef {
            base: u64::from(data[0]) << 25
                | u64::from(data[1]) << 17
                | u64::from(data[2]) << 9
                | u64::from(data[3]) << 1
                | u64::from(data[4]) >> 7,
            //reserved: (data[4] >> 1) & 0b00111111,
            extension: (u16::from(data[4]) & 0b1) << 8 | u16::from(data[5]),
        }
    }

    /// The clock reference for a count of 27MHz ticks, wrapping around at `ClockRef::WRAP`.
    pub fn from_ticks(ticks: u64) -> ClockRef {
        let ticks = ticks % Self::WRAP;
        ClockRef {
            base: ticks / 300,
            extension: (ticks % 300) as u16,
        }
    }

    /// Panics if the `base` is greater than 2^33-1 or the `extension` is greater than 2^9-1
    pub fn from_parts(base: u64, extension: u16) -> ClockRef {
        assert!(base < (1 << 33));
        assert!(extension < (1 << 9));
        ClockRef { base, extension }
    }

    /// get the 33-bit, 90kHz 'base' component of the timestamp
    pub fn base(&self) -> u64 {
        self.base
    }

    /// get the 9-bit 'extension' component of the timestamp, measured in 300ths of the 90kHz base
    /// clockrate (i.e. 27MHz)
    pub fn extension(&self) -> u16 {
        self.extension
    }

    /// Writes the 6-byte encoding of this clock reference, with reserved bits set to `1`.
    pub fn write_to(&self, data: &mut [u8]) {
        data[0] = (self.base >> 25) as u8;
        data[1] = (self.base >> 17) as u8;
        data[2] = (self.base >> 9) as u8;
        data[3] = (self.base >> 1) as u8;
        data[4] = ((self.base & 1) as u8) << 7 | 0b0111_1110 | (self.extension >> 8) as u8;
        data[5] = self.extension as u8;
    }
}

/// Some error encountered while parsing adaptation field syntax
#[derive(Debug, PartialEq, Eq)]
pub enum AdaptationFieldError {
    /// The an optional field's value was requested, but the field is not actually present
    FieldNotPresent,
    /// There is a syntactic problem in the adaptation field being parsed, and not enough data
    /// is present in the stream to hold the requested component which is supposed to be present.
    NotEnoughData,
}

/// A collection of fields that may optionally appear within the header of a transport stream
/// `Packet`.
///
/// As returned by [`Packet::adaptation_field()`](struct.Packet.html#method.adaptation_field)
pub struct AdaptationField<'buf> {
    buf: &'buf [u8],
}

impl<'buf> AdaptationField<'buf> {
    /// Create a new structure to parse the adaptation field data held within the given slice.
    ///
    /// Panics if the slice is empty.
    pub fn new(buf: &'buf [u8]) -> AdaptationField<'buf> {
        assert!(!buf.is_empty());
        AdaptationField { buf }
    }

    /// Get the value of the _discontinuity_indicator_ field which might have been written into
    /// the transport stream by some 'upstream' processor on discovering that there was a break
    /// in the data.
    pub fn discontinuity_indicator(&self) -> bool {
        self.buf[0] & 0b1000_0000 != 0
    }
    fn pcr_flag(&self) -> bool {
        self.buf[0] & 0b1_0000 != 0
    }
    fn slice(&self, from: usize, to: usize) -> Result<&'buf [u8], AdaptationFieldError> {
        if to > self.buf.len() {
            Err(AdaptationFieldError::NotEnoughData)
        } else {
            Ok(&self.buf[from..to])
        }
    }
    const PCR_SIZE: usize = 6;
    /// Get the _Program Clock Reference_ field,
    /// or `AdaptationFieldError::FieldNotPresent` if absent
    pub fn pcr(&self) -> Result<ClockRef, AdaptationFieldError> {
        if self.pcr_flag() {
            Ok(ClockRef::from_slice(self.slice(1, 1 + Self::PCR_SIZE)?))
        } else {
            Err(AdaptationFieldError::FieldNotPresent)
        }
    }
}

impl<'buf> fmt::Debug for AdaptationField<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("AdaptationField");
        d.field("discontinuity_indicator", &self.discontinuity_indicator());
        d.field("pcr", &self.pcr());
        d.finish()
    }
}

/// A counter value used within a transport stream to detect discontinuities in a sequence of
/// packets. The continuity counter should increase by one for each packet with a given PID for
/// which `adaptation_control` indicates that a payload should be present.
///
/// See [`Packet.continuity_counter()`](struct.Packet.html#method.continuity_counter)
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ContinuityCounter {
    val: u8,
}

impl From<u8> for ContinuityCounter {
    #[inline]
    fn from(count: u8) -> ContinuityCounter {
        ContinuityCounter::new(count)
    }
}

impl ContinuityCounter {
    /// Panics if the given value is greater than 15.
    #[inline]
    pub fn new(count: u8) -> ContinuityCounter {
        assert!(count < 0b10000);
        ContinuityCounter { val: count }
    }

    /// Returns this counter's value, which will be between 0 and 15 inclusive.
    #[inline]
    pub fn count(self) -> u8 {
        self.val
    }

    /// The counter value which should follow this one.
    #[inline]
    pub fn next(self) -> ContinuityCounter {
        ContinuityCounter {
            val: (self.val + 1) & 0b1111,
        }
    }

    /// true iff the given `ContinuityCounter` value follows this one.  Note that the maximum
    /// counter value is 15, and the counter 'wraps around':
    ///
    /// ```rust
    /// # use mpeg2ts_sections::packet::ContinuityCounter;
    /// let a = ContinuityCounter::new(0);
    /// let b = ContinuityCounter::new(15);
    /// assert!(a.follows(b));  // after 15, counter wraps around to 0
    /// ```
    #[inline]
    pub fn follows(self, other: ContinuityCounter) -> bool {
        (other.val + 1) & 0b1111 == self.val
    }
}

/// A Packet Identifier value, between `0x0000` and `0x1fff`.
///
/// PID values identify a particular sub-stream within the overall Transport Stream.
///
/// As returned by the [`Packet::pid`](struct.Packet.html#method.pid) method for example.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u16);
impl Pid {
    /// The largest possible PID value, `0x1fff`.
    pub const MAX_VALUE: u16 = 0x1fff;

    /// The total number of distinct PID values, `0x2000` (equal to `MAX_VALUE` + 1)
    pub const PID_COUNT: usize = (Self::MAX_VALUE + 1) as usize;

    /// The PID carrying the _Program Association Table_, `0x0000`.
    pub const PAT: Pid = Pid::new(0);
    /// The PID of null (stuffing) packets, `0x1fff`.
    pub const NULL: Pid = Pid::new(0x1fff);

    /// Panics if the given value is greater than `Pid::MAX_VALUE`.
    pub const fn new(pid: u16) -> Pid {
        assert!(pid <= 0x1fff);
        Pid(pid)
    }
}
impl TryFrom<u16> for Pid {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Pid::MAX_VALUE {
            Ok(Pid(value))
        } else {
            Err(())
        }
    }
}
impl From<Pid> for u16 {
    #[inline]
    fn from(pid: Pid) -> Self {
        pid.0
    }
}
impl From<Pid> for usize {
    #[inline]
    fn from(pid: Pid) -> Self {
        pid.0 as usize
    }
}
impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "Pid({:04x})", self.0)
    }
}
impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:#06x}", self.0)
    }
}

/// A transport stream `Packet` is a wrapper around a byte slice which allows the bytes to be
/// interpreted as a packet structure per _ISO/IEC 13818-1, Section 2.4.3.3_.
pub struct Packet<'buf> {
    buf: &'buf [u8],
}

const FIXED_HEADER_SIZE: usize = 4;
// when AF present, a 1-byte 'length' field precedes the content,
const ADAPTATION_FIELD_OFFSET: usize = FIXED_HEADER_SIZE + 1;

impl<'buf> Packet<'buf> {
    /// The value `0x47`, which must appear in the first byte of every transport stream packet.
    pub const SYNC_BYTE: u8 = 0x47;

    /// The fixed 188 byte size of a transport stream packet.
    pub const SIZE: usize = 188;

    /// returns `true` if the given value is a valid synchronisation byte, the value
    /// `Packet::SYNC_BYTE` (0x47), which must appear at the start of every transport stream packet.
    #[inline(always)]
    pub fn is_sync_byte(b: u8) -> bool {
        b == Self::SYNC_BYTE
    }

    /// Panics if the buffer size is not exactly `Packet::SIZE` (188) bytes, or if the first
    /// byte value is not equal to `Packet::SYNC_BYTE` (0x47).  Calling code is expected to have
    /// already checked those conditions.
    #[inline(always)]
    pub fn new(buf: &'buf [u8]) -> Packet<'buf> {
        assert_eq!(buf.len(), Self::SIZE);
        assert!(Packet::is_sync_byte(buf[0]));
        Packet { buf }
    }

    /// Like `new()`, but returns `None` if the sync-byte has incorrect value (still panics if the
    /// buffer size is not 188 bytes).
    #[inline(always)]
    pub fn try_new(buf: &'buf [u8]) -> Option<Packet<'buf>> {
        assert_eq!(buf.len(), Self::SIZE);
        if Packet::is_sync_byte(buf[0]) {
            Some(Packet { buf })
        } else {
            None
        }
    }

    /// a structure larger than a single packet payload needs to be split across multiple packets,
    /// `payload_unit_start()` indicates if this packet payload contains the start of the
    /// structure.  If `false`, this packets payload is a continuation of a structure which began
    /// in an earlier packet within the transport stream.
    #[inline]
    pub fn payload_unit_start_indicator(&self) -> bool {
        self.buf[1] & 0b0100_0000 != 0
    }

    /// The sub-stream to which a particular packet belongs is indicated by this Packet Identifier
    /// value.
    #[inline]
    pub fn pid(&self) -> Pid {
        Pid(u16::from(self.buf[1] & 0b0001_1111) << 8 | u16::from(self.buf[2]))
    }

    /// Value of the _transport_scrambling_control_ field.
    pub fn transport_scrambling_control(&self) -> TransportScramblingControl {
        TransportScramblingControl::from(self.buf[3] >> 6 & 0b11)
    }

    /// The returned enum value indicates if `adaptation_field()`, `payload()` or both will return
    /// something.
    #[inline]
    pub fn adaptation_control(&self) -> AdaptationControl {
        AdaptationControl::from(self.buf[3] >> 4 & 0b11)
    }

    /// Each packet with a given `pid()` value within a transport stream should have a continuity
    /// counter value which increases by 1 from the last counter value seen.  Unexpected continuity
    /// counter values allow the receiver of the transport stream to detect discontinuities in the
    /// stream (e.g. due to data loss during transmission).
    #[inline]
    pub fn continuity_counter(&self) -> ContinuityCounter {
        ContinuityCounter::new(self.buf[3] & 0b0000_1111)
    }

    fn adaptation_field_length(&self) -> usize {
        self.buf[4] as usize
    }

    /// An `AdaptationField` contains additional packet headers that may be present in the packet.
    pub fn adaptation_field(&self) -> Option<AdaptationField<'buf>> {
        match self.adaptation_control() {
            AdaptationControl::Reserved | AdaptationControl::PayloadOnly => None,
            AdaptationControl::AdaptationFieldOnly => {
                let len = self.adaptation_field_length();
                if len != (Self::SIZE - ADAPTATION_FIELD_OFFSET) {
                    warn!(
                        "invalid adaptation_field_length for AdaptationFieldOnly: {}",
                        len
                    );
                    return None;
                }
                Some(self.mk_af(len))
            }
            AdaptationControl::AdaptationFieldAndPayload => {
                let len = self.adaptation_field_length();
                if len > 182 {
                    warn!(
                        "invalid adaptation_field_length for AdaptationFieldAndPayload: {}",
                        len
                    );
                    return None;
                }
                if len == 0 {
                    return None;
                }
                Some(self.mk_af(len))
            }
        }
    }

    fn mk_af(&self, len: usize) -> AdaptationField<'buf> {
        AdaptationField::new(&self.buf[ADAPTATION_FIELD_OFFSET..ADAPTATION_FIELD_OFFSET + len])
    }

    /// The data contained within the packet, not including the packet headers.
    /// Not all packets have a payload, and `None` is returned if `adaptation_control()` indicates
    /// that no payload is present.  None may also be returned if the packet is malformed.
    /// If `Some` payload is returned, it is guaranteed not to be an empty slice.
    #[inline(always)]
    pub fn payload(&self) -> Option<&'buf [u8]> {
        match self.adaptation_control() {
            AdaptationControl::Reserved | AdaptationControl::AdaptationFieldOnly => None,
            AdaptationControl::PayloadOnly | AdaptationControl::AdaptationFieldAndPayload => {
                self.mk_payload()
            }
        }
    }

    #[inline]
    fn mk_payload(&self) -> Option<&'buf [u8]> {
        let offset = self.content_offset();
        let len = self.buf.len();
        match offset.cmp(&len) {
            Ordering::Equal => {
                warn!("no payload data present");
                None
            }
            Ordering::Greater => {
                warn!(
                    "adaptation_field_length {} too large",
                    self.adaptation_field_length()
                );
                None
            }
            Ordering::Less => Some(&self.buf[offset..]),
        }
    }

    /// borrow a reference to the underlying buffer of this packet
    pub fn buffer(&self) -> &'buf [u8] {
        self.buf
    }

    #[inline]
    fn content_offset(&self) -> usize {
        match self.adaptation_control() {
            AdaptationControl::Reserved | AdaptationControl::PayloadOnly => FIXED_HEADER_SIZE,
            AdaptationControl::AdaptationFieldOnly
            | AdaptationControl::AdaptationFieldAndPayload => {
                ADAPTATION_FIELD_OFFSET + self.adaptation_field_length()
            }
        }
    }
}

/// An owned copy of a single transport stream packet.
///
/// Where `Packet` borrows data owned by the caller, a `TsPacket` holds its 188 bytes inline so
/// that it can be stored (e.g. in a [`PacketQueue`](../queue/struct.PacketQueue.html)) and
/// moved between threads.  The content always begins with the sync byte.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TsPacket {
    buf: [u8; Packet::SIZE],
}

impl TsPacket {
    /// Size of the fixed header at the start of every packet.
    pub const HEADER_SIZE: usize = FIXED_HEADER_SIZE;
    /// Maximum payload size, when no adaptation field is present.
    pub const MAX_PAYLOAD_SIZE: usize = Packet::SIZE - FIXED_HEADER_SIZE;

    /// A null packet: PID `0x1fff`, payload-only, continuity counter zero, payload filled with
    /// `0xff`.
    pub const fn null() -> TsPacket {
        let mut buf = [0xffu8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[1] = 0x1f;
        buf[2] = 0xff;
        buf[3] = 0b0001_0000;
        TsPacket { buf }
    }

    /// Copy the given bytes into a new packet.
    ///
    /// Returns `None` if the first byte is not the sync byte; panics if the slice is not exactly
    /// `Packet::SIZE` bytes.
    pub fn from_bytes(data: &[u8]) -> Option<TsPacket> {
        Packet::try_new(data)?;
        let mut buf = [0u8; Packet::SIZE];
        buf.copy_from_slice(data);
        Some(TsPacket { buf })
    }

    /// A payload-only packet on the given PID with every payload byte set to `0xff`, ready to
    /// have its payload filled in.
    pub fn payload_only(pid: Pid, cc: ContinuityCounter) -> TsPacket {
        let mut pk = TsPacket::null();
        pk.set_pid(pid);
        pk.set_continuity_counter(cc);
        pk
    }

    /// A packet holding only an adaptation field carrying the given PCR, as sent on PCR PIDs
    /// which have no other data to carry.
    pub fn pcr_only(pid: Pid, cc: ContinuityCounter, pcr: ClockRef) -> TsPacket {
        let mut pk = TsPacket::payload_only(pid, cc);
        pk.buf[3] = (pk.buf[3] & 0b1100_1111) | 0b0010_0000;
        pk.buf[4] = (Packet::SIZE - ADAPTATION_FIELD_OFFSET) as u8;
        pk.buf[5] = 0b0001_0000; // PCR_flag only
        pcr.write_to(&mut pk.buf[6..6 + AdaptationField::PCR_SIZE]);
        pk
    }

    /// View these bytes as a `Packet`.
    #[inline]
    pub fn as_packet(&self) -> Packet<'_> {
        Packet { buf: &self.buf[..] }
    }

    /// The PID of this packet
    #[inline]
    pub fn pid(&self) -> Pid {
        self.as_packet().pid()
    }

    /// borrow the 188 bytes of the packet
    pub fn as_bytes(&self) -> &[u8; Packet::SIZE] {
        &self.buf
    }

    /// Set the 13-bit PID field.
    pub fn set_pid(&mut self, pid: Pid) {
        let pid = u16::from(pid);
        self.buf[1] = (self.buf[1] & 0b1110_0000) | (pid >> 8) as u8;
        self.buf[2] = pid as u8;
    }

    /// Set the 4-bit continuity counter field.
    pub fn set_continuity_counter(&mut self, cc: ContinuityCounter) {
        self.buf[3] = (self.buf[3] & 0b1111_0000) | cc.count();
    }

    /// Set or clear the _payload_unit_start_indicator_ flag.
    pub fn set_payload_unit_start_indicator(&mut self, pusi: bool) {
        if pusi {
            self.buf[1] |= 0b0100_0000;
        } else {
            self.buf[1] &= 0b1011_1111;
        }
    }

    /// Mutable access to the bytes following the 4-byte header.  Only meaningful for
    /// payload-only packets, as created by `null()` and `payload_only()`.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf[FIXED_HEADER_SIZE..]
    }

    /// Mutable access to all bytes of the packet, for callers which build their own header
    /// layout.  The first byte must remain `Packet::SYNC_BYTE`.
    pub fn bytes_mut(&mut self) -> &mut [u8; Packet::SIZE] {
        &mut self.buf
    }
}

impl Default for TsPacket {
    fn default() -> TsPacket {
        TsPacket::null()
    }
}

impl fmt::Debug for TsPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pk = self.as_packet();
        f.debug_struct("TsPacket")
            .field("pid", &pk.pid())
            .field("pusi", &pk.payload_unit_start_indicator())
            .field("cc", &pk.continuity_counter().count())
            .field("adaptation_control", &pk.adaptation_control())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use crate::packet::*;

    #[test]
    fn pid() {
        assert!(Pid::try_from(0x2000).is_err());
        assert_eq!(Pid::try_from(0x1fff), Ok(Pid::NULL));
    }

    #[test]
    #[should_panic]
    fn zero_len() {
        let buf = [0u8; 0];
        Packet::new(&buf[..]);
    }

    #[test]
    fn test_xmas_tree() {
        let mut buf = [0xffu8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[4] = 28; // adaptation_field_length
        let pk = Packet::new(&buf[..]);
        assert_eq!(u16::from(pk.pid()), 0b1111111111111u16);
        assert!(pk.payload_unit_start_indicator());
        assert_eq!(
            pk.transport_scrambling_control(),
            TransportScramblingControl::Undefined(3)
        );
        assert!(pk.transport_scrambling_control().is_scrambled());
        assert_eq!(
            pk.adaptation_control(),
            AdaptationControl::AdaptationFieldAndPayload
        );
        assert_eq!(pk.continuity_counter().count(), 0b1111);
        let ad = pk.adaptation_field().unwrap();
        assert!(ad.discontinuity_indicator());
        assert_eq!(
            ad.pcr(),
            Ok(ClockRef::from_parts(
                0b1_1111_1111_1111_1111_1111_1111_1111_1111,
                0b1_1111_1111
            ))
        );
        assert_eq!(1234 * 300 + 56, u64::from(ClockRef::from_parts(1234, 56)));
        assert!(!format!("{:?}", pk.adaptation_field()).is_empty())
    }

    #[test]
    fn empty_adaptation_field() {
        let mut buf = [0xffu8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[4] = 0; // adaptation_field_length
        let pk = Packet::new(&buf[..]);
        assert_eq!(
            pk.adaptation_control(),
            AdaptationControl::AdaptationFieldAndPayload
        );
        assert!(pk.adaptation_field().is_none());
    }

    #[test]
    fn clock_ref_encoding() {
        let pcr = ClockRef::from_parts(0x1_2345_6789, 0x1ab);
        let mut data = [0u8; 6];
        pcr.write_to(&mut data);
        assert_eq!(ClockRef::from_slice(&data), pcr);
    }

    #[test]
    fn clock_ref_ticks() {
        let pcr = ClockRef::from_ticks(1234 * 300 + 56);
        assert_eq!(pcr, ClockRef::from_parts(1234, 56));
        assert_eq!(ClockRef::from_ticks(ClockRef::WRAP + 7), ClockRef::from_ticks(7));
    }

    #[test]
    fn pcr_only_packet() {
        let pcr = ClockRef::from_ticks(0x1_0000_0001 * 300 + 299);
        let pk = TsPacket::pcr_only(Pid::new(0x44), ContinuityCounter::new(3), pcr);
        let view = pk.as_packet();
        assert_eq!(view.pid(), Pid::new(0x44));
        assert_eq!(view.adaptation_control(), AdaptationControl::AdaptationFieldOnly);
        assert!(view.payload().is_none());
        assert_eq!(view.adaptation_field().unwrap().pcr(), Ok(pcr));
    }

    #[test]
    fn continuity_counter_wraps() {
        let cc = ContinuityCounter::new(15);
        assert_eq!(cc.next().count(), 0);
        assert!(cc.next().follows(cc));
        assert!(!cc.follows(cc));
    }

    #[test]
    fn null_packet() {
        let pk = TsPacket::null();
        assert_eq!(pk.pid(), Pid::NULL);
        assert_eq!(pk.as_packet().adaptation_control(), AdaptationControl::PayloadOnly);
        assert_eq!(pk.as_packet().payload().map(|p| p.len()), Some(184));
        assert_eq!(TsPacket::default(), pk);
    }

    #[test]
    fn header_writers() {
        let mut pk = TsPacket::payload_only(Pid::new(0x123), ContinuityCounter::new(7));
        pk.set_payload_unit_start_indicator(true);
        let view = pk.as_packet();
        assert_eq!(view.pid(), Pid::new(0x123));
        assert_eq!(view.continuity_counter().count(), 7);
        assert!(view.payload_unit_start_indicator());
        assert_eq!(view.buffer()[1] & 0b1010_0000, 0);
        pk.set_payload_unit_start_indicator(false);
        assert!(!pk.as_packet().payload_unit_start_indicator());
    }

    #[test]
    fn from_bytes_requires_sync() {
        let mut buf = [0u8; Packet::SIZE];
        assert!(TsPacket::from_bytes(&buf[..]).is_none());
        buf[0] = Packet::SYNC_BYTE;
        assert!(TsPacket::from_bytes(&buf[..]).is_some());
    }
}
