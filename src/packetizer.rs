//! Conversion of sections into the transport stream packets that carry them.

use crate::packet::{ContinuityCounter, Pid, TsPacket};
use crate::psi::Section;

/// Where a `Packetizer` may start a new section.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StuffingPolicy {
    /// Sections follow each other without gaps, so that one packet may hold the end of a
    /// section and the start of the next (or several small sections)
    Never,
    /// Every section starts at the beginning of a new packet, with the unused end of the
    /// packet holding the previous section filled with `0xff` stuffing
    Always,
}

/// Produces the packets carrying a sequence of sections on a single PID.
///
/// Packets where a section starts have `payload_unit_start_indicator` set and a _pointer_field_
/// giving the offset of the first section start.  The continuity counter is carried over from
/// one call of `packetize()` to the next.
#[derive(Debug)]
pub struct Packetizer {
    pid: Pid,
    policy: StuffingPolicy,
    continuity_counter: ContinuityCounter,
}

// payload bytes of a packet after its pointer_field
const POINTED_PAYLOAD_SIZE: usize = TsPacket::MAX_PAYLOAD_SIZE - 1;

impl Packetizer {
    pub fn new(pid: Pid, policy: StuffingPolicy) -> Packetizer {
        Packetizer {
            pid,
            policy,
            continuity_counter: ContinuityCounter::new(0),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn policy(&self) -> StuffingPolicy {
        self.policy
    }

    /// The continuity counter value the next packet produced will carry.
    pub fn continuity_counter(&self) -> ContinuityCounter {
        self.continuity_counter
    }

    pub fn set_continuity_counter(&mut self, cc: ContinuityCounter) {
        self.continuity_counter = cc;
    }

    /// Packetize the given sections, returning the new packets.
    pub fn packetize(&mut self, sections: &[Section]) -> Vec<TsPacket> {
        let mut out = Vec::new();
        self.packetize_into(sections, &mut out);
        out
    }

    /// Packetize the given sections, appending the new packets to `out`.
    pub fn packetize_into(&mut self, sections: &[Section], out: &mut Vec<TsPacket>) {
        match self.policy {
            StuffingPolicy::Always => {
                for sect in sections {
                    self.emit(sect.bytes(), &[0], out);
                }
            }
            StuffingPolicy::Never => {
                let mut data = Vec::with_capacity(sections.iter().map(|s| s.size()).sum());
                let mut starts = Vec::with_capacity(sections.len());
                for sect in sections {
                    starts.push(data.len());
                    data.extend_from_slice(sect.bytes());
                }
                self.emit(&data, &starts, out);
            }
        }
    }

    // `starts` holds the ascending offsets within `data` at which sections begin
    fn emit(&mut self, data: &[u8], starts: &[usize], out: &mut Vec<TsPacket>) {
        let mut offset = 0;
        let mut starts = starts.iter().copied().peekable();
        while offset < data.len() {
            while starts.peek().map(|&s| s < offset).unwrap_or(false) {
                starts.next();
            }
            let mut pk = TsPacket::payload_only(self.pid, self.continuity_counter);
            self.continuity_counter = self.continuity_counter.next();
            match starts.peek() {
                Some(&start) if start - offset < POINTED_PAYLOAD_SIZE => {
                    pk.set_payload_unit_start_indicator(true);
                    let len = POINTED_PAYLOAD_SIZE.min(data.len() - offset);
                    let payload = pk.payload_mut();
                    payload[0] = (start - offset) as u8;
                    payload[1..=len].copy_from_slice(&data[offset..offset + len]);
                    offset += len;
                }
                next_start => {
                    // a section may only begin in a packet with a pointer_field
                    let limit = next_start.map(|&s| s - offset).unwrap_or(data.len() - offset);
                    let len = TsPacket::MAX_PAYLOAD_SIZE.min(limit);
                    pk.payload_mut()[..len].copy_from_slice(&data[offset..offset + len]);
                    offset += len;
                }
            }
            out.push(pk);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::psi::{CurrentNext, LongSectionFields};

    const PID: Pid = Pid::new(0x100);

    fn long(section_number: u8, last_section_number: u8, payload_len: usize) -> Section {
        Section::long(
            LongSectionFields {
                table_id: 0x42,
                private_indicator: true,
                table_id_extension: 1,
                version: 0,
                current_next: CurrentNext::Current,
                section_number,
                last_section_number,
            },
            &vec![0x5a; payload_len][..],
            PID,
        )
    }

    #[test]
    fn single_small_section() {
        let sect = long(0, 0, 10);
        let pks = Packetizer::new(PID, StuffingPolicy::Always).packetize(&[sect.clone()]);
        assert_eq!(pks.len(), 1);
        let pk = pks[0].as_packet();
        assert!(pk.payload_unit_start_indicator());
        assert_eq!(pk.pid(), PID);
        let payload = pk.payload().unwrap();
        assert_eq!(payload[0], 0);
        assert_eq!(&payload[1..=sect.size()], sect.bytes());
        assert!(payload[sect.size() + 1..].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn section_spanning_packets() {
        // 12 + 400 bytes: 183 in the first packet, 184 in the second, 45 in the third
        let sect = long(0, 0, 400);
        let mut p = Packetizer::new(PID, StuffingPolicy::Always);
        let pks = p.packetize(&[sect.clone()]);
        assert_eq!(pks.len(), 3);
        assert!(pks[0].as_packet().payload_unit_start_indicator());
        assert!(!pks[1].as_packet().payload_unit_start_indicator());
        assert!(!pks[2].as_packet().payload_unit_start_indicator());
        let ccs: Vec<u8> = pks
            .iter()
            .map(|pk| pk.as_packet().continuity_counter().count())
            .collect();
        assert_eq!(ccs, vec![0, 1, 2]);
        assert_eq!(p.continuity_counter().count(), 3);
        let mut data = pks[0].as_packet().payload().unwrap()[1..].to_vec();
        data.extend_from_slice(pks[1].as_packet().payload().unwrap());
        data.extend_from_slice(&pks[2].as_packet().payload().unwrap()[..45]);
        assert_eq!(&data[..], sect.bytes());
    }

    #[test]
    fn packed_sections_share_packets() {
        let sects: Vec<Section> = (0..3)
            .map(|n| Section::short(0x70, false, &[n; 20], PID))
            .collect();
        let pks = Packetizer::new(PID, StuffingPolicy::Never).packetize(&sects);
        assert_eq!(pks.len(), 1);
        let stuffed = Packetizer::new(PID, StuffingPolicy::Always).packetize(&sects);
        assert_eq!(stuffed.len(), 3);
    }

    #[test]
    fn pointer_to_section_starting_mid_packet() {
        // the second section starts 10 bytes into the payload of the second packet
        let first = long(0, 1, 183 + 10 - 12);
        let second = long(1, 1, 20);
        let pks = Packetizer::new(PID, StuffingPolicy::Never).packetize(&[first, second]);
        assert_eq!(pks.len(), 2);
        let pk = pks[1].as_packet();
        assert!(pk.payload_unit_start_indicator());
        assert_eq!(pk.payload().unwrap()[0], 10);
    }
}
