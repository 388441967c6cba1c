//! Estimation of the bitrate of a transport stream from the _Program Clock References_ it
//! carries.

use crate::packet::{ClockRef, Packet, Pid};
use crate::BitRate;
use log::{debug, trace};
use std::collections::{HashMap, VecDeque};

// PCRs are normally sent at least every 100ms, so a gap of more than a second means that
// something was lost
const MAX_PCR_INTERVAL: u64 = ClockRef::SYSTEM_CLOCK_FREQUENCY;

#[derive(Debug, Clone, Copy)]
struct LastPcr {
    value: u64,
    packet_index: u64,
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    packets: u64,
    ticks: u64,
}

/// Measures the number of packets sent between consecutive PCRs of each PID, against the time
/// these PCRs say has passed.
///
/// The estimate covers the most recent intervals only, so that it follows changes of bitrate
/// in the stream.
#[derive(Debug)]
pub struct PcrAnalyzer {
    packet_count: u64,
    last_pcr: HashMap<Pid, LastPcr>,
    intervals: VecDeque<Interval>,
    total_packets: u64,
    total_ticks: u64,
    window: usize,
    min_intervals: usize,
}

impl Default for PcrAnalyzer {
    fn default() -> PcrAnalyzer {
        PcrAnalyzer::new(Self::DEFAULT_WINDOW, Self::DEFAULT_MIN_INTERVALS)
    }
}

impl PcrAnalyzer {
    /// Number of PCR intervals the estimate is computed over, by default.
    pub const DEFAULT_WINDOW: usize = 256;
    /// Number of PCR intervals required before an estimate is given, by default.
    pub const DEFAULT_MIN_INTERVALS: usize = 16;

    /// Panics if `window` is zero or `min_intervals` is greater than `window`.
    pub fn new(window: usize, min_intervals: usize) -> PcrAnalyzer {
        assert!(window > 0);
        assert!(min_intervals <= window);
        PcrAnalyzer {
            packet_count: 0,
            last_pcr: HashMap::new(),
            intervals: VecDeque::with_capacity(window),
            total_packets: 0,
            total_ticks: 0,
            window,
            min_intervals: min_intervals.max(1),
        }
    }

    /// Account for the next packet of the stream.
    pub fn feed_packet(&mut self, pk: &Packet<'_>) {
        let packet_index = self.packet_count;
        self.packet_count += 1;
        let af = match pk.adaptation_field() {
            Some(af) => af,
            None => return,
        };
        let pid = pk.pid();
        if af.discontinuity_indicator() {
            self.last_pcr.remove(&pid);
        }
        let pcr = match af.pcr() {
            Ok(pcr) => u64::from(pcr),
            Err(_) => return,
        };
        let current = LastPcr {
            value: pcr,
            packet_index,
        };
        if let Some(previous) = self.last_pcr.insert(pid, current) {
            let ticks = if pcr >= previous.value {
                pcr - previous.value
            } else {
                pcr + ClockRef::WRAP - previous.value
            };
            if ticks == 0 || ticks > MAX_PCR_INTERVAL {
                debug!("{}: ignoring PCR interval of {} ticks", pid, ticks);
                return;
            }
            self.add_interval(Interval {
                packets: packet_index - previous.packet_index,
                ticks,
            });
        }
    }

    fn add_interval(&mut self, interval: Interval) {
        if self.intervals.len() == self.window {
            if let Some(oldest) = self.intervals.pop_front() {
                self.total_packets -= oldest.packets;
                self.total_ticks -= oldest.ticks;
            }
        }
        trace!(
            "PCR interval of {} packets over {} ticks",
            interval.packets,
            interval.ticks
        );
        self.total_packets += interval.packets;
        self.total_ticks += interval.ticks;
        self.intervals.push_back(interval);
    }

    /// `true` once enough PCR intervals were seen for `bitrate()` to give an estimate.
    pub fn valid(&self) -> bool {
        self.intervals.len() >= self.min_intervals
    }

    /// The estimated bitrate in bits per second, or `0` if not enough PCRs were seen.
    pub fn bitrate(&self) -> BitRate {
        if !self.valid() || self.total_ticks == 0 {
            return 0;
        }
        let bits = u128::from(self.total_packets)
            * Packet::SIZE as u128
            * 8
            * u128::from(ClockRef::SYSTEM_CLOCK_FREQUENCY);
        (bits / u128::from(self.total_ticks)) as BitRate
    }

    /// Number of packets fed since creation or the last `reset()`.
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn reset(&mut self) {
        self.packet_count = 0;
        self.last_pcr.clear();
        self.intervals.clear();
        self.total_packets = 0;
        self.total_ticks = 0;
    }
}
