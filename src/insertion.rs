//! Pacing of the insertion of packets from a _sub_ stream into a _main_ stream.
//!
//! A typical use is a multiplexer replacing null packets of a main transport stream by packets
//! of some other stream (tables, data carousels, ...) at a given bitrate.  For each slot where
//! a packet could be inserted, the
//! [`PacketInsertionController`](struct.PacketInsertionController.html) tells whether it should
//! be, so that the proportion of inserted packets follows the ratio of the two bitrates.
//!
//! ```
//! use mpeg2ts_sections::insertion::PacketInsertionController;
//!
//! let mut ctl = PacketInsertionController::new();
//! ctl.set_main_bitrate(2_000_000);
//! ctl.set_sub_bitrate(100_000);
//! let mut inserted = 0;
//! for _ in 0..10_000 {
//!     if ctl.must_insert(0) {
//!         ctl.declare_sub_packets(1);
//!         inserted += 1;
//!     }
//!     ctl.declare_main_packets(1);
//! }
//! assert!((495..=505).contains(&inserted));
//! ```

use crate::BitRate;
use log::debug;
use std::fmt;

/// Which of the two streams a bitrate belongs to, for diagnostics.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Stream {
    Main,
    Sub,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Main => f.write_str("main"),
            Stream::Sub => f.write_str("sub"),
        }
    }
}

/// Latest value of a bitrate, along with the average of the values received since the last
/// significant change.
#[derive(Debug, Clone)]
struct BitRateControl {
    stream: Stream,
    value: BitRate,
    average: BitRate,
    count: u64,
}

impl BitRateControl {
    fn new(stream: Stream) -> BitRateControl {
        BitRateControl {
            stream,
            value: 0,
            average: 0,
            count: 0,
        }
    }

    /// Returns `true` if the change is large enough to invalidate the packet counts measured so
    /// far.
    fn set(&mut self, bitrate: BitRate, reset_percent: u64) -> bool {
        let reset = if bitrate == 0 {
            // unknown from now on; the counts are meaningless until a bitrate is known again
            self.count = 0;
            self.average = 0;
            false
        } else if self.count == 0 || self.average == 0 {
            self.average = bitrate;
            self.count = 1;
            true
        } else {
            let diff = bitrate.abs_diff(self.average);
            if u128::from(diff) * 100 > u128::from(self.average) * u128::from(reset_percent) {
                debug!(
                    "{} bitrate changed from {} to {} b/s, resetting insertion counts",
                    self.stream, self.average, bitrate
                );
                self.average = bitrate;
                self.count = 1;
                true
            } else {
                let total = u128::from(self.average) * u128::from(self.count) + u128::from(bitrate);
                self.count += 1;
                self.average = (total / u128::from(self.count)) as BitRate;
                false
            }
        };
        self.value = bitrate;
        reset
    }
}

/// Decides, slot by slot, whether a packet of the sub stream should be inserted in the main
/// stream.
///
/// The caller reports the packets of each stream as they are emitted, using
/// `declare_main_packets()` and `declare_sub_packets()`, and the bitrates of both streams as
/// they become known.  A packet is inserted when the sub stream is behind its share of the
/// output, i.e. when `main_packets × sub_bitrate ≥ sub_packets × main_bitrate`.  While either
/// bitrate is unknown, every opportunity is used.
///
/// When the basic rule says no but more than `wait_packets_alert()` sub packets are waiting,
/// insertion is _accelerated_: the sub bitrate is multiplied by an acceleration factor, counting
/// packets from the start of the acceleration phase.  The factor grows each time the backlog
/// reaches a new maximum, and returns to `1` once the backlog is back under the alert level.
#[derive(Debug, Clone)]
pub struct PacketInsertionController {
    main_packets: u64,
    sub_packets: u64,
    main_bitrate: BitRateControl,
    sub_bitrate: BitRateControl,
    wait_alert: usize,
    reset_percent: u64,
    accel_factor: u64,
    accel_main_packets: u64,
    accel_sub_packets: u64,
    accel_max_wait: usize,
}

impl Default for PacketInsertionController {
    fn default() -> PacketInsertionController {
        PacketInsertionController::new()
    }
}

impl PacketInsertionController {
    pub const DEFAULT_WAIT_ALERT: usize = 16;
    pub const DEFAULT_BITRATE_RESET_PERCENT: u64 = 10;

    pub fn new() -> PacketInsertionController {
        PacketInsertionController {
            main_packets: 0,
            sub_packets: 0,
            main_bitrate: BitRateControl::new(Stream::Main),
            sub_bitrate: BitRateControl::new(Stream::Sub),
            wait_alert: Self::DEFAULT_WAIT_ALERT,
            reset_percent: Self::DEFAULT_BITRATE_RESET_PERCENT,
            accel_factor: 1,
            accel_main_packets: 0,
            accel_sub_packets: 0,
            accel_max_wait: 0,
        }
    }

    /// Forget the packet counts and leave any acceleration phase.  Bitrates and settings are
    /// kept.
    pub fn reset(&mut self) {
        self.main_packets = 0;
        self.sub_packets = 0;
        self.accel_factor = 1;
        self.accel_main_packets = 0;
        self.accel_sub_packets = 0;
        self.accel_max_wait = 0;
    }

    pub fn declare_main_packets(&mut self, count: u64) {
        self.main_packets += count;
    }

    pub fn declare_sub_packets(&mut self, count: u64) {
        self.sub_packets += count;
    }

    /// Set the bitrate of the main stream, `0` meaning unknown.
    ///
    /// A value departing from the average of the previous ones by more than
    /// `bitrate_reset_percent()` resets the packet counts.
    pub fn set_main_bitrate(&mut self, bitrate: BitRate) {
        if self.main_bitrate.set(bitrate, self.reset_percent) {
            self.reset();
        }
    }

    /// Set the bitrate of the sub stream, `0` meaning unknown.
    pub fn set_sub_bitrate(&mut self, bitrate: BitRate) {
        if self.sub_bitrate.set(bitrate, self.reset_percent) {
            self.reset();
        }
    }

    /// Number of waiting sub packets above which insertion is accelerated.
    pub fn set_wait_packets_alert(&mut self, count: usize) {
        self.wait_alert = count;
    }

    /// Percentage of change of either bitrate beyond which the packet counts are reset.
    pub fn set_bitrate_reset_percent(&mut self, percent: u64) {
        self.reset_percent = percent;
    }

    pub fn main_packets(&self) -> u64 {
        self.main_packets
    }

    pub fn sub_packets(&self) -> u64 {
        self.sub_packets
    }

    pub fn main_bitrate(&self) -> BitRate {
        self.main_bitrate.value
    }

    pub fn sub_bitrate(&self) -> BitRate {
        self.sub_bitrate.value
    }

    pub fn wait_packets_alert(&self) -> usize {
        self.wait_alert
    }

    pub fn bitrate_reset_percent(&self) -> u64 {
        self.reset_percent
    }

    /// `1` outside of an acceleration phase.
    pub fn acceleration_factor(&self) -> u64 {
        self.accel_factor
    }

    /// Should a sub packet be inserted in the current slot of the main stream?
    ///
    /// `waiting_packets` is the number of sub packets currently waiting for insertion.  The
    /// decision does not count the inserted packet: the caller does so with
    /// `declare_sub_packets()`.
    pub fn must_insert(&mut self, waiting_packets: usize) -> bool {
        let main_bitrate = u128::from(self.main_bitrate.value);
        let sub_bitrate = u128::from(self.sub_bitrate.value);

        if waiting_packets <= self.wait_alert && self.accel_factor > 1 {
            debug!(
                "{} packets waiting, end of acceleration (factor was {})",
                waiting_packets, self.accel_factor
            );
            self.accel_factor = 1;
        }

        if main_bitrate == 0 || sub_bitrate == 0 {
            return true;
        }
        if u128::from(self.main_packets) * sub_bitrate
            >= u128::from(self.sub_packets) * main_bitrate
        {
            return true;
        }
        if waiting_packets <= self.wait_alert {
            return false;
        }

        if self.accel_factor == 1 {
            self.accel_factor = 2;
            self.accel_main_packets = self.main_packets;
            self.accel_sub_packets = self.sub_packets;
            self.accel_max_wait = waiting_packets;
            debug!(
                "{} packets waiting, starting acceleration at main: {}, sub: {}",
                waiting_packets, self.main_packets, self.sub_packets
            );
        } else if waiting_packets > self.accel_max_wait {
            self.accel_factor += 1;
            self.accel_max_wait = waiting_packets;
            debug!(
                "{} packets waiting, acceleration factor now {}",
                waiting_packets, self.accel_factor
            );
        }

        let main = u128::from(self.main_packets - self.accel_main_packets);
        let sub = u128::from(self.sub_packets - self.accel_sub_packets);
        main * sub_bitrate * u128::from(self.accel_factor) >= sub * main_bitrate
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(ctl: &mut PacketInsertionController, slots: usize) -> u64 {
        let mut inserted = 0;
        for _ in 0..slots {
            if ctl.must_insert(0) {
                ctl.declare_sub_packets(1);
                inserted += 1;
            }
            ctl.declare_main_packets(1);
        }
        inserted
    }

    #[test]
    fn unknown_bitrate_always_inserts() {
        let mut ctl = PacketInsertionController::new();
        assert_eq!(run(&mut ctl, 100), 100);
        ctl.set_main_bitrate(2_000_000);
        assert_eq!(run(&mut ctl, 100), 100);
    }

    #[test]
    fn convergence() {
        let mut ctl = PacketInsertionController::new();
        ctl.set_main_bitrate(2_000_000);
        ctl.set_sub_bitrate(100_000);
        let inserted = run(&mut ctl, 100_000);
        let expected = 100_000 * 100_000 / 2_000_000;
        assert!(
            inserted.abs_diff(expected) * 100 <= expected,
            "{} inserted, expected about {}",
            inserted,
            expected
        );
        assert_eq!(ctl.main_packets(), 100_000);
        assert_eq!(ctl.sub_packets(), inserted);
    }

    #[test]
    fn acceleration() {
        let mut ctl = PacketInsertionController::new();
        ctl.set_main_bitrate(2_000_000);
        ctl.set_sub_bitrate(100_000);
        ctl.declare_sub_packets(1);
        // behind schedule, but no backlog
        assert!(!ctl.must_insert(16));
        assert_eq!(ctl.acceleration_factor(), 1);

        assert!(ctl.must_insert(17));
        assert_eq!(ctl.acceleration_factor(), 2);
        ctl.declare_sub_packets(1);
        ctl.declare_main_packets(1);

        let mut previous = ctl.acceleration_factor();
        for waiting in [18, 18, 17, 25, 30, 30, 20] {
            ctl.must_insert(waiting);
            let factor = ctl.acceleration_factor();
            assert!(factor >= previous);
            previous = factor;
            ctl.declare_main_packets(1);
        }
        assert_eq!(ctl.acceleration_factor(), 5);

        assert!(!ctl.must_insert(16));
        assert_eq!(ctl.acceleration_factor(), 1);
    }

    #[test]
    fn accelerated_rate() {
        let mut ctl = PacketInsertionController::new();
        ctl.set_main_bitrate(2_000_000);
        ctl.set_sub_bitrate(100_000);
        ctl.declare_sub_packets(1);
        let mut inserted = 0;
        for _ in 0..1000 {
            if ctl.must_insert(17) {
                ctl.declare_sub_packets(1);
                inserted += 1;
            }
            ctl.declare_main_packets(1);
        }
        // twice the nominal rate, counted from the start of the acceleration
        assert_eq!(ctl.acceleration_factor(), 2);
        assert!((99..=102).contains(&inserted), "{} inserted", inserted);
    }

    #[test]
    fn bitrate_changes() {
        let mut ctl = PacketInsertionController::new();
        ctl.set_main_bitrate(2_000_000);
        ctl.set_sub_bitrate(100_000);
        ctl.declare_main_packets(100);
        ctl.declare_sub_packets(5);

        // within 10% of the average
        ctl.set_main_bitrate(2_100_000);
        assert_eq!(ctl.main_bitrate(), 2_100_000);
        assert_eq!(ctl.main_packets(), 100);
        assert_eq!(ctl.sub_packets(), 5);

        ctl.set_sub_bitrate(150_000);
        assert_eq!(ctl.sub_bitrate(), 150_000);
        assert_eq!(ctl.main_packets(), 0);
        assert_eq!(ctl.sub_packets(), 0);

        ctl.declare_main_packets(10);
        ctl.set_bitrate_reset_percent(50);
        ctl.set_main_bitrate(2_900_000);
        assert_eq!(ctl.main_packets(), 10);
    }

    #[test]
    fn reset_keeps_settings() {
        let mut ctl = PacketInsertionController::new();
        ctl.set_wait_packets_alert(4);
        ctl.set_main_bitrate(1_000_000);
        ctl.set_sub_bitrate(10_000);
        ctl.declare_sub_packets(1);
        ctl.must_insert(5);
        assert_eq!(ctl.acceleration_factor(), 2);
        ctl.reset();
        assert_eq!(ctl.acceleration_factor(), 1);
        assert_eq!(ctl.sub_packets(), 0);
        assert_eq!(ctl.wait_packets_alert(), 4);
        assert_eq!(ctl.main_bitrate(), 1_000_000);
    }
}
