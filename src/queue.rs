//! A bounded queue of packets, passing transport stream data from one producer thread to one
//! consumer thread.
//!
//! The writer asks for a _write window_ of free slots with
//! [`lock_write_buffer()`](struct.PacketQueue.html#method.lock_write_buffer), fills it without
//! holding the queue's lock, and publishes what it wrote with
//! [`WriteWindow::release()`](struct.WriteWindow.html#method.release).  The reader takes packets
//! with [`get_packet()`](struct.PacketQueue.html#method.get_packet) or
//! [`wait_packets()`](struct.PacketQueue.html#method.wait_packets).  When the queue is full, the
//! writer blocks until the reader frees some space.
//!
//! The end of the stream is signalled by the writer with `set_eof()`, after which the reader
//! still receives every packet published before.  `stop()` on the other hand asks both sides to
//! give up as soon as possible.
//!
//! ```
//! use mpeg2ts_sections::packet::TsPacket;
//! use mpeg2ts_sections::queue::PacketQueue;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let queue = Arc::new(PacketQueue::new(64));
//! let writer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         for _ in 0..100 {
//!             let mut window = queue.lock_write_buffer(1);
//!             window[0] = TsPacket::null();
//!             window.release(1);
//!         }
//!         queue.set_eof();
//!     })
//! };
//! let mut buf = [TsPacket::null(); 16];
//! let mut received = 0;
//! loop {
//!     let (count, _bitrate) = queue.wait_packets(&mut buf[..]);
//!     if count == 0 {
//!         break;
//!     }
//!     received += count;
//! }
//! writer.join().unwrap();
//! assert_eq!(received, 100);
//! ```

use crate::packet::TsPacket;
use crate::pcr::PcrAnalyzer;
use crate::BitRate;
use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use std::mem;
use std::ops::{Deref, DerefMut};

#[derive(Debug)]
struct QueueState {
    buffer: Vec<TsPacket>,
    read_index: usize,
    write_index: usize,
    count: usize,
    eof: bool,
    stopped: bool,
    bitrate: BitRate,
    pcr: PcrAnalyzer,
    // writer-side buffer, absent while a write window is open
    staging: Option<Vec<TsPacket>>,
    // incremented by reset(), so that a window opened before is not published after
    generation: u64,
}

impl QueueState {
    fn new(capacity: usize) -> QueueState {
        QueueState {
            buffer: vec![TsPacket::null(); capacity],
            read_index: 0,
            write_index: 0,
            count: 0,
            eof: false,
            stopped: false,
            bitrate: 0,
            pcr: PcrAnalyzer::default(),
            staging: Some(Vec::new()),
            generation: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of free slots from `write_index` onwards, before either the end of the buffer or
    /// the oldest unread packet.
    fn contiguous_free(&self) -> usize {
        if self.count == self.capacity() {
            0
        } else if self.read_index > self.write_index {
            self.read_index - self.write_index
        } else {
            self.capacity() - self.write_index
        }
    }

    fn current_bitrate(&self) -> BitRate {
        if self.bitrate != 0 {
            self.bitrate
        } else {
            self.pcr.bitrate()
        }
    }
}

/// A fixed-capacity FIFO of packets shared between exactly one writer thread and one reader
/// thread, typically through an `Arc<PacketQueue>`.
///
/// Along with each packet read, the queue reports the bitrate of the stream: either the value
/// given by the writer with `set_bitrate()` or, when the writer gives none, an estimate made
/// from the PCRs of the packets passing through the queue.
#[derive(Debug)]
pub struct PacketQueue {
    state: Mutex<QueueState>,
    enqueued: Condvar,
    dequeued: Condvar,
}

impl PacketQueue {
    /// Default capacity, in packets.
    pub const DEFAULT_SIZE: usize = 1000;

    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> PacketQueue {
        assert!(capacity > 0, "PacketQueue capacity must not be zero");
        PacketQueue {
            state: Mutex::new(QueueState::new(capacity)),
            enqueued: Condvar::new(),
            dequeued: Condvar::new(),
        }
    }

    /// Empty the queue and change its capacity, clearing the end-of-file and stop conditions,
    /// the bitrate and the bitrate estimate.
    ///
    /// Packets written in a window opened before the reset are never published.
    /// Panics if `capacity` is zero.
    pub fn reset(&self, capacity: usize) {
        assert!(capacity > 0, "PacketQueue capacity must not be zero");
        let mut state = self.state.lock();
        state.buffer = vec![TsPacket::null(); capacity];
        state.read_index = 0;
        state.write_index = 0;
        state.count = 0;
        state.eof = false;
        state.stopped = false;
        state.bitrate = 0;
        state.pcr.reset();
        state.generation += 1;
        self.dequeued.notify_all();
    }

    /// Capacity of the queue, in packets.
    pub fn buffer_size(&self) -> usize {
        self.state.lock().capacity()
    }

    /// Number of packets published by the writer and not yet read.
    pub fn current_size(&self) -> usize {
        self.state.lock().count
    }

    /// `true` once the writer has called `set_eof()`, even if packets remain to be read.
    pub fn eof(&self) -> bool {
        self.state.lock().eof
    }

    pub fn stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// The bitrate reported to the reader: the one set by the writer, otherwise the PCR based
    /// estimate, otherwise `0`.
    pub fn bitrate(&self) -> BitRate {
        self.state.lock().current_bitrate()
    }

    // ---- writer side ----

    /// Wait for at least `min_size` contiguous free slots (at least one, and no more than remain
    /// before the end of the underlying buffer) and return a window over all the contiguous
    /// free slots.
    ///
    /// If the queue is stopped, returns immediately with an empty window.
    ///
    /// Panics if another write window from this queue is still open.
    pub fn lock_write_buffer(&self, min_size: usize) -> WriteWindow<'_> {
        let mut state = self.state.lock();
        let mut staging = match state.staging.take() {
            Some(staging) => staging,
            None => panic!("PacketQueue: a write window is already open"),
        };
        loop {
            // the capacity may change while waiting, if the queue is reset
            let wanted = min_size.max(1).min(state.capacity() - state.write_index);
            if state.stopped || state.contiguous_free() >= wanted {
                break;
            }
            trace!("writer waiting for {} free slots", wanted);
            self.dequeued.wait(&mut state);
        }
        let size = if state.stopped {
            0
        } else {
            state.contiguous_free()
        };
        staging.clear();
        staging.resize(size, TsPacket::null());
        WriteWindow {
            queue: self,
            staging,
            generation: state.generation,
            done: false,
        }
    }

    fn publish(&self, staging: &mut Vec<TsPacket>, generation: u64, count: usize) -> usize {
        let mut state = self.state.lock();
        let mut published = 0;
        if state.generation == generation && !state.stopped {
            published = count.min(staging.len()).min(state.contiguous_free());
            let start = state.write_index;
            state.buffer[start..start + published].copy_from_slice(&staging[..published]);
            if state.bitrate == 0 {
                for pk in &staging[..published] {
                    state.pcr.feed_packet(&pk.as_packet());
                }
            }
            state.write_index = (start + published) % state.capacity();
            state.count += published;
            if published > 0 {
                self.enqueued.notify_one();
            }
        } else if count > 0 {
            debug!("discarding {} packets written to a stale or stopped queue", count);
        }
        staging.clear();
        state.staging = Some(mem::take(staging));
        published
    }

    /// Set the bitrate of the stream, as known by the writer; `0` means unknown and lets the
    /// queue estimate it.
    pub fn set_bitrate(&self, bitrate: BitRate) {
        self.state.lock().bitrate = bitrate;
    }

    /// Signal that the writer will publish no more packets.
    pub fn set_eof(&self) {
        let mut state = self.state.lock();
        state.eof = true;
        self.enqueued.notify_all();
    }

    // ---- reader side ----

    /// Take the oldest packet, without waiting, along with the current bitrate.
    pub fn get_packet(&self) -> Option<(TsPacket, BitRate)> {
        let mut state = self.state.lock();
        if state.count == 0 {
            return None;
        }
        let pk = state.buffer[state.read_index];
        state.read_index = (state.read_index + 1) % state.capacity();
        state.count -= 1;
        self.dequeued.notify_one();
        Some((pk, state.current_bitrate()))
    }

    /// Wait for at least one packet and copy as many as are available, up to the size of
    /// `buf`.  Returns the number of packets copied and the current bitrate.
    ///
    /// A count of `0` means that the end of the stream was reached (all packets published
    /// before `set_eof()` have been read) or that the queue was stopped.
    pub fn wait_packets(&self, buf: &mut [TsPacket]) -> (usize, BitRate) {
        let mut state = self.state.lock();
        if buf.is_empty() {
            return (0, state.current_bitrate());
        }
        while state.count == 0 && !state.eof && !state.stopped {
            self.enqueued.wait(&mut state);
        }
        if state.stopped {
            return (0, state.current_bitrate());
        }
        let count = state.count.min(buf.len());
        let mut copied = 0;
        while copied < count {
            let start = state.read_index;
            let run = (count - copied).min(state.capacity() - start);
            buf[copied..copied + run].copy_from_slice(&state.buffer[start..start + run]);
            state.read_index = (start + run) % state.capacity();
            copied += run;
        }
        state.count -= count;
        if count > 0 {
            self.dequeued.notify_one();
        }
        (count, state.current_bitrate())
    }

    /// Ask both sides to stop.  A blocked writer returns with an empty window, a blocked reader
    /// with no packets; this is permanent until `reset()`.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        self.enqueued.notify_all();
        self.dequeued.notify_all();
    }
}

impl Default for PacketQueue {
    fn default() -> PacketQueue {
        PacketQueue::new(Self::DEFAULT_SIZE)
    }
}

/// Free slots of a [`PacketQueue`](struct.PacketQueue.html), as returned by `lock_write_buffer()`.
///
/// Dereferences to a slice of packets which the writer fills in from the start.  The packets
/// become visible to the reader on `release()`; dropping the window without releasing it
/// publishes nothing.
#[derive(Debug)]
pub struct WriteWindow<'q> {
    queue: &'q PacketQueue,
    staging: Vec<TsPacket>,
    generation: u64,
    done: bool,
}

impl<'q> WriteWindow<'q> {
    /// Publish the first `count` packets of the window (at most the window's length), returning
    /// the number actually published.
    ///
    /// Fewer packets are published if the queue was stopped or reset in the meantime.
    pub fn release(mut self, count: usize) -> usize {
        self.finish(count)
    }

    fn finish(&mut self, count: usize) -> usize {
        self.done = true;
        self.queue.publish(&mut self.staging, self.generation, count)
    }
}

impl<'q> Deref for WriteWindow<'q> {
    type Target = [TsPacket];

    fn deref(&self) -> &[TsPacket] {
        &self.staging[..]
    }
}

impl<'q> DerefMut for WriteWindow<'q> {
    fn deref_mut(&mut self) -> &mut [TsPacket] {
        &mut self.staging[..]
    }
}

impl<'q> Drop for WriteWindow<'q> {
    fn drop(&mut self) {
        if !self.done {
            self.finish(0);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::{ClockRef, ContinuityCounter, Pid};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn numbered(n: usize) -> TsPacket {
        let mut pk = TsPacket::payload_only(
            Pid::new(0x100),
            ContinuityCounter::new((n % 16) as u8),
        );
        pk.payload_mut()[..8].copy_from_slice(&(n as u64).to_be_bytes());
        pk
    }

    fn number_of(pk: &TsPacket) -> usize {
        let mut b = [0u8; 8];
        b.copy_from_slice(&pk.as_bytes()[4..12]);
        u64::from_be_bytes(b) as usize
    }

    fn write(queue: &PacketQueue, from: usize, count: usize) {
        let mut window = queue.lock_write_buffer(count);
        assert!(window.len() >= count);
        for i in 0..count {
            window[i] = numbered(from + i);
        }
        assert_eq!(window.release(count), count);
    }

    fn wait_until<F: Fn() -> bool>(cond: F) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn fifo() {
        let queue = PacketQueue::new(8);
        assert_eq!(queue.buffer_size(), 8);
        write(&queue, 0, 5);
        assert_eq!(queue.current_size(), 5);
        for n in 0..5 {
            let (pk, bitrate) = queue.get_packet().unwrap();
            assert_eq!(number_of(&pk), n);
            assert_eq!(bitrate, 0);
        }
        assert!(queue.get_packet().is_none());
    }

    #[test]
    fn window_stops_at_end_of_buffer() {
        let queue = PacketQueue::new(4);
        write(&queue, 0, 3);
        queue.get_packet().unwrap();
        queue.get_packet().unwrap();
        // one slot before the end of the ring, whatever the requested size
        {
            let window = queue.lock_write_buffer(3);
            assert_eq!(window.len(), 1);
        }
        write(&queue, 3, 1);
        // then the slots freed at the start
        let window = queue.lock_write_buffer(1);
        assert_eq!(window.len(), 2);
        drop(window);
        write(&queue, 4, 2);
        let mut buf = [TsPacket::null(); 10];
        let (count, _) = queue.wait_packets(&mut buf[..]);
        assert_eq!(count, 4);
        let numbers: Vec<usize> = buf[..count].iter().map(number_of).collect();
        assert_eq!(numbers, vec![2, 3, 4, 5]);
    }

    #[test]
    fn dropped_window_publishes_nothing() {
        let queue = PacketQueue::new(4);
        {
            let mut window = queue.lock_write_buffer(1);
            window[0] = numbered(1);
        }
        assert_eq!(queue.current_size(), 0);
        // the window can be opened again
        write(&queue, 7, 1);
        assert_eq!(number_of(&queue.get_packet().unwrap().0), 7);
    }

    #[test]
    fn release_is_clamped() {
        let queue = PacketQueue::new(4);
        let window = queue.lock_write_buffer(1);
        assert_eq!(window.release(10), 4);
        assert_eq!(queue.current_size(), 4);
    }

    #[test]
    #[should_panic]
    fn one_window_at_a_time() {
        let queue = PacketQueue::new(4);
        let _first = queue.lock_write_buffer(1);
        let _second = queue.lock_write_buffer(1);
    }

    #[test]
    fn writer_blocks_when_full() {
        const K: usize = 4;
        let queue = Arc::new(PacketQueue::new(K));
        let written = Arc::new(AtomicUsize::new(0));
        let writer = {
            let queue = queue.clone();
            let written = written.clone();
            thread::spawn(move || {
                for n in 0..K + 5 {
                    write(&queue, n, 1);
                    written.fetch_add(1, Ordering::SeqCst);
                }
                queue.set_eof();
            })
        };
        wait_until(|| written.load(Ordering::SeqCst) == K);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(written.load(Ordering::SeqCst), K);
        assert_eq!(queue.current_size(), K);

        let mut received = vec![];
        let mut buf = [TsPacket::null(); 3];
        loop {
            let (count, _) = queue.wait_packets(&mut buf[..]);
            if count == 0 {
                break;
            }
            received.extend(buf[..count].iter().map(number_of));
            thread::sleep(Duration::from_millis(2));
        }
        writer.join().unwrap();
        assert_eq!(received, (0..K + 5).collect::<Vec<_>>());
        assert!(queue.eof());
    }

    #[test]
    fn stop_releases_blocked_writer() {
        let queue = Arc::new(PacketQueue::new(2));
        write(&queue, 0, 2);
        let writer = {
            let queue = queue.clone();
            thread::spawn(move || queue.lock_write_buffer(1).len())
        };
        thread::sleep(Duration::from_millis(20));
        queue.stop();
        assert_eq!(writer.join().unwrap(), 0);
        assert!(queue.stopped());
        let mut buf = [TsPacket::null(); 2];
        assert_eq!(queue.wait_packets(&mut buf[..]).0, 0);
        assert_eq!(queue.lock_write_buffer(1).len(), 0);
    }

    #[test]
    fn stop_releases_blocked_reader() {
        let queue = Arc::new(PacketQueue::new(2));
        let reader = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut buf = [TsPacket::null(); 2];
                queue.wait_packets(&mut buf[..]).0
            })
        };
        thread::sleep(Duration::from_millis(20));
        queue.stop();
        assert_eq!(reader.join().unwrap(), 0);
    }

    #[test]
    fn eof_drains_remaining_packets() {
        let queue = PacketQueue::new(8);
        write(&queue, 0, 3);
        queue.set_eof();
        let mut buf = [TsPacket::null(); 8];
        assert_eq!(queue.wait_packets(&mut buf[..]).0, 3);
        assert_eq!(queue.wait_packets(&mut buf[..]).0, 0);
        assert!(queue.eof());
    }

    #[test]
    fn reset() {
        let queue = PacketQueue::new(4);
        write(&queue, 0, 2);
        queue.set_bitrate(5_000_000);
        queue.set_eof();
        queue.stop();
        queue.reset(16);
        assert_eq!(queue.buffer_size(), 16);
        assert_eq!(queue.current_size(), 0);
        assert!(!queue.eof());
        assert!(!queue.stopped());
        assert_eq!(queue.bitrate(), 0);
        write(&queue, 0, 16);
    }

    #[test]
    fn reset_releases_writer_waiting_on_old_capacity() {
        let queue = Arc::new(PacketQueue::new(8));
        write(&queue, 0, 8);
        let writer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let window = queue.lock_write_buffer(4);
                let len = window.len();
                window.release(len)
            })
        };
        thread::sleep(Duration::from_millis(20));
        queue.reset(2);
        assert_eq!(writer.join().unwrap(), 2);
        assert_eq!(queue.current_size(), 2);
    }

    #[test]
    fn window_open_across_reset_is_discarded() {
        let queue = PacketQueue::new(4);
        let window = queue.lock_write_buffer(1);
        queue.reset(4);
        assert_eq!(window.release(1), 0);
        assert_eq!(queue.current_size(), 0);
    }

    #[test]
    fn explicit_bitrate() {
        let queue = PacketQueue::new(4);
        queue.set_bitrate(3_000_000);
        write(&queue, 0, 1);
        assert_eq!(queue.get_packet().unwrap().1, 3_000_000);
    }

    #[test]
    fn estimated_bitrate() {
        // a PCR every 10 packets, 10 packets per 270000 ticks: 1504000 b/s
        let queue = PacketQueue::new(40);
        let mut cc = ContinuityCounter::new(0);
        for n in 0..30u64 {
            let mut window = queue.lock_write_buffer(10);
            assert!(window.len() >= 10);
            window[0] = TsPacket::pcr_only(Pid::new(0x1ff), cc, ClockRef::from_ticks(n * 270_000));
            for i in 1..10 {
                window[i] = TsPacket::null();
            }
            window.release(10);
            cc = cc.next();
            let mut buf = [TsPacket::null(); 10];
            assert_eq!(queue.wait_packets(&mut buf[..]).0, 10);
        }
        assert_eq!(queue.bitrate(), 1_504_000);
    }
}
