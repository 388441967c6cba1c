//! Extraction of sections and tables from the packets of a transport stream.
//!
//! A [`SectionDemux`](struct.SectionDemux.html) is given every packet of the stream (or only
//! some of them) and, for the PIDs selected by its filter, reassembles the sections carried in
//! their payloads.  Valid sections are passed either one by one to a
//! [`SectionHandler`](trait.SectionHandler.html) or, once all the sections of a table version
//! have been received, as a [`BinaryTable`](../psi/table/struct.BinaryTable.html) to a
//! [`TableHandler`](trait.TableHandler.html).
//!
//! Lost or damaged data is expected in a broadcast stream.  It is counted in the
//! [`DemuxStatus`](struct.DemuxStatus.html) and the demultiplexer resynchronises on the next
//! section start; it is never reported as an error to the caller.
//!
//! ```
//! use mpeg2ts_sections::demultiplex::{DemuxContext, SectionDemux};
//! use mpeg2ts_sections::packet::Pid;
//! use mpeg2ts_sections::psi::BinaryTable;
//!
//! let mut demux = SectionDemux::new();
//! demux.add_pid(Pid::PAT);
//! demux.set_table_handler(|_ctx: &mut DemuxContext, table: &BinaryTable| {
//!     println!("table {:#04x} version {}", table.table_id(), table.version());
//! });
//! # let data = [0u8; 0];
//! // ... for each buffer of transport stream data read,
//! demux.push(&data[..]);
//! ```

use crate::packet::{ContinuityCounter, Packet, Pid};
use crate::psi::{BinaryTable, CrcValidation, Etid, Section, SectionCommonHeader, SectionError};
use fixedbitset::FixedBitSet;
use log::{debug, error, trace, warn};
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};

/// Receives each complete table demultiplexed by a `SectionDemux`.
///
/// Each version of a table is delivered once, when its last missing section arrives.
/// Implemented for closures taking the same arguments.
pub trait TableHandler {
    fn handle_table(&mut self, ctx: &mut DemuxContext, table: &BinaryTable);
}

impl<F> TableHandler for F
where
    F: FnMut(&mut DemuxContext, &BinaryTable),
{
    fn handle_table(&mut self, ctx: &mut DemuxContext, table: &BinaryTable) {
        (self)(ctx, table)
    }
}

/// Receives each valid section demultiplexed by a `SectionDemux`, including repetitions.
pub trait SectionHandler {
    fn handle_section(&mut self, ctx: &mut DemuxContext, section: &Section);
}

impl<F> SectionHandler for F
where
    F: FnMut(&mut DemuxContext, &Section),
{
    fn handle_section(&mut self, ctx: &mut DemuxContext, section: &Section) {
        (self)(ctx, section)
    }
}

/// Receives the raw bytes of sections which were extracted from the stream, but which are not
/// valid, together with a diagnosis of the problem.
pub trait InvalidSectionHandler {
    fn handle_invalid_section(
        &mut self,
        ctx: &mut DemuxContext,
        pid: Pid,
        data: &[u8],
        error: &SectionError,
    );
}

impl<F> InvalidSectionHandler for F
where
    F: FnMut(&mut DemuxContext, Pid, &[u8], &SectionError),
{
    fn handle_invalid_section(
        &mut self,
        ctx: &mut DemuxContext,
        pid: Pid,
        data: &[u8],
        error: &SectionError,
    ) {
        (self)(ctx, pid, data, error)
    }
}

/// How valid sections are delivered to calling code.
pub enum Delivery {
    /// Sections are gathered into tables, and complete tables are passed to the handler
    Tables(Box<dyn TableHandler>),
    /// Every valid section is passed to the handler as soon as it is complete
    Sections(Box<dyn SectionHandler>),
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Tables(_) => f.write_str("Delivery::Tables"),
            Delivery::Sections(_) => f.write_str("Delivery::Sections"),
        }
    }
}

/// Options controlling which sections a `SectionDemux` delivers.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DemuxOptions {
    /// Whether the CRC of long sections is checked
    pub crc_validation: CrcValidation,
    /// Deliver long sections with _current_next_indicator_ set (default `true`)
    pub current: bool,
    /// Deliver long sections with _current_next_indicator_ clear (default `false`)
    pub next: bool,
    /// Count sections which repeat the section number and version of a known section, but
    /// with different content (default `false`)
    pub track_invalid_version: bool,
}

impl Default for DemuxOptions {
    fn default() -> DemuxOptions {
        DemuxOptions {
            crc_validation: CrcValidation::Check,
            current: true,
            next: false,
            track_invalid_version: false,
        }
    }
}

impl DemuxOptions {
    pub fn with_crc_validation(mut self, crc_validation: CrcValidation) -> DemuxOptions {
        self.crc_validation = crc_validation;
        self
    }
    pub fn with_current(mut self, current: bool) -> DemuxOptions {
        self.current = current;
        self
    }
    pub fn with_next(mut self, next: bool) -> DemuxOptions {
        self.next = next;
        self
    }
    pub fn with_track_invalid_version(mut self, track: bool) -> DemuxOptions {
        self.track_invalid_version = track;
        self
    }
}

/// Cumulative counts of the problems found in the demultiplexed stream.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct DemuxStatus {
    /// Packets given to `push()` without the sync byte
    pub invalid_ts: u64,
    /// Continuity counter errors on filtered PIDs
    pub discontinuities: u64,
    /// Scrambled packets on filtered PIDs
    pub scrambled: u64,
    /// Sections abandoned because a new section started before they were complete
    pub truncated_sections: u64,
    /// Sections whose length is inconsistent
    pub invalid_section_length: u64,
    /// Long sections whose section number is greater than their last section number
    pub invalid_section_number: u64,
    /// Long sections failing the CRC check
    pub wrong_crc: u64,
    /// Sections whose content changed without a change of version
    pub invalid_version: u64,
    /// Ignored sections whose _current_next_indicator_ denotes a future table
    pub is_next: u64,
}

impl DemuxStatus {
    /// `true` if any counter other than `is_next` is non-zero.
    pub fn has_errors(&self) -> bool {
        self.invalid_ts != 0
            || self.discontinuities != 0
            || self.scrambled != 0
            || self.truncated_sections != 0
            || self.invalid_section_length != 0
            || self.invalid_section_number != 0
            || self.wrong_crc != 0
            || self.invalid_version != 0
    }
}

impl fmt::Display for DemuxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid TS packets: {}, discontinuities: {}, scrambled packets: {}, \
             truncated sections: {}, invalid section lengths: {}, invalid section numbers: {}, \
             CRC errors: {}, invalid versions: {}, next sections ignored: {}",
            self.invalid_ts,
            self.discontinuities,
            self.scrambled,
            self.truncated_sections,
            self.invalid_section_length,
            self.invalid_section_number,
            self.wrong_crc,
            self.invalid_version,
            self.is_next
        )
    }
}

// A handler can't change the PID filter of the demux which is calling it, so this changeset
// protocol allows a handler to record the filter updates it needs, and the demultiplexer
// applies them once the current packet is fully processed

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum FilterChange {
    Insert(Pid),
    Remove(Pid),
}

#[derive(Debug, Default)]
struct FilterChangeset {
    updates: Vec<FilterChange>,
}

impl FilterChangeset {
    fn insert(&mut self, pid: Pid) {
        self.updates.push(FilterChange::Insert(pid))
    }
    fn remove(&mut self, pid: Pid) {
        self.updates.push(FilterChange::Remove(pid))
    }
    fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
    /// The filter state for the given PID once pending changes are applied, if any change
    /// is pending.
    fn pending(&self, pid: Pid) -> Option<bool> {
        self.updates.iter().rev().find_map(|c| match *c {
            FilterChange::Insert(p) if p == pid => Some(true),
            FilterChange::Remove(p) if p == pid => Some(false),
            _ => None,
        })
    }
}

/// State of a `SectionDemux` visible to the handlers it calls.
///
/// PID filter changes requested here take effect once the packet being processed has been
/// fully handled.
#[derive(Debug)]
pub struct DemuxContext {
    status: DemuxStatus,
    filter: FixedBitSet,
    changeset: FilterChangeset,
}

impl DemuxContext {
    fn new() -> DemuxContext {
        DemuxContext {
            status: DemuxStatus::default(),
            filter: FixedBitSet::with_capacity(Pid::PID_COUNT),
            changeset: FilterChangeset::default(),
        }
    }

    /// The demultiplexer's counters, as of the call to the handler.
    pub fn status(&self) -> &DemuxStatus {
        &self.status
    }

    /// `true` if the PID is (or, once pending changes are applied, will be) filtered.
    pub fn has_pid(&self, pid: Pid) -> bool {
        self.changeset
            .pending(pid)
            .unwrap_or_else(|| self.filter.contains(usize::from(pid)))
    }

    /// Start demultiplexing the given PID after the current packet.
    pub fn add_pid(&mut self, pid: Pid) {
        self.changeset.insert(pid);
    }

    /// Stop demultiplexing the given PID after the current packet, discarding its state.
    pub fn remove_pid(&mut self, pid: Pid) {
        self.changeset.remove(pid);
    }

    fn apply_filter_changes(&mut self, pids: &mut [Option<PidContext>]) {
        for change in self.changeset.updates.drain(..) {
            match change {
                FilterChange::Insert(pid) => self.filter.insert(usize::from(pid)),
                FilterChange::Remove(pid) => {
                    self.filter.set(usize::from(pid), false);
                    pids[usize::from(pid)] = None;
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum SyncState {
    /// waiting for a packet with `payload_unit_start_indicator`
    Idle,
    /// the buffer holds the start of a section
    Accumulating,
}

#[derive(Debug, Default)]
struct TableContext {
    table: BinaryTable,
    notified: bool,
}

enum Staged {
    Section(Section),
    Malformed { data: Vec<u8>, error: SectionError },
}

#[derive(Debug)]
struct PidContext {
    pid: Pid,
    continuity: Option<ContinuityCounter>,
    duplicate_seen: bool,
    state: SyncState,
    buf: Vec<u8>,
    tables: HashMap<Etid, TableContext>,
}

impl PidContext {
    fn new(pid: Pid) -> PidContext {
        PidContext {
            pid,
            continuity: None,
            duplicate_seen: false,
            state: SyncState::Idle,
            buf: Vec::new(),
            tables: HashMap::new(),
        }
    }

    fn lose_sync(&mut self) {
        self.state = SyncState::Idle;
        self.buf.clear();
    }

    /// Returns `false` if the packet is a duplicate that must be ignored.
    fn check_continuity(&mut self, pk: &Packet<'_>, status: &mut DemuxStatus) -> bool {
        let cc = pk.continuity_counter();
        let discontinuity_signalled = pk
            .adaptation_field()
            .map(|af| af.discontinuity_indicator())
            .unwrap_or(false);
        let last = match self.continuity.replace(cc) {
            None => {
                self.duplicate_seen = false;
                return true;
            }
            Some(_) if discontinuity_signalled => {
                // any counter value is legal, so packets may have been lost unnoticed
                trace!("{}: signalled discontinuity", self.pid);
                self.duplicate_seen = false;
                self.lose_sync();
                return true;
            }
            Some(last) => last,
        };
        let in_sequence = if pk.adaptation_control().has_payload() {
            if cc.follows(last) {
                true
            } else if cc == last && !self.duplicate_seen {
                trace!("{}: ignoring duplicate packet", self.pid);
                self.duplicate_seen = true;
                return false;
            } else {
                false
            }
        } else {
            cc == last
        };
        self.duplicate_seen = false;
        if !in_sequence {
            debug!(
                "{}: continuity counter {} does not follow {}",
                self.pid,
                cc.count(),
                last.count()
            );
            status.discontinuities += 1;
            self.lose_sync();
        }
        true
    }

    fn consume(
        &mut self,
        pk: &Packet<'_>,
        status: &mut DemuxStatus,
        crc_validation: CrcValidation,
        out: &mut Vec<Staged>,
    ) {
        if !self.check_continuity(pk, status) {
            return;
        }
        if pk.transport_scrambling_control().is_scrambled() {
            status.scrambled += 1;
            self.lose_sync();
            return;
        }
        let payload = match pk.payload() {
            Some(payload) => payload,
            None => return,
        };
        if pk.payload_unit_start_indicator() {
            // this packet payload contains the start of a new section
            let pointer = usize::from(payload[0]);
            let section_data = &payload[1..];
            if pointer > section_data.len() {
                warn!("{}: PSI pointer beyond end of packet payload", self.pid);
                self.lose_sync();
                return;
            }
            let (remainder, next_sect) = section_data.split_at(pointer);
            if self.state == SyncState::Accumulating {
                self.buf.extend_from_slice(remainder);
                self.extract(crc_validation, out);
                if !self.buf.is_empty() {
                    debug!(
                        "{}: section incomplete with {} bytes when the next section started",
                        self.pid,
                        self.buf.len()
                    );
                    status.truncated_sections += 1;
                }
            }
            self.buf.clear();
            self.buf.extend_from_slice(next_sect);
            self.state = SyncState::Accumulating;
        } else if self.state == SyncState::Accumulating {
            // this packet is a continuation of an existing section
            self.buf.extend_from_slice(payload);
        } else {
            return;
        }
        self.extract(crc_validation, out);
        if self.buf.is_empty() {
            self.state = SyncState::Idle;
        }
    }

    /// Split all complete sections off the start of the buffer.
    fn extract(&mut self, crc_validation: CrcValidation, out: &mut Vec<Staged>) {
        let mut start = 0;
        while start < self.buf.len() {
            let rest = &self.buf[start..];
            if rest[0] == 0xff {
                // a table_id of 0xff means the remainder of the payload is stuffing
                self.lose_sync();
                return;
            }
            if rest.len() < SectionCommonHeader::SIZE {
                break;
            }
            let header = SectionCommonHeader::new(&rest[..SectionCommonHeader::SIZE]);
            let size = header.total_size();
            if size > Section::MAX_SIZE {
                warn!(
                    "{}: section_length {} is too large, limit is {} bytes",
                    self.pid,
                    header.section_length,
                    Section::MAX_SIZE - SectionCommonHeader::SIZE
                );
                out.push(Staged::Malformed {
                    data: rest.to_vec(),
                    error: SectionError::TooLong { declared: size },
                });
                self.lose_sync();
                return;
            }
            if rest.len() < size {
                break;
            }
            out.push(Staged::Section(Section::with_crc_validation(
                &rest[..size],
                self.pid,
                crc_validation,
            )));
            start += size;
        }
        self.buf.drain(..start);
    }

    /// Add a valid long section to its table, returning the table if this section made it
    /// complete for the first time.
    fn add_to_table(
        &mut self,
        section: Section,
        track_invalid_version: bool,
        status: &mut DemuxStatus,
    ) -> Option<BinaryTable> {
        let ctx = self.tables.entry(section.etid()).or_default();
        let same_version = ctx.table.version() == section.version()
            && ctx.table.current_next() == section.current_next();
        let same_shape =
            ctx.table.expected_section_count() == usize::from(section.last_section_number()) + 1;
        if !ctx.table.is_empty() && same_version && !same_shape {
            // the table changed without a new version number
            debug!(
                "{}: table {:?} version {} now has {} sections instead of {}",
                self.pid,
                section.etid(),
                section.version(),
                usize::from(section.last_section_number()) + 1,
                ctx.table.expected_section_count()
            );
            if track_invalid_version {
                status.invalid_version += 1;
            }
            if ctx.notified {
                return None;
            }
        }
        if !ctx.table.is_empty() && !(same_version && same_shape) {
            trace!(
                "{}: table {:?} replaced by version {}",
                self.pid,
                section.etid(),
                section.version()
            );
            ctx.table.clear();
            ctx.notified = false;
        }
        if let Some(existing) = ctx.table.section(section.section_number()) {
            if track_invalid_version && !existing.same_content(&section) {
                debug!(
                    "{}: section {} of table {:?} version {} changed without a version change",
                    self.pid,
                    section.section_number(),
                    section.etid(),
                    section.version()
                );
                status.invalid_version += 1;
            }
            return None;
        }
        match ctx.table.add_section(section) {
            Ok(true) if !ctx.notified => {
                ctx.notified = true;
                Some(ctx.table.clone())
            }
            Ok(_) => None,
            Err(e) => {
                warn!("{}: section not added to table: {}", self.pid, e);
                None
            }
        }
    }
}

fn guarded<F: FnOnce()>(kind: &str, pid: Pid, f: F) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!("{} handler panicked while handling pid {}", kind, pid);
    }
}

/// Reassembles the sections carried on a set of PIDs, delivering them as sections or as
/// complete tables.
///
/// Initially no PID is filtered and no handler is bound.
pub struct SectionDemux {
    options: DemuxOptions,
    ctx: DemuxContext,
    pids: Vec<Option<PidContext>>,
    delivery: Option<Delivery>,
    invalid_handler: Option<Box<dyn InvalidSectionHandler>>,
    staged: Vec<Staged>,
    packet_count: u64,
}

impl Default for SectionDemux {
    fn default() -> SectionDemux {
        SectionDemux::with_options(DemuxOptions::default())
    }
}

impl SectionDemux {
    pub fn new() -> SectionDemux {
        SectionDemux::default()
    }

    pub fn with_options(options: DemuxOptions) -> SectionDemux {
        SectionDemux {
            options,
            ctx: DemuxContext::new(),
            pids: (0..Pid::PID_COUNT).map(|_| None).collect(),
            delivery: None,
            invalid_handler: None,
            staged: Vec::new(),
            packet_count: 0,
        }
    }

    /// Deliver complete tables to the given handler, replacing any handler previously set.
    pub fn set_table_handler<H: TableHandler + 'static>(&mut self, handler: H) {
        self.set_delivery(Delivery::Tables(Box::new(handler)));
    }

    /// Deliver individual sections to the given handler, replacing any handler previously set.
    pub fn set_section_handler<H: SectionHandler + 'static>(&mut self, handler: H) {
        self.set_delivery(Delivery::Sections(Box::new(handler)));
    }

    pub fn set_delivery(&mut self, delivery: Delivery) {
        self.delivery = Some(delivery);
    }

    /// Remove the table or section handler.  Sections are then still validated and counted.
    pub fn clear_handler(&mut self) {
        self.delivery = None;
    }

    pub fn set_invalid_section_handler<H: InvalidSectionHandler + 'static>(&mut self, handler: H) {
        self.invalid_handler = Some(Box::new(handler));
    }

    pub fn clear_invalid_section_handler(&mut self) {
        self.invalid_handler = None;
    }

    pub fn options(&self) -> &DemuxOptions {
        &self.options
    }

    /// Takes effect from the next packet; partially received data is kept.
    pub fn set_options(&mut self, options: DemuxOptions) {
        self.options = options;
    }

    pub fn status(&self) -> &DemuxStatus {
        &self.ctx.status
    }

    pub fn reset_status(&mut self) {
        self.ctx.status = DemuxStatus::default();
    }

    /// Number of packets given to the demultiplexer, whether filtered or not.
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn add_pid(&mut self, pid: Pid) {
        self.ctx.filter.insert(usize::from(pid));
    }

    pub fn add_pids<I: IntoIterator<Item = Pid>>(&mut self, pids: I) {
        for pid in pids {
            self.add_pid(pid);
        }
    }

    /// Stop demultiplexing the given PID, discarding its partial sections and tables.
    pub fn remove_pid(&mut self, pid: Pid) {
        self.ctx.filter.set(usize::from(pid), false);
        self.pids[usize::from(pid)] = None;
    }

    /// Replace the whole PID filter.  State is discarded for PIDs which are no longer filtered.
    pub fn set_pid_filter(&mut self, filter: &FixedBitSet) {
        for i in 0..Pid::PID_COUNT {
            let wanted = filter.contains(i);
            if !wanted {
                self.pids[i] = None;
            }
            self.ctx.filter.set(i, wanted);
        }
    }

    pub fn has_pid(&self, pid: Pid) -> bool {
        self.ctx.filter.contains(usize::from(pid))
    }

    pub fn pid_filter(&self) -> &FixedBitSet {
        &self.ctx.filter
    }

    /// Forget all partial sections and tables, so that every table will be delivered again.
    /// The PID filter and status are kept.
    pub fn reset(&mut self) {
        for pid in self.pids.iter_mut() {
            *pid = None;
        }
    }

    /// Like `reset()`, for a single PID.
    pub fn reset_pid(&mut self, pid: Pid) {
        self.pids[usize::from(pid)] = None;
    }

    /// Demultiplex a buffer holding a whole number of packets.
    ///
    /// Packets not starting with the sync byte are counted in `DemuxStatus::invalid_ts` and
    /// skipped.  A partial packet at the end of the buffer is ignored.
    pub fn push(&mut self, buf: &[u8]) {
        let mut chunks = buf.chunks_exact(Packet::SIZE);
        for pk_buf in &mut chunks {
            match Packet::try_new(pk_buf) {
                Some(pk) => self.feed_packet(&pk),
                None => {
                    warn!("invalid sync byte {:#04x}, skipping packet", pk_buf[0]);
                    self.ctx.status.invalid_ts += 1;
                }
            }
        }
        if !chunks.remainder().is_empty() {
            warn!(
                "ignoring {} bytes after the last whole packet",
                chunks.remainder().len()
            );
        }
    }

    /// Demultiplex a single packet.
    pub fn feed_packet(&mut self, pk: &Packet<'_>) {
        self.packet_count += 1;
        let pid = pk.pid();
        if !self.ctx.filter.contains(usize::from(pid)) {
            return;
        }
        let crc_validation = self.options.crc_validation;
        self.pids[usize::from(pid)]
            .get_or_insert_with(|| PidContext::new(pid))
            .consume(pk, &mut self.ctx.status, crc_validation, &mut self.staged);
        if !self.staged.is_empty() {
            self.dispatch(pid);
        }
        if !self.ctx.changeset.is_empty() {
            self.ctx.apply_filter_changes(&mut self.pids);
        }
    }

    fn dispatch(&mut self, pid: Pid) {
        let mut staged = mem::take(&mut self.staged);
        for item in staged.drain(..) {
            match item {
                Staged::Malformed { data, error } => self.invalid_section(pid, &data, &error),
                Staged::Section(section) => match section.validity().map_err(|e| e.clone()) {
                    Ok(()) => self.valid_section(pid, section),
                    Err(e) => self.invalid_section(pid, section.bytes(), &e),
                },
            }
        }
        self.staged = staged;
    }

    fn invalid_section(&mut self, pid: Pid, data: &[u8], error: &SectionError) {
        debug!("{}: dropping section: {}", pid, error);
        let status = &mut self.ctx.status;
        match error {
            SectionError::InvalidCrc { .. } => status.wrong_crc += 1,
            SectionError::InvalidSectionNumber { .. } => status.invalid_section_number += 1,
            SectionError::TooShort { .. }
            | SectionError::TooLong { .. }
            | SectionError::LengthMismatch { .. } => status.invalid_section_length += 1,
        }
        if let Some(ref mut handler) = self.invalid_handler {
            let ctx = &mut self.ctx;
            guarded("invalid section", pid, || {
                handler.handle_invalid_section(ctx, pid, data, error)
            });
        }
    }

    fn valid_section(&mut self, pid: Pid, section: Section) {
        if section.is_long() {
            if section.is_next() && !self.options.next {
                self.ctx.status.is_next += 1;
                return;
            }
            if section.is_current() && !self.options.current {
                return;
            }
        }
        match self.delivery {
            None => {}
            Some(Delivery::Sections(ref mut handler)) => {
                let ctx = &mut self.ctx;
                guarded("section", pid, || handler.handle_section(ctx, &section));
            }
            Some(Delivery::Tables(ref mut handler)) => {
                let table = if section.is_short() {
                    match BinaryTable::from_section(section) {
                        Ok(table) => table,
                        Err(e) => {
                            warn!("{}: short section not made into a table: {}", pid, e);
                            return;
                        }
                    }
                } else {
                    let pid_ctx = match self.pids[usize::from(pid)] {
                        Some(ref mut pid_ctx) => pid_ctx,
                        None => return,
                    };
                    let track = self.options.track_invalid_version;
                    match pid_ctx.add_to_table(section, track, &mut self.ctx.status) {
                        Some(table) => table,
                        None => return,
                    }
                };
                let ctx = &mut self.ctx;
                guarded("table", pid, || handler.handle_table(ctx, &table));
            }
        }
    }
}

impl fmt::Debug for SectionDemux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionDemux")
            .field("options", &self.options)
            .field("status", &self.ctx.status)
            .field("pids", &self.ctx.filter.ones().count())
            .field("delivery", &self.delivery)
            .field("packet_count", &self.packet_count)
            .finish()
    }
}
