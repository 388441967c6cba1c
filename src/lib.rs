//! Demultiplexing of the _sections_ carried in MPEG2 Transport Stream data, per the
//! _ISO/IEC 13818-1_ standard, and reassembly of those sections into tables.
//!
//! Also included are the plumbing pieces usually found around a section demultiplexer:
//!
//!  * a [bounded packet queue](queue/index.html) handing packets from a reader thread to the
//!    thread running the demultiplexer, with an estimate of the stream's bitrate,
//!  * a [packetizer](packetizer/index.html) turning sections back into packets,
//!  * a [packet insertion controller](insertion/index.html) deciding when to insert the packets
//!    of one stream in another.
//!
//! # Design principals
//!
//!  * *Damaged input is normal*.  Transport streams received over the air or the network lose
//!    packets and carry corrupted bytes.  The demultiplexer counts these problems, reports them
//!    to an optional handler, and carries on from the next section boundary.  Only misuse of the
//!    API by the caller causes a panic.
//!  * *Sections are immutable*.  A [`Section`](psi/section/struct.Section.html) is validated once
//!    when constructed, and its bytes are then shared by reference counting between the tables
//!    and handlers that hold it.
//!  * *Transport Neutral*.  There is no code here reading from files or the network.  The
//!    demultiplexer accepts `&[u8]` or packets, and the caller handles providing the data from
//!    wherever.
//!  * *Minimal*.  The contents of specific tables (PAT, PMT, DVB SI, ...) are left to the
//!    caller, who receives the raw sections and complete tables.

pub mod demultiplex;
pub mod insertion;
mod mpegts_crc;
pub mod packet;
pub mod packetizer;
pub mod pcr;
pub mod psi;
pub mod queue;

/// A bitrate in bits per second, where `0` stands for _unknown_.
pub type BitRate = u64;
