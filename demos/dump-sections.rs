//! Prints the tables found in a transport stream file: the PAT, then the PMT of each program
//! the PAT lists.
//!
//! The file is read by a separate thread, which hands the packets to the demultiplexer through
//! a `PacketQueue`.

use log::warn;
use mpeg2ts_sections::demultiplex::{DemuxContext, SectionDemux};
use mpeg2ts_sections::packet::{Packet, Pid, TsPacket};
use mpeg2ts_sections::psi::{BinaryTable, SectionError};
use mpeg2ts_sections::queue::PacketQueue;
use std::env;
use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread;

const PAT_TABLE_ID: u8 = 0x00;

fn read_packets(mut f: File, queue: &PacketQueue) -> io::Result<()> {
    let mut buf = vec![0u8; Packet::SIZE * 1024];
    let mut pending = 0;
    loop {
        let n = f.read(&mut buf[pending..])?;
        if n == 0 {
            break;
        }
        let available = pending + n;
        let mut offset = 0;
        while available - offset >= Packet::SIZE {
            let mut window = queue.lock_write_buffer(1);
            if window.is_empty() {
                // stopped by the reader
                return Ok(());
            }
            let mut written = 0;
            while written < window.len() && available - offset >= Packet::SIZE {
                match TsPacket::from_bytes(&buf[offset..offset + Packet::SIZE]) {
                    Some(pk) => {
                        window[written] = pk;
                        written += 1;
                    }
                    None => warn!("skipping packet without sync byte at offset {}", offset),
                }
                offset += Packet::SIZE;
            }
            window.release(written);
        }
        buf.copy_within(offset..available, 0);
        pending = available - offset;
    }
    Ok(())
}

fn print_table(ctx: &mut DemuxContext, table: &BinaryTable) {
    println!(
        "{:?} table_id={:#04x} ext={:?} version={} sections={} size={}",
        table.source_pid(),
        table.table_id(),
        table.table_id_extension(),
        table.version(),
        table.section_count(),
        table.total_size()
    );
    if table.table_id() == PAT_TABLE_ID {
        for sect in table.sections() {
            for entry in sect.payload().chunks_exact(4) {
                let program_number = u16::from(entry[0]) << 8 | u16::from(entry[1]);
                let pid = Pid::new(u16::from(entry[2] & 0x1f) << 8 | u16::from(entry[3]));
                if program_number != 0 && !ctx.has_pid(pid) {
                    println!("  program {} has its PMT on {:?}", program_number, pid);
                    ctx.add_pid(pid);
                }
            }
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // open input file named on command line,
    let name = env::args().nth(1).expect("usage: dump-sections <file.ts>");
    let f = File::open(&name).unwrap_or_else(|_| panic!("file not found: {}", &name));

    let queue = Arc::new(PacketQueue::default());
    let reader = {
        let queue = queue.clone();
        thread::spawn(move || {
            let result = read_packets(f, &queue);
            queue.set_eof();
            result
        })
    };

    let mut demux = SectionDemux::new();
    demux.add_pid(Pid::PAT);
    demux.set_table_handler(print_table);
    demux.set_invalid_section_handler(
        |_ctx: &mut DemuxContext, pid: Pid, data: &[u8], error: &SectionError| {
            println!("{:?}: invalid section of {} bytes: {}", pid, data.len(), error);
        },
    );

    let mut pks = vec![TsPacket::null(); 256];
    let mut bitrate = 0;
    loop {
        let (count, rate) = queue.wait_packets(&mut pks[..]);
        if count == 0 {
            break;
        }
        bitrate = rate;
        for pk in &pks[..count] {
            demux.feed_packet(&pk.as_packet());
        }
    }

    reader
        .join()
        .expect("reader thread panicked")
        .unwrap_or_else(|e| panic!("error reading {}: {}", &name, e));
    println!("{} packets, bitrate {} b/s", demux.packet_count(), bitrate);
    println!("{}", demux.status());
}
