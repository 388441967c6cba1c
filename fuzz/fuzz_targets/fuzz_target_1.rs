#![no_main]

use libfuzzer_sys::fuzz_target;
use mpeg2ts_sections::demultiplex::{DemuxContext, DemuxOptions, SectionDemux};
use mpeg2ts_sections::packet::Pid;
use mpeg2ts_sections::psi::{BinaryTable, CrcValidation, Section};

fuzz_target!(|data: &[u8]| {
    // without CRC checks, so that the fuzzer reaches table reassembly
    let options = DemuxOptions::default()
        .with_crc_validation(CrcValidation::Ignore)
        .with_next(true);
    let mut demux = SectionDemux::with_options(options);
    for pid in 0..0x20 {
        demux.add_pid(Pid::new(pid));
    }
    demux.set_table_handler(|ctx: &mut DemuxContext, table: &BinaryTable| {
        for sect in table.sections() {
            let _ = sect.payload();
        }
        // PIDs named by table payloads are followed, as a PAT handler would
        if let Some(first) = table.section(0) {
            if let [hi, lo, ..] = *first.payload() {
                ctx.add_pid(Pid::new(u16::from(hi & 0x1f) << 8 | u16::from(lo)));
            }
        }
    });
    demux.push(data);

    demux.set_section_handler(|_ctx: &mut DemuxContext, sect: &Section| {
        let _ = sect.etid();
    });
    demux.push(data);
});
