use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use mpeg2ts_sections::demultiplex::{DemuxContext, SectionDemux};
use mpeg2ts_sections::packet::{Packet, Pid};
use mpeg2ts_sections::packetizer::{Packetizer, StuffingPolicy};
use mpeg2ts_sections::psi::{BinaryTable, CurrentNext, LongSectionFields, Section};

const PID: Pid = Pid::new(0x12);

// repetitions of an 8-section table, each section filling several packets
fn make_stream(repetitions: usize) -> Vec<u8> {
    let sections: Vec<Section> = (0..8)
        .map(|n| {
            Section::long(
                LongSectionFields {
                    table_id: 0x4e,
                    private_indicator: true,
                    table_id_extension: 0x1234,
                    version: 3,
                    current_next: CurrentNext::Current,
                    section_number: n,
                    last_section_number: 7,
                },
                &vec![n; 1000][..],
                PID,
            )
        })
        .collect();
    let mut packetizer = Packetizer::new(PID, StuffingPolicy::Never);
    let mut buf = Vec::new();
    for _ in 0..repetitions {
        for pk in packetizer.packetize(&sections) {
            buf.extend_from_slice(pk.as_bytes());
        }
    }
    buf
}

fn section_demux(c: &mut Criterion) {
    let buf = make_stream(500);
    let mut group = c.benchmark_group("section_demux");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("tables", |b| {
        let mut demux = SectionDemux::new();
        demux.add_pid(PID);
        demux.set_table_handler(|_ctx: &mut DemuxContext, table: &BinaryTable| {
            criterion::black_box(table.total_size());
        });
        b.iter(|| {
            demux.reset();
            demux.push(&buf[..]);
        });
    });
    group.bench_function("sections", |b| {
        let mut demux = SectionDemux::new();
        demux.add_pid(PID);
        demux.set_section_handler(|_ctx: &mut DemuxContext, section: &Section| {
            criterion::black_box(section.size());
        });
        b.iter(|| demux.push(&buf[..]));
    });
    group.bench_function("filtered_out", |b| {
        let mut demux = SectionDemux::new();
        demux.add_pid(Pid::PAT);
        b.iter(|| demux.push(&buf[..]));
    });
    group.finish();
    assert_eq!(buf.len() % Packet::SIZE, 0);
}

criterion_group!(benches, section_demux);
criterion_main!(benches);
