use criterion::{Criterion, criterion_group, criterion_main};
use structcraft::{Layout, RecordType};

fn gen_layout(field_count: usize) -> RecordType {
    let mut layout = Layout::named("Bench");

    for i in 0..field_count {
        layout = if i % 2 == 0 {
            layout.uint16_le(format!("f{}", i)).unwrap()
        } else {
            layout.uint16_be(format!("f{}", i)).unwrap()
        };
    }

    layout.compile()
}

fn gen_packet(total_bytes: usize) -> Vec<u8> {
    // Deterministic but non-trivial pattern
    (0..total_bytes).map(|i| (i * 31 % 256) as u8).collect()
}

fn bench_record_access(c: &mut Criterion) {
    for &field_count in &[1usize, 10, 50, 100] {
        let ty = gen_layout(field_count);
        let packet = gen_packet(ty.base_size());
        let names: Vec<String> = (0..field_count).map(|i| format!("f{}", i)).collect();

        c.bench_function(&format!("get_{}_fields", field_count), |b| {
            let record = ty.from_bytes(&packet).unwrap();
            b.iter(|| {
                for name in &names {
                    let _ = record.get(name).unwrap();
                }
            })
        });

        c.bench_function(&format!("set_{}_fields", field_count), |b| {
            let record = ty.alloc().unwrap();
            b.iter(|| {
                for (i, name) in names.iter().enumerate() {
                    record.set(name, i as u16).unwrap();
                }
            })
        });

        c.bench_function(&format!("snapshot_{}_fields", field_count), |b| {
            b.iter(|| {
                let _ = ty.snapshot_of(&packet).unwrap();
            })
        });
    }
}

criterion_group!(benches, bench_record_access);
criterion_main!(benches);
