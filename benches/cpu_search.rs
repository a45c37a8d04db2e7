//! Benchmark for the shared-memory CPU search
//! One 256x256 picture against objects that only match near the bottom-right corner

use criterion::{Criterion, criterion_group, criterion_main};
use hybrid_pattern_matching::{CpuBackend, PatternObject, Picture, TieBreak};

fn picture(dim: usize) -> Picture {
    let cells = (0..dim * dim).map(|i| ((i * 31) % 251) as i32 + 1).collect();
    Picture::new(1, dim, cells).expect("valid picture")
}

fn benchmark_cpu_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_search");
    group.sample_size(10);

    let picture = picture(256);
    // The last 8x8 window, so almost every position is scored before the hit.
    let cut = (248..256).flat_map(|r| picture.row(r)[248..256].to_vec()).collect();
    let objects = vec![
        PatternObject::new(1, 8, vec![1000; 64]).expect("valid object"),
        PatternObject::new(2, 8, cut).expect("valid object"),
    ];

    for (name, tie_break) in [("row_major", TieBreak::RowMajor), ("racing", TieBreak::Racing)] {
        let cpu = CpuBackend::new(tie_break, None).expect("Failed to build CPU backend");
        group.bench_function(name, |b| {
            b.iter(|| {
                let result = cpu.search(&picture, &objects, 0.01);
                assert!(result.is_found());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_cpu_search);
criterion_main!(benches);
