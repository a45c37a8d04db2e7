//! Benchmark for the Vulkan scoring backend
//! Same picture and objects as the CPU benchmark

use criterion::{Criterion, criterion_group, criterion_main};
use hybrid_pattern_matching::vulkan::VulkanBackend;
use hybrid_pattern_matching::{MatchBackend, PatternObject, Picture};

fn benchmark_vulkan_search(c: &mut Criterion) {
    let vulkan = VulkanBackend::new(false);
    if !vulkan.is_available() {
        println!("Vulkan not available on this system, skipping Vulkan benchmark");
        return;
    }

    let mut group = c.benchmark_group("vulkan_search");
    group.sample_size(10);

    let dim = 256;
    let cells = (0..dim * dim).map(|i| ((i * 31) % 251) as i32 + 1).collect();
    let picture = Picture::new(1, dim, cells).expect("valid picture");
    let cut = (248..256).flat_map(|r| picture.row(r)[248..256].to_vec()).collect();
    let objects = vec![
        PatternObject::new(1, 8, vec![1000; 64]).expect("valid object"),
        PatternObject::new(2, 8, cut).expect("valid object"),
    ];

    group.bench_function("vulkan_search_256", |b| {
        b.iter(|| {
            let _result = vulkan.attempt(&picture, &objects, 0.01);
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_vulkan_search);
criterion_main!(benches);
