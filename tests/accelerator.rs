use hybrid_pattern_matching::vulkan::VulkanBackend;
use hybrid_pattern_matching::{CpuBackend, MatchBackend, PatternObject, Picture, TieBreak, match_score};

fn fixture() -> (Vec<Picture>, Vec<PatternObject>) {
    let pictures = (0..4)
        .map(|id| {
            let dim = 24 + id as usize * 3;
            let cells = (0..dim * dim).map(|i| ((i * 37 + id as usize * 11) % 97) as i32 + 1).collect();
            Picture::new(id, dim, cells).unwrap()
        })
        .collect::<Vec<_>>();

    // Object 2 is copied out of picture 1, so at least one search succeeds.
    let source = &pictures[1];
    let cut = (5..9).flat_map(|r| source.row(r)[7..11].to_vec()).collect();
    let objects = vec![
        PatternObject::new(1, 5, vec![50; 25]).unwrap(),
        PatternObject::new(2, 4, cut).unwrap(),
        PatternObject::new(3, 40, vec![1; 1600]).unwrap(),
    ];
    (pictures, objects)
}

#[test]
fn test_vulkan_results_agree_with_cpu() {
    let vulkan = VulkanBackend::new(false);
    if !vulkan.is_available() {
        println!("Vulkan not available on this system, skipping accelerator consistency test");
        return;
    }

    let (pictures, objects) = fixture();
    let cpu = CpuBackend::new(TieBreak::RowMajor, None).unwrap();
    for threshold in [0.0, 0.5, 2.0, 6.0] {
        for picture in &pictures {
            let expected = cpu.search(picture, &objects, threshold);
            match vulkan.attempt(picture, &objects, threshold) {
                Some(result) => {
                    // A GPU hit must be a real match for the same first object.
                    let found = result.found.expect("attempt only returns found results");
                    let expected_found = expected.found.expect("GPU found a match the CPU did not");
                    assert_eq!(found.object_id, expected_found.object_id);
                    let object = objects.iter().find(|o| o.id() == found.object_id).unwrap();
                    assert!(match_score(picture, object, found.position) < threshold);
                }
                None => assert!(!expected.is_found(), "GPU missed picture {}", picture.id()),
            }
        }
    }
}
