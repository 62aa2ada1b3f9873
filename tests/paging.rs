//! End-to-end paging behavior through the public map API.

use std::sync::Arc;

use datamap::{
    map_stitch, map_unsplit, map_unwrap, map_value_coverage, Coord, DynamicRegionValueMap, Extent,
    MapError, MemoryStore, Monochrome, Polychrome, RegionKey, RegionSize, RegionValueMap,
    ReversibleReorder, ValueMap,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mono_map(extent: Extent, region: RegionSize) -> RegionValueMap {
    let format = Arc::new(Monochrome::new(16, 0).unwrap());
    RegionValueMap::new(extent, region, format, Arc::new(MemoryStore::new())).unwrap()
}

#[test]
fn get_set_and_empty_reads() {
    init_logging();
    let map = mono_map(Extent::new(4, 4), RegionSize::new(2, 2));

    map.set(Coord::new(0, 0), 7).unwrap();
    map.set(Coord::new(3, 3), 11).unwrap();
    assert_eq!(map.get(Coord::new(0, 0)).unwrap(), Some(7));
    assert_eq!(map.get(Coord::new(3, 3)).unwrap(), Some(11));
    assert_eq!(map.get(Coord::new(2, 1)).unwrap(), None);

    assert!(matches!(
        map.get(Coord::new(4, 0)),
        Err(MapError::OutOfBounds { x: 4, y: 0, .. })
    ));
    assert!(matches!(
        map.set(Coord::new(0, 9), 1),
        Err(MapError::OutOfBounds { .. })
    ));
}

#[test]
fn only_touched_regions_become_resident() {
    let map = mono_map(Extent::new(8, 8), RegionSize::new(2, 2));
    assert_eq!(map.resident_count(), 0);
    map.set(Coord::new(0, 0), 1).unwrap();
    map.set(Coord::new(7, 7), 2).unwrap();
    assert_eq!(map.resident_count(), 2);
    assert!(map.is_resident(RegionKey::new(0, 0)));
    assert!(map.is_resident(RegionKey::new(3, 3)));
    assert!(!map.is_resident(RegionKey::new(1, 1)));
}

#[test]
fn clear_returns_a_cell_to_empty() {
    let map = mono_map(Extent::new(4, 4), RegionSize::new(2, 2));
    map.set(Coord::new(1, 1), 5).unwrap();
    map.set(Coord::new(0, 1), 6).unwrap();
    map.clear(Coord::new(1, 1)).unwrap();
    assert_eq!(map.get(Coord::new(1, 1)).unwrap(), None);
    assert_eq!(map.get(Coord::new(0, 1)).unwrap(), Some(6));
}

#[test]
fn values_survive_flush_and_eviction() {
    let map = mono_map(Extent::new(6, 6), RegionSize::new(3, 3));
    map.set(Coord::new(5, 0), 42).unwrap();
    map.set(Coord::new(2, 2), 43).unwrap();

    assert!(map.flush_all().unwrap() >= 1);
    let resident = map.resident_count();
    assert_eq!(map.evict_idle().unwrap(), resident);
    assert_eq!(map.resident_count(), 0);

    assert_eq!(map.get(Coord::new(5, 0)).unwrap(), Some(42));
    assert_eq!(map.get(Coord::new(2, 2)).unwrap(), Some(43));
}

#[test]
fn boundary_regions_pad_past_the_extent() {
    // 5x3 extent on a 2x2 partition: right and bottom regions hang over.
    let map = mono_map(Extent::new(5, 3), RegionSize::new(2, 2));
    map.set(Coord::new(4, 2), 9).unwrap();
    map.flush_all().unwrap();
    map.evict_idle().unwrap();
    assert_eq!(map.get(Coord::new(4, 2)).unwrap(), Some(9));
    assert!(map.get(Coord::new(5, 2)).is_err());
    assert_eq!(map_value_coverage(&map).unwrap(), 1.0 / 15.0);
}

#[test]
fn rejected_values_touch_nothing() {
    let format = Arc::new(Monochrome::new(8, 0).unwrap());
    let map = RegionValueMap::new(
        Extent::new(4, 4),
        RegionSize::new(2, 2),
        format,
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    // The sentinel value and an oversized value both fail before any
    // region is pinned.
    assert!(map.set(Coord::new(0, 0), 0).is_err());
    assert!(map.set(Coord::new(0, 0), 256).is_err());
    assert_eq!(map.resident_count(), 0);
}

#[test]
fn polychrome_values_round_trip_through_a_map() {
    let format = Arc::new(Polychrome::new(4, 8, 4).unwrap());
    let map = RegionValueMap::new(
        Extent::new(4, 4),
        RegionSize::new(2, 2),
        format,
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    for (i, value) in [0u64, 1, 0xDEAD_BEEF, 0x0123_4567].into_iter().enumerate() {
        map.set(Coord::new(i as u32, 0), value).unwrap();
    }
    map.flush_all().unwrap();
    map.evict_idle().unwrap();
    assert_eq!(map.get(Coord::new(2, 0)).unwrap(), Some(0xDEAD_BEEF));
    assert_eq!(map.get(Coord::new(0, 1)).unwrap(), None);
}

#[test]
fn reorder_redirects_storage_but_not_reads() {
    let extent = Extent::new(4, 4);
    // Reverse the linear index domain.
    let reverse: Vec<usize> = (0..extent.len()).rev().collect();
    let reorder = ReversibleReorder::new(reverse, extent.len()).unwrap();
    let map = mono_map(extent, RegionSize::new(2, 2))
        .with_reorder(reorder)
        .unwrap();

    map.set(Coord::new(0, 0), 77).unwrap();
    assert_eq!(map.get(Coord::new(0, 0)).unwrap(), Some(77));
    // Logical (0, 0) is linear index 0, reversed to 15, which lives in
    // the bottom-right region.
    assert!(map.is_resident(RegionKey::new(1, 1)));
    assert!(!map.is_resident(RegionKey::new(0, 0)));
}

#[test]
fn random_reorders_preserve_every_value() {
    use rand::seq::SliceRandom;

    let extent = Extent::new(4, 4);
    let mut rng = rand::thread_rng();
    for _ in 0..10 {
        let mut table: Vec<usize> = (0..extent.len()).collect();
        table.shuffle(&mut rng);
        let reorder = ReversibleReorder::new(table, extent.len()).unwrap();
        for i in 0..extent.len() {
            assert_eq!(reorder.inverse(reorder.forward(i)), i);
        }

        let map = mono_map(extent, RegionSize::new(2, 2))
            .with_reorder(reorder)
            .unwrap();
        for i in 0..extent.len() as u32 {
            map.set(Coord::new(i % 4, i / 4), (i + 1) as u64).unwrap();
        }
        map.flush_all().unwrap();
        map.evict_idle().unwrap();
        for i in 0..extent.len() as u32 {
            assert_eq!(
                map.get(Coord::new(i % 4, i / 4)).unwrap(),
                Some((i + 1) as u64)
            );
        }
    }
}

#[test]
fn reorder_domain_must_match_the_extent() {
    let reorder = ReversibleReorder::identity(9);
    let result = mono_map(Extent::new(4, 4), RegionSize::new(2, 2)).with_reorder(reorder);
    assert!(matches!(result, Err(MapError::IncompleteMapping(_))));
}

#[test]
fn stitch_translates_into_components() {
    let left = mono_map(Extent::new(4, 4), RegionSize::new(2, 2));
    let right = mono_map(Extent::new(4, 4), RegionSize::new(2, 2));
    right.set(Coord::new(1, 2), 9).unwrap();

    let stitched = map_stitch(vec![
        (Coord::new(0, 0), Box::new(left) as Box<dyn ValueMap>),
        (Coord::new(4, 0), Box::new(right) as Box<dyn ValueMap>),
    ])
    .unwrap();

    assert_eq!(stitched.extent(), Extent::new(8, 4));
    assert_eq!(stitched.get(Coord::new(5, 2)).unwrap(), Some(9));
    assert_eq!(stitched.get(Coord::new(0, 0)).unwrap(), None);

    stitched.set(Coord::new(6, 3), 4).unwrap();
    assert_eq!(stitched.get(Coord::new(6, 3)).unwrap(), Some(4));
}

#[test]
fn stitch_rejects_overlap() {
    let a = mono_map(Extent::new(4, 4), RegionSize::new(2, 2));
    let b = mono_map(Extent::new(4, 4), RegionSize::new(2, 2));
    let result = map_stitch(vec![
        (Coord::new(0, 0), Box::new(a) as Box<dyn ValueMap>),
        (Coord::new(2, 0), Box::new(b) as Box<dyn ValueMap>),
    ]);
    assert!(matches!(result, Err(MapError::OverlapDetected(_))));
}

#[test]
fn gaps_between_components_read_empty() {
    let a = mono_map(Extent::new(2, 2), RegionSize::new(2, 2));
    let b = mono_map(Extent::new(2, 2), RegionSize::new(2, 2));
    let stitched = map_stitch(vec![
        (Coord::new(0, 0), Box::new(a) as Box<dyn ValueMap>),
        (Coord::new(4, 4), Box::new(b) as Box<dyn ValueMap>),
    ])
    .unwrap();
    assert_eq!(stitched.get(Coord::new(3, 3)).unwrap(), None);
    assert!(stitched.set(Coord::new(3, 3), 1).is_err());
}

#[test]
fn coverage_is_zero_for_a_fresh_map_and_bounded() {
    let map = mono_map(Extent::new(4, 4), RegionSize::new(2, 2));
    assert_eq!(map_value_coverage(&map).unwrap(), 0.0);

    for i in 0..4 {
        map.set(Coord::new(i, i), (i + 1) as u64).unwrap();
    }
    let coverage = map.coverage().unwrap();
    assert!((coverage - 0.25).abs() < f64::EPSILON);
    assert!((0.0..=1.0).contains(&coverage));
}

#[test]
fn coverage_scan_does_not_inflate_residency() {
    let map = mono_map(Extent::new(8, 8), RegionSize::new(2, 2));
    map.set(Coord::new(0, 0), 1).unwrap();
    map.flush_all().unwrap();
    map.evict_idle().unwrap();
    assert_eq!(map.resident_count(), 0);
    assert!(map_value_coverage(&map).unwrap() > 0.0);
    // Regions loaded only for the scan are released again.
    assert_eq!(map.resident_count(), 0);
}

#[test]
fn unwrap_then_unsplit_reconstructs_the_map() {
    let region = RegionSize::new(2, 2);
    let map = mono_map(Extent::new(4, 4), region);
    map.set(Coord::new(0, 0), 1).unwrap();
    map.set(Coord::new(3, 1), 2).unwrap();
    map.set(Coord::new(2, 3), 3).unwrap();

    let mut unwrapper = map_unwrap(&map);
    let first_pass = unwrapper
        .by_ref()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(first_pass.len(), 4);

    unwrapper.restart();
    let parts = unwrapper.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(parts.len(), 4);

    let format = Arc::new(Monochrome::new(16, 0).unwrap());
    let rebuilt = map_unsplit(parts, region, format, Arc::new(MemoryStore::new())).unwrap();
    assert_eq!(rebuilt.extent(), Extent::new(4, 4));
    assert_eq!(rebuilt.get(Coord::new(0, 0)).unwrap(), Some(1));
    assert_eq!(rebuilt.get(Coord::new(3, 1)).unwrap(), Some(2));
    assert_eq!(rebuilt.get(Coord::new(2, 3)).unwrap(), Some(3));
    assert_eq!(rebuilt.get(Coord::new(1, 1)).unwrap(), None);
}

#[test]
fn unsplit_rejects_mismatched_parts() {
    let map = mono_map(Extent::new(4, 4), RegionSize::new(2, 2));
    map.set(Coord::new(0, 0), 1).unwrap();
    let parts = map_unwrap(&map).collect::<Result<Vec<_>, _>>().unwrap();

    let format = Arc::new(Monochrome::new(16, 0).unwrap());
    // Parts were cut on a 2x2 grid; claiming 4x4 regions must fail.
    let result = map_unsplit(
        parts,
        RegionSize::new(4, 4),
        format,
        Arc::new(MemoryStore::new()),
    );
    assert!(matches!(result, Err(MapError::PartitionMismatch(_))));
}

#[test]
fn dynamic_map_grows_but_never_shrinks() {
    let format = Arc::new(Monochrome::new(16, 0).unwrap());
    let map = DynamicRegionValueMap::new(
        Extent::new(4, 4),
        RegionSize::new(2, 2),
        format,
        Arc::new(MemoryStore::new()),
    )
    .unwrap();

    map.set(Coord::new(3, 3), 8).unwrap();
    assert!(matches!(
        map.get(Coord::new(5, 1)),
        Err(MapError::OutOfBounds { .. })
    ));

    map.extend(Extent::new(8, 4)).unwrap();
    assert_eq!(map.extent(), Extent::new(8, 4));
    map.set(Coord::new(7, 2), 9).unwrap();
    assert_eq!(map.get(Coord::new(7, 2)).unwrap(), Some(9));
    assert_eq!(map.get(Coord::new(3, 3)).unwrap(), Some(8));

    assert!(matches!(
        map.extend(Extent::new(6, 4)),
        Err(MapError::ShrinkNotSupported { .. })
    ));
    assert_eq!(map.extent(), Extent::new(8, 4));
}

#[test]
fn dynamic_map_surveys_its_current_extent() {
    let format = Arc::new(Monochrome::new(16, 0).unwrap());
    let map = DynamicRegionValueMap::new(
        Extent::new(2, 2),
        RegionSize::new(2, 2),
        format,
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    map.set(Coord::new(0, 0), 1).unwrap();
    assert_eq!(map.coverage().unwrap(), 0.25);

    map.extend(Extent::new(4, 2)).unwrap();
    assert_eq!(map.coverage().unwrap(), 0.125);
    assert_eq!(map.unwrap_regions().count(), 2);
}
