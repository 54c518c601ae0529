use tk_gdi::mock::MockGdi;
use tk_gdi::{BitmapSpec, GdiError, ManagerConfig, ObjectCategory, ResourceManager};

fn manager() -> ResourceManager<MockGdi> {
    ResourceManager::with_config(MockGdi::new(), ManagerConfig::diagnostic())
}

#[test]
fn dc_pool_keeps_high_water_mark() {
    let manager = manager();
    let first: Vec<_> = (0..100)
        .map(|_| manager.acquire_pooled_dc().unwrap())
        .collect();
    for dc in &first {
        manager.release_pooled_dc(*dc).unwrap();
    }

    let second: Vec<_> = (0..50)
        .map(|_| manager.acquire_pooled_dc().unwrap())
        .collect();

    assert_eq!(manager.backend().calls("CreateCompatibleDC"), 100);
    assert!(second.iter().all(|dc| first.contains(dc)));
    let stats = manager.dc_pool_stats();
    assert_eq!(stats.slots, 100);
    assert_eq!(stats.in_use, 50);
}

#[test]
fn smaller_request_reuses_larger_bitmap() {
    let manager = manager();
    let big = manager
        .acquire_pooled_bitmap(BitmapSpec::new(100, 100, 1, 32))
        .unwrap();
    manager.release_pooled_bitmap(big).unwrap();

    let small = manager
        .acquire_pooled_bitmap(BitmapSpec::new(50, 50, 1, 32))
        .unwrap();

    assert_eq!(small, big);
    assert_eq!(manager.backend().calls("CreateBitmap"), 1);
    assert_eq!(
        manager.pooled_bitmap_spec(small),
        Some(BitmapSpec::new(100, 100, 1, 32))
    );
}

#[test]
fn same_format_slot_grows_to_cover_both_requests() {
    let manager = manager();
    let first = manager
        .acquire_pooled_bitmap(BitmapSpec::new(64, 64, 1, 32))
        .unwrap();
    manager.release_pooled_bitmap(first).unwrap();

    let grown = manager
        .acquire_pooled_bitmap(BitmapSpec::new(128, 32, 1, 32))
        .unwrap();

    assert_ne!(grown, first);
    assert!(!manager.backend().is_alive(first));
    assert_eq!(
        manager.pooled_bitmap_spec(grown),
        Some(BitmapSpec::new(128, 64, 1, 32))
    );
    let stats = manager.bitmap_pool_stats();
    assert_eq!(stats.slots, 1);
    assert_eq!(stats.recreated, 1);
}

#[test]
fn format_mismatch_is_destroyed_on_release() {
    let manager = manager();
    let mono = manager
        .acquire_pooled_bitmap(BitmapSpec::new(16, 16, 1, 1))
        .unwrap();
    manager.release_pooled_bitmap(mono).unwrap();

    let color = manager
        .acquire_pooled_bitmap(BitmapSpec::new(16, 16, 1, 32))
        .unwrap();
    assert_eq!(
        manager.backend().bitmap_spec(color),
        Some(BitmapSpec::new(16, 16, 1, 32))
    );
    assert!(!manager.backend().is_alive(mono));

    manager.release_pooled_bitmap(color).unwrap();
    assert!(!manager.backend().is_alive(color));
    assert_eq!(manager.bitmap_pool_stats().slots, 0);
    assert_eq!(manager.backend().live_bitmaps(), 0);
}

#[test]
fn bitmap_follows_the_last_selection() {
    let manager = manager();
    let first = manager.acquire_pooled_dc().unwrap();
    let second = manager.acquire_pooled_dc().unwrap();
    let bitmap = manager
        .acquire_pooled_bitmap(BitmapSpec::new(8, 8, 1, 32))
        .unwrap();

    manager.select_bitmap(first, bitmap).unwrap();
    manager.select_bitmap(second, bitmap).unwrap();

    let gdi = manager.backend();
    assert_eq!(gdi.selected(first, ObjectCategory::Bitmap), gdi.default_bitmap());
    assert_eq!(gdi.selected(second, ObjectCategory::Bitmap), bitmap);
    assert_eq!(
        manager
            .find_context(first)
            .unwrap()
            .selected(ObjectCategory::Bitmap),
        gdi.default_bitmap()
    );
    assert!(manager.check_consistency().is_empty());
}

#[test]
fn shutdown_releases_everything() {
    let manager = manager();
    let dc = manager.acquire_pooled_dc().unwrap();
    let bitmap = manager
        .acquire_pooled_bitmap(BitmapSpec::new(32, 32, 1, 32))
        .unwrap();
    manager.select_bitmap(dc, bitmap).unwrap();
    manager.release_pooled_bitmap(bitmap).unwrap();
    manager.release_pooled_dc(dc).unwrap();

    manager.shutdown();

    assert_eq!(manager.backend().live_dcs(), 0);
    assert_eq!(manager.backend().live_bitmaps(), 0);
    assert_eq!(manager.registered_contexts(), 0);
    assert!(manager.leak_report().unwrap().is_empty());
    assert_eq!(manager.acquire_pooled_dc(), Err(GdiError::ShutDown));
}

#[test]
fn guards_are_shared_across_threads() {
    let manager = manager();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for size in 1..=50 {
                    let dc = manager.checkout_dc().unwrap();
                    let bitmap = manager
                        .checkout_bitmap(BitmapSpec::new(size, size, 1, 32))
                        .unwrap();
                    assert!(manager.is_registered(dc.handle()));
                    assert!(manager.is_pooled_bitmap(bitmap.handle()));
                }
            });
        }
    });

    let dcs = manager.dc_pool_stats();
    assert_eq!(dcs.in_use, 0);
    assert!(dcs.slots <= 4);
    assert_eq!(manager.bitmap_pool_stats().in_use, 0);
}
