//! A simulated game loop profiled with trackalloc.
//!
//! Run with: cargo run --example memory_profiler

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trackalloc::{
    format_bytes, kb, mb, BudgetedHeap, Category, MemoryEvent, TrackError, TrackedAllocator,
    TrackerConfig, ZoneColor,
};

fn main() -> Result<(), TrackError> {
    println!("=== trackalloc Memory Profiler ===\n");

    trackalloc::diagnostics::init_from_env();

    // 64 MB budget over the system heap
    let tracker = TrackedAllocator::new(BudgetedHeap::system(mb(64)), TrackerConfig::from_env());

    let events = Arc::new(AtomicUsize::new(0));
    let counter = events.clone();
    tracker.set_profiler_callback(move |event| {
        counter.fetch_add(1, Ordering::Relaxed);
        if let MemoryEvent::ZoneEnd { id, duration_us } = event {
            println!("   {} closed after {}us", id, duration_us);
        }
    });

    // === Level load ===
    println!("1. Loading level");
    let mut resources = Vec::new();
    {
        let _zone = tracker.zone_scope("Load Level", ZoneColor::BLUE);
        for _ in 0..8 {
            resources.push(tracker.allocate(kb(512), Category::Resources)?);
        }
        // Grow the last mesh buffer
        if let Some(last) = resources.pop() {
            resources.push(tracker.resize(last, mb(1))?);
        }
    }
    println!("   live: {}\n", format_bytes(tracker.current_bytes()));

    // === Frames ===
    println!("2. Running frames");
    for frame in 0..5 {
        let _zone = tracker.zone_scope("Frame", ZoneColor::GREEN);
        let scratch = tracker.allocate_scoped(kb(64) * (frame + 1), Category::Temporary)?;
        println!("   frame {}: scratch {}", frame, format_bytes(scratch.size()));

        {
            let _physics = tracker.zone_scope("Physics", ZoneColor::YELLOW);
            let contacts = tracker.allocate(kb(16), Category::Temporary)?;
            tracker.free(contacts)?;
        }
        // `scratch` is released here
    }
    println!();

    // === Over budget ===
    println!("3. Requesting more than the budget");
    match tracker.allocate(mb(128), Category::Resources) {
        Err(err) => println!("   rejected: {}\n", err),
        Ok(region) => tracker.free(region)?,
    }

    // === Report ===
    println!("4. Statistics");
    println!("{}", tracker.stats());
    println!("   consistent: {}", tracker.check_consistency());
    println!("   profiler events: {}\n", events.load(Ordering::Relaxed));

    let dir = std::env::temp_dir();
    let rows = tracker.export_csv(dir.join("trackalloc_profile.csv"))?;
    let zones = tracker.export_zones_csv(dir.join("trackalloc_zones.csv"))?;
    println!("5. Exported {} sample rows and {} zones to {}\n", rows, zones, dir.display());

    // Leave one resource live to show the leak report
    let _leaked = resources.pop();
    for region in resources {
        tracker.free(region)?;
    }

    println!("6. Shutdown");
    let report = tracker.shutdown();
    print!("{}", report);

    Ok(())
}
