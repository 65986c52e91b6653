use gridfile::{GridIndex, GridRect, GridResult};
use gridfile_int_test::test_util::{cleanup, create_test_context_with};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() -> GridResult<()> {
    colog::init();
    println!("Starting stress test...");
    let ctx = create_test_context_with(64, 4096)?;
    let grid = ctx.grid();
    let mut rng = StdRng::seed_from_u64(7);

    let count = 100_000;
    let mut points = Vec::with_capacity(count);
    let start = std::time::Instant::now();
    for i in 0..count {
        let x = rng.random_range(-1_000_000..=1_000_000i64);
        let y = rng.random_range(-1_000_000..=1_000_000i64);
        grid.insert(x, y, format!("stress-{}", i).as_bytes())?;
        points.push((x, y));
    }
    println!("Inserted {} records in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    for (x, y) in points.iter().step_by(10) {
        grid.find(*x, *y)?;
    }
    println!("Found {} records in {:?}", count / 10, start.elapsed());

    let start = std::time::Instant::now();
    let result = grid.range_query(&GridRect::new(-250_000, -250_000, 250_000, 250_000))?;
    println!(
        "Range query matched {} records ({} bytes) in {:?}",
        result.len(),
        result.total_bytes,
        start.elapsed()
    );

    let start = std::time::Instant::now();
    for (x, y) in points.iter().take(count / 2) {
        grid.delete(*x, *y)?;
    }
    println!("Deleted {} records in {:?}", count / 2, start.elapsed());

    let stats = grid.stats()?;
    println!(
        "Grid has {} records in {} buckets, {} x {} partitions",
        stats.total_records, stats.distinct_buckets, stats.x_partitions, stats.y_partitions
    );

    cleanup(ctx)
}
