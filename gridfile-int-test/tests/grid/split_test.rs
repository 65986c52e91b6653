use gridfile::{
    Axis, DirectoryEntry, DiskGridFile, GridError, GridIndex, GridRecord, GridRect, GridResult,
};
use gridfile_int_test::test_util::{
    assert_integrity, cleanup, create_test_context, create_test_context_with, payload_for,
    run_test,
};

#[test]
fn test_clustered_inserts_refine_grid() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            let points: Vec<(i64, i64)> = (0..200i64)
                .map(|i| (500 + (i * 37) % 50, -300 + (i * 53) % 50))
                .collect();
            for (i, (x, y)) in points.iter().enumerate() {
                grid.insert(*x, *y, &payload_for(i as u64))?;
            }

            let stats = grid.stats()?;
            assert!(stats.grid_splits > 0);
            assert!(stats.bucket_splits > 0);
            assert_eq!(stats.total_records, 200);

            // every partition line falls inside the cluster
            for value in grid.partitions(Axis::X)? {
                assert!((500..550).contains(&value), "x boundary {}", value);
            }
            for value in grid.partitions(Axis::Y)? {
                assert!((-300..-250).contains(&value), "y boundary {}", value);
            }

            for (i, (x, y)) in points.iter().enumerate() {
                assert_eq!(grid.find(*x, *y)?, payload_for(i as u64));
            }
            assert_integrity(&ctx)
        },
        cleanup,
    );
}

#[test]
fn test_boundaries_stay_sorted() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            for i in 0..500u64 {
                let x = ((i * 7919) % 2000) as i64 - 1000;
                let y = ((i * 104729) % 2000) as i64 - 1000;
                grid.insert(x, y, &payload_for(i))?;
            }

            for axis in [Axis::X, Axis::Y] {
                let boundaries = grid.partitions(axis)?;
                assert!(!boundaries.is_empty());
                assert!(boundaries.len() < 16);
                assert!(boundaries.windows(2).all(|w| w[0] < w[1]));
            }
            assert_integrity(&ctx)
        },
        cleanup,
    );
}

type GridState = (Vec<i64>, Vec<i64>, Vec<DirectoryEntry>, u64, Vec<GridRecord>);

fn grid_state(grid: &DiskGridFile) -> GridResult<GridState> {
    let xs = grid.partitions(Axis::X)?;
    let ys = grid.partitions(Axis::Y)?;
    let mut entries = Vec::new();
    for lon in 0..=xs.len() as u64 {
        for lat in 0..=ys.len() as u64 {
            entries.push(grid.entry(lon, lat)?);
        }
    }
    let next = grid.stats()?.next_bucket_address;
    let mut records = grid.range_query(&GridRect::everything())?.records;
    records.sort();
    Ok((xs, ys, entries, next, records))
}

#[test]
fn test_capacity_exceeded_keeps_stored_records() {
    run_test(
        || create_test_context_with(4, 128),
        |ctx| {
            let grid = ctx.grid();
            // two 48-byte records fill a 128-byte page
            let payload = [9u8; 24];
            let mut stored = Vec::new();
            let mut failed = None;
            for i in 0..40i64 {
                let point = ((i * 31) % 97, (i * 17) % 89);
                let before = grid_state(&grid)?;
                match grid.insert(point.0, point.1, &payload) {
                    Ok(()) => stored.push(point),
                    Err(GridError::CapacityExceeded(_)) => {
                        assert_eq!(grid_state(&grid)?, before);
                        failed = Some(point);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            let failed = failed.expect("grid never filled up");
            assert!(stored.len() <= 32);
            assert_eq!(grid.size()?, stored.len() as u64);
            assert!(matches!(
                grid.find(failed.0, failed.1),
                Err(GridError::NotFound { .. })
            ));
            for (x, y) in &stored {
                assert_eq!(grid.find(*x, *y)?, payload);
            }
            assert_integrity(&ctx)
        },
        cleanup,
    );
}

#[test]
fn test_repeated_point_fails_without_side_effects() {
    run_test(
        || create_test_context_with(2, 64),
        |ctx| {
            let grid = ctx.grid();
            let payload = [5u8; 24];
            grid.insert(5, 5, &payload)?;
            let before = grid_state(&grid)?;

            let result = grid.insert(5, 5, &payload);
            assert!(matches!(result, Err(GridError::CapacityExceeded(_))));
            assert_eq!(grid_state(&grid)?, before);

            let reopened = ctx.reopen()?;
            assert_eq!(grid_state(&reopened.grid())?, before);
            assert_integrity(&reopened)
        },
        cleanup,
    );
}

#[test]
fn test_deletes_after_splits() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            for i in 0..300u64 {
                grid.insert((i % 30) as i64, (i / 30) as i64, &payload_for(i))?;
            }
            let before = grid.stats()?;

            for i in 0..300u64 {
                grid.delete((i % 30) as i64, (i / 30) as i64)?;
            }
            let after = grid.stats()?;
            assert_eq!(after.total_records, 0);
            // space is reclaimed inside buckets, never merged back
            assert_eq!(after.next_bucket_address, before.next_bucket_address);
            assert_eq!(after.x_partitions, before.x_partitions);
            assert!(grid.range_query(&GridRect::everything())?.is_empty());

            grid.insert(3, 3, b"again")?;
            assert_eq!(grid.find(3, 3)?, b"again");
            assert_integrity(&ctx)
        },
        cleanup,
    );
}
