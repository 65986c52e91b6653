use gridfile::{GridError, GridIndex, GridRect};
use gridfile_int_test::test_util::{cleanup, create_test_context, payload_for, run_test};

use super::scattered_points;

fn expected_in(points: &[(i64, i64)], rect: &GridRect) -> Vec<(i64, i64)> {
    let mut hits: Vec<_> = points
        .iter()
        .copied()
        .filter(|(x, y)| rect.contains_point(*x, *y))
        .collect();
    hits.sort();
    hits
}

#[test]
fn test_range_query_matches_scan() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            let points = scattered_points(400);
            for (i, (x, y)) in points.iter().enumerate() {
                grid.insert(*x, *y, &payload_for(i as u64))?;
            }

            let windows = [
                GridRect::new(-1000, -1000, 999, 999),
                GridRect::new(-250, -250, 250, 250),
                GridRect::new(0, -1000, 0, 1000),
                GridRect::new(-1000, 100, 1000, 400),
                GridRect::new(600, 600, 700, 990),
                GridRect::new(2000, 2000, 3000, 3000),
            ];
            for rect in windows {
                let result = grid.range_query(&rect)?;
                let mut found: Vec<_> = result.records.iter().map(|r| (r.x, r.y)).collect();
                found.sort();
                assert_eq!(found, expected_in(&points, &rect), "window {}", rect);

                let bytes: u64 = result.records.iter().map(|r| r.encoded_len()).sum();
                assert_eq!(result.total_bytes, bytes);
            }
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_range_query_returns_each_record_once() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            for i in 0..200i64 {
                grid.insert(i % 20, i / 20, &payload_for(i as u64))?;
            }

            let all = grid.range_query(&GridRect::everything())?;
            assert_eq!(all.len(), 200);
            let mut payloads: Vec<_> = all.records.iter().map(|r| r.payload.clone()).collect();
            payloads.sort();
            payloads.dedup();
            assert_eq!(payloads.len(), 200);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_range_query_bounds_are_inclusive() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            grid.insert(10, 10, b"corner")?;
            grid.insert(10, 11, b"outside")?;
            grid.insert(5, 5, b"inside")?;

            let result = grid.range_query(&GridRect::new(5, 5, 10, 10))?;
            let mut payloads: Vec<_> = result.records.into_iter().map(|r| r.payload).collect();
            payloads.sort();
            assert_eq!(payloads, vec![b"corner".to_vec(), b"inside".to_vec()]);

            let point = grid.range_query(&GridRect::new(10, 11, 10, 11))?;
            assert_eq!(point.len(), 1);
            assert_eq!(point.total_bytes, 24 + 7);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_range_query_on_empty_grid() {
    run_test(
        create_test_context,
        |ctx| {
            let result = ctx.grid().range_query(&GridRect::everything())?;
            assert!(result.is_empty());
            assert_eq!(result.total_bytes, 0);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_inverted_window_rejected() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            grid.insert(0, 0, b"x")?;
            let result = grid.range_query(&GridRect::new(10, 0, 0, 10));
            assert!(matches!(result, Err(GridError::InvalidArgument(_))));
            Ok(())
        },
        cleanup,
    );
}
