use gridfile::{GridError, GridIndex};
use gridfile_int_test::test_util::{
    assert_integrity, cleanup, create_test_context, payload_for, run_test,
};

use super::scattered_points;

#[test]
fn test_insert_and_find() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            let points = scattered_points(300);
            for (i, (x, y)) in points.iter().enumerate() {
                grid.insert(*x, *y, &payload_for(i as u64))?;
            }

            assert_eq!(grid.size()?, 300);
            for (i, (x, y)) in points.iter().enumerate() {
                assert_eq!(grid.find(*x, *y)?, payload_for(i as u64));
            }
            assert_integrity(&ctx)
        },
        cleanup,
    );
}

#[test]
fn test_find_missing_record() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            grid.insert(1, 2, b"present")?;

            let result = grid.find(2, 1);
            assert!(matches!(result, Err(GridError::NotFound { x: 2, y: 1 })));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_delete_half_of_records() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            let points = scattered_points(300);
            for (i, (x, y)) in points.iter().enumerate() {
                grid.insert(*x, *y, &payload_for(i as u64))?;
            }

            for (x, y) in points.iter().step_by(2) {
                grid.delete(*x, *y)?;
            }
            assert_eq!(grid.size()?, 150);

            for (i, (x, y)) in points.iter().enumerate() {
                let found = grid.find(*x, *y);
                if i % 2 == 0 {
                    assert!(matches!(found, Err(GridError::NotFound { .. })));
                } else {
                    assert_eq!(found?, payload_for(i as u64));
                }
            }
            assert_integrity(&ctx)
        },
        cleanup,
    );
}

#[test]
fn test_delete_missing_record() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            grid.insert(5, 5, b"only")?;

            assert!(matches!(
                grid.delete(6, 6),
                Err(GridError::NotFound { .. })
            ));
            assert_eq!(grid.size()?, 1);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_reinsert_after_delete() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            grid.insert(-7, 9, b"first")?;
            grid.delete(-7, 9)?;
            grid.insert(-7, 9, b"second")?;

            assert_eq!(grid.find(-7, 9)?, b"second");
            assert_eq!(grid.size()?, 1);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_empty_and_extreme_coordinates() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            grid.insert(i64::MIN, i64::MAX, b"")?;
            grid.insert(i64::MAX, i64::MIN, b"corner")?;
            grid.insert(0, 0, b"origin")?;

            assert_eq!(grid.find(i64::MIN, i64::MAX)?, Vec::<u8>::new());
            assert_eq!(grid.find(i64::MAX, i64::MIN)?, b"corner");
            assert_eq!(grid.find(0, 0)?, b"origin");
            assert_integrity(&ctx)
        },
        cleanup,
    );
}

#[test]
fn test_oversized_record_rejected() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            // 512-byte pages hold at most 472 payload bytes in one record
            let result = grid.insert(0, 0, &vec![0u8; 473]);
            assert!(matches!(result, Err(GridError::InvalidArgument(_))));
            assert_eq!(grid.size()?, 0);

            grid.insert(0, 0, &vec![1u8; 472])?;
            assert_eq!(grid.find(0, 0)?.len(), 472);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_operations_require_loaded_grid() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            grid.insert(3, 4, b"before")?;
            grid.unload()?;

            assert!(matches!(grid.insert(1, 1, b"x"), Err(GridError::NotLoaded)));
            assert!(matches!(grid.find(3, 4), Err(GridError::NotLoaded)));
            assert!(matches!(grid.delete(3, 4), Err(GridError::NotLoaded)));
            assert!(matches!(grid.size(), Err(GridError::NotLoaded)));

            grid.load()?;
            assert_eq!(grid.find(3, 4)?, b"before");
            Ok(())
        },
        cleanup,
    );
}
