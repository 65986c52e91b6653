use gridfile::{Axis, DiskGridFile, GridError, GridIndex, GridRect, GridResult};
use gridfile_int_test::test_util::{
    assert_integrity, cleanup, create_test_context, payload_for, run_test, TestContext,
    TEST_GRID_NAME, TEST_MAX_PARTITIONS, TEST_PAGE_SIZE,
};
use std::ops::Range;

fn insert_scattered(ctx: &TestContext, range: Range<u64>) -> GridResult<()> {
    let grid = ctx.grid();
    for i in range {
        let x = ((i * 7919) % 2000) as i64 - 1000;
        let y = ((i * 104729) % 2000) as i64 - 1000;
        grid.insert(x, y, &payload_for(i))?;
    }
    Ok(())
}

#[test]
fn test_records_survive_reopen() {
    run_test(
        create_test_context,
        |ctx| {
            insert_scattered(&ctx, 0..300)?;
            let before = ctx.grid().stats()?;
            let x_scale = ctx.grid().partitions(Axis::X)?;
            let y_scale = ctx.grid().partitions(Axis::Y)?;

            let reopened = ctx.reopen()?;
            let grid = reopened.grid();
            let after = grid.stats()?;
            assert_eq!(after.total_records, before.total_records);
            assert_eq!(after.next_bucket_address, before.next_bucket_address);
            assert_eq!(grid.partitions(Axis::X)?, x_scale);
            assert_eq!(grid.partitions(Axis::Y)?, y_scale);

            for i in 0..300u64 {
                let x = ((i * 7919) % 2000) as i64 - 1000;
                let y = ((i * 104729) % 2000) as i64 - 1000;
                assert_eq!(grid.find(x, y)?, payload_for(i));
            }
            assert_integrity(&reopened)
        },
        cleanup,
    );
}

#[test]
fn test_inserts_continue_after_reopen() {
    run_test(
        create_test_context,
        |ctx| {
            insert_scattered(&ctx, 0..150)?;
            let reopened = ctx.reopen()?;
            insert_scattered(&reopened, 150..400)?;

            let reopened = reopened.reopen()?;
            assert_eq!(reopened.grid().size()?, 400);
            let all = reopened.grid().range_query(&GridRect::everything())?;
            assert_eq!(all.len(), 400);
            assert_integrity(&reopened)
        },
        cleanup,
    );
}

#[test]
fn test_open_keeps_configuration() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.grid().unload()?;
            let grid = DiskGridFile::open(ctx.path(), TEST_GRID_NAME)?;
            assert!(!grid.is_loaded());
            assert_eq!(grid.config().max_partitions(), TEST_MAX_PARTITIONS);
            assert_eq!(grid.config().page_size(), TEST_PAGE_SIZE);
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_open_unknown_grid_fails() {
    run_test(
        create_test_context,
        |ctx| {
            let result = DiskGridFile::open(ctx.path(), "missing");
            assert!(matches!(result, Err(GridError::Io(_))));
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_unload_and_load_same_handle() {
    run_test(
        create_test_context,
        |ctx| {
            let grid = ctx.grid();
            grid.insert(42, -42, b"kept")?;
            grid.unload()?;
            assert!(!grid.is_loaded());

            grid.load()?;
            grid.load()?;
            assert_eq!(grid.find(42, -42)?, b"kept");
            Ok(())
        },
        cleanup,
    );
}
