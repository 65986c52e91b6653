use gridfile::{GridIndex, GridRect};
use gridfile_int_test::test_util::{cleanup, create_test_context, payload_for, run_test};
use std::thread;

use super::scattered_points;

#[test]
fn test_concurrent_readers() {
    run_test(
        create_test_context,
        |ctx| {
            let points = scattered_points(300);
            for (i, (x, y)) in points.iter().enumerate() {
                ctx.grid().insert(*x, *y, &payload_for(i as u64))?;
            }

            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let grid = ctx.grid();
                    let points = points.clone();
                    thread::spawn(move || {
                        for (i, (x, y)) in points.iter().enumerate().skip(t).step_by(4) {
                            assert_eq!(grid.find(*x, *y).unwrap(), payload_for(i as u64));
                        }
                        grid.range_query(&GridRect::everything()).unwrap().len()
                    })
                })
                .collect();

            for handle in handles {
                assert_eq!(handle.join().unwrap(), 300);
            }
            Ok(())
        },
        cleanup,
    );
}

#[test]
fn test_writer_with_concurrent_readers() {
    run_test(
        create_test_context,
        |ctx| {
            let writer = {
                let grid = ctx.grid();
                thread::spawn(move || {
                    for i in 0..300u64 {
                        let x = ((i * 7919) % 2000) as i64 - 1000;
                        let y = ((i * 104729) % 2000) as i64 - 1000;
                        grid.insert(x, y, &payload_for(i)).unwrap();
                    }
                })
            };

            let readers: Vec<_> = (0..2)
                .map(|_| {
                    let grid = ctx.grid();
                    thread::spawn(move || {
                        let mut seen = 0;
                        for _ in 0..50 {
                            let count = grid.range_query(&GridRect::everything()).unwrap().len();
                            // a query observes whole inserts only
                            assert!(count >= seen);
                            seen = count;
                        }
                    })
                })
                .collect();

            writer.join().unwrap();
            for reader in readers {
                reader.join().unwrap();
            }
            assert_eq!(ctx.grid().size()?, 300);
            Ok(())
        },
        cleanup,
    );
}
