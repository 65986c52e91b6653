use gridfile::{DiskGridFile, GridConfig, GridError, GridResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Grid parameters used by [`create_test_context`]
pub const TEST_MAX_PARTITIONS: u64 = 16;
pub const TEST_PAGE_SIZE: u64 = 512;
pub const TEST_GRID_NAME: &str = "testgrid";

/// Runs a test between a `before` and an `after` step.
///
/// `after` always runs once `before` succeeded, even when the test fails.
/// Panics are caught so the failure report includes the elapsed time.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> GridResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> GridResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> GridResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| match before() {
        Ok(ctx) => match test(ctx.clone()) {
            Ok(_) => after(ctx).map_err(|e| format!("After run failed: {:?}", e)),
            Err(e) => {
                let _ = after(ctx);
                Err(format!("Test failed: {:?}", e))
            }
        },
        Err(e) => Err(format!("Before run failed: {:?}", e)),
    });

    let elapsed = start_time.elapsed();
    let failure = match result {
        Ok(Ok(_)) => return,
        Ok(Err(e)) => e,
        Err(panic_err) => {
            if let Some(s) = panic_err.downcast_ref::<&str>() {
                format!("Panic: {}", s)
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                format!("Panic: {}", s)
            } else {
                "Panic with unknown payload".to_string()
            }
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", failure);
    eprintln!("=====================================================\n");
    panic!("{}", failure);
}

#[derive(Clone)]
pub struct TestContext {
    path: PathBuf,
    grid: Arc<DiskGridFile>,
}

impl TestContext {
    pub fn new(path: PathBuf, grid: DiskGridFile) -> Self {
        Self {
            path,
            grid: Arc::new(grid),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn grid(&self) -> Arc<DiskGridFile> {
        self.grid.clone()
    }

    /// Unload this grid and open it again from disk, loaded
    pub fn reopen(&self) -> GridResult<TestContext> {
        self.grid.unload()?;
        let name = self.grid.config().name().to_string();
        let grid = DiskGridFile::open(&self.path, &name)?;
        grid.load()?;
        Ok(TestContext::new(self.path.clone(), grid))
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("gridfile-{}", id))
}

pub fn create_test_context() -> GridResult<TestContext> {
    create_test_context_with(TEST_MAX_PARTITIONS, TEST_PAGE_SIZE)
}

pub fn create_test_context_with(max_partitions: u64, page_size: u64) -> GridResult<TestContext> {
    let path = random_path();
    if path.exists() {
        fs::remove_dir_all(&path)?;
    }

    let config = GridConfig::new(TEST_GRID_NAME)
        .with_max_partitions(max_partitions)
        .with_page_size(page_size)
        .with_base_dir(&path);
    let grid = DiskGridFile::create(config)?;
    Ok(TestContext::new(path, grid))
}

pub fn cleanup(ctx: TestContext) -> GridResult<()> {
    if let Err(e) = ctx.grid().unload() {
        eprintln!("Warning: Failed to unload grid: {:?}", e);
    }

    let max_retries = 5;
    for retry in 0..max_retries {
        if !ctx.path().exists() {
            return Ok(());
        }
        match fs::remove_dir_all(ctx.path()) {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) if retry < max_retries - 1 => {
                log::debug!("Retrying removal of {}: {}", ctx.path().display(), e);
                thread::sleep(Duration::from_millis(50 * (retry as u64 + 1)));
            }
            Err(e) => {
                // temp files are left for the OS to reclaim
                eprintln!(
                    "Warning: Failed to remove test directory {} after {} attempts: {:?}",
                    ctx.path().display(),
                    max_retries,
                    e
                );
            }
        }
    }
    Ok(())
}

/// Fails the test when the grid's integrity check reports anything
pub fn assert_integrity(ctx: &TestContext) -> GridResult<()> {
    let report = ctx.grid().check_integrity()?;
    if !report.is_valid {
        return Err(GridError::Corrupted(report.errors.join("; ")));
    }
    Ok(())
}

/// Deterministic payload for record `i`
pub fn payload_for(i: u64) -> Vec<u8> {
    format!("record-{:06}", i).into_bytes()
}
