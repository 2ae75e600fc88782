use crate::cli::StoreArgs;
use crate::context::StoreContext;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// An initialized store in a fresh temp directory.
pub(crate) fn create_test_store() -> (TempDir, StoreContext) {
    let temp_dir = TempDir::new().unwrap();
    let ctx = StoreContext::at(temp_dir.path().join("store"));

    std::fs::create_dir_all(&ctx.resources_dir).unwrap();
    std::fs::create_dir_all(&ctx.events_dir).unwrap();

    (temp_dir, ctx)
}

/// Command options pointing at `ctx` and `resource`.
pub(crate) fn store_args(ctx: &StoreContext, resource: &str) -> StoreArgs {
    StoreArgs {
        state_dir: Some(ctx.state_dir.clone()),
        resource: Some(resource.to_string()),
        json: false,
    }
}
