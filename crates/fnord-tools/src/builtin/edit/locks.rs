use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-file async mutex registry serializing the edit tool family (§5
/// "Per-file edit lock across the edit tool family"). Concurrent calls
/// targeting different files proceed independently.
#[derive(Default)]
pub struct EditLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl EditLocks {
    pub fn new() -> Self {
        EditLocks::default()
    }

    pub async fn lock_for(&self, path: &Path) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            locks.entry(path.to_path_buf()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_path_serializes() {
        let locks = EditLocks::new();
        let path = PathBuf::from("/tmp/a.rs");
        let _g1 = locks.lock_for(&path).await;
        let attempt = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock_for(&path)).await;
        assert!(attempt.is_err());
    }

    #[tokio::test]
    async fn test_different_paths_do_not_block() {
        let locks = EditLocks::new();
        let _g1 = locks.lock_for(Path::new("/tmp/a.rs")).await;
        let attempt = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.lock_for(Path::new("/tmp/b.rs")),
        )
        .await;
        assert!(attempt.is_ok());
    }
}
