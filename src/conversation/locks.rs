use std::collections::HashMap;
use std::sync::{ Arc, Mutex as StdMutex, Weak };
use tokio::sync::{ Mutex, OwnedMutexGuard };

/// Serializes read-modify-write cycles per conversation id within this
/// process. Entries are dropped once no request holds or waits on them.
#[derive(Default)]
pub struct ConversationLocks {
    locks: StdMutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, chat_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match locks.get(chat_id).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    locks.retain(|_, weak| weak.strong_count() > 0);
                    let created = Arc::new(Mutex::new(()));
                    locks.insert(chat_id.to_string(), Arc::downgrade(&created));
                    created
                }
            }
        };
        lock.lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
