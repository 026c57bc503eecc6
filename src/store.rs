use crate::state::{reduce, Event, ViewState};
use log::debug;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to the single `ViewState`. Every change goes through
/// `dispatch`, which applies the reducer while holding the lock.
#[derive(Clone, Default)]
pub struct Store {
    state: Arc<Mutex<ViewState>>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub async fn dispatch(&self, event: Event) {
        debug!("Dispatching {}", event.name());
        let mut state = self.state.lock().await;
        let current = std::mem::take(&mut *state);
        *state = reduce(current, event);
    }

    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ViewState) -> R,
    {
        f(&*self.state.lock().await)
    }

    #[cfg(test)]
    pub async fn snapshot(&self) -> ViewState {
        self.read(ViewState::clone).await
    }
}
