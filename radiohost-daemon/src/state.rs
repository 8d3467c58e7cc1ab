use radiohost_core::{Context, ContextConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// One context per session. The mutex serializes every call into it.
pub type Session = Arc<Mutex<Context>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ContextConfig>,
    pub sessions: Arc<SessionState>,
}

impl AppState {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(SessionState::default()),
        }
    }
}

#[derive(Default)]
pub struct SessionState {
    inner: RwLock<HashMap<String, Session>>,
}

impl SessionState {
    /// Track `ctx` under a fresh id.
    pub fn insert(&self, ctx: Context) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.inner
            .write()
            .expect("session map lock poisoned")
            .insert(id.clone(), Arc::new(Mutex::new(ctx)));
        id
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.inner
            .read()
            .expect("session map lock poisoned")
            .get(id)
            .cloned()
    }

    /// The context is destroyed once in-flight calls holding it finish.
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.inner
            .write()
            .expect("session map lock poisoned")
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("session map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
