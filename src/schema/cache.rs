//! Single-flight cache for context-specific schema views.
//!
//! Key is (model, context). The first caller for a cold key installs a
//! Loading slot and spawns the load; every concurrent caller awaits the same
//! in-flight result. A waiter dropping out (cancellation, timeout) never
//! aborts the load: it runs on its own task and the slot is settled for
//! subsequent callers regardless.

use crate::error::SchemaError;
use crate::schema::store::SchemaStore;
use crate::schema::view::{filter_for_context, SchemaView, ViewContext};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

type Outcome = Result<Arc<SchemaView>, SchemaError>;
type SlotKey = (String, ViewContext);

enum Slot {
    Loading(watch::Receiver<Option<Outcome>>),
    Ready(Outcome),
}

pub struct ViewCache {
    store: Arc<SchemaStore>,
    slots: Mutex<HashMap<SlotKey, Slot>>,
}

impl ViewCache {
    pub fn new(store: Arc<SchemaStore>) -> Self {
        ViewCache {
            store,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the view of `model` for `context`, loading at most once per
    /// key no matter how many callers arrive concurrently.
    pub async fn resolve_view(
        self: &Arc<Self>,
        model: &str,
        context: ViewContext,
    ) -> Outcome {
        let key: SlotKey = (model.to_string(), context);

        let rx = {
            let mut slots = self.slots.lock().expect("view cache poisoned");
            match slots.get(&key) {
                Some(Slot::Ready(outcome)) => return outcome.clone(),
                Some(Slot::Loading(rx)) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    slots.insert(key.clone(), Slot::Loading(rx.clone()));
                    let cache = Arc::clone(self);
                    let model = model.to_string();
                    tokio::spawn(async move {
                        let outcome = cache
                            .store
                            .resolve(&model, None)
                            .await
                            .map(|schema| Arc::new(filter_for_context(&schema, context)));
                        {
                            let mut slots = cache.slots.lock().expect("view cache poisoned");
                            // an invalidate may have raced the load; only a
                            // still-loading slot is settled
                            if let Some(slot) = slots.get_mut(&key) {
                                if matches!(slot, Slot::Loading(_)) {
                                    *slot = Slot::Ready(outcome.clone());
                                }
                            }
                        }
                        let _ = tx.send(Some(outcome));
                    });
                    rx
                }
            }
        };

        Self::await_outcome(rx).await
    }

    async fn await_outcome(mut rx: watch::Receiver<Option<Outcome>>) -> Outcome {
        loop {
            if let Some(outcome) = rx.borrow().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return Err(SchemaError::Load("view load interrupted".into()));
            }
        }
    }

    /// Drop every context entry for a model and the store's schema entry,
    /// so the next resolve reloads from the source.
    pub fn invalidate(&self, model: &str) {
        self.store.invalidate(model);
        self.slots
            .lock()
            .expect("view cache poisoned")
            .retain(|(m, _), _| m != model);
    }

    /// Drop a single (model, context) entry.
    pub fn invalidate_context(&self, model: &str, context: ViewContext) {
        self.slots
            .lock()
            .expect("view cache poisoned")
            .remove(&(model.to_string(), context));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::source::{MemorySource, SchemaSource};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Source that counts fetches and holds each one long enough for
    /// concurrent callers to pile up on the same key.
    struct SlowSource {
        inner: MemorySource,
        fetches: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SchemaSource for SlowSource {
        async fn fetch(
            &self,
            model: &str,
            connection: Option<&str>,
        ) -> Result<Option<serde_json::Value>, SchemaError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.inner.fetch(model, connection).await
        }
    }

    fn slow_source() -> Arc<SlowSource> {
        let inner = MemorySource::new();
        inner.insert(
            "products",
            None,
            json!({
                "model": "products",
                "table": "products",
                "fields": {
                    "id": { "type": "integer", "auto_increment": true, "readonly": true },
                    "name": { "type": "string", "listable": true }
                }
            }),
        );
        Arc::new(SlowSource {
            inner,
            fetches: AtomicUsize::new(0),
        })
    }

    fn cache_over(source: Arc<SlowSource>) -> Arc<ViewCache> {
        let store = Arc::new(SchemaStore::new(source as Arc<dyn SchemaSource>));
        Arc::new(ViewCache::new(store))
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("modelkit=debug")),
            )
            .with_test_writer()
            .try_init();
    }

    #[tokio::test]
    async fn cold_key_stampede_loads_once() {
        init_tracing();
        let source = slow_source();
        let cache = cache_over(Arc::clone(&source));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.resolve_view("products", ViewContext::List).await
            }));
        }
        let mut views = Vec::new();
        for h in handles {
            views.push(h.await.unwrap().unwrap());
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        let first = serde_json::to_value(&*views[0]).unwrap();
        for v in &views[1..] {
            assert_eq!(serde_json::to_value(&**v).unwrap(), first);
        }
    }

    #[tokio::test]
    async fn contexts_are_cached_independently() {
        init_tracing();
        let source = slow_source();
        let cache = cache_over(Arc::clone(&source));
        let list = cache.resolve_view("products", ViewContext::List).await.unwrap();
        let form = cache.resolve_view("products", ViewContext::Form).await.unwrap();
        assert!(list.fields.contains_key("id"));
        assert!(!form.fields.contains_key("id"));
        // schema itself memoized by the store; only the first context fetched
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_abort_the_load() {
        init_tracing();
        let source = slow_source();
        let cache = cache_over(Arc::clone(&source));

        let first = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.resolve_view("products", ViewContext::List).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        first.abort();
        let _ = first.await;

        let view = cache
            .resolve_view("products", ViewContext::List)
            .await
            .unwrap();
        assert!(view.fields.contains_key("name"));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_outcome_is_shared_and_persists_until_invalidate() {
        init_tracing();
        let source = Arc::new(SlowSource {
            inner: MemorySource::new(),
            fetches: AtomicUsize::new(0),
        });
        let cache = cache_over(Arc::clone(&source));

        let a = cache.resolve_view("ghosts", ViewContext::Full).await;
        let b = cache.resolve_view("ghosts", ViewContext::Full).await;
        assert!(matches!(a, Err(SchemaError::NotFound { .. })));
        assert!(matches!(b, Err(SchemaError::NotFound { .. })));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        cache.invalidate("ghosts");
        let _ = cache.resolve_view("ghosts", ViewContext::Full).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }
}
