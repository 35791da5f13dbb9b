//! Listener registries with scoped unsubscription.
//!
//! Registering a callback returns a [`Subscription`]; dropping it removes the
//! callback again, so listeners never outlive the component that installed them.

use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ListenerTable<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

/// A set of callbacks notified with `&T`
pub struct Listeners<T> {
    table: Arc<Mutex<ListenerTable<T>>>,
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(ListenerTable {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Registers `callback` until the returned handle is dropped
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = match self.table.lock() {
            Ok(mut table) => {
                let id = table.next_id;
                table.next_id += 1;
                table.callbacks.push((id, Arc::new(callback)));
                id
            }
            Err(_) => return Subscription::detached(),
        };

        let weak: Weak<Mutex<ListenerTable<T>>> = Arc::downgrade(&self.table);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(table) = weak.upgrade() {
                    if let Ok(mut table) = table.lock() {
                        table.callbacks.retain(|(existing, _)| *existing != id);
                    }
                }
            })),
        }
    }

    /// Calls every registered callback. The lock is not held while callbacks
    /// run, so a callback may drop its own subscription.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = match self.table.lock() {
            Ok(table) => table.callbacks.iter().map(|(_, cb)| cb.clone()).collect(),
            Err(_) => return,
        };
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.table.lock().map(|t| t.callbacks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`Listeners::subscribe`]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn detached() -> Self {
        Self { release: None }
    }

    /// Explicitly unsubscribes (same as dropping the handle)
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_reaches_subscribers() {
        let listeners = Listeners::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let counter = total.clone();
        let _sub = listeners.subscribe(move |value| {
            counter.fetch_add(*value as usize, Ordering::SeqCst);
        });

        listeners.notify(&3);
        listeners.notify(&4);
        assert_eq!(total.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let listeners = Listeners::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let sub = listeners.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(listeners.len(), 1);

        drop(sub);
        listeners.notify(&());

        assert!(listeners.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_outliving_registry_is_harmless() {
        let listeners = Listeners::<()>::new();
        let sub = listeners.subscribe(|_| {});
        drop(listeners);
        sub.unsubscribe();
    }
}
