//! Synchronous observer lists with scoped subscriptions.
//!
//! Everything here is single-threaded: callbacks run on the caller's stack,
//! in subscription order, with no registry borrow held. A callback may
//! subscribe or unsubscribe while it is being notified.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Registry<E: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Callback<E>)>,
}

/// A list of observers for events of type `E`
pub struct Observers<E: ?Sized> {
    inner: Rc<RefCell<Registry<E>>>,
}

impl<E: ?Sized + 'static> Observers<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a callback; it stays registered until the subscription drops
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&E) + 'static,
    {
        let id = {
            let mut registry = self.inner.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            let callback: Callback<E> = Rc::new(RefCell::new(callback));
            registry.entries.push((id, callback));
            id
        };

        let weak: Weak<RefCell<Registry<E>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Call every registered callback with `event`
    pub fn notify(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        for callback in callbacks {
            // A callback that re-enters its own notification is skipped
            if let Ok(mut callback) = callback.try_borrow_mut() {
                (&mut *callback)(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: ?Sized + 'static> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> Clone for Observers<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: ?Sized> fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.inner.borrow().entries.len())
            .finish()
    }
}

/// Handle to a registered resource, released when dropped
#[must_use = "dropping a subscription releases it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release now
    pub fn cancel(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Keep the registration alive for as long as its owner lives
    pub fn detach(mut self) {
        self.release = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
