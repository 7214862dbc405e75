use tokio::sync::watch;

/// Single-fire value shared by any number of waiters.
///
/// The first [`resolve`](Resolution::resolve) wins and every waiter, current
/// or future, observes that value. Dropping the `Resolution` unresolved wakes
/// all waiters with `None`.
#[derive(Debug)]
pub struct Resolution<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Resolution<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Store `value` if nothing was stored yet. Returns whether it was stored.
    pub fn resolve(&self, value: T) -> bool {
        let mut value = Some(value);
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = value.take();
            true
        })
    }

    /// The resolved value, without waiting.
    pub fn peek(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// A handle that completes when this resolution does.
    pub fn waiter(&self) -> Waiter<T> {
        Waiter {
            rx: self.tx.subscribe(),
        }
    }
}

impl<T: Clone> Default for Resolution<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pending read of a [`Resolution`].
#[derive(Debug)]
pub struct Waiter<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Waiter<T> {
    /// Wait for the value. `None` if the resolution was dropped unresolved.
    pub async fn wait(mut self) -> Option<T> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        }
    }
}
