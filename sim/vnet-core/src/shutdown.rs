use std::sync::Arc;
use tokio::sync::watch;

/// A struct which can be used to shut down a simulation or a single device.
/// You can create multiple connected shutdowns by cloning. Once shut down, a
/// shutdown stays shut down.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// This channel can be used to tell every clone to shut down.
    notify: Arc<watch::Sender<bool>>,
    /// Keeps track of the last value seen, so `wait` can be called repeatedly.
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    /// Creates a new active shutdown.
    pub fn new() -> Self {
        let (notify, receiver) = watch::channel(false);
        Self {
            notify: Arc::new(notify),
            receiver,
        }
    }

    /// Signals every `Shutdown` cloned from this one.
    pub fn shut_down(&self) {
        self.notify.send_replace(true);
    }

    /// Whether a shutdown has been signalled.
    pub fn is_shut_down(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Waits until a shutdown is signalled. Returns immediately if one
    /// already was.
    pub async fn wait(&mut self) {
        loop {
            if *self.receiver.borrow_and_update() {
                return;
            }
            // The sender lives as long as any clone, including this one
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_clone_sees_the_signal() {
        let shut0 = Shutdown::new();
        let shuts = [shut0.clone(), shut0.clone(), shut0.clone()];
        assert!(!shut0.is_shut_down());

        shuts[0].shut_down();

        for mut shut in shuts {
            shut.wait().await;
            assert!(shut.is_shut_down());
            // Sticky
            shut.wait().await;
        }
    }

    #[tokio::test]
    async fn waiting_resolves_after_a_later_signal() {
        let shutdown = Shutdown::new();
        let mut waiter = shutdown.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });
        tokio::task::yield_now().await;
        shutdown.shut_down();
        handle.await.unwrap();
    }
}
