// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! A one-shot, cloneable shutdown token. The signal handler (or any other
//! owner of the [`ShutdownController`]) trips it once; workers observe it
//! between units and finish in-flight work before exiting. Cancellation of
//! in-flight pipeline steps is the orchestrator's business, not the
//! token's.

use tokio::sync::watch;

/// Trips the shutdown signal. One per process.
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

/// Observes the shutdown signal. Clone freely.
#[derive(Clone)]
pub struct ShutdownToken {
    receiver: watch::Receiver<bool>,
}

/// Creates a controller/token pair.
pub fn channel() -> (ShutdownController, ShutdownToken) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownController { sender }, ShutdownToken { receiver })
}

impl ShutdownController {
    /// Signals shutdown. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
    }
}

impl ShutdownToken {
    /// True once shutdown has been signalled.
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves when shutdown is signalled (immediately if it already
    /// was).
    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        if *receiver.borrow() {
            return;
        }
        // The controller dropping also means nobody will ever signal; that
        // counts as shutdown for a waiting worker.
        while receiver.changed().await.is_ok() {
            if *receiver.borrow() {
                return;
            }
        }
    }

    /// A token that never fires; for tools that run to completion.
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        // Keep the channel open for the process lifetime.
        Box::leak(Box::new(sender));
        Self { receiver }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_observes_the_controller() {
        let (controller, token) = channel();
        assert!(!token.is_shutdown());
        controller.shutdown();
        assert!(token.is_shutdown());
        token.wait().await;
    }

    #[tokio::test]
    async fn wait_unblocks_on_signal() {
        let (controller, token) = channel();
        let waiter = tokio::spawn(async move {
            token.wait().await;
            true
        });
        controller.shutdown();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn dropped_controller_counts_as_shutdown() {
        let (controller, token) = channel();
        drop(controller);
        token.wait().await;
    }
}
