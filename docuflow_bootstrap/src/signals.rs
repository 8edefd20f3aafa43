// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Signal Handling
//!
//! Wires SIGINT/SIGTERM (and Ctrl-C everywhere) to the shutdown token so
//! long-running workers drain gracefully instead of dying mid-commit.

use tracing::info;

use crate::shutdown::{channel, ShutdownController, ShutdownToken};

/// Creates a shutdown token tripped by SIGINT/SIGTERM. The listener task
/// lives for the process lifetime.
pub fn install() -> ShutdownToken {
    let (controller, token) = channel();
    tokio::spawn(listen(controller));
    token
}

async fn listen(controller: ShutdownController) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(_) => {
                // Fall back to Ctrl-C only.
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("SIGINT received; shutting down");
                    controller.shutdown();
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received; shutting down");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received; shutting down");
            }
        }
        controller.shutdown();
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received; shutting down");
            controller.shutdown();
        }
    }
}
