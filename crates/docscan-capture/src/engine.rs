// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine readiness — the analysis engine may still be loading when the
// scanner opens. Sessions hold an `EngineHandle` and wait on it before they
// start searching.

use std::sync::Arc;

use docscan_core::error::{Result, ScanError};
use tokio::sync::watch;
use tracing::{info, warn};

enum Readiness<A> {
    Loading,
    Ready(Arc<A>),
    Failed(String),
}

impl<A> Clone for Readiness<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Loading => Self::Loading,
            Self::Ready(engine) => Self::Ready(Arc::clone(engine)),
            Self::Failed(reason) => Self::Failed(reason.clone()),
        }
    }
}

/// Shared, cloneable view of an engine that is loaded once.
pub struct EngineHandle<A> {
    rx: watch::Receiver<Readiness<A>>,
}

impl<A> Clone for EngineHandle<A> {
    fn clone(&self) -> Self {
        Self { rx: self.rx.clone() }
    }
}

/// Write side of a loading engine. Dropping it without installing an
/// engine marks the engine unavailable.
pub struct EngineInstaller<A> {
    tx: watch::Sender<Readiness<A>>,
}

impl<A: Send + Sync + 'static> EngineHandle<A> {
    /// Handle to an engine that is already available.
    pub fn ready(engine: A) -> Self {
        let (_tx, rx) = watch::channel(Readiness::Ready(Arc::new(engine)));
        Self { rx }
    }

    /// Handle whose engine will be installed later.
    pub fn loading() -> (Self, EngineInstaller<A>) {
        let (tx, rx) = watch::channel(Readiness::Loading);
        (Self { rx }, EngineInstaller { tx })
    }

    /// Load the engine on the blocking pool. Must be called from within a
    /// Tokio runtime.
    pub fn spawn_blocking<F>(load: F) -> Self
    where
        F: FnOnce() -> Result<A> + Send + 'static,
    {
        let (handle, installer) = Self::loading();
        tokio::task::spawn_blocking(move || match load() {
            Ok(engine) => installer.install(engine),
            Err(err) => installer.fail(err.to_string()),
        });
        handle
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.rx.borrow(), Readiness::Ready(_))
    }

    /// Wait until the engine is installed.
    pub async fn wait(&self) -> Result<Arc<A>> {
        let mut rx = self.rx.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            match current {
                Readiness::Ready(engine) => return Ok(engine),
                Readiness::Failed(reason) => {
                    warn!(%reason, "vision engine failed to load");
                    return Err(ScanError::EngineUnavailable);
                }
                Readiness::Loading => {}
            }
            if rx.changed().await.is_err() {
                warn!("vision engine loader went away");
                return Err(ScanError::EngineUnavailable);
            }
        }
    }
}

impl<A> EngineInstaller<A> {
    pub fn install(self, engine: A) {
        info!("vision engine installed");
        self.tx.send_replace(Readiness::Ready(Arc::new(engine)));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.tx.send_replace(Readiness::Failed(reason.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_install() {
        let (handle, installer) = EngineHandle::<u32>::loading();
        assert!(!handle.is_ready());

        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait().await }
        });
        installer.install(7);

        let engine = waiter.await.expect("join").expect("engine");
        assert_eq!(*engine, 7);
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn dropped_installer_means_unavailable() {
        let (handle, installer) = EngineHandle::<u32>::loading();
        drop(installer);
        assert!(matches!(handle.wait().await, Err(ScanError::EngineUnavailable)));
    }

    #[tokio::test]
    async fn failed_load_is_reported() {
        let handle = EngineHandle::<u32>::spawn_blocking(|| Err(ScanError::Config("bad".into())));
        assert!(matches!(handle.wait().await, Err(ScanError::EngineUnavailable)));
    }
}
