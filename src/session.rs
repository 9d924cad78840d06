//! Short-lived directory sessions.
//!
//! A session owns exactly one protocol connection for one facade call. The
//! connection is opened by a [`Connector`], handed to a single operation and
//! released afterwards, whatever the operation returned. A panicking
//! operation is released before the panic resumes, a cancelled one is
//! abandoned when its future is dropped.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::attribute::AttributeValue;
use crate::config::Settings;
use crate::entry::Entry;
use crate::error::Result;
use crate::modification::Modification;
use crate::search::Search;

/// Opens protocol connections.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Context: DirectoryContext;

    /// Connect and bind according to `settings`.
    async fn open(&self, settings: &Settings) -> Result<Self::Context>;
}

/// Protocol primitives available on an open connection.
#[allow(async_fn_in_trait)]
pub trait DirectoryContext {
    /// Create a new entry at `dn`.
    async fn add(&mut self, dn: &str, attributes: Vec<AttributeValue>) -> Result<()>;

    async fn delete(&mut self, dn: &str) -> Result<()>;

    /// Read the entry at `dn`.
    async fn lookup(&mut self, dn: &str) -> Result<Entry>;

    /// Run `search` and hand every result to `on_entry`, in result order.
    async fn search_each<F>(&mut self, search: &Search, on_entry: F) -> Result<()>
    where
        F: FnMut(Entry) -> Result<()>;

    /// Run `search` and collect its results.
    async fn search(&mut self, search: &Search) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        self.search_each(search, |entry| {
            entries.push(entry);
            Ok(())
        })
        .await?;
        Ok(entries)
    }

    /// Apply every modification to `dn` in a single request.
    async fn modify_attributes(&mut self, dn: &str, items: Vec<Modification>) -> Result<()>;

    /// Move `source` to `target`.
    async fn rename(&mut self, source: &str, target: &str, delete_old_rdn: bool) -> Result<()>;

    /// Release the connection.
    async fn close(self) -> Result<()>;

    /// Release the connection without waiting for the server.
    ///
    /// Called instead of [`DirectoryContext::close`] when the operation
    /// future is dropped before completion.
    fn abandon(self);
}

/// Holds the open context until it is released.
struct Lease<X: DirectoryContext>(Option<X>);

impl<X: DirectoryContext> Drop for Lease<X> {
    fn drop(&mut self) {
        if let Some(context) = self.0.take() {
            tracing::debug!("directory operation cancelled, abandoning connection");
            context.abandon();
        }
    }
}

/// Open a connection, run `operation` on it and release it.
///
/// The connection is released exactly once on every path. A release
/// failure is logged and dropped, the operation outcome is returned
/// unchanged.
pub async fn perform_with_connection<C, T, F>(
    connector: &C,
    settings: &Settings,
    operation: F,
) -> Result<T>
where
    C: Connector,
    F: AsyncFnOnce(&mut C::Context) -> Result<T>,
{
    let mut lease = Lease(None);
    let context = lease.0.insert(connector.open(settings).await?);
    tracing::trace!(url = %settings.url, "directory connection opened");

    let outcome = AssertUnwindSafe(operation(context)).catch_unwind().await;

    if let Some(context) = lease.0.take() {
        if let Err(error) = context.close().await {
            tracing::warn!(%error, url = %settings.url, "failed to release directory connection");
        }
    }

    outcome.unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}
