//! Directory facade.
//!
//! Every operation opens its own connection, performs one logical request
//! and releases the connection before returning. Nothing is shared between
//! calls, a [`Directory`] can be used concurrently.

use std::time::Instant;

use serde_json::{Map, Value};

use crate::attribute::{AttributeValue, coerce_all};
use crate::config::Settings;
use crate::entry::Entry;
use crate::error::{DirectoryError, Result};
use crate::ldap::{LdapConnector, target_dn};
use crate::modification::{ModificationKind, ModificationSpec};
use crate::search::{Scope, Search};
use crate::session::{Connector, DirectoryContext, perform_with_connection};
use crate::telemetry::track;

/// Scripting-friendly access to a directory server.
#[derive(Clone, Debug)]
pub struct Directory<C = LdapConnector> {
    settings: Settings,
    connector: C,
}

impl Directory<LdapConnector> {
    /// Anonymous access to `ldap://localhost:389/`.
    pub fn new_instance() -> Self {
        Self::with_connector(Settings::default(), LdapConnector)
    }

    /// Anonymous access to `url`.
    pub fn new_instance_with_url(url: &str) -> Result<Self> {
        Ok(Self::with_connector(Settings::anonymous(url)?, LdapConnector))
    }

    /// Access to `url` bound as `user`.
    pub fn new_instance_with_credentials(
        url: &str,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::with_connector(
            Settings::simple(url, user, password)?,
            LdapConnector,
        ))
    }
}

impl<C: Connector> Directory<C> {
    /// Create a new [`Directory`] opening connections through `connector`.
    pub fn with_connector(settings: Settings, connector: C) -> Self {
        Self {
            settings,
            connector,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn perform<T, F>(&self, operation: &'static str, action: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut C::Context) -> Result<T>,
    {
        let start = Instant::now();
        let outcome = perform_with_connection(&self.connector, &self.settings, action).await;
        track(operation, start, &outcome);
        outcome
    }

    /// Add a new entry at `dn`.
    ///
    /// Array values become multi-valued attributes.
    pub async fn add(&self, dn: &str, attributes: &Map<String, Value>) -> Result<()> {
        let attributes = coerce_all(attributes);
        self.perform("add", async |ctx: &mut C::Context| ctx.add(dn, attributes).await)
            .await
    }

    /// Add a new entry from already built attributes.
    pub async fn add_attributes(&self, dn: &str, attributes: Vec<AttributeValue>) -> Result<()> {
        self.perform("add", async |ctx: &mut C::Context| ctx.add(dn, attributes).await)
            .await
    }

    /// Delete the entry at `dn`.
    ///
    /// Fails with [`DirectoryError::NotFound`] if the entry does not exist,
    /// without sending the delete request.
    pub async fn delete(&self, dn: &str) -> Result<()> {
        if !self.exists(dn).await? {
            return Err(DirectoryError::NotFound(dn.to_owned()));
        }

        self.perform("delete", async |ctx: &mut C::Context| ctx.delete(dn).await)
            .await
    }

    /// Read the entry at `dn`.
    pub async fn read(&self, dn: &str) -> Result<Entry> {
        self.perform("read", async |ctx: &mut C::Context| ctx.lookup(dn).await)
            .await
    }

    /// Whether an entry exists at `dn`.
    ///
    /// Uses a base-scoped search returning no attribute. Only a "no such
    /// object" answer means `false`, any other failure is returned.
    pub async fn exists(&self, dn: &str) -> Result<bool> {
        let probe = Search::probe(dn);

        self.perform("exists", async |ctx: &mut C::Context| {
            match ctx.search(&probe).await {
                Ok(entries) => Ok(!entries.is_empty()),
                Err(err) if err.is_not_found() => Ok(false),
                Err(err) => Err(err),
            }
        })
        .await
    }

    /// Whether the entry at `dn` holds the single attribute value of
    /// `assertion`.
    ///
    /// The value is bound as a filter argument, never pasted into the
    /// filter text.
    pub async fn compare(&self, dn: &str, assertion: &Map<String, Value>) -> Result<bool> {
        let mut pairs = assertion.iter();
        let (Some((name, value)), None) = (pairs.next(), pairs.next()) else {
            return Err(DirectoryError::config(
                "assertion may only include one attribute",
            ));
        };

        let search = Search::probe(dn)
            .with_filter(format!("({name}={{0}})"))
            .with_filter_args([value.clone()]);

        self.perform("compare", async |ctx: &mut C::Context| {
            Ok(!ctx.search(&search).await?.is_empty())
        })
        .await
    }

    /// Rename `dn` to `new_rdn` under `new_superior`.
    pub async fn modify_dn(
        &self,
        dn: &str,
        new_rdn: &str,
        delete_old_rdn: bool,
        new_superior: &str,
    ) -> Result<()> {
        let target = target_dn(new_rdn, new_superior);
        tracing::debug!(source = %dn, %target, delete_old_rdn, "renaming entry");

        self.perform("modify_dn", async |ctx: &mut C::Context| {
            ctx.rename(dn, &target, delete_old_rdn).await
        })
        .await
    }

    /// Apply `kind` to every attribute of the map.
    pub async fn modify(
        &self,
        dn: &str,
        kind: ModificationKind,
        attributes: &Map<String, Value>,
    ) -> Result<()> {
        self.modify_spec(dn, ModificationSpec::from_uniform_map(kind, attributes))
            .await
    }

    /// Same as [`Directory::modify`] with the kind given by name
    /// (`ADD`, `DELETE` or `REPLACE`).
    pub async fn modify_named(
        &self,
        dn: &str,
        kind: &str,
        attributes: &Map<String, Value>,
    ) -> Result<()> {
        self.modify(dn, kind.parse()?, attributes).await
    }

    /// Apply a list of `[kind, {attribute: value}]` pairs, in order, as one
    /// request.
    pub async fn modify_pairs(&self, dn: &str, pairs: &[Value]) -> Result<()> {
        self.modify_spec(dn, ModificationSpec::from_pairs(pairs)?).await
    }

    /// Apply every item of `spec` as one request.
    pub async fn modify_spec(&self, dn: &str, spec: ModificationSpec) -> Result<()> {
        let items = spec.into_items();
        self.perform("modify", async |ctx: &mut C::Context| {
            ctx.modify_attributes(dn, items).await
        })
        .await
    }

    /// Every entry matched by `search`, in result order.
    pub async fn search(&self, search: &Search) -> Result<Vec<Entry>> {
        self.perform("search", async |ctx: &mut C::Context| ctx.search(search).await)
            .await
    }

    /// [`Directory::search`] with parameters given as a map.
    pub async fn search_map(&self, params: &Map<String, Value>) -> Result<Vec<Entry>> {
        self.search(&Search::from_map(params)?).await
    }

    pub async fn search_filter(&self, filter: &str, base: &str, scope: Scope) -> Result<Vec<Entry>> {
        self.search(&Search::filter_in(filter, base, scope)).await
    }

    /// The only entry matched by `search`, if any.
    ///
    /// Fails with [`DirectoryError::Ambiguous`] when more than one entry
    /// matches.
    pub async fn search_unique(&self, search: &Search) -> Result<Option<Entry>> {
        let mut entries = self.search(search).await?;

        match entries.len() {
            0 => Ok(None),
            1 => Ok(entries.pop()),
            n => Err(DirectoryError::Ambiguous(n)),
        }
    }

    pub async fn search_unique_map(&self, params: &Map<String, Value>) -> Result<Option<Entry>> {
        self.search_unique(&Search::from_map(params)?).await
    }

    /// Call `callback` on every entry matched by `search`, in result order.
    ///
    /// The connection stays open during the whole iteration. A callback
    /// failure stops the iteration and is returned as
    /// [`DirectoryError::Callback`].
    pub async fn each_entry<F, E>(&self, search: &Search, mut callback: F) -> Result<()>
    where
        F: FnMut(Entry) -> std::result::Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.perform("each_entry", async |ctx: &mut C::Context| {
            ctx.search_each(search, |entry| {
                callback(entry).map_err(|err| DirectoryError::Callback(err.into()))
            })
            .await
        })
        .await
    }

    pub async fn each_entry_map<F, E>(&self, params: &Map<String, Value>, callback: F) -> Result<()>
    where
        F: FnMut(Entry) -> std::result::Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.each_entry(&Search::from_map(params)?, callback).await
    }

    pub async fn each_entry_filter<F, E>(
        &self,
        filter: &str,
        base: &str,
        scope: Scope,
        callback: F,
    ) -> Result<()>
    where
        F: FnMut(Entry) -> std::result::Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.each_entry(&Search::filter_in(filter, base, scope), callback)
            .await
    }

    /// Walk the whole tree with `filter`.
    pub async fn each_entry_in_filter<F, E>(&self, filter: &str, callback: F) -> Result<()>
    where
        F: FnMut(Entry) -> std::result::Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.each_entry_filter(filter, "", Scope::Sub, callback).await
    }
}
