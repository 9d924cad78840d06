//! LDAP support.
//!
//! [`DirectoryContext`] implementation on top of [`ldap3`].

use std::collections::HashSet;

use ldap3::{Ldap as Ldap3, LdapConnAsync, LdapConnSettings, LdapError, SearchEntry};

use crate::attribute::AttributeValue;
use crate::config::{Bind, Settings};
use crate::entry::Entry;
use crate::error::{DirectoryError, NO_SUCH_OBJECT, Result};
use crate::modification::Modification;
use crate::search::{Scope, Search};
use crate::session::{Connector, DirectoryContext};

/// Opens [`Ldap3`] connections.
#[derive(Clone, Copy, Debug, Default)]
pub struct LdapConnector;

impl Connector for LdapConnector {
    type Context = Ldap;

    async fn open(&self, settings: &Settings) -> Result<Ldap> {
        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(settings.timeout)
            .set_starttls(settings.starttls);

        let (handle, mut conn) =
            LdapConnAsync::with_settings(conn_settings, settings.url.as_str()).await?;
        ldap3::drive!(handle);

        if let Bind::Simple { user, password } = &settings.bind {
            tracing::debug!(bind_dn = %user, "performing LDAP bind");

            let bound = match conn.simple_bind(user, password).await {
                Ok(result) => result.success().map(drop),
                Err(err) => Err(err),
            };

            if let Err(err) = bound {
                let _ = conn.unbind().await;
                return Err(err.into());
            }
        }

        Ok(Ldap { conn })
    }
}

/// One open [`Ldap3`] connection.
#[derive(Clone, Debug)]
pub struct Ldap {
    conn: Ldap3,
}

impl DirectoryContext for Ldap {
    async fn add(&mut self, dn: &str, attributes: Vec<AttributeValue>) -> Result<()> {
        let attrs = attributes
            .into_iter()
            .map(|attribute| {
                let (name, values) = attribute.into_parts();
                (name.into_bytes(), values.into_iter().collect::<HashSet<_>>())
            })
            .collect();

        self.conn.add(dn, attrs).await?.success()?;
        Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        self.conn.delete(dn).await?.success()?;
        Ok(())
    }

    async fn lookup(&mut self, dn: &str) -> Result<Entry> {
        let search = Search::default().with_base(dn).with_scope(Scope::Base);

        match self.search(&search).await {
            Ok(entries) => entries
                .into_iter()
                .next()
                .ok_or_else(|| DirectoryError::NotFound(dn.to_owned())),
            Err(DirectoryError::Protocol(LdapError::LdapResult { result }))
                if result.rc == NO_SUCH_OBJECT =>
            {
                Err(DirectoryError::NotFound(dn.to_owned()))
            },
            Err(err) => Err(err),
        }
    }

    async fn search_each<F>(&mut self, search: &Search, mut on_entry: F) -> Result<()>
    where
        F: FnMut(Entry) -> Result<()>,
    {
        let filter = search.bound_filter()?;
        tracing::debug!(base = %search.base(), scope = %search.scope(), %filter, "searching LDAP");

        let mut stream = self
            .conn
            .streaming_search(
                search.base(),
                search.scope().into(),
                &filter,
                search.requested_attrs(),
            )
            .await?;

        while let Some(entry) = stream.next().await? {
            if entry.is_ref() || entry.is_intermediate() {
                continue;
            }

            if let Err(err) = on_entry(Entry::from(SearchEntry::construct(entry))) {
                let msgid = stream.ldap_handle().last_id();
                let _ = stream.ldap_handle().abandon(msgid).await;
                return Err(err);
            }
        }

        stream.finish().await.success()?;
        Ok(())
    }

    async fn modify_attributes(&mut self, dn: &str, items: Vec<Modification>) -> Result<()> {
        let mods = items.into_iter().map(ldap3::Mod::from).collect();
        self.conn.modify(dn, mods).await?.success()?;
        Ok(())
    }

    async fn rename(&mut self, source: &str, target: &str, delete_old_rdn: bool) -> Result<()> {
        let (rdn, superior) = split_rdn(target);
        self.conn
            .modifydn(source, rdn, delete_old_rdn, superior)
            .await?
            .success()?;
        Ok(())
    }

    async fn close(mut self) -> Result<()> {
        self.conn.unbind().await?;
        Ok(())
    }

    fn abandon(mut self) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(error) = self.conn.unbind().await {
                        tracing::debug!(%error, "failed to unbind abandoned connection");
                    }
                });
            },
            // Dropping the handle still ends the driver task.
            Err(_) => tracing::debug!("no runtime left, dropping LDAP connection"),
        }
    }
}

/// Split a DN into its leading RDN and its parent DN.
///
/// Escaped commas (`\,`) are part of the RDN.
pub(crate) fn split_rdn(dn: &str) -> (&str, Option<&str>) {
    let mut escaped = false;

    for (i, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => return (dn[..i].trim(), Some(dn[i + 1..].trim())),
            _ => {},
        }
    }

    (dn.trim(), None)
}

/// Target of a rename: `new_rdn` placed under `new_superior`.
pub(crate) fn target_dn(new_rdn: &str, new_superior: &str) -> String {
    if new_superior.is_empty() {
        new_rdn.to_owned()
    } else {
        format!("{new_rdn},{new_superior}")
    }
}
