//! In-memory directory used by unit tests.
//!
//! MUST NEVER be used in production.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::attribute::AttributeValue;
use crate::config::Settings;
use crate::entry::Entry;
use crate::error::{DirectoryError, NO_SUCH_OBJECT, Result, ldap_failure};
use crate::ldap::split_rdn;
use crate::modification::{Modification, ModificationKind};
use crate::search::{NO_ATTRIBUTES, Scope, Search};
use crate::session::{Connector, DirectoryContext};

const ENTRY_ALREADY_EXISTS: u32 = 68;
const UNAVAILABLE: u32 = 52;

/// Calls observed by a [`MemoryDirectory`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub opened: usize,
    pub closed: usize,
    pub searches: usize,
    pub deletes: usize,
    pub modifies: usize,
    pub renames: usize,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<Entry>,
    stats: Stats,
    fail_open: bool,
    fail_close: bool,
    fail_search: Option<u32>,
}

/// Shared in-memory tree. Clones see the same entries.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    pub fn with_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let directory = Self::default();
        directory.lock().entries.extend(entries);
        directory
    }

    /// Every connection attempt fails.
    pub fn failing_open(self) -> Self {
        self.lock().fail_open = true;
        self
    }

    /// Every release fails.
    pub fn failing_close(self) -> Self {
        self.lock().fail_close = true;
        self
    }

    /// Every search fails with result code `rc`.
    pub fn failing_search(self, rc: u32) -> Self {
        self.lock().fail_search = Some(rc);
        self
    }

    pub fn stats(&self) -> Stats {
        self.lock().stats
    }

    pub fn entry(&self, dn: &str) -> Option<Entry> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.dn.eq_ignore_ascii_case(dn))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl Connector for MemoryDirectory {
    type Context = MemoryContext;

    async fn open(&self, _settings: &Settings) -> Result<MemoryContext> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(ldap_failure(UNAVAILABLE));
        }
        state.stats.opened += 1;

        Ok(MemoryContext {
            directory: self.clone(),
        })
    }
}

pub struct MemoryContext {
    directory: MemoryDirectory,
}

impl DirectoryContext for MemoryContext {
    async fn add(&mut self, dn: &str, attributes: Vec<AttributeValue>) -> Result<()> {
        let mut state = self.directory.lock();
        if find(&state.entries, dn).is_some() {
            return Err(ldap_failure(ENTRY_ALREADY_EXISTS));
        }

        let mut entry = Entry::new(dn);
        for attribute in attributes {
            let (name, values) = attribute.into_parts();
            entry.attrs.insert(name, values.iter().map(|v| text(v)).collect());
        }
        state.entries.push(entry);
        Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        let mut state = self.directory.lock();
        state.stats.deletes += 1;
        let index = find(&state.entries, dn).ok_or_else(|| ldap_failure(NO_SUCH_OBJECT))?;
        state.entries.remove(index);
        Ok(())
    }

    async fn lookup(&mut self, dn: &str) -> Result<Entry> {
        let state = self.directory.lock();
        find(&state.entries, dn)
            .map(|i| state.entries[i].clone())
            .ok_or_else(|| DirectoryError::NotFound(dn.to_owned()))
    }

    async fn search_each<F>(&mut self, search: &Search, mut on_entry: F) -> Result<()>
    where
        F: FnMut(Entry) -> Result<()>,
    {
        let filter = search.bound_filter()?;
        let matched: Vec<Entry> = {
            let mut state = self.directory.lock();
            state.stats.searches += 1;

            if let Some(rc) = state.fail_search {
                return Err(ldap_failure(rc));
            }

            if !search.base().is_empty() && find(&state.entries, search.base()).is_none() {
                return Err(ldap_failure(NO_SUCH_OBJECT));
            }

            state
                .entries
                .iter()
                .filter(|e| in_scope(e.dn(), search.base(), search.scope()))
                .filter(|e| matches(&filter, e))
                .map(|e| project(e, &search.requested_attrs()))
                .collect()
        };

        for entry in matched {
            on_entry(entry)?;
        }
        Ok(())
    }

    async fn modify_attributes(&mut self, dn: &str, items: Vec<Modification>) -> Result<()> {
        let mut state = self.directory.lock();
        state.stats.modifies += 1;
        let index = find(&state.entries, dn).ok_or_else(|| ldap_failure(NO_SUCH_OBJECT))?;
        let entry = &mut state.entries[index];

        for item in items {
            let (name, values) = item.attribute.into_parts();
            let values: Vec<String> = values.iter().map(|v| text(v)).collect();
            let key = entry
                .attrs
                .keys()
                .find(|k| k.eq_ignore_ascii_case(&name))
                .cloned()
                .unwrap_or(name);

            match item.kind {
                ModificationKind::Add => entry.attrs.entry(key).or_default().extend(values),
                ModificationKind::Replace if values.is_empty() => {
                    entry.attrs.remove(&key);
                },
                ModificationKind::Replace => {
                    entry.attrs.insert(key, values);
                },
                ModificationKind::Delete if values.is_empty() => {
                    entry.attrs.remove(&key);
                },
                ModificationKind::Delete => {
                    if let Some(current) = entry.attrs.get_mut(&key) {
                        current.retain(|v| !values.contains(v));
                    }
                },
            }
        }
        Ok(())
    }

    async fn rename(&mut self, source: &str, target: &str, _delete_old_rdn: bool) -> Result<()> {
        let mut state = self.directory.lock();
        state.stats.renames += 1;
        let index = find(&state.entries, source).ok_or_else(|| ldap_failure(NO_SUCH_OBJECT))?;
        state.entries[index].dn = target.to_owned();
        Ok(())
    }

    fn abandon(self) {
        self.directory.lock().stats.closed += 1;
    }

    async fn close(self) -> Result<()> {
        let mut state = self.directory.lock();
        state.stats.closed += 1;
        if state.fail_close {
            return Err(ldap_failure(UNAVAILABLE));
        }
        Ok(())
    }
}

fn text(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn find(entries: &[Entry], dn: &str) -> Option<usize> {
    entries.iter().position(|e| e.dn.eq_ignore_ascii_case(dn))
}

fn in_scope(dn: &str, base: &str, scope: Scope) -> bool {
    let parent = split_rdn(dn).1;
    match scope {
        Scope::Base => dn.eq_ignore_ascii_case(base),
        Scope::One => parent.unwrap_or_default().eq_ignore_ascii_case(base),
        Scope::Sub => {
            base.is_empty()
                || dn.eq_ignore_ascii_case(base)
                || dn
                    .to_ascii_lowercase()
                    .ends_with(&format!(",{}", base.to_ascii_lowercase()))
        },
    }
}

fn project(entry: &Entry, requested: &[String]) -> Entry {
    let mut projected = Entry::new(entry.dn());
    if requested.iter().any(|a| a == NO_ATTRIBUTES) {
        return projected;
    }

    projected.attrs = entry
        .attrs
        .iter()
        .filter(|(name, _)| requested.iter().any(|a| a == "*" || a.eq_ignore_ascii_case(name)))
        .map(|(name, values)| (name.clone(), values.clone()))
        .collect();
    projected
}

/// Evaluate presence, equality and `&` filters.
fn matches(filter: &str, entry: &Entry) -> bool {
    let inner = filter
        .strip_prefix('(')
        .and_then(|f| f.strip_suffix(')'))
        .unwrap_or(filter);

    if let Some(components) = inner.strip_prefix('&') {
        return split_components(components).iter().all(|c| matches(c, entry));
    }

    match inner.split_once('=') {
        Some((attr, "*")) => attr.eq_ignore_ascii_case("objectClass") || entry.get(attr).is_some(),
        Some((attr, value)) => {
            let value = unescape(value);
            entry
                .get(attr)
                .is_some_and(|values| values.iter().any(|v| v.eq_ignore_ascii_case(&value)))
        },
        None => false,
    }
}

fn split_components(input: &str) -> Vec<&str> {
    let mut components = Vec::new();
    let (mut depth, mut start) = (0usize, 0usize);

    for (i, c) in input.char_indices() {
        match c {
            '(' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            },
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    components.push(&input[start..=i]);
                }
            },
            _ => {},
        }
    }
    components
}

fn unescape(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let decoded = (bytes[i] == b'\\')
            .then(|| value.get(i + 1..i + 3))
            .flatten()
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());

        match decoded {
            Some(byte) => {
                out.push(byte);
                i += 3;
            },
            None => {
                out.push(bytes[i]);
                i += 1;
            },
        }
    }
    text(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let entry = Entry::new("cn=a(b),dc=example").with_attr("cn", ["a(b)"]);
        assert!(matches("(objectClass=*)", &entry));
        assert!(matches(r"(cn=a\28b\29)", &entry));
        assert!(matches(r"(&(cn=*)(cn=A\28B\29))", &entry));
        assert!(!matches("(sn=*)", &entry));
    }

    #[test]
    fn test_in_scope() {
        assert!(in_scope("cn=a,dc=example", "dc=example", Scope::One));
        assert!(!in_scope("cn=b,cn=a,dc=example", "dc=example", Scope::One));
        assert!(in_scope("cn=b,cn=a,dc=example", "dc=example", Scope::Sub));
        assert!(!in_scope("cn=a,dc=example", "dc=example", Scope::Base));
    }
}
