//! Scenarios against a running directory server.
//!
//! Run with `cargo test -- --ignored` and `LDAP_URL`, `LDAP_BIND_DN`,
//! `LDAP_BIND_PASSWORD`, `LDAP_BASE` pointing to a writable tree.

use ldap_facade::{Directory, Scope, Search};
use serde_json::{Map, Value, json};

fn env(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn directory() -> Directory {
    Directory::new_instance_with_credentials(
        &env("LDAP_URL", "ldap://localhost:389"),
        env("LDAP_BIND_DN", "cn=admin,dc=example"),
        env("LDAP_BIND_PASSWORD", "admin"),
    )
    .expect("valid settings")
}

fn base() -> String {
    env("LDAP_BASE", "dc=example")
}

fn map(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("JSON object")
}

async fn cleanup(ldap: &Directory, dn: &str) {
    if ldap.exists(dn).await.unwrap_or(false) {
        ldap.delete(dn).await.expect("cleanup");
    }
}

#[tokio::test]
#[ignore = "needs a running directory server"]
async fn test_add_search_modify_read() {
    let ldap = directory();
    let dn = format!("cn=test,{}", base());
    cleanup(&ldap, &dn).await;

    ldap.add(
        &dn,
        &map(json!({"objectClass": ["top", "person"], "cn": "test", "sn": "t"})),
    )
    .await
    .unwrap();
    assert!(ldap.exists(&dn).await.unwrap());

    let entries = ldap
        .search_map(&map(json!({"base": base(), "filter": "(cn=test)", "scope": "SUB"})))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].dn().eq_ignore_ascii_case(&dn));

    ldap.modify_named(&dn, "REPLACE", &map(json!({"sn": "updated"})))
        .await
        .unwrap();
    let entry = ldap.read(&dn).await.unwrap();
    assert_eq!(entry.first("sn"), Some("updated"));

    assert!(ldap.compare(&dn, &map(json!({"sn": "updated"}))).await.unwrap());

    ldap.delete(&dn).await.unwrap();
    assert!(!ldap.exists(&dn).await.unwrap());
    assert!(ldap.delete(&dn).await.unwrap_err().is_not_found());
}

#[tokio::test]
#[ignore = "needs a running directory server"]
async fn test_each_entry_visits_every_match() {
    let ldap = directory();
    let names = ["each-1", "each-2", "each-3"];

    for name in names {
        let dn = format!("cn={name},{}", base());
        cleanup(&ldap, &dn).await;
        ldap.add(
            &dn,
            &map(json!({"objectClass": ["top", "person"], "cn": name, "sn": "each"})),
        )
        .await
        .unwrap();
    }

    let mut seen = Vec::new();
    ldap.each_entry(
        &Search::filter_in("(sn=each)", base(), Scope::Sub),
        |entry| {
            seen.push(entry.first("cn").map(str::to_owned));
            Ok::<_, std::io::Error>(())
        },
    )
    .await
    .unwrap();
    assert_eq!(seen.len(), 3);

    for name in names {
        ldap.delete(&format!("cn={name},{}", base())).await.unwrap();
    }
}
