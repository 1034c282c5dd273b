//! Stories about tearing a ConsulACL's entities down

use std::sync::Arc;

use consul_acl_operator::acl::DesiredAclConfig;
use consul_acl_operator::config::BindRuleMode;
use consul_acl_operator::naming::Owner;
use consul_acl_operator::sync::AclEngine;

use super::fake_consul::FakeConsul;

const AUTH_METHOD: &str = "consul-k8s-auth-method";

fn engine(consul: &Arc<FakeConsul>) -> AclEngine {
    AclEngine::with_settings(consul.clone(), AUTH_METHOD, BindRuleMode::Upsert)
}

fn app() -> Owner {
    Owner::new("app", "ns")
}

fn declaration() -> DesiredAclConfig {
    DesiredAclConfig::from_json(
        r#"{
            "policies": [{ "name": "read", "rules": "" }, { "name": "write", "rules": "" }],
            "roles": [{ "name": "reader", "policy_names": ["read"] }],
            "bind_rules": [{ "ServiceAccountName": "api", "BindName": "reader" }]
        }"#,
    )
    .unwrap()
}

fn position(writes: &[String], prefix: &str) -> usize {
    writes
        .iter()
        .position(|w| w.starts_with(prefix))
        .unwrap_or_else(|| panic!("no {prefix} call in {writes:?}"))
}

/// Story: deleting a synced declaration removes rules, then roles, then policies
#[tokio::test]
async fn story_teardown_runs_in_reverse_dependency_order() {
    let consul = Arc::new(FakeConsul::new());
    let engine = engine(&consul);
    engine.apply(&app(), &declaration()).await.unwrap();
    consul.clear_writes();

    engine.delete(&app(), &declaration()).await.unwrap();

    let writes = consul.writes();
    let last_rule = writes
        .iter()
        .rposition(|w| w.starts_with("delete_binding_rule"))
        .unwrap();
    let first_role = position(&writes, "delete_role");
    let last_role = writes
        .iter()
        .rposition(|w| w.starts_with("delete_role"))
        .unwrap();
    let first_policy = position(&writes, "delete_policy");
    assert!(last_rule < first_role);
    assert!(last_role < first_policy);

    assert_eq!(consul.policy_count(), 0);
    assert_eq!(consul.role_count(), 0);
    assert!(consul.binding_rules().is_empty());
}

/// Story: a failed role delete stops before any policy is touched
#[tokio::test]
async fn story_role_delete_failure_keeps_policies() {
    let consul = Arc::new(FakeConsul::new());
    let engine = engine(&consul);
    engine.apply(&app(), &declaration()).await.unwrap();
    consul.clear_writes();
    consul.fail_call("delete_role");

    let err = engine.delete(&app(), &declaration()).await.unwrap_err();

    assert!(err.to_string().contains("delete_role failed"));
    assert!(consul
        .writes()
        .iter()
        .all(|w| !w.starts_with("delete_policy")));
    assert_eq!(consul.policy_count(), 2);
    assert!(consul.binding_rules().is_empty());
}

/// Story: deleting entities that were never created is a no-op
#[tokio::test]
async fn story_absent_entities_are_skipped() {
    let consul = Arc::new(FakeConsul::new());

    engine(&consul)
        .delete(&app(), &declaration())
        .await
        .unwrap();

    assert!(consul.writes().is_empty());
}

/// Story: another application's entities survive a teardown
#[tokio::test]
async fn story_other_owners_entities_are_left_alone() {
    let consul = Arc::new(FakeConsul::new());
    let engine = engine(&consul);
    let neighbour = Owner::new("billing", "ns");
    engine.apply(&app(), &declaration()).await.unwrap();
    engine.apply(&neighbour, &declaration()).await.unwrap();

    engine.delete(&app(), &declaration()).await.unwrap();

    assert!(consul.policy("app_ns_read").is_none());
    assert!(consul.policy("billing_ns_read").is_some());
    assert!(consul.role("billing_ns_reader").is_some());
    let rules = consul.binding_rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].bind_name, "billing_ns_reader");
}
