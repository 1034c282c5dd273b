//! Stories about applying a ConsulACL declaration to Consul

use std::sync::Arc;

use consul_acl_operator::acl::DesiredAclConfig;
use consul_acl_operator::config::BindRuleMode;
use consul_acl_operator::naming::Owner;
use consul_acl_operator::sync::AclEngine;

use super::fake_consul::{FakeConsul, INVALID_RULES};

// =============================================================================
// Test Fixtures
// =============================================================================

const AUTH_METHOD: &str = "consul-k8s-auth-method";

fn engine(consul: &Arc<FakeConsul>, mode: BindRuleMode) -> AclEngine {
    AclEngine::with_settings(consul.clone(), AUTH_METHOD, mode)
}

fn app() -> Owner {
    Owner::new("app", "ns")
}

fn document(json: &str) -> DesiredAclConfig {
    DesiredAclConfig::from_json(json).expect("test document should decode")
}

fn full_declaration() -> DesiredAclConfig {
    document(
        r#"{
            "policies": [{ "name": "read", "rules": "key_prefix \"app/\" { policy = \"read\" }" }],
            "roles": [{ "name": "reader", "description": "reads app keys", "policy_names": ["read"] }],
            "bind_rules": [{ "description": "api pods", "ServiceAccountName": "api", "BindName": "reader" }]
        }"#,
    )
}

// =============================================================================
// Stories
// =============================================================================

/// Story: the first cycle for a single policy creates it under its qualified name
#[tokio::test]
async fn story_first_cycle_creates_qualified_policy() {
    let consul = Arc::new(FakeConsul::new());
    let desired = document(r#"{ "policies": [{ "name": "read", "rules": "" }] }"#);

    let summary = engine(&consul, BindRuleMode::Upsert)
        .apply(&app(), &desired)
        .await
        .unwrap();

    assert_eq!(summary.policies, "app_ns_read: created");
    assert_eq!(summary.roles, "No action was taken");
    assert_eq!(summary.bind_rules, "No action was taken");
    assert!(consul.policy("app_ns_read").is_some());
}

/// Story: running the same declaration again updates instead of duplicating
#[tokio::test]
async fn story_second_cycle_updates_existing_policy() {
    let consul = Arc::new(FakeConsul::new());
    let desired = document(r#"{ "policies": [{ "name": "read", "rules": "" }] }"#);
    let engine = engine(&consul, BindRuleMode::Upsert);

    engine.apply(&app(), &desired).await.unwrap();
    let summary = engine.apply(&app(), &desired).await.unwrap();

    assert_eq!(summary.policies, "app_ns_read: updated");
    assert_eq!(consul.policy_count(), 1);
}

/// Story: a role picks up the ID of the policy synced in the same cycle
#[tokio::test]
async fn story_role_links_exactly_the_declared_policy() {
    let consul = Arc::new(FakeConsul::new());

    engine(&consul, BindRuleMode::Upsert)
        .apply(&app(), &full_declaration())
        .await
        .unwrap();

    let policy = consul.policy("app_ns_read").unwrap();
    let role = consul.role("app_ns_reader").unwrap();
    assert_eq!(role.policies.len(), 1);
    assert_eq!(role.policies[0].name, "app_ns_read");
    assert_eq!(role.policies[0].id, policy.id);
    assert_eq!(role.description, "reads app keys");
}

/// Story: the binding rule lets the declared service account log in as the role
#[tokio::test]
async fn story_binding_rule_targets_service_account_in_owner_namespace() {
    let consul = Arc::new(FakeConsul::new());

    let summary = engine(&consul, BindRuleMode::Upsert)
        .apply(&app(), &full_declaration())
        .await
        .unwrap();

    assert_eq!(
        summary.bind_rules,
        "Bind rule for role with name app_ns_reader: created"
    );
    let rules = consul.binding_rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].auth_method, AUTH_METHOD);
    assert_eq!(rules[0].bind_type, "role");
    assert_eq!(rules[0].bind_name, "app_ns_reader");
    assert_eq!(
        rules[0].selector,
        r#"serviceaccount.namespace=="ns" and serviceaccount.name=="api""#
    );
}

/// Story: reconciling an already-synced declaration creates nothing new
#[tokio::test]
async fn story_resync_is_idempotent() {
    let consul = Arc::new(FakeConsul::new());
    let engine = engine(&consul, BindRuleMode::Upsert);
    engine.apply(&app(), &full_declaration()).await.unwrap();
    consul.clear_writes();

    let summary = engine.apply(&app(), &full_declaration()).await.unwrap();

    assert!(
        consul.writes().iter().all(|w| !w.starts_with("create")),
        "unexpected creates: {:?}",
        consul.writes()
    );
    assert_eq!(summary.policies, "app_ns_read: updated");
    assert_eq!(summary.roles, "app_ns_reader: updated");
    assert_eq!(
        summary.bind_rules,
        "Bind rule for role with name app_ns_reader: updated"
    );
    assert_eq!(consul.policy_count(), 1);
    assert_eq!(consul.role_count(), 1);
    assert_eq!(consul.binding_rules().len(), 1);
}

/// Story: the always-create mode writes a new binding rule every cycle
#[tokio::test]
async fn story_always_create_mode_accumulates_binding_rules() {
    let consul = Arc::new(FakeConsul::new());
    let engine = engine(&consul, BindRuleMode::AlwaysCreate);

    engine.apply(&app(), &full_declaration()).await.unwrap();
    let summary = engine.apply(&app(), &full_declaration()).await.unwrap();

    assert_eq!(
        summary.bind_rules,
        "Bind rule for role with name app_ns_reader: created"
    );
    assert_eq!(consul.binding_rules().len(), 2);
}

/// Story: two applications using the same short names never collide
#[tokio::test]
async fn story_owners_are_namespaced_apart() {
    let consul = Arc::new(FakeConsul::new());
    let engine = engine(&consul, BindRuleMode::Upsert);
    let desired = document(r#"{ "policies": [{ "name": "read", "rules": "" }] }"#);

    engine.apply(&app(), &desired).await.unwrap();
    engine
        .apply(&Owner::new("app", "other"), &desired)
        .await
        .unwrap();
    let summary = engine
        .apply(&Owner::new("billing", "ns"), &desired)
        .await
        .unwrap();

    assert_eq!(summary.policies, "billing_ns_read: created");
    assert_eq!(consul.policy_count(), 3);
    assert!(consul.policy("app_other_read").is_some());
}

/// Story: unnamed entities are reported and never sent to Consul
#[tokio::test]
async fn story_missing_names_are_reported_without_service_calls() {
    let consul = Arc::new(FakeConsul::new());
    let desired = document(
        r#"{
            "policies": [{ "rules": "" }, { "name": "read", "rules": "" }, { "rules": "" }],
            "roles": [{ "description": "nameless" }],
            "bind_rules": [{ "ServiceAccountName": "api" }]
        }"#,
    );

    let summary = engine(&consul, BindRuleMode::Upsert)
        .apply(&app(), &desired)
        .await
        .unwrap();

    assert_eq!(
        summary.policies,
        "missing name: Some policies have not got a name, app_ns_read: created"
    );
    assert_eq!(summary.roles, "missing name: Some roles have not got a name");
    assert_eq!(
        summary.bind_rules,
        "missing name: Some binding rules have not got a name"
    );
    assert_eq!(consul.writes(), vec!["create_policy app_ns_read".to_string()]);
}

/// Story: a role whose policy was rejected is still written, minus that link
#[tokio::test]
async fn story_rejected_policy_leaves_role_without_the_link() {
    let consul = Arc::new(FakeConsul::new());
    let desired = document(&format!(
        r#"{{
            "policies": [
                {{ "name": "read", "rules": "" }},
                {{ "name": "broken", "rules": "{INVALID_RULES}" }}
            ],
            "roles": [{{ "name": "reader", "policy_names": ["read", "broken"] }}]
        }}"#
    ));

    let summary = engine(&consul, BindRuleMode::Upsert)
        .apply(&app(), &desired)
        .await
        .unwrap();

    assert_eq!(
        summary.policies,
        "app_ns_read: created, app_ns_broken: error: acl error (400): Failed to parse ACL rules"
    );
    assert_eq!(summary.roles, "app_ns_reader: created");
    let role = consul.role("app_ns_reader").unwrap();
    let linked: Vec<_> = role.policies.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(linked, vec!["app_ns_read"]);
}

/// Story: Consul going away fails the whole cycle
#[tokio::test]
async fn story_unreachable_consul_fails_the_cycle() {
    let consul = Arc::new(FakeConsul::new());
    consul.set_unreachable(true);

    let err = engine(&consul, BindRuleMode::Upsert)
        .apply(&app(), &full_declaration())
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(consul.policy_count(), 0);
}

/// Story: a server error on one entity kind is reported, not fatal
#[tokio::test]
async fn story_server_error_on_roles_is_reported_in_summary() {
    let consul = Arc::new(FakeConsul::new());
    consul.fail_call("create_role");

    let summary = engine(&consul, BindRuleMode::Upsert)
        .apply(&app(), &full_declaration())
        .await
        .unwrap();

    assert_eq!(summary.policies, "app_ns_read: created");
    assert_eq!(
        summary.roles,
        "app_ns_reader: error: acl error (500): create_role failed"
    );
    assert_eq!(consul.role_count(), 0);
}
