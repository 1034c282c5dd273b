//! In-memory Consul ACL service
//!
//! Keeps policies, roles and binding rules keyed by generated IDs and logs
//! every mutating call in order, so tests can assert on both the end state
//! and the sequence of writes.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use consul_acl_operator::consul::{AclApi, AclBindingRule, AclPolicy, AclRole};
use consul_acl_operator::Error;

/// Rule bodies containing this marker are rejected like a parse failure
pub const INVALID_RULES: &str = "syntax error";

#[derive(Default)]
struct State {
    next_id: u64,
    policies: BTreeMap<String, AclPolicy>,
    roles: BTreeMap<String, AclRole>,
    binding_rules: BTreeMap<String, AclBindingRule>,
    writes: Vec<String>,
    unreachable: bool,
    failing_call: Option<&'static str>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check(&mut self, call: &'static str, subject: &str) -> Result<(), Error> {
        if self.unreachable {
            return Err(Error::transport("connection refused"));
        }
        if self.failing_call == Some(call) {
            return Err(Error::acl(500, format!("{call} failed")));
        }
        if call.starts_with("create") || call.starts_with("update") || call.starts_with("delete")
        {
            self.writes.push(format!("{call} {subject}"));
        }
        Ok(())
    }
}

/// In-memory stand-in for the Consul ACL endpoints
#[derive(Default)]
pub struct FakeConsul {
    state: Mutex<State>,
}

impl FakeConsul {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the agent were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Make one kind of call fail with a server error
    pub fn fail_call(&self, call: &'static str) {
        self.state.lock().unwrap().failing_call = Some(call);
    }

    /// Mutating calls made so far, as `"{call} {name or id}"`
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn policy(&self, name: &str) -> Option<AclPolicy> {
        let state = self.state.lock().unwrap();
        state.policies.values().find(|p| p.name == name).cloned()
    }

    pub fn role(&self, name: &str) -> Option<AclRole> {
        let state = self.state.lock().unwrap();
        state.roles.values().find(|r| r.name == name).cloned()
    }

    pub fn policy_count(&self) -> usize {
        self.state.lock().unwrap().policies.len()
    }

    pub fn role_count(&self) -> usize {
        self.state.lock().unwrap().roles.len()
    }

    pub fn binding_rules(&self) -> Vec<AclBindingRule> {
        self.state
            .lock()
            .unwrap()
            .binding_rules
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AclApi for FakeConsul {
    async fn read_policy_by_name(&self, name: &str) -> Result<Option<AclPolicy>, Error> {
        let mut state = self.state.lock().unwrap();
        state.check("read_policy", name)?;
        Ok(state.policies.values().find(|p| p.name == name).cloned())
    }

    async fn create_policy(&self, policy: &AclPolicy) -> Result<AclPolicy, Error> {
        let mut state = self.state.lock().unwrap();
        state.check("create_policy", &policy.name)?;
        if policy.rules.contains(INVALID_RULES) {
            return Err(Error::acl(400, "Failed to parse ACL rules"));
        }
        if state.policies.values().any(|p| p.name == policy.name) {
            return Err(Error::acl(500, "Invalid Policy: A Policy with Name already exists"));
        }
        let stored = AclPolicy {
            id: state.id("policy"),
            ..policy.clone()
        };
        state.policies.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_policy(&self, policy: &AclPolicy) -> Result<AclPolicy, Error> {
        let mut state = self.state.lock().unwrap();
        state.check("update_policy", &policy.name)?;
        if !state.policies.contains_key(&policy.id) {
            return Err(Error::acl(404, "ACL not found"));
        }
        state.policies.insert(policy.id.clone(), policy.clone());
        Ok(policy.clone())
    }

    async fn delete_policy(&self, id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check("delete_policy", id)?;
        state.policies.remove(id);
        Ok(())
    }

    async fn read_role_by_name(&self, name: &str) -> Result<Option<AclRole>, Error> {
        let mut state = self.state.lock().unwrap();
        state.check("read_role", name)?;
        Ok(state.roles.values().find(|r| r.name == name).cloned())
    }

    async fn create_role(&self, role: &AclRole) -> Result<AclRole, Error> {
        let mut state = self.state.lock().unwrap();
        state.check("create_role", &role.name)?;
        let stored = AclRole {
            id: state.id("role"),
            ..role.clone()
        };
        state.roles.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_role(&self, role: &AclRole) -> Result<AclRole, Error> {
        let mut state = self.state.lock().unwrap();
        state.check("update_role", &role.name)?;
        if !state.roles.contains_key(&role.id) {
            return Err(Error::acl(404, "ACL not found"));
        }
        state.roles.insert(role.id.clone(), role.clone());
        Ok(role.clone())
    }

    async fn delete_role(&self, id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check("delete_role", id)?;
        state.roles.remove(id);
        Ok(())
    }

    async fn list_binding_rules(&self, auth_method: &str) -> Result<Vec<AclBindingRule>, Error> {
        let mut state = self.state.lock().unwrap();
        state.check("list_binding_rules", auth_method)?;
        Ok(state
            .binding_rules
            .values()
            .filter(|r| r.auth_method == auth_method)
            .cloned()
            .collect())
    }

    async fn create_binding_rule(&self, rule: &AclBindingRule) -> Result<AclBindingRule, Error> {
        let mut state = self.state.lock().unwrap();
        state.check("create_binding_rule", &rule.bind_name)?;
        let stored = AclBindingRule {
            id: state.id("rule"),
            ..rule.clone()
        };
        state.binding_rules.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_binding_rule(&self, rule: &AclBindingRule) -> Result<AclBindingRule, Error> {
        let mut state = self.state.lock().unwrap();
        state.check("update_binding_rule", &rule.bind_name)?;
        if !state.binding_rules.contains_key(&rule.id) {
            return Err(Error::acl(404, "ACL not found"));
        }
        state.binding_rules.insert(rule.id.clone(), rule.clone());
        Ok(rule.clone())
    }

    async fn delete_binding_rule(&self, id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check("delete_binding_rule", id)?;
        state.binding_rules.remove(id);
        Ok(())
    }
}
