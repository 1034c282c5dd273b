//! HTTP implementation of [`AclApi`] against the Consul ACL endpoints

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::types::{AclBindingRule, AclPolicy, AclRole};
use super::AclApi;
use crate::config::ConsulConfig;
use crate::Error;

/// Header carrying the ACL token on every request
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Body fragment Consul returns instead of a 404 for some ACL lookups
const ACL_NOT_FOUND: &str = "ACL not found";

/// Consul ACL client over HTTP
pub struct ConsulAclClient {
    http: Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl ConsulAclClient {
    /// Build a client from the operator's Consul settings
    ///
    /// Adds the configured CA certificate as a trust root when one is set.
    pub fn new(config: &ConsulConfig) -> Result<Self, Error> {
        let mut builder = Client::builder();

        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                Error::config(format!("failed to read CA certificate {}: {e}", path.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| Error::config(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: parse_base_url(&config.base_url())?,
            token: config.token.clone(),
        })
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str, token: Option<&str>) -> Self {
        Self {
            http: Client::new(),
            base_url: parse_base_url(base_url).expect("valid test url"),
            token: token.map(SecretString::from),
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // base_url is validated as a base in parse_base_url
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let req = self.http.request(method, self.url(segments));
        match &self.token {
            Some(token) => req.header(TOKEN_HEADER, token.expose_secret()),
            None => req,
        }
    }

    async fn read_by_name<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Option<T>, Error> {
        let resp = self.request(Method::GET, segments).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = resp.text().await?;
        if !status.is_success() {
            if body.contains(ACL_NOT_FOUND) {
                return Ok(None);
            }
            return Err(Error::acl(status.as_u16(), body));
        }

        // Consul answers some misses with `200 null`
        serde_json::from_str::<Option<T>>(&body)
            .map_err(|e| Error::serialization(format!("invalid ACL response: {e}")))
    }

    async fn write<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, Error> {
        let resp = self.request(Method::PUT, segments).json(body).send().await?;
        let resp = ensure_success(resp).await?;
        resp.json::<T>()
            .await
            .map_err(|e| Error::serialization(format!("invalid ACL response: {e}")))
    }

    async fn delete(&self, segments: &[&str]) -> Result<(), Error> {
        let resp = self.request(Method::DELETE, segments).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, Error> {
    let url = Url::parse(base_url)
        .map_err(|e| Error::config(format!("invalid Consul address {base_url}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(Error::config(format!(
            "invalid Consul address {base_url}: not a base URL"
        )));
    }
    Ok(url)
}

async fn ensure_success(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::acl(status.as_u16(), body))
}

#[async_trait]
impl AclApi for ConsulAclClient {
    async fn read_policy_by_name(&self, name: &str) -> Result<Option<AclPolicy>, Error> {
        debug!(policy = %name, "reading policy");
        self.read_by_name(&["v1", "acl", "policy", "name", name]).await
    }

    async fn create_policy(&self, policy: &AclPolicy) -> Result<AclPolicy, Error> {
        self.write(&["v1", "acl", "policy"], policy).await
    }

    async fn update_policy(&self, policy: &AclPolicy) -> Result<AclPolicy, Error> {
        self.write(&["v1", "acl", "policy", &policy.id], policy).await
    }

    async fn delete_policy(&self, id: &str) -> Result<(), Error> {
        self.delete(&["v1", "acl", "policy", id]).await
    }

    async fn read_role_by_name(&self, name: &str) -> Result<Option<AclRole>, Error> {
        debug!(role = %name, "reading role");
        self.read_by_name(&["v1", "acl", "role", "name", name]).await
    }

    async fn create_role(&self, role: &AclRole) -> Result<AclRole, Error> {
        self.write(&["v1", "acl", "role"], role).await
    }

    async fn update_role(&self, role: &AclRole) -> Result<AclRole, Error> {
        self.write(&["v1", "acl", "role", &role.id], role).await
    }

    async fn delete_role(&self, id: &str) -> Result<(), Error> {
        self.delete(&["v1", "acl", "role", id]).await
    }

    async fn list_binding_rules(&self, auth_method: &str) -> Result<Vec<AclBindingRule>, Error> {
        let resp = self
            .request(Method::GET, &["v1", "acl", "binding-rules"])
            .query(&[("authmethod", auth_method)])
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let rules = resp
            .json::<Option<Vec<AclBindingRule>>>()
            .await
            .map_err(|e| Error::serialization(format!("invalid ACL response: {e}")))?;
        Ok(rules.unwrap_or_default())
    }

    async fn create_binding_rule(&self, rule: &AclBindingRule) -> Result<AclBindingRule, Error> {
        self.write(&["v1", "acl", "binding-rule"], rule).await
    }

    async fn update_binding_rule(&self, rule: &AclBindingRule) -> Result<AclBindingRule, Error> {
        self.write(&["v1", "acl", "binding-rule", &rule.id], rule).await
    }

    async fn delete_binding_rule(&self, id: &str) -> Result<(), Error> {
        self.delete(&["v1", "acl", "binding-rule", id]).await
    }
}
