use std::collections::HashMap;
use std::process::Command as StdCommand;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use provar_domain::{
    Facts, ObservedResource, ResourceGroup, ResourceKind, ResourceName, ResourceSpec, Sku,
    TagFilter,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::provider::{EnsureOutcome, EnsureResult, Provider};
use crate::retry::{self, RetryPolicy};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Static configuration for the ARM provider, injected at startup.
/// Not stored in scenario YAML beyond the `arm:` section — operator-level.
#[derive(Clone)]
pub struct ArmProviderConfig {
    /// Subscription every resource group in scope lives under.
    pub subscription_id: String,
    /// Tenant ID (GUID).
    pub tenant_id: String,
    /// Service principal client ID (optional; falls back to env/IMDS/CLI).
    pub client_id: Option<String>,
    /// Service principal client secret (optional; falls back to env/IMDS/CLI).
    pub client_secret: Option<String>,
}

// ── Base URLs (overridden in tests) ───────────────────────────────────────────

#[derive(Clone)]
pub(crate) struct BaseUrls {
    management: String,
    login: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            management: "https://management.azure.com".into(),
            login: "https://login.microsoftonline.com".into(),
        }
    }
}

// ── Token provider ────────────────────────────────────────────────────────────

/// Abstraction over bearer-token acquisition — enables test injection.
#[async_trait]
trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, ProviderError>;
}

// ── Service Principal ─────────────────────────────────────────────────────────

struct ServicePrincipalTokenProvider {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    login_base: String,
    client: reqwest::Client,
    cache: Mutex<Option<(String, Instant)>>,
}

#[async_trait]
impl TokenProvider for ServicePrincipalTokenProvider {
    async fn token(&self) -> Result<String, ProviderError> {
        {
            let guard = self.cache.lock().await;
            if let Some((tok, expiry)) = guard.as_ref() {
                if Instant::now() < *expiry {
                    return Ok(tok.clone());
                }
            }
        }

        let url = format!("{}/{}/oauth2/v2.0/token", self.login_base, self.tenant_id);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("scope", "https://management.azure.com/.default"),
        ];
        let resp: Value = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("SP token request: {}", e)))?
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(format!("SP token decode: {}", e)))?;

        let tok = resp["access_token"]
            .as_str()
            .ok_or_else(|| {
                ProviderError::Fatal(format!("SP token: no access_token in response: {}", resp))
            })?
            .to_string();
        let expires_in = resp["expires_in"].as_u64().unwrap_or(3600);
        let expiry = Instant::now() + Duration::from_secs(expires_in.saturating_sub(60));

        *self.cache.lock().await = Some((tok.clone(), expiry));
        Ok(tok)
    }
}

// ── Managed Identity (IMDS) ───────────────────────────────────────────────────

struct ManagedIdentityTokenProvider {
    client: reqwest::Client,
    cache: Mutex<Option<(String, Instant)>>,
}

#[async_trait]
impl TokenProvider for ManagedIdentityTokenProvider {
    async fn token(&self) -> Result<String, ProviderError> {
        {
            let guard = self.cache.lock().await;
            if let Some((tok, expiry)) = guard.as_ref() {
                if Instant::now() < *expiry {
                    return Ok(tok.clone());
                }
            }
        }

        let resp: Value = self
            .client
            .get("http://169.254.169.254/metadata/identity/oauth2/token")
            .header("Metadata", "true")
            .query(&[
                ("api-version", "2018-02-01"),
                ("resource", "https://management.azure.com/"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("IMDS token request: {}", e)))?
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(format!("IMDS token decode: {}", e)))?;

        let tok = resp["access_token"]
            .as_str()
            .ok_or_else(|| ProviderError::Fatal(format!("IMDS token: no access_token: {}", resp)))?
            .to_string();
        let expires_in = resp["expires_in"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(3600);
        let expiry = Instant::now() + Duration::from_secs(expires_in.saturating_sub(60));

        *self.cache.lock().await = Some((tok.clone(), expiry));
        Ok(tok)
    }
}

// ── Azure CLI ─────────────────────────────────────────────────────────────────

struct CliTokenProvider {
    tenant_id: String,
}

#[async_trait]
impl TokenProvider for CliTokenProvider {
    async fn token(&self) -> Result<String, ProviderError> {
        let output = StdCommand::new("az")
            .args([
                "account",
                "get-access-token",
                "--resource",
                "https://management.azure.com",
                "--tenant",
                &self.tenant_id,
                "--output",
                "json",
            ])
            .output()
            .map_err(|e| {
                ProviderError::Fatal(format!(
                    "az CLI not found: {}. Install Azure CLI or configure service principal credentials.",
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Fatal(format!(
                "az account get-access-token failed: {}. Run 'az login' first.",
                stderr.trim()
            )));
        }

        let resp: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProviderError::Fatal(format!("az CLI output parse: {}", e)))?;
        let tok = resp["accessToken"]
            .as_str()
            .ok_or_else(|| ProviderError::Fatal("az CLI: no accessToken in output".into()))?
            .to_string();
        Ok(tok)
    }
}

// ── Static (tests) ────────────────────────────────────────────────────────────

pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, ProviderError> {
        Ok(self.0.clone())
    }
}

// ── ArmProvider ───────────────────────────────────────────────────────────────

pub struct ArmProvider {
    config: ArmProviderConfig,
    client: reqwest::Client,
    token: Box<dyn TokenProvider>,
    base: BaseUrls,
    retry: RetryPolicy,
}

impl ArmProvider {
    /// Create an `ArmProvider`, auto-selecting the token provider:
    /// 1. `client_id` + `client_secret` in config → Service Principal
    /// 2. `AZURE_CLIENT_ID` + `AZURE_CLIENT_SECRET` env vars → Service Principal
    /// 3. `IDENTITY_ENDPOINT` env var → Managed Identity (IMDS)
    /// 4. Otherwise → Azure CLI (`az account get-access-token`)
    pub fn new(config: ArmProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::new();
        let base = BaseUrls::default();

        let token: Box<dyn TokenProvider> = if let (Some(cid), Some(cs)) =
            (config.client_id.as_deref(), config.client_secret.as_deref())
        {
            Box::new(ServicePrincipalTokenProvider {
                tenant_id: config.tenant_id.clone(),
                client_id: cid.to_string(),
                client_secret: cs.to_string(),
                login_base: base.login.clone(),
                client: client.clone(),
                cache: Mutex::new(None),
            })
        } else if let (Ok(cid), Ok(cs)) = (
            std::env::var("AZURE_CLIENT_ID"),
            std::env::var("AZURE_CLIENT_SECRET"),
        ) {
            Box::new(ServicePrincipalTokenProvider {
                tenant_id: config.tenant_id.clone(),
                client_id: cid,
                client_secret: cs,
                login_base: base.login.clone(),
                client: client.clone(),
                cache: Mutex::new(None),
            })
        } else if std::env::var("IDENTITY_ENDPOINT").is_ok() {
            Box::new(ManagedIdentityTokenProvider {
                client: client.clone(),
                cache: Mutex::new(None),
            })
        } else {
            Box::new(CliTokenProvider {
                tenant_id: config.tenant_id.clone(),
            })
        };

        Ok(Self {
            config,
            client,
            token,
            base,
            retry: RetryPolicy::default(),
        })
    }

    /// Create an `ArmProvider` with a static bearer token and custom base
    /// URLs. Used exclusively in tests.
    #[cfg(test)]
    pub(crate) fn with_static_token(config: ArmProviderConfig, token: &str, base: BaseUrls) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            token: Box::new(StaticToken(token.to_string())),
            base,
            retry: RetryPolicy::immediate(),
        }
    }

    async fn bearer(&self) -> Result<String, ProviderError> {
        self.token.token().await
    }

    // ── URLs ──────────────────────────────────────────────────────────────────

    fn type_path(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::DatabaseServer => "Microsoft.DBforMySQL/servers",
            ResourceKind::PublicAddress => "Microsoft.Network/publicIPAddresses",
            ResourceKind::LoadBalancer => "Microsoft.Network/loadBalancers",
        }
    }

    fn api_version(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::DatabaseServer => "2017-12-01",
            ResourceKind::PublicAddress | ResourceKind::LoadBalancer => "2023-11-01",
        }
    }

    /// Resource id path, without base URL or query string.
    fn resource_path(&self, group: &ResourceGroup, kind: ResourceKind, name: &ResourceName) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.config.subscription_id,
            group,
            Self::type_path(kind),
            name,
        )
    }

    fn resource_url(&self, group: &ResourceGroup, kind: ResourceKind, name: &ResourceName) -> String {
        format!(
            "{}{}?api-version={}",
            self.base.management,
            self.resource_path(group, kind, name),
            Self::api_version(kind),
        )
    }

    fn collection_url(&self, group: &ResourceGroup, kind: ResourceKind) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}?api-version={}",
            self.base.management,
            self.config.subscription_id,
            group,
            Self::type_path(kind),
            Self::api_version(kind),
        )
    }

    // ── ARM error parsing ─────────────────────────────────────────────────────

    fn parse_arm_error(body: &Value) -> String {
        let err = body
            .get("error")
            .or_else(|| body.get("Error"))
            .unwrap_or(body);
        let code = err["code"].as_str().unwrap_or("Unknown");
        let message = err["message"].as_str().unwrap_or("unknown error");
        format!("{}: {}", code, message)
    }

    fn classify(status: u16, resource: &str, body: &Value) -> ProviderError {
        ProviderError::from_status(status, resource, Self::parse_arm_error(body))
    }

    // ── ARM async polling ─────────────────────────────────────────────────────

    /// Poll an ARM async operation URL until it completes or times out.
    ///
    /// ARM 202 responses carry `Azure-AsyncOperation` or `Location` header.
    /// This method accepts either and polls until `status == "Succeeded"`.
    /// Backoff: `[1, 2, 4, 8, 16, 30]` cycling, max 120 polls.
    async fn wait_for_operation(&self, op_url: &str) -> Result<Value, ProviderError> {
        let delays = [1u64, 2, 4, 8, 16, 30];
        let max_polls = 120;

        for (i, &delay) in delays.iter().cycle().take(max_polls).enumerate() {
            let (_, body) = self.arm_get(op_url).await?;

            let status = body["status"].as_str().unwrap_or("Unknown");
            match status {
                "Succeeded" => return Ok(body),
                "Failed" | "Canceled" => {
                    let msg = Self::parse_arm_error(&body);
                    return Err(ProviderError::Fatal(format!(
                        "ARM operation failed ({}): {}",
                        status, msg
                    )));
                }
                _ => {}
            }

            let poll = i + 1;
            if poll % 10 == 0 {
                info!(poll, op_url, "still waiting for ARM operation");
            } else {
                debug!(poll, op_url, delay, "ARM operation pending, waiting");
            }
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        Err(ProviderError::Transient(format!(
            "ARM operation timed out after {} polls: {}",
            max_polls, op_url
        )))
    }

    // ── ARM HTTP verbs ────────────────────────────────────────────────────────

    async fn arm_get(&self, url: &str) -> Result<(u16, Value), ProviderError> {
        retry::with_retry(&self.retry, url, || async move {
            let token = self.bearer().await?;
            debug!(url, "ARM GET");
            let resp = self
                .client
                .get(url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| ProviderError::Transient(format!("GET {}: {}", url, e)))?;

            let status = resp.status().as_u16();
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            if status == 408 || status == 429 || status >= 500 {
                return Err(Self::classify(status, url, &body));
            }
            Ok((status, body))
        })
        .await
    }

    async fn arm_put(
        &self,
        url: &str,
        payload: &Value,
    ) -> Result<(u16, Value, Option<String>), ProviderError> {
        retry::with_retry(&self.retry, url, || async move {
            let token = self.bearer().await?;
            debug!(url, "ARM PUT");
            let resp = self
                .client
                .put(url)
                .bearer_auth(&token)
                .json(payload)
                .send()
                .await
                .map_err(|e| ProviderError::Transient(format!("PUT {}: {}", url, e)))?;

            let status = resp.status().as_u16();
            let async_op = resp
                .headers()
                .get("Azure-AsyncOperation")
                .or_else(|| resp.headers().get("Location"))
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            if status == 408 || status == 429 || status >= 500 {
                return Err(Self::classify(status, url, &body));
            }
            Ok((status, body, async_op))
        })
        .await
    }

    async fn arm_delete(&self, url: &str, resource: &str) -> Result<(), ProviderError> {
        let (status, body, async_op) = retry::with_retry(&self.retry, url, || async move {
            let token = self.bearer().await?;
            debug!(url, "ARM DELETE");
            let resp = self
                .client
                .delete(url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| ProviderError::Transient(format!("DELETE {}: {}", url, e)))?;

            let status = resp.status().as_u16();
            let async_op = resp
                .headers()
                .get("Azure-AsyncOperation")
                .or_else(|| resp.headers().get("Location"))
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            if status == 408 || status == 429 || status >= 500 {
                return Err(Self::classify(status, url, &body));
            }
            Ok((status, body, async_op))
        })
        .await?;

        // 202 = async delete; wait for it to finish
        if status == 202 {
            if let Some(op_url) = async_op {
                self.wait_for_operation(&op_url).await?;
            }
            return Ok(());
        }
        // 404 = already absent, a completed no-op
        if status == 404 || status == 204 || (200..300).contains(&status) {
            return Ok(());
        }

        Err(Self::classify(status, resource, &body))
    }

    /// Wait for an async PUT to complete if it returned 202.
    async fn arm_put_and_wait(
        &self,
        url: &str,
        payload: &Value,
        resource: &str,
    ) -> Result<(), ProviderError> {
        let (status, body, async_op) = self.arm_put(url, payload).await?;

        // 200/201 means synchronously complete
        if status == 200 || status == 201 {
            if body.get("error").is_some() {
                return Err(ProviderError::Fatal(format!(
                    "PUT {}: {}",
                    resource,
                    Self::parse_arm_error(&body)
                )));
            }
            return Ok(());
        }

        // 202 — poll the async operation URL
        if status == 202 {
            if let Some(op_url) = async_op {
                self.wait_for_operation(&op_url).await?;
            }
            return Ok(());
        }

        Err(Self::classify(status, resource, &body))
    }

    // ── Desired-state payloads ────────────────────────────────────────────────

    fn desired_body(&self, group: &ResourceGroup, name: &ResourceName, spec: &ResourceSpec) -> Value {
        match spec {
            ResourceSpec::DatabaseServer(s) => {
                let mut sku = json!({ "name": s.sku.name, "tier": s.sku.tier });
                if let Some(family) = &s.sku.family {
                    sku["family"] = json!(family);
                }
                if let Some(capacity) = s.sku.capacity {
                    sku["capacity"] = json!(capacity);
                }
                json!({
                    "location": s.location,
                    "sku": sku,
                    "properties": {
                        "createMode": "Default",
                        "version": s.version,
                        "administratorLogin": s.admin_username,
                        "administratorLoginPassword": s.admin_password,
                        "storageProfile": { "storageMB": s.storage_mb },
                        "sslEnforcement": "Enabled",
                    },
                    "tags": s.tags,
                })
            }
            ResourceSpec::PublicAddress(s) => {
                let mut properties = json!({
                    "publicIPAllocationMethod": s.allocation_method.to_string(),
                });
                if let Some(label) = &s.domain_name_label {
                    properties["dnsSettings"] = json!({
                        "domainNameLabel": sanitize_resource_name(label),
                    });
                }
                json!({
                    "location": s.location,
                    "sku": { "name": "Basic" },
                    "properties": properties,
                    "tags": s.tags,
                })
            }
            ResourceSpec::LoadBalancer(s) => {
                let lb_id = self.resource_path(group, ResourceKind::LoadBalancer, name);
                let pip_id = self.resource_path(
                    group,
                    ResourceKind::PublicAddress,
                    &s.frontend_public_address,
                );
                json!({
                    "location": s.location,
                    "sku": { "name": s.sku },
                    "properties": {
                        "frontendIPConfigurations": [{
                            "name": "frontend",
                            "properties": { "publicIPAddress": { "id": pip_id } },
                        }],
                        "backendAddressPools": [{ "name": "backend" }],
                        "probes": [{
                            "name": "probe",
                            "properties": {
                                "protocol": s.probe_protocol.to_string(),
                                "port": s.probe_port,
                                "intervalInSeconds": 15,
                                "numberOfProbes": 3,
                            },
                        }],
                        "loadBalancingRules": [{
                            "name": "rule",
                            "properties": {
                                "frontendIPConfiguration": {
                                    "id": format!("{}/frontendIPConfigurations/frontend", lb_id),
                                },
                                "backendAddressPool": {
                                    "id": format!("{}/backendAddressPools/backend", lb_id),
                                },
                                "probe": { "id": format!("{}/probes/probe", lb_id) },
                                "protocol": "Tcp",
                                "frontendPort": s.frontend_port,
                                "backendPort": s.backend_port,
                            },
                        }],
                    },
                    "tags": s.tags,
                })
            }
        }
    }

    // ── Observed-state parsing ────────────────────────────────────────────────

    fn parse_tags(body: &Value) -> HashMap<String, String> {
        body["tags"]
            .as_object()
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse_sku(body: &Value) -> Option<Sku> {
        let sku = body.get("sku")?;
        Some(Sku {
            name: sku["name"].as_str()?.to_string(),
            tier: sku["tier"]
                .as_str()
                .or_else(|| sku["name"].as_str())
                .unwrap_or_default()
                .to_string(),
            family: sku["family"].as_str().map(String::from),
            capacity: sku["capacity"].as_u64().map(|c| c as u32),
        })
    }

    fn parse_observed(kind: ResourceKind, body: &Value) -> ObservedResource {
        let props = &body["properties"];
        let (provisioning_state, version, endpoint) = match kind {
            ResourceKind::DatabaseServer => (
                props["userVisibleState"].as_str().unwrap_or_default(),
                props["version"].as_str().map(String::from),
                props["fullyQualifiedDomainName"].as_str().map(String::from),
            ),
            ResourceKind::PublicAddress => (
                props["provisioningState"].as_str().unwrap_or_default(),
                None,
                props["ipAddress"]
                    .as_str()
                    .or_else(|| props["dnsSettings"]["fqdn"].as_str())
                    .map(String::from),
            ),
            ResourceKind::LoadBalancer => (
                props["provisioningState"].as_str().unwrap_or_default(),
                None,
                props["frontendIPConfigurations"]
                    .as_array()
                    .and_then(|cfgs| cfgs.first())
                    .and_then(|cfg| cfg["id"].as_str())
                    .map(String::from),
            ),
        };

        ObservedResource {
            id: body["id"].as_str().unwrap_or_default().to_string(),
            name: body["name"].as_str().unwrap_or_default().to_string(),
            kind,
            location: body["location"].as_str().unwrap_or_default().to_string(),
            provisioning_state: provisioning_state.to_string(),
            sku: Self::parse_sku(body),
            version,
            endpoint,
            tags: Self::parse_tags(body),
            raw: body.clone(),
        }
    }

    /// Whether the observed record already satisfies the desired spec, i.e.
    /// a PUT would be a no-op worth skipping.
    fn spec_matches(spec: &ResourceSpec, observed: &ObservedResource) -> bool {
        if !observed
            .location
            .eq_ignore_ascii_case(spec.location())
        {
            return false;
        }
        match spec {
            ResourceSpec::DatabaseServer(s) => {
                observed
                    .sku
                    .as_ref()
                    .map_or(false, |sku| sku.name == s.sku.name && sku.tier == s.sku.tier)
                    && observed.version.as_deref() == Some(s.version.as_str())
            }
            ResourceSpec::PublicAddress(s) => observed.raw["properties"]
                ["publicIPAllocationMethod"]
                .as_str()
                .map_or(false, |m| {
                    m.eq_ignore_ascii_case(&s.allocation_method.to_string())
                }),
            ResourceSpec::LoadBalancer(s) => observed
                .sku
                .as_ref()
                .map_or(false, |sku| sku.name == s.sku),
        }
    }
}

// ── Resource name sanitization ────────────────────────────────────────────────

/// Sanitize a raw string into a valid ARM resource / DNS label name.
///
/// Rules: 1–63 chars, lowercase letters/digits/hyphens, starts and ends
/// alphanumeric.
pub(crate) fn sanitize_resource_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(63));
    for c in raw.chars() {
        if out.len() == 63 {
            break;
        }
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    // Trim trailing non-alphanumeric
    while out.ends_with(|c: char| !c.is_ascii_alphanumeric()) {
        out.pop();
    }
    out
}

// ── Provider impl ─────────────────────────────────────────────────────────────

#[async_trait]
impl Provider for ArmProvider {
    fn name(&self) -> &'static str {
        "arm"
    }

    // ── ensure_present ────────────────────────────────────────────────────────

    async fn ensure_present(
        &self,
        group: &ResourceGroup,
        name: &ResourceName,
        spec: &ResourceSpec,
    ) -> Result<EnsureResult, ProviderError> {
        spec.validate()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        let kind = spec.kind();
        let url = self.resource_url(group, kind, name);

        // Idempotency: skip the PUT when the resource already matches.
        let (status, body) = self.arm_get(&url).await?;
        let existed = status == 200;
        if existed {
            let observed = Self::parse_observed(kind, &body);
            if Self::spec_matches(spec, &observed) {
                info!(%group, %name, %kind, "resource already in desired state, skipping");
                return Ok(EnsureResult {
                    outcome: EnsureOutcome::Unchanged,
                    observed,
                });
            }
        } else if status != 404 {
            return Err(Self::classify(status, name.as_str(), &body));
        }

        info!(%group, %name, %kind, existed, "ensuring resource");
        let payload = self.desired_body(group, name, spec);
        self.arm_put_and_wait(&url, &payload, name.as_str()).await?;

        // Read back the converged state
        let (status, body) = self.arm_get(&url).await?;
        if status != 200 {
            return Err(ProviderError::Fatal(format!(
                "{}: PUT succeeded but readback returned status {}: {}",
                name,
                status,
                Self::parse_arm_error(&body)
            )));
        }

        Ok(EnsureResult {
            outcome: if existed {
                EnsureOutcome::Updated
            } else {
                EnsureOutcome::Created
            },
            observed: Self::parse_observed(kind, &body),
        })
    }

    // ── ensure_absent ─────────────────────────────────────────────────────────

    async fn ensure_absent(
        &self,
        group: &ResourceGroup,
        kind: ResourceKind,
        name: &ResourceName,
    ) -> Result<(), ProviderError> {
        let url = self.resource_url(group, kind, name);
        info!(%group, %name, %kind, "ensuring resource absent");
        self.arm_delete(&url, name.as_str()).await
    }

    // ── describe ──────────────────────────────────────────────────────────────

    async fn describe(
        &self,
        group: &ResourceGroup,
        kind: ResourceKind,
        name: Option<&ResourceName>,
        filter: &TagFilter,
    ) -> Result<Facts, ProviderError> {
        let facts = match name {
            Some(name) => {
                let url = self.resource_url(group, kind, name);
                let (status, body) = self.arm_get(&url).await?;
                match status {
                    // Legitimately absent: empty facts, not an error.
                    404 => Facts::empty(),
                    200 => Facts::single(Self::parse_observed(kind, &body)),
                    s => return Err(Self::classify(s, name.as_str(), &body)),
                }
            }
            None => {
                let url = self.collection_url(group, kind);
                let (status, body) = self.arm_get(&url).await?;
                if status != 200 {
                    return Err(Self::classify(status, group.as_str(), &body));
                }
                let records = body["value"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|item| Self::parse_observed(kind, item))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                Facts::from_records(records)
            }
        };
        Ok(facts.filtered(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provar_domain::{AllocationMethod, DatabaseServerSpec, PublicAddressSpec};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> ArmProviderConfig {
        ArmProviderConfig {
            subscription_id: "test-sub".into(),
            tenant_id: "test-tenant-id".into(),
            client_id: None,
            client_secret: None,
        }
    }

    fn test_base(url: &str) -> BaseUrls {
        BaseUrls {
            management: url.to_string(),
            login: url.to_string(),
        }
    }

    fn provider(server: &MockServer) -> ArmProvider {
        ArmProvider::with_static_token(test_config(), "fake-token", test_base(&server.uri()))
    }

    fn group() -> ResourceGroup {
        ResourceGroup::new("provar-ci")
    }

    fn db_spec() -> ResourceSpec {
        ResourceSpec::DatabaseServer(DatabaseServerSpec {
            sku: Sku {
                name: "GP_Gen4_2".into(),
                tier: "GeneralPurpose".into(),
                family: Some("Gen4".into()),
                capacity: Some(2),
            },
            version: "5.7".into(),
            storage_mb: 51200,
            admin_username: "zimxyz".into(),
            admin_password: "Testpasswordxyz12!".into(),
            location: "eastus2".into(),
            tags: HashMap::new(),
        })
    }

    fn pip_spec() -> ResourceSpec {
        ResourceSpec::PublicAddress(PublicAddressSpec {
            allocation_method: AllocationMethod::Static,
            domain_name_label: None,
            location: "eastus2".into(),
            tags: HashMap::new(),
        })
    }

    fn db_body(name: &str) -> Value {
        json!({
            "id": format!("/subscriptions/test-sub/resourceGroups/provar-ci/providers/Microsoft.DBforMySQL/servers/{}", name),
            "name": name,
            "location": "eastus2",
            "sku": { "name": "GP_Gen4_2", "tier": "GeneralPurpose", "family": "Gen4", "capacity": 2 },
            "properties": {
                "userVisibleState": "Ready",
                "version": "5.7",
                "fullyQualifiedDomainName": format!("{}.mysql.database.azure.com", name),
            },
            "tags": {},
        })
    }

    fn db_path(name: &str) -> String {
        format!(
            "/subscriptions/test-sub/resourceGroups/provar-ci/providers/Microsoft.DBforMySQL/servers/{}",
            name
        )
    }

    // ── sanitize_resource_name (pure) ─────────────────────────────────────────

    #[test]
    fn sanitize_passthrough() {
        assert_eq!(sanitize_resource_name("mysqlsrv1a2b3c4d7"), "mysqlsrv1a2b3c4d7");
    }

    #[test]
    fn sanitize_lowercases_and_replaces() {
        assert_eq!(sanitize_resource_name("My Test/Label"), "my-test-label");
    }

    #[test]
    fn sanitize_truncates_at_63() {
        let long = "a".repeat(80);
        assert!(sanitize_resource_name(&long).len() <= 63);
    }

    // ── parse_arm_error (pure) ────────────────────────────────────────────────

    #[test]
    fn parse_arm_error_standard() {
        let body = json!({
            "error": { "code": "ResourceNotFound", "message": "The resource was not found" }
        });
        let msg = ArmProvider::parse_arm_error(&body);
        assert!(msg.contains("ResourceNotFound"), "got: {}", msg);
        assert!(msg.contains("not found"), "got: {}", msg);
    }

    #[test]
    fn parse_arm_error_missing_fields_gives_fallback() {
        let body = json!({ "error": {} });
        assert_eq!(ArmProvider::parse_arm_error(&body), "Unknown: unknown error");
    }

    // ── parse_observed (pure) ─────────────────────────────────────────────────

    #[test]
    fn parse_observed_database_server() {
        let rec = ArmProvider::parse_observed(ResourceKind::DatabaseServer, &db_body("db1"));
        assert_eq!(rec.name, "db1");
        assert_eq!(rec.provisioning_state, "Ready");
        assert_eq!(rec.version.as_deref(), Some("5.7"));
        assert_eq!(rec.endpoint.as_deref(), Some("db1.mysql.database.azure.com"));
        assert!(rec.missing_fields().is_empty(), "missing: {:?}", rec.missing_fields());
    }

    // ── ensure_present ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn ensure_present_creates_when_absent() {
        let server = MockServer::start().await;

        // First GET: not found
        Mock::given(method("GET"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "ResourceNotFound", "message": "not found" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(db_body("db1")))
            .mount(&server)
            .await;
        // Readback GET: created
        Mock::given(method("GET"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(db_body("db1")))
            .mount(&server)
            .await;

        let p = provider(&server);
        let result = p
            .ensure_present(&group(), &ResourceName::new("db1"), &db_spec())
            .await
            .unwrap();
        assert_eq!(result.outcome, EnsureOutcome::Created);
        assert_eq!(result.observed.sku.as_ref().map(|s| s.tier.as_str()), Some("GeneralPurpose"));
    }

    #[tokio::test]
    async fn ensure_present_skips_put_when_already_converged() {
        let server = MockServer::start().await;
        // Only a GET is mounted; an attempted PUT would hit no mock and fail.
        Mock::given(method("GET"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(db_body("db1")))
            .mount(&server)
            .await;

        let p = provider(&server);
        let result = p
            .ensure_present(&group(), &ResourceName::new("db1"), &db_spec())
            .await
            .unwrap();
        assert_eq!(result.outcome, EnsureOutcome::Unchanged);
    }

    #[tokio::test]
    async fn ensure_present_conflict_surfaces_as_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": { "code": "ServerNameTaken", "message": "name already in use" }
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let err = p
            .ensure_present(&group(), &ResourceName::new("db1"), &db_spec())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Conflict { .. }), "got: {}", err);
    }

    #[tokio::test]
    async fn ensure_present_rejects_invalid_spec_before_any_call() {
        let server = MockServer::start().await;
        let p = provider(&server);

        let mut spec = db_spec();
        if let ResourceSpec::DatabaseServer(ref mut s) = spec {
            s.admin_username.clear();
        }
        let err = p
            .ensure_present(&group(), &ResourceName::new("db1"), &spec)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)), "got: {}", err);

        let received = MockServer::received_requests(&server).await;
        assert!(
            received.is_none() || received.unwrap().is_empty(),
            "expected no API calls for invalid spec"
        );
    }

    // ── describe ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn describe_absent_resource_yields_empty_facts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(db_path("ghost")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "ResourceNotFound", "message": "not found" }
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let facts = p
            .describe(
                &group(),
                ResourceKind::DatabaseServer,
                Some(&ResourceName::new("ghost")),
                &TagFilter::empty(),
            )
            .await
            .unwrap();
        assert!(facts.is_empty());
        assert!(!facts.changed);
    }

    #[tokio::test]
    async fn describe_group_lists_all_of_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/subscriptions/test-sub/resourceGroups/provar-ci/providers/Microsoft.DBforMySQL/servers",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [db_body("db1"), db_body("db2")]
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let facts = p
            .describe(&group(), ResourceKind::DatabaseServer, None, &TagFilter::empty())
            .await
            .unwrap();
        assert_eq!(facts.resources.len(), 2);
        assert!(facts.contains(&ResourceName::new("db1")));
        assert!(facts.contains(&ResourceName::new("db2")));
        assert!(!facts.changed);
    }

    #[tokio::test]
    async fn describe_auth_failure_is_an_error_not_absence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": "AuthorizationFailed", "message": "no" }
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let err = p
            .describe(
                &group(),
                ResourceKind::DatabaseServer,
                Some(&ResourceName::new("db1")),
                &TagFilter::empty(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Fatal(_)), "got: {}", err);
    }

    #[tokio::test]
    async fn throttled_get_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": "TooManyRequests", "message": "slow down" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(db_body("db1")))
            .mount(&server)
            .await;

        let p = provider(&server);
        let facts = p
            .describe(
                &group(),
                ResourceKind::DatabaseServer,
                Some(&ResourceName::new("db1")),
                &TagFilter::empty(),
            )
            .await
            .unwrap();
        assert!(facts.contains(&ResourceName::new("db1")));
    }

    // ── ensure_absent ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn ensure_absent_on_missing_resource_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(db_path("gone")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "ResourceNotFound", "message": "not found" }
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        p.ensure_absent(&group(), ResourceKind::DatabaseServer, &ResourceName::new("gone"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ensure_absent_deletes() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(db_path("db1")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let p = provider(&server);
        p.ensure_absent(&group(), ResourceKind::DatabaseServer, &ResourceName::new("db1"))
            .await
            .unwrap();
    }

    // ── wait_for_operation ────────────────────────────────────────────────────

    #[tokio::test]
    async fn wait_for_operation_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/test-op"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Succeeded"
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let url = format!("{}/operations/test-op", server.uri());
        let res = p.wait_for_operation(&url).await.unwrap();
        assert_eq!(res["status"].as_str(), Some("Succeeded"));
    }

    #[tokio::test]
    async fn wait_for_operation_fails_on_failed_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/operations/op-fail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Failed",
                "error": { "code": "InternalError", "message": "Something went wrong" }
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let url = format!("{}/operations/op-fail", server.uri());
        let err = p.wait_for_operation(&url).await.unwrap_err();
        assert!(err.to_string().contains("Failed"), "got: {}", err);
    }

    // ── desired_body ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn load_balancer_body_references_frontend_address() {
        let server = MockServer::start().await;
        let p = provider(&server);
        let spec = ResourceSpec::LoadBalancer(provar_domain::LoadBalancerSpec {
            frontend_public_address: ResourceName::new("pip1"),
            sku: "Basic".into(),
            probe_port: 8080,
            probe_protocol: provar_domain::ProbeProtocol::Tcp,
            frontend_port: 80,
            backend_port: 8080,
            location: "eastus2".into(),
            tags: HashMap::new(),
        });
        let body = p.desired_body(&group(), &ResourceName::new("lb1"), &spec);
        let pip_id = body["properties"]["frontendIPConfigurations"][0]["properties"]
            ["publicIPAddress"]["id"]
            .as_str()
            .unwrap();
        assert!(pip_id.ends_with("Microsoft.Network/publicIPAddresses/pip1"));
    }

    #[tokio::test]
    async fn public_address_label_is_sanitized() {
        let server = MockServer::start().await;
        let p = provider(&server);
        let mut spec = pip_spec();
        if let ResourceSpec::PublicAddress(ref mut s) = spec {
            s.domain_name_label = Some("My Label".into());
        }
        let body = p.desired_body(&group(), &ResourceName::new("pip1"), &spec);
        assert_eq!(
            body["properties"]["dnsSettings"]["domainNameLabel"].as_str(),
            Some("my-label"),
        );
    }
}
