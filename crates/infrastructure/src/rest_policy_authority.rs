use async_trait::async_trait;
use lakewarden_application::PolicyAuthority;
use lakewarden_core::{AppError, AppResult};
use lakewarden_domain::{PolicyDocument, RoleDocument};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

mod wire;

use wire::{WirePolicy, WireRole, decode_policy, decode_role, encode_policy, encode_role};

/// Connection settings for the policy authority's REST API.
///
/// Constructed once at process start and passed in; the client never reads
/// ambient environment state.
#[derive(Debug, Clone)]
pub struct PolicyAuthorityConfig {
    /// Authority base URL, e.g. `https://authority.internal:6182/`.
    pub base_url: Url,
    /// Basic-auth user.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
}

/// REST adapter for the authority's public v2 policy and role API.
///
/// Documents are never cached: every reconciliation pass reads fresh remote
/// state. Transport errors and 5xx/429 statuses surface as transient.
pub struct RestPolicyAuthority {
    http_client: reqwest::Client,
    config: PolicyAuthorityConfig,
}

impl RestPolicyAuthority {
    /// Creates the adapter over a shared HTTP client.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: PolicyAuthorityConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Builds `{base}/service/public/v2/api/{segments...}`.
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.config.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                AppError::Internal("authority base URL cannot carry a path".to_owned())
            })?;
            path.pop_if_empty();
            path.extend(["service", "public", "v2", "api"]);
            path.extend(segments);
        }
        Ok(url)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
        builder
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|error| AppError::Transient(format!("authority transport error: {error}")))
    }

    async fn read_failure(&self, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<response body unavailable>".to_owned());

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            AppError::Transient(format!("authority returned {status}: {body}"))
        } else {
            AppError::Internal(format!("authority returned {status}: {body}"))
        }
    }
}

#[async_trait]
impl PolicyAuthority for RestPolicyAuthority {
    async fn find_policy(&self, service: &str, name: &str) -> AppResult<Option<PolicyDocument>> {
        let url = self.endpoint(&["service", service, "policy", name])?;
        let response = self.send(self.http_client.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(service, name, "policy not found in authority");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.read_failure(response).await);
        }

        let wire: WirePolicy = response
            .json()
            .await
            .map_err(|error| AppError::Internal(format!("invalid policy payload: {error}")))?;
        decode_policy(wire).map(Some)
    }

    async fn create_policy(&self, document: &PolicyDocument) -> AppResult<i64> {
        let url = self.endpoint(&["policy"])?;
        let response = self
            .send(self.http_client.post(url).json(&encode_policy(document)))
            .await?;

        if !response.status().is_success() {
            return Err(self.read_failure(response).await);
        }

        let created: WirePolicy = response
            .json()
            .await
            .map_err(|error| AppError::Internal(format!("invalid policy payload: {error}")))?;
        created.id.ok_or_else(|| {
            AppError::Internal(format!(
                "authority created policy '{}' without an id",
                document.name
            ))
        })
    }

    async fn update_policy(&self, policy_id: i64, document: &PolicyDocument) -> AppResult<()> {
        let url = self.endpoint(&["policy", &policy_id.to_string()])?;
        let response = self
            .send(self.http_client.put(url).json(&encode_policy(document)))
            .await?;

        if !response.status().is_success() {
            return Err(self.read_failure(response).await);
        }
        Ok(())
    }

    async fn delete_policy(&self, policy_id: i64) -> AppResult<()> {
        let url = self.endpoint(&["policy", &policy_id.to_string()])?;
        let response = self.send(self.http_client.delete(url)).await?;

        if !response.status().is_success() {
            return Err(self.read_failure(response).await);
        }
        Ok(())
    }

    async fn find_role(&self, service: &str, name: &str) -> AppResult<Option<RoleDocument>> {
        let url = self.endpoint(&["roles", "name", name])?;
        let response = self
            .send(self.http_client.get(url).query(&[("serviceName", service)]))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(service, name, "role not found in authority");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.read_failure(response).await);
        }

        let wire: WireRole = response
            .json()
            .await
            .map_err(|error| AppError::Internal(format!("invalid role payload: {error}")))?;
        Ok(Some(decode_role(wire)))
    }

    async fn create_role(&self, service: &str, document: &RoleDocument) -> AppResult<i64> {
        let url = self.endpoint(&["roles"])?;
        let response = self
            .send(
                self.http_client
                    .post(url)
                    .query(&[("serviceName", service)])
                    .json(&encode_role(document)),
            )
            .await?;

        if !response.status().is_success() {
            return Err(self.read_failure(response).await);
        }

        let created: WireRole = response
            .json()
            .await
            .map_err(|error| AppError::Internal(format!("invalid role payload: {error}")))?;
        created.id.ok_or_else(|| {
            AppError::Internal(format!(
                "authority created role '{}' without an id",
                document.name
            ))
        })
    }

    async fn update_role(&self, role_id: i64, document: &RoleDocument) -> AppResult<()> {
        let url = self.endpoint(&["roles", &role_id.to_string()])?;
        let response = self
            .send(self.http_client.put(url).json(&encode_role(document)))
            .await?;

        if !response.status().is_success() {
            return Err(self.read_failure(response).await);
        }
        Ok(())
    }

    async fn roles_containing_user(&self, user: &str) -> AppResult<Vec<RoleDocument>> {
        let url = self.endpoint(&["roles"])?;
        let response = self
            .send(self.http_client.get(url).query(&[("userName", user)]))
            .await?;

        if !response.status().is_success() {
            return Err(self.read_failure(response).await);
        }

        let wires: Vec<WireRole> = response
            .json()
            .await
            .map_err(|error| AppError::Internal(format!("invalid role payload: {error}")))?;
        Ok(wires.into_iter().map(decode_role).collect())
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{PolicyAuthorityConfig, RestPolicyAuthority};

    fn authority(base: &str) -> RestPolicyAuthority {
        let base_url = match Url::parse(base) {
            Ok(url) => url,
            Err(error) => panic!("invalid base url: {error}"),
        };
        RestPolicyAuthority::new(
            reqwest::Client::new(),
            PolicyAuthorityConfig {
                base_url,
                username: "admin".to_owned(),
                password: "admin".to_owned(),
            },
        )
    }

    #[test]
    fn endpoints_extend_the_public_api_path() {
        let client = authority("https://authority.internal:6182/");
        let url = client.endpoint(&["service", "warehouse_sql", "policy", "sales.orders.all.normal"]);
        assert_eq!(
            url.ok().map(String::from),
            Some(
                "https://authority.internal:6182/service/public/v2/api/service/warehouse_sql/policy/sales.orders.all.normal"
                    .to_owned()
            )
        );
    }
}
