use std::env;
use std::time::Duration;

use lakewarden_application::RetryPolicy;
use lakewarden_core::AppError;
use lakewarden_domain::{ServiceRoute, ServiceTopology};
use lakewarden_infrastructure::{DirectoryToolConfig, PolicyAuthorityConfig, QuotaToolConfig};
use url::Url;

/// Runtime configuration loaded once at process start.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub authority: PolicyAuthorityConfig,
    pub topology: ServiceTopology,
    pub role_service: String,
    pub retry: RetryPolicy,
    pub quota_tool: QuotaToolConfig,
    pub directory_tool: DirectoryToolConfig,
}

impl ApiConfig {
    /// Reads configuration from the process environment.
    ///
    /// `SERVICE_TOPOLOGY` lists fan-out routes separated by `;`, each either
    /// a bare service name or `service=catalog1,catalog2` for catalog-aware
    /// engines, e.g. `warehouse_sql;lake_olap=internal,hive`.
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let authority_url = required_env("AUTHORITY_URL")?;
        let base_url = Url::parse(authority_url.as_str())
            .map_err(|error| AppError::Validation(format!("invalid AUTHORITY_URL: {error}")))?;
        let authority = PolicyAuthorityConfig {
            base_url,
            username: required_env("AUTHORITY_USER")?,
            password: required_env("AUTHORITY_PASSWORD")?,
        };

        let topology_spec =
            env::var("SERVICE_TOPOLOGY").unwrap_or_else(|_| "warehouse_sql".to_owned());
        let topology = parse_topology(topology_spec.as_str())?;
        let role_service = env::var("ROLE_SERVICE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| topology.routes.first().map(|route| route.name.clone()))
            .ok_or_else(|| {
                AppError::Validation("SERVICE_TOPOLOGY must name at least one service".to_owned())
            })?;

        let attempts = env::var("SYNC_ATTEMPTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let retry_delay_ms = env::var("SYNC_RETRY_DELAY_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(2000);
        let retry = RetryPolicy {
            attempts: attempts.max(1),
            delay: Duration::from_millis(retry_delay_ms),
        };

        let quota_defaults = QuotaToolConfig::default();
        let quota_tool = QuotaToolConfig {
            command: env::var("QUOTA_COMMAND").unwrap_or(quota_defaults.command),
            warehouse_root: env::var("QUOTA_WAREHOUSE_ROOT")
                .unwrap_or(quota_defaults.warehouse_root),
            superuser: env::var("QUOTA_SUPERUSER").unwrap_or(quota_defaults.superuser),
        };
        let directory_tool = DirectoryToolConfig {
            command: env::var("DIRECTORY_COMMAND")
                .unwrap_or_else(|_| "directoryctl".to_owned()),
        };

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            api_host,
            api_port,
            authority,
            topology,
            role_service,
            retry,
            quota_tool,
            directory_tool,
        })
    }
}

fn parse_topology(spec: &str) -> Result<ServiceTopology, AppError> {
    let mut routes = Vec::new();

    for entry in spec.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        match entry.split_once('=') {
            None => routes.push(ServiceRoute::plain(entry)),
            Some((service, catalogs)) => {
                let catalogs: Vec<String> = catalogs
                    .split(',')
                    .map(str::trim)
                    .filter(|catalog| !catalog.is_empty())
                    .map(ToOwned::to_owned)
                    .collect();
                if catalogs.is_empty() {
                    return Err(AppError::Validation(format!(
                        "catalog-aware service '{service}' in SERVICE_TOPOLOGY lists no catalogs"
                    )));
                }
                routes.push(ServiceRoute::catalog_aware(service.trim(), catalogs));
            }
        }
    }

    if routes.is_empty() {
        return Err(AppError::Validation(
            "SERVICE_TOPOLOGY must name at least one service".to_owned(),
        ));
    }

    Ok(ServiceTopology::new(routes))
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} must be set")))
}

#[cfg(test)]
mod tests {
    use super::parse_topology;

    #[test]
    fn topology_parses_plain_and_catalog_aware_routes() {
        let topology = match parse_topology("warehouse_sql;lake_olap=internal,hive") {
            Ok(topology) => topology,
            Err(error) => panic!("parse failed: {error}"),
        };

        assert_eq!(topology.routes.len(), 2);
        assert_eq!(topology.routes[0].name, "warehouse_sql");
        assert!(topology.routes[0].catalogs.is_none());
        assert_eq!(
            topology.routes[1].catalogs.as_deref(),
            Some(["internal".to_owned(), "hive".to_owned()].as_slice())
        );
    }

    #[test]
    fn topology_rejects_catalog_aware_route_without_catalogs() {
        assert!(parse_topology("lake_olap=").is_err());
    }

    #[test]
    fn topology_rejects_empty_spec() {
        assert!(parse_topology("  ").is_err());
    }
}
