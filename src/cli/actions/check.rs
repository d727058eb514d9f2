use crate::registry::{Dependencies, Registry};
use crate::resolver::MemoryResolver;
use crate::service::{AuthenticationService, ServiceConfig};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub config: PathBuf,
}

/// Load a JSON service config and report the components in run order.
/// # Errors
/// Returns an error if the file can not be read or any component fails to build.
pub fn execute(args: &Args) -> Result<()> {
    let json = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read {}", args.config.display()))?;
    let service = build(&json)?;

    for line in describe(&service) {
        println!("{line}");
    }

    info!(config = %args.config.display(), "service config is valid");

    Ok(())
}

fn build(json: &str) -> Result<AuthenticationService> {
    let config = ServiceConfig::from_json(json)?;
    // Only the wiring is checked, so an empty store stands in for the real one.
    let dependencies =
        Dependencies::default().with_resolver(Arc::new(MemoryResolver::new(Vec::new())));
    let registry = Registry::new(dependencies);
    Ok(AuthenticationService::from_config(&registry, &config)?)
}

fn describe(service: &AuthenticationService) -> Vec<String> {
    let identifiers = service.identifiers().aliases().map(|alias| format!("identifier {alias}"));
    let authenticators = service
        .authenticators()
        .aliases()
        .map(|alias| format!("authenticator {alias}"));
    identifiers
        .chain(authenticators)
        .chain(std::iter::once(format!(
            "identity attribute {}",
            service.identity_attribute()
        )))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn describe_lists_components_in_order() {
        let service = build(
            r#"{
                "identifiers": [{"name": "Password"}, {"name": "Token", "alias": "ApiKey"}],
                "authenticators": [{"name": "Session"}, {"name": "HttpBasic"}]
            }"#,
        )
        .unwrap();

        assert_eq!(
            describe(&service),
            vec![
                "identifier Password",
                "identifier ApiKey",
                "authenticator Session",
                "authenticator HttpBasic",
                "identity attribute identity",
            ]
        );
    }

    #[test]
    fn build_rejects_unknown_components() {
        let err = build(r#"{"authenticators": [{"name": "Saml"}]}"#).unwrap_err();
        assert!(err.to_string().contains("Saml"));
    }

    #[test]
    fn execute_reports_missing_file() {
        let err = execute(&Args {
            config: PathBuf::from("/nonexistent/gatehouse.json"),
        })
        .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
