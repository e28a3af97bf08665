//! Service dependency scheduler (§4.6): orders a node's services by their
//! declared dependencies and runs startup, retries validation, then
//! (on shutdown) runs the services in reverse order. Every command a
//! service declares runs through the namespace driver's `exec` (§4.2) via
//! [`core_netns::Fabric`], never a bare `tokio::process::Command`.

use crate::error::{EngineError, EngineResult};
use core_model::{Service, ServiceCommand};
use core_netns::Fabric;
use std::collections::{HashMap, HashSet};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Topologically sort `services` by dependency, detecting cycles and
/// references to services that don't exist in the set.
pub fn order_services(services: &HashMap<String, Service>) -> EngineResult<Vec<String>> {
    for service in services.values() {
        for dep in &service.dependencies {
            if !services.contains_key(dep) {
                return Err(EngineError::UnknownServiceDependency(service.name.clone(), dep.clone()));
            }
        }
    }

    let mut ordered = Vec::with_capacity(services.len());
    let mut visited: HashSet<String> = HashSet::new();
    let mut in_progress: HashSet<String> = HashSet::new();

    fn visit(
        name: &str,
        services: &HashMap<String, Service>,
        visited: &mut HashSet<String>,
        in_progress: &mut HashSet<String>,
        ordered: &mut Vec<String>,
    ) -> EngineResult<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if !in_progress.insert(name.to_string()) {
            return Err(EngineError::ServiceDependencyCycle(
                in_progress.iter().cloned().collect(),
            ));
        }
        if let Some(service) = services.get(name) {
            for dep in &service.dependencies {
                visit(dep, services, visited, in_progress, ordered)?;
            }
        }
        in_progress.remove(name);
        visited.insert(name.to_string());
        ordered.push(name.to_string());
        Ok(())
    }

    let mut names: Vec<&String> = services.keys().collect();
    names.sort();
    for name in names {
        visit(name, services, &mut visited, &mut in_progress, &mut ordered)?;
    }

    Ok(ordered)
}

pub struct ServiceRunner;

impl ServiceRunner {
    /// Start every service on a node in dependency order, retrying each
    /// service's validation commands up to `Service::validation_retries`
    /// times, spaced `Service::validation_period_secs` apart.
    pub async fn start_all(fabric: &Fabric, node_id: u32, services: &HashMap<String, Service>) -> EngineResult<()> {
        let order = order_services(services)?;
        for name in order {
            let service = &services[&name];
            Self::run_phase(fabric, node_id, &service.startup).await?;
            Self::validate(fabric, node_id, service).await?;
        }
        Ok(())
    }

    /// Shut services down in reverse dependency order.
    pub async fn shutdown_all(fabric: &Fabric, node_id: u32, services: &HashMap<String, Service>) -> EngineResult<()> {
        let mut order = order_services(services)?;
        order.reverse();
        for name in order {
            let service = &services[&name];
            Self::run_phase(fabric, node_id, &service.shutdown).await?;
        }
        Ok(())
    }

    async fn validate(fabric: &Fabric, node_id: u32, service: &Service) -> EngineResult<()> {
        if service.validate.is_empty() {
            return Ok(());
        }
        let mut attempts = 0;
        loop {
            attempts += 1;
            match Self::run_phase(fabric, node_id, &service.validate).await {
                Ok(()) => return Ok(()),
                Err(e) if attempts < service.validation_retries => {
                    warn!(
                        "service '{}' validation attempt {}/{} failed: {}",
                        service.name, attempts, service.validation_retries, e
                    );
                    sleep(std::time::Duration::from_secs(service.validation_period_secs)).await;
                }
                Err(_) => return Err(EngineError::ServiceValidationFailed(service.name.clone(), attempts)),
            }
        }
    }

    async fn run_phase(fabric: &Fabric, node_id: u32, commands: &[ServiceCommand]) -> EngineResult<()> {
        for command in commands {
            debug!("running '{}' on node {}", command.command, node_id);
            let argv = vec![command.command.clone()];

            if command.blocking {
                let output = fabric
                    .exec(node_id, &argv, None, true, true)
                    .await?
                    .ok_or_else(|| EngineError::InvalidConfig("blocking exec returned no output".to_string()))?;
                if output.rc != 0 {
                    return Err(EngineError::ServiceValidationFailed(command.command.clone(), 1));
                }
            } else {
                fabric.exec(node_id, &argv, None, true, false).await?;
            }
        }
        info!("ran {} command(s) on node {}", commands.len(), node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, deps: &[&str]) -> Service {
        let mut s = Service::new(name);
        for d in deps {
            s = s.depends_on(*d);
        }
        s
    }

    #[test]
    fn orders_by_dependency() {
        let mut services = HashMap::new();
        services.insert("b".to_string(), service("b", &["a"]));
        services.insert("a".to_string(), service("a", &[]));
        services.insert("c".to_string(), service("c", &["b"]));

        let order = order_services(&services).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn detects_cycles() {
        let mut services = HashMap::new();
        services.insert("a".to_string(), service("a", &["b"]));
        services.insert("b".to_string(), service("b", &["a"]));

        assert!(matches!(
            order_services(&services),
            Err(EngineError::ServiceDependencyCycle(_))
        ));
    }

    #[test]
    fn detects_unknown_dependency() {
        let mut services = HashMap::new();
        services.insert("a".to_string(), service("a", &["ghost"]));

        assert!(matches!(
            order_services(&services),
            Err(EngineError::UnknownServiceDependency(_, _))
        ));
    }
}
