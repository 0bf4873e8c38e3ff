// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Orchestration of a launch request.
//!
//! A request is expanded into component tags, sorted into dependency order
//! and launched one component at a time. Each launch unit goes through:
//!
//! 1. pre-start provisioning (only when the container is about to be created)
//! 2. start or reuse of the container
//! 3. state and socket readiness
//! 4. post-start provisioning (only when the container was created)
//!
//! The first failure aborts the run. Containers started earlier are left
//! running so the operator can inspect them.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, Component, ContainerTemplate, ProvisionStep};
use crate::component::{ComponentPhase, ComponentTag, expand_tags};
use crate::config::ConfigError;
use crate::error::{Error, Result};
use crate::handle::{ContainerHandle, RuntimeInfo};
use crate::network::HostNetwork;
use crate::provision::Provisioner;
use crate::readiness::ReadinessConfig;
use crate::runtime::{ContainerRuntime, RuntimeState};
use crate::spec::ComponentSpec;
use crate::template::{Bindings, Placeholder, placeholders, render};

/// One container in a plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedUnit {
    /// Unit key.
    pub key: String,
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Description of the pre-start step, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_start: Option<String>,
    /// Description of the post-start step, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_start: Option<String>,
}

/// One component in a plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedComponent {
    /// Component tag.
    pub tag: ComponentTag,
    /// Direct dependencies.
    pub depends_on: Vec<ComponentTag>,
    /// True if the component is a placeholder and will be skipped.
    pub skipped: bool,
    /// Containers in launch order.
    pub units: Vec<PlannedUnit>,
}

/// What a request would launch, in order.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Components in dependency order.
    pub components: Vec<PlannedComponent>,
}

/// Final state of one component after a run.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    /// Component tag.
    pub tag: ComponentTag,
    /// Terminal phase.
    pub phase: ComponentPhase,
    /// Containers that became ready.
    pub containers: Vec<RuntimeInfo>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Components in the order they were processed.
    pub components: Vec<ComponentReport>,
}

impl Plan {
    /// Resolve `requested` against `catalog`.
    pub fn build<S: AsRef<str>>(catalog: &Catalog, requested: &[S]) -> Result<Self> {
        let order = resolve_order(catalog, requested)?;
        let mut components = Vec::with_capacity(order.len());
        for tag in order {
            let component = component(catalog, tag)?;
            components.push(PlannedComponent {
                tag,
                depends_on: component.depends_on.clone(),
                skipped: !component.implemented,
                units: component
                    .units
                    .iter()
                    .map(|u| PlannedUnit {
                        key: u.container.key.clone(),
                        name: u.container.name.clone(),
                        image: u.container.image.clone(),
                        pre_start: u.pre_start.as_ref().map(|s| s.description.clone()),
                        post_start: u.post_start.as_ref().map(|s| s.description.clone()),
                    })
                    .collect(),
            });
        }
        Ok(Self { components })
    }
}

impl RunReport {
    /// Report for one component.
    pub fn get(&self, tag: ComponentTag) -> Option<&ComponentReport> {
        self.components.iter().find(|c| c.tag == tag)
    }
}

fn resolve_order<S: AsRef<str>>(
    catalog: &Catalog,
    requested: &[S],
) -> Result<Vec<ComponentTag>> {
    let tags = expand_tags(requested)?;
    for tag in &tags {
        component(catalog, *tag)?;
    }
    Ok(catalog.order(&tags))
}

fn component(catalog: &Catalog, tag: ComponentTag) -> Result<&Component> {
    catalog
        .get(tag)
        .ok_or_else(|| ConfigError::UnknownTag(tag.to_string()).into())
}

/// Tracks and logs phase changes of one component.
struct PhaseTracker {
    tag: ComponentTag,
    phase: ComponentPhase,
}

impl PhaseTracker {
    fn new(tag: ComponentTag) -> Self {
        Self {
            tag,
            phase: ComponentPhase::NotStarted,
        }
    }

    fn advance(&mut self, next: ComponentPhase) {
        if next == self.phase {
            return;
        }
        if !self.phase.can_advance_to(next) {
            warn!(component = %self.tag, from = %self.phase, to = %next, "Unexpected phase change");
        }
        debug!(component = %self.tag, from = %self.phase, to = %next, "Phase change");
        self.phase = next;
    }
}

/// Launches components from a catalog onto a container runtime.
pub struct Orchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    catalog: Catalog,
    host: HostNetwork,
    handle: ContainerHandle,
    provisioner: Provisioner,
}

impl Orchestrator {
    /// Create an orchestrator with default readiness settings.
    ///
    /// `client_image` is used for provisioning batches.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        catalog: Catalog,
        host: HostNetwork,
        client_image: impl Into<String>,
    ) -> Self {
        Self {
            handle: ContainerHandle::new(runtime.clone(), ReadinessConfig::default()),
            provisioner: Provisioner::new(runtime.clone(), client_image),
            runtime,
            catalog,
            host,
        }
    }

    /// Replace the readiness settings.
    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.handle = ContainerHandle::new(self.runtime.clone(), readiness);
        self
    }

    /// Resolve a request into an ordered plan without touching the runtime.
    pub fn plan<S: AsRef<str>>(&self, requested: &[S]) -> Result<Plan> {
        Plan::build(&self.catalog, requested)
    }

    /// Launch every requested component and wait for each to be ready.
    pub async fn run<S: AsRef<str>>(&self, requested: &[S]) -> Result<RunReport> {
        let order = self.resolve_order(requested)?;
        info!(
            components = %order.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(","),
            "Launching"
        );

        self.check_external_dependencies(&order).await?;

        let mut addresses = HashMap::new();
        let mut report = RunReport::default();
        for tag in order {
            let component = self.component(tag)?;
            let mut tracker = PhaseTracker::new(tag);

            if !component.implemented {
                warn!(component = %tag, "Not implemented yet, skipping");
                tracker.advance(ComponentPhase::Skipped);
                report.components.push(ComponentReport {
                    tag,
                    phase: tracker.phase,
                    containers: Vec::new(),
                });
                continue;
            }

            match self.launch(component, &mut tracker, &mut addresses).await {
                Ok(containers) => {
                    tracker.advance(ComponentPhase::Ready);
                    info!(component = %tag, "Component ready");
                    report.components.push(ComponentReport {
                        tag,
                        phase: tracker.phase,
                        containers,
                    });
                }
                Err(e) => {
                    let phase = tracker.phase;
                    tracker.advance(ComponentPhase::Failed);
                    error!(component = %tag, %phase, error = %e, "Component failed");
                    return Err(e);
                }
            }
        }
        Ok(report)
    }

    fn resolve_order<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<ComponentTag>> {
        resolve_order(&self.catalog, requested)
    }

    fn component(&self, tag: ComponentTag) -> Result<&Component> {
        component(&self.catalog, tag)
    }

    /// Every dependency that is not part of the request must already be running.
    async fn check_external_dependencies(&self, order: &[ComponentTag]) -> Result<()> {
        let requested: HashSet<_> = order.iter().copied().collect();
        for tag in order {
            let component = self.component(*tag)?;
            // Skipped components launch nothing, so they need nothing running
            if !component.implemented {
                continue;
            }
            for dependency in &component.depends_on {
                if requested.contains(dependency) {
                    continue;
                }
                for unit in &self.component(*dependency)?.units {
                    let state = self.runtime.inspect_state(&unit.container.name).await?;
                    if state != RuntimeState::Running {
                        return Err(Error::DependencyNotRunning {
                            component: *tag,
                            dependency: *dependency,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    async fn launch(
        &self,
        component: &Component,
        tracker: &mut PhaseTracker,
        addresses: &mut HashMap<String, IpAddr>,
    ) -> Result<Vec<RuntimeInfo>> {
        let tag = component.tag;
        let mut containers = Vec::with_capacity(component.units.len());

        for unit in &component.units {
            let template = &unit.container;
            let running =
                self.runtime.inspect_state(&template.name).await? == RuntimeState::Running;

            if let Some(step) = unit.pre_start.as_ref().filter(|_| !running) {
                tracker.advance(ComponentPhase::Provisioning);
                self.provision(tag, &template.key, step, None, addresses)
                    .await?;
            }

            tracker.advance(ComponentPhase::Starting);
            let spec = self.resolve_spec(template, addresses).await?;
            let outcome = self.handle.start(&spec).await?;

            let created = outcome.is_created();
            if created {
                tracker.advance(ComponentPhase::AwaitingReadiness);
            }
            let info = self.handle.confirm(&spec, outcome).await?;
            addresses.insert(template.key.clone(), info.address);

            if let Some(step) = unit.post_start.as_ref().filter(|_| created) {
                tracker.advance(ComponentPhase::Provisioning);
                self.provision(tag, &template.key, step, Some(info.address), addresses)
                    .await?;
            }

            containers.push(info);
        }
        Ok(containers)
    }

    async fn provision(
        &self,
        tag: ComponentTag,
        unit: &str,
        step: &ProvisionStep,
        self_ip: Option<IpAddr>,
        addresses: &mut HashMap<String, IpAddr>,
    ) -> Result<()> {
        info!(component = %tag, unit = %unit, step = %step.description, "Provisioning");
        let target = self.address_of(&step.against, unit, addresses).await?;
        self.resolve_references(&step.statements, unit, addresses)
            .await?;

        let batch = render(
            &step.statements,
            unit,
            &Bindings {
                host: &self.host,
                self_ip,
                units: addresses,
            },
        )?;
        self.provisioner
            .execute(target, &batch)
            .await
            .map_err(|source| Error::Provisioning {
                component: tag,
                source,
            })?;
        Ok(())
    }

    /// Render a container template into a concrete spec.
    async fn resolve_spec(
        &self,
        template: &ContainerTemplate,
        addresses: &mut HashMap<String, IpAddr>,
    ) -> Result<ComponentSpec> {
        let mut spec = ComponentSpec::new(&template.image, &template.name)
            .with_flags(template.flags.clone());
        for port in &template.ports {
            spec = spec.with_port(port.clone());
        }
        if let Some(target) = &template.readiness {
            spec = spec.with_readiness(target.clone());
        }

        for (key, value) in &template.env {
            self.resolve_references(value, &template.key, addresses)
                .await?;
            let rendered = render(
                value,
                &template.key,
                &Bindings {
                    host: &self.host,
                    self_ip: None,
                    units: addresses,
                },
            )?;
            spec = spec.with_env(key, rendered);
        }
        Ok(spec)
    }

    /// Make sure every `${IP:<unit>}` in `text` has a known address.
    async fn resolve_references(
        &self,
        text: &str,
        unit: &str,
        addresses: &mut HashMap<String, IpAddr>,
    ) -> Result<()> {
        for placeholder in placeholders(text, unit)? {
            if let Placeholder::UnitIp(reference) = placeholder {
                self.address_of(&reference, unit, addresses).await?;
            }
        }
        Ok(())
    }

    /// Address of a launch unit, from this run or from the runtime.
    async fn address_of(
        &self,
        key: &str,
        referrer: &str,
        addresses: &mut HashMap<String, IpAddr>,
    ) -> Result<IpAddr> {
        if let Some(ip) = addresses.get(key) {
            return Ok(*ip);
        }
        let name = self
            .catalog
            .container_name(key)
            .ok_or_else(|| ConfigError::UnreachableReference {
                unit: referrer.to_string(),
                reference: key.to_string(),
            })?;
        let ip = self.runtime.inspect_ip(name).await?;
        debug!(unit = %key, %ip, "Resolved address from runtime");
        addresses.insert(key.to_string(), ip);
        Ok(ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSettings;
    use crate::runtime::MockRuntime;

    fn orchestrator(runtime: Arc<MockRuntime>) -> Orchestrator {
        let host = HostNetwork {
            interface: "eth0".to_string(),
            address: "192.0.2.10".parse().unwrap(),
        };
        let mut catalog = Catalog::standard(&CatalogSettings::default()).unwrap();
        for key in ["cassandra", "hss", "mme", "rcc"] {
            catalog.set_readiness(key, None);
        }
        Orchestrator::new(runtime, catalog, host, "cassandra:2.1")
    }

    #[test]
    fn test_plan_epc() {
        let orchestrator = orchestrator(Arc::new(MockRuntime::new()));
        let plan = orchestrator.plan(&["EPC"]).unwrap();
        let tags: Vec<_> = plan.components.iter().map(|c| c.tag).collect();
        assert_eq!(tags, vec![ComponentTag::Hss, ComponentTag::Mme, ComponentTag::Spgw]);
        assert!(plan.components[2].skipped);
        assert_eq!(plan.components[0].units.len(), 2);
        assert_eq!(
            plan.components[0].units[1].pre_start.as_deref(),
            Some("load HSS schema")
        );
    }

    #[test]
    fn test_plan_orders_by_dependency() {
        let orchestrator = orchestrator(Arc::new(MockRuntime::new()));
        let plan = orchestrator.plan(&["rru", "rcc", "mme", "hss"]).unwrap();
        let tags: Vec<_> = plan.components.iter().map(|c| c.tag).collect();
        assert_eq!(
            tags,
            vec![
                ComponentTag::Hss,
                ComponentTag::Mme,
                ComponentTag::Rcc,
                ComponentTag::Rru
            ]
        );
    }

    #[tokio::test]
    async fn test_env_resolved_from_previous_units() {
        let runtime = Arc::new(MockRuntime::new());
        let orchestrator = orchestrator(runtime.clone());
        orchestrator.run(&["HSS", "MME"]).await.unwrap();

        let hss = runtime.spec_of("nfctl-hss").await.unwrap();
        assert_eq!(hss.env["cassandra_Server_IP"], "127.0.0.1");
        let mme = runtime.spec_of("nfctl-mme").await.unwrap();
        assert_eq!(mme.env["HSS_IP_ADDR"], "127.0.0.1");
        assert_eq!(mme.env["MME_S1C_ADVERTISED_IP"], "192.0.2.10");
    }

    #[test]
    fn test_phase_tracker_ignores_repeats() {
        let mut tracker = PhaseTracker::new(ComponentTag::Hss);
        tracker.advance(ComponentPhase::Starting);
        tracker.advance(ComponentPhase::Starting);
        assert_eq!(tracker.phase, ComponentPhase::Starting);
    }
}
