// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Declarative component catalog.
//!
//! Each [`Component`] is an ordered list of launch units. A unit is one
//! container template with optional provisioning batches run before and
//! after the container starts. Dependencies between components form a DAG
//! that is validated and topologically sorted when the catalog is built.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::component::ComponentTag;
use crate::config::{Config, ConfigError};
use crate::spec::{PortBinding, Protocol, ReadinessTarget, RuntimeFlags};
use crate::template::{Placeholder, placeholders};

/// Container template of a launch unit. Values may contain placeholders.
#[derive(Debug, Clone)]
pub struct ContainerTemplate {
    /// Unit key, unique across the catalog (e.g. `hss`).
    pub key: String,
    /// Container name in the runtime namespace.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Environment entries in declaration order.
    pub env: Vec<(String, String)>,
    /// Published ports.
    pub ports: Vec<PortBinding>,
    /// Extra runtime flags.
    pub flags: RuntimeFlags,
    /// Socket readiness target.
    pub readiness: Option<ReadinessTarget>,
}

impl ContainerTemplate {
    /// Create a template with no env, ports, flags or readiness target.
    pub fn new(key: impl Into<String>, name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            image: image.into(),
            env: Vec::new(),
            ports: Vec::new(),
            flags: RuntimeFlags::default(),
            readiness: None,
        }
    }

    /// Append an environment entry.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a published port.
    pub fn port(mut self, port: PortBinding) -> Self {
        self.ports.push(port);
        self
    }

    /// Replace the runtime flags.
    pub fn flags(mut self, flags: RuntimeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the readiness target.
    pub fn ready_on(mut self, target: ReadinessTarget) -> Self {
        self.readiness = Some(target);
        self
    }
}

/// A batch of statements executed against a database unit.
#[derive(Debug, Clone)]
pub struct ProvisionStep {
    /// Human-readable description for logs.
    pub description: String,
    /// Unit key of the database the batch runs against.
    pub against: String,
    /// Statement batch; may contain placeholders.
    pub statements: String,
}

impl ProvisionStep {
    /// Create a provisioning step.
    pub fn new(description: &str, against: &str, statements: &str) -> Self {
        Self {
            description: description.to_string(),
            against: against.to_string(),
            statements: statements.to_string(),
        }
    }
}

/// One container with its surrounding provisioning steps.
#[derive(Debug, Clone)]
pub struct LaunchUnit {
    /// Runs before the container is created.
    pub pre_start: Option<ProvisionStep>,
    /// The container.
    pub container: ContainerTemplate,
    /// Runs after the container is ready.
    pub post_start: Option<ProvisionStep>,
}

impl LaunchUnit {
    /// A unit with no provisioning.
    pub fn new(container: ContainerTemplate) -> Self {
        Self {
            pre_start: None,
            container,
            post_start: None,
        }
    }

    /// Set the pre-start step.
    pub fn before(mut self, step: ProvisionStep) -> Self {
        self.pre_start = Some(step);
        self
    }

    /// Set the post-start step.
    pub fn after(mut self, step: ProvisionStep) -> Self {
        self.post_start = Some(step);
        self
    }
}

/// A launchable component.
#[derive(Debug, Clone)]
pub struct Component {
    /// Identity.
    pub tag: ComponentTag,
    /// Components that must be ready before this one starts.
    pub depends_on: Vec<ComponentTag>,
    /// Launch units, executed in order.
    pub units: Vec<LaunchUnit>,
    /// False for declared components that have no implementation yet.
    pub implemented: bool,
}

impl Component {
    /// An implemented component.
    pub fn new(tag: ComponentTag, depends_on: &[ComponentTag], units: Vec<LaunchUnit>) -> Self {
        Self {
            tag,
            depends_on: depends_on.to_vec(),
            units,
            implemented: true,
        }
    }

    /// A declared component that launches nothing.
    pub fn placeholder(tag: ComponentTag, depends_on: &[ComponentTag]) -> Self {
        Self {
            tag,
            depends_on: depends_on.to_vec(),
            units: Vec::new(),
            implemented: false,
        }
    }
}

/// Values the standard catalog is parameterised by.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Image registry prefix.
    pub registry: String,
    /// Image tag.
    pub platform: String,
    /// Container name prefix.
    pub name_prefix: String,
    /// Database image.
    pub db_image: String,
}

impl From<&Config> for CatalogSettings {
    fn from(config: &Config) -> Self {
        Self {
            registry: config.registry.clone(),
            platform: config.platform.clone(),
            name_prefix: config.name_prefix.clone(),
            db_image: config.db_image.clone(),
        }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            registry: crate::config::PUBLIC_REGISTRY.to_string(),
            platform: "ubuntu18.04".to_string(),
            name_prefix: "nfctl".to_string(),
            db_image: "cassandra:2.1".to_string(),
        }
    }
}

impl CatalogSettings {
    fn image(&self, name: &str) -> String {
        format!("{}/{}:{}", self.registry, name, self.platform)
    }

    fn container(&self, key: &str) -> String {
        format!("{}-{}", self.name_prefix, key)
    }
}

/// Validated set of components with a precomputed dependency order.
#[derive(Debug, Clone)]
pub struct Catalog {
    components: Vec<Component>,
    order: Vec<ComponentTag>,
}

impl Catalog {
    /// Validate components and compute their dependency order.
    ///
    /// Rejects duplicate tags or unit keys, unknown dependencies, cycles,
    /// duplicate environment keys and placeholders that reference units the
    /// component cannot have an address for.
    pub fn new(components: Vec<Component>) -> Result<Self, ConfigError> {
        let mut tags = HashSet::new();
        let mut owners: HashMap<String, (ComponentTag, usize)> = HashMap::new();
        for component in &components {
            if !tags.insert(component.tag) {
                return Err(ConfigError::DuplicateEntry(component.tag.to_string()));
            }
            for (index, unit) in component.units.iter().enumerate() {
                if owners
                    .insert(unit.container.key.clone(), (component.tag, index))
                    .is_some()
                {
                    return Err(ConfigError::DuplicateEntry(unit.container.key.clone()));
                }
            }
        }

        for component in &components {
            for dep in &component.depends_on {
                if !tags.contains(dep) {
                    return Err(ConfigError::UnknownDependency {
                        component: component.tag.to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }

        let order = topological_order(&components)?;
        let catalog = Self { components, order };

        for component in &catalog.components {
            let upstream = catalog.transitive_dependencies(component.tag);
            for (index, unit) in component.units.iter().enumerate() {
                catalog.validate_unit(component.tag, index, unit, &upstream, &owners)?;
            }
        }

        Ok(catalog)
    }

    fn validate_unit(
        &self,
        owner: ComponentTag,
        index: usize,
        unit: &LaunchUnit,
        upstream: &HashSet<ComponentTag>,
        owners: &HashMap<String, (ComponentTag, usize)>,
    ) -> Result<(), ConfigError> {
        let key = &unit.container.key;
        // A unit may reference units of its dependencies, earlier units of
        // its own component, and (after start) itself.
        let reachable = |reference: &str, include_self: bool| match owners.get(reference) {
            Some((tag, _)) if upstream.contains(tag) => true,
            Some((tag, i)) if *tag == owner => *i < index || (include_self && *i == index),
            _ => false,
        };
        let unreachable = |reference: &str| ConfigError::UnreachableReference {
            unit: key.clone(),
            reference: reference.to_string(),
        };

        let mut seen = HashSet::new();
        for (env_key, value) in &unit.container.env {
            if !seen.insert(env_key.as_str()) {
                return Err(ConfigError::DuplicateEnvKey {
                    unit: key.clone(),
                    key: env_key.clone(),
                });
            }
            for placeholder in placeholders(value, key)? {
                match placeholder {
                    Placeholder::SelfIp => {
                        return Err(ConfigError::InvalidPlaceholder {
                            unit: key.clone(),
                            placeholder: "${SELF_IP} is not known before start".to_string(),
                        });
                    }
                    Placeholder::UnitIp(reference) if !reachable(&reference, false) => {
                        return Err(unreachable(&reference));
                    }
                    _ => {}
                }
            }
        }

        let steps = [(&unit.pre_start, false), (&unit.post_start, true)];
        for (step, after_start) in steps {
            let Some(step) = step else { continue };
            if !reachable(&step.against, after_start) {
                return Err(unreachable(&step.against));
            }
            for placeholder in placeholders(&step.statements, key)? {
                match placeholder {
                    Placeholder::SelfIp if !after_start => {
                        return Err(ConfigError::InvalidPlaceholder {
                            unit: key.clone(),
                            placeholder: "${SELF_IP} is not known before start".to_string(),
                        });
                    }
                    Placeholder::UnitIp(reference) if !reachable(&reference, after_start) => {
                        return Err(unreachable(&reference));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// The standard LTE core and radio catalog.
    pub fn standard(settings: &CatalogSettings) -> Result<Self, ConfigError> {
        Self::new(standard_components(settings))
    }

    /// Look up a component.
    pub fn get(&self, tag: ComponentTag) -> Option<&Component> {
        self.components.iter().find(|c| c.tag == tag)
    }

    /// Every tag in dependency order.
    pub fn dependency_order(&self) -> &[ComponentTag] {
        &self.order
    }

    /// Sort `tags` into dependency order.
    pub fn order(&self, tags: &[ComponentTag]) -> Vec<ComponentTag> {
        let wanted: HashSet<_> = tags.iter().collect();
        self.order
            .iter()
            .filter(|t| wanted.contains(t))
            .copied()
            .collect()
    }

    /// All components `tag` depends on, directly or indirectly.
    pub fn transitive_dependencies(&self, tag: ComponentTag) -> HashSet<ComponentTag> {
        let mut found = HashSet::new();
        let mut stack = vec![tag];
        while let Some(current) = stack.pop() {
            if let Some(component) = self.get(current) {
                for dep in &component.depends_on {
                    if found.insert(*dep) {
                        stack.push(*dep);
                    }
                }
            }
        }
        found
    }

    /// Find the template of a launch unit.
    pub fn unit(&self, key: &str) -> Option<&ContainerTemplate> {
        self.components
            .iter()
            .flat_map(|c| c.units.iter())
            .map(|u| &u.container)
            .find(|t| t.key == key)
    }

    /// Container name of a launch unit.
    pub fn container_name(&self, key: &str) -> Option<&str> {
        self.unit(key).map(|t| t.name.as_str())
    }

    /// Replace the readiness target of a launch unit. Returns false if the
    /// unit does not exist.
    pub fn set_readiness(&mut self, key: &str, target: Option<ReadinessTarget>) -> bool {
        let template = self
            .components
            .iter_mut()
            .flat_map(|c| c.units.iter_mut())
            .map(|u| &mut u.container)
            .find(|t| t.key == key);
        match template {
            Some(t) => {
                t.readiness = target;
                true
            }
            None => false,
        }
    }
}

/// Kahn's algorithm with declaration order as the tie break.
fn topological_order(components: &[Component]) -> Result<Vec<ComponentTag>, ConfigError> {
    let position: HashMap<ComponentTag, usize> = components
        .iter()
        .enumerate()
        .map(|(i, c)| (c.tag, i))
        .collect();

    let mut in_degree: BTreeMap<usize, usize> = BTreeMap::new();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, component) in components.iter().enumerate() {
        in_degree.insert(i, component.depends_on.len());
        for dep in &component.depends_on {
            dependents.entry(position[dep]).or_default().push(i);
        }
    }

    let mut order = Vec::with_capacity(components.len());
    loop {
        // Lowest declaration index among nodes with no pending dependencies
        let Some(next) = in_degree
            .iter()
            .find(|(_, degree)| **degree == 0)
            .map(|(i, _)| *i)
        else {
            break;
        };
        in_degree.remove(&next);
        order.push(components[next].tag);
        for dependent in dependents.get(&next).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
            }
        }
    }

    if !in_degree.is_empty() {
        let cycle = in_degree
            .keys()
            .map(|i| components[*i].tag.to_string())
            .collect();
        return Err(ConfigError::DependencyCycle(cycle));
    }
    Ok(order)
}

const REALM: &str = "openair4G.eur";

const HSS_SCHEMA: &str = "\
CREATE KEYSPACE IF NOT EXISTS vhss WITH replication = {'class': 'SimpleStrategy', 'replication_factor': '1'}; \
CREATE TABLE IF NOT EXISTS vhss.users_imsi (imsi text PRIMARY KEY, msisdn bigint, access_restriction int, key text, opc text, sqn bigint, rand text, mmeidentity_idmmeidentity int, mmehost text, mmerealm text, ue_reachability varint, subscription_data text); \
CREATE TABLE IF NOT EXISTS vhss.mmeidentity (idmmeidentity int PRIMARY KEY, mmehost text, mmerealm text, ue_reachability varint); \
CREATE TABLE IF NOT EXISTS vhss.mmeidentity_host (mmehost text PRIMARY KEY, idmmeidentity int, mmerealm text, ue_reachability varint); \
CREATE TABLE IF NOT EXISTS vhss.hss_host (fqdn text PRIMARY KEY, realm text, address text);";

const HSS_REGISTRATION: &str = "\
INSERT INTO vhss.hss_host (fqdn, realm, address) VALUES ('hss.openair4G.eur', 'openair4G.eur', '${SELF_IP}');";

const MME_REGISTRATION: &str = "\
INSERT INTO vhss.mmeidentity (idmmeidentity, mmehost, mmerealm, ue_reachability) VALUES (3, 'mme.openair4G.eur', 'openair4G.eur', 1); \
INSERT INTO vhss.mmeidentity_host (mmehost, idmmeidentity, mmerealm, ue_reachability) VALUES ('mme.openair4G.eur', 3, 'openair4G.eur', 1);";

fn standard_components(s: &CatalogSettings) -> Vec<Component> {
    use ComponentTag::*;

    let radio_flags = RuntimeFlags {
        privileged: true,
        cap_add: vec!["SYS_NICE".to_string(), "IPC_LOCK".to_string()],
        devices: vec!["/dev/bus/usb".to_string()],
        cpu_rt_runtime: Some(950_000),
    };

    let cassandra = ContainerTemplate::new("cassandra", s.container("cassandra"), &s.db_image)
        .env("CASSANDRA_CLUSTER_NAME", "OAI HSS Cluster")
        .env("CASSANDRA_ENDPOINT_SNITCH", "GossipingPropertyFileSnitch")
        .ready_on(ReadinessTarget::container_port(9042));

    let hss = ContainerTemplate::new("hss", s.container("hss"), s.image("oai-hss"))
        .env("REALM", REALM)
        .env("HSS_FQDN", "hss.openair4G.eur")
        .env("PREFIX", "/openair-hss/etc")
        .env("cassandra_Server_IP", "${IP:cassandra}")
        .env("OP_KEY", "1006020f0a478bf6b699f15c062e42b3")
        .env("LTE_K", "fec86ba6eb707ed08905757b1bb44b8f")
        .env("APN1", "oai.ipv4")
        .env("APN2", "internet")
        .env("FIRST_IMSI", "208960100000001")
        .env("NB_USERS", "10")
        .ready_on(ReadinessTarget::container_port(3868));

    let mme = ContainerTemplate::new("mme", s.container("mme"), s.image("oai-mme"))
        .env("REALM", REALM)
        .env("PREFIX", "/openair-mme/etc")
        .env("INSTANCE", "1")
        .env("PID_DIRECTORY", "/var/run")
        .env("HSS_IP_ADDR", "${IP:hss}")
        .env("HSS_HOSTNAME", "hss")
        .env("HSS_FQDN", "hss.openair4G.eur")
        .env("HSS_REALM", REALM)
        .env("MCC", "208")
        .env("MNC", "96")
        .env("MME_GID", "32768")
        .env("MME_CODE", "3")
        .env("TAC_0", "1")
        .env("MME_S1C_ADVERTISED_IP", "${HOST_IP}")
        .port(PortBinding::new(36412, 36412, Protocol::Sctp))
        .port(PortBinding::new(2123, 2123, Protocol::Udp))
        .ready_on(ReadinessTarget::container_port(3870));

    let enb = ContainerTemplate::new("enb", s.container("enb"), s.image("oai-enb"))
        .env("ENB_MODE", "monolithic")
        .env("MME_S1C_IP_ADDRESS", "${IP:mme}")
        .env("ENB_S1C_IF_NAME", "${HOST_INTERFACE}")
        .env("ENB_S1C_IP_ADDRESS", "${HOST_IP}")
        .env("ENB_S1U_IF_NAME", "${HOST_INTERFACE}")
        .env("ENB_S1U_IP_ADDRESS", "${HOST_IP}")
        .env("MCC", "208")
        .env("MNC", "96")
        .env("TAC", "1")
        .env("USE_B2XX", "yes")
        .flags(radio_flags.clone());

    let rcc = ContainerTemplate::new("rcc", s.container("rcc"), s.image("oai-enb"))
        .env("ENB_MODE", "rcc")
        .env("MME_S1C_IP_ADDRESS", "${IP:mme}")
        .env("ENB_S1C_IF_NAME", "${HOST_INTERFACE}")
        .env("ENB_S1C_IP_ADDRESS", "${HOST_IP}")
        .env("MCC", "208")
        .env("MNC", "96")
        .env("TAC", "1")
        .env("FH_LOCAL_PORT", "50000")
        .flags(RuntimeFlags {
            cap_add: vec!["SYS_NICE".to_string()],
            cpu_rt_runtime: Some(950_000),
            ..Default::default()
        })
        .ready_on(ReadinessTarget::container_port(50000));

    let rru = ContainerTemplate::new("rru", s.container("rru"), s.image("oai-enb"))
        .env("ENB_MODE", "rru")
        .env("RCC_IP_ADDRESS", "${IP:rcc}")
        .env("FH_REMOTE_PORT", "50000")
        .env("USE_B2XX", "yes")
        .flags(radio_flags);

    vec![
        Component::new(
            Hss,
            &[],
            vec![
                LaunchUnit::new(cassandra),
                LaunchUnit::new(hss)
                    .before(ProvisionStep::new("load HSS schema", "cassandra", HSS_SCHEMA))
                    .after(ProvisionStep::new(
                        "register HSS host",
                        "cassandra",
                        HSS_REGISTRATION,
                    )),
            ],
        ),
        Component::new(
            Mme,
            &[Hss],
            vec![LaunchUnit::new(mme).after(ProvisionStep::new(
                "register MME identity",
                "cassandra",
                MME_REGISTRATION,
            ))],
        ),
        Component::placeholder(Spgw, &[Mme]),
        Component::new(Enb, &[Mme], vec![LaunchUnit::new(enb)]),
        Component::new(Rcc, &[Mme], vec![LaunchUnit::new(rcc)]),
        Component::new(Rru, &[Rcc], vec![LaunchUnit::new(rru)]),
    ]
}
