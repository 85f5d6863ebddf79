use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigurationError;

/// Burst size and replenishment rate of a standalone bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Quota {
    /// Maximum number of tokens the bucket holds.
    #[serde(rename = "max", alias = "max_quota")]
    pub max_quota: f64,
    /// Tokens restored per second.
    #[serde(rename = "restoreRate", alias = "restore_rate")]
    pub restore_rate: f64,
}

impl Quota {
    pub fn new(max_quota: f64, restore_rate: f64) -> Self {
        Self {
            max_quota,
            restore_rate,
        }
    }

    fn is_valid(&self) -> bool {
        self.max_quota.is_finite()
            && self.max_quota > 0.0
            && self.restore_rate.is_finite()
            && self.restore_rate > 0.0
    }
}

/// Reference to the action whose bucket an alias draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasOf {
    #[serde(rename = "aliasOf", alias = "alias_of")]
    pub target: String,
}

/// How an action is metered.
///
/// An entry carrying both quota fields and `aliasOf` matches neither form and
/// fails to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuotaKind {
    /// The action owns its own bucket.
    Standalone(Quota),
    /// The action draws from another action's bucket.
    Alias(AliasOf),
}

/// Quota configuration of one named action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionConfig {
    pub name: String,
    pub kind: QuotaKind,
}

impl ActionConfig {
    pub fn standalone(name: impl Into<String>, max_quota: f64, restore_rate: f64) -> Self {
        Self {
            name: name.into(),
            kind: QuotaKind::Standalone(Quota::new(max_quota, restore_rate)),
        }
    }

    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: QuotaKind::Alias(AliasOf {
                target: target.into(),
            }),
        }
    }
}

/// A quota table as it appears in configuration files.
///
/// ```json
/// {
///   "listInboundShipments": { "max": 30, "restoreRate": 2 },
///   "listInboundShipmentsByNextToken": { "aliasOf": "listInboundShipments" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotaTable(BTreeMap<String, QuotaKind>);

impl QuotaTable {
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add or replace the entry for `name`, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, kind: QuotaKind) -> Option<QuotaKind> {
        self.0.insert(name.into(), kind)
    }

    pub fn configs(&self) -> impl Iterator<Item = ActionConfig> + '_ {
        self.0.iter().map(|(name, kind)| ActionConfig {
            name: name.clone(),
            kind: kind.clone(),
        })
    }
}

impl FromIterator<ActionConfig> for QuotaTable {
    fn from_iter<I: IntoIterator<Item = ActionConfig>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|config| (config.name, config.kind))
                .collect(),
        )
    }
}

/// Immutable mapping from action names to the bucket that meters them.
///
/// Alias chains are collapsed when the registry is built, so resolving an action
/// never walks more than one map lookup.
#[derive(Debug, Clone)]
pub struct Registry {
    actions: BTreeMap<String, QuotaKind>,
    roots: HashMap<String, String>,
    quotas: HashMap<String, Quota>,
}

impl Registry {
    /// Validate a set of action configurations and precompute alias resolution.
    ///
    /// # Errors
    ///
    /// Fails on duplicate names, invalid standalone quotas, aliases of unknown
    /// actions, and alias cycles. Actions are checked in name order, so the same
    /// input always reports the same error.
    pub fn build<I>(configs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = ActionConfig>,
    {
        let mut actions = BTreeMap::new();
        for config in configs {
            if let QuotaKind::Standalone(quota) = &config.kind
                && !quota.is_valid()
            {
                return Err(ConfigurationError::InvalidQuota {
                    action: config.name,
                    max_quota: quota.max_quota,
                    restore_rate: quota.restore_rate,
                });
            }
            if actions.contains_key(&config.name) {
                return Err(ConfigurationError::DuplicateAction(config.name));
            }
            actions.insert(config.name, config.kind);
        }

        let mut roots = HashMap::with_capacity(actions.len());
        let mut quotas = HashMap::new();
        for name in actions.keys() {
            let root = Self::walk(&actions, name)?;
            if let Some(QuotaKind::Standalone(quota)) = actions.get(root) {
                quotas.insert(root.to_string(), *quota);
            }
            roots.insert(name.clone(), root.to_string());
        }

        tracing::debug!(
            actions = actions.len(),
            roots = quotas.len(),
            "built quota registry"
        );

        Ok(Self {
            actions,
            roots,
            quotas,
        })
    }

    pub fn from_table(table: &QuotaTable) -> Result<Self, ConfigurationError> {
        Self::build(table.configs())
    }

    // Follow aliases from `name` to the standalone action that owns the bucket.
    fn walk<'a>(
        actions: &'a BTreeMap<String, QuotaKind>,
        name: &'a str,
    ) -> Result<&'a str, ConfigurationError> {
        let mut chain = vec![name];
        let mut current = name;
        loop {
            match actions.get(current) {
                Some(QuotaKind::Standalone(_)) => return Ok(current),
                Some(QuotaKind::Alias(AliasOf { target })) => {
                    if chain.contains(&target.as_str()) {
                        let mut chain: Vec<String> =
                            chain.into_iter().map(str::to_string).collect();
                        chain.push(target.clone());
                        return Err(ConfigurationError::AliasCycle {
                            action: name.to_string(),
                            chain,
                        });
                    }
                    chain.push(target.as_str());
                    current = target.as_str();
                }
                None => {
                    return Err(ConfigurationError::UnknownAliasTarget {
                        action: chain[chain.len().saturating_sub(2)].to_string(),
                        target: current.to_string(),
                    });
                }
            }
        }
    }

    /// Name of the action owning the bucket that meters `name`.
    pub fn resolve_root(&self, name: &str) -> Result<&str, ConfigurationError> {
        self.roots
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigurationError::UnknownAction(name.to_string()))
    }

    /// Quota of a root action. Aliases have no quota of their own.
    pub fn quota(&self, root: &str) -> Option<&Quota> {
        self.quotas.get(root)
    }

    pub fn kind(&self, name: &str) -> Option<&QuotaKind> {
        self.actions.get(name)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        matches!(self.actions.get(name), Some(QuotaKind::Alias(_)))
    }

    /// All registered action names, in order.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Every root action together with its quota.
    pub fn roots(&self) -> impl Iterator<Item = (&str, &Quota)> {
        self.quotas.iter().map(|(name, quota)| (name.as_str(), quota))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
