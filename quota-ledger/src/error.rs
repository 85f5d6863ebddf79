/// Errors raised while building a registry or resolving an action against it.
///
/// These are never recoverable at call time: a misconfigured quota table must be
/// fixed, not silently treated as unthrottled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// The action has no entry in the registry.
    #[error("no quota is registered for action `{0}`")]
    UnknownAction(String),

    /// The same action name was configured twice.
    #[error("action `{0}` is configured more than once")]
    DuplicateAction(String),

    /// An alias points at an action that is not in the registry.
    #[error("action `{action}` is an alias of unknown action `{target}`")]
    UnknownAliasTarget { action: String, target: String },

    /// Following aliases from `action` leads back to an action already visited.
    ///
    /// `chain` lists the names walked, ending with the repeated one.
    #[error("alias cycle detected: {}", chain.join(" -> "))]
    AliasCycle { action: String, chain: Vec<String> },

    /// A standalone quota with a non-positive or non-finite burst or rate.
    #[error("action `{action}` has invalid quota (max {max_quota}, restore rate {restore_rate}/s)")]
    InvalidQuota {
        action: String,
        max_quota: f64,
        restore_rate: f64,
    },

    /// A reservation asked for a token count the bucket can never hold.
    #[error("cannot reserve {requested} tokens from `{action}` (max {max_quota})")]
    InvalidCost {
        action: String,
        requested: f64,
        max_quota: f64,
    },

    /// A quota table could not be parsed.
    #[error("invalid quota table: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
