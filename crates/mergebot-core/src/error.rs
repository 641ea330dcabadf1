use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown condition '{0}'")]
    UnknownCondition(String),

    #[error("unknown operator '{operator}' on condition '{condition}'")]
    UnknownOperator { condition: String, operator: String },

    #[error("operator '{operator}' cannot be applied to condition '{condition}'")]
    OperatorMismatch { condition: String, operator: String },

    #[error("condition '{0}' needs a comparison operator (gt, ge, eq, ne, lt, le)")]
    MissingOperator(String),

    #[error("vote threshold '{value}' for '{condition}' is not an integer")]
    InvalidThreshold { condition: String, value: String },

    #[error("cannot resolve relative time '{0}'")]
    InvalidRelativeTime(String),

    #[error("action {0} is not available")]
    UnsupportedAction(String),

    #[error("github api error: {0}")]
    GitHub(String),

    #[error("tracker store error: {0}")]
    Store(String),

    #[error("tracker already has a record for pull request id {0}")]
    RecordExists(u64),

    #[error("tracker has no record for pull request id {0}")]
    RecordMissing(u64),

    #[error("condition '{key}' in rule '{rule}'")]
    Condition {
        rule: String,
        key: String,
        #[source]
        source: Box<BotError>,
    },

    #[error("in rule '{rule}'")]
    InRule {
        rule: String,
        #[source]
        source: Box<BotError>,
    },

    #[error("rule '{rule}' on {pr}")]
    Rule {
        rule: String,
        pr: String,
        #[source]
        source: Box<BotError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;
