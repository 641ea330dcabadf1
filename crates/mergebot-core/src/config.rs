use crate::action::Action;
use crate::condition::{Condition, ConditionKind, OPERATOR_DELIMITER};
use crate::error::{BotError, Result};
use crate::evaluation::RepoSettings;
use crate::github::DEFAULT_API_URL;
use crate::rule::Rule;
use crate::types::RepoRef;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "conf.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// MetaConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    /// Login the bot posts as.
    pub bot_user: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("cache.redb")
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

// ---------------------------------------------------------------------------
// FilterConfig
// ---------------------------------------------------------------------------

/// Conditions may be written as a list of mappings or as one mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionGroups {
    Groups(Vec<Mapping>),
    Single(Mapping),
}

impl Default for ConditionGroups {
    fn default() -> Self {
        ConditionGroups::Groups(Vec::new())
    }
}

impl ConditionGroups {
    fn groups(&self) -> &[Mapping] {
        match self {
            ConditionGroups::Groups(v) => v,
            ConditionGroups::Single(m) => std::slice::from_ref(m),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub name: String,
    #[serde(default)]
    pub conditions: ConditionGroups,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

impl FilterConfig {
    /// `(key, value)` pairs in declaration order, values stringified.
    fn pairs(&self) -> Result<Vec<Vec<(String, String)>>> {
        self.conditions
            .groups()
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|(k, v)| Ok((scalar(&self.name, k)?, scalar(&self.name, v)?)))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    pub fn compile(&self) -> Result<Rule> {
        let mut groups = Vec::new();
        for group in self.pairs()? {
            let mut conditions = Vec::with_capacity(group.len());
            for (key, value) in group {
                let cond = Condition::parse(&key, value).map_err(|e| BotError::Condition {
                    rule: self.name.clone(),
                    key: key.clone(),
                    source: Box::new(e),
                })?;
                conditions.push(cond);
            }
            groups.push(conditions);
        }

        let actions = self
            .actions
            .iter()
            .map(|a| Action::from_config(&a.action, a.comment.as_deref()))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| BotError::InRule {
                rule: self.name.clone(),
                source: Box::new(e),
            })?;

        Ok(Rule::new(self.name.clone(), groups, actions))
    }
}

fn scalar(rule: &str, v: &Value) -> Result<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(BotError::InvalidConfig(format!(
            "rule '{rule}': condition keys and values must be scalars, got {other:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// RepositoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub pr_approvers: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub meta: MetaConfig,
    pub repository: RepositoryConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BotError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(data)?;
        Ok(cfg)
    }

    pub fn repo(&self) -> RepoRef {
        RepoRef::new(&self.repository.owner, &self.repository.name)
    }

    pub fn settings(&self) -> RepoSettings {
        RepoSettings {
            repo: self.repo(),
            approvers: self.repository.pr_approvers.iter().cloned().collect(),
            bot_user: self.meta.bot_user.clone(),
        }
    }

    /// Compile every filter into a validated rule, in declaration order.
    pub fn rules(&self) -> Result<Vec<Rule>> {
        self.repository.filters.iter().map(FilterConfig::compile).collect()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Problems that don't stop rules from compiling but are likely mistakes.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.meta.bot_user.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "meta.bot_user is empty; posted comments could never be recognised"
                    .to_string(),
            });
        }

        if self.repository.filters.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "repository.filters is empty; nothing will be evaluated".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for filter in &self.repository.filters {
            if !seen.insert(filter.name.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("duplicate rule name '{}'", filter.name),
                });
            }

            if filter.actions.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("rule '{}' has no actions", filter.name),
                });
            }

            let uses_votes = filter
                .conditions
                .groups()
                .iter()
                .flat_map(|g| g.keys())
                .filter_map(Value::as_str)
                .any(|key| {
                    let name = key.split(OPERATOR_DELIMITER).next().unwrap_or(key);
                    name == ConditionKind::Plus.as_str() || name == ConditionKind::Minus.as_str()
                });
            if uses_votes && self.repository.pr_approvers.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "rule '{}' counts votes but repository.pr_approvers is empty",
                        filter.name
                    ),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
meta:
  bot_user: galaxybot
  database_path: state/cache.redb
repository:
  owner: galaxyproject
  name: galaxy
  pr_approvers:
    - erasche
    - bgruening
  filters:
    - name: close-downvoted-dev
      conditions:
        - state: open
          to_branch: dev
        - minus__ge: 2
      actions:
        - action: comment
          comment: |
            {author}, this pull request has been voted down
            by two or more approvers.
    - name: stale
      conditions:
        - older_than: 7 days ago
          title_contains__not: "[WIP]"
      actions:
        - action: comment
          comment: "Ping {author}: no activity for a week."
"#;

    #[test]
    fn sample_config_parses() {
        let cfg = Config::parse(SAMPLE).unwrap();
        assert_eq!(cfg.meta.bot_user, "galaxybot");
        assert_eq!(cfg.meta.database_path, PathBuf::from("state/cache.redb"));
        assert_eq!(cfg.meta.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.repo(), RepoRef::new("galaxyproject", "galaxy"));

        let settings = cfg.settings();
        assert!(settings.approvers.contains("bgruening"));
        assert_eq!(settings.bot_user, "galaxybot");
    }

    #[test]
    fn rules_compile_in_declaration_order() {
        let rules = Config::parse(SAMPLE).unwrap().rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name(), "close-downvoted-dev");

        let keys: Vec<&str> = rules[0].conditions().map(|c| c.key()).collect();
        assert_eq!(keys, vec!["state", "to_branch", "minus__ge"]);
        let minus = rules[0].conditions().last().unwrap();
        assert_eq!(minus.operator(), Some(Operator::Ge));
        assert_eq!(minus.value(), "2");
        assert_eq!(rules[0].actions().len(), 1);
    }

    #[test]
    fn single_mapping_conditions_are_accepted() {
        let yaml = r#"
meta: { bot_user: bot }
repository:
  owner: o
  name: r
  filters:
    - name: one
      conditions:
        state: open
        title_contains: "[PROCEDURES]"
      actions: []
"#;
        let rules = Config::parse(yaml).unwrap().rules().unwrap();
        assert_eq!(rules[0].conditions().count(), 2);
    }

    #[test]
    fn unknown_condition_names_rule_and_key() {
        let yaml = r#"
meta: { bot_user: bot }
repository:
  owner: o
  name: r
  filters:
    - name: typo
      conditions:
        - titel_contains: x
"#;
        let err = Config::parse(yaml).unwrap().rules().unwrap_err();
        match &err {
            BotError::Condition { rule, key, source } => {
                assert_eq!(rule, "typo");
                assert_eq!(key, "titel_contains");
                assert!(matches!(**source, BotError::UnknownCondition(_)));
            }
            other => panic!("expected Condition error, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_action_fails_compile() {
        let yaml = r#"
meta: { bot_user: bot }
repository:
  owner: o
  name: r
  filters:
    - name: merger
      conditions: [{ state: open }]
      actions:
        - action: merge
"#;
        let err = Config::parse(yaml).unwrap().rules().unwrap_err();
        assert!(matches!(
            err,
            BotError::InRule { ref rule, ref source }
                if rule == "merger" && matches!(**source, BotError::UnsupportedAction(_))
        ));
    }

    #[test]
    fn load_missing_file_is_config_not_found() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, BotError::ConfigNotFound(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.repository.filters.len(), 2);
    }

    #[test]
    fn validate_sample_is_clean() {
        assert!(Config::parse(SAMPLE).unwrap().validate().is_empty());
    }

    #[test]
    fn validate_flags_votes_without_approvers() {
        let yaml = r#"
meta: { bot_user: bot }
repository:
  owner: o
  name: r
  filters:
    - name: votes
      conditions: [{ plus__ge: 2 }]
      actions: [{ action: comment, comment: merged }]
    - name: votes
      conditions: [{ state: open }]
"#;
        let warnings = Config::parse(yaml).unwrap().validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("counts votes") && w.message.contains("pr_approvers")));
        assert!(warnings.iter().any(|w| w.message.contains("duplicate rule name 'votes'")));
        assert!(warnings.iter().any(|w| w.message.contains("has no actions")));
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Warning));
    }

    #[test]
    fn validate_empty_bot_user_is_error() {
        let yaml = "meta: { bot_user: '' }\nrepository: { owner: o, name: r }\n";
        let warnings = Config::parse(yaml).unwrap().validate();
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
    }
}
