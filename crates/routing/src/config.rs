//! Routing rules and the configuration snapshot that holds them.
//!
//! A [`Configuration`] is built once per load from an external document, then
//! prepared in two steps that must run in order before it serves traffic:
//!
//! 1. [`Configuration::set_default`] derives each rule's accepted event set.
//! 2. [`Configuration::validate`] rejects malformed rules.
//!
//! After that the snapshot is immutable. Reloads build and prepare a fresh
//! snapshot and swap it in wholesale (see [`crate::snapshot`]).
//!
//! Both historical shapes are expressed by the same type: a lone `default`
//! rule (match everything), or an ordered list of filtered `config_items`
//! with an optional `default` fallback.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::events::{EventKind, HookClass};
use crate::filter::{find_first, RepoFilter, RepoScoped};
use crate::identifiers::{RepoCoordinates, TopicName};

// ---------------------------------------------------------------------------
// BotConfig
// ---------------------------------------------------------------------------

/// One routing rule: a repository scope, the event kinds it subscribes to,
/// and the topic matching events are published to.
///
/// At most one of `system_hook_events` / `web_hook_events` may be populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(flatten)]
    pub filter: RepoFilter,

    #[serde(default, rename = "system_hook", skip_serializing_if = "Vec::is_empty")]
    pub system_hook_events: Vec<String>,

    #[serde(default, rename = "webhook", skip_serializing_if = "Vec::is_empty")]
    pub web_hook_events: Vec<String>,

    #[serde(default)]
    pub topic: String,

    /// Derived by [`BotConfig::set_default`]; never read from the document.
    #[serde(skip)]
    accepted: BTreeSet<EventKind>,
}

impl BotConfig {
    /// Creates an unfiltered rule with no subscriptions.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Subscribes the rule to system hook events.
    pub fn with_system_hook_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_hook_events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Subscribes the rule to web hook events.
    pub fn with_web_hook_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.web_hook_events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Scopes the rule to a repository filter.
    pub fn with_filter(mut self, filter: RepoFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The hook class this rule subscribes through, if any.
    pub fn hook_class(&self) -> Option<HookClass> {
        if !self.system_hook_events.is_empty() {
            Some(HookClass::System)
        } else if !self.web_hook_events.is_empty() {
            Some(HookClass::Web)
        } else {
            None
        }
    }

    /// The event kinds this rule accepts. Empty until
    /// [`BotConfig::set_default`] has run.
    pub fn accepted_events(&self) -> &BTreeSet<EventKind> {
        &self.accepted
    }

    /// Returns the rule's topic if it subscribes to `kind`.
    pub fn topic_for(&self, kind: EventKind) -> Option<TopicName> {
        if self.accepted.contains(&kind) {
            TopicName::new(self.topic.as_str())
        } else {
            None
        }
    }

    /// Derives the accepted event set from whichever hook list is populated.
    ///
    /// Pure and idempotent. Unrecognised names are skipped here and reported
    /// by [`BotConfig::validate`].
    pub fn set_default(&mut self) {
        let events = match self.hook_class() {
            Some(HookClass::System) => &self.system_hook_events,
            Some(HookClass::Web) => &self.web_hook_events,
            None => {
                self.accepted.clear();
                return;
            }
        };

        self.accepted = events.iter().filter_map(|e| EventKind::parse(e)).collect();
    }

    /// Checks the rule. `rule` labels it in error messages.
    pub fn validate(&self, rule: &str) -> Result<(), ConfigError> {
        if self.topic.is_empty() {
            return Err(ConfigError::MissingTopic {
                rule: rule.to_string(),
            });
        }

        if !self.system_hook_events.is_empty() && !self.web_hook_events.is_empty() {
            return Err(ConfigError::ConflictingHookEvents {
                rule: rule.to_string(),
            });
        }

        check_events(rule, HookClass::System, &self.system_hook_events)?;
        check_events(rule, HookClass::Web, &self.web_hook_events)?;

        self.filter.validate(rule)
    }
}

impl RepoScoped for BotConfig {
    fn repo_filter(&self) -> &RepoFilter {
        &self.filter
    }
}

fn check_events(rule: &str, class: HookClass, events: &[String]) -> Result<(), ConfigError> {
    for event in events {
        let recognised = EventKind::parse(event).is_some_and(|kind| class.recognises(kind));
        if !recognised {
            return Err(ConfigError::UnrecognisedEvent {
                rule: rule.to_string(),
                class,
                event: event.clone(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The complete routing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Ordered, filtered rules. The first rule whose filter applies wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_items: Vec<BotConfig>,

    /// Fallback rule consulted when no item applies. Must not be filtered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<BotConfig>,
}

impl Configuration {
    /// A configuration consisting of one rule that applies everywhere.
    pub fn single(rule: BotConfig) -> Self {
        Self {
            config_items: Vec::new(),
            default: Some(rule),
        }
    }

    /// A configuration of ordered filtered rules with an optional fallback.
    pub fn with_items(config_items: Vec<BotConfig>, default: Option<BotConfig>) -> Self {
        Self {
            config_items,
            default,
        }
    }

    /// Returns `true` if no rule is configured; every event is then dropped.
    pub fn is_empty(&self) -> bool {
        self.config_items.is_empty() && self.default.is_none()
    }

    /// Runs [`BotConfig::set_default`] on every rule.
    pub fn set_default(&mut self) {
        for item in &mut self.config_items {
            item.set_default();
        }

        if let Some(default) = &mut self.default {
            default.set_default();
        }
    }

    /// Validates every rule, failing on the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, item) in self.config_items.iter().enumerate() {
            item.validate(&format!("config_items[{i}]"))?;
        }

        if let Some(default) = &self.default {
            default.validate("default")?;

            if !default.filter.is_empty() {
                return Err(ConfigError::InvalidRepoFilter {
                    rule: "default".to_string(),
                    reason: "the default rule applies to every repository and cannot be filtered"
                        .to_string(),
                });
            }
        }

        Ok(())
    }

    /// Runs [`Configuration::set_default`] then [`Configuration::validate`],
    /// returning the snapshot ready to serve traffic.
    pub fn prepare(mut self) -> Result<Self, ConfigError> {
        self.set_default();
        self.validate()?;
        Ok(self)
    }

    /// Selects the rule governing a repository: the first applicable item,
    /// otherwise the default rule.
    pub fn resolve(&self, coordinates: &RepoCoordinates) -> Option<&BotConfig> {
        find_first(&self.config_items, coordinates)
            .map(|i| &self.config_items[i])
            .or(self.default.as_ref())
    }
}
