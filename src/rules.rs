//! Ordered rule set: which destination a file belongs to.
//!
//! Rules are tried in configuration order, and within a rule its conditions
//! are tried in order. The first condition whose predicates all hold decides
//! the destination; later rules are never consulted for that file.

use crate::config::{ConditionConfig, ConfigError, RuleConfig};
use crate::file_category::Category;
use crate::filters::{compile_glob, compile_regex};
use crate::scanner::FileFacts;
use chrono::{DateTime, Datelike, Local, Timelike};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Age thresholds, in days, behind the `{date_group}` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateGroups {
    #[serde(default = "default_last_week")]
    pub last_week: i64,
    #[serde(default = "default_last_month")]
    pub last_month: i64,
}

fn default_last_week() -> i64 {
    7
}

fn default_last_month() -> i64 {
    30
}

impl Default for DateGroups {
    fn default() -> Self {
        Self {
            last_week: default_last_week(),
            last_month: default_last_month(),
        }
    }
}

impl DateGroups {
    /// Buckets a modification time relative to `now`.
    ///
    /// Whole elapsed days are compared inclusively against the thresholds.
    pub fn classify(&self, modified: Option<DateTime<Local>>, now: DateTime<Local>) -> &'static str {
        let Some(modified) = modified else {
            return "Unknown";
        };
        let days = (now - modified).num_days();
        if days <= self.last_week {
            "Last_Week"
        } else if days <= self.last_month {
            "Last_Month"
        } else {
            "Older"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    ExtensionGroup,
    Extension,
    DateGroup,
    FilenamePrefix,
    Category,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "extension_group" => Some(Self::ExtensionGroup),
            "extension" => Some(Self::Extension),
            "date_group" => Some(Self::DateGroup),
            "filename_prefix" => Some(Self::FilenamePrefix),
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A destination like `Documents/{extension_group}`, parsed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                ConfigError::Invalid(format!("unclosed '{{' in destination '{raw}'"))
            })?;
            let name = &after[..close];
            let placeholder = Placeholder::parse(name).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "unknown placeholder '{{{name}}}' in destination '{raw}'"
                ))
            })?;
            segments.push(Segment::Placeholder(placeholder));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn render(&self, facts: &FileFacts, date_group: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(Placeholder::ExtensionGroup) => match &facts.extension {
                    Some(ext) => out.push_str(&ext.to_uppercase()),
                    None => out.push_str("NO_EXT"),
                },
                Segment::Placeholder(Placeholder::Extension) => match &facts.extension {
                    Some(ext) => out.push_str(&ext.to_lowercase()),
                    None => out.push_str("no_ext"),
                },
                Segment::Placeholder(Placeholder::DateGroup) => out.push_str(date_group),
                Segment::Placeholder(Placeholder::FilenamePrefix) => {
                    out.push_str(facts.stem.split('_').next().unwrap_or_default())
                }
                Segment::Placeholder(Placeholder::Category) => {
                    out.push_str(facts.category.dir_name())
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateToken {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DatePart {
    Token(DateToken),
    Literal(String),
}

/// Date-based subfolder such as `YYYY/MM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubfolderPattern {
    parts: Vec<DatePart>,
}

impl SubfolderPattern {
    const TOKENS: [(&'static str, DateToken); 5] = [
        ("YYYY", DateToken::Year),
        ("MM", DateToken::Month),
        ("DD", DateToken::Day),
        ("HH", DateToken::Hour),
        ("MI", DateToken::Minute),
    ];

    pub fn parse(raw: &str) -> Self {
        let mut parts = Vec::new();
        let mut rest = raw;

        'scan: while !rest.is_empty() {
            for (token, kind) in Self::TOKENS {
                if let Some(tail) = rest.strip_prefix(token) {
                    parts.push(DatePart::Token(kind));
                    rest = tail;
                    continue 'scan;
                }
            }
            let ch = rest.chars().next().unwrap_or_default();
            match parts.last_mut() {
                Some(DatePart::Literal(literal)) => literal.push(ch),
                _ => parts.push(DatePart::Literal(ch.to_string())),
            }
            rest = &rest[ch.len_utf8()..];
        }

        Self { parts }
    }

    pub fn render(&self, modified: Option<DateTime<Local>>) -> String {
        let Some(at) = modified else {
            return "Unknown".to_string();
        };
        self.parts
            .iter()
            .map(|part| match part {
                DatePart::Token(DateToken::Year) => format!("{:04}", at.year()),
                DatePart::Token(DateToken::Month) => format!("{:02}", at.month()),
                DatePart::Token(DateToken::Day) => format!("{:02}", at.day()),
                DatePart::Token(DateToken::Hour) => format!("{:02}", at.hour()),
                DatePart::Token(DateToken::Minute) => format!("{:02}", at.minute()),
                DatePart::Literal(literal) => literal.clone(),
            })
            .collect()
    }
}

#[derive(Debug)]
enum ExtensionSet {
    Any,
    Only(HashSet<String>),
}

/// One compiled condition: every configured predicate must hold.
#[derive(Debug)]
pub struct Condition {
    extensions: Option<ExtensionSet>,
    filename_contains: Vec<String>,
    pattern: Option<Pattern>,
    regex: Option<Regex>,
    category: Option<Category>,
    older_than_days: Option<i64>,
    newer_than_days: Option<i64>,
    destination: Template,
    subfolder: Option<SubfolderPattern>,
}

impl Condition {
    pub fn compile(rule: &str, config: &ConditionConfig) -> Result<Self, ConfigError> {
        if config.destination.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "rule '{rule}': condition is missing a destination"
            )));
        }

        let extensions = if config.extension.is_empty() {
            None
        } else if config.extension.iter().any(|e| e.trim() == "*") {
            Some(ExtensionSet::Any)
        } else {
            Some(ExtensionSet::Only(
                config
                    .extension
                    .iter()
                    .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect(),
            ))
        };

        let category = config
            .category
            .as_deref()
            .map(|name| {
                Category::from_name(name).ok_or_else(|| {
                    ConfigError::Invalid(format!("rule '{rule}': unknown category '{name}'"))
                })
            })
            .transpose()?;

        let to_days = |days: Option<u64>| days.map(|d| i64::try_from(d).unwrap_or(i64::MAX));

        let condition = Self {
            extensions,
            filename_contains: config
                .filename_contains
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            pattern: config.pattern.as_deref().map(compile_glob).transpose()?,
            regex: config.regex.as_deref().map(compile_regex).transpose()?,
            category,
            older_than_days: to_days(config.older_than_days),
            newer_than_days: to_days(config.newer_than_days),
            destination: Template::parse(&config.destination)?,
            subfolder: config
                .subfolder_pattern
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(SubfolderPattern::parse),
        };

        if !condition.has_predicate() {
            return Err(ConfigError::Invalid(format!(
                "rule '{rule}': condition for '{}' has nothing to match on",
                config.destination
            )));
        }

        Ok(condition)
    }

    fn has_predicate(&self) -> bool {
        self.extensions.is_some()
            || !self.filename_contains.is_empty()
            || self.pattern.is_some()
            || self.regex.is_some()
            || self.category.is_some()
            || self.older_than_days.is_some()
            || self.newer_than_days.is_some()
    }

    pub fn matches(&self, facts: &FileFacts, now: DateTime<Local>) -> bool {
        let extension_ok = match &self.extensions {
            None | Some(ExtensionSet::Any) => true,
            Some(ExtensionSet::Only(set)) => facts
                .extension
                .as_ref()
                .is_some_and(|ext| set.contains(&ext.to_lowercase())),
        };
        if !extension_ok {
            return false;
        }

        if !self.filename_contains.is_empty() {
            let name = facts.name.to_lowercase();
            if !self.filename_contains.iter().any(|needle| name.contains(needle)) {
                return false;
            }
        }

        if let Some(pattern) = &self.pattern
            && !pattern.matches(&facts.name)
        {
            return false;
        }

        if let Some(regex) = &self.regex
            && !regex.is_match(&facts.name)
        {
            return false;
        }

        if let Some(category) = self.category
            && facts.category != category
        {
            return false;
        }

        if self.older_than_days.is_some() || self.newer_than_days.is_some() {
            let Some(modified) = facts.modified else {
                return false;
            };
            let age = (now - modified).num_days();
            if self.older_than_days.is_some_and(|days| age <= days) {
                return false;
            }
            if self.newer_than_days.is_some_and(|days| age >= days) {
                return false;
            }
        }

        true
    }

    fn destination_dir(&self, facts: &FileFacts, date_group: &str) -> PathBuf {
        let mut dir = PathBuf::from(self.destination.render(facts, date_group));
        if let Some(subfolder) = &self.subfolder {
            dir.push(subfolder.render(facts.modified));
        }
        dir
    }
}

#[derive(Debug)]
pub struct Rule {
    pub name: String,
    conditions: Vec<Condition>,
}

impl Rule {
    pub fn compile(index: usize, config: &RuleConfig) -> Result<Self, ConfigError> {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("rule #{}", index + 1));

        if config.conditions.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "rule '{name}' has no conditions"
            )));
        }

        let conditions = config
            .conditions
            .iter()
            .map(|condition| Condition::compile(&name, condition))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { name, conditions })
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }
}

/// The rule that claimed a file and the directory it points at.
///
/// `directory` is not yet resolved against the target directory; absolute
/// destinations stay absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule: String,
    pub directory: PathBuf,
}

/// Label reported for files claimed by the `unmatched` fallback.
pub const UNMATCHED_RULE: &str = "unmatched";

#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
    unmatched: Option<Template>,
    date_groups: DateGroups,
}

impl RuleSet {
    pub fn compile(
        rules: &[RuleConfig],
        unmatched: Option<&str>,
        date_groups: DateGroups,
    ) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| Rule::compile(index, rule))
            .collect::<Result<Vec<_>, _>>()?;

        let unmatched = unmatched
            .filter(|raw| !raw.trim().is_empty())
            .map(Template::parse)
            .transpose()?;

        Ok(Self {
            rules,
            unmatched,
            date_groups,
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Picks the single destination for a file, or `None` when no rule
    /// matches and no `unmatched` fallback is configured.
    pub fn first_match(&self, facts: &FileFacts, now: DateTime<Local>) -> Option<RuleMatch> {
        let date_group = self.date_groups.classify(facts.modified, now);

        for rule in &self.rules {
            if let Some(condition) = rule.conditions.iter().find(|c| c.matches(facts, now)) {
                return Some(RuleMatch {
                    rule: rule.name.clone(),
                    directory: condition.destination_dir(facts, date_group),
                });
            }
        }

        self.unmatched.as_ref().map(|template| RuleMatch {
            rule: UNMATCHED_RULE.to_string(),
            directory: PathBuf::from(template.render(facts, date_group)),
        })
    }
}
