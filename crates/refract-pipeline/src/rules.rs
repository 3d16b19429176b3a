//! Matchers built from a declarative rules file

use crate::matcher::Matcher;
use crate::pipeline::{PipelineBuilder, ResponsePipeline};
use crate::transform::ReplaceText;
use http::header::HeaderName;
use http::{Method, StatusCode};
use refract_config::{ConditionConfig, JsonOperation, RuleConfig, RulesFile};
use refract_core::{Error, RequestHead, ResponseHead, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Compiled form of a rule's `when` block
#[derive(Debug)]
struct RuleCondition {
    path: Option<String>,
    path_prefix: Option<String>,
    path_regex: Option<Regex>,
    method: Option<Method>,
    status: Option<StatusCode>,
    header: Option<(HeaderName, Option<String>)>,
}

impl RuleCondition {
    fn compile(name: &str, config: &ConditionConfig) -> Result<Self> {
        let path_regex = config
            .path_regex
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::configuration(name, format!("invalid path_regex: {e}")))?;

        let method = config
            .method
            .as_deref()
            .map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()))
            .transpose()
            .map_err(|e| Error::configuration(name, format!("invalid method: {e}")))?;

        let status = config
            .status
            .map(StatusCode::from_u16)
            .transpose()
            .map_err(|e| Error::configuration(name, format!("invalid status: {e}")))?;

        let header = config
            .header
            .as_ref()
            .map(|h| {
                HeaderName::from_bytes(h.name.as_bytes()).map(|header| (header, h.contains.clone()))
            })
            .transpose()
            .map_err(|e| Error::configuration(name, format!("invalid header name: {e}")))?;

        Ok(Self {
            path: config.path.clone(),
            path_prefix: config.path_prefix.clone(),
            path_regex,
            method,
            status,
            header,
        })
    }

    fn matches(&self, response: &ResponseHead, request: &RequestHead) -> bool {
        let path = request.path();

        if self.path.as_deref().is_some_and(|p| p != path) {
            return false;
        }
        if self
            .path_prefix
            .as_deref()
            .is_some_and(|prefix| !path.starts_with(prefix))
        {
            return false;
        }
        if self.path_regex.as_ref().is_some_and(|re| !re.is_match(path)) {
            return false;
        }
        if self.method.as_ref().is_some_and(|m| *m != request.method) {
            return false;
        }
        if self.status.is_some_and(|s| s != response.status) {
            return false;
        }

        match &self.header {
            None => true,
            Some((name, contains)) => match response.headers.get(name) {
                None => false,
                Some(value) => contains.as_deref().map_or(true, |needle| {
                    value.to_str().is_ok_and(|value| value.contains(needle))
                }),
            },
        }
    }
}

impl Matcher {
    /// Build a matcher from a configured rule
    ///
    /// `replace` entries become a [`ReplaceText`] stream transform and `json`
    /// operations a body transform. Fails when the rule has neither or when a
    /// condition does not compile.
    pub fn from_rule(rule: &RuleConfig, index: usize) -> Result<Self> {
        let name = rule.display_name(index);
        let mut matcher = Matcher::new().with_name(name.clone());

        if let Some(when) = &rule.when {
            let condition = RuleCondition::compile(&name, when)?;
            matcher = matcher.when(move |res, req| condition.matches(res, req));
        }

        if !rule.replace.is_empty() {
            let pairs = rule
                .replace
                .iter()
                .map(|r| (r.from.clone(), r.to.clone()));
            matcher = matcher.with_stream_transform(ReplaceText::new(name.clone(), pairs));
        }

        if !rule.json.is_empty() {
            let operations: Arc<[JsonOperation]> = rule.json.clone().into();
            matcher = matcher.with_body_transform(move |body| apply_json(&body, &operations));
        }

        if !matcher.has_transform() {
            return Err(Error::configuration(name, "rule needs `replace` or `json`"));
        }

        Ok(matcher)
    }
}

impl PipelineBuilder {
    /// Builder preloaded with a rules file's settings and matchers
    pub fn from_rules(file: &RulesFile) -> Result<Self> {
        refract_config::validate_config(file)?;

        let matchers = file
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| Matcher::from_rule(rule, index))
            .collect::<Result<Vec<_>>>()?;

        Ok(PipelineBuilder::new()
            .config(file.pipeline.clone())
            .matchers(matchers))
    }
}

impl ResponsePipeline {
    /// Build a pipeline from a rules file with the default observer
    pub fn from_rules(file: &RulesFile) -> Result<Self> {
        PipelineBuilder::from_rules(file)?.build()
    }
}

/// Apply JSON operations to a JSON document, in order
///
/// Operations whose target is missing are skipped; key order is kept.
pub fn apply_json(body: &str, operations: &[JsonOperation]) -> anyhow::Result<String> {
    let mut root: Value = serde_json::from_str(body)?;

    for operation in operations {
        match operation {
            JsonOperation::Set { path, value } => set(&mut root, path, value.clone(), true)?,
            JsonOperation::Add { path, value } => {
                if lookup_mut(&mut root, &segments(path)).is_none() {
                    set(&mut root, path, value.clone(), true)?;
                }
            }
            JsonOperation::Replace { path, value } => {
                if let Some(target) = lookup_mut(&mut root, &segments(path)) {
                    *target = value.clone();
                }
            }
            JsonOperation::Remove { path } => {
                take(&mut root, path);
            }
            JsonOperation::Rename { from, to } => rename(&mut root, from, to)?,
        }
    }

    Ok(serde_json::to_string(&root)?)
}

/// Split `$.a.b` or `a.b` into `["a", "b"]`
fn segments(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('$').unwrap_or(path);
    path.split('.').filter(|s| !s.is_empty()).collect()
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

fn lookup_mut<'a>(root: &'a mut Value, segments: &[&str]) -> Option<&'a mut Value> {
    segments
        .iter()
        .try_fold(root, |value, segment| child_mut(value, segment))
}

fn set(root: &mut Value, path: &str, value: Value, create: bool) -> anyhow::Result<()> {
    let segments = segments(path);
    let Some((key, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut parent = root;
    for segment in parents {
        if create {
            if let Value::Object(map) = parent {
                if !map.contains_key(*segment) {
                    map.insert((*segment).to_string(), Value::Object(Map::new()));
                }
            }
        }
        parent = child_mut(parent, segment)
            .ok_or_else(|| anyhow::anyhow!("cannot set `{path}`: `{segment}` not found"))?;
    }

    match parent {
        Value::Object(map) => {
            map.insert((*key).to_string(), value);
        }
        Value::Array(items) => match key.parse::<usize>() {
            Ok(i) if i < items.len() => items[i] = value,
            Ok(i) if i == items.len() => items.push(value),
            _ => anyhow::bail!("cannot set `{path}`: index `{key}` out of range"),
        },
        _ => anyhow::bail!("cannot set `{path}`: parent is not an object or array"),
    }
    Ok(())
}

/// Remove and return the value at `path`, keeping sibling order
fn take(root: &mut Value, path: &str) -> Option<Value> {
    let segments = segments(path);
    let (key, parents) = segments.split_last()?;

    match lookup_mut(root, parents)? {
        Value::Object(map) => {
            let value = map.get(*key).cloned()?;
            *map = std::mem::take(map)
                .into_iter()
                .filter(|(k, _)| k != key)
                .collect();
            Some(value)
        }
        Value::Array(items) => {
            let i = key.parse::<usize>().ok().filter(|i| *i < items.len())?;
            Some(items.remove(i))
        }
        _ => None,
    }
}

fn rename(root: &mut Value, from: &str, to: &str) -> anyhow::Result<()> {
    let from_segments = segments(from);
    let to_segments = segments(to);
    if from_segments == to_segments {
        return Ok(());
    }

    // Same parent object: rename in place so the key keeps its position.
    if let (Some((from_key, from_parent)), Some((to_key, to_parent))) =
        (from_segments.split_last(), to_segments.split_last())
    {
        if from_parent == to_parent {
            if let Some(Value::Object(map)) = lookup_mut(root, from_parent) {
                if map.contains_key(*from_key) {
                    *map = std::mem::take(map)
                        .into_iter()
                        .filter(|(k, _)| k != to_key)
                        .map(|(k, v)| {
                            if k == *from_key {
                                ((*to_key).to_string(), v)
                            } else {
                                (k, v)
                            }
                        })
                        .collect();
                }
                return Ok(());
            }
        }
    }

    if let Some(value) = take(root, from) {
        set(root, to, value, true)?;
    }
    Ok(())
}
