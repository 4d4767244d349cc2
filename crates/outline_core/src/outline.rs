//! The outline tree ("main structure").
//!
//! The model answers with JSON keyed by the dialect's vocabulary. That JSON is
//! parsed into a typed tree here, with the branch shape decided by the
//! dialect's complex-branch table rather than by what the JSON happens to
//! contain.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::dialect::{BranchKind, Dialect, Vocabulary};
use crate::error::{CoreError, Result};

/// Keys the dynamic outline transformation may attach next to the root.
const BOOKKEEPING_KEYS: [&str; 2] = ["nodeOrder", "version"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub title: String,
    pub content: Vec<String>,
    #[serde(default = "default_detail_flag")]
    pub detail_flag: bool,
}

fn default_detail_flag() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum BranchValue {
    SimpleValue(String),
    SimpleList(Vec<String>),
    ComplexSections(Vec<Section>),
}

impl BranchValue {
    pub fn kind(&self) -> BranchKind {
        match self {
            BranchValue::ComplexSections(_) => BranchKind::Complex,
            _ => BranchKind::Simple,
        }
    }

    /// Plain-text rendering of a simple value, used in prompts and exports.
    pub fn as_text(&self) -> String {
        match self {
            BranchValue::SimpleValue(text) => text.clone(),
            BranchValue::SimpleList(items) => items.join("\n"),
            BranchValue::ComplexSections(sections) => sections
                .iter()
                .map(|s| s.title.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub value: BranchValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineTree {
    pub root: String,
    pub branches: Vec<Branch>,
}

impl OutlineTree {
    /// Parse a model answer into a tree, validating every branch against the
    /// dialect's complex-branch table.
    ///
    /// The root is located under the vocabulary's root name. When that key
    /// is missing, a lone object-valued key is taken as the root instead
    /// (dynamic dialects often rename it), and as a last resort the value
    /// itself is used when it is keyed by branch names directly.
    pub fn from_value(value: &Value, dialect: &Dialect) -> Result<Self> {
        let vocab = &dialect.vocabulary;
        let body = locate_root(value, dialect).ok_or_else(|| CoreError::ShapeMismatch {
            branch: vocab.root.clone(),
            expected: "an object keyed by branch names under the root",
        })?;

        let mut branches = Vec::with_capacity(dialect.branch_names.len());
        for name in &dialect.branch_names {
            let Some(raw) = body.get(name) else {
                log::warn!("Outline is missing branch \"{}\"", name);
                continue;
            };
            if raw.is_null() {
                log::warn!("Outline branch \"{}\" is null", name);
                continue;
            }

            let value = match dialect.branch_kind(name) {
                BranchKind::Complex => {
                    BranchValue::ComplexSections(parse_sections(name, raw, vocab)?)
                }
                BranchKind::Simple => parse_simple(name, raw, vocab)?,
            };
            branches.push(Branch {
                name: name.clone(),
                value,
            });
        }

        if branches.is_empty() {
            return Err(CoreError::ShapeMismatch {
                branch: vocab.root.clone(),
                expected: "at least one configured branch",
            });
        }

        Ok(Self {
            root: vocab.root.clone(),
            branches,
        })
    }

    /// Serialize back into vocabulary-keyed JSON, branches in tree order.
    pub fn to_value(&self, vocab: &Vocabulary) -> Value {
        let mut body = Map::new();
        for branch in &self.branches {
            let value = match &branch.value {
                BranchValue::SimpleValue(text) => Value::String(text.clone()),
                BranchValue::SimpleList(items) => json!(items),
                BranchValue::ComplexSections(sections) => Value::Array(
                    sections
                        .iter()
                        .map(|section| {
                            let mut obj = Map::new();
                            obj.insert(vocab.title_field.clone(), json!(section.title));
                            obj.insert(vocab.section_content_field.clone(), json!(section.content));
                            obj.insert(vocab.detail_flag_field.clone(), json!(section.detail_flag));
                            Value::Object(obj)
                        })
                        .collect(),
                ),
            };
            body.insert(branch.name.clone(), value);
        }

        let mut root = Map::new();
        root.insert(self.root.clone(), Value::Object(body));
        Value::Object(root)
    }

    /// Single-line JSON used inside prompts.
    pub fn compact_json(&self, vocab: &Vocabulary) -> String {
        self.to_value(vocab).to_string()
    }

    pub fn pretty_json(&self, vocab: &Vocabulary) -> String {
        serde_json::to_string_pretty(&self.to_value(vocab)).unwrap_or_default()
    }

    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn sections(&self, name: &str) -> Option<&[Section]> {
        match self.branch(name).map(|b| &b.value) {
            Some(BranchValue::ComplexSections(sections)) => Some(sections.as_slice()),
            _ => None,
        }
    }

    /// Look up a section by its 1-based ordinal.
    pub fn section_at(&self, branch_name: &str, ordinal: usize) -> Result<&Section> {
        let sections = self.sections(branch_name).ok_or_else(|| CoreError::CoordinateOutOfRange {
            branch: branch_name.to_string(),
            level: "section",
            index: ordinal,
            bound: 0,
        })?;

        if ordinal < 1 || ordinal > sections.len() {
            return Err(CoreError::CoordinateOutOfRange {
                branch: branch_name.to_string(),
                level: "section",
                index: ordinal,
                bound: sections.len(),
            });
        }
        Ok(&sections[ordinal - 1])
    }

    /// Look up a section and one of its subsection titles by 1-based ordinals.
    pub fn subsection_at(
        &self,
        branch_name: &str,
        section_ordinal: usize,
        subsection_ordinal: usize,
    ) -> Result<(&Section, &str)> {
        let section = self.section_at(branch_name, section_ordinal)?;
        if subsection_ordinal < 1 || subsection_ordinal > section.content.len() {
            return Err(CoreError::CoordinateOutOfRange {
                branch: branch_name.to_string(),
                level: "subsection",
                index: subsection_ordinal,
                bound: section.content.len(),
            });
        }
        Ok((section, section.content[subsection_ordinal - 1].as_str()))
    }

    /// Number of leaf nodes a full traversal visits.
    pub fn leaf_count(&self) -> usize {
        self.branches
            .iter()
            .map(|b| match &b.value {
                BranchValue::ComplexSections(sections) => {
                    sections.iter().map(|s| s.content.len()).sum()
                }
                _ => 1,
            })
            .sum()
    }
}

fn locate_root<'a>(value: &'a Value, dialect: &Dialect) -> Option<&'a Map<String, Value>> {
    let obj = value.as_object()?;

    if let Some(body) = obj.get(&dialect.vocabulary.root).and_then(Value::as_object) {
        return Some(body);
    }

    let candidates: Vec<&Map<String, Value>> = obj
        .iter()
        .filter(|(key, _)| !BOOKKEEPING_KEYS.contains(&key.as_str()))
        .filter_map(|(_, v)| v.as_object())
        .collect();
    if candidates.len() == 1 && !dialect.branch_names.iter().any(|b| obj.contains_key(b)) {
        return Some(candidates[0]);
    }

    if dialect.branch_names.iter().any(|b| obj.contains_key(b)) {
        return Some(obj);
    }

    None
}

fn parse_sections(branch: &str, raw: &Value, vocab: &Vocabulary) -> Result<Vec<Section>> {
    let items: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        // A lone section object is wrapped rather than rejected.
        Value::Object(_) => vec![raw],
        _ => {
            return Err(CoreError::ShapeMismatch {
                branch: branch.to_string(),
                expected: "a list of section objects",
            })
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let obj = item.as_object().ok_or_else(|| CoreError::ShapeMismatch {
                branch: branch.to_string(),
                expected: "a list of section objects",
            })?;

            let title = obj
                .get(&vocab.title_field)
                .map(value_to_text)
                .unwrap_or_default();
            if title.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "section {} of \"{}\" has no {}",
                    idx + 1,
                    branch,
                    vocab.title_field
                )));
            }

            let content = match obj.get(&vocab.section_content_field) {
                Some(Value::Array(items)) => items.iter().map(value_to_text).collect(),
                Some(Value::String(text)) if !text.trim().is_empty() => vec![text.clone()],
                _ => Vec::new(),
            };

            let detail_flag = obj
                .get(&vocab.detail_flag_field)
                .and_then(Value::as_bool)
                .unwrap_or(true);

            Ok(Section {
                title,
                content,
                detail_flag,
            })
        })
        .collect()
}

fn parse_simple(branch: &str, raw: &Value, vocab: &Vocabulary) -> Result<BranchValue> {
    match raw {
        Value::String(text) => Ok(BranchValue::SimpleValue(text.clone())),
        Value::Array(items) => {
            if items.iter().any(Value::is_object) {
                return Err(CoreError::ShapeMismatch {
                    branch: branch.to_string(),
                    expected: "a string or a list of strings",
                });
            }
            Ok(BranchValue::SimpleList(items.iter().map(value_to_text).collect()))
        }
        Value::Object(obj) => obj
            .get(&vocab.title_field)
            .or_else(|| obj.get(&vocab.section_content_field))
            .map(|v| BranchValue::SimpleValue(value_to_text(v)))
            .ok_or_else(|| CoreError::ShapeMismatch {
                branch: branch.to_string(),
                expected: "a string or a list of strings",
            }),
        Value::Number(_) | Value::Bool(_) => Ok(BranchValue::SimpleValue(raw.to_string())),
        Value::Null => Ok(BranchValue::SimpleValue(String::new())),
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(value_to_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_dialect() -> Dialect {
        let mut dialect = Dialect::sample();
        dialect.branch_names = vec!["Research".to_string(), "Plan".to_string()];
        dialect.complex_branches = vec!["Plan".to_string()];
        dialect.vocabulary.root = "Launch".to_string();
        dialect
    }

    fn plan_json() -> Value {
        json!({
            "Launch": {
                "Research": "Interview ten customers",
                "Plan": [
                    {"title": "Prepare", "content": ["Budget", "Team"], "detailFlag": true},
                    {"title": "Execute", "content": ["Announce", "Ship"], "detailFlag": true}
                ]
            }
        })
    }

    #[test]
    fn parses_complex_and_simple_branches() {
        let tree = OutlineTree::from_value(&plan_json(), &plan_dialect()).unwrap();
        assert_eq!(tree.root, "Launch");
        assert_eq!(tree.branches.len(), 2);
        assert_eq!(
            tree.branch("Research").unwrap().value,
            BranchValue::SimpleValue("Interview ten customers".to_string())
        );
        let sections = tree.sections("Plan").unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].content, vec!["Announce", "Ship"]);
        assert_eq!(tree.leaf_count(), 5);
    }

    #[test]
    fn complex_branch_rejects_plain_string() {
        let value = json!({"Launch": {"Research": "x", "Plan": "just text"}});
        let err = OutlineTree::from_value(&value, &plan_dialect()).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { ref branch, .. } if branch == "Plan"));
    }

    #[test]
    fn simple_branch_rejects_section_objects() {
        let value = json!({
            "Launch": {
                "Research": [{"title": "a", "content": []}],
                "Plan": []
            }
        });
        let err = OutlineTree::from_value(&value, &plan_dialect()).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { ref branch, .. } if branch == "Research"));
    }

    #[test]
    fn renamed_root_is_accepted() {
        let value = json!({
            "Product launch": {
                "Research": ["Survey", "Interviews"],
                "Plan": {"title": "Only", "content": ["One"]}
            },
            "version": "2.0"
        });
        let tree = OutlineTree::from_value(&value, &plan_dialect()).unwrap();
        assert_eq!(tree.root, "Launch");
        assert_eq!(
            tree.branch("Research").unwrap().value,
            BranchValue::SimpleList(vec!["Survey".to_string(), "Interviews".to_string()])
        );
        let sections = tree.sections("Plan").unwrap();
        assert_eq!(sections.len(), 1);
        assert!(sections[0].detail_flag);
    }

    #[test]
    fn section_without_title_is_rejected() {
        let value = json!({"Launch": {"Research": "x", "Plan": [{"content": ["a"]}]}});
        assert!(OutlineTree::from_value(&value, &plan_dialect()).is_err());
    }

    #[test]
    fn to_value_round_trips_through_parser() {
        let dialect = plan_dialect();
        let tree = OutlineTree::from_value(&plan_json(), &dialect).unwrap();
        let again = OutlineTree::from_value(&tree.to_value(&dialect.vocabulary), &dialect).unwrap();
        assert_eq!(tree, again);
    }

    #[test]
    fn subsection_lookup_checks_bounds() {
        let tree = OutlineTree::from_value(&plan_json(), &plan_dialect()).unwrap();
        let (section, title) = tree.subsection_at("Plan", 2, 1).unwrap();
        assert_eq!(section.title, "Execute");
        assert_eq!(title, "Announce");

        match tree.subsection_at("Plan", 3, 1).unwrap_err() {
            CoreError::CoordinateOutOfRange { level, index, bound, .. } => {
                assert_eq!(level, "section");
                assert_eq!(index, 3);
                assert_eq!(bound, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        match tree.subsection_at("Plan", 1, 0).unwrap_err() {
            CoreError::CoordinateOutOfRange { level, bound, .. } => {
                assert_eq!(level, "subsection");
                assert_eq!(bound, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
