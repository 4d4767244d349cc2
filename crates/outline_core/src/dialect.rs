//! Dialects (configurations).
//!
//! A dialect carries the vocabulary used to prompt the model and to read its
//! answers back, the ordered branch layout of the outline, per-branch
//! descriptions and the role prompt. Every field name used when shaping a
//! request or parsing a response is resolved through [`Vocabulary`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Literal labels and field names for each abstract role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vocabulary {
    pub root: String,
    pub branch: String,
    pub section: String,
    pub subsection: String,
    #[serde(default)]
    pub leaf_content: String,
    #[serde(default)]
    pub main_structure: String,
    pub section_content_field: String,
    pub detail_field: String,
    pub title_field: String,
    pub outline_field: String,
    pub type_field: String,
    pub detail_flag_field: String,
    pub leaf_message_type: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            root: "Thinking Process".to_string(),
            branch: "Stage".to_string(),
            section: "Step".to_string(),
            subsection: "Sub-step".to_string(),
            leaf_content: "Step content".to_string(),
            main_structure: "Process design".to_string(),
            section_content_field: "content".to_string(),
            detail_field: "detail".to_string(),
            title_field: "title".to_string(),
            outline_field: "outline".to_string(),
            type_field: "type".to_string(),
            detail_flag_field: "detailFlag".to_string(),
            leaf_message_type: "sectionDetail".to_string(),
        }
    }
}

impl Vocabulary {
    /// Roles every dialect must define, in a stable order.
    pub const REQUIRED_ROLES: [&'static str; 11] = [
        "root",
        "branch",
        "section",
        "subsection",
        "sectionContentField",
        "detailField",
        "titleField",
        "outlineField",
        "typeField",
        "detailFlagField",
        "leafMessageType",
    ];

    fn role(&self, role: &str) -> Option<&str> {
        let value = match role {
            "root" => &self.root,
            "branch" => &self.branch,
            "section" => &self.section,
            "subsection" => &self.subsection,
            "sectionContentField" => &self.section_content_field,
            "detailField" => &self.detail_field,
            "titleField" => &self.title_field,
            "outlineField" => &self.outline_field,
            "typeField" => &self.type_field,
            "detailFlagField" => &self.detail_flag_field,
            "leafMessageType" => &self.leaf_message_type,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Required roles whose literal name is blank.
    pub fn missing_roles(&self) -> Vec<&'static str> {
        Self::REQUIRED_ROLES
            .iter()
            .copied()
            .filter(|role| self.role(role).map_or(true, |v| v.trim().is_empty()))
            .collect()
    }

    /// Replace blank labels (other than the root) with the defaults.
    pub fn fill_defaults(&mut self) {
        let defaults = Vocabulary::default();
        let pairs: [(&mut String, String); 12] = [
            (&mut self.branch, defaults.branch),
            (&mut self.section, defaults.section),
            (&mut self.subsection, defaults.subsection),
            (&mut self.leaf_content, defaults.leaf_content),
            (&mut self.main_structure, defaults.main_structure),
            (&mut self.section_content_field, defaults.section_content_field),
            (&mut self.detail_field, defaults.detail_field),
            (&mut self.title_field, defaults.title_field),
            (&mut self.outline_field, defaults.outline_field),
            (&mut self.type_field, defaults.type_field),
            (&mut self.detail_flag_field, defaults.detail_flag_field),
            (&mut self.leaf_message_type, defaults.leaf_message_type),
        ];
        for (slot, default) in pairs {
            if slot.trim().is_empty() {
                *slot = default;
            }
        }
    }

    /// Label used for the whole design in prompts; falls back to the root.
    pub fn design_label(&self) -> &str {
        if self.main_structure.trim().is_empty() {
            &self.root
        } else {
            &self.main_structure
        }
    }
}

/// A branch description. A list signals that the branch should be generated
/// as an array of strings rather than a single string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDescription {
    Text(String),
    List(Vec<String>),
}

impl FieldDescription {
    pub fn is_list(&self) -> bool {
        matches!(self, FieldDescription::List(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldDescription::Text(text) => text.trim().is_empty(),
            FieldDescription::List(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            FieldDescription::Text(text) => text.clone(),
            FieldDescription::List(items) => items.join("; "),
        }
    }
}

impl From<&str> for FieldDescription {
    fn from(value: &str) -> Self {
        FieldDescription::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Complex,
    Simple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DialectRepr")]
pub struct Dialect {
    pub id: String,
    pub name: String,
    pub vocabulary: Vocabulary,
    pub branch_names: Vec<String>,
    #[serde(default)]
    pub complex_branches: Vec<String>,
    #[serde(default)]
    pub field_descriptions: BTreeMap<String, FieldDescription>,
    #[serde(default)]
    pub role_prompt: String,
    #[serde(default)]
    pub is_dynamic: bool,
    #[serde(default)]
    pub is_system_config: bool,
}

impl Dialect {
    pub const DEFAULT_ID: &'static str = "default";
    pub const DYNAMIC_ID: &'static str = "dynamic";

    /// The built-in sample configuration, used when no configuration exists.
    pub fn sample() -> Self {
        let branch_names: Vec<String> = [
            "Problem Definition",
            "Information Gathering",
            "Analysis",
            "Solution Design",
            "Decision",
            "Implementation Plan",
            "Review",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let complex_branches: Vec<String> = ["Problem Definition", "Analysis", "Decision"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut field_descriptions = BTreeMap::new();
        for (key, text) in [
            ("Problem Definition", "State the problem precisely: background, scope and the goal to reach, framed from what you control yourself."),
            ("Information Gathering", "Collect the qualitative and quantitative information the problem depends on, given your own resources."),
            ("Analysis", "Analyse the gathered information systematically and reason out root causes and likely impact."),
            ("Solution Design", "Propose several workable solutions and weigh the strengths and weaknesses of each."),
            ("Decision", "Compare the candidate solutions, choose one and record the reasons for the choice."),
            ("Implementation Plan", "Lay out concrete actions, timeline, resources and owners for the chosen solution."),
            ("Review", "Evaluate results afterwards and capture what worked and what to improve next time."),
            ("Step", "A main step of the thinking process"),
            ("Sub-step", "A concrete sub-step inside a main step"),
            ("Step content", "Detailed description of the step"),
            ("detailFlag", "Whether detailed content should be generated for this step"),
        ] {
            field_descriptions.insert(key.to_string(), FieldDescription::from(text));
        }

        Self {
            id: Self::DEFAULT_ID.to_string(),
            name: "Sample configuration".to_string(),
            vocabulary: Vocabulary::default(),
            branch_names,
            complex_branches,
            field_descriptions,
            role_prompt: "You are an expert in designing structured thinking processes. \
                Produce clear, logically ordered steps with concrete goals and expected outcomes, \
                and follow the JSON structure and field names you are given exactly."
                .to_string(),
            is_dynamic: false,
            is_system_config: false,
        }
    }

    pub fn is_complex(&self, branch_name: &str) -> bool {
        self.complex_branches.iter().any(|b| b == branch_name)
    }

    pub fn branch_kind(&self, branch_name: &str) -> BranchKind {
        if self.is_complex(branch_name) {
            BranchKind::Complex
        } else {
            BranchKind::Simple
        }
    }

    pub fn description(&self, key: &str) -> Option<&FieldDescription> {
        self.field_descriptions.get(key)
    }

    pub fn description_text(&self, key: &str) -> String {
        self.description(key)
            .map(FieldDescription::as_text)
            .unwrap_or_default()
    }

    /// Whether a simple branch should be produced as a list of strings.
    pub fn wants_list(&self, branch_name: &str) -> bool {
        self.description(branch_name)
            .map(FieldDescription::is_list)
            .unwrap_or(false)
    }

    /// Structural checks shared by authored and generated dialects.
    pub fn validate(&self) -> Result<()> {
        let missing = self.vocabulary.missing_roles();
        if !missing.is_empty() {
            return Err(CoreError::Validation(format!(
                "vocabulary is missing roles: {}",
                missing.join(", ")
            )));
        }

        if self.branch_names.is_empty() {
            return Err(CoreError::Validation("branchNames must not be empty".to_string()));
        }

        for (idx, name) in self.branch_names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(CoreError::Validation(format!("branch {} has an empty name", idx + 1)));
            }
            if self.branch_names[..idx].contains(name) {
                return Err(CoreError::Validation(format!("branch \"{name}\" is listed twice")));
            }
        }

        for complex in &self.complex_branches {
            if !self.branch_names.contains(complex) {
                return Err(CoreError::Validation(format!(
                    "complex branch \"{complex}\" is not one of branchNames"
                )));
            }
        }

        Ok(())
    }

    /// Ensure every branch has a description, moving numerically labelled
    /// descriptions (`Step 3`, `3`, ...) onto the branch name when the model
    /// keyed them by position instead of by name.
    pub fn repair_descriptions(&mut self) -> Result<()> {
        for (idx, name) in self.branch_names.clone().iter().enumerate() {
            if self
                .field_descriptions
                .get(name)
                .map_or(false, |d| !d.is_empty())
            {
                continue;
            }

            let ordinal = idx + 1;
            let candidates = [
                format!("{} {}", self.vocabulary.section, ordinal),
                format!("{}{}", self.vocabulary.section, ordinal),
                format!("Step {ordinal}"),
                format!("Step{ordinal}"),
                format!("步骤{ordinal}"),
                ordinal.to_string(),
            ];

            let found = candidates
                .iter()
                .find(|key| self.field_descriptions.contains_key(key.as_str()))
                .cloned();

            match found.and_then(|key| self.field_descriptions.remove(&key)) {
                Some(description) => {
                    log::debug!("Recovered description for \"{}\" from positional label", name);
                    self.field_descriptions.insert(name.clone(), description);
                }
                None => {
                    return Err(CoreError::Validation(format!(
                        "missing description for branch \"{name}\""
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::sample()
    }
}

// --- Deserialization: current layout and the legacy `terms` layout ---

#[derive(Deserialize)]
#[serde(untagged)]
enum DialectRepr {
    Current(StoredDialect),
    Legacy(LegacyDialect),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDialect {
    id: String,
    name: String,
    vocabulary: Vocabulary,
    branch_names: Vec<String>,
    #[serde(default)]
    complex_branches: Vec<String>,
    #[serde(default)]
    field_descriptions: BTreeMap<String, FieldDescription>,
    #[serde(default)]
    role_prompt: String,
    #[serde(default)]
    is_dynamic: bool,
    #[serde(default)]
    is_system_config: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyDialect {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    terms: LegacyTerms,
    #[serde(default)]
    fixed_descriptions: BTreeMap<String, FieldDescription>,
    #[serde(default)]
    system_role_prompt: String,
    #[serde(default)]
    is_dynamic: bool,
    #[serde(default)]
    is_system_config: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTerms {
    node1: String,
    #[serde(default)]
    node2: Vec<String>,
    #[serde(default)]
    node2_complex_items: Vec<String>,
    #[serde(default)]
    node3: String,
    #[serde(default)]
    node4: String,
    #[serde(default)]
    node5: String,
    #[serde(default)]
    main_structure: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    outline: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    detail: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    detail_flag: String,
    #[serde(default)]
    section_detail_type: String,
}

impl TryFrom<DialectRepr> for Dialect {
    type Error = String;

    fn try_from(repr: DialectRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            DialectRepr::Current(stored) => Ok(Dialect {
                id: stored.id,
                name: stored.name,
                vocabulary: stored.vocabulary,
                branch_names: stored.branch_names,
                complex_branches: stored.complex_branches,
                field_descriptions: stored.field_descriptions,
                role_prompt: stored.role_prompt,
                is_dynamic: stored.is_dynamic,
                is_system_config: stored.is_system_config,
            }),
            DialectRepr::Legacy(legacy) => {
                if legacy.terms.node1.trim().is_empty() {
                    return Err("legacy configuration has an empty root term".to_string());
                }
                let terms = legacy.terms;
                let mut vocabulary = Vocabulary {
                    root: terms.node1,
                    branch: String::new(),
                    section: terms.node3,
                    subsection: terms.node4,
                    leaf_content: terms.node5,
                    main_structure: terms.main_structure,
                    section_content_field: terms.content,
                    detail_field: terms.detail,
                    title_field: terms.title,
                    outline_field: terms.outline,
                    type_field: terms.kind,
                    detail_flag_field: terms.detail_flag,
                    leaf_message_type: terms.section_detail_type,
                };
                vocabulary.fill_defaults();

                Ok(Dialect {
                    id: legacy.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    name: legacy.name.unwrap_or_else(|| vocabulary.root.clone()),
                    vocabulary,
                    branch_names: terms.node2,
                    complex_branches: terms.node2_complex_items,
                    field_descriptions: legacy.fixed_descriptions,
                    role_prompt: legacy.system_role_prompt,
                    is_dynamic: legacy.is_dynamic,
                    is_system_config: legacy.is_system_config,
                })
            }
        }
    }
}
