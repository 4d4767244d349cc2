//! Prompt texts and function schemas.
//!
//! Everything here is a pure function of the dialect and the stage
//! arguments; nothing touches the network or the conversation.

use outline_core::{Dialect, NodeCoordinate, OutlineTree, Vocabulary};
use outline_llm::{CompletionRequest, FunctionSpec};
use serde_json::{json, Map, Value};

pub const OUTLINE_FUNCTION: &str = "generate_main_structure";
pub const DETAIL_FUNCTION: &str = "generate_detail";
pub const DYNAMIC_CONFIG_FUNCTION: &str = "generate_dynamic_config";

/// Which leaf a detail prompt is about.
#[derive(Debug, Clone, Copy)]
pub enum DetailNode<'a> {
    Subsection {
        section_title: &'a str,
        subsection_title: &'a str,
        /// Sibling digest, empty when no sibling has been written yet.
        digest: &'a str,
    },
    Simple {
        content: &'a str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct DetailTarget<'a> {
    pub tree: &'a OutlineTree,
    pub coordinate: &'a NodeCoordinate,
    pub node: DetailNode<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum PromptStage<'a> {
    NewOutline {
        request: &'a str,
    },
    AdjustOutline {
        tree: &'a OutlineTree,
        feedback: &'a str,
    },
    NewDetail(DetailTarget<'a>),
    AdjustDetail {
        target: DetailTarget<'a>,
        current: &'a str,
        feedback: &'a str,
    },
}

/// A ready-to-send prompt: role prompt, user text and the answer schema.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub text: String,
    pub schema: FunctionSpec,
    pub content_field: String,
}

impl Prompt {
    pub fn into_request(self) -> CompletionRequest {
        CompletionRequest::new(self.system, self.text)
            .with_function(self.schema)
            .with_content_field(self.content_field)
    }
}

pub fn build_prompt(dialect: &Dialect, stage: PromptStage<'_>) -> Prompt {
    let vocab = &dialect.vocabulary;
    let (text, schema) = match stage {
        PromptStage::NewOutline { request } => (new_outline_text(dialect, request), outline_schema(dialect)),
        PromptStage::AdjustOutline { tree, feedback } => (
            adjust_outline_text(vocab, tree, feedback),
            outline_schema(dialect),
        ),
        PromptStage::NewDetail(target) => (new_detail_text(vocab, &target), detail_schema(dialect)),
        PromptStage::AdjustDetail {
            target,
            current,
            feedback,
        } => (
            adjust_detail_text(vocab, &target, current, feedback),
            detail_schema(dialect),
        ),
    };

    Prompt {
        system: dialect.role_prompt.clone(),
        text,
        schema,
        content_field: vocab.section_content_field.clone(),
    }
}

fn new_outline_text(dialect: &Dialect, request: &str) -> String {
    let v = &dialect.vocabulary;
    let complex = if dialect.complex_branches.is_empty() {
        "none".to_string()
    } else {
        dialect.complex_branches.join(", ")
    };
    format!(
        "# Design request\n\
         Design a complete \"{root}\" for \"{request}\".\n\n\
         # Design requirements\n\
         1. Structural integrity\n\
         - Every \"{branch}\" must be mutually exclusive and collectively exhaustive.\n\
         - Keep a clear logical progression between levels.\n\
         - Order each {branch} chronologically or by logical progression.\n\n\
         2. Content\n\
         - For the complex {branch} entries ({complex}), provide 3-5 concrete \"{section}\" entries.\n\
         - Give every \"{section}\" 2-4 key \"{subsection}\" entries.\n\
         - Keep the content actionable and practical.\n\n\
         Answer strictly in JSON.",
        root = v.root,
        request = request.trim(),
        branch = v.branch,
        section = v.section,
        subsection = v.subsection,
        complex = complex,
    )
}

fn adjust_outline_text(vocab: &Vocabulary, tree: &OutlineTree, feedback: &str) -> String {
    format!(
        "Current {root}:\n```json\n{design}\n```\n\
         Requested changes:\n{feedback}\n\
         Redesign the {root} accordingly.",
        root = vocab.root,
        design = tree.compact_json(vocab),
        feedback = feedback.trim(),
    )
}

fn digest_block(vocab: &Vocabulary, section_title: &str, digest: &str) -> String {
    if digest.trim().is_empty() {
        return String::new();
    }
    format!(
        "Other {subsection} entries already written for {section} \"{title}\":\n{digest}",
        subsection = vocab.subsection,
        section = vocab.section,
        title = section_title,
        digest = digest,
    )
}

/// The sentence naming the node being written.
fn target_line(vocab: &Vocabulary, target: &DetailTarget<'_>) -> String {
    match target.node {
        DetailNode::Subsection {
            section_title,
            subsection_title,
            ..
        } => format!(
            "Using the {design} and its {outline}, write the detailed {detail} for {subsection} {m} \"{sub_title}\" of {section} {n} \"{section_title}\" in \"{branch}\".",
            design = vocab.design_label(),
            outline = vocab.outline_field,
            detail = vocab.detail_field,
            subsection = vocab.subsection,
            m = target.coordinate.subsection_ordinal,
            sub_title = subsection_title,
            section = vocab.section,
            n = target.coordinate.section_ordinal,
            section_title = section_title,
            branch = target.coordinate.branch_name,
        ),
        DetailNode::Simple { content } => format!(
            "Write the detailed {detail} for \"{branch}\".\nCurrent content: {content}",
            detail = vocab.detail_field,
            branch = target.coordinate.branch_name,
            content = content,
        ),
    }
}

fn context_block(vocab: &Vocabulary, target: &DetailTarget<'_>) -> String {
    let mut text = format!(
        "{root} context:\n{design}\n",
        root = vocab.root,
        design = target.tree.compact_json(vocab),
    );
    if let DetailNode::Subsection {
        section_title,
        digest,
        ..
    } = target.node
    {
        let block = digest_block(vocab, section_title, digest);
        if !block.is_empty() {
            text.push_str("\n# Existing content for reference\n");
            text.push_str(&block);
            text.push('\n');
        }
    }
    text
}

fn new_detail_text(vocab: &Vocabulary, target: &DetailTarget<'_>) -> String {
    let requirements = match target.node {
        DetailNode::Subsection { .. } => format!(
            "# Requirements\n\
             1. Relevance\n\
             - Stay focused on the current \"{subsection}\".\n\
             - Do not repeat other \"{subsection}\" entries.\n\
             - Keep it coherent with the whole \"{root}\".\n\n\
             2. Structure\n\
             - Organise the main points under second-level headings.\n\
             - Give every key point 2-3 concrete steps.\n\
             - Use bullet points where they help readability.\n\n\
             3. Practicality\n\
             - Give actionable advice with measurable outcomes.\n\n\
             4. Format\n\
             - Use Markdown and escape string content properly.\n\
             - No extra explanations or comments.",
            subsection = vocab.subsection,
            root = vocab.root,
        ),
        DetailNode::Simple { .. } => "Write a more detailed description in Markdown.".to_string(),
    };

    format!(
        "{context}\n{target}\n\n{requirements}",
        context = context_block(vocab, target),
        target = target_line(vocab, target),
        requirements = requirements,
    )
}

fn adjust_detail_text(
    vocab: &Vocabulary,
    target: &DetailTarget<'_>,
    current: &str,
    feedback: &str,
) -> String {
    format!(
        "{context}\n{target}\n\n\
         # Current content\n{current}\n\n\
         # Requested changes\n{feedback}\n\n\
         # Adjustment requirements\n\
         - Keep what is valuable in the current content.\n\
         - Apply the requested changes precisely.\n\
         - Stay consistent with the whole \"{root}\" and the other nodes.\n\
         - Answer in Markdown.",
        context = context_block(vocab, target),
        target = target_line(vocab, target),
        current = current.trim(),
        feedback = feedback.trim(),
        root = vocab.root,
    )
}

/// Outline schema: complex branches are section lists, simple branches are
/// strings, or string lists when their description is a list.
pub fn outline_schema(dialect: &Dialect) -> FunctionSpec {
    let v = &dialect.vocabulary;
    let mut branches = Map::new();
    for name in &dialect.branch_names {
        let description = dialect.description_text(name);
        let schema = if dialect.is_complex(name) {
            json!({
                "type": "array",
                "description": description,
                "items": {
                    "type": "object",
                    "properties": {
                        v.title_field.as_str(): {
                            "type": "string",
                            "description": dialect.description_text(&v.section),
                        },
                        v.section_content_field.as_str(): {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": format!("{} entries of the {}", v.subsection, v.section),
                        },
                        v.detail_flag_field.as_str(): {
                            "type": "boolean",
                            "description": dialect.description_text(&v.detail_flag_field),
                        },
                    },
                    "required": [v.title_field, v.section_content_field, v.detail_flag_field],
                },
            })
        } else if dialect.wants_list(name) {
            json!({"type": "array", "items": {"type": "string"}, "description": description})
        } else {
            json!({"type": "string", "description": description})
        };
        branches.insert(name.clone(), schema);
    }

    let mut properties = Map::new();
    properties.insert(
        v.root.clone(),
        json!({
            "type": "object",
            "properties": Value::Object(branches),
            "required": dialect.branch_names,
        }),
    );

    FunctionSpec {
        name: OUTLINE_FUNCTION.to_string(),
        description: format!("Design the {} for the given request.", v.root),
        parameters: json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": [v.root],
        }),
    }
}

pub fn detail_schema(dialect: &Dialect) -> FunctionSpec {
    let v = &dialect.vocabulary;
    let mut properties = Map::new();
    properties.insert(
        "nodeIndexes".to_string(),
        json!({
            "type": "object",
            "properties": {
                "sectionOrdinal": {"type": "integer", "description": format!("Ordinal of the current {}", v.section)},
                "subsectionOrdinal": {"type": "integer", "description": format!("Ordinal of the current {}", v.subsection)},
            },
            "required": ["sectionOrdinal", "subsectionOrdinal"],
        }),
    );
    properties.insert(
        v.title_field.clone(),
        json!({"type": "string", "description": format!("{} of the current {}", v.title_field, v.subsection)}),
    );
    properties.insert(
        v.detail_field.clone(),
        json!({"type": "string", "description": dialect.description_text(&v.leaf_content)}),
    );
    properties.insert(
        v.type_field.clone(),
        json!({
            "type": "string",
            "description": format!("Message type marking {} content", v.subsection),
            "enum": [v.leaf_message_type],
        }),
    );

    FunctionSpec {
        name: DETAIL_FUNCTION.to_string(),
        description: format!(
            "Write the detailed content of one {} from the {} context.",
            v.subsection,
            v.design_label()
        ),
        parameters: json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": ["nodeIndexes", v.title_field, v.detail_field, v.type_field],
        }),
    }
}

/// Role prompt and schema for generating a dialect from a business scenario.
pub const DYNAMIC_CONFIG_SYSTEM_PROMPT: &str = "You are a process design expert. From the \
business scenario below, design the configuration of a structured thinking process. \
Define the core process and its key steps in chronological or logical order, decide which \
steps need to be expanded in detail, and consider self-management, external influences and \
time management where they apply. Answer with three parts: terms, fixedDescriptions and \
systemRolePrompt. terms.node1 is the name of the main process; terms.node2 lists at least \
three key steps; terms.node2ComplexItems picks the steps from node2 that need detailed \
expansion; keep the other terms at their defaults (node3 \"Step\", node4 \"Sub-step\", node5 \
\"Step content\", title \"title\", outline \"outline\", content \"content\", detail \"detail\", \
type \"type\", detailFlag \"detailFlag\", sectionDetailType \"sectionDetail\"). \
fixedDescriptions must describe every step of node2, keyed by the step name, as one paragraph \
covering goal, tasks, pitfalls and relations to other steps. systemRolePrompt defines the \
expert role for this specific scenario: professional identity, core duties, working methods \
and output standards.";

pub fn dynamic_config_request(scenario: &str) -> CompletionRequest {
    CompletionRequest::new(
        DYNAMIC_CONFIG_SYSTEM_PROMPT,
        format!("[Business scenario]\n{}", scenario.trim()),
    )
    .with_function(dynamic_config_schema())
    .without_normalization()
}

pub fn dynamic_config_schema() -> FunctionSpec {
    let keep_default = |label: &str| json!({"type": "string", "description": format!("{label} (keep the default)")});
    FunctionSpec {
        name: DYNAMIC_CONFIG_FUNCTION.to_string(),
        description: "Generate a configuration for the business scenario.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "terms": {
                    "type": "object",
                    "description": "Names of every node level",
                    "properties": {
                        "node1": {"type": "string", "description": "Name of the main process"},
                        "node2": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "8-12 key steps in chronological or logical order",
                        },
                        "node2ComplexItems": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Steps from node2 that need detailed expansion",
                        },
                        "node3": keep_default("Step"),
                        "node4": keep_default("Sub-step"),
                        "node5": keep_default("Step content"),
                        "mainStructure": {"type": "string", "description": "Name of the overall process design"},
                        "title": keep_default("title"),
                        "outline": keep_default("outline"),
                        "content": keep_default("content"),
                        "detail": keep_default("detail"),
                        "type": keep_default("type"),
                        "detailFlag": keep_default("detailFlag"),
                        "sectionDetailType": keep_default("sectionDetail"),
                    },
                    "required": [
                        "node1", "node2", "node2ComplexItems", "node3", "node4", "node5",
                        "mainStructure", "title", "outline", "content", "detail", "type",
                        "detailFlag", "sectionDetailType"
                    ],
                },
                "fixedDescriptions": {
                    "type": "object",
                    "description": "One paragraph per node2 step: goal, tasks, pitfalls, relations",
                    "additionalProperties": {"type": "string"},
                },
                "systemRolePrompt": {
                    "type": "string",
                    "description": "Expert role for this scenario: identity, duties, methods, output standards",
                },
            },
            "required": ["terms", "fixedDescriptions", "systemRolePrompt"],
        }),
    }
}
