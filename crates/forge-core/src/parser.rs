//! Response parser
//!
//! Turns free-form generator text into a [`ParsedGeneration`]. Generator output
//! is unreliable: fences go missing, streams get cut off mid-document and JSON
//! file maps are sometimes malformed. Extraction is an ordered list of
//! independent attempts and the first one that yields code wins:
//!
//! 1. `**FILE_TREE**` marker followed by a fenced JSON object (multi-file)
//! 2. fenced block introduced by a `FRONTEND_CODE:` or `**CODE**` label
//! 3. first closed fenced markup/script block anywhere in the text
//! 4. an opening fence with no closing fence (truncated stream)
//!
//! Nothing in here returns an error. Text without recoverable code becomes
//! an explanation-only result.

use forge_types::{Archetype, Extraction, FileTree, GeneratedCode, ParsedGeneration};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static EXPLANATION_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\*\*EXPLANATION\*\*\s*(.*?)(?:\*\*CODE\*\*|FRONTEND_CODE:|\*\*FILE_TREE\*\*|FILE_TREE:|```|\z)")
        .expect("valid explanation regex")
});

static FILE_TREE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\*\*FILE_TREE\*\*|FILE_TREE:").expect("valid marker regex"));

static CODE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)FRONTEND_CODE:|\*\*CODE\*\*").expect("valid label regex"));

static CLOSED_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+#.-]*)[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
});

static OPEN_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```([A-Za-z0-9_+#.-]*)[ \t]*\r?\n?").expect("valid open fence regex")
});

/// Fence tags accepted as a previewable single-file document
const MARKUP_TAGS: &[&str] = &[
    "", "html", "htm", "xhtml", "svg", "javascript", "js", "jsx", "typescript", "ts", "tsx",
    "css", "vue",
];

/// Closing sequence appended to truncated markup documents
const HTML_BODY_CLOSE: &str = "</body>";
const HTML_CLOSE: &str = "</html>";

type Attempt = fn(&str) -> Option<GeneratedCode>;

/// Extraction attempts in priority order
const ATTEMPTS: &[(Extraction, Attempt)] = &[
    (Extraction::FileMap, extract_file_map),
    (Extraction::LabeledBlock, extract_labeled_block),
    (Extraction::FencedBlock, extract_fenced_block),
    (Extraction::TruncatedBlock, extract_truncated_block),
];

/// Parser for generator responses
#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    allow_file_map: bool,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    /// Parser that tries every extraction attempt
    pub fn new() -> Self {
        Self {
            allow_file_map: true,
        }
    }

    /// Parser for a request of the given archetype.
    ///
    /// Single-file archetypes never produce a file tree, so the file-map
    /// attempt is skipped for them.
    pub fn for_archetype(archetype: Archetype) -> Self {
        Self {
            allow_file_map: archetype.is_multi_file(),
        }
    }

    pub fn parse(&self, text: &str) -> ParsedGeneration {
        for (extraction, attempt) in ATTEMPTS {
            if *extraction == Extraction::FileMap && !self.allow_file_map {
                continue;
            }
            if let Some(code) = attempt(text) {
                debug!("Extracted generator output via {:?}", extraction);
                return ParsedGeneration {
                    explanation: explanation(text),
                    code,
                    extraction: *extraction,
                };
            }
        }

        debug!("No code found in generator output ({} bytes)", text.len());
        ParsedGeneration::explanation_only(text)
    }
}

/// Parse with every attempt enabled
pub fn parse_response(text: &str) -> ParsedGeneration {
    ResponseParser::new().parse(text)
}

/// Explanation text: the `**EXPLANATION**` section when present, otherwise
/// everything before the first code or file marker.
fn explanation(text: &str) -> String {
    if let Some(caps) = EXPLANATION_SECTION.captures(text) {
        if let Some(section) = caps.get(1) {
            return section.as_str().trim().to_string();
        }
    }

    let first_marker = [
        FILE_TREE_MARKER.find(text).map(|m| m.start()),
        CODE_LABEL.find(text).map(|m| m.start()),
        text.find("```"),
    ]
    .into_iter()
    .flatten()
    .min()
    .unwrap_or(text.len());

    text[..first_marker].trim().to_string()
}

fn is_markup_tag(tag: &str) -> bool {
    MARKUP_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

fn language_for_tag(tag: &str) -> String {
    match tag.to_ascii_lowercase().as_str() {
        "" | "html" | "htm" | "xhtml" => "html".to_string(),
        "js" | "javascript" => "javascript".to_string(),
        "ts" | "typescript" => "typescript".to_string(),
        other => other.to_string(),
    }
}

fn extract_file_map(text: &str) -> Option<GeneratedCode> {
    let marker = FILE_TREE_MARKER.find(text)?;
    let rest = text[marker.end()..].trim_start();
    let rest = rest.strip_prefix("```")?;
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);

    // Stream-decode the first JSON value so fences inside file contents do
    // not cut the object short.
    let mut values = serde_json::Deserializer::from_str(rest).into_iter::<serde_json::Value>();
    let value = match values.next() {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            warn!("Failed to parse file tree JSON, falling back to single file: {}", e);
            return None;
        }
        None => {
            warn!("File tree marker present but no JSON followed");
            return None;
        }
    };

    let object = match value {
        serde_json::Value::Object(object) => object,
        other => {
            warn!(
                "File tree JSON is not an object (found {}), falling back to single file",
                json_kind(&other)
            );
            return None;
        }
    };

    let mut files = FileTree::new();
    for (path, content) in object {
        let content = match content {
            serde_json::Value::String(s) => s,
            // Generators sometimes inline package.json and friends as objects
            other => serde_json::to_string_pretty(&other).unwrap_or_default(),
        };
        files.insert(path, content);
    }

    if files.is_empty() {
        warn!("File tree JSON contained no files");
        return None;
    }

    Some(GeneratedCode::Project { files })
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn extract_labeled_block(text: &str) -> Option<GeneratedCode> {
    for label in CODE_LABEL.find_iter(text) {
        let after = &text[label.end()..];
        let trimmed = after.trim_start();
        if !trimmed.starts_with("```") {
            continue;
        }
        let offset = label.end() + (after.len() - trimmed.len());
        if let Some(caps) = CLOSED_FENCE.captures(&text[offset..]) {
            let whole = caps.get(0)?;
            if whole.start() != 0 {
                continue;
            }
            let tag = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            if !is_markup_tag(tag) {
                continue;
            }
            let code = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            if code.is_empty() {
                continue;
            }
            return Some(GeneratedCode::SingleFile {
                code: code.to_string(),
                language: language_for_tag(tag),
            });
        }
    }
    None
}

fn extract_fenced_block(text: &str) -> Option<GeneratedCode> {
    CLOSED_FENCE.captures_iter(text).find_map(|caps| {
        let tag = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        if !is_markup_tag(tag) {
            return None;
        }
        let code = caps.get(2)?.as_str().trim();
        if code.is_empty() {
            return None;
        }
        Some(GeneratedCode::SingleFile {
            code: code.to_string(),
            language: language_for_tag(tag),
        })
    })
}

fn extract_truncated_block(text: &str) -> Option<GeneratedCode> {
    // Only meaningful when the fences do not pair up.
    if text.matches("```").count() % 2 == 0 {
        return None;
    }

    let open = OPEN_FENCE.find_iter(text).last()?;
    let caps = OPEN_FENCE.captures(&text[open.start()..])?;
    let tag = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    if !is_markup_tag(tag) {
        return None;
    }

    let mut code = text[open.end()..].trim().to_string();
    if code.is_empty() {
        return None;
    }

    warn!("Generator output is truncated, recovering {} bytes of partial code", code.len());
    if looks_like_unclosed_document(&code) {
        if !code.to_ascii_lowercase().contains(HTML_BODY_CLOSE) {
            code.push('\n');
            code.push_str(HTML_BODY_CLOSE);
        }
        code.push('\n');
        code.push_str(HTML_CLOSE);
    }

    Some(GeneratedCode::SingleFile {
        code,
        language: language_for_tag(tag),
    })
}

fn looks_like_unclosed_document(code: &str) -> bool {
    let lower = code.to_ascii_lowercase();
    lower.contains("<html") && !lower.contains(HTML_CLOSE)
}
