//! Structured result of parsing generator output

use crate::file_tree::FileTree;
use serde::{Deserialize, Serialize};

/// Which extraction attempt produced the code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extraction {
    /// Marked, fenced JSON file map
    FileMap,
    /// Code block introduced by a `FRONTEND_CODE:` or `**CODE**` label
    LabeledBlock,
    /// First closed fenced block anywhere in the text
    FencedBlock,
    /// Opening fence without a closing fence
    TruncatedBlock,
    /// No code found
    Nothing,
}

/// Generated code, either a single document or a multi-file project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratedCode {
    SingleFile { code: String, language: String },
    Project { files: FileTree },
}

impl GeneratedCode {
    /// Single-file result with no code in it
    pub fn empty() -> Self {
        GeneratedCode::SingleFile {
            code: String::new(),
            language: String::new(),
        }
    }

    pub fn single_file_code(&self) -> Option<&str> {
        match self {
            GeneratedCode::SingleFile { code, .. } => Some(code),
            GeneratedCode::Project { .. } => None,
        }
    }

    pub fn file_tree(&self) -> Option<&FileTree> {
        match self {
            GeneratedCode::SingleFile { .. } => None,
            GeneratedCode::Project { files } => Some(files),
        }
    }

    pub fn language(&self) -> &str {
        match self {
            GeneratedCode::SingleFile { language, .. } => language,
            GeneratedCode::Project { .. } => "",
        }
    }

    /// True when nothing usable was generated
    pub fn is_empty(&self) -> bool {
        match self {
            GeneratedCode::SingleFile { code, .. } => code.is_empty(),
            GeneratedCode::Project { files } => files.is_empty(),
        }
    }
}

/// Parser output: explanation text plus whatever code was recovered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedGeneration {
    pub explanation: String,
    pub code: GeneratedCode,
    pub extraction: Extraction,
}

impl ParsedGeneration {
    /// Result for text with no recoverable code: the whole text is explanation
    pub fn explanation_only(text: &str) -> Self {
        Self {
            explanation: text.trim().to_string(),
            code: GeneratedCode::empty(),
            extraction: Extraction::Nothing,
        }
    }

    pub fn single_file_code(&self) -> Option<&str> {
        self.code.single_file_code()
    }

    pub fn file_tree(&self) -> Option<&FileTree> {
        self.code.file_tree()
    }

    pub fn language(&self) -> &str {
        self.code.language()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explanation_only() {
        let parsed = ParsedGeneration::explanation_only("  just words \n");
        assert_eq!(parsed.explanation, "just words");
        assert_eq!(parsed.single_file_code(), Some(""));
        assert!(parsed.file_tree().is_none());
        assert!(parsed.code.is_empty());
    }

    #[test]
    fn test_tagged_serialization() {
        let code = GeneratedCode::SingleFile {
            code: "<p>hi</p>".to_string(),
            language: "html".to_string(),
        };
        let json = serde_json::to_value(&code).unwrap();
        assert_eq!(json["kind"], "single_file");
        assert_eq!(json["language"], "html");
    }
}
