//! Project archetypes, feature flags and the per-request project configuration

use serde::{Deserialize, Serialize};

/// Shape of a generated project
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Archetype {
    #[serde(rename = "single-file")]
    SingleFile,
    #[serde(rename = "react-vite")]
    ReactVite,
    #[serde(rename = "nextjs-app")]
    NextApp,
    #[serde(rename = "vue3")]
    Vue,
    #[serde(rename = "ecommerce")]
    Ecommerce,
    #[serde(rename = "dashboard")]
    Dashboard,
    #[serde(rename = "landing")]
    Landing,
    #[serde(rename = "blog")]
    Blog,
}

/// Toolchain an archetype is scaffolded on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stack {
    /// Self-contained HTML document, no toolchain
    None,
    /// React bundled by Vite
    ReactVite,
    /// Server-rendered Next.js
    Next,
    /// Vue bundled by Vite
    VueVite,
}

impl Archetype {
    /// Get all archetypes
    pub fn all() -> &'static [Archetype] {
        &[
            Archetype::SingleFile,
            Archetype::ReactVite,
            Archetype::NextApp,
            Archetype::Vue,
            Archetype::Ecommerce,
            Archetype::Dashboard,
            Archetype::Landing,
            Archetype::Blog,
        ]
    }

    /// Get the archetype name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::SingleFile => "single-file",
            Archetype::ReactVite => "react-vite",
            Archetype::NextApp => "nextjs-app",
            Archetype::Vue => "vue3",
            Archetype::Ecommerce => "ecommerce",
            Archetype::Dashboard => "dashboard",
            Archetype::Landing => "landing",
            Archetype::Blog => "blog",
        }
    }

    /// Parse an archetype from its wire name
    pub fn from_name(name: &str) -> Option<Archetype> {
        Self::all()
            .iter()
            .copied()
            .find(|a| a.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Toolchain the scaffold is built on.
    ///
    /// The domain archetypes (shop, dashboard, landing page, blog) are React
    /// apps under the hood so they get a runnable dev server.
    pub fn stack(&self) -> Stack {
        match self {
            Archetype::SingleFile => Stack::None,
            Archetype::NextApp => Stack::Next,
            Archetype::Vue => Stack::VueVite,
            Archetype::ReactVite
            | Archetype::Ecommerce
            | Archetype::Dashboard
            | Archetype::Landing
            | Archetype::Blog => Stack::ReactVite,
        }
    }

    pub fn is_multi_file(&self) -> bool {
        !matches!(self, Archetype::SingleFile)
    }

    /// Human readable project title, e.g. "react-vite" -> "React Vite"
    pub fn display_name(&self) -> String {
        self.as_str()
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional capabilities detected in a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Authentication,
    Database,
    Backend,
    Charts,
    Forms,
    Animations,
}

impl Feature {
    pub fn all() -> &'static [Feature] {
        &[
            Feature::Authentication,
            Feature::Database,
            Feature::Backend,
            Feature::Charts,
            Feature::Forms,
            Feature::Animations,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Authentication => "authentication",
            Feature::Database => "database",
            Feature::Backend => "backend",
            Feature::Charts => "charts",
            Feature::Forms => "forms",
            Feature::Animations => "animations",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration derived from one user request.
///
/// Built once by the classifier and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub archetype: Archetype,
    /// Detected features, in detection order, without duplicates
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub dev_dependencies: Vec<String>,
}

impl ProjectConfig {
    pub fn has(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_multi_file(&self) -> bool {
        self.archetype.is_multi_file()
    }
}
