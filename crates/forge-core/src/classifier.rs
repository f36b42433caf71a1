//! Project classifier
//!
//! Keyword matching over the lower-cased request text. Archetype selection is
//! first-match over a fixed priority list; feature detection is independent
//! and additive. Matching is plain substring search, so "store" also matches
//! inside "restore".

use forge_types::{Archetype, Feature, ProjectConfig, Stack};

/// Archetype rules in priority order. Single-file wording short-circuits
/// everything else.
const ARCHETYPE_RULES: &[(Archetype, &[&str])] = &[
    (Archetype::SingleFile, &["simple", "quick", "demo", "prototype"]),
    (
        Archetype::Ecommerce,
        &["shop", "store", "ecommerce", "e-commerce", "product"],
    ),
    (Archetype::Dashboard, &["dashboard", "admin", "saas", "analytics"]),
    (Archetype::Blog, &["blog", "article", "post", "cms"]),
    (
        Archetype::Landing,
        &["landing", "marketing", "portfolio", "website"],
    ),
    (
        Archetype::NextApp,
        &["nextjs", "next.js", "full-stack", "fullstack"],
    ),
    (Archetype::Vue, &["vue"]),
];

const DEFAULT_ARCHETYPE: Archetype = Archetype::ReactVite;

const FEATURE_RULES: &[(Feature, &[&str])] = &[
    (Feature::Authentication, &["auth", "login", "signup", "sign up"]),
    (Feature::Database, &["database", "db", "prisma", "storage"]),
    (Feature::Backend, &["api", "backend", "server"]),
    (Feature::Charts, &["chart", "graph", "visualization"]),
    (Feature::Forms, &["form", "contact"]),
    (Feature::Animations, &["animation", "motion"]),
];

/// Utility packages every multi-file project gets
const COMMON_DEPENDENCIES: &[&str] = &["lucide-react", "clsx", "tailwind-merge"];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Pick the archetype for a request
pub fn detect_archetype(request: &str) -> Archetype {
    let text = request.to_lowercase();
    ARCHETYPE_RULES
        .iter()
        .find(|(_, keywords)| contains_any(&text, keywords))
        .map(|(archetype, _)| *archetype)
        .unwrap_or(DEFAULT_ARCHETYPE)
}

/// Detect feature flags in a request, in detection order.
///
/// A database always implies a backend.
pub fn detect_features(request: &str) -> Vec<Feature> {
    let text = request.to_lowercase();
    let mut features = Vec::new();
    for (feature, keywords) in FEATURE_RULES {
        let implied = *feature == Feature::Backend && features.contains(&Feature::Database);
        if implied || contains_any(&text, keywords) {
            features.push(*feature);
        }
    }
    features
}

/// Runtime packages for an archetype and feature set, first-seen order
pub fn dependencies_for(archetype: Archetype, features: &[Feature]) -> Vec<String> {
    let mut deps: Vec<&str> = match archetype.stack() {
        Stack::None => Vec::new(),
        Stack::ReactVite => vec!["react", "react-dom"],
        Stack::Next => vec!["next", "react", "react-dom"],
        Stack::VueVite => vec!["vue", "vue-router", "pinia"],
    };

    if archetype.is_multi_file() {
        deps.extend_from_slice(COMMON_DEPENDENCIES);
    }

    for feature in features {
        match feature {
            Feature::Authentication if archetype.stack() == Stack::Next => {
                deps.push("next-auth");
            }
            Feature::Database => deps.push("@prisma/client"),
            Feature::Charts => deps.push("recharts"),
            Feature::Forms => deps.extend_from_slice(&["react-hook-form", "zod", "@hookform/resolvers"]),
            Feature::Animations => deps.push("framer-motion"),
            _ => {}
        }
    }

    dedup(deps)
}

/// Build-time packages for an archetype's stack
pub fn dev_dependencies_for(archetype: Archetype) -> Vec<String> {
    let deps: &[&str] = match archetype.stack() {
        Stack::None => &[],
        Stack::ReactVite => &[
            "@vitejs/plugin-react",
            "vite",
            "typescript",
            "@types/react",
            "@types/react-dom",
            "tailwindcss",
            "postcss",
            "autoprefixer",
        ],
        Stack::Next => &[
            "typescript",
            "@types/node",
            "@types/react",
            "@types/react-dom",
            "tailwindcss",
            "postcss",
            "autoprefixer",
        ],
        Stack::VueVite => &[
            "@vitejs/plugin-vue",
            "vite",
            "typescript",
            "vue-tsc",
            "tailwindcss",
            "postcss",
            "autoprefixer",
        ],
    };
    dedup(deps.to_vec())
}

fn dedup(items: Vec<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Classify a request into a full [`ProjectConfig`]
pub fn classify(request: &str) -> ProjectConfig {
    let archetype = detect_archetype(request);
    let features = detect_features(request);
    let dependencies = dependencies_for(archetype, &features);
    let dev_dependencies = dev_dependencies_for(archetype);

    ProjectConfig {
        archetype,
        features,
        dependencies,
        dev_dependencies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_short_circuits() {
        assert_eq!(detect_archetype("Build a simple button"), Archetype::SingleFile);
        assert_eq!(
            detect_archetype("A simple shop for my products"),
            Archetype::SingleFile
        );
    }

    #[test]
    fn test_domain_priority() {
        assert_eq!(detect_archetype("An ADMIN dashboard"), Archetype::Dashboard);
        assert_eq!(detect_archetype("A blog with a store"), Archetype::Ecommerce);
        assert_eq!(detect_archetype("My portfolio website"), Archetype::Landing);
        assert_eq!(detect_archetype("A fullstack todo app"), Archetype::NextApp);
        assert_eq!(detect_archetype("A todo app in Vue"), Archetype::Vue);
        assert_eq!(detect_archetype("A todo app"), Archetype::ReactVite);
    }

    #[test]
    fn test_substring_false_positive_is_kept() {
        assert_eq!(
            detect_archetype("Restore my old photo album"),
            Archetype::Ecommerce
        );
    }

    #[test]
    fn test_ecommerce_with_database() {
        let config = classify("Build an e-commerce store with a database");
        assert_eq!(config.archetype, Archetype::Ecommerce);
        assert_eq!(config.features, vec![Feature::Database, Feature::Backend]);
        assert!(config.dependencies.contains(&"@prisma/client".to_string()));
        assert_eq!(config.dependencies[0], "react");
    }

    #[test]
    fn test_features_are_additive() {
        let features = detect_features("login form with animated charts and motion");
        assert_eq!(
            features,
            vec![
                Feature::Authentication,
                Feature::Charts,
                Feature::Forms,
                Feature::Animations
            ]
        );
        assert!(detect_features("a calculator").is_empty());
    }

    #[test]
    fn test_next_auth_only_for_next() {
        let next = dependencies_for(Archetype::NextApp, &[Feature::Authentication]);
        assert!(next.contains(&"next-auth".to_string()));
        let react = dependencies_for(Archetype::ReactVite, &[Feature::Authentication]);
        assert!(!react.contains(&"next-auth".to_string()));
    }

    #[test]
    fn test_single_file_has_no_packages() {
        let config = classify("quick demo of a clock");
        assert!(config.dependencies.is_empty());
        assert!(config.dev_dependencies.is_empty());
    }

    #[test]
    fn test_dependencies_unique() {
        let deps = dependencies_for(Archetype::NextApp, Feature::all());
        let mut sorted = deps.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), deps.len());
    }

    #[test]
    fn test_deterministic() {
        let request = "Analytics dashboard with charts, login and an API";
        assert_eq!(classify(request), classify(request));
    }
}
