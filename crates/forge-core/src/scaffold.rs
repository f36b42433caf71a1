//! Scaffold generator
//!
//! Produces the manifest and config files of a project from its
//! [`ProjectConfig`] alone. Every file is a pure function of the config and
//! the project name, so two runs over equal inputs are byte-identical.

use forge_types::{Feature, FileTree, ProjectConfig, Stack};
use serde_json::{json, Map, Value};

const PACKAGE_VERSION: &str = "0.1.0";
const DEPENDENCY_VERSION: &str = "latest";

const GITIGNORE: &str = "node_modules
dist
.env
.env.local
.next
.turbo
*.log
";

const POSTCSS_CONFIG: &str = "export default {
  plugins: {
    tailwindcss: {},
    autoprefixer: {},
  },
};
";

/// Design tokens shared by every Tailwind config, resolved from CSS variables
const TAILWIND_THEME: &str = "  theme: {
    extend: {
      colors: {
        border: 'hsl(var(--border))',
        input: 'hsl(var(--input))',
        ring: 'hsl(var(--ring))',
        background: 'hsl(var(--background))',
        foreground: 'hsl(var(--foreground))',
        primary: {
          DEFAULT: 'hsl(var(--primary))',
          foreground: 'hsl(var(--primary-foreground))',
        },
        secondary: {
          DEFAULT: 'hsl(var(--secondary))',
          foreground: 'hsl(var(--secondary-foreground))',
        },
        destructive: {
          DEFAULT: 'hsl(var(--destructive))',
          foreground: 'hsl(var(--destructive-foreground))',
        },
        muted: {
          DEFAULT: 'hsl(var(--muted))',
          foreground: 'hsl(var(--muted-foreground))',
        },
        accent: {
          DEFAULT: 'hsl(var(--accent))',
          foreground: 'hsl(var(--accent-foreground))',
        },
        card: {
          DEFAULT: 'hsl(var(--card))',
          foreground: 'hsl(var(--card-foreground))',
        },
      },
      borderRadius: {
        lg: 'var(--radius)',
        md: 'calc(var(--radius) - 2px)',
        sm: 'calc(var(--radius) - 4px)',
      },
    },
  },
";

/// Generates the deterministic part of a project's files
pub struct ScaffoldGenerator<'a> {
    config: &'a ProjectConfig,
    name: String,
}

impl<'a> ScaffoldGenerator<'a> {
    /// Create a generator named after the archetype ("react-vite" -> "React Vite")
    pub fn new(config: &'a ProjectConfig) -> Self {
        Self {
            config,
            name: config.archetype.display_name(),
        }
    }

    /// Override the project display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.name = name.trim().to_string();
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// npm package name: lower-cased display name, whitespace runs hyphenated
    pub fn package_name(&self) -> String {
        self.name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Generate every scaffold file
    pub fn generate(&self) -> FileTree {
        let mut tree = FileTree::new();
        let stack = self.config.archetype.stack();

        tree.insert("package.json", self.package_json());
        tree.insert("tsconfig.json", tsconfig(stack));

        if self.config.is_multi_file() {
            tree.insert("tailwind.config.js", tailwind_config(stack));
            tree.insert("postcss.config.js", POSTCSS_CONFIG);
        }

        if let Some(vite) = vite_config(stack) {
            tree.insert("vite.config.ts", vite);
        }

        tree.insert(".gitignore", GITIGNORE);
        tree.insert("README.md", self.readme());

        tree
    }

    /// Script entries keyed by stack, plus schema scripts for databases
    pub fn scripts(&self) -> Vec<(&'static str, &'static str)> {
        let mut scripts = match self.config.archetype.stack() {
            Stack::ReactVite | Stack::VueVite => vec![
                ("dev", "vite"),
                ("build", "vite build"),
                ("preview", "vite preview"),
            ],
            Stack::Next => vec![
                ("dev", "next dev"),
                ("build", "next build"),
                ("start", "next start"),
                ("lint", "next lint"),
            ],
            Stack::None => Vec::new(),
        };

        if self.config.has(Feature::Database) {
            scripts.push(("db:push", "prisma db push"));
            scripts.push(("db:studio", "prisma studio"));
        }

        scripts
    }

    fn package_json(&self) -> String {
        let scripts: Map<String, Value> = self
            .scripts()
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();

        let manifest = json!({
            "name": self.package_name(),
            "private": true,
            "version": PACKAGE_VERSION,
            "type": "module",
            "scripts": scripts,
            "dependencies": version_map(&self.config.dependencies),
            "devDependencies": version_map(&self.config.dev_dependencies),
        });

        pretty(&manifest)
    }

    fn readme(&self) -> String {
        let mut readme = format!(
            "# {}\n\nA {} project.\n",
            self.name,
            self.config.archetype.display_name()
        );

        if !self.config.features.is_empty() {
            readme.push_str("\n## Features\n\n");
            for feature in &self.config.features {
                readme.push_str(&format!("- {}\n", feature));
            }
        }

        readme.push_str("\n## Getting Started\n\n```bash\nnpm install\nnpm run dev\n```\n");
        readme.push_str("\n## Build\n\n```bash\nnpm run build\n```\n");

        if self.config.has(Feature::Database) {
            readme.push_str("\n## Database\n\n```bash\nnpm run db:push\n```\n");
        }

        readme
    }
}

fn version_map(packages: &[String]) -> Map<String, Value> {
    packages
        .iter()
        .map(|p| (p.clone(), Value::String(DEPENDENCY_VERSION.to_string())))
        .collect()
}

fn pretty(value: &Value) -> String {
    // Serializing a `Value` cannot fail
    let mut text = serde_json::to_string_pretty(value).unwrap_or_default();
    text.push('\n');
    text
}

fn tsconfig(stack: Stack) -> String {
    let mut compiler_options = match json!({
        "target": "ES2020",
        "useDefineForClassFields": true,
        "lib": ["ES2020", "DOM", "DOM.Iterable"],
        "module": "ESNext",
        "skipLibCheck": true,
        "moduleResolution": "bundler",
        "allowImportingTsExtensions": true,
        "resolveJsonModule": true,
        "isolatedModules": true,
        "noEmit": true,
        "jsx": "react-jsx",
        "strict": true,
        "noUnusedLocals": true,
        "noUnusedParameters": true,
        "noFallthroughCasesInSwitch": true,
        "baseUrl": ".",
        "paths": { "@/*": ["./src/*"] }
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let config = if stack == Stack::Next {
        let overrides = [
            ("allowJs", json!(true)),
            ("incremental", json!(true)),
            ("esModuleInterop", json!(true)),
            ("jsx", json!("preserve")),
            ("plugins", json!([{ "name": "next" }])),
        ];
        for (key, value) in overrides {
            compiler_options.insert(key.to_string(), value);
        }
        json!({
            "compilerOptions": compiler_options,
            "include": ["next-env.d.ts", "**/*.ts", "**/*.tsx", ".next/types/**/*.ts"],
            "exclude": ["node_modules"]
        })
    } else {
        json!({
            "compilerOptions": compiler_options,
            "include": ["src"]
        })
    };

    pretty(&config)
}

fn tailwind_config(stack: Stack) -> String {
    let content = match stack {
        Stack::Next => "['./app/**/*.{js,ts,jsx,tsx}', './components/**/*.{js,ts,jsx,tsx}', './src/**/*.{js,ts,jsx,tsx}']",
        Stack::VueVite => "['./index.html', './src/**/*.{vue,js,ts,jsx,tsx}']",
        Stack::ReactVite | Stack::None => "['./index.html', './src/**/*.{js,ts,jsx,tsx}']",
    };

    format!(
        "/** @type {{import('tailwindcss').Config}} */\nexport default {{\n  content: {},\n{}  plugins: [],\n}};\n",
        content, TAILWIND_THEME
    )
}

fn vite_config(stack: Stack) -> Option<String> {
    let (plugin, package) = match stack {
        Stack::ReactVite => ("react", "@vitejs/plugin-react"),
        Stack::VueVite => ("vue", "@vitejs/plugin-vue"),
        Stack::Next | Stack::None => return None,
    };

    Some(format!(
        "import {{ defineConfig }} from 'vite';
import {plugin} from '{package}';
import path from 'path';

export default defineConfig({{
  plugins: [{plugin}()],
  resolve: {{
    alias: {{
      '@': path.resolve(__dirname, './src'),
    }},
  }},
}});
"
    ))
}

/// Convenience wrapper: scaffold a config under its default name
pub fn scaffold(config: &ProjectConfig) -> FileTree {
    ScaffoldGenerator::new(config).generate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use forge_types::Archetype;

    fn manifest(tree: &FileTree) -> Value {
        serde_json::from_str(tree.get("package.json").unwrap()).unwrap()
    }

    #[test]
    fn test_deterministic() {
        let config = classify("Build an e-commerce store with a database");
        assert_eq!(scaffold(&config), scaffold(&config));
    }

    #[test]
    fn test_database_scripts() {
        let config = classify("Build an e-commerce store with a database");
        let pkg = manifest(&scaffold(&config));
        assert_eq!(pkg["scripts"]["db:push"], "prisma db push");
        assert_eq!(pkg["scripts"]["db:studio"], "prisma studio");
        assert_eq!(pkg["scripts"]["dev"], "vite");
        assert_eq!(pkg["dependencies"]["@prisma/client"], "latest");
    }

    #[test]
    fn test_next_scripts_and_tsconfig() {
        let config = classify("A fullstack notes app");
        assert_eq!(config.archetype, Archetype::NextApp);
        let tree = scaffold(&config);
        let pkg = manifest(&tree);
        let scripts: Vec<&String> = pkg["scripts"].as_object().unwrap().keys().collect();
        assert_eq!(scripts, vec!["dev", "build", "start", "lint"]);

        let ts: Value = serde_json::from_str(tree.get("tsconfig.json").unwrap()).unwrap();
        assert_eq!(ts["compilerOptions"]["jsx"], "preserve");
        assert_eq!(ts["compilerOptions"]["plugins"][0]["name"], "next");
        assert!(!tree.contains("vite.config.ts"));
    }

    #[test]
    fn test_vite_variants() {
        let react = scaffold(&classify("A todo app"));
        assert!(react.get("vite.config.ts").unwrap().contains("@vitejs/plugin-react"));
        let ts: Value = serde_json::from_str(react.get("tsconfig.json").unwrap()).unwrap();
        assert_eq!(ts["include"][0], "src");

        let vue = scaffold(&classify("A todo app in vue"));
        assert!(vue.get("vite.config.ts").unwrap().contains("plugins: [vue()]"));
        assert!(vue.get("tailwind.config.js").unwrap().contains("{vue,js,ts,jsx,tsx}"));
    }

    #[test]
    fn test_single_file_scaffold() {
        let tree = scaffold(&classify("a simple clock"));
        assert!(tree.contains("package.json"));
        assert!(!tree.contains("tailwind.config.js"));
        assert!(!tree.contains("vite.config.ts"));
        let pkg = manifest(&tree);
        assert!(pkg["scripts"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_names() {
        let config = classify("A todo app");
        let generator = ScaffoldGenerator::new(&config);
        assert_eq!(generator.name(), "React Vite");
        assert_eq!(generator.package_name(), "react-vite");

        let named = ScaffoldGenerator::new(&config).with_name("My  Cool App");
        assert_eq!(named.package_name(), "my-cool-app");
        let tree = named.generate();
        assert!(tree.get("README.md").unwrap().starts_with("# My  Cool App"));
        let pkg = manifest(&tree);
        assert_eq!(pkg["name"], "my-cool-app");
        assert_eq!(pkg["private"], true);
        assert_eq!(pkg["type"], "module");
    }

    #[test]
    fn test_manifest_key_order() {
        let text = scaffold(&classify("A todo app")).get("package.json").unwrap().to_string();
        let name = text.find("\"name\"").unwrap();
        let scripts = text.find("\"scripts\"").unwrap();
        let dev_deps = text.find("\"devDependencies\"").unwrap();
        assert!(name < scripts && scripts < dev_deps);
    }
}
