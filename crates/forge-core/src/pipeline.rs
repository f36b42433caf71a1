//! One generation cycle: gate, classify, generate, parse, assemble

use crate::assembler::merge;
use crate::classifier::classify;
use crate::error::Result;
use crate::images::ImageChecker;
use crate::parser::ResponseParser;
use crate::provider::TextGenerator;
use crate::quota::UsageGate;
use crate::sample_data::SampleData;
use crate::scaffold::ScaffoldGenerator;
use forge_types::{ChatRequest, ChatResponse, GeneratedCode, ProjectConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SINGLE_FILE_PROMPT: &str = "You build small web pages. Reply with a short \
explanation under **EXPLANATION**, then the complete page under **CODE** as one \
```html fenced block. Put all CSS and JavaScript inline in that single document. \
Fill the page with the records from SAMPLE_DATA and use only its image URLs.";

const MULTI_FILE_PROMPT: &str = "You build multi-file web projects. Reply with a short \
explanation under **EXPLANATION**, then **FILE_TREE** followed by one ```json fenced \
block containing a JSON object that maps each relative file path to its full file \
content as a string. Include source files and entry points; manifest and tool config \
files are optional. Seed components with the records from SAMPLE_DATA and use only its \
image URLs.";

/// System instructions for a project configuration
pub fn system_prompt(config: &ProjectConfig) -> String {
    if !config.is_multi_file() {
        return SINGLE_FILE_PROMPT.to_string();
    }

    let mut prompt = format!(
        "{}\n\nProject type: {}.",
        MULTI_FILE_PROMPT, config.archetype
    );
    if !config.features.is_empty() {
        let features: Vec<&str> = config.features.iter().map(|f| f.as_str()).collect();
        prompt.push_str(&format!(" Features: {}.", features.join(", ")));
    }
    if !config.dependencies.is_empty() {
        prompt.push_str(&format!(
            " Available packages: {}.",
            config.dependencies.join(", ")
        ));
    }
    prompt
}

/// Runs chat requests end to end
pub struct GenerationPipeline {
    generator: Arc<dyn TextGenerator>,
    gate: Arc<dyn UsageGate>,
    images: Option<ImageChecker>,
}

impl GenerationPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, gate: Arc<dyn UsageGate>) -> Self {
        Self {
            generator,
            gate,
            images: None,
        }
    }

    /// Probe image links in single-file results
    pub fn with_image_checker(mut self, checker: ImageChecker) -> Self {
        self.images = Some(checker);
        self
    }

    /// Produce a response for one chat request.
    ///
    /// Fails only on a refused gate or a provider failure; unusable
    /// generator output becomes an explanation-only single-file response.
    /// A provider failure gives the reserved use back.
    pub async fn run(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.gate.reserve().await?;

        let config = classify(&request.message);
        info!(
            "Generating {} project (features: {:?})",
            config.archetype, config.features
        );

        let text = match self.generate(&config, request).await {
            Ok(text) => text,
            Err(e) => {
                if let Err(refund) = self.gate.release().await {
                    warn!("Failed to give back quota after a failed generation: {}", refund);
                }
                return Err(e);
            }
        };

        let parsed = ResponseParser::for_archetype(config.archetype).parse(&text);
        debug!("Parsed generator output via {:?}", parsed.extraction);

        match parsed.code {
            GeneratedCode::Project { files } => {
                let scaffold = ScaffoldGenerator::new(&config).generate();
                let file_tree = merge(&scaffold, &files);
                info!(
                    "Assembled {} files ({} generated)",
                    file_tree.len(),
                    files.len()
                );
                Ok(ChatResponse::MultiFile {
                    message: parsed.explanation,
                    file_tree,
                    project_type: config.archetype,
                    project_config: config,
                })
            }
            GeneratedCode::SingleFile { code, language } => {
                let image_validation = match &self.images {
                    Some(checker) if !code.is_empty() => {
                        let report = checker.check(&code).await;
                        (!report.is_empty()).then(|| report.summary())
                    }
                    _ => None,
                };
                let language = if language.is_empty() && !code.is_empty() {
                    "html".to_string()
                } else {
                    language
                };
                Ok(ChatResponse::SingleFile {
                    message: parsed.explanation,
                    code,
                    language,
                    image_validation,
                })
            }
        }
    }

    /// Provider call with the sample records between history and request
    async fn generate(&self, config: &ProjectConfig, request: &ChatRequest) -> Result<String> {
        let sample = SampleData::for_request(&request.message, config.archetype);
        let mut history = request.history.clone();
        history.push(sample.to_turn()?);

        self.generator
            .generate(&system_prompt(config), &history, &request.message)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;
    use crate::quota::{MemoryQuota, Unlimited};
    use async_trait::async_trait;
    use crate::sample_data::SAMPLE_DATA_MARKER;
    use forge_types::{Archetype, ChatRole, ChatTurn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct CannedGenerator {
        reply: std::result::Result<String, u16>,
        calls: AtomicUsize,
        delay: Duration,
        last_history: Mutex<Vec<ChatTurn>>,
    }

    impl CannedGenerator {
        fn new(reply: std::result::Result<String, u16>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                delay,
                last_history: Mutex::new(Vec::new()),
            })
        }

        fn ok(reply: &str) -> Arc<Self> {
            Self::new(Ok(reply.to_string()), Duration::ZERO)
        }

        fn failing(status: u16) -> Arc<Self> {
            Self::new(Err(status), Duration::ZERO)
        }

        fn last_history(&self) -> Vec<ChatTurn> {
            self.last_history.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _system: &str, history: &[ChatTurn], _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_history.lock().unwrap() = history.to_vec();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(ForgeError::Provider {
                    status: *status,
                    message: "upstream failure".to_string(),
                }),
            }
        }
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_single_file_flow() {
        let generator = CannedGenerator::ok("**EXPLANATION**\nA button.\n**CODE**\n```html\n<button>Go</button>\n```");
        let pipeline = GenerationPipeline::new(generator, Arc::new(Unlimited));
        let response = pipeline.run(&request("Build a simple button")).await.unwrap();

        match response {
            ChatResponse::SingleFile {
                message,
                code,
                language,
                image_validation,
            } => {
                assert_eq!(message, "A button.");
                assert_eq!(code, "<button>Go</button>");
                assert_eq!(language, "html");
                assert_eq!(image_validation, None);
            }
            other => panic!("expected single file, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multi_file_flow_merges_scaffold() {
        let generator = CannedGenerator::ok(
            "**EXPLANATION**\nA shop.\n**FILE_TREE**\n```json\n{\"src/App.tsx\": \"app\", \"README.md\": \"custom\"}\n```",
        );
        let pipeline = GenerationPipeline::new(generator, Arc::new(Unlimited));
        let response = pipeline
            .run(&request("Build an e-commerce store with a database"))
            .await
            .unwrap();

        match response {
            ChatResponse::MultiFile {
                file_tree,
                project_type,
                project_config,
                ..
            } => {
                assert_eq!(project_type, Archetype::Ecommerce);
                assert_eq!(file_tree.get("src/App.tsx"), Some("app"));
                assert_eq!(file_tree.get("README.md"), Some("custom"));
                assert!(file_tree.get("package.json").unwrap().contains("db:push"));
                assert!(project_config.dependencies.contains(&"@prisma/client".to_string()));
            }
            other => panic!("expected multi file, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multi_file_without_map_degrades() {
        let generator = CannedGenerator::ok("Here it is\n```html\n<div>shop</div>\n```");
        let pipeline = GenerationPipeline::new(generator, Arc::new(Unlimited));
        let response = pipeline.run(&request("An online shop")).await.unwrap();
        assert!(!response.is_multi_file());
    }

    #[tokio::test]
    async fn test_gate_refusal_skips_provider() {
        let generator = CannedGenerator::ok("```html\n<p></p>\n```");
        let gate = Arc::new(MemoryQuota::new(1));
        let pipeline = GenerationPipeline::new(generator.clone(), gate);

        pipeline.run(&request("a simple page")).await.unwrap();
        let err = pipeline.run(&request("a simple page")).await.unwrap_err();
        assert!(matches!(err, ForgeError::QuotaExceeded { limit: 1 }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_does_not_consume_quota() {
        let gate = Arc::new(MemoryQuota::new(1));
        let pipeline = GenerationPipeline::new(CannedGenerator::failing(503), gate.clone());
        let err = pipeline.run(&request("a simple page")).await.unwrap_err();
        assert!(matches!(err, ForgeError::Provider { status: 503, .. }));
        assert!(gate.is_permitted().await.unwrap());
        assert_eq!(gate.status().await.unwrap().unwrap().used, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_slot() {
        let generator = CannedGenerator::new(
            Ok("```html\n<p></p>\n```".to_string()),
            Duration::from_millis(50),
        );
        let pipeline = Arc::new(GenerationPipeline::new(
            generator.clone(),
            Arc::new(MemoryQuota::new(1)),
        ));

        let runs: Vec<_> = (0..5)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.run(&request("a simple page")).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut refused = 0;
        for run in runs {
            match run.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(ForgeError::QuotaExceeded { limit: 1 }) => refused += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(refused, 4);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sample_records_sit_between_history_and_request() {
        let generator = CannedGenerator::ok("**FILE_TREE**\n```json\n{\"src/App.tsx\": \"app\"}\n```");
        let pipeline = GenerationPipeline::new(generator.clone(), Arc::new(Unlimited));
        let request = ChatRequest {
            message: "Build an e-commerce store".to_string(),
            history: vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")],
        };
        pipeline.run(&request).await.unwrap();

        let history = generator.last_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[..2], request.history[..]);

        let sample = &history[2];
        assert_eq!(sample.role, ChatRole::System);
        let json = sample
            .content
            .strip_prefix(SAMPLE_DATA_MARKER)
            .unwrap()
            .trim_start();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        let products = value["products"].as_array().unwrap();
        assert!(!products.is_empty());
        assert_eq!(products[0]["category"], "electronics");
        assert!(products[0]["image"]
            .as_str()
            .unwrap()
            .starts_with("https://images.unsplash.com/"));
    }

    #[test]
    fn test_system_prompt_variants() {
        let single = system_prompt(&classify("a simple clock"));
        assert!(single.contains("**CODE**"));
        let multi = system_prompt(&classify("an analytics dashboard with charts"));
        assert!(multi.contains("**FILE_TREE**"));
        assert!(multi.contains("Project type: dashboard"));
        assert!(multi.contains("recharts"));
        assert!(single.contains("SAMPLE_DATA") && multi.contains("SAMPLE_DATA"));
    }
}
