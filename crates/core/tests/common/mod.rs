//! Shared doubles for pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ideaforge_core::llm::{prompts, LanguageModel, ModelRequest};
use ideaforge_core::tools::{FetchOptions, SearchHit, SearchProvider};
use ideaforge_core::workers::WorkerDeps;
use ideaforge_core::PipelineConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const IDEA: &str = "köpek gezdirme uygulaması";

pub const PLAN_REPLY: &str = r#"{
  "research_queries": ["köpek gezdirme uygulaması", "dog walking app market", "pet care startups"],
  "analysis_focus": ["Who are the competitors?", "What do owners pay?"],
  "output_files": ["business_proposal.md", "market_analysis.md", "roadmap.md"]
}"#;

pub const SEARCHER_REPLY: &str =
    "1. köpek gezdirme fiyatları\n2. rover competitors\n3. dog walking app market";

pub const VALID_ROADMAP: &str = "# Roadmap\n\n\
| Phase | Timeline | Goals | Key Deliverables | Success Metrics |\n\
|-------|----------|-------|------------------|-----------------|\n\
| Validation | Q1 | Interview owners | Survey report | 50 interviews |\n\
| Launch | Q2 | First city | iOS app | 500 walks |\n";

/// Model that answers by agent, optionally failing one agent or returning
/// broken roadmaps a number of times
pub struct ScriptedModel {
    pub fail_agent: Option<&'static str>,
    pub invalid_roadmaps: usize,
    pub roadmap_calls: AtomicUsize,
    pub writer_calls: AtomicUsize,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self {
            fail_agent: None,
            invalid_roadmaps: 0,
            roadmap_calls: AtomicUsize::new(0),
            writer_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedModel {
    pub fn failing(agent: &'static str) -> Self {
        Self {
            fail_agent: Some(agent),
            ..Self::default()
        }
    }

    pub fn with_invalid_roadmaps(count: usize) -> Self {
        Self {
            invalid_roadmaps: count,
            ..Self::default()
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: ModelRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_agent == Some(request.agent) {
            anyhow::bail!("{} model unavailable", request.agent);
        }

        let reply = match request.agent {
            "planner" => PLAN_REPLY.to_string(),
            "searcher" => SEARCHER_REPLY.to_string(),
            "analyst" => format!("Market analysis based on:\n{}", request.prompt),
            "writer" => {
                self.writer_calls.fetch_add(1, Ordering::SeqCst);
                if request.system == prompts::ROADMAP {
                    let n = self.roadmap_calls.fetch_add(1, Ordering::SeqCst);
                    if n < self.invalid_roadmaps {
                        format!("Roadmap draft {} written by the coordinator.", n + 1)
                    } else {
                        VALID_ROADMAP.to_string()
                    }
                } else {
                    "# Document\n\nA walking service for busy dog owners.".to_string()
                }
            }
            other => anyhow::bail!("unexpected agent {}", other),
        };
        Ok(reply)
    }
}

/// Search returning the same URLs for every query, recording queries
#[derive(Default)]
pub struct StaticSearch {
    pub urls: Vec<String>,
    pub queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self
            .urls
            .iter()
            .take(max_results)
            .map(|url| SearchHit {
                title: "Result".to_string(),
                url: url.clone(),
                snippet: String::new(),
            })
            .collect())
    }
}

/// Web server with two pages about dog walking
pub async fn source_server() -> (MockServer, Vec<String>) {
    let server = MockServer::start().await;
    for (route, body) in [
        ("/rover", "<html><body><h1>Rover</h1><p>Walks from $20.</p></body></html>"),
        ("/wag", "<html><body><nav>menu</nav><p>Wag has 400k walkers.</p></body></html>"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
    }
    let urls = vec![
        format!("{}/rover", server.uri()),
        format!("{}/wag", server.uri()),
    ];
    (server, urls)
}

pub fn config(output_dir: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        output_dir: output_dir.to_path_buf(),
        fetch_timeout_secs: 5,
        ..PipelineConfig::default()
    }
}

pub fn deps(model: Arc<ScriptedModel>, search: Arc<StaticSearch>) -> WorkerDeps {
    WorkerDeps {
        model,
        search,
        fetch: FetchOptions {
            max_chars: 5000,
            timeout: Duration::from_secs(5),
            max_parallel: 8,
        },
        results_per_query: 3,
        max_proposed_queries: 5,
    }
}
