use std::sync::Arc;

use forage_domain::{Scope, prompt};
use forage_service::{Error, ForageService, Providers, QueryRequest};
use forage_testkit::TempIndexDir;

use super::{ContextLengthLlm, HashEmbedding, SpyLlm, TOWN_HALL};

const SUBJECT: &str = "Remark 17 from conversation 2 about topic 3";

fn request(scope: &str, model: Option<&str>) -> QueryRequest {
	QueryRequest {
		corpus: TOWN_HALL.to_string(),
		subject: SUBJECT.to_string(),
		objective: "generate_themes".to_string(),
		scope: Scope::parse(scope).expect("Scope should parse."),
		source: None,
		model: model.map(str::to_string),
	}
}

#[tokio::test]
async fn analysis_resolves_citations_and_reranks() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let llm = Arc::new(SpyLlm::new("Most cited [2] and [2, 3]."));
	let service = super::built_service(&dir, llm.clone()).await;
	let response = service.query(request("top_3", None)).await.expect("Query failed.");
	let analysis = response.analysis.as_ref().expect("Analysis should run for top_3.");
	let calls = llm.calls();
	let order: Vec<u32> = response.results.iter().map(|result| result.rank).collect();

	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].0, "large-model-2");
	assert!(calls[0].1.starts_with("Below are remarks from conversations"));
	assert!(calls[0].1.contains(&format!("- [1] \"{SUBJECT}\"")));
	assert!(calls[0].1.ends_with(&format!(
		"answer the following: What are themes about {SUBJECT} in these remarks?\n\n"
	)));
	assert_eq!(analysis.model, "large");
	assert_eq!(analysis.user_input, format!("What are themes about {SUBJECT} in these remarks?"));
	assert_eq!(analysis.citation_counts.get(1), 0);
	assert_eq!(analysis.citation_counts.get(2), 2);
	assert_eq!(analysis.citation_counts.get(3), 1);
	assert!(analysis.markdown.contains("(#2)](#cite-2)</sup>"));
	assert!(analysis.markdown.contains("(#3)](#cite-3)</sup>"));
	assert!(!analysis.markdown.contains("#cite-1"));
	assert_eq!(order, vec![2, 3, 1]);
	assert!(response.rendered[0].starts_with("2. **:blue["));
	assert_eq!(analysis.truncation_attempts, 0);
}

#[tokio::test]
async fn requested_model_is_resolved_by_label_or_id() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let llm = Arc::new(SpyLlm::new("Nothing cited."));
	let service = super::built_service(&dir, llm.clone()).await;
	let by_label = service.query(request("top_2", Some("small"))).await.expect("Query failed.");
	let by_id =
		service.query(request("top_2", Some("small-model-1"))).await.expect("Query failed.");
	let unknown = service.query(request("top_2", Some("huge"))).await;
	let models: Vec<String> = llm.calls().into_iter().map(|(model, _)| model).collect();

	assert_eq!(by_label.analysis.map(|analysis| analysis.model).as_deref(), Some("small"));
	assert_eq!(by_id.analysis.map(|analysis| analysis.model).as_deref(), Some("small"));
	assert_eq!(models, vec!["small-model-1".to_string(), "small-model-1".to_string()]);
	assert!(matches!(unknown, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn long_prompts_are_truncated_to_the_word_budget() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");

	super::write_corpora(&dir);

	let mut cfg = super::test_config(dir.path());

	cfg.prompt.max_words = 60;

	let llm = Arc::new(SpyLlm::new("Nothing cited."));
	let service =
		ForageService::load(cfg, Providers::new(Arc::new(HashEmbedding::default()), llm.clone()));

	service.rebuild_index(TOWN_HALL, None).await.expect("Failed to rebuild index.");

	let response = service.query(request("top_10", None)).await.expect("Query failed.");
	let analysis = response.analysis.expect("Analysis should run for top_10.");
	let calls = llm.calls();

	assert!(analysis.prompt_words <= 60);
	assert!(analysis.removed_lines > 0);
	assert!(analysis.truncation_attempts >= analysis.removed_lines);
	assert_eq!(prompt::word_count(&calls[0].1), analysis.prompt_words);
	assert!(calls[0].1.starts_with("Below are remarks from conversations"));
	assert_eq!(response.results.len(), 10);
}

#[tokio::test]
async fn context_length_errors_surface_as_prompt_too_long() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(ContextLengthLlm)).await;
	let search_only = service.query(request("search_only", None)).await;
	let analysed = service.query(request("top_3", None)).await;

	assert!(search_only.is_ok());
	assert!(matches!(analysed, Err(Error::PromptTooLong { .. })));
}
