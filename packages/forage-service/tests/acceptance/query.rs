use std::sync::Arc;

use forage_domain::{ConversationId, Scope};
use forage_service::{Error, QueryRequest};
use forage_testkit::TempIndexDir;

use super::{PODCAST, SpyLlm, TOWN_HALL};

fn request(corpus: &str, subject: &str, scope: &str) -> QueryRequest {
	QueryRequest {
		corpus: corpus.to_string(),
		subject: subject.to_string(),
		objective: "generate_themes".to_string(),
		scope: Scope::parse(scope).expect("Scope should parse."),
		source: None,
		model: None,
	}
}

#[tokio::test]
async fn search_only_returns_default_k_dense_ranks() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let llm = Arc::new(SpyLlm::new("unused"));
	let service = super::built_service(&dir, llm.clone()).await;
	let subject = "Remark 5 from conversation 1 about topic 5";
	let response = service
		.query(request(TOWN_HALL, subject, "search_only"))
		.await
		.expect("Query failed.");
	let ranks: Vec<u32> = response.results.iter().map(|result| result.rank).collect();

	assert_eq!(ranks, (1..=10).collect::<Vec<u32>>());
	assert!(response.analysis.is_none());
	assert!(llm.calls().is_empty());
	assert_eq!(response.results[0].turn_id, 5);
	assert_eq!(response.results[0].content, subject);
	assert!(
		response
			.results
			.windows(2)
			.all(|pair| pair[0].similarity >= pair[1].similarity)
	);
	assert_eq!(response.rendered.len(), response.results.len());
	assert_eq!(
		response.rendered[0],
		"1. **:blue[Ben]**: Remark 5 from conversation 1 about topic 5\n*(From [Conversation 1](https://app.fora.io/conversation/1?t=50.000000), 2021-03-04)*"
	);
}

#[tokio::test]
async fn top_n_caps_results() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;
	let response = service
		.query(request(TOWN_HALL, "Remark 12 from conversation 2 about topic 5", "top_3"))
		.await
		.expect("Query failed.");

	assert_eq!(response.results.len(), 3);
	assert!(response.results.iter().all(|result| result.speaker_intro.is_none()));
	assert!(response.results.iter().all(|result| result.context.is_none()));
}

#[tokio::test]
async fn bio_scope_attaches_speaker_intros() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;
	let response = service
		.query(request(TOWN_HALL, "Remark 22 from conversation 3 about topic 1", "top_2_with_bio"))
		.await
		.expect("Query failed.");
	let top = &response.results[0];

	assert_eq!(top.turn_id, 22);
	assert_eq!(top.conversation_id, ConversationId::Number(3));
	// Ana speaks the even turns of conversation 3; her first five form the intro.
	assert_eq!(
		top.speaker_intro.as_deref(),
		Some(
			"Remark 20 from conversation 3 about topic 6 Remark 22 from conversation 3 about topic 1 \
			 Remark 24 from conversation 3 about topic 3 Remark 26 from conversation 3 about topic 5 \
			 Remark 28 from conversation 3 about topic 0"
		)
	);
}

#[tokio::test]
async fn context_scope_attaches_neighbors() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;
	let response = service
		.query(request(
			TOWN_HALL,
			"Remark 0 from conversation 1 about topic 0",
			"top_1_with_context_2",
		))
		.await
		.expect("Query failed.");
	let context = response.results[0].context.as_ref().expect("Context should be attached.");

	assert_eq!(response.results[0].turn_id, 0);
	assert!(context.before.is_empty());
	assert_eq!(
		context.after.iter().map(|neighbor| neighbor.turn_id).collect::<Vec<_>>(),
		vec![1, 2]
	);
}

#[tokio::test]
async fn playback_corpora_render_aliases_and_video_links() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;
	let response = service
		.query(request(PODCAST, "Episode line 3 on subject 3", "search_only"))
		.await
		.expect("Query failed.");

	assert_eq!(response.results[0].turn_id, 3);
	assert_eq!(
		response.rendered[0],
		"1. **:blue[HP]**: Episode line 3 on subject 3\n*(From [Conversation ep-alpha](https://www.youtube.com/watch?v=ep-alpha&t=30.0), 2021-03-04)*"
	);
}

#[tokio::test]
async fn rejects_invalid_requests() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;
	let blank = service.query(request(TOWN_HALL, "   ", "top_3")).await;
	let unknown_corpus = service.query(request("nowhere", "parks", "top_3")).await;
	let mut bad_objective = request(TOWN_HALL, "parks", "top_3");

	bad_objective.objective = "missing".to_string();

	let bad_objective = service.query(bad_objective).await;

	assert!(matches!(blank, Err(Error::InvalidRequest { .. })));
	assert!(matches!(unknown_corpus, Err(Error::UnknownCorpus { .. })));
	assert!(matches!(bad_objective, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn oversized_top_n_is_clamped_to_the_corpus_size() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;
	let results = service
		.search(
			PODCAST,
			"Episode line 2 on subject 2",
			Scope::parse("top_4000000000").expect("Scope should parse."),
			None,
		)
		.await
		.expect("Search failed.");
	let ranks: Vec<u32> = results.iter().map(|result| result.rank).collect();

	assert_eq!(results.len(), 24);
	assert_eq!(ranks, (1..=24).collect::<Vec<u32>>());
	assert_eq!(results[0].turn_id, 2);
}
