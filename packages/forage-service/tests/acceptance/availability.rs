use std::sync::Arc;

use forage_config::EmbeddingSource;
use forage_domain::Scope;
use forage_service::{CorpusStatus, Error, ForageService, Providers};
use forage_testkit::TempIndexDir;

use super::{HashEmbedding, PODCAST, SpyLlm, TOWN_HALL};

fn status<'a>(statuses: &'a [CorpusStatus], name: &str) -> &'a CorpusStatus {
	statuses.iter().find(|status| status.name == name).expect("Corpus should be listed.")
}

fn load(dir: &TempIndexDir) -> ForageService {
	ForageService::load(
		super::test_config(dir.path()),
		Providers::new(Arc::new(HashEmbedding::default()), Arc::new(SpyLlm::new("No citations."))),
	)
}

#[tokio::test]
async fn corpora_without_an_index_are_listed_unavailable() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");

	super::write_corpora(&dir);

	let service = load(&dir);
	let statuses = service.corpora();
	let town_hall = status(&statuses, TOWN_HALL);

	assert_eq!(statuses.len(), 2);
	assert!(!town_hall.available);
	assert_eq!(town_hall.reason.as_deref(), Some("No local index is loaded."));
	assert_eq!(town_hall.examples, vec!["What do people say about parks?".to_string()]);
	assert!(!town_hall.audio);
	assert!(status(&statuses, PODCAST).audio);

	let result = service.search(TOWN_HALL, "parks", Scope::SearchOnly, None).await;

	assert!(matches!(result, Err(Error::CorpusUnavailable { .. })));

	service.rebuild_index(TOWN_HALL, None).await.expect("Failed to rebuild index.");

	let statuses = service.corpora();

	assert!(status(&statuses, TOWN_HALL).available);
	assert!(status(&statuses, TOWN_HALL).reason.is_none());
	assert!(!status(&statuses, PODCAST).available);
}

#[tokio::test]
async fn a_broken_corpus_does_not_take_down_the_others() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");

	super::write_corpora(&dir);

	dir.write_lines(PODCAST, "snippets.jsonl", &["{not json"]).expect("Failed to write turns.");

	let service = load(&dir);

	service.rebuild_index(TOWN_HALL, None).await.expect("Failed to rebuild index.");

	let statuses = service.corpora();
	let podcast = status(&statuses, PODCAST);

	assert!(!podcast.available);
	assert!(podcast.reason.as_deref().is_some_and(|reason| reason.contains("snippets.jsonl")));
	assert!(status(&statuses, TOWN_HALL).available);

	let broken = service.search(PODCAST, "anything", Scope::SearchOnly, None).await;
	let healthy = service
		.search(TOWN_HALL, "Remark 3 from conversation 1 about topic 3", Scope::Top { n: 5 }, None)
		.await
		.expect("Healthy corpus should still be searchable.");

	assert!(matches!(broken, Err(Error::CorpusUnavailable { .. })));
	assert_eq!(healthy.len(), 5);
	assert_eq!(healthy[0].turn_id, 3);
}

#[tokio::test]
async fn persisted_indexes_are_loaded_at_startup() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");

	{
		let builder = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;

		assert!(builder.corpora().iter().all(|status| status.available));
	}

	let embedding = Arc::new(HashEmbedding::default());
	let service = ForageService::load(
		super::test_config(dir.path()),
		Providers::new(embedding.clone(), Arc::new(SpyLlm::new("No citations."))),
	);

	assert!(service.corpora().iter().all(|status| status.available));
	assert!(service.cache.contains(TOWN_HALL, EmbeddingSource::Local));

	let results = service
		.search(PODCAST, "Episode line 20 on subject 0", Scope::Top { n: 3 }, None)
		.await
		.expect("Search failed.");

	assert_eq!(results[0].turn_id, 20);
	assert_eq!(embedding.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_missing_source_index_is_reported_per_request() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;
	let remote = service
		.search(TOWN_HALL, "parks", Scope::SearchOnly, Some(EmbeddingSource::Remote))
		.await;
	let local = service.search(TOWN_HALL, "parks", Scope::SearchOnly, None).await;

	assert!(matches!(remote, Err(Error::CorpusUnavailable { .. })));
	assert!(local.is_ok());
}
