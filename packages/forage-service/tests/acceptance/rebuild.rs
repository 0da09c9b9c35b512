use std::sync::{Arc, atomic::Ordering};

use forage_config::EmbeddingSource;
use forage_domain::Scope;
use forage_service::{Error, ForageService, Providers};
use forage_storage::{artifact, corpus};
use forage_testkit::{TempIndexDir, TestTurn};

use super::{DIM, FixedDimEmbedding, HashEmbedding, PODCAST, SpyLlm, TOWN_HALL};

#[tokio::test]
async fn rebuild_embeds_in_batches_and_persists_the_index() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");

	super::write_corpora(&dir);

	let embedding = Arc::new(HashEmbedding::default());
	let service = ForageService::load(
		super::test_config(dir.path()),
		Providers::new(embedding.clone(), Arc::new(SpyLlm::new("No citations."))),
	);
	let embedded = service.embed_corpus(TOWN_HALL, None).await.expect("Embedding failed.");

	// Forty turns at a batch size of sixteen.
	assert_eq!(embedded.embedded_count, 40);
	assert_eq!(embedded.batch_count, 3);
	assert_eq!(embedding.calls.load(Ordering::SeqCst), 3);
	assert_eq!(embedded.source, EmbeddingSource::Local);

	let records = corpus::read_embedded_turns(&dir.path().join(TOWN_HALL), EmbeddingSource::Local)
		.expect("Embedded turns should be readable.");

	assert_eq!(records.len(), 40);
	assert!(records.iter().all(|record| record.embedding.len() == DIM as usize));

	let report = service.build_index(TOWN_HALL, None).expect("Build failed.");

	assert_eq!(report.vector_count, 40);
	assert_eq!(report.dim, DIM);
	assert_eq!(report.nlist, 6);
	assert_eq!(report.digest.len(), 64);
	assert!(artifact::index_path(dir.path(), TOWN_HALL, EmbeddingSource::Local).is_file());
	assert!(service.cache.contains(TOWN_HALL, EmbeddingSource::Local));
}

#[tokio::test]
async fn rebuild_replaces_the_served_index() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;
	let mut turns = super::town_hall_turns();

	turns.push(TestTurn::new(5, "Cy", "A brand new remark about the riverside library"));

	dir.write_turns(TOWN_HALL, &turns).expect("Failed to write turns.");
	dir.write_conversations(TOWN_HALL, "conversations.jsonl", &turns)
		.expect("Failed to write conversations.");

	let report = service.rebuild_index(TOWN_HALL, None).await.expect("Rebuild failed.");
	let results = service
		.search(
			TOWN_HALL,
			"A brand new remark about the riverside library",
			Scope::Top { n: 3 },
			None,
		)
		.await
		.expect("Search failed.");

	assert_eq!(report.vector_count, 41);
	assert_eq!(results[0].turn_id, 40);
	assert_eq!(results[0].speaker_name, "Cy");
}

#[tokio::test]
async fn remote_source_builds_alongside_local() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");
	let service = super::built_service(&dir, Arc::new(SpyLlm::new("No citations."))).await;
	let report = service
		.rebuild_index(PODCAST, Some(EmbeddingSource::Remote))
		.await
		.expect("Rebuild failed.");

	assert_eq!(report.source, EmbeddingSource::Remote);
	assert!(artifact::index_path(dir.path(), PODCAST, EmbeddingSource::Remote).is_file());
	assert!(artifact::index_path(dir.path(), PODCAST, EmbeddingSource::Local).is_file());

	let results = service
		.search(
			PODCAST,
			"Episode line 7 on subject 2",
			Scope::SearchOnly,
			Some(EmbeddingSource::Remote),
		)
		.await
		.expect("Search failed.");

	assert_eq!(results[0].turn_id, 7);
}

#[tokio::test]
async fn mismatched_embedding_dimensions_abort_the_rebuild() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");

	super::write_corpora(&dir);

	let service = ForageService::load(
		super::test_config(dir.path()),
		Providers::new(Arc::new(FixedDimEmbedding { dim: 8 }), Arc::new(SpyLlm::new(""))),
	);
	let result = service.rebuild_index(TOWN_HALL, None).await;

	assert!(matches!(result, Err(Error::DimensionMismatch { expected: 32, actual: 8 })));
	assert!(!artifact::index_path(dir.path(), TOWN_HALL, EmbeddingSource::Local).exists());
	assert!(!service.cache.contains(TOWN_HALL, EmbeddingSource::Local));
}

#[tokio::test]
async fn building_without_embeddings_fails() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");

	super::write_corpora(&dir);

	let service = ForageService::load(
		super::test_config(dir.path()),
		Providers::new(Arc::new(HashEmbedding::default()), Arc::new(SpyLlm::new(""))),
	);

	assert!(matches!(service.build_index(TOWN_HALL, None), Err(Error::Storage { .. })));
	assert!(matches!(
		service.build_index("nowhere", None),
		Err(Error::UnknownCorpus { .. })
	));
}

#[tokio::test]
async fn building_a_source_from_another_sources_embeddings_is_rejected() {
	let dir = TempIndexDir::new().expect("Failed to create index dir.");

	super::write_corpora(&dir);

	let mut cfg = super::test_config(dir.path());

	cfg.providers.embedding.remote.dimensions = 16;

	let service = ForageService::load(
		cfg,
		Providers::new(Arc::new(HashEmbedding::default()), Arc::new(SpyLlm::new(""))),
	);

	service.embed_corpus(TOWN_HALL, Some(EmbeddingSource::Local)).await.expect("Embedding failed.");

	// No remote records exist yet, so the remote build has nothing to train on.
	assert!(matches!(
		service.build_index(TOWN_HALL, Some(EmbeddingSource::Remote)),
		Err(Error::Storage { .. })
	));
	assert!(!artifact::index_path(dir.path(), TOWN_HALL, EmbeddingSource::Remote).exists());

	// Local-sized vectors planted under the remote name fail the dimension check.
	let town_hall = dir.path().join(TOWN_HALL);
	let local = corpus::read_embedded_turns(&town_hall, EmbeddingSource::Local)
		.expect("Local records should exist.");

	corpus::write_embedded_turns(&town_hall, EmbeddingSource::Remote, &local)
		.expect("Failed to write remote records.");

	assert!(matches!(
		service.build_index(TOWN_HALL, Some(EmbeddingSource::Remote)),
		Err(Error::DimensionMismatch { expected: 16, actual: 32 })
	));
	assert!(!service.cache.contains(TOWN_HALL, EmbeddingSource::Remote));

	// Embedding with the remote source leaves the local records and index intact.
	let remote = service
		.rebuild_index(TOWN_HALL, Some(EmbeddingSource::Remote))
		.await
		.expect("Remote rebuild failed.");
	let local_after = corpus::read_embedded_turns(&town_hall, EmbeddingSource::Local)
		.expect("Local records should survive.");

	assert_eq!(remote.dim, 16);
	assert_eq!(local_after, local);
	assert!(
		service.build_index(TOWN_HALL, Some(EmbeddingSource::Local)).is_ok_and(|report| report.dim == DIM)
	);
}
