mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use docqa::error::QaError;
use docqa::extract::extract_document;
use docqa::files::FileManager;
use docqa::ingest::Ingestor;
use docqa::query::QueryEngine;
use docqa::session::Session;

use common::{pdf_with_pages, settings_in, DownCompleter, EchoCompleter, LetterEmbedder, PAGE_TEXTS};

fn ingestor(root: &Path, chunk_size: usize, chunk_overlap: usize) -> Ingestor {
    let settings = Arc::new(settings_in(root, chunk_size, chunk_overlap));
    let files = FileManager::new(&settings.paths.upload_dir, &settings.paths.index_root);
    Ingestor::new(settings, files, Arc::new(LetterEmbedder))
}

fn engine(ingestor: &Ingestor, completer: Arc<dyn docqa::llm::Completer>) -> QueryEngine {
    QueryEngine::new(
        Arc::new(ingestor.files().indexes().clone()),
        Arc::new(LetterEmbedder),
        completer,
        4,
    )
}

#[tokio::test]
async fn valid_pdf_is_indexed() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 1000, 0);

    let report = ingestor
        .ingest_upload("guide.pdf", &pdf_with_pages(&PAGE_TEXTS))
        .await
        .unwrap();

    assert_eq!(report.document_id, "guide");
    assert_eq!(report.pages, 3);
    assert!(report.chunks >= 1);
    assert_eq!(report.dims, 27);
    assert!(ingestor.files().embedding_exists("guide"));
    assert_eq!(ingestor.files().list_processed_files().unwrap(), vec!["guide"]);
    assert!(tmp.path().join("uploads/guide.pdf").is_file());
    assert!(tmp.path().join("chroma_db/guide/index.sqlite").is_file());
}

#[tokio::test]
async fn process_document_on_saved_file() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 1000, 0);
    let path = ingestor
        .files()
        .save_uploaded_file(Some(&pdf_with_pages(&PAGE_TEXTS)), "saved.pdf")
        .unwrap()
        .unwrap();

    assert!(ingestor.process_document_logged(&path).await);
    assert!(ingestor.files().embedding_exists("saved"));
    assert!(!ingestor.process_document_logged(&path).await);
}

#[tokio::test]
async fn invalid_pdf_leaves_no_trace() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 1000, 0);

    let err = ingestor
        .ingest_upload("bogus.pdf", b"this is not a pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, QaError::MalformedDocument { .. }), "{:?}", err);
    assert!(!ingestor.files().embedding_exists("bogus"));
    assert!(!tmp.path().join("uploads/bogus.pdf").exists());
    let leftovers = fs::read_dir(tmp.path().join("chroma_db"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn second_ingestion_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 1000, 0);
    let pdf = pdf_with_pages(&PAGE_TEXTS);

    ingestor.ingest_upload("twice.pdf", &pdf).await.unwrap();
    let err = ingestor.ingest_upload("twice.pdf", &pdf).await.unwrap_err();
    assert!(matches!(err, QaError::AlreadyIndexed(ref id) if id == "twice"));

    // The original upload and index are untouched.
    assert!(tmp.path().join("uploads/twice.pdf").is_file());
    assert!(ingestor.files().embedding_exists("twice"));
}

#[tokio::test]
async fn chunks_reconstruct_extracted_text() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 1000, 0);
    let pdf = pdf_with_pages(&PAGE_TEXTS);
    ingestor.ingest_upload("three.pdf", &pdf).await.unwrap();

    let extracted = extract_document(&tmp.path().join("uploads/three.pdf")).unwrap();
    let index = ingestor.files().indexes().open_index("three").await.unwrap();
    let chunks = index.chunks().await.unwrap();

    let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(rebuilt, extracted.text);
    assert!(rebuilt.contains("Paris"));
    assert_eq!(index.meta().chunk_size, 1000);
    assert_eq!(index.meta().embedding_model, "letters");
}

#[tokio::test]
async fn small_chunks_track_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 20, 0);
    ingestor
        .ingest_upload("paged.pdf", &pdf_with_pages(&PAGE_TEXTS))
        .await
        .unwrap();

    let index = ingestor.files().indexes().open_index("paged").await.unwrap();
    let chunks = index.chunks().await.unwrap();
    assert!(chunks.len() > 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i as i64);
    }
    assert_eq!(chunks.first().unwrap().page, 1);
    assert_eq!(chunks.last().unwrap().page, 3);
    assert!(chunks.windows(2).all(|w| w[0].page <= w[1].page));

    let extracted = extract_document(&tmp.path().join("uploads/paged.pdf")).unwrap();
    let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(rebuilt, extracted.text);
}

#[tokio::test]
async fn question_on_missing_index() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 1000, 0);
    let engine = engine(&ingestor, Arc::new(EchoCompleter::default()));
    let mut session = Session::new();

    let err = session
        .ask(&engine, "nothing", "What is this?")
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::IndexNotFound(_)));
    assert_eq!(session.len(), 0);
}

#[tokio::test]
async fn question_appends_one_history_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 1000, 0);
    ingestor
        .ingest_upload("guide.pdf", &pdf_with_pages(&PAGE_TEXTS))
        .await
        .unwrap();

    let completer = Arc::new(EchoCompleter::default());
    let engine = engine(&ingestor, completer.clone());
    let mut session = Session::new();

    let entry = session
        .ask(&engine, "guide", "What is the capital of France?")
        .await
        .unwrap();
    assert_eq!(entry.question, "What is the capital of France?");
    assert_eq!(entry.answer, "Paris");
    assert_eq!(entry.document_id, "guide");
    assert_eq!(session.len(), 1);

    let prompts = completer.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Question: What is the capital of France?"));
}

#[tokio::test]
async fn irrelevant_question_still_answered() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 20, 5);
    ingestor
        .ingest_upload("guide.pdf", &pdf_with_pages(&PAGE_TEXTS))
        .await
        .unwrap();

    let engine = engine(&ingestor, Arc::new(EchoCompleter::default()));
    let mut session = Session::new();
    let entry = session
        .ask(&engine, "guide", "Who won the 1998 football world cup?")
        .await
        .unwrap();

    assert!(!entry.answer.is_empty());
    assert_eq!(entry.chunks.len(), 4);
    assert!(entry.chunks.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn failed_completion_keeps_history() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 1000, 0);
    ingestor
        .ingest_upload("guide.pdf", &pdf_with_pages(&PAGE_TEXTS))
        .await
        .unwrap();

    let engine = engine(&ingestor, Arc::new(DownCompleter));
    let mut session = Session::new();
    let err = session.ask(&engine, "guide", "Anything?").await.unwrap_err();
    assert!(matches!(err, QaError::LanguageModel(_)));
    assert!(session.is_empty());
}

#[tokio::test]
async fn locked_document_keeps_existing_upload() {
    let tmp = tempfile::tempdir().unwrap();
    let ingestor = ingestor(tmp.path(), 1000, 0);
    fs::create_dir_all(tmp.path().join("uploads")).unwrap();
    fs::create_dir_all(tmp.path().join("chroma_db")).unwrap();
    fs::write(tmp.path().join("uploads/guide.pdf"), b"bytes being extracted").unwrap();
    fs::write(tmp.path().join("chroma_db/.guide.lock"), "4242").unwrap();

    let err = ingestor
        .ingest_upload("guide.pdf", &pdf_with_pages(&PAGE_TEXTS))
        .await
        .unwrap_err();

    assert!(matches!(err, QaError::IndexLocked(ref id) if id == "guide"), "{:?}", err);
    assert_eq!(
        fs::read(tmp.path().join("uploads/guide.pdf")).unwrap(),
        b"bytes being extracted"
    );
    assert!(tmp.path().join("chroma_db/.guide.lock").exists());
    assert!(!ingestor.files().embedding_exists("guide"));
}
