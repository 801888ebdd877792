//! End-to-end: two DOCX versions through ingest, retrieval and comparison,
//! with a deterministic embedder and a scripted chat model.

use async_trait::async_trait;
use lexdiff_core::compare::DEFAULT_SENTINEL;
use lexdiff_core::index::{Embed, EmbedderError};
use lexdiff_core::provider::{self, ChatRequest, ChatResponse, Provider, ProviderError};
use lexdiff_core::{Config, RetrievalPolicy, RetrievalResult, Session, VersionLabel};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const DIMENSION: usize = 1024;

/// Hashes lowercase word tokens into a fixed-size count vector.
struct BagOfWords;

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf29ce484222325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embed for BagOfWords {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut vector = vec![0.0; DIMENSION];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let slot = (fnv1a(&token.to_lowercase()) % DIMENSION as u64) as usize;
            vector[slot] += 1.0;
        }
        Ok(vector)
    }
}

/// Answers with the sentinel unless the excerpts mention Article 2.
#[derive(Default)]
struct ScriptedModel {
    always_sentinel: bool,
    prompts: Mutex<Vec<String>>,
}

fn excerpts(prompt: &str) -> &str {
    let start = prompt.find("[DOCUMENT EXCERPTS]:").unwrap_or(0);
    let end = prompt.find("[INSTRUCTIONS]:").unwrap_or(prompt.len());
    &prompt[start..end]
}

#[async_trait]
impl Provider for ScriptedModel {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> provider::Result<()> {
        let prompt = request.messages[0].content.clone();
        let content = if self.always_sentinel || !excerpts(&prompt).contains("Article 2") {
            DEFAULT_SENTINEL.to_string()
        } else {
            "[OLD] required a barcode on the card; [NEW] requires an electronic chip.".to_string()
        };
        self.prompts.lock().unwrap().push(prompt);

        callback(ChatResponse {
            model: request.model,
            content,
            done: true,
        });
        Ok(())
    }

    async fn embed(&self, _text: &str, _model: &str) -> provider::Result<Vec<f32>> {
        Err(ProviderError::Other("embeddings come from BagOfWords".to_string()))
    }
}

fn write_docx(path: &Path, paragraphs: &[&str]) {
    let body: String = paragraphs
        .iter()
        .map(|p| format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

const ARTICLE_1: &str = "Article 1. Every resident must complete population registration with the commune office within thirty days of moving.";
const ARTICLE_3: &str = "Article 3. Renewal applications are processed by the provincial police and a processing fee is collected at submission.";
const OLD_ARTICLE_2: &str = "Article 2. The identity card shall carry a printed barcode encoding the holder's personal identification number.";
const NEW_ARTICLE_2: &str = "Article 2. The identity card shall carry an electronic chip encoding the holder's personal identification number.";

fn write_pair(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let old = dir.path().join("law_old.docx");
    let new = dir.path().join("law_new.docx");
    write_docx(&old, &["LAW ON RESIDENCE", ARTICLE_1, OLD_ARTICLE_2, ARTICLE_3]);
    write_docx(&new, &["LAW ON RESIDENCE", ARTICLE_1, NEW_ARTICLE_2, ARTICLE_3]);
    (old, new)
}

async fn ingested(model: Arc<ScriptedModel>) -> (Session, TempDir) {
    let dir = TempDir::new().unwrap();
    let (old, new) = write_pair(&dir);

    let mut session = Session::builder(Config::default())
        .provider(model)
        .embedder(Arc::new(BagOfWords))
        .build()
        .unwrap();
    let count = session.ingest(&old, &new).await.unwrap();
    assert_eq!(count, 6);

    (session, dir)
}

fn article_2_versions(citations: &RetrievalResult) -> Vec<VersionLabel> {
    citations
        .iter()
        .filter(|s| s.unit.article_id.as_deref() == Some("2"))
        .map(|s| s.unit.version.clone())
        .collect()
}

#[tokio::test]
async fn article_change_is_retrieved_from_both_versions() {
    let model = Arc::new(ScriptedModel::default());
    let (session, _dir) = ingested(model.clone()).await;

    let comparison = session
        .compare_with_k("what changed in Article 2", 6)
        .await
        .unwrap();

    let versions = article_2_versions(&comparison.citations);
    assert!(versions.contains(&VersionLabel::OLD));
    assert!(versions.contains(&VersionLabel::NEW));
    assert!(!session.config().prompt.is_sentinel(&comparison.answer));
    assert!(comparison.answer.contains("chip"));

    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[0].contains(&format!("[OLD]\nContent: {}", OLD_ARTICLE_2)));
    assert!(prompts[0].contains(&format!("[NEW]\nContent: {}", NEW_ARTICLE_2)));
}

#[tokio::test]
async fn lexically_similar_units_rank_first() {
    let (session, _dir) = ingested(Arc::new(ScriptedModel::default())).await;

    let comparison = session
        .compare_with_k("identity card barcode or chip for Article 2", 2)
        .await
        .unwrap();

    assert_eq!(comparison.citations.len(), 2);
    assert_eq!(article_2_versions(&comparison.citations).len(), 2);
}

#[tokio::test]
async fn sentinel_only_when_article_two_missing() {
    let (session, _dir) = ingested(Arc::new(ScriptedModel::default())).await;

    let comparison = session
        .compare_with_k("population registration commune office thirty days", 1)
        .await
        .unwrap();

    assert_eq!(comparison.citations.len(), 1);
    assert!(article_2_versions(&comparison.citations).is_empty());
    assert!(session.config().prompt.is_sentinel(&comparison.answer));
}

#[tokio::test]
async fn unrelated_question_still_returns_k_units() {
    let model = Arc::new(ScriptedModel {
        always_sentinel: true,
        ..ScriptedModel::default()
    });
    let (session, _dir) = ingested(model).await;

    let comparison = session
        .compare_with_k("weather forecast tomorrow", 4)
        .await
        .unwrap();

    assert_eq!(comparison.citations.len(), 4);
    assert_eq!(comparison.answer, DEFAULT_SENTINEL);
}

#[tokio::test]
async fn k_beyond_index_size_returns_every_unit() {
    let (session, _dir) = ingested(Arc::new(ScriptedModel::default())).await;

    let comparison = session.compare_with_k("Article", 50).await.unwrap();
    assert_eq!(comparison.citations.len(), 6);

    let index = session.index().unwrap();
    let mut stored: Vec<&str> = index.units().map(|u| u.content.as_str()).collect();
    let mut returned: Vec<&str> = comparison
        .citations
        .iter()
        .map(|s| s.unit.content.as_str())
        .collect();
    stored.sort();
    returned.sort();
    assert_eq!(stored, returned);
}

#[tokio::test]
async fn balanced_policy_covers_both_versions() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("old.docx");
    let new = dir.path().join("new.docx");
    write_docx(&old, &[ARTICLE_1]);
    write_docx(
        &new,
        &[
            NEW_ARTICLE_2,
            "Article 4. The electronic chip on the identity card may store biometric data of the holder.",
            "Article 5. Holders may update the electronic chip on the identity card at any commune office.",
        ],
    );

    let mut config = Config::default();
    config.retrieval.policy = RetrievalPolicy::Balanced;
    let mut session = Session::builder(config)
        .provider(Arc::new(ScriptedModel::default()))
        .embedder(Arc::new(BagOfWords))
        .build()
        .unwrap();
    session.ingest(&old, &new).await.unwrap();

    let comparison = session
        .compare_with_k("electronic chip identity card", 2)
        .await
        .unwrap();
    assert!(comparison.citations.contains_version(&VersionLabel::OLD));
    assert!(comparison.citations.contains_version(&VersionLabel::NEW));
}
