//! File-type router: image and PDF description pipelines, plus the
//! unsupported-content short-circuit.

use tracing::warn;

use crate::domain::{FileCategory, FileRecord, UserId};
use crate::ports::{CompletionPort, StoragePort};
use crate::{Error, Result};

pub const UNSUPPORTED_REPLY: &str =
    "❌ Unsupported file type. I can analyze images (jpg, jpeg, png) and PDF documents.";

/// Payload sent to the completion engine when a PDF has no extractable text,
/// so the user still gets a real reply instead of silence.
pub const EMPTY_DOCUMENT_MARKER: &str = "document contains no extractable text";

const MAX_DOCUMENT_CHARS: usize = 100_000;

/// Describe one uploaded file and append its record.
///
/// Unsupported categories reply with the fixed rejection and touch nothing:
/// no completion call, no record. A record append failure after a successful
/// description does not retract the reply.
pub async fn handle_file(
    completion: &dyn CompletionPort,
    store: &dyn StoragePort,
    user_id: UserId,
    name: &str,
    category: FileCategory,
    data: &[u8],
) -> Result<String> {
    let description = match category {
        FileCategory::Unsupported => return Ok(UNSUPPORTED_REPLY.to_string()),
        FileCategory::Image => {
            completion
                .describe_image(&image_prompt(name), data, image_mime(name))
                .await?
        }
        FileCategory::Pdf => {
            let text = extract_pdf_text(data)?;
            completion.complete(&pdf_prompt(name, &text)).await?
        }
    };

    let record = FileRecord::new(user_id, name, category, description.clone());
    if let Err(e) = store.append_file(&record).await {
        warn!("file record append failed for user {}: {e}", user_id.0);
    }

    Ok(description)
}

fn image_prompt(name: &str) -> String {
    format!("Describe the content of this image ({name}).")
}

fn image_mime(name: &str) -> &'static str {
    if name.to_lowercase().ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn pdf_prompt(name: &str, text: &str) -> String {
    if text.trim().is_empty() {
        return format!("Summarize this document ({name}): {EMPTY_DOCUMENT_MARKER}");
    }
    let bounded: String = text.chars().take(MAX_DOCUMENT_CHARS).collect();
    format!("Summarize this document ({name}):\n\n{bounded}")
}

/// Concatenate per-page text in document order.
pub fn extract_pdf_text(data: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::Validation(format!("could not read PDF: {e}")))?;

    let mut out = String::new();
    for page in doc.get_pages().keys() {
        let text = doc
            .extract_text(&[*page])
            .map_err(|e| Error::Validation(format!("could not extract page {page}: {e}")))?;
        out.push_str(&text);
        out.push('\n');
    }

    Ok(out.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatRecord, UserRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubCompletion {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionPort for StubCompletion {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("summary of: {prompt}"))
        }

        async fn describe_image(&self, _prompt: &str, _image: &[u8], mime: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("an image ({mime})"))
        }
    }

    #[derive(Default)]
    struct StubStore {
        files: Mutex<Vec<FileRecord>>,
    }

    #[async_trait]
    impl StoragePort for StubStore {
        async fn upsert_user(&self, _record: &UserRecord) -> Result<()> {
            Ok(())
        }

        async fn get_user(&self, _user_id: UserId) -> Result<Option<UserRecord>> {
            Ok(None)
        }

        async fn append_chat(&self, _record: &ChatRecord) -> Result<()> {
            Ok(())
        }

        async fn append_file(&self, record: &FileRecord) -> Result<()> {
            self.files.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn one_page_pdf(line: &str) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("serialize pdf");
        buf
    }

    #[tokio::test]
    async fn unsupported_file_makes_no_call_and_no_record() {
        let completion = StubCompletion::default();
        let store = StubStore::default();

        let reply = handle_file(
            &completion,
            &store,
            UserId(123),
            "archive.zip",
            FileCategory::Unsupported,
            &[0u8; 16],
        )
        .await
        .unwrap();

        assert_eq!(reply, UNSUPPORTED_REPLY);
        assert_eq!(completion.calls.load(Ordering::SeqCst), 0);
        assert!(store.files.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_is_described_and_recorded() {
        let completion = StubCompletion::default();
        let store = StubStore::default();

        let reply = handle_file(
            &completion,
            &store,
            UserId(123),
            "pic.png",
            FileCategory::Image,
            &[0u8; 16],
        )
        .await
        .unwrap();

        assert_eq!(reply, "an image (image/png)");
        let files = store.files.lock().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].category, FileCategory::Image);
        assert_eq!(files[0].file_name, "pic.png");
        assert_eq!(files[0].description, reply);
    }

    #[tokio::test]
    async fn pdf_text_reaches_the_completion_prompt() {
        let completion = StubCompletion::default();
        let store = StubStore::default();
        let pdf = one_page_pdf("Q1 results");

        let reply = handle_file(
            &completion,
            &store,
            UserId(123),
            "report.pdf",
            FileCategory::Pdf,
            &pdf,
        )
        .await
        .unwrap();

        assert!(reply.contains("Q1 results"), "got: {reply}");
        assert_eq!(store.files.lock().unwrap().len(), 1);
    }

    #[test]
    fn extracts_text_from_a_real_pdf() {
        let pdf = one_page_pdf("Q1 results");
        let text = extract_pdf_text(&pdf).unwrap();
        assert!(text.contains("Q1 results"), "got: {text:?}");
    }

    #[test]
    fn garbage_bytes_are_rejected_as_invalid_input() {
        let err = extract_pdf_text(b"not a pdf").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn empty_document_gets_the_marker_payload() {
        let prompt = pdf_prompt("blank.pdf", "   \n ");
        assert!(prompt.contains(EMPTY_DOCUMENT_MARKER));

        let prompt = pdf_prompt("report.pdf", "Q1 results");
        assert!(!prompt.contains(EMPTY_DOCUMENT_MARKER));
        assert!(prompt.contains("Q1 results"));
    }

    #[test]
    fn image_mime_follows_extension() {
        assert_eq!(image_mime("a.png"), "image/png");
        assert_eq!(image_mime("a.jpg"), "image/jpeg");
        assert_eq!(image_mime("image.jpg"), "image/jpeg");
    }
}
