//! Inbound event classification.

use crate::domain::{ChatId, FileCategory, UserId};

/// Profile of the message sender, as reported by the transport.
#[derive(Clone, Debug)]
pub struct Sender {
    pub id: UserId,
    pub display_name: String,
    pub handle: Option<String>,
}

/// File payload already fetched by the transport adapter.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub name: Option<String>,
    /// Photo-typed by the transport, as opposed to a generic document.
    pub photo: bool,
    pub data: Vec<u8>,
}

/// Raw inbound event as delivered by the messaging transport.
#[derive(Clone, Debug)]
pub struct InboundEvent {
    pub chat: ChatId,
    pub sender: Sender,
    /// Message body, or the attachment caption.
    pub text: Option<String>,
    /// Phone number from a structured contact payload.
    pub contact: Option<String>,
    pub attachment: Option<Attachment>,
}

/// One classified unit of work.
#[derive(Clone, Debug)]
pub enum Event {
    Command {
        name: String,
        args: Vec<String>,
    },
    Contact {
        phone: String,
    },
    File {
        name: String,
        category: FileCategory,
        data: Vec<u8>,
    },
    Text {
        body: String,
    },
}

/// Classify a raw event into exactly one variant.
///
/// Total: every event classifies, never errors. Priority order: contact
/// payloads win, then command-prefixed text, then attachments, then plain
/// text (possibly empty).
pub fn classify(event: InboundEvent) -> Event {
    if let Some(phone) = event.contact {
        return Event::Contact { phone };
    }

    if let Some(text) = event.text.as_deref() {
        if text.trim_start().starts_with('/') {
            let (name, args) = parse_command(text);
            return Event::Command { name, args };
        }
    }

    if let Some(attachment) = event.attachment {
        let category = classify_attachment(attachment.name.as_deref(), attachment.photo);
        let name = attachment
            .name
            .unwrap_or_else(|| default_file_name(attachment.photo).to_string());
        return Event::File {
            name,
            category,
            data: attachment.data,
        };
    }

    Event::Text {
        body: event.text.unwrap_or_default(),
    }
}

fn default_file_name(photo: bool) -> &'static str {
    if photo {
        "image.jpg"
    } else {
        "document"
    }
}

/// Telegram may send `/cmd@botname arg1 ...`.
fn parse_command(text: &str) -> (String, Vec<String>) {
    let mut parts = text.trim().split_whitespace();
    let first = parts.next().unwrap_or("");

    let name = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();
    let args = parts.map(|s| s.to_string()).collect();

    (name, args)
}

fn classify_attachment(name: Option<&str>, photo: bool) -> FileCategory {
    let Some(ext) = name.and_then(extension) else {
        // Photos often arrive without a file name; anything else without an
        // extension cannot be routed.
        return if photo {
            FileCategory::Image
        } else {
            FileCategory::Unsupported
        };
    };

    match ext.as_str() {
        "jpg" | "jpeg" | "png" => FileCategory::Image,
        "pdf" => FileCategory::Pdf,
        _ => FileCategory::Unsupported,
    }
}

fn extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Sender {
        Sender {
            id: UserId(123),
            display_name: "Test".to_string(),
            handle: Some("test".to_string()),
        }
    }

    fn event() -> InboundEvent {
        InboundEvent {
            chat: ChatId(123),
            sender: sender(),
            text: None,
            contact: None,
            attachment: None,
        }
    }

    #[test]
    fn contact_wins_over_everything() {
        let mut ev = event();
        ev.text = Some("/start".to_string());
        ev.contact = Some("+15551234".to_string());

        match classify(ev) {
            Event::Contact { phone } => assert_eq!(phone, "+15551234"),
            other => panic!("expected contact, got {other:?}"),
        }
    }

    #[test]
    fn command_prefix_beats_attachment() {
        let mut ev = event();
        ev.text = Some("/websearch cats dogs".to_string());
        ev.attachment = Some(Attachment {
            name: Some("report.pdf".to_string()),
            photo: false,
            data: vec![1, 2, 3],
        });

        match classify(ev) {
            Event::Command { name, args } => {
                assert_eq!(name, "websearch");
                assert_eq!(args, vec!["cats".to_string(), "dogs".to_string()]);
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn command_strips_bot_mention_and_lowercases() {
        let mut ev = event();
        ev.text = Some("/Start@SomeBot".to_string());

        match classify(ev) {
            Event::Command { name, args } => {
                assert_eq!(name, "start");
                assert!(args.is_empty());
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn extensions_map_to_categories() {
        assert_eq!(classify_attachment(Some("photo.JPG"), false), FileCategory::Image);
        assert_eq!(classify_attachment(Some("scan.jpeg"), false), FileCategory::Image);
        assert_eq!(classify_attachment(Some("pic.png"), false), FileCategory::Image);
        assert_eq!(classify_attachment(Some("report.pdf"), false), FileCategory::Pdf);
        assert_eq!(
            classify_attachment(Some("archive.zip"), false),
            FileCategory::Unsupported
        );
    }

    #[test]
    fn missing_extension_defaults_to_image_only_for_photos() {
        assert_eq!(classify_attachment(None, true), FileCategory::Image);
        assert_eq!(classify_attachment(None, false), FileCategory::Unsupported);
        assert_eq!(classify_attachment(Some("notes"), false), FileCategory::Unsupported);
    }

    #[test]
    fn unnamed_photo_gets_a_fallback_name() {
        let mut ev = event();
        ev.attachment = Some(Attachment {
            name: None,
            photo: true,
            data: vec![0xff],
        });

        match classify(ev) {
            Event::File { name, category, data } => {
                assert_eq!(name, "image.jpg");
                assert_eq!(category, FileCategory::Image);
                assert_eq!(data, vec![0xff]);
            }
            other => panic!("expected file, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_classifies_as_text() {
        let mut ev = event();
        ev.text = Some("Hello".to_string());

        match classify(ev) {
            Event::Text { body } => assert_eq!(body, "Hello"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn empty_event_still_classifies() {
        match classify(event()) {
            Event::Text { body } => assert!(body.is_empty()),
            other => panic!("expected empty text, got {other:?}"),
        }
    }
}
