//! MIME body extraction
//!
//! Decodes a raw RFC822 message with `mailparse` and pulls out the
//! `text/html` and `text/plain` bodies the analyzer needs. Attachments and
//! nested parts beyond these two are skipped and counted, matching the
//! scan subsystem's phase-2 contract (spec §4.J).

use mailparse::ParsedMail;

use crate::errors::{AppError, AppResult};

/// The decoded bodies of a message, plus how many parts were skipped
/// (attachments, or a second `text/html`/`text/plain` part once one of
/// each has already been captured).
#[derive(Debug, Clone, Default)]
pub struct MessageBodies {
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub skipped_parts: usize,
}

/// Parse a raw RFC822 message and extract its `text/html` and
/// `text/plain` bodies.
///
/// Content-Transfer-Encoding (quoted-printable, base64) is decoded by
/// `mailparse::get_body`. If a `text/html` part exists it is preferred;
/// `text/plain` is always captured too when present, since
/// `LinkMismatchCheck` and friends only need HTML but a missing HTML body
/// should not leave `ParsedEmail` with no body at all.
pub fn extract_bodies(raw: &[u8]) -> AppResult<MessageBodies> {
    let parsed = mailparse::parse_mail(raw)
        .map_err(|e| AppError::Parse(format!("failed to parse RFC822 message: {e}")))?;

    let mut bodies = MessageBodies::default();
    walk_parts(&parsed, &mut bodies);
    Ok(bodies)
}

fn walk_parts(part: &ParsedMail<'_>, bodies: &mut MessageBodies) {
    if part.subparts.is_empty() {
        let ctype = part.ctype.mimetype.to_ascii_lowercase();
        let is_attachment = part.get_content_disposition().disposition
            == mailparse::DispositionType::Attachment;

        if is_attachment {
            bodies.skipped_parts += 1;
            return;
        }

        if ctype == "text/html" {
            match (&bodies.html_body, part.get_body()) {
                (None, Ok(html)) => bodies.html_body = Some(html),
                _ => bodies.skipped_parts += 1,
            }
        } else if ctype == "text/plain" {
            match (&bodies.text_body, part.get_body()) {
                (None, Ok(text)) => bodies.text_body = Some(text),
                _ => bodies.skipped_parts += 1,
            }
        } else {
            bodies.skipped_parts += 1;
        }
        return;
    }

    for sub in &part.subparts {
        walk_parts(sub, bodies);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_text_body() {
        let raw = b"From: a@example.com\r\nSubject: hi\r\n\r\nhello";
        let bodies = extract_bodies(raw).unwrap();
        assert_eq!(bodies.text_body.as_deref(), Some("hello"));
        assert!(bodies.html_body.is_none());
    }

    #[test]
    fn extracts_html_body_from_multipart_alternative() {
        let raw = b"From: a@example.com\r\nSubject: hi\r\nContent-Type: multipart/alternative; boundary=XYZ\r\n\r\n--XYZ\r\nContent-Type: text/plain\r\n\r\nplain text\r\n--XYZ\r\nContent-Type: text/html\r\n\r\n<p>html</p>\r\n--XYZ--\r\n";
        let bodies = extract_bodies(raw).unwrap();
        assert_eq!(bodies.text_body.as_deref(), Some("plain text"));
        assert_eq!(bodies.html_body.as_deref(), Some("<p>html</p>"));
    }

    #[test]
    fn counts_attachment_as_skipped() {
        let raw = b"From: a@example.com\r\nSubject: hi\r\nContent-Type: multipart/mixed; boundary=XYZ\r\n\r\n--XYZ\r\nContent-Type: text/plain\r\n\r\nbody\r\n--XYZ\r\nContent-Type: application/pdf\r\nContent-Disposition: attachment; filename=\"a.pdf\"\r\n\r\n%PDF-fake\r\n--XYZ--\r\n";
        let bodies = extract_bodies(raw).unwrap();
        assert_eq!(bodies.text_body.as_deref(), Some("body"));
        assert_eq!(bodies.skipped_parts, 1);
    }
}
