// Text helpers shared by the Discord handlers.

use crate::core::calendar::CalendarError;
use crate::core::credentials::CredentialError;
use crate::core::mail::MailError;
use crate::core::workers::PoolError;

/// Discord rejects messages longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

const RELOGIN_HINT: &str = "Please use /login to connect your Google account again.";

/// Escape Discord markdown so user-controlled text (subjects, senders,
/// snippets) is shown literally.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '~' | '`' | '|' | '>' | '#' | '[' | ']' | '(' | ')' | '-') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    // Keep mentions inert.
    escaped.replace('@', "@\u{200B}")
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Split a long reply into pieces Discord will accept, preferring to break
/// at line ends.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            // A single line longer than the limit gets hard-split.
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                let piece: String = piece.iter().collect();
                if piece.chars().count() == limit {
                    chunks.push(piece);
                } else {
                    current_len = piece.chars().count();
                    current = piece;
                }
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub fn credential_problem(err: &CredentialError) -> String {
    match err {
        CredentialError::NotAuthorized => {
            "🔐 No Google account is connected yet. Use /login first.".to_string()
        }
        CredentialError::Expired | CredentialError::RefreshFailed(_) => {
            format!("🔐 Your Google authorization has expired. {}", RELOGIN_HINT)
        }
        CredentialError::Storage(detail) => {
            format!("❌ Error reading your saved Google login: {}", detail)
        }
    }
}

pub fn mail_problem(context: &str, err: &MailError) -> String {
    match err {
        MailError::Unauthorized => format!("🔐 Gmail rejected your saved login. {}", RELOGIN_HINT),
        other => format!("❌ Error {}: {}", context, other),
    }
}

pub fn calendar_problem(err: &CalendarError) -> String {
    match err {
        CalendarError::Unauthorized => {
            format!("🔐 Google Calendar rejected your saved login. {}", RELOGIN_HINT)
        }
        other => format!("❌ Error creating calendar event: {}", other),
    }
}

pub fn pool_problem(err: &PoolError) -> String {
    format!("❌ Error: {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("**Exam** _today_"), "\\*\\*Exam\\*\\* \\_today\\_");
        assert_eq!(escape_markdown("ping @everyone"), "ping @\u{200B}everyone");
        assert_eq!(escape_markdown("plain text"), "plain text");
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("ééééé", 3), "éé…");
        assert_eq!(truncate_chars(&"a".repeat(300), 200).chars().count(), 200);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_message("present: 10\nabsent: 2", 2000), vec!["present: 10\nabsent: 2"]);
        assert!(chunk_message("", 2000).is_empty());
    }

    #[test]
    fn test_chunks_break_on_lines_and_respect_limit() {
        let text = (0..400).map(|i| format!("subject {}: 75%\n", i)).collect::<String>();
        let chunks = chunk_message(&text, DISCORD_MESSAGE_LIMIT);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= DISCORD_MESSAGE_LIMIT));
        assert!(chunks.iter().all(|c| c.ends_with('\n')));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_oversized_line_is_hard_split() {
        let text = "x".repeat(4500);
        let chunks = chunk_message(&text, 2000);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![2000, 2000, 500]);
    }

    #[test]
    fn test_error_rendering() {
        assert!(credential_problem(&CredentialError::NotAuthorized).contains("/login"));
        assert!(credential_problem(&CredentialError::Expired).contains("/login"));
        assert_eq!(
            mail_problem("fetching emails", &MailError::Api("HTTP 500".to_string())),
            "❌ Error fetching emails: Gmail API error: HTTP 500"
        );
        assert!(calendar_problem(&CalendarError::Unauthorized).starts_with("🔐"));
    }
}
