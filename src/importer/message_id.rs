//! Message identifier lookup

const HEADER: &str = "Message-ID:";

/// Identifier from the first line starting with `Message-ID:` (case-insensitive).
///
/// Returns `None` when there is no such line or its value is blank.
pub fn extract_message_id(contents: &str) -> Option<&str> {
    let line = contents.lines().find(|line| {
        line.get(..HEADER.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(HEADER))
    })?;

    let id = line[HEADER.len()..].trim();
    (!id.is_empty()).then_some(id)
}
