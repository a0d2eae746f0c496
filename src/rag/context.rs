use crate::models::Passage;

/// Join passage contents in retrieval order, separated by a blank line.
pub fn format_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
