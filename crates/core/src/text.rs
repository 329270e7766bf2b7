//! Small text helpers shared by the classifier, handlers and quote engine.

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Remove markdown code-fence markers models like to wrap JSON in.
pub fn strip_code_fences(content: &str) -> String {
    let mut cleaned = content.to_string();
    for marker in ["```json", "```JSON", "```"] {
        cleaned = cleaned.replace(marker, "");
    }
    cleaned.trim().to_string()
}

/// Lower-case and fold the French accented letters onto ASCII, for keyword matching.
pub fn fold_for_matching(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|ch| match ch {
            'à' | 'â' | 'ä' | 'á' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' => 'i',
            'ô' | 'ö' | 'ó' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ç' => 'c',
            '’' | '`' => '\'',
            other => other,
        })
        .collect()
}

/// Heuristic for a `message` that is really a JSON object rendered as text.
pub fn looks_like_json_object(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}
