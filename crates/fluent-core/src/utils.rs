// crates/fluent-core/src/utils.rs
pub mod chunking {
    use unicode_segmentation::UnicodeSegmentation;

    pub const CHUNK_SIZE: usize = 1000;
    pub const CHUNK_OVERLAP: usize = 200;

    /// Split `content` into overlapping word-count windows, honoring the
    /// module defaults. `fluent-context`'s embedding configuration exposes
    /// these as the tunable `chunk_size`/`chunk_overlap` parameters.
    pub fn chunk_document(content: &str) -> Vec<String> {
        chunk_with(content, CHUNK_SIZE, CHUNK_OVERLAP)
    }

    pub fn chunk_with(content: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
        let words: Vec<&str> = content.unicode_words().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < words.len() {
            let end = (start + chunk_size).min(words.len());
            let chunk = words[start..end].join(" ");
            chunks.push(chunk);

            if end == words.len() {
                break;
            }

            start = if end > chunk_overlap { end - chunk_overlap } else { 0 };
        }

        chunks
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn chunks_respect_overlap() {
            let text = (0..50).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
            let chunks = chunk_with(&text, 10, 2);
            assert!(chunks.len() > 1);
        }
    }
}
