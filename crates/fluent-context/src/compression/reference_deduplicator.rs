//! Reference Deduplicator strategy (C6).
//!
//! Lossless: repeated N-line windows across the corpus are hashed with
//! SHA-256, assigned a shared `@REFk@` id, and replaced in place by a
//! single-line reference comment. `decompress` re-inserts the originals
//! from the shared map and strips the per-file headers.

use std::collections::HashMap;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::compression::strategy::{char_count_total, compression_ratio, language_of, CompressionConfig, CompressionOutput, CompressionStrategy};
use crate::token::Language;

const MIN_CONTENT_LEN: usize = 10;

fn comment_prefix(language: Language) -> &'static str {
    match language {
        Language::Python | Language::Ruby => "#",
        _ => "//",
    }
}

fn header_marker(prefix: &str) -> String {
    format!("{prefix} Reference Deduplication:")
}

fn reference_marker(prefix: &str, id: &str) -> String {
    format!("{prefix} @{id}@ - Reference to a repeated pattern")
}

fn hash_window(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{digest:x}")
}

fn adaptive_window(total_lines: usize, configured: usize) -> usize {
    if total_lines < 20 {
        2
    } else if total_lines < 50 {
        5
    } else {
        configured.max(1)
    }
}

pub struct ReferenceDeduplicator;

impl CompressionStrategy for ReferenceDeduplicator {
    fn name(&self) -> &'static str {
        "reference_deduplicator"
    }

    fn compress(&self, code_context: &Map<String, Value>, config: &CompressionConfig) -> CompressionOutput {
        let original_size = char_count_total(code_context);

        let file_lines: Vec<(String, Vec<&str>)> = code_context
            .iter()
            .map(|(p, v)| (p.clone(), v.as_str().unwrap_or_default().lines().collect::<Vec<_>>()))
            .collect();

        let total_lines: usize = file_lines.iter().map(|(_, l)| l.len()).sum();
        let window = adaptive_window(total_lines, config.dedup_window);

        // Pass 1: count window occurrences by hash.
        let mut occurrences: HashMap<String, (String, usize)> = HashMap::new();
        for (_, lines) in &file_lines {
            if lines.len() < window {
                continue;
            }
            for start in 0..=(lines.len() - window) {
                let text = lines[start..start + window].join("\n");
                if text.chars().count() <= MIN_CONTENT_LEN {
                    continue;
                }
                let h = hash_window(&text);
                let entry = occurrences.entry(h).or_insert((text, 0));
                entry.1 += 1;
            }
        }

        // Eligible hashes (repeated, long enough); ids are assigned lazily
        // in pass 2 at first actual replacement, so only windows genuinely
        // substituted end up with a reference entry.
        let eligible: HashMap<String, String> = occurrences
            .into_iter()
            .filter(|(_, (_, count))| *count > 1)
            .map(|(hash, (text, _))| (hash, text))
            .collect();

        let mut ref_map: HashMap<String, (String, String)> = HashMap::new(); // hash -> (id, text)
        let mut next_id = 1usize;

        // Pass 2: greedy non-overlapping replacement per file.
        let mut new_code = Map::new();
        let mut total_replacements = 0usize;

        for (path, lines) in &file_lines {
            let language = language_of(path);
            let prefix = comment_prefix(language);
            let mut out_lines = Vec::new();
            let mut i = 0usize;
            let mut file_replacements = 0usize;

            while i < lines.len() {
                if window > 0 && i + window <= lines.len() {
                    let text = lines[i..i + window].join("\n");
                    let h = hash_window(&text);
                    if let Some(stored) = eligible.get(&h) {
                        if *stored == text {
                            let id = ref_map
                                .entry(h.clone())
                                .or_insert_with(|| {
                                    let id = format!("REF{next_id}");
                                    next_id += 1;
                                    (id, text.clone())
                                })
                                .0
                                .clone();
                            out_lines.push(reference_marker(prefix, &id));
                            i += window;
                            file_replacements += 1;
                            continue;
                        }
                    }
                }
                out_lines.push(lines[i].to_string());
                i += 1;
            }

            total_replacements += file_replacements;
            let header = format!("{} {file_replacements} replacement(s)", header_marker(prefix));
            let body = if file_replacements > 0 {
                format!("{header}\n{}", out_lines.join("\n"))
            } else {
                out_lines.join("\n")
            };
            new_code.insert(path.clone(), Value::String(body));
        }

        let compressed_size = char_count_total(&new_code);
        let shared_map: Map<String, Value> = ref_map
            .values()
            .map(|(id, text)| (id.clone(), Value::String(text.clone())))
            .collect();

        CompressionOutput {
            code_context: new_code,
            original_size,
            compressed_size,
            extra_metadata: serde_json::json!({
                "reference_map": shared_map,
                "window": window,
                "total_replacements": total_replacements,
            }),
        }
    }

    fn decompress(&self, code_context: &Map<String, Value>, strategy_metadata: &Value) -> (Map<String, Value>, Value) {
        let ref_map = strategy_metadata
            .get("reference_map")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let mut restored = Map::new();
        for (path, value) in code_context {
            let content = value.as_str().unwrap_or_default();
            let mut lines: Vec<&str> = content.lines().collect();

            // Strip the per-file header line, if present.
            if let Some(first) = lines.first() {
                if first.contains("Reference Deduplication:") {
                    lines.remove(0);
                }
            }

            let mut out_lines: Vec<String> = Vec::new();
            for line in lines {
                let trimmed = line.trim();
                if let Some(rest) = trimmed.strip_prefix("// @").or_else(|| trimmed.strip_prefix("# @")) {
                    if let Some(end) = rest.find('@') {
                        let id = &rest[..end];
                        if let Some(original) = ref_map.get(id).and_then(|v| v.as_str()) {
                            out_lines.push(original.to_string());
                            continue;
                        }
                    }
                }
                out_lines.push(line.to_string());
            }

            restored.insert(path.clone(), Value::String(out_lines.join("\n")));
        }

        let note = serde_json::json!({
            "strategy": "reference_deduplication",
            "reversible": true,
            "note": "lossless when window hashes are collision-free for the inputs",
        });
        (restored, note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeated_block() -> String {
        (0..12).map(|i| format!("    helper_line_{i}()")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn s4_round_trip_is_byte_exact() {
        let block = repeated_block();
        let mut code = Map::new();
        for name in ["a.py", "b.py", "c.py", "d.py"] {
            let content = format!("def f():\n{block}\n    return 1\n");
            code.insert(name.to_string(), Value::from(content));
        }

        let strategy = ReferenceDeduplicator;
        let config = CompressionConfig { dedup_window: 10, ..Default::default() };
        let compressed = strategy.compress(&code, &config);

        assert_eq!(compressed.extra_metadata["reference_map"].as_object().unwrap().len(), 1);

        let (decompressed, _note) = strategy.decompress(&compressed.code_context, &compressed.extra_metadata);
        for name in ["a.py", "b.py", "c.py", "d.py"] {
            assert_eq!(decompressed[name], code[name]);
        }
    }
}
