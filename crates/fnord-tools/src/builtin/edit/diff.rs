use anyhow::{bail, Result};
use similar::TextDiff;

/// Builds a standard unified diff (`---`/`+++`/`@@` headers) between two
/// in-memory file contents using `similar`'s line-oriented diffing.
pub fn unified_diff(file_path: &str, original: &str, updated: &str) -> String {
    let diff = TextDiff::from_lines(original, updated);
    diff.unified_diff()
        .context_radius(3)
        .header(&format!("a/{file_path}"), &format!("b/{file_path}"))
        .to_string()
}

/// Applies a unified diff produced by [`unified_diff`] (or an equivalent
/// one) to `original`, returning the patched content. Supports single-file
/// diffs with standard `@@ -a,b +c,d @@` hunk headers.
pub fn apply_unified_diff(original: &str, patch: &str) -> Result<String> {
    let original_lines: Vec<&str> = original.split_inclusive('\n').collect();
    let mut output = String::new();
    let mut cursor = 0usize; // index into original_lines already emitted

    let mut lines = patch.lines().peekable();
    while let Some(line) = lines.next() {
        if !line.starts_with("@@") {
            continue;
        }
        let header = parse_hunk_header(line)?;
        // Emit unchanged context up to the hunk's start.
        while cursor < header.old_start.saturating_sub(1) && cursor < original_lines.len() {
            output.push_str(original_lines[cursor]);
            cursor += 1;
        }

        loop {
            let Some(&body_line) = lines.peek() else { break };
            if body_line.starts_with("@@") {
                break;
            }
            lines.next();
            if body_line.is_empty() {
                continue;
            }
            let (tag, text) = body_line.split_at(1);
            match tag {
                " " => {
                    if cursor >= original_lines.len() {
                        bail!("patch context extends past end of file");
                    }
                    output.push_str(original_lines[cursor]);
                    cursor += 1;
                }
                "-" => {
                    if cursor >= original_lines.len() {
                        bail!("patch removes a line past end of file");
                    }
                    let _ = text;
                    cursor += 1;
                }
                "+" => {
                    output.push_str(text);
                    output.push('\n');
                }
                _ => bail!("malformed hunk body line: {body_line}"),
            }
        }
    }

    while cursor < original_lines.len() {
        output.push_str(original_lines[cursor]);
        cursor += 1;
    }

    Ok(output)
}

struct HunkHeader {
    old_start: usize,
}

fn parse_hunk_header(line: &str) -> Result<HunkHeader> {
    // `@@ -old_start,old_len +new_start,new_len @@`
    let inner = line
        .trim_start_matches("@@")
        .trim_end_matches("@@")
        .trim();
    let old_part = inner
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow::anyhow!("malformed hunk header: {line}"))?;
    let old_start_str = old_part.trim_start_matches('-').split(',').next().unwrap_or("1");
    let old_start: usize = old_start_str.parse().unwrap_or(1);
    Ok(HunkHeader { old_start })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_diff_and_apply_round_trip() {
        let original = "one\ntwo\nthree\n";
        let updated = "one\nTWO\nthree\nfour\n";
        let patch = unified_diff("a.rs", original, updated);
        assert!(patch.contains("-two"));
        assert!(patch.contains("+TWO"));

        let applied = apply_unified_diff(original, &patch).unwrap();
        assert_eq!(applied, updated);
    }

    #[test]
    fn test_no_changes_produces_empty_diff() {
        let patch = unified_diff("a.rs", "same\n", "same\n");
        assert!(patch.is_empty());
    }
}
