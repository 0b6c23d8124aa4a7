use crate::tree::{NodeKind, SourceSpan, SourceUnit};
use crate::types::Chunk;

/// Fixed-size, non-overlapping line windows over a source unit
pub struct LineWindows {
    window_lines: usize,
}

impl LineWindows {
    pub fn new(window_lines: usize) -> Self {
        Self {
            window_lines: window_lines.max(1),
        }
    }

    /// Split the unit into windows; empty input yields one empty chunk
    pub fn chunk(&self, unit: &SourceUnit) -> Vec<Chunk> {
        let text = unit.text.as_str();
        let mut line_starts: Vec<usize> = Vec::new();
        let mut offset = 0usize;
        for line in text.split_inclusive('\n') {
            line_starts.push(offset);
            offset += line.len();
        }

        if line_starts.is_empty() {
            let span = SourceSpan {
                start_byte: 0,
                end_byte: 0,
                start_line: 1,
                end_line: 1,
            };
            return vec![window_chunk(unit, span, "")];
        }

        let total_lines = line_starts.len();
        let mut chunks = Vec::with_capacity(total_lines.div_ceil(self.window_lines));
        let mut start = 0usize;

        while start < total_lines {
            let end = (start + self.window_lines).min(total_lines);
            let start_byte = line_starts[start];
            let end_byte = line_starts.get(end).copied().unwrap_or(text.len());
            let span = SourceSpan {
                start_byte,
                end_byte,
                start_line: start + 1,
                end_line: end,
            };
            chunks.push(window_chunk(unit, span, &text[start_byte..end_byte]));
            start = end;
        }

        chunks
    }
}

fn window_chunk(unit: &SourceUnit, span: SourceSpan, text: &str) -> Chunk {
    let name = format!("L{}-L{}", span.start_line, span.end_line);
    Chunk::new(
        unit.file_id.clone(),
        NodeKind::Other,
        name.clone(),
        name,
        None,
        span,
        text,
        unit.language,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use pretty_assertions::assert_eq;

    #[test]
    fn windows_are_non_overlapping_and_cover_input() {
        let text: String = (1..=7).map(|i| format!("line {i}\n")).collect();
        let unit = SourceUnit::new("notes.txt", text.clone(), Language::PlainText);
        let chunks = LineWindows::new(3).chunk(&unit);

        let names: Vec<_> = chunks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["L1-L3", "L4-L6", "L7-L7"]);

        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].span.end_byte, pair[1].span.start_byte);
        }
    }

    #[test]
    fn empty_input_yields_single_chunk() {
        let unit = SourceUnit::new("empty.py", "", Language::Python);
        let chunks = LineWindows::new(40).chunk(&unit);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
        assert_eq!(chunks[0].kind, NodeKind::Other);
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let unit = SourceUnit::new("a.md", "# T\nbody", Language::Markdown);
        let chunks = LineWindows::new(10).chunk(&unit);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "# T\nbody");
        assert_eq!(chunks[0].span.end_line, 2);
    }
}
