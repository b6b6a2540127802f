/// Overlapping character-window splitter.
///
/// Windows end on the last paragraph break, line break or space in their
/// second half when one exists, and the next window starts `chunk_overlap`
/// characters before the previous end.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
        }
    }
}

const SEPARATORS: &[&str] = &["\n\n", "\n", " "];

impl TextSplitter {
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let size = self.chunk_size.max(1);
        let overlap = self.chunk_overlap.min(size - 1);

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < chars.len() {
            let hard_end = (start + size).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                preferred_break(&chars[start..hard_end])
                    .map(|offset| start + offset)
                    .unwrap_or(hard_end)
            };

            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_owned());
            }
            if end == chars.len() {
                break;
            }
            start = end.saturating_sub(overlap).max(start + 1);
        }
        chunks
    }
}

/// Offset just past the last separator in the window's second half.
fn preferred_break(window: &[char]) -> Option<usize> {
    let half = window.len() / 2;
    SEPARATORS.iter().find_map(|sep| {
        let sep: Vec<char> = sep.chars().collect();
        (half..window.len().saturating_sub(sep.len() - 1))
            .rev()
            .find(|&i| window[i..].starts_with(&sep))
            .map(|i| i + sep.len())
    })
}
