//! Quote-aware command segmentation
//!
//! Splits a compound shell line into sub-commands at unquoted `&&`, `||`,
//! `;`, `|` and newlines. Single quotes, double quotes and backslash escapes
//! are tracked so `echo "a && b"` stays a single sub-command.
//!
//! This is not a shell parser. There is no expansion and no subshell
//! tracking: `$(a && b)` splits like any other text outside quotes.

use std::iter::FusedIterator;

/// Split a command line into trimmed, non-empty sub-commands, in source order.
///
/// The returned iterator is lazy; call this again to restart from the top.
pub fn split_commands(line: &str) -> Segments<'_> {
    Segments {
        line,
        pos: 0,
        pending: Vec::new(),
    }
}

/// A heredoc whose body has not been reached yet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Heredoc {
    delimiter: String,
    /// `<<-` form: leading tabs are ignored on the terminator line
    strip_tabs: bool,
}

impl Heredoc {
    fn terminated_by(&self, line: &str) -> bool {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let line = if self.strip_tabs {
            line.trim_start_matches('\t')
        } else {
            line
        };
        line == self.delimiter
    }
}

/// Iterator over the sub-commands of one command line.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    line: &'a str,
    pos: usize,
    pending: Vec<Heredoc>,
}

impl<'a> Segments<'a> {
    /// Scan one raw segment from `self.pos`.
    ///
    /// Returns the end offset of the segment and moves `self.pos` past the
    /// operator that closed it. Every offset returned sits on an ASCII byte
    /// or at the end of input, so slicing never splits a UTF-8 sequence.
    fn scan(&mut self) -> usize {
        let bytes = self.line.as_bytes();
        let (mut single, mut double, mut escaped) = (false, false, false);
        // Inside `# ...` quotes and heredocs mean nothing; operators still
        // split so a misread comment can only yield more sub-commands.
        let mut comment = false;
        // Open parens of an arithmetic `((...))`, where `<<` is a shift
        let mut arith = 0usize;
        let mut i = self.pos;

        while i < bytes.len() {
            let b = bytes[i];

            if escaped {
                escaped = false;
                i += 1;
                continue;
            }

            match b {
                b'\\' if !single && !comment => escaped = true,
                b'\'' if !double && !comment => single = !single,
                b'"' if !single && !comment => double = !double,
                _ if single || double => {}
                b'#' if !comment && starts_word(bytes, self.pos, i) => comment = true,
                b'(' if arith > 0 => arith += 1,
                b'(' if !comment && bytes.get(i + 1) == Some(&b'(') => {
                    arith = 2;
                    i += 2;
                    continue;
                }
                b')' if arith > 0 => arith -= 1,
                b'&' | b'|' if bytes.get(i + 1) == Some(&b) => {
                    self.pos = i + 2;
                    return i;
                }
                b';' | b'|' => {
                    self.pos = i + 1;
                    return i;
                }
                b'\n' => {
                    if let Some((end, resume)) = self.fold_heredocs(i + 1) {
                        self.pos = resume;
                        return end;
                    }
                    self.pos = i + 1;
                    return i;
                }
                b'<' if !comment
                    && arith == 0
                    && bytes.get(i + 1) == Some(&b'<')
                    && starts_word(bytes, self.pos, i) =>
                {
                    if let Some((heredoc, next)) = parse_heredoc(self.line, i) {
                        tracing::trace!(delimiter = %heredoc.delimiter, "heredoc opened");
                        self.pending.push(heredoc);
                        i = next;
                        continue;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        self.pos = bytes.len();
        bytes.len()
    }

    /// Consume the bodies of all pending heredocs starting at `body_start`.
    ///
    /// Returns `(end of last terminator line, offset after it)`. If any
    /// terminator is missing nothing is folded and the pending list is
    /// dropped, so the newline splits as usual.
    fn fold_heredocs(&mut self, body_start: usize) -> Option<(usize, usize)> {
        if self.pending.is_empty() {
            return None;
        }
        let pending = std::mem::take(&mut self.pending);

        let mut cursor = body_start;
        let mut end = body_start;
        for heredoc in &pending {
            loop {
                if cursor >= self.line.len() {
                    return None;
                }
                let rest = &self.line[cursor..];
                let (body_line, consumed) = match rest.find('\n') {
                    Some(n) => (&rest[..n], n + 1),
                    None => (rest, rest.len()),
                };
                let line_end = cursor + body_line.len();
                cursor += consumed;
                if heredoc.terminated_by(body_line) {
                    end = line_end;
                    break;
                }
            }
        }

        Some((end, cursor))
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let line = self.line;
        while self.pos < line.len() {
            let start = self.pos;
            let end = self.scan();
            let segment = line[start..end].trim();
            if !segment.is_empty() {
                return Some(segment);
            }
        }
        None
    }
}

impl FusedIterator for Segments<'_> {}

/// Whether byte `i` begins a word: segment start, after blanks or after an
/// operator character. `cat<<EOF` is therefore not folded.
fn starts_word(bytes: &[u8], segment_start: usize, i: usize) -> bool {
    i == segment_start
        || matches!(
            bytes[i - 1],
            b' ' | b'\t' | b'\r' | b'\n' | b';' | b'&' | b'|' | b'('
        )
}

/// Parse a heredoc redirection whose `<<` starts at byte `at`.
///
/// Accepts `<<WORD`, `<<-WORD`, `<<'WORD'` and `<<"WORD"` where WORD is an
/// identifier. Here-strings (`<<<`) and anything else return `None`.
fn parse_heredoc(line: &str, at: usize) -> Option<(Heredoc, usize)> {
    let bytes = line.as_bytes();
    if at > 0 && bytes[at - 1] == b'<' {
        return None;
    }

    let mut i = at + 2;
    if bytes.get(i) == Some(&b'<') {
        return None;
    }
    let strip_tabs = bytes.get(i) == Some(&b'-');
    if strip_tabs {
        i += 1;
    }
    while matches!(bytes.get(i), Some(b' ' | b'\t')) {
        i += 1;
    }

    let quote = match bytes.get(i) {
        Some(&q @ (b'\'' | b'"')) => {
            i += 1;
            Some(q)
        }
        _ => None,
    };

    let start = i;
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
    {
        i += 1;
    }
    let delimiter = &line[start..i];
    if !delimiter.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return None;
    }

    if let Some(q) = quote {
        if bytes.get(i) != Some(&q) {
            return None;
        }
        i += 1;
    }

    Some((
        Heredoc {
            delimiter: delimiter.to_string(),
            strip_tabs,
        },
        i,
    ))
}
