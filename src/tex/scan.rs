//! Byte-level scanners over LaTeX source.
//!
//! Every scanner works on a `[start, end)` window of the full source and
//! returns absolute byte offsets. All delimiters are ASCII, so every offset
//! produced here is a valid char boundary.

use crate::tex::diagnostics::{DiagnosticCode, Diagnostics};

/// Environments whose body is never scanned for nested markup.
const VERBATIM_ENVIRONMENTS: &[&str] = &["verbatim", "verbatim*", "lstlisting", "minted", "comment"];

/// Whether `pos` sits after an unescaped `%` on its line.
pub fn is_commented(src: &str, pos: usize) -> bool {
    let bytes = src.as_bytes();
    let line_start = src[..pos].rfind('\n').map_or(0, |i| i + 1);
    let mut i = line_start;
    while i < pos {
        match bytes[i] {
            b'\\' => i += 2,
            b'%' => return true,
            _ => i += 1,
        }
    }
    false
}

fn skip_whitespace(bytes: &[u8], mut pos: usize, limit: usize) -> usize {
    while pos < limit && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Read a balanced `open ... close` group starting exactly at `pos`.
///
/// Returns `(inner_start, inner_end, after)`; escaped delimiters do not count.
pub fn read_group(src: &str, pos: usize, limit: usize, open: u8, close: u8) -> Option<(usize, usize, usize)> {
    let bytes = src.as_bytes();
    if pos >= limit || bytes[pos] != open {
        return None;
    }
    let mut depth = 0usize;
    let mut i = pos;
    while i < limit {
        let b = bytes[i];
        if b == b'\\' {
            i += 2;
            continue;
        }
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some((pos + 1, i, i + 1));
            }
        }
        i += 1;
    }
    None
}

/// A command invocation `\name*[optional]{argument}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub start: usize,
    /// Offset just past the last consumed argument.
    pub end: usize,
    pub starred: bool,
    pub optional: Option<(usize, usize)>,
    pub argument: Option<(usize, usize)>,
}

impl Command {
    pub fn argument_text<'s>(&self, src: &'s str) -> Option<&'s str> {
        self.argument.map(|(s, e)| &src[s..e])
    }

    pub fn optional_text<'s>(&self, src: &'s str) -> Option<&'s str> {
        self.optional.map(|(s, e)| &src[s..e])
    }
}

/// Read the command starting at the backslash at `pos`, with its star,
/// bracket argument and first brace argument.
pub fn read_command(src: &str, pos: usize, limit: usize) -> Option<Command> {
    let bytes = src.as_bytes();
    if pos >= limit || bytes[pos] != b'\\' {
        return None;
    }
    let name_start = pos + 1;
    let mut i = name_start;
    while i < limit && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name = src[name_start..i].to_string();
    let mut end = i;

    let starred = i < limit && bytes[i] == b'*';
    if starred {
        i += 1;
        end = i;
    }

    let mut optional = None;
    let j = skip_whitespace(bytes, i, limit);
    if let Some((s, e, after)) = read_group(src, j, limit, b'[', b']') {
        optional = Some((s, e));
        i = after;
        end = after;
    }

    let mut argument = None;
    let j = skip_whitespace(bytes, i, limit);
    if let Some((s, e, after)) = read_group(src, j, limit, b'{', b'}') {
        argument = Some((s, e));
        end = after;
    }

    Some(Command {
        name,
        start: pos,
        end,
        starred,
        optional,
        argument,
    })
}

/// Iterate over every uncommented command in `[start, end)`.
///
/// `\\` (forced line break) and escaped symbols are skipped.
pub fn commands(src: &str, start: usize, end: usize) -> Vec<Command> {
    let bytes = src.as_bytes();
    let mut found = Vec::new();
    let mut i = start;
    while i < end {
        match bytes[i] {
            b'%' => {
                i = src[i..end].find('\n').map_or(end, |n| i + n + 1);
            }
            b'\\' => {
                if i + 1 < end && bytes[i + 1].is_ascii_alphabetic() {
                    if let Some(cmd) = read_command(src, i, end) {
                        let name_end = i + 1 + cmd.name.len();
                        found.push(cmd);
                        i = name_end;
                        continue;
                    }
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    found
}

/// Find the first uncommented `\name{argument}` with the given argument.
pub fn find_command_with_argument(
    src: &str,
    start: usize,
    end: usize,
    name: &str,
    argument: &str,
) -> Option<Command> {
    let needle = format!("\\{name}{{{argument}}}");
    let mut from = start;
    while let Some(rel) = src[from..end].find(&needle) {
        let pos = from + rel;
        if !is_commented(src, pos) {
            return read_command(src, pos, end);
        }
        from = pos + needle.len();
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvTokenKind {
    Begin,
    End,
}

/// A `\begin{X}` or `\end{X}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvToken {
    pub kind: EnvTokenKind,
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// Tokenise environment delimiters in `[start, end)` in one forward pass.
///
/// Verbatim-like bodies are skipped so their contents never produce tokens.
pub fn environment_tokens(src: &str, start: usize, end: usize) -> Vec<EnvToken> {
    let mut tokens = Vec::new();
    let mut skip_until = start;
    for cmd in commands(src, start, end) {
        if cmd.start < skip_until {
            continue;
        }
        let kind = match cmd.name.as_str() {
            "begin" => EnvTokenKind::Begin,
            "end" => EnvTokenKind::End,
            _ => continue,
        };
        // Only the brace group directly after the command names the environment.
        let Some((s, e, after)) = read_group(src, cmd.start + cmd.name.len() + 1, end, b'{', b'}') else {
            continue;
        };
        let name = src[s..e].trim().to_string();
        if kind == EnvTokenKind::Begin && VERBATIM_ENVIRONMENTS.contains(&name.as_str()) {
            let closing = format!("\\end{{{name}}}");
            match src[after..end].find(&closing) {
                Some(rel) => {
                    let close_start = after + rel;
                    tokens.push(EnvToken {
                        kind,
                        name: name.clone(),
                        start: cmd.start,
                        end: after,
                    });
                    tokens.push(EnvToken {
                        kind: EnvTokenKind::End,
                        name,
                        start: close_start,
                        end: close_start + closing.len(),
                    });
                    skip_until = close_start + closing.len();
                }
                None => tokens.push(EnvToken {
                    kind,
                    name,
                    start: cmd.start,
                    end: after,
                }),
            }
            continue;
        }
        tokens.push(EnvToken {
            kind,
            name,
            start: cmd.start,
            end: after,
        });
    }
    tokens
}

/// A matched `\begin{X} ... \end{X}` pair and the pairs nested inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvPair {
    pub name: String,
    /// Start of `\begin{X}`
    pub start: usize,
    /// End of `\begin{X}`
    pub inner_start: usize,
    /// Start of `\end{X}`
    pub inner_end: usize,
    /// End of `\end{X}`
    pub end: usize,
    pub children: Vec<EnvPair>,
}

impl EnvPair {
    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }
}

struct OpenFrame {
    token: EnvToken,
    children: Vec<EnvPair>,
}

/// Pair environment tokens with a stack of open names.
///
/// An `\end{X}` closes the nearest open `\begin{X}`; anything opened above it
/// is unmatched, and its already-matched children move to the enclosing
/// frame. A stray `\end{X}` with no open `\begin{X}` is reported and ignored.
pub fn match_environments(tokens: Vec<EnvToken>, diagnostics: &mut Diagnostics) -> Vec<EnvPair> {
    let mut stack: Vec<OpenFrame> = Vec::new();
    let mut roots: Vec<EnvPair> = Vec::new();

    fn attach(stack: &mut [OpenFrame], roots: &mut Vec<EnvPair>, pairs: Vec<EnvPair>) {
        match stack.last_mut() {
            Some(frame) => frame.children.extend(pairs),
            None => roots.extend(pairs),
        }
    }

    fn report_unmatched(frame: &OpenFrame, diagnostics: &mut Diagnostics) {
        diagnostics.warn(
            DiagnosticCode::UnmatchedBegin,
            Some(frame.token.start),
            format!("\\begin{{{}}} has no matching \\end", frame.token.name),
        );
    }

    for token in tokens {
        match token.kind {
            EnvTokenKind::Begin => stack.push(OpenFrame {
                token,
                children: Vec::new(),
            }),
            EnvTokenKind::End => {
                let Some(depth) = stack.iter().rposition(|f| f.token.name == token.name) else {
                    diagnostics.warn(
                        DiagnosticCode::UnmatchedEnd,
                        Some(token.start),
                        format!("\\end{{{}}} has no matching \\begin", token.name),
                    );
                    continue;
                };
                while stack.len() > depth + 1 {
                    if let Some(frame) = stack.pop() {
                        report_unmatched(&frame, diagnostics);
                        attach(&mut stack, &mut roots, frame.children);
                    }
                }
                if let Some(frame) = stack.pop() {
                    let mut children = frame.children;
                    children.sort_by_key(|p| p.start);
                    let pair = EnvPair {
                        name: frame.token.name,
                        start: frame.token.start,
                        inner_start: frame.token.end,
                        inner_end: token.start,
                        end: token.end,
                        children,
                    };
                    attach(&mut stack, &mut roots, vec![pair]);
                }
            }
        }
    }

    while let Some(frame) = stack.pop() {
        report_unmatched(&frame, diagnostics);
        attach(&mut stack, &mut roots, frame.children);
    }

    roots.sort_by_key(|p| p.start);
    roots
}

/// Math delimiter style of an equation span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathDelimiter {
    Dollar,
    DoubleDollar,
    Paren,
    Bracket,
}

impl MathDelimiter {
    pub fn as_str(self) -> &'static str {
        match self {
            MathDelimiter::Dollar => "$",
            MathDelimiter::DoubleDollar => "$$",
            MathDelimiter::Paren => "\\(",
            MathDelimiter::Bracket => "\\[",
        }
    }

    pub fn is_display(self) -> bool {
        matches!(self, MathDelimiter::DoubleDollar | MathDelimiter::Bracket)
    }

    fn closing(self) -> &'static str {
        match self {
            MathDelimiter::Dollar => "$",
            MathDelimiter::DoubleDollar => "$$",
            MathDelimiter::Paren => "\\)",
            MathDelimiter::Bracket => "\\]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathSpan {
    pub delimiter: MathDelimiter,
    pub start: usize,
    pub end: usize,
}

/// Find the closing delimiter for math opened just before `from`.
fn find_math_close(src: &str, from: usize, end: usize, delimiter: MathDelimiter) -> Option<usize> {
    let bytes = src.as_bytes();
    let closing = delimiter.closing().as_bytes();
    let mut i = from;
    while i < end {
        match bytes[i] {
            b'%' => {
                i = src[i..end].find('\n').map_or(end, |n| i + n + 1);
            }
            b'\\' => {
                if bytes[i..end].starts_with(closing) {
                    return Some(i + closing.len());
                }
                i += 2;
            }
            b'$' if bytes[i..end].starts_with(closing) => return Some(i + closing.len()),
            _ => i += 1,
        }
    }
    None
}

/// Extract inline and display math in `[start, end)`.
pub fn math_spans(src: &str, start: usize, end: usize, diagnostics: &mut Diagnostics) -> Vec<MathSpan> {
    let bytes = src.as_bytes();
    let mut spans = Vec::new();
    let mut i = start;
    while i < end {
        let opening = match bytes[i] {
            b'%' => {
                i = src[i..end].find('\n').map_or(end, |n| i + n + 1);
                continue;
            }
            b'\\' => match bytes.get(i + 1) {
                Some(b'(') if i + 1 < end => Some((MathDelimiter::Paren, 2)),
                Some(b'[') if i + 1 < end => Some((MathDelimiter::Bracket, 2)),
                _ => {
                    i += 2;
                    continue;
                }
            },
            b'$' => {
                if i + 1 < end && bytes[i + 1] == b'$' {
                    Some((MathDelimiter::DoubleDollar, 2))
                } else {
                    Some((MathDelimiter::Dollar, 1))
                }
            }
            _ => None,
        };
        let Some((delimiter, width)) = opening else {
            i += 1;
            continue;
        };
        match find_math_close(src, i + width, end, delimiter) {
            Some(close_end) => {
                spans.push(MathSpan {
                    delimiter,
                    start: i,
                    end: close_end,
                });
                i = close_end;
            }
            None => {
                diagnostics.warn(
                    DiagnosticCode::UnterminatedMath,
                    Some(i),
                    format!("math opened with {} is never closed", delimiter.as_str()),
                );
                i += width;
            }
        }
    }
    spans
}

/// Byte offsets of line starts, for 1-based line lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(src: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(src.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    /// 1-based line number: one plus the newlines strictly before `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_detection_respects_escapes() {
        let src = "a % b\nc \\% d";
        assert!(is_commented(src, 4));
        assert!(!is_commented(src, 2));
        assert!(!is_commented(src, src.len() - 1));
    }

    #[test]
    fn reads_command_with_star_and_arguments() {
        let src = r"\section*[short]{A {nested} title} rest";
        let cmd = read_command(src, 0, src.len()).unwrap();
        assert_eq!(cmd.name, "section");
        assert!(cmd.starred);
        assert_eq!(cmd.optional_text(src), Some("short"));
        assert_eq!(cmd.argument_text(src), Some("A {nested} title"));
        assert_eq!(&src[cmd.end..], " rest");
    }

    #[test]
    fn commands_skip_comments_and_line_breaks() {
        let src = "\\a \\\\ % \\b\n\\c{x}";
        let names: Vec<_> = commands(src, 0, src.len()).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn nested_same_name_environments_pair_correctly() {
        let src = r"\begin{itemize}\begin{itemize}\end{itemize}\end{itemize}";
        let mut diags = Diagnostics::new();
        let pairs = match_environments(environment_tokens(src, 0, src.len()), &mut diags);
        assert!(diags.is_empty());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].start, 0);
        assert_eq!(pairs[0].end, src.len());
        assert_eq!(pairs[0].children.len(), 1);
        assert_eq!(pairs[0].children[0].name, "itemize");
        assert!(pairs[0].children[0].children.is_empty());
    }

    #[test]
    fn unmatched_begin_keeps_matched_children() {
        let src = r"\begin{foo}\begin{bar}x\end{bar}";
        let mut diags = Diagnostics::new();
        let pairs = match_environments(environment_tokens(src, 0, src.len()), &mut diags);
        assert!(diags.has(&DiagnosticCode::UnmatchedBegin));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].name, "bar");
    }

    #[test]
    fn stray_end_is_reported() {
        let src = r"text \end{foo}";
        let mut diags = Diagnostics::new();
        let pairs = match_environments(environment_tokens(src, 0, src.len()), &mut diags);
        assert!(pairs.is_empty());
        assert!(diags.has(&DiagnosticCode::UnmatchedEnd));
    }

    #[test]
    fn verbatim_bodies_are_opaque() {
        let src = r"\begin{verbatim}\begin{foo}\end{verbatim}";
        let mut diags = Diagnostics::new();
        let pairs = match_environments(environment_tokens(src, 0, src.len()), &mut diags);
        assert!(diags.is_empty());
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].children.is_empty());
    }

    #[test]
    fn finds_all_math_delimiters() {
        let src = r"a $x$ b $$y$$ c \(z\) d \[w\] e \$5 \\[2pt]";
        let mut diags = Diagnostics::new();
        let spans = math_spans(src, 0, src.len(), &mut diags);
        let texts: Vec<_> = spans.iter().map(|s| &src[s.start..s.end]).collect();
        assert_eq!(texts, vec!["$x$", "$$y$$", r"\(z\)", r"\[w\]"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn unterminated_math_is_diagnosed() {
        let src = "cost is $5 today";
        let mut diags = Diagnostics::new();
        assert!(math_spans(src, 0, src.len(), &mut diags).is_empty());
        assert!(diags.has(&DiagnosticCode::UnterminatedMath));
    }

    #[test]
    fn line_index_counts_newlines_before_offset() {
        let idx = LineIndex::new("a\nbc\n\nd");
        assert_eq!(idx.line_of(0), 1);
        assert_eq!(idx.line_of(1), 1);
        assert_eq!(idx.line_of(2), 2);
        assert_eq!(idx.line_of(6), 4);
    }
}
