use crate::config::ParserConfig;
use crate::tex::diagnostics::{DiagnosticCode, Diagnostics};
use crate::tex::node::{Document, Node, NodeId, NodeKind};
use crate::tex::scan::{self, Command, EnvPair, LineIndex};

/// Environments parsed as `Equation` nodes rather than `Environment`.
const MATH_ENVIRONMENTS: &[&str] = &[
    "equation",
    "align",
    "gather",
    "multline",
    "eqnarray",
    "displaymath",
    "math",
    "flalign",
    "alignat",
];

const OPAQUE_ENVIRONMENTS: &[&str] = &["verbatim", "verbatim*", "lstlisting", "minted", "comment"];

/// Parser settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum environment nesting turned into nodes.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { max_depth: 20 }
    }
}

impl From<&ParserConfig> for ParseOptions {
    fn from(config: &ParserConfig) -> Self {
        Self {
            max_depth: config.max_depth,
        }
    }
}

/// Parse a complete LaTeX source with default options.
///
/// Never fails: malformed input degrades to coarser nodes, and what was
/// degraded is listed in [`Document::diagnostics`].
pub fn parse(source: &str) -> Document {
    parse_with(source, &ParseOptions::default())
}

/// Parse a complete LaTeX source.
pub fn parse_with(source: &str, options: &ParseOptions) -> Document {
    let mut builder = Builder {
        src: source,
        nodes: vec![Node::new(NodeKind::Root, 0, source.len())],
        diagnostics: Diagnostics::new(),
        max_depth: options.max_depth,
    };
    builder.build();
    builder.finish()
}

/// How uncovered text between structural children is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GapMode {
    /// Scan for math delimiters, then emit Text.
    Markup,
    /// Emit Text only (math bodies, verbatim bodies).
    Plain,
}

enum Piece<'p> {
    Env(&'p EnvPair),
    Leaf(Node),
}

impl Piece<'_> {
    fn start(&self) -> usize {
        match self {
            Piece::Env(pair) => pair.start,
            Piece::Leaf(node) => node.start,
        }
    }

    fn end(&self) -> usize {
        match self {
            Piece::Env(pair) => pair.end,
            Piece::Leaf(node) => node.end,
        }
    }
}

struct Heading {
    kind: NodeKind,
    level: u8,
    command: Command,
    title: String,
}

struct Builder<'s> {
    src: &'s str,
    nodes: Vec<Node>,
    diagnostics: Diagnostics,
    max_depth: usize,
}

impl<'s> Builder<'s> {
    const ROOT: NodeId = NodeId(0);

    fn add(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    fn build(&mut self) {
        let src = self.src;
        let len = src.len();

        let Some(begin) = scan::find_command_with_argument(src, 0, len, "begin", "document") else {
            self.diagnostics.warn(
                DiagnosticCode::MissingBeginDocument,
                None,
                "no \\begin{document}; treating the whole source as body",
            );
            let body = self.add(Self::ROOT, Node::new(NodeKind::Body, 0, len));
            self.build_body(body, 0, len);
            return;
        };

        let preamble = self.add(Self::ROOT, Node::new(NodeKind::Preamble, 0, begin.end));
        self.build_preamble(preamble, 0, begin.start);

        let end_document = scan::find_command_with_argument(src, begin.end, len, "end", "document");
        let body_end = match &end_document {
            Some(cmd) => cmd.start,
            None => {
                self.diagnostics.info(
                    DiagnosticCode::MissingEndDocument,
                    Some(begin.start),
                    "no \\end{document}; body runs to the end of the source",
                );
                len
            }
        };
        let body = self.add(Self::ROOT, Node::new(NodeKind::Body, begin.end, body_end));
        self.build_body(body, begin.end, body_end);

        if let Some(cmd) = end_document {
            if !src[cmd.end..].trim().is_empty() {
                self.add(Self::ROOT, Node::new(NodeKind::Postamble, cmd.end, len));
            }
        }
    }

    fn build_preamble(&mut self, preamble: NodeId, start: usize, end: usize) {
        let src = self.src;
        let mut diagnostics = std::mem::take(&mut self.diagnostics);
        let pairs = scan::match_environments(scan::environment_tokens(src, start, end), &mut diagnostics);
        self.diagnostics = diagnostics;

        let mut pieces: Vec<Piece<'_>> = pairs.iter().map(Piece::Env).collect();
        let mut seen_class = false;
        for cmd in scan::commands(src, start, end) {
            if inside_any(&pairs, cmd.start) {
                continue;
            }
            let kind = match cmd.name.as_str() {
                "documentclass" if !seen_class => NodeKind::DocumentClass,
                "usepackage" => NodeKind::Package,
                _ => continue,
            };
            let Some(name) = cmd.argument_text(src) else {
                self.diagnostics.warn(
                    DiagnosticCode::UnterminatedArgument,
                    Some(cmd.start),
                    format!("\\{} without a braced argument", cmd.name),
                );
                continue;
            };
            seen_class |= kind == NodeKind::DocumentClass;
            let mut node = Node::new(kind, cmd.start, cmd.end).with_name(name.trim());
            if let Some(options) = cmd.optional_text(src) {
                node = node.with_meta("options", options.trim());
            }
            pieces.push(Piece::Leaf(node));
        }
        pieces.sort_by_key(Piece::start);
        self.place(preamble, start, end, pieces, 0, GapMode::Markup);
    }

    fn build_body(&mut self, body: NodeId, start: usize, end: usize) {
        let src = self.src;
        let mut diagnostics = std::mem::take(&mut self.diagnostics);
        let pairs = scan::match_environments(scan::environment_tokens(src, start, end), &mut diagnostics);
        self.diagnostics = diagnostics;

        let headings: Vec<Heading> = scan::commands(src, start, end)
            .into_iter()
            .filter(|cmd| !inside_any(&pairs, cmd.start))
            .filter_map(|cmd| {
                let kind = NodeKind::from_sectioning_command(&cmd.name)?;
                let level = kind.section_level()?;
                let title = cmd.argument_text(src)?.trim().to_string();
                Some(Heading {
                    kind,
                    level,
                    command: cmd,
                    title,
                })
            })
            .collect();

        self.build_sections(body, start, end, &headings, &pairs);
    }

    /// Split `[start, end)` at its shallowest headings and recurse into each
    /// section; content outside any heading is placed directly under `parent`.
    fn build_sections(&mut self, parent: NodeId, start: usize, end: usize, headings: &[Heading], pairs: &[EnvPair]) {
        let Some(top) = headings.iter().map(|h| h.level).min() else {
            let pieces = pairs_within(pairs, start, end).iter().map(Piece::Env).collect();
            self.place(parent, start, end, pieces, 0, GapMode::Markup);
            return;
        };

        let splits: Vec<usize> = headings
            .iter()
            .enumerate()
            .filter(|(_, h)| h.level == top)
            .map(|(i, _)| i)
            .collect();

        let first = splits[0];
        let lead_end = headings[first].command.start;
        if first > 0 || lead_end > start {
            self.build_sections(parent, start, lead_end, &headings[..first], pairs);
        }

        for (n, &idx) in splits.iter().enumerate() {
            let heading = &headings[idx];
            let next = splits.get(n + 1).copied();
            let section_end = next.map_or(end, |j| headings[j].command.start);
            let nested = &headings[idx + 1..next.unwrap_or(headings.len())];

            let mut node = Node::new(heading.kind, heading.command.end, section_end)
                .with_name(heading.title.clone())
                .with_meta("title", heading.title.clone())
                .with_meta("heading_start", heading.command.start.to_string());
            if heading.command.starred {
                node = node.with_meta("starred", "true");
            }
            let id = self.add(parent, node);
            self.build_sections(id, heading.command.end, section_end, nested, pairs);
        }
    }

    /// Place sorted pieces under `parent`, filling the gaps between them.
    fn place(&mut self, parent: NodeId, start: usize, end: usize, pieces: Vec<Piece<'_>>, depth: usize, mode: GapMode) {
        let mut cursor = start;
        for piece in pieces {
            if piece.start() < cursor || piece.end() > end {
                continue;
            }
            self.fill_gap(parent, cursor, piece.start(), mode);
            cursor = piece.end();
            match piece {
                Piece::Env(pair) => self.add_environment(parent, pair, depth),
                Piece::Leaf(node) => {
                    self.add(parent, node);
                }
            }
        }
        self.fill_gap(parent, cursor, end, mode);
    }

    fn fill_gap(&mut self, parent: NodeId, start: usize, end: usize, mode: GapMode) {
        if start >= end {
            return;
        }
        if mode == GapMode::Markup {
            let mut diagnostics = std::mem::take(&mut self.diagnostics);
            let spans = scan::math_spans(self.src, start, end, &mut diagnostics);
            self.diagnostics = diagnostics;

            let mut cursor = start;
            for span in spans {
                self.add_text(parent, cursor, span.start);
                let node = Node::new(NodeKind::Equation, span.start, span.end)
                    .with_meta("delimiter", span.delimiter.as_str())
                    .with_meta("display", span.delimiter.is_display().to_string());
                self.add(parent, node);
                cursor = span.end;
            }
            self.add_text(parent, cursor, end);
        } else {
            self.add_text(parent, start, end);
        }
    }

    fn add_text(&mut self, parent: NodeId, start: usize, end: usize) {
        if start < end && !self.src[start..end].trim().is_empty() {
            self.add(parent, Node::new(NodeKind::Text, start, end));
        }
    }

    fn add_environment(&mut self, parent: NodeId, pair: &EnvPair, depth: usize) {
        let base = pair.name.trim_end_matches('*');
        let is_math = MATH_ENVIRONMENTS.contains(&base);
        let kind = if is_math { NodeKind::Equation } else { NodeKind::Environment };

        let mut node = Node::new(kind, pair.start, pair.end)
            .with_name(pair.name.clone())
            .with_meta("inner_start", pair.inner_start.to_string())
            .with_meta("inner_end", pair.inner_end.to_string());
        if is_math {
            node = node
                .with_meta("delimiter", "env")
                .with_meta("display", (base != "math").to_string());
        }

        let mode = if is_math || OPAQUE_ENVIRONMENTS.contains(&pair.name.as_str()) {
            GapMode::Plain
        } else {
            GapMode::Markup
        };

        if depth + 1 >= self.max_depth && !pair.children.is_empty() {
            self.diagnostics.warn(
                DiagnosticCode::DepthLimit,
                Some(pair.inner_start),
                format!(
                    "environment nesting deeper than {} inside \\begin{{{}}}; inner content kept as text",
                    self.max_depth, pair.name
                ),
            );
            let id = self.add(parent, node.with_meta("truncated", "true"));
            self.add_text(id, pair.inner_start, pair.inner_end);
            return;
        }

        let id = self.add(parent, node);
        let pieces = pair.children.iter().map(Piece::Env).collect();
        self.place(id, pair.inner_start, pair.inner_end, pieces, depth + 1, mode);
    }

    fn finish(mut self) -> Document {
        let lines = LineIndex::new(self.src);
        for i in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[i].children);
            children.sort_by_key(|c| self.nodes[c.0].start);
            let node = &mut self.nodes[i];
            node.children = children;
            node.line_start = lines.line_of(node.start);
            node.line_end = lines.line_of(node.end);
        }
        Document::from_parts(self.src.to_string(), self.nodes, self.diagnostics)
    }
}

fn inside_any(pairs: &[EnvPair], pos: usize) -> bool {
    let idx = pairs.partition_point(|p| p.start <= pos);
    idx > 0 && pairs[idx - 1].contains(pos)
}

fn pairs_within(pairs: &[EnvPair], start: usize, end: usize) -> &[EnvPair] {
    let lo = pairs.partition_point(|p| p.start < start);
    let hi = pairs.partition_point(|p| p.start < end);
    &pairs[lo..hi]
}
