use regex::Regex;
use std::sync::LazyLock;

/// Diagram dialect, as far as the override engine and edge patching care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagramGrammar {
    Flowchart,
    State,
    Sequence,
    Gantt,
    Class,
    Er,
    Journey,
    Pie,
    Other,
}

/// How a color override is applied for a given grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideStrategy {
    /// Rewrite the diagram source with a `style` directive.
    SourceDirective,
    /// Record a raw-id keyed CSS overlay applied after compilation.
    VisualOverlay,
}

static FRONTMATTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^-{3}\s*[\n\r](.*?)[\n\r]-{3}\s*[\n\r]+").unwrap());
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)%%\{.*?\}%%").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*%%.*$").unwrap());

// Registration order is significant: `stateDiagram` must not fall through to a looser match.
static DETECTORS: LazyLock<Vec<(DiagramGrammar, Regex)>> = LazyLock::new(|| {
    [
        (DiagramGrammar::Flowchart, r"^\s*(?:graph|flowchart|flowchart-elk)\b"),
        (DiagramGrammar::State, r"^\s*stateDiagram(?:-v2)?\b"),
        (DiagramGrammar::Sequence, r"^\s*sequenceDiagram\b"),
        (DiagramGrammar::Gantt, r"^\s*gantt\b"),
        (DiagramGrammar::Class, r"^\s*classDiagram(?:-v2)?\b"),
        (DiagramGrammar::Er, r"^\s*erDiagram\b"),
        (DiagramGrammar::Journey, r"^\s*journey\b"),
        (DiagramGrammar::Pie, r"^\s*pie\b"),
    ]
    .into_iter()
    .map(|(grammar, pattern)| (grammar, Regex::new(pattern).unwrap()))
    .collect()
});

impl DiagramGrammar {
    /// Detects the grammar from diagram source text.
    ///
    /// YAML front-matter, `%%{init}%%` directives and `%%` comments are skipped before the header
    /// keyword is inspected, mirroring how Mermaid itself detects the diagram type.
    pub fn detect(source: &str) -> Self {
        let no_frontmatter = FRONTMATTER_RE.replace(source, "");
        let no_directives = DIRECTIVE_RE.replace_all(&no_frontmatter, "");
        let cleaned = COMMENT_RE.replace_all(&no_directives, "");

        let Some(header) = cleaned.lines().find(|l| !l.trim().is_empty()) else {
            return Self::Other;
        };

        DETECTORS
            .iter()
            .find(|(_, re)| re.is_match(header))
            .map(|(grammar, _)| *grammar)
            .unwrap_or(Self::Other)
    }

    pub fn override_strategy(self) -> OverrideStrategy {
        match self {
            Self::Flowchart => OverrideStrategy::SourceDirective,
            _ => OverrideStrategy::VisualOverlay,
        }
    }

    pub fn is_flowchart_like(self) -> bool {
        self.override_strategy() == OverrideStrategy::SourceDirective
    }

    /// `class` values carried by edge paths in this grammar's generated markup.
    pub(crate) fn edge_path_classes(self) -> &'static [&'static str] {
        match self {
            Self::Flowchart => &["path", "flowchart-link"],
            Self::State => &["transition"],
            Self::Sequence => &["messageLine0", "messageLine1"],
            Self::Class => &["relation"],
            Self::Er => &["relationshipLine"],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_headers() {
        assert_eq!(DiagramGrammar::detect("graph TD\nA-->B"), DiagramGrammar::Flowchart);
        assert_eq!(DiagramGrammar::detect("flowchart LR\nA-->B"), DiagramGrammar::Flowchart);
        assert_eq!(DiagramGrammar::detect("stateDiagram-v2\n[*] --> S"), DiagramGrammar::State);
        assert_eq!(DiagramGrammar::detect("sequenceDiagram\nA->>B: hi"), DiagramGrammar::Sequence);
        assert_eq!(DiagramGrammar::detect("gantt\ntitle x"), DiagramGrammar::Gantt);
        assert_eq!(DiagramGrammar::detect("classDiagram\nA <|-- B"), DiagramGrammar::Class);
        assert_eq!(DiagramGrammar::detect("erDiagram\nA ||--o{ B : has"), DiagramGrammar::Er);
        assert_eq!(DiagramGrammar::detect("journey\ntitle t"), DiagramGrammar::Journey);
        assert_eq!(DiagramGrammar::detect("pie\n\"a\": 1"), DiagramGrammar::Pie);
        assert_eq!(DiagramGrammar::detect("mindmap\n root"), DiagramGrammar::Other);
        assert_eq!(DiagramGrammar::detect(""), DiagramGrammar::Other);
    }

    #[test]
    fn skips_frontmatter_directives_and_comments() {
        let text = "---\ntitle: Demo\n---\n%%{init: {\"theme\": \"dark\"}}%%\n%% note\n\nstateDiagram\n";
        assert_eq!(DiagramGrammar::detect(text), DiagramGrammar::State);
    }

    #[test]
    fn only_flowcharts_rewrite_source() {
        assert!(DiagramGrammar::Flowchart.is_flowchart_like());
        for g in [
            DiagramGrammar::State,
            DiagramGrammar::Sequence,
            DiagramGrammar::Gantt,
            DiagramGrammar::Class,
            DiagramGrammar::Er,
            DiagramGrammar::Journey,
            DiagramGrammar::Pie,
            DiagramGrammar::Other,
        ] {
            assert_eq!(g.override_strategy(), OverrideStrategy::VisualOverlay);
        }
    }
}
