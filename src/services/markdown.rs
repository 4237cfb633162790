//! Content classification and rendering
//!
//! Post content is stored as raw text. Some authors write markdown, others
//! plain prose, so each piece of content is first classified with a fixed
//! list of markdown signals and then rendered down one of two paths:
//!
//! - plain text: escaped, newlines become `<br>`, double spaces are kept
//! - markdown: parsed with pulldown-cmark (GFM, line-break sensitive) and
//!   decorated with fixed inline styles so it survives a host page that
//!   resets element styles
//!
//! Rendering is total. Any failure is logged and replaced by
//! [`RENDER_ERROR_HTML`].
//!
//! # Example
//!
//! ```
//! use devspace::services::markdown::ContentClassifier;
//!
//! let classifier = ContentClassifier::default();
//! let html = classifier.render("# Hello");
//! assert!(html.contains(">Hello</h1>"));
//! assert_eq!(classifier.render("line one\nline two"), "line one<br>line two");
//! ```

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};

use crate::config::ContentConfig;
use crate::models::ClassificationResult;

/// Fragment returned whenever markdown rendering fails
pub const RENDER_ERROR_HTML: &str =
    r#"<p style="color: #dc2626;">Failed to render markdown content.</p>"#;

/// Markdown signals. Any single match classifies content as markdown.
static MARKDOWN_SIGNALS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?m)^#{1,6}\s+",        // heading
        r"(?m)^\s*[-*+]\s+",      // unordered list
        r"(?m)^\s*[0-9]+\.\s+",   // ordered list
        r"\*\*[^*\n]+\*\*",       // bold
        r"\*[^*\n]+\*",           // italic
        r"`[^`\n]+`",             // inline code
        r"(?s)```.*?```",         // fenced code
        r"(?m)^\s*>",             // blockquote
        r"\[.*?\]\(.*?\)",        // link
        r"!\[.*?\]\(.*?\)",       // image
        r"(?m)^\s*\|.*\|.*$",     // table row
        r"(?m)^\s*[-=]{3,}\s*$",  // horizontal rule
        r"~~[^~\n]+~~",           // strikethrough
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("markdown signal pattern must compile"))
    .collect()
});

/// `#Title` -> `# Title`
static HEADING_WITHOUT_SPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(#{1,6})([^\s#])").expect("heading pattern must compile")
});

/// Inline styles injected per opening tag, applied in order
const TAG_STYLES: &[(&str, &str)] = &[
    (
        "<h1>",
        r#"<h1 style="font-size: 2rem !important; font-weight: bold !important; margin-bottom: 1rem !important; margin-top: 2rem !important; color: #1f2937 !important;">"#,
    ),
    (
        "<h2>",
        r#"<h2 style="font-size: 1.5rem !important; font-weight: bold !important; margin-bottom: 0.75rem !important; margin-top: 1.5rem !important; color: #1f2937 !important;">"#,
    ),
    (
        "<h3>",
        r#"<h3 style="font-size: 1.25rem !important; font-weight: bold !important; margin-bottom: 0.5rem !important; margin-top: 1rem !important; color: #1f2937 !important;">"#,
    ),
    (
        "<p>",
        r#"<p style="margin-bottom: 1rem !important; line-height: 1.6 !important; color: #4b5563 !important;">"#,
    ),
    (
        "<ul>",
        r#"<ul style="margin-bottom: 1rem !important; padding-left: 1.5rem !important; list-style-type: disc !important;">"#,
    ),
    (
        "<ol>",
        r#"<ol style="margin-bottom: 1rem !important; padding-left: 1.5rem !important; list-style-type: decimal !important;">"#,
    ),
    (
        "<li>",
        r#"<li style="margin-bottom: 0.25rem !important; color: #4b5563 !important; display: list-item !important;">"#,
    ),
    (
        "<code>",
        r#"<code style="background-color: #f3f4f6 !important; padding: 0.125rem 0.25rem !important; border-radius: 0.25rem !important; font-size: 0.875rem !important; font-family: monospace !important; color: #dc2626 !important;">"#,
    ),
    (
        "<pre>",
        r#"<pre style="background-color: #f3f4f6 !important; padding: 1rem !important; border-radius: 0.375rem !important; overflow-x: auto !important; margin-bottom: 1rem !important;">"#,
    ),
    (
        "<blockquote>",
        r#"<blockquote style="border-left: 4px solid #3b82f6 !important; padding-left: 1rem !important; margin-bottom: 1rem !important; color: #6b7280 !important; font-style: italic !important;">"#,
    ),
    (
        "<a ",
        r#"<a style="color: #3b82f6 !important; text-decoration: underline !important;" "#,
    ),
    (
        "<strong>",
        r#"<strong style="font-weight: bold !important; color: #1f2937 !important;">"#,
    ),
    (
        "<em>",
        r#"<em style="font-style: italic !important; color: #4b5563 !important;">"#,
    ),
];

/// Why a markdown render was abandoned
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("content is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("markdown renderer panicked: {0}")]
    Panicked(String),
}

/// Decides between markdown and plain text and renders styled HTML.
///
/// Cheap to clone; holds only its limits.
#[derive(Debug, Clone)]
pub struct ContentClassifier {
    max_content_bytes: usize,
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new(&ContentConfig::default())
    }
}

impl ContentClassifier {
    pub fn new(config: &ContentConfig) -> Self {
        Self {
            max_content_bytes: config.max_content_bytes,
        }
    }

    /// Whether `content` carries any markdown signal
    pub fn is_markdown(content: &str) -> bool {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return false;
        }
        MARKDOWN_SIGNALS.iter().any(|signal| signal.is_match(trimmed))
    }

    /// Classify `content` and render it to HTML
    pub fn classify(&self, content: &str) -> ClassificationResult {
        if content.trim().is_empty() {
            return ClassificationResult {
                is_markdown: false,
                html: String::new(),
            };
        }

        if !Self::is_markdown(content) {
            return ClassificationResult {
                is_markdown: false,
                html: render_plain(content),
            };
        }

        let html = match self.render_markdown(content) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(error = %e, "markdown render failed");
                RENDER_ERROR_HTML.to_string()
            }
        };

        ClassificationResult {
            is_markdown: true,
            html,
        }
    }

    /// Render `content` to HTML. Empty content renders as an empty string.
    pub fn render(&self, content: &str) -> String {
        self.classify(content).html
    }

    /// Render a post excerpt. Excerpts go through the same pipeline as the
    /// body so a markdown excerpt keeps its formatting.
    pub fn render_excerpt(&self, excerpt: &str) -> String {
        self.render(excerpt)
    }

    fn render_markdown(&self, content: &str) -> Result<String, RenderError> {
        if content.len() > self.max_content_bytes {
            return Err(RenderError::TooLarge {
                size: content.len(),
                limit: self.max_content_bytes,
            });
        }

        let prepared = HEADING_WITHOUT_SPACE.replace_all(content, "$1 $2");

        let raw = panic::catch_unwind(AssertUnwindSafe(|| markdown_to_html(&prepared)))
            .map_err(|payload| RenderError::Panicked(panic_message(payload.as_ref())))?;

        Ok(apply_tag_styles(raw))
    }
}

/// Render `content` with default limits
pub fn classify_and_render(content: &str) -> String {
    ContentClassifier::default().render(content)
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    // Line-break sensitive: a single newline inside a paragraph is a <br>
    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, events);
    html_output
}

fn apply_tag_styles(html: String) -> String {
    TAG_STYLES
        .iter()
        .fold(html, |html, (tag, styled)| html.replace(tag, styled))
}

fn render_plain(content: &str) -> String {
    html_escape(content)
        .replace('\n', "<br>")
        .replace("  ", "&nbsp;&nbsp;")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Escapes the characters that would otherwise be read as markup.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
