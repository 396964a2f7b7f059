//! Content negotiation and report serialization.
//!
//! Rendering is a pure function of the report, the media type and the
//! language: the same inputs always produce the same bytes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use axum::http::header::{ACCEPT, ACCEPT_LANGUAGE};
use axum::http::HeaderMap;
use serde::Serialize;

use crate::checker::{Change, ChangeSet};
use crate::classify::{Operation, Report};
use crate::diff::{DiffTree, ValueDiff};
use crate::error::RenderError;
use crate::localize::{negotiate_language, Localizer};
use crate::types::{display_value, Level, Side};

/// Output formats the service can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Yaml,
    Json,
    Html,
    Text,
    Markdown,
}

impl MediaType {
    pub const ALL: [MediaType; 5] = [
        MediaType::Yaml,
        MediaType::Json,
        MediaType::Html,
        MediaType::Text,
        MediaType::Markdown,
    ];

    /// First recognized entry of an `Accept` header; JSON otherwise.
    pub fn negotiate(accept: Option<&str>) -> Self {
        accept
            .into_iter()
            .flat_map(|value| value.split(','))
            .filter_map(|entry| Self::from_mime(entry.split(';').next().unwrap_or_default().trim()))
            .next()
            .unwrap_or(MediaType::Json)
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|media| media.mime().eq_ignore_ascii_case(mime))
    }

    /// Parse a format name as used by the CLI and telemetry.
    pub fn from_format(format: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|media| media.format_flag() == format)
    }

    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Yaml => "application/yaml",
            MediaType::Json => "application/json",
            MediaType::Html => "text/html",
            MediaType::Text => "text/plain",
            MediaType::Markdown => "text/markdown",
        }
    }

    /// Short format name.
    pub fn format_flag(&self) -> &'static str {
        match self {
            MediaType::Yaml => "yaml",
            MediaType::Json => "json",
            MediaType::Html => "html",
            MediaType::Text => "text",
            MediaType::Markdown => "markdown",
        }
    }
}

/// Negotiated output of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub media_type: MediaType,
    pub language: &'static str,
}

impl RenderRequest {
    pub fn new(media_type: MediaType, language: &str) -> Self {
        Self {
            media_type,
            language: Localizer::new(language).language(),
        }
    }

    /// Negotiate from `Accept` and `Accept-Language`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            media_type: MediaType::negotiate(header(ACCEPT)),
            language: negotiate_language(header(ACCEPT_LANGUAGE)),
        }
    }
}

/// One change as it appears in JSON and YAML reports.
#[derive(Debug, Serialize)]
pub struct ChangeView<'a> {
    pub id: &'a str,
    pub text: String,
    pub level: Level,
    pub operation: &'a str,
    pub path: &'a str,
    pub source: Side,
}

impl<'a> ChangeView<'a> {
    fn new(change: &'a Change, localizer: &Localizer) -> Self {
        Self {
            id: change.id,
            text: localizer.message(change.id, &change.args),
            level: change.level,
            operation: &change.location.method,
            path: &change.location.path,
            source: change.location.side,
        }
    }
}

/// Serializes reports in every supported media type.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputRenderer;

impl OutputRenderer {
    /// Render a report.
    ///
    /// # Errors
    ///
    /// Returns `RenderError` when JSON or YAML encoding fails; no partial
    /// output is returned.
    pub fn render(&self, report: &Report, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        let localizer = Localizer::new(request.language);
        match report {
            Report::Diff(tree) => render_diff(tree, request, &localizer),
            Report::Changes { operation, changes } => {
                render_changes(*operation, changes, request, &localizer)
            }
        }
    }
}

fn render_diff(tree: &DiffTree, request: &RenderRequest, localizer: &Localizer) -> Result<Vec<u8>, RenderError> {
    match request.media_type {
        MediaType::Json => Ok(serde_json::to_vec_pretty(tree)?),
        MediaType::Yaml => Ok(serde_yaml::to_string(tree)?.into_bytes()),
        media => {
            let title = localizer.text("title-diff");
            let sections = diff_sections(tree, localizer);
            Ok(match media {
                MediaType::Html => sections_html(title, &sections, localizer),
                MediaType::Markdown => sections_markdown(title, &sections, localizer),
                _ => sections_text(&sections, localizer),
            }
            .into_bytes())
        }
    }
}

fn render_changes(
    operation: Operation,
    changes: &ChangeSet,
    request: &RenderRequest,
    localizer: &Localizer,
) -> Result<Vec<u8>, RenderError> {
    let views: Vec<ChangeView<'_>> = changes.iter().map(|c| ChangeView::new(c, localizer)).collect();
    let title = localizer.text(match operation {
        Operation::Diff => "title-diff",
        Operation::BreakingChanges => "title-breaking-changes",
        Operation::Changelog => "title-changelog",
    });

    match request.media_type {
        MediaType::Json => {
            let report = BTreeMap::from([(operation.report_key(), views)]);
            Ok(serde_json::to_vec_pretty(&report)?)
        }
        MediaType::Yaml => {
            let report = BTreeMap::from([(operation.report_key(), views)]);
            Ok(serde_yaml::to_string(&report)?.into_bytes())
        }
        MediaType::Text => Ok(changes_text(&views, localizer).into_bytes()),
        MediaType::Markdown => Ok(changes_markdown(title, &views, localizer).into_bytes()),
        MediaType::Html => Ok(changes_html(title, &views, localizer).into_bytes()),
    }
}

fn summary(views: &[ChangeView<'_>], localizer: &Localizer) -> String {
    let count = |level| views.iter().filter(|v| v.level == level).count().to_string();
    localizer.message(
        "summary-counts",
        &[
            views.len().to_string(),
            count(Level::Error),
            count(Level::Warn),
            count(Level::Info),
        ],
    )
}

fn changes_text(views: &[ChangeView<'_>], localizer: &Localizer) -> String {
    if views.is_empty() {
        return format!("{}\n", localizer.text("no-changes"));
    }
    let mut out = format!("{}\n\n", summary(views, localizer));
    for view in views {
        let _ = writeln!(
            out,
            "{}\t[{}] {}\n\t{}\n",
            localizer.text(view.level.label_key()),
            view.id,
            localizer.message("in-api", &[view.operation, view.path]),
            view.text
        );
    }
    out
}

fn changes_markdown(title: &str, views: &[ChangeView<'_>], localizer: &Localizer) -> String {
    let mut out = format!("# {}\n\n", title);
    if views.is_empty() {
        let _ = writeln!(out, "{}", localizer.text("no-changes"));
        return out;
    }
    let _ = writeln!(out, "{}\n", summary(views, localizer));
    let _ = writeln!(
        out,
        "| {} | {} | {} | {} |\n|---|---|---|---|",
        localizer.text("column-level"),
        localizer.text("column-endpoint"),
        localizer.text("column-message"),
        localizer.text("column-rule"),
    );
    for view in views {
        let _ = writeln!(
            out,
            "| {} | `{} {}` | {} | `{}` |",
            localizer.text(view.level.label_key()),
            view.operation,
            view.path,
            markdown_cell(&view.text),
            view.id
        );
    }
    out
}

fn changes_html(title: &str, views: &[ChangeView<'_>], localizer: &Localizer) -> String {
    let mut body = String::new();
    if views.is_empty() {
        let _ = writeln!(body, "<p>{}</p>", escape_html(localizer.text("no-changes")));
    } else {
        let _ = writeln!(body, "<p>{}</p>", escape_html(&summary(views, localizer)));
        body.push_str("<table>\n");
        let _ = writeln!(
            body,
            "<tr><th>{}</th><th>{}</th><th>{}</th><th>{}</th></tr>",
            escape_html(localizer.text("column-level")),
            escape_html(localizer.text("column-endpoint")),
            escape_html(localizer.text("column-message")),
            escape_html(localizer.text("column-rule")),
        );
        for view in views {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{} {}</td><td>{}</td><td>{}</td></tr>",
                escape_html(localizer.text(view.level.label_key())),
                escape_html(view.operation),
                escape_html(view.path),
                escape_html(&view.text),
                escape_html(view.id),
            );
        }
        body.push_str("</table>\n");
    }
    html_page(title, &body, localizer)
}

/// Heading plus bullet items of a human-readable diff summary.
struct Section {
    heading: String,
    items: Vec<String>,
}

fn diff_sections(tree: &DiffTree, localizer: &Localizer) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut push = |key: &str, items: Vec<String>| {
        if !items.is_empty() {
            sections.push(Section {
                heading: localizer.text(key).to_string(),
                items,
            });
        }
    };

    if let Some(info) = &tree.info {
        let fields = [
            ("title", &info.title),
            ("version", &info.version),
            ("description", &info.description),
        ];
        push(
            "info-changed",
            fields
                .iter()
                .filter_map(|(name, diff)| diff.as_ref().map(|d| describe(name, d)))
                .collect(),
        );
    }

    push("paths-added", tree.paths.added.clone());
    push("paths-deleted", tree.paths.deleted.keys().cloned().collect());

    let endpoint = |method: &String, path: &String| format!("{} {}", method, path);
    let modified = &tree.paths.modified;
    push(
        "endpoints-added",
        modified
            .iter()
            .flat_map(|(path, diff)| diff.operations.added.iter().map(move |m| endpoint(m, path)))
            .collect(),
    );
    push(
        "endpoints-deleted",
        modified
            .iter()
            .flat_map(|(path, diff)| diff.operations.deleted.keys().map(move |m| endpoint(m, path)))
            .collect(),
    );
    push(
        "endpoints-modified",
        modified
            .iter()
            .flat_map(|(path, diff)| diff.operations.modified.keys().map(move |m| endpoint(m, path)))
            .collect(),
    );
    sections
}

fn describe(name: &str, diff: &ValueDiff) -> String {
    format!("{}: {} -> {}", name, display_value(&diff.from), display_value(&diff.to))
}

fn sections_text(sections: &[Section], localizer: &Localizer) -> String {
    if sections.is_empty() {
        return format!("{}\n", localizer.text("no-changes"));
    }
    let mut out = String::new();
    for section in sections {
        let _ = writeln!(out, "{}:", section.heading);
        for item in &section.items {
            let _ = writeln!(out, "  - {}", item);
        }
    }
    out
}

fn sections_markdown(title: &str, sections: &[Section], localizer: &Localizer) -> String {
    let mut out = format!("# {}\n\n", title);
    if sections.is_empty() {
        let _ = writeln!(out, "{}", localizer.text("no-changes"));
        return out;
    }
    for section in sections {
        let _ = writeln!(out, "## {}\n", section.heading);
        for item in &section.items {
            let _ = writeln!(out, "- `{}`", item);
        }
        out.push('\n');
    }
    out
}

fn sections_html(title: &str, sections: &[Section], localizer: &Localizer) -> String {
    let mut body = String::new();
    if sections.is_empty() {
        let _ = writeln!(body, "<p>{}</p>", escape_html(localizer.text("no-changes")));
    }
    for section in sections {
        let _ = writeln!(body, "<h2>{}</h2>\n<ul>", escape_html(&section.heading));
        for item in &section.items {
            let _ = writeln!(body, "<li>{}</li>", escape_html(item));
        }
        body.push_str("</ul>\n");
    }
    html_page(title, &body, localizer)
}

fn html_page(title: &str, body: &str, localizer: &Localizer) -> String {
    let title = escape_html(title);
    format!(
        "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n{}</body>\n</html>\n",
        localizer.language(),
        title,
        title,
        body
    )
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::ChangeLocation;
    use crate::diff::PathsDiff;
    use axum::http::HeaderValue;
    use serde_json::Value;

    fn removed_pets() -> Report {
        Report::Changes {
            operation: Operation::BreakingChanges,
            changes: ChangeSet::new(vec![Change {
                id: "api-path-removed-without-deprecation",
                level: Level::Error,
                location: ChangeLocation {
                    path: "/pets".into(),
                    method: "GET".into(),
                    side: Side::Base,
                },
                args: Vec::new(),
            }]),
        }
    }

    fn deleted_tree() -> DiffTree {
        let mut paths = PathsDiff::default();
        paths.deleted.insert("/pets".into(), BTreeMap::new());
        DiffTree {
            paths,
            ..DiffTree::default()
        }
    }

    fn render(report: &Report, media_type: MediaType, language: &str) -> String {
        let bytes = OutputRenderer
            .render(report, &RenderRequest::new(media_type, language))
            .unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn negotiate_media_type() {
        assert_eq!(MediaType::negotiate(None), MediaType::Json);
        assert_eq!(MediaType::negotiate(Some("*/*")), MediaType::Json);
        assert_eq!(MediaType::negotiate(Some("application/yaml")), MediaType::Yaml);
        assert_eq!(
            MediaType::negotiate(Some("image/png, text/html;q=0.9, application/json")),
            MediaType::Html
        );
        assert_eq!(MediaType::negotiate(Some("text/markdown; charset=utf-8")), MediaType::Markdown);
        assert_eq!(MediaType::negotiate(Some("application/xml")), MediaType::Json);
    }

    #[test]
    fn request_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ru-RU,en;q=0.5"));
        let request = RenderRequest::from_headers(&headers);
        assert_eq!(request.media_type, MediaType::Text);
        assert_eq!(request.language, "ru");

        let request = RenderRequest::from_headers(&HeaderMap::new());
        assert_eq!(request, RenderRequest::new(MediaType::Json, "en"));
    }

    #[test]
    fn format_flags_round_trip_names() {
        for media in MediaType::ALL {
            assert_eq!(MediaType::from_format(media.format_flag()), Some(media));
            assert_eq!(MediaType::from_mime(media.mime()), Some(media));
        }
    }

    #[test]
    fn json_change_report_uses_operation_key() {
        let json: Value = serde_json::from_str(&render(&removed_pets(), MediaType::Json, "en")).unwrap();
        let changes = json["breaking-changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["id"], "api-path-removed-without-deprecation");
        assert_eq!(changes[0]["level"], "error");
        assert_eq!(changes[0]["operation"], "GET");
        assert_eq!(changes[0]["path"], "/pets");
        assert_eq!(changes[0]["source"], "base");
        assert_eq!(changes[0]["text"], "api path removed without deprecation");
    }

    #[test]
    fn yaml_change_report() {
        let report = Report::Changes {
            operation: Operation::Changelog,
            changes: ChangeSet::default(),
        };
        let yaml: serde_yaml::Value = serde_yaml::from_str(&render(&report, MediaType::Yaml, "en")).unwrap();
        assert!(yaml["changelog"].as_sequence().unwrap().is_empty());
    }

    #[test]
    fn localized_text_report() {
        let text = render(&removed_pets(), MediaType::Text, "es");
        assert!(text.contains("se eliminó la ruta de la API sin deprecarla"));
        assert!(text.contains("en la API GET /pets"));
    }

    #[test]
    fn rendering_is_byte_identical() {
        for media in MediaType::ALL {
            let first = render(&removed_pets(), media, "pt-br");
            let second = render(&removed_pets(), media, "pt-br");
            assert_eq!(first, second, "{:?}", media);

            let first = render(&Report::Diff(deleted_tree()), media, "en");
            let second = render(&Report::Diff(deleted_tree()), media, "en");
            assert_eq!(first, second, "{:?}", media);
        }
    }

    #[test]
    fn diff_serializes_tree() {
        let json: Value =
            serde_json::from_str(&render(&Report::Diff(deleted_tree()), MediaType::Json, "en")).unwrap();
        assert!(json["paths"]["deleted"]["/pets"].is_object());

        let empty = render(&Report::Diff(DiffTree::default()), MediaType::Yaml, "en");
        assert_eq!(empty.trim(), "{}");
    }

    #[test]
    fn diff_summary_formats() {
        let text = render(&Report::Diff(deleted_tree()), MediaType::Text, "en");
        assert_eq!(text, "Paths deleted:\n  - /pets\n");

        let markdown = render(&Report::Diff(deleted_tree()), MediaType::Markdown, "en");
        assert!(markdown.starts_with("# API changes\n"));
        assert!(markdown.contains("- `/pets`"));

        let empty = render(&Report::Diff(DiffTree::default()), MediaType::Text, "ru");
        assert_eq!(empty, "Изменений нет\n");
    }

    #[test]
    fn html_is_escaped() {
        let report = Report::Changes {
            operation: Operation::Changelog,
            changes: ChangeSet::new(vec![Change {
                id: "request-property-removed",
                level: Level::Warn,
                location: ChangeLocation {
                    path: "/pets/<script>".into(),
                    method: "POST".into(),
                    side: Side::Base,
                },
                args: vec!["a&b".into()],
            }]),
        };
        let html = render(&report, MediaType::Html, "en");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<html lang=\"en\">"));
        assert!(html.contains("/pets/&lt;script&gt;"));
        assert!(html.contains("removed the request property &#39;a&amp;b&#39;"));
        assert!(!html.contains("<script>"));
    }
}
