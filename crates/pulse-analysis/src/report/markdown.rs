//! Minimal markdown to HTML conversion for AI briefings
//!
//! Handles the subset the insight provider writes: headings, bold, italic,
//! inline code, bullet and numbered lists, and paragraphs. Input is HTML
//! escaped first, so provider output can never inject markup.

use regex::Regex;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,4})\s+(.+)$").expect("valid heading regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*]\s+(.+)$").expect("valid bullet regex"));
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+(.+)$").expect("valid numbered regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").expect("valid bold regex"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.+?)\*|\b_(.+?)_\b").expect("valid italic regex"));
static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(.+?)`").expect("valid code regex"));

#[derive(Clone, Copy, PartialEq, Eq)]
enum List {
    None,
    Bullet,
    Numbered,
}

impl List {
    fn close_tag(self) -> Option<&'static str> {
        match self {
            List::None => None,
            List::Bullet => Some("</ul>"),
            List::Numbered => Some("</ol>"),
        }
    }
}

struct Converter {
    out: Vec<String>,
    paragraph: Vec<String>,
    list: List,
}

impl Converter {
    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            self.out.push(format!("<p>{}</p>", self.paragraph.join("<br>")));
            self.paragraph.clear();
        }
    }

    fn close_list(&mut self) {
        if let Some(tag) = self.list.close_tag() {
            self.out.push(tag.to_string());
        }
        self.list = List::None;
    }

    fn list_item(&mut self, kind: List, text: &str) {
        self.flush_paragraph();
        if self.list != kind {
            self.close_list();
            self.out.push(if kind == List::Bullet { "<ul>" } else { "<ol>" }.to_string());
            self.list = kind;
        }
        self.out.push(format!("<li>{}</li>", inline(text)));
    }
}

/// Convert markdown to an HTML fragment
pub fn to_html(markdown: &str) -> String {
    let escaped = escape(markdown);
    let mut conv = Converter {
        out: Vec::new(),
        paragraph: Vec::new(),
        list: List::None,
    };

    for raw in escaped.lines() {
        let line = raw.trim();

        if line.is_empty() {
            conv.flush_paragraph();
            conv.close_list();
        } else if let Some(caps) = HEADING.captures(line) {
            conv.flush_paragraph();
            conv.close_list();
            let level = caps[1].len();
            conv.out.push(format!("<h{level}>{}</h{level}>", inline(&caps[2])));
        } else if let Some(caps) = BULLET.captures(line) {
            conv.list_item(List::Bullet, &caps[1]);
        } else if let Some(caps) = NUMBERED.captures(line) {
            conv.list_item(List::Numbered, &caps[1]);
        } else {
            conv.close_list();
            conv.paragraph.push(inline(line));
        }
    }

    conv.flush_paragraph();
    conv.close_list();
    conv.out.join("\n")
}

fn inline(text: &str) -> String {
    let text = CODE.replace_all(text, "<code>$1</code>");
    let text = BOLD.replace_all(&text, "<strong>$1$2</strong>");
    let text = ITALIC.replace_all(&text, "<em>$1$2</em>");
    text.into_owned()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
