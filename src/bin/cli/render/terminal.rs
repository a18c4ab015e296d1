use chrono::{DateTime, Utc};

use mdsrs_lib::flashcards::algorithm::format_interval;

/// Marker that separates the front of a card from its back
const CARD_BACK_OPEN: &str = "<card-back>";
const CARD_BACK_CLOSE: &str = "</card-back>";

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Wrap `text` in a color when colors are enabled
pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Split card content into its front and (optional) back
pub fn split_card(content: &str) -> (&str, Option<&str>) {
    match content.find(CARD_BACK_OPEN) {
        Some(start) => {
            let front = content[..start].trim_end();
            let rest = &content[start + CARD_BACK_OPEN.len()..];
            let back = rest.split(CARD_BACK_CLOSE).next().unwrap_or(rest).trim();
            (front, Some(back))
        }
        None => (content.trim_end(), None),
    }
}

/// Render card Markdown for the terminal, front then back
pub fn render_card(content: &str, use_color: bool) -> String {
    let (front, back) = split_card(content);
    let mut lines = render_markdown(front, use_color);

    if let Some(back) = back {
        lines.push(String::new());
        let rule = "\u{2500}\u{2500}\u{2500} back \u{2500}\u{2500}\u{2500}";
        lines.push(paint(rule, Color::GRAY, use_color));
        lines.extend(render_markdown(back, use_color));
    }

    lines.join("\n")
}

/// Line-based Markdown styling: headers bold, code fences cyan, bullets
fn render_markdown(text: &str, use_color: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut in_code = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_code = !in_code;
            lines.push(paint(line, Color::CYAN, use_color));
        } else if in_code {
            lines.push(paint(line, Color::CYAN, use_color));
        } else if trimmed.starts_with('#') {
            lines.push(paint(line, Color::BOLD, use_color));
        } else if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            let indent = &line[..line.len() - trimmed.len()];
            lines.push(format!("{}\u{2022} {}", indent, item));
        } else {
            lines.extend(wrap_lines(line, "", 80));
        }
    }

    lines
}

/// Simple word-wrapping for terminal output
fn wrap_lines(text: &str, prefix: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let effective_width = max_width.saturating_sub(prefix.len());

    if text.len() <= effective_width {
        lines.push(format!("{}{}", prefix, text));
        return lines;
    }

    let mut current_line = String::new();
    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= effective_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(format!("{}{}", prefix, current_line));
            current_line = word.to_string();
        }
    }
    if !current_line.is_empty() {
        lines.push(format!("{}{}", prefix, current_line));
    }

    lines
}

/// "in 3d", "5h ago", or "now"
pub fn relative_time(when: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if when > now {
        format!("in {}", format_interval(when - now))
    } else {
        let ago = format_interval(now - when);
        if ago == "now" { ago } else { format!("{} ago", ago) }
    }
}
