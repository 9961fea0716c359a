//! Presentation helpers shared by the list and detail endpoints.

const LIGHT_TEXT: &str = "#FFFFFF";
const DARK_TEXT: &str = "#000000";

/// `#rgb`, `#rrggbb`, with or without the leading `#`.
pub fn is_valid_hex_color(color: &str) -> bool {
    let digits = color.strip_prefix('#').unwrap_or(color);
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Stored colours are sometimes missing the `#`; anything unparseable becomes `None`.
pub fn normalize_color(color: Option<&str>) -> Option<String> {
    let color = color?.trim();
    if !is_valid_hex_color(color) {
        return None;
    }
    Some(if color.starts_with('#') {
        color.to_string()
    } else {
        format!("#{color}")
    })
}

fn rgb(color: &str) -> Option<(u8, u8, u8)> {
    if !is_valid_hex_color(color) {
        return None;
    }
    let digits = color.trim_start_matches('#');
    let full: String = if digits.len() == 3 {
        digits.chars().flat_map(|c| [c, c]).collect()
    } else {
        digits.to_string()
    };
    let channel = |i: usize| u8::from_str_radix(&full[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Black text on light backgrounds, white otherwise (and for bad input).
pub fn text_color_for_bg(color: Option<&str>) -> &'static str {
    match color.and_then(rgb) {
        Some((r, g, b)) => {
            let luminance = (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0;
            if luminance > 0.5 { DARK_TEXT } else { LIGHT_TEXT }
        }
        None => LIGHT_TEXT,
    }
}

/// Job descriptions often carry pricing after `$`, `-` or `(`; keep the part before it.
pub fn truncate_description(description: &str) -> String {
    match description.find(['$', '-', '(']) {
        Some(idx) => description[..idx].trim().to_string(),
        None => description.to_string(),
    }
}

/// `1d 2h 5m`. Zero parts are dropped, minutes always shown when alone.
pub fn readable_minutes(total: f64) -> String {
    let total = total.max(0.0);
    let days = (total / 1440.0).floor() as i64;
    let rest = total % 1440.0;
    let hours = (rest / 60.0).floor() as i64;
    let minutes = (rest % 60.0).floor() as i64;

    let mut parts = Vec::with_capacity(3);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(format!("{minutes}m"));
    }
    parts.join(" ")
}

pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
