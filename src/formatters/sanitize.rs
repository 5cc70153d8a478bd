//! Text sanitizer for rendered chat content.
//!
//! Pure text transformation:
//! - typographic quotes become ASCII quotes
//! - zero-width characters and `\r\n` line endings are normalized away
//! - outside code, VS Code `$(icon)` directives are removed and raw HTML tag
//!   openers are escaped so they print instead of being interpreted
//!
//! Code fences, inline code spans and autolinks (`<https://...>`) keep their
//! content apart from the first two rules. Shell substitutions such as
//! `$(pwd)` are not icons and are kept.

/// Codicon names Copilot emits without a `-` or `~` in them.
const KNOWN_ICONS: &[&str] = &[
    "account", "add", "check", "close", "copilot", "copy", "debug", "edit", "error", "eye",
    "file", "folder", "gear", "info", "key", "library", "lightbulb", "link", "loading",
    "lock", "pass", "play", "refresh", "search", "sparkle", "sync", "terminal", "tools",
    "trash", "warning", "wrench",
];

/// Sanitize Markdown text.
pub fn sanitize_text(text: &str) -> String {
    let normalized = normalize_chars(text);

    let mut out = String::with_capacity(normalized.len());
    let mut fence: Option<String> = None;

    for (i, line) in normalized.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }

        let trimmed = line.trim_start();
        match &fence {
            Some(marker) => {
                if closes_fence(trimmed, marker) {
                    fence = None;
                }
                out.push_str(line);
            }
            None => {
                if let Some(marker) = fence_marker(trimmed) {
                    fence = Some(marker);
                    out.push_str(line);
                } else {
                    sanitize_line(line, &mut out);
                }
            }
        }
    }

    out
}

fn normalize_chars(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .filter_map(|c| match c {
            '\u{2018}' | '\u{2019}' => Some('\''),
            '\u{201c}' | '\u{201d}' => Some('"'),
            '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' => None,
            c => Some(c),
        })
        .collect()
}

/// Opening fence (three or more backticks or tildes).
fn fence_marker(line: &str) -> Option<String> {
    let ch = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = line.chars().take_while(|c| *c == ch).count();
    (run >= 3).then(|| ch.to_string().repeat(run))
}

/// Closing fence: the same character, at least as long, and no info string.
fn closes_fence(line: &str, marker: &str) -> bool {
    let Some(ch) = marker.chars().next() else {
        return false;
    };
    let run = line.chars().take_while(|c| *c == ch).count();
    run >= marker.len() && line[run..].trim().is_empty()
}

/// Sanitize one line outside fenced code, leaving inline code spans alone.
fn sanitize_line(line: &str, out: &mut String) {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '`' {
            let run = count_run(&chars, i, '`');
            if let Some(close) = find_closing_run(&chars, i + run, run) {
                out.extend(&chars[i..close + run]);
                i = close + run;
            } else {
                out.extend(&chars[i..i + run]);
                i += run;
            }
            continue;
        }

        if c == '$' && chars.get(i + 1) == Some(&'(') {
            if let Some(len) = icon_directive_len(&chars[i..]) {
                i += len;
                continue;
            }
        }

        if c == '<' {
            if let Some(len) = autolink_len(&chars[i..]) {
                out.extend(&chars[i..i + len]);
                i += len;
                continue;
            }
            let next = chars.get(i + 1);
            if next.is_some_and(|n| n.is_ascii_alphabetic() || *n == '/' || *n == '!') {
                out.push_str("&lt;");
                i += 1;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }
}

fn count_run(chars: &[char], start: usize, ch: char) -> usize {
    chars[start..].iter().take_while(|c| **c == ch).count()
}

fn find_closing_run(chars: &[char], from: usize, len: usize) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        if chars[i] == '`' {
            let run = count_run(chars, i, '`');
            if run == len {
                return Some(i);
            }
            i += run;
        } else {
            i += 1;
        }
    }
    None
}

/// Length of a `$(name)` or `$(name~spin)` icon directive at the start of `chars`.
fn icon_directive_len(chars: &[char]) -> Option<usize> {
    let name: String = chars
        .iter()
        .skip(2)
        .take_while(|c| c.is_ascii_alphanumeric() || **c == '-' || **c == '~')
        .collect();
    if name.is_empty() || chars.get(2 + name.len()) != Some(&')') {
        return None;
    }

    let is_icon = name.contains('-') || name.contains('~') || KNOWN_ICONS.contains(&name.as_str());
    is_icon.then_some(name.len() + 3)
}

/// Length of a `<scheme:...>` or `<user@host>` autolink at the start of `chars`.
fn autolink_len(chars: &[char]) -> Option<usize> {
    let close = chars.iter().position(|c| *c == '>')?;
    let body = &chars[1..close];
    if body.is_empty() || body.iter().any(|c| c.is_whitespace() || c.is_control() || *c == '<') {
        return None;
    }

    let scheme = body
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(**c, '+' | '.' | '-'))
        .count();
    let is_uri = (2..=32).contains(&scheme)
        && body[0].is_ascii_alphabetic()
        && body.get(scheme) == Some(&':');
    let is_email = body.iter().filter(|c| **c == '@').count() == 1
        && body.first() != Some(&'@')
        && body.last() != Some(&'@');

    (is_uri || is_email).then_some(close + 1)
}
