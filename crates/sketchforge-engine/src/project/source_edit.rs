//! Anchor-based edits of generated TypeScript.
//!
//! Every insertion checks for an existing occurrence first, so applying the
//! same edit twice leaves the text unchanged. Functions returning `Option`
//! yield `None` when their anchor (a decorator, a list) cannot be found.

use std::sync::OnceLock;

use regex::Regex;

type Span = (usize, usize);

/// Index of the bracket closing the one at `open`. String literals and
/// comments are skipped.
pub fn matching_close(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let opener = *bytes.get(open)?;
    let closer = match opener {
        b'[' => b']',
        b'{' => b'}',
        b'(' => b')',
        _ => return None,
    };
    let mut depth = 0usize;
    let mut idx = open;
    while idx < bytes.len() {
        let byte = bytes[idx];
        match byte {
            b'\'' | b'"' | b'`' => {
                idx = skip_string(bytes, idx)?;
                continue;
            }
            b'/' if bytes.get(idx + 1) == Some(&b'/') => {
                idx = source[idx..].find('\n').map_or(bytes.len(), |nl| idx + nl);
                continue;
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                idx = idx + 2 + source[idx + 2..].find("*/")? + 2;
                continue;
            }
            _ if byte == opener => depth += 1,
            _ if byte == closer => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
        idx += 1;
    }
    None
}

fn skip_string(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            byte if byte == quote => return Some(idx + 1),
            _ => idx += 1,
        }
    }
    None
}

/// Span of the `{ ... }` argument of `@<decorator>(...)`, braces included.
pub fn decorator_object(source: &str, decorator: &str) -> Option<Span> {
    let pattern = Regex::new(&format!(r"@{}\s*\(\s*\{{", regex::escape(decorator))).ok()?;
    let found = pattern.find(source)?;
    let open = found.end() - 1;
    Some((open, matching_close(source, open)?))
}

/// Span of the `[ ... ]` value of `property` inside `scope`.
pub fn array_property(source: &str, scope: Span, property: &str) -> Option<Span> {
    let pattern = Regex::new(&format!(r"\b{}\s*:\s*\[", regex::escape(property))).ok()?;
    let found = pattern.find(&source[scope.0..scope.1])?;
    let open = scope.0 + found.end() - 1;
    Some((open, matching_close(source, open)?))
}

pub fn contains_word(text: &str, word: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(word)))
        .map(|pattern| pattern.is_match(text))
        .unwrap_or(false)
}

/// Adds `symbol` to the `property: [...]` list of `@<decorator>`.
pub fn add_to_decorator_list(
    source: &str,
    decorator: &str,
    property: &str,
    symbol: &str,
) -> Option<String> {
    let scope = decorator_object(source, decorator)?;
    let (open, close) = array_property(source, scope, property)?;
    let inner = &source[open + 1..close];
    if contains_word(inner, symbol) {
        return Some(source.to_string());
    }
    let new_inner = append_list_entry(inner, symbol);
    Some(format!("{}{}{}", &source[..open + 1], new_inner, &source[close..]))
}

fn append_list_entry(inner: &str, symbol: &str) -> String {
    let head = inner.trim_end();
    let tail = &inner[head.len()..];
    if head.trim().is_empty() {
        return symbol.to_string();
    }

    let mut head = head.to_string();
    if let Some(at) = missing_comma_at(&head) {
        head.insert(at, ',');
    }
    if head.contains('\n') {
        let last_line = head.rsplit('\n').next().unwrap_or_default();
        let indent: String = last_line.chars().take_while(|ch| ch.is_whitespace()).collect();
        format!("{head}\n{indent}{symbol}{tail}")
    } else {
        format!("{head} {symbol}{tail}")
    }
}

/// Where a separator comma is needed after the last entry, ignoring
/// comment-only lines and trailing `//` comments.
fn missing_comma_at(head: &str) -> Option<usize> {
    let mut end = head.len();
    loop {
        let segment = &head[..end];
        let line_start = segment.rfind('\n').map_or(0, |nl| nl + 1);
        let line = &segment[line_start..];
        let code = line.split("//").next().unwrap_or_default().trim_end();
        if code.trim().is_empty() {
            if line_start == 0 {
                return None;
            }
            end = line_start - 1;
            continue;
        }
        return if code.ends_with(',') {
            None
        } else {
            Some(line_start + code.len())
        };
    }
}

/// Ensures `property: [..symbols]` exists on `@<decorator>` and holds every
/// symbol, creating the list when absent.
pub fn ensure_decorator_list(
    source: &str,
    decorator: &str,
    property: &str,
    symbols: &[String],
) -> Option<String> {
    let scope = decorator_object(source, decorator)?;
    let mut out = if array_property(source, scope, property).is_some() {
        source.to_string()
    } else {
        insert_first_property(source, scope.0, &format!("{property}: []"))
    };
    for symbol in symbols {
        out = add_to_decorator_list(&out, decorator, property, symbol)?;
    }
    Some(out)
}

fn insert_first_property(source: &str, open: usize, property: &str) -> String {
    let indent = source[open + 1..]
        .lines()
        .nth(1)
        .map(|line| line.chars().take_while(|ch| ch.is_whitespace()).collect::<String>())
        .filter(|indent| !indent.is_empty())
        .unwrap_or_else(|| "  ".to_string());
    format!(
        "{}\n{indent}{property},{}",
        &source[..open + 1],
        &source[open + 1..]
    )
}

pub fn has_standalone_flag(source: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bstandalone\s*:\s*true\b").expect("standalone pattern"))
        .is_match(source)
}

/// Sets `standalone: true` on `@<decorator>`, flipping an explicit `false`.
pub fn ensure_standalone_flag(source: &str, decorator: &str) -> Option<String> {
    static FALSE: OnceLock<Regex> = OnceLock::new();
    let scope = decorator_object(source, decorator)?;
    let body = &source[scope.0..=scope.1];
    if has_standalone_flag(body) {
        return Some(source.to_string());
    }
    let explicit_false = FALSE
        .get_or_init(|| Regex::new(r"\bstandalone\s*:\s*false\b").expect("standalone pattern"));
    if let Some(found) = explicit_false.find(body) {
        let start = scope.0 + found.start();
        let end = scope.0 + found.end();
        return Some(format!("{}standalone: true{}", &source[..start], &source[end..]));
    }
    Some(insert_first_property(source, scope.0, "standalone: true"))
}

/// Drops `property: <value>` from `@<decorator>`; the text is unchanged when
/// either is absent.
pub fn remove_decorator_property(source: &str, decorator: &str, property: &str) -> String {
    let Some(scope) = decorator_object(source, decorator) else {
        return source.to_string();
    };
    let Ok(pattern) = Regex::new(&format!(r"\b{}\s*:\s*", regex::escape(property))) else {
        return source.to_string();
    };
    let Some(found) = pattern.find(&source[scope.0..scope.1]) else {
        return source.to_string();
    };
    let bytes = source.as_bytes();
    let value_start = scope.0 + found.end();
    let value_end = match bytes.get(value_start) {
        Some(b'[') | Some(b'{') | Some(b'(') => match matching_close(source, value_start) {
            Some(close) => close + 1,
            None => return source.to_string(),
        },
        Some(b'\'') | Some(b'"') | Some(b'`') => match skip_string(bytes, value_start) {
            Some(end) => end,
            None => return source.to_string(),
        },
        _ => source[value_start..scope.1]
            .find(|ch| matches!(ch, ',' | '\n' | '}'))
            .map_or(scope.1, |offset| value_start + offset),
    };

    let mut start = scope.0 + found.start();
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    let mut end = value_end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t') {
        end += 1;
    }
    if bytes.get(end) == Some(&b',') {
        end += 1;
    }
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t') {
        end += 1;
    }
    if start > 0 && bytes[start - 1] == b'\n' && bytes.get(end) == Some(&b'\n') {
        end += 1;
    }
    format!("{}{}", &source[..start], &source[end..])
}

pub fn has_named_import(source: &str, symbol: &str) -> bool {
    Regex::new(&format!(
        r"import\s+(?:type\s+)?\{{[^}}]*\b{}\b[^}}]*\}}",
        regex::escape(symbol)
    ))
    .map(|pattern| pattern.is_match(source))
    .unwrap_or(false)
}

fn last_import_end(source: &str) -> Option<usize> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*import\s[^;]*;").expect("import pattern"))
        .find_iter(source)
        .last()
        .map(|found| found.end())
}

/// Ensures `import { symbol } from 'module'`, joining an existing import
/// from the same module when there is one.
pub fn ensure_import(source: &str, symbol: &str, module: &str) -> String {
    if has_named_import(source, symbol) {
        return source.to_string();
    }
    let same_module = Regex::new(&format!(
        r#"import\s+\{{([^}}]*)\}}\s*from\s*['"]{}['"]"#,
        regex::escape(module)
    ))
    .ok()
    .and_then(|pattern| pattern.captures(source))
    .and_then(|captures| captures.get(1));
    if let Some(names) = same_module {
        let list = names.as_str().trim_end();
        let separator = if list.trim().is_empty() || list.ends_with(',') {
            " "
        } else {
            ", "
        };
        let at = names.start() + list.len();
        return format!("{}{separator}{symbol}{}", &source[..at], &source[at..]);
    }

    let statement = format!("import {{ {symbol} }} from '{module}';");
    match last_import_end(source) {
        Some(end) => format!("{}\n{statement}{}", &source[..end], &source[end..]),
        None => format!("{statement}\n\n{source}"),
    }
}

fn style_urls_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bstyleUrls?\s*:\s*(?:\[[^\]]*\]|'[^']*'|"[^"]*")"#).expect("styleUrls pattern")
    })
}

fn quoted_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("quoted pattern"))
}

fn style_ext_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.(?:css|scss|sass|less)$").expect("style ext pattern"))
}

/// Rewrites `styleUrl` / `styleUrls` to the project's style extension and
/// to the singular or plural form. A single reference is pointed at
/// `expected` when given.
pub fn align_style_urls(source: &str, ext: &str, singular: bool, expected: Option<&str>) -> String {
    let Some(found) = style_urls_pattern().find(source) else {
        return source.to_string();
    };
    let mut urls: Vec<String> = quoted_pattern()
        .captures_iter(found.as_str())
        .filter_map(|captures| captures.get(1))
        .map(|url| {
            style_ext_pattern()
                .replace(url.as_str(), format!(".{ext}").as_str())
                .into_owned()
        })
        .collect();
    if let (Some(expected), 1) = (expected, urls.len()) {
        urls[0] = expected.to_string();
    }
    let replacement = if singular && urls.len() == 1 {
        format!("styleUrl: '{}'", urls[0])
    } else {
        let quoted: Vec<String> = urls.iter().map(|url| format!("'{url}'")).collect();
        format!("styleUrls: [{}]", quoted.join(", "))
    };
    format!(
        "{}{}{}",
        &source[..found.start()],
        replacement,
        &source[found.end()..]
    )
}

/// Points `templateUrl` at `expected`.
pub fn align_template_url(source: &str, expected: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let pattern = RE.get_or_init(|| {
        Regex::new(r#"\btemplateUrl\s*:\s*(?:'[^']*'|"[^"]*")"#).expect("templateUrl pattern")
    });
    match pattern.find(source) {
        Some(found) => format!(
            "{}templateUrl: '{expected}'{}",
            &source[..found.start()],
            &source[found.end()..]
        ),
        None => source.to_string(),
    }
}
