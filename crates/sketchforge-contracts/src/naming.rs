//! Deterministic name derivations shared by the merger and the adapter.

/// Conventional selector prefix stripped from route paths and nav labels.
pub const COMPONENT_PREFIX: &str = "app-";

/// Normalizes an artifact key to kebab-case.
///
/// `LoginForm`, `login_form`, `login form` and `login-form` all become
/// `login-form`. Characters outside `[a-z0-9-]` are dropped.
pub fn kebab_case(raw: &str) -> String {
    let mut out = String::new();
    let mut prev_lower_or_digit = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower_or_digit && !out.ends_with('-') {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
            prev_lower_or_digit = true;
        } else if matches!(ch, '-' | '_' | ' ' | '.') {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower_or_digit = false;
        }
    }
    out.trim_matches('-').to_string()
}

/// Kebab-case key with a trailing artifact suffix (`-component`, `-service`,
/// ...) removed, so `login-form-component` and `login-form` name the same file.
pub fn artifact_stem(raw: &str, suffix: &str) -> String {
    let kebab = kebab_case(raw);
    let tail = format!("-{suffix}");
    match kebab.strip_suffix(&tail) {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => kebab,
    }
}

/// `login-form` → `LoginForm`. Identifiers cannot start with a digit, so
/// leading numeric words move to the end (`404-page` → `Page404`) and an
/// all-numeric name gets an `N` prefix.
pub fn pascal_case(kebab: &str) -> String {
    let words: Vec<&str> = kebab.split('-').filter(|part| !part.is_empty()).collect();
    let lead = words
        .iter()
        .take_while(|word| word.starts_with(|ch: char| ch.is_ascii_digit()))
        .count();
    let mut out: String = words[lead..]
        .iter()
        .chain(&words[..lead])
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if out.starts_with(|ch: char| ch.is_ascii_digit()) {
        out.insert(0, 'N');
    }
    out
}

/// `login-form` → `LoginFormComponent`
pub fn component_symbol(name: &str) -> String {
    format!("{}Component", pascal_case(name))
}

/// `user-api` → `UserApiService`
pub fn service_symbol(name: &str) -> String {
    format!("{}Service", pascal_case(name))
}

/// Route path for a component: `app-dashboard` → `dashboard`.
pub fn route_path(name: &str) -> String {
    match name.strip_prefix(COMPONENT_PREFIX) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => name.to_string(),
    }
}

/// Navigation label: `app-user-profile` → `User Profile`.
pub fn nav_label(name: &str) -> String {
    route_path(name)
        .split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
