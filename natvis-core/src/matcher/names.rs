//! Type name normalization
//!
//! Debuggers and visualizer authors spell the same type differently
//! (`const char *` vs `const char*`, `Map<int, int>` vs `Map<int,int>`).
//! Names are brought to one canonical spelling before they are parsed.

/// Keywords dropped from the front of a whole type name. The qualifier is
/// already stripped through the type table; the elaborated-type keywords are
/// noise some debuggers add.
const LEADING_KEYWORDS: [&str; 6] = ["const", "volatile", "class", "struct", "union", "enum"];

/// Characters that never need surrounding whitespace
fn is_punct(c: char) -> bool {
    matches!(c, '*' | '&' | '<' | '>' | ',' | ':' | '(' | ')' | '[' | ']')
}

/// Canonical spacing: whitespace runs collapse to one space, and no space is
/// kept next to punctuation.
///
/// Examples:
/// - `const char *` -> `const char*`
/// - `Map< int , Vector<int> >` -> `Map<int,Vector<int>>`
/// - `ns :: Foo` -> `ns::Foo`
pub fn canonical_spacing(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;

    for c in name.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            let after_punct = out.chars().last().map_or(true, is_punct);
            if !after_punct && !is_punct(c) {
                out.push(' ');
            }
            pending_space = false;
        }
        out.push(c);
    }

    out
}

/// Normalize a whole type name for matching
pub fn normalize_type_name(name: &str) -> String {
    let mut rest = name.trim();

    // Remove leading keywords, possibly several (`const volatile struct X`)
    loop {
        let stripped = LEADING_KEYWORDS.iter().find_map(|keyword| {
            rest.strip_prefix(keyword)
                .filter(|tail| tail.starts_with(char::is_whitespace))
        });
        match stripped {
            Some(tail) => rest = tail.trim_start(),
            None => break,
        }
    }

    canonical_spacing(rest)
}
