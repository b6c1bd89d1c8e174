// src/stages/script/minify.rs

//! Conservative JavaScript minifier.
//!
//! Strips comments and collapses whitespace without renaming or rewriting
//! anything. Line breaks are kept (collapsed to one) so automatic semicolon
//! insertion behaves exactly as in the input.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gap {
    None,
    Space,
    Newline,
}

/// Keywords after which a `/` starts a regular expression literal.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\\' || !c.is_ascii()
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

struct Minifier {
    out: String,
    gap: Gap,
    /// The last token emitted, when it was a word.
    last_word: String,
}

impl Minifier {
    fn last_char(&self) -> Option<char> {
        self.out.chars().next_back()
    }

    fn note_gap(&mut self, gap: Gap) {
        if gap == Gap::Newline || self.gap == Gap::None {
            self.gap = gap;
        }
    }

    /// Emit pending whitespace ahead of a token starting with `next`.
    fn flush(&mut self, next: char) {
        let gap = std::mem::replace(&mut self.gap, Gap::None);
        let Some(prev) = self.last_char() else {
            return;
        };
        match gap {
            Gap::Newline => self.out.push('\n'),
            Gap::Space if needs_space(prev, next) => self.out.push(' '),
            _ => {}
        }
    }

    fn push_token(&mut self, token: &[char]) {
        if let Some(&first) = token.first() {
            self.flush(first);
        }
        self.out.extend(token);
        self.last_word.clear();
    }

    fn regex_allowed(&self) -> bool {
        match self.last_char() {
            None => true,
            Some(c) if is_word_char(c) => REGEX_KEYWORDS.contains(&self.last_word.as_str()),
            Some(')' | ']' | '\'' | '"' | '`') => false,
            Some(_) => true,
        }
    }
}

/// Whether dropping the whitespace between `prev` and `next` would merge
/// two tokens.
fn needs_space(prev: char, next: char) -> bool {
    (is_word_char(prev) && is_word_char(next))
        || (prev == next && matches!(prev, '+' | '-' | '/'))
        || (prev.is_ascii_digit() && next == '.')
}

/// End (exclusive) of the string literal starting at `start`.
fn string_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            c if is_line_break(c) => return i,
            _ => i += 1,
        }
    }
    chars.len()
}

/// End (exclusive) of the template literal starting at `start`, including
/// nested templates inside `${...}`.
fn template_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '`' => return i + 1,
            '$' if chars.get(i + 1) == Some(&'{') => {
                i += 2;
                let mut depth = 1usize;
                while i < chars.len() && depth > 0 {
                    match chars[i] {
                        '`' => i = template_end(chars, i),
                        '\'' | '"' => i = string_end(chars, i),
                        '{' => {
                            depth += 1;
                            i += 1;
                        }
                        '}' => {
                            depth -= 1;
                            i += 1;
                        }
                        _ => i += 1,
                    }
                }
            }
            _ => i += 1,
        }
    }
    chars.len()
}

/// End (exclusive) of the regex literal body starting at `start`, or `None`
/// when no closing slash appears on the same line (so it was division).
fn regex_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let mut in_class = false;
    while let Some(&c) = chars.get(i) {
        match c {
            c if is_line_break(c) => return None,
            '\\' => i += 1,
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => return Some(i + 1),
            _ => {}
        }
        i += 1;
    }
    None
}

pub fn minify_js(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut m = Minifier {
        out: String::with_capacity(src.len()),
        gap: Gap::None,
        last_word: String::new(),
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if is_line_break(c) => {
                m.note_gap(Gap::Newline);
                i += 1;
            }
            c if c.is_whitespace() => {
                m.note_gap(Gap::Space);
                i += 1;
            }
            '/' if next == Some('/') => {
                while i < chars.len() && !is_line_break(chars[i]) {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                let mut j = i + 2;
                let mut multiline = false;
                while j < chars.len() && !(chars[j] == '*' && chars.get(j + 1) == Some(&'/')) {
                    multiline |= is_line_break(chars[j]);
                    j += 1;
                }
                m.note_gap(if multiline { Gap::Newline } else { Gap::Space });
                i = (j + 2).min(chars.len());
            }
            '/' if m.regex_allowed() => match regex_end(&chars, i) {
                Some(end) => {
                    m.push_token(&chars[i..end]);
                    i = end;
                }
                None => {
                    m.push_token(&chars[i..i + 1]);
                    i += 1;
                }
            },
            '\'' | '"' => {
                let end = string_end(&chars, i).min(chars.len());
                m.push_token(&chars[i..end]);
                i = end;
            }
            '`' => {
                let end = template_end(&chars, i).min(chars.len());
                m.push_token(&chars[i..end]);
                i = end;
            }
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                m.flush(c);
                let word: String = chars[start..i].iter().collect();
                m.out.push_str(&word);
                m.last_word = word;
            }
            _ => {
                m.push_token(&chars[i..i + 1]);
                i += 1;
            }
        }
    }

    m.out
}
