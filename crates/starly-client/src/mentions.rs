//! `@username` mentions inside message text.

fn is_handle_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A piece of message text, either plain or a clickable mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// Includes the leading `@`.
    Mention(&'a str),
}

/// Split `text` into plain runs and mentions, in order.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut plain_start = 0;
    let mut rest = text.char_indices().peekable();

    while let Some((i, c)) = rest.next() {
        if c != '@' {
            continue;
        }
        let mut end = i + 1;
        while let Some(&(j, next)) = rest.peek() {
            if !is_handle_char(next) {
                break;
            }
            end = j + next.len_utf8();
            rest.next();
        }
        if end == i + 1 {
            continue;
        }
        if plain_start < i {
            out.push(Segment::Text(&text[plain_start..i]));
        }
        out.push(Segment::Mention(&text[i..end]));
        plain_start = end;
    }
    if plain_start < text.len() {
        out.push(Segment::Text(&text[plain_start..]));
    }
    out
}

/// Usernames mentioned in `text`, without the `@`.
pub fn extract_mentions(text: &str) -> Vec<&str> {
    segments(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Mention(m) => Some(&m[1..]),
            Segment::Text(_) => None,
        })
        .collect()
}
