//! Decoder for the list cells of the color-usage table, which hold
//! Python-style literals such as `['Bright Red', 'Titanium White\r\n']`.

/// Decode a bracketed list of quoted strings.
///
/// Accepts single or double quotes, an optional trailing comma and the empty
/// list. Escapes `\n`, `\r`, `\t`, `\\`, `\'`, `\"`, `\xNN`, `\uNNNN` and
/// `\UNNNNNNNN` are decoded; named (`\N{...}`) and octal escapes are not
/// supported and stay as literal backslash text. Anything else is an error
/// with a short description of what went wrong.
pub fn parse_string_list(raw: &str) -> Result<Vec<String>, String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| format!("expected a bracketed list, got {:?}", truncate(trimmed)))?;

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        skip_whitespace(&mut chars);
        let Some(quote) = chars.next() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return Err(format!("expected a quoted string, found {:?}", quote));
        }

        let mut item = String::new();
        loop {
            match chars.next() {
                None => return Err("unterminated string".to_string()),
                Some(c) if c == quote => break,
                Some('\\') => match chars.next() {
                    Some('n') => item.push('\n'),
                    Some('r') => item.push('\r'),
                    Some('t') => item.push('\t'),
                    Some(c @ ('\\' | '\'' | '"')) => item.push(c),
                    Some('x') => item.push(hex_escape(&mut chars, 2)?),
                    Some('u') => item.push(hex_escape(&mut chars, 4)?),
                    Some('U') => item.push(hex_escape(&mut chars, 8)?),
                    Some(c) => {
                        item.push('\\');
                        item.push(c);
                    }
                    None => return Err("unterminated escape".to_string()),
                },
                Some(c) => item.push(c),
            }
        }
        items.push(item);

        skip_whitespace(&mut chars);
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(c) => return Err(format!("expected ',' between items, found {:?}", c)),
        }
    }

    Ok(items)
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Read exactly `digits` hex digits and turn them into a char.
fn hex_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    digits: usize,
) -> Result<char, String> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("truncated hex escape {:?}", hex));
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| format!("invalid code point \\{}", hex))
}

fn truncate(s: &str) -> String {
    s.chars().take(40).collect()
}
