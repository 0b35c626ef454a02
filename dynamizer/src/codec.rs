//! The Cantata codec: a bijective textual escape for payloads carried inside colon-delimited
//! pub/sub messages.
//!
//! Five substitutions, applied in order on encode and reverse order on decode:
//! `"` <-> `{q}`, `{` <-> `{ob}`, `}` <-> `{cb}`, `\n` <-> `{n}`, `:` <-> `{c}`.
//! The `{`/`}` substitutions must run before any placeholder is materialized, or a literal `{`
//! in the input would be mistaken for part of a placeholder during decode.

/// Escapes `text` for transport inside a colon-delimited payload.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("{q}"),
            '{' => out.push_str("{ob}"),
            '}' => out.push_str("{cb}"),
            '\n' => out.push_str("{n}"),
            ':' => out.push_str("{c}"),
            other => out.push(other),
        }
    }
    out
}

/// Reverses [`encode`]. Unrecognized `{...}` sequences are passed through literally.
pub fn decode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(rest) = text[i..].strip_prefix("{q}") {
            out.push('"');
            i = text.len() - rest.len();
        } else if let Some(rest) = text[i..].strip_prefix("{ob}") {
            out.push('{');
            i = text.len() - rest.len();
        } else if let Some(rest) = text[i..].strip_prefix("{cb}") {
            out.push('}');
            i = text.len() - rest.len();
        } else if let Some(rest) = text[i..].strip_prefix("{n}") {
            out.push('\n');
            i = text.len() - rest.len();
        } else if let Some(rest) = text[i..].strip_prefix("{c}") {
            out.push(':');
            i = text.len() - rest.len();
        } else {
            let ch = text[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_text() {
        let s = "Rating:1-5\nRule\nArtist:X";
        assert_eq!(decode(&encode(s)), s);
    }

    #[test]
    fn round_trips_braces_and_quotes() {
        for s in ["has \"quotes\"", "{nested {braces}}", "colon:colon", "line\nbreak", ""] {
            assert_eq!(decode(&encode(s)), s);
        }
    }

    #[test]
    fn matches_control_round_trip_scenario() {
        let encoded = "Rating{c}1-5{n}Rule{n}Artist{c}X";
        assert_eq!(decode(encoded), "Rating:1-5\nRule\nArtist:X");
    }

    #[test]
    fn encode_is_order_sensitive_for_braces() {
        // A literal '{' must become "{ob}", not be left to collide with a real placeholder.
        assert_eq!(encode("{q}"), "{ob}q{cb}");
        assert_eq!(decode(&encode("{q}")), "{q}");
    }
}
