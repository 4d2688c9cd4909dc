use anyhow::{bail, Context};

/// Characters XML 1.0 cannot carry, even escaped.
pub fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r')
        || ('\u{20}'..='\u{D7FF}').contains(&c)
        || ('\u{E000}'..='\u{FFFD}').contains(&c)
        || c >= '\u{10000}'
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape(s: &str) -> anyhow::Result<String> {
    if !s.contains('&') {
        return Ok(s.to_string());
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .with_context(|| format!("unterminated entity in {s:?}"))?;
        let entity = &after[..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                match code.and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => bail!("unknown entity &{entity};"),
                }
            }
        }
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent<'a> {
    Start {
        name: &'a str,
        attrs: &'a str,
        empty: bool,
    },
    End {
        name: &'a str,
    },
    Text(&'a str),
    /// `<![CDATA[...]]>` body, taken literally.
    CData(&'a str),
}

impl XmlEvent<'_> {
    /// Character data carried by a text or CDATA event, with entities resolved.
    pub fn character_data(&self) -> anyhow::Result<Option<String>> {
        match self {
            XmlEvent::Text(t) => unescape(t).map(Some),
            XmlEvent::CData(t) => Ok(Some((*t).to_string())),
            _ => Ok(None),
        }
    }
}

/// Flat tag/text tokenizer. Enough for the SpreadsheetML parts we read back;
/// not a general XML parser (no DTDs, no `>` inside attribute values).
pub fn tokenize(src: &str) -> anyhow::Result<Vec<XmlEvent<'_>>> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < src.len() {
        let rest = &src[pos..];
        if !rest.starts_with('<') {
            let end = rest.find('<').unwrap_or(rest.len());
            out.push(XmlEvent::Text(&rest[..end]));
            pos += end;
            continue;
        }

        if let Some(body) = rest.strip_prefix("<![CDATA[") {
            let close = body
                .find("]]>")
                .with_context(|| format!("unterminated CDATA section at byte {pos}"))?;
            out.push(XmlEvent::CData(&body[..close]));
            pos += "<![CDATA[".len() + close + "]]>".len();
            continue;
        }

        let (skip_to, terminator) = if rest.starts_with("<?") {
            (true, "?>")
        } else if rest.starts_with("<!--") {
            (true, "-->")
        } else if rest.starts_with("<!") {
            (true, ">")
        } else {
            (false, ">")
        };

        let close = rest
            .find(terminator)
            .with_context(|| format!("unterminated tag at byte {pos}"))?;
        let next = pos + close + terminator.len();
        if skip_to {
            pos = next;
            continue;
        }

        let inner = &rest[1..close];
        if let Some(name) = inner.strip_prefix('/') {
            out.push(XmlEvent::End {
                name: local_name(name.trim()),
            });
        } else {
            let empty = inner.ends_with('/');
            let inner = inner.trim_end_matches('/');
            let (name, attrs) = match inner.find(|c: char| c.is_ascii_whitespace()) {
                Some(i) => (&inner[..i], inner[i..].trim()),
                None => (inner, ""),
            };
            out.push(XmlEvent::Start {
                name: local_name(name),
                attrs,
                empty,
            });
        }
        pos = next;
    }

    Ok(out)
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Looks up an attribute value (still escaped) by its local name.
pub fn attr<'a>(attrs: &'a str, key: &str) -> Option<&'a str> {
    let mut rest = attrs;
    loop {
        rest = rest.trim_start();
        let eq = rest.find('=')?;
        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let quote = after.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let value_len = after[1..].find(quote)?;
        let value = &after[1..1 + value_len];
        if local_name(name) == key {
            return Some(value);
        }
        rest = &after[1 + value_len + 1..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_and_unescape_are_inverse() {
        let s = "Tom & Jerry's <\"cup\">";
        assert_eq!(unescape(&escape(s)).unwrap(), s);
        assert_eq!(unescape("&#233;&#x41;").unwrap(), "éA");
        assert!(unescape("&bogus;").is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(is_xml_char('\n'));
        assert!(is_xml_char('⚽'));
        assert!(!is_xml_char('\u{0}'));
        assert!(!is_xml_char('\u{1B}'));
        assert!(!is_xml_char('\u{FFFE}'));
    }

    #[test]
    fn tokenizes_tags_and_text() {
        let src = r#"<?xml version="1.0"?><x:row r="1"><c r="A1" t="b"><v>1</v></c><c r="B1"/></x:row>"#;
        let events = tokenize(src).unwrap();
        assert_eq!(
            events[0],
            XmlEvent::Start {
                name: "row",
                attrs: r#"r="1""#,
                empty: false
            }
        );
        assert_eq!(events[3], XmlEvent::Text("1"));
        assert!(matches!(events[6], XmlEvent::Start { name: "c", empty: true, .. }));
        assert_eq!(events[7], XmlEvent::End { name: "row" });
    }

    #[test]
    fn cdata_is_kept_verbatim() {
        let events = tokenize("<t><![CDATA[a>b &amp; <c>]]></t>").unwrap();
        assert_eq!(events[1], XmlEvent::CData("a>b &amp; <c>"));
        assert_eq!(events[2], XmlEvent::End { name: "t" });

        assert!(tokenize("<t><![CDATA[never closed</t>").is_err());
    }

    #[test]
    fn finds_attributes_by_local_name() {
        let attrs = r#"r="B7" s='1' x:t="inlineStr""#;
        assert_eq!(attr(attrs, "r"), Some("B7"));
        assert_eq!(attr(attrs, "s"), Some("1"));
        assert_eq!(attr(attrs, "t"), Some("inlineStr"));
        assert_eq!(attr(attrs, "missing"), None);
    }
}
