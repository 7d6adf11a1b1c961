//! Parsing of Sentry `Link` headers.
//!
//! Sentry paginates with RFC 8288 links carrying two extra attributes:
//!
//! ```text
//! <https://sentry.io/api/0/projects/?&cursor=0:100:0>; rel="next"; results="true"; cursor="0:100:0"
//! ```
//!
//! `results` is boolean-shaped; only the literal `true` means another page exists.

/// One relation out of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRelation {
    pub url: String,
    pub rel: String,
    pub results: Option<bool>,
    pub cursor: Option<String>,
}

impl LinkRelation {
    pub fn has_more(&self) -> bool {
        self.results == Some(true)
    }
}

/// Parses every well-formed relation in a `Link` header, skipping malformed entries.
pub fn parse_link_header(header: &str) -> Vec<LinkRelation> {
    header.split(',').filter_map(parse_relation).collect()
}

/// The `rel="next"` relation, if any.
pub fn next_relation(header: &str) -> Option<LinkRelation> {
    parse_link_header(header)
        .into_iter()
        .find(|relation| relation.rel == "next")
}

fn parse_relation(entry: &str) -> Option<LinkRelation> {
    let mut parts = entry.split(';');
    let url = parts
        .next()?
        .trim()
        .strip_prefix('<')?
        .strip_suffix('>')?
        .to_string();

    let mut rel = None;
    let mut results = None;
    let mut cursor = None;
    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "rel" => rel = Some(value.to_string()),
            "results" => results = parse_flag(value),
            "cursor" => cursor = Some(value.to_string()),
            _ => {}
        }
    }

    Some(LinkRelation {
        url,
        rel: rel?,
        results,
        cursor,
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
