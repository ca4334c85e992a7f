//! Site-specific product field extraction from a fetched page.
//!
//! Every rule is best effort: a selector or pattern that finds nothing
//! yields an empty string, never an error.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

/// Which extraction rules apply to a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Walmart,
    Target,
    BestBuy,
    Generic,
}

impl Site {
    pub fn for_host(host: &str) -> Self {
        if host.contains("walmart") {
            Site::Walmart
        } else if host.contains("target") {
            Site::Target
        } else if host.contains("bestbuy") {
            Site::BestBuy
        } else {
            Site::Generic
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub name: String,
    pub description: String,
    pub price: String,
}

lazy_static! {
    static ref NON_PRICE_CHARS: Regex = Regex::new(r"[^0-9.]").unwrap();
    static ref TARGET_DESCRIPTION: Regex =
        Regex::new(r#"\\"downstream_description\\"\s*:\s*\\"(.*?)\\""#).unwrap();
    static ref TARGET_PRICE: Regex =
        Regex::new(r#"\\"formatted_current_price\\"\s*:\s*\\"(\$[^"]+)\\""#).unwrap();
    static ref BESTBUY_DESCRIPTION: Regex = Regex::new(
        r#""description":\{"__typename":"ProductDescription","long":"((?:\\.|[^"\\])*)""#
    )
    .unwrap();
}

pub fn extract(site: Site, html: &str) -> ExtractedFields {
    let doc = Html::parse_document(html);
    let fields = match site {
        Site::Walmart => ExtractedFields {
            name: select_text(&doc, "h1#main-title"),
            price: digits_only(&select_text(&doc, r#"[data-automation-id="product-price"]"#)),
            description: walmart_description(&doc),
        },
        Site::Target => ExtractedFields {
            name: select_text(&doc, r#"[data-test="product-title"]"#),
            description: regex_description(html, &TARGET_DESCRIPTION),
            price: regex_price(html, &TARGET_PRICE),
        },
        Site::BestBuy => ExtractedFields {
            name: select_text(&doc, ".h4"),
            description: regex_description(html, &BESTBUY_DESCRIPTION),
            price: digits_only(&select_text(&doc, ".customer-price")),
        },
        Site::Generic => generic(&doc),
    };
    debug!(?site, name = %fields.name, price = %fields.price, "product fields extracted");
    fields
}

fn generic(doc: &Html) -> ExtractedFields {
    let name = meta_content(doc, r#"meta[property="og:title"]"#)
        .unwrap_or_else(|| select_text(doc, "title"));
    let description = meta_content(doc, r#"meta[property="og:description"]"#)
        .or_else(|| meta_content(doc, r#"meta[name="description"]"#))
        .unwrap_or_default();
    let price = digits_only(&first_text(
        doc,
        r#"[class*="price"], [id*="price"], [data-price], .price"#,
    ));
    ExtractedFields {
        name,
        description,
        price,
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Text of every match joined together, trimmed.
fn select_text(doc: &Html, css: &str) -> String {
    let Some(sel) = selector(css) else {
        return String::new();
    };
    doc.select(&sel)
        .flat_map(|el| el.text())
        .collect::<String>()
        .trim()
        .to_owned()
}

fn first_text(doc: &Html, css: &str) -> String {
    let Some(sel) = selector(css) else {
        return String::new();
    };
    doc.select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_owned())
        .unwrap_or_default()
}

fn meta_content(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_owned)
}

pub fn digits_only(s: &str) -> String {
    NON_PRICE_CHARS.replace_all(s, "").into_owned()
}

fn walmart_description(doc: &Html) -> String {
    let raw = select_text(doc, r#"script[data-seo-id="schema-org-product"]"#);
    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "walmart schema.org block unreadable");
            return String::new();
        }
    };
    let product = match &value {
        serde_json::Value::Array(items) => items.first(),
        other => Some(other),
    };
    let description = product
        .and_then(|p| p.get("description"))
        .and_then(|d| d.as_str())
        .unwrap_or_default();
    description.split("<br>").next().unwrap_or_default().to_owned()
}

fn regex_price(html: &str, re: &Regex) -> String {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| digits_only(m.as_str()))
        .unwrap_or_default()
}

fn regex_description(html: &str, re: &Regex) -> String {
    let Some(captured) = re.captures(html).and_then(|c| c.get(1)) else {
        return String::new();
    };
    let description = unescape_json_string(captured.as_str());
    description.split("\\n").next().unwrap_or_default().to_owned()
}

/// Decode a captured JSON string body; fall back to replacing the
/// escapes product pages commonly use.
pub fn unescape_json_string(captured: &str) -> String {
    let quoted = format!("\"{}\"", captured.replace("\\\\\"", "\\\""));
    match serde_json::from_str::<String>(&quoted) {
        Ok(s) => s,
        Err(e) => {
            debug!(error = %e, "json unescape failed; using manual unescape");
            manual_unescape(captured)
        }
    }
}

fn manual_unescape(text: &str) -> String {
    const REPLACEMENTS: [(&str, &str); 17] = [
        ("\\\"", "\""),
        ("\\\\", "\\"),
        ("\\n", "\n"),
        ("\\r", "\r"),
        ("\\t", "\t"),
        ("\\b", "\u{8}"),
        ("\\f", "\u{c}"),
        ("\\u0026", "&"),
        ("\\u003C", "<"),
        ("\\u003E", ">"),
        ("\\u00A0", "\u{a0}"),
        ("\\u2018", "\u{2018}"),
        ("\\u2019", "\u{2019}"),
        ("\\u201C", "\u{201c}"),
        ("\\u201D", "\u{201d}"),
        ("\\u2013", "\u{2013}"),
        ("\\u2014", "\u{2014}"),
    ];
    REPLACEMENTS
        .iter()
        .fold(text.to_owned(), |acc, (from, to)| acc.replace(from, to))
}
