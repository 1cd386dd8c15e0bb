//! Page scraping for the `platform.cgi` management UI
//!
//! The firmware renders everything server-side, so a handful of regexes is
//! enough: the rule table, the forced-login "continue" link, and the login
//! form that comes back whenever the session is not (or no longer) valid.

use fwsync_core::{Error, FirewallRule, Result};
use regex::Regex;

/// Zero-based index of the destination column in `#recordsData`
pub const DESTINATION_COLUMN: usize = 6;

/// Element id of the IPv6 rule table
pub const RULE_TABLE_ID: &str = "recordsData";

/// Compiled patterns for the management pages
#[derive(Debug, Clone)]
pub struct PageScraper {
    table: Regex,
    row: Regex,
    cell: Regex,
    row_id: Regex,
    tag: Regex,
    continue_link: Regex,
    login_form: Regex,
}

impl PageScraper {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::parse(format!("bad pattern {pattern}: {e}")))
        };

        Ok(Self {
            table: compile(&format!(
                r#"(?is)<table\b[^>]*\sid\s*=\s*["']?{RULE_TABLE_ID}["']?[^>]*>(.*?)</table>"#
            ))?,
            row: compile(r"(?is)<tr\b([^>]*)>(.*?)</tr>")?,
            cell: compile(r"(?is)<td\b[^>]*>(.*?)</td>")?,
            row_id: compile(r#"(?i)(?:^|\s)id\s*=\s*["']?([^"'\s>]+)"#)?,
            tag: compile(r"(?s)<[^>]*>")?,
            continue_link: compile(
                r#"(?is)<a\b[^>]*\sclass\s*=\s*["'][^"']*\bcontinue\b[^"']*["'][^>]*>"#,
            )?,
            login_form: compile(r#"(?i)\sid\s*=\s*["']?tf1_userName\b"#)?,
        })
    }

    /// Whether the page is the login form
    pub fn is_login_page(&self, html: &str) -> bool {
        self.login_form.is_match(html)
    }

    /// The forced-login "continue" link target, if the page shows one
    ///
    /// Returns `Some("")` when the link exists but carries no usable `href`
    /// (the firmware then expects a plain reload).
    pub fn continue_link(&self, html: &str) -> Option<String> {
        let anchor = self.continue_link.find(html)?.as_str();
        Some(attribute(anchor, "href").unwrap_or_default())
    }

    /// Whether the page contains the rule table at all
    pub fn has_rule_table(&self, html: &str) -> bool {
        self.table.is_match(html)
    }

    /// Parse the rule table into snapshots, in table order
    ///
    /// Rows without a destination column (header rows, the "no rules"
    /// placeholder) are skipped and do not consume a position.
    pub fn rules(&self, html: &str) -> Result<Vec<FirewallRule>> {
        let table = self
            .table
            .captures(html)
            .and_then(|c| c.get(1))
            .ok_or_else(|| Error::parse(format!("page has no #{RULE_TABLE_ID} table")))?
            .as_str();

        let mut rules = Vec::new();
        for row in self.row.captures_iter(table) {
            let attrs = row.get(1).map_or("", |m| m.as_str());
            let body = row.get(2).map_or("", |m| m.as_str());

            let cells: Vec<String> = self
                .cell
                .captures_iter(body)
                .map(|c| self.cell_text(c.get(1).map_or("", |m| m.as_str())))
                .collect();

            let Some(destination) = cells.get(DESTINATION_COLUMN) else {
                tracing::trace!("Skipping row with {} cell(s)", cells.len());
                continue;
            };

            let mut rule = FirewallRule::new(rules.len(), destination.clone());
            if let Some(id) = self.row_id.captures(attrs).and_then(|c| c.get(1)) {
                rule = rule.with_row_ref(id.as_str());
            }
            rules.push(rule);
        }

        Ok(rules)
    }

    /// Visible text of a cell: tags stripped, entities decoded, trimmed
    fn cell_text(&self, inner: &str) -> String {
        let text = self.tag.replace_all(inner, "");
        decode_entities(&text).trim().to_string()
    }
}

/// Value of `name="..."` inside a single tag
fn attribute(tag: &str, name: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let needle = format!("{name}=");
    // `data-href=` and friends end in the same text; require a separator before
    let at = lower.match_indices(&needle).map(|(i, _)| i).find(|&i| {
        lower[..i]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_whitespace())
    })?;
    let rest = &tag[at + needle.len()..];
    let value = match rest.chars().next()? {
        quote @ ('"' | '\'') => rest[1..].split(quote).next()?,
        _ => rest.split(|c: char| c.is_whitespace() || c == '>').next()?,
    };
    Some(decode_entities(value))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
