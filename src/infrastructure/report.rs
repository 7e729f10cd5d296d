//! HTML report of the collected players
//!
//! Pure rendering of the working snapshot against the previous one. Each
//! player becomes a collapsible card highlighted as new or changed.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use tokio::fs;
use tracing::info;
use url::Url;

use crate::domain::{PlayerRecord, Snapshot};
use crate::infrastructure::config::ServerConfig;

/// How a player compares to the previous snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Changed,
    Unchanged,
}

impl ChangeKind {
    fn css_class(self) -> &'static str {
        match self {
            Self::New => " new",
            Self::Changed => " changed",
            Self::Unchanged => "",
        }
    }
}

/// Classify a player against the previous snapshot
pub fn classify(nickname: &str, record: &PlayerRecord, previous: &Snapshot) -> ChangeKind {
    match previous.get(nickname) {
        None => ChangeKind::New,
        Some(old) if record.differs_from(old) => ChangeKind::Changed,
        Some(_) => ChangeKind::Unchanged,
    }
}

/// Card counts of a rendered report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub new: usize,
    pub changed: usize,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub html: String,
    pub summary: ReportSummary,
}

impl Report {
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create report directory")?;
        }
        fs::write(path, &self.html)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to: {:?}", path);
        Ok(())
    }
}

/// Renders the snapshot as a standalone HTML page
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    profile_base: String,
}

impl ReportRenderer {
    /// `profile_base` is prefixed to each nickname to link the card header
    pub fn new(profile_base: impl Into<String>) -> Self {
        Self {
            profile_base: profile_base.into(),
        }
    }

    pub fn from_config(server: &ServerConfig) -> Self {
        let base = server.base_url.trim_end_matches('/');
        let path = server.profile_path.trim_start_matches('/');
        Self::new(format!("{base}/{path}"))
    }

    /// Profile link for a card, with the nickname percent-encoded as one path segment
    fn profile_link(&self, nickname: &str) -> String {
        let Ok(mut url) = Url::parse(&self.profile_base) else {
            return format!("{}{}", self.profile_base, nickname);
        };
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(nickname);
            }
            Err(()) => return format!("{}{}", self.profile_base, nickname),
        }
        url.into()
    }

    pub fn render(&self, current: &Snapshot, previous: &Snapshot) -> Report {
        let mut summary = ReportSummary {
            total: current.len(),
            ..ReportSummary::default()
        };
        let mut cards = String::new();

        for (nickname, record) in current {
            let kind = classify(nickname, record, previous);
            match kind {
                ChangeKind::New => summary.new += 1,
                ChangeKind::Changed => summary.changed += 1,
                ChangeKind::Unchanged => {}
            }
            self.write_card(&mut cards, nickname, record, kind);
        }

        let generated = Local::now().format("%Y-%m-%d %H:%M:%S");
        let html = format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Player report</title>
    <style>{STYLE}</style>
    <script>{SCRIPT}</script>
</head>
<body>
    <div class="report-container">
        <h1>Server player report</h1>
        <div class="controls">
            <button onclick="toggleAll()">Expand/collapse all</button>
            <button onclick="filterByStatus('online')">Online only</button>
            <button onclick="filterByStatus('offline')">Offline only</button>
            <input type="text" id="search" placeholder="Search players..." onkeyup="searchPlayers()">
        </div>
        <div class="timestamp">Generated: {generated}</div>
{cards}    </div>
</body>
</html>
"#
        );

        Report { html, summary }
    }

    fn write_card(&self, out: &mut String, nickname: &str, record: &PlayerRecord, kind: ChangeKind) {
        let link = escape_html(&self.profile_link(nickname));
        let nickname = escape_html(nickname);
        let status = record.status.as_deref().map_or_else(|| "N/A".to_string(), escape_html);

        let _ = write!(
            out,
            r#"        <div class="player-card{class}">
            <div class="player-header" onclick="toggleContent(this)">
                <h2><a href="{link}" target="_blank">{nickname}</a></h2>
                <span class="status-main">{status}</span>
            </div>
            <div class="player-content">
"#,
            class = kind.css_class(),
        );

        write_section(out, "Socials", socials_html(record));
        write_section(out, "Statistics", list_html("stats-list", record.stats.as_deref()));
        write_section(out, "RP cards", rp_cards_html(record));
        write_section(out, "Roles", list_html("roles-list", record.roles.as_deref()));
        write_section(
            out,
            "Player+",
            record
                .player_plus
                .as_deref()
                .filter(|text| !text.is_empty())
                .map(|text| format!("<div class='player-plus'><p>{}</p></div>", escape_html(text))),
        );

        out.push_str("            </div>\n        </div>\n");
    }
}

fn write_section(out: &mut String, title: &str, body: Option<String>) {
    let body = body.unwrap_or_else(|| "N/A".to_string());
    let _ = writeln!(
        out,
        "                <div class=\"section\"><h3 class=\"section-title\">{title}</h3>{body}</div>"
    );
}

fn socials_html(record: &PlayerRecord) -> Option<String> {
    let socials = record.socials.as_deref().filter(|s| !s.is_empty())?;
    let mut html = String::from("<ul class='socials-list'>");
    for social in socials {
        let url = escape_html(&social.url);
        let _ = write!(
            html,
            "<li class='social-item'><span>▪ {}</span><a href='{url}' target='_blank'>{url}</a></li>",
            escape_html(&social.name)
        );
    }
    html.push_str("</ul>");
    Some(html)
}

fn list_html(class: &str, items: Option<&[String]>) -> Option<String> {
    let items = items.filter(|items| !items.is_empty())?;
    let mut html = format!("<ul class='{class}'>");
    for item in items {
        let _ = write!(html, "<li>▪ {}</li>", escape_html(item));
    }
    html.push_str("</ul>");
    Some(html)
}

fn rp_cards_html(record: &PlayerRecord) -> Option<String> {
    let cards = record.rp_cards.as_deref().filter(|c| !c.is_empty())?;
    let mut html = String::from("<div class='rp-cards-container'>");
    for card in cards {
        let _ = write!(
            html,
            "<div class='rp-card'><h3>{}</h3><p>{}</p></div>",
            escape_html(&card.title),
            escape_html(&card.body)
        );
    }
    html.push_str("</div>");
    Some(html)
}

/// Escape text for use in HTML content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const STYLE: &str = r"
        .report-container { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; max-width: 1200px; margin: 20px auto; padding: 20px; background: #f5f5f5; }
        .player-card { background: white; border-radius: 10px; margin: 15px 0; box-shadow: 0 2px 5px rgba(0,0,0,0.1); overflow: hidden; }
        .player-header { padding: 15px 20px; background: #2c3e50; color: white; cursor: pointer; display: flex; justify-content: space-between; align-items: center; }
        .player-header a { color: inherit; text-decoration: none; }
        .player-content { padding: 0 20px; max-height: 0; overflow: hidden; transition: max-height 0.3s ease-out; }
        .player-card.active .player-content { max-height: 2000px; padding: 20px; }
        .section-title { color: #3498db; margin: 15px 0 10px; border-bottom: 2px solid #3498db; padding-bottom: 5px; }
        .socials-list, .stats-list, .roles-list { list-style-type: none; padding-left: 20px; }
        .social-item { margin: 5px 0; display: flex; align-items: center; }
        .social-item a { color: #2980b9; text-decoration: none; margin-left: 10px; }
        .rp-card { background: #f8f9fa; padding: 10px; margin: 10px 0; border-radius: 5px; }
        .timestamp { text-align: center; color: #7f8c8d; margin: 20px 0; }
        .changed { background-color: #fff3cd; border-left: 3px solid #ffc107; }
        .new { background-color: #d4edda; border-left: 3px solid #28a745; }
        .controls { margin: 20px 0; padding: 10px; background: #fff; border-radius: 5px; display: flex; gap: 10px; flex-wrap: wrap; }
        button { padding: 8px 16px; border: none; border-radius: 4px; cursor: pointer; background: #3498db; color: white; }
        input { padding: 8px; border: 1px solid #ddd; border-radius: 4px; flex-grow: 1; }
    ";

const SCRIPT: &str = r"
        function toggleContent(element) {
            element.parentElement.classList.toggle('active');
        }
        function toggleAll() {
            document.querySelectorAll('.player-card').forEach(card => card.classList.toggle('active'));
        }
        function filterByStatus(status) {
            document.querySelectorAll('.player-card').forEach(card => {
                const statusElem = card.querySelector('.player-header span');
                card.style.display = statusElem?.textContent.toLowerCase() === status ? '' : 'none';
            });
        }
        function searchPlayers() {
            const filter = document.getElementById('search').value.toUpperCase();
            document.querySelectorAll('.player-card').forEach(card => {
                const nickname = card.querySelector('h2').textContent.toUpperCase();
                card.style.display = nickname.includes(filter) ? '' : 'none';
            });
        }
    ";
