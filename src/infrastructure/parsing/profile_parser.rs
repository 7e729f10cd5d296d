//! Player profile parser
//!
//! Best-effort extraction: every section that is missing from the page ends
//! up as `None` in the record, parsing itself never fails.

use anyhow::{Result, anyhow};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::domain::{PlayerRecord, RpCard, SocialLink};

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";

/// Class of the icon-font spans whose ligature text must not leak into values
const ICON_CLASS: &str = "material-symbols-rounded";

/// Parser for player profile pages
pub struct ProfileParser {
    online_indicator: Selector,
    status_main: Selector,
    player_plus: Selector,
    socials: Selector,
    stats: Selector,
    rp_container: Selector,
    rp_card: Selector,
    roles: Selector,
    contact_link: Selector,
    anchor: Selector,
    paragraph: Selector,
    heading: Selector,
    span: Selector,
    whitespace: Regex,
    space_before_punct: Regex,
}

impl ProfileParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            online_indicator: compile_selector("div.playerOnline")?,
            status_main: compile_selector("p.status-main")?,
            player_plus: compile_selector("div.player-plus-content")?,
            socials: compile_selector("div.socials")?,
            stats: compile_selector("div.stats")?,
            rp_container: compile_selector("div.rp-container")?,
            rp_card: compile_selector("div.rp-card")?,
            roles: compile_selector("div.roles")?,
            contact_link: compile_selector("a.social.telegram")?,
            anchor: compile_selector("a")?,
            paragraph: compile_selector("p")?,
            heading: compile_selector("h3")?,
            span: compile_selector("span")?,
            whitespace: Regex::new(r"\s+")?,
            space_before_punct: Regex::new(r"\s+([.,!?;:])")?,
        })
    }

    /// Extract every profile section from a raw page
    pub fn parse(&self, html: &str) -> PlayerRecord {
        let document = Html::parse_document(html);

        let record = PlayerRecord {
            status: Some(self.extract_status(&document)),
            status_main: document
                .select(&self.status_main)
                .next()
                .map(|el| self.clean_text(el)),
            player_plus: self.extract_player_plus(&document),
            socials: self.extract_socials(&document),
            stats: self.extract_stats(&document),
            rp_cards: self.extract_rp_cards(&document),
            roles: self.extract_roles(&document),
            telegram: None,
        };

        debug!(
            "Parsed profile: status_main={}, stats={}, roles={}",
            record.status_main.is_some(),
            record.stats.as_ref().map_or(0, Vec::len),
            record.roles.as_ref().map_or(0, Vec::len)
        );
        record
    }

    /// Secondary pass for the external contact link, which the section
    /// extraction above does not cover
    pub fn extract_contact_link(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.contact_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
    }

    fn extract_status(&self, document: &Html) -> String {
        let online = document
            .select(&self.online_indicator)
            .next()
            .is_some_and(|div| div.value().classes().any(|class| class == "active"));
        let status = if online { STATUS_ONLINE } else { STATUS_OFFLINE };
        status.to_string()
    }

    fn extract_player_plus(&self, document: &Html) -> Option<String> {
        let container = document.select(&self.player_plus).next()?;
        container
            .select(&self.paragraph)
            .next()
            .map(|p| self.clean_text(p))
    }

    fn extract_socials(&self, document: &Html) -> Option<Vec<SocialLink>> {
        let container = document.select(&self.socials).next()?;
        let links = container
            .select(&self.anchor)
            .filter_map(|a| {
                let Some(url) = a.value().attr("href") else {
                    debug!("Skipping social link without href");
                    return None;
                };
                Some(SocialLink {
                    name: self.clean_text(a),
                    url: url.to_string(),
                })
            })
            .collect();
        Some(links)
    }

    fn extract_stats(&self, document: &Html) -> Option<Vec<String>> {
        let container = document.select(&self.stats).next()?;
        Some(
            container
                .select(&self.paragraph)
                .map(|p| self.clean_text(p))
                .collect(),
        )
    }

    fn extract_rp_cards(&self, document: &Html) -> Option<Vec<RpCard>> {
        let container = document.select(&self.rp_container).next()?;
        Some(
            container
                .select(&self.rp_card)
                .map(|card| RpCard {
                    title: card
                        .select(&self.heading)
                        .next()
                        .map(|h| self.clean_text(h))
                        .unwrap_or_default(),
                    body: card
                        .select(&self.paragraph)
                        .next()
                        .map(|p| self.clean_text(p))
                        .unwrap_or_default(),
                })
                .collect(),
        )
    }

    fn extract_roles(&self, document: &Html) -> Option<Vec<String>> {
        let container = document.select(&self.roles).next()?;
        let roles: Vec<String> = container
            .select(&self.span)
            .map(|span| self.clean_text(span))
            .filter(|role| !role.is_empty())
            .collect();
        (!roles.is_empty()).then_some(roles)
    }

    /// Visible text of an element with icon glyphs removed and whitespace normalized
    pub fn clean_text(&self, element: ElementRef<'_>) -> String {
        let mut raw = String::new();
        collect_visible_text(element, &mut raw);
        let collapsed = self.whitespace.replace_all(&raw, " ");
        self.space_before_punct
            .replace_all(&collapsed, "$1")
            .trim()
            .to_string()
    }
}

fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Failed to compile selector '{}': {}", selector, e))
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let is_icon = child_element.value().name() == "span"
                && child_element.value().classes().any(|class| class == ICON_CLASS);
            if !is_icon {
                collect_visible_text(child_element, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PROFILE: &str = r#"
        <html><body>
          <div class="playerOnline active"></div>
          <p class="status-main">  Mayor   of <b>Town</b> </p>
          <div class="player-plus-content"><p>Premium since 2023</p><p>ignored</p></div>
          <div class="socials">
            <a href="https://vk.com/steve"><span class="material-symbols-rounded">link</span> VK</a>
            <a>No href</a>
            <a class="social telegram" href="https://t.me/steve">Telegram</a>
          </div>
          <div class="stats">
            <p><span class="material-symbols-rounded">schedule</span>Hours played : 120 .</p>
            <p>Deaths:   4</p>
          </div>
          <div class="rp-container">
            <div class="rp-card"><h3>Bio</h3><p>Farmer &amp; fisher</p></div>
            <div class="rp-card"><p>No title</p></div>
          </div>
          <div class="roles"><span>Builder</span><span>  </span><span>Judge</span></div>
        </body></html>
    "#;

    fn parser() -> ProfileParser {
        ProfileParser::new().expect("selectors compile")
    }

    #[test]
    fn parses_every_section() {
        let record = parser().parse(FULL_PROFILE);

        assert_eq!(record.status.as_deref(), Some(STATUS_ONLINE));
        assert_eq!(record.status_main.as_deref(), Some("Mayor of Town"));
        assert_eq!(record.player_plus.as_deref(), Some("Premium since 2023"));

        let socials = record.socials.unwrap();
        assert_eq!(socials.len(), 2);
        assert_eq!(socials[0], SocialLink { name: "VK".into(), url: "https://vk.com/steve".into() });
        assert_eq!(socials[1].name, "Telegram");

        assert_eq!(
            record.stats.unwrap(),
            vec!["Hours played: 120.".to_string(), "Deaths: 4".to_string()]
        );

        let cards = record.rp_cards.unwrap();
        assert_eq!(cards[0], RpCard { title: "Bio".into(), body: "Farmer & fisher".into() });
        assert_eq!(cards[1], RpCard { title: String::new(), body: "No title".into() });

        assert_eq!(record.roles.unwrap(), vec!["Builder".to_string(), "Judge".to_string()]);
        assert!(record.telegram.is_none());
    }

    #[test]
    fn missing_sections_are_none() {
        let record = parser().parse("<html><body><h1>Not found</h1></body></html>");

        assert_eq!(record.status.as_deref(), Some(STATUS_OFFLINE));
        assert!(record.status_main.is_none());
        assert!(record.player_plus.is_none());
        assert!(record.socials.is_none());
        assert!(record.stats.is_none());
        assert!(record.rp_cards.is_none());
        assert!(record.roles.is_none());
        assert!(!record.is_valid());
    }

    #[test]
    fn inactive_indicator_means_offline() {
        let record = parser().parse(r#"<div class="playerOnline"></div><div class="stats"></div>"#);
        assert_eq!(record.status.as_deref(), Some(STATUS_OFFLINE));
        assert_eq!(record.stats, Some(Vec::new()));
    }

    #[test]
    fn empty_containers() {
        let record = parser().parse(
            r#"<div class="socials"></div><div class="roles"><span> </span></div>
               <div class="player-plus-content"></div>"#,
        );
        assert_eq!(record.socials, Some(Vec::new()));
        assert!(record.roles.is_none());
        assert!(record.player_plus.is_none());
    }

    #[test]
    fn contact_link_is_extracted_separately() {
        let parser = parser();
        assert_eq!(
            parser.extract_contact_link(FULL_PROFILE).as_deref(),
            Some("https://t.me/steve")
        );
        assert!(parser.extract_contact_link("<a class=\"social\" href=\"x\">x</a>").is_none());
    }
}
