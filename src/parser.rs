//! HTML → listing records for the marketplace's index and detail pages.

use std::collections::{BTreeMap, HashSet};

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::extract::text::clean_price;
use crate::types::{ListingDetail, ListingSummary, ParamValue};

const PLACEHOLDER: &str = "—";

pub struct ListingParser {
    origin: Url,
    card: Selector,
    card_title: Selector,
    card_price: Selector,
    card_link: Selector,
    img: Selector,
    description: Selector,
    seller: Vec<Selector>,
    location: Selector,
    parameter: Selector,
    photo: Vec<Selector>,
}

impl ListingParser {
    /// `origin` is the site root relative card links are joined against.
    pub fn new(origin: &str) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| AppError::Config(format!("invalid site origin {origin}: {e}")))?;
        Ok(Self {
            origin,
            card: selector(r#"div[data-testid="l-card"]"#)?,
            card_title: selector("h4")?,
            card_price: selector(r#"p[data-testid="ad-price"]"#)?,
            card_link: selector("a[href]")?,
            img: selector("img")?,
            description: selector(r#"div[data-testid="ad_description"]"#)?,
            seller: vec![
                selector(r#"h4[data-testid="seller-name"]"#)?,
                selector("h4.css-14tb3q5")?,
            ],
            location: selector(r#"p[data-testid="location-date"]"#)?,
            parameter: selector(r#"div[data-testid="ad-parameters-container"] p"#)?,
            photo: vec![
                selector(r#"div[data-testid="ad-photo"] img"#)?,
                selector(r#"img[data-testid="swiper-image"]"#)?,
            ],
        })
    }

    /// Listing cards in page order. Cards without a title, a link or a
    /// numeric price are dropped, as are repeats of the same listing.
    pub fn parse_index(&self, html: &str) -> Vec<ListingSummary> {
        let doc = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut listings = Vec::new();

        for card in doc.select(&self.card) {
            let Some(summary) = self.parse_card(&card) else {
                continue;
            };
            if seen.insert(summary.identity.clone()) {
                listings.push(summary);
            }
        }

        debug!(count = listings.len(), "Parsed listing index");
        listings
    }

    fn parse_card(&self, card: &ElementRef) -> Option<ListingSummary> {
        let title = card.select(&self.card_title).next().map(|e| text_of(&e))?;
        let price_text = card.select(&self.card_price).next().map(|e| text_of(&e))?;
        let href = card
            .select(&self.card_link)
            .next()
            .and_then(|a| a.value().attr("href"))?;

        let list_price = clean_price(&price_text)?;
        let identity = canonical_identity(&self.origin, href)?;
        let thumbnail = card
            .select(&self.img)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(normalize_img_url);

        Some(ListingSummary {
            identity,
            title,
            list_price,
            thumbnail,
        })
    }

    pub fn parse_detail(&self, html: &str) -> ListingDetail {
        let doc = Html::parse_document(html);

        let description = doc
            .select(&self.description)
            .next()
            .map(|e| text_of(&e))
            .unwrap_or_default();

        let seller_name = self
            .seller
            .iter()
            .find_map(|s| doc.select(s).next())
            .map(|e| text_of(&e))
            .unwrap_or_else(|| PLACEHOLDER.to_string());

        let location = doc
            .select(&self.location)
            .next()
            .map(|e| {
                let full = e.text().collect::<String>();
                full.split('-').next().unwrap_or_default().trim().to_string()
            })
            .unwrap_or_else(|| PLACEHOLDER.to_string());

        let raw_parameters = doc
            .select(&self.parameter)
            .filter_map(|p| parse_parameter(&text_of(&p)))
            .collect::<BTreeMap<_, _>>();

        let primary_image = self
            .photo
            .iter()
            .filter_map(|s| doc.select(s).next())
            .find_map(|img| img.value().attr("src").and_then(normalize_img_url));

        ListingDetail {
            description,
            seller_name,
            location,
            raw_parameters,
            primary_image,
        }
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::Parse(format!("selector {css}: {e}")))
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// "Model telefonu: iPhone 13" → ("model telefonu", Text("iPhone 13")),
/// "Prywatne" → ("prywatne", Flag).
fn parse_parameter(line: &str) -> Option<(String, ParamValue)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(':') {
        Some((label, value)) => {
            let label = label.trim().to_lowercase();
            let value = value.trim();
            if label.is_empty() {
                return None;
            }
            if value.is_empty() {
                Some((label, ParamValue::Flag))
            } else {
                Some((label, ParamValue::Text(value.to_string())))
            }
        }
        None => Some((line.to_lowercase(), ParamValue::Flag)),
    }
}

/// Absolute listing URL without query string or fragment.
pub fn canonical_identity(origin: &Url, href: &str) -> Option<String> {
    let mut url = origin.join(href.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Keeps absolute http(s) image URLs; `//host/x` becomes `https://host/x`.
pub fn normalize_img_url(src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if src.starts_with('/') || !src.starts_with("http") {
        return None;
    }
    Some(src.to_string())
}
