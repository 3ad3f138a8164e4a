use crate::config::MAX_DESC_LEN;
use crate::notifier::{Button, OutgoingMessage};
use crate::types::Deal;

/// Caption: bold title, link, then the start of the description.
/// Buttons: location / storage, price / market price, profit / seller, link.
pub fn deal_message(deal: &Deal) -> OutgoingMessage {
    let desc: String = deal.detail.description.chars().take(MAX_DESC_LEN).collect();

    let text = format!(
        "📱 <b>{}</b>\n🔗 {}\n\n{}",
        escape_html(&deal.summary.title),
        escape_html(&deal.summary.identity),
        escape_html(&desc),
    );

    let buttons = vec![
        vec![
            Button::info(format!("📍 {}", deal.detail.location)),
            Button::info(format!("💾 {} GB", deal.storage_gb)),
        ],
        vec![
            Button::info(format!("💰 {} PLN", deal.summary.list_price)),
            Button::info(format!("🏆 {} PLN", deal.market_price)),
        ],
        vec![
            Button::info(format!("🤑 +{} PLN", deal.profit)),
            Button::info(format!("👤 {}", deal.detail.seller_name)),
        ],
        vec![Button::link("🔗 Open listing", deal.summary.identity.clone())],
    ];

    OutgoingMessage {
        text,
        image: deal.image().map(str::to_string),
        buttons,
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::ButtonAction;
    use crate::types::{Generation, ListingDetail, ListingSummary, Tier};

    fn deal(description: &str) -> Deal {
        Deal {
            summary: ListingSummary {
                identity: "https://www.olx.pl/d/oferta/a".to_string(),
                title: "iPhone 13 <Pro> & case".to_string(),
                list_price: 650,
                thumbnail: Some("https://cdn/thumb.jpg".to_string()),
            },
            detail: ListingDetail {
                description: description.to_string(),
                seller_name: "Ola".to_string(),
                location: "Warszawa".to_string(),
                ..ListingDetail::default()
            },
            generation: Generation::new(13).unwrap(),
            tier: Tier::Pro,
            storage_gb: 128,
            market_price: 700,
            profit: 50,
        }
    }

    #[test]
    fn caption_is_escaped_and_description_capped() {
        let long = "ż".repeat(MAX_DESC_LEN + 50);
        let msg = deal_message(&deal(&long));

        assert!(msg.text.starts_with("📱 <b>iPhone 13 &lt;Pro&gt; &amp; case</b>\n"));
        assert_eq!(msg.text.matches('ż').count(), MAX_DESC_LEN);
        assert_eq!(msg.image.as_deref(), Some("https://cdn/thumb.jpg"));
    }

    #[test]
    fn buttons_carry_deal_numbers() {
        let msg = deal_message(&deal("ok"));
        let labels: Vec<&str> = msg.buttons.iter().flatten().map(|b| b.text.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "📍 Warszawa",
                "💾 128 GB",
                "💰 650 PLN",
                "🏆 700 PLN",
                "🤑 +50 PLN",
                "👤 Ola",
                "🔗 Open listing"
            ]
        );
        assert_eq!(
            msg.buttons[3][0].action,
            ButtonAction::Url("https://www.olx.pl/d/oferta/a".to_string())
        );
    }
}
