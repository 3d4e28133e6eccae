//! Turns the wizard selections into the single instruction sent to the image model.
//!
//! The prompt is an ordered list of clauses. Each clause has a predicate and a
//! renderer; clauses are evaluated in declaration order and the applicable ones
//! are joined with a space.

use crate::models::{AssetType, DesignConfig};

pub const STYLE_DIRECTIVE: &str =
    "Design Style: Premium, Branded, Clean. Use a cohesive color palette, crisp typography and polished commercial lighting.";

pub const CLOSING_DIRECTIVE: &str =
    "Preserve the product's identity exactly as photographed, including its shape, colors, labels and proportions, while enhancing the background, lighting and supporting graphics.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Lead,
    Price,
    BannerLayout,
    Style,
    UserInstructions,
    Closing,
}

struct Clause {
    kind: ClauseKind,
    applies: fn(&DesignConfig) -> bool,
    render: fn(&DesignConfig) -> String,
}

const CLAUSES: &[Clause] = &[
    Clause { kind: ClauseKind::Lead, applies: always, render: lead },
    Clause { kind: ClauseKind::Price, applies: has_price, render: price },
    Clause { kind: ClauseKind::BannerLayout, applies: is_banner, render: banner_layout },
    Clause { kind: ClauseKind::Style, applies: always, render: style },
    Clause { kind: ClauseKind::UserInstructions, applies: always, render: user_instructions },
    Clause { kind: ClauseKind::Closing, applies: always, render: closing },
];

fn always(_: &DesignConfig) -> bool {
    true
}

fn has_price(config: &DesignConfig) -> bool {
    config.asset_type().shows_price() && config.price().is_some()
}

fn is_banner(config: &DesignConfig) -> bool {
    config.asset_type() == AssetType::Banner
}

fn lead(config: &DesignConfig) -> String {
    format!(
        "Edit the provided product image to create a premium, professional {} {} for {} ({}).",
        config.size.label(), config.sub_type(), config.platform, config.size.dimensions()
    )
}

fn price(config: &DesignConfig) -> String {
    format!("Prominently display the price: \"{}\".", config.price().unwrap_or_default())
}

fn banner_layout(config: &DesignConfig) -> String {
    format!("Ensure the layout suits a {} placement, leaving clear space for headline text.", config.sub_type())
}

fn style(_: &DesignConfig) -> String {
    STYLE_DIRECTIVE.to_string()
}

fn user_instructions(config: &DesignConfig) -> String {
    format!("Specific User Instructions: \"{}\".", config.custom_instructions)
}

fn closing(_: &DesignConfig) -> String {
    CLOSING_DIRECTIVE.to_string()
}

/// The applicable clauses, in order.
pub fn clauses(config: &DesignConfig) -> Vec<(ClauseKind, String)> {
    CLAUSES.iter()
        .filter(|c| (c.applies)(config))
        .map(|c| (c.kind, (c.render)(config)))
        .collect()
}

pub fn build_prompt(config: &DesignConfig) -> String {
    clauses(config).into_iter().map(|(_, text)| text).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfigUpdate, DesignSize, Platform};
    use pretty_assertions::assert_eq;

    fn config(asset_type: AssetType, price: Option<&str>, instructions: &str) -> DesignConfig {
        let mut c = DesignConfig::new(asset_type);
        c.price_text = price.map(str::to_string);
        c.custom_instructions = instructions.to_string();
        c
    }

    fn kinds(config: &DesignConfig) -> Vec<ClauseKind> {
        clauses(config).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn flyer_scenario_renders_clauses_in_order() {
        let mut c = DesignConfig::default();
        c.apply(ConfigUpdate {
            asset_type: Some(AssetType::Flyer),
            sub_type: Some("Product Flyer".into()),
            platform: Some(Platform::Instagram),
            size: Some(DesignSize::Square),
            price_text: Some("$19.99".into()),
            custom_instructions: Some("add sparkles".into()),
        }).unwrap();

        let prompt = build_prompt(&c);
        let lead = prompt.find("Square Product Flyer for Instagram").expect("lead");
        let price = prompt.find("Prominently display the price: \"$19.99\".").expect("price");
        let style = prompt.find(STYLE_DIRECTIVE).expect("style");
        let user = prompt.find("Specific User Instructions: \"add sparkles\".").expect("user");
        let closing = prompt.find(CLOSING_DIRECTIVE).expect("closing");
        assert!(lead < price && price < style && style < user && user < closing);
        assert!(prompt.starts_with("Edit the provided product image"));
    }

    #[test]
    fn price_clause_only_for_flyer_and_banner_with_price() {
        for asset_type in AssetType::ALL {
            for price in [None, Some(""), Some(" "), Some("€5")] {
                let c = config(asset_type, price, "x");
                let expected = asset_type != AssetType::Ads && matches!(price, Some(p) if !p.is_empty());
                assert_eq!(kinds(&c).contains(&ClauseKind::Price), expected, "{asset_type} {price:?}");
                if let (true, Some(p)) = (expected, price) {
                    assert!(build_prompt(&c).contains(&format!("Prominently display the price: \"{p}\".")));
                }
            }
        }
    }

    #[test]
    fn price_text_is_rendered_verbatim() {
        let c = config(AssetType::Banner, Some(" Only $9, today! "), "");
        assert!(build_prompt(&c).contains("Prominently display the price: \" Only $9, today! \"."));
    }

    #[test]
    fn banner_layout_clause_only_for_banners() {
        for asset_type in AssetType::ALL {
            let c = config(asset_type, None, "");
            assert_eq!(kinds(&c).contains(&ClauseKind::BannerLayout), asset_type == AssetType::Banner);
        }
        let c = config(AssetType::Banner, None, "");
        assert!(build_prompt(&c).contains("suits a Website Hero Banner placement"));
    }

    #[test]
    fn user_instructions_are_never_altered() {
        let long = "x".repeat(10_000);
        let samples = ["", "  leading and trailing  ", "quotes \" and\nnewlines", "emoji ✨🔥", long.as_str()];
        for text in samples {
            let c = config(AssetType::Ads, None, text);
            let expected = format!("Specific User Instructions: \"{text}\".");
            assert!(build_prompt(&c).contains(&expected));
        }
    }

    #[test]
    fn prompt_is_never_empty_and_deterministic() {
        let c = config(AssetType::Ads, None, "");
        let first = build_prompt(&c);
        assert!(!first.is_empty());
        assert_eq!(first, build_prompt(&c.clone()));
        assert_eq!(
            kinds(&c),
            vec![ClauseKind::Lead, ClauseKind::Style, ClauseKind::UserInstructions, ClauseKind::Closing]
        );
    }

    #[test]
    fn full_banner_clause_order() {
        let c = config(AssetType::Banner, Some("$1"), "go");
        assert_eq!(kinds(&c), vec![
            ClauseKind::Lead,
            ClauseKind::Price,
            ClauseKind::BannerLayout,
            ClauseKind::Style,
            ClauseKind::UserInstructions,
            ClauseKind::Closing,
        ]);
    }
}
