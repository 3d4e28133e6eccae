use serde::Serialize;

use crate::models::{AssetType, DesignConfig, DesignSize, Platform};

const AD_CATEGORIES: &[&str] = &["Discount Ads", "Product Launch Ads", "Seasonal Sale Ads", "Brand Awareness Ads"];
const FLYER_CATEGORIES: &[&str] = &["Product Flyer", "Promotional Flyer", "Event Flyer", "Menu Flyer"];
const BANNER_CATEGORIES: &[&str] = &["Website Hero Banner", "Social Media Cover", "Email Header", "Sale Banner"];

/// Categories offered for an asset type. The first entry is the default.
pub fn sub_types(asset_type: AssetType) -> &'static [&'static str] {
    match asset_type {
        AssetType::Ads => AD_CATEGORIES,
        AssetType::Flyer => FLYER_CATEGORIES,
        AssetType::Banner => BANNER_CATEGORIES,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetOption {
    pub id: AssetType,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub sub_types: &'static [&'static str],
    pub shows_price: bool,
}

pub fn asset_options() -> Vec<AssetOption> {
    AssetType::ALL.into_iter().map(|id| {
        let (title, description, icon) = match id {
            AssetType::Ads => ("Ad Creative", "High-conversion ads for social media.", "📢"),
            AssetType::Flyer => ("Product Flyer", "Promotional flyers with pricing details.", "📄"),
            AssetType::Banner => ("Web Banner", "Headers, covers, and website assets.", "🖼️"),
        };
        AssetOption { id, title, description, icon, sub_types: id.sub_types(), shows_price: id.shows_price() }
    }).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SizeOption {
    pub id: DesignSize,
    pub label: &'static str,
    pub dimensions: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub assets: Vec<AssetOption>,
    pub platforms: Vec<Platform>,
    pub sizes: Vec<SizeOption>,
    pub defaults: DesignConfig,
}

pub fn catalog() -> Catalog {
    Catalog {
        assets: asset_options(),
        platforms: Platform::ALL.to_vec(),
        sizes: DesignSize::ALL.into_iter()
            .map(|id| SizeOption { id, label: id.label(), dimensions: id.dimensions() })
            .collect(),
        defaults: DesignConfig::default(),
    }
}
