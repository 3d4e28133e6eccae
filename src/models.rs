use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;
use std::fmt;

use crate::catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Ads,
    Flyer,
    Banner,
}

impl AssetType {
    pub const ALL: [AssetType; 3] = [AssetType::Ads, AssetType::Flyer, AssetType::Banner];

    pub fn sub_types(self) -> &'static [&'static str] {
        catalog::sub_types(self)
    }

    pub fn default_sub_type(self) -> &'static str {
        self.sub_types()[0]
    }

    pub fn allows_sub_type(self, sub_type: &str) -> bool {
        self.sub_types().contains(&sub_type)
    }

    /// Only flyers and banners carry a price callout.
    pub fn shows_price(self) -> bool {
        matches!(self, AssetType::Flyer | AssetType::Banner)
    }

    pub fn label(self) -> &'static str {
        match self {
            AssetType::Ads => "Ads",
            AssetType::Flyer => "Flyer",
            AssetType::Banner => "Banner",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Facebook,
    Instagram,
    LinkedIn,
    Website,
    #[serde(rename = "Facebook & Instagram")]
    FacebookAndInstagram,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::LinkedIn,
        Platform::Website,
        Platform::FacebookAndInstagram,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::LinkedIn => "LinkedIn",
            Platform::Website => "Website",
            Platform::FacebookAndInstagram => "Facebook & Instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignSize {
    Square,
    Portrait,
    Landscape,
    Story,
    WideBanner,
}

impl DesignSize {
    pub const ALL: [DesignSize; 5] = [
        DesignSize::Square,
        DesignSize::Portrait,
        DesignSize::Landscape,
        DesignSize::Story,
        DesignSize::WideBanner,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DesignSize::Square => "Square",
            DesignSize::Portrait => "Portrait",
            DesignSize::Landscape => "Landscape",
            DesignSize::Story => "Story",
            DesignSize::WideBanner => "Wide Banner",
        }
    }

    pub fn dimensions(self) -> &'static str {
        match self {
            DesignSize::Square => "1080x1080",
            DesignSize::Portrait => "1080x1350",
            DesignSize::Landscape => "1200x630",
            DesignSize::Story => "1080x1920",
            DesignSize::WideBanner => "1920x600",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{sub_type}' is not a {asset_type} category")]
pub struct InvalidSubType {
    pub asset_type: AssetType,
    pub sub_type: String,
}

/// Current wizard selections.
///
/// `asset_type` and `sub_type` are only reachable through methods so the
/// sub type is always one of the asset type's categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesignConfig {
    asset_type: AssetType,
    sub_type: String,
    pub platform: Platform,
    pub size: DesignSize,
    pub price_text: Option<String>,
    pub custom_instructions: String,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self::new(AssetType::Ads)
    }
}

impl DesignConfig {
    pub fn new(asset_type: AssetType) -> Self {
        Self {
            asset_type,
            sub_type: asset_type.default_sub_type().to_string(),
            platform: Platform::Instagram,
            size: DesignSize::Square,
            price_text: None,
            custom_instructions: String::new(),
        }
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// Switching the asset type always resets the sub type to that type's first category.
    pub fn set_asset_type(&mut self, asset_type: AssetType) {
        self.asset_type = asset_type;
        self.sub_type = asset_type.default_sub_type().to_string();
    }

    pub fn set_sub_type(&mut self, sub_type: &str) -> Result<(), InvalidSubType> {
        if !self.asset_type.allows_sub_type(sub_type) {
            return Err(InvalidSubType { asset_type: self.asset_type, sub_type: sub_type.to_string() });
        }
        self.sub_type = sub_type.to_string();
        Ok(())
    }

    /// Price text worth rendering: set and non-empty. Whitespace counts.
    pub fn price(&self) -> Option<&str> {
        self.price_text.as_deref().filter(|p| !p.is_empty())
    }

    /// Applies a batch of field edits. The asset type goes first so a sub type in
    /// the same batch is checked against the new type; nothing changes on error.
    pub fn apply(&mut self, update: ConfigUpdate) -> Result<(), InvalidSubType> {
        let mut next = self.clone();
        if let Some(asset_type) = update.asset_type {
            if asset_type != next.asset_type {
                next.set_asset_type(asset_type);
            }
        }
        if let Some(sub_type) = update.sub_type.as_deref() {
            next.set_sub_type(sub_type)?;
        }
        if let Some(platform) = update.platform {
            next.platform = platform;
        }
        if let Some(size) = update.size {
            next.size = size;
        }
        if let Some(price) = update.price_text {
            next.price_text = if price.is_empty() { None } else { Some(price) };
        }
        if let Some(instructions) = update.custom_instructions {
            next.custom_instructions = instructions;
        }
        *self = next;
        Ok(())
    }

    /// Label/value pairs for the final-touches summary.
    pub fn summary(&self) -> Vec<SummaryLine> {
        let mut lines = vec![
            SummaryLine::new("Type", self.asset_type.label()),
            SummaryLine::new("Category", &self.sub_type),
            SummaryLine::new("Platform", self.platform.label()),
            SummaryLine::new("Size", &format!("{} ({})", self.size.label(), self.size.dimensions())),
        ];
        if let Some(price) = self.price() {
            lines.push(SummaryLine::new("Price", price));
        }
        lines
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub asset_type: Option<AssetType>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub size: Option<DesignSize>,
    #[serde(default)]
    pub price_text: Option<String>, // empty string clears it
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub label: &'static str,
    pub value: String,
}

impl SummaryLine {
    fn new(label: &'static str, value: &str) -> Self {
        Self { label, value: value.to_string() }
    }
}

/// An image accepted by intake: base64 payload without the data-URI header,
/// the full data URI for previews, and the declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub base64: String,
    pub preview_url: String,
    pub mime_type: String,
    pub file_name: Option<String>,
    pub byte_len: usize,
}

impl UploadedFile {
    pub fn summary(&self) -> UploadSummary {
        UploadSummary {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            byte_len: self.byte_len,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub file_name: Option<String>,
    pub mime_type: String,
    pub byte_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub image_url: String,
    pub prompt_used: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl GenerationResult {
    pub fn download_file_name(&self) -> String {
        format!("design-{}.png", self.created_at.timestamp_millis())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSlot {
    Main,
    Logo,
}

impl fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssetSlot::Main => "main",
            AssetSlot::Logo => "logo",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Dashboard,
    Wizard,
    ShowingResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub step: u8,
    pub config: DesignConfig,
    pub summary: Vec<SummaryLine>,
    pub main_image: Option<UploadSummary>,
    pub logo_image: Option<UploadSummary>,
    pub main_image_error: Option<String>,
    pub logo_image_error: Option<String>,
    pub can_advance: bool,
    pub can_go_back: bool,
    pub can_generate: bool,
    pub is_generating: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub view: ViewKind,
    pub wizard: Option<WizardView>,
    pub result: Option<GenerationResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataUrlUpload {
    pub data_url: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn changing_asset_type_resets_sub_type_into_allowed_set() {
        for from in AssetType::ALL {
            for to in AssetType::ALL {
                for sub in from.sub_types() {
                    let mut config = DesignConfig::new(from);
                    config.set_sub_type(sub).unwrap();
                    config.set_asset_type(to);
                    assert!(to.allows_sub_type(config.sub_type()), "{from} -> {to} left {}", config.sub_type());
                    assert_eq!(config.sub_type(), to.default_sub_type());
                }
            }
        }
    }

    #[test]
    fn foreign_sub_type_is_rejected() {
        let mut config = DesignConfig::new(AssetType::Ads);
        let err = config.set_sub_type("Product Flyer").unwrap_err();
        assert_eq!(err.asset_type, AssetType::Ads);
        assert_eq!(config.sub_type(), AssetType::Ads.default_sub_type());
    }

    #[test]
    fn apply_checks_sub_type_against_new_asset_type() {
        let mut config = DesignConfig::default();
        config.apply(ConfigUpdate {
            asset_type: Some(AssetType::Flyer),
            sub_type: Some("Event Flyer".into()),
            price_text: Some("$5".into()),
            ..Default::default()
        }).unwrap();
        assert_eq!(config.asset_type(), AssetType::Flyer);
        assert_eq!(config.sub_type(), "Event Flyer");
        assert_eq!(config.price(), Some("$5"));
    }

    #[test]
    fn failed_apply_leaves_config_untouched() {
        let mut config = DesignConfig::default();
        let before = config.clone();
        let res = config.apply(ConfigUpdate {
            asset_type: Some(AssetType::Banner),
            sub_type: Some("Discount Ads".into()),
            custom_instructions: Some("ignored".into()),
            ..Default::default()
        });
        assert!(res.is_err());
        assert_eq!(config, before);
    }

    #[test]
    fn same_asset_type_keeps_chosen_sub_type() {
        let mut config = DesignConfig::new(AssetType::Banner);
        config.set_sub_type("Email Header").unwrap();
        config.apply(ConfigUpdate { asset_type: Some(AssetType::Banner), ..Default::default() }).unwrap();
        assert_eq!(config.sub_type(), "Email Header");
    }

    #[test]
    fn only_an_empty_price_is_absent() {
        let mut config = DesignConfig::new(AssetType::Flyer);
        config.price_text = Some(String::new());
        assert_eq!(config.price(), None);
        config.price_text = Some("   ".into());
        assert_eq!(config.price(), Some("   "));
        config.apply(ConfigUpdate { price_text: Some(String::new()), ..Default::default() }).unwrap();
        assert_eq!(config.price_text, None);
    }

    #[test]
    fn summary_lists_price_only_when_set() {
        let mut config = DesignConfig::new(AssetType::Flyer);
        assert!(config.summary().iter().all(|l| l.label != "Price"));
        config.price_text = Some("$19.99".into());
        let summary = config.summary();
        assert_eq!(summary.last().map(|l| l.value.as_str()), Some("$19.99"));
        assert_eq!(summary[3].value, "Square (1080x1080)");
    }

    #[test]
    fn download_name_uses_creation_millis() {
        let created_at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let result = GenerationResult {
            image_url: "data:image/png;base64,AAAA".into(),
            prompt_used: "p".into(),
            model: "m".into(),
            created_at,
        };
        assert_eq!(result.download_file_name(), "design-1700000000123.png");
    }

    #[test]
    fn platform_serializes_with_display_label() {
        let json = serde_json::to_string(&Platform::FacebookAndInstagram).unwrap();
        assert_eq!(json, "\"Facebook & Instagram\"");
        let parsed: Platform = serde_json::from_str("\"LinkedIn\"").unwrap();
        assert_eq!(parsed, Platform::LinkedIn);
    }
}
