use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

use super::plan::OptionCategory;

/// Longest prefix or suffix accepted for naming, in characters.
pub const MAX_AFFIX_CHARS: usize = 20;
pub const MIN_MAX_DIMENSION: u32 = 16;
pub const DEFAULT_MAX_DIMENSION: u32 = 8000;

/// Output encoding for every variant of a batch
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Webp,
    Png,
    Avif,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
            OutputFormat::Png => "png",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Png => "image/png",
            OutputFormat::Avif => "image/avif",
        }
    }

    pub fn supports_alpha(self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OutputFormat::Jpeg => write!(f, "jpeg"),
            OutputFormat::Webp => write!(f, "webp"),
            OutputFormat::Png => write!(f, "png"),
            OutputFormat::Avif => write!(f, "avif"),
        }
    }
}

/// Per-format encoder settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(default)]
pub struct QualitySettings {
    /// 1-100
    pub jpeg_quality: u32,
    /// 1-100
    pub webp_quality: u32,
    /// 1-100
    pub avif_quality: u32,
    /// 0-9
    pub png_compression: u32,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            webp_quality: 80,
            avif_quality: 60,
            png_compression: 6,
        }
    }
}

impl QualitySettings {
    fn clamped(self) -> Self {
        Self {
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
            webp_quality: self.webp_quality.clamp(1, 100),
            avif_quality: self.avif_quality.clamp(1, 100),
            png_compression: self.png_compression.min(9),
        }
    }
}

/// Named size bucket. Each label bounds the longest edge of a variant.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SizeLabel {
    Xs,
    S,
    M,
    L,
    Xl,
}

impl SizeLabel {
    pub const ALL: [SizeLabel; 5] = [
        SizeLabel::Xs,
        SizeLabel::S,
        SizeLabel::M,
        SizeLabel::L,
        SizeLabel::Xl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SizeLabel::Xs => "xs",
            SizeLabel::S => "s",
            SizeLabel::M => "m",
            SizeLabel::L => "l",
            SizeLabel::Xl => "xl",
        }
    }

    /// Longest-edge bound in pixels used unless configuration overrides it.
    pub fn default_bound(self) -> u32 {
        match self {
            SizeLabel::Xs => 320,
            SizeLabel::S => 640,
            SizeLabel::M => 1024,
            SizeLabel::L => 1600,
            SizeLabel::Xl => 2560,
        }
    }
}

impl Display for SizeLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Non-empty, duplicate-free set of size labels, kept in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "Vec<SizeLabel>", into = "Vec<SizeLabel>")]
pub struct SelectedVariants(Vec<SizeLabel>);

impl SelectedVariants {
    pub fn new(labels: impl IntoIterator<Item = SizeLabel>) -> Result<Self, String> {
        let mut labels: Vec<SizeLabel> = labels.into_iter().collect();
        labels.sort();
        labels.dedup();
        if labels.is_empty() {
            return Err("selected_variants must contain at least one size".to_string());
        }
        Ok(Self(labels))
    }

    pub fn labels(&self) -> &[SizeLabel] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, label: SizeLabel) -> bool {
        self.0.contains(&label)
    }

    /// Remove one label. Removing the last remaining label is refused.
    pub fn remove(&mut self, label: SizeLabel) -> Result<(), String> {
        if self.0.len() == 1 && self.0[0] == label {
            return Err("cannot remove the last selected size".to_string());
        }
        self.0.retain(|l| *l != label);
        Ok(())
    }
}

impl Default for SelectedVariants {
    fn default() -> Self {
        Self(vec![SizeLabel::S, SizeLabel::M, SizeLabel::L])
    }
}

impl TryFrom<Vec<SizeLabel>> for SelectedVariants {
    type Error = String;

    fn try_from(labels: Vec<SizeLabel>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<SelectedVariants> for Vec<SizeLabel> {
    fn from(value: SelectedVariants) -> Self {
        value.0
    }
}

/// Target aspect ratio. Anything other than `original` center-crops the source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    FourThree,
    #[serde(rename = "3:2")]
    ThreeTwo,
    #[serde(rename = "16:9")]
    SixteenNine,
}

impl AspectRatio {
    /// (width, height) ratio terms, `None` when the source ratio is kept.
    pub fn ratio(self) -> Option<(u32, u32)> {
        match self {
            AspectRatio::Original => None,
            AspectRatio::Square => Some((1, 1)),
            AspectRatio::FourThree => Some((4, 3)),
            AspectRatio::ThreeTwo => Some((3, 2)),
            AspectRatio::SixteenNine => Some((16, 9)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(default)]
pub struct NamingPolicy {
    pub omit_original_name: bool,
    pub prefix: String,
    pub suffix: String,
}

impl NamingPolicy {
    fn normalized(self) -> Self {
        Self {
            omit_original_name: self.omit_original_name,
            prefix: clamp_affix(&self.prefix),
            suffix: clamp_affix(&self.suffix),
        }
    }

    pub fn has_affix(&self) -> bool {
        !self.prefix.is_empty() || !self.suffix.is_empty()
    }
}

/// Strip path separators and control characters, then truncate on a char boundary.
fn clamp_affix(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && *c != '/' && *c != '\\')
        .take(MAX_AFFIX_CHARS)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FolderOrganization {
    #[default]
    ByOriginal,
    BySize,
    Flat,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Srgb,
    Grayscale,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResizeAlgorithm {
    #[default]
    Lanczos3,
    CatmullRom,
    Triangle,
    Nearest,
    /// Picked from the downscale ratio per variant
    Auto,
}

/// JPEG chroma subsampling
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum ChromaSubsampling {
    #[default]
    #[serde(rename = "4:2:0")]
    Yuv420,
    #[serde(rename = "4:2:2")]
    Yuv422,
    #[serde(rename = "4:4:4")]
    Yuv444,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sharpening {
    #[default]
    None,
    Light,
    Medium,
    Strong,
}

impl Sharpening {
    /// Unsharp mask (sigma, threshold)
    pub fn unsharpen_params(self) -> Option<(f32, i32)> {
        match self {
            Sharpening::None => None,
            Sharpening::Light => Some((0.5, 2)),
            Sharpening::Medium => Some((1.0, 2)),
            Sharpening::Strong => Some((1.5, 1)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Zip,
    Tar,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
            ArchiveFormat::Tar => "application/x-tar",
        }
    }
}

/// Options chosen by the client for one batch.
///
/// Every field is optional on the wire. Call [`ProcessingOptions::normalized`] before
/// gating or processing: it clamps numbers to their ranges and sanitizes strings, so
/// nothing downstream has to trust client input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(default)]
pub struct ProcessingOptions {
    pub format: OutputFormat,
    pub quality: QualitySettings,
    pub selected_variants: SelectedVariants,
    pub max_dimension: Option<u32>,
    pub aspect_ratio: AspectRatio,
    pub naming: NamingPolicy,
    pub folder_organization: FolderOrganization,
    pub color_space: ColorSpace,
    pub resize_algorithm: ResizeAlgorithm,
    pub chroma_subsampling: ChromaSubsampling,
    #[serde(default = "default_strip_metadata")]
    pub strip_metadata: bool,
    pub sharpening: Sharpening,
    pub archive_format: ArchiveFormat,
}

fn default_strip_metadata() -> bool {
    true
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            quality: QualitySettings::default(),
            selected_variants: SelectedVariants::default(),
            max_dimension: None,
            aspect_ratio: AspectRatio::default(),
            naming: NamingPolicy::default(),
            folder_organization: FolderOrganization::default(),
            color_space: ColorSpace::default(),
            resize_algorithm: ResizeAlgorithm::default(),
            chroma_subsampling: ChromaSubsampling::default(),
            strip_metadata: default_strip_metadata(),
            sharpening: Sharpening::default(),
            archive_format: ArchiveFormat::default(),
        }
    }
}

impl ProcessingOptions {
    pub fn normalized(self) -> Self {
        Self {
            quality: self.quality.clamped(),
            max_dimension: Some(
                self.max_dimension
                    .unwrap_or(DEFAULT_MAX_DIMENSION)
                    .clamp(MIN_MAX_DIMENSION, DEFAULT_MAX_DIMENSION),
            ),
            naming: self.naming.normalized(),
            ..self
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension.unwrap_or(DEFAULT_MAX_DIMENSION)
    }

    /// Categories whose fields differ from their defaults. Call on normalized options.
    pub fn non_default_categories(&self) -> Vec<OptionCategory> {
        let defaults = ProcessingOptions::default().normalized();
        let mut categories = Vec::new();

        if self.naming != defaults.naming || self.folder_organization != defaults.folder_organization
        {
            categories.push(OptionCategory::Naming);
        }
        if self.quality != defaults.quality {
            categories.push(OptionCategory::Quality);
        }
        if self.selected_variants != defaults.selected_variants
            || self.max_dimension() != defaults.max_dimension()
            || self.aspect_ratio != defaults.aspect_ratio
        {
            categories.push(OptionCategory::Size);
        }
        if self.color_space != defaults.color_space
            || self.resize_algorithm != defaults.resize_algorithm
            || self.chroma_subsampling != defaults.chroma_subsampling
            || self.strip_metadata != defaults.strip_metadata
            || self.sharpening != defaults.sharpening
        {
            categories.push(OptionCategory::Processing);
        }

        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let options: ProcessingOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.format, OutputFormat::Jpeg);
        assert!(options.strip_metadata);
        assert_eq!(
            options.selected_variants.labels(),
            &[SizeLabel::S, SizeLabel::M, SizeLabel::L]
        );
        assert!(options.normalized().non_default_categories().is_empty());
    }

    #[test]
    fn test_default_matches_empty_json() {
        let from_json: ProcessingOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(ProcessingOptions::default(), from_json);
        assert!(ProcessingOptions::default().strip_metadata);
    }

    #[test]
    fn test_explicit_defaults_are_not_locked_changes() {
        let options: ProcessingOptions =
            serde_json::from_str(r#"{"selected_variants":["s","m","l"],"strip_metadata":true}"#)
                .unwrap();
        assert!(options.normalized().non_default_categories().is_empty());

        let stripped_off: ProcessingOptions =
            serde_json::from_str(r#"{"strip_metadata":false}"#).unwrap();
        assert_eq!(
            stripped_off.normalized().non_default_categories(),
            vec![OptionCategory::Processing]
        );
    }

    #[test]
    fn test_empty_selected_variants_rejected() {
        let result: Result<ProcessingOptions, _> =
            serde_json::from_str(r#"{"selected_variants": []}"#);
        assert!(result.is_err());
        assert!(SelectedVariants::new([]).is_err());
    }

    #[test]
    fn test_selected_variants_cannot_lose_last_label() {
        let mut variants = SelectedVariants::new([SizeLabel::M, SizeLabel::Xs]).unwrap();
        variants.remove(SizeLabel::Xs).unwrap();
        assert_eq!(variants.labels(), &[SizeLabel::M]);
        assert!(variants.remove(SizeLabel::M).is_err());
        assert_eq!(variants.len(), 1);
    }

    #[test]
    fn test_selected_variants_sorted_and_deduplicated() {
        let variants: SelectedVariants = serde_json::from_str(r#"["xl","s","xl","m"]"#).unwrap();
        assert_eq!(
            variants.labels(),
            &[SizeLabel::S, SizeLabel::M, SizeLabel::Xl]
        );
    }

    #[test]
    fn test_numeric_fields_are_clamped() {
        let options: ProcessingOptions = serde_json::from_str(
            r#"{"quality": {"jpeg_quality": 0, "webp_quality": 400, "png_compression": 12},
                "max_dimension": 2}"#,
        )
        .unwrap();
        let options = options.normalized();
        assert_eq!(options.quality.jpeg_quality, 1);
        assert_eq!(options.quality.webp_quality, 100);
        assert_eq!(options.quality.avif_quality, 60);
        assert_eq!(options.quality.png_compression, 9);
        assert_eq!(options.max_dimension(), MIN_MAX_DIMENSION);
    }

    #[test]
    fn test_affixes_are_clamped_and_sanitized() {
        let options = ProcessingOptions {
            naming: NamingPolicy {
                omit_original_name: false,
                prefix: "a/b\\c\u{7}-0123456789abcdefghijkl".to_string(),
                suffix: "ééééééééééééééééééééééé".to_string(),
            },
            ..Default::default()
        }
        .normalized();
        assert_eq!(options.naming.prefix, "abc-0123456789abcdef");
        assert_eq!(options.naming.suffix.chars().count(), MAX_AFFIX_CHARS);
    }

    #[test]
    fn test_non_default_categories() {
        let options = ProcessingOptions {
            format: OutputFormat::Webp,
            sharpening: Sharpening::Light,
            aspect_ratio: AspectRatio::Square,
            ..Default::default()
        }
        .normalized();
        assert_eq!(
            options.non_default_categories(),
            vec![OptionCategory::Size, OptionCategory::Processing]
        );
    }

    #[test]
    fn test_wire_names() {
        let options: ProcessingOptions = serde_json::from_str(
            r#"{"aspect_ratio": "16:9", "chroma_subsampling": "4:4:4",
                "folder_organization": "by-size", "resize_algorithm": "catmull_rom"}"#,
        )
        .unwrap();
        assert_eq!(options.aspect_ratio, AspectRatio::SixteenNine);
        assert_eq!(options.chroma_subsampling, ChromaSubsampling::Yuv444);
        assert_eq!(options.folder_organization, FolderOrganization::BySize);
        assert_eq!(options.resize_algorithm, ResizeAlgorithm::CatmullRom);
    }
}
