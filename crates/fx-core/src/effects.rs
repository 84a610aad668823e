// ABOUTME: Effect keys and the tagged union of per-effect options.
// ABOUTME: Every effect the renderer can run is listed here exactly once.

use serde::{Deserialize, Serialize};

use crate::ascii::AsciiOptions;
use crate::options::{merge_options, OptionError};
use crate::single_pass::{
    DitherOptions, EdgeOptions, HalftoneOptions, NoiseOptions, PixelSortOptions, VhsOptions,
};

/// Discriminated key of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    #[default]
    Ascii,
    Halftone,
    Dither,
    Edges,
    PixelSort,
    Noise,
    Vhs,
}

impl EffectKind {
    pub fn all() -> &'static [EffectKind] {
        &[
            EffectKind::Ascii,
            EffectKind::Halftone,
            EffectKind::Dither,
            EffectKind::Edges,
            EffectKind::PixelSort,
            EffectKind::Noise,
            EffectKind::Vhs,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            EffectKind::Ascii => "ASCII",
            EffectKind::Halftone => "Halftone",
            EffectKind::Dither => "Dither",
            EffectKind::Edges => "Edge Detection",
            EffectKind::PixelSort => "Pixel Sort",
            EffectKind::Noise => "Noise Field",
            EffectKind::Vhs => "VHS",
        }
    }

    pub fn next(&self) -> EffectKind {
        let all = EffectKind::all();
        let idx = all.iter().position(|k| k == self).unwrap_or(0);
        all[(idx + 1) % all.len()]
    }
}

/// Options of exactly one effect. Only the fields of the selected effect exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum EffectOptions {
    Ascii(AsciiOptions),
    Halftone(HalftoneOptions),
    Dither(DitherOptions),
    Edges(EdgeOptions),
    PixelSort(PixelSortOptions),
    Noise(NoiseOptions),
    Vhs(VhsOptions),
}

impl EffectOptions {
    pub fn defaults(kind: EffectKind) -> Self {
        match kind {
            EffectKind::Ascii => Self::Ascii(AsciiOptions::default()),
            EffectKind::Halftone => Self::Halftone(HalftoneOptions::default()),
            EffectKind::Dither => Self::Dither(DitherOptions::default()),
            EffectKind::Edges => Self::Edges(EdgeOptions::default()),
            EffectKind::PixelSort => Self::PixelSort(PixelSortOptions::default()),
            EffectKind::Noise => Self::Noise(NoiseOptions::default()),
            EffectKind::Vhs => Self::Vhs(VhsOptions::default()),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Ascii(_) => EffectKind::Ascii,
            Self::Halftone(_) => EffectKind::Halftone,
            Self::Dither(_) => EffectKind::Dither,
            Self::Edges(_) => EffectKind::Edges,
            Self::PixelSort(_) => EffectKind::PixelSort,
            Self::Noise(_) => EffectKind::Noise,
            Self::Vhs(_) => EffectKind::Vhs,
        }
    }
}

/// Starting options for every effect, as read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub ascii: AsciiOptions,
    pub halftone: HalftoneOptions,
    pub dither: DitherOptions,
    pub edges: EdgeOptions,
    pub pixel_sort: PixelSortOptions,
    pub noise: NoiseOptions,
    pub vhs: VhsOptions,
}

impl EffectSettings {
    pub fn options_for(&self, kind: EffectKind) -> EffectOptions {
        match kind {
            EffectKind::Ascii => EffectOptions::Ascii(self.ascii.clone()),
            EffectKind::Halftone => EffectOptions::Halftone(self.halftone.clone()),
            EffectKind::Dither => EffectOptions::Dither(self.dither.clone()),
            EffectKind::Edges => EffectOptions::Edges(self.edges.clone()),
            EffectKind::PixelSort => EffectOptions::PixelSort(self.pixel_sort.clone()),
            EffectKind::Noise => EffectOptions::Noise(self.noise.clone()),
            EffectKind::Vhs => EffectOptions::Vhs(self.vhs.clone()),
        }
    }

    /// Starting options for `kind` with caller overrides merged over the configured values.
    pub fn options_with(
        &self,
        kind: EffectKind,
        overrides: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<EffectOptions, OptionError> {
        Ok(match self.options_for(kind) {
            EffectOptions::Ascii(o) => EffectOptions::Ascii(merge_options(&o, overrides)?),
            EffectOptions::Halftone(o) => EffectOptions::Halftone(merge_options(&o, overrides)?),
            EffectOptions::Dither(o) => EffectOptions::Dither(merge_options(&o, overrides)?),
            EffectOptions::Edges(o) => EffectOptions::Edges(merge_options(&o, overrides)?),
            EffectOptions::PixelSort(o) => EffectOptions::PixelSort(merge_options(&o, overrides)?),
            EffectOptions::Noise(o) => EffectOptions::Noise(merge_options(&o, overrides)?),
            EffectOptions::Vhs(o) => EffectOptions::Vhs(merge_options(&o, overrides)?),
        })
    }
}
