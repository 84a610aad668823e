// ABOUTME: Color representation shared by effect options and parameter blocks.
// ABOUTME: Colors are stored unpremultiplied in the 0-1 range, the way shaders read them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);

    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    /// Classic green phosphor (P1)
    pub const GREEN: Self = Self::rgb(0.2, 1.0, 0.2);

    /// Classic amber phosphor (P3)
    pub const AMBER: Self = Self::rgb(1.0, 0.7, 0.0);

    /// Layout used by `vec4<f32>` uniform fields.
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Rec. 601 luma of the RGB channels.
    pub fn luma(self) -> f32 {
        luma([self.r, self.g, self.b])
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Rec. 601 luma, identical to the `luma()` helper in the shaders.
pub fn luma(rgb: [f32; 3]) -> f32 {
    rgb[0] * 0.299 + rgb[1] * 0.587 + rgb[2] * 0.114
}
