// ABOUTME: WGSL sources, composed at compile time.
// ABOUTME: Every fragment stage is appended to the shared full-screen vertex stage.

macro_rules! fullscreen {
    ($file:literal) => {
        concat!(
            include_str!("../../../shaders/fullscreen.wgsl"),
            "\n",
            include_str!(concat!("../../../shaders/", $file))
        )
    };
}

pub const HALFTONE: &str = fullscreen!("halftone.wgsl");
pub const DITHER: &str = fullscreen!("dither.wgsl");
pub const EDGES: &str = fullscreen!("edges.wgsl");
pub const PIXEL_SORT: &str = fullscreen!("pixel_sort.wgsl");
pub const NOISE: &str = fullscreen!("noise.wgsl");
pub const VHS: &str = fullscreen!("vhs.wgsl");

pub const ASCII_MATCH: &str = include_str!("../../../shaders/ascii_match.wgsl");
pub const ASCII_PAINT: &str = fullscreen!("ascii_paint.wgsl");

pub const BLOOM_THRESHOLD: &str = fullscreen!("bloom_threshold.wgsl");
pub const BLOOM_BLUR: &str = fullscreen!("bloom_blur.wgsl");
pub const COMPOSITE: &str = fullscreen!("composite.wgsl");

/// Every shader module the renderer builds, by label.
pub const ALL: &[(&str, &str)] = &[
    ("halftone", HALFTONE),
    ("dither", DITHER),
    ("edges", EDGES),
    ("pixel_sort", PIXEL_SORT),
    ("noise", NOISE),
    ("vhs", VHS),
    ("ascii_match", ASCII_MATCH),
    ("ascii_paint", ASCII_PAINT),
    ("bloom_threshold", BLOOM_THRESHOLD),
    ("bloom_blur", BLOOM_BLUR),
    ("composite", COMPOSITE),
];
