// ABOUTME: Parameter block packing: options records to uniform-buffer bytes.
// ABOUTME: Each block is a Pod struct whose offset table is derived from the struct itself.

use bytemuck::Pod;

/// Uniform buffers are bound in 16-byte rows.
pub const UNIFORM_ALIGNMENT: usize = 16;

/// Per-frame values every parameter block may carry.
/// `time` is the only field allowed to change between two packs of the same options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub time: f32,
}

impl FrameInfo {
    pub fn new(width: u32, height: u32, time: f32) -> Self {
        Self {
            width,
            height,
            time,
        }
    }

    pub fn resolution(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

/// Shader-side type of a parameter block field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    F32,
    U32,
    Vec2F,
    Vec2U,
    Vec4F,
    /// `array<vec4<f32>, N>`
    Vec4FArray(usize),
}

impl FieldKind {
    pub const fn byte_len(self) -> usize {
        match self {
            FieldKind::F32 | FieldKind::U32 => 4,
            FieldKind::Vec2F | FieldKind::Vec2U => 8,
            FieldKind::Vec4F => 16,
            FieldKind::Vec4FArray(n) => 16 * n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamField {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

impl ParamField {
    pub const fn new(name: &'static str, offset: usize, kind: FieldKind) -> Self {
        Self { name, offset, kind }
    }
}

/// Offset table of one parameter block. The same names are used for the
/// members of the matching WGSL struct.
#[derive(Debug, Clone, Copy)]
pub struct ParamLayout {
    /// Name of the WGSL struct this table mirrors.
    pub struct_name: &'static str,
    pub size: usize,
    pub fields: &'static [ParamField],
}

impl ParamLayout {
    pub fn field(&self, name: &str) -> Option<&ParamField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_aligned(&self) -> bool {
        self.size % UNIFORM_ALIGNMENT == 0
    }

    /// Fields must be in declaration order and must not overlap or overrun the block.
    pub fn is_consistent(&self) -> bool {
        let mut end = 0;
        for field in self.fields {
            if field.offset < end {
                return false;
            }
            end = field.offset + field.kind.byte_len();
        }
        end <= self.size
    }
}

/// Converts an options record into its parameter block.
pub trait PackParams {
    type Uniforms: Pod;

    const LAYOUT: ParamLayout;

    fn pack(&self, frame: &FrameInfo) -> Self::Uniforms;
}

/// Read the raw bytes of a named field out of a packed block.
pub fn field_bytes<'a>(layout: &ParamLayout, bytes: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let field = layout.field(name)?;
    bytes.get(field.offset..field.offset + field.kind.byte_len())
}

pub fn read_f32(layout: &ParamLayout, bytes: &[u8], name: &str) -> Option<f32> {
    let raw = field_bytes(layout, bytes, name)?;
    Some(f32::from_ne_bytes(raw.get(..4)?.try_into().ok()?))
}

pub fn read_u32(layout: &ParamLayout, bytes: &[u8], name: &str) -> Option<u32> {
    let raw = field_bytes(layout, bytes, name)?;
    Some(u32::from_ne_bytes(raw.get(..4)?.try_into().ok()?))
}

pub fn read_vec4(layout: &ParamLayout, bytes: &[u8], name: &str) -> Option<[f32; 4]> {
    let raw = field_bytes(layout, bytes, name)?;
    let mut out = [0.0; 4];
    for (i, chunk) in raw.get(..16)?.chunks_exact(4).enumerate() {
        out[i] = f32::from_ne_bytes(chunk.try_into().ok()?);
    }
    Some(out)
}

pub(crate) fn flag(value: bool) -> u32 {
    if value {
        1
    } else {
        0
    }
}

/// Builds a `ParamField` from a struct member, keeping name and offset in one place.
#[macro_export]
macro_rules! param_field {
    ($ty:ty, $field:ident, $kind:ident) => {
        $crate::params::ParamField::new(
            stringify!($field),
            ::std::mem::offset_of!($ty, $field),
            $crate::params::FieldKind::$kind,
        )
    };
    ($ty:ty, $field:ident, $kind:ident($n:expr)) => {
        $crate::params::ParamField::new(
            stringify!($field),
            ::std::mem::offset_of!($ty, $field),
            $crate::params::FieldKind::$kind($n),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Sample {
        resolution: [f32; 2],
        time: f32,
        count: u32,
    }

    const SAMPLE_LAYOUT: ParamLayout = ParamLayout {
        struct_name: "Sample",
        size: std::mem::size_of::<Sample>(),
        fields: &[
            param_field!(Sample, resolution, Vec2F),
            param_field!(Sample, time, F32),
            param_field!(Sample, count, U32),
        ],
    };

    #[test]
    fn macro_derives_offsets_from_struct() {
        assert_eq!(SAMPLE_LAYOUT.field("resolution").unwrap().offset, 0);
        assert_eq!(SAMPLE_LAYOUT.field("time").unwrap().offset, 8);
        assert_eq!(SAMPLE_LAYOUT.field("count").unwrap().offset, 12);
        assert!(SAMPLE_LAYOUT.is_aligned());
        assert!(SAMPLE_LAYOUT.is_consistent());
    }

    #[test]
    fn reads_fields_back_out_of_bytes() {
        let sample = Sample {
            resolution: [640.0, 480.0],
            time: 1.5,
            count: 7,
        };
        let bytes = bytemuck::bytes_of(&sample);
        assert_eq!(read_f32(&SAMPLE_LAYOUT, bytes, "time"), Some(1.5));
        assert_eq!(read_u32(&SAMPLE_LAYOUT, bytes, "count"), Some(7));
        assert_eq!(read_f32(&SAMPLE_LAYOUT, bytes, "missing"), None);
    }

    #[test]
    fn overlapping_fields_are_inconsistent() {
        const BROKEN: ParamLayout = ParamLayout {
            struct_name: "Broken",
            size: 16,
            fields: &[
                ParamField::new("a", 0, FieldKind::Vec2F),
                ParamField::new("b", 4, FieldKind::F32),
            ],
        };
        assert!(!BROKEN.is_consistent());
    }
}
