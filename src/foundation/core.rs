use serde::{Deserialize, Serialize};

pub use kurbo::{Size, Vec2};

/// Identity of a [`crate::LiveNode`] inside one engine's scene graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque handle to an object living in the host scene (a spawned template, an empty
/// group, a canvas). The host mints these; the engine only passes them back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostObject(pub u64);

/// Opaque handle to an off-screen render surface created by a [`crate::VideoBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

/// Euler rotation in degrees, applied as local rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Euler {
    /// Rotation about x, in degrees.
    #[serde(default)]
    pub x: f64,
    /// Rotation about y, in degrees.
    #[serde(default)]
    pub y: f64,
    /// Rotation about z, in degrees.
    #[serde(default)]
    pub z: f64,
}

impl Euler {
    /// No rotation.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Whether every angle is finite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Straight (non-premultiplied) RGBA color with channels in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rgba {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Rgba {
    /// Opaque white.
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    /// Color from straight channels.
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Whether every channel is finite.
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            Obj {
                r: f32,
                g: f32,
                b: f32,
                #[serde(default = "one")]
                a: f32,
            },
            Arr(Vec<f32>),
        }

        fn one() -> f32 {
            1.0
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => parse_hex(&s).map_err(serde::de::Error::custom),
            Repr::Obj { r, g, b, a } => Ok(Self::new(r, g, b, a)),
            Repr::Arr(v) => match v.as_slice() {
                [r, g, b] => Ok(Self::new(*r, *g, *b, 1.0)),
                [r, g, b, a] => Ok(Self::new(*r, *g, *b, *a)),
                _ => Err(serde::de::Error::custom(
                    "rgba array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                )),
            },
        }
    }
}

fn parse_hex(s: &str) -> Result<Rgba, String> {
    let s = s.trim();
    let s = s.strip_prefix('#').unwrap_or(s);

    fn channel(pair: &str) -> Result<f32, String> {
        u8::from_str_radix(pair, 16)
            .map(|v| f32::from(v) / 255.0)
            .map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    match s.len() {
        6 => Ok(Rgba::new(
            channel(&s[0..2])?,
            channel(&s[2..4])?,
            channel(&s[4..6])?,
            1.0,
        )),
        8 => Ok(Rgba::new(
            channel(&s[0..2])?,
            channel(&s[2..4])?,
            channel(&s[4..6])?,
            channel(&s[6..8])?,
        )),
        _ => Err("hex color must be #RRGGBB or #RRGGBBAA (case-insensitive)".to_owned()),
    }
}

/// Resolved placement pushed to the host. Layout is never computed here: specs carry
/// top-left based positions and the host receives them with the y axis flipped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Anchored position relative to the parent's top-left corner (y grows upward).
    pub anchored: Vec2,
    /// Explicit size, or `None` to keep the template's own size.
    pub size: Option<Size>,
    /// Local rotation.
    pub rotation: Euler,
}

impl Placement {
    /// Placement for a spec position measured downward from the parent's top-left corner.
    pub fn from_top_left(position: Vec2, size: Option<Vec2>, rotation: Euler) -> Self {
        Self {
            anchored: Vec2::new(position.x, -position.y),
            size: size.map(|s| Size::new(s.x, s.y)),
            rotation,
        }
    }

    /// Placement taken verbatim, used for content positioned inside its owner's frame.
    pub fn local(position: Vec2, rotation: Euler) -> Self {
        Self {
            anchored: position,
            size: None,
            rotation,
        }
    }
}

pub(crate) fn vec2_is_finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
