//! Playback options: how the input video is laid out and projected, and how
//! the output is rendered.
//!
//! The integer codes match the ordinals used by the Java side of the bridge
//! (`0` is reserved for "none" there and is rejected here).

use crate::error::Error;

/// Is the input video monoscopic or stereoscopic, and if stereoscopic, how are the views stored?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputVideoLayout {
    Mono = 1,
    StereoHoriz = 2,
    StereoVert = 3,
    AnaglyphRedCyan = 4,
}

/// What is the geometry of the input video?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputVideoMode {
    PlainFov = 1,
    Equirect180 = 2,
    Equirect360 = 3,
    CubeMap = 4,
    EquiangularCubeMap = 5,
    Pyramid = 6,
    Panorama180 = 7,
    Panorama360 = 8,
}

/// How should the output be rendered?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    MonoLeft = 1,
    MonoRight = 2,
    CardboardStereo = 3,
}

/// Eye index for per-eye state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left = 0,
    Right = 1,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl OutputMode {
    /// Eyes rendered in this mode, in viewport order
    pub fn eyes(self) -> &'static [Eye] {
        match self {
            OutputMode::MonoLeft => &[Eye::Left],
            OutputMode::MonoRight => &[Eye::Right],
            OutputMode::CardboardStereo => &Eye::BOTH,
        }
    }

    pub fn is_stereo(self) -> bool {
        matches!(self, OutputMode::CardboardStereo)
    }
}

impl TryFrom<i32> for InputVideoLayout {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Mono),
            2 => Ok(Self::StereoHoriz),
            3 => Ok(Self::StereoVert),
            4 => Ok(Self::AnaglyphRedCyan),
            _ => Err(Error::InvalidOption { kind: "input layout", value }),
        }
    }
}

impl TryFrom<i32> for InputVideoMode {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::PlainFov),
            2 => Ok(Self::Equirect180),
            3 => Ok(Self::Equirect360),
            4 => Ok(Self::CubeMap),
            5 => Ok(Self::EquiangularCubeMap),
            6 => Ok(Self::Pyramid),
            7 => Ok(Self::Panorama180),
            8 => Ok(Self::Panorama360),
            _ => Err(Error::InvalidOption { kind: "input mode", value }),
        }
    }
}

impl TryFrom<i32> for OutputMode {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::MonoLeft),
            2 => Ok(Self::MonoRight),
            3 => Ok(Self::CardboardStereo),
            _ => Err(Error::InvalidOption { kind: "output mode", value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_bridge_ordinals() {
        assert_eq!(InputVideoLayout::try_from(4).unwrap(), InputVideoLayout::AnaglyphRedCyan);
        assert_eq!(InputVideoMode::try_from(8).unwrap(), InputVideoMode::Panorama360);
        assert_eq!(OutputMode::try_from(3).unwrap(), OutputMode::CardboardStereo);
    }

    #[test]
    fn none_ordinal_is_rejected() {
        assert!(matches!(
            InputVideoLayout::try_from(0),
            Err(Error::InvalidOption { kind: "input layout", value: 0 })
        ));
        assert!(InputVideoMode::try_from(9).is_err());
        assert!(OutputMode::try_from(-1).is_err());
    }

    #[test]
    fn stereo_renders_both_eyes() {
        assert_eq!(OutputMode::CardboardStereo.eyes(), &[Eye::Left, Eye::Right]);
        assert_eq!(OutputMode::MonoRight.eyes(), &[Eye::Right]);
        assert!(!OutputMode::MonoLeft.is_stereo());
    }
}
