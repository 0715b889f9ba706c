use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColorId {
    Red,
    Orange,
    Yellow,
    Green,
    Mint,
    Teal,
    Cyan,
    Blue,
    Indigo,
    Purple,
    Pink,
    Brown,
    Gray,
}

/// Color used for blocks with no tasks, unassigned tasks only, or tasks from
/// several projects.
pub const DEFAULT_BLOCK_COLOR: ColorId = ColorId::Gray;

pub const ALL_COLORS: [ColorId; 13] = [
    ColorId::Red,
    ColorId::Orange,
    ColorId::Yellow,
    ColorId::Green,
    ColorId::Mint,
    ColorId::Teal,
    ColorId::Cyan,
    ColorId::Blue,
    ColorId::Indigo,
    ColorId::Purple,
    ColorId::Pink,
    ColorId::Brown,
    ColorId::Gray,
];

const MAIN_ALPHA: f32 = 1.0;
const MID_ALPHA: f32 = 0.6;
const DARK_ALPHA: f32 = 0.85;
const LIGHT_ALPHA: f32 = 0.2;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Palette {
    pub main: Rgba,
    pub mid: Rgba,
    pub dark: Rgba,
    pub light: Rgba,
}

impl ColorId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Mint => "mint",
            Self::Teal => "teal",
            Self::Cyan => "cyan",
            Self::Blue => "blue",
            Self::Indigo => "indigo",
            Self::Purple => "purple",
            Self::Pink => "pink",
            Self::Brown => "brown",
            Self::Gray => "gray",
        }
    }

    fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Red => (255, 59, 48),
            Self::Orange => (255, 149, 0),
            Self::Yellow => (255, 204, 0),
            Self::Green => (52, 199, 89),
            Self::Mint => (0, 199, 190),
            Self::Teal => (48, 176, 199),
            Self::Cyan => (50, 173, 230),
            Self::Blue => (0, 122, 255),
            Self::Indigo => (88, 86, 214),
            Self::Purple => (175, 82, 222),
            Self::Pink => (255, 45, 85),
            Self::Brown => (162, 132, 94),
            Self::Gray => (142, 142, 147),
        }
    }

    pub fn palette(self) -> Palette {
        let (r, g, b) = self.rgb();
        let variant = |a| Rgba { r, g, b, a };
        Palette {
            main: variant(MAIN_ALPHA),
            mid: variant(MID_ALPHA),
            dark: variant(DARK_ALPHA),
            light: variant(LIGHT_ALPHA),
        }
    }
}

impl fmt::Display for ColorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        ALL_COLORS
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| format!("unknown color identifier: {normalized}"))
    }
}

pub const DEFAULT_BLOCK_ICON: &str = "clock";
pub const DEFAULT_PROJECT_ICON: &str = "folder";

const ICON_CATALOG: &[&str] = &[
    "clock",
    "folder",
    "briefcase",
    "book",
    "brain",
    "cart",
    "dumbbell",
    "envelope",
    "figure.walk",
    "fork.knife",
    "graduationcap",
    "hammer",
    "heart",
    "house",
    "laptop",
    "leaf",
    "moon",
    "music.note",
    "paintbrush",
    "person.2",
    "phone",
    "star",
    "sun.max",
    "tray",
    "wrench",
];

pub fn icon_catalog() -> &'static [&'static str] {
    ICON_CATALOG
}

pub fn is_known_icon(icon: &str) -> bool {
    ICON_CATALOG.contains(&icon.trim())
}
