use std::fmt;

use winnow::binary::{le_u8, le_u16, le_u32};
use winnow::prelude::*;
use winnow::token::take;

/// Orientation qualifier values shared by table configs and device configs
pub mod orientation {
    pub const ANY: u8 = 0;
    pub const PORTRAIT: u8 = 1;
    pub const LANDSCAPE: u8 = 2;
}

/// Night-mode qualifier values (ui-mode bits 4..6)
pub mod night_mode {
    pub const ANY: u8 = 0;
    pub const NO: u8 = 1;
    pub const YES: u8 = 2;
}

/// Screen-layout size classes (screen-layout low nibble)
pub mod screen_size {
    pub const ANY: u8 = 0;
    pub const SMALL: u8 = 1;
    pub const NORMAL: u8 = 2;
    pub const LARGE: u8 = 3;
    pub const XLARGE: u8 = 4;
}

/// Describes the qualifier tuple one resource variant was compiled for
///
/// The on-disk structure is size-prefixed and has grown over platform
/// releases; fields past the declared size keep their zero default.
///
/// See: https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=967
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResTableConfig {
    /// Number of bytes in the on-disk structure, including this field
    pub size: u32,

    /// Mobile country code (from SIM). 0 means "any"
    pub mcc: u16,

    /// Mobile network code (from SIM). 0 means "any"
    pub mnc: u16,

    /// ISO-639-1 language code, empty means "any"
    pub language: String,

    /// ISO-3166-1 country code, empty means "any"
    pub country: String,

    pub orientation: u8,
    pub touchscreen: u8,

    /// Screen density in dpi, 0 means "any"
    pub density: u16,

    pub keyboard: u8,
    pub navigation: u8,
    pub input_flags: u8,

    /// Screen dimensions in pixels
    pub screen_width: u16,
    pub screen_height: u16,

    /// Platform version the variant requires, 0 means "any"
    pub sdk_version: u16,
    pub minor_version: u16,

    /// Low nibble is the size class, other bits are reserved
    pub screen_layout: u8,

    /// Bits 4..6 carry the night-mode qualifier
    pub ui_mode: u8,

    pub smallest_screen_width_dp: u16,
    pub screen_width_dp: u16,
    pub screen_height_dp: u16,
}

impl ResTableConfig {
    /// Parse a size-prefixed config, consuming exactly `size` bytes.
    ///
    /// A declared size below 28 yields the default (zero-filled) config; the
    /// declared region is still skipped so the surrounding chunk stays
    /// aligned.
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableConfig> {
        let size = le_u32.parse_next(input)?;

        let mut config = ResTableConfig {
            size,
            ..ResTableConfig::default()
        };

        // bytes consumed past the size field
        let mut consumed = 0u32;

        if size >= 28 {
            let (mcc, mnc, language, country) =
                (le_u16, le_u16, take(2usize), take(2usize)).parse_next(input)?;
            let (orientation, touchscreen, density) = (le_u8, le_u8, le_u16).parse_next(input)?;
            let (keyboard, navigation, input_flags, _input_pad) =
                (le_u8, le_u8, le_u8, le_u8).parse_next(input)?;
            let (screen_width, screen_height) = (le_u16, le_u16).parse_next(input)?;

            config.mcc = mcc;
            config.mnc = mnc;
            config.language = Self::unpack_ascii(language);
            config.country = Self::unpack_ascii(country);
            config.orientation = orientation;
            config.touchscreen = touchscreen;
            config.density = density;
            config.keyboard = keyboard;
            config.navigation = navigation;
            config.input_flags = input_flags;
            config.screen_width = screen_width;
            config.screen_height = screen_height;
            consumed += 20;
        }
        if size >= 32 {
            let (sdk_version, minor_version) = (le_u16, le_u16).parse_next(input)?;
            config.sdk_version = sdk_version;
            config.minor_version = minor_version;
            consumed += 4;
        }
        if size >= 36 {
            let (screen_layout, ui_mode, smallest) = (le_u8, le_u8, le_u16).parse_next(input)?;
            config.screen_layout = screen_layout;
            config.ui_mode = ui_mode;
            config.smallest_screen_width_dp = smallest;
            consumed += 4;
        }
        if size >= 40 {
            let (width_dp, height_dp) = (le_u16, le_u16).parse_next(input)?;
            config.screen_width_dp = width_dp;
            config.screen_height_dp = height_dp;
            consumed += 4;
        }

        // skip fields newer than this decoder up to the declared size
        let remaining = size.saturating_sub(4).saturating_sub(consumed);
        if remaining > 0 {
            let _ = take(remaining).parse_next(input)?;
        }

        Ok(config)
    }

    /// Two ASCII bytes; a leading zero byte means "any"
    fn unpack_ascii(bytes: &[u8]) -> String {
        if bytes.first().copied().unwrap_or(0) == 0 {
            return String::new();
        }

        bytes
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect()
    }

    /// Night-mode qualifier (ui-mode bits 4..6)
    #[inline(always)]
    pub fn night_mode(&self) -> u8 {
        (self.ui_mode >> 4) & 0x3
    }

    /// Screen-layout size class (low nibble)
    #[inline(always)]
    pub fn screen_size_class(&self) -> u8 {
        self.screen_layout & 0x0f
    }

    /// True when every qualifier is unset
    pub fn is_default(&self) -> bool {
        self.language.is_empty()
            && self.country.is_empty()
            && self.orientation == 0
            && self.density == 0
            && self.sdk_version == 0
            && self.night_mode() == 0
            && self.screen_size_class() == 0
    }
}

impl fmt::Display for ResTableConfig {
    /// Qualifier string in the resource-directory convention, `default` when
    /// nothing is set
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();

        if !self.language.is_empty() {
            parts.push(self.language.clone());
        }
        if !self.country.is_empty() {
            parts.push(format!("r{}", self.country));
        }
        match self.screen_size_class() {
            screen_size::SMALL => parts.push("small".to_owned()),
            screen_size::NORMAL => parts.push("normal".to_owned()),
            screen_size::LARGE => parts.push("large".to_owned()),
            screen_size::XLARGE => parts.push("xlarge".to_owned()),
            _ => {}
        }
        match self.orientation {
            orientation::PORTRAIT => parts.push("port".to_owned()),
            orientation::LANDSCAPE => parts.push("land".to_owned()),
            _ => {}
        }
        match self.night_mode() {
            night_mode::NO => parts.push("notnight".to_owned()),
            night_mode::YES => parts.push("night".to_owned()),
            _ => {}
        }
        if self.density != 0 {
            parts.push(format!("{}dpi", self.density));
        }
        if self.sdk_version != 0 {
            parts.push(format!("v{}", self.sdk_version));
        }

        if parts.is_empty() {
            f.write_str("default")
        } else {
            f.write_str(&parts.join("-"))
        }
    }
}

/// Device-side mirror of [`ResTableConfig`], supplied by the caller when
/// resolving resources. The zero-filled value matches only default variants'
/// unset qualifiers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub language: String,
    pub country: String,

    /// 1 = portrait, 2 = landscape
    pub orientation: u8,

    /// Screen density in dpi
    pub density: u16,

    /// 1 = no, 2 = yes
    pub night_mode: u8,

    /// 1 = small .. 4 = xlarge
    pub screen_size: u8,

    pub sdk_version: u16,
}
