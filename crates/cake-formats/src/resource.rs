//! Resource type signatures
//!
//! Every file entry carries a four-character tag naming what kind of game
//! resource it holds. The builder assigns it from the file extension and falls
//! back to the first four content bytes when those match a known tag.

use std::fmt;

/// Known tags and the extensions that map to them
const KNOWN: &[(&str, [u8; 4], &str)] = &[
    (".jsfb", *b"JSFB", "JS flat buffer"),
    (".clips", *b"CLIP", "animation clips"),
    (".mtls", *b"MTLs", "material set"),
    (".tex", *b"TEX!", "texture"),
    (".mcd", *b"MCD!", "MCD"),
    (".inst", *b"INST", "instance"),
    (".ycl", *b"YCL!", "YCL"),
    (".mskinfo", *b"MSKI", "mask info"),
    (".cacd", *b"CACD", "CACD"),
    (".hair_corr_ywa", *b"HCYW", "hair correction"),
    (".hair_ywa", *b"HYWA", "hair"),
    (".hpl", *b"HPL!", "HPL"),
    (".other_corr_ywa", *b"OCYW", "other correction"),
    (".other_ywa", *b"OYWA", "other"),
    (".ctg", *b"CTG!", "CTG"),
    (".wdf", *b"WDF!", "WDF"),
    (".mfc", *b"MKRS", "markers"),
    (".txt", *b"TEXT", "text"),
    (".pkma", *b"PKFX", "particle effect"),
    (".pkmn", *b"PKMN", "PKMN"),
    (".tbl", *b"DTAB", "database table"),
    (".alembic", *b"ABC!", "alembic"),
    (".mtl", *b"MTL!", "material"),
    (".fntpck", *b"FTPK", "font pack"),
    (".sdb", *b"XLOC", "string database"),
    (".slug", *b"SLUG", "slug"),
    (".ysh", *b"YSH!", "shader"),
];

/// Generic resource tag without a specific extension
const RESOURCE_TAG: [u8; 4] = *b"RES!";

/// Four-character resource tag, stored as a little-endian u32
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceType(u32);

impl ResourceType {
    /// No tag
    pub const NONE: Self = Self(0);

    /// Wrap a raw tag value
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Build from the four tag characters
    pub const fn from_tag(tag: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(tag))
    }

    /// Raw tag value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The four tag characters
    pub fn tag(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Tag for an archive path, by extension (case-insensitive)
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let dot = name.rfind('.')?;
        let ext = name[dot..].to_ascii_lowercase();
        KNOWN
            .iter()
            .find(|(known, _, _)| *known == ext)
            .map(|(_, tag, _)| Self::from_tag(*tag))
    }

    /// Tag sniffed from the first four content bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        let head: [u8; 4] = data.get(..4)?.try_into().ok()?;
        let known = head == RESOURCE_TAG || KNOWN.iter().any(|(_, tag, _)| *tag == head);
        known.then(|| Self::from_tag(head))
    }

    /// Extension first, content second
    pub fn detect(path: &str, data: &[u8]) -> Self {
        Self::from_path(path)
            .or_else(|| Self::sniff(data))
            .unwrap_or(Self::NONE)
    }

    /// Human-readable description
    pub fn describe(self) -> &'static str {
        if self == Self::NONE {
            return "untyped";
        }
        let tag = self.tag();
        if tag == RESOURCE_TAG {
            return "resource";
        }
        KNOWN
            .iter()
            .find(|(_, known, _)| *known == tag)
            .map_or("unknown", |(_, _, description)| *description)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NONE {
            return f.write_str("----");
        }
        for b in self.tag() {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lookup() {
        assert_eq!(
            ResourceType::from_path("ui/atlas.TEX"),
            Some(ResourceType::from_tag(*b"TEX!"))
        );
        assert_eq!(
            ResourceType::from_path("db/strings.sdb"),
            Some(ResourceType::from_tag(*b"XLOC"))
        );
        assert_eq!(ResourceType::from_path("a.unknown"), None);
        assert_eq!(ResourceType::from_path("no_extension"), None);
    }

    #[test]
    fn test_sniff_falls_back_to_content() {
        assert_eq!(
            ResourceType::detect("blob.bin", b"DTAB\x01\x02"),
            ResourceType::from_tag(*b"DTAB")
        );
        assert_eq!(
            ResourceType::detect("blob.bin", b"RES!"),
            ResourceType::from_tag(*b"RES!")
        );
        assert_eq!(ResourceType::detect("blob.bin", b"ZZZZ"), ResourceType::NONE);
        assert_eq!(ResourceType::detect("blob.bin", b"AB"), ResourceType::NONE);
    }

    #[test]
    fn test_display_and_describe() {
        let tex = ResourceType::from_tag(*b"TEX!");
        assert_eq!(tex.raw(), u32::from_le_bytes(*b"TEX!"));
        assert_eq!(tex.to_string(), "TEX!");
        assert_eq!(tex.describe(), "texture");
        assert_eq!(ResourceType::NONE.to_string(), "----");
        assert_eq!(ResourceType::from_raw(0x0000_0001).to_string(), "\\x01\\x00\\x00\\x00");
    }
}
