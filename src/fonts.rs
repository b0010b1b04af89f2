use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use memmap2::Mmap;
use ttf_parser::Face;

use crate::error::FontResolutionError;
use crate::model::{EmbeddedFont, TextStyle};

/// Family used when nothing else resolves; rendered with the PDF base-14 Helvetica.
pub const BUILTIN_FAMILY: &str = "Helvetica";

/// Where the glyph data of a resolved font comes from.
#[derive(Debug)]
pub enum FontSource {
    Builtin,
    Face { data: Arc<Vec<u8>>, index: u32 },
}

#[derive(Debug)]
pub struct ResolvedFont {
    /// Stable key ("Family/B") that identifies this face on a canvas.
    pub key: String,
    pub family: String,
    pub bold: bool,
    pub italic: bool,
    pub source: FontSource,
    pub ascender_ratio: f32,
    pub descender_ratio: f32,
    /// Natural line height / em, `None` when the face has no usable metrics.
    pub line_h_ratio: Option<f32>,
}

impl ResolvedFont {
    fn builtin(bold: bool, italic: bool) -> Self {
        Self {
            key: font_key(BUILTIN_FAMILY, bold, italic),
            family: BUILTIN_FAMILY.to_string(),
            bold,
            italic,
            source: FontSource::Builtin,
            ascender_ratio: 0.718,
            descender_ratio: 0.207,
            line_h_ratio: None,
        }
    }

    fn from_face(family: &str, bold: bool, italic: bool, data: Arc<Vec<u8>>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units = face.units_per_em() as f32;
        let ascender = face.ascender() as f32;
        let descender = face.descender() as f32;
        let line_gap = face.line_gap() as f32;
        Some(Self {
            key: font_key(family, bold, italic),
            family: family.to_string(),
            bold,
            italic,
            ascender_ratio: ascender / units,
            descender_ratio: -descender / units,
            line_h_ratio: Some((ascender - descender + line_gap) / units),
            source: FontSource::Face { data, index },
        })
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.source, FontSource::Builtin)
    }

    /// PDF base-14 name for builtin faces.
    pub fn base14_name(&self) -> &'static str {
        match (self.bold, self.italic) {
            (true, true) => "Helvetica-BoldOblique",
            (true, false) => "Helvetica-Bold",
            (false, true) => "Helvetica-Oblique",
            (false, false) => "Helvetica",
        }
    }
}

pub fn font_key(family: &str, bold: bool, italic: bool) -> String {
    let base = primary_font_name(family);
    match (bold, italic) {
        (true, true) => format!("{}/BI", base),
        (true, false) => format!("{}/B", base),
        (false, true) => format!("{}/I", base),
        (false, false) => base.to_string(),
    }
}

/// Inverse of [`font_key`].
pub fn parse_font_key(key: &str) -> (String, bool, bool) {
    match key.rsplit_once('/') {
        Some((family, "BI")) => (family.to_string(), true, true),
        Some((family, "B")) => (family.to_string(), true, false),
        Some((family, "I")) => (family.to_string(), false, true),
        _ => (key.to_string(), false, false),
    }
}

pub(crate) fn primary_font_name(name: &str) -> &str {
    name.split(';').next().unwrap_or(name).trim()
}

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

/// Resolves font requests to faces and caches the result. Shared read-only
/// between layout and every render worker.
///
/// The directory index belongs to the book: it is scanned on the first lookup
/// that misses the embedded fonts, from this book's own directories.
pub struct FontBook {
    default_family: String,
    /// Also scan `DOCXIDE_FONTS` and the platform font directories.
    scan_platform: bool,
    font_dirs: Vec<PathBuf>,
    index: OnceLock<FontLookup>,
    embedded: HashMap<(String, bool, bool), Arc<Vec<u8>>>,
    resolved: RwLock<HashMap<String, Arc<ResolvedFont>>>,
}

impl FontBook {
    /// Only the builtin Helvetica metrics; never touches the file system.
    pub fn builtin() -> Self {
        Self {
            default_family: BUILTIN_FAMILY.to_string(),
            scan_platform: false,
            font_dirs: Vec::new(),
            index: OnceLock::new(),
            embedded: HashMap::new(),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// `extra_dirs` first, then `DOCXIDE_FONTS`, then the platform font directories.
    pub fn system(default_family: &str, extra_dirs: Vec<PathBuf>) -> Self {
        Self {
            default_family: default_family.to_string(),
            scan_platform: true,
            font_dirs: extra_dirs,
            ..Self::builtin()
        }
    }

    /// Only the given directories; the platform font directories are skipped.
    pub fn from_dirs(default_family: &str, dirs: Vec<PathBuf>) -> Self {
        Self {
            default_family: default_family.to_string(),
            font_dirs: dirs,
            ..Self::builtin()
        }
    }

    pub fn with_embedded(mut self, fonts: &[EmbeddedFont]) -> Self {
        for font in fonts {
            self.embedded.insert(
                (font.family.to_lowercase(), font.bold, font.italic),
                Arc::new(font.data.clone()),
            );
        }
        self
    }

    pub fn resolve_style(&self, style: &TextStyle) -> Arc<ResolvedFont> {
        self.resolve(&style.font_family, style.bold, style.italic)
    }

    /// Look up a face by the key stored in a layout.
    pub fn get(&self, key: &str) -> Arc<ResolvedFont> {
        let (family, bold, italic) = parse_font_key(key);
        self.resolve(&family, bold, italic)
    }

    pub fn resolve(&self, family: &str, bold: bool, italic: bool) -> Arc<ResolvedFont> {
        let request = font_key(family, bold, italic);
        if let Some(hit) = self
            .resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request)
        {
            return Arc::clone(hit);
        }

        let font = Arc::new(self.load(family, bold, italic));
        self.resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(request)
            .or_insert(font)
            .clone()
    }

    /// Every face resolved so far, keyed by its own key.
    pub fn resolved_fonts(&self) -> Vec<Arc<ResolvedFont>> {
        let map = self.resolved.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<Arc<ResolvedFont>> = Vec::new();
        for font in map.values() {
            if !out.iter().any(|f| f.key == font.key) {
                out.push(Arc::clone(font));
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    fn load(&self, family: &str, bold: bool, italic: bool) -> ResolvedFont {
        let candidates: Vec<&str> = family
            .split(';')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();

        for candidate in &candidates {
            if candidate.eq_ignore_ascii_case(BUILTIN_FAMILY) {
                return ResolvedFont::builtin(bold, italic);
            }
            if let Some(font) = self.load_exact(candidate, bold, italic) {
                return font;
            }
        }

        // Variant missing: regular face of the same family.
        if bold || italic {
            for candidate in &candidates {
                if let Some(font) = self.load_exact(candidate, false, false) {
                    log::warn!(
                        "{}, using regular variant of {candidate}",
                        FontResolutionError {
                            family: family.to_string(),
                            bold,
                            italic,
                        }
                    );
                    return font;
                }
            }
        }

        let err = FontResolutionError {
            family: family.to_string(),
            bold,
            italic,
        };
        if !self.default_family.eq_ignore_ascii_case(BUILTIN_FAMILY)
            && !candidates
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&self.default_family))
            && let Some(font) = self
                .load_exact(&self.default_family, bold, italic)
                .or_else(|| self.load_exact(&self.default_family, false, false))
        {
            log::warn!("{err}, using default family {}", self.default_family);
            return font;
        }

        log::warn!("{err}, using builtin {BUILTIN_FAMILY} metrics");
        ResolvedFont::builtin(bold, italic)
    }

    fn load_exact(&self, family: &str, bold: bool, italic: bool) -> Option<ResolvedFont> {
        let lower = family.to_lowercase();
        if let Some(data) = self.embedded.get(&(lower.clone(), bold, italic)) {
            return ResolvedFont::from_face(family, bold, italic, Arc::clone(data), 0);
        }
        if !self.scan_platform && self.font_dirs.is_empty() {
            return None;
        }
        let index = self
            .index
            .get_or_init(|| scan_font_dirs(&font_directories(&self.font_dirs, self.scan_platform)));
        let (path, face_index) = index.get(&(lower, bold, italic))?;
        let data = std::fs::read(path).ok()?;
        ResolvedFont::from_face(family, bold, italic, Arc::new(data), *face_index)
    }
}

impl Default for FontBook {
    fn default() -> Self {
        Self::builtin()
    }
}

fn font_family_name(face: &Face) -> Option<String> {
    // ID 1 (Family) distinguishes "Aptos Display" from "Aptos"; ID 16 would merge them.
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

fn font_directories(extra: &[PathBuf], platform: bool) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = extra.to_vec();
    if !platform {
        return dirs;
    }

    if let Ok(val) = std::env::var("DOCXIDE_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        dirs.extend(
            val.split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        match std::env::var("WINDIR") {
            Ok(windir) => dirs.push(PathBuf::from(windir).join("Fonts")),
            Err(_) => dirs.push("C:\\Windows\\Fonts".into()),
        }
    }

    dirs
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

fn scan_font_dirs(dirs: &[PathBuf]) -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut files_scanned = 0u32;
    let mut stack = dirs.to_vec();
    let mut visited: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();

    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_font_file(&path) {
                continue;
            }
            files_scanned += 1;
            let Ok(file) = std::fs::File::open(&path) else {
                continue;
            };
            // SAFETY: the mapping is read-only and dropped before this iteration ends;
            // a font file truncated concurrently at worst fails to parse.
            let Ok(data) = (unsafe { Mmap::map(&file) }) else {
                continue;
            };
            let face_count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
            for face_idx in 0..face_count {
                let Ok(face) = Face::parse(&data, face_idx) else {
                    continue;
                };
                if let Some(family) = font_family_name(&face) {
                    index
                        .entry((family.to_lowercase(), face.is_bold(), face.is_italic()))
                        .or_insert((path.clone(), face_idx));
                }
            }
        }
    }

    log::info!(
        "Font scan: {:.1}ms, {} files parsed → {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        files_scanned,
        index.len(),
    );
    index
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
pub(crate) fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007E => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// Convert a UTF-8 string to WinAnsi (Windows-1252) bytes; unmappable chars become '?'.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match char_to_winansi(c) {
            0 => b'?',
            b => b,
        })
        .collect()
}

/// Approximate Helvetica advance in 1000-units/em, by character class.
pub fn builtin_char_width(ch: char) -> f32 {
    let byte = match char_to_winansi(ch) {
        0 if ch.is_whitespace() => 32,
        0 => return 556.0,
        b => b,
    };
    match byte {
        32 => 278.0,                          // space
        33..=47 => 333.0,                     // punctuation
        48..=57 => 556.0,                     // digits
        58..=64 => 333.0,                     // more punctuation
        73 | 74 => 278.0,                     // I J (narrow uppercase)
        77 => 833.0,                          // M (wide)
        65..=90 => 667.0,                     // uppercase A-Z (average)
        91..=96 => 333.0,                     // brackets etc.
        102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
        109 | 119 => 833.0,                   // m w (wide)
        97..=122 => 556.0,                    // lowercase a-z (average)
        0x95 => 350.0,                        // bullet
        _ => 556.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_key_roundtrips() {
        for (bold, italic) in [(false, false), (true, false), (false, true), (true, true)] {
            let key = font_key("Times New Roman", bold, italic);
            assert_eq!(parse_font_key(&key), ("Times New Roman".to_string(), bold, italic));
        }
        assert_eq!(font_key("Aptos; Calibri", true, false), "Aptos/B");
    }

    #[test]
    fn builtin_book_falls_back_to_helvetica() {
        let book = FontBook::builtin();
        let font = book.resolve("Nonexistent Sans", true, false);
        assert!(font.is_builtin());
        assert_eq!(font.key, "Helvetica/B");
        assert_eq!(font.base14_name(), "Helvetica-Bold");
        // cached: same Arc on the second lookup
        let again = book.resolve("Nonexistent Sans", true, false);
        assert!(Arc::ptr_eq(&font, &again));
    }

    #[test]
    fn get_by_key_resolves_same_face() {
        let book = FontBook::builtin();
        let font = book.resolve("Helvetica", false, true);
        assert_eq!(book.get(&font.key).key, font.key);
        assert_eq!(book.resolved_fonts().len(), 1);
    }

    /// Any TrueType file installed on this machine, with its family name.
    fn installed_font() -> Option<(PathBuf, String)> {
        let index = scan_font_dirs(&font_directories(&[], true));
        index
            .iter()
            .filter(|((_, bold, italic), (path, face))| {
                !bold && !italic && *face == 0 && path.extension().is_some_and(|e| e.eq_ignore_ascii_case("ttf"))
            })
            .filter_map(|(_, (path, _))| {
                let data = std::fs::read(path).ok()?;
                let face = Face::parse(&data, 0).ok()?;
                Some((path.clone(), font_family_name(&face)?))
            })
            .next()
    }

    #[test]
    fn each_book_scans_its_own_directories() {
        let Some((font_path, family)) = installed_font() else {
            return;
        };
        let root = std::env::temp_dir().join(format!("docxide-typeset-fonts-{}", std::process::id()));
        let empty = root.join("empty");
        let filled = root.join("filled");
        std::fs::create_dir_all(&empty).unwrap();
        std::fs::create_dir_all(&filled).unwrap();
        std::fs::copy(&font_path, filled.join("face.ttf")).unwrap();

        let first = FontBook::from_dirs(BUILTIN_FAMILY, vec![empty]);
        assert!(first.resolve(&family, false, false).is_builtin());

        let second = FontBook::from_dirs(BUILTIN_FAMILY, vec![filled]);
        let font = second.resolve(&family, false, false);
        assert!(!font.is_builtin(), "{family} not found in the second book's directory");
        assert_eq!(font.family, family);
    }

    #[test]
    fn builtin_widths_distinguish_narrow_and_wide() {
        assert!(builtin_char_width('i') < builtin_char_width('a'));
        assert!(builtin_char_width('a') < builtin_char_width('m'));
        assert_eq!(builtin_char_width(' '), 278.0);
    }

    #[test]
    fn winansi_maps_typographic_quotes() {
        assert_eq!(to_winansi_bytes("\u{201C}a\u{201D}"), vec![0x93, b'a', 0x94]);
        assert_eq!(to_winansi_bytes("\u{4E2D}"), vec![b'?']);
    }
}
