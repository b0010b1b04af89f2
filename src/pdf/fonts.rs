use std::collections::{BTreeSet, HashMap};

use pdf_writer::types::{CidFontType, FontFlags, SystemInfo, UnicodeCmap};
use pdf_writer::{Name, Pdf, Rect, Ref, Str};
use ttf_parser::Face;

use crate::fonts::{FontSource, ResolvedFont, to_winansi_bytes};

enum Encoding {
    WinAnsi,
    /// Subset glyph id per character, written as 2-byte big-endian CIDs.
    Identity(HashMap<char, u16>),
}

/// A font resource registered in the output, addressed as `/F{n}`.
pub(crate) struct PdfFont {
    pub name: String,
    pub font_ref: Ref,
    encoding: Encoding,
}

impl PdfFont {
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match &self.encoding {
            Encoding::WinAnsi => to_winansi_bytes(text),
            Encoding::Identity(char_to_gid) => {
                let mut out = Vec::with_capacity(text.len() * 2);
                for ch in text.chars() {
                    let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
                    out.extend_from_slice(&gid.to_be_bytes());
                }
                out
            }
        }
    }
}

fn system_info() -> SystemInfo<'static> {
    SystemInfo {
        registry: Str(b"Adobe"),
        ordering: Str(b"Identity"),
        supplement: 0,
    }
}

/// Embed a TrueType/OpenType face as a Type0 font with Identity-H encoding,
/// subset to `used`. Returns the char to subset-gid map.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    family: &str,
    data: &[u8],
    index: u32,
    used: &BTreeSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<HashMap<char, u16>> {
    let face = Face::parse(data, index).ok()?;
    let units = face.units_per_em() as f32;
    let to_1000 = |v: f32| v / units * 1000.0;

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        to_1000(bb.x_min as f32),
        to_1000(bb.y_min as f32),
        to_1000(bb.x_max as f32),
        to_1000(bb.y_max as f32),
    );

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut widths: Vec<(u16, f32)> = Vec::new();
    for &ch in used {
        let Some(gid) = face.glyph_index(ch) else {
            continue;
        };
        let new_gid = remapper.remap(gid.0);
        char_to_gid.insert(ch, new_gid);
        let advance = face.glyph_hor_advance(gid).map(|a| to_1000(a as f32)).unwrap_or(0.0);
        widths.push((new_gid, advance));
    }
    widths.sort_by_key(|&(gid, _)| gid);
    widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset = subsetter::subset(data, index, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {family}: {e}; embedding full font");
        data.to_vec()
    });
    let data_len = i32::try_from(subset.len()).ok()?;

    let ps_name = family.replace(' ', "");
    let descriptor_ref = alloc();
    let data_ref = alloc();
    let cid_ref = alloc();
    let cmap_ref = alloc();

    pdf.stream(data_ref, &subset).pair(Name(b"Length1"), data_len);

    let mut flags = FontFlags::NON_SYMBOLIC;
    if face.is_italic() {
        flags |= FontFlags::ITALIC;
    }
    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(flags)
        .bbox(bbox)
        .italic_angle(face.italic_angle())
        .ascent(to_1000(face.ascender() as f32))
        .descent(to_1000(face.descender() as f32))
        .cap_height(face.capital_height().map(|h| to_1000(h as f32)).unwrap_or(700.0))
        .stem_v(80.0)
        .font_file2(data_ref);

    {
        let mut cid = pdf.cid_font(cid_ref);
        cid.subtype(CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info());
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = UnicodeCmap::new(Name(cmap_name.as_bytes()), system_info());
    for (&ch, &gid) in &char_to_gid {
        cmap.pair(gid, ch);
    }
    pdf.stream(cmap_ref, cmap.finish().as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_ref)
        .to_unicode(cmap_ref);

    Some(char_to_gid)
}

/// Write the font objects for `font` and return its resource entry. Faces
/// that cannot be embedded fall back to the base-14 equivalent.
pub(crate) fn register_font(
    pdf: &mut Pdf,
    font: &ResolvedFont,
    name: String,
    used: &BTreeSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> PdfFont {
    let t0 = std::time::Instant::now();
    let font_ref = alloc();

    let embedded = match &font.source {
        FontSource::Face { data, index } => {
            let map = embed_truetype(pdf, font_ref, &font.family, data, *index, used, alloc);
            if map.is_none() {
                log::warn!("Font {} could not be embedded; using {}", font.key, font.base14_name());
            }
            map
        }
        FontSource::Builtin => None,
    };

    let encoding = match embedded {
        Some(map) => Encoding::Identity(map),
        None => {
            pdf.type1_font(font_ref)
                .base_font(Name(font.base14_name().as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            Encoding::WinAnsi
        }
    };

    log::debug!(
        "register_font: {} as {name} ({} chars) in {:.1}ms",
        font.key,
        used.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );

    PdfFont {
        name,
        font_ref,
        encoding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontBook;

    #[test]
    fn builtin_fonts_use_winansi() {
        let mut pdf = Pdf::new();
        let mut next = 1;
        let mut alloc = || {
            let r = Ref::new(next);
            next += 1;
            r
        };
        let book = FontBook::builtin();
        let font = book.resolve("Helvetica", true, false);
        let used: BTreeSet<char> = "ab".chars().collect();
        let entry = register_font(&mut pdf, &font, "F1".into(), &used, &mut alloc);
        assert_eq!(entry.name, "F1");
        assert_eq!(entry.encode("a\u{2019}"), vec![b'a', 0x92]);
    }

    #[test]
    fn identity_encoding_is_two_bytes_per_char() {
        let font = PdfFont {
            name: "F2".into(),
            font_ref: Ref::new(9),
            encoding: Encoding::Identity(HashMap::from([('a', 3), ('b', 258)])),
        };
        assert_eq!(font.encode("ab?"), vec![0, 3, 1, 2, 0, 0]);
    }
}
