use std::io::Cursor;

use pdf_writer::{Filter, Pdf, Ref};

/// Write `data` as an image XObject at `xobj_ref`. JPEG streams are passed
/// through; everything else is decoded and re-encoded as Flate RGB with an
/// optional alpha soft mask.
pub(crate) fn embed_image(
    pdf: &mut Pdf,
    xobj_ref: Ref,
    data: &[u8],
    alloc: &mut impl FnMut() -> Ref,
) -> Result<(), String> {
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| e.to_string())?;

    if reader.format() == Some(image::ImageFormat::Jpeg) {
        let (w, h) = reader.into_dimensions().map_err(|e| e.to_string())?;
        let mut xobj = pdf.image_xobject(xobj_ref, data);
        xobj.filter(Filter::DctDecode);
        xobj.width(w as i32);
        xobj.height(h as i32);
        xobj.color_space().device_rgb();
        xobj.bits_per_component(8);
        return Ok(());
    }

    let decoded = reader.decode().map_err(|e| e.to_string())?;
    let rgba = decoded.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

    let rgb: Vec<u8> = rgba.pixels().flat_map(|p| [p.0[0], p.0[1], p.0[2]]).collect();
    let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb, 6);

    let smask_ref = has_alpha.then(|| {
        let alpha: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(&alpha, 6);
        let mask_ref = alloc();
        let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
        mask.filter(Filter::FlateDecode);
        mask.width(w as i32);
        mask.height(h as i32);
        mask.color_space().device_gray();
        mask.bits_per_component(8);
        mask_ref
    });

    let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
    xobj.filter(Filter::FlateDecode);
    xobj.width(w as i32);
    xobj.height(h as i32);
    xobj.color_space().device_rgb();
    xobj.bits_per_component(8);
    if let Some(mask_ref) = smask_ref {
        xobj.s_mask(mask_ref);
    }
    Ok(())
}
