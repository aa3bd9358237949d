//! PNG post-processing: physical pixel density (pHYs).

use std::io::Cursor;

/// Pixels per meter for a DPI value.
pub fn pixels_per_meter(dpi: u32) -> u32 {
    (dpi as f64 / 0.0254).round() as u32
}

/// Re-encode `png_bytes` with a pHYs chunk. If anything goes wrong the
/// input is returned unchanged.
pub fn embed_dpi(png_bytes: Vec<u8>, dpi: u32) -> Vec<u8> {
    match try_embed_dpi(&png_bytes, dpi) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!("could not embed {} DPI, keeping PNG as is: {}", dpi, e);
            png_bytes
        }
    }
}

fn try_embed_dpi(png_bytes: &[u8], dpi: u32) -> anyhow::Result<Vec<u8>> {
    let mut decoder = png::Decoder::new(Cursor::new(png_bytes));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf)?;
    buf.truncate(frame.buffer_size());

    let info = reader.info();
    let ppm = pixels_per_meter(dpi);

    let mut output = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut output, info.width, info.height);
        encoder.set_color(info.color_type);
        encoder.set_depth(info.bit_depth);
        if let Some(palette) = &info.palette {
            encoder.set_palette(palette.to_vec());
        }
        if let Some(trns) = &info.trns {
            encoder.set_trns(trns.to_vec());
        }
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&buf)?;
    }
    Ok(output)
}

/// Read back the pHYs density, if present.
pub fn read_pixel_dims(png_bytes: &[u8]) -> Option<png::PixelDimensions> {
    let reader = png::Decoder::new(Cursor::new(png_bytes)).read_info().ok()?;
    reader.info().pixel_dims
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_png(w: u32, h: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, w, h);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().expect("header");
            writer
                .write_image_data(&vec![0u8; (w * h * 4) as usize])
                .expect("data");
        }
        out
    }

    #[test]
    fn test_pixels_per_meter() {
        assert_eq!(pixels_per_meter(96), 3780);
        assert_eq!(pixels_per_meter(300), 11811);
        assert_eq!(pixels_per_meter(72), 2835);
    }

    #[test]
    fn test_embed_dpi_adds_phys() {
        let out = embed_dpi(blank_png(3, 2), 300);
        let dims = read_pixel_dims(&out).expect("pHYs present");
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.yppu, 11811);
        assert_eq!(dims.unit, png::Unit::Meter);
    }

    #[test]
    fn test_embed_dpi_falls_back_on_garbage() {
        let garbage = b"not a png".to_vec();
        assert_eq!(embed_dpi(garbage.clone(), 96), garbage);
    }
}
