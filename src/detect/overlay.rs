//! Burns detection overlays into a copy of the frame

use bytes::Bytes;
use image::{Rgb, RgbImage};

use crate::detect::model::{Detection, DetectionError};
use crate::source::{AnnotatedFrame, RawFrame};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_TEXT: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 255, 0]);

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = GLYPH_WIDTH + 1;
const LABEL_STRIP_HEIGHT: i32 = GLYPH_HEIGHT + 2;

/// Composite `detections` onto a copy of `frame`. The original payload is
/// untouched; dimensions carry over unchanged.
pub fn render(frame: &RawFrame, detections: &[Detection]) -> Result<AnnotatedFrame, DetectionError> {
    let mut image = RgbImage::from_raw(frame.width(), frame.height(), frame.data.to_vec())
        .ok_or_else(|| DetectionError::MalformedInput("payload does not fill frame".into()))?;

    for detection in detections {
        draw_detection(&mut image, detection);
    }

    Ok(AnnotatedFrame {
        data: Bytes::from(image.into_raw()),
        meta: frame.meta.clone(),
        captured_at: frame.captured_at,
    })
}

fn draw_detection(image: &mut RgbImage, detection: &Detection) {
    let left = detection.bbox.left.round() as i32;
    let top = detection.bbox.top.round() as i32;
    let right = detection.bbox.right.round() as i32;
    let bottom = detection.bbox.bottom.round() as i32;

    outline_rect(image, left, top, right, bottom);
    outline_rect(image, left + 1, top + 1, right - 1, bottom - 1);

    let text = format!("{} {:.0}%", detection.label, detection.confidence * 100.0);
    let strip_top = (top - LABEL_STRIP_HEIGHT).max(0);
    let strip_right = left + text.chars().count() as i32 * GLYPH_ADVANCE + 1;
    fill_rect(image, left, strip_top, strip_right, strip_top + LABEL_STRIP_HEIGHT - 1);
    draw_text(image, left + 1, strip_top + 1, &text);
}

fn outline_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32) {
    let (max_x, max_y) = (image.width() as i32 - 1, image.height() as i32 - 1);
    let l = left.clamp(0, max_x);
    let r = right.clamp(0, max_x);
    let t = top.clamp(0, max_y);
    let b = bottom.clamp(0, max_y);
    if l > r || t > b {
        return;
    }

    for x in l..=r {
        if (0..=max_y).contains(&top) {
            image.put_pixel(x as u32, top as u32, BOX_COLOR);
        }
        if (0..=max_y).contains(&bottom) {
            image.put_pixel(x as u32, bottom as u32, BOX_COLOR);
        }
    }
    for y in t..=b {
        if (0..=max_x).contains(&left) {
            image.put_pixel(left as u32, y as u32, BOX_COLOR);
        }
        if (0..=max_x).contains(&right) {
            image.put_pixel(right as u32, y as u32, BOX_COLOR);
        }
    }
}

fn fill_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32) {
    let (max_x, max_y) = (image.width() as i32 - 1, image.height() as i32 - 1);
    let l = left.clamp(0, max_x);
    let r = right.clamp(0, max_x);
    let t = top.clamp(0, max_y);
    let b = bottom.clamp(0, max_y);
    if l > r || t > b {
        return;
    }

    for y in t..=b {
        for x in l..=r {
            image.put_pixel(x as u32, y as u32, LABEL_BACKGROUND);
        }
    }
}

fn draw_text(image: &mut RgbImage, origin_x: i32, origin_y: i32, text: &str) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let mut x = origin_x;

    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(rows) = glyph(ch) {
            for (dy, row) in rows.iter().enumerate() {
                let y = origin_y + dy as i32;
                if y < 0 || y >= height {
                    continue;
                }
                for dx in 0..GLYPH_WIDTH {
                    if row >> (GLYPH_WIDTH - 1 - dx) & 1 == 1 {
                        let px = x + dx;
                        if px >= 0 && px < width {
                            image.put_pixel(px as u32, y as u32, LABEL_TEXT);
                        }
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
        if x >= width {
            break;
        }
    }
}

/// 5x7 bitmap font, one row per byte, low 5 bits used
fn glyph(ch: char) -> Option<&'static [u8; 7]> {
    let rows: &[u8; 7] = match ch {
        'A' => &[0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => &[0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => &[0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => &[0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => &[0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => &[0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => &[0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => &[0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => &[0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => &[0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => &[0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => &[0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => &[0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => &[0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => &[0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => &[0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => &[0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => &[0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => &[0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => &[0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => &[0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => &[0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => &[0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => &[0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => &[0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => &[0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => &[0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => &[0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => &[0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => &[0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => &[0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => &[0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => &[0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => &[0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => &[0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => &[0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '%' => &[0x19, 0x19, 0x02, 0x04, 0x08, 0x13, 0x13],
        '-' => &[0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => &[0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ' ' => &[0x00; 7],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::detect::model::BoundingBox;
    use crate::source::{FrameMetadata, PixelFormat};

    fn zero_frame(width: u32, height: u32) -> RawFrame {
        let meta = FrameMetadata::new(0, width, height, PixelFormat::Rgb24);
        RawFrame::new(Bytes::from(vec![0u8; meta.expected_len()]), meta).unwrap()
    }

    fn boxed(left: f32, top: f32, right: f32, bottom: f32) -> Detection {
        Detection {
            bbox: BoundingBox {
                left,
                top,
                right,
                bottom,
            },
            label: "person".into(),
            confidence: 0.9,
        }
    }

    #[test]
    fn no_detections_leaves_payload_untouched() {
        let frame = zero_frame(320, 240);
        let annotated = render(&frame, &[]).unwrap();
        assert_eq!(annotated.width(), 320);
        assert_eq!(annotated.height(), 240);
        assert_eq!(annotated.data, frame.data);
    }

    #[test]
    fn box_edges_are_painted() {
        let frame = zero_frame(64, 64);
        let annotated = render(&frame, &[boxed(20.0, 30.0, 40.0, 50.0)]).unwrap();
        let image = RgbImage::from_raw(64, 64, annotated.data.to_vec()).unwrap();
        assert_eq!(*image.get_pixel(20, 30), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(40, 50), Rgb([0, 255, 0]));
        assert_eq!(*image.get_pixel(30, 40), Rgb([0, 0, 0])); // interior untouched
    }

    #[test]
    fn out_of_bounds_box_is_clamped_not_panicking() {
        let frame = zero_frame(32, 32);
        let annotated = render(&frame, &[boxed(-10.0, -10.0, 100.0, 100.0)]).unwrap();
        assert_eq!(annotated.data.len(), frame.data.len());
    }

    #[test]
    fn dimensions_survive_annotation() {
        let frame = zero_frame(320, 240);
        let annotated = render(&frame, &[boxed(5.0, 5.0, 60.0, 80.0)]).unwrap();
        assert_eq!(annotated.data.len(), 320 * 240 * 3);
        assert!(std::sync::Arc::ptr_eq(&annotated.meta, &frame.meta));
    }
}
