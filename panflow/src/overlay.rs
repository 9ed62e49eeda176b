//! # Movement overlay
//!
//! Burns the numeric camera movement estimate into output frames. This is purely presentational
//! and holds no state.

use crate::prelude::v1::*;
use image::Rgb;

/// Bottom-right corner of the translucent panel (inclusive).
const PANEL_END: (u32, u32) = (500, 100);
/// Opacity of the white panel.
const PANEL_ALPHA: f32 = 0.6;
/// Glyph magnification factor.
const GLYPH_SCALE: u32 = 2;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// Baselines of the two text lines.
const LINES: [(u32, u32); 2] = [(10, 30), (10, 60)];

/// Draw camera movement onto a copy of every frame.
///
/// Output stops at whichever of the two sequences is shorter.
///
/// # Arguments
///
/// * `frames` - frames to annotate.
/// * `movement` - per-frame camera movement.
pub fn draw_camera_movement(frames: &[Frame], movement: &[Movement]) -> Vec<Frame> {
    frames
        .iter()
        .zip(movement)
        .map(|(frame, m)| {
            let mut frame = frame.clone();
            draw_panel(&mut frame);
            let text = [
                format!("Camera Movement X: {:.2}", m.dx),
                format!("Camera Movement Y: {:.2}", m.dy),
            ];
            for (line, (x, baseline)) in text.iter().zip(LINES) {
                draw_text(&mut frame, line, x, baseline + 1 - GLYPH_HEIGHT * GLYPH_SCALE);
            }
            frame
        })
        .collect()
}

fn draw_panel(frame: &mut Frame) {
    let w = frame.width().min(PANEL_END.0 + 1);
    let h = frame.height().min(PANEL_END.1 + 1);

    for y in 0..h {
        for x in 0..w {
            let px = frame.get_pixel_mut(x, y);
            for c in px.0.iter_mut() {
                let v = PANEL_ALPHA * 255.0 + (1.0 - PANEL_ALPHA) * *c as f32;
                *c = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn draw_text(frame: &mut Frame, text: &str, x: u32, top: u32) {
    let advance = (GLYPH_WIDTH + 1) * GLYPH_SCALE;

    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else {
            continue;
        };

        let left = x + i as u32 * advance;

        for (gy, row) in rows.iter().enumerate() {
            for gx in 0..GLYPH_WIDTH {
                if row & (1 << (GLYPH_WIDTH - 1 - gx)) == 0 {
                    continue;
                }
                for sy in 0..GLYPH_SCALE {
                    for sx in 0..GLYPH_SCALE {
                        let px = left + gx * GLYPH_SCALE + sx;
                        let py = top + gy as u32 * GLYPH_SCALE + sy;
                        if px < frame.width() && py < frame.height() {
                            frame.put_pixel(px, py, Rgb([0, 0, 0]));
                        }
                    }
                }
            }
        }
    }
}

/// 5x7 bitmap of a character, one byte per row, most significant used bit on the left.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'a' => [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
        'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
        'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        'o' => [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
        'r' => [0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
        't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        'v' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn output_length_follows_shorter_sequence() {
        let frames = vec![RgbImage::new(64, 48); 3];
        let out = draw_camera_movement(&frames, &[Movement::ZERO, Movement::new(1.0, 2.0)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].dimensions(), (64, 48));
    }

    #[test]
    fn panel_is_blended_and_text_drawn() {
        let frames = vec![RgbImage::from_pixel(640, 240, Rgb([100, 100, 100]))];
        let out = draw_camera_movement(&frames, &[Movement::new(12.5, -3.0)]);
        let frame = &out[0];

        // Blended panel corner, untouched region outside of it.
        assert_eq!(frame.get_pixel(499, 99).0, [193, 193, 193]);
        assert_eq!(frame.get_pixel(600, 200).0, [100, 100, 100]);

        // Some text pixels are black, and only within the panel.
        let black = frame.enumerate_pixels().filter(|(_, _, p)| p.0 == [0, 0, 0]);
        let mut count = 0;
        for (x, y, _) in black {
            assert!(x <= 500 && y <= 100);
            count += 1;
        }
        assert!(count > 0);

        // The source frames are left untouched.
        assert_eq!(frames[0].get_pixel(0, 0).0, [100, 100, 100]);
    }

    #[test]
    fn small_frames_are_clipped() {
        let frames = vec![RgbImage::new(20, 20)];
        let out = draw_camera_movement(&frames, &[Movement::new(1.0, 1.0)]);
        assert_eq!(out[0].dimensions(), (20, 20));
    }
}
