// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Registration marks for optical cutters, drawn in the page corners.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use sheetpress_core::config::RegistrationMarks;
use sheetpress_core::types::mm_to_px;

const MARK_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Distance of every mark from the page edges.
pub const MARK_INSET_MM: f64 = 5.0;
/// Edge length of a corner square.
pub const SQUARE_MM: f64 = 5.0;
/// Radius of a crosshair circle.
pub const CROSSHAIR_RADIUS_MM: f64 = 3.0;

pub fn draw_registration_marks(page: &mut RgbImage, marks: RegistrationMarks, dpi: u32) {
    match marks {
        RegistrationMarks::None => {}
        RegistrationMarks::ThreeCorner => three_corner(page, dpi),
        RegistrationMarks::Crosshair => crosshairs(page, dpi),
    }
}

/// Filled squares top-left, top-right and bottom-left; bottom-right stays
/// empty so the cutter can tell the sheet's orientation.
fn three_corner(page: &mut RgbImage, dpi: u32) {
    let inset = mm_to_px(MARK_INSET_MM, dpi) as i32;
    let size = mm_to_px(SQUARE_MM, dpi).max(1);
    let (w, h) = (page.width() as i32, page.height() as i32);
    let far_x = w - inset - size as i32;
    let far_y = h - inset - size as i32;
    for (x, y) in [(inset, inset), (far_x, inset), (inset, far_y)] {
        draw_filled_rect_mut(page, Rect::at(x, y).of_size(size, size), MARK_COLOR);
    }
}

fn crosshairs(page: &mut RgbImage, dpi: u32) {
    let inset = mm_to_px(MARK_INSET_MM, dpi) as i32;
    let radius = mm_to_px(CROSSHAIR_RADIUS_MM, dpi).max(2) as i32;
    let stroke = (dpi / 150).max(1) as i32;
    let (w, h) = (page.width() as i32, page.height() as i32);
    let near = inset + radius;
    for (cx, cy) in [(near, near), (w - near, near), (near, h - near), (w - near, h - near)] {
        for t in 0..stroke {
            draw_hollow_circle_mut(page, (cx, cy), radius - t, MARK_COLOR);
            let o = (t - stroke / 2) as f32;
            let (fx, fy, r) = (cx as f32, cy as f32, (radius + radius / 3) as f32);
            draw_line_segment_mut(page, (fx - r, fy + o), (fx + r, fy + o), MARK_COLOR);
            draw_line_segment_mut(page, (fx + o, fy - r), (fx + o, fy + r), MARK_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_page() -> RgbImage {
        RgbImage::from_pixel(600, 800, Rgb([255, 255, 255]))
    }

    #[test]
    fn none_leaves_page_clean() {
        let mut page = blank_page();
        draw_registration_marks(&mut page, RegistrationMarks::None, 300);
        assert_eq!(page, blank_page());
    }

    #[test]
    fn three_corner_skips_bottom_right() {
        let mut page = blank_page();
        draw_registration_marks(&mut page, RegistrationMarks::ThreeCorner, 300);
        let inset = mm_to_px(MARK_INSET_MM, 300);
        let size = mm_to_px(SQUARE_MM, 300);
        let c = inset + size / 2;
        assert_eq!(page.get_pixel(c, c).0, [0, 0, 0]);
        assert_eq!(page.get_pixel(600 - c, c).0, [0, 0, 0]);
        assert_eq!(page.get_pixel(c, 800 - c).0, [0, 0, 0]);
        assert_eq!(page.get_pixel(600 - c, 800 - c).0, [255, 255, 255]);
    }

    #[test]
    fn crosshair_centres_are_marked_in_all_corners() {
        let mut page = blank_page();
        draw_registration_marks(&mut page, RegistrationMarks::Crosshair, 300);
        let near = mm_to_px(MARK_INSET_MM, 300) + mm_to_px(CROSSHAIR_RADIUS_MM, 300);
        for (x, y) in [(near, near), (600 - near, near), (near, 800 - near), (600 - near, 800 - near)] {
            assert_eq!(page.get_pixel(x, y).0, [0, 0, 0], "centre ({x},{y})");
        }
    }
}
