use fontdue::layout::{
    CoordinateSystem, HorizontalAlign, Layout, LayoutSettings, TextStyle, VerticalAlign, WrapStyle,
};
use fontdue::{Font, FontSettings};
use image::{Rgb, RgbImage};
use std::path::Path;
use tracing::{debug, warn};

/// 占位图的暗色调色板
pub const PLACEHOLDER_COLORS: [[u8; 3]; 5] = [
    [10, 10, 20],
    [20, 12, 28],
    [8, 22, 30],
    [28, 14, 14],
    [14, 24, 16],
];

/// 未指定字体时依次尝试的系统字体
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// 读取标注字体；都不可用时返回 None，占位图退化为纯色
pub fn load_label_font(preferred: Option<&Path>) -> Option<Font> {
    let candidates = preferred
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(Path::new));

    for path in candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        match Font::from_bytes(bytes, FontSettings::default()) {
            Ok(font) => {
                debug!("Placeholder label font: {}", path.display());
                return Some(font);
            }
            Err(e) => warn!("Failed to parse font {}: {}", path.display(), e),
        }
    }
    None
}

/// 暗色占位图，有字体时居中写上 "SCENE N"
pub fn placeholder_image(index: usize, width: u32, height: u32, font: Option<&Font>) -> RgbImage {
    let color = PLACEHOLDER_COLORS[index % PLACEHOLDER_COLORS.len()];
    let mut image = RgbImage::from_pixel(width, height, Rgb(color));
    if let Some(font) = font {
        draw_label(&mut image, font, &format!("SCENE {}", index + 1));
    }
    image
}

fn draw_label(image: &mut RgbImage, font: &Font, text: &str) {
    let (width, height) = image.dimensions();
    let font_size = (width.min(height) as f32 / 10.0).max(8.0);

    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        x: 0.0,
        y: 0.0,
        max_width: Some(width as f32),
        max_height: Some(height as f32),
        horizontal_align: HorizontalAlign::Center,
        vertical_align: VerticalAlign::Middle,
        line_height: 1.0,
        wrap_style: WrapStyle::Letter,
        wrap_hard_breaks: true,
    });
    layout.append(&[font], &TextStyle::new(text, font_size, 0));

    for glyph in layout.glyphs() {
        if glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let (_, coverage) = font.rasterize_config(glyph.key);
        let left = glyph.x.round() as i64;
        let top = glyph.y.round() as i64;

        for gy in 0..glyph.height {
            for gx in 0..glyph.width {
                let alpha = coverage[gy * glyph.width + gx] as u16;
                let (x, y) = (left + gx as i64, top + gy as i64);
                if alpha == 0 || x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    continue;
                }
                // 白字按覆盖率混合
                let pixel = image.get_pixel_mut(x as u32, y as u32);
                for channel in pixel.0.iter_mut() {
                    let base = *channel as u16;
                    *channel = (base + (255 - base) * alpha / 255) as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_placeholder_matches_resolution() {
        let image = placeholder_image(7, 1080, 1920, None);
        assert_eq!(image.dimensions(), (1080, 1920));
        assert!(image.pixels().all(|p| p.0 == PLACEHOLDER_COLORS[2]));
    }

    #[test]
    fn test_unreadable_font_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        let font = load_label_font(Some(&bogus));
        // 坏字体被跳过，结果取决于系统字体是否存在
        let system = load_label_font(None);
        assert_eq!(font.is_some(), system.is_some());
    }

    #[test]
    fn test_label_is_drawn_when_a_font_is_available() {
        let Some(font) = load_label_font(None) else {
            return;
        };
        let image = placeholder_image(0, 360, 640, Some(&font));
        let background = PLACEHOLDER_COLORS[0];
        assert_eq!(image.get_pixel(0, 0).0, background);
        let bright = image.pixels().filter(|p| p.0[0] > 128).count();
        assert!(bright > 50);
    }
}
