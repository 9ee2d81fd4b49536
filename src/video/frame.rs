use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;
use tracing::warn;

/// 计算按目标宽高比居中裁剪的区域 `(x, y, w, h)`
pub fn center_crop_rect(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32, u32, u32) {
    if src_w == 0 || src_h == 0 || target_w == 0 || target_h == 0 {
        return (0, 0, src_w, src_h);
    }

    let (sw, sh, tw, th) = (src_w as u64, src_h as u64, target_w as u64, target_h as u64);
    if sw * th > sh * tw {
        // 过宽，裁左右
        let new_w = ((sh * tw) / th).clamp(1, sw) as u32;
        ((src_w - new_w) / 2, 0, new_w, src_h)
    } else {
        // 过高，裁上下
        let new_h = ((sw * th) / tw).clamp(1, sh) as u32;
        (0, (src_h - new_h) / 2, src_w, new_h)
    }
}

/// 转为 RGB，居中裁剪到目标比例，再缩放到目标分辨率
pub fn fit_to_frame(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let rgb = image.to_rgb8();
    let (x, y, w, h) = center_crop_rect(rgb.width(), rgb.height(), width, height);
    let cropped = imageops::crop_imm(&rgb, x, y, w, h).to_image();
    if cropped.dimensions() == (width, height) {
        return cropped;
    }
    imageops::resize(&cropped, width, height, FilterType::Lanczos3)
}

pub fn blank_frame(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([0, 0, 0]))
}

/// 读取分镜图片；缺失或无法解码时用黑帧代替
pub fn load_frame(path: Option<&Path>, width: u32, height: u32) -> RgbImage {
    let Some(path) = path else {
        warn!("Scene has no image, using a blank frame");
        return blank_frame(width, height);
    };

    match image::open(path) {
        Ok(image) => fit_to_frame(&image, width, height),
        Err(e) => {
            warn!("Failed to decode {}: {}, using a blank frame", path.display(), e);
            blank_frame(width, height)
        }
    }
}

/// 缩放系数上限
pub const MAX_ZOOM_SCALE: f64 = 2.0;

/// 时刻 `t` 的缩放帧：放大 1 + rate·t 倍（不超过 `MAX_ZOOM_SCALE`）后居中裁回原尺寸
pub fn zoom_frame(base: &RgbImage, t: f64, rate: f64) -> RgbImage {
    let (width, height) = base.dimensions();
    let scale = (1.0 + rate * t.max(0.0)).clamp(1.0, MAX_ZOOM_SCALE);
    let scaled_w = ((width as f64) * scale).round().max(width as f64) as u32;
    let scaled_h = ((height as f64) * scale).round().max(height as f64) as u32;
    if (scaled_w, scaled_h) == (width, height) {
        return base.clone();
    }

    let scaled = imageops::resize(base, scaled_w, scaled_h, FilterType::Triangle);
    let x = (scaled_w - width) / 2;
    let y = (scaled_h - height) / 2;
    imageops::crop_imm(&scaled, x, y, width, height).to_image()
}

/// 一个分镜在给定帧率下的帧数
pub fn frame_count(duration: f64, fps: u32) -> usize {
    ((duration * fps as f64).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_crop_wide_image_to_vertical() {
        // 1920x1080 -> 9:16 取中间 607 宽
        let (x, y, w, h) = center_crop_rect(1920, 1080, 1080, 1920);
        assert_eq!((w, h), (607, 1080));
        assert_eq!(y, 0);
        assert_eq!(x, (1920 - 607) / 2);
    }

    #[test]
    fn test_crop_tall_image_to_horizontal() {
        let (x, y, w, h) = center_crop_rect(1000, 3000, 1920, 1080);
        assert_eq!((x, w), (0, 1000));
        assert_eq!(h, 562);
        assert_eq!(y, (3000 - 562) / 2);
    }

    #[test]
    fn test_matching_ratio_is_untouched() {
        assert_eq!(center_crop_rect(540, 960, 1080, 1920), (0, 0, 540, 960));
    }

    #[test]
    fn test_fit_to_frame_converts_and_resizes() {
        let rgba = RgbaImage::from_pixel(300, 100, image::Rgba([200, 10, 10, 128]));
        let frame = fit_to_frame(&DynamicImage::ImageRgba8(rgba), 90, 160);
        assert_eq!(frame.dimensions(), (90, 160));
        let red = frame.get_pixel(45, 80)[0];
        assert!((198..=202).contains(&red), "red channel {}", red);
    }

    #[test]
    fn test_load_frame_broken_file_gives_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let frame = load_frame(Some(&path), 32, 18);
        assert_eq!(frame.dimensions(), (32, 18));
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));

        let missing = load_frame(None, 8, 8);
        assert_eq!(missing.dimensions(), (8, 8));
    }

    #[test]
    fn test_zoom_keeps_size_and_starts_unscaled() {
        let mut base = RgbImage::from_pixel(64, 36, Rgb([10, 20, 30]));
        base.put_pixel(0, 0, Rgb([255, 255, 255]));

        let first = zoom_frame(&base, 0.0, 0.04);
        assert_eq!(first, base);

        let later = zoom_frame(&base, 5.0, 0.04);
        assert_eq!(later.dimensions(), (64, 36));
        // 放大后中心像素不变
        let center = later.get_pixel(32, 18);
        assert!(center.0.iter().zip([10u8, 20, 30]).all(|(a, b)| a.abs_diff(b) <= 1));
    }

    #[test]
    fn test_zoom_scale_is_capped() {
        let mut base = RgbImage::from_pixel(40, 72, Rgb([5, 5, 5]));
        base.put_pixel(20, 36, Rgb([200, 100, 0]));

        let runaway = zoom_frame(&base, 6.0, 100.0);
        let capped = zoom_frame(&base, (MAX_ZOOM_SCALE - 1.0) / 0.5, 0.5);
        assert_eq!(runaway.dimensions(), (40, 72));
        assert_eq!(runaway, capped);
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(6.0, 24), 144);
        assert_eq!(frame_count(0.0, 24), 1);
    }
}
