//! Output-size resolution and aspect-ratio snapping.
//!
//! The image model takes a symbolic `W:H` token from a fixed set rather than
//! pixel dimensions, so every requested size collapses to the nearest token.

use regex::Regex;
use std::sync::OnceLock;

use tolan_core::constants::{size_preset, IMAGE_SIZE_PRESETS, SUPPORTED_ASPECT_RATIOS};

fn size_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{3,4})\s*[x*×]\s*(\d{3,4})").unwrap())
}

/// Resolve target pixel dimensions from the prompt text.
///
/// A reference image wins: its aspect ratio is kept and the longer edge is
/// scaled to `max_size`. Otherwise preset keywords, then an explicit
/// `WIDTHxHEIGHT`, then the square default.
pub fn parse_size_from_text(
    text: &str,
    reference_size: Option<(u32, u32)>,
    max_size: u32,
) -> (u32, u32) {
    if let Some((ref_w, ref_h)) = reference_size {
        if ref_w >= ref_h {
            let h = (max_size as u64 * ref_h as u64 / ref_w.max(1) as u64) as u32;
            return (max_size, h);
        }
        let w = (max_size as u64 * ref_w as u64 / ref_h.max(1) as u64) as u32;
        return (w, max_size);
    }

    let lower = text.to_lowercase();
    if text.contains("超宽") || lower.contains("wide") {
        return size_preset("wide");
    }
    if text.contains("超高") || lower.contains("tall") {
        return size_preset("tall");
    }
    if text.contains('横') || lower.contains("landscape") || text.contains('宽') {
        return size_preset("landscape");
    }
    if text.contains('竖') || lower.contains("portrait") || text.contains('高') {
        return size_preset("portrait");
    }

    if let Some(caps) = size_pattern().captures(text) {
        let mut width: u32 = caps[1].parse().unwrap_or(max_size);
        let mut height: u32 = caps[2].parse().unwrap_or(max_size);
        if width > max_size || height > max_size {
            let scale = max_size as f64 / width.max(height) as f64;
            width = (width as f64 * scale) as u32;
            height = (height as f64 * scale) as u32;
        }
        return (width, height);
    }

    size_preset("square")
}

/// Map pixel dimensions to the nearest supported `W:H` token.
pub fn aspect_ratio_token(width: u32, height: u32) -> String {
    let (w, h) = reduce(width.max(1), height.max(1));
    if let Some((rw, rh)) = SUPPORTED_ASPECT_RATIOS
        .iter()
        .find(|(rw, rh)| (*rw, *rh) == (w, h))
    {
        return format!("{rw}:{rh}");
    }

    let target = w as f64 / h as f64;
    let (bw, bh) = SUPPORTED_ASPECT_RATIOS
        .iter()
        .copied()
        .min_by(|a, b| {
            let da = (target - a.0 as f64 / a.1 as f64).abs();
            let db = (target - b.0 as f64 / b.1 as f64).abs();
            da.partial_cmp(&db).unwrap()
        })
        .unwrap_or((1, 1));
    format!("{bw}:{bh}")
}

fn reduce(w: u32, h: u32) -> (u32, u32) {
    let d = gcd(w, h);
    (w / d, h / d)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}
