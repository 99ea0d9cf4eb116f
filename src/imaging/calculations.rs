//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// A single variant width to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSize {
    pub width: u32,
    pub height: u32,
}

/// Parse a `"320,640, 1024"` width list. Blank entries are ignored.
pub fn parse_widths(csv: &str) -> Result<Vec<u32>, String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .ok()
                .filter(|w| *w > 0)
                .ok_or_else(|| format!("invalid width {s:?}"))
        })
        .collect()
}

/// Calculate which widths to generate and their heights.
///
/// Widths larger than the original are skipped, duplicates collapse, and the
/// result is ascending. Heights preserve the aspect ratio. If every requested
/// width exceeds the original, the original size is the only entry.
///
/// # Examples
/// ```
/// # use nib::imaging::calculate_variant_sizes;
/// let sizes = calculate_variant_sizes((1000, 500), &[640, 320, 2000]);
/// assert_eq!(sizes.iter().map(|s| s.width).collect::<Vec<_>>(), vec![320, 640]);
/// assert_eq!(sizes[0].height, 160);
/// ```
pub fn calculate_variant_sizes(original: (u32, u32), widths: &[u32]) -> Vec<VariantSize> {
    let (orig_w, orig_h) = original;

    let mut accepted: Vec<u32> = widths
        .iter()
        .copied()
        .filter(|&w| w > 0 && w <= orig_w)
        .collect();
    accepted.sort_unstable();
    accepted.dedup();

    if accepted.is_empty() {
        return vec![VariantSize {
            width: orig_w,
            height: orig_h,
        }];
    }

    accepted
        .into_iter()
        .map(|width| {
            let ratio = width as f64 / orig_w as f64;
            VariantSize {
                width,
                height: ((orig_h as f64 * ratio).round() as u32).max(1),
            }
        })
        .collect()
}
