//! Font used for plot text, embedded so drawing needs no system fonts.

use std::sync::OnceLock;

use plotters::style::{FontStyle, register_font};

const FAMILY: &str = "sans-serif";
static SANS_SERIF: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Register the embedded font as `sans-serif`, the family plotters uses for
/// axis labels and legends. Returns `false` if the font data is unusable.
pub(crate) fn ensure_registered() -> bool {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    *REGISTERED.get_or_init(|| register_font(FAMILY, FontStyle::Normal, SANS_SERIF).is_ok())
}

#[cfg(test)]
mod test {
    use plotters::style::IntoFont;

    use super::{FAMILY, ensure_registered};

    #[test]
    fn test_embedded_font_measures_text() {
        assert!(ensure_registered());
        let (width, height) = (FAMILY, 12).into_font().box_size("TSNE0").unwrap();
        assert!(width > 0 && height > 0);
    }
}
