// Helpers shared by the font-dependent tests

use batchmark::watermark::FontRegistry;

/// Set to make tests that need a system font fail instead of skipping.
pub const REQUIRE_FONTS_ENV: &str = "BATCHMARK_REQUIRE_FONTS";

fn fonts_required() -> bool {
    std::env::var_os(REQUIRE_FONTS_ENV).is_some_and(|value| !value.is_empty() && value != "0")
}

/// System fonts, or `None` when there are none and the caller should skip.
///
/// Panics instead of skipping when `BATCHMARK_REQUIRE_FONTS` is set, so CI
/// hosts with fonts installed cannot silently pass without rendering text.
pub fn system_fonts() -> Option<FontRegistry> {
    let fonts = FontRegistry::discover_system();
    if !fonts.is_empty() {
        return Some(fonts);
    }
    if fonts_required() {
        panic!("{} is set but no system font was found", REQUIRE_FONTS_ENV);
    }
    eprintln!("no system font found, skipping (set {} to fail instead)", REQUIRE_FONTS_ENV);
    None
}
