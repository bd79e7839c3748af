//! Emoji used by the terminal client, with plain-text fallbacks.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("\u{2705} ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("\u{274C} ", "[ERR]");
pub static RUNNING: Emoji<'_, '_> = Emoji("\u{25B6}\u{FE0F}  ", "[>]");
pub static ROCKET: Emoji<'_, '_> = Emoji("\u{1F680} ", "*");
