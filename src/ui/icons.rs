//! Shared icons for board rendering.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");

pub static BOARD: Emoji<'_, '_> = Emoji("📋 ", "#");
pub static LIST: Emoji<'_, '_> = Emoji("🗂️  ", "==");
pub static COMMENT: Emoji<'_, '_> = Emoji("💬 ", "c:");
pub static PEOPLE: Emoji<'_, '_> = Emoji("👥 ", "u:");

pub static LIVE: Emoji<'_, '_> = Emoji("🟢 ", "[LIVE]");
pub static OFFLINE: Emoji<'_, '_> = Emoji("🔴 ", "[OFF]");
pub static RETRY: Emoji<'_, '_> = Emoji("🔄 ", "[RETRY]");
