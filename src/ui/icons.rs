//! Shared UI icons, with plain-text fallbacks for terminals without emoji.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERROR] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN] ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[INFO] ");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "* ");
pub static AGENT: Emoji<'_, '_> = Emoji("🤖 ", "[AGENT] ");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "[CHECKPOINT] ");
pub static RECOVER: Emoji<'_, '_> = Emoji("🔄 ", "[RECOVERY] ");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "- ");
