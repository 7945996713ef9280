//! Shared UI icons and emojis.
//!
//! Each icon falls back to plain ASCII on terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Job states
pub static PENDING: Emoji<'_, '_> = Emoji("⏳ ", "[.]");
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static UNKNOWN: Emoji<'_, '_> = Emoji("❔ ", "[?]");

// Sections
pub static REPO: Emoji<'_, '_> = Emoji("📁 ", "");
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[STATS]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static CHAT: Emoji<'_, '_> = Emoji("💬 ", "[CHAT]");
pub static AGENT: Emoji<'_, '_> = Emoji("🤖 ", "[AGENT]");
pub static PULL_REQUEST: Emoji<'_, '_> = Emoji("🔀 ", "[PR]");
