//! Shared UI icons and emojis.
//!
//! This module provides common emoji constants used across the UI components
//! for consistent visual styling.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");

// Activity indicators
pub static GEAR: Emoji<'_, '_> = Emoji("🔧 ", "[RUN]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "[UP]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
