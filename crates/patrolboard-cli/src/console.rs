//! Terminal rendering of the scoreboard.
//!
//! Stands in for the physical LED board: each frame repaints the whole
//! state. Scores render as bars on a fixed-width axis; the countdown
//! renders as mm:ss.

use patrolboard_core::{DisplaySink, PatrolScore, RateLimitState};

/// Columns available for a score bar.
const BAR_WIDTH: usize = 48;
/// Score units represented by a full bar.
const BAR_CAPACITY: i64 = 240;

pub struct ConsoleDisplay;

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for ConsoleDisplay {
    fn render_scores(
        &self,
        patrols: &[PatrolScore],
        rate_limit: RateLimitState,
        realtime_connected: bool,
        score_offset: u32,
    ) {
        let link = if realtime_connected { "live" } else { "poll" };
        println!("── scores [{link}] [{rate_limit}] ──");
        if score_offset > 0 {
            println!("   (axis starts at {score_offset})");
        }
        for patrol in patrols {
            let windowed = (patrol.score - score_offset as i64).clamp(0, BAR_CAPACITY);
            let filled = (windowed as usize * BAR_WIDTH) / BAR_CAPACITY as usize;
            println!(
                "{:<16} {:>5} |{}{}|",
                patrol.name,
                patrol.score,
                "█".repeat(filled),
                " ".repeat(BAR_WIDTH - filled)
            );
        }
    }

    fn render_countdown(&self, remaining_seconds: u32, paused: bool) {
        let suffix = if paused { " (paused)" } else { "" };
        println!(
            "── timer {:02}:{:02}{suffix} ──",
            remaining_seconds / 60,
            remaining_seconds % 60
        );
    }
}
