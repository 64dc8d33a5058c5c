//! Plain-text rendering of daemon answers for the terminal.
//!
//! Rendering stays deliberately simple: one line for the timer, a
//! horizontal bar chart per statistics series.

use std::fmt::Write as _;

use pomo_core::{Phase, Series, Statistics, TimerSettings, TimerView};
use pomo_protocol::DaemonMessage;

/// Widest bar in a chart, in characters.
const BAR_WIDTH: u32 = 30;

/// `Work  12:34  running  [13]  today: 3`
pub fn render_state(view: &TimerView) -> String {
    let phase = match view.phase {
        Phase::Work => "Work",
        Phase::Break => "Break",
    };
    let badge = if view.badge.text.is_empty() {
        String::new()
    } else {
        format!("  [{}]", view.badge.text)
    };

    format!(
        "{phase:<5}  {}  {:<7}{badge}  today: {}",
        view.clock_text(),
        view.run_state.as_str(),
        view.completed_pomodoros
    )
}

pub fn render_settings(settings: &TimerSettings) -> String {
    let on_off = |flag: bool| if flag { "on" } else { "off" };
    format!(
        "work: {} min\nbreak: {} min\nsound: {}\nnotification: {}\nauto-switch: {}",
        settings.durations.work_minutes,
        settings.durations.break_minutes,
        on_off(settings.sound_enabled),
        on_off(settings.notification_enabled),
        on_off(settings.auto_switch_enabled),
    )
}

/// Renders all three series, each under a heading with its total.
pub fn render_stats(stats: &Statistics) -> String {
    let mut out = String::new();
    for (title, series) in [
        ("Daily (last 30 days)", &stats.daily),
        ("Weekly (last 26 weeks)", &stats.weekly),
        ("Monthly (last 12 months)", &stats.monthly),
    ] {
        let _ = writeln!(out, "{title}: {} total", series.total());
        out.push_str(&render_series(series));
        out.push('\n');
    }
    out
}

/// One bar per bucket, scaled to the largest bucket.
pub fn render_series(series: &Series) -> String {
    let max = series.data.iter().copied().max().unwrap_or(0);
    let label_width = series.labels.iter().map(String::len).max().unwrap_or(0);

    let mut out = String::new();
    for (label, &count) in series.labels.iter().zip(&series.data) {
        let len = if max == 0 {
            0
        } else {
            // Non-zero counts always get at least one mark
            count.saturating_mul(BAR_WIDTH).div_ceil(max)
        };
        let bar = "#".repeat(usize::try_from(len).unwrap_or(0));
        let _ = writeln!(out, "  {label:>label_width$} {bar} {count}");
    }
    out
}

/// Text for a message received while watching, or `None` to stay quiet.
pub fn render_push(msg: &DaemonMessage) -> Option<String> {
    match msg {
        DaemonMessage::State(view) | DaemonMessage::TimerUpdate(view) => Some(render_state(view)),
        DaemonMessage::CompletedPomodorosUpdate { count } => {
            Some(format!("completed today: {count}"))
        }
        DaemonMessage::PhaseCompleted {
            completed, next, ..
        } => Some(format!("{completed} finished, {next} is next")),
        DaemonMessage::Error { message, code } => Some(match code {
            Some(code) => format!("error ({code}): {message}"),
            None => format!("error: {message}"),
        }),
        _ => None,
    }
}

/// True when a watcher should ring the terminal bell for this message.
pub fn wants_bell(msg: &DaemonMessage) -> bool {
    matches!(msg, DaemonMessage::PhaseCompleted { play_sound: true, .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pomo_core::{aggregate, CompletionRecord, DurationConfig, TimerSnapshot};

    fn running_view() -> TimerView {
        let mut snapshot = TimerSnapshot::new(&DurationConfig::default());
        snapshot.start(&DurationConfig::default());
        snapshot.seconds_remaining = 754;
        TimerView::new(&snapshot, 2)
    }

    #[test]
    fn test_render_state_running() {
        let text = render_state(&running_view());
        assert!(text.starts_with("Work"));
        assert!(text.contains("12:34"));
        assert!(text.contains("running"));
        assert!(text.contains("[13]"));
        assert!(text.ends_with("today: 2"));
    }

    #[test]
    fn test_render_state_stopped_has_no_badge() {
        let view = TimerView::new(&TimerSnapshot::new(&DurationConfig::default()), 0);
        let text = render_state(&view);
        assert!(text.contains("25:00"));
        assert!(!text.contains('['));
    }

    #[test]
    fn test_render_series_scales_bars() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let history = vec![
            CompletionRecord::on(today),
            CompletionRecord::on(today),
            CompletionRecord::on(yesterday),
        ];
        let stats = aggregate(&history, today);

        let text = render_series(&stats.daily);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 30);
        assert!(lines[29].trim_start().starts_with("03-09"));
        assert!(lines[29].contains(&"#".repeat(30)));
        assert!(lines[28].contains(&format!("{} 1", "#".repeat(15))));
        assert!(lines[0].ends_with(" 0"));
    }

    #[test]
    fn test_render_stats_has_totals() {
        let stats = aggregate(&[], NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        let text = render_stats(&stats);
        assert!(text.contains("Daily (last 30 days): 0 total"));
        assert!(text.contains("Monthly (last 12 months): 0 total"));
    }

    #[test]
    fn test_render_settings() {
        let mut settings = TimerSettings::default();
        settings.sound_enabled = false;
        let text = render_settings(&settings);
        assert!(text.contains("work: 25 min"));
        assert!(text.contains("sound: off"));
        assert!(text.contains("auto-switch: on"));
    }

    #[test]
    fn test_render_push() {
        let done = DaemonMessage::PhaseCompleted {
            completed: Phase::Work,
            next: Phase::Break,
            play_sound: true,
            show_notification: true,
        };
        assert_eq!(render_push(&done).as_deref(), Some("work finished, break is next"));
        assert!(wants_bell(&done));

        let coded = DaemonMessage::error_with_code("bad store", "tick_failed");
        assert_eq!(render_push(&coded).as_deref(), Some("error (tick_failed): bad store"));

        assert!(render_push(&DaemonMessage::pong(1)).is_none());
    }
}
