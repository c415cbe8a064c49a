//! Scope widget

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

use tonetape::tone::ToneConfig;

/// Headroom above the tone's peak
const SCOPE_HEADROOM: f64 = 1.25;

/// Y bound for a tone of `gain`
fn scope_range(gain: f32) -> f64 {
    (gain.abs() as f64 * SCOPE_HEADROOM).max(0.01)
}

/// Plot the scope ring, scaled so the configured tone fills most of the height
pub fn render_waveform(
    frame: &mut Frame,
    area: Rect,
    audio_buffer: &[f32],
    tone: &ToneConfig,
) {
    let title = format!(" Output: {:?} {} Hz ", tone.waveform, tone.frequency);
    let block = Block::default().title(title).borders(Borders::ALL);
    let range = scope_range(tone.gain);

    let len = audio_buffer.len().max(1) as f64;
    let data: Vec<(f64, f64)> = audio_buffer
        .iter()
        .enumerate()
        .map(|(i, &sample)| (i as f64 / len, sample as f64))
        .collect();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([-range, range])
                .labels(vec![
                    format!("{:.2}", -range),
                    "0".to_string(),
                    format!("{range:.2}"),
                ])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
