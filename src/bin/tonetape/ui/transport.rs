//! Transport bar - sequencer phase, context state, playback queue, levels

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use tonetape::{
    dsp::{amplify::gain_to_db, mix},
    ContextState, SequencerPhase, SequencerStatus,
};

const SILENCE_DB: f32 = -60.0;

pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self {
            peak: mix::peak(buffer),
            rms,
        }
    }

    /// Silence floors at -60 dB
    pub fn peak_db(&self) -> f32 {
        gain_to_db(self.peak).max(SILENCE_DB)
    }

    pub fn rms_db(&self) -> f32 {
        gain_to_db(self.rms).max(SILENCE_DB)
    }
}

pub fn render_transport(
    frame: &mut Frame,
    area: Rect,
    status: &SequencerStatus,
    audio_stats: &AudioStats,
) {
    let block = Block::default().title(" tonetape ").borders(Borders::ALL);

    let (symbol, color) = match status.phase {
        SequencerPhase::Idle => ("■", Color::Yellow),
        SequencerPhase::Recording => ("●", Color::Red),
        SequencerPhase::Finalizing => ("…", Color::Blue),
    };
    let context_color = match status.context {
        ContextState::Running => Color::Green,
        ContextState::Suspended => Color::Yellow,
        ContextState::Closed => Color::DarkGray,
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} {}  ", symbol, status.phase),
            Style::default().fg(color),
        ),
        Span::styled(
            format!("audio: {}  ", status.context),
            Style::default().fg(context_color),
        ),
        Span::styled(
            format!(
                "queued: {}  playing: {}  ",
                status.pending_playbacks, status.active_playbacks
            ),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!(
                "takes: {}/{}  ",
                status.stats.artifacts_produced, status.stats.recordings_started
            ),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!(
                "Peak: {:.1} dB  RMS: {:.1} dB",
                audio_stats.peak_db(),
                audio_stats.rms_db()
            ),
            Style::default().fg(Color::Magenta),
        ),
    ]);

    frame.render_widget(Paragraph::new(line).block(block), area);
}
