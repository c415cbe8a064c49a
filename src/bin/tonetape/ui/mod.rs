//! TUI for tonetape
//!
//! Shows the sequencer phase, a scope of the output, and the last error.

mod transport;
mod waveform;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};
use rtrb::Consumer;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

use tonetape::{tone::ToneConfig, ContextState, SequencerError, SequencerHandle, SequencerStatus};

use transport::{render_transport, AudioStats};
use waveform::render_waveform;

/// Audio visualization buffer size
const VIS_BUFFER_SIZE: usize = 1024;

pub struct UiApp {
    sequencer: SequencerHandle,
    runtime: Handle,
    audio_rx: Consumer<f32>,
    audio_buffer: Vec<f32>,
    status: SequencerStatus,
    tone: ToneConfig,
    message: Option<String>,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        sequencer: SequencerHandle,
        runtime: Handle,
        audio_rx: Consumer<f32>,
        tone: ToneConfig,
    ) -> Self {
        let status = sequencer.status();
        Self {
            sequencer,
            runtime,
            audio_rx,
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],
            status,
            tone,
            message: None,
            should_quit: false,
        }
    }

    pub fn run(mut self, mut terminal: DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_audio();
            self.status = self.sequencer.status();

            terminal.draw(|frame| self.render(frame))?;

            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }

    /// Keep the last VIS_BUFFER_SIZE samples from the scope ring
    fn poll_audio(&mut self) {
        let available = self.audio_rx.slots();
        if available == 0 {
            return;
        }
        if let Ok(chunk) = self.audio_rx.read_chunk(available) {
            self.audio_buffer.extend(chunk);
        }
        if self.audio_buffer.len() > VIS_BUFFER_SIZE {
            let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
            self.audio_buffer.drain(0..excess);
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        if matches!(key, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc) {
            self.should_quit = true;
            return;
        }

        // Any key press counts as the gesture that unlocks audio
        if self.status.context == ContextState::Suspended {
            let result = self.runtime.block_on(self.sequencer.resume()).map(|_| ());
            self.report(result);
        }

        let result = match key {
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.runtime.block_on(self.sequencer.start_recording())
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.runtime.block_on(self.sequencer.stop_recording())
            }
            _ => return,
        };
        self.report(result);
    }

    fn report(&mut self, result: Result<(), SequencerError>) {
        match result {
            Ok(()) => self.message = None,
            Err(err) => {
                debug!(%err, "command failed");
                self.message = Some(err.to_string());
            }
        }
    }

    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Transport bar
                Constraint::Min(8),    // Waveform
                Constraint::Length(1), // Message
                Constraint::Length(1), // Help bar
            ])
            .split(frame.area());

        let stats = AudioStats::from_buffer(&self.audio_buffer);
        render_transport(frame, chunks[0], &self.status, &stats);
        render_waveform(frame, chunks[1], &self.audio_buffer, &self.tone);

        let message = self
            .message
            .as_deref()
            .map(str::to_owned)
            .or_else(|| {
                self.status
                    .last_failure
                    .as_ref()
                    .map(|err| format!("last capture failed: {err}"))
            })
            .unwrap_or_default();
        frame.render_widget(
            Paragraph::new(format!(" {message}")).style(Style::default().fg(Color::Red)),
            chunks[2],
        );

        let help = if self.status.context == ContextState::Suspended {
            " Press any key to enable audio  [Q] Quit"
        } else {
            " [R] Record  [S] Stop  [Q] Quit"
        };
        frame.render_widget(
            Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
            chunks[3],
        );
    }
}
