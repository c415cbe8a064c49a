//! Tonetape - wires the device, the audio context and the sequencer

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use rtrb::RingBuffer;
use tracing::{info, warn};

use tonetape::{io::OutputDevice, AudioContext, Sequencer, SequencerService, TonetapeConfig};

use super::ui::UiApp;

/// Scope ring capacity in samples
const SCOPE_CAPACITY: usize = 1024 * 16;

pub struct Tonetape {
    config: TonetapeConfig,
}

impl Tonetape {
    pub fn new(config: TonetapeConfig) -> Self {
        Self { config }
    }

    /// Run until the user quits
    pub fn run(self) -> EyreResult<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .wrap_err("failed to build tokio runtime")?;

        let device = OutputDevice::open_default()?;
        let config = self.config.with_engine(device.engine_config());
        info!(?config, "starting");

        // The context starts suspended; the first key press resumes it
        let context = AudioContext::new(config.engine.clone());
        let (scope_tx, scope_rx) = RingBuffer::<f32>::new(SCOPE_CAPACITY);
        let _stream = device.start(context.clone(), Some(scope_tx))?;

        let tone = config.tone.clone();
        let (handle, task) = {
            let _guard = runtime.enter();
            let sequencer = Sequencer::new(context, config)?;
            SequencerService::spawn(sequencer)
        };

        let terminal = ratatui::init();
        let result =
            UiApp::new(handle.clone(), runtime.handle().clone(), scope_rx, tone).run(terminal);
        ratatui::restore();

        runtime.block_on(async {
            if let Err(err) = handle.shutdown().await {
                warn!(%err, "sequencer already stopped");
            }
            if let Err(err) = task.await {
                warn!(%err, "sequencer task failed");
            }
        });
        result
    }
}
