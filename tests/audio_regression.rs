use tonetape::{
    tone::ToneConfig, AudioContext, EngineConfig, EngineError, ToneError, ToneSource, ToneState,
};

fn engine(sample_rate: u32) -> EngineConfig {
    EngineConfig::default()
        .with_sample_rate(sample_rate)
        .with_channels(1)
}

fn zero_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|pair| pair[0].signum() != pair[1].signum())
        .count()
}

#[test]
fn default_tone_is_a_quiet_440hz_square() {
    let ctx = AudioContext::new(engine(48_000));
    ctx.resume().unwrap();
    let mut tone = ToneSource::new(&ctx, &ToneConfig::default()).unwrap();
    tone.start().unwrap();

    let out = ctx.render_offline(48_000);

    assert!(out.iter().all(|s| (s.abs() - 0.1).abs() < 1e-6));
    // Two crossings per cycle
    let crossings = zero_crossings(&out);
    assert!((878..=881).contains(&crossings), "crossings = {crossings}");
    let mean = out.iter().sum::<f32>() / out.len() as f32;
    assert!(mean.abs() < 1e-3);
}

#[test]
fn device_render_copies_the_tone_to_every_channel() {
    let ctx = AudioContext::new(EngineConfig::default().with_sample_rate(48_000));
    ctx.resume().unwrap();
    let mut tone = ToneSource::new(&ctx, &ToneConfig::default()).unwrap();
    tone.start().unwrap();

    let mut data = vec![0.0f32; 4_096 * 2];
    ctx.render(&mut data);
    for frame in data.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
        assert!((frame[0].abs() - 0.1).abs() < 1e-6);
    }
}

#[test]
fn stopped_tone_stays_silent() {
    let ctx = AudioContext::new(engine(8_000));
    ctx.resume().unwrap();
    let mut tone = ToneSource::new(&ctx, &ToneConfig::default()).unwrap();
    tone.start().unwrap();
    assert!(ctx.render_offline(800).iter().any(|&s| s != 0.0));

    tone.stop().unwrap();
    assert_eq!(tone.start(), Err(ToneError::AlreadyStarted));
    assert_eq!(tone.stop(), Err(ToneError::AlreadyStopped));
    assert_eq!(tone.state(), ToneState::Stopped);

    for _ in 0..4 {
        assert!(ctx.render_offline(800).iter().all(|&s| s == 0.0));
    }
    assert!(!ctx.has_source(tone.source_id()));
}

#[test]
fn resume_is_idempotent() {
    let once = AudioContext::new(engine(8_000));
    let many = AudioContext::new(engine(8_000));

    assert_eq!(once.resume(), Ok(true));
    assert_eq!(many.resume(), Ok(true));
    for _ in 0..5 {
        assert_eq!(many.resume(), Ok(false));
    }

    let mut a = ToneSource::new(&once, &ToneConfig::default()).unwrap();
    let mut b = ToneSource::new(&many, &ToneConfig::default()).unwrap();
    a.start().unwrap();
    b.start().unwrap();

    let first = once.render_offline(1_000);
    many.resume().unwrap();
    let second = many.render_offline(1_000);
    assert_eq!(first, second);
    assert_eq!(once.current_time(), many.current_time());
}

#[test]
fn closed_context_cannot_resume() {
    let ctx = AudioContext::new(engine(8_000));
    ctx.resume().unwrap();
    assert!(ctx.close());
    assert!(!ctx.close());
    assert_eq!(ctx.resume(), Err(EngineError::Closed));
    assert!(ctx.render_offline(64).iter().all(|&s| s == 0.0));
}
