//! Integration tests for sondeo-analysis pipelines.
//!
//! Graphs are built from option maps the way a config file would describe
//! them and driven through the processing manager or the orchestrator with
//! synthetic signals.

use std::f32::consts::PI;
use std::f64::consts::FRAC_1_SQRT_2;
use std::time::{Duration, Instant};

use sondeo_analysis::{
    Channel, ChannelLayout, ChannelMixer, HandlerDefinition, HandlerKind, HandlerState,
    OptionMap, Orchestrator, OrchestratorParams, ParamsVersion, ProcessingDefinition,
    ProcessingManager, SampleData, SampleFormat, WaveFormat, parse_bands,
};
use sondeo_core::{FilterDescription, FilterStage, attack_decay_constant};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const RATE: u32 = 48000;

fn sine(freq_hz: f32, num_samples: usize, amplitude: f32) -> Vec<f32> {
    (0..num_samples)
        .map(|i| amplitude * (2.0 * PI * freq_hz * i as f32 / RATE as f32).sin())
        .collect()
}

fn handler(name: &str, kind: HandlerKind, options: &[(&str, &str)]) -> HandlerDefinition {
    handler_version(name, kind, options, ParamsVersion::CURRENT)
}

fn handler_version(
    name: &str,
    kind: HandlerKind,
    options: &[(&str, &str)],
    version: ParamsVersion,
) -> HandlerDefinition {
    let mut map = OptionMap::new();
    for (key, value) in options {
        map.insert(key, *value);
    }
    HandlerDefinition::parse(name, kind, &map, version).unwrap()
}

fn processing(handlers: Vec<HandlerDefinition>) -> ProcessingDefinition {
    ProcessingDefinition::new(
        vec![Channel::Auto],
        0,
        &FilterDescription::default(),
        ParamsVersion::CURRENT,
        handlers,
    )
    .unwrap()
}

fn spectrum_chain(fft_size: &str) -> Vec<HandlerDefinition> {
    vec![
        handler(
            "fft",
            HandlerKind::Fft,
            &[("size", fft_size), ("overlap", "0.5"), ("cascadesCount", "3")],
        ),
        handler(
            "bands",
            HandlerKind::BandResampler,
            &[("source", "fft"), ("bands", "log 16 50 8000")],
        ),
        handler(
            "cascade",
            HandlerKind::BandCascadeTransformer,
            &[("source", "bands")],
        ),
        handler(
            "blur",
            HandlerKind::UniformBlur,
            &[("source", "cascade"), ("radius", "4")],
        ),
        handler(
            "db",
            HandlerKind::SingleValueTransformer,
            &[("source", "blur"), ("transform", "db, map -60 0 0 1, clamp")],
        ),
    ]
}

fn mono_mixer(wave: &[f32]) -> ChannelMixer {
    let mut mixer = ChannelMixer::new();
    mixer.set_format(&mono_format());
    mixer.decompose(SampleData::F32(wave));
    mixer
}

fn mono_format() -> WaveFormat {
    WaveFormat {
        sample_rate: RATE,
        format: SampleFormat::F32,
        layout: ChannelLayout::mono(),
    }
}

fn later() -> Instant {
    Instant::now() + Duration::from_secs(3600)
}

fn rms_with_filter(filter: &FilterDescription, target_rate: u32) -> ProcessingManager {
    let definition = ProcessingDefinition::new(
        vec![Channel::Auto],
        target_rate,
        filter,
        ParamsVersion::CURRENT,
        vec![handler("rms", HandlerKind::BlockRms, &[("updateInterval", "100")])],
    )
    .unwrap();
    let mut manager = ProcessingManager::new("main");
    manager.set_params(definition, &ChannelLayout::mono(), RATE);
    manager
}

// RMS of the last 100 ms of one second of a unit sine.
fn filtered_rms(filter: &FilterDescription, target_rate: u32, freq_hz: f32) -> f32 {
    let mut manager = rms_with_filter(filter, target_rate);
    for block in sine(freq_hz, RATE as usize, 1.0).chunks(480) {
        assert!(manager.process(&mono_mixer(block), later()));
    }
    manager.nodes(Channel::Auto)[0].output().last_data(0)[0]
}

fn orchestrator(handlers: Vec<HandlerDefinition>) -> Orchestrator {
    let mut params = OrchestratorParams {
        compute_timeout: Duration::from_secs(60),
        finish_timeout: Duration::from_secs(60),
        ..OrchestratorParams::default()
    };
    params.processings.insert("main".into(), processing(handlers));
    let mut orchestrator = Orchestrator::new(params);
    orchestrator.set_format(mono_format());
    orchestrator
}

// ===========================================================================
// 1. Reconfiguration
// ===========================================================================

#[test]
fn unchanged_params_keep_shape_and_state() {
    let mut manager = ProcessingManager::new("main");
    let layout = ChannelLayout::mono();
    manager.set_params(processing(spectrum_chain("1024")), &layout, RATE);
    let sizes: Vec<_> = manager
        .nodes(Channel::Auto)
        .iter()
        .map(|n| n.data_size().clone())
        .collect();

    manager.process(&mono_mixer(&sine(1000.0, 4096, 0.5)), later());
    manager.set_params(processing(spectrum_chain("1024")), &layout, RATE);

    for (node, size) in manager.nodes(Channel::Auto).iter().zip(&sizes) {
        assert_eq!(node.state(), HandlerState::Configured, "{}", node.name());
        assert_eq!(node.data_size(), size);
        assert_eq!(node.configure_count(), 1, "{} reconfigured", node.name());
    }
}

#[test]
fn legacy_smoothing_change_keeps_state() {
    let rms = |decay: &str| {
        handler_version(
            "rms",
            HandlerKind::BlockRms,
            &[("updateInterval", "10"), ("attack", "0"), ("decay", decay)],
            ParamsVersion::LEGACY,
        )
    };
    let legacy = |handlers: Vec<HandlerDefinition>| {
        ProcessingDefinition::new(
            vec![Channel::Auto],
            0,
            &FilterDescription::default(),
            ParamsVersion::LEGACY,
            handlers,
        )
        .unwrap()
    };

    let mut manager = ProcessingManager::new("main");
    let layout = ChannelLayout::mono();
    manager.set_params(legacy(vec![rms("200")]), &layout, RATE);
    assert!(manager.process(&mono_mixer(&[1.0; 480]), later()));

    manager.set_params(legacy(vec![rms("100")]), &layout, RATE);
    let node = &manager.nodes(Channel::Auto)[0];
    assert_eq!(node.state(), HandlerState::Configured);
    assert_eq!(node.configure_count(), 1);
    assert!((node.output().last_data(0)[0] - 1.0).abs() < 1e-6);

    // decays from the held value with the new time
    assert!(manager.process(&mono_mixer(&[0.0; 480]), later()));
    let k = attack_decay_constant(0.1, RATE, 480) as f32;
    let value = manager.nodes(Channel::Auto)[0].output().last_data(0)[0];
    assert!((value - k).abs() < 1e-5, "{value} vs {k}");
}

#[test]
fn source_change_propagates_downstream() {
    let mut manager = ProcessingManager::new("main");
    let layout = ChannelLayout::mono();
    manager.set_params(processing(spectrum_chain("1024")), &layout, RATE);
    manager.set_params(processing(spectrum_chain("2048")), &layout, RATE);

    for node in manager.nodes(Channel::Auto) {
        assert_eq!(node.configure_count(), 2, "{} was not reconfigured", node.name());
        assert_eq!(node.changed_at(), manager.generation());
    }
}

#[test]
fn sample_rate_change_reconfigures_everything() {
    let mut manager = ProcessingManager::new("main");
    let layout = ChannelLayout::mono();
    manager.set_params(processing(spectrum_chain("1024")), &layout, RATE);
    manager.set_params(processing(spectrum_chain("1024")), &layout, 44100);
    for node in manager.nodes(Channel::Auto) {
        assert_eq!(node.configure_count(), 2);
    }
}

#[test]
fn invalid_handler_poisons_only_its_dependents() {
    let mut manager = ProcessingManager::new("main");
    let handlers = vec![
        handler("rms", HandlerKind::BlockRms, &[]),
        // a band resampler needs an FFT source
        handler(
            "bands",
            HandlerKind::BandResampler,
            &[("source", "rms"), ("bands", "linear 4 100 1000")],
        ),
        handler("after", HandlerKind::SingleValueTransformer, &[("source", "bands")]),
    ];
    let invalid = manager.set_params(processing(handlers), &ChannelLayout::mono(), RATE);
    assert_eq!(invalid, 2);

    let states: Vec<_> = manager.nodes(Channel::Auto).iter().map(|n| n.state()).collect();
    assert_eq!(
        states,
        [HandlerState::Configured, HandlerState::Invalid, HandlerState::Invalid]
    );
}

// ===========================================================================
// 2. Pre-filter and downsampling
// ===========================================================================

#[test]
fn target_rate_sets_divider() {
    let none = FilterDescription::default();
    for (target, rate) in [(0, 48000), (44100, 48000), (16000, 16000)] {
        let manager = rms_with_filter(&none, target);
        assert_eq!(manager.sample_rate(), rate, "target {target}");
        // 100 ms blocks at the effective rate
        let node = &manager.nodes(Channel::Auto)[0];
        assert_eq!(node.data_size().equivalent_wave_sizes, [rate as usize / 10]);
    }
    // floor(48000 / 20000) = 2
    assert_eq!(rms_with_filter(&none, 20000).sample_rate(), 24000);
}

#[test]
fn low_pass_attenuates_same_with_downsampling() {
    let low_pass = FilterDescription::Stages(vec![FilterStage::BqLowPass {
        q: FRAC_1_SQRT_2,
        freq: 1000.0,
        forced_gain: 0.0,
    }]);
    let full = filtered_rms(&low_pass, 0, 1500.0);
    let down = filtered_rms(&low_pass, 24000, 1500.0);
    // an unfiltered unit sine reads 0.707
    assert!(full < 0.35, "full = {full}");
    assert!((full - down).abs() < 0.05, "full = {full}, downsampled = {down}");
}

#[test]
fn downsampled_unfiltered_level_is_preserved() {
    let none = FilterDescription::default();
    let full = filtered_rms(&none, 0, 1000.0);
    let down = filtered_rms(&none, 16000, 1000.0);
    assert!((full - FRAC_1_SQRT_2 as f32).abs() < 1e-3, "full = {full}");
    assert!((full - down).abs() < 0.02, "full = {full}, downsampled = {down}");
}

#[test]
fn like_a_preset_cuts_low_frequencies() {
    let like_a = FilterDescription::Preset("like-a".into());
    let low = filtered_rms(&like_a, 0, 50.0);
    let mid = filtered_rms(&like_a, 0, 1000.0);
    // the preset gain lifts the pass band above the unfiltered level
    assert!(mid > 0.75, "1 kHz = {mid}");
    assert!(low < 0.2 * mid, "50 Hz = {low}, 1 kHz = {mid}");
}

#[test]
fn like_d_preset_lifts_presence_band() {
    let like_a = FilterDescription::Preset("like-a".into());
    let like_d = FilterDescription::Preset("like-d".into());
    assert!(filtered_rms(&like_d, 0, 50.0) < 0.2 * filtered_rms(&like_d, 0, 1000.0));

    // +5.5 dB peak at 6 kHz
    let a = filtered_rms(&like_a, 0, 6000.0);
    let d = filtered_rms(&like_d, 0, 6000.0);
    assert!(d > 1.5 * a, "like-d = {d}, like-a = {a}");
}

#[test]
fn unknown_preset_is_rejected() {
    let result = ProcessingDefinition::new(
        vec![Channel::Auto],
        0,
        &FilterDescription::Preset("like-z".into()),
        ParamsVersion::CURRENT,
        Vec::new(),
    );
    assert!(result.is_err());
}

// ===========================================================================
// 3. Deadlines
// ===========================================================================

#[test]
fn past_deadline_holds_previous_values() {
    let mut manager = ProcessingManager::new("main");
    manager.set_params(processing(spectrum_chain("512")), &ChannelLayout::mono(), RATE);
    assert!(manager.process(&mono_mixer(&sine(1000.0, 4096, 0.5)), later()));

    let before: Vec<Vec<Vec<f32>>> = manager
        .nodes(Channel::Auto)
        .iter()
        .map(|n| {
            (0..n.data_size().layers_count)
                .map(|l| n.output().last_data(l).to_vec())
                .collect()
        })
        .collect();

    assert!(!manager.process(&mono_mixer(&sine(3000.0, 4096, 0.9)), Instant::now()));

    for (node, layers) in manager.nodes(Channel::Auto).iter().zip(&before) {
        for (layer, values) in layers.iter().enumerate() {
            assert_eq!(node.output().chunk_count(layer), 0);
            assert_eq!(node.output().last_data(layer), values.as_slice(), "{}", node.name());
        }
    }
}

// ===========================================================================
// 4. Scenarios
// ===========================================================================

#[test]
fn fft_peaks_at_bin_aligned_sine() {
    let mut manager = ProcessingManager::new("main");
    let handlers = vec![handler(
        "fft",
        HandlerKind::Fft,
        &[("size", "1024"), ("overlap", "0"), ("cascadesCount", "1"), ("window", "none")],
    )];
    manager.set_params(processing(handlers), &ChannelLayout::mono(), RATE);

    // bin 32 of a 1024-point transform at 48 kHz
    let freq = 32.0 * RATE as f32 / 1024.0;
    assert!(manager.process(&mono_mixer(&sine(freq, 1024, 1.0)), later()));

    let fft = &manager.nodes(Channel::Auto)[0];
    let values = fft.output().last_data(0);
    assert_eq!(values.len(), 512);
    let peak = values
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(peak, 32);
    assert!(values[0].abs() < 1e-3, "dc = {}", values[0]);
}

#[test]
fn linear_bands_have_expected_boundaries() {
    let freqs = parse_bands("linear 4 100 1000").unwrap();
    assert_eq!(freqs, [100.0, 325.0, 550.0, 775.0, 1000.0]);
}

#[test]
fn silent_block_emits_single_zero() {
    let mut orchestrator = orchestrator(vec![handler(
        "rms",
        HandlerKind::BlockRms,
        &[("updateInterval", "10")],
    )]);
    assert!(orchestrator.process_silence(480));

    let manager = orchestrator.manager("main").unwrap();
    let rms = &manager.nodes(Channel::Auto)[0];
    assert_eq!(rms.output().chunk_count(0), 1);
    assert_eq!(rms.output().last_data(0), &[0.0]);
}

#[test]
fn silence_decays_smoothly() {
    let rms = handler_version(
        "rms",
        HandlerKind::BlockRms,
        &[("updateInterval", "10"), ("attack", "0"), ("decay", "200")],
        ParamsVersion::LEGACY,
    );
    let mut orchestrator = orchestrator(vec![rms]);
    let snapshot = orchestrator.snapshot();

    assert!(orchestrator.process_buffer(SampleData::F32(&[1.0; 480])));
    let mut previous = snapshot.value("main", Channel::Auto, "rms", 0);
    assert!((previous - 1.0).abs() < 1e-6);

    let k = attack_decay_constant(0.2, RATE, 480);
    for _ in 0..20 {
        assert!(orchestrator.process_silence(480));
        let value = snapshot.value("main", Channel::Auto, "rms", 0);
        assert!(value < previous);
        assert!((value - previous * k).abs() < 1e-5, "{value} vs {}", previous * k);
        previous = value;
    }
}

#[test]
fn silence_decays_smoothly_with_transform_filter() {
    let mut orchestrator = orchestrator(vec![handler(
        "rms",
        HandlerKind::BlockRms,
        &[("updateInterval", "10"), ("transform", "filter 0 200")],
    )]);
    let snapshot = orchestrator.snapshot();

    assert!(orchestrator.process_buffer(SampleData::F32(&[1.0; 480])));
    let mut previous = snapshot.value("main", Channel::Auto, "rms", 0);
    assert!((previous - 1.0).abs() < 1e-6);

    let k = attack_decay_constant(0.2, RATE, 480);
    for _ in 0..20 {
        assert!(orchestrator.process_silence(480));
        let value = snapshot.value("main", Channel::Auto, "rms", 0);
        assert!(value < previous);
        assert!((value - previous * k).abs() < 1e-5, "{value} vs {}", previous * k);
        previous = value;
    }
}

#[test]
fn spectrum_chain_produces_bounded_values() {
    let mut orchestrator = orchestrator(spectrum_chain("1024"));
    let snapshot = orchestrator.snapshot();
    let wave = sine(1000.0, 48000, 0.5);
    for block in wave.chunks(480) {
        assert!(orchestrator.process_buffer(SampleData::F32(block)));
    }

    let guard = snapshot.lock();
    let db = guard.handler("main", Channel::Auto, "db").unwrap();
    assert_eq!(db.values.columns(), 16);
    for band in 0..16 {
        let value = db.value(band);
        assert!((0.0..=1.0).contains(&value), "band {band} = {value}");
    }

    let mut bands = String::new();
    assert!(guard.prop("main", Channel::Auto, "bands", "bands count", &mut bands));
    assert_eq!(bands, "16");
}
