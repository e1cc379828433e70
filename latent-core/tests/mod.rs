use latent_core::arena::{Arena, BufferBridge, BufferRegion, ElementType, HeapArena};
use latent_core::controls::{Control, SliderDefaults, SliderGroup, SliderRange};
use latent_core::engine::InferenceEngine;
use latent_core::pixels::RecordingSink;
use latent_core::scheduler::{Event, EventQueue, Outcome, SchedulerState, SessionContext};
use latent_core::{
    BlendPolicy, BridgeError, ControlId, DeploymentProfile, ImageSize, LatentVector,
    PatternEngine, PixelFrame, RenderTarget, SequenceGenerator, SequenceParams, SharedScheduler,
    UpdateScheduler, linear_blend, magnitude_preserving_blend,
};

use anyhow::{Result, bail};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

const ARENA_BYTES: usize = 64 * 1024;

// ============================================================================
// Test engines
// ============================================================================

/// Writes each latent component into the frame, so distinct vectors give
/// distinct frames.
#[derive(Debug, Default)]
struct EchoEngine {
    predicts: usize,
    trains: usize,
    fail_predict: bool,
}

fn echo_into(arena: &mut HeapArena, input: &BufferRegion, output: &BufferRegion) -> Result<()> {
    let start = input.offset() as usize;
    let latent: Vec<f64> = arena.bytes()[start..start + input.byte_len()]
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect();
    let out = output.slice_mut(arena.bytes_mut())?;
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (latent[i % latent.len()] * 100.0 + 50.0) as u8;
    }
    Ok(())
}

impl InferenceEngine for EchoEngine {
    type Arena = HeapArena;

    fn predict(
        &mut self,
        arena: &mut HeapArena,
        input: &BufferRegion,
        output: &BufferRegion,
    ) -> Result<()> {
        if self.fail_predict {
            bail!("engine exploded");
        }
        self.predicts += 1;
        echo_into(arena, input, output)
    }

    fn train(&mut self, _arena: &mut HeapArena) -> Result<()> {
        self.trains += 1;
        Ok(())
    }
}

fn echo_scheduler(profile: DeploymentProfile) -> UpdateScheduler<EchoEngine, RecordingSink> {
    UpdateScheduler::new(
        profile,
        HeapArena::with_capacity(ARENA_BYTES),
        EchoEngine::default(),
        RecordingSink::new(),
    )
    .unwrap()
}

fn pattern_scheduler(profile: DeploymentProfile) -> UpdateScheduler<PatternEngine, RecordingSink> {
    let engine = PatternEngine::new(profile.image);
    UpdateScheduler::new(
        profile,
        HeapArena::with_capacity(ARENA_BYTES),
        engine,
        RecordingSink::new(),
    )
    .unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    let tol = 1e-9 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// BufferBridge Tests
// ============================================================================

#[test]
fn test_allocate_bytes_is_zeroed_and_exact() {
    let mut arena = HeapArena::with_capacity(128);
    arena.bytes_mut().fill(0xAB);
    let mut bridge = BufferBridge::new(arena);

    let region = bridge.allocate(27, ElementType::Byte).unwrap();
    assert_eq!(region.byte_len(), 27);
    assert_eq!(region.len(), 27);
    assert!(bridge.bytes(&region).unwrap().iter().all(|b| *b == 0));
}

#[test]
fn test_allocate_float64_is_eight_bytes_per_element() {
    let mut arena = HeapArena::with_capacity(256);
    arena.bytes_mut().fill(0xFF);
    let mut bridge = BufferBridge::new(arena);

    let region = bridge.allocate(10, ElementType::Float64).unwrap();
    assert_eq!(region.byte_len(), 80);
    assert_eq!(region.offset() % 8, 0);
    assert_eq!(bridge.floats(&region).unwrap().to_vec(), vec![0.0; 10]);
}

#[test]
fn test_regions_do_not_overlap() {
    let mut bridge = BufferBridge::new(HeapArena::with_capacity(256));
    let bytes = bridge.allocate(3, ElementType::Byte).unwrap();
    let floats = bridge.allocate(2, ElementType::Float64).unwrap();

    assert!(floats.offset() as usize >= bytes.offset() as usize + bytes.byte_len());
    assert_eq!(floats.offset() % 8, 0);
    assert_eq!(bridge.regions(), &[bytes, floats]);
}

#[test]
fn test_allocation_failure_when_arena_full() {
    let mut bridge = BufferBridge::new(HeapArena::with_capacity(16));
    let err = bridge.allocate(10, ElementType::Float64).unwrap_err();
    assert!(matches!(err, BridgeError::AllocationFailure { requested: 80, .. }));
}

#[test]
fn test_view_is_reused_by_overwrite() {
    let mut bridge = BufferBridge::new(HeapArena::with_capacity(256));
    let region = bridge.allocate(3, ElementType::Float64).unwrap();

    bridge.floats_mut(&region).unwrap().copy_from(&[1.0, 2.0, 3.0]).unwrap();
    bridge.floats_mut(&region).unwrap().copy_from(&[4.0, 5.0, 6.0]).unwrap();

    assert_eq!(bridge.floats(&region).unwrap().to_vec(), vec![4.0, 5.0, 6.0]);
    assert_eq!(bridge.regions().len(), 1);
}

#[test]
fn test_view_rejects_wrong_length() {
    let mut bridge = BufferBridge::new(HeapArena::with_capacity(256));
    let region = bridge.allocate(3, ElementType::Float64).unwrap();
    let err = bridge.floats_mut(&region).unwrap().copy_from(&[1.0]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::LengthMismatch {
            expected: 3,
            actual: 1
        }
    );
}

#[test]
fn test_view_rejects_wrong_element_type() {
    let mut bridge = BufferBridge::new(HeapArena::with_capacity(256));
    let floats = bridge.allocate(2, ElementType::Float64).unwrap();
    let bytes = bridge.allocate(2, ElementType::Byte).unwrap();

    assert!(matches!(
        bridge.bytes(&floats),
        Err(BridgeError::ElementMismatch { .. })
    ));
    assert!(matches!(
        bridge.floats(&bytes),
        Err(BridgeError::ElementMismatch { .. })
    ));
}

#[test]
fn test_single_element_set_and_get() {
    let mut bridge = BufferBridge::new(HeapArena::with_capacity(64));
    let region = bridge.allocate(2, ElementType::Float64).unwrap();
    let mut view = bridge.floats_mut(&region).unwrap();
    assert!(view.set(1, -0.5));
    assert!(!view.set(2, 1.0));
    assert_eq!(view.get(1), Some(-0.5));
    assert_eq!(view.get(2), None);
}

// ============================================================================
// InterpolationEngine Tests
// ============================================================================

fn sample_a() -> LatentVector {
    LatentVector::new([0.3, 0.5, 0.7, 0.4, 0.8, 0.1, 0.6, 0.2, 0.1, 0.5])
}

fn sample_b() -> LatentVector {
    LatentVector::new([-1.2, 0.0, 1.9, 0.4, -0.3, 0.7, 2.0, -2.0, 0.05, 1.0])
}

#[test]
fn test_linear_blend_endpoints_are_exact() {
    let (a, b) = (sample_a(), sample_b());
    assert_eq!(linear_blend(&a, &b, 0.0), a);
    assert_eq!(linear_blend(&a, &b, 1.0), b);
}

#[test]
fn test_linear_blend_midpoint() {
    let a = LatentVector::new([0.0; 10]);
    let b = LatentVector::new([2.0; 10]);
    assert_eq!(linear_blend(&a, &b, 0.5), LatentVector::new([1.0; 10]));
}

#[test]
fn test_linear_blend_extrapolates_outside_unit_interval() {
    let a = LatentVector::new([0.0; 10]);
    let b = LatentVector::new([1.0; 10]);
    assert_eq!(linear_blend(&a, &b, 2.0)[0], 2.0);
    assert_eq!(linear_blend(&a, &b, -1.0)[0], -1.0);
}

#[test]
fn test_magnitude_preserving_norm_matches_blended_norms() {
    let (a, b) = (sample_a(), sample_b());
    for t in [0.0, 0.1, 0.25, 0.45, 0.5, 0.8, 1.0] {
        let v = magnitude_preserving_blend(&a, &b, t);
        assert_close(v.norm(), (1.0 - t) * a.norm() + t * b.norm());
    }
}

#[test]
fn test_magnitude_preserving_keeps_direction() {
    let (a, b) = (sample_a(), sample_b());
    let plain = linear_blend(&a, &b, 0.3);
    let kept = magnitude_preserving_blend(&a, &b, 0.3);
    let ratio = kept[0] / plain[0];
    for i in 0..10 {
        if plain[i] != 0.0 {
            assert_close(kept[i] / plain[i], ratio);
        }
    }
}

#[test]
fn test_magnitude_preserving_zero_norm_is_unscaled() {
    let a = LatentVector::new([1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let b = LatentVector::new([-1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let plain = linear_blend(&a, &b, 0.5);
    assert_eq!(plain.norm(), 0.0);

    let kept = magnitude_preserving_blend(&a, &b, 0.5);
    assert_eq!(kept, plain);
    assert!(kept.as_slice().iter().all(|x| x.is_finite()));
}

#[test]
fn test_blend_policy_dispatch() {
    let (a, b) = (sample_a(), sample_b());
    assert_eq!(BlendPolicy::Linear.blend(&a, &b, 0.4), linear_blend(&a, &b, 0.4));
    assert_eq!(
        BlendPolicy::MagnitudePreserving.blend(&a, &b, 0.4),
        magnitude_preserving_blend(&a, &b, 0.4)
    );
}

#[test]
fn test_blend_is_deterministic() {
    let (a, b) = (sample_a(), sample_b());
    let first = magnitude_preserving_blend(&a, &b, 0.37);
    let second = magnitude_preserving_blend(&a, &b, 0.37);
    assert_eq!(first, second);
}

// ============================================================================
// DeterministicSequenceGenerator Tests
// ============================================================================

fn params(seed: u64, modulus: u64, iterations_per_call: u32) -> SequenceParams {
    SequenceParams {
        seed,
        multiplier: 121,
        increment: 97,
        modulus,
        iterations_per_call,
    }
}

#[test]
fn test_sequence_golden_autoencoder() {
    let mut seq = SequenceGenerator::new(params(132222, 562, 2)).unwrap();
    assert_eq!(seq.next(), 506);
    assert_eq!(seq.next(), 94);
    assert_eq!(seq.next(), 510);
    assert_eq!(seq.state(), 510);
}

#[test]
fn test_sequence_golden_wcgan() {
    let mut seq = SequenceGenerator::new(params(5643, 9999, 10)).unwrap();
    assert_eq!(seq.next(), 3364);
    assert_eq!(seq.next(), 1637);
    assert_eq!(seq.next(), 5817);
}

#[test]
fn test_sequence_is_reproducible() {
    let p = params(5643, 9999, 10);
    let mut first = SequenceGenerator::new(p).unwrap();
    let mut second = SequenceGenerator::new(p).unwrap();
    for _ in 0..50 {
        assert_eq!(first.next(), second.next());
    }
}

#[test]
fn test_sequence_single_iteration_step() {
    let mut seq = SequenceGenerator::new(params(1, 1000, 1)).unwrap();
    assert_eq!(seq.next(), 218); // 1*121 + 97
}

#[test]
fn test_sequence_large_params_do_not_overflow() {
    let mut seq = SequenceGenerator::new(SequenceParams {
        seed: u64::MAX - 1,
        multiplier: u64::MAX,
        increment: 7,
        modulus: u64::MAX,
        iterations_per_call: 3,
    })
    .unwrap();
    assert!(seq.next() < u64::MAX);
}

#[test]
fn test_sequence_zero_modulus_rejected() {
    let err = SequenceGenerator::new(params(1, 0, 1)).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidProfile(_)));
}

// ============================================================================
// Controls Tests
// ============================================================================

const UNIT: SliderRange = SliderRange {
    min: 0.0,
    max: 1.0,
    step: 0.1,
};

#[test]
fn test_control_clamps_to_range() {
    let mut control = Control::new(UNIT, 3.0).unwrap();
    assert_eq!(control.value(), 1.0);
    assert!(control.set(-4.0).unwrap());
    assert_eq!(control.value(), 0.0);
    assert!(!control.set(-1.0).unwrap());
}

#[test]
fn test_control_snaps_to_step() {
    let mut control = Control::new(UNIT, 0.37).unwrap();
    assert_close(control.value(), 0.4);
    control.set(0.04).unwrap();
    assert_eq!(control.value(), 0.0);
    control.set(0.96).unwrap();
    assert_eq!(control.value(), 1.0);
}

#[test]
fn test_control_rejects_non_finite_values() {
    assert!(matches!(
        Control::new(UNIT, f64::NAN),
        Err(BridgeError::NonFiniteValue(_))
    ));

    let mut control = Control::new(UNIT, 0.5).unwrap();
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(matches!(control.set(bad), Err(BridgeError::NonFiniteValue(_))));
        assert_eq!(control.value(), 0.5);
    }
}

#[test]
fn test_slider_defaults_from_sequence() {
    let defaults = SliderDefaults {
        slots: 9,
        scale: 0.1,
        offset: 0.1,
    };
    let mut seq = SequenceGenerator::new(params(132222, 562, 2)).unwrap();
    let group = SliderGroup::seeded(UNIT, &defaults, &mut seq).unwrap();
    // 506 % 9 == 2, 94 % 9 == 4, 510 % 9 == 6
    assert_close(group.get(0).unwrap(), 0.3);
    assert_close(group.get(1).unwrap(), 0.5);
    assert_close(group.get(2).unwrap(), 0.7);
}

#[test]
fn test_slider_group_set_out_of_range_index() {
    let mut group = SliderGroup::from_values(UNIT, [0.5; 10]).unwrap();
    let err = group.set(10, 0.2).unwrap_err();
    assert_eq!(err, BridgeError::ControlOutOfRange { index: 10, dim: 10 });
    assert_eq!(group.get(10), None);
}

#[test]
fn test_slider_group_normalized_preset() {
    let wide = SliderRange {
        min: -2.0,
        max: 2.0,
        step: 0.1,
    };
    let mut group = SliderGroup::from_values(wide, [0.0; 10]).unwrap();
    group
        .apply_normalized(&[0.7, 0.1, 0.9, 0.6, 0.2, 0.6, 0.0, 0.6, 1.0, 0.4])
        .unwrap();
    assert_close(group.get(0).unwrap(), 0.4);
    assert_close(group.get(6).unwrap(), -1.0);
    assert_close(group.get(8).unwrap(), 1.0);
}

// ============================================================================
// PixelFrame Tests
// ============================================================================

#[test]
fn test_pixel_frame_exact_length() {
    let size = ImageSize::new(27, 27);
    assert_eq!(size.byte_len(), 2916);
    let frame = PixelFrame::new(size, vec![0; 2916]).unwrap();
    assert_eq!(frame.width(), 27);
    assert_eq!(frame.rgba().len(), 2916);
}

#[test]
fn test_pixel_frame_dimension_mismatch() {
    let err = PixelFrame::new(ImageSize::new(29, 29), vec![0; 27 * 27 * 4]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::DimensionMismatch {
            width: 29,
            height: 29,
            expected: 3364,
            actual: 2916,
        }
    );
}

#[test]
fn test_pixel_frame_luminance() {
    let frame = PixelFrame::new(ImageSize::new(1, 1), vec![30, 60, 90, 255]).unwrap();
    assert_eq!(frame.luminance(0, 0), Some(60));
    assert_eq!(frame.luminance(1, 0), None);
}

#[test]
fn test_render_target_labels() {
    assert_eq!(RenderTarget::A.to_string(), "image_a");
    assert_eq!(RenderTarget::Interpolated.to_string(), "image_c");
    assert_eq!(RenderTarget::TrainingOutput.to_string(), "output");
}

// ============================================================================
// DeploymentProfile Tests
// ============================================================================

#[test]
fn test_builtin_profiles_are_valid() {
    for name in DeploymentProfile::builtin_names() {
        let profile = DeploymentProfile::builtin(name).unwrap();
        assert!(profile.validate().is_ok(), "{name} should validate");
    }
    assert!(DeploymentProfile::builtin("nope").is_none());
}

#[test]
fn test_profiles_stay_distinct() {
    let ae = DeploymentProfile::autoencoder();
    let gan = DeploymentProfile::wcgan();
    assert_eq!(ae.image, ImageSize::new(27, 27));
    assert_eq!(gan.image, ImageSize::new(29, 29));
    assert_ne!(ae.sequence, gan.sequence);
    assert_eq!(ae.blend, BlendPolicy::Linear);
    assert_eq!(gan.blend, BlendPolicy::MagnitudePreserving);
    assert_close(gan.mix_remap.apply(-2.0), 0.0);
    assert_close(gan.mix_remap.apply(2.0), 1.0);
}

#[test]
fn test_profile_json_applies_defaults() {
    let json = r#"{
        "name": "tiny",
        "image": { "width": 4, "height": 3 },
        "sequence": { "seed": 1, "multiplier": 121, "increment": 97, "modulus": 562, "iterations_per_call": 2 },
        "slider": { "min": 0.0, "max": 1.0, "step": 0.1 },
        "defaults": { "slots": 9, "scale": 0.1, "offset": 0.1 },
        "startup": "train_once"
    }"#;
    let profile = DeploymentProfile::from_json_str(json).unwrap();
    assert_eq!(profile.blend, BlendPolicy::Linear);
    assert_eq!(profile.tick_rate_hz, 30.0);
    assert!(profile.preset.is_none());
    assert!(!profile.training_preview);
}

#[test]
fn test_profile_rejects_zero_tick_rate() {
    let mut profile = DeploymentProfile::autoencoder();
    profile.tick_rate_hz = 0.0;
    assert!(matches!(profile.validate(), Err(BridgeError::InvalidProfile(_))));
}

#[test]
fn test_profile_tick_interval() {
    let profile = DeploymentProfile::wcgan();
    let interval = profile.tick_interval().unwrap();
    assert!(interval.as_millis() >= 33 && interval.as_millis() <= 34);
}

#[test]
fn test_profile_rejects_tick_rate_without_usable_period() {
    // 1e10 Hz rounds to a zero period; 1e-300 Hz overflows Duration.
    for rate in [1e10, 1e-300, -5.0, f64::NAN, f64::INFINITY] {
        let mut profile = DeploymentProfile::wcgan();
        profile.tick_rate_hz = rate;
        assert!(
            matches!(profile.validate(), Err(BridgeError::InvalidProfile(_))),
            "rate {rate} should be rejected"
        );
        assert!(profile.tick_interval().is_err());
    }
}

#[test]
fn test_profile_rejects_bad_slider_step() {
    let mut profile = DeploymentProfile::autoencoder();
    profile.slider.step = 0.0;
    assert!(matches!(profile.validate(), Err(BridgeError::InvalidProfile(_))));
}

// ============================================================================
// LatentVectorStore Tests
// ============================================================================

#[test]
fn test_store_defaults_autoencoder() {
    let scheduler = echo_scheduler(DeploymentProfile::autoencoder());
    let store = &scheduler.context().store;

    let a = store.sliders_a().values();
    let b = store.sliders_b().values();
    let expected_a = [0.3, 0.5, 0.7, 0.4, 0.8, 0.1, 0.6, 0.2, 0.1, 0.5];
    let expected_b = [0.2, 0.4, 0.9, 0.1, 0.9, 0.7, 0.5, 0.9, 0.4, 0.9];
    for i in 0..10 {
        assert_close(a[i], expected_a[i]);
        assert_close(b[i], expected_b[i]);
    }
    // 21st draw is 266; 266 % 9 == 5
    assert_close(store.mix(), 0.6);
    assert_close(store.control_pair().t, 0.6);
}

#[test]
fn test_store_wcgan_preset_and_remap() {
    let scheduler = echo_scheduler(DeploymentProfile::wcgan());
    let store = &scheduler.context().store;

    assert_close(store.sliders_a().get(0).unwrap(), 0.4);
    assert_close(store.sliders_b().get(9).unwrap(), -0.8);
    // 21st draw is 2253; 2253 % 9 == 3 -> 3*0.2 - 0.8
    assert_close(store.mix(), -0.2);
    assert_close(store.control_pair().t, 0.45);
}

#[test]
fn test_store_regions_sized_for_profile() {
    let scheduler = echo_scheduler(DeploymentProfile::wcgan());
    let store = &scheduler.context().store;
    assert_eq!(store.latent_region().byte_len(), 80);
    assert_eq!(store.latent_region().element(), ElementType::Float64);
    assert_eq!(store.frame_region().byte_len(), 29 * 29 * 4);
}

#[test]
fn test_session_allocation_failure_is_fatal() {
    let err = SessionContext::new(
        HeapArena::with_capacity(100),
        EchoEngine::default(),
        &DeploymentProfile::autoencoder(),
    )
    .unwrap_err();
    assert!(matches!(err, BridgeError::AllocationFailure { .. }));
}

// ============================================================================
// UpdateScheduler Tests
// ============================================================================

#[test]
fn test_scheduler_starts_idle() {
    let scheduler = echo_scheduler(DeploymentProfile::autoencoder());
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(scheduler.stats().passes, 0);
}

#[test]
fn test_control_change_while_idle_renders_once() {
    let mut scheduler = echo_scheduler(DeploymentProfile::autoencoder());

    let outcome = scheduler
        .dispatch(Event::ControlChanged {
            control: ControlId::A(0),
            value: 0.9,
        })
        .unwrap();

    assert_eq!(outcome, Outcome::Rendered { trained: false });
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(scheduler.stats().passes, 1);
    assert_eq!(scheduler.context().engine.predicts, 3);
    assert_eq!(scheduler.context().engine.trains, 0);

    let sink = scheduler.sink();
    assert_eq!(sink.frames.len(), 3);
    let a = sink.latest(RenderTarget::A).unwrap();
    let b = sink.latest(RenderTarget::B).unwrap();
    let c = sink.latest(RenderTarget::Interpolated).unwrap();
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_ne!(b, c);
    // A(0) = 0.9 echoes as 0.9*100 + 50
    assert_eq!(a.rgba()[0], 140);
}

#[test]
fn test_tick_while_idle_does_nothing() {
    let mut scheduler = echo_scheduler(DeploymentProfile::autoencoder());
    assert_eq!(scheduler.tick().unwrap(), Outcome::Unchanged);
    assert_eq!(scheduler.context().engine.trains, 0);
    assert_eq!(scheduler.stats().ticks, 1);
    assert!(scheduler.sink().frames.is_empty());
}

#[test]
fn test_tick_while_running_trains_once_then_renders() {
    let mut scheduler = echo_scheduler(DeploymentProfile::wcgan());
    assert_eq!(
        scheduler.start(),
        Outcome::StateChanged(SchedulerState::Running)
    );

    assert_eq!(scheduler.tick().unwrap(), Outcome::Rendered { trained: true });
    assert_eq!(scheduler.context().engine.trains, 1);
    assert_eq!(scheduler.context().engine.predicts, 3);
    assert_eq!(scheduler.stats().train_steps, 1);
}

#[test]
fn test_start_stop_toggle() {
    let mut scheduler = echo_scheduler(DeploymentProfile::wcgan());
    assert_eq!(scheduler.start(), Outcome::StateChanged(SchedulerState::Running));
    assert_eq!(scheduler.start(), Outcome::Unchanged);
    assert_eq!(scheduler.toggle(), Outcome::StateChanged(SchedulerState::Idle));
    assert_eq!(scheduler.stop(), Outcome::Unchanged);
    assert_eq!(scheduler.toggle(), Outcome::StateChanged(SchedulerState::Running));
}

#[test]
fn test_control_change_renders_while_running_too() {
    let mut scheduler = echo_scheduler(DeploymentProfile::wcgan());
    scheduler.start();
    let outcome = scheduler.set_control(ControlId::Mix, 1.0).unwrap();
    assert_eq!(outcome, Outcome::Rendered { trained: false });
    assert_eq!(scheduler.context().engine.trains, 0);
}

#[test]
fn test_invalid_control_index_is_an_error() {
    let mut scheduler = echo_scheduler(DeploymentProfile::autoencoder());
    let err = scheduler.set_control(ControlId::B(12), 0.5).unwrap_err();
    assert!(err.to_string().contains("out of range"));
    assert_eq!(scheduler.stats().passes, 0);
}

#[test]
fn test_non_finite_control_value_is_an_error() {
    let mut scheduler = echo_scheduler(DeploymentProfile::wcgan());
    let before = scheduler.context().store.control_pair();

    for (control, value) in [(ControlId::A(0), f64::NAN), (ControlId::Mix, f64::INFINITY)] {
        let err = scheduler.set_control(control, value).unwrap_err();
        assert!(err.to_string().contains("not a finite number"));
    }

    assert_eq!(scheduler.context().store.control_pair(), before);
    assert_eq!(scheduler.stats().passes, 0);
    assert_eq!(scheduler.context().engine.predicts, 0);
}

#[test]
fn test_engine_failure_propagates() {
    let mut scheduler = echo_scheduler(DeploymentProfile::autoencoder());
    scheduler.context_mut().engine.fail_predict = true;
    let err = scheduler.dispatch(Event::Refresh).unwrap_err();
    assert!(format!("{:#}", err).contains("engine exploded"));
}

#[test]
fn test_event_queue_runs_in_order() {
    let mut scheduler = echo_scheduler(DeploymentProfile::autoencoder());
    let mut queue = EventQueue::new();
    queue.push(Event::Tick);
    queue.push(Event::Start);
    queue.push(Event::Tick);
    queue.push(Event::ControlChanged {
        control: ControlId::Mix,
        value: 0.0,
    });
    queue.push(Event::Stop);
    assert_eq!(queue.len(), 5);

    let outcomes = scheduler.drain(&mut queue).unwrap();
    assert!(queue.is_empty());
    assert_eq!(
        outcomes,
        vec![
            Outcome::Unchanged,
            Outcome::StateChanged(SchedulerState::Running),
            Outcome::Rendered { trained: true },
            Outcome::Rendered { trained: false },
            Outcome::StateChanged(SchedulerState::Idle),
        ]
    );
    assert_eq!(scheduler.context().engine.trains, 1);
}

#[test]
fn test_mix_at_zero_renders_a_as_interpolated() {
    let mut scheduler = echo_scheduler(DeploymentProfile::autoencoder());
    scheduler.set_control(ControlId::Mix, 0.0).unwrap();
    let sink = scheduler.sink();
    assert_eq!(
        sink.latest(RenderTarget::A),
        sink.latest(RenderTarget::Interpolated)
    );
}

#[test]
fn test_unsupported_engine_operation_errors() {
    let mut scheduler = echo_scheduler(DeploymentProfile::wcgan());
    assert!(scheduler.reset_weights().is_err());
    assert!(scheduler.load_pretrained().is_err());
}

// ============================================================================
// Boot & Training Preview Tests (PatternEngine)
// ============================================================================

#[test]
fn test_autoencoder_boot_trains_and_previews() {
    let mut scheduler = pattern_scheduler(DeploymentProfile::autoencoder());
    assert!(scheduler.context().has_training_preview());

    assert_eq!(scheduler.boot().unwrap(), Outcome::Rendered { trained: true });
    assert_eq!(scheduler.context().engine.steps(), 1);

    let sink = scheduler.sink();
    assert_eq!(sink.count(RenderTarget::TrainingInput), 1);
    assert_eq!(sink.count(RenderTarget::TrainingOutput), 1);
    assert_eq!(sink.count(RenderTarget::Interpolated), 1);
    assert_eq!(sink.frames.len(), 5);
}

#[test]
fn test_wcgan_boot_loads_pretrained_without_training() {
    let mut scheduler = pattern_scheduler(DeploymentProfile::wcgan());
    assert!(!scheduler.context().has_training_preview());

    assert_eq!(scheduler.boot().unwrap(), Outcome::Rendered { trained: false });
    assert_eq!(scheduler.context().engine.steps(), 0);
    assert_eq!(scheduler.context().engine.sharpness(), 12.0);
    assert_eq!(scheduler.sink().frames.len(), 3);
    assert_eq!(
        scheduler.sink().latest(RenderTarget::A).unwrap().size(),
        ImageSize::new(29, 29)
    );
}

#[test]
fn test_staged_weights_reach_the_engine() {
    let mut scheduler = pattern_scheduler(DeploymentProfile::wcgan());
    let region = scheduler
        .context_mut()
        .stage_weights(&5.5f64.to_le_bytes())
        .unwrap();
    assert_eq!(region.byte_len(), 8);

    scheduler.dispatch(Event::LoadPretrained).unwrap();
    assert_eq!(scheduler.context().engine.sharpness(), 5.5);

    let again = scheduler
        .context_mut()
        .stage_weights(&7.0f64.to_le_bytes())
        .unwrap();
    assert_eq!(again, region);
}

#[test]
fn test_reset_weights_rerenders() {
    let mut scheduler = pattern_scheduler(DeploymentProfile::wcgan());
    scheduler.boot().unwrap();
    scheduler.dispatch(Event::Step).unwrap();
    assert_eq!(scheduler.context().engine.steps(), 1);

    let outcome = scheduler.dispatch(Event::ResetWeights).unwrap();
    assert_eq!(outcome, Outcome::Rendered { trained: false });
    assert_eq!(scheduler.context().engine.steps(), 0);
    assert_eq!(scheduler.context().engine.sharpness(), 2.0);
}

#[test]
fn test_pattern_engine_frames_are_opaque_grey() {
    let mut scheduler = pattern_scheduler(DeploymentProfile::autoencoder());
    scheduler.refresh().unwrap();
    let frame = scheduler.sink().latest(RenderTarget::A).unwrap();
    for px in frame.rgba().chunks_exact(4) {
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
        assert_eq!(px[3], 255);
    }
}

// ============================================================================
// SharedScheduler Tests
// ============================================================================

/// Blocks inside its first `Predict` until released.
struct SlowEngine {
    gate: Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>,
    trains: Arc<AtomicUsize>,
    predicts: Arc<AtomicUsize>,
}

impl InferenceEngine for SlowEngine {
    type Arena = HeapArena;

    fn predict(
        &mut self,
        arena: &mut HeapArena,
        input: &BufferRegion,
        output: &BufferRegion,
    ) -> Result<()> {
        if let Some((entered, release)) = self.gate.take() {
            entered.send(()).ok();
            release.recv().ok();
        }
        self.predicts.fetch_add(1, Ordering::SeqCst);
        echo_into(arena, input, output)
    }

    fn train(&mut self, _arena: &mut HeapArena) -> Result<()> {
        self.trains.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_tick_during_slow_call_is_dropped() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let trains = Arc::new(AtomicUsize::new(0));
    let predicts = Arc::new(AtomicUsize::new(0));

    let engine = SlowEngine {
        gate: Some((entered_tx, release_rx)),
        trains: trains.clone(),
        predicts: predicts.clone(),
    };
    let scheduler = UpdateScheduler::new(
        DeploymentProfile::wcgan(),
        HeapArena::with_capacity(ARENA_BYTES),
        engine,
        RecordingSink::new(),
    )
    .unwrap();

    let shared = SharedScheduler::new(scheduler);
    shared.dispatch(Event::Start).unwrap();

    let worker = shared.clone();
    let first = thread::spawn(move || worker.tick());

    // Wait until the first tick is inside Predict.
    entered_rx.recv().unwrap();
    let second = shared.tick().unwrap();
    assert_eq!(second, Outcome::Dropped);

    release_tx.send(()).unwrap();
    let first = first.join().unwrap().unwrap();
    assert_eq!(first, Outcome::Rendered { trained: true });

    // One tick's worth of engine work: one Train, one pass of three Predicts.
    assert_eq!(trains.load(Ordering::SeqCst), 1);
    assert_eq!(predicts.load(Ordering::SeqCst), 3);

    let stats = shared.stats().unwrap();
    assert_eq!(stats.dropped_ticks, 1);
    assert_eq!(stats.passes, 1);
    assert_eq!(shared.dropped_ticks(), 1);
}

#[test]
fn test_shared_control_change_waits_instead_of_dropping() {
    let scheduler = echo_scheduler(DeploymentProfile::autoencoder());
    let shared = SharedScheduler::new(scheduler);

    let outcome = shared
        .dispatch(Event::ControlChanged {
            control: ControlId::B(3),
            value: 0.5,
        })
        .unwrap();
    assert_eq!(outcome, Outcome::Rendered { trained: false });

    let value = shared
        .with(|s| s.context().store.get(ControlId::B(3)))
        .unwrap();
    assert_eq!(value, Some(0.5));
}
