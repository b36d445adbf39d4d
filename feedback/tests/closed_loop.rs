//! End-to-end closed-loop runs through the public API

use std::io::Write;

use feedback::{
    AlgorithmTester, AnalyzerSet, ControlError, EvaluationAlgorithm, FeedbackController,
    Proportional, SimulationConfig, SpotCounter, TesterError, ThresholdRegions,
};
use shared::{CustomParameters, HistoryError};
use simulator::{
    BlinkingKinetics, Camera, CameraConfig, FluorophoreProperties, GeneratorConfig,
    ImageGenerator,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One emitter (signal 100, background 5) under a proportional law of gain 1.
fn single_emitter_loop(setpoint: f64) -> AlgorithmTester {
    let camera = Camera::new(CameraConfig::noiseless(32, 32)).unwrap();
    let props = FluorophoreProperties::new(100.0, 5.0, BlinkingKinetics::default()).unwrap();
    let generator =
        ImageGenerator::new(camera, props, &[(16.0, 16.0)], GeneratorConfig::default()).unwrap();

    let mut spots = SpotCounter::named("spots");
    spots
        .set_custom_parameters(&CustomParameters::new().with("threshold", 5))
        .unwrap();
    let controller =
        FeedbackController::new(Box::new(spots), Box::new(Proportional::new(1.0)), setpoint)
            .unwrap();

    AlgorithmTester::new(generator, controller, AnalyzerSet::new()).unwrap()
}

#[test]
fn test_single_emitter_scenario() {
    init_logging();
    let mut tester = single_emitter_loop(50.0);
    let reports = tester.run(20).unwrap();
    let controller = tester.controller();

    assert_eq!(controller.setpoints().len(), 20);
    assert_eq!(controller.outputs().len(), 20);
    for i in 1..=20 {
        assert_eq!(controller.setpoint_history(i), Ok(50.0));
    }

    // A single emitter can never reach 50 spots, so the law saturates at the
    // generator's upper activation rate and stays there.
    let (_, max_rate) = tester.generator().activation_rate_range();
    for report in &reports {
        assert!(report.measured <= 1.0);
        assert_eq!(report.output, max_rate);
    }
    assert_eq!(tester.generator().activation_rate(), max_rate);
}

#[test]
fn test_output_tracks_toward_lower_setpoint() {
    init_logging();
    // Setpoint 0: every detected spot pushes the output down to the floor
    let mut tester = single_emitter_loop(0.0);
    let reports = tester.run(20).unwrap();
    let (min_rate, _) = tester.generator().activation_rate_range();

    for report in &reports {
        assert_eq!(report.output, (-report.measured).max(min_rate));
    }
}

#[test]
fn test_fixed_seed_is_reproducible() {
    init_logging();
    let mut config = SimulationConfig::default();
    config.camera.width_px = 48;
    config.camera.height_px = 48;
    config.fluorophores.count = 60;
    config.generator.seed = 1234;

    let mut a = config.build().unwrap();
    let mut b = config.build().unwrap();
    a.run(25).unwrap();
    b.run(25).unwrap();

    assert_eq!(a.generator().stack(), b.generator().stack());
    assert_eq!(a.history_rows(), b.history_rows());

    config.generator.seed = 4321;
    let mut c = config.build().unwrap();
    c.run(25).unwrap();
    assert_ne!(a.generator().stack(), c.generator().stack());
}

#[test]
fn test_adjust_requires_processed_frame() {
    init_logging();
    let camera = Camera::new(CameraConfig::noiseless(16, 16)).unwrap();
    let props = FluorophoreProperties::new(100.0, 5.0, BlinkingKinetics::default()).unwrap();
    let mut generator =
        ImageGenerator::new(camera, props, &[(8.0, 8.0)], GeneratorConfig::default()).unwrap();
    let mut controller = FeedbackController::new(
        Box::new(ThresholdRegions::new()),
        Box::new(Proportional::new(0.5)),
        1.0,
    )
    .unwrap();

    assert!(matches!(
        controller.adjust(&mut generator),
        Err(ControlError::NotReady { .. })
    ));

    let frame = generator.next_image().unwrap().clone();
    assert!(matches!(
        controller.adjust(&mut generator),
        Err(ControlError::NotReady {
            frames: 1,
            processed: 0
        })
    ));
    assert!(controller.outputs().is_empty());
    assert!(controller.setpoints().is_empty());

    controller.analyzer_mut().process_image(&frame);
    controller.adjust(&mut generator).unwrap();
    assert_eq!(controller.outputs().len(), 1);
    assert_eq!(controller.setpoints().len(), 1);
}

fn spot_controller() -> (ImageGenerator, FeedbackController) {
    let camera = Camera::new(CameraConfig::noiseless(16, 16)).unwrap();
    let props = FluorophoreProperties::new(100.0, 5.0, BlinkingKinetics::default()).unwrap();
    let generator =
        ImageGenerator::new(camera, props, &[(8.0, 8.0)], GeneratorConfig::default()).unwrap();
    let controller = FeedbackController::new(
        Box::new(SpotCounter::new()),
        Box::new(Proportional::new(0.5)),
        1.0,
    )
    .unwrap();
    (generator, controller)
}

#[test]
fn test_skipped_adjust_keeps_histories_aligned() {
    init_logging();
    let (mut generator, mut controller) = spot_controller();

    for _ in 0..2 {
        let frame = generator.next_image().unwrap().clone();
        controller.analyzer_mut().process_image(&frame);
        controller.adjust(&mut generator).unwrap();
    }

    // Frame 3 is rendered and analyzed, but the controller never sees it
    let frame = generator.next_image().unwrap().clone();
    controller.analyzer_mut().process_image(&frame);
    let frame = generator.next_image().unwrap().clone();
    controller.analyzer_mut().process_image(&frame);

    for _ in 0..2 {
        assert_eq!(
            controller.adjust(&mut generator),
            Err(ControlError::MissedFrame {
                frame: 4,
                recorded: 2
            })
        );
    }
    assert_eq!(controller.outputs().len(), 2);
    assert_eq!(controller.setpoints().len(), 2);
    assert_eq!(
        controller.output_history(4),
        Err(HistoryError::OutOfRange { index: 4, len: 2 })
    );
}

#[test]
fn test_double_processed_frame_is_rejected() {
    init_logging();
    let (mut generator, mut controller) = spot_controller();

    let frame = generator.next_image().unwrap().clone();
    controller.analyzer_mut().process_image(&frame);
    controller.adjust(&mut generator).unwrap();

    // Frame 1 analyzed a second time leaves the analyzer one entry ahead
    controller.analyzer_mut().process_image(&frame);
    assert_eq!(
        controller.adjust(&mut generator),
        Err(ControlError::AnalyzerAhead {
            frames: 1,
            processed: 2
        })
    );

    let frame = generator.next_image().unwrap().clone();
    controller.analyzer_mut().process_image(&frame);
    assert_eq!(
        controller.adjust(&mut generator),
        Err(ControlError::AnalyzerAhead {
            frames: 2,
            processed: 3
        })
    );
    assert_eq!(controller.outputs().len(), 1);
}

#[test]
fn test_custom_parameter_update_through_tester() {
    init_logging();
    let mut tester = SimulationConfig::default().build().unwrap();
    let before = tester.custom_parameters("spots").unwrap();

    tester
        .set_custom_parameters("spots", &CustomParameters::new().with("threshold", 10))
        .unwrap();
    let after = tester.custom_parameters("spots").unwrap();

    assert_eq!(after.get("threshold"), Some(10));
    for (name, value) in before.iter().filter(|(name, _)| *name != "threshold") {
        assert_eq!(after.get(name), Some(value));
    }
    assert_eq!(
        after.names().collect::<Vec<_>>(),
        before.names().collect::<Vec<_>>()
    );
}

#[test]
fn test_dark_scene_renders_zero_frame() {
    init_logging();
    let camera = Camera::new(CameraConfig::noiseless(24, 16)).unwrap();
    let props = FluorophoreProperties::new(0.0, 0.0, BlinkingKinetics::default()).unwrap();
    let config = GeneratorConfig {
        initial_activation_rate: 1.0,
        ..GeneratorConfig::default()
    };
    let mut generator = ImageGenerator::with_random_population(camera, props, 10, config).unwrap();

    for _ in 0..5 {
        let frame = generator.next_image().unwrap();
        assert_eq!(frame.dim(), (16, 24));
        assert!(frame.iter().all(|&v| v == 0));
    }
}

#[test]
fn test_history_queries_out_of_range() {
    init_logging();
    let mut tester = single_emitter_loop(2.0);
    tester.run(3).unwrap();

    let generator = tester.generator();
    let controller = tester.controller();
    let out_of_range = |index| HistoryError::OutOfRange { index, len: 3 };

    assert_eq!(generator.true_signal(0), Err(out_of_range(0)));
    assert_eq!(generator.true_signal(4), Err(out_of_range(4)));
    assert_eq!(controller.analyzer().error_signal(0), Err(out_of_range(0)));
    assert_eq!(controller.analyzer().error_signal(4), Err(out_of_range(4)));
    assert_eq!(controller.output_history(4), Err(out_of_range(4)));
    assert_eq!(controller.setpoint_history(0), Err(out_of_range(0)));

    for i in 1..=3 {
        assert!(generator.true_signal(i).is_ok());
        assert!(controller.output_history(i).is_ok());
    }
}

#[test]
fn test_bleaching_only_shrinks_population() {
    init_logging();
    let mut config = SimulationConfig::default();
    config.camera.width_px = 32;
    config.camera.height_px = 32;
    config.fluorophores.count = 40;
    config.fluorophores.kinetics = BlinkingKinetics::new(0.05, 0.05, 0.02).unwrap();
    config.generator.initial_activation_rate = 1.0;

    let mut tester = config.build().unwrap();
    let mut live = tester.generator().live_emitter_count();
    for _ in 0..60 {
        tester.step().unwrap();
        let now = tester.generator().live_emitter_count();
        assert!(now <= live);
        live = now;
    }
    assert!(live < 40);
}

#[test]
fn test_pid_loop_from_json_file() {
    init_logging();
    let json = r#"{
        "camera": {"width_px": 64, "height_px": 64, "read_noise_e": 1.0},
        "fluorophores": {"signal": 1500.0, "count": 80},
        "generator": {"seed": 9, "initial_activation_rate": 0.2},
        "controller": {
            "setpoint": 3.0,
            "primary": "spots",
            "law": {"type": "pid", "kp": 0.02, "ki": 0.5, "integral_limit": 2.0}
        },
        "analyzers": [
            {"name": "spots", "kind": "spot_counter", "parameters": {"threshold": 140, "box_size": 2}},
            {"name": "regions", "kind": "threshold_regions", "parameters": {"min_area": 3}}
        ],
        "frames": 40
    }"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = SimulationConfig::from_json_file(file.path()).unwrap();
    let mut tester = config.build().unwrap();
    assert_eq!(tester.analyzer_names(), vec!["spots", "regions"]);
    assert_eq!(
        tester.custom_parameters("spots").unwrap().get("box_size"),
        Some(2)
    );

    let reports = tester.run(config.frames).unwrap();
    let (min_rate, max_rate) = tester.generator().activation_rate_range();
    assert!(reports
        .iter()
        .all(|r| r.output >= min_rate && r.output <= max_rate));
    assert_eq!(
        tester.analyzer("regions").unwrap().processed_count(),
        config.frames
    );
}

#[test]
fn test_invalid_json_config_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"fluorophores": {"signal": -1.0}}"#).unwrap();

    let config = SimulationConfig::from_json_file(file.path()).unwrap();
    assert!(matches!(
        config.build(),
        Err(feedback::ConfigError::Photophysics(_))
    ));
    assert!(SimulationConfig::from_json_str("{not json").is_err());
}

#[test]
fn test_setpoint_change_mid_run() {
    init_logging();
    let mut tester = single_emitter_loop(5.0);
    tester.run(4).unwrap();
    tester.set_setpoint(1.0).unwrap();
    tester.run(3).unwrap();

    let setpoints: Vec<f64> = tester.history_rows().iter().map(|r| r.setpoint).collect();
    assert_eq!(setpoints, vec![5.0, 5.0, 5.0, 5.0, 1.0, 1.0, 1.0]);
    assert!(matches!(
        tester.set_setpoint(f64::INFINITY),
        Err(TesterError::Control(ControlError::InvalidSetpoint(_)))
    ));
}
