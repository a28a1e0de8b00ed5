//! Recalibration through the monitor, persisted to disk and picked up by
//! freshly built readers.

use std::path::PathBuf;

use carewatch::adapters::sim_bus::SimulatedBus;
use carewatch::adapters::storage::FileStore;
use carewatch::app::events::AppEvent;
use carewatch::app::monitor::MotionMonitor;
use carewatch::app::ports::ConfigPort;
use carewatch::config::SystemConfig;
use carewatch::error::{BusError, CalibrationError};
use carewatch::pins::{ACCEL_X_CHANNEL, ACCEL_Y_CHANNEL, ACCEL_Z_CHANNEL};
use carewatch::sensors;
use carewatch::sensors::channel::CalibrationStore;

use crate::mock_hw::{MemStore, RecordingSink};

struct TempDir(PathBuf);

impl TempDir {
    fn new(tag: &str) -> Self {
        let p = std::env::temp_dir().join(format!("carewatch-it-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&p);
        Self(p)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[test]
fn offsets_survive_a_restart() {
    let dir = TempDir::new("restart");
    let cfg = SystemConfig::default();
    let bus = SimulatedBus::seeded(5, 0, 0.0);
    let mut sink = RecordingSink::new();

    {
        let mut store = FileStore::open(&dir.0).unwrap();
        let mut monitor =
            MotionMonitor::from_config(&cfg, sensors::motion_estimator(&cfg, bus.clone(), &store));
        let profiles = monitor
            .recalibrate(cfg.calibration_samples, cfg.calibration_max_spread, &mut store, &mut sink)
            .unwrap();
        for p in profiles {
            assert!((p.offset - 2047.0 / 4095.0).abs() < 1e-4);
        }
    }
    assert_eq!(sink.count("calibration_completed"), 3);

    let store = FileStore::open(&dir.0).unwrap();
    let stored = store.load_profile(ACCEL_Z_CHANNEL).unwrap().unwrap();
    assert!((stored.offset - 0.4999).abs() < 1e-3);

    let mut monitor = MotionMonitor::from_config(&cfg, sensors::motion_estimator(&cfg, bus.clone(), &store));
    for t in 0..20 {
        monitor.tick(t * 100, &mut sink);
    }
    let v = monitor.last_vector().unwrap();
    assert!(v.magnitude < 0.01, "calibrated rest should read ~0, got {}", v.magnitude);

    bus.inject_impact(30);
    let falls: Vec<_> = (20..80).filter_map(|t| monitor.tick(t * 100, &mut sink)).collect();
    assert_eq!(falls.len(), 1, "impact still detected after calibration");
}

#[test]
fn shaky_device_refuses_calibration() {
    let dir = TempDir::new("shaky");
    let cfg = SystemConfig::default();
    let mut store = FileStore::open(&dir.0).unwrap();
    let bus = SimulatedBus::seeded(9, 400, 0.0);
    let mut sink = RecordingSink::new();
    let mut monitor = MotionMonitor::from_config(&cfg, sensors::motion_estimator(&cfg, bus, &store));

    let err = monitor
        .recalibrate(cfg.calibration_samples, cfg.calibration_max_spread, &mut store, &mut sink)
        .unwrap_err();
    assert!(matches!(err, CalibrationError::Unstable { .. }), "{err:?}");
    assert_eq!(store.load_profile(ACCEL_X_CHANNEL).unwrap(), None);
    assert!(!sink.events().iter().any(|e| matches!(e, AppEvent::CalibrationCompleted { .. })));
}

#[test]
fn saved_config_drives_the_next_boot() {
    let dir = TempDir::new("config");
    let store = FileStore::open(&dir.0).unwrap();
    let cfg = SystemConfig {
        dark_threshold: 0.3,
        health_check_timeout_secs: 60,
        ..SystemConfig::default()
    };
    store.save(&cfg).unwrap();

    let reopened = FileStore::open(&dir.0).unwrap();
    assert_eq!(reopened.load().unwrap(), cfg);

    let invalid = SystemConfig {
        health_check_timeout_secs: 1,
        ..SystemConfig::default()
    };
    assert!(reopened.save(&invalid).is_err());
    assert_eq!(reopened.load().unwrap(), cfg);
}

#[test]
fn failed_recalibration_changes_nothing_and_raises_no_fall() {
    let cfg = SystemConfig::default();
    let bus = SimulatedBus::seeded(1, 0, 0.0);
    let mut store = MemStore::new();
    let mut sink = RecordingSink::new();
    let mut monitor = MotionMonitor::from_config(&cfg, sensors::motion_estimator(&cfg, bus.clone(), &store));

    for t in 0..20 {
        assert!(monitor.tick(t * 100, &mut sink).is_none());
    }

    bus.fail_reads(ACCEL_Z_CHANNEL, 1);
    let err = monitor
        .recalibrate(cfg.calibration_samples, cfg.calibration_max_spread, &mut store, &mut sink)
        .unwrap_err();
    assert_eq!(err, CalibrationError::Bus(BusError::Timeout));
    assert!(store.keys().is_empty(), "nothing persisted: {:?}", store.keys());
    assert!(
        monitor
            .estimator_mut()
            .axes()
            .iter()
            .all(|a| a.profile().offset == 0.0)
    );

    let falls: Vec<_> = (20..40).filter_map(|t| monitor.tick(t * 100, &mut sink)).collect();
    assert!(falls.is_empty(), "still device reported {falls:?}");
    assert_eq!(sink.count("fall_detected"), 0);
    assert_eq!(sink.count("calibration_completed"), 0);
}

#[test]
fn recalibrating_a_still_device_is_stable() {
    let cfg = SystemConfig {
        calibration_samples: 200,
        ..SystemConfig::default()
    };
    for seed in [3, 17, 42] {
        let bus = SimulatedBus::seeded(seed, 20, 10.0);
        let mut store = MemStore::new();
        let mut sink = RecordingSink::new();
        let mut monitor = MotionMonitor::from_config(&cfg, sensors::motion_estimator(&cfg, bus, &store));

        let first = monitor
            .recalibrate(cfg.calibration_samples, cfg.calibration_max_spread, &mut store, &mut sink)
            .unwrap();
        let second = monitor
            .recalibrate(cfg.calibration_samples, cfg.calibration_max_spread, &mut store, &mut sink)
            .unwrap();

        for (ch, (a, b)) in [ACCEL_X_CHANNEL, ACCEL_Y_CHANNEL, ACCEL_Z_CHANNEL]
            .iter()
            .zip(first.iter().zip(second.iter()))
        {
            assert!(
                (a.offset - b.offset).abs() < 0.01,
                "seed {seed} ch{ch}: {} then {}",
                a.offset,
                b.offset
            );
        }
    }
}
