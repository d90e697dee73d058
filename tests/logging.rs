//! Per-iteration diagnostics can be switched on with an `EnvFilter` directive,
//! as the `tomorec` binary does from `RUST_LOG`.

use std::f64::consts::PI;
use std::io::Write;
use std::sync::{Arc, Mutex};

use ndarray::s;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use tomorec::{iterate_slice, simulate, Algorithm, ReconParams, phantom::{disk, stack, uniform_angles}};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }
    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

fn log_of_iterations(directive: &str) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let angles = uniform_angles(8, PI);
    let sinogram = simulate(stack(disk(8, 3.0, 1.0).view(), 1).view(), &angles, None).unwrap();
    let params = ReconParams { num_iter: 3, ..Default::default() };
    tracing::subscriber::with_default(subscriber, || {
        iterate_slice(sinogram.slice(s![.., 0, ..]), &angles, Algorithm::Sirt, &params, None).unwrap();
    });
    let bytes = captured.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn debug_directive_enables_iteration_logging() {
    assert_eq!(EnvFilter::new("tomorec=debug").max_level_hint(), Some(LevelFilter::DEBUG));
    let log = log_of_iterations("tomorec=debug");
    assert_eq!(log.matches("iteration done").count(), 3, "{log}");
    assert!(log.contains("residual"), "{log}");
}

#[test]
fn info_directive_hides_iteration_logging() {
    let log = log_of_iterations("info");
    assert!(!log.contains("iteration done"), "{log}");
}
