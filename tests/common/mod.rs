//! Shared test support.

#![allow(dead_code)]

use std::sync::Mutex;

use forklift::config::Configuration;
use forklift::logger::{OutputStreamKind, ProgressLogger};

/// Logger recording every event for later assertions, including the peak
/// number of concurrently running workers.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    pub configuration: Mutex<Option<Configuration>>,
    pub started_with: Mutex<Option<u64>>,
    pub advanced: Mutex<u64>,
    pub finished: Mutex<Option<String>>,
    pub commands_started: Mutex<usize>,
    pub commands_finished: Mutex<usize>,
    pub exit_codes: Mutex<Vec<Option<i32>>>,
    pub running_now: Mutex<usize>,
    pub peak_running: Mutex<usize>,
    pub unexpected: Mutex<Vec<(usize, OutputStreamKind, String)>>,
}

impl ProgressLogger for RecordingLogger {
    fn log_configuration(&self, configuration: &Configuration) {
        *self.configuration.lock().unwrap() = Some(*configuration);
    }

    fn log_start(&self, total_items: u64) {
        *self.started_with.lock().unwrap() = Some(total_items);
    }

    fn log_advance(&self, delta: u64) {
        *self.advanced.lock().unwrap() += delta;
    }

    fn log_finish(&self, item_name: &str) {
        *self.finished.lock().unwrap() = Some(item_name.to_string());
    }

    fn log_command_started(&self, _command: &str) {
        *self.commands_started.lock().unwrap() += 1;
        let mut running = self.running_now.lock().unwrap();
        *running += 1;
        let mut peak = self.peak_running.lock().unwrap();
        *peak = (*peak).max(*running);
    }

    fn log_command_finished(&self, exit_code: Option<i32>) {
        *self.commands_finished.lock().unwrap() += 1;
        *self.running_now.lock().unwrap() -= 1;
        self.exit_codes.lock().unwrap().push(exit_code);
    }

    fn log_unexpected_child_process_output(
        &self,
        index: usize,
        _pid: Option<u32>,
        kind: OutputStreamKind,
        chunk: &str,
        _progress_symbol: char,
    ) {
        self.unexpected
            .lock()
            .unwrap()
            .push((index, kind, chunk.to_string()));
    }
}
