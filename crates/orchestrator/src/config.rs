#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Targets restarted concurrently within one task. 1 means strictly
    /// sequential — the low-blast-radius default for production fleets.
    pub max_parallel: usize,
    /// Capacity of the worker-to-drive-loop signal channel.
    pub signal_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            signal_buffer: 64,
        }
    }
}
