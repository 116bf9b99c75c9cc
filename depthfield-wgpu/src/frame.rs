/// Frame timing. Created with the pipeline, advanced once per tick, never reset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameState {
    pub elapsed_ms: f64,
    pub delta_ms: f64,
    pub frame: u64,
}

impl FrameState {
    /// Host clocks may stall or jump backwards; delta never goes negative.
    pub fn advance(&mut self, elapsed_ms: f64) {
        self.delta_ms = (elapsed_ms - self.elapsed_ms).max(0.0);
        self.elapsed_ms = elapsed_ms;
        self.frame += 1;
    }

    pub fn elapsed_secs(&self) -> f32 {
        (self.elapsed_ms / 1000.0) as f32
    }
}
