/// Counts elapsed ticks of the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationClock {
    elapsed: u64,
    episode_duration_ticks: u64,
}

impl SimulationClock {
    pub fn new(episode_duration_ticks: u64) -> Self {
        SimulationClock {
            elapsed: 0,
            episode_duration_ticks,
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0;
    }

    /// Advances by one tick and returns whether the episode is over.
    pub fn advance(&mut self) -> bool {
        self.elapsed = self.elapsed.saturating_add(1);
        self.is_done()
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn is_done(&self) -> bool {
        self.elapsed >= self.episode_duration_ticks
    }
}
