use std::time::Instant;

const SLOW_MS: u128 = 1000;

/// Measures an operation and warns on drop when it was slow.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        if elapsed > SLOW_MS {
            log::warn!("{} took {}ms (slow!)", self.name, elapsed);
        } else {
            log::debug!("{} completed in {}ms", self.name, elapsed);
        }
    }
}
