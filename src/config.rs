use crate::error::TimerError;

/// Largest accepted number of wheel spokes.
pub const MAX_WHEEL_SIZE: usize = 1 << 24;

/// Spoke count used by [`Strategy::default_wheel`].
pub const DEFAULT_WHEEL_SIZE: usize = 3600;

/// Caller time units per wheel tick used by [`Strategy::wheel`].
pub const DEFAULT_RESOLUTION: u64 = 1;

/// Backing strategy selected when an engine is created.
///
/// Times handed to the engine are plain `u64` values in whatever unit the
/// caller's clock uses. The queue compares them directly. The wheel groups
/// them into ticks of `resolution` units and advances one spoke per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Expiry-ordered list. Exact, but adds must arrive in non-decreasing
    /// expiry order.
    #[default]
    Queue,

    /// `size` cyclic spokes, one per tick of `resolution` time units.
    Wheel { size: usize, resolution: u64 },
}

impl Strategy {
    /// Wheel with one tick per caller time unit.
    pub const fn wheel(size: usize) -> Self {
        Strategy::Wheel {
            size,
            resolution: DEFAULT_RESOLUTION,
        }
    }

    /// Wheel with `resolution` caller time units per tick.
    pub const fn wheel_with_resolution(size: usize, resolution: u64) -> Self {
        Strategy::Wheel { size, resolution }
    }

    /// One-hour wheel at one tick per second, for second-granularity clocks.
    pub const fn default_wheel() -> Self {
        Self::wheel(DEFAULT_WHEEL_SIZE)
    }

    pub fn validate(&self) -> Result<(), TimerError> {
        match *self {
            Strategy::Queue => Ok(()),
            Strategy::Wheel { size, resolution } => {
                if size == 0 {
                    return Err(TimerError::InvalidConfiguration(
                        "wheel size must be at least 1",
                    ));
                }
                if size > MAX_WHEEL_SIZE {
                    return Err(TimerError::InvalidConfiguration(
                        "wheel size exceeds MAX_WHEEL_SIZE",
                    ));
                }
                if resolution == 0 {
                    return Err(TimerError::InvalidConfiguration(
                        "wheel resolution must be at least 1",
                    ));
                }
                Ok(())
            }
        }
    }
}
