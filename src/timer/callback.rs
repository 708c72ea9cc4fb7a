use crate::timer::{Timer, TimerEngine};

type FireFn<P, C> = Box<dyn FnMut(&mut P, u64, &mut C, &mut TimerEngine<Callback<P, C>>)>;
type ReleaseFn<P> = Box<dyn FnOnce(P)>;

/// Closure-built timer carrying a payload.
///
/// `on_fire` runs when the timer expires, with the payload, the firing time,
/// the caller's check context and the engine itself. `on_release` (if set)
/// takes the payload by value once the entry is destroyed, whichever way
/// that happens.
pub struct Callback<P, C = ()> {
    payload: P,
    on_fire: FireFn<P, C>,
    on_release: Option<ReleaseFn<P>>,
}

impl<P, C> Callback<P, C> {
    pub fn new<F>(payload: P, on_fire: F) -> Self
    where
        F: FnMut(&mut P, u64, &mut C, &mut TimerEngine<Callback<P, C>>) + 'static,
    {
        Self {
            payload,
            on_fire: Box::new(on_fire),
            on_release: None,
        }
    }

    pub fn on_release<F>(mut self, on_release: F) -> Self
    where
        F: FnOnce(P) + 'static,
    {
        self.on_release = Some(Box::new(on_release));
        self
    }

    #[inline(always)]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    #[inline(always)]
    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }
}

impl<P, C> Timer for Callback<P, C> {
    type Context = C;

    fn fire(&mut self, now: u64, ctx: &mut C, timers: &mut TimerEngine<Self>) {
        (self.on_fire)(&mut self.payload, now, ctx, timers);
    }

    fn release(self) {
        let Callback {
            payload,
            on_release,
            ..
        } = self;
        if let Some(on_release) = on_release {
            on_release(payload);
        }
    }
}
