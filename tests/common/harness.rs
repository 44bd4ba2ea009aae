use std::sync::{Arc, Mutex};

use jwt_sessions::{
    Driver, EventSink, Guard, GuardConfig, LifecycleEvent, ManualClock, TokenManager,
};

pub const SECRET: &str = "s";
pub const START: i64 = 1_700_000_000;

/// A guard on a manual clock that records every lifecycle event it emits.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub guard: Arc<Guard>,
    pub events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl Harness {
    pub fn new(config: GuardConfig) -> Self {
        Self::at(config, START)
    }

    pub fn at(config: GuardConfig, now: i64) -> Self {
        let clock = Arc::new(ManualClock::new(now));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn EventSink> = {
            let events = events.clone();
            Arc::new(move |event: &LifecycleEvent| events.lock().unwrap().push(event.clone()))
        };
        let guard = Guard::with_clock(config, sink, clock.clone()).expect("guard");
        Self {
            clock,
            guard: Arc::new(guard),
            events,
        }
    }

    pub fn manager(&self) -> TokenManager {
        TokenManager::new(self.guard.clone())
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

pub fn hs256() -> GuardConfig {
    GuardConfig::default().with_secret(SECRET)
}

pub fn single() -> Harness {
    Harness::new(hs256().with_driver(Driver::Single))
}

pub fn multi(track_user_tokens: bool) -> Harness {
    Harness::new(GuardConfig {
        track_user_tokens,
        ..hs256().with_driver(Driver::Multi)
    })
}
