//! The environment: world state, physics engine, step participants, and the
//! stepper that advances simulated time under a single world lock.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::clock::{ClockConfig, RestartPolicy, SimulationState, StepMode, validate_timestep};
use crate::error::SimError;
use crate::participant::{AsAny, NullEngine, PhysicsEngine, StepCtx, StepParticipant};
use crate::world::World;

/// Handle to a registered step participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(u64);

/// Everything guarded by the world lock.
struct Inner {
    world: World,
    physics: Box<dyn PhysicsEngine>,
    /// Kept in registration order; that is the order they step in.
    participants: Vec<(ParticipantId, Box<dyn StepParticipant>)>,
    next_participant: u64,
    state: SimulationState,
    last_error: Option<SimError>,
    shutdown: bool,
}

impl Inner {
    /// Physics first, then participants in registration order. Stops at the
    /// first failure.
    fn run_participants(&mut self, ctx: &StepCtx) -> Result<(), SimError> {
        let Inner {
            world,
            physics,
            participants,
            ..
        } = self;
        physics
            .simulate(world, ctx)
            .map_err(|source| SimError::StepFailure {
                participant: physics.name().to_string(),
                tick: ctx.tick,
                source,
            })?;
        for (_, participant) in participants.iter_mut() {
            participant
                .step(world, ctx)
                .map_err(|source| SimError::StepFailure {
                    participant: participant.name().to_string(),
                    tick: ctx.tick,
                    source,
                })?;
        }
        Ok(())
    }
}

struct Shared {
    inner: Mutex<Inner>,
    /// Signals the stepping thread on start, stop, and shutdown.
    wake: Condvar,
    /// Mirror of `SimulationState::elapsed` for lock-free reads.
    elapsed_nanos: AtomicU64,
    running: AtomicBool,
    config: ClockConfig,
}

impl Shared {
    /// Execute one atomic step. Caller holds the world lock.
    fn step_locked(&self, inner: &mut Inner) -> Result<(), SimError> {
        let dt = inner.state.timestep();
        let time = inner
            .state
            .next_elapsed()
            .ok_or(SimError::ClockOverflow {
                elapsed: inner.state.elapsed(),
                timestep: dt,
            })?;
        let ctx = StepCtx {
            tick: inner.world.tick() + 1,
            dt,
            time,
        };
        let _span = tracing::trace_span!("step", tick = ctx.tick).entered();

        let checkpoint = inner.world.checkpoint();
        if let Err(err) = inner.run_participants(&ctx) {
            inner.world.restore(checkpoint);
            return Err(err);
        }

        inner.state.commit(time);
        inner.world.commit_step(ctx.tick, time);
        self.publish_elapsed(time);
        Ok(())
    }

    /// Elapsed time never exceeds `MAX_ELAPSED`, so the conversion is exact.
    fn publish_elapsed(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.store(nanos, Ordering::Release);
    }
}

/// Owned simulation environment.
///
/// Holds the world, the selected physics engine and the step participants
/// behind one lock. In [`StepMode::Background`] a dedicated thread advances
/// simulated time in fixed increments while the simulation is running; any
/// other thread that wants to read or mutate the world takes [`Environment::lock`].
///
/// Control calls (`start_simulation`, `stop_simulation`, `advance`) acquire the
/// world lock themselves and must not be made while holding a [`WorldGuard`].
pub struct Environment {
    shared: Arc<Shared>,
    stepper: Option<JoinHandle<()>>,
}

impl Environment {
    /// Create an environment with an empty world and the null physics engine.
    pub fn new(config: ClockConfig) -> Result<Self, SimError> {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                world: World::new(),
                physics: Box::new(NullEngine::new()),
                participants: Vec::new(),
                next_participant: 0,
                state: SimulationState::default(),
                last_error: None,
                shutdown: false,
            }),
            wake: Condvar::new(),
            elapsed_nanos: AtomicU64::new(0),
            running: AtomicBool::new(false),
            config,
        });

        let stepper = match shared.config.mode {
            StepMode::Background => {
                let worker = Arc::clone(&shared);
                let handle = std::thread::Builder::new()
                    .name("tickworks-stepper".into())
                    .spawn(move || run_stepper(worker))?;
                Some(handle)
            }
            StepMode::Manual => None,
        };

        Ok(Self { shared, stepper })
    }

    /// Clock configuration this environment was built with.
    pub fn config(&self) -> &ClockConfig {
        &self.shared.config
    }

    /// Start advancing simulated time in increments of `timestep`, paced
    /// according to the configured `realtime` flag.
    pub fn start_simulation(&self, timestep: Duration) -> Result<(), SimError> {
        self.start_simulation_with(timestep, self.shared.config.realtime)
    }

    /// Start (or retune) the simulation. When already running only the step
    /// size and pacing change; elapsed time is kept.
    ///
    /// Timesteps above [`MAX_TIMESTEP`](crate::clock::MAX_TIMESTEP) are rejected
    /// with `InvalidArgument`. A step that would carry simulated time past
    /// [`MAX_ELAPSED`](crate::clock::MAX_ELAPSED) fails with `ClockOverflow`
    /// and commits nothing.
    pub fn start_simulation_with(&self, timestep: Duration, realtime: bool) -> Result<(), SimError> {
        validate_timestep(timestep)?;
        {
            let mut inner = self.shared.inner.lock();
            let resuming = !inner.state.is_running();
            if resuming && self.shared.config.restart == RestartPolicy::Reset {
                inner.state.reset();
                inner.world.reset_tick();
                self.shared.publish_elapsed(Duration::ZERO);
            }
            inner.state.start(timestep, realtime, Instant::now());
            self.shared.running.store(true, Ordering::Release);
            tracing::debug!(?timestep, realtime, resuming, "simulation started");
        }
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Stop stepping. Idempotent; elapsed time is preserved. A step already in
    /// flight completes before this returns.
    pub fn stop_simulation(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state.stop() {
                tracing::debug!(elapsed = ?inner.state.elapsed(), "simulation stopped");
            }
            self.shared.running.store(false, Ordering::Release);
        }
        self.shared.wake.notify_all();
    }

    /// Whether steps are currently being committed. Never waits on the world lock.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Simulated time elapsed. Never waits on the world lock.
    pub fn simulation_time(&self) -> Duration {
        Duration::from_nanos(self.shared.elapsed_nanos.load(Ordering::Acquire))
    }

    /// Simulated time in whole microseconds.
    pub fn simulation_time_micros(&self) -> u64 {
        self.shared.elapsed_nanos.load(Ordering::Acquire) / 1_000
    }

    /// Acquire exclusive access to the world. Blocks while a step is in
    /// flight or another caller holds the lock.
    pub fn lock(&self) -> WorldGuard<'_> {
        WorldGuard {
            inner: self.shared.inner.lock(),
        }
    }

    /// Like [`Environment::lock`] but gives up after `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> Result<WorldGuard<'_>, SimError> {
        self.shared
            .inner
            .try_lock_for(timeout)
            .map(|inner| WorldGuard { inner })
            .ok_or(SimError::Timeout(timeout))
    }

    /// Commit exactly one step if the simulation is running. Returns
    /// `Ok(false)` without touching the clock when it is stopped.
    ///
    /// This is how a [`StepMode::Manual`] environment is driven; it is also
    /// safe to call alongside a background stepper.
    pub fn advance(&self) -> Result<bool, SimError> {
        let mut inner = self.shared.inner.lock();
        if !inner.state.is_running() {
            return Ok(false);
        }
        self.shared.step_locked(&mut inner)?;
        Ok(true)
    }

    /// Take the failure that paused the background stepper, if any.
    pub fn take_last_error(&self) -> Option<SimError> {
        self.shared.inner.lock().last_error.take()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        self.shared.inner.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.stepper.take() {
            if handle.join().is_err() {
                tracing::error!("stepping thread panicked");
            }
        }
    }
}

fn run_stepper(shared: Arc<Shared>) {
    tracing::debug!("stepping thread started");
    let mut inner = shared.inner.lock();
    loop {
        if inner.shutdown {
            break;
        }
        if !inner.state.is_running() {
            shared.wake.wait(&mut inner);
            continue;
        }
        if let Some(deadline) = inner.state.next_deadline() {
            if Instant::now() < deadline {
                // Releases the world lock while waiting.
                shared.wake.wait_until(&mut inner, deadline);
                continue;
            }
        }

        match shared.step_locked(&mut inner) {
            Ok(()) => {
                inner
                    .state
                    .advance_schedule(Instant::now(), shared.config.max_catch_up_steps);
            }
            Err(err) => {
                tracing::error!(%err, "step failed, pausing simulation");
                inner.state.stop();
                shared.running.store(false, Ordering::Release);
                inner.last_error = Some(err);
            }
        }
        // Hand the lock to any waiting caller before the next step.
        MutexGuard::bump(&mut inner);
    }
    tracing::debug!("stepping thread exiting");
}

/// Scoped exclusive access to the world, physics engine and participants.
/// Released on drop.
pub struct WorldGuard<'a> {
    inner: MutexGuard<'a, Inner>,
}

impl Deref for WorldGuard<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        &self.inner.world
    }
}

impl DerefMut for WorldGuard<'_> {
    fn deref_mut(&mut self) -> &mut World {
        &mut self.inner.world
    }
}

impl WorldGuard<'_> {
    /// Clock state as of the last committed step.
    pub fn state(&self) -> &SimulationState {
        &self.inner.state
    }

    pub fn physics(&self) -> &dyn PhysicsEngine {
        &*self.inner.physics
    }

    pub fn physics_mut(&mut self) -> &mut dyn PhysicsEngine {
        &mut *self.inner.physics
    }

    /// Replace the physics engine, returning the previous one.
    pub fn set_physics_engine(&mut self, engine: Box<dyn PhysicsEngine>) -> Box<dyn PhysicsEngine> {
        tracing::info!(engine = engine.name(), "physics engine selected");
        std::mem::replace(&mut self.inner.physics, engine)
    }

    /// Register a participant. It steps after the physics engine and after
    /// every participant registered before it.
    pub fn add_participant(&mut self, participant: Box<dyn StepParticipant>) -> ParticipantId {
        let id = ParticipantId(self.inner.next_participant);
        self.inner.next_participant += 1;
        tracing::debug!(name = participant.name(), ?id, "participant registered");
        self.inner.participants.push((id, participant));
        id
    }

    pub fn remove_participant(&mut self, id: ParticipantId) -> Option<Box<dyn StepParticipant>> {
        let index = self
            .inner
            .participants
            .iter()
            .position(|(pid, _)| *pid == id)?;
        Some(self.inner.participants.remove(index).1)
    }

    pub fn participant<T: StepParticipant>(&self, id: ParticipantId) -> Option<&T> {
        self.inner
            .participants
            .iter()
            .find(|(pid, _)| *pid == id)
            .and_then(|(_, p)| <dyn StepParticipant as AsAny>::as_any(&**p).downcast_ref())
    }

    pub fn participant_mut<T: StepParticipant>(&mut self, id: ParticipantId) -> Option<&mut T> {
        self.inner
            .participants
            .iter_mut()
            .find(|(pid, _)| *pid == id)
            .and_then(|(_, p)| <dyn StepParticipant as AsAny>::as_any_mut(&mut **p).downcast_mut())
    }

    /// Participant names in step order.
    pub fn participant_names(&self) -> Vec<&str> {
        self.inner
            .participants
            .iter()
            .map(|(_, p)| p.name())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{MAX_ELAPSED, MAX_TIMESTEP};
    use crate::error::StepError;
    use crate::world::Body;
    use glam::Vec3;
    use proptest::prelude::*;

    fn manual() -> Environment {
        Environment::new(ClockConfig::manual()).unwrap()
    }

    const TEN_MS: Duration = Duration::from_millis(10);

    /// Appends its label to a shared journal on every step.
    struct Recorder {
        label: &'static str,
        journal: Arc<Mutex<Vec<&'static str>>>,
    }

    impl StepParticipant for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn step(&mut self, _world: &mut World, _ctx: &StepCtx) -> Result<(), StepError> {
            self.journal.lock().push(self.label);
            Ok(())
        }
    }

    /// Moves every body, then fails once `fail_at` is reached.
    struct Saboteur {
        fail_at: u64,
    }

    impl StepParticipant for Saboteur {
        fn name(&self) -> &str {
            "saboteur"
        }

        fn step(&mut self, world: &mut World, ctx: &StepCtx) -> Result<(), StepError> {
            for (_, body) in world.bodies_mut() {
                body.transform.position += Vec3::X;
            }
            if ctx.tick >= self.fail_at {
                return Err(StepError::Failed("actuator fault".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn hundred_steps_of_ten_ms_is_one_second() {
        let env = manual();
        env.start_simulation(timestep_secs(0.01)).unwrap();
        for _ in 0..100 {
            assert!(env.advance().unwrap());
        }
        assert_eq!(env.simulation_time(), Duration::from_secs(1));
        assert_eq!(env.simulation_time_micros(), 1_000_000);
        assert_eq!(env.lock().tick(), 100);
    }

    fn timestep_secs(secs: f64) -> Duration {
        crate::clock::timestep_from_secs(secs).unwrap()
    }

    #[test]
    fn start_then_stop_before_any_step() {
        let env = manual();
        env.start_simulation(TEN_MS).unwrap();
        env.stop_simulation();
        assert!(!env.advance().unwrap());
        assert_eq!(env.simulation_time(), Duration::ZERO);
    }

    #[test]
    fn zero_timestep_rejected_without_state_change() {
        let env = manual();
        let err = env.start_simulation(Duration::ZERO).unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
        assert!(!env.is_running());
        assert!(!env.advance().unwrap());
    }

    #[test]
    fn stop_is_idempotent() {
        let env = manual();
        env.start_simulation(TEN_MS).unwrap();
        env.advance().unwrap();
        env.stop_simulation();
        let after_one = env.simulation_time();
        env.stop_simulation();
        assert!(!env.is_running());
        assert_eq!(env.simulation_time(), after_one);
    }

    #[test]
    fn restart_while_running_changes_step_only() {
        let env = manual();
        env.start_simulation(TEN_MS).unwrap();
        env.advance().unwrap();
        env.start_simulation(Duration::from_millis(5)).unwrap();
        env.advance().unwrap();
        assert_eq!(env.simulation_time(), Duration::from_millis(15));
        assert_eq!(env.lock().state().timestep(), Duration::from_millis(5));
    }

    #[test]
    fn resume_policy_keeps_elapsed_across_stop() {
        let env = manual();
        env.start_simulation(TEN_MS).unwrap();
        env.advance().unwrap();
        env.stop_simulation();
        env.start_simulation(TEN_MS).unwrap();
        env.advance().unwrap();
        assert_eq!(env.simulation_time(), Duration::from_millis(20));
    }

    #[test]
    fn reset_policy_zeroes_elapsed_on_restart() {
        let env = Environment::new(ClockConfig {
            restart: RestartPolicy::Reset,
            ..ClockConfig::manual()
        })
        .unwrap();
        env.start_simulation(TEN_MS).unwrap();
        env.advance().unwrap();
        env.advance().unwrap();
        env.stop_simulation();
        assert_eq!(env.simulation_time(), Duration::from_millis(20));

        env.start_simulation(TEN_MS).unwrap();
        assert_eq!(env.simulation_time(), Duration::ZERO);
        assert_eq!(env.lock().tick(), 0);
        env.advance().unwrap();
        assert_eq!(env.simulation_time(), TEN_MS);
    }

    #[test]
    fn participants_step_in_registration_order() {
        let env = manual();
        let journal = Arc::new(Mutex::new(Vec::new()));
        {
            let mut world = env.lock();
            for label in ["first", "second", "third"] {
                world.add_participant(Box::new(Recorder {
                    label,
                    journal: Arc::clone(&journal),
                }));
            }
            assert_eq!(world.participant_names(), ["first", "second", "third"]);
        }
        env.start_simulation(TEN_MS).unwrap();
        env.advance().unwrap();
        env.advance().unwrap();
        assert_eq!(
            *journal.lock(),
            ["first", "second", "third", "first", "second", "third"]
        );
    }

    #[test]
    fn failing_step_rolls_back_and_reports() {
        let env = manual();
        let body = {
            let mut world = env.lock();
            world.add_participant(Box::new(Saboteur { fail_at: 2 }));
            world.add_body(Body::new("crate0")).unwrap()
        };
        env.start_simulation(TEN_MS).unwrap();
        env.advance().unwrap();

        let (hash_before, events_before) = {
            let world = env.lock();
            (world.state_hash(), world.events().len())
        };

        let err = env.advance().unwrap_err();
        match err {
            SimError::StepFailure {
                participant, tick, ..
            } => {
                assert_eq!(participant, "saboteur");
                assert_eq!(tick, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(env.simulation_time(), TEN_MS);
        let world = env.lock();
        assert_eq!(world.tick(), 1);
        assert_eq!(world.state_hash(), hash_before);
        assert_eq!(world.events().len(), events_before);
        assert_eq!(world.get(body).unwrap().transform.position, Vec3::X);
    }

    #[test]
    fn participant_downcast() {
        let env = manual();
        let mut world = env.lock();
        let id = world.add_participant(Box::new(Saboteur { fail_at: 9 }));
        world.participant_mut::<Saboteur>(id).unwrap().fail_at = 3;
        assert_eq!(world.participant::<Saboteur>(id).unwrap().fail_at, 3);
        assert!(world.participant::<Recorder>(id).is_none());

        assert!(world.remove_participant(id).is_some());
        assert!(world.participant::<Saboteur>(id).is_none());
    }

    #[test]
    fn physics_engine_swap_and_gravity() {
        let env = manual();
        let mut world = env.lock();
        assert_eq!(world.physics().name(), NullEngine::NAME);
        world.physics_mut().set_gravity(Vec3::new(0.0, 0.0, -9.81));
        let old = world.set_physics_engine(Box::new(NullEngine::new()));
        assert_eq!(old.gravity(), Vec3::new(0.0, 0.0, -9.81));
        assert_eq!(world.physics().gravity(), Vec3::ZERO);
    }

    #[test]
    fn try_lock_times_out_while_held() {
        let env = manual();
        let held = env.lock();
        std::thread::scope(|s| {
            s.spawn(|| {
                let err = env.try_lock_for(Duration::from_millis(20)).err();
                assert!(matches!(err, Some(SimError::Timeout(_))));
            });
        });
        drop(held);
        assert!(env.try_lock_for(Duration::from_millis(20)).is_ok());
    }

    #[test]
    fn simulation_time_readable_while_lock_held() {
        let env = manual();
        env.start_simulation(TEN_MS).unwrap();
        env.advance().unwrap();
        let _held = env.lock();
        assert_eq!(env.simulation_time(), TEN_MS);
    }

    #[test]
    fn background_stepper_advances_in_whole_steps() {
        let env = Environment::new(ClockConfig {
            realtime: false,
            ..ClockConfig::default()
        })
        .unwrap();
        env.start_simulation(Duration::from_millis(1)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while env.simulation_time() < Duration::from_millis(50) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        env.stop_simulation();

        let frozen = env.simulation_time();
        assert!(frozen >= Duration::from_millis(50));
        let world = env.lock();
        assert_eq!(frozen, Duration::from_millis(1) * world.tick() as u32);
        drop(world);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(env.simulation_time(), frozen);
    }

    #[test]
    fn background_stop_before_first_deadline_keeps_zero() {
        let env = Environment::new(ClockConfig::default()).unwrap();
        env.start_simulation(Duration::from_secs(1)).unwrap();
        env.stop_simulation();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(env.simulation_time(), Duration::ZERO);
    }

    #[test]
    fn background_failure_pauses_and_is_reported() {
        let env = Environment::new(ClockConfig {
            realtime: false,
            ..ClockConfig::default()
        })
        .unwrap();
        env.lock().add_participant(Box::new(Saboteur { fail_at: 3 }));
        env.start_simulation(TEN_MS).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while env.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(!env.is_running());
        assert_eq!(env.simulation_time(), Duration::from_millis(20));
        assert!(matches!(
            env.take_last_error(),
            Some(SimError::StepFailure { tick: 3, .. })
        ));
        assert!(env.take_last_error().is_none());
    }

    /// Jump the clock forward without stepping.
    fn fast_forward(env: &Environment, elapsed: Duration) {
        let mut inner = env.shared.inner.lock();
        inner.state.set_elapsed(elapsed);
        env.shared.publish_elapsed(elapsed);
    }

    #[test]
    fn oversized_timestep_rejected_in_both_modes() {
        for config in [ClockConfig::manual(), ClockConfig::default()] {
            let env = Environment::new(config).unwrap();
            for bad in [Duration::MAX, Duration::from_secs(u64::MAX / 4)] {
                assert!(matches!(
                    env.start_simulation(bad),
                    Err(SimError::InvalidArgument(_))
                ));
                assert!(!env.is_running());
            }
            assert_eq!(env.simulation_time(), Duration::ZERO);
        }
    }

    #[test]
    fn stepper_usable_after_rejected_timestep() {
        let env = Environment::new(ClockConfig {
            realtime: false,
            ..ClockConfig::default()
        })
        .unwrap();
        assert!(env.start_simulation(Duration::from_secs(u64::MAX / 4)).is_err());
        env.start_simulation(Duration::from_millis(1)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while env.simulation_time() < Duration::from_millis(10) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        env.stop_simulation();
        assert!(env.simulation_time() >= Duration::from_millis(10));
        assert!(env.take_last_error().is_none());
    }

    #[test]
    fn manual_clock_overflow_is_reported_and_not_committed() {
        let env = manual();
        env.lock().add_body(Body::new("crate0")).unwrap();
        env.start_simulation(MAX_TIMESTEP).unwrap();
        let near_limit = MAX_ELAPSED - MAX_TIMESTEP / 2;
        fast_forward(&env, near_limit);
        let hash_before = env.lock().state_hash();

        let err = env.advance().unwrap_err();
        assert!(matches!(
            err,
            SimError::ClockOverflow { elapsed, timestep }
                if elapsed == near_limit && timestep == MAX_TIMESTEP
        ));
        assert_eq!(env.simulation_time(), near_limit);
        let world = env.lock();
        assert_eq!(world.tick(), 0);
        assert_eq!(world.state_hash(), hash_before);
    }

    #[test]
    fn manual_clock_reaches_exact_limit() {
        let env = manual();
        env.start_simulation(MAX_TIMESTEP).unwrap();
        fast_forward(&env, MAX_ELAPSED - MAX_TIMESTEP);
        assert!(env.advance().unwrap());
        assert_eq!(env.simulation_time(), MAX_ELAPSED);
        assert_eq!(env.simulation_time_micros(), u64::MAX / 1_000);
        assert!(env.advance().is_err());
    }

    #[test]
    fn background_clock_overflow_pauses_and_is_reported() {
        let env = Environment::new(ClockConfig {
            realtime: false,
            ..ClockConfig::default()
        })
        .unwrap();
        let near_limit = MAX_ELAPSED - MAX_TIMESTEP / 2;
        fast_forward(&env, near_limit);
        env.start_simulation(MAX_TIMESTEP).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while env.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(!env.is_running());
        assert_eq!(env.simulation_time(), near_limit);
        assert!(matches!(
            env.take_last_error(),
            Some(SimError::ClockOverflow { .. })
        ));

        // The stepper thread is still alive and honors the next start.
        fast_forward(&env, Duration::ZERO);
        env.start_simulation(Duration::from_millis(1)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while env.simulation_time() < Duration::from_millis(5) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        env.stop_simulation();
        assert!(env.simulation_time() >= Duration::from_millis(5));
    }

    proptest! {
        #[test]
        fn elapsed_is_exact_multiple_of_timestep(
            step_nanos in 1u64..50_000_000,
            steps in 0u32..200,
        ) {
            let env = manual();
            let timestep = Duration::from_nanos(step_nanos);
            env.start_simulation(timestep).unwrap();
            for _ in 0..steps {
                env.advance().unwrap();
            }
            prop_assert_eq!(env.simulation_time(), timestep * steps);
        }

        #[test]
        fn stopped_clock_never_moves(steps in 0u32..20, attempts in 1usize..20) {
            let env = manual();
            env.start_simulation(TEN_MS).unwrap();
            for _ in 0..steps {
                env.advance().unwrap();
            }
            env.stop_simulation();
            let frozen = env.simulation_time();
            for _ in 0..attempts {
                prop_assert!(!env.advance().unwrap());
                prop_assert_eq!(env.simulation_time(), frozen);
            }
        }
    }
}
