//! The locked-path state machine, transition/emission processing, and the
//! top-level ingest coordinator tying discovery and tracking together.
//!
//! This is the monolithic stateful core of the crate: mode transitions, a
//! confidence counter with hysteresis-like thresholds, and `log::debug!`/
//! `warn!` at every state change.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::acode::{self, apply_mod, elapsed_ticks, find_slot_by_offset, period, timing, SLOTS};
use crate::context::GlobalContext;
use crate::discover::{self, try_discover};
use crate::pulse::{acode_error, classify, Pulse};
use crate::sync::{SyncAccumulator, SyncHistory};
use crate::traits::{LightSink, ObjectId};
use crate::types::{LightEvent, LightRecord, Lighthouse, Mode, Regime, SYNC_INDEX};

// === tunables ===
/// Events dropped unconditionally at the start of an object's life, to let
/// the acquisition hardware settle.
const STABILISE_EVENTS: u32 = 200;
/// Approximate tick rate of the clock; used only for the long-gap penalty.
const TIMEBASE_HZ: u32 = 48_000_000;
const GAP_PENALTY_PER_SECOND: i32 = 10;

const MIN_CONFIDENCE: i32 = -3;
const MAX_CONFIDENCE: i32 = 100;
const EMIT_CONFIDENCE_THRESHOLD: i32 = 80;
const INITIAL_CONFIDENCE: i32 = 0;

const SYNC_MIN_VALID_TICKS: u32 = 400;
const SYNC_ACODE_ERR_DEMOTE_PENALTY: i32 = 3;
const SYNC_HIT_BONUS: i32 = 1;

const SWEEP_MAX_TICKS: u32 = 7000;
const SWEEP_LONG_PENALTY_TICKS: u32 = 3000;
const SWEEP_LONG_PENALTY: i32 = 1;
const SWEEP_MIN_VALID_TICKS: u32 = 10;

/// Offset applied so an emitted sweep record's origin is the start of the
/// prior sync slot rather than the sweep slot itself.
const SWEEP_OFFSET_ORIGIN_SHIFT: u32 = 20_000;

const DRIFT_WARN_TICKS: i64 = 100;
// === end tunables ===

fn clamp_confidence(c: i32) -> i32 {
    c.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Per-object phase-locked disambiguator state.
pub struct PerObjectState {
    sensor_count: Option<usize>,
    mode: Mode,
    regime: Regime,
    /// True if this object's current lock was counted toward the global
    /// 60Hz refcount (so demotion knows whether to release it).
    counted_as_60hz: bool,
    mod_offset: [u32; 2],
    confidence: i32,
    sync_history: SyncHistory,
    sync_accumulator: SyncAccumulator,
    sweep_buffer: Vec<Option<LightEvent>>,
    stabilise_counter: u32,
    last_timestamp: Option<u32>,
    failures: u32,
}

impl Default for PerObjectState {
    fn default() -> Self {
        Self {
            sensor_count: None,
            mode: Mode::Unknown,
            regime: Regime::Full,
            counted_as_60hz: false,
            mod_offset: [0, 0],
            confidence: INITIAL_CONFIDENCE,
            sync_history: SyncHistory::new(),
            sync_accumulator: SyncAccumulator::new(),
            sweep_buffer: Vec::new(),
            stabilise_counter: STABILISE_EVENTS,
            last_timestamp: None,
            failures: 0,
        }
    }
}

impl PerObjectState {
    fn new() -> Self {
        Self::default()
    }

    pub fn confidence(&self) -> i32 {
        self.confidence
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn set_sensor_count(&mut self, n: usize) {
        if self.sensor_count.is_none() {
            self.sweep_buffer = vec![None; n];
        }
        self.sensor_count = Some(n);
    }

    fn demote(&mut self, ctx: &GlobalContext) {
        if self.counted_as_60hz {
            ctx.unlock_half();
            self.counted_as_60hz = false;
        }
        self.mode = Mode::Unknown;
        self.confidence = INITIAL_CONFIDENCE;
        self.failures = 0;
        self.sync_accumulator.reset();
        for slot in self.sweep_buffer.iter_mut() {
            *slot = None;
        }
        debug!("demoted to UNKNOWN");
    }

    fn lock(&mut self, ctx: &GlobalContext, lock: discover::Lock) {
        self.mode = Mode::Locked(lock.slot as u8);
        self.regime = lock.regime;
        self.mod_offset = [lock.anchor, lock.anchor];
        self.confidence = INITIAL_CONFIDENCE;
        self.failures = 0;
        let is_half = lock.regime == Regime::Half;
        ctx.lock_as(is_half);
        self.counted_as_60hz = is_half;
        debug!("locked: slot={} regime={:?} anchor={}", lock.slot, lock.regime, lock.anchor);
    }

    fn lighthouse(&self) -> Lighthouse {
        let Mode::Locked(slot) = self.mode else { unreachable!("lighthouse() requires locked mode") };
        SLOTS[slot as usize].lighthouse
    }

    fn slot_index(&self) -> usize {
        match self.mode {
            Mode::Locked(s) => s as usize,
            Mode::Unknown => unreachable!("slot_index() requires locked mode"),
        }
    }

    /// Ingest path while unlocked: classify, accumulate, and attempt
    /// discovery after every sealed sync.
    fn ingest_unknown(&mut self, event: LightEvent, ctx: &GlobalContext) {
        match classify(event.length) {
            Pulse::Sweep => {
                if let Some(sealed) = self.sync_accumulator.seal() {
                    self.sync_history.push(sealed);
                    self.try_discover(ctx);
                }
            }
            Pulse::Sync => {
                if self.sync_accumulator.overlaps_current(event.timestamp, event.length) {
                    self.sync_accumulator.extend(event.timestamp, event.length);
                } else {
                    if let Some(sealed) = self.sync_accumulator.seal() {
                        self.sync_history.push(sealed);
                        self.try_discover(ctx);
                        if !matches!(self.mode, Mode::Unknown) {
                            return;
                        }
                    }
                    self.sync_accumulator.begin(event.timestamp, event.length);
                }
            }
        }
    }

    fn try_discover(&mut self, ctx: &GlobalContext) {
        match try_discover(&self.sync_history, ctx.is_60hz()) {
            Some(found) => self.lock(ctx, found),
            None => {
                self.failures += 1;
                discover::report_failure(self.failures);
            }
        }
    }

    /// Ingest path while locked, per the tracked state machine.
    fn ingest_locked<S: LightSink>(
        &mut self,
        object: ObjectId,
        event: LightEvent,
        ctx: &GlobalContext,
        sink: &mut S,
    ) {
        if let Some(last) = self.last_timestamp {
            let gap = elapsed_ticks(event.timestamp, last);
            if gap > TIMEBASE_HZ {
                let penalty = GAP_PENALTY_PER_SECOND * (gap / TIMEBASE_HZ) as i32;
                self.confidence = clamp_confidence(self.confidence - penalty);
                if self.confidence <= 0 {
                    warn!("long gap of {gap} ticks, demoting");
                    self.demote(ctx);
                    return;
                }
            }
        }

        let lh = self.lighthouse();
        let p = period(self.regime);
        let center = event.timestamp.wrapping_add(event.length / 2);
        let offset = apply_mod(center, self.mod_offset[lh.index()], p);
        let (new_slot, _offset_err) = find_slot_by_offset(offset, self.regime);

        if new_slot != self.slot_index() {
            self.flush_transition(object, ctx, sink);
            self.mode = Mode::Locked(new_slot as u8);
            self.sync_accumulator.reset();
            for s in self.sweep_buffer.iter_mut() {
                *s = None;
            }
        }

        self.validate_in_slot(event, ctx);
    }

    fn validate_in_slot(&mut self, event: LightEvent, ctx: &GlobalContext) {
        let slot = SLOTS[self.slot_index()];
        if slot.is_sweep {
            if event.length > SWEEP_MAX_TICKS {
                return;
            }
            if event.length > SWEEP_LONG_PENALTY_TICKS {
                self.confidence = clamp_confidence(self.confidence - SWEEP_LONG_PENALTY);
                if self.confidence <= 0 {
                    self.demote(ctx);
                    return;
                }
            }
            let sensor = event.sensor_id as usize;
            if sensor < self.sweep_buffer.len() {
                let keep = match self.sweep_buffer[sensor] {
                    Some(existing) => event.length > existing.length,
                    None => true,
                };
                if keep {
                    self.sweep_buffer[sensor] = Some(event);
                }
            }
        } else {
            if event.length < SYNC_MIN_VALID_TICKS {
                return;
            }
            let err = acode_error(slot.acode_base, event.length);
            if err > 1250 {
                self.confidence = clamp_confidence(self.confidence - SYNC_ACODE_ERR_DEMOTE_PENALTY);
                if self.confidence < SYNC_ACODE_ERR_DEMOTE_PENALTY {
                    self.demote(ctx);
                    return;
                }
            } else {
                self.confidence = clamp_confidence(self.confidence + SYNC_HIT_BONUS);
                self.sync_accumulator.accumulate(event.timestamp, event.length);
            }
        }
    }

    /// Flushes (emits from) the slot being left, before `self.mode` changes.
    fn flush_transition<S: LightSink>(
        &mut self,
        object: ObjectId,
        ctx: &GlobalContext,
        sink: &mut S,
    ) {
        let old_slot = self.slot_index();
        let slot = SLOTS[old_slot];
        let lh = slot.lighthouse;
        let emit = self.confidence > EMIT_CONFIDENCE_THRESHOLD;

        if slot.is_sweep {
            self.flush_sweep(old_slot, lh, emit, object, sink);
        } else {
            self.flush_sync(old_slot, lh, emit, object, sink);
        }
        let _ = ctx;
    }

    fn flush_sync<S: LightSink>(
        &mut self,
        old_slot: usize,
        lh: Lighthouse,
        emit: bool,
        object: ObjectId,
        sink: &mut S,
    ) {
        let Some(last_sync) = self.sync_accumulator.seal() else {
            return;
        };
        self.sync_history.push(last_sync);

        let new_offset = last_sync.first_timestamp.wrapping_sub(acode::slot_start(old_slot));
        let p = period(self.regime) as i64;
        let prev_anchor = self.mod_offset[lh.index()];
        let drift = (new_offset as i64 - prev_anchor as i64 + p / 2).rem_euclid(p) - p / 2;
        if drift.abs() > DRIFT_WARN_TICKS {
            warn!("phase drift of {drift} ticks on lighthouse {lh:?}");
        }
        self.mod_offset[lh.index()] = new_offset;

        let base_acode = SLOTS[old_slot].acode_base;
        let err_without = (timing(base_acode) as i64 - last_sync.longest_length as i64).abs();
        let err_with = (timing(base_acode | 0b010) as i64 - last_sync.longest_length as i64).abs();
        let data_bit = err_with < err_without;
        let assembled_acode = if data_bit { base_acode | 0b010 } else { base_acode };

        if emit {
            sink.emit_light(
                object,
                LightRecord {
                    sensor_id: -(last_sync.count as i32),
                    index: SYNC_INDEX,
                    acode: assembled_acode,
                    sweep_offset_ticks: 0,
                    timestamp: last_sync.first_timestamp,
                    length: last_sync.longest_length,
                    lighthouse: lh,
                },
            );
        }
        self.sync_accumulator.reset();
        for s in self.sweep_buffer.iter_mut() {
            *s = None;
        }
    }

    fn flush_sweep<S: LightSink>(
        &mut self,
        old_slot: usize,
        lh: Lighthouse,
        emit: bool,
        object: ObjectId,
        sink: &mut S,
    ) {
        let seen: Vec<(usize, LightEvent)> = self
            .sweep_buffer
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.map(|e| (i, e)))
            .collect();

        if !seen.is_empty() {
            let total: u64 = seen.iter().map(|(_, e)| e.length as u64).sum();
            let avg_length = (total / seen.len() as u64) as u32;
            let lo = SWEEP_MIN_VALID_TICKS;
            let hi = 3 * avg_length;

            let p = period(self.regime);
            let anchor = self.mod_offset[lh.index()];
            let slot_start = acode::slot_start(old_slot);

            for (sensor, e) in seen {
                if e.length < lo || e.length > hi {
                    continue;
                }
                let center = e.timestamp.wrapping_add(e.length / 2);
                let le_offset = apply_mod(center, anchor, p);
                let sweep_offset =
                    le_offset as i64 - slot_start as i64 + SWEEP_OFFSET_ORIGIN_SHIFT as i64;
                assert!(sweep_offset > 0, "sweep_offset must be strictly positive");

                if emit {
                    sink.emit_light(
                        object,
                        LightRecord {
                            sensor_id: sensor as i32,
                            index: sensor as i32,
                            acode: SLOTS[old_slot].acode_base,
                            sweep_offset_ticks: sweep_offset as u32,
                            timestamp: e.timestamp,
                            length: e.length,
                            lighthouse: lh,
                        },
                    );
                }
            }
        }

        self.sync_accumulator.reset();
        for s in self.sweep_buffer.iter_mut() {
            *s = None;
        }
    }
}

/// Top-level ingest coordinator, holding one [`PerObjectState`] per tracked
/// object plus the process-wide 60Hz regime flag.
pub struct Disambiguator<S: LightSink> {
    ctx: Arc<GlobalContext>,
    objects: HashMap<ObjectId, PerObjectState>,
    sink: S,
}

impl<S: LightSink> Disambiguator<S> {
    pub fn new(sink: S) -> Self {
        Self { ctx: Arc::new(GlobalContext::new()), objects: HashMap::new(), sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Registers (or re-registers) the sensor count for `object`. Must be
    /// called before any of its events can be processed.
    pub fn set_sensor_count(&mut self, object: ObjectId, n: usize) {
        self.objects.entry(object).or_insert_with(PerObjectState::new).set_sensor_count(n);
    }

    pub fn confidence_of(&self, object: ObjectId) -> Option<i32> {
        self.objects.get(&object).map(|o| o.confidence())
    }

    pub fn mode_of(&self, object: ObjectId) -> Option<Mode> {
        self.objects.get(&object).map(|o| o.mode())
    }

    pub fn regime_of(&self, object: ObjectId) -> Option<Regime> {
        self.objects.get(&object).map(|o| o.regime)
    }

    pub fn mod_offset_of(&self, object: ObjectId, lighthouse: Lighthouse) -> Option<u32> {
        self.objects.get(&object).map(|o| o.mod_offset[lighthouse.index()])
    }

    pub fn is_60hz(&self) -> bool {
        self.ctx.is_60hz()
    }

    /// Processes a single detected light event for `object`.
    pub fn ingest(&mut self, object: ObjectId, event: LightEvent) {
        let Some(state) = self.objects.get_mut(&object) else {
            return;
        };
        if state.sensor_count.is_none() {
            return;
        }

        if state.stabilise_counter > 0 {
            state.stabilise_counter -= 1;
            return;
        }

        let sensor_count = state.sensor_count.unwrap();
        if event.sensor_id as usize >= sensor_count {
            warn!("sensor id {} out of range (count={sensor_count})", event.sensor_id);
            state.last_timestamp = Some(event.timestamp);
            return;
        }

        match state.mode {
            Mode::Unknown => state.ingest_unknown(event, &self.ctx),
            Mode::Locked(_) => state.ingest_locked(object, event, &self.ctx, &mut self.sink),
        }

        state.last_timestamp = Some(event.timestamp);
    }
}
