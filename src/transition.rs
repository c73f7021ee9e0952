use crate::settings::{ALPHA_VISIBLE, MAX_SIMULTANEOUS_TRANSITIONS};
use bevy::log::trace;
use bevy::math::UVec2;
use std::collections::{BTreeSet, HashMap};

/// Regrowth applied to a pixel once a concealing transition completes.
/// 过渡完成后的迷雾恢复参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Restore {
    /// 恢复开始前的延迟（秒）
    pub delay: f32,
    /// 恢复持续时间（秒）
    pub duration: f32,
}

/// A request to animate one pixel from `initial_alpha` to `target_alpha`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionRequest {
    pub coord: UVec2,
    pub initial_alpha: u8,
    pub target_alpha: u8,
    /// Seconds to wait after scheduling before the animation starts.
    pub delay: f32,
    /// Seconds the animation takes; `<= 0` jumps straight to the target.
    pub duration: f32,
    /// Chained toward [`ALPHA_VISIBLE`] when the target is below it.
    pub restore: Option<Restore>,
}

impl TransitionRequest {
    /// Regrowth of `coord` from `alpha` back to [`ALPHA_VISIBLE`].
    pub fn restore(coord: UVec2, alpha: u8, restore: Restore) -> Self {
        Self {
            coord,
            initial_alpha: alpha,
            target_alpha: ALPHA_VISIBLE,
            delay: restore.delay,
            duration: restore.duration,
            restore: None,
        }
    }
}

/// Result of [`TransitionPool::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A slot was armed for the request.
    Scheduled,
    /// The pixel already has an enabled transition; the request was ignored.
    /// 像素已有进行中的过渡，请求被忽略
    AlreadyPending,
    /// The pool is at capacity; the request was dropped.
    /// 过渡池已满，请求被丢弃
    Dropped,
}

/// One pixel value produced by [`TransitionPool::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelUpdate {
    pub coord: UVec2,
    pub alpha: u8,
}

/// 过渡槽
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSlot {
    pub enabled: bool,
    pub coord: UVec2,
    pub start_time: f32,
    pub delay: f32,
    pub duration: f32,
    pub initial_alpha: u8,
    pub target_alpha: u8,
    pub restore: Option<Restore>,
}

impl TransitionSlot {
    fn arm(&mut self, request: &TransitionRequest, now: f32) {
        self.enabled = true;
        self.coord = request.coord;
        self.start_time = now;
        self.delay = request.delay;
        self.duration = request.duration;
        self.initial_alpha = request.initial_alpha;
        self.target_alpha = request.target_alpha;
        self.restore = request.restore;
    }

    /// Linear progress at `now`, or `None` while the start delay has not elapsed.
    fn progress(&self, now: f32) -> Option<f32> {
        let elapsed = now - self.start_time - self.delay;
        if !(elapsed > 0.0) {
            return None;
        }
        if self.duration <= 0.0 {
            return Some(1.0);
        }
        Some((elapsed / self.duration).clamp(0.0, 1.0))
    }

    fn alpha_at(&self, progress: f32) -> u8 {
        let initial = self.initial_alpha as f32;
        let target = self.target_alpha as f32;
        (initial + (target - initial) * progress) as u8
    }
}

/// Fixed-capacity table of in-flight per-pixel alpha animations.
/// 固定容量的逐像素透明度动画表
///
/// Slots are never removed, only disabled and reused, so their order is the
/// allocation order and [`TransitionPool::advance`] is deterministic for a
/// given sequence of calls.
///
/// # Allocation
/// - A pixel maps to at most one enabled slot through `coord_to_slot`.
/// - A request for a pixel whose slot is still enabled is ignored, not merged.
/// - Otherwise the pixel's previous slot is reused if disabled, then the lowest
///   disabled slot, then a new slot while below capacity.
/// - At capacity with every slot enabled the request is dropped.
#[derive(Debug, Clone)]
pub struct TransitionPool {
    slots: Vec<TransitionSlot>,
    coord_to_slot: HashMap<UVec2, usize>,
    free_slots: BTreeSet<usize>,
    capacity: usize,
}

impl Default for TransitionPool {
    fn default() -> Self {
        Self::new(MAX_SIMULTANEOUS_TRANSITIONS)
    }
}

impl TransitionPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            coord_to_slot: HashMap::new(),
            free_slots: BTreeSet::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of enabled transitions.
    pub fn active_count(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    pub fn is_pending(&self, coord: UVec2) -> bool {
        self.coord_to_slot
            .get(&coord)
            .is_some_and(|&index| self.slots[index].enabled && self.slots[index].coord == coord)
    }

    pub fn slots(&self) -> &[TransitionSlot] {
        &self.slots
    }

    /// Forgets every transition.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.coord_to_slot.clear();
        self.free_slots.clear();
    }

    /// Registers a transition for `request.coord` starting at `now`.
    /// 在 `now` 时刻为像素注册过渡
    pub fn schedule(&mut self, request: TransitionRequest, now: f32) -> ScheduleOutcome {
        let indexed = self
            .coord_to_slot
            .get(&request.coord)
            .copied()
            .filter(|&index| self.slots[index].coord == request.coord);

        let index = match indexed {
            Some(index) if self.slots[index].enabled => return ScheduleOutcome::AlreadyPending,
            Some(index) => {
                self.free_slots.remove(&index);
                index
            }
            None => match self.allocate() {
                Some(index) => index,
                None => {
                    trace!(
                        "Transition pool full ({} slots), dropping transition at {:?}",
                        self.capacity, request.coord
                    );
                    return ScheduleOutcome::Dropped;
                }
            },
        };

        let previous = self.slots[index].coord;
        if previous != request.coord && self.coord_to_slot.get(&previous) == Some(&index) {
            self.coord_to_slot.remove(&previous);
        }
        self.coord_to_slot.insert(request.coord, index);
        self.slots[index].arm(&request, now);
        ScheduleOutcome::Scheduled
    }

    fn allocate(&mut self) -> Option<usize> {
        if let Some(index) = self.free_slots.pop_first() {
            return Some(index);
        }
        if self.slots.len() >= self.capacity {
            return None;
        }
        self.slots.push(TransitionSlot {
            enabled: false,
            coord: UVec2::new(u32::MAX, u32::MAX),
            start_time: 0.0,
            delay: 0.0,
            duration: 0.0,
            initial_alpha: ALPHA_VISIBLE,
            target_alpha: ALPHA_VISIBLE,
            restore: None,
        });
        Some(self.slots.len() - 1)
    }

    /// Advances every enabled transition to `now` and returns the resulting pixel values.
    /// 将所有进行中的过渡推进到 `now`，返回产生的像素值
    ///
    /// Completed transitions are disabled. A completed transition toward an alpha
    /// below [`ALPHA_VISIBLE`] that carries a [`Restore`] with a positive delay
    /// re-arms its slot toward full alpha, starting at `now`.
    pub fn advance(&mut self, now: f32) -> Vec<PixelUpdate> {
        let mut updates = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.enabled {
                continue;
            }
            let Some(progress) = slot.progress(now) else {
                continue;
            };
            updates.push(PixelUpdate {
                coord: slot.coord,
                alpha: slot.alpha_at(progress),
            });
            if progress < 1.0 {
                continue;
            }

            slot.enabled = false;
            let restore = slot.restore.filter(|restore| restore.delay > 0.0);
            match restore {
                Some(restore) if slot.target_alpha < ALPHA_VISIBLE => {
                    let request = TransitionRequest::restore(slot.coord, slot.target_alpha, restore);
                    slot.arm(&request, now);
                }
                _ => {
                    self.free_slots.insert(index);
                }
            }
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fade(coord: UVec2, initial: u8, target: u8, duration: f32) -> TransitionRequest {
        TransitionRequest {
            coord,
            initial_alpha: initial,
            target_alpha: target,
            delay: 0.0,
            duration,
            restore: None,
        }
    }

    #[test]
    fn advance_interpolates_linearly_and_completes() {
        let mut pool = TransitionPool::default();
        let coord = UVec2::new(3, 4);
        assert_eq!(pool.schedule(fade(coord, 255, 55, 2.0), 0.0), ScheduleOutcome::Scheduled);

        // No time elapsed yet: nothing to report.
        assert!(pool.advance(0.0).is_empty());

        let halfway = pool.advance(1.0);
        assert_eq!(halfway, vec![PixelUpdate { coord, alpha: 155 }]);
        assert!(pool.is_pending(coord));

        let done = pool.advance(5.0);
        assert_eq!(done, vec![PixelUpdate { coord, alpha: 55 }]);
        assert!(!pool.is_pending(coord));
        assert_eq!(pool.active_count(), 0);
        assert!(pool.advance(6.0).is_empty());
    }

    #[test]
    fn zero_duration_jumps_after_delay() {
        let mut pool = TransitionPool::default();
        let coord = UVec2::new(1, 1);
        let request = TransitionRequest {
            delay: 1.0,
            duration: 0.0,
            ..fade(coord, 0, 200, 0.0)
        };
        pool.schedule(request, 10.0);

        assert!(pool.advance(10.5).is_empty());
        assert!(pool.advance(11.0).is_empty());
        assert_eq!(pool.advance(11.01), vec![PixelUpdate { coord, alpha: 200 }]);
    }

    #[test]
    fn pending_pixel_is_not_preempted() {
        let mut pool = TransitionPool::default();
        let coord = UVec2::new(2, 2);
        pool.schedule(fade(coord, 255, 0, 1.0), 0.0);
        assert_eq!(
            pool.schedule(fade(coord, 0, 255, 1.0), 0.5),
            ScheduleOutcome::AlreadyPending
        );
        assert_eq!(pool.advance(2.0), vec![PixelUpdate { coord, alpha: 0 }]);

        // Once finished the pixel can be scheduled again, reusing its slot.
        assert_eq!(pool.schedule(fade(coord, 0, 255, 1.0), 2.0), ScheduleOutcome::Scheduled);
        assert_eq!(pool.slots().len(), 1);
    }

    #[test]
    fn completed_conceal_chains_restore_in_same_slot() {
        let mut pool = TransitionPool::default();
        let coord = UVec2::new(7, 0);
        let request = TransitionRequest {
            restore: Some(Restore {
                delay: 2.0,
                duration: 1.0,
            }),
            ..fade(coord, 255, 0, 1.0)
        };
        pool.schedule(request, 0.0);

        assert_eq!(pool.advance(1.0), vec![PixelUpdate { coord, alpha: 0 }]);
        assert!(pool.is_pending(coord));
        let slot = &pool.slots()[0];
        assert_eq!((slot.initial_alpha, slot.target_alpha), (0, 255));
        assert_eq!(slot.start_time, 1.0);
        assert_eq!(slot.restore, None);

        // Still waiting for the restore delay.
        assert!(pool.advance(2.5).is_empty());
        assert_eq!(pool.advance(3.5), vec![PixelUpdate { coord, alpha: 127 }]);
        assert_eq!(pool.advance(4.5), vec![PixelUpdate { coord, alpha: 255 }]);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn restore_without_delay_does_not_chain() {
        let mut pool = TransitionPool::default();
        let request = TransitionRequest {
            restore: Some(Restore {
                delay: 0.0,
                duration: 1.0,
            }),
            ..fade(UVec2::ZERO, 255, 0, 0.5)
        };
        pool.schedule(request, 0.0);
        pool.advance(1.0);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn request_beyond_capacity_is_dropped_until_a_slot_frees() {
        let mut pool = TransitionPool::default();
        for i in 0..MAX_SIMULTANEOUS_TRANSITIONS as u32 {
            let coord = UVec2::new(i % 128, i / 128);
            assert_eq!(
                pool.schedule(fade(coord, 255, 0, 1.0), 0.0),
                ScheduleOutcome::Scheduled
            );
        }
        let extra = UVec2::new(127, 127);
        assert_eq!(
            pool.schedule(fade(extra, 255, 0, 1.0), 0.0),
            ScheduleOutcome::Dropped
        );
        assert!(!pool.is_pending(extra));

        let updates = pool.advance(1.0);
        assert_eq!(updates.len(), MAX_SIMULTANEOUS_TRANSITIONS);
        assert_eq!(
            pool.schedule(fade(extra, 255, 0, 1.0), 1.0),
            ScheduleOutcome::Scheduled
        );
    }

    #[test]
    fn freed_slots_are_reused_lowest_first() {
        let mut pool = TransitionPool::new(3);
        pool.schedule(fade(UVec2::new(0, 0), 255, 0, 1.0), 0.0);
        pool.schedule(fade(UVec2::new(1, 0), 255, 0, 5.0), 0.0);
        pool.schedule(fade(UVec2::new(2, 0), 255, 0, 1.0), 0.0);
        pool.advance(2.0);
        assert_eq!(pool.active_count(), 1);

        let fresh = UVec2::new(9, 9);
        pool.schedule(fade(fresh, 255, 0, 1.0), 2.0);
        assert_eq!(pool.slots()[0].coord, fresh);
        // The pixel that used to own slot 0 no longer maps to it.
        assert!(!pool.is_pending(UVec2::new(0, 0)));
        assert!(pool.is_pending(fresh));
        assert_eq!(pool.slots().len(), 3);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut pool = TransitionPool::new(4);
        pool.schedule(fade(UVec2::ONE, 255, 0, 1.0), 0.0);
        pool.clear();
        assert_eq!(pool.active_count(), 0);
        assert!(pool.advance(5.0).is_empty());
        assert_eq!(pool.schedule(fade(UVec2::ONE, 255, 0, 1.0), 5.0), ScheduleOutcome::Scheduled);
    }
}
