//! Server-side authoritative character and its movement state machine.
//!
//! A character is either idle or moving towards a target at a constant
//! speed. Movement is advanced by elapsed wall-clock time, both when a new
//! Move command arrives and on every simulation tick.

use crate::registry::ConnectionId;
use shared::{UserId, UserInfo, Vec2, DEFAULT_SPEED};
use std::time::Instant;

/// Movable entity bound 1:1 to a connection.
///
/// Callers share it behind a mutex; every mutation of position, moving flag
/// and update clock happens with that lock held by one writer at a time
/// (either the owning session or the simulation tick).
#[derive(Debug, Clone)]
pub struct Character {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub position: Vec2,
    pub target_position: Vec2,
    pub is_moving: bool,
    /// Units per second, always > 0.
    pub speed: f32,
    pub last_update: Instant,
}

/// Returns `speed` if it is usable as a movement speed.
pub fn valid_speed(speed: f32) -> Option<f32> {
    (speed.is_finite() && speed > 0.0).then_some(speed)
}

impl Character {
    /// Creates an idle character at the origin.
    pub fn new(id: ConnectionId, user_id: UserId, speed: f32) -> Self {
        Self {
            id,
            user_id,
            position: Vec2::ZERO,
            target_position: Vec2::ZERO,
            is_moving: false,
            speed: valid_speed(speed).unwrap_or(DEFAULT_SPEED),
            last_update: Instant::now(),
        }
    }

    /// Starts moving from `start` towards `target`.
    ///
    /// An unusable `speed` keeps the current one. A zero-length move leaves
    /// the character idle at `target`.
    pub fn start_movement(&mut self, start: Vec2, target: Vec2, speed: f32, now: Instant) {
        self.position = start;
        self.target_position = target;
        if let Some(speed) = valid_speed(speed) {
            self.speed = speed;
        }
        self.last_update = now;
        self.is_moving = (target - start).normalize().is_some();
        if !self.is_moving {
            self.position = target;
        }
    }

    /// Advances the character to `now`. No-op while idle.
    pub fn update(&mut self, now: Instant) {
        if !self.is_moving {
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        let to_target = self.target_position - self.position;
        let distance = to_target.length();
        let travel = self.speed * elapsed;

        match to_target.normalize() {
            Some(direction) if travel < distance => {
                self.position += direction * travel;
            }
            _ => {
                self.position = self.target_position;
                self.is_moving = false;
            }
        }
    }

    /// Snapshot record used in AllUsersInfo.
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            user_id: self.user_id,
            character_id: self.id.to_string(),
            current: self.position,
            target: self.target_position,
            speed: self.speed,
            is_moving: self.is_moving,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::time::Duration;

    fn character() -> Character {
        Character::new(ConnectionId::new(), 1000, DEFAULT_SPEED)
    }

    #[test]
    fn test_new_character_is_idle_at_origin() {
        let c = character();
        assert_eq!(c.position, Vec2::ZERO);
        assert!(!c.is_moving);
        assert_eq!(c.speed, DEFAULT_SPEED);
    }

    #[test]
    fn test_invalid_initial_speed_uses_default() {
        let c = Character::new(ConnectionId::new(), 1000, -3.0);
        assert_eq!(c.speed, DEFAULT_SPEED);
        let c = Character::new(ConnectionId::new(), 1000, f32::NAN);
        assert_eq!(c.speed, DEFAULT_SPEED);
    }

    #[test]
    fn test_reaches_target_exactly() {
        let mut c = character();
        let t0 = Instant::now();
        let target = Vec2::new(10.0, 0.0);
        c.start_movement(Vec2::ZERO, target, 100.0, t0);
        assert!(c.is_moving);

        // 10 units at 100 u/s takes 0.1s; overshoot in steps
        c.update(t0 + Duration::from_millis(50));
        assert!(c.is_moving);
        c.update(t0 + Duration::from_millis(120));

        assert!(!c.is_moving);
        assert_eq!(c.position, target);
    }

    #[test]
    fn test_partial_progress_stays_on_segment() {
        let mut c = character();
        let t0 = Instant::now();
        let start = Vec2::new(0.0, 0.0);
        let target = Vec2::new(30.0, 40.0);
        c.start_movement(start, target, 10.0, t0);

        let mut now = t0;
        for _ in 0..4 {
            now += Duration::from_millis(250);
            c.update(now);

            assert!(c.is_moving);
            let from_start = start.distance(c.position);
            let to_target = c.position.distance(target);
            assert!(from_start > 0.0 && to_target > 0.0);
            assert_approx_eq!(from_start + to_target, 50.0, 1e-3);
        }
        assert_approx_eq!(start.distance(c.position), 10.0, 1e-3);
    }

    #[test]
    fn test_zero_distance_move_is_idle() {
        let mut c = character();
        let p = Vec2::new(5.0, 5.0);
        c.start_movement(p, p, 100.0, Instant::now());

        assert!(!c.is_moving);
        assert_eq!(c.position, p);

        c.update(Instant::now() + Duration::from_secs(1));
        assert_eq!(c.position, p);
    }

    #[test]
    fn test_update_while_idle_is_noop() {
        let mut c = character();
        let before = c.last_update;
        c.update(before + Duration::from_secs(3));
        assert_eq!(c.position, Vec2::ZERO);
        assert_eq!(c.last_update, before);
    }

    #[test]
    fn test_start_movement_ignores_bad_speed() {
        let mut c = character();
        c.start_movement(Vec2::ZERO, Vec2::new(1.0, 0.0), 250.0, Instant::now());
        assert_eq!(c.speed, 250.0);
        c.start_movement(Vec2::ZERO, Vec2::new(1.0, 0.0), 0.0, Instant::now());
        assert_eq!(c.speed, 250.0);
    }

    #[test]
    fn test_new_move_overrides_current_motion() {
        let mut c = character();
        let t0 = Instant::now();
        c.start_movement(Vec2::ZERO, Vec2::new(100.0, 0.0), 100.0, t0);
        c.update(t0 + Duration::from_millis(500));
        assert_approx_eq!(c.position.x, 50.0, 1e-3);

        let t1 = t0 + Duration::from_millis(500);
        c.start_movement(c.position, Vec2::new(50.0, 100.0), 100.0, t1);
        c.update(t1 + Duration::from_secs(2));
        assert!(!c.is_moving);
        assert_eq!(c.position, Vec2::new(50.0, 100.0));
    }

    #[test]
    fn test_user_info_snapshot() {
        let mut c = character();
        c.start_movement(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0), 42.0, Instant::now());
        let info = c.user_info();
        assert_eq!(info.user_id, 1000);
        assert_eq!(info.character_id, c.id.to_string());
        assert_eq!(info.current, Vec2::new(1.0, 2.0));
        assert_eq!(info.target, Vec2::new(3.0, 4.0));
        assert_eq!(info.speed, 42.0);
        assert!(info.is_moving);
    }
}
