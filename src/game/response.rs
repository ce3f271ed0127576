//! Collision Response
//!
//! Explicit reaction table keyed by `(ObjectType, ObjectType)`. Each call
//! mutates only `this`; the other side is a copy taken before either side
//! reacted, so reaction order within a pair does not matter.

use crate::core::vec2::{Bounds, Vec2};
use crate::game::events::GameEvent;
use crate::game::object::{GameObject, ObjectId, ObjectKind, ObjectType};

/// What one side of a contact may read about the other.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactView {
    pub id: ObjectId,
    pub object_type: ObjectType,
    pub bounds: Bounds,
    pub deleted: bool,
    /// Projectile owner
    pub owner: Option<ObjectId>,
    /// Projectile damage
    pub damage: f32,
    /// AmmoPickup count
    pub count: i32,
    /// HealthPickup amount
    pub amount: f32,
}

impl ContactView {
    /// Capture an object's pre-contact state.
    pub fn of(object: &GameObject) -> Self {
        let mut view = Self {
            id: object.id,
            object_type: object.object_type(),
            bounds: object.bounds,
            deleted: object.delete_me,
            owner: None,
            damage: 0.0,
            count: 0,
            amount: 0.0,
        };
        match &object.kind {
            ObjectKind::Projectile(p) => {
                view.owner = Some(p.owner);
                view.damage = p.damage;
            }
            ObjectKind::AmmoPickup { count } => view.count = *count,
            ObjectKind::HealthPickup { amount } => view.amount = *amount,
            ObjectKind::Tank(_) | ObjectKind::Wall => {}
        }
        view
    }
}

/// React to a confirmed contact with `other`.
///
/// Events are pushed by the side that changes: the tank reports hits and
/// pickups, never the projectile or pickup.
pub fn handle_collision(this: &mut GameObject, other: &ContactView, tick: u64, events: &mut Vec<GameEvent>) {
    if this.delete_me || other.deleted {
        return;
    }

    match (this.object_type(), other.object_type) {
        (ObjectType::Projectile, ObjectType::Wall) => {
            this.delete_me = true;
        }
        (ObjectType::Projectile, ObjectType::Tank) => {
            let owned = this.projectile_state().map(|p| p.owner) == Some(other.id);
            if !owned {
                this.delete_me = true;
            }
        }
        (ObjectType::Tank, ObjectType::Projectile) => {
            if other.owner == Some(this.id) {
                return;
            }
            this.health -= other.damage;
            let attacker = other.owner.unwrap_or(other.id);
            if this.health <= 0.0 {
                this.health = 0.0;
                this.delete_me = true;
                events.push(GameEvent::tank_destroyed(tick, this.id, other.owner));
            } else {
                events.push(GameEvent::tank_hit(tick, this.id, attacker, other.damage, this.health));
            }
        }
        (ObjectType::Tank, ObjectType::Wall) => {
            push_out(this, &other.bounds, 1.0);
        }
        (ObjectType::Tank, ObjectType::Tank) => {
            push_out(this, &other.bounds, 0.5);
        }
        (ObjectType::Tank, ObjectType::AmmoPickup) => {
            if let Some(tank) = this.tank_state_mut() {
                tank.ammo = tank.ammo.saturating_add(other.count);
            }
            events.push(GameEvent::pickup_collected(tick, this.id, other.id, other.object_type));
        }
        (ObjectType::Tank, ObjectType::HealthPickup) => {
            if let Some(max) = this.tank_state().map(|t| t.max_health) {
                this.health = (this.health + other.amount).min(max);
            }
            events.push(GameEvent::pickup_collected(tick, this.id, other.id, other.object_type));
        }
        (ObjectType::AmmoPickup | ObjectType::HealthPickup, ObjectType::Tank) => {
            this.delete_me = true;
        }
        _ => {}
    }
}

/// Move `this` out of `obstacle` along the axis of least penetration and
/// zero its velocity on that axis. `share` is the fraction of the overlap
/// this side takes.
fn push_out(this: &mut GameObject, obstacle: &Bounds, share: f32) {
    let a = this.bounds;
    let overlap_x = a.right().min(obstacle.right()) - a.left().max(obstacle.left());
    let overlap_y = a.bottom().min(obstacle.bottom()) - a.top().max(obstacle.top());
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return;
    }

    let delta = a.center() - obstacle.center();
    if overlap_x < overlap_y {
        let sign = if delta.x < 0.0 { -1.0 } else { 1.0 };
        this.bounds.position += Vec2::new(sign * overlap_x * share, 0.0);
        this.velocity.x = 0.0;
    } else {
        let sign = if delta.y < 0.0 { -1.0 } else { 1.0 };
        this.bounds.position += Vec2::new(0.0, sign * overlap_y * share);
        this.velocity.y = 0.0;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;
    use crate::game::object::{Controller, PROJECTILE_DAMAGE};

    fn contact(a: &mut GameObject, b: &mut GameObject) -> Vec<GameEvent> {
        let va = ContactView::of(a);
        let vb = ContactView::of(b);
        let mut events = Vec::new();
        handle_collision(a, &vb, 1, &mut events);
        handle_collision(b, &va, 1, &mut events);
        events
    }

    #[test]
    fn test_projectile_damages_other_tank() {
        let shooter = GameObject::tank(Vec2::ZERO, Controller::Input);
        let mut target = GameObject::tank(Vec2::new(300.0, 0.0), Controller::Input);
        let mut shot = shooter.fire_projectile().unwrap();

        let events = contact(&mut shot, &mut target);
        assert!(shot.delete_me);
        assert_eq!(target.health, 100.0 - PROJECTILE_DAMAGE);
        assert!(!target.delete_me);
        assert!(matches!(events[0].data, GameEventData::TankHit { .. }));
    }

    #[test]
    fn test_projectile_ignores_owner() {
        let mut shooter = GameObject::tank(Vec2::ZERO, Controller::Input);
        let mut shot = shooter.fire_projectile().unwrap();
        let events = contact(&mut shooter, &mut shot);
        assert!(!shot.delete_me);
        assert_eq!(shooter.health, 100.0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_lethal_hit_tombstones_tank() {
        let shooter = GameObject::tank(Vec2::ZERO, Controller::Input);
        let mut target = GameObject::tank(Vec2::new(300.0, 0.0), Controller::Input);
        target.health = 5.0;
        let mut shot = shooter.fire_projectile().unwrap();
        let events = contact(&mut target, &mut shot);
        assert!(target.delete_me);
        assert_eq!(target.health, 0.0);
        assert!(matches!(events[0].data, GameEventData::TankDestroyed { .. }));
    }

    #[test]
    fn test_projectile_dies_on_wall() {
        let mut wall = GameObject::wall(Bounds::from_xywh(0.0, 0.0, 50.0, 50.0));
        let mut shot = GameObject::projectile(ObjectId::nil(), Vec2::new(45.0, 10.0), Vec2::RIGHT);
        contact(&mut wall, &mut shot);
        assert!(shot.delete_me);
        assert!(!wall.delete_me);
    }

    #[test]
    fn test_ammo_pickup_transfers_and_deletes() {
        let mut tank = GameObject::tank(Vec2::ZERO, Controller::Input);
        let mut pickup = GameObject::ammo_pickup(Vec2::new(10.0, 10.0), 5);
        let before = tank.tank_state().unwrap().ammo;
        contact(&mut pickup, &mut tank);
        assert_eq!(tank.tank_state().unwrap().ammo, before + 5);
        assert!(pickup.delete_me);
    }

    #[test]
    fn test_health_pickup_caps_at_max() {
        let mut tank = GameObject::tank(Vec2::ZERO, Controller::Input);
        tank.health = 95.0;
        let mut pickup = GameObject::health_pickup(Vec2::new(10.0, 10.0), 25.0);
        contact(&mut tank, &mut pickup);
        assert_eq!(tank.health, 100.0);
        assert!(pickup.delete_me);
    }

    #[test]
    fn test_tank_pushed_out_of_wall() {
        let mut tank = GameObject::tank(Vec2::new(0.0, 0.0), Controller::Input);
        tank.velocity = Vec2::new(50.0, 10.0);
        // Wall overlapping the tank's right edge by 4 units
        let mut wall = GameObject::wall(Bounds::from_xywh(60.0, -100.0, 20.0, 300.0));
        contact(&mut tank, &mut wall);
        assert_eq!(tank.position(), Vec2::new(-4.0, 0.0));
        assert_eq!(tank.velocity, Vec2::new(0.0, 10.0));
        assert_eq!(wall.position(), Vec2::new(60.0, -100.0));
    }

    #[test]
    fn test_tanks_split_overlap() {
        let mut a = GameObject::tank(Vec2::new(0.0, 0.0), Controller::Input);
        let mut b = GameObject::tank(Vec2::new(0.0, 60.0), Controller::Input);
        contact(&mut a, &mut b);
        assert_eq!(a.position(), Vec2::new(0.0, -2.0));
        assert_eq!(b.position(), Vec2::new(0.0, 62.0));
    }

    #[test]
    fn test_tombstoned_other_ignored() {
        let mut tank = GameObject::tank(Vec2::ZERO, Controller::Input);
        let mut pickup = GameObject::ammo_pickup(Vec2::ZERO, 5);
        pickup.delete_me = true;
        let before = tank.tank_state().unwrap().ammo;
        let mut events = Vec::new();
        handle_collision(&mut tank, &ContactView::of(&pickup), 1, &mut events);
        assert_eq!(tank.tank_state().unwrap().ammo, before);
    }
}
